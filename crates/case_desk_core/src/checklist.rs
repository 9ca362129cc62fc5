//! crates/case_desk_core/src/checklist.rs
//!
//! Document checklists and completeness evaluation.
//!
//! Checklist names are compared to uploaded `docname`s by exact string match:
//! the backend stores the checklist constant verbatim.

use std::collections::HashSet;

use crate::domain::{DocType, Document, DocumentKey, ProvisionalDocument};

//=========================================================================================
// Fixed Checklists
//=========================================================================================

pub const PART_A_DOCUMENTS: &[&str] = &[
    "PAN Card",
    "Aadhaar Card",
    "GST Certificate",
    "Bank Statement (Last 12 Months)",
    "ITR (Last 3 Years)",
    "Audited Financials (Last 3 Years)",
];

pub const PART_B_DOCUMENTS: &[&str] = &[
    "Sanction Letters of Existing Loans",
    "Loan Account Statements",
    "Company Profile",
    "Property Documents",
    "Debtors and Creditors List",
    "Financial Projections",
];

pub const ONE_PAGER_DOCUMENTS: &[&str] = &["One Pager"];

/// The required document names of a case, per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredDocuments {
    pub part_a: Vec<String>,
    pub part_b: Vec<String>,
    pub one_pager: Vec<String>,
    pub provisional: Vec<String>,
}

impl RequiredDocuments {
    /// The fixed checklists plus the case's own provisional items.
    pub fn standard(provisional: &[ProvisionalDocument]) -> Self {
        Self {
            part_a: owned(PART_A_DOCUMENTS),
            part_b: owned(PART_B_DOCUMENTS),
            one_pager: owned(ONE_PAGER_DOCUMENTS),
            provisional: provisional.iter().map(|p| p.docname.clone()).collect(),
        }
    }

    pub fn for_doctype(&self, doctype: DocType) -> &[String] {
        match doctype {
            DocType::PartA => &self.part_a,
            DocType::PartB => &self.part_b,
            DocType::OnePager => &self.one_pager,
            DocType::Provisional => &self.provisional,
        }
    }

    /// Every checklist item, in category order then checklist order, without
    /// duplicates.
    pub fn keys(&self) -> Vec<DocumentKey> {
        let mut seen = HashSet::new();
        DocType::ALL
            .into_iter()
            .flat_map(|doctype| {
                self.for_doctype(doctype)
                    .iter()
                    .map(move |name| DocumentKey::new(doctype, name.clone()))
            })
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

//=========================================================================================
// Current Documents
//=========================================================================================

/// Collapses re-uploads: for each (docname, doctype) only the latest upload is
/// kept. Equal or missing timestamps resolve to the later list position.
/// Output order follows the first appearance of each pair.
pub fn current_documents(documents: &[Document]) -> Vec<&Document> {
    let mut current: Vec<&Document> = Vec::new();
    for doc in documents {
        match current
            .iter_mut()
            .find(|c| c.docname == doc.docname && c.doctype == doc.doctype)
        {
            Some(slot) => {
                if doc.uploaded_at >= slot.uploaded_at {
                    *slot = doc;
                }
            }
            None => current.push(doc),
        }
    }
    current
}

//=========================================================================================
// Completeness
//=========================================================================================

/// Which required names of one category are present and which are missing.
/// `present` and `missing` partition the de-duplicated required set and keep
/// its order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCompletion {
    pub doctype: DocType,
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

impl CategoryCompletion {
    pub fn required_count(&self) -> usize {
        self.present.len() + self.missing.len()
    }

    /// True when there is at least one required name and none is missing.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && !self.present.is_empty()
    }

    pub fn is_started(&self) -> bool {
        !self.present.is_empty()
    }
}

pub fn evaluate_category(
    documents: &[Document],
    doctype: DocType,
    required: &[String],
) -> CategoryCompletion {
    let uploaded: HashSet<&str> = current_documents(documents)
        .into_iter()
        .filter(|d| d.doctype == doctype)
        .map(|d| d.docname.as_str())
        .collect();

    let mut seen = HashSet::new();
    let (present, missing): (Vec<String>, Vec<String>) = required
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .partition(|name| uploaded.contains(name.as_str()));

    CategoryCompletion {
        doctype,
        present,
        missing,
    }
}

/// Completeness of every category for one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistReport {
    pub part_a: CategoryCompletion,
    pub part_b: CategoryCompletion,
    pub one_pager: CategoryCompletion,
    pub provisional: CategoryCompletion,
    /// Whether any one-pager document is uploaded, whatever its name.
    pub one_pager_uploaded: bool,
}

impl ChecklistReport {
    pub fn category(&self, doctype: DocType) -> &CategoryCompletion {
        match doctype {
            DocType::PartA => &self.part_a,
            DocType::PartB => &self.part_b,
            DocType::OnePager => &self.one_pager,
            DocType::Provisional => &self.provisional,
        }
    }
}

pub fn evaluate(documents: &[Document], required: &RequiredDocuments) -> ChecklistReport {
    ChecklistReport {
        part_a: evaluate_category(documents, DocType::PartA, &required.part_a),
        part_b: evaluate_category(documents, DocType::PartB, &required.part_b),
        one_pager: evaluate_category(documents, DocType::OnePager, &required.one_pager),
        provisional: evaluate_category(documents, DocType::Provisional, &required.provisional),
        one_pager_uploaded: documents.iter().any(|d| d.doctype == DocType::OnePager),
    }
}

//=========================================================================================
// Bulk Upload Matching
//=========================================================================================

/// Picks the checklist item a file belongs to.
///
/// The file stem and each required name are normalized: lowercased, with every
/// run of non-alphanumeric characters collapsed to one space. A name matches
/// when its normalized form occurs in the normalized stem at word boundaries.
/// Names are tried in checklist order and the first match wins; a file that
/// matches nothing yields `None` and must not be uploaded.
pub fn match_upload<'a>(file_name: &str, required: &'a [String]) -> Option<&'a str> {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    let haystack = format!(" {} ", normalize(stem));
    required
        .iter()
        .find(|name| {
            let needle = normalize(name);
            !needle.is_empty() && haystack.contains(&format!(" {} ", needle))
        })
        .map(|name| name.as_str())
}

fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn doc(id: &str, doctype: DocType, docname: &str) -> Document {
        Document {
            id: id.to_string(),
            case_id: "c1".to_string(),
            docname: docname.to_string(),
            doctype,
            file_name: format!("{id}.pdf"),
            url: None,
            uploaded_at: None,
        }
    }

    fn part_a_docs(count: usize) -> Vec<Document> {
        PART_A_DOCUMENTS
            .iter()
            .take(count)
            .enumerate()
            .map(|(i, name)| doc(&format!("d{i}"), DocType::PartA, name))
            .collect()
    }

    fn standard() -> RequiredDocuments {
        RequiredDocuments::standard(&[])
    }

    #[test]
    fn present_and_missing_partition_the_required_set() {
        for uploaded in 0..=PART_A_DOCUMENTS.len() {
            let report = evaluate(&part_a_docs(uploaded), &standard());
            let mut union: Vec<String> = report
                .part_a
                .present
                .iter()
                .chain(report.part_a.missing.iter())
                .cloned()
                .collect();
            union.sort();
            let mut expected = owned(PART_A_DOCUMENTS);
            expected.sort();
            assert_eq!(union, expected);
            assert_eq!(report.part_a.present.len(), uploaded);
        }
    }

    #[test]
    fn half_uploaded_part_a() {
        let report = evaluate(&part_a_docs(3), &standard());
        assert_eq!(report.part_a.present.len(), 3);
        assert_eq!(report.part_a.missing.len(), 3);
        assert!(report.part_a.is_started());
        assert!(!report.part_a.is_complete());
    }

    #[test]
    fn names_match_exactly() {
        let docs = vec![doc("d1", DocType::PartA, "pan card")];
        let report = evaluate(&docs, &standard());
        assert!(report.part_a.present.is_empty());
    }

    #[test]
    fn doctype_must_match_too() {
        let docs = vec![doc("d1", DocType::PartB, "PAN Card")];
        let report = evaluate(&docs, &standard());
        assert!(report.part_a.present.is_empty());
    }

    #[test]
    fn duplicate_required_names_count_once() {
        let required = vec!["Lease Deed".to_string(), "Lease Deed".to_string()];
        let completion = evaluate_category(&[], DocType::Provisional, &required);
        assert_eq!(completion.missing, vec!["Lease Deed".to_string()]);
        assert_eq!(completion.required_count(), 1);
    }

    #[test]
    fn re_upload_counts_once() {
        let mut docs = part_a_docs(1);
        let mut again = doc("d9", DocType::PartA, PART_A_DOCUMENTS[0]);
        again.uploaded_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        docs.push(again);

        let report = evaluate(&docs, &standard());
        assert_eq!(report.part_a.present, vec![PART_A_DOCUMENTS[0].to_string()]);

        let current = current_documents(&docs);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, "d9");
    }

    #[test]
    fn current_documents_prefers_latest_timestamp() {
        let mut newer = doc("new", DocType::PartB, "Company Profile");
        newer.uploaded_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let mut older = doc("old", DocType::PartB, "Company Profile");
        older.uploaded_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let docs = vec![newer, older];
        let current = current_documents(&docs);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, "new");
    }

    #[test]
    fn provisional_requirements_come_from_the_case() {
        let provisional = vec![ProvisionalDocument {
            id: "p1".to_string(),
            docname: "Rent Agreement".to_string(),
        }];
        let required = RequiredDocuments::standard(&provisional);
        let docs = vec![doc("d1", DocType::Provisional, "Rent Agreement")];
        let report = evaluate(&docs, &required);
        assert!(report.provisional.is_complete());
    }

    #[test]
    fn any_one_pager_upload_counts_as_uploaded() {
        let docs = vec![doc("d1", DocType::OnePager, "summary-v2")];
        let report = evaluate(&docs, &standard());
        assert!(report.one_pager_uploaded);
        assert!(!report.one_pager.is_complete());
    }

    #[test]
    fn keys_cover_all_categories_in_order() {
        let provisional = vec![ProvisionalDocument {
            id: "p1".to_string(),
            docname: "Rent Agreement".to_string(),
        }];
        let keys = RequiredDocuments::standard(&provisional).keys();
        assert_eq!(keys.first().unwrap().composite(), "partA_PAN Card");
        assert_eq!(keys.last().unwrap().composite(), "provisional_Rent Agreement");
        assert_eq!(
            keys.len(),
            PART_A_DOCUMENTS.len() + PART_B_DOCUMENTS.len() + ONE_PAGER_DOCUMENTS.len() + 1
        );
    }

    #[test]
    fn bulk_matching_uses_normalized_words() {
        let required = owned(PART_A_DOCUMENTS);
        assert_eq!(match_upload("pan_card-2024.pdf", &required), Some("PAN Card"));
        assert_eq!(
            match_upload("GST CERTIFICATE.jpeg", &required),
            Some("GST Certificate")
        );
        assert_eq!(match_upload("company.pan.pdf", &required), None);
        assert_eq!(match_upload("holiday.png", &required), None);
    }

    #[test]
    fn bulk_matching_first_required_name_wins() {
        let required = vec!["Bank Statement".to_string(), "Statement".to_string()];
        assert_eq!(
            match_upload("hdfc bank statement.pdf", &required),
            Some("Bank Statement")
        );
        let reversed = vec!["Statement".to_string(), "Bank Statement".to_string()];
        assert_eq!(
            match_upload("hdfc bank statement.pdf", &reversed),
            Some("Statement")
        );
    }

    #[test]
    fn bulk_matching_does_not_match_inside_words() {
        let required = vec!["PD".to_string()];
        assert_eq!(match_upload("updated.pdf", &required), None);
        assert_eq!(match_upload("pd notes.pdf", &required), Some("PD"));
    }
}
