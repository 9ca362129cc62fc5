//! services/api/src/web/protocol.rs
//!
//! Defines the JSON protocol between the dashboard and the gateway: request
//! payloads, response bodies, and their conversion from core types.

use std::collections::BTreeMap;

use case_desk_core::{
    checklist::CategoryCompletion,
    domain::{
        Bank, BankAssignment, Case, CaseCounts, ClientCredentials, Comment, Document,
        DocumentKey, ProvisionalDocument, StaffMember,
    },
    flow::{BulkOutcome, DocumentOutcome},
    BankDocumentConfig, CaseView, ChecklistReport, TransitionOutcome,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CaseListQuery {
    /// `uw` selects the underwriting queue.
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BankSearchQuery {
    /// Substring matched against bank name, email and phone.
    pub q: Option<String>,
}

/// A manual case status change. The status must be one of the canonical names.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChangeRequest {
    pub status: String,
}

/// A bank-local status, e.g. `ACCEPT` or `SANCTIONED`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BankStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LeadEditRequest {
    pub company_name: String,
    pub client_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub requirement_amount: Option<f64>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub kam_email: Option<String>,
    #[serde(default)]
    pub telecaller_email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateClientRequest {
    /// `client` (default) or `individual`.
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProvisionalDocumentRequest {
    pub docname: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentRequest {
    pub text: String,
}

/// One bank's required-document matrix, keyed by `doctype_docname`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BankConfigDto {
    pub bank_id: String,
    #[serde(default)]
    pub bank_name: String,
    #[serde(default)]
    pub documents: BTreeMap<String, bool>,
}

/// The complete bank assignment of a case. Banks left out are unassigned.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DocumentConfigPayload {
    pub banks: Vec<BankConfigDto>,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Backend calls currently in flight.
    pub in_flight: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentDto {
    pub role: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CaseSummaryDto {
    pub id: String,
    pub company_name: String,
    pub client_name: String,
    pub status: String,
    pub product_name: Option<String>,
    pub requirement_amount: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub assignments: Vec<AssignmentDto>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentDto {
    pub id: String,
    pub docname: String,
    pub doctype: String,
    pub file_name: String,
    pub url: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BankAssignmentDto {
    pub bank_id: String,
    pub bank_name: String,
    pub status: String,
    pub documents: BTreeMap<String, bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentDto {
    pub by: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CaseDto {
    pub id: String,
    pub company_name: String,
    pub client_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub requirement_amount: Option<f64>,
    pub product_name: Option<String>,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub status_updated_on: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assignments: Vec<AssignmentDto>,
    pub documents: Vec<DocumentDto>,
    pub bank_assignments: Vec<BankAssignmentDto>,
    pub comments: Vec<CommentDto>,
    pub has_client_login: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvisionalDocumentDto {
    pub id: String,
    pub docname: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryDto {
    pub doctype: String,
    pub present: Vec<String>,
    pub missing: Vec<String>,
    pub complete: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChecklistDto {
    pub part_a: CategoryDto,
    pub part_b: CategoryDto,
    pub one_pager: CategoryDto,
    pub provisional: CategoryDto,
    pub one_pager_uploaded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CaseViewResponse {
    pub case: CaseDto,
    pub provisional_documents: Vec<ProvisionalDocumentDto>,
    pub checklist: ChecklistDto,
    /// Actions the caller may take on this case right now.
    pub actions: Vec<String>,
}

/// Outcome of the automatic status correction after a document change.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionDto {
    /// `applied`, `stage_not_recorded` or `failed`.
    pub result: &'static str,
    pub from: String,
    pub to: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentOutcomeResponse {
    pub document_id: String,
    pub transition: Option<TransitionDto>,
    pub view: CaseViewResponse,
}

/// The file the backend refused; later files were not sent.
#[derive(Debug, Serialize, ToSchema)]
pub struct FailedUploadDto {
    pub file_name: String,
    pub reason: String,
    pub not_attempted: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkOutcomeResponse {
    pub uploaded: Vec<DocumentDto>,
    /// Files that matched no checklist item.
    pub skipped: Vec<String>,
    pub failed: Option<FailedUploadDto>,
    pub transition: Option<TransitionDto>,
    pub view: CaseViewResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CredentialsResponse {
    pub username: String,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CountsResponse {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BankDto {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StaffDto {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
}

//=========================================================================================
// Conversions
//=========================================================================================

fn composite_map(documents: &BTreeMap<DocumentKey, bool>) -> BTreeMap<String, bool> {
    documents
        .iter()
        .map(|(key, flag)| (key.composite(), *flag))
        .collect()
}

fn assignments(case: &Case) -> Vec<AssignmentDto> {
    case.assignments
        .iter()
        .map(|a| AssignmentDto {
            role: a.assigned_to_role.clone(),
            name: a.assigned_to_name.clone(),
            email: a.assigned_to_email.clone(),
        })
        .collect()
}

impl From<&Case> for CaseSummaryDto {
    fn from(case: &Case) -> Self {
        Self {
            id: case.id.clone(),
            company_name: case.company_name.clone(),
            client_name: case.client_name.clone(),
            status: case.status.to_string(),
            product_name: case.product_name.clone(),
            requirement_amount: case.requirement_amount,
            created_at: case.created_at,
            updated_at: case.updated_at,
            assignments: assignments(case),
        }
    }
}

impl From<&Document> for DocumentDto {
    fn from(d: &Document) -> Self {
        Self {
            id: d.id.clone(),
            docname: d.docname.clone(),
            doctype: d.doctype.as_str().to_string(),
            file_name: d.file_name.clone(),
            url: d.url.clone(),
            uploaded_at: d.uploaded_at,
        }
    }
}

impl From<&BankAssignment> for BankAssignmentDto {
    fn from(b: &BankAssignment) -> Self {
        Self {
            bank_id: b.bank_id.clone(),
            bank_name: b.bank_name.clone(),
            status: b.status.to_string(),
            documents: composite_map(&b.document_config),
        }
    }
}

impl From<&Comment> for CommentDto {
    fn from(c: &Comment) -> Self {
        Self {
            by: c.by.clone(),
            text: c.text.clone(),
            created_at: c.created_at,
        }
    }
}

impl From<&Case> for CaseDto {
    fn from(case: &Case) -> Self {
        Self {
            id: case.id.clone(),
            company_name: case.company_name.clone(),
            client_name: case.client_name.clone(),
            phone: case.phone.clone(),
            email: case.email.clone(),
            location: case.location.clone(),
            requirement_amount: case.requirement_amount,
            product_name: case.product_name.clone(),
            status: case.status.to_string(),
            created_at: case.created_at,
            updated_at: case.updated_at,
            status_updated_on: case.status_updated_on,
            assigned_at: case.assigned_at,
            assignments: assignments(case),
            documents: case.documents.iter().map(DocumentDto::from).collect(),
            bank_assignments: case
                .bank_assignments
                .iter()
                .map(BankAssignmentDto::from)
                .collect(),
            comments: case.comments.iter().map(CommentDto::from).collect(),
            has_client_login: case.client_credentials.is_some(),
        }
    }
}

impl From<&ProvisionalDocument> for ProvisionalDocumentDto {
    fn from(p: &ProvisionalDocument) -> Self {
        Self {
            id: p.id.clone(),
            docname: p.docname.clone(),
        }
    }
}

impl From<&CategoryCompletion> for CategoryDto {
    fn from(c: &CategoryCompletion) -> Self {
        Self {
            doctype: c.doctype.as_str().to_string(),
            present: c.present.clone(),
            missing: c.missing.clone(),
            complete: c.is_complete(),
        }
    }
}

impl From<&ChecklistReport> for ChecklistDto {
    fn from(r: &ChecklistReport) -> Self {
        Self {
            part_a: (&r.part_a).into(),
            part_b: (&r.part_b).into(),
            one_pager: (&r.one_pager).into(),
            provisional: (&r.provisional).into(),
            one_pager_uploaded: r.one_pager_uploaded,
        }
    }
}

impl From<&CaseView> for CaseViewResponse {
    fn from(view: &CaseView) -> Self {
        Self {
            case: (&view.case).into(),
            provisional_documents: view.provisional.iter().map(Into::into).collect(),
            checklist: (&view.checklist).into(),
            actions: view.actions.iter().map(|a| a.as_str().to_string()).collect(),
        }
    }
}

impl From<&TransitionOutcome> for TransitionDto {
    fn from(outcome: &TransitionOutcome) -> Self {
        let (result, from, to, reason) = match outcome {
            TransitionOutcome::Applied { from, to } => ("applied", from, to, None),
            TransitionOutcome::StageNotRecorded { from, to, reason } => {
                ("stage_not_recorded", from, to, Some(reason.clone()))
            }
            TransitionOutcome::Failed { from, to, reason } => {
                ("failed", from, to, Some(reason.clone()))
            }
        };
        Self {
            result,
            from: from.to_string(),
            to: to.to_string(),
            reason,
        }
    }
}

impl From<&DocumentOutcome> for DocumentOutcomeResponse {
    fn from(outcome: &DocumentOutcome) -> Self {
        Self {
            document_id: outcome.document_id.clone(),
            transition: outcome.transition.as_ref().map(Into::into),
            view: (&outcome.view).into(),
        }
    }
}

impl From<&BulkOutcome> for BulkOutcomeResponse {
    fn from(outcome: &BulkOutcome) -> Self {
        Self {
            uploaded: outcome.uploaded.iter().map(Into::into).collect(),
            skipped: outcome.skipped.clone(),
            failed: outcome.failed.as_ref().map(|f| FailedUploadDto {
                file_name: f.file_name.clone(),
                reason: f.reason.clone(),
                not_attempted: f.not_attempted.clone(),
            }),
            transition: outcome.transition.as_ref().map(Into::into),
            view: (&outcome.view).into(),
        }
    }
}

impl From<ClientCredentials> for CredentialsResponse {
    fn from(c: ClientCredentials) -> Self {
        Self {
            username: c.username,
            password: c.password,
        }
    }
}

impl From<&CaseCounts> for CountsResponse {
    fn from(counts: &CaseCounts) -> Self {
        Self {
            total: counts.total,
            by_status: counts
                .by_status
                .iter()
                .map(|(status, n)| (status.to_string(), *n))
                .collect(),
        }
    }
}

impl From<Bank> for BankDto {
    fn from(b: Bank) -> Self {
        Self {
            id: b.id,
            name: b.name,
            email: b.email,
            phone: b.phone,
        }
    }
}

impl From<StaffMember> for StaffDto {
    fn from(s: StaffMember) -> Self {
        Self {
            id: s.id,
            name: s.name,
            email: s.email,
            role: s.role,
        }
    }
}

impl From<&BankDocumentConfig> for BankConfigDto {
    fn from(c: &BankDocumentConfig) -> Self {
        Self {
            bank_id: c.bank_id.clone(),
            bank_name: c.bank_name.clone(),
            documents: composite_map(&c.documents),
        }
    }
}

impl BankConfigDto {
    /// Every matrix key must be a `doctype_docname` composite.
    pub fn to_domain(self) -> Result<BankDocumentConfig, ApiError> {
        let documents = self
            .documents
            .into_iter()
            .map(|(key, flag)| match DocumentKey::parse_composite(&key) {
                Some(parsed) => Ok((parsed, flag)),
                None => Err(ApiError::BadRequest(format!(
                    "Document key '{}' for bank '{}' is not of the form doctype_docname",
                    key, self.bank_id
                ))),
            })
            .collect::<Result<_, _>>()?;
        Ok(BankDocumentConfig {
            bank_id: self.bank_id,
            bank_name: self.bank_name,
            documents,
        })
    }
}
