//! crates/case_desk_core/src/flow.rs
//!
//! Sequences backend calls for every user action on a case.
//!
//! Each action runs its calls strictly one after another: gate, mutate,
//! re-fetch, evaluate, then correct the status if the documents demand it.
//! Nothing is rolled back. When the status correction fails after the
//! document mutation succeeded, the case stays inconsistent and the outcome
//! says so.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use crate::actions::{self, CaseAction, Forbidden};
use crate::bank_config::{search_banks, BankAssignmentDraft, BankConfigError};
use crate::checklist::{self, ChecklistReport, RequiredDocuments};
use crate::domain::{
    AuthSession, Bank, BankDocumentConfig, Case, CaseCounts, CaseQueue, ClientCredentials,
    ClientKind, DocType, Document, DocumentUpload, DownloadedFile, LeadEdit, ProvisionalDocument,
    StaffMember,
};
use crate::ports::{CaseBackend, PortError};
use crate::status::{BankStatus, CaseStatus};
use crate::validation::{self, ValidationError};
use crate::workflow::{self, DocumentEvent, TransitionError};

//=========================================================================================
// Error and Result Types
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Port(#[from] PortError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Forbidden(#[from] Forbidden),
    #[error(transparent)]
    BankConfig(#[from] BankConfigError),
    #[error("Document {document_id} is not attached to case {case_id}")]
    DocumentNotOnCase {
        case_id: String,
        document_id: String,
    },
}

pub type FlowResult<T> = Result<T, FlowError>;

//=========================================================================================
// Outcomes
//=========================================================================================

/// A case together with everything derived from it for the caller.
#[derive(Debug, Clone)]
pub struct CaseView {
    pub case: Case,
    pub provisional: Vec<ProvisionalDocument>,
    pub required: RequiredDocuments,
    pub checklist: ChecklistReport,
    pub actions: Vec<CaseAction>,
}

/// What happened to the automatic status correction after a document event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied {
        from: CaseStatus,
        to: CaseStatus,
    },
    /// The status changed but the workflow history call failed.
    StageNotRecorded {
        from: CaseStatus,
        to: CaseStatus,
        reason: String,
    },
    /// The status update failed; the case keeps its previous status.
    Failed {
        from: CaseStatus,
        to: CaseStatus,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub document_id: String,
    pub transition: Option<TransitionOutcome>,
    pub view: CaseView,
}

/// A file received from the user, not yet assigned to a checklist item.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// A bulk upload that the backend refused partway through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    pub file_name: String,
    pub reason: String,
    /// Files after the failed one, never sent.
    pub not_attempted: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BulkOutcome {
    pub uploaded: Vec<Document>,
    /// Names of files that matched no checklist item and were not uploaded.
    pub skipped: Vec<String>,
    pub failed: Option<FailedUpload>,
    pub transition: Option<TransitionOutcome>,
    pub view: CaseView,
}

//=========================================================================================
// CaseFlow
//=========================================================================================

#[derive(Clone)]
pub struct CaseFlow {
    backend: Arc<dyn CaseBackend>,
}

impl CaseFlow {
    pub fn new(backend: Arc<dyn CaseBackend>) -> Self {
        Self { backend }
    }

    // --- Reads ---

    pub async fn list_cases(&self, auth: &AuthSession, queue: CaseQueue) -> FlowResult<Vec<Case>> {
        let cases = self.backend.list_cases(auth, queue).await?;
        Ok(cases
            .into_iter()
            .filter(|case| actions::is_permitted(case, auth, CaseAction::View))
            .collect())
    }

    pub async fn case_counts(&self, auth: &AuthSession) -> FlowResult<CaseCounts> {
        Ok(self.backend.case_counts(auth).await?)
    }

    pub async fn case_view(&self, auth: &AuthSession, case_id: &str) -> FlowResult<CaseView> {
        let view = self.load_view(auth, case_id).await?;
        actions::require(&view.case, auth, CaseAction::View)?;
        Ok(view)
    }

    async fn load_view(&self, auth: &AuthSession, case_id: &str) -> FlowResult<CaseView> {
        let case = self.backend.get_case(auth, case_id).await?;
        let provisional = self.backend.list_provisional_documents(auth, case_id).await?;
        let required = RequiredDocuments::standard(&provisional);
        let checklist = checklist::evaluate(&case.documents, &required);
        let actions = actions::permitted_actions(&case, auth);
        Ok(CaseView {
            case,
            provisional,
            required,
            checklist,
            actions,
        })
    }

    async fn gated_case(
        &self,
        auth: &AuthSession,
        case_id: &str,
        action: CaseAction,
    ) -> FlowResult<Case> {
        let case = self.backend.get_case(auth, case_id).await?;
        actions::require(&case, auth, action)?;
        Ok(case)
    }

    // --- Status ---

    /// Free-form status change from the status form.
    pub async fn change_status(
        &self,
        auth: &AuthSession,
        case_id: &str,
        target: CaseStatus,
    ) -> FlowResult<CaseView> {
        let case = self.gated_case(auth, case_id, CaseAction::ChangeStatus).await?;
        workflow::validate_manual_change(case.status, target)?;
        info!(case_id, from = %case.status, to = %target, "Changing case status");
        self.backend.update_status(auth, case_id, target).await?;
        self.load_view(auth, case_id).await
    }

    pub async fn mark_meeting_done(&self, auth: &AuthSession, case_id: &str) -> FlowResult<CaseView> {
        self.open_shortcut(auth, case_id, CaseAction::MarkMeetingDone, CaseStatus::MeetingDone)
            .await
    }

    pub async fn mark_no_requirement(
        &self,
        auth: &AuthSession,
        case_id: &str,
    ) -> FlowResult<CaseView> {
        self.open_shortcut(
            auth,
            case_id,
            CaseAction::MarkNoRequirement,
            CaseStatus::NoRequirement,
        )
        .await
    }

    async fn open_shortcut(
        &self,
        auth: &AuthSession,
        case_id: &str,
        action: CaseAction,
        target: CaseStatus,
    ) -> FlowResult<CaseView> {
        let case = self.gated_case(auth, case_id, action).await?;
        workflow::validate_open_shortcut(case.status, target)?;
        info!(case_id, to = %target, "Closing out open lead");
        self.backend.update_status(auth, case_id, target).await?;
        self.load_view(auth, case_id).await
    }

    pub async fn update_bank_status(
        &self,
        auth: &AuthSession,
        case_id: &str,
        status: BankStatus,
    ) -> FlowResult<CaseView> {
        self.gated_case(auth, case_id, CaseAction::UpdateBankStatus)
            .await?;
        info!(case_id, status = %status, "Updating bank status");
        self.backend.update_bank_status(auth, case_id, status).await?;
        self.load_view(auth, case_id).await
    }

    // --- Lead ---

    pub async fn edit_lead(
        &self,
        auth: &AuthSession,
        case_id: &str,
        edit: &LeadEdit,
    ) -> FlowResult<CaseView> {
        validation::validate_lead_edit(edit)?;
        self.gated_case(auth, case_id, CaseAction::EditLead).await?;
        self.backend.edit_case(auth, case_id, edit).await?;
        self.load_view(auth, case_id).await
    }

    pub async fn generate_client(
        &self,
        auth: &AuthSession,
        case_id: &str,
        kind: ClientKind,
    ) -> FlowResult<ClientCredentials> {
        self.gated_case(auth, case_id, CaseAction::GenerateClientCredentials)
            .await?;
        info!(case_id, kind = kind.as_str(), "Generating client login");
        Ok(self.backend.generate_client(auth, case_id, kind).await?)
    }

    pub async fn add_comment(
        &self,
        auth: &AuthSession,
        case_id: &str,
        text: &str,
    ) -> FlowResult<CaseView> {
        validation::validate_comment(text)?;
        self.gated_case(auth, case_id, CaseAction::Comment).await?;
        self.backend.add_comment(auth, case_id, text.trim()).await?;
        self.load_view(auth, case_id).await
    }

    // --- Other Documents ---

    pub async fn provisional_documents(
        &self,
        auth: &AuthSession,
        case_id: &str,
    ) -> FlowResult<Vec<ProvisionalDocument>> {
        self.gated_case(auth, case_id, CaseAction::View).await?;
        Ok(self.backend.list_provisional_documents(auth, case_id).await?)
    }

    pub async fn add_provisional_document(
        &self,
        auth: &AuthSession,
        case_id: &str,
        docname: &str,
    ) -> FlowResult<Vec<ProvisionalDocument>> {
        validation::validate_provisional_name(docname, &[])?;
        self.gated_case(auth, case_id, CaseAction::ManageOtherDocuments)
            .await?;
        let existing = self.backend.list_provisional_documents(auth, case_id).await?;
        validation::validate_provisional_name(docname, &existing)?;
        self.backend
            .add_provisional_document(auth, case_id, docname.trim())
            .await?;
        Ok(self.backend.list_provisional_documents(auth, case_id).await?)
    }

    pub async fn delete_provisional_document(
        &self,
        auth: &AuthSession,
        case_id: &str,
        document_id: &str,
    ) -> FlowResult<Vec<ProvisionalDocument>> {
        self.gated_case(auth, case_id, CaseAction::ManageOtherDocuments)
            .await?;
        self.backend
            .delete_provisional_document(auth, case_id, document_id)
            .await?;
        Ok(self.backend.list_provisional_documents(auth, case_id).await?)
    }

    // --- Bank Assignment ---

    /// The saved bank matrices, laid over the case's current checklist.
    pub async fn document_config(
        &self,
        auth: &AuthSession,
        case_id: &str,
    ) -> FlowResult<Vec<BankDocumentConfig>> {
        let view = self.case_view(auth, case_id).await?;
        let saved = self.backend.get_document_config(auth, case_id).await?;
        Ok(BankAssignmentDraft::from_saved(case_id, &view.required, saved).payload())
    }

    /// Saves the complete bank assignment of a case in one batch.
    pub async fn save_document_config(
        &self,
        auth: &AuthSession,
        case_id: &str,
        configs: Vec<BankDocumentConfig>,
    ) -> FlowResult<Vec<BankDocumentConfig>> {
        let view = self.load_view(auth, case_id).await?;
        actions::require(&view.case, auth, CaseAction::AssignBanker)?;

        let mut draft = BankAssignmentDraft::new(case_id, &view.required);
        for config in configs {
            let bank = Bank {
                id: config.bank_id.clone(),
                name: config.bank_name.clone(),
                email: None,
                phone: None,
            };
            draft.add_bank(&bank)?;
            for (key, required) in &config.documents {
                draft.set(&bank.id, key, *required)?;
            }
        }

        let payload = draft.payload();
        info!(case_id, banks = payload.len(), "Saving bank document configuration");
        self.backend
            .save_document_config(auth, case_id, &payload)
            .await?;
        Ok(payload)
    }

    pub async fn banks(&self, auth: &AuthSession, query: &str) -> FlowResult<Vec<Bank>> {
        let banks = self.backend.list_banks(auth).await?;
        Ok(search_banks(&banks, query).into_iter().cloned().collect())
    }

    /// Banks offering a product. Best effort: a failure degrades to no banks.
    pub async fn banks_for_product(&self, auth: &AuthSession, product_name: &str) -> Vec<Bank> {
        match self.backend.list_banks_for_product(auth, product_name).await {
            Ok(banks) => banks,
            Err(e) => {
                warn!(product_name, error = %e, "Could not load banks for product");
                Vec::new()
            }
        }
    }

    pub async fn staff(&self, auth: &AuthSession) -> FlowResult<Vec<StaffMember>> {
        Ok(self.backend.list_staff(auth).await?)
    }

    // --- Documents ---

    pub async fn upload_document(
        &self,
        auth: &AuthSession,
        case_id: &str,
        doctype: DocType,
        docname: &str,
        file: PendingFile,
    ) -> FlowResult<DocumentOutcome> {
        validate_docname(doctype, docname)?;
        let case = self.backend.get_case(auth, case_id).await?;
        require_document_action(&case, auth, doctype, CaseAction::UploadDocuments)?;

        let document = self
            .backend
            .upload_document(auth, to_upload(case_id, doctype, docname.trim(), file))
            .await?;
        info!(case_id, doctype = %doctype, docname = %document.docname, "Document uploaded");

        let (transition, view) = self
            .settle_documents(auth, case_id, DocumentEvent::Uploaded(doctype))
            .await?;
        Ok(DocumentOutcome {
            document_id: document.id,
            transition,
            view,
        })
    }

    /// Uploads several files of one category, assigning each to the first
    /// checklist item its name matches. The status is settled once, after
    /// the last upload.
    ///
    /// A refused upload stops the batch. Files already saved stay on the case
    /// and the status is still settled against them; only when nothing was
    /// saved does the error reach the caller.
    pub async fn upload_bulk(
        &self,
        auth: &AuthSession,
        case_id: &str,
        doctype: DocType,
        files: Vec<PendingFile>,
    ) -> FlowResult<BulkOutcome> {
        let view = self.load_view(auth, case_id).await?;
        require_document_action(&view.case, auth, doctype, CaseAction::UploadDocuments)?;
        let required = view.required.for_doctype(doctype);

        let mut uploaded = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = None;
        let mut files = files.into_iter();
        while let Some(file) = files.next() {
            let Some(docname) = checklist::match_upload(&file.file_name, required) else {
                warn!(case_id, file = %file.file_name, "No checklist item matches file, skipping");
                skipped.push(file.file_name);
                continue;
            };
            let file_name = file.file_name.clone();
            match self
                .backend
                .upload_document(auth, to_upload(case_id, doctype, docname, file))
                .await
            {
                Ok(document) => uploaded.push(document),
                Err(e) if uploaded.is_empty() => return Err(e.into()),
                Err(e) => {
                    warn!(
                        case_id,
                        file = %file_name,
                        saved = uploaded.len(),
                        error = %e,
                        "Bulk upload stopped; earlier files stay on the case"
                    );
                    failed = Some(FailedUpload {
                        file_name,
                        reason: e.user_message(),
                        not_attempted: files.by_ref().map(|f| f.file_name).collect(),
                    });
                    break;
                }
            }
        }

        if uploaded.is_empty() {
            return Ok(BulkOutcome {
                uploaded,
                skipped,
                failed,
                transition: None,
                view,
            });
        }

        let (transition, view) = self
            .settle_documents(auth, case_id, DocumentEvent::Uploaded(doctype))
            .await?;
        Ok(BulkOutcome {
            uploaded,
            skipped,
            failed,
            transition,
            view,
        })
    }

    pub async fn delete_document(
        &self,
        auth: &AuthSession,
        case_id: &str,
        document_id: &str,
    ) -> FlowResult<DocumentOutcome> {
        let case = self.backend.get_case(auth, case_id).await?;
        let doctype = case
            .document(document_id)
            .map(|d| d.doctype)
            .ok_or_else(|| FlowError::DocumentNotOnCase {
                case_id: case_id.to_string(),
                document_id: document_id.to_string(),
            })?;
        require_document_action(&case, auth, doctype, CaseAction::DeleteDocuments)?;

        self.backend.delete_document(auth, document_id).await?;
        info!(case_id, document_id, doctype = %doctype, "Document deleted");

        let (transition, view) = self
            .settle_documents(auth, case_id, DocumentEvent::Deleted(doctype))
            .await?;
        Ok(DocumentOutcome {
            document_id: document_id.to_string(),
            transition,
            view,
        })
    }

    pub async fn download_document(
        &self,
        auth: &AuthSession,
        file_name: &str,
    ) -> FlowResult<DownloadedFile> {
        Ok(self.backend.download_document(auth, file_name).await?)
    }

    /// Re-fetches the case after a document event and applies the automatic
    /// transition the checklist calls for, if any.
    async fn settle_documents(
        &self,
        auth: &AuthSession,
        case_id: &str,
        event: DocumentEvent,
    ) -> FlowResult<(Option<TransitionOutcome>, CaseView)> {
        let view = self.load_view(auth, case_id).await?;
        let from = view.case.status;
        let Some(to) = workflow::auto_transition(from, &view.checklist, event) else {
            return Ok((None, view));
        };

        info!(case_id, from = %from, to = %to, "Applying automatic status transition");
        if let Err(e) = self.backend.update_status(auth, case_id, to).await {
            warn!(
                case_id,
                from = %from,
                to = %to,
                error = %e,
                "Status update failed after document change; case is out of step with its documents"
            );
            let outcome = TransitionOutcome::Failed {
                from,
                to,
                reason: e.user_message(),
            };
            return Ok((Some(outcome), view));
        }

        let outcome = match self.backend.update_workflow(auth, case_id, to).await {
            Ok(()) => TransitionOutcome::Applied { from, to },
            Err(e) => {
                warn!(case_id, stage = %to, error = %e, "Workflow stage not recorded");
                TransitionOutcome::StageNotRecorded {
                    from,
                    to,
                    reason: e.user_message(),
                }
            }
        };
        let view = self.load_view(auth, case_id).await?;
        Ok((Some(outcome), view))
    }
}

/// Checklist categories only accept their own item names; one-pager and
/// provisional names are free text.
fn validate_docname(doctype: DocType, docname: &str) -> Result<(), ValidationError> {
    let docname = docname.trim();
    if docname.is_empty() {
        return Err(ValidationError::Required("Document name"));
    }
    let fixed = match doctype {
        DocType::PartA => checklist::PART_A_DOCUMENTS,
        DocType::PartB => checklist::PART_B_DOCUMENTS,
        DocType::OnePager | DocType::Provisional => return Ok(()),
    };
    if fixed.contains(&docname) {
        Ok(())
    } else {
        Err(ValidationError::Invalid {
            field: "docname",
            reason: format!("'{}' is not a {} checklist item", docname, doctype),
        })
    }
}

/// Bankers reach other documents through their own action.
fn require_document_action(
    case: &Case,
    auth: &AuthSession,
    doctype: DocType,
    action: CaseAction,
) -> Result<(), Forbidden> {
    if doctype == DocType::Provisional
        && actions::is_permitted(case, auth, CaseAction::ManageOtherDocuments)
    {
        return Ok(());
    }
    actions::require(case, auth, action)
}

fn to_upload(case_id: &str, doctype: DocType, docname: &str, file: PendingFile) -> DocumentUpload {
    DocumentUpload {
        case_id: case_id.to_string(),
        doctype,
        docname: docname.to_string(),
        file_name: file.file_name,
        content_type: file.content_type,
        bytes: file.bytes,
    }
}
