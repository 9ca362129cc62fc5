//! crates/case_desk_core/src/ports.rs
//!
//! Defines the service contract (trait) between the workflow core and the
//! lending backend that owns all case state. The core never talks HTTP; an
//! adapter implements this port.

use async_trait::async_trait;

use crate::domain::{
    AuthSession, Bank, BankDocumentConfig, Case, CaseCounts, CaseQueue, ClientCredentials,
    ClientKind, Document, DocumentUpload, DownloadedFile, LeadEdit, ProvisionalDocument,
    StaffMember,
};
use crate::status::{BankStatus, CaseStatus};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The backend answered with a failure status and, usually, a message.
    #[error("Backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// The message to show the user.
    pub fn user_message(&self) -> String {
        match self {
            PortError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Port
//=========================================================================================

/// One method per backend call. Every call carries the caller's session so
/// the backend can apply its own authorization.
#[async_trait]
pub trait CaseBackend: Send + Sync {
    // --- Cases ---
    async fn list_cases(&self, auth: &AuthSession, queue: CaseQueue) -> PortResult<Vec<Case>>;

    async fn get_case(&self, auth: &AuthSession, case_id: &str) -> PortResult<Case>;

    async fn case_counts(&self, auth: &AuthSession) -> PortResult<CaseCounts>;

    async fn update_status(
        &self,
        auth: &AuthSession,
        case_id: &str,
        status: CaseStatus,
    ) -> PortResult<()>;

    async fn update_bank_status(
        &self,
        auth: &AuthSession,
        case_id: &str,
        status: BankStatus,
    ) -> PortResult<()>;

    async fn edit_case(&self, auth: &AuthSession, case_id: &str, edit: &LeadEdit) -> PortResult<()>;

    async fn generate_client(
        &self,
        auth: &AuthSession,
        case_id: &str,
        kind: ClientKind,
    ) -> PortResult<ClientCredentials>;

    /// Records the pipeline stage reached, for the backend's workflow history.
    async fn update_workflow(
        &self,
        auth: &AuthSession,
        case_id: &str,
        stage: CaseStatus,
    ) -> PortResult<()>;

    // --- Provisional Documents ---
    async fn list_provisional_documents(
        &self,
        auth: &AuthSession,
        case_id: &str,
    ) -> PortResult<Vec<ProvisionalDocument>>;

    async fn add_provisional_document(
        &self,
        auth: &AuthSession,
        case_id: &str,
        docname: &str,
    ) -> PortResult<ProvisionalDocument>;

    async fn delete_provisional_document(
        &self,
        auth: &AuthSession,
        case_id: &str,
        document_id: &str,
    ) -> PortResult<()>;

    // --- Bank Document Configuration ---
    async fn get_document_config(
        &self,
        auth: &AuthSession,
        case_id: &str,
    ) -> PortResult<Vec<BankDocumentConfig>>;

    /// Replaces the whole configuration: banks absent from `configs` are
    /// unassigned.
    async fn save_document_config(
        &self,
        auth: &AuthSession,
        case_id: &str,
        configs: &[BankDocumentConfig],
    ) -> PortResult<()>;

    // --- Document Store ---
    async fn upload_document(&self, auth: &AuthSession, upload: DocumentUpload)
        -> PortResult<Document>;

    async fn delete_document(&self, auth: &AuthSession, document_id: &str) -> PortResult<()>;

    async fn download_document(&self, auth: &AuthSession, file_name: &str)
        -> PortResult<DownloadedFile>;

    // --- Comments ---
    async fn add_comment(&self, auth: &AuthSession, case_id: &str, text: &str) -> PortResult<()>;

    // --- Directory ---
    async fn list_banks(&self, auth: &AuthSession) -> PortResult<Vec<Bank>>;

    async fn list_banks_for_product(
        &self,
        auth: &AuthSession,
        product_name: &str,
    ) -> PortResult<Vec<Bank>>;

    async fn list_staff(&self, auth: &AuthSession) -> PortResult<Vec<StaffMember>>;
}
