pub mod actions;
pub mod bank_config;
pub mod checklist;
pub mod domain;
pub mod flow;
pub mod ports;
pub mod status;
pub mod validation;
pub mod workflow;

pub use actions::{permitted_actions, CaseAction, Forbidden};
pub use bank_config::{BankAssignmentDraft, BankConfigError};
pub use checklist::{ChecklistReport, RequiredDocuments};
pub use domain::{
    AuthSession, Bank, BankAssignment, BankDocumentConfig, Case, CaseCounts, CaseId, CaseQueue,
    ClientCredentials, ClientKind, DocType, Document, DocumentKey, DocumentUpload, DownloadedFile,
    LeadEdit, ProvisionalDocument, Role, StaffMember,
};
pub use flow::{
    CaseFlow, CaseView, FailedUpload, FlowError, FlowResult, PendingFile, TransitionOutcome,
};
pub use ports::{CaseBackend, PortError, PortResult};
pub use status::{BankStatus, CaseStatus, UnknownStatus};
pub use validation::ValidationError;
pub use workflow::{DocumentEvent, TransitionError};
