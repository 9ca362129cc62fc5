//! crates/case_desk_core/src/domain.rs
//!
//! Defines the pure, core data structures for the case desk.
//! These structs are independent of the backend's wire format; adapters
//! convert their own records into these types.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::status::{BankStatus, CaseStatus};

/// Backend identifier of a case. The backend mixes numeric and string ids,
/// so ids are carried as opaque strings.
pub type CaseId = String;

//=========================================================================================
// Actors
//=========================================================================================

/// The role of the user acting on a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Operations,
    Kam,
    Telecaller,
    Underwriting,
    Banker,
    Client,
    Individual,
}

impl Role {
    /// Parses the role string stored in the dashboard's user details.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "operations" | "ops" => Some(Role::Operations),
            "kam" => Some(Role::Kam),
            "telecaller" => Some(Role::Telecaller),
            "underwriting" | "uw" => Some(Role::Underwriting),
            "banker" => Some(Role::Banker),
            "client" => Some(Role::Client),
            "individual" => Some(Role::Individual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Operations => "operations",
            Role::Kam => "kam",
            Role::Telecaller => "telecaller",
            Role::Underwriting => "underwriting",
            Role::Banker => "banker",
            Role::Client => "client",
            Role::Individual => "individual",
        }
    }

    /// Client and individual logins only ever see their own case.
    pub fn is_case_owner_role(&self) -> bool {
        matches!(self, Role::Client | Role::Individual)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller of one request: the bearer token forwarded to
/// the backend plus the user details the dashboard holds for it.
#[derive(Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: String,
    pub role: Role,
}

// The token must never end up in logs.
impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

//=========================================================================================
// Documents
//=========================================================================================

/// The category a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocType {
    PartA,
    PartB,
    OnePager,
    Provisional,
}

impl DocType {
    pub const ALL: [DocType; 4] = [
        DocType::PartA,
        DocType::PartB,
        DocType::OnePager,
        DocType::Provisional,
    ];

    /// The exact string the backend stores in `doctype`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::PartA => "partA",
            DocType::PartB => "partB",
            DocType::OnePager => "onePager",
            DocType::Provisional => "provisional",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        DocType::ALL.into_iter().find(|d| d.as_str() == raw)
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded file attached to a case.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub case_id: CaseId,
    pub docname: String,
    pub doctype: DocType,
    pub file_name: String,
    pub url: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Identifies one checklist item across categories. Its composite form
/// (`doctype_docname`) is the key of a bank's document configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentKey {
    pub doctype: DocType,
    pub docname: String,
}

impl DocumentKey {
    pub fn new(doctype: DocType, docname: impl Into<String>) -> Self {
        Self {
            doctype,
            docname: docname.into(),
        }
    }

    pub fn composite(&self) -> String {
        format!("{}_{}", self.doctype.as_str(), self.docname)
    }

    /// Splits a composite key at the first underscore. Document names may
    /// themselves contain underscores; doctypes never do.
    pub fn parse_composite(raw: &str) -> Option<Self> {
        let (doctype, docname) = raw.split_once('_')?;
        if docname.is_empty() {
            return None;
        }
        Some(Self::new(DocType::parse(doctype)?, docname))
    }
}

/// A per-case "other document" requirement defined by operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionalDocument {
    pub id: String,
    pub docname: String,
}

/// A file ready to be sent to the document store.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub case_id: CaseId,
    pub doctype: DocType,
    pub docname: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// A file received from the document store.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

//=========================================================================================
// Case and its children
//=========================================================================================

/// A staff member assigned to a case in a given role (KAM, telecaller...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub assigned_to_role: String,
    pub assigned_to_name: String,
    pub assigned_to_email: Option<String>,
}

/// A bank's required-document matrix for one case.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BankDocumentConfig {
    pub bank_id: String,
    pub bank_name: String,
    pub documents: BTreeMap<DocumentKey, bool>,
}

/// A bank attached to a case, with its own bank-local status.
#[derive(Debug, Clone, PartialEq)]
pub struct BankAssignment {
    pub bank_id: String,
    pub bank_name: String,
    pub status: BankStatus,
    pub document_config: BTreeMap<DocumentKey, bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub by: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Login created for the client or individual behind a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub username: String,
    pub password: Option<String>,
}

/// Which kind of client login to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Client,
    Individual,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::Client => "client",
            ClientKind::Individual => "individual",
        }
    }
}

/// A lead moving through the lending pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Case {
    pub id: CaseId,
    pub company_name: String,
    pub client_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub requirement_amount: Option<f64>,
    pub product_name: Option<String>,
    pub status: CaseStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub status_updated_on: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub documents: Vec<Document>,
    pub assignments: Vec<Assignment>,
    pub bank_assignments: Vec<BankAssignment>,
    pub comments: Vec<Comment>,
    /// The user id of the client login attached to this case, if any.
    pub client_user_id: Option<String>,
    pub client_credentials: Option<ClientCredentials>,
}

impl Case {
    pub fn bank_assignment(&self, bank_id: &str) -> Option<&BankAssignment> {
        self.bank_assignments.iter().find(|b| b.bank_id == bank_id)
    }

    pub fn document(&self, document_id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == document_id)
    }
}

/// The editable lead fields sent as one payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeadEdit {
    pub company_name: String,
    pub client_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub location: Option<String>,
    pub requirement_amount: Option<f64>,
    pub product_name: Option<String>,
    pub kam_email: Option<String>,
    pub telecaller_email: Option<String>,
}

/// Number of cases per status, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaseCounts {
    pub total: u64,
    pub by_status: BTreeMap<CaseStatus, u64>,
}

/// Which slice of the case list to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseQueue {
    #[default]
    All,
    Underwriting,
}

//=========================================================================================
// Directory data
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bank {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A KAM or telecaller that leads can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffMember {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
}
