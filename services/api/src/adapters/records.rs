//! services/api/src/adapters/records.rs
//!
//! Wire records of the lending backend and their conversion into domain types.
//!
//! The backend is loose about shapes: ids arrive as numbers or strings, lists
//! arrive bare or wrapped in an object, timestamps come in more than one
//! format. All of that is absorbed here so the rest of the service only sees
//! typed domain values.

use std::collections::{BTreeMap, HashMap};

use case_desk_core::domain::{
    Assignment, Bank, BankAssignment, BankDocumentConfig, Case, CaseCounts, ClientCredentials,
    Comment, DocType, Document, DocumentKey, ProvisionalDocument, StaffMember,
};
use case_desk_core::ports::{PortError, PortResult};
use case_desk_core::status::{BankStatus, CaseStatus};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

//=========================================================================================
// Field Helpers
//=========================================================================================

fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Value::deserialize(d)?;
    let shown = value.to_string();
    id_from_value(value).ok_or_else(|| D::Error::custom(format!("invalid id: {}", shown)))
}

pub(crate) fn de_opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.and_then(id_from_value))
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Unparseable timestamps are dropped rather than failing the whole record.
pub(crate) fn de_opt_time<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.and_then(|raw| {
        let parsed = parse_time(&raw);
        if parsed.is_none() {
            debug!(raw = %raw, "Ignoring unparseable timestamp");
        }
        parsed
    }))
}

pub(crate) fn de_opt_amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.replace(',', "").trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn unexpected(what: &str, e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(format!("{}: {}", what, e))
}

//=========================================================================================
// List Envelopes
//=========================================================================================

/// A list that arrives either bare or wrapped under one of several keys.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ListEnvelope<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(
            alias = "cases",
            alias = "documents",
            alias = "banks",
            alias = "users",
            alias = "configs",
            alias = "items"
        )]
        data: Vec<T>,
    },
}

impl<T> ListEnvelope<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            ListEnvelope::Bare(items) | ListEnvelope::Wrapped { data: items } => items,
        }
    }
}

/// A single object that arrives either bare or wrapped.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ItemEnvelope<T> {
    Wrapped {
        #[serde(
            alias = "case",
            alias = "document",
            alias = "credentials",
            alias = "user"
        )]
        data: T,
    },
    Bare(T),
}

impl<T> ItemEnvelope<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            ItemEnvelope::Wrapped { data } | ItemEnvelope::Bare(data) => data,
        }
    }
}

//=========================================================================================
// Case Records
//=========================================================================================

#[derive(Deserialize)]
pub(crate) struct CaseRecord {
    #[serde(alias = "caseid", alias = "_id", deserialize_with = "de_id")]
    id: String,
    #[serde(default, alias = "company_name")]
    companyname: Option<String>,
    #[serde(default, alias = "client_name")]
    clientname: Option<String>,
    #[serde(default, alias = "phonenumber", alias = "mobile")]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    requirement_amount: Option<f64>,
    #[serde(default, alias = "product_name")]
    productname: Option<String>,
    status: String,
    #[serde(default, deserialize_with = "de_opt_time")]
    createddate: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_opt_time")]
    updatedat: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_opt_time")]
    status_updated_on: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_opt_time")]
    assigneddate: Option<DateTime<Utc>>,
    #[serde(default)]
    documents: Option<Vec<DocumentRecord>>,
    #[serde(default)]
    assignments: Option<Vec<AssignmentRecord>>,
    #[serde(default)]
    bank_assignments: Option<Vec<BankAssignmentRecord>>,
    #[serde(default)]
    comments: Option<Vec<CommentRecord>>,
    #[serde(default, alias = "clientid", deserialize_with = "de_opt_id")]
    client_id: Option<String>,
    #[serde(default)]
    client_credentials: Option<ClientCredentialsRecord>,
}

impl CaseRecord {
    pub(crate) fn to_domain(self) -> PortResult<Case> {
        let status = CaseStatus::parse_legacy(&self.status)
            .map_err(|e| unexpected(&format!("case {}", self.id), e))?;
        let case_id = self.id;

        let documents = self
            .documents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|d| d.to_domain(&case_id))
            .collect();

        let mut bank_assignments: Vec<BankAssignment> = Vec::new();
        for record in self.bank_assignments.unwrap_or_default() {
            let assignment = record.to_domain();
            if bank_assignments.iter().any(|b| b.bank_id == assignment.bank_id) {
                warn!(case_id = %case_id, bank_id = %assignment.bank_id, "Duplicate bank assignment ignored");
                continue;
            }
            bank_assignments.push(assignment);
        }

        Ok(Case {
            company_name: self.companyname.unwrap_or_default(),
            client_name: self.clientname.unwrap_or_default(),
            phone: self.phone,
            email: self.email,
            location: self.location,
            requirement_amount: self.requirement_amount,
            product_name: self.productname,
            status,
            created_at: self.createddate,
            updated_at: self.updatedat,
            status_updated_on: self.status_updated_on,
            assigned_at: self.assigneddate,
            documents,
            assignments: self
                .assignments
                .unwrap_or_default()
                .into_iter()
                .map(AssignmentRecord::to_domain)
                .collect(),
            bank_assignments,
            comments: self
                .comments
                .unwrap_or_default()
                .into_iter()
                .map(CommentRecord::to_domain)
                .collect(),
            client_user_id: self.client_id,
            client_credentials: self.client_credentials.map(ClientCredentialsRecord::to_domain),
            id: case_id,
        })
    }
}

#[derive(Deserialize)]
pub(crate) struct DocumentRecord {
    #[serde(alias = "docid", alias = "_id", deserialize_with = "de_id")]
    id: String,
    docname: String,
    doctype: String,
    #[serde(default, alias = "file_name", alias = "filepath")]
    filename: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(
        default,
        alias = "uploaded_at",
        alias = "createdat",
        deserialize_with = "de_opt_time"
    )]
    uploadedat: Option<DateTime<Utc>>,
}

impl DocumentRecord {
    /// Documents of an unknown category are left out of the case.
    pub(crate) fn to_domain(self, case_id: &str) -> Option<Document> {
        let Some(doctype) = DocType::parse(&self.doctype) else {
            warn!(case_id, doctype = %self.doctype, docname = %self.docname, "Skipping document of unknown type");
            return None;
        };
        Some(Document {
            file_name: self.filename.unwrap_or_else(|| self.docname.clone()),
            id: self.id,
            case_id: case_id.to_string(),
            docname: self.docname,
            doctype,
            url: self.url,
            uploaded_at: self.uploadedat,
        })
    }
}

#[derive(Deserialize)]
pub(crate) struct AssignmentRecord {
    #[serde(default)]
    assigned_to_role: String,
    #[serde(default)]
    assigned_to_name: String,
    #[serde(default)]
    assigned_to_email: Option<String>,
}

impl AssignmentRecord {
    fn to_domain(self) -> Assignment {
        Assignment {
            assigned_to_role: self.assigned_to_role,
            assigned_to_name: self.assigned_to_name,
            assigned_to_email: self.assigned_to_email,
        }
    }
}

/// Document configurations are stored as a JSON object, or as that object
/// serialized into a string by older writers.
fn config_map(value: Option<Value>) -> BTreeMap<DocumentKey, bool> {
    let object = match value {
        Some(Value::Object(map)) => map,
        Some(Value::String(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            _ => return BTreeMap::new(),
        },
        _ => return BTreeMap::new(),
    };
    object
        .into_iter()
        .filter_map(|(key, flag)| {
            let key = DocumentKey::parse_composite(&key)?;
            let flag = match flag {
                Value::Bool(b) => b,
                Value::Number(n) => n.as_i64() == Some(1),
                _ => false,
            };
            Some((key, flag))
        })
        .collect()
}

#[derive(Deserialize)]
pub(crate) struct BankAssignmentRecord {
    #[serde(alias = "bank_id", deserialize_with = "de_id")]
    bankid: String,
    #[serde(default, alias = "bankname")]
    bank_name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    document_config: Option<Value>,
}

impl BankAssignmentRecord {
    fn to_domain(self) -> BankAssignment {
        let status = match self.status.as_deref() {
            None | Some("") => BankStatus::default(),
            Some(raw) => BankStatus::parse_legacy(raw).unwrap_or_else(|e| {
                warn!(bank_id = %self.bankid, error = %e, "Unknown bank status, treating as open");
                BankStatus::default()
            }),
        };
        BankAssignment {
            bank_name: self.bank_name.unwrap_or_default(),
            status,
            document_config: config_map(self.document_config),
            bank_id: self.bankid,
        }
    }

    pub(crate) fn to_config(self) -> BankDocumentConfig {
        BankDocumentConfig {
            bank_name: self.bank_name.unwrap_or_default(),
            documents: config_map(self.document_config),
            bank_id: self.bankid,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct CommentRecord {
    #[serde(default, alias = "commentby")]
    by: Option<String>,
    #[serde(default, alias = "comment")]
    text: String,
    #[serde(default, alias = "createdat", deserialize_with = "de_opt_time")]
    created_at: Option<DateTime<Utc>>,
}

impl CommentRecord {
    fn to_domain(self) -> Comment {
        Comment {
            by: self.by.unwrap_or_default(),
            text: self.text,
            created_at: self.created_at,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct ClientCredentialsRecord {
    #[serde(alias = "email", alias = "userid")]
    username: String,
    #[serde(default)]
    password: Option<String>,
}

impl ClientCredentialsRecord {
    pub(crate) fn to_domain(self) -> ClientCredentials {
        ClientCredentials {
            username: self.username,
            password: self.password,
        }
    }
}

/// Counts arrive as one object: a number per status plus an optional total.
pub(crate) fn counts_from_value(value: Value) -> PortResult<CaseCounts> {
    let Value::Object(map) = value else {
        return Err(unexpected("case counts", "expected an object"));
    };
    let mut counts = CaseCounts::default();
    let mut total = None;
    for (key, count) in map {
        let Some(count) = count.as_u64() else {
            continue;
        };
        if key.eq_ignore_ascii_case("total") {
            total = Some(count);
            continue;
        }
        match CaseStatus::parse_legacy(&key) {
            Ok(status) => *counts.by_status.entry(status).or_insert(0) += count,
            Err(_) => debug!(key = %key, "Ignoring count for unknown status"),
        }
    }
    counts.total = total.unwrap_or_else(|| counts.by_status.values().sum());
    Ok(counts)
}

//=========================================================================================
// Directory Records
//=========================================================================================

#[derive(Deserialize)]
pub(crate) struct ProvisionalRecord {
    #[serde(alias = "docid", alias = "_id", deserialize_with = "de_id")]
    id: String,
    #[serde(alias = "name")]
    docname: String,
}

impl ProvisionalRecord {
    pub(crate) fn to_domain(self) -> ProvisionalDocument {
        ProvisionalDocument {
            id: self.id,
            docname: self.docname,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct BankRecord {
    #[serde(alias = "bankid", alias = "_id", deserialize_with = "de_id")]
    id: String,
    #[serde(alias = "bank_name", alias = "bankname")]
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, alias = "phonenumber")]
    phone: Option<String>,
}

impl BankRecord {
    pub(crate) fn to_domain(self) -> Bank {
        Bank {
            id: self.id,
            name: self.name,
            email: self.email,
            phone: self.phone,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct StaffRecord {
    #[serde(alias = "userid", alias = "_id", deserialize_with = "de_id")]
    id: String,
    #[serde(alias = "username")]
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: String,
}

impl StaffRecord {
    pub(crate) fn to_domain(self) -> StaffMember {
        StaffMember {
            id: self.id,
            name: self.name,
            email: self.email,
            role: self.role,
        }
    }
}

/// Staff arrive as one list, or split by role.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum StaffEnvelope {
    List(ListEnvelope<StaffRecord>),
    ByRole {
        #[serde(default, alias = "kam")]
        kams: Vec<StaffRecord>,
        #[serde(default, alias = "telecaller")]
        telecallers: Vec<StaffRecord>,
    },
}

impl StaffEnvelope {
    pub(crate) fn into_domain(self) -> Vec<StaffMember> {
        match self {
            StaffEnvelope::ByRole { kams, telecallers } => {
                let tag = |role: &str, records: Vec<StaffRecord>| {
                    let role = role.to_string();
                    records.into_iter().map(move |r| {
                        let mut member = r.to_domain();
                        if member.role.is_empty() {
                            member.role = role.clone();
                        }
                        member
                    })
                };
                tag("KAM", kams).chain(tag("Telecaller", telecallers)).collect()
            }
            StaffEnvelope::List(list) => list
                .into_vec()
                .into_iter()
                .map(StaffRecord::to_domain)
                .collect(),
        }
    }
}

//=========================================================================================
// Request Bodies
//=========================================================================================

#[derive(Serialize)]
pub(crate) struct StatusBody<'a> {
    pub status: &'a str,
}

#[derive(Serialize)]
pub(crate) struct WorkflowBody<'a> {
    pub caseid: &'a str,
    pub stage: &'a str,
}

#[derive(Serialize)]
pub(crate) struct CommentBody<'a> {
    pub caseid: &'a str,
    pub text: &'a str,
}

#[derive(Serialize)]
pub(crate) struct GenerateClientBody<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
}

#[derive(Serialize)]
pub(crate) struct ProvisionalBody<'a> {
    pub docname: &'a str,
}

#[derive(Serialize)]
pub(crate) struct LeadEditBody<'a> {
    pub companyname: &'a str,
    pub clientname: &'a str,
    pub phone: &'a str,
    pub email: Option<&'a str>,
    pub location: Option<&'a str>,
    pub requirement_amount: Option<f64>,
    pub productname: Option<&'a str>,
    pub kam_email: Option<&'a str>,
    pub telecaller_email: Option<&'a str>,
}

#[derive(Serialize)]
pub(crate) struct BankConfigBody {
    pub bankid: String,
    pub bank_name: String,
    pub document_config: HashMap<String, bool>,
}

impl From<&BankDocumentConfig> for BankConfigBody {
    fn from(config: &BankDocumentConfig) -> Self {
        Self {
            bankid: config.bank_id.clone(),
            bank_name: config.bank_name.clone(),
            document_config: config
                .documents
                .iter()
                .map(|(key, flag)| (key.composite(), *flag))
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct DocumentConfigBody {
    pub banks: Vec<BankConfigBody>,
}
