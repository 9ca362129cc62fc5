//! crates/case_desk_core/src/status.rs
//!
//! The closed set of case statuses and bank-local statuses.
//!
//! Statuses travel as free text on the wire. Every comparison in the crate goes
//! through the enums below; the string forms only exist at the edges.

use std::fmt;
use std::str::FromStr;

/// A status string that matches none of the known values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown status: '{0}'")]
pub struct UnknownStatus(pub String);

//=========================================================================================
// Case Status
//=========================================================================================

/// Where a case currently sits in the lending pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CaseStatus {
    #[default]
    Open,
    MeetingDone,
    NoRequirement,
    DocumentationInitiated,
    DocumentationInProgress,
    Underwriting,
    OnePager,
    BankerReview,
    Rejected,
    Login,
    Pd,
    Sanctioned,
    Disbursed,
    Done,
    Closed,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 15] = [
        CaseStatus::Open,
        CaseStatus::MeetingDone,
        CaseStatus::NoRequirement,
        CaseStatus::DocumentationInitiated,
        CaseStatus::DocumentationInProgress,
        CaseStatus::Underwriting,
        CaseStatus::OnePager,
        CaseStatus::BankerReview,
        CaseStatus::Rejected,
        CaseStatus::Login,
        CaseStatus::Pd,
        CaseStatus::Sanctioned,
        CaseStatus::Disbursed,
        CaseStatus::Done,
        CaseStatus::Closed,
    ];

    /// Targets offered by the free-form status change form, in form order.
    pub const MANUAL_TARGETS: [CaseStatus; 11] = [
        CaseStatus::MeetingDone,
        CaseStatus::DocumentationInProgress,
        CaseStatus::Underwriting,
        CaseStatus::OnePager,
        CaseStatus::NoRequirement,
        CaseStatus::Rejected,
        CaseStatus::Login,
        CaseStatus::Pd,
        CaseStatus::Sanctioned,
        CaseStatus::Disbursed,
        CaseStatus::Done,
    ];

    /// The canonical string sent to the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "Open",
            CaseStatus::MeetingDone => "Meeting Done",
            CaseStatus::NoRequirement => "No Requirement",
            CaseStatus::DocumentationInitiated => "Documentation Initiated",
            CaseStatus::DocumentationInProgress => "Documentation In Progress",
            CaseStatus::Underwriting => "Underwriting",
            CaseStatus::OnePager => "One Pager",
            CaseStatus::BankerReview => "Banker Review",
            CaseStatus::Rejected => "Rejected",
            CaseStatus::Login => "Login",
            CaseStatus::Pd => "PD",
            CaseStatus::Sanctioned => "Sanctioned",
            CaseStatus::Disbursed => "Disbursed",
            CaseStatus::Done => "Done",
            CaseStatus::Closed => "Closed",
        }
    }

    /// Parses a canonical status string, or one of the two historical
    /// aliases (`DISBURSEMENT`, `Completed`). Matching is exact.
    pub fn parse(raw: &str) -> Result<Self, UnknownStatus> {
        if let Some(status) = CaseStatus::ALL.into_iter().find(|s| s.as_str() == raw) {
            return Ok(status);
        }
        match raw {
            "DISBURSEMENT" => Ok(CaseStatus::Disbursed),
            "Completed" => Ok(CaseStatus::Done),
            _ => Err(UnknownStatus(raw.to_string())),
        }
    }

    /// Parses a status stored by older code paths that did not preserve
    /// casing or whitespace. Only used when decoding backend records.
    pub fn parse_legacy(raw: &str) -> Result<Self, UnknownStatus> {
        let trimmed = raw.trim();
        if let Ok(status) = CaseStatus::parse(trimmed) {
            return Ok(status);
        }
        let folded = trimmed.to_ascii_lowercase();
        let found = CaseStatus::ALL
            .into_iter()
            .find(|s| s.as_str().to_ascii_lowercase() == folded)
            .or(match folded.as_str() {
                "disbursement" => Some(CaseStatus::Disbursed),
                "completed" => Some(CaseStatus::Done),
                _ => None,
            });
        match found {
            Some(status) => {
                tracing::warn!(raw, canonical = status.as_str(), "Non-canonical case status");
                Ok(status)
            }
            None => Err(UnknownStatus(raw.to_string())),
        }
    }

    /// The single comparison used against free text.
    pub fn matches(&self, raw: &str) -> bool {
        CaseStatus::parse(raw).map(|s| s == *self).unwrap_or(false)
    }

    /// No further transitions are offered from these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaseStatus::NoRequirement | CaseStatus::Rejected | CaseStatus::Done | CaseStatus::Closed
        )
    }

    pub fn is_manually_selectable(&self) -> bool {
        CaseStatus::MANUAL_TARGETS.contains(self)
    }

    /// Stages in which banks can be assigned to the case.
    pub fn accepts_banker_assignment(&self) -> bool {
        matches!(self, CaseStatus::OnePager | CaseStatus::BankerReview)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaseStatus::parse(s)
    }
}

//=========================================================================================
// Bank Status
//=========================================================================================

/// A bank's own view of a case, set by the banker. Never derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BankStatus {
    #[default]
    Open,
    Accept,
    Rejected,
    Login,
    Pd,
    Sanctioned,
    Disbursement,
    Done,
}

impl BankStatus {
    pub const ALL: [BankStatus; 8] = [
        BankStatus::Open,
        BankStatus::Accept,
        BankStatus::Rejected,
        BankStatus::Login,
        BankStatus::Pd,
        BankStatus::Sanctioned,
        BankStatus::Disbursement,
        BankStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BankStatus::Open => "OPEN",
            BankStatus::Accept => "ACCEPT",
            BankStatus::Rejected => "REJECTED",
            BankStatus::Login => "LOGIN",
            BankStatus::Pd => "PD",
            BankStatus::Sanctioned => "SANCTIONED",
            BankStatus::Disbursement => "DISBURSEMENT",
            BankStatus::Done => "DONE",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, UnknownStatus> {
        BankStatus::ALL
            .into_iter()
            .find(|s| s.as_str() == raw)
            .ok_or_else(|| UnknownStatus(raw.to_string()))
    }

    /// Older bank assignments were stored in mixed case.
    pub fn parse_legacy(raw: &str) -> Result<Self, UnknownStatus> {
        BankStatus::parse(&raw.trim().to_ascii_uppercase())
            .map_err(|_| UnknownStatus(raw.to_string()))
    }
}

impl fmt::Display for BankStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BankStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BankStatus::parse(s)
    }
}
