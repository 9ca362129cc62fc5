//! crates/case_desk_core/src/workflow.rs
//!
//! The case status state machine.
//!
//! Two kinds of transition exist. Automatic ones are derived from the
//! checklist after every document upload or delete. Manual ones are picked by
//! operations and only validated here.

use crate::checklist::ChecklistReport;
use crate::domain::DocType;
use crate::status::CaseStatus;

/// The document mutation that triggered an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    Uploaded(DocType),
    Deleted(DocType),
}

impl DocumentEvent {
    pub fn doctype(&self) -> DocType {
        match self {
            DocumentEvent::Uploaded(d) | DocumentEvent::Deleted(d) => *d,
        }
    }
}

/// Why a requested status change was refused before reaching the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Case is already in status '{0}'")]
    SameStatus(CaseStatus),
    #[error("Case is closed with status '{0}'")]
    Terminal(CaseStatus),
    #[error("Status '{0}' cannot be selected manually")]
    NotSelectable(CaseStatus),
    #[error("Cannot move from '{from}' to '{to}'")]
    NotAllowed { from: CaseStatus, to: CaseStatus },
}

//=========================================================================================
// Automatic Transitions
//=========================================================================================

/// Every open status past the documentation stages. Losing a Part A
/// document in one of these sends the case back to documentation.
fn reverts_on_part_a_loss(current: CaseStatus) -> bool {
    !current.is_terminal()
        && !matches!(
            current,
            CaseStatus::Open
                | CaseStatus::MeetingDone
                | CaseStatus::DocumentationInitiated
                | CaseStatus::DocumentationInProgress
        )
}

/// Derives the status a case should move to after a document event, or `None`
/// when the current status is already consistent with its documents.
pub fn auto_transition(
    current: CaseStatus,
    report: &ChecklistReport,
    event: DocumentEvent,
) -> Option<CaseStatus> {
    let part_a = &report.part_a;

    let target = match event {
        DocumentEvent::Deleted(DocType::PartA)
            if !part_a.is_complete() && reverts_on_part_a_loss(current) =>
        {
            Some(CaseStatus::DocumentationInProgress)
        }
        DocumentEvent::Deleted(DocType::OnePager)
            if current == CaseStatus::OnePager && !report.one_pager_uploaded =>
        {
            Some(CaseStatus::Underwriting)
        }
        DocumentEvent::Uploaded(DocType::OnePager)
            if current == CaseStatus::Underwriting && report.one_pager_uploaded =>
        {
            Some(CaseStatus::OnePager)
        }
        _ => documentation_progress(current, report),
    };

    target.filter(|t| *t != current)
}

/// Forward movement through the documentation stages, driven by Part A.
fn documentation_progress(current: CaseStatus, report: &ChecklistReport) -> Option<CaseStatus> {
    let part_a = &report.part_a;
    match current {
        CaseStatus::MeetingDone
        | CaseStatus::DocumentationInitiated
        | CaseStatus::DocumentationInProgress
            if part_a.is_complete() =>
        {
            Some(CaseStatus::Underwriting)
        }
        CaseStatus::MeetingDone if part_a.is_started() => Some(CaseStatus::DocumentationInProgress),
        _ => None,
    }
}

//=========================================================================================
// Manual Transitions
//=========================================================================================

/// Validates a free-form status change picked from the status form.
///
/// `Documentation Initiated` is not on the form; it is only reachable by
/// hand from `Meeting Done`.
pub fn validate_manual_change(current: CaseStatus, target: CaseStatus) -> Result<(), TransitionError> {
    if current.is_terminal() {
        return Err(TransitionError::Terminal(current));
    }
    if current == target {
        return Err(TransitionError::SameStatus(current));
    }
    if target == CaseStatus::DocumentationInitiated {
        return if current == CaseStatus::MeetingDone {
            Ok(())
        } else {
            Err(TransitionError::NotAllowed {
                from: current,
                to: target,
            })
        };
    }
    if !target.is_manually_selectable() {
        return Err(TransitionError::NotSelectable(target));
    }
    Ok(())
}

/// Validates the two shortcuts offered on a fresh lead.
pub fn validate_open_shortcut(current: CaseStatus, target: CaseStatus) -> Result<(), TransitionError> {
    let allowed = current == CaseStatus::Open
        && matches!(target, CaseStatus::MeetingDone | CaseStatus::NoRequirement);
    if allowed {
        Ok(())
    } else {
        Err(TransitionError::NotAllowed {
            from: current,
            to: target,
        })
    }
}
