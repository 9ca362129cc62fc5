//! crates/case_desk_core/src/actions.rs
//!
//! Resolves which actions a user may take on a case, from the case status and
//! the user's role. The resolver only gates; it never mutates anything.

use std::fmt;

use crate::domain::{AuthSession, Case, Role};
use crate::status::CaseStatus;

/// Everything a user can do on a case, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CaseAction {
    View,
    MarkMeetingDone,
    MarkNoRequirement,
    AssignBanker,
    ManageOtherDocuments,
    ChangeStatus,
    GenerateClientCredentials,
    CopyClientCredentials,
    EditLead,
    UpdateBankStatus,
    UploadDocuments,
    DeleteDocuments,
    Comment,
}

impl CaseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseAction::View => "view",
            CaseAction::MarkMeetingDone => "mark_meeting_done",
            CaseAction::MarkNoRequirement => "mark_no_requirement",
            CaseAction::AssignBanker => "assign_banker",
            CaseAction::ManageOtherDocuments => "manage_other_documents",
            CaseAction::ChangeStatus => "change_status",
            CaseAction::GenerateClientCredentials => "generate_client_credentials",
            CaseAction::CopyClientCredentials => "copy_client_credentials",
            CaseAction::EditLead => "edit_lead",
            CaseAction::UpdateBankStatus => "update_bank_status",
            CaseAction::UploadDocuments => "upload_documents",
            CaseAction::DeleteDocuments => "delete_documents",
            CaseAction::Comment => "comment",
        }
    }
}

impl fmt::Display for CaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller asked for an action the resolver does not offer them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Role '{role}' may not {action} on case {case_id} in status '{status}'")]
pub struct Forbidden {
    pub role: Role,
    pub action: CaseAction,
    pub case_id: String,
    pub status: CaseStatus,
}

/// Other documents are not managed before the meeting or after a rejection.
fn other_documents_open(status: CaseStatus) -> bool {
    !matches!(status, CaseStatus::Open | CaseStatus::Rejected)
}

/// Returns the permitted actions for `session` on `case`, in display order.
pub fn permitted_actions(case: &Case, session: &AuthSession) -> Vec<CaseAction> {
    let status = case.status;
    let mut actions = Vec::new();
    let mut allow = |cond: bool, action: CaseAction| {
        if cond {
            actions.push(action);
        }
    };

    match session.role {
        Role::Operations => {
            let has_client = case.client_credentials.is_some();
            allow(true, CaseAction::View);
            allow(status == CaseStatus::Open, CaseAction::MarkMeetingDone);
            allow(status == CaseStatus::Open, CaseAction::MarkNoRequirement);
            allow(status.accepts_banker_assignment(), CaseAction::AssignBanker);
            allow(other_documents_open(status), CaseAction::ManageOtherDocuments);
            allow(!status.is_terminal(), CaseAction::ChangeStatus);
            allow(!has_client, CaseAction::GenerateClientCredentials);
            allow(has_client, CaseAction::CopyClientCredentials);
            allow(true, CaseAction::EditLead);
            allow(true, CaseAction::UploadDocuments);
            allow(true, CaseAction::DeleteDocuments);
            allow(true, CaseAction::Comment);
        }
        Role::Kam | Role::Telecaller => {
            allow(true, CaseAction::View);
            allow(true, CaseAction::EditLead);
            allow(true, CaseAction::Comment);
        }
        Role::Underwriting => {
            allow(true, CaseAction::View);
            allow(true, CaseAction::UploadDocuments);
            allow(true, CaseAction::DeleteDocuments);
            allow(true, CaseAction::Comment);
        }
        Role::Banker => {
            allow(true, CaseAction::View);
            allow(other_documents_open(status), CaseAction::ManageOtherDocuments);
            allow(true, CaseAction::UpdateBankStatus);
            allow(true, CaseAction::Comment);
        }
        Role::Client | Role::Individual => {
            let own = case.client_user_id.as_deref() == Some(session.user_id.as_str());
            allow(own, CaseAction::View);
            allow(own, CaseAction::UploadDocuments);
            allow(own, CaseAction::DeleteDocuments);
        }
    }

    actions
}

pub fn is_permitted(case: &Case, session: &AuthSession, action: CaseAction) -> bool {
    permitted_actions(case, session).contains(&action)
}

/// Fails with [`Forbidden`] unless the action is offered to the caller.
pub fn require(case: &Case, session: &AuthSession, action: CaseAction) -> Result<(), Forbidden> {
    if is_permitted(case, session, action) {
        Ok(())
    } else {
        Err(Forbidden {
            role: session.role,
            action,
            case_id: case.id.clone(),
            status: case.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClientCredentials;

    fn case(status: CaseStatus) -> Case {
        Case {
            id: "c1".to_string(),
            company_name: "Acme Foods".to_string(),
            client_name: "R. Mehta".to_string(),
            phone: None,
            email: None,
            location: None,
            requirement_amount: None,
            product_name: None,
            status,
            created_at: None,
            updated_at: None,
            status_updated_on: None,
            assigned_at: None,
            documents: vec![],
            assignments: vec![],
            bank_assignments: vec![],
            comments: vec![],
            client_user_id: Some("client-7".to_string()),
            client_credentials: None,
        }
    }

    fn session(role: Role, user_id: &str) -> AuthSession {
        AuthSession {
            token: "t".to_string(),
            user_id: user_id.to_string(),
            role,
        }
    }

    #[test]
    fn banker_other_documents_depend_on_status() {
        let banker = session(Role::Banker, "b1");
        assert!(!is_permitted(
            &case(CaseStatus::Open),
            &banker,
            CaseAction::ManageOtherDocuments
        ));
        assert!(!is_permitted(
            &case(CaseStatus::Rejected),
            &banker,
            CaseAction::ManageOtherDocuments
        ));
        assert!(is_permitted(
            &case(CaseStatus::OnePager),
            &banker,
            CaseAction::ManageOtherDocuments
        ));
    }

    #[test]
    fn banker_never_changes_case_status() {
        let banker = session(Role::Banker, "b1");
        for status in CaseStatus::ALL {
            let actions = permitted_actions(&case(status), &banker);
            assert!(!actions.contains(&CaseAction::ChangeStatus));
            assert!(actions.contains(&CaseAction::UpdateBankStatus));
        }
    }

    #[test]
    fn assign_banker_only_in_banker_stages() {
        let ops = session(Role::Operations, "o1");
        for status in CaseStatus::ALL {
            let expected = matches!(status, CaseStatus::OnePager | CaseStatus::BankerReview);
            assert_eq!(
                is_permitted(&case(status), &ops, CaseAction::AssignBanker),
                expected,
                "{status}"
            );
        }
    }

    #[test]
    fn open_case_offers_shortcuts_to_operations() {
        let actions = permitted_actions(&case(CaseStatus::Open), &session(Role::Operations, "o1"));
        assert_eq!(
            &actions[..4],
            &[
                CaseAction::View,
                CaseAction::MarkMeetingDone,
                CaseAction::MarkNoRequirement,
                CaseAction::ChangeStatus
            ]
        );
    }

    #[test]
    fn terminal_case_has_no_status_change() {
        let ops = session(Role::Operations, "o1");
        assert!(!is_permitted(&case(CaseStatus::Done), &ops, CaseAction::ChangeStatus));
    }

    #[test]
    fn client_credentials_generate_or_copy() {
        let ops = session(Role::Operations, "o1");
        let mut c = case(CaseStatus::Underwriting);
        assert!(is_permitted(&c, &ops, CaseAction::GenerateClientCredentials));
        assert!(!is_permitted(&c, &ops, CaseAction::CopyClientCredentials));

        c.client_credentials = Some(ClientCredentials {
            username: "acme".to_string(),
            password: None,
        });
        assert!(!is_permitted(&c, &ops, CaseAction::GenerateClientCredentials));
        assert!(is_permitted(&c, &ops, CaseAction::CopyClientCredentials));
    }

    #[test]
    fn kam_edits_but_never_changes_status() {
        let kam = session(Role::Kam, "k1");
        let actions = permitted_actions(&case(CaseStatus::Open), &kam);
        assert_eq!(
            actions,
            vec![CaseAction::View, CaseAction::EditLead, CaseAction::Comment]
        );
    }

    #[test]
    fn clients_only_act_on_their_own_case() {
        let owner = session(Role::Client, "client-7");
        let stranger = session(Role::Individual, "client-8");
        let c = case(CaseStatus::DocumentationInProgress);

        assert_eq!(
            permitted_actions(&c, &owner),
            vec![
                CaseAction::View,
                CaseAction::UploadDocuments,
                CaseAction::DeleteDocuments
            ]
        );
        assert!(permitted_actions(&c, &stranger).is_empty());
    }

    #[test]
    fn require_reports_the_refused_action() {
        let err = require(
            &case(CaseStatus::Open),
            &session(Role::Kam, "k1"),
            CaseAction::ChangeStatus,
        )
        .unwrap_err();
        assert_eq!(err.action, CaseAction::ChangeStatus);
        assert_eq!(err.status, CaseStatus::Open);
    }
}
