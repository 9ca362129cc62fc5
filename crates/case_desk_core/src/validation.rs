//! crates/case_desk_core/src/validation.rs
//!
//! Input checks that run before any backend call is issued.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{LeadEdit, ProvisionalDocument};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("'{0}' is already on the list")]
    Duplicate(String),
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[6-9][0-9]{9}$").expect("phone pattern is valid"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

fn required_text(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(())
    }
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    required_text(phone, "Phone number")?;
    if phone_pattern().is_match(phone.trim()) {
        Ok(())
    } else {
        Err(ValidationError::Invalid {
            field: "phone",
            reason: "expected a 10-digit mobile number".to_string(),
        })
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email_pattern().is_match(email.trim()) {
        Ok(())
    } else {
        Err(ValidationError::Invalid {
            field: "email",
            reason: format!("'{}' is not an email address", email),
        })
    }
}

/// Checks a lead edit payload; the first failing field is reported.
pub fn validate_lead_edit(edit: &LeadEdit) -> Result<(), ValidationError> {
    required_text(&edit.company_name, "Company name")?;
    required_text(&edit.client_name, "Client name")?;
    validate_phone(&edit.phone)?;

    if let Some(email) = edit.email.as_deref().filter(|e| !e.trim().is_empty()) {
        validate_email(email)?;
    }
    for (field, email) in [("kam_email", &edit.kam_email), ("telecaller_email", &edit.telecaller_email)] {
        if let Some(email) = email.as_deref().filter(|e| !e.trim().is_empty()) {
            validate_email(email).map_err(|_| ValidationError::Invalid {
                field,
                reason: format!("'{}' is not an email address", email),
            })?;
        }
    }
    if let Some(amount) = edit.requirement_amount {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(ValidationError::Invalid {
                field: "requirement_amount",
                reason: "must be a positive amount".to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_comment(text: &str) -> Result<(), ValidationError> {
    required_text(text, "Comment text")
}

/// A new other-document name must be non-blank and not already listed.
pub fn validate_provisional_name(
    name: &str,
    existing: &[ProvisionalDocument],
) -> Result<(), ValidationError> {
    required_text(name, "Document name")?;
    let name = name.trim();
    if existing.iter().any(|p| p.docname == name) {
        return Err(ValidationError::Duplicate(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit() -> LeadEdit {
        LeadEdit {
            company_name: "Acme Foods Pvt Ltd".to_string(),
            client_name: "Ravi Mehta".to_string(),
            phone: "9876543210".to_string(),
            email: Some("ravi@acme.example".to_string()),
            requirement_amount: Some(2_500_000.0),
            ..Default::default()
        }
    }

    #[test]
    fn valid_edit_passes() {
        assert_eq!(validate_lead_edit(&edit()), Ok(()));
    }

    #[test]
    fn missing_company_is_reported_first() {
        let mut e = edit();
        e.company_name = "  ".to_string();
        e.phone = "12".to_string();
        assert_eq!(
            validate_lead_edit(&e),
            Err(ValidationError::Required("Company name"))
        );
    }

    #[test]
    fn malformed_phone_numbers() {
        for phone in ["12345", "5876543210", "98765432101", "98765-43210"] {
            assert!(validate_phone(phone).is_err(), "{phone}");
        }
        assert!(validate_phone(" 7000000000 ").is_ok());
    }

    #[test]
    fn blank_optional_email_is_ignored() {
        let mut e = edit();
        e.email = Some(" ".to_string());
        assert!(validate_lead_edit(&e).is_ok());
        e.email = Some("not-an-email".to_string());
        assert!(matches!(
            validate_lead_edit(&e),
            Err(ValidationError::Invalid { field: "email", .. })
        ));
    }

    #[test]
    fn assignee_emails_are_checked() {
        let mut e = edit();
        e.kam_email = Some("kam at acme".to_string());
        assert!(matches!(
            validate_lead_edit(&e),
            Err(ValidationError::Invalid { field: "kam_email", .. })
        ));
    }

    #[test]
    fn amount_must_be_positive() {
        let mut e = edit();
        e.requirement_amount = Some(0.0);
        assert!(validate_lead_edit(&e).is_err());
        e.requirement_amount = Some(f64::NAN);
        assert!(validate_lead_edit(&e).is_err());
    }

    #[test]
    fn blank_comment_is_refused() {
        assert_eq!(
            validate_comment("\n  "),
            Err(ValidationError::Required("Comment text"))
        );
        assert!(validate_comment("Called the client").is_ok());
    }

    #[test]
    fn provisional_names_are_unique() {
        let existing = vec![ProvisionalDocument {
            id: "p1".to_string(),
            docname: "Rent Agreement".to_string(),
        }];
        assert_eq!(
            validate_provisional_name(" Rent Agreement ", &existing),
            Err(ValidationError::Duplicate("Rent Agreement".to_string()))
        );
        assert!(validate_provisional_name("rent agreement", &existing).is_ok());
        assert!(validate_provisional_name("", &existing).is_err());
    }
}
