//! crates/case_desk_core/src/bank_config.rs
//!
//! Bank assignment for a case and each bank's required-document matrix.
//!
//! A draft lives only for one editing session. Removing a bank drops its
//! matrix for good; adding it back starts from an empty matrix.

use std::collections::BTreeMap;

use crate::checklist::RequiredDocuments;
use crate::domain::{Bank, BankDocumentConfig, CaseId, DocumentKey};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BankConfigError {
    #[error("Bank {0} is not assigned to this case")]
    UnknownBank(String),
    #[error("Bank {0} is already assigned to this case")]
    DuplicateBank(String),
    #[error("Document '{0}' is not on this case's checklist")]
    UnknownDocument(String),
}

/// In-memory editing state for the banks of one case.
#[derive(Debug, Clone)]
pub struct BankAssignmentDraft {
    case_id: CaseId,
    universe: Vec<DocumentKey>,
    banks: BTreeMap<String, BankDocumentConfig>,
}

impl BankAssignmentDraft {
    /// Starts an empty draft whose matrices range over `required`.
    pub fn new(case_id: impl Into<CaseId>, required: &RequiredDocuments) -> Self {
        Self {
            case_id: case_id.into(),
            universe: required.keys(),
            banks: BTreeMap::new(),
        }
    }

    /// Starts from the configuration saved on the backend. Saved entries for
    /// documents no longer on the checklist are dropped.
    pub fn from_saved(
        case_id: impl Into<CaseId>,
        required: &RequiredDocuments,
        saved: Vec<BankDocumentConfig>,
    ) -> Self {
        let mut draft = Self::new(case_id, required);
        for config in saved {
            let mut documents = draft.empty_matrix();
            for (key, value) in config.documents {
                match documents.get_mut(&key) {
                    Some(slot) => *slot = value,
                    None => tracing::debug!(
                        case_id = %draft.case_id,
                        key = %key.composite(),
                        "Dropping saved config for document no longer required"
                    ),
                }
            }
            draft.banks.insert(
                config.bank_id.clone(),
                BankDocumentConfig {
                    documents,
                    ..config
                },
            );
        }
        draft
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    fn empty_matrix(&self) -> BTreeMap<DocumentKey, bool> {
        self.universe.iter().map(|k| (k.clone(), false)).collect()
    }

    /// Assigns a bank with nothing required yet.
    pub fn add_bank(&mut self, bank: &Bank) -> Result<(), BankConfigError> {
        if self.banks.contains_key(&bank.id) {
            return Err(BankConfigError::DuplicateBank(bank.id.clone()));
        }
        let config = BankDocumentConfig {
            bank_id: bank.id.clone(),
            bank_name: bank.name.clone(),
            documents: self.empty_matrix(),
        };
        self.banks.insert(bank.id.clone(), config);
        Ok(())
    }

    /// Unassigns a bank and discards its matrix. Returns whether it was there.
    pub fn remove_bank(&mut self, bank_id: &str) -> bool {
        self.banks.remove(bank_id).is_some()
    }

    pub fn is_assigned(&self, bank_id: &str) -> bool {
        self.banks.contains_key(bank_id)
    }

    pub fn assigned_bank_ids(&self) -> Vec<&str> {
        self.banks.keys().map(|k| k.as_str()).collect()
    }

    pub fn set(
        &mut self,
        bank_id: &str,
        key: &DocumentKey,
        required: bool,
    ) -> Result<(), BankConfigError> {
        let slot = self.slot(bank_id, key)?;
        *slot = required;
        Ok(())
    }

    /// Flips one checkbox and returns its new value.
    pub fn toggle(&mut self, bank_id: &str, key: &DocumentKey) -> Result<bool, BankConfigError> {
        let slot = self.slot(bank_id, key)?;
        *slot = !*slot;
        Ok(*slot)
    }

    pub fn is_required(&self, bank_id: &str, key: &DocumentKey) -> Option<bool> {
        self.banks.get(bank_id)?.documents.get(key).copied()
    }

    fn slot(&mut self, bank_id: &str, key: &DocumentKey) -> Result<&mut bool, BankConfigError> {
        let config = self
            .banks
            .get_mut(bank_id)
            .ok_or_else(|| BankConfigError::UnknownBank(bank_id.to_string()))?;
        config
            .documents
            .get_mut(key)
            .ok_or_else(|| BankConfigError::UnknownDocument(key.composite()))
    }

    /// The batch sent on save: every assigned bank with its full matrix.
    pub fn payload(&self) -> Vec<BankDocumentConfig> {
        self.banks.values().cloned().collect()
    }
}

/// Filters banks by a case-insensitive substring of name, email or phone.
/// A blank query returns every bank.
pub fn search_banks<'a>(banks: &'a [Bank], query: &str) -> Vec<&'a Bank> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return banks.iter().collect();
    }
    banks
        .iter()
        .filter(|bank| {
            [Some(&bank.name), bank.email.as_ref(), bank.phone.as_ref()]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}
