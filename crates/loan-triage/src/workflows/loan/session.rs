use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicantId, CaseState, DecisionResult, LoanProfile, ProfileField, RiskReport,
};

/// Fatal state-machine violation. An illegal transition (e.g. an approved
/// case re-entering decisioning) aborts the turn and hands the case to a
/// human; the core never attempts automatic repair.
#[derive(Debug, thiserror::Error)]
#[error("illegal case state transition {from:?} -> {to:?}")]
pub struct StateCorrupted {
    pub from: CaseState,
    pub to: CaseState,
}

/// Per-application conversational state: the mutable profile, the state
/// machine position, and the ephemeral artifacts of the current case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSession {
    pub identity: ApplicantId,
    pub profile: LoanProfile,
    pub state: CaseState,
    pub latest_report: Option<RiskReport>,
    pub decision: Option<DecisionResult>,
}

impl CaseSession {
    pub fn new(identity: ApplicantId) -> Self {
        let profile = LoanProfile {
            identity: Some(identity.0.clone()),
            ..LoanProfile::default()
        };
        Self {
            identity,
            profile,
            state: CaseState::Collecting,
            latest_report: None,
            decision: None,
        }
    }

    /// Move the state machine, validating the edge against the transition
    /// table. Terminal states accept no further transitions.
    pub fn transition(&mut self, to: CaseState) -> Result<(), StateCorrupted> {
        if self.state == to {
            return Ok(());
        }
        if !transition_allowed(self.state, to) {
            return Err(StateCorrupted {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

fn transition_allowed(from: CaseState, to: CaseState) -> bool {
    use CaseState::*;
    match from {
        Collecting => matches!(to, ReadyForRouting),
        ReadyForRouting => matches!(to, Collecting | PendingVerification),
        PendingVerification => matches!(to, Verified | Mismatch | Escalated),
        Verified => matches!(to, Deciding),
        Mismatch => matches!(to, Collecting),
        Deciding => matches!(to, Approved | Rejected | Escalated),
        Approved | Rejected | Escalated => false,
    }
}

/// Malformed field update, recovered locally by asking the applicant again.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("field {field:?} rejected: {reason}")]
    InvalidField {
        field: ProfileField,
        reason: String,
    },
}

/// Partial profile produced by the external extraction collaborator. `None`
/// leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub job: Option<String>,
    pub company: Option<String>,
    pub monthly_income: Option<u64>,
    pub amount: Option<u64>,
    pub purpose: Option<String>,
    pub term_months: Option<u32>,
    pub annual_rate: Option<f64>,
}

impl ProfileUpdate {
    /// Validate the update and merge it into the profile. All-or-nothing:
    /// validation runs before the first field is written.
    pub fn apply(self, profile: &mut LoanProfile) -> Result<(), ValidationError> {
        self.validate()?;

        merge_text(&mut profile.name, self.name);
        merge_text(&mut profile.phone, self.phone);
        merge_text(&mut profile.job, self.job);
        merge_text(&mut profile.company, self.company);
        merge_text(&mut profile.purpose, self.purpose);
        if let Some(income) = self.monthly_income {
            profile.monthly_income = Some(income);
        }
        if let Some(amount) = self.amount {
            profile.amount = Some(amount);
        }
        if let Some(term) = self.term_months {
            profile.term_months = Some(term);
        }
        if let Some(rate) = self.annual_rate {
            profile.annual_rate = Some(rate);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: ProfileField::Name,
                    reason: "name must not be blank".to_string(),
                });
            }
        }
        if let Some(phone) = &self.phone {
            let digits = phone.chars().filter(char::is_ascii_digit).count();
            if digits < 8 {
                return Err(ValidationError::InvalidField {
                    field: ProfileField::Phone,
                    reason: "phone must contain at least 8 digits".to_string(),
                });
            }
        }
        if self.monthly_income == Some(0) {
            return Err(ValidationError::InvalidField {
                field: ProfileField::Income,
                reason: "monthly income must be positive".to_string(),
            });
        }
        if self.amount == Some(0) {
            return Err(ValidationError::InvalidField {
                field: ProfileField::Amount,
                reason: "loan amount must be positive".to_string(),
            });
        }
        if self.term_months == Some(0) {
            return Err(ValidationError::InvalidField {
                field: ProfileField::Term,
                reason: "loan term must be at least one month".to_string(),
            });
        }
        if let Some(rate) = self.annual_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ValidationError::InvalidField {
                    field: ProfileField::Rate,
                    reason: "annual rate must lie within [0, 1]".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn merge_text(slot: &mut Option<String>, update: Option<String>) {
    if let Some(value) = update {
        let trimmed = value.trim().to_string();
        if !trimmed.is_empty() {
            *slot = Some(trimmed);
        }
    }
}

/// Single-writer slot per applicant. Turns for one identity serialize on the
/// slot mutex; turns for different identities proceed independently.
#[derive(Default)]
pub struct SessionSlots {
    slots: Mutex<HashMap<ApplicantId, Arc<Mutex<()>>>>,
}

impl SessionSlots {
    pub fn slot(&self, identity: &ApplicantId) -> Arc<Mutex<()>> {
        let mut guard = self.slots.lock().expect("slot map mutex poisoned");
        guard
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the slot once a case is closed so the map does not grow without
    /// bound. Clones are only handed out under the map lock, so a strong
    /// count above one means some turn already fetched this slot and is about
    /// to lock it; removing the entry then would let a later turn mint a
    /// second mutex for the same identity. Such a slot stays in the map and
    /// is reclaimed by a later release.
    pub fn release(&self, identity: &ApplicantId) {
        let mut guard = self.slots.lock().expect("slot map mutex poisoned");
        if guard
            .get(identity)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            guard.remove(identity);
        }
    }
}
