use tracing::{info, warn};

use super::domain::{
    ApplicantId, FieldMismatch, HistoryRecord, LoanProfile, ProfileField, RiskLevel, RiskReport,
};
use super::repository::{HistoryStore, StoreError};

/// Error surfaced when the history store cannot answer within its deadline.
/// Degrading to first-time-applicant behavior would hide a real record, so
/// the caller must escalate instead.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("history store unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

/// Capability seam for semantic field comparison. An external classifier may
/// implement it; the core only ever consumes the boolean verdict.
pub trait SemanticMatcher: Send + Sync {
    fn equivalent(&self, field: ProfileField, current: &str, historical: &str) -> bool;
}

/// Default matcher: case-folded, whitespace-trimmed equality.
#[derive(Debug, Default, Clone, Copy)]
pub struct NormalizedEquality;

impl SemanticMatcher for NormalizedEquality {
    fn equivalent(&self, _field: ProfileField, current: &str, historical: &str) -> bool {
        normalize_text(current) == normalize_text(historical)
    }
}

/// Reconciles declared profile data against the applicant's archived record
/// and grades the divergence.
pub struct HistoryVerifier<M = NormalizedEquality> {
    matcher: M,
    income_tolerance: f64,
}

impl HistoryVerifier<NormalizedEquality> {
    pub fn new(income_tolerance: f64) -> Self {
        Self::with_matcher(NormalizedEquality, income_tolerance)
    }
}

impl<M: SemanticMatcher> HistoryVerifier<M> {
    pub fn with_matcher(matcher: M, income_tolerance: f64) -> Self {
        Self {
            matcher,
            income_tolerance,
        }
    }

    /// Fetch the history record for `identity` and diff the declared fields
    /// against it. A first-time applicant yields a LOW report with
    /// `has_history = false`; absence of history is never penalized.
    ///
    /// Pure apart from the store read: repeated calls with identical inputs
    /// produce identical reports.
    pub fn verify(
        &self,
        store: &dyn HistoryStore,
        identity: &ApplicantId,
        profile: &LoanProfile,
    ) -> Result<RiskReport, VerifyError> {
        let record = match store.fetch(identity) {
            Ok(record) => record,
            Err(err) => {
                warn!(identity = %identity.0, error = %err, "history lookup failed");
                return Err(VerifyError::Unavailable(err));
            }
        };

        let Some(record) = record else {
            info!(identity = %identity.0, "no history record, first-time applicant");
            return Ok(RiskReport {
                risk_level: RiskLevel::Low,
                mismatches: Vec::new(),
                has_history: false,
            });
        };

        let mismatches = self.diff(profile, &record);
        let risk_level = classify(&mismatches);

        info!(
            identity = %identity.0,
            risk = risk_level.label(),
            mismatches = mismatches.len(),
            "verification attempt graded"
        );

        Ok(RiskReport {
            risk_level,
            mismatches,
            has_history: true,
        })
    }

    /// Compare fields present on both sides, in a fixed order so reports are
    /// reproducible. Phone is exact after digit normalization; income uses
    /// the tolerance band; job and company defer to the semantic matcher.
    fn diff(&self, profile: &LoanProfile, record: &HistoryRecord) -> Vec<FieldMismatch> {
        let mut mismatches = Vec::new();

        if let (Some(current), Some(historical)) = (&profile.phone, &record.phone) {
            let current_digits = normalize_phone(current);
            let historical_digits = normalize_phone(historical);
            if current_digits != historical_digits {
                mismatches.push(FieldMismatch {
                    field: ProfileField::Phone,
                    current: current_digits,
                    historical: historical_digits,
                    semantic_equivalent: false,
                });
            }
        }

        if let (Some(current), Some(historical)) = (profile.monthly_income, record.monthly_income)
        {
            if !within_tolerance(current, historical, self.income_tolerance) {
                mismatches.push(FieldMismatch {
                    field: ProfileField::Income,
                    current: current.to_string(),
                    historical: historical.to_string(),
                    semantic_equivalent: false,
                });
            }
        }

        if let (Some(current), Some(historical)) = (&profile.job, &record.job) {
            if !self
                .matcher
                .equivalent(ProfileField::Job, current, historical)
            {
                mismatches.push(FieldMismatch {
                    field: ProfileField::Job,
                    current: current.clone(),
                    historical: historical.clone(),
                    semantic_equivalent: false,
                });
            }
        }

        if let (Some(current), Some(historical)) = (&profile.company, &record.company) {
            if !self
                .matcher
                .equivalent(ProfileField::Company, current, historical)
            {
                mismatches.push(FieldMismatch {
                    field: ProfileField::Company,
                    current: current.clone(),
                    historical: historical.clone(),
                    semantic_equivalent: false,
                });
            }
        }

        mismatches
    }
}

/// Zero mismatches grade LOW, a single tolerant-field divergence MEDIUM, and
/// any critical divergence or two-plus divergences HIGH.
fn classify(mismatches: &[FieldMismatch]) -> RiskLevel {
    let critical = mismatches.iter().any(|m| m.field.is_critical());
    match (critical, mismatches.len()) {
        (true, _) => RiskLevel::High,
        (false, 0) => RiskLevel::Low,
        (false, 1) => RiskLevel::Medium,
        (false, _) => RiskLevel::High,
    }
}

fn normalize_text(value: &str) -> String {
    value.trim().to_lowercase()
}

fn normalize_phone(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Income is tolerant: the declared figure may drift by the configured share
/// of the historical figure before it counts as a mismatch.
fn within_tolerance(current: u64, historical: u64, tolerance: f64) -> bool {
    let delta = current.abs_diff(historical) as f64;
    delta <= historical as f64 * tolerance
}
