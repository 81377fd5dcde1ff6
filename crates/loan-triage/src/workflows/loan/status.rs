use super::domain::{LoanProfile, RiskLevel, RiskReport, VerificationStatus};

/// Derive the coarse verification status from the current profile and the
/// most recent risk report of this case. Pure function, no side effects.
///
/// `Unknown` is only possible before an identity-bearing field exists.
/// A `High` report always maps to `Mismatch` even when no single critical
/// field diverged (two tolerant-field divergences still force re-collection).
pub fn infer_status(profile: &LoanProfile, latest_report: Option<&RiskReport>) -> VerificationStatus {
    if profile.identity.is_none() {
        return VerificationStatus::Unknown;
    }

    let Some(report) = latest_report else {
        return VerificationStatus::Pending;
    };

    if report.has_critical_mismatch() || report.risk_level == RiskLevel::High {
        return VerificationStatus::Mismatch;
    }

    VerificationStatus::Verified
}
