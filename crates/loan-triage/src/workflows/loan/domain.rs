use serde::{Deserialize, Serialize};

/// Identifier wrapper for applicants. Doubles as the exact lookup key into the
/// history store and the session slot map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicantId(pub String);

/// The three specialist modules a conversational turn can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExpertModule {
    /// Loan Dialogue Expert — collects and clarifies profile fields.
    Lde,
    /// Data Verification Expert — reconciles declared data against history.
    Dve,
    /// Financial Risk Expert — produces the final credit decision.
    Fre,
}

impl ExpertModule {
    pub const fn label(self) -> &'static str {
        match self {
            ExpertModule::Lde => "LDE",
            ExpertModule::Dve => "DVE",
            ExpertModule::Fre => "FRE",
        }
    }
}

/// Coarse verification state derived from profile completeness and the most
/// recent risk report. `Unknown` can only exist before an identity-bearing
/// field is present; `Mismatch` forces re-collection for the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Unknown,
    Pending,
    Verified,
    Mismatch,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Unknown => "unknown",
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Mismatch => "mismatch",
        }
    }
}

/// Mutable per-applicant application data. Every field stays optional until
/// the dialogue layer fills it; "complete" means the required set is non-null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanProfile {
    pub name: Option<String>,
    pub identity: Option<String>,
    pub phone: Option<String>,
    pub job: Option<String>,
    pub company: Option<String>,
    pub monthly_income: Option<u64>,
    pub amount: Option<u64>,
    pub purpose: Option<String>,
    pub term_months: Option<u32>,
    pub annual_rate: Option<f64>,
}

impl LoanProfile {
    /// Fields that must be present before the case can leave collection.
    /// Term and rate are not listed; they fall back to policy defaults.
    pub fn missing_required(&self) -> Vec<ProfileField> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push(ProfileField::Name);
        }
        if self.identity.is_none() {
            missing.push(ProfileField::Identity);
        }
        if self.phone.is_none() {
            missing.push(ProfileField::Phone);
        }
        if self.job.is_none() {
            missing.push(ProfileField::Job);
        }
        if self.monthly_income.is_none() {
            missing.push(ProfileField::Income);
        }
        if self.amount.is_none() {
            missing.push(ProfileField::Amount);
        }
        if self.purpose.is_none() {
            missing.push(ProfileField::Purpose);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }
}

/// Names of comparable / collectible profile fields, used in mismatch
/// descriptors and validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Name,
    Identity,
    Phone,
    Job,
    Company,
    Income,
    Amount,
    Purpose,
    Term,
    Rate,
}

impl ProfileField {
    /// Critical fields use exact matching and any divergence is terminal for
    /// the turn. Income mismatches are only recorded beyond the tolerance
    /// band, so a recorded income mismatch is always critical.
    pub const fn is_critical(self) -> bool {
        matches!(
            self,
            ProfileField::Identity | ProfileField::Phone | ProfileField::Income
        )
    }
}

/// Risk grading emitted by the verification engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

/// A single divergence between declared and historical data. The
/// `semantic_equivalent` verdict comes from the matcher collaborator and is
/// recorded even for mismatching values so reviewers can audit the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMismatch {
    pub field: ProfileField,
    pub current: String,
    pub historical: String,
    pub semantic_equivalent: bool,
}

/// Outcome of one verification attempt. Ephemeral — attached to the case
/// session, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskReport {
    pub risk_level: RiskLevel,
    pub mismatches: Vec<FieldMismatch>,
    pub has_history: bool,
}

impl RiskReport {
    /// True when any recorded divergence touches a critical field.
    pub fn has_critical_mismatch(&self) -> bool {
        self.mismatches.iter().any(|m| m.field.is_critical())
    }
}

/// Immutable archival record, keyed by applicant identity. Written only when a
/// case closes, never mutated mid-case, so a verification attempt can never
/// corrupt the ground truth it checks against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub identity: ApplicantId,
    pub content_summary: String,
    pub job: Option<String>,
    pub company: Option<String>,
    pub monthly_income: Option<u64>,
    pub phone: Option<String>,
    pub purpose: Option<String>,
    pub has_default_record: bool,
    pub last_risk_level: Option<RiskLevel>,
    pub inquiry_count: u32,
}

/// Anonymized past decision stored in the case corpus. Write-once at seeding
/// or archival time; carries no applicant identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseLibraryRecord {
    pub case_id: String,
    pub content_summary: String,
    pub embedding: Vec<f32>,
    pub amount: u64,
    pub approved_amount: Option<u64>,
    pub annual_rate: f64,
    pub final_decision: FinalDecision,
    pub job_stability: JobStability,
}

/// Coarse employment stability grading carried by corpus records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStability {
    Stable,
    Average,
    Unstable,
}

/// Terminal decision for a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FinalDecision {
    Approved,
    Rejected,
    Escalated,
}

impl FinalDecision {
    pub const fn label(self) -> &'static str {
        match self {
            FinalDecision::Approved => "APPROVED",
            FinalDecision::Rejected => "REJECTED",
            FinalDecision::Escalated => "ESCALATED",
        }
    }
}

/// Recommendation supplied by the external qualitative oracle. The core only
/// consumes it as an opinion; the safety guard has the last word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecommendedDecision {
    Approved,
    Rejected,
    Escalate,
}

impl RecommendedDecision {
    pub const fn as_final(self) -> FinalDecision {
        match self {
            RecommendedDecision::Approved => FinalDecision::Approved,
            RecommendedDecision::Rejected => FinalDecision::Rejected,
            RecommendedDecision::Escalate => FinalDecision::Escalated,
        }
    }
}

/// Fixed-shape record returned by the qualitative advisor collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitativeAdvice {
    pub decision: RecommendedDecision,
    pub rationale: String,
}

/// Deterministic safety rules the circuit breaker can fire. Not exceptions:
/// a fired rule is a first-class outcome, always logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyRule {
    MissingRequiredField,
    DebtBurdenExceeded,
    CreditScoreBelowFloor,
    LowReferenceApprovalRate,
}

impl SafetyRule {
    pub const fn label(self) -> &'static str {
        match self {
            SafetyRule::MissingRequiredField => "missing-required-field",
            SafetyRule::DebtBurdenExceeded => "debt-burden-exceeded",
            SafetyRule::CreditScoreBelowFloor => "credit-score-below-floor",
            SafetyRule::LowReferenceApprovalRate => "low-reference-approval-rate",
        }
    }
}

/// Suggested continuation handed back to the conversational layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextStep {
    TransferToFre,
    ForceClarify,
    CaseClosedSuccess,
    CaseClosedRejected,
    HumanHandover,
}

/// Complete output of one decision attempt. Computed fresh each time; either
/// the whole struct is produced or the attempt fails, never a partial result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub dbr: f64,
    pub credit_score: u16,
    pub qualitative_decision: RecommendedDecision,
    pub qualitative_rationale: String,
    pub safety_overridden: bool,
    pub override_rule: Option<SafetyRule>,
    pub final_decision: FinalDecision,
    pub next_step: NextStep,
    pub reference: Option<ReferenceStats>,
}

/// Aggregate statistics the decision engine consumes from the case corpus.
/// `approval_rate` is `None` when the corpus returned nothing — a degraded
/// retrieval, never a hard failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStats {
    pub approval_rate: Option<f64>,
    pub avg_approved_amount: Option<u64>,
    pub sample_size: usize,
}

/// Per-application state machine. Transitions are driven exclusively by the
/// gate and the decision engine through the case session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Collecting,
    ReadyForRouting,
    PendingVerification,
    Verified,
    Mismatch,
    Deciding,
    Approved,
    Rejected,
    Escalated,
}

impl CaseState {
    pub const fn label(self) -> &'static str {
        match self {
            CaseState::Collecting => "collecting",
            CaseState::ReadyForRouting => "ready_for_routing",
            CaseState::PendingVerification => "pending_verification",
            CaseState::Verified => "verified",
            CaseState::Mismatch => "mismatch",
            CaseState::Deciding => "deciding",
            CaseState::Approved => "approved",
            CaseState::Rejected => "rejected",
            CaseState::Escalated => "escalated",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            CaseState::Approved | CaseState::Rejected | CaseState::Escalated
        )
    }
}
