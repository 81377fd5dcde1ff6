//! Loan case routing, verification, and decisioning.
//!
//! A case moves through a fixed lifecycle: profile collection, gate routing,
//! historical verification, and a final decision guarded by deterministic
//! safety rules. External language-model collaborators (field extraction,
//! qualitative advice, semantic equivalence) all sit behind trait seams.

pub mod decision;
pub mod domain;
pub mod gate;
pub mod policy;
pub mod repository;
pub mod retrieval;
pub mod router;
pub mod service;
pub mod session;
pub mod status;
pub mod verification;

#[cfg(test)]
mod tests;

pub use decision::{
    AdviceContext, Advisor, AdvisorError, DecisionEngine, DecisionInputs, HardMetrics,
    RuleBasedAdvisor,
};
pub use domain::{
    ApplicantId, CaseLibraryRecord, CaseState, DecisionResult, ExpertModule, FieldMismatch,
    FinalDecision, HistoryRecord, JobStability, LoanProfile, NextStep, ProfileField,
    QualitativeAdvice, RecommendedDecision, ReferenceStats, RiskLevel, RiskReport, SafetyRule,
    VerificationStatus,
};
pub use gate::{ClassifierScores, GateInput, RouteDecision};
pub use policy::{CreditScoreTable, DecisionPolicy};
pub use repository::{HistoryStore, SessionStore, StoreError};
pub use retrieval::{CaseCorpus, CaseMatch, InMemoryCaseCorpus, RetrievalError};
pub use router::{loan_case_router, CaseStatusView};
pub use service::{CaseServiceError, LoanCaseService};
pub use session::{CaseSession, ProfileUpdate, SessionSlots, StateCorrupted, ValidationError};
pub use status::infer_status;
pub use verification::{HistoryVerifier, SemanticMatcher, VerifyError};
