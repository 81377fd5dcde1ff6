use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::loan::decision::{AdviceContext, Advisor, AdvisorError};
use crate::workflows::loan::domain::{
    ApplicantId, HistoryRecord, QualitativeAdvice, RecommendedDecision,
};
use crate::workflows::loan::policy::DecisionPolicy;
use crate::workflows::loan::repository::{HistoryStore, SessionStore, StoreError};
use crate::workflows::loan::retrieval::{profile_embedding, CaseCorpus, CaseMatch, RetrievalError};
use crate::workflows::loan::session::{CaseSession, ProfileUpdate};
use crate::workflows::loan::{
    CaseLibraryRecord, FinalDecision, InMemoryCaseCorpus, JobStability, LoanCaseService,
    LoanProfile, RiskLevel,
};

pub(super) fn applicant() -> ApplicantId {
    ApplicantId("110101199001011234".to_string())
}

pub(super) fn full_update() -> ProfileUpdate {
    ProfileUpdate {
        name: Some("Wang Lei".to_string()),
        phone: Some("13800138000".to_string()),
        job: Some("Mechanical Engineer".to_string()),
        company: Some("Acme Manufacturing".to_string()),
        monthly_income: Some(70_000),
        amount: Some(500_000),
        purpose: Some("home renovation".to_string()),
        term_months: Some(84),
        annual_rate: Some(0.03),
    }
}

pub(super) fn complete_profile() -> LoanProfile {
    LoanProfile {
        name: Some("Wang Lei".to_string()),
        identity: Some(applicant().0),
        phone: Some("13800138000".to_string()),
        job: Some("Mechanical Engineer".to_string()),
        company: Some("Acme Manufacturing".to_string()),
        monthly_income: Some(70_000),
        amount: Some(500_000),
        purpose: Some("home renovation".to_string()),
        term_months: Some(84),
        annual_rate: Some(0.03),
    }
}

/// Archived record consistent with `complete_profile`.
pub(super) fn matching_history() -> HistoryRecord {
    HistoryRecord {
        identity: applicant(),
        content_summary: "prior archive".to_string(),
        job: Some("Mechanical Engineer".to_string()),
        company: Some("Acme Manufacturing".to_string()),
        monthly_income: Some(70_000),
        phone: Some("13800138000".to_string()),
        purpose: Some("car purchase".to_string()),
        has_default_record: false,
        last_risk_level: Some(RiskLevel::Low),
        inquiry_count: 2,
    }
}

pub(super) fn library_record(
    case_id: &str,
    final_decision: FinalDecision,
    approved_amount: Option<u64>,
) -> CaseLibraryRecord {
    CaseLibraryRecord {
        case_id: case_id.to_string(),
        content_summary: format!("case {case_id}"),
        embedding: profile_embedding(&complete_profile()),
        amount: 500_000,
        approved_amount,
        annual_rate: 0.03,
        final_decision,
        job_stability: JobStability::Stable,
    }
}

pub(super) fn approving_corpus() -> InMemoryCaseCorpus {
    InMemoryCaseCorpus::seeded(vec![
        library_record("c-1", FinalDecision::Approved, Some(500_000)),
        library_record("c-2", FinalDecision::Approved, Some(300_000)),
        library_record("c-3", FinalDecision::Rejected, None),
    ])
}

#[derive(Default)]
pub(super) struct MemorySessions {
    sessions: Mutex<HashMap<ApplicantId, CaseSession>>,
}

impl SessionStore for MemorySessions {
    fn load(&self, identity: &ApplicantId) -> Result<Option<CaseSession>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .expect("session map poisoned")
            .get(identity)
            .cloned())
    }

    fn save(&self, session: &CaseSession) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .insert(session.identity.clone(), session.clone());
        Ok(())
    }

    fn remove(&self, identity: &ApplicantId) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .remove(identity);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryHistory {
    records: Mutex<HashMap<ApplicantId, HistoryRecord>>,
}

impl MemoryHistory {
    pub(super) fn seeded(record: HistoryRecord) -> Self {
        let store = Self::default();
        store
            .records
            .lock()
            .expect("history map poisoned")
            .insert(record.identity.clone(), record);
        store
    }

    pub(super) fn record(&self, identity: &ApplicantId) -> Option<HistoryRecord> {
        self.records
            .lock()
            .expect("history map poisoned")
            .get(identity)
            .cloned()
    }
}

impl HistoryStore for MemoryHistory {
    fn fetch(&self, identity: &ApplicantId) -> Result<Option<HistoryRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("history map poisoned")
            .get(identity)
            .cloned())
    }

    fn archive(&self, record: HistoryRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .expect("history map poisoned")
            .insert(record.identity.clone(), record);
        Ok(())
    }
}

/// History store whose deadline always elapses.
pub(super) struct TimeoutHistory;

impl HistoryStore for TimeoutHistory {
    fn fetch(&self, _identity: &ApplicantId) -> Result<Option<HistoryRecord>, StoreError> {
        Err(StoreError::Timeout)
    }

    fn archive(&self, _record: HistoryRecord) -> Result<(), StoreError> {
        Err(StoreError::Timeout)
    }
}

/// Deterministic advisor returning a fixed recommendation.
pub(super) struct StubAdvisor {
    pub(super) decision: RecommendedDecision,
}

impl StubAdvisor {
    pub(super) fn approving() -> Self {
        Self {
            decision: RecommendedDecision::Approved,
        }
    }
}

impl Advisor for StubAdvisor {
    fn recommend(&self, _context: &AdviceContext<'_>) -> Result<QualitativeAdvice, AdvisorError> {
        Ok(QualitativeAdvice {
            decision: self.decision,
            rationale: "stubbed recommendation".to_string(),
        })
    }
}

pub(super) struct FailingAdvisor;

impl Advisor for FailingAdvisor {
    fn recommend(&self, _context: &AdviceContext<'_>) -> Result<QualitativeAdvice, AdvisorError> {
        Err(AdvisorError::Unavailable("model endpoint down".to_string()))
    }
}

/// Corpus whose similarity search always fails.
pub(super) struct FailingCorpus;

impl CaseCorpus for FailingCorpus {
    fn similar(
        &self,
        _profile: &LoanProfile,
        _top_k: usize,
    ) -> Result<Vec<CaseMatch>, RetrievalError> {
        Err(RetrievalError::Unavailable("index offline".to_string()))
    }
}

pub(super) type MemoryService =
    LoanCaseService<MemorySessions, MemoryHistory, InMemoryCaseCorpus, StubAdvisor>;

pub(super) fn build_service() -> (
    Arc<MemoryService>,
    Arc<MemorySessions>,
    Arc<MemoryHistory>,
    Arc<InMemoryCaseCorpus>,
) {
    build_service_with_history(MemoryHistory::default())
}

pub(super) fn build_service_with_history(
    history: MemoryHistory,
) -> (
    Arc<MemoryService>,
    Arc<MemorySessions>,
    Arc<MemoryHistory>,
    Arc<InMemoryCaseCorpus>,
) {
    let sessions = Arc::new(MemorySessions::default());
    let history = Arc::new(history);
    let corpus = Arc::new(approving_corpus());
    let service = Arc::new(LoanCaseService::new(
        sessions.clone(),
        history.clone(),
        corpus.clone(),
        Arc::new(StubAdvisor::approving()),
        DecisionPolicy::default(),
    ));
    (service, sessions, history, corpus)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
