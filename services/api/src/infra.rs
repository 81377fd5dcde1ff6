use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use loan_triage::workflows::loan::domain::{ApplicantId, HistoryRecord};
use loan_triage::workflows::loan::repository::{HistoryStore, SessionStore, StoreError};
use loan_triage::workflows::loan::retrieval::profile_embedding;
use loan_triage::workflows::loan::session::CaseSession;
use loan_triage::workflows::loan::{
    CaseLibraryRecord, DecisionPolicy, FinalDecision, InMemoryCaseCorpus, JobStability,
    LoanProfile,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Development-grade session persistence. Production deployments swap in a
/// durable store behind the same trait.
#[derive(Default, Clone)]
pub(crate) struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<ApplicantId, CaseSession>>>,
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, identity: &ApplicantId) -> Result<Option<CaseSession>, StoreError> {
        let guard = self.sessions.lock().expect("session mutex poisoned");
        Ok(guard.get(identity).cloned())
    }

    fn save(&self, session: &CaseSession) -> Result<(), StoreError> {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        guard.insert(session.identity.clone(), session.clone());
        Ok(())
    }

    fn remove(&self, identity: &ApplicantId) -> Result<(), StoreError> {
        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        guard.remove(identity);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryHistoryStore {
    records: Arc<Mutex<HashMap<ApplicantId, HistoryRecord>>>,
}

impl HistoryStore for InMemoryHistoryStore {
    fn fetch(&self, identity: &ApplicantId) -> Result<Option<HistoryRecord>, StoreError> {
        let guard = self.records.lock().expect("history mutex poisoned");
        Ok(guard.get(identity).cloned())
    }

    fn archive(&self, record: HistoryRecord) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("history mutex poisoned");
        guard.insert(record.identity.clone(), record);
        Ok(())
    }
}

pub(crate) fn default_policy() -> DecisionPolicy {
    DecisionPolicy::default()
}

/// Seed corpus giving the decision engine a non-empty reference sample before
/// the service has archived any cases of its own.
pub(crate) fn seed_case_corpus() -> InMemoryCaseCorpus {
    let seeds = [
        (
            "seed-000001",
            400_000u64,
            Some(400_000u64),
            70_000u64,
            FinalDecision::Approved,
            JobStability::Stable,
        ),
        (
            "seed-000002",
            250_000,
            Some(250_000),
            45_000,
            FinalDecision::Approved,
            JobStability::Average,
        ),
        (
            "seed-000003",
            900_000,
            None,
            30_000,
            FinalDecision::Rejected,
            JobStability::Unstable,
        ),
        (
            "seed-000004",
            600_000,
            Some(500_000),
            90_000,
            FinalDecision::Approved,
            JobStability::Stable,
        ),
        (
            "seed-000005",
            700_000,
            None,
            40_000,
            FinalDecision::Escalated,
            JobStability::Average,
        ),
    ];

    let records = seeds
        .into_iter()
        .map(
            |(case_id, amount, approved_amount, income, final_decision, job_stability)| {
                let profile = LoanProfile {
                    monthly_income: Some(income),
                    amount: Some(amount),
                    purpose: Some("general purpose".to_string()),
                    term_months: Some(84),
                    annual_rate: Some(0.03),
                    ..LoanProfile::default()
                };
                CaseLibraryRecord {
                    case_id: case_id.to_string(),
                    content_summary: format!(
                        "amount {} decided {}",
                        amount,
                        final_decision.label()
                    ),
                    embedding: profile_embedding(&profile),
                    amount,
                    approved_amount,
                    annual_rate: 0.03,
                    final_decision,
                    job_stability,
                }
            },
        )
        .collect();

    InMemoryCaseCorpus::seeded(records)
}
