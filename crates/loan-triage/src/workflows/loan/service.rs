use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::decision::{Advisor, DecisionEngine, DecisionInputs};
use super::domain::{
    ApplicantId, CaseLibraryRecord, CaseState, DecisionResult, FinalDecision, HistoryRecord,
    JobStability, RiskLevel, RiskReport, VerificationStatus,
};
use super::gate::{self, ClassifierScores, GateInput, RouteDecision};
use super::policy::DecisionPolicy;
use super::repository::{HistoryStore, SessionStore, StoreError};
use super::retrieval::{aggregate, profile_embedding, CaseCorpus};
use super::session::{CaseSession, ProfileUpdate, SessionSlots, StateCorrupted, ValidationError};
use super::status::infer_status;
use super::verification::HistoryVerifier;

/// Error raised by the case service.
#[derive(Debug, thiserror::Error)]
pub enum CaseServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    State(#[from] StateCorrupted),
    #[error("case not found")]
    NotFound,
    #[error("verification unavailable, case escalated to human review")]
    VerificationUnavailable,
    #[error("case has no verification report")]
    MissingVerification,
    #[error("case must reach a terminal state before closing")]
    CaseStillOpen,
    #[error(transparent)]
    Store(#[from] StoreError),
}

static CASE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_case_id() -> String {
    let id = CASE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("case-{id:06}")
}

/// Service composing the gate, the verification engine, the decision engine,
/// and the backing stores. Each public operation runs as one serialized turn
/// for the applicant: the per-identity slot is held for the whole operation
/// and the session is persisted exactly once, after all computation succeeds.
pub struct LoanCaseService<S, H, C, A> {
    sessions: Arc<S>,
    history: Arc<H>,
    corpus: Arc<C>,
    advisor: Arc<A>,
    verifier: HistoryVerifier,
    engine: DecisionEngine,
    slots: SessionSlots,
}

impl<S, H, C, A> LoanCaseService<S, H, C, A>
where
    S: SessionStore + 'static,
    H: HistoryStore + 'static,
    C: CaseCorpus + 'static,
    A: Advisor + 'static,
{
    pub fn new(
        sessions: Arc<S>,
        history: Arc<H>,
        corpus: Arc<C>,
        advisor: Arc<A>,
        policy: DecisionPolicy,
    ) -> Self {
        let verifier = HistoryVerifier::new(policy.income_tolerance);
        let engine = DecisionEngine::new(policy);
        Self {
            sessions,
            history,
            corpus,
            advisor,
            verifier,
            engine,
            slots: SessionSlots::default(),
        }
    }

    /// Apply a validated partial-profile update produced by the external
    /// extraction collaborator. Creates the session on first contact; moves
    /// the case back into collection after a mismatch.
    pub fn apply_fields(
        &self,
        identity: &ApplicantId,
        update: ProfileUpdate,
    ) -> Result<CaseSession, CaseServiceError> {
        let slot = self.slots.slot(identity);
        let _turn = slot.lock().expect("session slot poisoned");

        let mut session = match self.sessions.load(identity)? {
            Some(session) => session,
            None => CaseSession::new(identity.clone()),
        };

        if session.state == CaseState::Mismatch || session.state == CaseState::ReadyForRouting {
            session.transition(CaseState::Collecting)?;
        }
        if session.state != CaseState::Collecting {
            return Err(CaseServiceError::State(StateCorrupted {
                from: session.state,
                to: CaseState::Collecting,
            }));
        }

        update.apply(&mut session.profile)?;
        // A fresh declaration invalidates any previous verification verdict.
        session.latest_report = None;

        if session.profile.is_complete() {
            session.transition(CaseState::ReadyForRouting)?;
        }

        self.sessions.save(&session)?;
        Ok(session)
    }

    /// Select the module for the applicant's next turn and advance the case
    /// state accordingly. Guardrails always outrank the classifier signal.
    pub fn route(
        &self,
        identity: &ApplicantId,
        classifier: Option<ClassifierScores>,
    ) -> Result<RouteDecision, CaseServiceError> {
        let slot = self.slots.slot(identity);
        let _turn = slot.lock().expect("session slot poisoned");

        let mut session = self
            .sessions
            .load(identity)?
            .ok_or(CaseServiceError::NotFound)?;

        let status = infer_status(&session.profile, session.latest_report.as_ref());
        let decision = gate::route(&GateInput {
            status,
            profile_complete: session.profile.is_complete(),
            classifier,
        });

        match decision.module {
            super::domain::ExpertModule::Dve => {
                session.transition(CaseState::PendingVerification)?;
            }
            super::domain::ExpertModule::Lde => {
                if session.state == CaseState::Mismatch {
                    session.transition(CaseState::Collecting)?;
                }
            }
            // A verified case stays put until the decision turn claims it.
            super::domain::ExpertModule::Fre => {}
        }

        self.sessions.save(&session)?;
        Ok(decision)
    }

    /// Reconcile the declared profile against the applicant's archived
    /// record. A store timeout is never optimistic: the case escalates to a
    /// human instead of being treated as a first-time applicant.
    pub fn verify(&self, identity: &ApplicantId) -> Result<RiskReport, CaseServiceError> {
        let slot = self.slots.slot(identity);
        let _turn = slot.lock().expect("session slot poisoned");

        let mut session = self
            .sessions
            .load(identity)?
            .ok_or(CaseServiceError::NotFound)?;

        session.transition(CaseState::PendingVerification)?;

        let report = match self
            .verifier
            .verify(self.history.as_ref(), identity, &session.profile)
        {
            Ok(report) => report,
            Err(err) => {
                warn!(identity = %identity.0, error = %err, "verification unavailable, escalating");
                session.transition(CaseState::Escalated)?;
                self.sessions.save(&session)?;
                return Err(CaseServiceError::VerificationUnavailable);
            }
        };

        session.latest_report = Some(report.clone());
        let status = infer_status(&session.profile, session.latest_report.as_ref());
        let next = if status == VerificationStatus::Mismatch {
            CaseState::Mismatch
        } else {
            CaseState::Verified
        };
        session.transition(next)?;

        self.sessions.save(&session)?;
        Ok(report)
    }

    /// Run one decision attempt: reference retrieval, hard math, qualitative
    /// recommendation, safety guard, in that order. The session only moves to
    /// a terminal state when a complete result exists.
    pub fn decide(&self, identity: &ApplicantId) -> Result<DecisionResult, CaseServiceError> {
        let slot = self.slots.slot(identity);
        let _turn = slot.lock().expect("session slot poisoned");

        let mut session = self
            .sessions
            .load(identity)?
            .ok_or(CaseServiceError::NotFound)?;

        session.transition(CaseState::Deciding)?;

        let report = session
            .latest_report
            .clone()
            .ok_or(CaseServiceError::MissingVerification)?;

        // Retrieval is advisory: a degraded or unreachable corpus reduces the
        // reference sample, never the decision itself.
        let reference = match self
            .corpus
            .similar(&session.profile, self.engine.policy().reference_top_k)
        {
            Ok(sample) => Some(aggregate(&sample)),
            Err(err) => {
                warn!(identity = %identity.0, error = %err, "case corpus degraded");
                None
            }
        };

        let result = self.engine.decide(
            &DecisionInputs {
                profile: &session.profile,
                risk_report: &report,
                reference,
            },
            self.advisor.as_ref(),
        );

        let terminal = match result.final_decision {
            FinalDecision::Approved => CaseState::Approved,
            FinalDecision::Rejected => CaseState::Rejected,
            FinalDecision::Escalated => CaseState::Escalated,
        };
        session.transition(terminal)?;
        session.decision = Some(result.clone());

        self.sessions.save(&session)?;

        info!(
            identity = %identity.0,
            decision = result.final_decision.label(),
            overridden = result.safety_overridden,
            "case decided"
        );
        Ok(result)
    }

    /// Archive the closed case into the history store and the anonymized case
    /// corpus, then drop the session. Archival happens only here, never
    /// during a verification attempt.
    pub fn close_case(&self, identity: &ApplicantId) -> Result<(), CaseServiceError> {
        let slot = self.slots.slot(identity);
        let _turn = slot.lock().expect("session slot poisoned");

        let session = self
            .sessions
            .load(identity)?
            .ok_or(CaseServiceError::NotFound)?;

        if !session.state.is_terminal() {
            return Err(CaseServiceError::CaseStillOpen);
        }

        let prior = self.history.fetch(identity)?;
        let record = build_history_record(&session, prior.as_ref());
        self.history.archive(record)?;

        if let Some(decision) = &session.decision {
            let library_record = build_library_record(
                &session,
                decision,
                self.engine.policy().default_annual_rate,
            );
            if let Err(err) = self.corpus.archive_case(library_record) {
                warn!(identity = %identity.0, error = %err, "case corpus archival skipped");
            }
        }

        self.sessions.remove(identity)?;
        drop(_turn);
        drop(slot);
        self.slots.release(identity);

        info!(identity = %identity.0, "case closed and archived");
        Ok(())
    }

    /// Read-only view of the current session.
    pub fn get(&self, identity: &ApplicantId) -> Result<CaseSession, CaseServiceError> {
        self.sessions
            .load(identity)?
            .ok_or(CaseServiceError::NotFound)
    }
}

fn build_history_record(session: &CaseSession, prior: Option<&HistoryRecord>) -> HistoryRecord {
    let risk = session
        .latest_report
        .as_ref()
        .map(|report| report.risk_level);
    let defaulted = prior.map(|record| record.has_default_record).unwrap_or(false)
        || matches!(
            session.decision.as_ref().map(|d| d.final_decision),
            Some(FinalDecision::Rejected)
        ) && risk == Some(RiskLevel::High);

    let summary = format!(
        "Internal archive {}: applicant {} employed at {} as {}, declared income {} per month, last screening risk {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
        session.profile.name.as_deref().unwrap_or("unknown"),
        session.profile.company.as_deref().unwrap_or("undisclosed"),
        session.profile.job.as_deref().unwrap_or("undisclosed"),
        session.profile.monthly_income.unwrap_or(0),
        risk.map(RiskLevel::label).unwrap_or("UNSCREENED"),
    );

    HistoryRecord {
        identity: session.identity.clone(),
        content_summary: summary,
        job: session.profile.job.clone(),
        company: session.profile.company.clone(),
        monthly_income: session.profile.monthly_income,
        phone: session.profile.phone.clone(),
        purpose: session.profile.purpose.clone(),
        has_default_record: defaulted,
        last_risk_level: risk,
        inquiry_count: prior.map(|record| record.inquiry_count).unwrap_or(0) + 1,
    }
}

fn build_library_record(
    session: &CaseSession,
    decision: &DecisionResult,
    default_annual_rate: f64,
) -> CaseLibraryRecord {
    let amount = session.profile.amount.unwrap_or(0);
    let approved_amount =
        (decision.final_decision == FinalDecision::Approved).then_some(amount);

    // Coarse stability grading keeps the corpus record anonymized while still
    // being useful as a retrieval feature.
    let job_stability = match decision.credit_score {
        score if score >= 700 => JobStability::Stable,
        score if score >= 650 => JobStability::Average,
        _ => JobStability::Unstable,
    };

    CaseLibraryRecord {
        case_id: next_case_id(),
        content_summary: format!(
            "amount {} decided {} at dbr {:.1}",
            amount,
            decision.final_decision.label(),
            decision.dbr
        ),
        embedding: profile_embedding(&session.profile),
        amount,
        approved_amount,
        annual_rate: session.profile.annual_rate.unwrap_or(default_annual_rate),
        final_decision: decision.final_decision,
        job_stability,
    }
}
