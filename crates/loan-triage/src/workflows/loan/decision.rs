use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    DecisionResult, FinalDecision, LoanProfile, NextStep, QualitativeAdvice, RecommendedDecision,
    ReferenceStats, RiskReport, SafetyRule,
};
use super::policy::DecisionPolicy;

/// Deterministic financial metrics computed before any external opinion is
/// consulted. Pure arithmetic, never blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardMetrics {
    pub monthly_payment: f64,
    pub dbr: f64,
    pub credit_score: u16,
}

/// Everything the qualitative oracle is allowed to see when forming its
/// recommendation.
#[derive(Debug, Clone)]
pub struct AdviceContext<'a> {
    pub profile: &'a LoanProfile,
    pub risk_report: &'a RiskReport,
    pub metrics: HardMetrics,
    pub reference: Option<&'a ReferenceStats>,
}

#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    #[error("qualitative advisor unavailable: {0}")]
    Unavailable(String),
}

/// Seam for the external soft-logic oracle. Inherently non-deterministic in
/// production; tests drive the engine with deterministic stubs.
pub trait Advisor: Send + Sync {
    fn recommend(&self, context: &AdviceContext<'_>) -> Result<QualitativeAdvice, AdvisorError>;
}

/// Deterministic fallback advisor mirroring the underwriting desk's manual
/// playbook. Used when the oracle is unreachable and as the default wiring in
/// environments without a model.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedAdvisor;

impl Advisor for RuleBasedAdvisor {
    fn recommend(&self, context: &AdviceContext<'_>) -> Result<QualitativeAdvice, AdvisorError> {
        Ok(rule_based_advice(context))
    }
}

fn rule_based_advice(context: &AdviceContext<'_>) -> QualitativeAdvice {
    use super::domain::RiskLevel;

    if context.risk_report.risk_level == RiskLevel::High {
        QualitativeAdvice {
            decision: RecommendedDecision::Rejected,
            rationale: "verification graded the applicant high risk".to_string(),
        }
    } else if context.risk_report.risk_level == RiskLevel::Medium || context.metrics.dbr > 30.0 {
        QualitativeAdvice {
            decision: RecommendedDecision::Escalate,
            rationale: "medium risk or elevated debt burden warrants manual review".to_string(),
        }
    } else {
        QualitativeAdvice {
            decision: RecommendedDecision::Approved,
            rationale: "low risk profile within standard lending parameters".to_string(),
        }
    }
}

/// Inputs for one decision attempt.
#[derive(Debug, Clone)]
pub struct DecisionInputs<'a> {
    pub profile: &'a LoanProfile,
    pub risk_report: &'a RiskReport,
    pub reference: Option<ReferenceStats>,
}

/// Hybrid decision engine: hard math first, then the qualitative opinion,
/// then the safety guard. The ordering is load-bearing — the guard is the
/// last-evaluated, highest-priority rule, so no unsafe approval can reach the
/// output ahead of it.
pub struct DecisionEngine {
    policy: DecisionPolicy,
}

impl DecisionEngine {
    pub fn new(policy: DecisionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Step 1 — deterministic financial math. When income is missing a policy
    /// stand-in keeps the arithmetic defined; the missing-field guard still
    /// escalates such cases before they can approve.
    pub fn hard_metrics(&self, profile: &LoanProfile, risk_report: &RiskReport) -> HardMetrics {
        let principal = profile.amount.unwrap_or(0) as f64;
        let term = profile
            .term_months
            .unwrap_or(self.policy.default_term_months)
            .max(1) as f64;
        let rate = profile
            .annual_rate
            .unwrap_or(self.policy.default_annual_rate);

        let income = profile
            .monthly_income
            .filter(|income| *income > 0)
            .unwrap_or(self.policy.assumed_monthly_income);

        let monthly_payment = principal * (1.0 + rate) / term;
        let dbr = monthly_payment / income as f64 * 100.0;

        let credit_score = self
            .policy
            .score_table
            .score_for(income, risk_report.risk_level);

        HardMetrics {
            monthly_payment,
            dbr,
            credit_score,
        }
    }

    /// Run the full compute → recommend → override sequence and assemble a
    /// complete result. Always total: if the advisor fails, the deterministic
    /// rule-based playbook supplies the recommendation and every field of the
    /// `DecisionResult` is still populated.
    pub fn decide(
        &self,
        inputs: &DecisionInputs<'_>,
        advisor: &dyn Advisor,
    ) -> DecisionResult {
        let metrics = self.hard_metrics(inputs.profile, inputs.risk_report);

        let context = AdviceContext {
            profile: inputs.profile,
            risk_report: inputs.risk_report,
            metrics,
            reference: inputs.reference.as_ref(),
        };

        let advice = match advisor.recommend(&context) {
            Ok(advice) => advice,
            Err(err) => {
                // The oracle is opinion only; losing it degrades to the
                // deterministic playbook rather than failing the turn.
                warn!(error = %err, "advisor unavailable, using rule-based fallback");
                rule_based_advice(&context)
            }
        };

        let (final_decision, override_rule) =
            self.apply_safety_guard(inputs, &metrics, advice.decision);

        if let Some(rule) = override_rule {
            warn!(
                rule = rule.label(),
                dbr = metrics.dbr,
                credit_score = metrics.credit_score,
                recommended = ?advice.decision,
                forced = final_decision.label(),
                "safety guard fired"
            );
        } else {
            info!(
                decision = final_decision.label(),
                dbr = metrics.dbr,
                credit_score = metrics.credit_score,
                "decision adopted qualitative recommendation"
            );
        }

        let safety_overridden =
            override_rule.is_some() && advice.decision.as_final() != final_decision;

        DecisionResult {
            dbr: metrics.dbr,
            credit_score: metrics.credit_score,
            qualitative_decision: advice.decision,
            qualitative_rationale: advice.rationale,
            safety_overridden,
            override_rule,
            final_decision,
            next_step: next_step_for(final_decision),
            reference: inputs.reference.clone(),
        }
    }

    /// Step 3 — the circuit breaker. Evaluated unconditionally after the
    /// recommendation; it can downgrade any upstream opinion to a safe
    /// outcome but never upgrade one.
    fn apply_safety_guard(
        &self,
        inputs: &DecisionInputs<'_>,
        metrics: &HardMetrics,
        recommended: RecommendedDecision,
    ) -> (FinalDecision, Option<SafetyRule>) {
        if !inputs.profile.is_complete() {
            return (FinalDecision::Escalated, Some(SafetyRule::MissingRequiredField));
        }

        if metrics.dbr > self.policy.dbr_ceiling {
            return (FinalDecision::Rejected, Some(SafetyRule::DebtBurdenExceeded));
        }

        if metrics.credit_score < self.policy.credit_score_floor {
            return (
                FinalDecision::Rejected,
                Some(SafetyRule::CreditScoreBelowFloor),
            );
        }

        if recommended == RecommendedDecision::Approved {
            if let Some(stats) = &inputs.reference {
                if let Some(rate) = stats.approval_rate {
                    if rate < self.policy.reference_approval_floor {
                        return (
                            FinalDecision::Escalated,
                            Some(SafetyRule::LowReferenceApprovalRate),
                        );
                    }
                }
            }
        }

        (recommended.as_final(), None)
    }
}

fn next_step_for(decision: FinalDecision) -> NextStep {
    match decision {
        FinalDecision::Approved => NextStep::CaseClosedSuccess,
        FinalDecision::Rejected => NextStep::CaseClosedRejected,
        FinalDecision::Escalated => NextStep::HumanHandover,
    }
}
