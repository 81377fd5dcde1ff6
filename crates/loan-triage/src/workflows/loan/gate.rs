use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ExpertModule, VerificationStatus};

/// Inputs the gate routes on. The classifier scores are a learned signal and
/// strictly advisory; guardrails always win.
#[derive(Debug, Clone, Copy)]
pub struct GateInput {
    pub status: VerificationStatus,
    pub profile_complete: bool,
    pub classifier: Option<ClassifierScores>,
}

/// Softmax output of the learned routing model over the three modules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierScores {
    pub lde: f32,
    pub dve: f32,
    pub fre: f32,
}

impl ClassifierScores {
    /// Arg-max with a conservative tie-break: on equal scores LDE wins over
    /// DVE, and DVE over FRE.
    pub fn argmax(&self) -> (ExpertModule, f32) {
        let mut best = (ExpertModule::Lde, self.lde);
        if self.dve > best.1 {
            best = (ExpertModule::Dve, self.dve);
        }
        if self.fre > best.1 {
            best = (ExpertModule::Fre, self.fre);
        }
        best
    }
}

/// Routing verdict with an auditable reason trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub module: ExpertModule,
    pub confidence: f32,
    pub reason: String,
}

struct Guardrail {
    reason: &'static str,
    applies: fn(&GateInput) -> Option<ExpertModule>,
}

/// Business rules in fixed priority order; first match wins and short-circuits
/// the classifier entirely.
const GUARDRAILS: &[Guardrail] = &[
    Guardrail {
        reason: "incomplete-profile",
        applies: |input| {
            (input.status == VerificationStatus::Unknown || !input.profile_complete)
                .then_some(ExpertModule::Lde)
        },
    },
    Guardrail {
        reason: "pending-verification",
        applies: |input| (input.status == VerificationStatus::Pending).then_some(ExpertModule::Dve),
    },
    Guardrail {
        reason: "mismatch-reclarify",
        applies: |input| (input.status == VerificationStatus::Mismatch).then_some(ExpertModule::Lde),
    },
    Guardrail {
        reason: "verified-ready",
        applies: |input| (input.status == VerificationStatus::Verified).then_some(ExpertModule::Fre),
    },
];

/// Select the module that handles the next turn. Deterministic: the learned
/// classifier is consulted only when no guardrail matched.
pub fn route(input: &GateInput) -> RouteDecision {
    for guardrail in GUARDRAILS {
        if let Some(module) = (guardrail.applies)(input) {
            info!(
                module = module.label(),
                reason = guardrail.reason,
                status = input.status.label(),
                "guardrail routed turn"
            );
            return RouteDecision {
                module,
                confidence: 1.0,
                reason: guardrail.reason.to_string(),
            };
        }
    }

    match input.classifier {
        Some(scores) => {
            let (module, confidence) = scores.argmax();
            info!(
                module = module.label(),
                confidence, "classifier fallback routed turn"
            );
            RouteDecision {
                module,
                confidence,
                reason: "classifier-fallback".to_string(),
            }
        }
        // No rule matched and no learned signal available: fall back to the
        // most conservative module.
        None => RouteDecision {
            module: ExpertModule::Lde,
            confidence: 0.5,
            reason: "classifier-fallback".to_string(),
        },
    }
}
