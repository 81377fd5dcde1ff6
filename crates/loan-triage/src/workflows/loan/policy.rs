use serde::{Deserialize, Serialize};

use super::domain::RiskLevel;

/// Policy dials backing the routing/decision core. Every threshold the
/// original underwriting playbook carries as a constant is injected here so
/// operators can tune it without a rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    /// Relative income divergence tolerated before a mismatch is recorded,
    /// measured against the historical figure.
    pub income_tolerance: f64,
    /// Debt burden ratio (percent) above which approval is never allowed.
    pub dbr_ceiling: f64,
    /// Credit score below which approval is never allowed.
    pub credit_score_floor: u16,
    /// Similar-case approval rate below which a qualitative approval is
    /// downgraded to human review.
    pub reference_approval_floor: f64,
    /// Number of corpus neighbors consulted per decision.
    pub reference_top_k: usize,
    /// Fallback loan term when the applicant has not stated one.
    pub default_term_months: u32,
    /// Fallback flat annual rate when the applicant has not stated one.
    pub default_annual_rate: f64,
    /// Income assumed for the hard-math step when the declared figure is
    /// absent; the missing-field guard still escalates such cases.
    pub assumed_monthly_income: u64,
    pub score_table: CreditScoreTable,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            income_tolerance: 0.10,
            dbr_ceiling: 60.0,
            credit_score_floor: 650,
            reference_approval_floor: 0.30,
            reference_top_k: 3,
            default_term_months: 84,
            default_annual_rate: 0.03,
            assumed_monthly_income: 60_000,
            score_table: CreditScoreTable::default(),
        }
    }
}

/// Rule table mapping income bracket and verification risk to a credit score.
/// A higher risk level strictly lowers the band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditScoreTable {
    /// Brackets sorted ascending by `min_income`; the last bracket whose
    /// floor is at or below the income applies.
    pub brackets: Vec<IncomeBracket>,
    pub medium_risk_penalty: u16,
    pub high_risk_penalty: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeBracket {
    pub min_income: u64,
    pub base_score: u16,
}

impl Default for CreditScoreTable {
    fn default() -> Self {
        Self {
            brackets: vec![
                IncomeBracket {
                    min_income: 0,
                    base_score: 580,
                },
                IncomeBracket {
                    min_income: 30_000,
                    base_score: 640,
                },
                IncomeBracket {
                    min_income: 40_000,
                    base_score: 700,
                },
                IncomeBracket {
                    min_income: 70_000,
                    base_score: 730,
                },
                IncomeBracket {
                    min_income: 100_000,
                    base_score: 760,
                },
            ],
            medium_risk_penalty: 25,
            high_risk_penalty: 80,
        }
    }
}

impl CreditScoreTable {
    pub fn score_for(&self, monthly_income: u64, risk: RiskLevel) -> u16 {
        let base = self
            .brackets
            .iter()
            .filter(|bracket| bracket.min_income <= monthly_income)
            .map(|bracket| bracket.base_score)
            .last()
            .unwrap_or(0);

        let penalty = match risk {
            RiskLevel::Low => 0,
            RiskLevel::Medium => self.medium_risk_penalty,
            RiskLevel::High => self.high_risk_penalty,
        };

        base.saturating_sub(penalty)
    }
}
