use clap::Args;
use std::sync::Arc;

use crate::infra::{
    default_policy, seed_case_corpus, InMemoryHistoryStore, InMemorySessionStore,
};
use loan_triage::error::AppError;
use loan_triage::workflows::loan::domain::{ApplicantId, HistoryRecord, RiskLevel};
use loan_triage::workflows::loan::repository::HistoryStore;
use loan_triage::workflows::loan::session::ProfileUpdate;
use loan_triage::workflows::loan::{CaseServiceError, LoanCaseService, RuleBasedAdvisor};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Declared monthly income for the synthetic applicant
    #[arg(long, default_value_t = 70_000)]
    pub(crate) income: u64,
    /// Requested loan amount
    #[arg(long, default_value_t = 500_000)]
    pub(crate) amount: u64,
    /// Seed a historical record whose phone number diverges from the
    /// declaration, forcing a mismatch round
    #[arg(long)]
    pub(crate) mismatch: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let identity = ApplicantId("110101199001011234".to_string());

    let history = Arc::new(InMemoryHistoryStore::default());
    if args.mismatch {
        history.archive(HistoryRecord {
            identity: identity.clone(),
            content_summary: "seeded demo history".to_string(),
            job: Some("Mechanical Engineer".to_string()),
            company: Some("Acme Manufacturing".to_string()),
            monthly_income: Some(args.income),
            phone: Some("13911112222".to_string()),
            purpose: Some("car purchase".to_string()),
            has_default_record: false,
            last_risk_level: Some(RiskLevel::Low),
            inquiry_count: 1,
        })
        .map_err(CaseServiceError::Store)?;
    }

    let service = LoanCaseService::new(
        Arc::new(InMemorySessionStore::default()),
        history,
        Arc::new(seed_case_corpus()),
        Arc::new(RuleBasedAdvisor),
        default_policy(),
    );

    println!("Loan triage demo");
    println!("  applicant: {}", identity.0);

    let session = service.apply_fields(
        &identity,
        ProfileUpdate {
            name: Some("Wang Lei".to_string()),
            phone: Some("13800138000".to_string()),
            job: Some("Mechanical Engineer".to_string()),
            company: Some("Acme Manufacturing".to_string()),
            monthly_income: Some(args.income),
            amount: Some(args.amount),
            purpose: Some("home renovation".to_string()),
            term_months: Some(84),
            annual_rate: Some(0.03),
        },
    )?;
    println!("  profile collected, state: {}", session.state.label());

    let route = service.route(&identity, None)?;
    println!(
        "  gate routed to {} ({}), confidence {:.2}",
        route.module.label(),
        route.reason,
        route.confidence
    );

    let report = service.verify(&identity)?;
    println!(
        "  verification: risk {} with {} mismatch(es), prior history: {}",
        report.risk_level.label(),
        report.mismatches.len(),
        report.has_history
    );
    for mismatch in &report.mismatches {
        println!(
            "    field {:?}: declared '{}' vs recorded '{}'",
            mismatch.field, mismatch.current, mismatch.historical
        );
    }

    if report.risk_level == RiskLevel::High {
        println!("  case requires reclarification, stopping demo here");
        return Ok(());
    }

    let result = service.decide(&identity)?;
    println!(
        "  decision: {} (dbr {:.2}%, credit score {})",
        result.final_decision.label(),
        result.dbr,
        result.credit_score
    );
    if let Some(rule) = result.override_rule {
        println!("  safety guard fired: {}", rule.label());
    }
    if let Some(reference) = &result.reference {
        println!(
            "  reference sample: {} similar case(s), approval rate {}",
            reference.sample_size,
            reference
                .approval_rate
                .map(|rate| format!("{:.0}%", rate * 100.0))
                .unwrap_or_else(|| "n/a".to_string())
        );
    }

    service.close_case(&identity)?;
    println!("  case archived and closed");
    Ok(())
}
