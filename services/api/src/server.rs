use crate::cli::ServeArgs;
use crate::infra::{
    default_policy, seed_case_corpus, AppState, InMemoryHistoryStore, InMemorySessionStore,
};
use crate::routes::with_case_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use loan_triage::config::AppConfig;
use loan_triage::error::AppError;
use loan_triage::telemetry;
use loan_triage::workflows::loan::{LoanCaseService, RuleBasedAdvisor};
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let case_service = Arc::new(LoanCaseService::new(
        Arc::new(InMemorySessionStore::default()),
        Arc::new(InMemoryHistoryStore::default()),
        Arc::new(seed_case_corpus()),
        Arc::new(RuleBasedAdvisor),
        default_policy(),
    ));

    let app = with_case_routes(case_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan triage service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
