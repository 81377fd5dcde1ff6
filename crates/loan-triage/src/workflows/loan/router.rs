use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::decision::Advisor;
use super::domain::{ApplicantId, NextStep, RiskLevel, RiskReport};
use super::gate::ClassifierScores;
use super::repository::{HistoryStore, SessionStore};
use super::retrieval::CaseCorpus;
use super::service::{CaseServiceError, LoanCaseService};
use super::session::{CaseSession, ProfileUpdate};
use super::status::infer_status;

/// Router builder exposing HTTP endpoints for the case lifecycle.
pub fn loan_case_router<S, H, C, A>(service: Arc<LoanCaseService<S, H, C, A>>) -> Router
where
    S: SessionStore + 'static,
    H: HistoryStore + 'static,
    C: CaseCorpus + 'static,
    A: Advisor + 'static,
{
    Router::new()
        .route(
            "/api/v1/loan/cases/:identity/fields",
            post(fields_handler::<S, H, C, A>),
        )
        .route(
            "/api/v1/loan/cases/:identity/route",
            post(route_handler::<S, H, C, A>),
        )
        .route(
            "/api/v1/loan/cases/:identity/verify",
            post(verify_handler::<S, H, C, A>),
        )
        .route(
            "/api/v1/loan/cases/:identity/decide",
            post(decide_handler::<S, H, C, A>),
        )
        .route(
            "/api/v1/loan/cases/:identity/close",
            post(close_handler::<S, H, C, A>),
        )
        .route(
            "/api/v1/loan/cases/:identity",
            get(status_handler::<S, H, C, A>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RouteRequest {
    #[serde(default)]
    pub(crate) classifier: Option<ClassifierScores>,
}

/// Sanitized representation of a case's externally visible state.
#[derive(Debug, Clone, Serialize)]
pub struct CaseStatusView {
    pub identity: String,
    pub state: &'static str,
    pub verification_status: &'static str,
    pub missing_fields: Vec<String>,
    pub risk_level: Option<&'static str>,
    pub final_decision: Option<&'static str>,
}

impl CaseStatusView {
    pub fn from_session(session: &CaseSession) -> Self {
        let status = infer_status(&session.profile, session.latest_report.as_ref());
        Self {
            identity: session.identity.0.clone(),
            state: session.state.label(),
            verification_status: status.label(),
            missing_fields: session
                .profile
                .missing_required()
                .iter()
                .map(|field| format!("{field:?}").to_lowercase())
                .collect(),
            risk_level: session
                .latest_report
                .as_ref()
                .map(|report| report.risk_level.label()),
            final_decision: session
                .decision
                .as_ref()
                .map(|decision| decision.final_decision.label()),
        }
    }
}

/// Continuation hint the conversational layer shows after a verification
/// turn: low and medium reports move on to decisioning, high risk forces a
/// clarification round.
pub(crate) fn verification_next_step(report: &RiskReport) -> NextStep {
    match report.risk_level {
        RiskLevel::Low | RiskLevel::Medium => NextStep::TransferToFre,
        RiskLevel::High => NextStep::ForceClarify,
    }
}

pub(crate) async fn fields_handler<S, H, C, A>(
    State(service): State<Arc<LoanCaseService<S, H, C, A>>>,
    Path(identity): Path<String>,
    axum::Json(update): axum::Json<ProfileUpdate>,
) -> Response
where
    S: SessionStore + 'static,
    H: HistoryStore + 'static,
    C: CaseCorpus + 'static,
    A: Advisor + 'static,
{
    let identity = ApplicantId(identity);
    match service.apply_fields(&identity, update) {
        Ok(session) => (
            StatusCode::OK,
            axum::Json(CaseStatusView::from_session(&session)),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn route_handler<S, H, C, A>(
    State(service): State<Arc<LoanCaseService<S, H, C, A>>>,
    Path(identity): Path<String>,
    axum::Json(request): axum::Json<RouteRequest>,
) -> Response
where
    S: SessionStore + 'static,
    H: HistoryStore + 'static,
    C: CaseCorpus + 'static,
    A: Advisor + 'static,
{
    let identity = ApplicantId(identity);
    match service.route(&identity, request.classifier) {
        Ok(decision) => (StatusCode::OK, axum::Json(decision)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn verify_handler<S, H, C, A>(
    State(service): State<Arc<LoanCaseService<S, H, C, A>>>,
    Path(identity): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
    H: HistoryStore + 'static,
    C: CaseCorpus + 'static,
    A: Advisor + 'static,
{
    let identity = ApplicantId(identity);
    match service.verify(&identity) {
        Ok(report) => {
            let next_step = verification_next_step(&report);
            let payload = json!({
                "report": report,
                "next_step": next_step,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn decide_handler<S, H, C, A>(
    State(service): State<Arc<LoanCaseService<S, H, C, A>>>,
    Path(identity): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
    H: HistoryStore + 'static,
    C: CaseCorpus + 'static,
    A: Advisor + 'static,
{
    let identity = ApplicantId(identity);
    match service.decide(&identity) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn close_handler<S, H, C, A>(
    State(service): State<Arc<LoanCaseService<S, H, C, A>>>,
    Path(identity): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
    H: HistoryStore + 'static,
    C: CaseCorpus + 'static,
    A: Advisor + 'static,
{
    let identity = ApplicantId(identity);
    match service.close_case(&identity) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<S, H, C, A>(
    State(service): State<Arc<LoanCaseService<S, H, C, A>>>,
    Path(identity): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
    H: HistoryStore + 'static,
    C: CaseCorpus + 'static,
    A: Advisor + 'static,
{
    let identity = ApplicantId(identity);
    match service.get(&identity) {
        Ok(session) => (
            StatusCode::OK,
            axum::Json(CaseStatusView::from_session(&session)),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: CaseServiceError) -> Response {
    let status = match &err {
        CaseServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CaseServiceError::NotFound => StatusCode::NOT_FOUND,
        CaseServiceError::State(_) | CaseServiceError::CaseStillOpen => StatusCode::CONFLICT,
        CaseServiceError::VerificationUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        CaseServiceError::MissingVerification => StatusCode::CONFLICT,
        CaseServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}
