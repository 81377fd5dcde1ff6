//! Integration scenarios for the loan case lifecycle.
//!
//! Each scenario drives the public service facade or the HTTP router across a
//! full case: field collection, gate routing, history verification, the final
//! decision, and archival at close.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use loan_triage::workflows::loan::decision::{AdviceContext, Advisor, AdvisorError};
    use loan_triage::workflows::loan::domain::{
        ApplicantId, HistoryRecord, QualitativeAdvice, RecommendedDecision, RiskLevel,
    };
    use loan_triage::workflows::loan::policy::DecisionPolicy;
    use loan_triage::workflows::loan::repository::{HistoryStore, SessionStore, StoreError};
    use loan_triage::workflows::loan::retrieval::profile_embedding;
    use loan_triage::workflows::loan::session::{CaseSession, ProfileUpdate};
    use loan_triage::workflows::loan::{
        CaseLibraryRecord, FinalDecision, InMemoryCaseCorpus, JobStability, LoanCaseService,
        LoanProfile,
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
            inquiry_count: 1,
        }
    }

    pub(super) fn seeded_corpus() -> InMemoryCaseCorpus {
        let reference = LoanProfile {
            monthly_income: Some(70_000),
            amount: Some(500_000),
            purpose: Some("home renovation".to_string()),
            job: Some("Mechanical Engineer".to_string()),
            term_months: Some(84),
            annual_rate: Some(0.03),
            ..LoanProfile::default()
        };
        InMemoryCaseCorpus::seeded(vec![
            CaseLibraryRecord {
                case_id: "seed-1".to_string(),
                content_summary: "comparable approval".to_string(),
                embedding: profile_embedding(&reference),
                amount: 500_000,
                approved_amount: Some(500_000),
                annual_rate: 0.03,
                final_decision: FinalDecision::Approved,
                job_stability: JobStability::Stable,
            },
            CaseLibraryRecord {
                case_id: "seed-2".to_string(),
                content_summary: "comparable approval".to_string(),
                embedding: profile_embedding(&reference),
                amount: 350_000,
                approved_amount: Some(350_000),
                annual_rate: 0.03,
                final_decision: FinalDecision::Approved,
                job_stability: JobStability::Average,
            },
            CaseLibraryRecord {
                case_id: "seed-3".to_string(),
                content_summary: "comparable rejection".to_string(),
                embedding: profile_embedding(&reference),
                amount: 800_000,
                approved_amount: None,
                annual_rate: 0.03,
                final_decision: FinalDecision::Rejected,
                job_stability: JobStability::Unstable,
            },
        ])
    }

    #[derive(Default)]
    pub(super) struct MemorySessions {
        sessions: Mutex<HashMap<ApplicantId, CaseSession>>,
    }

    impl SessionStore for MemorySessions {
        fn load(&self, identity: &ApplicantId) -> Result<Option<CaseSession>, StoreError> {
            Ok(self.sessions.lock().expect("lock").get(identity).cloned())
        }

        fn save(&self, session: &CaseSession) -> Result<(), StoreError> {
            self.sessions
                .lock()
                .expect("lock")
                .insert(session.identity.clone(), session.clone());
            Ok(())
        }

        fn remove(&self, identity: &ApplicantId) -> Result<(), StoreError> {
            self.sessions.lock().expect("lock").remove(identity);
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
                .expect("lock")
                .insert(record.identity.clone(), record);
            store
        }

        pub(super) fn record(&self, identity: &ApplicantId) -> Option<HistoryRecord> {
            self.records.lock().expect("lock").get(identity).cloned()
        }
    }

    impl HistoryStore for MemoryHistory {
        fn fetch(&self, identity: &ApplicantId) -> Result<Option<HistoryRecord>, StoreError> {
            Ok(self.records.lock().expect("lock").get(identity).cloned())
        }

        fn archive(&self, record: HistoryRecord) -> Result<(), StoreError> {
            self.records
                .lock()
                .expect("lock")
                .insert(record.identity.clone(), record);
            Ok(())
        }
    }

    pub(super) struct ApprovingAdvisor;

    impl Advisor for ApprovingAdvisor {
        fn recommend(
            &self,
            _context: &AdviceContext<'_>,
        ) -> Result<QualitativeAdvice, AdvisorError> {
            Ok(QualitativeAdvice {
                decision: RecommendedDecision::Approved,
                rationale: "profile within lending appetite".to_string(),
            })
        }
    }

    pub(super) type Service =
        LoanCaseService<MemorySessions, MemoryHistory, InMemoryCaseCorpus, ApprovingAdvisor>;

    pub(super) fn build_service(history: MemoryHistory) -> (Arc<Service>, Arc<MemoryHistory>) {
        let history = Arc::new(history);
        let service = Arc::new(LoanCaseService::new(
            Arc::new(MemorySessions::default()),
            history.clone(),
            Arc::new(seeded_corpus()),
            Arc::new(ApprovingAdvisor),
            DecisionPolicy::default(),
        ));
        (service, history)
    }
}

mod lifecycle {
    use super::common::*;
    use loan_triage::workflows::loan::domain::{CaseState, FinalDecision, RiskLevel};

    #[test]
    fn clean_repeat_customer_is_approved_end_to_end() {
        let (service, history) = build_service(MemoryHistory::seeded(matching_history()));

        service
            .apply_fields(&applicant(), full_update())
            .expect("fields apply");
        let route = service.route(&applicant(), None).expect("route succeeds");
        assert_eq!(route.reason, "pending-verification");

        let report = service.verify(&applicant()).expect("verification succeeds");
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert!(report.has_history);

        let result = service.decide(&applicant()).expect("decision succeeds");
        assert_eq!(result.final_decision, FinalDecision::Approved);
        assert!((result.dbr - 8.7585).abs() < 0.001);
        assert_eq!(result.credit_score, 730);
        let reference = result.reference.expect("reference sample present");
        assert!(reference.approval_rate.expect("rate present") > 0.3);

        service.close_case(&applicant()).expect("close succeeds");
        let archived = history.record(&applicant()).expect("history updated");
        assert_eq!(archived.inquiry_count, 2);
        assert_eq!(archived.last_risk_level, Some(RiskLevel::Low));
    }

    #[test]
    fn inconsistent_declarations_force_reclarification() {
        let mut record = matching_history();
        record.job = Some("Accountant".to_string());
        record.company = Some("Northwind Logistics".to_string());
        let (service, _) = build_service(MemoryHistory::seeded(record));

        service
            .apply_fields(&applicant(), full_update())
            .expect("fields apply");
        service.route(&applicant(), None).expect("route succeeds");

        let report = service.verify(&applicant()).expect("verification succeeds");
        assert_eq!(report.risk_level, RiskLevel::High);
        assert_eq!(report.mismatches.len(), 2);

        let session = service.get(&applicant()).expect("session exists");
        assert_eq!(session.state, CaseState::Mismatch);

        let route = service.route(&applicant(), None).expect("route succeeds");
        assert_eq!(route.reason, "mismatch-reclarify");
    }

    #[test]
    fn overextended_applicant_is_rejected_by_the_safety_guard() {
        let (service, _) = build_service(MemoryHistory::default());

        let mut update = full_update();
        update.monthly_income = Some(10_000);
        service
            .apply_fields(&applicant(), update)
            .expect("fields apply");
        service.route(&applicant(), None).expect("route succeeds");
        service.verify(&applicant()).expect("verification succeeds");

        let result = service.decide(&applicant()).expect("decision succeeds");
        assert_eq!(result.final_decision, FinalDecision::Rejected);
        assert!(result.safety_overridden);
        assert!(result.dbr > 60.0);
    }
}

mod http {
    use super::common::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use loan_triage::workflows::loan::loan_case_router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn json_body(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    fn post(url: String, payload: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(url)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&payload).expect("serialize")))
            .expect("request")
    }

    #[tokio::test]
    async fn case_flows_from_fields_to_decision_over_http() {
        let (service, _) = build_service(MemoryHistory::default());
        let router = loan_case_router(service);
        let base = format!("/api/v1/loan/cases/{}", applicant().0);

        let response = router
            .clone()
            .oneshot(post(
                format!("{base}/fields"),
                serde_json::to_value(full_update()).expect("serialize update"),
            ))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload.get("state"), Some(&json!("ready_for_routing")));

        let response = router
            .clone()
            .oneshot(post(format!("{base}/route"), json!({})))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(post(format!("{base}/verify"), json!({})))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(
            payload
                .get("report")
                .and_then(|report| report.get("has_history")),
            Some(&json!(false))
        );

        let response = router
            .clone()
            .oneshot(post(format!("{base}/decide"), json!({})))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload.get("final_decision"), Some(&json!("APPROVED")));

        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(base)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload.get("state"), Some(&json!("approved")));
    }

    #[tokio::test]
    async fn classifier_scores_are_accepted_but_never_outrank_guardrails() {
        let (service, _) = build_service(MemoryHistory::default());
        let router = loan_case_router(service);
        let base = format!("/api/v1/loan/cases/{}", applicant().0);

        let response = router
            .clone()
            .oneshot(post(
                format!("{base}/fields"),
                serde_json::to_value(full_update()).expect("serialize update"),
            ))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(post(
                format!("{base}/route"),
                json!({ "classifier": { "lde": 0.05, "dve": 0.05, "fre": 0.9 } }),
            ))
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload.get("module"), Some(&json!("DVE")));
        assert_eq!(payload.get("reason"), Some(&json!("pending-verification")));
    }
}
