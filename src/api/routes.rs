//! API route table.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

/// Build the full application router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/sync/start", post(handlers::start_sync))
        .route("/api/v1/sync/jobs", get(handlers::list_jobs))
        .route("/api/v1/sync/jobs/:id", get(handlers::job_status))
        .route("/api/v1/gateway/status", get(handlers::gateway_status))
        .route("/api/v1/gateway/pairing-code", get(handlers::pairing_code))
        .route(
            "/api/v1/notifications/recent",
            get(handlers::recent_notifications),
        )
        .route(
            "/api/v1/learning/:id/validate",
            post(handlers::validate_learning),
        )
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, CompositeClassifier};
    use crate::clients::{
        AiService, AiVerdict, CaseManager, CaseNote, CasePortal, NoteSeverity, PortalCase,
        PortalCredentials,
    };
    use crate::error::{ClassifierError, CrmError, GatewayError, PortalError};
    use crate::gateway::transport::{ConnectionStatus, GatewayTransport};
    use crate::gateway::{SessionArtifacts, SessionManager};
    use crate::learning::LearningStore;
    use crate::notify::{MessageSender, NotificationRouter};
    use crate::storage::audit::NotificationAudit;
    use crate::sync::{MemoryJobStore, Orchestrator};
    use crate::tags::TagReconciler;
    use crate::types::{BenefitKind, CaseRecord, StatusEntry, SyncWindow};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct NullPortal;

    #[async_trait]
    impl CasePortal for NullPortal {
        async fn list_protocols(
            &self,
            _credentials: &PortalCredentials,
            _window: &SyncWindow,
        ) -> Result<Vec<String>, PortalError> {
            Ok(vec![])
        }

        async fn fetch_case(
            &self,
            _credentials: &PortalCredentials,
            protocol: &str,
        ) -> Result<PortalCase, PortalError> {
            Err(PortalError::ProtocolNotFound(protocol.to_string()))
        }
    }

    struct NullCrm;

    #[async_trait]
    impl CaseManager for NullCrm {
        async fn find_case_by_national_id(
            &self,
            _national_id: &str,
        ) -> Result<Option<CaseRecord>, CrmError> {
            Ok(None)
        }

        async fn get_case(&self, crm_id: &str) -> Result<CaseRecord, CrmError> {
            Err(CrmError::CaseNotFound(crm_id.to_string()))
        }

        async fn create_case(
            &self,
            _name: &str,
            _national_id: &str,
            _protocol: &str,
            _benefit: BenefitKind,
        ) -> Result<CaseRecord, CrmError> {
            Err(CrmError::CaseNotFound("stub".into()))
        }

        async fn replace_tags(&self, _crm_id: &str, _tags: &[String]) -> Result<(), CrmError> {
            Ok(())
        }

        async fn create_note(
            &self,
            _crm_id: &str,
            _title: &str,
            _body: &str,
            _severity: NoteSeverity,
        ) -> Result<(), CrmError> {
            Ok(())
        }

        async fn list_notes(&self, _crm_id: &str) -> Result<Vec<CaseNote>, CrmError> {
            Ok(vec![])
        }
    }

    struct NullAi;

    #[async_trait]
    impl AiService for NullAi {
        async fn classify(
            &self,
            _entries: &[StatusEntry],
            protocol: &str,
            _birth_date: Option<NaiveDate>,
        ) -> Result<AiVerdict, ClassifierError> {
            Err(ClassifierError::Service(protocol.to_string()))
        }
    }

    struct NullSender;

    #[async_trait]
    impl MessageSender for NullSender {
        async fn send(&self, _destination: &str, _text: &str) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    struct NullTransport;

    #[async_trait]
    impl GatewayTransport for NullTransport {
        async fn connect(&self) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn request_pairing_code(&self) -> Result<String, GatewayError> {
            Ok("WXYZ-0000".into())
        }

        async fn deliver(&self, _destination: &str, _text: &str) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn probe(&self) -> Result<ConnectionStatus, GatewayError> {
            Ok(ConnectionStatus::Closed)
        }

        async fn close(&self) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn test_app(tmp: &tempfile::TempDir) -> Router {
        let db = sled::Config::new()
            .path(tmp.path().join("db"))
            .temporary(true)
            .open()
            .unwrap();
        let audit = NotificationAudit::open(&db).unwrap();
        let learning = LearningStore::open(&db).unwrap();

        let crm: Arc<dyn CaseManager> = Arc::new(NullCrm);
        let classifier: Arc<dyn Classifier> =
            Arc::new(CompositeClassifier::from_config(Arc::new(NullAi)));
        let router = Arc::new(NotificationRouter::new(
            crm.clone(),
            Arc::new(NullSender),
            audit.clone(),
        ));
        let orchestrator = Orchestrator::new(
            Arc::new(NullPortal),
            crm.clone(),
            classifier,
            Arc::new(TagReconciler::new(crm)),
            router,
            learning.clone(),
            Arc::new(MemoryJobStore::new()),
        );
        let session = SessionManager::new(
            Arc::new(NullTransport),
            SessionArtifacts::new(tmp.path().join("session")),
            Duration::from_millis(1),
            Duration::from_millis(1),
            3,
            Duration::from_millis(1),
        );

        api_routes(AppState {
            orchestrator,
            session,
            audit,
            learning,
        })
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(&tmp);

        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(&tmp);

        let resp = app
            .oneshot(
                Request::get(format!("/api/v1/sync/jobs/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_start_without_credentials_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(&tmp);

        let resp = app
            .oneshot(
                Request::post("/api/v1/sync/start")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"cpf": "", "password": ""}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_start_then_same_day_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(&tmp);
        let body = r#"{"cpf": "12345678901", "password": "secret"}"#;

        let resp = app
            .clone()
            .oneshot(
                Request::post("/api/v1/sync/start")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let resp = app
            .oneshot(
                Request::post("/api/v1/sync/start")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_pairing_code_endpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(&tmp);

        // Nothing pending before start.
        let resp = app
            .clone()
            .oneshot(
                Request::get("/api/v1/gateway/pairing-code")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app
            .oneshot(
                Request::get("/api/v1/gateway/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_recent_notifications_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(&tmp);

        let resp = app
            .oneshot(
                Request::get("/api/v1/notifications/recent?limit=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["data"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_validate_unknown_entry_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_app(&tmp);

        let resp = app
            .oneshot(
                Request::post("/api/v1/learning/42/validate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"is_correct": true, "validator": "ana"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
