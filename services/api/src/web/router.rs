//! services/api/src/web/router.rs
//!
//! Assembles the gateway's router: public and protected routes, the auth
//! middleware, CORS, request tracing, and the Swagger UI.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConfigError;
use crate::error::ApiError;
use crate::web::middleware::{require_auth, USER_ID_HEADER, USER_ROLE_HEADER};
use crate::web::rest::*;
use crate::web::state::AppState;

fn cors_layer(origin: &str) -> Result<CorsLayer, ApiError> {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        let value = origin.parse::<HeaderValue>().map_err(|e| {
            ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
        })?;
        AllowOrigin::exact(value)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(USER_ROLE_HEADER),
        ]))
}

/// Builds the complete application router.
pub fn build_router(state: Arc<AppState>) -> Result<Router, ApiError> {
    let cors = cors_layer(&state.config.cors_origin)?;

    // Public routes (no session required)
    let public_routes = Router::new().route("/health", get(health_handler));

    // Protected routes (session required)
    let protected_routes = Router::new()
        .route("/cases", get(list_cases_handler))
        .route("/cases/counts", get(case_counts_handler))
        .route("/cases/{id}", get(case_view_handler).put(edit_lead_handler))
        .route("/cases/{id}/status", patch(change_status_handler))
        .route("/cases/{id}/meeting-done", post(meeting_done_handler))
        .route("/cases/{id}/no-requirement", post(no_requirement_handler))
        .route("/cases/{id}/bankstatus", patch(bank_status_handler))
        .route("/cases/{id}/generate-client", post(generate_client_handler))
        .route(
            "/cases/{id}/provisional-documents",
            get(list_provisional_handler).post(add_provisional_handler),
        )
        .route(
            "/cases/{id}/provisional-documents/{doc_id}",
            delete(delete_provisional_handler),
        )
        .route(
            "/cases/{id}/document-config",
            get(get_document_config_handler).put(save_document_config_handler),
        )
        .route("/cases/{id}/documents", post(upload_document_handler))
        .route("/cases/{id}/documents/bulk", post(upload_bulk_handler))
        .route("/cases/{id}/documents/{doc_id}", delete(delete_document_handler))
        .route("/cases/{id}/comments", post(add_comment_handler))
        .route("/documents/{filename}", get(download_document_handler))
        .route("/banks", get(list_banks_handler))
        .route("/banks/products/{product}", get(banks_for_product_handler))
        .route("/staff", get(list_staff_handler))
        .layer(axum_middleware::from_fn(require_auth));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::BusyTracker;
    use crate::config::Config;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use bytes::Bytes;
    use case_desk_core::{
        domain::{
            AuthSession, Bank, BankDocumentConfig, Case, CaseCounts, CaseQueue,
            ClientCredentials, ClientKind, Document, DocumentUpload, DownloadedFile,
            LeadEdit, ProvisionalDocument, StaffMember,
        },
        ports::{CaseBackend, PortError, PortResult},
        status::{BankStatus, CaseStatus},
        CaseFlow,
    };
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt;

    //=====================================================================================
    // In-memory backend holding a single case
    //=====================================================================================

    struct FakeBackend {
        case: Mutex<Case>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn with_status(status: CaseStatus) -> Arc<Self> {
            Arc::new(Self {
                case: Mutex::new(Case {
                    id: "c1".to_string(),
                    company_name: "Acme Foods".to_string(),
                    client_name: "Ravi Mehta".to_string(),
                    status,
                    ..Default::default()
                }),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn case_for(&self, case_id: &str) -> PortResult<Case> {
            let case = self.case.lock().unwrap().clone();
            if case.id == case_id {
                Ok(case)
            } else {
                Err(PortError::NotFound(format!("case {}", case_id)))
            }
        }
    }

    #[async_trait]
    impl CaseBackend for FakeBackend {
        async fn list_cases(&self, _: &AuthSession, _: CaseQueue) -> PortResult<Vec<Case>> {
            Ok(vec![self.case.lock().unwrap().clone()])
        }

        async fn get_case(&self, _: &AuthSession, case_id: &str) -> PortResult<Case> {
            self.case_for(case_id)
        }

        async fn case_counts(&self, _: &AuthSession) -> PortResult<CaseCounts> {
            Ok(CaseCounts::default())
        }

        async fn update_status(
            &self,
            _: &AuthSession,
            _: &str,
            status: CaseStatus,
        ) -> PortResult<()> {
            self.record(format!("update_status:{}", status));
            self.case.lock().unwrap().status = status;
            Ok(())
        }

        async fn update_bank_status(
            &self,
            _: &AuthSession,
            _: &str,
            status: BankStatus,
        ) -> PortResult<()> {
            self.record(format!("update_bank_status:{}", status));
            Ok(())
        }

        async fn edit_case(&self, _: &AuthSession, _: &str, _: &LeadEdit) -> PortResult<()> {
            self.record("edit_case".to_string());
            Ok(())
        }

        async fn generate_client(
            &self,
            _: &AuthSession,
            _: &str,
            _: ClientKind,
        ) -> PortResult<ClientCredentials> {
            Ok(ClientCredentials {
                username: "acme".to_string(),
                password: Some("secret".to_string()),
            })
        }

        async fn update_workflow(
            &self,
            _: &AuthSession,
            _: &str,
            stage: CaseStatus,
        ) -> PortResult<()> {
            self.record(format!("update_workflow:{}", stage));
            Ok(())
        }

        async fn list_provisional_documents(
            &self,
            _: &AuthSession,
            _: &str,
        ) -> PortResult<Vec<ProvisionalDocument>> {
            Ok(Vec::new())
        }

        async fn add_provisional_document(
            &self,
            _: &AuthSession,
            _: &str,
            docname: &str,
        ) -> PortResult<ProvisionalDocument> {
            Ok(ProvisionalDocument {
                id: "p1".to_string(),
                docname: docname.to_string(),
            })
        }

        async fn delete_provisional_document(
            &self,
            _: &AuthSession,
            _: &str,
            _: &str,
        ) -> PortResult<()> {
            Ok(())
        }

        async fn get_document_config(
            &self,
            _: &AuthSession,
            _: &str,
        ) -> PortResult<Vec<BankDocumentConfig>> {
            Ok(Vec::new())
        }

        async fn save_document_config(
            &self,
            _: &AuthSession,
            _: &str,
            configs: &[BankDocumentConfig],
        ) -> PortResult<()> {
            self.record(format!("save_document_config:{}", configs.len()));
            Ok(())
        }

        async fn upload_document(
            &self,
            _: &AuthSession,
            upload: DocumentUpload,
        ) -> PortResult<Document> {
            self.record(format!("upload:{}:{}", upload.doctype, upload.docname));
            let mut case = self.case.lock().unwrap();
            let document = Document {
                id: format!("d{}", case.documents.len() + 1),
                case_id: upload.case_id,
                docname: upload.docname,
                doctype: upload.doctype,
                file_name: upload.file_name,
                url: None,
                uploaded_at: Some(Utc::now()),
            };
            case.documents.push(document.clone());
            Ok(document)
        }

        async fn delete_document(&self, _: &AuthSession, document_id: &str) -> PortResult<()> {
            self.case
                .lock()
                .unwrap()
                .documents
                .retain(|d| d.id != document_id);
            Ok(())
        }

        async fn download_document(
            &self,
            _: &AuthSession,
            file_name: &str,
        ) -> PortResult<DownloadedFile> {
            Ok(DownloadedFile {
                file_name: file_name.to_string(),
                content_type: Some("application/pdf".to_string()),
                bytes: Bytes::from_static(b"%PDF"),
            })
        }

        async fn add_comment(&self, _: &AuthSession, _: &str, text: &str) -> PortResult<()> {
            self.record(format!("comment:{}", text));
            Ok(())
        }

        async fn list_banks(&self, _: &AuthSession) -> PortResult<Vec<Bank>> {
            Ok(vec![
                Bank {
                    id: "b1".to_string(),
                    name: "HDFC Bank".to_string(),
                    email: None,
                    phone: None,
                },
                Bank {
                    id: "b2".to_string(),
                    name: "State Bank".to_string(),
                    email: Some("loans@sbi.example".to_string()),
                    phone: None,
                },
            ])
        }

        async fn list_banks_for_product(
            &self,
            _: &AuthSession,
            _: &str,
        ) -> PortResult<Vec<Bank>> {
            Err(PortError::Unexpected("product index offline".to_string()))
        }

        async fn list_staff(&self, _: &AuthSession) -> PortResult<Vec<StaffMember>> {
            Ok(Vec::new())
        }
    }

    //=====================================================================================
    // Helpers
    //=====================================================================================

    fn app(backend: Arc<FakeBackend>) -> Router {
        let config = Config::from_lookup(|key| match key {
            "BACKEND_URL" => Some("http://backend.test".to_string()),
            _ => None,
        })
        .unwrap();
        let state = Arc::new(AppState {
            flow: CaseFlow::new(backend),
            busy: BusyTracker::new(),
            config: Arc::new(config),
        });
        build_router(state).unwrap()
    }

    fn request(method: &str, uri: &str, role: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", "Bearer tok")
            .header("x-user-id", "u1")
            .header("x-user-role", role)
    }

    fn json_request(method: &str, uri: &str, role: &str, body: Value) -> Request<Body> {
        request(method, uri, role)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn multipart_body(boundary: &str, fields: &[(&str, &str)], files: &[&str]) -> String {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        for file in files {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file}\"\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.4\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        body
    }

    //=====================================================================================
    // Tests
    //=====================================================================================

    #[tokio::test]
    async fn health_is_public() {
        let response = app(FakeBackend::with_status(CaseStatus::Open))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok", "in_flight": 0}));
    }

    #[tokio::test]
    async fn protected_routes_need_a_session() {
        let response = app(FakeBackend::with_status(CaseStatus::Open))
            .oneshot(Request::get("/cases/c1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn case_view_lists_permitted_actions() {
        let response = app(FakeBackend::with_status(CaseStatus::Open))
            .oneshot(request("GET", "/cases/c1", "operations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = body_json(response).await;
        assert_eq!(body["case"]["status"], "Open");
        let actions: Vec<&str> = body["actions"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(actions.contains(&"mark_meeting_done"));
        assert!(actions.contains(&"change_status"));
        assert_eq!(body["checklist"]["part_a"]["missing"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn unknown_case_is_not_found() {
        let response = app(FakeBackend::with_status(CaseStatus::Open))
            .oneshot(request("GET", "/cases/zz", "operations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn operations_change_status() {
        let backend = FakeBackend::with_status(CaseStatus::Open);
        let response = app(backend.clone())
            .oneshot(json_request(
                "PATCH",
                "/cases/c1/status",
                "operations",
                json!({"status": "Meeting Done"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["case"]["status"], "Meeting Done");
        assert_eq!(backend.calls(), vec!["update_status:Meeting Done"]);
    }

    #[tokio::test]
    async fn unknown_status_names_are_bad_requests() {
        let backend = FakeBackend::with_status(CaseStatus::Open);
        let response = app(backend.clone())
            .oneshot(json_request(
                "PATCH",
                "/cases/c1/status",
                "operations",
                json!({"status": "meeting done"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn kam_cannot_change_status() {
        let backend = FakeBackend::with_status(CaseStatus::Open);
        let response = app(backend.clone())
            .oneshot(json_request(
                "PATCH",
                "/cases/c1/status",
                "kam",
                json!({"status": "Underwriting"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn blank_comment_never_reaches_backend() {
        let backend = FakeBackend::with_status(CaseStatus::Open);
        let response = app(backend.clone())
            .oneshot(json_request(
                "POST",
                "/cases/c1/comments",
                "kam",
                json!({"text": "   "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn one_pager_upload_moves_case_forward() {
        let backend = FakeBackend::with_status(CaseStatus::Underwriting);
        let boundary = "XBOUNDARY";
        let body = multipart_body(
            boundary,
            &[("doctype", "onePager"), ("docname", "One Pager")],
            &["one-pager.pdf"],
        );
        let response = app(backend.clone())
            .oneshot(
                request("POST", "/cases/c1/documents", "underwriting")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={}", boundary),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["transition"]["result"], "applied");
        assert_eq!(body["transition"]["to"], "One Pager");
        assert_eq!(body["view"]["case"]["status"], "One Pager");
        assert_eq!(
            backend.calls(),
            vec![
                "upload:onePager:One Pager",
                "update_status:One Pager",
                "update_workflow:One Pager"
            ]
        );
    }

    #[tokio::test]
    async fn bulk_upload_reports_skipped_files() {
        let backend = FakeBackend::with_status(CaseStatus::MeetingDone);
        let boundary = "BULK";
        let body = multipart_body(
            boundary,
            &[("doctype", "partA")],
            &["acme_pan_card.pdf", "holiday-photo.jpg"],
        );
        let response = app(backend.clone())
            .oneshot(
                request("POST", "/cases/c1/documents/bulk", "underwriting")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={}", boundary),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["uploaded"][0]["docname"], "PAN Card");
        assert_eq!(body["skipped"], json!(["holiday-photo.jpg"]));
        assert!(body["failed"].is_null());
        assert_eq!(body["transition"]["to"], "Documentation In Progress");
    }

    #[tokio::test]
    async fn document_config_accepts_composite_keys() {
        let backend = FakeBackend::with_status(CaseStatus::OnePager);
        let response = app(backend.clone())
            .oneshot(json_request(
                "PUT",
                "/cases/c1/document-config",
                "operations",
                json!({"banks": [{"bank_id": "b1", "bank_name": "HDFC Bank",
                                  "documents": {"partA_PAN Card": true}}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["banks"][0]["documents"]["partA_PAN Card"], true);
        assert_eq!(backend.calls(), vec!["save_document_config:1"]);
    }

    #[tokio::test]
    async fn malformed_document_config_key_is_rejected() {
        let backend = FakeBackend::with_status(CaseStatus::OnePager);
        for key in ["PAN Card", "partC_PAN Card"] {
            let response = app(backend.clone())
                .oneshot(json_request(
                    "PUT",
                    "/cases/c1/document-config",
                    "operations",
                    json!({"banks": [{"bank_id": "b1", "documents": {key: true}}]}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{key}");
            let body = body_json(response).await;
            assert!(body["error"]["message"].as_str().unwrap().contains(key));
        }
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn bank_search_filters_by_query() {
        let response = app(FakeBackend::with_status(CaseStatus::Open))
            .oneshot(request("GET", "/banks?q=sbi", "operations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], "b2");
    }

    #[tokio::test]
    async fn product_banks_are_best_effort() {
        let response = app(FakeBackend::with_status(CaseStatus::Open))
            .oneshot(
                request("GET", "/banks/products/term%20loan", "operations")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn downloads_are_proxied_with_content_type() {
        let response = app(FakeBackend::with_status(CaseStatus::Open))
            .oneshot(
                request("GET", "/documents/pan.pdf", "operations")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/pdf");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"%PDF");
    }

    #[test]
    fn invalid_cors_origin_is_a_config_error() {
        assert!(matches!(
            cors_layer("http://bad\norigin"),
            Err(ApiError::Config(_))
        ));
    }
}
