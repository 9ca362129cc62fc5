//! services/api/src/adapters/backend.rs
//!
//! This module contains the adapter for the lending backend's REST API.
//! It implements the `CaseBackend` port from the `core` crate using `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use case_desk_core::{
    domain::{
        AuthSession, Bank, BankDocumentConfig, Case, CaseCounts, CaseQueue, ClientCredentials,
        ClientKind, Document, DocumentUpload, DownloadedFile, LeadEdit, ProvisionalDocument,
        StaffMember,
    },
    ports::{CaseBackend, PortError, PortResult},
    status::{BankStatus, CaseStatus},
};
use reqwest::{header::CONTENT_TYPE, multipart, Client, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::busy::BusyTracker;
use super::records::{
    counts_from_value, BankConfigBody, BankAssignmentRecord, BankRecord, CaseRecord,
    ClientCredentialsRecord, CommentBody, DocumentConfigBody, DocumentRecord,
    GenerateClientBody, ItemEnvelope, LeadEditBody, ListEnvelope, ProvisionalBody,
    ProvisionalRecord, StaffEnvelope, StatusBody, WorkflowBody,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CaseBackend` over the lending backend's HTTP API.
///
/// Every call is counted by the shared [`BusyTracker`] for as long as it is
/// in flight, response body included.
#[derive(Clone)]
pub struct HttpBackendAdapter {
    client: Client,
    base_url: Url,
    busy: BusyTracker,
}

impl HttpBackendAdapter {
    /// Creates a new `HttpBackendAdapter` rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Option<Duration>, busy: BusyTracker) -> PortResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| PortError::Unexpected(format!("invalid backend url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(PortError::Unexpected(format!(
                "backend url cannot be a base: {}",
                base_url
            )));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| PortError::Unexpected(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            busy,
        })
    }

    pub fn busy(&self) -> &BusyTracker {
        &self.busy
    }

    /// Appends percent-encoded path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn get(&self, auth: &AuthSession, segments: &[&str]) -> RequestBuilder {
        self.client.get(self.url(segments)).bearer_auth(&auth.token)
    }

    fn post(&self, auth: &AuthSession, segments: &[&str]) -> RequestBuilder {
        self.client.post(self.url(segments)).bearer_auth(&auth.token)
    }

    fn patch(&self, auth: &AuthSession, segments: &[&str]) -> RequestBuilder {
        self.client.patch(self.url(segments)).bearer_auth(&auth.token)
    }

    fn put(&self, auth: &AuthSession, segments: &[&str]) -> RequestBuilder {
        self.client.put(self.url(segments)).bearer_auth(&auth.token)
    }

    fn delete(&self, auth: &AuthSession, segments: &[&str]) -> RequestBuilder {
        self.client.delete(self.url(segments)).bearer_auth(&auth.token)
    }

    async fn send(&self, request: RequestBuilder) -> PortResult<Response> {
        let request = request.build().map_err(transport)?;
        debug!(method = %request.method(), path = request.url().path(), "Calling backend");
        let response = self.client.execute(request).await.map_err(transport)?;
        checked(response).await
    }

    /// Sends a request and decodes a JSON response body.
    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> PortResult<T> {
        let _busy = self.busy.begin();
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("malformed backend response: {}", e)))
    }

    /// Sends a request whose response body, if any, is ignored.
    async fn execute(&self, request: RequestBuilder) -> PortResult<()> {
        let _busy = self.busy.begin();
        self.send(request).await?;
        Ok(())
    }
}

//=========================================================================================
// Response Handling
//=========================================================================================

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn transport(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Unexpected("the backend did not answer in time".to_string())
    } else {
        PortError::Unexpected(e.to_string())
    }
}

/// Maps a non-success response to the matching `PortError`, preferring the
/// backend's own `message` when it sends one.
async fn checked(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageBody>(&body)
        .ok()
        .and_then(|m| m.message.or(m.error))
        .unwrap_or_else(|| body.trim().to_string());
    let message = if message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        message
    };
    debug!(status = status.as_u16(), message = %message, "Backend answered with an error");

    Err(match status.as_u16() {
        401 => PortError::Unauthorized,
        404 => PortError::NotFound(message),
        code => PortError::Rejected {
            status: code,
            message,
        },
    })
}

fn decode_cases(records: Vec<CaseRecord>) -> Vec<Case> {
    records
        .into_iter()
        .filter_map(|record| match record.to_domain() {
            Ok(case) => Some(case),
            Err(e) => {
                warn!(error = %e, "Dropping case the gateway cannot interpret");
                None
            }
        })
        .collect()
}

//=========================================================================================
// `CaseBackend` Trait Implementation
//=========================================================================================

#[async_trait]
impl CaseBackend for HttpBackendAdapter {
    async fn list_cases(&self, auth: &AuthSession, queue: CaseQueue) -> PortResult<Vec<Case>> {
        let mut request = self.get(auth, &["cases"]);
        if queue == CaseQueue::Underwriting {
            request = request.query(&[("role", "uw")]);
        }
        let records: ListEnvelope<CaseRecord> = self.fetch_json(request).await?;
        Ok(decode_cases(records.into_vec()))
    }

    async fn get_case(&self, auth: &AuthSession, case_id: &str) -> PortResult<Case> {
        let record: ItemEnvelope<CaseRecord> =
            self.fetch_json(self.get(auth, &["cases", case_id])).await?;
        record.into_inner().to_domain()
    }

    async fn case_counts(&self, auth: &AuthSession) -> PortResult<CaseCounts> {
        let mut value: Value = self.fetch_json(self.get(auth, &["cases", "counts"])).await?;
        if let Some(inner) = value.get_mut("counts").map(Value::take) {
            value = inner;
        }
        counts_from_value(value)
    }

    async fn update_status(
        &self,
        auth: &AuthSession,
        case_id: &str,
        status: CaseStatus,
    ) -> PortResult<()> {
        let body = StatusBody {
            status: status.as_str(),
        };
        self.execute(self.patch(auth, &["cases", case_id, "status"]).json(&body))
            .await
    }

    async fn update_bank_status(
        &self,
        auth: &AuthSession,
        case_id: &str,
        status: BankStatus,
    ) -> PortResult<()> {
        let body = StatusBody {
            status: status.as_str(),
        };
        self.execute(self.patch(auth, &["cases", case_id, "bankstatus"]).json(&body))
            .await
    }

    async fn edit_case(&self, auth: &AuthSession, case_id: &str, edit: &LeadEdit) -> PortResult<()> {
        let body = LeadEditBody {
            companyname: edit.company_name.trim(),
            clientname: edit.client_name.trim(),
            phone: edit.phone.trim(),
            email: edit.email.as_deref(),
            location: edit.location.as_deref(),
            requirement_amount: edit.requirement_amount,
            productname: edit.product_name.as_deref(),
            kam_email: edit.kam_email.as_deref(),
            telecaller_email: edit.telecaller_email.as_deref(),
        };
        self.execute(self.put(auth, &["cases", "edit", case_id]).json(&body))
            .await
    }

    async fn generate_client(
        &self,
        auth: &AuthSession,
        case_id: &str,
        kind: ClientKind,
    ) -> PortResult<ClientCredentials> {
        let body = GenerateClientBody {
            kind: kind.as_str(),
        };
        let record: ItemEnvelope<ClientCredentialsRecord> = self
            .fetch_json(
                self.post(auth, &["cases", case_id, "generate-client"])
                    .json(&body),
            )
            .await?;
        Ok(record.into_inner().to_domain())
    }

    async fn update_workflow(
        &self,
        auth: &AuthSession,
        case_id: &str,
        stage: CaseStatus,
    ) -> PortResult<()> {
        let body = WorkflowBody {
            caseid: case_id,
            stage: stage.as_str(),
        };
        self.execute(self.post(auth, &["workflow", "update"]).json(&body))
            .await
    }

    async fn list_provisional_documents(
        &self,
        auth: &AuthSession,
        case_id: &str,
    ) -> PortResult<Vec<ProvisionalDocument>> {
        let records: ListEnvelope<ProvisionalRecord> = self
            .fetch_json(self.get(auth, &["cases", case_id, "provisional-documents"]))
            .await?;
        Ok(records
            .into_vec()
            .into_iter()
            .map(ProvisionalRecord::to_domain)
            .collect())
    }

    async fn add_provisional_document(
        &self,
        auth: &AuthSession,
        case_id: &str,
        docname: &str,
    ) -> PortResult<ProvisionalDocument> {
        let record: ItemEnvelope<ProvisionalRecord> = self
            .fetch_json(
                self.post(auth, &["cases", case_id, "provisional-documents"])
                    .json(&ProvisionalBody { docname }),
            )
            .await?;
        Ok(record.into_inner().to_domain())
    }

    async fn delete_provisional_document(
        &self,
        auth: &AuthSession,
        case_id: &str,
        document_id: &str,
    ) -> PortResult<()> {
        self.execute(self.delete(
            auth,
            &["cases", case_id, "provisional-documents", document_id],
        ))
        .await
    }

    async fn get_document_config(
        &self,
        auth: &AuthSession,
        case_id: &str,
    ) -> PortResult<Vec<BankDocumentConfig>> {
        let records: ListEnvelope<BankAssignmentRecord> = self
            .fetch_json(self.get(auth, &["cases", case_id, "document-config"]))
            .await?;
        Ok(records
            .into_vec()
            .into_iter()
            .map(BankAssignmentRecord::to_config)
            .collect())
    }

    async fn save_document_config(
        &self,
        auth: &AuthSession,
        case_id: &str,
        configs: &[BankDocumentConfig],
    ) -> PortResult<()> {
        let body = DocumentConfigBody {
            banks: configs.iter().map(BankConfigBody::from).collect(),
        };
        self.execute(
            self.post(auth, &["cases", case_id, "document-config"])
                .json(&body),
        )
        .await
    }

    async fn upload_document(
        &self,
        auth: &AuthSession,
        upload: DocumentUpload,
    ) -> PortResult<Document> {
        let mut file = multipart::Part::bytes(upload.bytes.to_vec()).file_name(upload.file_name);
        if let Some(content_type) = upload.content_type.as_deref() {
            file = file
                .mime_str(content_type)
                .map_err(|e| PortError::Unexpected(format!("invalid content type: {}", e)))?;
        }
        let form = multipart::Form::new()
            .text("caseid", upload.case_id.clone())
            .text("doctype", upload.doctype.as_str())
            .text("docname", upload.docname)
            .part("file", file);

        let record: ItemEnvelope<DocumentRecord> = self
            .fetch_json(self.post(auth, &["documents", "upload"]).multipart(form))
            .await?;
        record.into_inner().to_domain(&upload.case_id).ok_or_else(|| {
            PortError::Unexpected("uploaded document came back with an unknown type".to_string())
        })
    }

    async fn delete_document(&self, auth: &AuthSession, document_id: &str) -> PortResult<()> {
        self.execute(self.delete(auth, &["documents", document_id]))
            .await
    }

    async fn download_document(
        &self,
        auth: &AuthSession,
        file_name: &str,
    ) -> PortResult<DownloadedFile> {
        let _busy = self.busy.begin();
        let request = self.get(auth, &["documents", "downloadNew", file_name]);
        let response = self.send(request).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(transport)?;
        Ok(DownloadedFile {
            file_name: file_name.to_string(),
            content_type,
            bytes,
        })
    }

    async fn add_comment(&self, auth: &AuthSession, case_id: &str, text: &str) -> PortResult<()> {
        let body = CommentBody {
            caseid: case_id,
            text,
        };
        self.execute(self.post(auth, &["comments"]).json(&body))
            .await
    }

    async fn list_banks(&self, auth: &AuthSession) -> PortResult<Vec<Bank>> {
        let records: ListEnvelope<BankRecord> = self.fetch_json(self.get(auth, &["banks"])).await?;
        Ok(records.into_vec().into_iter().map(BankRecord::to_domain).collect())
    }

    async fn list_banks_for_product(
        &self,
        auth: &AuthSession,
        product_name: &str,
    ) -> PortResult<Vec<Bank>> {
        let records: ListEnvelope<BankRecord> = self
            .fetch_json(self.get(auth, &["banks", "products", product_name]))
            .await?;
        Ok(records.into_vec().into_iter().map(BankRecord::to_domain).collect())
    }

    async fn list_staff(&self, auth: &AuthSession) -> PortResult<Vec<StaffMember>> {
        let staff: StaffEnvelope = self
            .fetch_json(self.get(auth, &["users", "getKamAndTelecallers"]))
            .await?;
        Ok(staff.into_domain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Multipart, Path, Query},
        http::{HeaderMap, StatusCode},
        routing::{get, patch, post},
        Json, Router,
    };
    use bytes::Bytes;
    use case_desk_core::domain::{DocType, DocumentKey, Role};
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<String>>>;

    fn auth() -> AuthSession {
        AuthSession {
            token: "tok-123".to_string(),
            user_id: "u1".to_string(),
            role: Role::Operations,
        }
    }

    fn bearer(headers: &HeaderMap) -> String {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/", addr)
    }

    fn fake_backend(seen: Seen) -> Router {
        let cases_seen = seen.clone();
        let status_seen = seen.clone();
        let config_seen = seen.clone();
        Router::new()
            .route(
                "/api/cases",
                get(move |headers: HeaderMap, Query(q): Query<HashMap<String, String>>| {
                    let seen = cases_seen.clone();
                    async move {
                        seen.lock().unwrap().push(format!(
                            "list:{}:{}",
                            bearer(&headers),
                            q.get("role").cloned().unwrap_or_default()
                        ));
                        Json(json!([
                            {"caseid": 1, "companyname": "Acme", "status": "Open"},
                            {"caseid": 2, "companyname": "Bogus", "status": "Archived"}
                        ]))
                    }
                }),
            )
            .route(
                "/api/cases/{id}",
                get(|Path(id): Path<String>| async move {
                    if id == "missing" {
                        return (StatusCode::NOT_FOUND, Json(json!({"message": "Case not found"})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({"case": {"id": id, "companyname": "Acme", "status": "One Pager"}})),
                    )
                }),
            )
            .route(
                "/api/cases/counts",
                get(|| async { Json(json!({"counts": {"Open": 4, "Underwriting": 1}})) }),
            )
            .route(
                "/api/cases/{id}/status",
                patch(move |Path(id): Path<String>, Json(body): Json<Value>| {
                    let seen = status_seen.clone();
                    async move {
                        if id == "locked" {
                            return (StatusCode::CONFLICT, Json(json!({"message": "Case is locked"})));
                        }
                        seen.lock().unwrap().push(format!("status:{}:{}", id, body["status"]));
                        (StatusCode::OK, Json(json!({"ok": true})))
                    }
                }),
            )
            .route(
                "/api/cases/{id}/document-config",
                post(move |Json(body): Json<Value>| {
                    let seen = config_seen.clone();
                    async move {
                        seen.lock().unwrap().push(body.to_string());
                        StatusCode::NO_CONTENT
                    }
                }),
            )
            .route(
                "/api/documents/upload",
                post(|mut multipart: Multipart| async move {
                    let mut fields = HashMap::new();
                    while let Some(field) = multipart.next_field().await.unwrap() {
                        let name = field.name().unwrap_or_default().to_string();
                        let value = match field.file_name() {
                            Some(file_name) => file_name.to_string(),
                            None => field.text().await.unwrap(),
                        };
                        fields.insert(name, value);
                    }
                    Json(json!({"document": {
                        "id": 77,
                        "docname": fields["docname"],
                        "doctype": fields["doctype"],
                        "filename": fields["file"],
                    }}))
                }),
            )
            .route(
                "/api/documents/downloadNew/{name}",
                get(|Path(name): Path<String>| async move {
                    ([("content-type", "application/pdf")], format!("bytes of {}", name))
                }),
            )
            .route(
                "/api/users/getKamAndTelecallers",
                get(|| async {
                    (StatusCode::UNAUTHORIZED, Json(json!({"message": "token expired"})))
                }),
            )
    }

    async fn adapter(seen: Seen) -> HttpBackendAdapter {
        let base = serve(fake_backend(seen)).await;
        HttpBackendAdapter::new(&base, Some(Duration::from_secs(5)), BusyTracker::new()).unwrap()
    }

    #[tokio::test]
    async fn lists_cases_with_token_and_queue() {
        let seen = Seen::default();
        let backend = adapter(seen.clone()).await;

        let cases = backend
            .list_cases(&auth(), CaseQueue::Underwriting)
            .await
            .unwrap();

        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].id, "1");
        assert_eq!(seen.lock().unwrap()[0], "list:Bearer tok-123:uw");
        assert_eq!(backend.busy().in_flight(), 0);
    }

    #[tokio::test]
    async fn fetches_wrapped_case_and_maps_missing() {
        let backend = adapter(Seen::default()).await;

        let case = backend.get_case(&auth(), "c-9").await.unwrap();
        assert_eq!(case.status, CaseStatus::OnePager);

        let err = backend.get_case(&auth(), "missing").await.unwrap_err();
        assert_eq!(err, PortError::NotFound("Case not found".to_string()));
    }

    #[tokio::test]
    async fn counts_are_unwrapped() {
        let backend = adapter(Seen::default()).await;
        let counts = backend.case_counts(&auth()).await.unwrap();
        assert_eq!(counts.total, 5);
        assert_eq!(counts.by_status.get(&CaseStatus::Open), Some(&4));
    }

    #[tokio::test]
    async fn status_update_sends_canonical_string() {
        let seen = Seen::default();
        let backend = adapter(seen.clone()).await;

        backend
            .update_status(&auth(), "c1", CaseStatus::DocumentationInProgress)
            .await
            .unwrap();
        assert_eq!(
            seen.lock().unwrap()[0],
            "status:c1:\"Documentation In Progress\""
        );

        let err = backend
            .update_status(&auth(), "locked", CaseStatus::Underwriting)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PortError::Rejected {
                status: 409,
                message: "Case is locked".to_string()
            }
        );
    }

    #[tokio::test]
    async fn expired_token_is_unauthorized() {
        let backend = adapter(Seen::default()).await;
        let err = backend.list_staff(&auth()).await.unwrap_err();
        assert_eq!(err, PortError::Unauthorized);
        assert_eq!(backend.busy().in_flight(), 0);
    }

    #[tokio::test]
    async fn document_config_is_posted_with_composite_keys() {
        let seen = Seen::default();
        let backend = adapter(seen.clone()).await;

        let mut documents = BTreeMap::new();
        documents.insert(DocumentKey::new(DocType::PartA, "PAN Card"), true);
        let config = BankDocumentConfig {
            bank_id: "b1".to_string(),
            bank_name: "HDFC".to_string(),
            documents,
        };
        backend
            .save_document_config(&auth(), "c1", &[config])
            .await
            .unwrap();

        let body: Value = serde_json::from_str(&seen.lock().unwrap()[0]).unwrap();
        assert_eq!(body["banks"][0]["bankid"], json!("b1"));
        assert_eq!(body["banks"][0]["document_config"]["partA_PAN Card"], json!(true));
    }

    #[tokio::test]
    async fn uploads_multipart_and_decodes_document() {
        let backend = adapter(Seen::default()).await;
        let upload = DocumentUpload {
            case_id: "c1".to_string(),
            doctype: DocType::PartB,
            docname: "Sanction Letters".to_string(),
            file_name: "sanction.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            bytes: Bytes::from_static(b"%PDF-1.4"),
        };

        let document = backend.upload_document(&auth(), upload).await.unwrap();

        assert_eq!(document.id, "77");
        assert_eq!(document.case_id, "c1");
        assert_eq!(document.doctype, DocType::PartB);
        assert_eq!(document.file_name, "sanction.pdf");
    }

    #[tokio::test]
    async fn downloads_keep_content_type() {
        let backend = adapter(Seen::default()).await;
        let file = backend
            .download_document(&auth(), "pan card.pdf")
            .await
            .unwrap();
        assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(file.bytes, Bytes::from("bytes of pan card.pdf"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_unexpected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = HttpBackendAdapter::new(
            &format!("http://{}", addr),
            Some(Duration::from_secs(2)),
            BusyTracker::new(),
        )
        .unwrap();
        let err = backend.list_banks(&auth()).await.unwrap_err();
        assert!(matches!(err, PortError::Unexpected(_)));
        assert_eq!(backend.busy().in_flight(), 0);
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(HttpBackendAdapter::new("mailto:ops@example.com", None, BusyTracker::new()).is_err());
    }
}
