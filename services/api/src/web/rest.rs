//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart, Path, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use case_desk_core::{
    domain::{AuthSession, CaseQueue, ClientKind, DocType, LeadEdit},
    status::{BankStatus, CaseStatus},
    PendingFile,
};
use tracing::info;
use utoipa::OpenApi;

use crate::error::{ApiError, ErrorBody, ErrorDetail};
use crate::web::protocol::*;
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_cases_handler,
        case_counts_handler,
        case_view_handler,
        change_status_handler,
        meeting_done_handler,
        no_requirement_handler,
        bank_status_handler,
        edit_lead_handler,
        generate_client_handler,
        list_provisional_handler,
        add_provisional_handler,
        delete_provisional_handler,
        get_document_config_handler,
        save_document_config_handler,
        upload_document_handler,
        upload_bulk_handler,
        delete_document_handler,
        download_document_handler,
        add_comment_handler,
        list_banks_handler,
        banks_for_product_handler,
        list_staff_handler,
    ),
    components(
        schemas(
            ErrorBody, ErrorDetail, HealthResponse, CaseSummaryDto, CaseDto, CaseViewResponse,
            AssignmentDto, DocumentDto, BankAssignmentDto, CommentDto, ProvisionalDocumentDto,
            CategoryDto, ChecklistDto, TransitionDto, DocumentOutcomeResponse,
            FailedUploadDto, BulkOutcomeResponse, CredentialsResponse, CountsResponse, BankDto, StaffDto,
            StatusChangeRequest, BankStatusRequest, LeadEditRequest, GenerateClientRequest,
            ProvisionalDocumentRequest, CommentRequest, BankConfigDto, DocumentConfigPayload,
        )
    ),
    tags(
        (name = "Case Desk API", description = "Case workflow gateway for the lending dashboard.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Request Parsing Helpers
//=========================================================================================

fn parse_doctype(raw: &str) -> Result<DocType, ApiError> {
    DocType::parse(raw.trim())
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown document type '{}'", raw)))
}

#[derive(Default)]
struct UploadForm {
    fields: HashMap<String, String>,
    files: Vec<PendingFile>,
}

impl UploadForm {
    fn field(&self, name: &str) -> Result<&str, ApiError> {
        self.fields
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ApiError::BadRequest(format!("Multipart form must include '{}'", name)))
    }
}

/// Reads every part: parts with a file name become files, the rest text fields.
async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read file bytes: {}", e))
                })?;
                form.files.push(PendingFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            None => {
                let text = field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read field '{}': {}", name, e))
                })?;
                form.fields.insert(name, text);
            }
        }
    }
    Ok(form)
}

//=========================================================================================
// Health
//=========================================================================================

/// Liveness probe; also reports how many backend calls are in flight.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        in_flight: state.busy.in_flight(),
    })
}

//=========================================================================================
// Cases
//=========================================================================================

/// List the cases the caller can see.
#[utoipa::path(
    get,
    path = "/cases",
    params(CaseListQuery),
    responses(
        (status = 200, description = "Case summaries", body = [CaseSummaryDto]),
        (status = 400, description = "Unknown queue", body = ErrorBody),
        (status = 401, description = "Missing session", body = ErrorBody)
    )
)]
pub async fn list_cases_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Query(query): Query<CaseListQuery>,
) -> Result<Json<Vec<CaseSummaryDto>>, ApiError> {
    let queue = match query.role.as_deref().map(str::trim) {
        None | Some("") => CaseQueue::All,
        Some(role) if role.eq_ignore_ascii_case("uw") => CaseQueue::Underwriting,
        Some(other) => {
            return Err(ApiError::BadRequest(format!("Unknown case queue '{}'", other)))
        }
    };
    let cases = state.flow.list_cases(&auth, queue).await?;
    Ok(Json(cases.iter().map(CaseSummaryDto::from).collect()))
}

/// Number of cases per status.
#[utoipa::path(
    get,
    path = "/cases/counts",
    responses((status = 200, description = "Counts", body = CountsResponse))
)]
pub async fn case_counts_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
) -> Result<Json<CountsResponse>, ApiError> {
    let counts = state.flow.case_counts(&auth).await?;
    Ok(Json((&counts).into()))
}

/// A case with its checklist and the actions the caller may take.
#[utoipa::path(
    get,
    path = "/cases/{id}",
    params(("id" = String, Path, description = "Case id")),
    responses(
        (status = 200, description = "Case view", body = CaseViewResponse),
        (status = 403, description = "Caller may not view this case", body = ErrorBody),
        (status = 404, description = "No such case", body = ErrorBody)
    )
)]
pub async fn case_view_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
) -> Result<Json<CaseViewResponse>, ApiError> {
    let view = state.flow.case_view(&auth, &case_id).await?;
    Ok(Json((&view).into()))
}

/// Manually move a case to another status.
#[utoipa::path(
    patch,
    path = "/cases/{id}/status",
    params(("id" = String, Path, description = "Case id")),
    request_body = StatusChangeRequest,
    responses(
        (status = 200, description = "Updated case view", body = CaseViewResponse),
        (status = 400, description = "Unknown status", body = ErrorBody),
        (status = 403, description = "Not permitted", body = ErrorBody),
        (status = 422, description = "Transition not allowed", body = ErrorBody)
    )
)]
pub async fn change_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
    Json(body): Json<StatusChangeRequest>,
) -> Result<Json<CaseViewResponse>, ApiError> {
    let target = CaseStatus::parse(body.status.trim())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let view = state.flow.change_status(&auth, &case_id, target).await?;
    Ok(Json((&view).into()))
}

/// Record that the first client meeting took place.
#[utoipa::path(
    post,
    path = "/cases/{id}/meeting-done",
    params(("id" = String, Path, description = "Case id")),
    responses(
        (status = 200, description = "Updated case view", body = CaseViewResponse),
        (status = 403, description = "Not permitted", body = ErrorBody)
    )
)]
pub async fn meeting_done_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
) -> Result<Json<CaseViewResponse>, ApiError> {
    let view = state.flow.mark_meeting_done(&auth, &case_id).await?;
    Ok(Json((&view).into()))
}

/// Close an open lead that has no requirement.
#[utoipa::path(
    post,
    path = "/cases/{id}/no-requirement",
    params(("id" = String, Path, description = "Case id")),
    responses(
        (status = 200, description = "Updated case view", body = CaseViewResponse),
        (status = 403, description = "Not permitted", body = ErrorBody)
    )
)]
pub async fn no_requirement_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
) -> Result<Json<CaseViewResponse>, ApiError> {
    let view = state.flow.mark_no_requirement(&auth, &case_id).await?;
    Ok(Json((&view).into()))
}

/// Set the banker's own status for a case.
#[utoipa::path(
    patch,
    path = "/cases/{id}/bankstatus",
    params(("id" = String, Path, description = "Case id")),
    request_body = BankStatusRequest,
    responses(
        (status = 200, description = "Updated case view", body = CaseViewResponse),
        (status = 400, description = "Unknown bank status", body = ErrorBody),
        (status = 403, description = "Not permitted", body = ErrorBody)
    )
)]
pub async fn bank_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
    Json(body): Json<BankStatusRequest>,
) -> Result<Json<CaseViewResponse>, ApiError> {
    let status = BankStatus::parse(body.status.trim())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let view = state.flow.update_bank_status(&auth, &case_id, status).await?;
    Ok(Json((&view).into()))
}

/// Edit the lead details of a case.
#[utoipa::path(
    put,
    path = "/cases/{id}",
    params(("id" = String, Path, description = "Case id")),
    request_body = LeadEditRequest,
    responses(
        (status = 200, description = "Updated case view", body = CaseViewResponse),
        (status = 422, description = "Invalid lead details", body = ErrorBody)
    )
)]
pub async fn edit_lead_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
    Json(body): Json<LeadEditRequest>,
) -> Result<Json<CaseViewResponse>, ApiError> {
    let edit = LeadEdit {
        company_name: body.company_name,
        client_name: body.client_name,
        phone: body.phone,
        email: body.email,
        location: body.location,
        requirement_amount: body.requirement_amount,
        product_name: body.product_name,
        kam_email: body.kam_email,
        telecaller_email: body.telecaller_email,
    };
    let view = state.flow.edit_lead(&auth, &case_id, &edit).await?;
    Ok(Json((&view).into()))
}

/// Create the client's dashboard login.
#[utoipa::path(
    post,
    path = "/cases/{id}/generate-client",
    params(("id" = String, Path, description = "Case id")),
    request_body = GenerateClientRequest,
    responses(
        (status = 201, description = "Login created", body = CredentialsResponse),
        (status = 403, description = "Not permitted or login exists", body = ErrorBody)
    )
)]
pub async fn generate_client_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
    Json(body): Json<GenerateClientRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = match body.kind.as_deref().map(str::trim) {
        None | Some("") | Some("client") => ClientKind::Client,
        Some("individual") => ClientKind::Individual,
        Some(other) => {
            return Err(ApiError::BadRequest(format!("Unknown client kind '{}'", other)))
        }
    };
    let credentials = state.flow.generate_client(&auth, &case_id, kind).await?;
    Ok((StatusCode::CREATED, Json(CredentialsResponse::from(credentials))))
}

//=========================================================================================
// Provisional Documents
//=========================================================================================

/// The case's additional, free-named document requirements.
#[utoipa::path(
    get,
    path = "/cases/{id}/provisional-documents",
    params(("id" = String, Path, description = "Case id")),
    responses((status = 200, description = "Other documents", body = [ProvisionalDocumentDto]))
)]
pub async fn list_provisional_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
) -> Result<Json<Vec<ProvisionalDocumentDto>>, ApiError> {
    let docs = state.flow.provisional_documents(&auth, &case_id).await?;
    Ok(Json(docs.iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/cases/{id}/provisional-documents",
    params(("id" = String, Path, description = "Case id")),
    request_body = ProvisionalDocumentRequest,
    responses(
        (status = 201, description = "Updated list", body = [ProvisionalDocumentDto]),
        (status = 422, description = "Blank or duplicate name", body = ErrorBody)
    )
)]
pub async fn add_provisional_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
    Json(body): Json<ProvisionalDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let docs = state
        .flow
        .add_provisional_document(&auth, &case_id, &body.docname)
        .await?;
    let docs: Vec<ProvisionalDocumentDto> = docs.iter().map(Into::into).collect();
    Ok((StatusCode::CREATED, Json(docs)))
}

#[utoipa::path(
    delete,
    path = "/cases/{id}/provisional-documents/{doc_id}",
    params(
        ("id" = String, Path, description = "Case id"),
        ("doc_id" = String, Path, description = "Provisional document id")
    ),
    responses((status = 200, description = "Updated list", body = [ProvisionalDocumentDto]))
)]
pub async fn delete_provisional_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path((case_id, doc_id)): Path<(String, String)>,
) -> Result<Json<Vec<ProvisionalDocumentDto>>, ApiError> {
    let docs = state
        .flow
        .delete_provisional_document(&auth, &case_id, &doc_id)
        .await?;
    Ok(Json(docs.iter().map(Into::into).collect()))
}

//=========================================================================================
// Bank Assignment
//=========================================================================================

/// Assigned banks and their required-document matrices.
#[utoipa::path(
    get,
    path = "/cases/{id}/document-config",
    params(("id" = String, Path, description = "Case id")),
    responses((status = 200, description = "Bank assignment", body = DocumentConfigPayload))
)]
pub async fn get_document_config_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
) -> Result<Json<DocumentConfigPayload>, ApiError> {
    let configs = state.flow.document_config(&auth, &case_id).await?;
    Ok(Json(DocumentConfigPayload {
        banks: configs.iter().map(Into::into).collect(),
    }))
}

/// Replace the bank assignment of a case in one batch.
#[utoipa::path(
    put,
    path = "/cases/{id}/document-config",
    params(("id" = String, Path, description = "Case id")),
    request_body = DocumentConfigPayload,
    responses(
        (status = 200, description = "Saved bank assignment", body = DocumentConfigPayload),
        (status = 400, description = "Malformed document key", body = ErrorBody),
        (status = 403, description = "Not permitted in this status", body = ErrorBody),
        (status = 422, description = "Invalid configuration", body = ErrorBody)
    )
)]
pub async fn save_document_config_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
    Json(body): Json<DocumentConfigPayload>,
) -> Result<Json<DocumentConfigPayload>, ApiError> {
    let configs = body
        .banks
        .into_iter()
        .map(BankConfigDto::to_domain)
        .collect::<Result<Vec<_>, _>>()?;
    let saved = state
        .flow
        .save_document_config(&auth, &case_id, configs)
        .await?;
    Ok(Json(DocumentConfigPayload {
        banks: saved.iter().map(Into::into).collect(),
    }))
}

//=========================================================================================
// Documents
//=========================================================================================

/// Upload one document against a checklist item.
///
/// Multipart fields: `file`, `doctype`, `docname`.
#[utoipa::path(
    post,
    path = "/cases/{id}/documents",
    params(("id" = String, Path, description = "Case id")),
    request_body(content_type = "multipart/form-data", description = "The document to upload."),
    responses(
        (status = 201, description = "Uploaded", body = DocumentOutcomeResponse),
        (status = 400, description = "Malformed form", body = ErrorBody),
        (status = 403, description = "Not permitted", body = ErrorBody)
    )
)]
pub async fn upload_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = read_form(multipart).await?;
    let doctype = parse_doctype(form.field("doctype")?)?;
    let docname = form.field("docname")?.to_string();
    if form.files.len() != 1 {
        return Err(ApiError::BadRequest(
            "Multipart form must include exactly one file".to_string(),
        ));
    }
    let file = form.files.remove(0);

    let outcome = state
        .flow
        .upload_document(&auth, &case_id, doctype, &docname, file)
        .await?;
    Ok((StatusCode::CREATED, Json(DocumentOutcomeResponse::from(&outcome))))
}

/// Upload several files of one category; each is matched to a checklist item by name.
#[utoipa::path(
    post,
    path = "/cases/{id}/documents/bulk",
    params(("id" = String, Path, description = "Case id")),
    request_body(content_type = "multipart/form-data", description = "A `doctype` field and any number of files."),
    responses(
        (status = 200, description = "Upload summary", body = BulkOutcomeResponse),
        (status = 400, description = "Malformed form", body = ErrorBody)
    )
)]
pub async fn upload_bulk_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<BulkOutcomeResponse>, ApiError> {
    let form = read_form(multipart).await?;
    let doctype = parse_doctype(form.field("doctype")?)?;
    if form.files.is_empty() {
        return Err(ApiError::BadRequest(
            "Multipart form must include at least one file".to_string(),
        ));
    }
    info!(case_id = %case_id, doctype = %doctype, files = form.files.len(), "Bulk upload received");

    let outcome = state
        .flow
        .upload_bulk(&auth, &case_id, doctype, form.files)
        .await?;
    Ok(Json((&outcome).into()))
}

#[utoipa::path(
    delete,
    path = "/cases/{id}/documents/{doc_id}",
    params(
        ("id" = String, Path, description = "Case id"),
        ("doc_id" = String, Path, description = "Document id")
    ),
    responses(
        (status = 200, description = "Deleted", body = DocumentOutcomeResponse),
        (status = 404, description = "Document not on this case", body = ErrorBody)
    )
)]
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path((case_id, doc_id)): Path<(String, String)>,
) -> Result<Json<DocumentOutcomeResponse>, ApiError> {
    let outcome = state.flow.delete_document(&auth, &case_id, &doc_id).await?;
    Ok(Json((&outcome).into()))
}

/// Stream a stored document back to the caller.
#[utoipa::path(
    get,
    path = "/documents/{filename}",
    params(("filename" = String, Path, description = "Stored file name")),
    responses(
        (status = 200, description = "File contents, with the stored content type"),
        (status = 404, description = "No such file", body = ErrorBody)
    )
)]
pub async fn download_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(file_name): Path<String>,
) -> Result<Response, ApiError> {
    let file = state.flow.download_document(&auth, &file_name).await?;
    let content_type = file
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let safe_name: String = file
        .file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .filter(|c| *c != '"')
        .collect();
    let disposition = format!("inline; filename=\"{}\"", safe_name);
    Ok((
        [(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)],
        file.bytes,
    )
        .into_response())
}

//=========================================================================================
// Comments
//=========================================================================================

#[utoipa::path(
    post,
    path = "/cases/{id}/comments",
    params(("id" = String, Path, description = "Case id")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Updated case view", body = CaseViewResponse),
        (status = 422, description = "Blank comment", body = ErrorBody)
    )
)]
pub async fn add_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(case_id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.flow.add_comment(&auth, &case_id, &body.text).await?;
    Ok((StatusCode::CREATED, Json(CaseViewResponse::from(&view))))
}

//=========================================================================================
// Directory
//=========================================================================================

#[utoipa::path(
    get,
    path = "/banks",
    params(BankSearchQuery),
    responses((status = 200, description = "Matching banks", body = [BankDto]))
)]
pub async fn list_banks_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Query(query): Query<BankSearchQuery>,
) -> Result<Json<Vec<BankDto>>, ApiError> {
    let banks = state
        .flow
        .banks(&auth, query.q.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(banks.into_iter().map(Into::into).collect()))
}

/// Banks offering a product. Empty when the lookup fails.
#[utoipa::path(
    get,
    path = "/banks/products/{product}",
    params(("product" = String, Path, description = "Product name")),
    responses((status = 200, description = "Banks for the product", body = [BankDto]))
)]
pub async fn banks_for_product_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(product): Path<String>,
) -> Json<Vec<BankDto>> {
    let banks = state.flow.banks_for_product(&auth, &product).await;
    Json(banks.into_iter().map(Into::into).collect())
}

/// KAM and telecaller users, for lead reassignment.
#[utoipa::path(
    get,
    path = "/staff",
    responses((status = 200, description = "Staff", body = [StaffDto]))
)]
pub async fn list_staff_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
) -> Result<Json<Vec<StaffDto>>, ApiError> {
    let staff = state.flow.staff(&auth).await?;
    Ok(Json(staff.into_iter().map(Into::into).collect()))
}
