use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use quill_sdk::{
    CreateRequest, CreateResponse, DocumentView, HistoryReport, SdkError, SignRequest,
    SignResponse, VerifyRequest, VerifyResponse,
};
use quill_store::VersionRecord;
use quill_types::{DocumentId, DocumentStatus, VersionNumber};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::Owner;
use crate::error::{ServerError, ServerResult};
use crate::router::AppState;

/// Body of `POST /v1/documents`. Files are base64 encoded.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    pub original_filename: String,
    pub mime_type: String,
    pub original_document: String,
    /// Defaults to the original document.
    #[serde(default)]
    pub unsigned_document: Option<String>,
    #[serde(default)]
    pub required_signatures: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SignBody {
    pub signed_document: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub tx_signature: String,
    pub candidate: String,
    #[serde(default)]
    pub freshness_marker: Option<u64>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub id: DocumentId,
    pub status: DocumentStatus,
}

fn decode(field: &'static str, encoded: &str) -> ServerResult<Bytes> {
    STANDARD
        .decode(encoded.trim())
        .map(Bytes::from)
        .map_err(|_| SdkError::validation(field, "is not valid base64").into())
}

fn document_id(raw: &str) -> ServerResult<DocumentId> {
    raw.parse()
        .map_err(|_| ServerError::Sdk(SdkError::validation("id", "is not a document id")))
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": "quill-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn create_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(body): Json<CreateBody>,
) -> ServerResult<(StatusCode, Json<CreateResponse>)> {
    let original = decode("original_document", &body.original_document)?;
    let unsigned = match &body.unsigned_document {
        Some(encoded) => decode("unsigned_document", encoded)?,
        None => original.clone(),
    };
    let request = CreateRequest {
        name: body.name,
        password: body.password,
        original_filename: body.original_filename,
        mime_type: body.mime_type,
        original_document: original,
        unsigned_document: unsigned,
        required_signatures: body.required_signatures,
    };
    let created = state.service.create(&owner, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn sign_handler(
    State(state): State<AppState>,
    Owner(signer): Owner,
    Path(id): Path<String>,
    Json(body): Json<SignBody>,
) -> ServerResult<Json<SignResponse>> {
    let mut request = SignRequest::new(document_id(&id)?, decode("signed_document", &body.signed_document)?);
    request.password = body.password;
    Ok(Json(state.service.sign(&signer, request).await?))
}

pub async fn reject_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> ServerResult<Json<StatusBody>> {
    let id = document_id(&id)?;
    let status = state.service.reject(&owner, &id).await?;
    Ok(Json(StatusBody { id, status }))
}

pub async fn document_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> ServerResult<Json<DocumentView>> {
    Ok(Json(state.service.document(&owner, &document_id(&id)?).await?))
}

pub async fn history_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> ServerResult<Json<HistoryReport>> {
    Ok(Json(state.service.history(&owner, &document_id(&id)?).await?))
}

pub async fn version_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((id, number)): Path<(String, u32)>,
) -> ServerResult<Json<VersionRecord>> {
    let version = state
        .service
        .version(&owner, &document_id(&id)?, VersionNumber::new(number))
        .await?;
    Ok(Json(version))
}

/// Raw bytes of one version.
pub async fn content_handler(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((id, number)): Path<(String, u32)>,
) -> ServerResult<impl IntoResponse> {
    let bytes = state
        .service
        .content(&owner, &document_id(&id)?, VersionNumber::new(number))
        .await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

pub async fn verify_handler(
    State(state): State<AppState>,
    Json(body): Json<VerifyBody>,
) -> ServerResult<Json<VerifyResponse>> {
    let mut request = VerifyRequest::new(
        body.tx_signature,
        decode("candidate", &body.candidate)?,
        body.freshness_marker,
    );
    request.password = body.password;
    Ok(Json(state.service.verify(request).await?))
}
