// LC API handlers

use crate::error::ApiError;
use crate::models::{
    CreateLcResponse, DocumentsResponse, HealthResponse, LcDetailsResponse,
    OperationStatusResponse, TransitionResponse,
};
use crate::AppState;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    http::{HeaderMap, StatusCode},
    Json,
};
use lc_core::operation::OperationRef;
use lc_core::orchestrator::CreateLcRequest;
use lc_core::validation::parse_identity;
use lc_core::{Address, LcId};
use tracing::{debug, info};

/// Header selecting the signing identity
pub const SIGNER_HEADER: &str = "x-signer-address";

/// Multipart field carrying the document set
pub const DOCUMENTS_FIELD: &str = "documents";

fn resolve_signer(headers: &HeaderMap, state: &AppState) -> Result<Address, ApiError> {
    match headers.get(SIGNER_HEADER) {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| ApiError::BadRequest("X-Signer-Address is not valid text".into()))?;
            Ok(parse_identity("X-Signer-Address", value.trim())?)
        }
        None => state.default_signer.ok_or_else(|| {
            ApiError::BadRequest("No signer: set the X-Signer-Address header".to_string())
        }),
    }
}

fn parse_lc_id(raw: &str) -> Result<LcId, ApiError> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .map(LcId)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid LC id: {}", raw)))
}

fn multipart_error(context: &str, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!("Documents exceed the upload limit: {}", err))
    } else {
        ApiError::BadRequest(format!("{}: {}", context, err))
    }
}

// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ledger_reachable = state
        .service
        .pipeline()
        .ledger()
        .current_fee_rate()
        .await
        .is_ok();

    Json(HealthResponse {
        status: if ledger_reachable { "healthy" } else { "degraded" },
        service: state.service_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        ledger_reachable,
    })
}

// Prometheus metrics endpoint
pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .metrics
        .export()
        .map_err(|e| ApiError::Internal(format!("Failed to export metrics: {}", e)))
}

pub async fn create_lc(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateLcRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateLcResponse>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let signer = resolve_signer(&headers, &state)?;

    info!(%signer, "Received createLC request");
    let created = state.service.create_lc(request, signer).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateLcResponse {
            message: "LC created successfully".to_string(),
            transaction_hash: created.reference.to_string(),
            lc_id: created.lc_id,
        }),
    ))
}

pub async fn approve_lc(
    State(state): State<AppState>,
    Path(lc_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TransitionResponse>, ApiError> {
    let lc_id = parse_lc_id(&lc_id)?;
    let signer = resolve_signer(&headers, &state)?;

    let outcome = state.service.approve_lc(lc_id, signer).await?;

    Ok(Json(TransitionResponse {
        message: "LC approved successfully".to_string(),
        transaction_hash: outcome.reference.to_string(),
    }))
}

pub async fn submit_documents(
    State(state): State<AppState>,
    Path(lc_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DocumentsResponse>, ApiError> {
    let lc_id = parse_lc_id(&lc_id)?;
    let signer = resolve_signer(&headers, &state)?;

    let mut multipart =
        multipart.map_err(|_| ApiError::BadRequest("No documents provided".to_string()))?;

    let mut content = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Invalid multipart body", e))?
    {
        if field.name() == Some(DOCUMENTS_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| multipart_error("Failed to read documents", e))?;
            content = Some(bytes);
            break;
        }
    }

    let content = content
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No documents provided".to_string()))?;
    debug!(%lc_id, bytes = content.len(), "Received documents");

    let submitted = state
        .service
        .submit_documents(lc_id, &content, signer)
        .await?;

    Ok(Json(DocumentsResponse {
        message: "Documents submitted successfully".to_string(),
        document_hash: submitted.document_hash,
        transaction_hash: submitted.reference.to_string(),
    }))
}

pub async fn close_lc(
    State(state): State<AppState>,
    Path(lc_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TransitionResponse>, ApiError> {
    let lc_id = parse_lc_id(&lc_id)?;
    let signer = resolve_signer(&headers, &state)?;

    let outcome = state.service.close_lc(lc_id, signer).await?;

    Ok(Json(TransitionResponse {
        message: "LC closed successfully".to_string(),
        transaction_hash: outcome.reference.to_string(),
    }))
}

pub async fn get_lc_details(
    State(state): State<AppState>,
    Path(lc_id): Path<String>,
) -> Result<Json<LcDetailsResponse>, ApiError> {
    let lc_id = parse_lc_id(&lc_id)?;
    let projection = state.service.get_lc_details(lc_id).await?;
    Ok(Json(projection.into()))
}

pub async fn operation_status(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<OperationStatusResponse>, ApiError> {
    let reference = OperationRef::parse(&reference)?;
    let status = state.service.operation_status(&reference).await?;

    Ok(Json(OperationStatusResponse {
        transaction_hash: reference.to_string(),
        status,
    }))
}
