use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::timeout;
use tower_http::cors::{Any, CorsLayer};
use validator::Validate;

use crate::barcode::BarcodeInput;
use crate::capability::CapabilitySet;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::resolver::ResolutionCascade;
use crate::response::assemble;

/// Read-only per-process state. The capability set is computed once at
/// startup and never mutated, so requests share it without locking.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ScanConfig>,
    pub capabilities: CapabilitySet,
    pub cascade: Arc<ResolutionCascade>,
}

#[derive(Deserialize, Validate)]
pub struct ScanRequest {
    #[validate(length(min = 1, max = 64))]
    barcode: Option<String>,
    /// Base64-encoded product photo, capped near 10 MB of raw image.
    #[validate(length(max = 14_000_000))]
    image_base64: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct BarcodeScanRequest {
    #[validate(length(min = 1, max = 64))]
    barcode: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: &'static str,
    message: String,
}

/// Build the router. CORS stays fully permissive: the consumers are
/// mobile apps calling from arbitrary origins.
pub fn create_api(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/scan", post(scan_handler))
        .route("/api/v1/scan/barcode", post(scan_barcode_handler))
        .route("/api/v1/capabilities", get(capabilities_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

async fn scan_handler(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return validation_error(e);
    }

    let image = match request.image_base64.as_deref() {
        Some(encoded) => match STANDARD.decode(encoded) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                return error_response(&ScanError::InvalidBarcodeFormat(format!(
                    "image_base64 is not valid base64: {}",
                    e
                )))
            }
        },
        None => None,
    };

    let input = match select_input(request.barcode, image.as_deref(), &state.capabilities) {
        Ok(input) => input,
        Err(e) => return error_response(&e),
    };

    run_scan(state, input, image).await
}

async fn scan_barcode_handler(
    State(state): State<AppState>,
    Json(request): Json<BarcodeScanRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return validation_error(e);
    }
    run_scan(state, BarcodeInput::manual(request.barcode), None).await
}

async fn capabilities_handler(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "capabilities": state.capabilities,
        "providers": state.cascade.provider_names(),
        "enrichment": state.cascade.analyzer_name(),
    }))
    .into_response()
}

async fn health_handler(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "status": "healthy",
        "enrichment": state.cascade.analyzer_name(),
        "gemini": if state.config.gemini_api_key.is_some() { "configured" } else { "not_configured" },
        "timestamp": Utc::now(),
    }))
    .into_response()
}

/// Decide which detection method serves this request. The manual barcode
/// always wins over an attached image; the image then only provides
/// context for enrichment.
fn select_input(
    barcode: Option<String>,
    image: Option<&[u8]>,
    capabilities: &CapabilitySet,
) -> Result<BarcodeInput, ScanError> {
    if let Some(code) = barcode.filter(|c| !c.trim().is_empty()) {
        return Ok(BarcodeInput::manual(code));
    }
    match image {
        Some(bytes) => {
            if !capabilities.optical_decoding_available {
                return Err(ScanError::CapabilityUnavailable(
                    "optical barcode decoding is not available in this deployment; \
                     submit the barcode digits instead"
                        .to_string(),
                ));
            }
            decode_from_image(bytes).map(BarcodeInput::decoded)
        }
        None => Err(ScanError::InvalidBarcodeFormat(
            "provide a barcode or an image to scan".to_string(),
        )),
    }
}

#[cfg(feature = "optical")]
fn decode_from_image(bytes: &[u8]) -> Result<String, ScanError> {
    let codes = crate::barcode::optical::decode(bytes)?;
    match codes.first() {
        Some(code) => {
            info!("decoded {} barcode(s) from image, using {}", codes.len(), code);
            Ok(code.clone())
        }
        None => Err(ScanError::InvalidBarcodeFormat(
            "no barcode detected in the image".to_string(),
        )),
    }
}

#[cfg(not(feature = "optical"))]
fn decode_from_image(_bytes: &[u8]) -> Result<String, ScanError> {
    Err(ScanError::CapabilityUnavailable(
        "optical barcode decoding is not built into this deployment".to_string(),
    ))
}

async fn run_scan(state: AppState, input: BarcodeInput, image: Option<Vec<u8>>) -> Response {
    let scan = state.cascade.scan(&input.raw, image.as_deref());
    match timeout(state.config.request_deadline, scan).await {
        Ok(Ok(outcome)) => {
            info!(
                "scan of {} resolved as {:?}",
                outcome.resolved.barcode, outcome.resolved.source
            );
            let response = assemble(outcome, input.origin, state.capabilities);
            Json(response).into_response()
        }
        Ok(Err(e)) => error_response(&e),
        Err(_) => {
            warn!("scan of '{}' exceeded the request deadline", input.raw);
            error_response(&ScanError::ProviderUnavailable(
                "request deadline exceeded".to_string(),
            ))
        }
    }
}

fn validation_error(e: validator::ValidationErrors) -> Response {
    error_response(&ScanError::InvalidBarcodeFormat(e.to_string()))
}

fn error_response(error: &ScanError) -> Response {
    let (status, kind) = match error {
        ScanError::InvalidBarcodeFormat(_) => (StatusCode::BAD_REQUEST, "invalid_barcode_format"),
        ScanError::CapabilityUnavailable(_) => (StatusCode::BAD_REQUEST, "capability_unavailable"),
        ScanError::ProviderUnavailable(_) => (StatusCode::GATEWAY_TIMEOUT, "provider_unavailable"),
        ScanError::EnrichmentFailure(_) => (StatusCode::BAD_GATEWAY, "enrichment_failure"),
    };
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: kind,
            message: error.to_string(),
        }),
    )
        .into_response()
}
