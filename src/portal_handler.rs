use crate::dispatch::{process_inquiry, InquiryOutcome};
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::normalizer::normalize_body;
use crate::portal_models::InquiryResponse;
use crate::server::RequestId;
use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::{header, HeaderMap, Method, StatusCode},
    Json,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::Instrument;

/// Header accepted as an alternative to `Authorization: Bearer`.
pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

/// Portal inquiry webhook.
///
/// Receives a lead notification from a listing portal and forwards it to the
/// CRM as a new lead, or as an activity on the existing lead when the phone
/// or email is already known.
///
/// Authentication: `Authorization: Bearer <secret>` or `X-Webhook-Token`,
/// only when WEBHOOK_SECRET is configured.
pub async fn portal_webhook(
    State(state): State<Arc<AppState>>,
    request_id: Option<Extension<RequestId>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<InquiryResponse>), AppError> {
    let request_id = request_id
        .map(|Extension(id)| id)
        .unwrap_or_else(RequestId::generate);
    let span = tracing::info_span!("portal_inquiry", request_id = %request_id.0);

    async move {
        // 1. Only POST carries an inquiry
        if method != Method::POST {
            return Err(AppError::MethodNotAllowed(method.to_string()));
        }

        // 2. Shared secret (if configured)
        validate_webhook_secret(state.config.webhook_secret.as_deref(), &headers)?;

        // 3. Parse and normalize, before any CRM traffic
        let inquiry = normalize_body(&body)?;
        tracing::info!(
            "📨 Portal inquiry: name={:?}, phones={}, email={}, property={}",
            inquiry.name,
            inquiry.phones.len(),
            inquiry.email.is_some(),
            inquiry.property_code
        );

        // 4. Duplicate lookup and CRM write
        let outcome = process_inquiry(&state.crm, &state.dispatch, &inquiry).await?;
        tracing::info!("✅ {} (lead {})", outcome.status(), outcome.lead_id());

        let (activity_id, matched_by) = match &outcome {
            InquiryOutcome::LeadCreated { .. } => (None, None),
            InquiryOutcome::DuplicateActivityCreated {
                activity_id,
                matched_by,
                ..
            } => (*activity_id, Some(matched_by.to_string())),
        };

        Ok((
            StatusCode::OK,
            Json(InquiryResponse {
                status: outcome.status().to_string(),
                request_id: request_id.0.clone(),
                lead_id: outcome.lead_id().0,
                activity_id,
                matched_by,
                property_code: inquiry.property_code.clone(),
            }),
        ))
    }
    .instrument(span)
    .await
}

/// Validate the shared secret from `Authorization: Bearer` or
/// `X-Webhook-Token`. Either header carrying the right token is enough.
pub fn validate_webhook_secret(
    expected_secret: Option<&str>,
    headers: &HeaderMap,
) -> Result<(), AppError> {
    // If no secret is configured, skip validation (warn was already logged at startup)
    let Some(expected_secret) = expected_secret else {
        return Ok(());
    };

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        });
    let custom = headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    let candidates: Vec<&str> = [bearer, custom].into_iter().flatten().collect();
    if candidates.is_empty() {
        return Err(AppError::Unauthorized(
            "Missing Authorization or X-Webhook-Token header".to_string(),
        ));
    }

    if candidates
        .iter()
        .any(|token| constant_time_compare(token, expected_secret))
    {
        return Ok(());
    }

    tracing::warn!(
        "Invalid webhook token received (fingerprint {})",
        fingerprint(candidates[0])
    );
    Err(AppError::Unauthorized("Invalid webhook token".to_string()))
}

/// Compares SHA-256 digests so neither content nor length leaks through timing.
fn constant_time_compare(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());

    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// First 8 hex chars of the token digest, safe to log.
fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))[..8].to_string()
}
