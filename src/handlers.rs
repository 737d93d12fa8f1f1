use crate::config::Config;
use crate::crm_client::{CrmGateway, GatewayError};
use crate::dispatch::DispatchSettings;
use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Client for the CRM webhook endpoint.
    pub crm: CrmGateway,
    /// Settings handed to the dispatcher on every inquiry.
    pub dispatch: DispatchSettings,
}

impl AppState {
    /// Builds the state from configuration; the gateway receives only its
    /// own settings.
    pub fn new(config: Config) -> Result<Self, GatewayError> {
        let crm = CrmGateway::new(config.crm())?;
        let dispatch = DispatchSettings {
            default_responsible_id: config.crm_default_responsible_id,
        };
        Ok(Self {
            config,
            crm,
            dispatch,
        })
    }
}

/// Health check endpoint.
///
/// Returns the service status, version and whether a CRM endpoint is set.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "crm_configured": state.crm.is_configured(),
        })),
    )
}
