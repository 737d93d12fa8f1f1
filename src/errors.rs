use crate::crm_client::{GatewayError, RemoteError};
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Request body absent, blank or JSON `null`.
    EmptyBody,
    /// Body is not a JSON object (or a JSON string holding one).
    InvalidPayload(String),
    /// None of name, email or phone was provided.
    MissingIdentifier,
    /// Shared secret missing or mismatched.
    Unauthorized(String),
    /// Anything other than POST on the webhook path.
    MethodNotAllowed(String),
    /// CRM endpoint not configured.
    ConfigMissing,
    /// Network, timeout or unreadable response from the CRM.
    CrmUnavailable(String),
    /// The CRM answered with an embedded error while creating a record.
    CrmRejected {
        /// Remote method that was rejected, e.g. `crm.lead.add`.
        operation: String,
        error: RemoteError,
    },
    /// Internal server error.
    InternalError(String),
}

impl AppError {
    /// Stable code placed in the `status` field of error bodies.
    pub fn status_code(&self) -> &'static str {
        match self {
            AppError::EmptyBody => "EMPTY_BODY",
            AppError::InvalidPayload(_) => "INVALID_PAYLOAD",
            AppError::MissingIdentifier => "MISSING_IDENTIFIER",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            AppError::ConfigMissing => "CONFIG_MISSING",
            AppError::CrmUnavailable(_) => "CRM_UNAVAILABLE",
            AppError::CrmRejected { .. } => "CRM_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::EmptyBody
            | AppError::InvalidPayload(_)
            | AppError::MissingIdentifier
            | AppError::CrmRejected { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::ConfigMissing
            | AppError::CrmUnavailable(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::EmptyBody => write!(f, "Request body is empty"),
            AppError::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
            AppError::MissingIdentifier => {
                write!(f, "At least one of name, email or phone is required")
            }
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::MethodNotAllowed(method) => write!(f, "Method {} not allowed", method),
            AppError::ConfigMissing => write!(f, "CRM endpoint is not configured"),
            AppError::CrmUnavailable(msg) => write!(f, "CRM unavailable: {}", msg),
            AppError::CrmRejected { operation, error } => {
                write!(f, "CRM rejected {}: {}", operation, error)
            }
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each variant to its HTTP status and a JSON body with a stable
    /// `status` code. Logs according to severity.
    fn into_response(self) -> Response {
        let status = self.http_status();

        let body = match &self {
            AppError::CrmRejected { operation, error } => {
                tracing::warn!("CRM rejected {}: {}", operation, error);
                json!({
                    "status": self.status_code(),
                    "message": format!("CRM rejected {}", operation),
                    "operation": operation,
                    "error": error.code,
                    "error_description": error.description,
                })
            }
            AppError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized access: {}", msg);
                json!({ "status": self.status_code(), "message": "Unauthorized" })
            }
            AppError::ConfigMissing | AppError::CrmUnavailable(_) | AppError::InternalError(_) => {
                tracing::error!("{}", self);
                json!({ "status": self.status_code(), "message": self.to_string() })
            }
            _ => {
                tracing::info!("Rejected inquiry: {}", self);
                json!({ "status": self.status_code(), "message": self.to_string() })
            }
        };

        if let AppError::MethodNotAllowed(_) = self {
            return (status, [(header::ALLOW, "POST")], Json(body)).into_response();
        }

        (status, Json(body)).into_response()
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::ConfigMissing => AppError::ConfigMissing,
            GatewayError::Transport(msg) | GatewayError::MalformedResponse(msg) => {
                AppError::CrmUnavailable(msg)
            }
        }
    }
}
