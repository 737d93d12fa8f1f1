//! HTTP routing and middleware.
//!
//! Requests flow through:
//! 1. Request ID generation
//! 2. CORS handling
//! 3. Request/response logging
//! 4. Panic recovery (generic 500)
//! 5. Body size limit (webhook route)
//! 6. Handler execution
use crate::handlers::{self, AppState};
use crate::portal_handler;
use crate::errors::AppError;
use axum::{
    extract::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

/// Path the portals post inquiries to.
pub const PORTAL_WEBHOOK_PATH: &str = "/api/portais";

/// Largest inquiry body accepted.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Correlation id for one inbound request.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Creates the router with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    // `any` so the handler can answer non-POST methods with a JSON 405
    let webhook_routes = Router::new()
        .route(PORTAL_WEBHOOK_PATH, any(portal_handler::portal_webhook))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(webhook_routes)
        .with_state(state);

    with_middleware(app)
}

/// Wraps a router in the shared middleware stack, outermost first.
pub fn with_middleware(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(inject_request_id))
}

/// Turns a handler panic into a generic `INTERNAL_ERROR` response.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);

    AppError::InternalError("unexpected failure while handling request".to_string())
        .into_response()
}

/// Stores a request id in the extensions and echoes it as `X-Request-Id`.
async fn inject_request_id(mut req: Request, next: Next) -> Response {
    let request_id = RequestId::generate();
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.0.parse() {
        response.headers_mut().insert("x-request-id", header_value);
    }

    response
}
