//! HTTP surface for the portfolio chat
//!
//! One POST endpoint plus a static fallback. The chat pipeline applies its
//! gates in a fixed order, each one short-circuiting: security/CORS headers
//! (middleware, all responses), preflight, method check, rate limit, body
//! size ceiling, payload validation, then the orchestrator.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tower_http::services::ServeDir;

use termfolio_core::ratelimit::RateLimitBackend;
use termfolio_core::{cors, validate, ChatOrchestrator, Error, OriginPolicy, RateDecision, SessionStore};

const HEADER_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const HEADER_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const HEADER_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const CSP: &str = "default-src 'self'; \
    script-src 'self' 'unsafe-inline'; \
    style-src 'self' 'unsafe-inline' https://fonts.googleapis.com; \
    font-src 'self' https://fonts.gstatic.com; \
    img-src 'self' data: blob:; \
    media-src 'self' blob:; \
    connect-src 'self' https://api.openai.com; \
    frame-ancestors 'none'";

/// Everything a request handler needs, constructed once at startup.
pub struct AppState {
    pub policy: OriginPolicy,
    pub limiter: Arc<dyn RateLimitBackend>,
    pub sessions: Arc<SessionStore>,
    /// None when no completion API key is configured; chat serves 503s
    pub orchestrator: Option<ChatOrchestrator>,
    pub max_body_bytes: usize,
}

/// Build the application router.
pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        .route("/api/chat", post(chat).fallback(method_not_allowed))
        .fallback_service(ServeDir::new(static_dir))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            common_headers,
        ))
        .with_state(state)
}

/// Security and CORS headers on every response; OPTIONS preflight
/// short-circuits here, before rate limiting or validation.
async fn common_headers(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CSP),
    );

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(cors::ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(cors::ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(cors::MAX_AGE),
    );

    // Echo the origin only when the allow-list matches it
    if let Some(allowed) = state.policy.allow_origin(origin.as_deref()) {
        if let Ok(value) = HeaderValue::from_str(allowed) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
    }

    response
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
        .into_response()
}

/// POST /api/chat
async fn chat(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    let ip = client_ip(request.headers(), connect_info.map(|ConnectInfo(addr)| addr));

    let decision = state.limiter.admit(&ip).await;
    if !decision.allowed {
        tracing::info!(ip = %ip, retry_after = decision.retry_after_secs, "Request rate limited");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": format!(
                    "Too many requests. Try again in {} seconds.",
                    decision.retry_after_secs
                ),
                "retryAfter": decision.retry_after_secs,
            })),
        )
            .into_response();
        apply_rate_headers(&mut response, &decision);
        if let Ok(value) = HeaderValue::from_str(&decision.retry_after_secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    // The body is read only after admission, so oversized requests still
    // count against the client's window
    let body = match axum::body::to_bytes(request.into_body(), state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
                &decision,
            )
        }
    };

    let parsed: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid request payload", &decision),
    };

    let validation = validate::validate(&parsed);
    let Some(sanitized) = validation.sanitized else {
        return error_response(
            StatusCode::BAD_REQUEST,
            &validation.errors.join(". "),
            &decision,
        );
    };

    let Some(orchestrator) = &state.orchestrator else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "AI not configured. Use direct commands: help, projects, show [name]",
            &decision,
        );
    };

    match orchestrator.handle(&sanitized).await {
        Ok(reply) => {
            let mut response = (StatusCode::OK, Json(reply)).into_response();
            apply_rate_headers(&mut response, &decision);
            response
        }
        Err(e) => {
            // Full detail to the log; fixed generic strings to the client
            tracing::error!(error = %e, ip = %ip, "Chat turn failed");
            let (status, message) = match e {
                Error::ProviderAuth(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "API configuration error. Please try again later.",
                ),
                Error::ProviderOverloaded(_) => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "AI service is busy. Please try again in a moment.",
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong. Try again.",
                ),
            };
            error_response(status, message, &decision)
        }
    }
}

fn error_response(status: StatusCode, message: &str, decision: &RateDecision) -> Response {
    let mut response = (status, Json(json!({ "error": message }))).into_response();
    apply_rate_headers(&mut response, decision);
    response
}

fn apply_rate_headers(response: &mut Response, decision: &RateDecision) {
    let headers = response.headers_mut();
    let pairs = [
        (HEADER_RATELIMIT_LIMIT, decision.limit as u64),
        (HEADER_RATELIMIT_REMAINING, decision.remaining as u64),
        (HEADER_RATELIMIT_RESET, decision.retry_after_secs),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
            headers.insert(name, value);
        }
    }
}

/// Client identifier for rate limiting: proxy headers first, then the
/// socket address.
fn client_ip(headers: &HeaderMap, addr: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    for name in ["x-real-ip", "cf-connecting-ip"] {
        if let Some(ip) = headers.get(name).and_then(|v| v.to_str().ok()) {
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    addr.map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
