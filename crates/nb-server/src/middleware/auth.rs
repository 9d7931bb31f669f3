//! API key authentication.
//!
//! Checks the `X-API-Key` header against the context's [`KeyValidator`]
//! before the request body is read. The accepted key is stored in request
//! extensions as [`ApiKey`] for the rate limiter. When auth is disabled in
//! config every request passes as [`ApiKey::anonymous`].
//!
//! [`KeyValidator`]: crate::context::KeyValidator

use axum::extract::State;
use axum::http::{HeaderName, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::context::AppContext;
use crate::middleware::reject;

/// Header carrying the client's API key.
pub static X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

/// The key a request was authenticated with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiKey(pub String);

impl ApiKey {
    pub fn anonymous() -> Self {
        Self("anonymous".into())
    }
}

/// Reject requests without a valid `X-API-Key`.
pub async fn auth_middleware(
    State(ctx): State<AppContext>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !ctx.config.auth.enabled {
        request.extensions_mut().insert(ApiKey::anonymous());
        return next.run(request).await;
    }

    let key = request
        .headers()
        .get(&X_API_KEY)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    match key {
        Some(key) if ctx.keys.is_valid(key) => {
            let key = ApiKey(key.to_string());
            request.extensions_mut().insert(key);
            next.run(request).await
        }
        Some(_) => {
            tracing::debug!("Rejected request with unknown API key");
            unauthorized(&request, "Invalid API key")
        }
        None => unauthorized(&request, "Missing X-API-Key header"),
    }
}

fn unauthorized<B>(request: &Request<B>, message: &str) -> Response {
    reject(request, nb_core::Error::Unauthorized(message.into()))
}
