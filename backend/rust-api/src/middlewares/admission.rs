use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::error::PortalError;
use crate::services::{admission::ADMISSION_COOKIE, AppState};

/// Admission token sent by the caller, if any.
pub fn admission_token(jar: &CookieJar) -> Option<&str> {
    jar.get(ADMISSION_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
}

/// Lets the request through only when the caller itself is admitted.
pub async fn admission_guard_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, PortalError> {
    if state.is_admitted(admission_token(&jar)).await {
        return Ok(next.run(request).await);
    }

    tracing::warn!(path = %request.uri().path(), "Access denied: admission required");
    Err(PortalError::NotAdmitted(
        "log in through /api/v1/admission/login before uploading".to_string(),
    ))
}
