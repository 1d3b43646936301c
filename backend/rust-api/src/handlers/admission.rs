use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use validator::Validate;

use crate::config::Config;
use crate::error::Result;
use crate::extractors::AppJson;
use crate::middlewares::admission::admission_token;
use crate::models::admission::{AdmissionResponse, LoginRequest};
use crate::services::{admission::ADMISSION_COOKIE, AppState};

const ADMISSION_COOKIE_PATH: &str = "/api/v1";

fn admission_cookie(config: &Config, value: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((ADMISSION_COOKIE, value))
        .path(ADMISSION_COOKIE_PATH)
        .http_only(true)
        .secure(config.admission_cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

/// POST /api/v1/admission/login
///
/// A rejected pair answers 401 with `admitted: false`; it is not an error and
/// leaves the caller's existing admission alone.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<(StatusCode, CookieJar, Json<AdmissionResponse>)> {
    req.validate()?;

    let admitted = state
        .admit(admission_token(&jar), &req.identifier, &req.secret)
        .await?;

    match admitted {
        Some((token, admission)) => {
            let cookie = admission_cookie(&state.config, token, time::Duration::days(30));
            Ok((
                StatusCode::OK,
                jar.add(cookie),
                Json(AdmissionResponse::from(&admission)),
            ))
        }
        None => {
            let body = AdmissionResponse {
                admitted: false,
                identifier: None,
            };
            Ok((StatusCode::UNAUTHORIZED, jar, Json(body)))
        }
    }
}

/// POST /api/v1/admission/logout - revokes the caller's admission only
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AdmissionResponse>)> {
    let admission = state.revoke(admission_token(&jar)).await?;

    let cleared = admission_cookie(&state.config, String::new(), time::Duration::ZERO);
    Ok((jar.add(cleared), Json(AdmissionResponse::from(&admission))))
}

pub async fn status(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<AdmissionResponse> {
    let admission = state.admission_snapshot(admission_token(&jar)).await;
    Json(AdmissionResponse::from(&admission))
}
