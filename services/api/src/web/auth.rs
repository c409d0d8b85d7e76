//! services/api/src/web/auth.rs
//!
//! Passcode sign-in endpoints: request a code, validate it, resend it, sign out.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::middleware::{discard_session, persist_session, renew_session_id, CurrentSession};
use crate::web::rest::{AccountResponse, MessageResponse};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RequestCodeRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ValidateCodeRequest {
    pub otp_code: String,
}

#[derive(Serialize, ToSchema)]
pub struct CodeSentResponse {
    pub message: String,
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct SignedInResponse {
    pub message: String,
    pub account: AccountResponse,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /session - Email a sign-in code, creating the account on first use
#[utoipa::path(
    post,
    path = "/session",
    request_body = RequestCodeRequest,
    responses(
        (status = 200, description = "Code sent; the session now awaits it", body = CodeSentResponse),
        (status = 400, description = "Email is empty or malformed"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn request_code_handler(
    State(state): State<Arc<AppState>>,
    Extension(mut session): Extension<CurrentSession>,
    Json(req): Json<RequestCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .authenticator
        .request_code(&mut session.context, &req.email)
        .await?;
    let cookie = persist_session(&state, &session).await?;

    let response = CodeSentResponse {
        message: format!("We've sent a verification code to {}", account.email),
        email: account.email,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /session/validate_otp - Complete sign-in with the emailed code
#[utoipa::path(
    post,
    path = "/session/validate_otp",
    request_body = ValidateCodeRequest,
    responses(
        (status = 200, description = "Signed in", body = SignedInResponse),
        (status = 401, description = "Code invalid or expired, or no sign-in is pending"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn validate_code_handler(
    State(state): State<Arc<AppState>>,
    Extension(mut session): Extension<CurrentSession>,
    Json(req): Json<ValidateCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .authenticator
        .validate(&mut session.context, &req.otp_code)
        .await?;
    renew_session_id(&state, &mut session).await?;
    let cookie = persist_session(&state, &session).await?;

    let response = SignedInResponse {
        message: "Successfully signed in!".to_string(),
        account: account.into(),
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /session/resend_otp - Replace the outstanding code with a fresh one
#[utoipa::path(
    post,
    path = "/session/resend_otp",
    responses(
        (status = 200, description = "A new code was sent", body = CodeSentResponse),
        (status = 401, description = "No sign-in is pending"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn resend_code_handler(
    State(state): State<Arc<AppState>>,
    Extension(mut session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.authenticator.resend_code(&mut session.context).await?;
    let cookie = persist_session(&state, &session).await?;

    let response = CodeSentResponse {
        message: "A new verification code has been sent to your email.".to_string(),
        email: account.email,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// DELETE /session - Sign out
#[utoipa::path(
    delete,
    path = "/session",
    responses(
        (status = 200, description = "Signed out", body = MessageResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn sign_out_handler(
    State(state): State<Arc<AppState>>,
    Extension(mut session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, ApiError> {
    state.authenticator.sign_out(&mut session.context);
    let cookie = discard_session(&state, &session).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse::new("You have been signed out.")),
    ))
}
