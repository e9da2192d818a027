//! Account route handlers.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use ::cookie::Cookie;
use serde::{Deserialize, Serialize};

use bid_gallery_core::Role;

use crate::auth::{AccessDenied, Identity, SessionContext, cookie};
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::models::{ManagedAddress, User};
use crate::state::AppState;

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role: Option<String>,
}

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Federated login data.
#[derive(Debug, Deserialize)]
pub struct FederatedLoginRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    pub message: &'static str,
    pub email: String,
    pub role: Role,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressResponse {
    pub success: bool,
    pub address: ManagedAddress,
    pub request_id: String,
}

fn parse_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn with_cookie(body: impl IntoResponse, set: &Cookie<'_>) -> Result<Response> {
    let value = cookie::header_value(set)
        .ok_or_else(|| AppError::Internal("session cookie is not a valid header".to_string()))?;
    let mut response = body.into_response();
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(response)
}

/// Issue a session for `user` and answer with the session cookie set.
fn start_session(
    state: &AppState,
    session: &SessionContext,
    user: &User,
    message: &'static str,
) -> Result<Response> {
    let identity = Identity::from(user);
    let token = state
        .tokens()
        .issue(&identity)
        .map_err(|e| AppError::Internal(format!("session token: {e}")))?;
    set_sentry_user(&identity.user_id, Some(identity.subject.as_str()));

    let body = Json(SessionResponse {
        success: true,
        message,
        email: identity.subject.into_inner(),
        role: identity.role,
        request_id: session.request_id().to_owned(),
    });
    with_cookie(body, &cookie::session_cookie(&token, state.cookie_config()))
}

/// Handle registration.
pub async fn register(
    State(state): State<AppState>,
    session: SessionContext,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response> {
    let form = parse_body(payload)?;
    let user = state
        .accounts()
        .register(&form.email, &form.password, form.role.as_deref())
        .await?;

    start_session(
        &state,
        &session,
        &user,
        "User registered successfully and logged in",
    )
}

/// Handle email/password login.
pub async fn login(
    State(state): State<AppState>,
    session: SessionContext,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response> {
    let form = parse_body(payload)?;
    let user = match state.accounts().login(&form.email, &form.password).await {
        Ok(user) => user,
        Err(e) => {
            tracing::info!(error = %e, "Login failed");
            return Err(e.into());
        }
    };

    tracing::info!(user_id = %user.id, "User logged in");
    start_session(&state, &session, &user, "Login successful")
}

/// Handle federated login.
pub async fn login_federated(
    State(state): State<AppState>,
    session: SessionContext,
    payload: std::result::Result<Json<FederatedLoginRequest>, JsonRejection>,
) -> Result<Response> {
    let form = parse_body(payload)?;
    let user = state
        .accounts()
        .login_federated(state.identity_verifier(), &form.token)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Federated login failed"))?;

    tracing::info!(user_id = %user.id, "User logged in via identity provider");
    start_session(&state, &session, &user, "Login successful")
}

/// Handle logout.
pub async fn logout(State(state): State<AppState>, session: SessionContext) -> Result<Response> {
    clear_sentry_user();
    let body = Json(MessageResponse {
        success: true,
        message: "Logged out successfully",
        request_id: session.request_id().to_owned(),
    });
    with_cookie(body, &cookie::cleared_cookie(state.cookie_config()))
}

/// Report the current session.
pub async fn check(session: SessionContext) -> Json<CheckResponse> {
    let identity = session.identity();
    Json(CheckResponse {
        authenticated: identity.is_some(),
        email: identity.map(|i| i.subject.to_string()),
        role: identity.map(|i| i.role),
        request_id: session.request_id().to_owned(),
    })
}

/// The caller's most recently stored address.
pub async fn my_address(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Json<AddressResponse>> {
    let user_id = session
        .placing_user()
        .ok_or(AccessDenied::Unauthenticated)?;
    let address = state
        .store()
        .latest_address(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No address found".to_string()))?;

    Ok(Json(AddressResponse {
        success: true,
        address,
        request_id: session.request_id().to_owned(),
    }))
}
