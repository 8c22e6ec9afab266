/// HTTP API handlers
pub mod auth;
pub mod content;
pub mod oauth;

use crate::{auth as gateway, context::AppContext, db::models::Account, error::SlatedResult};
use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};

/// Credential set minted on login, verification, and OAuth sign-in
pub struct IssuedCredentials {
    pub session_id: String,
    pub access_token: String,
    pub month_token: String,
}

/// Mint the full credential set for an authenticated account: a rotated
/// month token, a daily token anchoring a new server-side session, and a
/// short-lived access token.
pub async fn establish_session(
    ctx: &AppContext,
    account: &Account,
) -> SlatedResult<IssuedCredentials> {
    let month_token = ctx.tokens.rotate_month_token(account.id).await?;
    let daily_token = ctx.tokens.issue_daily_token(&account.id.to_string())?;
    let session = ctx.accounts.create_session(account.id, &daily_token).await?;
    let access_token = ctx.tokens.issue_default_access_token(&account.id.to_string())?;

    tracing::info!(account_id = account.id, "Session established");

    Ok(IssuedCredentials {
        session_id: session.id,
        access_token,
        month_token,
    })
}

/// Attach the credential cookies to a response
pub fn with_credential_cookies(
    body: impl IntoResponse,
    creds: &IssuedCredentials,
) -> SlatedResult<Response> {
    let mut response = body.into_response();
    for cookie in [
        gateway::build_cookie(
            gateway::SESSION_COOKIE,
            &creds.session_id,
            gateway::SESSION_COOKIE_MAX_AGE_SECS,
        ),
        gateway::build_cookie(
            gateway::ACCESS_COOKIE,
            &creds.access_token,
            gateway::ACCESS_COOKIE_MAX_AGE_SECS,
        ),
        gateway::build_cookie(
            gateway::MONTH_COOKIE,
            &creds.month_token,
            gateway::MONTH_COOKIE_MAX_AGE_SECS,
        ),
    ] {
        append_set_cookie(&mut response, &cookie)?;
    }

    Ok(response)
}

/// Attach expired credential cookies, clearing them on the client
pub fn with_cleared_cookies(body: impl IntoResponse) -> SlatedResult<Response> {
    let mut response = body.into_response();
    for name in [gateway::SESSION_COOKIE, gateway::ACCESS_COOKIE, gateway::MONTH_COOKIE] {
        append_set_cookie(&mut response, &gateway::clear_cookie(name))?;
    }

    Ok(response)
}

pub(crate) fn append_set_cookie(response: &mut Response, cookie: &str) -> SlatedResult<()> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|_| crate::error::SlatedError::Internal("Invalid cookie value".to_string()))?;
    response.headers_mut().append(header::SET_COOKIE, value);

    Ok(())
}

/// Plain `{"status": "ok"}` body for acknowledgement-only endpoints
pub fn ok_body() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
