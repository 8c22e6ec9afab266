/// Authentication endpoints: signup, verification, signin, token refresh,
/// logout, and password reset
use crate::{
    account::{
        PasswordResetRequest, PasswordResetSubmit, ResendCodeRequest, SessionResponse,
        SigninRequest, SignupRequest, SignupResponse, VerifyCodeRequest,
    },
    api,
    auth::{self as gateway, AuthContext},
    context::AppContext,
    db::models::Account,
    error::{SlatedError, SlatedResult},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use chrono::Duration;

const RESET_TOKEN_TTL_HOURS: i64 = 1;

fn session_body(account: &Account, access_token: &str) -> Json<SessionResponse> {
    Json(SessionResponse {
        account_id: account.id,
        email: account.email.clone(),
        display_name: account.display_name.clone(),
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
    })
}

/// POST /auth/signup
pub async fn signup(
    State(ctx): State<AppContext>,
    Json(request): Json<SignupRequest>,
) -> SlatedResult<impl IntoResponse> {
    let pending = ctx
        .accounts
        .signup(&request.display_name, &request.email, &request.password)
        .await?;

    ctx.mailer
        .send_verification_code(&pending.email, &pending.display_name, &pending.verification_code)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            email: pending.email,
            status: "pending_verification".to_string(),
        }),
    ))
}

/// POST /auth/verify-code
///
/// Success promotes the pending signup and signs the new account in.
pub async fn verify_code(
    State(ctx): State<AppContext>,
    Json(request): Json<VerifyCodeRequest>,
) -> SlatedResult<Response> {
    let account = ctx
        .accounts
        .verify_code(&request.email, &request.verification_code)
        .await?;

    let creds = api::establish_session(&ctx, &account).await?;
    api::with_credential_cookies(session_body(&account, &creds.access_token), &creds)
}

/// POST /auth/resend-code
pub async fn resend_code(
    State(ctx): State<AppContext>,
    Json(request): Json<ResendCodeRequest>,
) -> SlatedResult<impl IntoResponse> {
    let pending = ctx.accounts.resend_code(&request.email).await?;

    ctx.mailer
        .send_verification_code(&pending.email, &pending.display_name, &pending.verification_code)
        .await?;

    Ok(api::ok_body())
}

/// POST /auth/signin
pub async fn signin(
    State(ctx): State<AppContext>,
    Json(request): Json<SigninRequest>,
) -> SlatedResult<Response> {
    let account = ctx.accounts.login(&request.email, &request.password).await?;

    let creds = api::establish_session(&ctx, &account).await?;
    api::with_credential_cookies(session_body(&account, &creds.access_token), &creds)
}

/// POST /auth/refresh
///
/// Exchanges a live month token for a fresh daily session and access
/// token. The month token itself is not rotated here.
pub async fn refresh(State(ctx): State<AppContext>, jar: CookieJar) -> SlatedResult<Response> {
    let month_token = jar
        .get(gateway::MONTH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| SlatedError::Authentication("No refresh credential".to_string()))?;

    let (account, daily_token) = ctx.tokens.refresh_daily(&month_token).await?;
    let session = ctx.accounts.create_session(account.id, &daily_token).await?;
    let access_token = ctx.tokens.issue_default_access_token(&account.id.to_string())?;

    let mut response = session_body(&account, &access_token).into_response();
    api::append_set_cookie(
        &mut response,
        &gateway::build_cookie(
            gateway::SESSION_COOKIE,
            &session.id,
            gateway::SESSION_COOKIE_MAX_AGE_SECS,
        ),
    )?;
    api::append_set_cookie(
        &mut response,
        &gateway::build_cookie(
            gateway::ACCESS_COOKIE,
            &access_token,
            gateway::ACCESS_COOKIE_MAX_AGE_SECS,
        ),
    )?;

    Ok(response)
}

/// POST /auth/logout
///
/// Drops the server-side session and revokes the month token, then clears
/// the credential cookies.
pub async fn logout(State(ctx): State<AppContext>, auth: AuthContext) -> SlatedResult<Response> {
    if let Some(session_id) = &auth.session_id {
        ctx.accounts.delete_session(session_id).await?;
    }
    ctx.tokens.clear_month_token(auth.account.id).await?;
    ctx.token_cache.invalidate(auth.account.id).await;

    tracing::info!(account_id = auth.account.id, "Logged out");

    api::with_cleared_cookies(api::ok_body())
}

/// GET /auth/me
pub async fn me(auth: AuthContext) -> Json<Account> {
    Json(auth.account)
}

/// POST /auth/request-password-reset
///
/// Always acknowledges, whether or not the email is registered, so the
/// endpoint cannot be used to probe for accounts.
pub async fn request_password_reset(
    State(ctx): State<AppContext>,
    Json(request): Json<PasswordResetRequest>,
) -> SlatedResult<impl IntoResponse> {
    match ctx.accounts.get_account_by_email(&request.email).await {
        Ok(account) => {
            let token = ctx.tokens.issue_password_reset_token(
                &account.id.to_string(),
                Duration::hours(RESET_TOKEN_TTL_HOURS),
            )?;
            ctx.mailer
                .send_password_reset_email(
                    &account.email,
                    &account.display_name,
                    &token,
                    &ctx.config.service.public_url,
                )
                .await?;
        }
        Err(SlatedError::NotFound(_)) => {
            tracing::debug!("Password reset requested for unknown email");
        }
        Err(e) => return Err(e),
    }

    Ok(api::ok_body())
}

/// POST /auth/reset-password
///
/// A successful reset revokes every outstanding credential for the
/// account: sessions, and the month token.
pub async fn reset_password(
    State(ctx): State<AppContext>,
    Json(request): Json<PasswordResetSubmit>,
) -> SlatedResult<impl IntoResponse> {
    let subject = ctx.tokens.validate_password_reset_token(&request.token)?;
    let account_id: i64 = subject
        .parse()
        .map_err(|_| SlatedError::Authentication("Malformed reset token".to_string()))?;

    ctx.accounts.reset_password(account_id, &request.new_password).await?;
    ctx.tokens.clear_month_token(account_id).await?;

    Ok(api::ok_body())
}
