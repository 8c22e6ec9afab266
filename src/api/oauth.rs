/// OAuth endpoints: Google sign-in and TikTok creator account linking.
///
/// Google runs pre-auth, so its CSRF state lives in a short-lived cookie.
/// TikTok linking requires a signed-in session, so its state is stored on
/// the session row and consumed exactly once at callback time.
use crate::{
    api,
    auth::AuthContext,
    context::AppContext,
    error::{SlatedError, SlatedResult},
    platform::oauth::generate_csrf_state,
};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

fn google_client(ctx: &AppContext) -> SlatedResult<Arc<crate::platform::oauth::GoogleOAuth>> {
    ctx.google_oauth
        .clone()
        .ok_or_else(|| SlatedError::Validation("Google sign-in is not configured".to_string()))
}

fn tiktok_client(ctx: &AppContext) -> SlatedResult<Arc<crate::platform::oauth::TikTokOAuth>> {
    ctx.tiktok_oauth
        .clone()
        .ok_or_else(|| SlatedError::Validation("TikTok linking is not configured".to_string()))
}

/// GET /auth/google
pub async fn google_login(State(ctx): State<AppContext>) -> SlatedResult<Response> {
    let client = google_client(&ctx)?;
    let state = generate_csrf_state();

    let mut response = Redirect::to(&client.authorize_url(&state)).into_response();
    api::append_set_cookie(
        &mut response,
        &crate::auth::build_cookie(OAUTH_STATE_COOKIE, &state, OAUTH_STATE_MAX_AGE_SECS),
    )?;

    Ok(response)
}

/// GET /auth/google/callback
pub async fn google_callback(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> SlatedResult<Response> {
    let client = google_client(&ctx)?;

    let expected = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| SlatedError::Authentication("Missing OAuth state".to_string()))?;
    if expected != params.state {
        return Err(SlatedError::Authentication("OAuth state mismatch".to_string()));
    }

    let access_token = client.exchange_code(&params.code).await?;
    let profile = client.fetch_profile(&access_token).await?;

    let account = ctx
        .accounts
        .upsert_oauth_account(&profile.email, &profile.name, profile.picture.as_deref())
        .await?;

    tracing::info!(account_id = account.id, "Google sign-in completed");

    let creds = api::establish_session(&ctx, &account).await?;
    let mut response = api::with_credential_cookies(Redirect::to("/"), &creds)?;
    api::append_set_cookie(&mut response, &crate::auth::clear_cookie(OAUTH_STATE_COOKIE))?;

    Ok(response)
}

/// GET /auth/tiktok
pub async fn tiktok_login(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> SlatedResult<Redirect> {
    let client = tiktok_client(&ctx)?;
    let session_id = auth
        .session_id
        .ok_or_else(|| SlatedError::Authentication("Linking requires a session".to_string()))?;

    let state = generate_csrf_state();
    ctx.accounts.set_csrf_state(&session_id, &state).await?;

    Ok(Redirect::to(&client.authorize_url(&state)))
}

/// GET /auth/tiktok/callback
pub async fn tiktok_callback(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(params): Query<CallbackParams>,
) -> SlatedResult<Redirect> {
    let client = tiktok_client(&ctx)?;
    let session_id = auth
        .session_id
        .ok_or_else(|| SlatedError::Authentication("Linking requires a session".to_string()))?;

    let expected = ctx
        .accounts
        .take_csrf_state(&session_id)
        .await?
        .ok_or_else(|| SlatedError::Authentication("Missing OAuth state".to_string()))?;
    if expected != params.state {
        return Err(SlatedError::Authentication("OAuth state mismatch".to_string()));
    }

    let tokens = client.exchange_code(&params.code).await?;

    // Profile fetch is cosmetic; a failure falls back to the open id
    let (display_name, avatar_url) = match client.fetch_profile(&tokens.access_token).await {
        Ok(profile) => (profile.display_name, profile.avatar_url),
        Err(e) => {
            tracing::warn!(error = %e, "TikTok profile fetch failed, using open id");
            (tokens.open_id.clone(), None)
        }
    };

    ctx.accounts
        .link_platform_account(
            auth.account.id,
            "tiktok",
            &tokens.open_id,
            &display_name,
            avatar_url.as_deref(),
            &tokens.access_token,
        )
        .await?;

    ctx.token_cache.put(auth.account.id, tokens.access_token).await;

    tracing::info!(account_id = auth.account.id, "TikTok account linked");

    Ok(Redirect::to("/"))
}
