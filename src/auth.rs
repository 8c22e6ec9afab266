/// Session gateway
///
/// Single entry point turning request credentials into an identity.
/// Resolution order, strongest anchor first:
///
///   1. `session_id` cookie referencing a live server-side session
///   2. Bearer access token (Authorization header or `access_token` cookie)
///   3. `month_token` cookie, which mints a fresh daily token and session
///
/// Handlers never read raw cookies; they take the [`AuthContext`]
/// extractor, which reads what the middleware resolved.
use crate::{
    context::AppContext,
    db::models::Account,
    error::{SlatedError, SlatedResult},
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

pub const SESSION_COOKIE: &str = "session_id";
pub const ACCESS_COOKIE: &str = "access_token";
pub const MONTH_COOKIE: &str = "month_token";

pub const SESSION_COOKIE_MAX_AGE_SECS: i64 = 24 * 3600;
pub const ACCESS_COOKIE_MAX_AGE_SECS: i64 = 3600;
pub const MONTH_COOKIE_MAX_AGE_SECS: i64 = 30 * 24 * 3600;

/// Resolved request identity, inserted into request extensions
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account: Account,
    /// Present when the request is anchored to a server-side session
    pub session_id: Option<String>,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = SlatedError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| SlatedError::Authentication("Authentication required".to_string()))
    }
}

/// Cookies minted during a month-token refresh, attached to the response
struct RefreshedCredentials {
    session_id: String,
    access_token: String,
}

/// Resolve the caller's identity and stash it in request extensions.
///
/// An absent credential leaves the request anonymous (protected handlers
/// reject via the extractor). A presented-but-bad bearer token fails the
/// request so clients see expired vs. invalid distinctly, while a month
/// cookie whose stored value was revoked or superseded drops to anonymous
/// and is cleared, so the holder can always reach sign-in again.
pub async fn resolve_identity(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, SlatedError> {
    let mut refreshed = None;
    let mut stale_month_cookie = false;

    if let Some(auth) =
        resolve(&ctx, &jar, request.headers(), &mut refreshed, &mut stale_month_cookie).await?
    {
        request.extensions_mut().insert(auth);
    }

    let mut response = next.run(request).await;

    if let Some(creds) = refreshed {
        append_cookie(
            &mut response,
            SESSION_COOKIE,
            &creds.session_id,
            SESSION_COOKIE_MAX_AGE_SECS,
        )?;
        append_cookie(
            &mut response,
            ACCESS_COOKIE,
            &creds.access_token,
            ACCESS_COOKIE_MAX_AGE_SECS,
        )?;
    }

    // A dead month cookie gets cleared so the browser stops presenting it,
    // unless the handler just minted a fresh one (sign-in while holding a
    // revoked cookie).
    if stale_month_cookie && !sets_month_cookie(&response) {
        let header_value = HeaderValue::from_str(&clear_cookie(MONTH_COOKIE))
            .map_err(|_| SlatedError::Internal("Invalid cookie value".to_string()))?;
        response.headers_mut().append(header::SET_COOKIE, header_value);
    }

    Ok(response)
}

fn sets_month_cookie(response: &Response) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| {
            v.to_str()
                .map(|s| s.starts_with(&format!("{}=", MONTH_COOKIE)))
                .unwrap_or(false)
        })
}

async fn resolve(
    ctx: &AppContext,
    jar: &CookieJar,
    headers: &axum::http::HeaderMap,
    refreshed: &mut Option<RefreshedCredentials>,
    stale_month_cookie: &mut bool,
) -> SlatedResult<Option<AuthContext>> {
    // 1. Server-side session
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(session) = ctx.accounts.get_session(cookie.value()).await? {
            let account = ctx.accounts.get_account(session.account_id).await?;
            return Ok(Some(AuthContext {
                account,
                session_id: Some(session.id),
            }));
        }
        // Expired or deleted session falls through to the token chain
    }

    // 2. Bearer access token
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| jar.get(ACCESS_COOKIE).map(|c| c.value().to_string()));

    let mut token_error = None;
    if let Some(token) = bearer {
        match ctx.tokens.validate(&token) {
            Ok(subject) => {
                let account_id: i64 = subject.parse().map_err(|_| {
                    SlatedError::Authentication("Malformed token subject".to_string())
                })?;
                let account = ctx.accounts.get_account(account_id).await?;
                return Ok(Some(AuthContext {
                    account,
                    session_id: None,
                }));
            }
            // An expired or invalid access token still gets a chance to
            // refresh off the month token below
            Err(e @ (SlatedError::TokenExpired | SlatedError::Authentication(_))) => {
                token_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    // 3. Month token refresh
    if let Some(cookie) = jar.get(MONTH_COOKIE) {
        match ctx.tokens.refresh_daily(cookie.value()).await {
            Ok((account, daily_token)) => {
                let session = ctx.accounts.create_session(account.id, &daily_token).await?;
                let access_token =
                    ctx.tokens.issue_default_access_token(&account.id.to_string())?;

                tracing::debug!(account_id = account.id, "Refreshed daily session from month token");

                *refreshed = Some(RefreshedCredentials {
                    session_id: session.id.clone(),
                    access_token,
                });

                return Ok(Some(AuthContext {
                    account,
                    session_id: Some(session.id),
                }));
            }
            // The cookie outlived the stored value (revoked on logout or
            // password reset, superseded by rotation, or time-expired).
            // That is the end of the session chain, not a request fault:
            // the caller becomes anonymous and must re-authenticate.
            Err(SlatedError::TokenExpired | SlatedError::Authentication(_)) => {
                tracing::debug!("Presented month token is no longer valid, treating as anonymous");
                *stale_month_cookie = true;
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
    }

    match token_error {
        Some(e) => Err(e),
        None => Ok(None),
    }
}

/// Append a Set-Cookie header to the outgoing response
fn append_cookie(response: &mut Response, name: &str, value: &str, max_age_secs: i64) -> SlatedResult<()> {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, value, max_age_secs
    );
    let header_value = HeaderValue::from_str(&cookie)
        .map_err(|_| SlatedError::Internal("Invalid cookie value".to_string()))?;
    response.headers_mut().append(header::SET_COOKIE, header_value);

    Ok(())
}

/// Build a Set-Cookie value for handlers that mint credentials directly
pub fn build_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, value, max_age_secs
    )
}

/// Build an expired Set-Cookie value, clearing it on the client
pub fn clear_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}
