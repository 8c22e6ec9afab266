/// OAuth clients for Google sign-in and TikTok account linking
use crate::{
    config::{GoogleOAuthConfig, TikTokOAuthConfig},
    error::{SlatedError, SlatedResult},
};
use rand::RngCore;
use serde::Deserialize;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo";
const GOOGLE_SCOPES: &str = "openid email profile";

const TIKTOK_AUTHORIZE_URL: &str = "https://www.tiktok.com/v2/auth/authorize/";
const TIKTOK_TOKEN_URL: &str = "https://open.tiktokapis.com/v2/oauth/token/";
const TIKTOK_USERINFO_URL: &str =
    "https://open.tiktokapis.com/v2/user/info/?fields=open_id,display_name,avatar_url";
const TIKTOK_SCOPE: &str = "user.info.basic";

/// Random CSRF state for an OAuth handshake
pub fn generate_csrf_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Google profile fields we consume
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

/// Google OAuth client (sign-in)
pub struct GoogleOAuth {
    config: GoogleOAuthConfig,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleOAuthConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Authorization URL the user is redirected to
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            GOOGLE_AUTHORIZE_URL,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(GOOGLE_SCOPES),
            urlencoding::encode(state),
        )
    }

    /// Exchange the callback code for an access token
    pub async fn exchange_code(&self, code: &str) -> SlatedResult<String> {
        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| SlatedError::ExternalService(format!("Google token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SlatedError::ExternalService(format!(
                "Google token exchange rejected: {}",
                response.status()
            )));
        }

        let tokens: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| SlatedError::ExternalService(format!("Malformed Google token response: {}", e)))?;

        Ok(tokens.access_token)
    }

    /// Fetch the user profile with an access token
    pub async fn fetch_profile(&self, access_token: &str) -> SlatedResult<GoogleProfile> {
        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SlatedError::ExternalService(format!("Google profile fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SlatedError::ExternalService(format!(
                "Google profile fetch rejected: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SlatedError::ExternalService(format!("Malformed Google profile: {}", e)))
    }
}

/// TikTok token exchange result
#[derive(Debug, Clone, Deserialize)]
pub struct TikTokTokens {
    pub access_token: String,
    pub open_id: String,
}

/// TikTok creator profile fields we consume
#[derive(Debug, Clone, Deserialize)]
pub struct TikTokProfile {
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TikTokUserInfoResponse {
    data: TikTokUserInfoData,
}

#[derive(Debug, Deserialize)]
struct TikTokUserInfoData {
    user: TikTokProfile,
}

/// TikTok OAuth client (creator account linking)
pub struct TikTokOAuth {
    config: TikTokOAuthConfig,
    http: reqwest::Client,
}

impl TikTokOAuth {
    pub fn new(config: TikTokOAuthConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Authorization URL the user is redirected to
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_key={}&response_type=code&scope={}&redirect_uri={}&state={}",
            TIKTOK_AUTHORIZE_URL,
            urlencoding::encode(&self.config.client_key),
            urlencoding::encode(TIKTOK_SCOPE),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(state),
        )
    }

    /// Exchange the callback code for an access token + open id
    pub async fn exchange_code(&self, code: &str) -> SlatedResult<TikTokTokens> {
        let response = self
            .http
            .post(TIKTOK_TOKEN_URL)
            .form(&[
                ("client_key", self.config.client_key.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SlatedError::ExternalService(format!("TikTok token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SlatedError::ExternalService(format!(
                "TikTok token exchange rejected: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SlatedError::ExternalService(format!("Malformed TikTok token response: {}", e)))
    }

    /// Fetch the creator profile for display purposes
    pub async fn fetch_profile(&self, access_token: &str) -> SlatedResult<TikTokProfile> {
        let response = self
            .http
            .get(TIKTOK_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SlatedError::ExternalService(format!("TikTok profile fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SlatedError::ExternalService(format!(
                "TikTok profile fetch rejected: {}",
                response.status()
            )));
        }

        let info: TikTokUserInfoResponse = response
            .json()
            .await
            .map_err(|e| SlatedError::ExternalService(format!("Malformed TikTok profile: {}", e)))?;

        Ok(info.data.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google() -> GoogleOAuth {
        GoogleOAuth::new(
            GoogleOAuthConfig {
                client_id: "client-id".to_string(),
                client_secret: "client-secret".to_string(),
                redirect_uri: "http://localhost:8000/auth/google/callback".to_string(),
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_google_authorize_url_carries_state() {
        let url = google().authorize_url("state-123");

        assert!(url.starts_with(GOOGLE_AUTHORIZE_URL));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("state=state-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Fauth%2Fgoogle%2Fcallback"));
    }

    #[test]
    fn test_tiktok_authorize_url_carries_scope_and_state() {
        let oauth = TikTokOAuth::new(
            TikTokOAuthConfig {
                client_key: "client-key".to_string(),
                client_secret: "client-secret".to_string(),
                redirect_uri: "http://localhost:8000/auth/tiktok/callback".to_string(),
            },
            reqwest::Client::new(),
        );

        let url = oauth.authorize_url("state-456");

        assert!(url.starts_with(TIKTOK_AUTHORIZE_URL));
        assert!(url.contains("client_key=client-key"));
        assert!(url.contains("scope=user.info.basic"));
        assert!(url.contains("state=state-456"));
    }

    #[test]
    fn test_csrf_state_is_random_hex() {
        let a = generate_csrf_state();
        let b = generate_csrf_state();

        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
