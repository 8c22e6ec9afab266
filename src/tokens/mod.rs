/// Token service
///
/// Issues and validates the three credential classes:
/// - access tokens: short-lived signed JWTs, stateless, signature + expiry only
/// - daily tokens: 24h JWTs, reissued while a valid month token exists
/// - month tokens: opaque values persisted on the account row so they can be
///   individually revoked; validated by exact stored-value match AND expiry
use crate::{
    config::AuthConfig,
    db::models::Account,
    error::{SlatedError, SlatedResult},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    /// Single-purpose tokens (password reset) carry a purpose marker so
    /// they are never interchangeable with auth tokens, and vice versa
    #[serde(default, skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
}

const PURPOSE_PASSWORD_RESET: &str = "password_reset";

/// Token issuing and validation service
pub struct TokenService {
    db: SqlitePool,
    secret: String,
    access_ttl: Duration,
    daily_ttl: Duration,
    month_ttl: Duration,
}

impl TokenService {
    pub fn new(db: SqlitePool, config: &AuthConfig) -> Self {
        Self {
            db,
            secret: config.jwt_secret.clone(),
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            daily_ttl: Duration::hours(config.daily_token_ttl_hours),
            month_ttl: Duration::days(config.month_token_ttl_days),
        }
    }

    /// Issue a signed access token for a subject with an explicit lifetime
    pub fn issue_access_token(&self, subject: &str, ttl: Duration) -> SlatedResult<String> {
        self.issue(subject, ttl, None)
    }

    /// Issue a short-lived token usable only for a password reset
    pub fn issue_password_reset_token(&self, subject: &str, ttl: Duration) -> SlatedResult<String> {
        self.issue(subject, ttl, Some(PURPOSE_PASSWORD_RESET))
    }

    fn issue(&self, subject: &str, ttl: Duration, purpose: Option<&str>) -> SlatedResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            purpose: purpose.map(str::to_string),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| SlatedError::Jwt(format!("Failed to generate token: {}", e)))
    }

    /// Short-lived access token with the default lifetime (~1h)
    pub fn issue_default_access_token(&self, subject: &str) -> SlatedResult<String> {
        self.issue_access_token(subject, self.access_ttl)
    }

    /// Daily token (~24h), the cheap-to-validate session credential
    pub fn issue_daily_token(&self, subject: &str) -> SlatedResult<String> {
        self.issue_access_token(subject, self.daily_ttl)
    }

    /// Validate a signed auth token and return its subject.
    ///
    /// Expired-but-well-formed tokens yield `TokenExpired`, anything else
    /// yields `Authentication`, so callers can decide refresh vs re-login.
    /// Purpose-scoped tokens are rejected here; they never grant auth.
    pub fn validate(&self, token: &str) -> SlatedResult<String> {
        let claims = self.decode_claims(token)?;

        if claims.purpose.is_some() {
            return Err(SlatedError::Authentication("Invalid token".to_string()));
        }

        Ok(claims.sub)
    }

    /// Validate a password reset token and return its subject. Auth tokens
    /// are rejected: a leaked access or daily token must not be able to
    /// take over the account through the reset flow.
    pub fn validate_password_reset_token(&self, token: &str) -> SlatedResult<String> {
        let claims = self.decode_claims(token)?;

        if claims.purpose.as_deref() != Some(PURPOSE_PASSWORD_RESET) {
            return Err(SlatedError::Authentication("Invalid reset token".to_string()));
        }

        Ok(claims.sub)
    }

    fn decode_claims(&self, token: &str) -> SlatedResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(data) => Ok(data.claims),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                Err(SlatedError::TokenExpired)
            }
            Err(_) => Err(SlatedError::Authentication("Invalid token".to_string())),
        }
    }

    /// Issue a fresh month token for an account, overwriting any stored value.
    /// All previously issued month tokens for the account become invalid.
    pub async fn rotate_month_token(&self, account_id: i64) -> SlatedResult<String> {
        let token = generate_opaque_token();
        let expires_at = Utc::now() + self.month_ttl;

        sqlx::query("UPDATE account SET month_token = ?1, month_token_expires_at = ?2 WHERE id = ?3")
            .bind(&token)
            .bind(expires_at)
            .bind(account_id)
            .execute(&self.db)
            .await
            .map_err(SlatedError::Database)?;

        tracing::debug!(account_id, "Rotated month token");

        Ok(token)
    }

    /// Clear the stored month token (logout / password reset revocation)
    pub async fn clear_month_token(&self, account_id: i64) -> SlatedResult<()> {
        sqlx::query("UPDATE account SET month_token = NULL, month_token_expires_at = NULL WHERE id = ?1")
            .bind(account_id)
            .execute(&self.db)
            .await
            .map_err(SlatedError::Database)?;

        Ok(())
    }

    /// Validate a presented month token by exact stored-value match plus
    /// expiry. A signature-valid-but-superseded token fails the match.
    pub async fn validate_month_token(&self, token: &str) -> SlatedResult<Account> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, email, password_hash, display_name, verified, profile_image_url,
                    month_token, month_token_expires_at, created_at
             FROM account WHERE month_token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .map_err(SlatedError::Database)?
        .ok_or_else(|| SlatedError::Authentication("Invalid month token".to_string()))?;

        match account.month_token_expires_at {
            Some(expires_at) if expires_at > Utc::now() => Ok(account),
            _ => Err(SlatedError::TokenExpired),
        }
    }

    /// Issue a new daily token anchored on a valid month token.
    /// Fails with `TokenExpired`/`Authentication` when the session chain is
    /// dead, which means the caller must re-authenticate.
    pub async fn refresh_daily(&self, month_token: &str) -> SlatedResult<(Account, String)> {
        let account = self.validate_month_token(month_token).await?;
        let daily = self.issue_daily_token(&account.id.to_string())?;

        tracing::debug!(account_id = account.id, "Refreshed daily token from month token");

        Ok((account, daily))
    }
}

/// Random opaque token, 32 bytes hex-encoded
fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
