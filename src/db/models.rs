/// Database models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    /// Null for OAuth-created accounts
    pub password_hash: Option<String>,
    pub display_name: String,
    pub verified: bool,
    pub profile_image_url: Option<String>,
    /// Persisted long-lived token; exactly one live value per account
    pub month_token: Option<String>,
    pub month_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Pre-verification signup record. Promoted into an Account on
/// successful code verification, then deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PendingAccount {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub verification_code: String,
    pub code_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PendingAccount {
    pub fn is_code_expired(&self, now: DateTime<Utc>) -> bool {
        self.code_expires_at < now
    }
}

/// Linked third-party creator account and its API credential
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub id: i64,
    pub account_id: i64,
    pub platform: String,
    pub platform_user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub access_token: String,
    pub linked_at: DateTime<Utc>,
}

/// A unit of media + metadata queued for future publication
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScheduledContent {
    pub id: i64,
    pub account_id: i64,
    pub platform: String,
    pub media_url: String,
    pub title: String,
    pub description: String,
    /// JSON-encoded tag list
    pub tags: String,
    pub fire_at: DateTime<Utc>,
    pub status: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Server-side session record. Typed fields, not an open-ended map:
/// the daily token anchors request auth, csrf_state holds a pending
/// OAuth handshake if one is in flight.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub account_id: i64,
    pub daily_token: String,
    pub csrf_state: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
