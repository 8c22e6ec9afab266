/// Account manager implementation using runtime queries
use crate::{
    db::models::{Account, LinkedAccount, PendingAccount, Session},
    error::{SlatedError, SlatedResult},
};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::SqlitePool;
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, display_name, verified, \
     profile_image_url, month_token, month_token_expires_at, created_at";

/// Verification codes are 5 digits and live for 5 minutes
const VERIFICATION_CODE_TTL_MINUTES: i64 = 5;

/// Server-side sessions live for 24 hours
const SESSION_TTL_HOURS: i64 = 24;

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
}

impl AccountManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Begin signup: create a pending account with an emailed 5-digit code.
    ///
    /// Rejected before any write if the email is claimed by either a live
    /// account or an existing pending signup.
    pub async fn signup(
        &self,
        display_name: &str,
        email: &str,
        password: &str,
    ) -> SlatedResult<PendingAccount> {
        validate_email(email)?;
        validate_password(password)?;

        if self.email_claimed(email).await? {
            return Err(SlatedError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(password)?;
        let code = generate_verification_code();
        let now = Utc::now();
        let code_expires_at = now + Duration::minutes(VERIFICATION_CODE_TTL_MINUTES);

        let id = sqlx::query(
            "INSERT INTO pending_account (email, password_hash, display_name, verification_code, code_expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(email)
        .bind(&password_hash)
        .bind(display_name)
        .bind(&code)
        .bind(code_expires_at)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(SlatedError::Database)?
        .last_insert_rowid();

        tracing::info!(email, "Created pending account awaiting verification");

        Ok(PendingAccount {
            id,
            email: email.to_string(),
            password_hash,
            display_name: display_name.to_string(),
            verification_code: code,
            code_expires_at,
            created_at: now,
        })
    }

    /// Verify the emailed code and promote the pending signup into an account.
    ///
    /// An expired code is rejected without touching the pending row, so a
    /// resend can issue a fresh code.
    pub async fn verify_code(&self, email: &str, code: &str) -> SlatedResult<Account> {
        let pending = self
            .get_pending_account(email)
            .await?
            .ok_or_else(|| SlatedError::NotFound("No pending signup for this email".to_string()))?;

        let now = Utc::now();
        if pending.is_code_expired(now) {
            return Err(SlatedError::Validation(
                "Verification code has expired".to_string(),
            ));
        }

        if pending.verification_code != code {
            return Err(SlatedError::Validation(
                "Invalid verification code".to_string(),
            ));
        }

        // Promote and delete atomically so the email can never be claimed
        // by both tables at once
        let mut tx = self.db.begin().await.map_err(SlatedError::Database)?;

        let id = sqlx::query(
            "INSERT INTO account (email, password_hash, display_name, verified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&pending.email)
        .bind(&pending.password_hash)
        .bind(&pending.display_name)
        .bind(true)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(SlatedError::Database)?
        .last_insert_rowid();

        sqlx::query("DELETE FROM pending_account WHERE id = ?1")
            .bind(pending.id)
            .execute(&mut *tx)
            .await
            .map_err(SlatedError::Database)?;

        tx.commit().await.map_err(SlatedError::Database)?;

        tracing::info!(email, account_id = id, "Verified signup, account created");

        Ok(Account {
            id,
            email: pending.email,
            password_hash: Some(pending.password_hash),
            display_name: pending.display_name,
            verified: true,
            profile_image_url: None,
            month_token: None,
            month_token_expires_at: None,
            created_at: now,
        })
    }

    /// Issue a fresh verification code for an existing pending signup
    pub async fn resend_code(&self, email: &str) -> SlatedResult<PendingAccount> {
        let mut pending = self
            .get_pending_account(email)
            .await?
            .ok_or_else(|| SlatedError::NotFound("No pending signup for this email".to_string()))?;

        let code = generate_verification_code();
        let code_expires_at = Utc::now() + Duration::minutes(VERIFICATION_CODE_TTL_MINUTES);

        sqlx::query(
            "UPDATE pending_account SET verification_code = ?1, code_expires_at = ?2 WHERE id = ?3",
        )
        .bind(&code)
        .bind(code_expires_at)
        .bind(pending.id)
        .execute(&self.db)
        .await
        .map_err(SlatedError::Database)?;

        pending.verification_code = code;
        pending.code_expires_at = code_expires_at;
        Ok(pending)
    }

    /// Authenticate with email + password
    pub async fn login(&self, email: &str, password: &str) -> SlatedResult<Account> {
        let account = self
            .get_account_by_email(email)
            .await
            .map_err(|_| SlatedError::Authentication("Invalid email or password".to_string()))?;

        let hash = account.password_hash.as_deref().ok_or_else(|| {
            SlatedError::Authentication("This account uses OAuth sign-in".to_string())
        })?;

        if !verify_password(password, hash)? {
            return Err(SlatedError::Authentication(
                "Invalid email or password".to_string(),
            ));
        }

        Ok(account)
    }

    /// Find or create an account from a verified OAuth profile.
    /// OAuth-created accounts have no password hash and are born verified.
    pub async fn upsert_oauth_account(
        &self,
        email: &str,
        display_name: &str,
        profile_image_url: Option<&str>,
    ) -> SlatedResult<Account> {
        if let Ok(account) = self.get_account_by_email(email).await {
            return Ok(account);
        }

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO account (email, password_hash, display_name, verified, profile_image_url, created_at)
             VALUES (?1, NULL, ?2, ?3, ?4, ?5)",
        )
        .bind(email)
        .bind(display_name)
        .bind(true)
        .bind(profile_image_url)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(SlatedError::Database)?
        .last_insert_rowid();

        tracing::info!(email, account_id = id, "Created account from OAuth profile");

        self.get_account(id).await
    }

    /// Get account by id
    pub async fn get_account(&self, id: i64) -> SlatedResult<Account> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM account WHERE id = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(SlatedError::Database)?
        .ok_or_else(|| SlatedError::NotFound("Account not found".to_string()))
    }

    /// Get account by email
    pub async fn get_account_by_email(&self, email: &str) -> SlatedResult<Account> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM account WHERE email = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(SlatedError::Database)?
        .ok_or_else(|| SlatedError::NotFound("Account not found".to_string()))
    }

    /// Update the password hash and delete all sessions for the account.
    /// The caller is responsible for clearing the month token as well.
    pub async fn reset_password(&self, account_id: i64, new_password: &str) -> SlatedResult<()> {
        validate_password(new_password)?;
        let password_hash = hash_password(new_password)?;

        sqlx::query("UPDATE account SET password_hash = ?1 WHERE id = ?2")
            .bind(&password_hash)
            .bind(account_id)
            .execute(&self.db)
            .await
            .map_err(SlatedError::Database)?;

        self.delete_sessions_for_account(account_id).await?;

        tracing::info!(account_id, "Password reset, sessions invalidated");

        Ok(())
    }

    // ==================== Linked platform accounts ====================

    /// Link (or refresh) a platform creator account.
    ///
    /// A platform identity can belong to at most one account; a re-link for
    /// the same (account, platform) pair updates the row in place with one
    /// transactional write.
    pub async fn link_platform_account(
        &self,
        account_id: i64,
        platform: &str,
        platform_user_id: &str,
        display_name: &str,
        avatar_url: Option<&str>,
        access_token: &str,
    ) -> SlatedResult<LinkedAccount> {
        // Reject a platform identity already claimed by another account
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT account_id FROM linked_account WHERE platform = ?1 AND platform_user_id = ?2",
        )
        .bind(platform)
        .bind(platform_user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(SlatedError::Database)?;

        if let Some(owner) = existing {
            if owner != account_id {
                return Err(SlatedError::Conflict(
                    "Platform account is already linked to another user".to_string(),
                ));
            }
        }

        sqlx::query(
            "INSERT INTO linked_account (account_id, platform, platform_user_id, display_name, avatar_url, access_token, linked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (account_id, platform) DO UPDATE SET
                 platform_user_id = excluded.platform_user_id,
                 display_name = excluded.display_name,
                 avatar_url = excluded.avatar_url,
                 access_token = excluded.access_token,
                 linked_at = excluded.linked_at",
        )
        .bind(account_id)
        .bind(platform)
        .bind(platform_user_id)
        .bind(display_name)
        .bind(avatar_url)
        .bind(access_token)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(SlatedError::Database)?;

        tracing::info!(account_id, platform, "Linked platform account");

        self.get_linked_account(account_id, platform)
            .await?
            .ok_or_else(|| SlatedError::Internal("Linked account missing after upsert".to_string()))
    }

    /// Get the linked platform account for a user, if any
    pub async fn get_linked_account(
        &self,
        account_id: i64,
        platform: &str,
    ) -> SlatedResult<Option<LinkedAccount>> {
        sqlx::query_as::<_, LinkedAccount>(
            "SELECT id, account_id, platform, platform_user_id, display_name, avatar_url, access_token, linked_at
             FROM linked_account WHERE account_id = ?1 AND platform = ?2",
        )
        .bind(account_id)
        .bind(platform)
        .fetch_optional(&self.db)
        .await
        .map_err(SlatedError::Database)
    }

    // ==================== Sessions ====================

    /// Create a server-side session anchored on a daily token
    pub async fn create_session(&self, account_id: i64, daily_token: &str) -> SlatedResult<Session> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + Duration::hours(SESSION_TTL_HOURS);

        sqlx::query(
            "INSERT INTO session (id, account_id, daily_token, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(account_id)
        .bind(daily_token)
        .bind(now)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(SlatedError::Database)?;

        Ok(Session {
            id,
            account_id,
            daily_token: daily_token.to_string(),
            csrf_state: None,
            created_at: now,
            expires_at,
        })
    }

    /// Look up an unexpired session
    pub async fn get_session(&self, session_id: &str) -> SlatedResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, account_id, daily_token, csrf_state, created_at, expires_at
             FROM session WHERE id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.db)
        .await
        .map_err(SlatedError::Database)?;

        Ok(session.filter(|s| s.expires_at > Utc::now()))
    }

    /// Delete a session (logout)
    pub async fn delete_session(&self, session_id: &str) -> SlatedResult<()> {
        sqlx::query("DELETE FROM session WHERE id = ?1")
            .bind(session_id)
            .execute(&self.db)
            .await
            .map_err(SlatedError::Database)?;

        Ok(())
    }

    /// Delete all sessions for an account (revocation)
    pub async fn delete_sessions_for_account(&self, account_id: i64) -> SlatedResult<()> {
        sqlx::query("DELETE FROM session WHERE account_id = ?1")
            .bind(account_id)
            .execute(&self.db)
            .await
            .map_err(SlatedError::Database)?;

        Ok(())
    }

    /// Store a pending OAuth CSRF state on the session
    pub async fn set_csrf_state(&self, session_id: &str, state: &str) -> SlatedResult<()> {
        sqlx::query("UPDATE session SET csrf_state = ?1 WHERE id = ?2")
            .bind(state)
            .bind(session_id)
            .execute(&self.db)
            .await
            .map_err(SlatedError::Database)?;

        Ok(())
    }

    /// Read and clear the pending OAuth CSRF state (single use)
    pub async fn take_csrf_state(&self, session_id: &str) -> SlatedResult<Option<String>> {
        let state = sqlx::query_scalar::<_, Option<String>>(
            "SELECT csrf_state FROM session WHERE id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.db)
        .await
        .map_err(SlatedError::Database)?
        .flatten();

        if state.is_some() {
            sqlx::query("UPDATE session SET csrf_state = NULL WHERE id = ?1")
                .bind(session_id)
                .execute(&self.db)
                .await
                .map_err(SlatedError::Database)?;
        }

        Ok(state)
    }

    // ==================== Maintenance ====================

    /// Delete expired sessions. Returns the number removed.
    pub async fn cleanup_expired_sessions(&self) -> SlatedResult<u64> {
        let result = sqlx::query("DELETE FROM session WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await
            .map_err(SlatedError::Database)?;

        Ok(result.rows_affected())
    }

    /// Delete abandoned signups whose code expired more than a day ago
    pub async fn cleanup_abandoned_signups(&self) -> SlatedResult<u64> {
        let cutoff = Utc::now() - Duration::days(1);
        let result = sqlx::query("DELETE FROM pending_account WHERE code_expires_at < ?1")
            .bind(cutoff)
            .execute(&self.db)
            .await
            .map_err(SlatedError::Database)?;

        Ok(result.rows_affected())
    }

    // ==================== Internals ====================

    async fn get_pending_account(&self, email: &str) -> SlatedResult<Option<PendingAccount>> {
        sqlx::query_as::<_, PendingAccount>(
            "SELECT id, email, password_hash, display_name, verification_code, code_expires_at, created_at
             FROM pending_account WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(SlatedError::Database)
    }

    /// True if the email exists in either the account or pending table
    async fn email_claimed(&self, email: &str) -> SlatedResult<bool> {
        let accounts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await
            .map_err(SlatedError::Database)?;

        let pending: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_account WHERE email = ?1")
                .bind(email)
                .fetch_one(&self.db)
                .await
                .map_err(SlatedError::Database)?;

        Ok(accounts > 0 || pending > 0)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

/// Hash a password with Argon2id
fn hash_password(password: &str) -> SlatedResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| SlatedError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored Argon2 hash
fn verify_password(password: &str, hash: &str) -> SlatedResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| SlatedError::Internal(format!("Malformed password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// 5-digit verification code
fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(10000..=99999).to_string()
}

fn validate_email(email: &str) -> SlatedResult<()> {
    if !email.contains('@') || email.len() > 255 {
        return Err(SlatedError::Validation("Invalid email format".to_string()));
    }

    Ok(())
}

fn validate_password(password: &str) -> SlatedResult<()> {
    if password.len() < 8 {
        return Err(SlatedError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn setup() -> AccountManager {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        db::init_schema(&pool).await.unwrap();
        AccountManager::new(pool)
    }

    #[tokio::test]
    async fn test_signup_creates_pending_account_with_five_digit_code() {
        let manager = setup().await;

        let pending = manager
            .signup("Alice", "a@x.com", "password123")
            .await
            .unwrap();

        assert_eq!(pending.email, "a@x.com");
        assert_eq!(pending.verification_code.len(), 5);
        assert!(pending.verification_code.chars().all(|c| c.is_ascii_digit()));

        // Expiry about 5 minutes out
        let ttl = pending.code_expires_at - Utc::now();
        assert!(ttl > Duration::minutes(4) && ttl <= Duration::minutes(5));
    }

    #[tokio::test]
    async fn test_verify_code_promotes_pending_to_account() {
        let manager = setup().await;

        let pending = manager
            .signup("Alice", "a@x.com", "password123")
            .await
            .unwrap();

        let account = manager
            .verify_code("a@x.com", &pending.verification_code)
            .await
            .unwrap();

        assert_eq!(account.email, "a@x.com");
        assert!(account.verified);

        // Pending row is gone
        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_account WHERE email = ?1")
                .bind("a@x.com")
                .fetch_one(manager.pool())
                .await
                .unwrap();
        assert_eq!(remaining, 0);

        // Password carried over
        let logged_in = manager.login("a@x.com", "password123").await.unwrap();
        assert_eq!(logged_in.id, account.id);
    }

    #[tokio::test]
    async fn test_expired_code_rejected_and_pending_untouched() {
        let manager = setup().await;

        let pending = manager
            .signup("Alice", "a@x.com", "password123")
            .await
            .unwrap();

        // Push the expiry into the past
        sqlx::query("UPDATE pending_account SET code_expires_at = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::minutes(1))
            .bind(pending.id)
            .execute(manager.pool())
            .await
            .unwrap();

        let result = manager
            .verify_code("a@x.com", &pending.verification_code)
            .await;
        match result {
            Err(SlatedError::Validation(msg)) => assert!(msg.contains("expired")),
            _ => panic!("Expected Validation error for expired code"),
        }

        // Pending row survives so a resend can recycle it
        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_account WHERE email = ?1")
                .bind("a@x.com")
                .fetch_one(manager.pool())
                .await
                .unwrap();
        assert_eq!(remaining, 1);

        // Resend issues a fresh, usable code
        let refreshed = manager.resend_code("a@x.com").await.unwrap();
        let account = manager
            .verify_code("a@x.com", &refreshed.verification_code)
            .await
            .unwrap();
        assert!(account.verified);
    }

    #[tokio::test]
    async fn test_wrong_code_rejected() {
        let manager = setup().await;

        let pending = manager
            .signup("Alice", "a@x.com", "password123")
            .await
            .unwrap();

        let wrong = if pending.verification_code == "11111" {
            "22222"
        } else {
            "11111"
        };

        let result = manager.verify_code("a@x.com", wrong).await;
        assert!(matches!(result, Err(SlatedError::Validation(_))));
    }

    #[tokio::test]
    async fn test_duplicate_signup_rejected_before_write() {
        let manager = setup().await;

        manager
            .signup("Alice", "a@x.com", "password123")
            .await
            .unwrap();

        // Pending email already claimed
        let result = manager.signup("Alice2", "a@x.com", "password456").await;
        assert!(matches!(result, Err(SlatedError::Conflict(_))));

        // Promote, then try again against the live account
        let code: String =
            sqlx::query_scalar("SELECT verification_code FROM pending_account WHERE email = ?1")
                .bind("a@x.com")
                .fetch_one(manager.pool())
                .await
                .unwrap();
        manager.verify_code("a@x.com", &code).await.unwrap();

        let result = manager.signup("Alice3", "a@x.com", "password789").await;
        assert!(matches!(result, Err(SlatedError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password_and_oauth_accounts() {
        let manager = setup().await;

        let pending = manager
            .signup("Alice", "a@x.com", "password123")
            .await
            .unwrap();
        manager
            .verify_code("a@x.com", &pending.verification_code)
            .await
            .unwrap();

        assert!(matches!(
            manager.login("a@x.com", "wrong-password").await,
            Err(SlatedError::Authentication(_))
        ));

        // OAuth-created account has no password to log in with
        manager
            .upsert_oauth_account("g@x.com", "Google User", None)
            .await
            .unwrap();
        assert!(matches!(
            manager.login("g@x.com", "anything-here").await,
            Err(SlatedError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_oauth_upsert_is_idempotent() {
        let manager = setup().await;

        let first = manager
            .upsert_oauth_account("g@x.com", "Google User", Some("https://img/p.png"))
            .await
            .unwrap();
        let second = manager
            .upsert_oauth_account("g@x.com", "Google User", None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(first.verified);
        assert!(first.password_hash.is_none());
    }

    #[tokio::test]
    async fn test_linked_account_unique_in_both_directions() {
        let manager = setup().await;

        let alice = manager
            .upsert_oauth_account("a@x.com", "Alice", None)
            .await
            .unwrap();
        let bob = manager
            .upsert_oauth_account("b@x.com", "Bob", None)
            .await
            .unwrap();

        manager
            .link_platform_account(alice.id, "tiktok", "open-1", "alice_tt", None, "tok-1")
            .await
            .unwrap();

        // Same platform identity cannot attach to a second account
        let result = manager
            .link_platform_account(bob.id, "tiktok", "open-1", "bob_tt", None, "tok-2")
            .await;
        assert!(matches!(result, Err(SlatedError::Conflict(_))));

        // Re-link by the owner updates in place, never duplicates
        let relinked = manager
            .link_platform_account(alice.id, "tiktok", "open-1", "alice_tt", None, "tok-3")
            .await
            .unwrap();
        assert_eq!(relinked.access_token, "tok-3");

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM linked_account WHERE account_id = ?1")
                .bind(alice.id)
                .fetch_one(manager.pool())
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_session_lifecycle_and_csrf_state() {
        let manager = setup().await;

        let account = manager
            .upsert_oauth_account("a@x.com", "Alice", None)
            .await
            .unwrap();

        let session = manager.create_session(account.id, "daily-token").await.unwrap();
        assert!(manager.get_session(&session.id).await.unwrap().is_some());

        // CSRF state is single use
        manager.set_csrf_state(&session.id, "state-abc").await.unwrap();
        assert_eq!(
            manager.take_csrf_state(&session.id).await.unwrap(),
            Some("state-abc".to_string())
        );
        assert_eq!(manager.take_csrf_state(&session.id).await.unwrap(), None);

        manager.delete_session(&session.id).await.unwrap();
        assert!(manager.get_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let manager = setup().await;

        let account = manager
            .upsert_oauth_account("a@x.com", "Alice", None)
            .await
            .unwrap();

        let stale = manager.create_session(account.id, "old").await.unwrap();
        sqlx::query("UPDATE session SET expires_at = ?1 WHERE id = ?2")
            .bind(Utc::now() - Duration::hours(1))
            .bind(&stale.id)
            .execute(manager.pool())
            .await
            .unwrap();
        manager.create_session(account.id, "fresh").await.unwrap();

        let removed = manager.cleanup_expired_sessions().await.unwrap();
        assert_eq!(removed, 1);
    }
}
