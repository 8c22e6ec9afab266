/// Delayed publish scheduler
///
/// Each scheduled content row owns at most one in-process timer. Timers
/// are keyed by content id with a generation counter: rescheduling bumps
/// the generation and aborts the old timer, and a timer that fires
/// re-checks its generation under the same lock before executing. A stale
/// timer that lost the race exits without touching the row, so a
/// reschedule can never double-fire.
use crate::{
    config::SchedulerConfig,
    db::models::ScheduledContent,
    error::{SlatedError, SlatedResult},
    platform::{PlatformPublisher, PlatformTokenCache, PublishRequest},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Content lifecycle states, persisted in the status column
pub mod status {
    pub const SCHEDULED: &str = "scheduled";
    pub const FIRING: &str = "firing";
    pub const SUCCEEDED: &str = "succeeded";
    pub const FAILED_NO_CREDENTIAL: &str = "failed_no_credential";
    pub const FAILED_MISSING_MEDIA: &str = "failed_missing_media";
    pub const FAILED_TRANSIENT: &str = "failed_transient";
    pub const FAILED_MISSED: &str = "failed_missed";
    pub const CANCELLED: &str = "cancelled";
}

/// New content submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub platform: String,
    pub media_url: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub fire_at: DateTime<Utc>,
}

struct TimerSlot {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Media references must stay inside the media root: relative, no parent
/// traversal, no absolute paths.
fn is_safe_media_reference(media_url: &str) -> bool {
    use std::path::Component;

    if media_url.contains('\\') {
        return false;
    }

    let path = std::path::Path::new(media_url);
    path.is_relative()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// Owns the timer map and drives content through its lifecycle
pub struct PublishScheduler {
    db: SqlitePool,
    publisher: Arc<dyn PlatformPublisher>,
    token_cache: Arc<PlatformTokenCache>,
    config: SchedulerConfig,
    media_root: PathBuf,
    public_url: String,
    timers: Mutex<HashMap<i64, TimerSlot>>,
    next_generation: std::sync::atomic::AtomicU64,
}

impl PublishScheduler {
    pub fn new(
        db: SqlitePool,
        publisher: Arc<dyn PlatformPublisher>,
        token_cache: Arc<PlatformTokenCache>,
        config: SchedulerConfig,
        media_root: PathBuf,
        public_url: String,
    ) -> Self {
        Self {
            db,
            publisher,
            token_cache,
            config,
            media_root,
            public_url,
            timers: Mutex::new(HashMap::new()),
            next_generation: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Persist new content and arm its timer
    pub async fn schedule(
        self: &Arc<Self>,
        account_id: i64,
        request: ScheduleRequest,
    ) -> SlatedResult<ScheduledContent> {
        let now = Utc::now();
        if request.fire_at <= now {
            return Err(SlatedError::Validation(
                "Publish time must be in the future".to_string(),
            ));
        }
        if request.title.trim().is_empty() {
            return Err(SlatedError::Validation("Title cannot be empty".to_string()));
        }
        if request.media_url.trim().is_empty() {
            return Err(SlatedError::Validation("Media URL cannot be empty".to_string()));
        }
        if !is_safe_media_reference(&request.media_url) {
            return Err(SlatedError::Validation(
                "Media URL must be a plain path inside the media directory".to_string(),
            ));
        }

        let tags = serde_json::to_string(&request.tags)
            .map_err(|e| SlatedError::Validation(format!("Invalid tags: {}", e)))?;

        let content = sqlx::query_as::<_, ScheduledContent>(
            r#"
            INSERT INTO scheduled_content
                (account_id, platform, media_url, title, description, tags,
                 fire_at, status, attempts, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(&request.platform)
        .bind(&request.media_url)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&tags)
        .bind(request.fire_at)
        .bind(status::SCHEDULED)
        .bind(now)
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            content_id = content.id,
            account_id,
            fire_at = %request.fire_at,
            "Content scheduled"
        );

        self.arm(content.id, request.fire_at);
        Ok(content)
    }

    /// Move an existing scheduled item to a new fire time.
    ///
    /// Cancel-then-add: the old timer is aborted and a fresh one armed in
    /// one pass under the timer lock, so there is never a window where
    /// both timers can fire.
    pub async fn reschedule(
        self: &Arc<Self>,
        account_id: i64,
        content_id: i64,
        fire_at: DateTime<Utc>,
    ) -> SlatedResult<ScheduledContent> {
        let now = Utc::now();
        if fire_at <= now {
            return Err(SlatedError::Validation(
                "Publish time must be in the future".to_string(),
            ));
        }

        let content = self.get_owned(account_id, content_id).await?;
        if content.status != status::SCHEDULED {
            return Err(SlatedError::Conflict(format!(
                "Content is {} and cannot be rescheduled",
                content.status
            )));
        }

        let content = sqlx::query_as::<_, ScheduledContent>(
            "UPDATE scheduled_content SET fire_at = ?, attempts = 0, last_error = NULL, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(fire_at)
        .bind(now)
        .bind(content_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(content_id, account_id, fire_at = %fire_at, "Content rescheduled");

        self.arm(content_id, fire_at);
        Ok(content)
    }

    /// Cancel a pending item. Terminal and failed items cannot be cancelled.
    pub async fn cancel(&self, account_id: i64, content_id: i64) -> SlatedResult<ScheduledContent> {
        let content = self.get_owned(account_id, content_id).await?;
        if content.status != status::SCHEDULED {
            return Err(SlatedError::Conflict(format!(
                "Content is {} and cannot be cancelled",
                content.status
            )));
        }

        self.disarm(content_id);
        let content = self.set_status(content_id, status::CANCELLED, None).await?;

        tracing::info!(content_id, account_id, "Content cancelled");
        Ok(content)
    }

    /// List all content for an account, newest fire time first
    pub async fn list_for_account(&self, account_id: i64) -> SlatedResult<Vec<ScheduledContent>> {
        let rows = sqlx::query_as::<_, ScheduledContent>(
            "SELECT * FROM scheduled_content WHERE account_id = ? ORDER BY fire_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Fetch one item, enforcing ownership
    pub async fn get_owned(&self, account_id: i64, content_id: i64) -> SlatedResult<ScheduledContent> {
        sqlx::query_as::<_, ScheduledContent>(
            "SELECT * FROM scheduled_content WHERE id = ? AND account_id = ?",
        )
        .bind(content_id)
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| SlatedError::NotFound("Scheduled content not found".to_string()))
    }

    /// Re-arm pending timers after a restart.
    ///
    /// Items still in the future are armed normally. Items whose fire time
    /// passed while the process was down are fired immediately if they are
    /// within the grace window, otherwise marked as missed.
    pub async fn recover(self: &Arc<Self>) -> SlatedResult<()> {
        let pending = sqlx::query_as::<_, ScheduledContent>(
            "SELECT * FROM scheduled_content WHERE status IN (?, ?)",
        )
        .bind(status::SCHEDULED)
        .bind(status::FIRING)
        .fetch_all(&self.db)
        .await?;

        let now = Utc::now();
        let mut armed = 0usize;
        let mut missed = 0usize;

        for content in pending {
            let overdue = now.signed_duration_since(content.fire_at).num_seconds();
            if overdue > self.config.grace_window_secs {
                self.set_status(
                    content.id,
                    status::FAILED_MISSED,
                    Some("Fire time passed outside the grace window while offline"),
                )
                .await?;
                tracing::warn!(content_id = content.id, fire_at = %content.fire_at, "Missed publish marked failed");
                missed += 1;
            } else {
                // Rows caught mid-fire go back to scheduled before re-arming
                if content.status == status::FIRING {
                    self.set_status(content.id, status::SCHEDULED, None).await?;
                }
                self.arm(content.id, content.fire_at);
                armed += 1;
            }
        }

        tracing::info!(armed, missed, "Scheduler recovery complete");
        Ok(())
    }

    /// Number of live timers, for health reporting
    pub fn armed_count(&self) -> usize {
        match self.timers.lock() {
            Ok(timers) => timers.len(),
            Err(_) => 0,
        }
    }

    /// Arm (or re-arm) the timer for a content id.
    ///
    /// The lock is held across abort-old, spawn, and insert: a zero-delay
    /// task cannot observe the map before its own slot is registered.
    fn arm(self: &Arc<Self>, content_id: i64, fire_at: DateTime<Utc>) {
        let generation = self
            .next_generation
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let Ok(mut timers) = self.timers.lock() else {
            tracing::error!(content_id, "Timer map lock poisoned, cannot arm");
            return;
        };

        if let Some(old) = timers.remove(&content_id) {
            old.handle.abort();
        }

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let delay = fire_at
                .signed_duration_since(Utc::now())
                .to_std()
                .unwrap_or_default();
            tokio::time::sleep(delay).await;

            // A reschedule may have superseded this timer while it slept.
            // The generation check and slot removal happen under one lock
            // acquisition, so exactly one timer per content id gets past
            // this point.
            {
                let Ok(mut timers) = scheduler.timers.lock() else {
                    return;
                };
                match timers.get(&content_id) {
                    Some(slot) if slot.generation == generation => {
                        timers.remove(&content_id);
                    }
                    _ => return,
                }
            }

            scheduler.execute(content_id).await;
        });

        timers.insert(content_id, TimerSlot { generation, handle });
    }

    /// Drop the timer for a content id, if one is armed
    fn disarm(&self, content_id: i64) {
        if let Ok(mut timers) = self.timers.lock() {
            if let Some(slot) = timers.remove(&content_id) {
                slot.handle.abort();
            }
        }
    }

    /// Fire one content item: resolve credential, check media, publish
    /// with bounded retries. Every outcome lands in the status column.
    async fn execute(self: &Arc<Self>, content_id: i64) {
        if let Err(e) = self.try_execute(content_id).await {
            tracing::error!(content_id, error = %e, "Publish execution failed internally");
            let _ = self
                .set_status(content_id, status::FAILED_TRANSIENT, Some(&e.to_string()))
                .await;
        }
    }

    async fn try_execute(self: &Arc<Self>, content_id: i64) -> SlatedResult<()> {
        let content = sqlx::query_as::<_, ScheduledContent>(
            "SELECT * FROM scheduled_content WHERE id = ?",
        )
        .bind(content_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| SlatedError::NotFound("Scheduled content not found".to_string()))?;

        if content.status != status::SCHEDULED {
            tracing::warn!(content_id, status = %content.status, "Timer fired for non-pending content, ignoring");
            return Ok(());
        }

        // A reschedule can land between this timer's generation check and
        // the row read above; the row is authoritative, so a fire time
        // still in the future means this fire is stale and must re-arm.
        if content.fire_at > Utc::now() {
            tracing::debug!(content_id, fire_at = %content.fire_at, "Fire time moved forward, re-arming");
            self.arm(content_id, content.fire_at);
            return Ok(());
        }

        self.set_status(content_id, status::FIRING, None).await?;
        tracing::info!(content_id, account_id = content.account_id, "Publishing content");

        // Media must still exist on disk at fire time
        let media_path = self.media_root.join(&content.media_url);
        if tokio::fs::metadata(&media_path).await.is_err() {
            tracing::error!(content_id, path = %media_path.display(), "Media file missing at publish time");
            self.set_status(
                content_id,
                status::FAILED_MISSING_MEDIA,
                Some("Media file no longer exists"),
            )
            .await?;
            return Ok(());
        }

        // Credential chain: in-memory cache first, then the persisted
        // linked-account token. No credential is terminal, not retried.
        let access_token = match self.token_cache.get(content.account_id).await {
            Some(token) => Some(token),
            None => sqlx::query_scalar::<_, String>(
                "SELECT access_token FROM linked_account WHERE account_id = ? AND platform = ?",
            )
            .bind(content.account_id)
            .bind(&content.platform)
            .fetch_optional(&self.db)
            .await?,
        };

        let Some(access_token) = access_token else {
            tracing::error!(
                content_id,
                account_id = content.account_id,
                platform = %content.platform,
                "No platform credential available"
            );
            self.set_status(
                content_id,
                status::FAILED_NO_CREDENTIAL,
                Some("No linked platform credential"),
            )
            .await?;
            return Ok(());
        };

        let request = PublishRequest {
            video_url: format!("{}/media/{}", self.public_url, content.media_url),
            title: content.title.clone(),
        };

        let deadline = content.fire_at + chrono::Duration::seconds(self.config.grace_window_secs);
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            self.record_attempt(content_id, attempt).await?;

            match self.publisher.publish(&access_token, &request).await {
                Ok(()) => {
                    self.set_status(content_id, status::SUCCEEDED, None).await?;
                    tracing::info!(content_id, attempt, "Content published");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(content_id, attempt, error = %e, "Publish attempt failed");
                    last_error = e.to_string();
                }
            }

            let retry_at =
                Utc::now() + chrono::Duration::seconds(self.config.retry_backoff_secs as i64);
            if attempt < self.config.max_attempts && retry_at <= deadline {
                tokio::time::sleep(std::time::Duration::from_secs(self.config.retry_backoff_secs))
                    .await;
            } else {
                break;
            }
        }

        tracing::error!(content_id, error = %last_error, "Publish failed after retries");
        self.set_status(content_id, status::FAILED_TRANSIENT, Some(&last_error))
            .await?;
        Ok(())
    }

    async fn record_attempt(&self, content_id: i64, attempt: u32) -> SlatedResult<()> {
        sqlx::query("UPDATE scheduled_content SET attempts = ?, updated_at = ? WHERE id = ?")
            .bind(attempt as i64)
            .bind(Utc::now())
            .bind(content_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn set_status(
        &self,
        content_id: i64,
        new_status: &str,
        last_error: Option<&str>,
    ) -> SlatedResult<ScheduledContent> {
        let content = sqlx::query_as::<_, ScheduledContent>(
            "UPDATE scheduled_content SET status = ?, last_error = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(new_status)
        .bind(last_error)
        .bind(Utc::now())
        .bind(content_id)
        .fetch_one(&self.db)
        .await?;

        tracing::debug!(content_id, status = new_status, "Content status updated");
        Ok(content)
    }
}
