//! End-to-end scheduler behavior against a real timer, an in-memory
//! database, and a scripted publisher.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use slated::{
    account::AccountManager,
    config::SchedulerConfig,
    db,
    error::{SlatedError, SlatedResult},
    platform::{PlatformPublisher, PlatformTokenCache, PublishRequest},
    scheduler::{status, PublishScheduler, ScheduleRequest},
};
use sqlx::sqlite::SqlitePool;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Publisher double: counts calls, records requests, and plays back a
/// script of outcomes (empty script means always succeed).
struct MockPublisher {
    calls: AtomicUsize,
    requests: Mutex<Vec<PublishRequest>>,
    script: Mutex<VecDeque<Result<(), String>>>,
}

impl MockPublisher {
    fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
        })
    }

    fn scripted(outcomes: Vec<Result<(), String>>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(outcomes.into()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformPublisher for MockPublisher {
    async fn publish(&self, _access_token: &str, request: &PublishRequest) -> SlatedResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        match self.script.lock().unwrap().pop_front() {
            Some(Err(message)) => Err(SlatedError::ExternalService(message)),
            _ => Ok(()),
        }
    }
}

struct Harness {
    pool: SqlitePool,
    accounts: AccountManager,
    scheduler: Arc<PublishScheduler>,
    token_cache: Arc<PlatformTokenCache>,
    _media_dir: tempfile::TempDir,
    media_root: std::path::PathBuf,
}

async fn harness(publisher: Arc<MockPublisher>) -> Harness {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    db::init_schema(&pool).await.unwrap();

    let media_dir = tempfile::tempdir().unwrap();
    let media_root = media_dir.path().to_path_buf();

    let token_cache = Arc::new(PlatformTokenCache::new());
    let scheduler = Arc::new(PublishScheduler::new(
        pool.clone(),
        publisher,
        Arc::clone(&token_cache),
        SchedulerConfig {
            max_attempts: 3,
            retry_backoff_secs: 0,
            grace_window_secs: 3600,
        },
        media_root.clone(),
        "http://localhost:8000".to_string(),
    ));

    Harness {
        accounts: AccountManager::new(pool.clone()),
        pool,
        scheduler,
        token_cache,
        _media_dir: media_dir,
        media_root,
    }
}

async fn account_with_credential(h: &Harness) -> i64 {
    let account = h
        .accounts
        .upsert_oauth_account("creator@example.com", "Creator", None)
        .await
        .unwrap();
    h.token_cache.put(account.id, "cached-token".to_string()).await;
    account.id
}

fn write_media(h: &Harness, name: &str) {
    std::fs::write(h.media_root.join(name), b"video bytes").unwrap();
}

fn request(media: &str, fire_in_ms: i64) -> ScheduleRequest {
    ScheduleRequest {
        platform: "tiktok".to_string(),
        media_url: media.to_string(),
        title: "My post".to_string(),
        description: "A description".to_string(),
        tags: vec!["one".to_string(), "two".to_string()],
        fire_at: Utc::now() + ChronoDuration::milliseconds(fire_in_ms),
    }
}

/// Poll the row until it reaches a terminal status or the deadline passes
async fn wait_for_terminal(pool: &SqlitePool, content_id: i64, timeout: Duration) -> String {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let current: String =
            sqlx::query_scalar("SELECT status FROM scheduled_content WHERE id = ?")
                .bind(content_id)
                .fetch_one(pool)
                .await
                .unwrap();

        if current != status::SCHEDULED && current != status::FIRING {
            return current;
        }
        if tokio::time::Instant::now() > deadline {
            return current;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_fires_once_and_publishes() {
    let publisher = MockPublisher::succeeding();
    let h = harness(Arc::clone(&publisher)).await;
    let account_id = account_with_credential(&h).await;
    write_media(&h, "video.mp4");

    let content = h
        .scheduler
        .schedule(account_id, request("video.mp4", 300))
        .await
        .unwrap();
    assert_eq!(content.status, status::SCHEDULED);

    let final_status = wait_for_terminal(&h.pool, content.id, Duration::from_secs(5)).await;
    assert_eq!(final_status, status::SUCCEEDED);
    assert_eq!(publisher.calls(), 1);

    let requests = publisher.requests.lock().unwrap();
    assert_eq!(requests[0].title, "My post");
    assert_eq!(requests[0].video_url, "http://localhost:8000/media/video.mp4");
}

#[tokio::test]
async fn test_rejects_media_paths_escaping_the_media_root() {
    let h = harness(MockPublisher::succeeding()).await;
    let account_id = account_with_credential(&h).await;

    for media in ["../outside.mp4", "a/../../outside.mp4", "/etc/hosts", "a\\b.mp4"] {
        let result = h.scheduler.schedule(account_id, request(media, 60_000)).await;
        assert!(
            matches!(result, Err(SlatedError::Validation(_))),
            "{} should be rejected",
            media
        );
    }

    // Plain and nested relative paths are fine
    write_media(&h, "video.mp4");
    h.scheduler
        .schedule(account_id, request("video.mp4", 60_000))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fired_timer_honors_fire_time_moved_on_the_row() {
    let publisher = MockPublisher::succeeding();
    let h = harness(Arc::clone(&publisher)).await;
    let account_id = account_with_credential(&h).await;
    write_media(&h, "video.mp4");

    let content = h
        .scheduler
        .schedule(account_id, request("video.mp4", 200))
        .await
        .unwrap();

    // Move the fire time directly on the row, so the already-armed timer
    // lands on a row whose fire time is still in the future
    let moved_to = Utc::now() + ChronoDuration::milliseconds(1200);
    sqlx::query("UPDATE scheduled_content SET fire_at = ? WHERE id = ?")
        .bind(moved_to)
        .bind(content.id)
        .execute(&h.pool)
        .await
        .unwrap();

    // Past the original instant, nothing has been published
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(publisher.calls(), 0);

    // The fire happens at the moved time instead
    let final_status = wait_for_terminal(&h.pool, content.id, Duration::from_secs(5)).await;
    assert_eq!(final_status, status::SUCCEEDED);
    assert_eq!(publisher.calls(), 1);
}

#[tokio::test]
async fn test_rejects_fire_time_in_the_past() {
    let h = harness(MockPublisher::succeeding()).await;
    let account_id = account_with_credential(&h).await;

    let result = h.scheduler.schedule(account_id, request("video.mp4", -1000)).await;
    assert!(matches!(result, Err(SlatedError::Validation(_))));
}

#[tokio::test]
async fn test_reschedule_fires_exactly_once_at_new_time() {
    let publisher = MockPublisher::succeeding();
    let h = harness(Arc::clone(&publisher)).await;
    let account_id = account_with_credential(&h).await;
    write_media(&h, "video.mp4");

    let content = h
        .scheduler
        .schedule(account_id, request("video.mp4", 200))
        .await
        .unwrap();

    // Push the fire time out before the first timer lands
    let moved = h
        .scheduler
        .reschedule(account_id, content.id, Utc::now() + ChronoDuration::milliseconds(700))
        .await
        .unwrap();
    assert_eq!(moved.status, status::SCHEDULED);

    let final_status = wait_for_terminal(&h.pool, content.id, Duration::from_secs(5)).await;
    assert_eq!(final_status, status::SUCCEEDED);

    // The superseded timer must not have produced a second publish
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(publisher.calls(), 1);
}

#[tokio::test]
async fn test_cancel_prevents_publish() {
    let publisher = MockPublisher::succeeding();
    let h = harness(Arc::clone(&publisher)).await;
    let account_id = account_with_credential(&h).await;
    write_media(&h, "video.mp4");

    let content = h
        .scheduler
        .schedule(account_id, request("video.mp4", 300))
        .await
        .unwrap();

    let cancelled = h.scheduler.cancel(account_id, content.id).await.unwrap();
    assert_eq!(cancelled.status, status::CANCELLED);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(publisher.calls(), 0);

    // A cancelled item cannot be rescheduled back to life
    let result = h
        .scheduler
        .reschedule(account_id, content.id, Utc::now() + ChronoDuration::seconds(1))
        .await;
    assert!(matches!(result, Err(SlatedError::Conflict(_))));
}

#[tokio::test]
async fn test_no_credential_is_terminal_without_retry() {
    let publisher = MockPublisher::succeeding();
    let h = harness(Arc::clone(&publisher)).await;

    // Account exists but has no cached token and no linked account
    let account = h
        .accounts
        .upsert_oauth_account("nolink@example.com", "No Link", None)
        .await
        .unwrap();
    write_media(&h, "video.mp4");

    let content = h
        .scheduler
        .schedule(account.id, request("video.mp4", 200))
        .await
        .unwrap();

    let final_status = wait_for_terminal(&h.pool, content.id, Duration::from_secs(5)).await;
    assert_eq!(final_status, status::FAILED_NO_CREDENTIAL);
    assert_eq!(publisher.calls(), 0);
}

#[tokio::test]
async fn test_falls_back_to_linked_account_credential() {
    let publisher = MockPublisher::succeeding();
    let h = harness(Arc::clone(&publisher)).await;

    let account = h
        .accounts
        .upsert_oauth_account("linked@example.com", "Linked", None)
        .await
        .unwrap();
    h.accounts
        .link_platform_account(account.id, "tiktok", "open-id-1", "Linked", None, "db-token")
        .await
        .unwrap();
    write_media(&h, "video.mp4");

    let content = h
        .scheduler
        .schedule(account.id, request("video.mp4", 200))
        .await
        .unwrap();

    let final_status = wait_for_terminal(&h.pool, content.id, Duration::from_secs(5)).await;
    assert_eq!(final_status, status::SUCCEEDED);
    assert_eq!(publisher.calls(), 1);
}

#[tokio::test]
async fn test_missing_media_is_terminal_without_publish() {
    let publisher = MockPublisher::succeeding();
    let h = harness(Arc::clone(&publisher)).await;
    let account_id = account_with_credential(&h).await;
    // No media file written

    let content = h
        .scheduler
        .schedule(account_id, request("gone.mp4", 200))
        .await
        .unwrap();

    let final_status = wait_for_terminal(&h.pool, content.id, Duration::from_secs(5)).await;
    assert_eq!(final_status, status::FAILED_MISSING_MEDIA);
    assert_eq!(publisher.calls(), 0);
}

#[tokio::test]
async fn test_transient_failure_retried_then_succeeds() {
    let publisher = MockPublisher::scripted(vec![
        Err("upstream 502".to_string()),
        Ok(()),
    ]);
    let h = harness(Arc::clone(&publisher)).await;
    let account_id = account_with_credential(&h).await;
    write_media(&h, "video.mp4");

    let content = h
        .scheduler
        .schedule(account_id, request("video.mp4", 200))
        .await
        .unwrap();

    let final_status = wait_for_terminal(&h.pool, content.id, Duration::from_secs(5)).await;
    assert_eq!(final_status, status::SUCCEEDED);
    assert_eq!(publisher.calls(), 2);

    let attempts: i64 = sqlx::query_scalar("SELECT attempts FROM scheduled_content WHERE id = ?")
        .bind(content.id)
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(attempts, 2);
}

#[tokio::test]
async fn test_retries_exhausted_marks_failed_transient() {
    let publisher = MockPublisher::scripted(vec![
        Err("down".to_string()),
        Err("down".to_string()),
        Err("down".to_string()),
    ]);
    let h = harness(Arc::clone(&publisher)).await;
    let account_id = account_with_credential(&h).await;
    write_media(&h, "video.mp4");

    let content = h
        .scheduler
        .schedule(account_id, request("video.mp4", 200))
        .await
        .unwrap();

    let final_status = wait_for_terminal(&h.pool, content.id, Duration::from_secs(5)).await;
    assert_eq!(final_status, status::FAILED_TRANSIENT);
    assert_eq!(publisher.calls(), 3);

    let last_error: Option<String> =
        sqlx::query_scalar("SELECT last_error FROM scheduled_content WHERE id = ?")
            .bind(content.id)
            .fetch_one(&h.pool)
            .await
            .unwrap();
    assert!(last_error.unwrap().contains("down"));
}

async fn insert_row(pool: &SqlitePool, account_id: i64, fire_at: chrono::DateTime<Utc>) -> i64 {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO scheduled_content
             (account_id, platform, media_url, title, description, tags,
              fire_at, status, attempts, created_at, updated_at)
         VALUES (?, 'tiktok', 'video.mp4', 'Recovered', '', '[]', ?, 'scheduled', 0, ?, ?)",
    )
    .bind(account_id)
    .bind(fire_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

#[tokio::test]
async fn test_recover_fires_overdue_content_within_grace() {
    let publisher = MockPublisher::succeeding();
    let h = harness(Arc::clone(&publisher)).await;
    let account_id = account_with_credential(&h).await;
    write_media(&h, "video.mp4");

    // Fire time passed ten minutes ago, well inside the one hour grace
    let overdue = insert_row(&h.pool, account_id, Utc::now() - ChronoDuration::minutes(10)).await;

    h.scheduler.recover().await.unwrap();

    let final_status = wait_for_terminal(&h.pool, overdue, Duration::from_secs(5)).await;
    assert_eq!(final_status, status::SUCCEEDED);
    assert_eq!(publisher.calls(), 1);
}

#[tokio::test]
async fn test_recover_marks_content_beyond_grace_as_missed() {
    let publisher = MockPublisher::succeeding();
    let h = harness(Arc::clone(&publisher)).await;
    let account_id = account_with_credential(&h).await;
    write_media(&h, "video.mp4");

    let missed = insert_row(&h.pool, account_id, Utc::now() - ChronoDuration::hours(2)).await;

    h.scheduler.recover().await.unwrap();

    let current: String = sqlx::query_scalar("SELECT status FROM scheduled_content WHERE id = ?")
        .bind(missed)
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(current, status::FAILED_MISSED);
    assert_eq!(publisher.calls(), 0);
}

#[tokio::test]
async fn test_list_is_scoped_to_the_account() {
    let publisher = MockPublisher::succeeding();
    let h = harness(Arc::clone(&publisher)).await;

    let a = h
        .accounts
        .upsert_oauth_account("a@example.com", "A", None)
        .await
        .unwrap();
    let b = h
        .accounts
        .upsert_oauth_account("b@example.com", "B", None)
        .await
        .unwrap();

    h.scheduler
        .schedule(a.id, request("video.mp4", 60_000))
        .await
        .unwrap();
    let b_content = h
        .scheduler
        .schedule(b.id, request("video.mp4", 60_000))
        .await
        .unwrap();

    let listed = h.scheduler.list_for_account(b.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, b_content.id);

    // Ownership is enforced on direct fetches too
    let result = h.scheduler.get_owned(a.id, b_content.id).await;
    assert!(matches!(result, Err(SlatedError::NotFound(_))));
}
