/// Shared application context
use crate::{
    account::AccountManager,
    config::ServerConfig,
    db,
    error::SlatedResult,
    mailer::Mailer,
    platform::{
        oauth::{GoogleOAuth, TikTokOAuth},
        PlatformPublisher, PlatformTokenCache, TikTokPublisher,
    },
    scheduler::PublishScheduler,
    tokens::TokenService,
};
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

/// Application context shared across request handlers and background jobs
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountManager>,
    pub tokens: Arc<TokenService>,
    pub scheduler: Arc<PublishScheduler>,
    pub token_cache: Arc<PlatformTokenCache>,
    pub mailer: Mailer,
    pub google_oauth: Option<Arc<GoogleOAuth>>,
    pub tiktok_oauth: Option<Arc<TikTokOAuth>>,
}

impl AppContext {
    /// Wire up the pool, schema, and every service
    pub async fn new(config: ServerConfig) -> SlatedResult<Self> {
        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::init_schema(&pool).await?;

        let accounts = Arc::new(AccountManager::new(pool.clone()));
        let tokens = Arc::new(TokenService::new(pool.clone(), &config.authentication));
        let token_cache = Arc::new(PlatformTokenCache::new());

        let publisher: Arc<dyn PlatformPublisher> =
            Arc::new(TikTokPublisher::new(&config.platform)?);
        let scheduler = Arc::new(PublishScheduler::new(
            pool.clone(),
            publisher,
            Arc::clone(&token_cache),
            config.scheduler.clone(),
            config.storage.media_directory.clone(),
            config.service.public_url.clone(),
        ));

        let mailer = Mailer::new(config.email.clone())?;

        let http = reqwest::Client::new();
        let google_oauth = config
            .google_oauth
            .clone()
            .map(|c| Arc::new(GoogleOAuth::new(c, http.clone())));
        let tiktok_oauth = config
            .tiktok_oauth
            .clone()
            .map(|c| Arc::new(TikTokOAuth::new(c, http.clone())));

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            accounts,
            tokens,
            scheduler,
            token_cache,
            mailer,
            google_oauth,
            tiktok_oauth,
        })
    }
}
