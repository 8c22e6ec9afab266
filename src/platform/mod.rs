/// Platform publisher client and credential cache
///
/// The publisher is a thin wrapper over the external platform's publish
/// API. It is deliberately an interface seam: the scheduler only sees
/// `PlatformPublisher`, so tests drive it with a mock and retry policy is
/// decided by the scheduler, not here.

pub mod oauth;

use crate::{
    config::PlatformConfig,
    error::{SlatedError, SlatedResult},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Publish request body sent to the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub video_url: String,
    pub title: String,
}

/// Outbound publish seam. Any non-2xx response or transport fault is an
/// `ExternalService` error; the scheduler treats those as transient.
#[async_trait]
pub trait PlatformPublisher: Send + Sync {
    async fn publish(&self, access_token: &str, request: &PublishRequest) -> SlatedResult<()>;
}

/// TikTok publish API client
pub struct TikTokPublisher {
    http: reqwest::Client,
    publish_url: String,
}

impl TikTokPublisher {
    pub fn new(config: &PlatformConfig) -> SlatedResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SlatedError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            publish_url: config.publish_url.clone(),
        })
    }
}

#[async_trait]
impl PlatformPublisher for TikTokPublisher {
    async fn publish(&self, access_token: &str, request: &PublishRequest) -> SlatedResult<()> {
        let response = self
            .http
            .post(&self.publish_url)
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| SlatedError::ExternalService(format!("Publish request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlatedError::ExternalService(format!(
                "Publish rejected with status {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

/// In-memory cache of platform access tokens, keyed by account id.
///
/// Populated on OAuth link; the scheduler consults it before falling back
/// to the persisted linked-account credential.
#[derive(Default)]
pub struct PlatformTokenCache {
    tokens: RwLock<HashMap<i64, String>>,
}

impl PlatformTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, account_id: i64) -> Option<String> {
        self.tokens.read().await.get(&account_id).cloned()
    }

    pub async fn put(&self, account_id: i64, token: String) {
        self.tokens.write().await.insert(account_id, token);
    }

    pub async fn invalidate(&self, account_id: i64) {
        self.tokens.write().await.remove(&account_id);
    }
}
