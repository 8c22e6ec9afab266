/// Configuration management for Slated
use crate::error::{SlatedError, SlatedResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub platform: PlatformConfig,
    pub scheduler: SchedulerConfig,
    pub google_oauth: Option<GoogleOAuthConfig>,
    pub tiktok_oauth: Option<TikTokOAuthConfig>,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Externally reachable base URL, used in emails and OAuth redirects
    pub public_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    /// Root directory holding uploaded media referenced by scheduled content
    pub media_directory: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime in minutes (short-lived, per-request credential)
    pub access_token_ttl_minutes: i64,
    /// Daily token lifetime in hours
    pub daily_token_ttl_hours: i64,
    /// Month token lifetime in days (root of trust for long sessions)
    pub month_token_ttl_days: i64,
}

/// Platform publish API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Publish endpoint, e.g. https://open.tiktokapis.com/v2/post/publish/
    pub publish_url: String,
    /// Timeout applied to each publisher HTTP call
    pub request_timeout_secs: u64,
}

/// Publish scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum publish attempts for transient failures
    pub max_attempts: u32,
    /// Delay between retry attempts, in seconds
    pub retry_backoff_secs: u64,
    /// How long after a missed fire time a job is still honored, in seconds
    pub grace_window_secs: i64,
}

/// Google OAuth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// TikTok OAuth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TikTokOAuthConfig {
    pub client_key: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> SlatedResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("SLATED_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("SLATED_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|_| SlatedError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("SLATED_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let data_directory: PathBuf = env::var("SLATED_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("SLATED_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("slated.sqlite"));
        let media_directory = env::var("SLATED_MEDIA_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("media"));

        let jwt_secret = env::var("SLATED_JWT_SECRET")
            .map_err(|_| SlatedError::Validation("JWT secret required".to_string()))?;
        let access_token_ttl_minutes = env::var("SLATED_ACCESS_TOKEN_TTL_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);
        let daily_token_ttl_hours = env::var("SLATED_DAILY_TOKEN_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .unwrap_or(24);
        let month_token_ttl_days = env::var("SLATED_MONTH_TOKEN_TTL_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let publish_url = env::var("SLATED_PUBLISH_URL")
            .unwrap_or_else(|_| "https://open.tiktokapis.com/v2/post/publish/".to_string());
        let request_timeout_secs = env::var("SLATED_PUBLISH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let max_attempts = env::var("SLATED_PUBLISH_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .unwrap_or(3);
        let retry_backoff_secs = env::var("SLATED_PUBLISH_RETRY_BACKOFF_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);
        let grace_window_secs = env::var("SLATED_PUBLISH_GRACE_WINDOW_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);

        let google_oauth = match (
            env::var("SLATED_GOOGLE_CLIENT_ID"),
            env::var("SLATED_GOOGLE_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                redirect_uri: env::var("SLATED_GOOGLE_REDIRECT_URI")
                    .unwrap_or_else(|_| format!("{}/auth/google/callback", public_url)),
            }),
            _ => None,
        };

        let tiktok_oauth = match (
            env::var("SLATED_TIKTOK_CLIENT_KEY"),
            env::var("SLATED_TIKTOK_CLIENT_SECRET"),
        ) {
            (Ok(client_key), Ok(client_secret)) => Some(TikTokOAuthConfig {
                client_key,
                client_secret,
                redirect_uri: env::var("SLATED_TIKTOK_REDIRECT_URI")
                    .unwrap_or_else(|_| format!("{}/auth/tiktok/callback", public_url)),
            }),
            _ => None,
        };

        let email = if let Ok(smtp_url) = env::var("SLATED_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("SLATED_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
                media_directory,
            },
            authentication: AuthConfig {
                jwt_secret,
                access_token_ttl_minutes,
                daily_token_ttl_hours,
                month_token_ttl_days,
            },
            platform: PlatformConfig {
                publish_url,
                request_timeout_secs,
            },
            scheduler: SchedulerConfig {
                max_attempts,
                retry_backoff_secs,
                grace_window_secs,
            },
            google_oauth,
            tiktok_oauth,
            email,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration. A failure here refuses startup.
    pub fn validate(&self) -> SlatedResult<()> {
        if self.service.hostname.is_empty() {
            return Err(SlatedError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(SlatedError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.scheduler.max_attempts == 0 {
            return Err(SlatedError::Validation(
                "Scheduler max attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
