use slated::{config::ServerConfig, context::AppContext, error::SlatedResult, jobs, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> SlatedResult<()> {
    let config = ServerConfig::from_env()?;
    config.validate()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        hostname = %config.service.hostname,
        port = config.service.port,
        "Starting Slated"
    );

    let ctx = AppContext::new(config).await?;

    // Re-arm timers for content scheduled before the last shutdown
    ctx.scheduler.recover().await?;

    jobs::start(ctx.clone());

    server::serve(ctx).await
}
