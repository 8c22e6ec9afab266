/// HTTP server assembly
use crate::{api, auth, context::AppContext, db, error::SlatedResult};
use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

/// Assemble the router: every route sits behind the identity-resolving
/// middleware; handlers that need a caller take the AuthContext extractor.
pub fn build_router(ctx: AppContext) -> Router {
    let auth_routes = Router::new()
        .route("/signup", post(api::auth::signup))
        .route("/verify-code", post(api::auth::verify_code))
        .route("/resend-code", post(api::auth::resend_code))
        .route("/signin", post(api::auth::signin))
        .route("/refresh", post(api::auth::refresh))
        .route("/logout", post(api::auth::logout))
        .route("/me", get(api::auth::me))
        .route("/request-password-reset", post(api::auth::request_password_reset))
        .route("/reset-password", post(api::auth::reset_password))
        .route("/google", get(api::oauth::google_login))
        .route("/google/callback", get(api::oauth::google_callback))
        .route("/tiktok", get(api::oauth::tiktok_login))
        .route("/tiktok/callback", get(api::oauth::tiktok_callback));

    let content_routes = Router::new()
        .route("/", get(api::content::list))
        .route("/schedule", post(api::content::schedule))
        .route("/:id", get(api::content::get))
        .route("/:id/reschedule", post(api::content::reschedule))
        .route("/:id/cancel", post(api::content::cancel));

    Router::new()
        .nest("/auth", auth_routes)
        .nest("/content", content_routes)
        .route("/health", get(health))
        .nest_service(
            "/media",
            ServeDir::new(&ctx.config.storage.media_directory),
        )
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(ctx.clone(), auth::resolve_identity))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .with_state(ctx)
}

/// Bind and serve until shutdown
pub async fn serve(ctx: AppContext) -> SlatedResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(address = %addr, "Server listening");

    let router = build_router(ctx);
    axum::serve(listener, router)
        .await
        .map_err(|e| crate::error::SlatedError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

async fn health(
    axum::extract::State(ctx): axum::extract::State<AppContext>,
) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = db::test_connection(&ctx.db).await.is_ok();
    let status = if db_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(serde_json::json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "database": db_ok,
            "armed_timers": ctx.scheduler.armed_count(),
        })),
    )
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "NotFound",
            "message": "Route not found",
        })),
    )
}
