/// Scheduled content endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    db::models::ScheduledContent,
    error::SlatedResult,
    scheduler::ScheduleRequest,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub fire_at: DateTime<Utc>,
}

/// POST /content/schedule
pub async fn schedule(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(request): Json<ScheduleRequest>,
) -> SlatedResult<(StatusCode, Json<ScheduledContent>)> {
    let content = ctx.scheduler.schedule(auth.account.id, request).await?;

    Ok((StatusCode::CREATED, Json(content)))
}

/// POST /content/:id/reschedule
pub async fn reschedule(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(content_id): Path<i64>,
    Json(request): Json<RescheduleRequest>,
) -> SlatedResult<Json<ScheduledContent>> {
    let content = ctx
        .scheduler
        .reschedule(auth.account.id, content_id, request.fire_at)
        .await?;

    Ok(Json(content))
}

/// POST /content/:id/cancel
pub async fn cancel(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(content_id): Path<i64>,
) -> SlatedResult<Json<ScheduledContent>> {
    let content = ctx.scheduler.cancel(auth.account.id, content_id).await?;

    Ok(Json(content))
}

/// GET /content
pub async fn list(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> SlatedResult<Json<Vec<ScheduledContent>>> {
    let content = ctx.scheduler.list_for_account(auth.account.id).await?;

    Ok(Json(content))
}

/// GET /content/:id
pub async fn get(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(content_id): Path<i64>,
) -> SlatedResult<Json<ScheduledContent>> {
    let content = ctx.scheduler.get_owned(auth.account.id, content_id).await?;

    Ok(Json(content))
}
