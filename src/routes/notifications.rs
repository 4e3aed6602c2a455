use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::Notification;
use crate::db::NotificationRepository;
use crate::error::AppResult;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/:id/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub user_id: String,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsListResponse {
    pub items: Vec<Notification>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

/// List notification history for a user, newest first.
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<NotificationsListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let items =
        NotificationRepository::find_by_user(&state.db, &query.user_id, per_page, offset).await?;
    let total = NotificationRepository::count_by_user(&state.db, &query.user_id).await?;

    Ok(Json(NotificationsListResponse {
        items,
        total,
        page,
        per_page,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UnreadCountQuery {
    pub user_id: String,
}

async fn unread_count(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UnreadCountQuery>,
) -> AppResult<Json<UnreadCountResponse>> {
    let unread =
        NotificationRepository::count_by_user_and_status(&state.db, &query.user_id, "unread")
            .await?;
    Ok(Json(UnreadCountResponse { unread }))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    NotificationRepository::mark_read(&state.db, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
