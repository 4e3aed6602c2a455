use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{classify_db_error, AppResult};

pub struct NotificationRepository;

impl NotificationRepository {
    pub async fn create(
        pool: &SqlitePool,
        notification: CreateNotification,
    ) -> AppResult<Notification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let data = serde_json::to_string(&notification.data)
            .unwrap_or_else(|_| "{}".to_string());

        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (
                id, user_id, notification_type, category, event,
                priority, title, message, status, data, salon_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'unread', ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&notification.user_id)
        .bind(&notification.notification_type)
        .bind(&notification.category)
        .bind(&notification.event)
        .bind(notification.priority)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&data)
        .bind(&notification.salon_id)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(classify_db_error)
    }

    pub async fn find_by_user(
        pool: &SqlitePool,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(classify_db_error)
    }

    pub async fn count_by_user(pool: &SqlitePool, user_id: &str) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .map_err(classify_db_error)
    }

    pub async fn count_by_user_and_status(
        pool: &SqlitePool,
        user_id: &str,
        status: &str,
    ) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND status = ?",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(pool)
        .await
        .map_err(classify_db_error)
    }

    pub async fn mark_read(pool: &SqlitePool, id: &str) -> AppResult<()> {
        sqlx::query("UPDATE notifications SET status = 'read' WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(classify_db_error)?;
        Ok(())
    }
}
