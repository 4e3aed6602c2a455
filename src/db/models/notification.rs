use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NotificationPriority {
    Normal,
    High,
    Urgent,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
            NotificationPriority::Urgent => "urgent",
        }
    }
}

/// A persisted notification record informing a user of an appointment-status
/// change. Created asynchronously after a mutation succeeds; never updated or
/// retried if creation fails.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    /// Always "appointment" for records produced by the dispatcher.
    pub notification_type: String,
    /// Always "booking" for records produced by the dispatcher.
    pub category: String,
    /// The specific lifecycle event, e.g. "appointment_reminder_24h".
    pub event: String,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub status: String,
    /// JSON snapshot of the appointment at notification time.
    pub data: String,
    pub salon_id: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotification {
    pub user_id: String,
    pub notification_type: String,
    pub category: String,
    pub event: String,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub salon_id: Option<String>,
}
