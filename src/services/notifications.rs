use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use sqlx::SqlitePool;

use crate::db::models::*;
use crate::db::NotificationRepository;
use crate::error::AppResult;

/// Appointment lifecycle events that produce a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentEvent {
    Created,
    Confirmed,
    Cancelled,
    NoShow,
    Completed,
    Pending,
    Reminder24h,
    Reminder30m,
}

impl AppointmentEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentEvent::Created => "appointment_created",
            AppointmentEvent::Confirmed => "appointment_confirmed",
            AppointmentEvent::Cancelled => "appointment_cancelled",
            AppointmentEvent::NoShow => "appointment_no_show",
            AppointmentEvent::Completed => "appointment_completed",
            AppointmentEvent::Pending => "appointment_pending",
            AppointmentEvent::Reminder24h => "appointment_reminder_24h",
            AppointmentEvent::Reminder30m => "appointment_reminder_30m",
        }
    }

    pub fn priority(&self) -> NotificationPriority {
        match self {
            AppointmentEvent::Created => NotificationPriority::High,
            AppointmentEvent::Confirmed => NotificationPriority::Normal,
            AppointmentEvent::Cancelled => NotificationPriority::High,
            AppointmentEvent::NoShow => NotificationPriority::Normal,
            AppointmentEvent::Completed => NotificationPriority::Normal,
            AppointmentEvent::Pending => NotificationPriority::Normal,
            AppointmentEvent::Reminder24h => NotificationPriority::High,
            AppointmentEvent::Reminder30m => NotificationPriority::Urgent,
        }
    }

    /// Event for a status transition observed by the store. `Cancelled` is
    /// normally produced by the dedicated cancel path, but a direct status
    /// write to cancelled maps here too.
    pub fn for_status(status: AppointmentStatus) -> AppointmentEvent {
        match status {
            AppointmentStatus::Pending => AppointmentEvent::Pending,
            AppointmentStatus::Confirmed => AppointmentEvent::Confirmed,
            AppointmentStatus::Completed => AppointmentEvent::Completed,
            AppointmentStatus::Cancelled => AppointmentEvent::Cancelled,
            AppointmentStatus::NoShow => AppointmentEvent::NoShow,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            AppointmentEvent::Created => "New booking request",
            AppointmentEvent::Confirmed => "Appointment confirmed",
            AppointmentEvent::Cancelled => "Appointment cancelled",
            AppointmentEvent::NoShow => "Appointment marked as no-show",
            AppointmentEvent::Completed => "Appointment completed",
            AppointmentEvent::Pending => "Appointment awaiting confirmation",
            AppointmentEvent::Reminder24h => "Appointment tomorrow",
            AppointmentEvent::Reminder30m => "Appointment starting soon",
        }
    }

    fn message_template(&self) -> &'static str {
        match self {
            AppointmentEvent::Created => {
                "You received a new booking for {service} on {date} at {time}."
            }
            AppointmentEvent::Confirmed => {
                "Your {service} appointment on {date} at {time} has been confirmed."
            }
            AppointmentEvent::Cancelled => {
                "The {service} appointment on {date} at {time} was cancelled."
            }
            AppointmentEvent::NoShow => {
                "You were marked as a no-show for the {service} appointment on {date} at {time}."
            }
            AppointmentEvent::Completed => {
                "Your {service} appointment on {date} has been completed. Thank you!"
            }
            AppointmentEvent::Pending => {
                "Your booking for {service} on {date} at {time} is awaiting confirmation."
            }
            AppointmentEvent::Reminder24h => {
                "Reminder: your {service} appointment is tomorrow, {date} at {time}."
            }
            AppointmentEvent::Reminder30m => {
                "Your {service} appointment starts at {time}, in about 30 minutes."
            }
        }
    }

    /// Who the notification targets. Booking requests and cancellations go to
    /// the professional; everything else informs the client.
    fn target_user<'a>(&self, appointment: &'a AppointmentDetails) -> &'a str {
        match self {
            AppointmentEvent::Created | AppointmentEvent::Cancelled => {
                &appointment.professional_id
            }
            _ => &appointment.client_id,
        }
    }
}

/// Persistence seam for dispatched notifications. The production sink writes
/// to the notifications table; tests substitute a recording sink.
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn deliver(&self, notification: CreateNotification) -> AppResult<Notification>;
}

pub struct DbNotificationSink {
    pool: SqlitePool,
}

impl DbNotificationSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for DbNotificationSink {
    async fn deliver(&self, notification: CreateNotification) -> AppResult<Notification> {
        NotificationRepository::create(&self.pool, notification).await
    }
}

/// Translates appointment lifecycle events into persisted notification
/// records using a fixed template catalog. Callers treat dispatch as
/// best-effort: failures are logged and never surfaced to the end user.
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub async fn dispatch(
        &self,
        event: AppointmentEvent,
        appointment: &AppointmentDetails,
    ) -> AppResult<Notification> {
        let notification = build_notification(event, appointment);

        tracing::debug!(
            "Dispatching {} notification (priority {}) for appointment {} to user {}",
            event.as_str(),
            notification.priority.as_str(),
            appointment.id,
            notification.user_id
        );

        self.sink.deliver(notification).await
    }

    /// Dispatch and swallow any failure, logging it. Used from mutation
    /// paths where a notification failure must not affect the outcome.
    pub async fn dispatch_best_effort(
        &self,
        event: AppointmentEvent,
        appointment: &AppointmentDetails,
    ) {
        if let Err(e) = self.dispatch(event, appointment).await {
            tracing::warn!(
                "Failed to dispatch {} notification for appointment {}: {:?}",
                event.as_str(),
                appointment.id,
                e
            );
        }
    }
}

/// Render the catalog template for an event into a create-ready record.
pub fn build_notification(
    event: AppointmentEvent,
    appointment: &AppointmentDetails,
) -> CreateNotification {
    let service_name = appointment
        .service_name
        .as_deref()
        .unwrap_or("your service");
    let date = appointment.date.format("%d/%m/%Y").to_string();
    let time = appointment.start_time.format("%H:%M").to_string();

    let message = event
        .message_template()
        .replace("{service}", service_name)
        .replace("{date}", &date)
        .replace("{time}", &time);

    let data = json!({
        "appointment_id": appointment.id,
        "confirmation_code": appointment.confirmation_code,
        "status": appointment.status.as_str(),
        "payment_status": appointment.payment_status.as_str(),
        "date": appointment.date,
        "start_time": appointment.start_time,
        "service": {
            "id": appointment.service_id,
            "name": appointment.service_name,
        },
        "salon": {
            "id": appointment.salon_id,
            "name": appointment.salon_name,
        },
        "professional": {
            "id": appointment.professional_id,
            "name": appointment.professional_name,
        },
        "client": {
            "id": appointment.client_id,
            "name": appointment.client_name,
        },
    });

    CreateNotification {
        user_id: event.target_user(appointment).to_string(),
        notification_type: "appointment".to_string(),
        category: "booking".to_string(),
        event: event.as_str().to_string(),
        priority: event.priority(),
        title: event.title().to_string(),
        message,
        data,
        salon_id: appointment.salon_id.clone(),
    }
}
