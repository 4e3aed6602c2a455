use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use sqlx::SqlitePool;

use crate::config::ReminderConfig;
use crate::db::AppointmentRepository;
use crate::error::AppResult;
use crate::services::notifications::{AppointmentEvent, NotificationDispatcher};

/// Periodic scan over confirmed appointments dated today or tomorrow,
/// emitting day-before and starting-soon reminders to the client.
///
/// Delivery is at-most-once per kind: a per-kind sent marker on the
/// appointment is checked before emitting and stamped after a successful
/// dispatch. A failed dispatch leaves the marker unset so the next poll can
/// try again while the appointment is still inside the window.
pub struct ReminderScanner {
    pool: SqlitePool,
    dispatcher: Arc<NotificationDispatcher>,
    config: ReminderConfig,
}

impl ReminderScanner {
    pub fn new(
        pool: SqlitePool,
        dispatcher: Arc<NotificationDispatcher>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            pool,
            dispatcher,
            config,
        }
    }

    /// Run one scan relative to `now`. Returns the number of reminders
    /// emitted.
    pub async fn scan(&self, now: NaiveDateTime) -> AppResult<u32> {
        let today = now.date();
        let tomorrow = today + Duration::days(1);

        let upcoming =
            AppointmentRepository::find_confirmed_between(&self.pool, today, tomorrow).await?;

        let mut emitted = 0u32;
        for appointment in upcoming {
            let start = appointment.date.and_time(appointment.start_time);
            let until_start = start - now;
            if until_start < Duration::zero() {
                continue;
            }

            if appointment.reminder_24h_sent_at.is_none()
                && self.in_window(
                    until_start,
                    self.config.day_before_lead_minutes,
                    self.config.day_before_half_window_minutes,
                )
            {
                match self
                    .dispatcher
                    .dispatch(AppointmentEvent::Reminder24h, &appointment)
                    .await
                {
                    Ok(_) => {
                        AppointmentRepository::mark_reminder_24h_sent(
                            &self.pool,
                            &appointment.id,
                            now,
                        )
                        .await?;
                        emitted += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to emit 24h reminder for appointment {}: {:?}",
                            appointment.id,
                            e
                        );
                    }
                }
            }

            if appointment.reminder_30m_sent_at.is_none()
                && self.in_window(
                    until_start,
                    self.config.soon_lead_minutes,
                    self.config.soon_half_window_minutes,
                )
            {
                match self
                    .dispatcher
                    .dispatch(AppointmentEvent::Reminder30m, &appointment)
                    .await
                {
                    Ok(_) => {
                        AppointmentRepository::mark_reminder_30m_sent(
                            &self.pool,
                            &appointment.id,
                            now,
                        )
                        .await?;
                        emitted += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to emit 30m reminder for appointment {}: {:?}",
                            appointment.id,
                            e
                        );
                    }
                }
            }
        }

        Ok(emitted)
    }

    fn in_window(&self, until_start: Duration, lead_minutes: i64, half_window_minutes: i64) -> bool {
        (until_start.num_minutes() - lead_minutes).abs() <= half_window_minutes
    }
}
