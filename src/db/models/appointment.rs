use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle states of an appointment. Transitions are one-directional in
/// practice: pending -> confirmed -> completed, with cancelled/no_show as
/// terminal branches reachable any time before completion. Cancelled rows are
/// retained (with reason and timestamp) but excluded from all lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// A row of the `appointments` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    /// NULL for bookings with an independent professional.
    pub salon_id: Option<String>,
    pub client_id: String,
    pub professional_id: String,
    pub service_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub price: f64,
    /// 6 uppercase alphanumeric characters, unique across appointments.
    pub confirmation_code: String,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub reminder_24h_sent_at: Option<NaiveDateTime>,
    pub reminder_30m_sent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// An appointment joined with its salon, client, professional and service
/// records. Joined columns are nullable because the referenced rows may have
/// been removed out-of-band.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub id: String,
    pub salon_id: Option<String>,
    pub client_id: String,
    pub professional_id: String,
    pub service_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub price: f64,
    pub confirmation_code: String,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub reminder_24h_sent_at: Option<NaiveDateTime>,
    pub reminder_30m_sent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,

    pub salon_name: Option<String>,
    pub salon_address: Option<String>,
    pub salon_city: Option<String>,

    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub client_photo_url: Option<String>,

    pub professional_name: Option<String>,
    pub professional_email: Option<String>,
    pub professional_phone: Option<String>,
    pub professional_photo_url: Option<String>,

    pub service_name: Option<String>,
    pub service_description: Option<String>,
    pub service_duration: Option<i64>,
    pub service_price: Option<f64>,
}

/// Data required to create a new appointment. Status and payment status are
/// always pending on creation; the confirmation code is generated by the
/// store, not the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointment {
    pub salon_id: Option<String>,
    pub client_id: String,
    pub professional_id: String,
    pub service_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: i64,
    pub price: f64,
    pub notes: Option<String>,
}

/// Partial appointment update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointment {
    pub status: Option<AppointmentStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
}
