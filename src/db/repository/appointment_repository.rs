use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{classify_db_error, AppResult};

/// Shared joined projection: an appointment plus its salon, client,
/// professional and service summaries.
const DETAILS_SELECT: &str = r#"
SELECT
    a.id, a.salon_id, a.client_id, a.professional_id, a.service_id,
    a.date, a.start_time, a.end_time, a.duration_minutes,
    a.status, a.payment_status, a.price, a.confirmation_code,
    a.notes, a.cancellation_reason, a.cancelled_at,
    a.reminder_24h_sent_at, a.reminder_30m_sent_at,
    a.created_at, a.updated_at,
    s.name AS salon_name, s.address AS salon_address, s.city AS salon_city,
    c.name AS client_name, c.email AS client_email,
    c.phone AS client_phone, c.photo_url AS client_photo_url,
    p.name AS professional_name, p.email AS professional_email,
    p.phone AS professional_phone, p.photo_url AS professional_photo_url,
    sv.name AS service_name, sv.description AS service_description,
    sv.duration_minutes AS service_duration, sv.price AS service_price
FROM appointments a
LEFT JOIN salons s ON s.id = a.salon_id
LEFT JOIN profiles c ON c.id = a.client_id
LEFT JOIN profiles p ON p.id = a.professional_id
LEFT JOIN services sv ON sv.id = a.service_id
"#;

pub struct AppointmentRepository;

impl AppointmentRepository {
    pub async fn insert(
        pool: &SqlitePool,
        data: &CreateAppointment,
        confirmation_code: &str,
    ) -> AppResult<Appointment> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments (
                id, salon_id, client_id, professional_id, service_id,
                date, start_time, end_time, duration_minutes,
                status, payment_status, price, confirmation_code, notes,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&data.salon_id)
        .bind(&data.client_id)
        .bind(&data.professional_id)
        .bind(&data.service_id)
        .bind(data.date)
        .bind(data.start_time)
        .bind(data.end_time)
        .bind(data.duration_minutes)
        .bind(AppointmentStatus::Pending)
        .bind(PaymentStatus::Pending)
        .bind(data.price)
        .bind(confirmation_code)
        .bind(&data.notes)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(classify_db_error)
    }

    pub async fn find_details(
        pool: &SqlitePool,
        id: &str,
    ) -> AppResult<Option<AppointmentDetails>> {
        let sql = format!("{DETAILS_SELECT} WHERE a.id = ?");
        sqlx::query_as::<_, AppointmentDetails>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(classify_db_error)
    }

    /// Appointments where the user is the client or the professional
    /// (client only when `as_client_only`), cancelled rows excluded,
    /// ordered by date then start time ascending.
    pub async fn find_for_user(
        pool: &SqlitePool,
        user_id: &str,
        as_client_only: bool,
    ) -> AppResult<Vec<AppointmentDetails>> {
        let sql = format!(
            r#"{DETAILS_SELECT}
            WHERE (a.client_id = ? OR (? = 0 AND a.professional_id = ?))
            AND a.status != 'cancelled'
            ORDER BY a.date ASC, a.start_time ASC
            "#
        );
        sqlx::query_as::<_, AppointmentDetails>(&sql)
            .bind(user_id)
            .bind(as_client_only)
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(classify_db_error)
    }

    /// Appointments for one salon plus the caller's independent-professional
    /// appointments (no salon), with optional date / professional filters.
    pub async fn find_by_salon(
        pool: &SqlitePool,
        salon_id: &str,
        caller_id: &str,
        date: Option<NaiveDate>,
        professional_id: Option<&str>,
    ) -> AppResult<Vec<AppointmentDetails>> {
        let sql = format!(
            r#"{DETAILS_SELECT}
            WHERE (a.salon_id = ? OR (a.salon_id IS NULL AND a.professional_id = ?))
            AND (? IS NULL OR a.date = ?)
            AND (? IS NULL OR a.professional_id = ?)
            AND a.status != 'cancelled'
            ORDER BY a.date ASC, a.start_time ASC
            "#
        );
        sqlx::query_as::<_, AppointmentDetails>(&sql)
            .bind(salon_id)
            .bind(caller_id)
            .bind(date)
            .bind(date)
            .bind(professional_id)
            .bind(professional_id)
            .fetch_all(pool)
            .await
            .map_err(classify_db_error)
    }

    /// Exact lookup by confirmation code. Callers are expected to upper-case
    /// the input; codes are stored upper-cased.
    pub async fn find_by_code(
        pool: &SqlitePool,
        code: &str,
    ) -> AppResult<Option<AppointmentDetails>> {
        let sql = format!(
            "{DETAILS_SELECT} WHERE a.confirmation_code = ? AND a.status != 'cancelled'"
        );
        sqlx::query_as::<_, AppointmentDetails>(&sql)
            .bind(code)
            .fetch_optional(pool)
            .await
            .map_err(classify_db_error)
    }

    pub async fn find_by_date(
        pool: &SqlitePool,
        date: NaiveDate,
        salon_id: Option<&str>,
    ) -> AppResult<Vec<AppointmentDetails>> {
        let sql = format!(
            r#"{DETAILS_SELECT}
            WHERE a.date = ?
            AND (? IS NULL OR a.salon_id = ?)
            AND a.status != 'cancelled'
            ORDER BY a.start_time ASC
            "#
        );
        sqlx::query_as::<_, AppointmentDetails>(&sql)
            .bind(date)
            .bind(salon_id)
            .bind(salon_id)
            .fetch_all(pool)
            .await
            .map_err(classify_db_error)
    }

    /// Apply a partial update; `None` fields keep their current value.
    pub async fn update_fields(
        pool: &SqlitePool,
        id: &str,
        update: &UpdateAppointment,
    ) -> AppResult<Appointment> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET status = COALESCE(?, status),
                payment_status = COALESCE(?, payment_status),
                notes = COALESCE(?, notes),
                cancellation_reason = COALESCE(?, cancellation_reason),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(update.status)
        .bind(update.payment_status)
        .bind(&update.notes)
        .bind(&update.cancellation_reason)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(classify_db_error)
    }

    /// Move an appointment into the terminal cancelled state, keeping the row
    /// (and the reason) for history.
    pub async fn mark_cancelled(
        pool: &SqlitePool,
        id: &str,
        reason: Option<&str>,
    ) -> AppResult<Appointment> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET status = 'cancelled',
                cancellation_reason = ?,
                cancelled_at = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(reason)
        .bind(now)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(classify_db_error)
    }

    /// Confirmed appointments dated within the inclusive day range, for the
    /// reminder scan.
    pub async fn find_confirmed_between(
        pool: &SqlitePool,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<AppointmentDetails>> {
        let sql = format!(
            r#"{DETAILS_SELECT}
            WHERE a.status = 'confirmed'
            AND a.date >= ? AND a.date <= ?
            ORDER BY a.date ASC, a.start_time ASC
            "#
        );
        sqlx::query_as::<_, AppointmentDetails>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
            .map_err(classify_db_error)
    }

    pub async fn mark_reminder_24h_sent(
        pool: &SqlitePool,
        id: &str,
        at: NaiveDateTime,
    ) -> AppResult<()> {
        sqlx::query("UPDATE appointments SET reminder_24h_sent_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(pool)
            .await
            .map_err(classify_db_error)?;
        Ok(())
    }

    pub async fn mark_reminder_30m_sent(
        pool: &SqlitePool,
        id: &str,
        at: NaiveDateTime,
    ) -> AppResult<()> {
        sqlx::query("UPDATE appointments SET reminder_30m_sent_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(pool)
            .await
            .map_err(classify_db_error)?;
        Ok(())
    }
}
