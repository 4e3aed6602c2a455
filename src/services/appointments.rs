use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use rand::Rng;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::config::BookingConfig;
use crate::db::models::*;
use crate::db::AppointmentRepository;
use crate::error::{is_unique_violation_on, AppError, AppResult};
use crate::services::availability::{apply_visibility_filter, CapabilityIndex};
use crate::services::notifications::{AppointmentEvent, NotificationDispatcher};
use crate::services::retry;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a 6-character uppercase alphanumeric confirmation code. Global
/// uniqueness is enforced by the table's unique index, with regeneration on
/// collision.
pub fn generate_confirmation_code() -> String {
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// The appointment store: CRUD over appointment records plus an in-memory
/// list kept in sync with the database. Mutations dispatch lifecycle
/// notifications fire-and-forget; a failed dispatch never fails the mutation.
pub struct AppointmentStore {
    pool: SqlitePool,
    booking: BookingConfig,
    dispatcher: Arc<NotificationDispatcher>,
    list: RwLock<Vec<AppointmentDetails>>,
    last_salon: Mutex<Option<String>>,
    fetch_in_flight: AtomicBool,
}

impl AppointmentStore {
    pub fn new(
        pool: SqlitePool,
        booking: BookingConfig,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            pool,
            booking,
            dispatcher,
            list: RwLock::new(Vec::new()),
            last_salon: Mutex::new(None),
            fetch_in_flight: AtomicBool::new(false),
        }
    }

    /// Snapshot of the in-memory appointment list.
    pub async fn local_list(&self) -> Vec<AppointmentDetails> {
        self.list.read().await.clone()
    }

    /// The dispatcher this store notifies through, shared with the reminder
    /// worker.
    pub fn dispatcher(&self) -> Arc<NotificationDispatcher> {
        self.dispatcher.clone()
    }

    /// Appointments where the user is client or professional (client only
    /// when `as_client_only`), visibility-filtered, replacing the local list.
    pub async fn fetch(
        &self,
        user_id: &str,
        as_client_only: bool,
    ) -> AppResult<Vec<AppointmentDetails>> {
        let rows = AppointmentRepository::find_for_user(&self.pool, user_id, as_client_only).await?;
        let index = CapabilityIndex::load(&self.pool, &rows).await;
        let filtered = apply_visibility_filter(rows, &index);

        *self.list.write().await = filtered.clone();
        Ok(filtered)
    }

    /// Salon-scoped fetch (plus the caller's independent-professional
    /// appointments). Returns `None` when the call is ignored: either the
    /// same salon was already the last one fetched, or another fetch is
    /// currently in flight.
    pub async fn fetch_by_salon(
        &self,
        salon_id: &str,
        caller_id: &str,
        date: Option<NaiveDate>,
        professional_id: Option<&str>,
    ) -> AppResult<Option<Vec<AppointmentDetails>>> {
        {
            let last = self.last_salon.lock().unwrap();
            if last.as_deref() == Some(salon_id) {
                tracing::debug!("Ignoring redundant fetch for salon {}", salon_id);
                return Ok(None);
            }
        }

        if self.fetch_in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("Ignoring concurrent salon fetch while one is in flight");
            return Ok(None);
        }

        let result = async {
            let rows = AppointmentRepository::find_by_salon(
                &self.pool,
                salon_id,
                caller_id,
                date,
                professional_id,
            )
            .await?;
            let index = CapabilityIndex::load(&self.pool, &rows).await;
            let filtered = apply_visibility_filter(rows, &index);

            *self.list.write().await = filtered.clone();
            *self.last_salon.lock().unwrap() = Some(salon_id.to_string());
            Ok(Some(filtered))
        }
        .await;

        self.fetch_in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Create a pending appointment with a fresh confirmation code, prepend
    /// it to the local list and notify the professional. The insert is
    /// retried with exponential backoff on transient rate-limit errors only.
    pub async fn create(&self, input: CreateAppointment) -> AppResult<AppointmentDetails> {
        if input.duration_minutes <= 0 {
            return Err(AppError::BadRequest(
                "Appointment duration must be positive".to_string(),
            ));
        }
        if input.end_time <= input.start_time {
            return Err(AppError::BadRequest(
                "Appointment end time must be after its start time".to_string(),
            ));
        }

        let backoff = Duration::from_secs(self.booking.create_initial_backoff_seconds);
        let regenerations = self.booking.code_regeneration_attempts;
        let pool = self.pool.clone();

        let created = retry::retry_on_rate_limit(self.booking.create_max_attempts, backoff, || {
            let pool = pool.clone();
            let input = input.clone();
            async move { insert_with_fresh_code(&pool, &input, regenerations).await }
        })
        .await?;

        let details = self.details_or_not_found(&created.id).await?;
        self.list.write().await.insert(0, details.clone());
        self.spawn_dispatch(AppointmentEvent::Created, details.clone());

        Ok(details)
    }

    /// Apply a partial update and replace the record in the local list. When
    /// the status actually changed relative to the previously held copy, the
    /// matching notification is dispatched; a no-op status write dispatches
    /// nothing.
    pub async fn update(
        &self,
        id: &str,
        update: UpdateAppointment,
    ) -> AppResult<AppointmentDetails> {
        let previous_status = match self.held_status(id).await {
            Some(status) => status,
            None => self.details_or_not_found(id).await?.status,
        };

        let updated = AppointmentRepository::update_fields(&self.pool, id, &update).await?;
        let details = self.details_or_not_found(&updated.id).await?;

        {
            let mut list = self.list.write().await;
            if let Some(slot) = list.iter_mut().find(|a| a.id == id) {
                *slot = details.clone();
            }
        }

        if let Some(new_status) = update.status {
            if previous_status != new_status {
                tracing::info!("Appointment {} status -> {}", id, new_status.as_str());
                self.spawn_dispatch(AppointmentEvent::for_status(new_status), details.clone());
            }
        }

        Ok(details)
    }

    pub async fn confirm(&self, id: &str) -> AppResult<AppointmentDetails> {
        self.update(
            id,
            UpdateAppointment {
                status: Some(AppointmentStatus::Confirmed),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn complete(&self, id: &str) -> AppResult<AppointmentDetails> {
        self.update(
            id,
            UpdateAppointment {
                status: Some(AppointmentStatus::Completed),
                ..Default::default()
            },
        )
        .await
    }

    /// Cancel an appointment: the row moves to the terminal cancelled state
    /// (reason retained), the professional is notified best-effort, and the
    /// id is removed from the local list.
    pub async fn cancel(&self, id: &str, reason: Option<String>) -> AppResult<()> {
        // Fetch the joined record first for notification context.
        let details = self.details_or_not_found(id).await?;

        AppointmentRepository::mark_cancelled(&self.pool, id, reason.as_deref()).await?;

        let mut snapshot = details;
        snapshot.status = AppointmentStatus::Cancelled;
        snapshot.cancellation_reason = reason;
        self.spawn_dispatch(AppointmentEvent::Cancelled, snapshot);

        self.list.write().await.retain(|a| a.id != id);
        Ok(())
    }

    /// Case-insensitive lookup by confirmation code.
    pub async fn get_by_code(&self, code: &str) -> AppResult<Option<AppointmentDetails>> {
        AppointmentRepository::find_by_code(&self.pool, &code.to_uppercase()).await
    }

    pub async fn get_by_date(
        &self,
        date: NaiveDate,
        salon_id: Option<&str>,
    ) -> AppResult<Vec<AppointmentDetails>> {
        AppointmentRepository::find_by_date(&self.pool, date, salon_id).await
    }

    async fn held_status(&self, id: &str) -> Option<AppointmentStatus> {
        self.list
            .read()
            .await
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.status)
    }

    async fn details_or_not_found(&self, id: &str) -> AppResult<AppointmentDetails> {
        AppointmentRepository::find_details(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Appointment {id} not found")))
    }

    fn spawn_dispatch(&self, event: AppointmentEvent, details: AppointmentDetails) {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.dispatch_best_effort(event, &details).await;
        });
    }
}

/// Insert with a freshly generated confirmation code, regenerating on a
/// unique-index collision up to `attempts` times.
async fn insert_with_fresh_code(
    pool: &SqlitePool,
    input: &CreateAppointment,
    attempts: u32,
) -> AppResult<Appointment> {
    let mut last_err = None;

    for _ in 0..attempts.max(1) {
        let code = generate_confirmation_code();
        match AppointmentRepository::insert(pool, input, &code).await {
            Ok(appointment) => return Ok(appointment),
            Err(e) if is_unique_violation_on(&e, "confirmation_code") => {
                tracing::warn!("Confirmation code collision, regenerating");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        AppError::Conflict("Could not allocate a unique confirmation code".to_string())
    }))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::db::testing;
    use crate::services::notifications::test_support::RecordingSink;

    async fn store_with_sink(pool: &SqlitePool) -> (AppointmentStore, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Arc::new(NotificationDispatcher::new(sink.clone()));
        let store = AppointmentStore::new(pool.clone(), testing::booking_config(), dispatcher);
        (store, sink)
    }

    /// Let spawned fire-and-forget dispatch tasks run to completion.
    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    fn booking(service: &str) -> CreateAppointment {
        CreateAppointment {
            salon_id: Some("salon-1".to_string()),
            client_id: "client-1".to_string(),
            professional_id: "pro-1".to_string(),
            service_id: service.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            duration_minutes: 30,
            price: 50.0,
            notes: None,
        }
    }

    #[test]
    fn confirmation_codes_are_six_uppercase_alphanumerics() {
        for _ in 0..100 {
            let code = generate_confirmation_code();
            assert_eq!(code.len(), 6);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn create_starts_pending_with_a_code_and_prepends() {
        let pool = testing::pool().await;
        testing::seed_booking_graph(&pool).await;
        let (store, _sink) = store_with_sink(&pool).await;

        let first = store.create(booking("svc-1")).await.unwrap();
        assert_eq!(first.status, AppointmentStatus::Pending);
        assert_eq!(first.payment_status, PaymentStatus::Pending);
        assert_eq!(first.confirmation_code.len(), 6);
        assert_eq!(first.service_name.as_deref(), Some("Haircut"));

        let mut second_input = booking("svc-1");
        second_input.start_time = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        second_input.end_time = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
        let second = store.create(second_input).await.unwrap();

        let list = store.local_list().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second.id, "newest appointment is prepended");
        assert_eq!(list[1].id, first.id);
    }

    #[tokio::test]
    async fn create_notifies_the_professional() {
        let pool = testing::pool().await;
        testing::seed_booking_graph(&pool).await;
        let (store, sink) = store_with_sink(&pool).await;

        store.create(booking("svc-1")).await.unwrap();
        settle().await;

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].event, "appointment_created");
        assert_eq!(delivered[0].user_id, "pro-1");
    }

    #[tokio::test]
    async fn create_with_invalid_reference_is_a_validation_error() {
        let pool = testing::pool().await;
        testing::seed_booking_graph(&pool).await;
        let (store, sink) = store_with_sink(&pool).await;

        let result = store.create(booking("no-such-service")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        settle().await;
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn code_lookup_is_case_insensitive() {
        let pool = testing::pool().await;
        testing::seed_booking_graph(&pool).await;
        let (store, _sink) = store_with_sink(&pool).await;

        let created = store.create(booking("svc-1")).await.unwrap();
        let code = created.confirmation_code.to_lowercase();

        let found = store.get_by_code(&code).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn duplicate_code_insert_is_a_detectable_conflict() {
        let pool = testing::pool().await;
        testing::seed_booking_graph(&pool).await;

        AppointmentRepository::insert(&pool, &booking("svc-1"), "AAAAA1")
            .await
            .unwrap();
        let err = AppointmentRepository::insert(&pool, &booking("svc-1"), "AAAAA1")
            .await
            .unwrap_err();
        assert!(is_unique_violation_on(&err, "confirmation_code"));
    }

    #[tokio::test]
    async fn status_change_dispatches_exactly_once() {
        let pool = testing::pool().await;
        testing::seed_booking_graph(&pool).await;
        let (store, sink) = store_with_sink(&pool).await;

        let created = store.create(booking("svc-1")).await.unwrap();
        settle().await;
        sink.delivered.lock().unwrap().clear();

        store.confirm(&created.id).await.unwrap();
        settle().await;
        assert_eq!(sink.delivered_events(), vec!["appointment_confirmed"]);

        // Writing the same status again is a no-op for notifications.
        store.confirm(&created.id).await.unwrap();
        settle().await;
        assert_eq!(sink.delivered_events(), vec!["appointment_confirmed"]);
    }

    #[tokio::test]
    async fn updating_an_unknown_id_is_not_found() {
        let pool = testing::pool().await;
        testing::seed_booking_graph(&pool).await;
        let (store, sink) = store_with_sink(&pool).await;

        let result = store.confirm("no-such-appointment").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        settle().await;
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_removes_the_appointment_but_keeps_history() {
        let pool = testing::pool().await;
        testing::seed_booking_graph(&pool).await;
        let (store, sink) = store_with_sink(&pool).await;

        let created = store.create(booking("svc-1")).await.unwrap();
        settle().await;
        sink.delivered.lock().unwrap().clear();

        store
            .cancel(&created.id, Some("client asked".to_string()))
            .await
            .unwrap();
        settle().await;

        // Gone from the local list and all lookups.
        assert!(store.local_list().await.is_empty());
        assert!(store
            .get_by_code(&created.confirmation_code)
            .await
            .unwrap()
            .is_none());
        assert!(store.fetch("client-1", true).await.unwrap().is_empty());

        // The professional was notified.
        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].event, "appointment_cancelled");
        assert_eq!(delivered[0].user_id, "pro-1");
        drop(delivered);

        // The row itself is retained with the reason.
        let (status, reason): (String, Option<String>) = sqlx::query_as(
            "SELECT status, cancellation_reason FROM appointments WHERE id = ?",
        )
        .bind(&created.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(status, "cancelled");
        assert_eq!(reason.as_deref(), Some("client asked"));
    }

    #[tokio::test]
    async fn fetch_applies_the_visibility_filter() {
        let pool = testing::pool().await;
        testing::seed_booking_graph(&pool).await;
        // A professional with a disabled agenda who does not own the salon.
        testing::seed_profile(&pool, "pro-hidden", "Hidden Pro", false).await;
        let (store, _sink) = store_with_sink(&pool).await;

        let mut hidden = booking("svc-1");
        hidden.professional_id = "pro-hidden".to_string();
        let hidden = store.create(hidden).await.unwrap();

        let mut independent = booking("svc-1");
        independent.professional_id = "pro-hidden".to_string();
        independent.salon_id = None;
        independent.start_time = NaiveTime::from_hms_opt(11, 0, 0).unwrap();
        independent.end_time = NaiveTime::from_hms_opt(11, 30, 0).unwrap();
        let independent = store.create(independent).await.unwrap();

        let visible = store.fetch("client-1", true).await.unwrap();
        let ids: Vec<&str> = visible.iter().map(|a| a.id.as_str()).collect();
        assert!(!ids.contains(&hidden.id.as_str()), "salon booking hidden");
        assert!(
            ids.contains(&independent.id.as_str()),
            "independent booking visible"
        );
        assert_eq!(store.local_list().await.len(), visible.len());
    }

    #[tokio::test]
    async fn salon_fetch_ignores_redundant_calls() {
        let pool = testing::pool().await;
        testing::seed_booking_graph(&pool).await;
        let (store, _sink) = store_with_sink(&pool).await;
        store.create(booking("svc-1")).await.unwrap();

        let first = store
            .fetch_by_salon("salon-1", "owner-1", None, None)
            .await
            .unwrap();
        assert_eq!(first.unwrap().len(), 1);

        // Same salon again: ignored.
        let second = store
            .fetch_by_salon("salon-1", "owner-1", None, None)
            .await
            .unwrap();
        assert!(second.is_none());

        // A different salon is fetched normally.
        testing::seed_salon(&pool, "salon-2", "Second Salon", "owner-1").await;
        let third = store
            .fetch_by_salon("salon-2", "owner-1", None, None)
            .await
            .unwrap();
        assert!(third.is_some());
    }

    #[tokio::test]
    async fn get_by_date_scopes_to_day_and_salon() {
        let pool = testing::pool().await;
        testing::seed_booking_graph(&pool).await;
        let (store, _sink) = store_with_sink(&pool).await;

        store.create(booking("svc-1")).await.unwrap();
        let mut other_day = booking("svc-1");
        other_day.date = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();
        store.create(other_day).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let on_day = store.get_by_date(date, None).await.unwrap();
        assert_eq!(on_day.len(), 1);

        let scoped = store.get_by_date(date, Some("salon-1")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        let empty = store.get_by_date(date, Some("other-salon")).await.unwrap();
        assert!(empty.is_empty());
    }
}
