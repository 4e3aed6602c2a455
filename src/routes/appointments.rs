use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::models::{AppointmentDetails, CreateAppointment, UpdateAppointment};
use crate::error::{AppError, AppResult};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route("/by-date", get(list_by_date))
        .route("/code/:code", get(get_by_code))
        .route("/salon/:salon_id", get(list_by_salon))
        .route("/:id", patch(update_appointment))
        .route("/:id/confirm", post(confirm_appointment))
        .route("/:id/complete", post(complete_appointment))
        .route("/:id/cancel", post(cancel_appointment))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: String,
    pub as_client_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SalonQuery {
    pub user_id: String,
    pub date: Option<NaiveDate>,
    pub professional_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ByDateQuery {
    pub date: NaiveDate,
    pub salon_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// `refreshed` is false when the store ignored the call (same salon as the
/// last fetch, or a fetch already in flight) and the items are the held list.
#[derive(Debug, Serialize)]
pub struct SalonAppointmentsResponse {
    pub refreshed: bool,
    pub items: Vec<AppointmentDetails>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<AppointmentDetails>>> {
    let items = state
        .store
        .fetch(&query.user_id, query.as_client_only.unwrap_or(false))
        .await?;
    Ok(Json(items))
}

async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateAppointment>,
) -> AppResult<(StatusCode, Json<AppointmentDetails>)> {
    let created = state.store.create(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_by_date(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ByDateQuery>,
) -> AppResult<Json<Vec<AppointmentDetails>>> {
    let items = state
        .store
        .get_by_date(query.date, query.salon_id.as_deref())
        .await?;
    Ok(Json(items))
}

async fn get_by_code(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> AppResult<Json<AppointmentDetails>> {
    state
        .store
        .get_by_code(&code)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No appointment with code {code}")))
}

async fn list_by_salon(
    State(state): State<Arc<AppState>>,
    Path(salon_id): Path<String>,
    Query(query): Query<SalonQuery>,
) -> AppResult<Json<SalonAppointmentsResponse>> {
    let fetched = state
        .store
        .fetch_by_salon(
            &salon_id,
            &query.user_id,
            query.date,
            query.professional_id.as_deref(),
        )
        .await?;

    let response = match fetched {
        Some(items) => SalonAppointmentsResponse {
            refreshed: true,
            items,
        },
        None => SalonAppointmentsResponse {
            refreshed: false,
            items: state.store.local_list().await,
        },
    };
    Ok(Json(response))
}

async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<UpdateAppointment>,
) -> AppResult<Json<AppointmentDetails>> {
    let updated = state.store.update(&id, update).await?;
    Ok(Json(updated))
}

async fn confirm_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<AppointmentDetails>> {
    let updated = state.store.confirm(&id).await?;
    Ok(Json(updated))
}

async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<AppointmentDetails>> {
    let updated = state.store.complete(&id).await?;
    Ok(Json(updated))
}

async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<CancelRequest>,
) -> AppResult<StatusCode> {
    state.store.cancel(&id, request.reason).await?;
    Ok(StatusCode::NO_CONTENT)
}
