// src/routes/appointment_routes.rs

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    booking,
    error::ApiError,
    models::{parse_hhmm, AppState, AppointmentRow, AppointmentStatus, NewAppointment},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(create_appointment))
        .route("/appointments/{appointment_id}", get(get_appointment))
        .route("/appointments/{appointment_id}/status", patch(patch_status))
}

/* ============================================================
   Response DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

/* ============================================================
   POST /appointments (create)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: i64,
    pub patient_id: i64,
    pub date: NaiveDate,
    // HH:MM, as returned in the slot list
    pub time: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    body: Result<Json<CreateAppointmentRequest>, JsonRejection>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let Json(req) = body?;
    let time = parse_hhmm(&req.time).ok_or_else(|| ApiError::validation("time must be HH:MM"))?;

    let new = NewAppointment {
        doctor_id: req.doctor_id,
        patient_id: req.patient_id,
        date: req.date,
        time,
        reason: non_blank(req.reason),
        notes: non_blank(req.notes),
    };

    let row = booking::create_appointment(&*state.store, new, Utc::now().date_naive()).await?;
    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let row = booking::get_appointment(&*state.store, appointment_id).await?;
    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   PATCH /appointments/{id}/status
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct PatchStatusRequest {
    pub status: AppointmentStatus,
}

pub async fn patch_status(
    State(state): State<AppState>,
    Path(appointment_id): Path<i64>,
    body: Result<Json<PatchStatusRequest>, JsonRejection>,
) -> Result<Json<ApiOk<AppointmentRow>>, ApiError> {
    let Json(req) = body?;
    let row = booking::change_status(&*state.store, appointment_id, req.status).await?;
    Ok(Json(ApiOk { data: row }))
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
