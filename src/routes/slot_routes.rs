// src/routes/slot_routes.rs

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    availability::{parse_slot_query, resolve_slots, SlotError},
    models::{AppState, TimeSlot},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/slots", get(get_slots))
}

/*
The booking wizard reads `success` rather than the HTTP status, so every
outcome carries the same envelope.
*/

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub slots: Vec<TimeSlot>,
}

impl SlotsResponse {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            slots: vec![],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    #[serde(alias = "doctorId")]
    pub doctor_id: Option<String>,
    pub date: Option<String>,
}

/* ============================================================
   GET /slots?doctor_id=&date=
   ============================================================ */

pub async fn get_slots(
    State(state): State<AppState>,
    query: Result<Query<SlotQuery>, QueryRejection>,
) -> Response {
    // Repeated keys or both `doctor_id` and `doctorId` fail to decode.
    let Ok(Query(q)) = query else {
        return Json(SlotsResponse::failure("Invalid parameters")).into_response();
    };

    let (doctor_id, date) = match parse_slot_query(q.doctor_id.as_deref(), q.date.as_deref()) {
        Ok(parsed) => parsed,
        Err(_) => return Json(SlotsResponse::failure("Invalid parameters")).into_response(),
    };

    match resolve_slots(&*state.store, doctor_id, date).await {
        Ok(slots) => Json(SlotsResponse {
            success: true,
            error: None,
            slots,
        })
        .into_response(),
        Err(SlotError::InvalidArgument(_)) => {
            Json(SlotsResponse::failure("Invalid parameters")).into_response()
        }
        Err(SlotError::StoreUnavailable(e)) => {
            tracing::error!(doctor_id, %date, "slot resolution failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(SlotsResponse::failure("Unable to load time slots, please try again")),
            )
                .into_response()
        }
    }
}
