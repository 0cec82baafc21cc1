use chrono::{NaiveDate, NaiveTime};
use tracing::{info, warn};

use crate::availability::{SlotError, resolve_slots};
use crate::models::{AppointmentRow, AppointmentStatus, NewAppointment, format_hhmm};
use crate::store::{AppointmentStore, InsertOutcome, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("cannot book a date in the past")]
    PastDate,
    #[error("{0} is not a bookable slot for this doctor on this date")]
    NotASlot(String),
    #[error("slot no longer available")]
    SlotUnavailable,
    #[error("appointment not found")]
    NotFound,
    #[error("cannot change status from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SlotError> for BookingError {
    fn from(e: SlotError) -> Self {
        match e {
            SlotError::InvalidArgument(msg) => BookingError::InvalidArgument(msg),
            SlotError::StoreUnavailable(e) => BookingError::Store(e),
        }
    }
}

/// Books `new` after validating it against the resolver, then lets the store
/// re-check occupancy at write time. A slot seen as free earlier may still be
/// rejected with `SlotUnavailable`.
pub async fn create_appointment<S>(
    store: &S,
    new: NewAppointment,
    today: NaiveDate,
) -> Result<AppointmentRow, BookingError>
where
    S: AppointmentStore + ?Sized,
{
    if new.patient_id <= 0 {
        return Err(BookingError::InvalidArgument(
            "patient_id must be a positive integer".into(),
        ));
    }
    if new.date < today {
        return Err(BookingError::PastDate);
    }

    let time = truncate_to_minute(new.time);
    let slots = resolve_slots(store, new.doctor_id, new.date).await?;
    let Some(slot) = slots.iter().find(|s| s.time == time) else {
        return Err(BookingError::NotASlot(format_hhmm(time)));
    };
    if !slot.available {
        return Err(BookingError::SlotUnavailable);
    }

    let new = NewAppointment { time, ..new };
    match store.insert_if_free(&new).await? {
        InsertOutcome::Created(row) => {
            info!(
                appointment_id = row.id,
                doctor_id = row.doctor_id,
                patient_id = row.patient_id,
                date = %row.appointment_date,
                time = %format_hhmm(row.appointment_time),
                "appointment booked"
            );
            Ok(row)
        }
        InsertOutcome::SlotTaken => {
            warn!(
                doctor_id = new.doctor_id,
                date = %new.date,
                time = %format_hhmm(new.time),
                "slot taken between availability check and insert"
            );
            Err(BookingError::SlotUnavailable)
        }
    }
}

pub async fn get_appointment<S>(store: &S, id: i64) -> Result<AppointmentRow, BookingError>
where
    S: AppointmentStore + ?Sized,
{
    store.appointment(id).await?.ok_or(BookingError::NotFound)
}

/// Applies a confirm/cancel/complete/no-show transition. The store update is
/// conditional on the status read here, so a concurrent change surfaces as an
/// invalid transition instead of being overwritten.
pub async fn change_status<S>(
    store: &S,
    id: i64,
    next: AppointmentStatus,
) -> Result<AppointmentRow, BookingError>
where
    S: AppointmentStore + ?Sized,
{
    let current = get_appointment(store, id).await?;
    if !current.status.can_transition_to(next) {
        return Err(BookingError::InvalidTransition {
            from: current.status,
            to: next,
        });
    }

    match store.update_status(id, current.status, next).await? {
        Some(row) => {
            info!(appointment_id = id, from = %current.status, to = %next, "appointment status changed");
            Ok(row)
        }
        None => {
            let latest = get_appointment(store, id).await?;
            Err(BookingError::InvalidTransition {
                from: latest.status,
                to: next,
            })
        }
    }
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    use chrono::Timelike;
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}
