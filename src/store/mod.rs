use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use crate::models::{AppointmentRow, AppointmentStatus, NewAppointment, WeeklyAvailabilityRule};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("data store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Outcome of the write-time occupancy gate.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(AppointmentRow),
    SlotTaken,
}

/// Read side consumed by the slot resolver.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// First rule (by ascending id) for the doctor and ISO weekday whose
    /// validity window contains `date`.
    async fn weekly_rule(
        &self,
        doctor_id: i64,
        day_of_week: i16,
        date: NaiveDate,
    ) -> Result<Option<WeeklyAvailabilityRule>, StoreError>;

    /// True iff a non-cancelled, non-no-show appointment sits at exactly this instant.
    async fn is_slot_booked(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Write side used by the booking workflow.
#[async_trait]
pub trait AppointmentStore: ScheduleStore {
    /// Re-checks occupancy and inserts atomically with respect to other bookers.
    async fn insert_if_free(&self, new: &NewAppointment) -> Result<InsertOutcome, StoreError>;

    async fn appointment(&self, id: i64) -> Result<Option<AppointmentRow>, StoreError>;

    /// Sets the status only if the row still has `expected`; returns the updated
    /// row, or `None` when the row is missing or changed underneath.
    async fn update_status(
        &self,
        id: i64,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<Option<AppointmentRow>, StoreError>;
}
