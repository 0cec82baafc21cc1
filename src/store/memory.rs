// In-memory store used by the unit and router tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};

use super::{AppointmentStore, InsertOutcome, ScheduleStore, StoreError};
use crate::models::{AppointmentRow, AppointmentStatus, NewAppointment, WeeklyAvailabilityRule};

#[derive(Default)]
struct Inner {
    rules: Vec<WeeklyAvailabilityRule>,
    appointments: Vec<AppointmentRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&self, rule: WeeklyAvailabilityRule) {
        self.lock().rules.push(rule);
    }

    /// Seeds an appointment directly, bypassing the occupancy gate.
    pub fn add_appointment(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        status: AppointmentStatus,
    ) -> i64 {
        let mut inner = self.lock();
        let id = inner.appointments.len() as i64 + 1;
        let now = Utc::now();
        inner.appointments.push(AppointmentRow {
            id,
            doctor_id,
            patient_id: 1,
            appointment_date: date,
            appointment_time: time,
            status,
            reason: None,
            notes: None,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn occupied(inner: &Inner, doctor_id: i64, date: NaiveDate, time: NaiveTime) -> bool {
    inner.appointments.iter().any(|a| {
        a.doctor_id == doctor_id
            && a.appointment_date == date
            && a.appointment_time == time
            && a.status.occupies_slot()
    })
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn weekly_rule(
        &self,
        doctor_id: i64,
        day_of_week: i16,
        date: NaiveDate,
    ) -> Result<Option<WeeklyAvailabilityRule>, StoreError> {
        self.check_online()?;
        let inner = self.lock();
        let mut matching: Vec<&WeeklyAvailabilityRule> = inner
            .rules
            .iter()
            .filter(|r| r.doctor_id == doctor_id && r.day_of_week == day_of_week && r.is_valid_on(date))
            .collect();
        matching.sort_by_key(|r| r.id);
        Ok(matching.first().map(|r| (*r).clone()))
    }

    async fn is_slot_booked(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, StoreError> {
        self.check_online()?;
        Ok(occupied(&self.lock(), doctor_id, date, time))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online()
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn insert_if_free(&self, new: &NewAppointment) -> Result<InsertOutcome, StoreError> {
        self.check_online()?;
        let mut inner = self.lock();
        if occupied(&inner, new.doctor_id, new.date, new.time) {
            return Ok(InsertOutcome::SlotTaken);
        }
        let now = Utc::now();
        let row = AppointmentRow {
            id: inner.appointments.len() as i64 + 1,
            doctor_id: new.doctor_id,
            patient_id: new.patient_id,
            appointment_date: new.date,
            appointment_time: new.time,
            status: AppointmentStatus::Scheduled,
            reason: new.reason.clone(),
            notes: new.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.appointments.push(row.clone());
        Ok(InsertOutcome::Created(row))
    }

    async fn appointment(&self, id: i64) -> Result<Option<AppointmentRow>, StoreError> {
        self.check_online()?;
        Ok(self.lock().appointments.iter().find(|a| a.id == id).cloned())
    }

    async fn update_status(
        &self,
        id: i64,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<Option<AppointmentRow>, StoreError> {
        self.check_online()?;
        let mut inner = self.lock();
        let Some(row) = inner
            .appointments
            .iter_mut()
            .find(|a| a.id == id && a.status == expected)
        else {
            return Ok(None);
        };
        row.status = next;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }
}
