// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;

use super::{AppointmentStore, InsertOutcome, ScheduleStore, StoreError};
use crate::models::{AppointmentRow, AppointmentStatus, NewAppointment, WeeklyAvailabilityRule};

const APPOINTMENT_COLUMNS: &str = r#"
    id, doctor_id, patient_id, appointment_date, appointment_time,
    status, reason, notes, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleStore for PgStore {
    async fn weekly_rule(
        &self,
        doctor_id: i64,
        day_of_week: i16,
        date: NaiveDate,
    ) -> Result<Option<WeeklyAvailabilityRule>, StoreError> {
        let rule = sqlx::query_as::<_, WeeklyAvailabilityRule>(
            r#"
            SELECT id, doctor_id, day_of_week, start_time, end_time, slot_duration,
                   break_start, break_end, valid_from, valid_until
            FROM doctor_availability
            WHERE doctor_id = $1
              AND day_of_week = $2
              AND (valid_from IS NULL OR valid_from <= $3)
              AND (valid_until IS NULL OR valid_until >= $3)
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(doctor_id)
        .bind(day_of_week)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rule)
    }

    async fn is_slot_booked(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<bool, StoreError> {
        let booked: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM appointments
                WHERE doctor_id = $1
                  AND appointment_date = $2
                  AND appointment_time = $3
                  AND status NOT IN ('cancelled', 'no_show')
            )
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .bind(time)
        .fetch_one(&self.pool)
        .await?;

        Ok(booked)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn insert_if_free(&self, new: &NewAppointment) -> Result<InsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM appointments
                WHERE doctor_id = $1
                  AND appointment_date = $2
                  AND appointment_time = $3
                  AND status NOT IN ('cancelled', 'no_show')
            )
            "#,
        )
        .bind(new.doctor_id)
        .bind(new.date)
        .bind(new.time)
        .fetch_one(&mut *tx)
        .await?;

        if taken {
            tx.rollback().await?;
            return Ok(InsertOutcome::SlotTaken);
        }

        // The partial unique index catches a booker that slipped in after the re-check.
        let inserted = sqlx::query_as::<_, AppointmentRow>(&format!(
            r#"
            INSERT INTO appointments (
              doctor_id, patient_id, appointment_date, appointment_time, status, reason, notes
            )
            VALUES ($1, $2, $3, $4, 'scheduled', $5, $6)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(new.doctor_id)
        .bind(new.patient_id)
        .bind(new.date)
        .bind(new.time)
        .bind(new.reason.as_deref())
        .bind(new.notes.as_deref())
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                tx.rollback().await?;
                return Ok(InsertOutcome::SlotTaken);
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;
        Ok(InsertOutcome::Created(row))
    }

    async fn appointment(&self, id: i64) -> Result<Option<AppointmentRow>, StoreError> {
        let row = sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update_status(
        &self,
        id: i64,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<Option<AppointmentRow>, StoreError> {
        let row = sqlx::query_as::<_, AppointmentRow>(&format!(
            r#"
            UPDATE appointments
            SET status = $3, updated_at = now()
            WHERE id = $1
              AND status = $2
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
