use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use tracing::{debug, warn};

use crate::models::{TimeSlot, WeeklyAvailabilityRule, format_12h};
use crate::store::{ScheduleStore, StoreError};

pub const DEFAULT_SLOT_MINUTES: u32 = 30;
const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

/// Effective working window of a doctor on one date, in minutes from midnight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingWindow {
    start: u32,
    end: u32,
    slot_minutes: u32,
    break_window: Option<(u32, u32)>,
}

impl WorkingWindow {
    /// 09:00-17:00, 30 minute slots, no break. Used when no rule is in effect.
    pub fn fallback() -> Self {
        Self {
            start: 9 * 60,
            end: 17 * 60,
            slot_minutes: DEFAULT_SLOT_MINUTES,
            break_window: None,
        }
    }

    pub fn from_rule(rule: &WeeklyAvailabilityRule) -> Self {
        let slot_minutes = match rule.slot_duration {
            Some(d) if d > 0 => d as u32,
            _ => DEFAULT_SLOT_MINUTES,
        };

        if rule.start_time >= rule.end_time {
            warn!(
                rule_id = rule.id,
                doctor_id = rule.doctor_id,
                day_of_week = rule.day_of_week,
                "availability rule has start >= end, no slots generated"
            );
        }

        let break_window = match (rule.break_start, rule.break_end) {
            (Some(bs), Some(be)) if bs < be => Some((minute_of_day(bs), minute_of_day(be))),
            (Some(_), Some(_)) => {
                warn!(
                    rule_id = rule.id,
                    doctor_id = rule.doctor_id,
                    "availability rule has break_start >= break_end, ignoring break"
                );
                None
            }
            _ => None,
        };

        Self {
            start: minute_of_day(rule.start_time),
            end: minute_of_day(rule.end_time),
            slot_minutes,
            break_window,
        }
    }

    /// Slot starts in ascending order. A slot belongs to the window when its
    /// start is before `end`; the slot itself may run past `end`.
    pub fn slot_starts(&self) -> Vec<NaiveTime> {
        let mut starts = Vec::new();
        let mut minute = self.start;
        while minute < self.end && minute < MINUTES_PER_DAY {
            if !self.in_break(minute) {
                if let Some(t) = NaiveTime::from_hms_opt(minute / 60, minute % 60, 0) {
                    starts.push(t);
                }
            }
            minute += self.slot_minutes;
        }
        starts
    }

    /// Half-open: a slot at break start is dropped, one at break end is kept.
    fn in_break(&self, minute: u32) -> bool {
        self.break_window
            .is_some_and(|(bs, be)| bs <= minute && minute < be)
    }
}

/// Rounded up: `start <= m:00 < end` iff `ceil(start) <= m < ceil(end)`.
fn minute_of_day(t: NaiveTime) -> u32 {
    let minute = t.hour() * 60 + t.minute();
    if t.second() > 0 || t.nanosecond() > 0 {
        minute + 1
    } else {
        minute
    }
}

/// ISO weekday: Monday = 1 ... Sunday = 7.
pub fn iso_day_of_week(date: NaiveDate) -> i16 {
    date.weekday().number_from_monday() as i16
}

/// Decodes the raw `doctor_id` / `date` query values at the HTTP edge.
pub fn parse_slot_query(
    doctor_id: Option<&str>,
    date: Option<&str>,
) -> Result<(i64, NaiveDate), SlotError> {
    let doctor_id = doctor_id
        .map(str::trim)
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| SlotError::InvalidArgument("doctor_id must be a positive integer".into()))?;

    let date = date
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .ok_or_else(|| SlotError::InvalidArgument("date must be YYYY-MM-DD".into()))?;

    Ok((doctor_id, date))
}

/// Computes the bookable slots of a doctor on a date and marks each one
/// booked or free against current appointments. Read-only; the result is
/// advisory and must be re-checked at booking time.
pub async fn resolve_slots<S>(
    store: &S,
    doctor_id: i64,
    date: NaiveDate,
) -> Result<Vec<TimeSlot>, SlotError>
where
    S: ScheduleStore + ?Sized,
{
    if doctor_id <= 0 {
        return Err(SlotError::InvalidArgument(
            "doctor_id must be a positive integer".into(),
        ));
    }

    let day_of_week = iso_day_of_week(date);
    let window = match store.weekly_rule(doctor_id, day_of_week, date).await? {
        Some(rule) => {
            debug!(doctor_id, %date, rule_id = rule.id, "using weekly availability rule");
            WorkingWindow::from_rule(&rule)
        }
        None => {
            debug!(doctor_id, %date, day_of_week, "no availability rule, using fallback window");
            WorkingWindow::fallback()
        }
    };

    let mut slots = Vec::new();
    for time in window.slot_starts() {
        let booked = store.is_slot_booked(doctor_id, date, time).await?;
        slots.push(TimeSlot {
            time,
            formatted: format_12h(time),
            available: !booked,
        });
    }

    Ok(slots)
}
