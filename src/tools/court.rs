//! Pickleball court schedule and the two tools over it
//!
//! The court opens at 08:00 and takes bookings in whole hours; the last slot
//! starts at 20:00. Bookings live in memory for the life of the process.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Timelike};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::{Tool, ToolContext};

const FIRST_SLOT_HOUR: u32 = 8;
const LAST_SLOT_HOUR: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Booking {
    id: String,
    reservation_name: String,
}

/// Hourly slots per day; a missing slot is available
#[derive(Debug, Default)]
pub struct CourtSchedule {
    days: Mutex<BTreeMap<NaiveDate, BTreeMap<u32, Booking>>>,
}

impl CourtSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// `"HH:MM" -> "available" | "unavailable"` for every slot of `date`
    pub fn availability(&self, date: NaiveDate) -> BTreeMap<String, &'static str> {
        let days = self.days.lock();
        let booked = days.get(&date);
        (FIRST_SLOT_HOUR..=LAST_SLOT_HOUR)
            .map(|hour| {
                let state = match booked.and_then(|slots| slots.get(&hour)) {
                    Some(_) => "unavailable",
                    None => "available",
                };
                (format!("{:02}:00", hour), state)
            })
            .collect()
    }

    /// Reserve `[start, end)`; returns the booking id
    pub fn book(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        reservation_name: &str,
    ) -> std::result::Result<String, String> {
        if start.minute() != 0 || end.minute() != 0 {
            return Err("Bookings must start and end on the hour.".to_string());
        }
        if start >= end {
            return Err("Start time must be before end time.".to_string());
        }
        let (first, last) = (start.hour(), end.hour() - 1);
        if first < FIRST_SLOT_HOUR || last > LAST_SLOT_HOUR {
            return Err(format!(
                "The court is open from {:02}:00 to {:02}:00.",
                FIRST_SLOT_HOUR,
                LAST_SLOT_HOUR + 1
            ));
        }

        let mut days = self.days.lock();
        let slots = days.entry(date).or_default();
        if let Some((hour, taken)) = (first..=last).find_map(|hour| slots.get(&hour).map(|b| (hour, b))) {
            return Err(format!(
                "The court is already booked at {:02}:00 on {} for {}.",
                hour, date, taken.reservation_name
            ));
        }

        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            reservation_name: reservation_name.to_string(),
        };
        for hour in first..=last {
            slots.insert(hour, booking.clone());
        }
        Ok(booking.id)
    }
}

fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}'. Use YYYY-MM-DD.", raw))
}

fn parse_time(raw: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| format!("Invalid time '{}'. Use HH:MM.", raw))
}

fn error_result(message: impl Into<String>) -> Value {
    json!({"status": "error", "message": message.into()})
}

// ─────────────────────────────────────────────────────────────────
// list_court_availabilities
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListArgs {
    date: String,
}

pub struct ListCourtAvailabilitiesTool {
    schedule: Arc<CourtSchedule>,
}

impl ListCourtAvailabilitiesTool {
    pub fn new(schedule: Arc<CourtSchedule>) -> Self {
        Self { schedule }
    }
}

#[async_trait]
impl Tool for ListCourtAvailabilitiesTool {
    fn name(&self) -> &str {
        "list_court_availabilities"
    }

    fn description(&self) -> &str {
        "Lists the available and unavailable time slots of the pickleball court for a date."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "description": "Date to check, YYYY-MM-DD"}
            },
            "required": ["date"]
        })
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
        let args: ListArgs =
            serde_json::from_value(args).map_err(|e| Error::tool(self.name(), e.to_string()))?;

        let date = match parse_date(&args.date) {
            Ok(date) => date,
            Err(message) => return Ok(error_result(message)),
        };

        Ok(json!({
            "status": "success",
            "message": format!("Schedule for {}.", date),
            "schedule": self.schedule.availability(date),
        }))
    }
}

// ─────────────────────────────────────────────────────────────────
// book_pickleball_court
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BookArgs {
    date: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    reservation_name: Option<String>,
}

pub struct BookCourtTool {
    schedule: Arc<CourtSchedule>,
}

impl BookCourtTool {
    pub fn new(schedule: Arc<CourtSchedule>) -> Self {
        Self { schedule }
    }
}

#[async_trait]
impl Tool for BookCourtTool {
    fn name(&self) -> &str {
        "book_pickleball_court"
    }

    fn description(&self) -> &str {
        "Books the pickleball court for a date between a start and an end time."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "date": {"type": "string", "description": "Date of the booking, YYYY-MM-DD"},
                "start_time": {"type": "string", "description": "Start time, HH:MM"},
                "end_time": {"type": "string", "description": "End time, HH:MM"},
                "reservation_name": {"type": "string", "description": "Name for the reservation"}
            },
            "required": ["date", "start_time", "end_time"]
        })
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<Value> {
        let args: BookArgs =
            serde_json::from_value(args).map_err(|e| Error::tool(self.name(), e.to_string()))?;

        let parsed = parse_date(&args.date).and_then(|date| {
            Ok((date, parse_time(&args.start_time)?, parse_time(&args.end_time)?))
        });
        let (date, start, end) = match parsed {
            Ok(parsed) => parsed,
            Err(message) => return Ok(error_result(message)),
        };

        let name = args
            .reservation_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "Pickleball game".to_string());

        match self.schedule.book(date, start, end, &name) {
            Ok(booking_id) => {
                info!(%date, start = %args.start_time, end = %args.end_time, booking_id = %booking_id, "Court booked");
                Ok(json!({
                    "status": "success",
                    "message": format!(
                        "Court booked for {} on {} from {} to {}.",
                        name,
                        date,
                        start.format("%H:%M"),
                        end.format("%H:%M")
                    ),
                    "booking_id": booking_id,
                }))
            }
            Err(message) => Ok(error_result(message)),
        }
    }
}
