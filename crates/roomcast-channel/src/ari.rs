//! ARI payload compiler.
//!
//! Turns a local calendar delta into the provider's wire shape: one line per
//! (remote room, remote rate, date span, field set). Runs of consecutive
//! dates carrying an identical field set collapse into a single span line,
//! and the resulting lines are chunked into batches no larger than the
//! provider's per-call line limit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use roomcast_db::models::{CalendarUpdate, RoomMapping};

/// One wire line of a push payload.
///
/// `date` is either a single ISO date or an inclusive `start:end` span.
/// Sparse fields are omitted from the serialized payload entirely so the
/// provider leaves them untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarLine {
    pub room_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_id: Option<String>,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sell: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_to_arrival: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_to_departure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_stay: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stay: Option<i32>,
}

impl CalendarLine {
    fn from_span(
        mapping: &RoomMapping,
        start: NaiveDate,
        end: NaiveDate,
        update: &CalendarUpdate,
    ) -> Self {
        let date = if start == end {
            start.format("%Y-%m-%d").to_string()
        } else {
            format!("{}:{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
        };
        Self {
            room_id: mapping.remote_room_id.clone(),
            rate_id: mapping.remote_rate_id.clone(),
            date,
            rate: update.rate,
            availability: update.availability,
            stop_sell: update.stop_sell,
            closed_to_arrival: update.closed_to_arrival,
            closed_to_departure: update.closed_to_departure,
            min_stay: update.min_stay,
            max_stay: update.max_stay,
        }
    }
}

/// One push call's worth of lines, at most the provider's line limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushBatch {
    pub property_id: String,
    pub lines: Vec<CalendarLine>,
}

/// Compile a uniform update over a date range into batches.
///
/// A uniform update always merges into a single span line, so this produces
/// exactly one batch.
#[must_use]
pub fn compile(
    mapping: &RoomMapping,
    from: NaiveDate,
    to: NaiveDate,
    update: &CalendarUpdate,
    line_limit: usize,
) -> Vec<PushBatch> {
    let days: Vec<(NaiveDate, CalendarUpdate)> = from
        .iter_days()
        .take_while(|d| *d <= to)
        .map(|d| (d, update.clone()))
        .collect();
    compile_days(mapping, &days, line_limit)
}

/// Compile per-day updates into batches.
///
/// Consecutive dates carrying an identical field set merge into one span
/// line; a gap in the date sequence or any field difference starts a new
/// line. Days with an empty update are dropped. Lines are then chunked into
/// batches of at most `line_limit`.
#[must_use]
pub fn compile_days(
    mapping: &RoomMapping,
    days: &[(NaiveDate, CalendarUpdate)],
    line_limit: usize,
) -> Vec<PushBatch> {
    let mut lines = Vec::new();
    let mut run: Option<(NaiveDate, NaiveDate, &CalendarUpdate)> = None;

    for (date, update) in days {
        if update.is_empty() {
            continue;
        }
        match run {
            Some((start, end, current))
                if current == update && end.succ_opt() == Some(*date) =>
            {
                run = Some((start, *date, current));
            }
            Some((start, end, current)) => {
                lines.push(CalendarLine::from_span(mapping, start, end, current));
                run = Some((*date, *date, update));
            }
            None => {
                run = Some((*date, *date, update));
            }
        }
    }
    if let Some((start, end, current)) = run {
        lines.push(CalendarLine::from_span(mapping, start, end, current));
    }

    lines
        .chunks(line_limit.max(1))
        .map(|chunk| PushBatch {
            property_id: mapping.remote_property_id.clone(),
            lines: chunk.to_vec(),
        })
        .collect()
}
