/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::types::*;
use crate::tools::error::AppError;
use chrono::{DateTime, Duration, TimeZone};
use regex::Regex;
use std::f64::consts::PI;
use std::fmt::Display;

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[allow(clippy::expect_used)]
static DURATION_PART: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*([a-z]+)").expect("Invalid duration pattern")
});

fn deg2rad(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

/// Great circle distance in kilometres.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat(), a.lng());
    let (lat2, lon2) = (b.lat(), b.lng());

    let h = 0.5 - deg2rad(lat2 - lat1).cos() / 2.0
        + deg2rad(lat1).cos() * deg2rad(lat2).cos() * (1.0 - deg2rad(lon2 - lon1).cos()) / 2.0;

    // Rounding can push h a hair outside [0, 1] for identical or antipodal points
    2.0 * EARTH_RADIUS_KM * h.clamp(0.0, 1.0).sqrt().asin()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn unit_minutes(unit: &str) -> Option<f64> {
    match unit.to_lowercase().as_str() {
        "d" | "day" | "days" => Some(24.0 * 60.0),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(60.0),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(1.0),
        "s" | "sec" | "secs" | "second" | "seconds" => Some(1.0 / 60.0),
        _ => None,
    }
}

/// Parses travel time text such as `15 mins` or `1 hour 5 mins` into minutes.
pub fn parse_duration_minutes(text: &str) -> Result<f64, AppError> {
    let mut total = 0.0;
    let mut matched = false;
    let mut last_end = 0;

    for captures in DURATION_PART.captures_iter(text) {
        let (Some(whole), Some(amount), Some(unit)) =
            (captures.get(0), captures.get(1), captures.get(2))
        else {
            continue;
        };

        let gap = &text[last_end..whole.start()];
        if !gap.chars().all(|c| c.is_whitespace() || c == ',') {
            return Err(AppError::ParseError(format!(
                "Unexpected text {gap:?} in duration {text:?}"
            )));
        }
        last_end = whole.end();

        let amount = amount
            .as_str()
            .parse::<f64>()
            .map_err(|err| AppError::ParseError(format!("{err} in duration {text:?}")))?;
        let minutes = unit_minutes(unit.as_str()).ok_or_else(|| {
            AppError::ParseError(format!(
                "Unknown unit {:?} in duration {text:?}",
                unit.as_str()
            ))
        })?;

        total += amount * minutes;
        matched = true;
    }

    if !matched || !text[last_end..].trim().is_empty() {
        return Err(AppError::ParseError(format!(
            "Unrecognized duration {text:?}"
        )));
    }

    Ok(total)
}

/// `now` plus the parsed travel time, as 12-hour local clock time (`hh:mm AM`).
pub fn estimated_arrival<Tz>(now: DateTime<Tz>, duration_text: &str) -> Result<ClockTime, AppError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let minutes = parse_duration_minutes(duration_text)?;
    arrival_after(now, minutes).ok_or_else(|| {
        AppError::ParseError(format!("Duration {duration_text:?} is out of range"))
    })
}

/// Like [`estimated_arrival`], but unreadable or out of range text counts as zero minutes.
pub fn estimated_arrival_or_now<Tz>(now: DateTime<Tz>, duration_text: &str) -> ClockTime
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    estimated_arrival(now.clone(), duration_text).unwrap_or_else(|err| {
        tracing::warn!(tag = "[Duration Parse Failed]", error = %err);
        clock_time(&now)
    })
}

fn arrival_after<Tz>(now: DateTime<Tz>, minutes: f64) -> Option<ClockTime>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let seconds = (minutes * 60.0).round();
    if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 {
        return None;
    }
    let arrival = now.checked_add_signed(Duration::try_seconds(seconds as i64)?)?;
    Some(clock_time(&arrival))
}

fn clock_time<Tz>(time: &DateTime<Tz>) -> ClockTime
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    ClockTime(time.format("%I:%M %p").to_string())
}
