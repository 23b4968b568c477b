/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use chrono::{FixedOffset, TimeZone};
use dispatch_client::common::types::GeoPoint;
use dispatch_client::common::utils::*;
use dispatch_client::tools::error::AppError;
use std::str::FromStr;

#[test]
fn distance_to_self_is_zero() {
    for point in [
        GeoPoint::new(23.8103, 90.4125),
        GeoPoint::new(-90.0, 0.0),
        GeoPoint::new(51.5, -0.12),
    ] {
        assert_eq!(distance_km(&point, &point), 0.0);
    }
}

#[test]
fn distance_is_symmetric() {
    let a = GeoPoint::new(23.8103, 90.4125);
    let b = GeoPoint::new(22.3569, 91.7832);

    assert!((distance_km(&a, &b) - distance_km(&b, &a)).abs() < 1e-9);
}

#[test]
fn distance_matches_known_city_pair() {
    // Dhaka to Chattogram, roughly 213 km as the crow flies
    let dhaka = GeoPoint::new(23.8103, 90.4125);
    let chattogram = GeoPoint::new(22.3569, 91.7832);

    let distance = distance_km(&dhaka, &chattogram);
    assert!((210.0..216.0).contains(&distance), "{distance}");
}

#[test]
fn durations_in_minutes() {
    assert_eq!(parse_duration_minutes("15 mins").unwrap(), 15.0);
    assert_eq!(parse_duration_minutes("1 hour 5 mins").unwrap(), 65.0);
    assert_eq!(parse_duration_minutes("2 hours").unwrap(), 120.0);
    assert_eq!(parse_duration_minutes("1 day 2 hours").unwrap(), 1560.0);
    assert_eq!(parse_duration_minutes("1 min").unwrap(), 1.0);
    assert_eq!(parse_duration_minutes("90 secs").unwrap(), 1.5);
    assert_eq!(parse_duration_minutes("1 Hour, 5 Mins").unwrap(), 65.0);
}

#[test]
fn malformed_durations_are_parse_errors() {
    for text in ["", "soon", "15 parsecs", "mins 15", "about 15 mins", "15 mins or so"] {
        assert!(
            matches!(parse_duration_minutes(text), Err(AppError::ParseError(_))),
            "{text:?}"
        );
    }
}

#[test]
fn arrival_is_twelve_hour_clock_time() {
    let now = FixedOffset::east_opt(6 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 3, 1, 11, 50, 0)
        .unwrap();

    assert_eq!(estimated_arrival(now, "15 mins").unwrap().inner(), "12:05 PM");
    assert_eq!(estimated_arrival(now, "1 hour 5 mins").unwrap().inner(), "12:55 PM");
    assert!(matches!(estimated_arrival(now, "later"), Err(AppError::ParseError(_))));
}

#[test]
fn unreadable_duration_degrades_to_now() {
    let now = FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 3, 1, 21, 7, 0)
        .unwrap();

    assert_eq!(estimated_arrival_or_now(now, "later").inner(), "09:07 PM");
}

#[test]
fn huge_duration_is_out_of_range_not_a_crash() {
    let now = FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 3, 1, 21, 7, 0)
        .unwrap();

    assert!(parse_duration_minutes("100000000 days").is_ok());
    assert!(matches!(
        estimated_arrival(now, "100000000 days"),
        Err(AppError::ParseError(_))
    ));
    assert_eq!(estimated_arrival_or_now(now, "100000000 days").inner(), "09:07 PM");

    let endless = format!("{} mins", "9".repeat(400));
    assert_eq!(estimated_arrival_or_now(now, &endless).inner(), "09:07 PM");
}

#[test]
fn round2_keeps_two_decimals() {
    assert_eq!(round2(85.5703485), 85.57);
    assert_eq!(round2(12.0), 12.0);
    assert_eq!(round2(0.126), 0.13);
}

#[test]
fn geo_point_parses_lat_lng() {
    assert_eq!(
        GeoPoint::from_str("23.8103, 90.4125").unwrap(),
        GeoPoint::new(23.8103, 90.4125)
    );
    assert!(matches!(GeoPoint::from_str("23.8"), Err(AppError::ParseError(_))));
    assert!(matches!(GeoPoint::from_str("91,0"), Err(AppError::ParseError(_))));
    assert!(matches!(GeoPoint::from_str("a,b"), Err(AppError::ParseError(_))));
}

#[test]
fn geo_point_equality_is_tolerant() {
    assert_eq!(GeoPoint::new(23.8103, 90.4125), GeoPoint::new(23.8103 + 1e-12, 90.4125));
    assert_ne!(GeoPoint::new(23.8103, 90.4125), GeoPoint::new(23.8104, 90.4125));
}
