/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::support::encode;
use dispatch_client::common::polyline::decode;
use dispatch_client::common::types::GeoPoint;
use dispatch_client::tools::error::AppError;

#[test]
fn decodes_reference_route() {
    let geometry = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();

    assert_eq!(
        geometry.points(),
        &[
            GeoPoint::new(38.5, -120.2),
            GeoPoint::new(40.7, -120.95),
            GeoPoint::new(43.252, -126.453),
        ]
    );
}

#[test]
fn empty_input_is_an_empty_route() {
    assert!(decode("").unwrap().is_empty());
}

#[test]
fn decode_inverts_encode() {
    let points = vec![
        GeoPoint::new(23.8103, 90.4125),
        GeoPoint::new(23.80512, 90.40871),
        GeoPoint::new(23.8, 90.4),
        GeoPoint::new(-33.86882, 151.20929),
        GeoPoint::new(0.0, 0.0),
        GeoPoint::new(89.99999, -179.99999),
    ];

    let geometry = decode(&encode(&points)).unwrap();

    assert_eq!(geometry.len(), points.len());
    for (decoded, expected) in geometry.points().iter().zip(&points) {
        assert!((decoded.lat() - expected.lat()).abs() < 1e-6);
        assert!((decoded.lng() - expected.lng()).abs() < 1e-6);
    }
}

#[test]
fn truncated_chunk_is_a_decode_error() {
    // `|` still carries the continuation bit
    assert!(matches!(decode("_p~iF~ps|"), Err(AppError::DecodeError(_))));
}

#[test]
fn latitude_without_longitude_is_a_decode_error() {
    assert!(matches!(decode("_p~iF"), Err(AppError::DecodeError(_))));
}

#[test]
fn bytes_outside_the_alphabet_are_rejected() {
    assert!(matches!(decode("_p~iF ps|U"), Err(AppError::DecodeError(_))));
    assert!(matches!(decode("_p~iF~ps|U\u{e9}"), Err(AppError::DecodeError(_))));
}

#[test]
fn endless_continuation_terminates() {
    let encoded = "~".repeat(64);
    assert!(matches!(decode(&encoded), Err(AppError::DecodeError(_))));
}

#[test]
fn accumulator_overflow_is_a_decode_error() {
    // Each point carries a latitude delta of 2^62 - 1 and a zero longitude delta
    let point = format!("}}{}F?", "~".repeat(11));
    assert!(matches!(decode(&point.repeat(3)), Err(AppError::DecodeError(_))));
}

#[test]
fn coordinates_beyond_the_globe_are_rejected() {
    let pole_to_pole = encode(&[GeoPoint::new(89.0, 10.0), GeoPoint::new(-89.0, 10.0)]);
    assert!(decode(&pole_to_pole).is_ok());

    // 100 degrees of latitude
    let encoded = encode(&[GeoPoint::new(50.0, 0.0)]).repeat(2);
    assert!(matches!(decode(&encoded), Err(AppError::DecodeError(_))));
}
