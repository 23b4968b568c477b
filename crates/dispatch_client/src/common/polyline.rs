/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

//! Decoding of the compact polyline route encoding returned by the directions proxy.
//!
//! Each coordinate is a signed delta from the previous point in units of 1e-5 degrees,
//! zig-zag folded and written as little-endian 5-bit groups offset by 63, with 0x20
//! marking that another group follows.

use crate::common::types::{GeoPoint, RouteGeometry};
use crate::tools::error::AppError;

const PRECISION: f64 = 100000.0;
const CHUNK_OFFSET: u8 = 63;
const CONTINUATION_BIT: i64 = 0x20;
const CHUNK_MASK: i64 = 0x1F;
const MAX_SHIFT: u32 = 60;
const MAX_LAT: i64 = 90 * 100000;
const MAX_LNG: i64 = 180 * 100000;

pub fn decode(encoded: &str) -> Result<RouteGeometry, AppError> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        lat = accumulate(lat, next_delta(bytes, &mut index)?, MAX_LAT, index)?;
        if index >= bytes.len() {
            return Err(AppError::DecodeError(format!(
                "Longitude missing for point {} at offset {index}",
                points.len()
            )));
        }
        lng = accumulate(lng, next_delta(bytes, &mut index)?, MAX_LNG, index)?;

        points.push(GeoPoint::new(lat as f64 / PRECISION, lng as f64 / PRECISION));
    }

    Ok(RouteGeometry(points))
}

fn accumulate(value: i64, delta: i64, bound: i64, index: usize) -> Result<i64, AppError> {
    value
        .checked_add(delta)
        .filter(|next| next.unsigned_abs() <= bound.unsigned_abs())
        .ok_or_else(|| AppError::DecodeError(format!("Coordinate overflow at offset {index}")))
}

fn next_delta(bytes: &[u8], index: &mut usize) -> Result<i64, AppError> {
    let mut shift = 0;
    let mut result: i64 = 0;

    loop {
        let byte = *bytes.get(*index).ok_or_else(|| {
            AppError::DecodeError(format!("Truncated chunk sequence at offset {index}"))
        })?;
        if !(CHUNK_OFFSET..CHUNK_OFFSET + 64).contains(&byte) {
            return Err(AppError::DecodeError(format!(
                "Invalid character {:?} at offset {index}",
                byte as char
            )));
        }
        if shift > MAX_SHIFT {
            return Err(AppError::DecodeError(format!(
                "Chunk sequence too long at offset {index}"
            )));
        }

        let chunk = (byte - CHUNK_OFFSET) as i64;
        *index += 1;
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;

        if chunk & CONTINUATION_BIT == 0 {
            break;
        }
    }

    Ok(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}
