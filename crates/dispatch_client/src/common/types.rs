/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::tools::error::AppError;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// Coordinates closer than this (in degrees) are the same point.
pub const COORDINATE_TOLERANCE: f64 = 1e-9;

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
#[macros::impl_getter]
pub struct Latitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
#[macros::impl_getter]
pub struct Longitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq)]
#[macros::impl_getter]
pub struct DriverId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq)]
#[macros::impl_getter]
pub struct UserId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
#[macros::impl_getter]
pub struct ClockTime(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Copy, Hash)]
#[macros::impl_getter]
pub struct RequestToken(pub u64);

#[derive(Deserialize, Serialize, Clone, Copy, Debug)]
pub struct GeoPoint {
    pub latitude: Latitude,
    pub longitude: Longitude,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Latitude(latitude),
            longitude: Longitude(longitude),
        }
    }

    pub fn lat(&self) -> f64 {
        self.latitude.inner()
    }

    pub fn lng(&self) -> f64 {
        self.longitude.inner()
    }

    /// `lat,lng` as the collaborators expect it in query strings.
    pub fn to_query(&self) -> String {
        format!("{},{}", self.lat(), self.lng())
    }
}

impl PartialEq for GeoPoint {
    fn eq(&self, other: &Self) -> bool {
        (self.lat() - other.lat()).abs() <= COORDINATE_TOLERANCE
            && (self.lng() - other.lng()).abs() <= COORDINATE_TOLERANCE
    }
}

impl FromStr for GeoPoint {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| AppError::ParseError(format!("Expected lat,lng : {s}")))?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|err| AppError::ParseError(format!("Invalid latitude {lat} : {err}")))?;
        let lng = lng
            .trim()
            .parse::<f64>()
            .map_err(|err| AppError::ParseError(format!("Invalid longitude {lng} : {err}")))?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::ParseError(format!(
                "Coordinates out of range : {lat},{lng}"
            )));
        }
        Ok(GeoPoint::new(lat, lng))
    }
}

/// Ordered points of one decoded route, replaced wholesale when the inputs change.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[macros::impl_getter]
pub struct RouteGeometry(pub Vec<GeoPoint>);

impl RouteGeometry {
    pub fn points(&self) -> &[GeoPoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per kilometre rate of a driver.
///
/// Driver records carry it either as a number or as numeric text.
#[derive(Serialize, Clone, Debug, PartialEq, PartialOrd, Copy)]
#[macros::impl_getter]
pub struct Rate(pub f64);

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_any(LenientNumberVisitor)
            .map(Rate)
    }
}

/// Visitor accepting integers, floats or strings holding a float.
pub struct LenientNumberVisitor;

impl<'de> serde::de::Visitor<'de> for LenientNumberVisitor {
    type Value = f64;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a number (integer/float) or a string containing a floating-point number")
    }

    fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(value)
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(v as f64)
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(v as f64)
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| E::invalid_value(serde::de::Unexpected::Str(value), &self))
    }
}

#[derive(
    Debug, Clone, EnumString, EnumIter, Display, Serialize, Deserialize, Eq, Hash, PartialEq,
)]
pub enum VehicleType {
    Car,
    Motorcycle,
    #[strum(serialize = "CNG")]
    #[serde(rename = "CNG")]
    CngRickshaw,
    #[strum(default)]
    #[serde(untagged)]
    Other(String),
}

#[derive(Debug, Clone, Copy, Display, Serialize, Deserialize, Eq, Hash, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(
    Debug, Clone, Copy, EnumString, EnumIter, Display, Serialize, Deserialize, Eq, Hash, PartialEq,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Driving,
    Walking,
    Bicycling,
    Transit,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DriverCandidateRef {
    pub id: DriverId,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DriverProfile {
    pub id: DriverId,
    pub name: String,
    pub phone_number: String,
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub vehicle_color: String,
    pub rate: Rate,
    #[serde(rename = "currentLocation")]
    pub current_location: GeoPoint,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FareEstimate {
    pub driver_id: DriverId,
    pub distance_km: f64,
    pub fare: f64,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct UserInfo {
    pub id: Option<UserId>,
    pub name: Option<String>,
    pub phone_number: Option<String>,
}
