/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::common::types::*;
use crate::common::utils::round2;
use crate::tools::error::AppError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const DRIVER_PARSE_FAILURE: &str = "Failed to parse driver data";

/// The `orderData` field of a push payload, classified once on arrival.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderData {
    /// Serialized JSON text, possibly encoded more than once.
    Raw(String),
    Structured(Value),
    Malformed,
}

impl OrderData {
    pub fn classify(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(raw)) => OrderData::Raw(raw.to_owned()),
            Some(value @ (Value::Object(_) | Value::Array(_))) => {
                OrderData::Structured(value.to_owned())
            }
            _ => OrderData::Malformed,
        }
    }

    pub fn into_driver(self) -> Result<OrderDriver, AppError> {
        let mut value = match self {
            OrderData::Raw(raw) => Value::String(raw),
            OrderData::Structured(value) => value,
            OrderData::Malformed => {
                return Err(AppError::NotificationParseError(
                    "orderData is missing or not an object".to_string(),
                ))
            }
        };

        // Double encoded payloads unwrap to text once more
        for _ in 0..2 {
            let Value::String(raw) = &value else {
                break;
            };
            value = serde_json::from_str::<Value>(raw)
                .map_err(|err| AppError::NotificationParseError(err.to_string()))?;
        }

        match value {
            Value::Object(fields) => Ok(OrderDriver::from_fields(fields)),
            other => Err(AppError::NotificationParseError(format!(
                "orderData does not hold an object : {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DriverUnavailable {
    pub error: String,
}

impl Default for DriverUnavailable {
    fn default() -> Self {
        Self {
            error: DRIVER_PARSE_FAILURE.to_string(),
        }
    }
}

/// Driver side of an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OrderDriver {
    Profile(DriverProfile),
    Unavailable(DriverUnavailable),
    /// A structured record that is not a complete driver profile.
    Loose(Map<String, Value>),
}

impl Default for OrderDriver {
    fn default() -> Self {
        OrderDriver::Unavailable(DriverUnavailable::default())
    }
}

impl OrderDriver {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        match serde_json::from_value::<DriverProfile>(Value::Object(fields.to_owned())) {
            Ok(profile) => OrderDriver::Profile(profile),
            Err(_) => OrderDriver::Loose(fields),
        }
    }

    pub fn is_structured(&self) -> bool {
        !matches!(self, OrderDriver::Unavailable(_))
    }

    fn field<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self {
            OrderDriver::Loose(fields) => fields
                .get(key)
                .and_then(|value| serde_json::from_value::<T>(value.to_owned()).ok()),
            _ => None,
        }
    }

    pub fn current_location(&self) -> Option<GeoPoint> {
        match self {
            OrderDriver::Profile(profile) => Some(profile.current_location),
            _ => self.field::<GeoPoint>("currentLocation"),
        }
    }

    pub fn marker(&self) -> Option<GeoPoint> {
        self.field::<GeoPoint>("marker")
    }

    pub fn rate(&self) -> Option<f64> {
        match self {
            OrderDriver::Profile(profile) => Some(profile.rate.inner()),
            _ => self.field::<Rate>("rate").map(Rate::inner),
        }
    }

    pub fn distance_km(&self) -> Option<f64> {
        self.field::<Rate>("distance").map(Rate::inner)
    }
}

fn lenient_distance<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientNumberVisitor)
}

/// The one shape handed to the ride detail view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    #[serde(default)]
    pub user: Option<UserInfo>,
    #[serde(default)]
    pub current_location: Option<GeoPoint>,
    #[serde(rename = "marker", default)]
    pub destination: Option<GeoPoint>,
    #[serde(rename = "distance", deserialize_with = "lenient_distance", default)]
    pub distance_km: f64,
    #[serde(default)]
    pub driver: OrderDriver,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_location_name: Option<String>,
    #[serde(
        default,
        alias = "destinationLocation",
        skip_serializing_if = "Option::is_none"
    )]
    pub destination_location_name: Option<String>,
}

impl OrderPayload {
    /// Where the detail map centres: the driver if known, else the rider.
    pub fn focus_point(&self) -> Option<GeoPoint> {
        self.driver.current_location().or(self.current_location)
    }

    pub fn destination_point(&self) -> Option<GeoPoint> {
        self.driver.marker().or(self.destination)
    }

    /// `round2(distance × rate)`, preferring the distance carried by the driver record.
    pub fn payable_amount(&self) -> Option<f64> {
        let rate = self.driver.rate()?;
        let distance = self.driver.distance_km().unwrap_or(self.distance_km);
        Some(round2(distance * rate))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
    pub order_data: OrderPayload,
    pub current_location: Option<GeoPoint>,
    pub marker: Option<GeoPoint>,
    pub distance: String,
}

/// Push notification body announcing a ride request to the chosen driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushMessage {
    pub to: String,
    pub sound: String,
    pub title: String,
    pub body: String,
    pub data: PushData,
}

impl PushMessage {
    pub fn ride_request(push_token: &str, order: &OrderPayload) -> Self {
        Self {
            to: push_token.to_string(),
            sound: "default".to_string(),
            title: "New Ride Request".to_string(),
            body: "You have a new ride request.".to_string(),
            data: PushData {
                order_data: order.to_owned(),
                current_location: order.current_location,
                marker: order.destination,
                distance: format!("{:.2}", order.distance_km),
            },
        }
    }
}
