/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::common::types::*;
use crate::domain::types::order::*;
use crate::outbound::external::LocationNameProvider;
use crate::tools::error::AppError;
use serde::de::DeserializeOwned;
use serde::Deserializer;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationNames {
    pub current: Option<String>,
    pub destination: Option<String>,
}

/// Reverse geocodes both ends of the ride. A failed lookup leaves its name absent.
pub async fn resolve_location_names(
    provider: &dyn LocationNameProvider,
    origin: &GeoPoint,
    destination: &GeoPoint,
) -> LocationNames {
    let (current, destination) = tokio::join!(
        provider.location_name(origin),
        provider.location_name(destination)
    );

    let named = |result: Result<String, AppError>| match result {
        Ok(name) => Some(name),
        Err(err) => {
            warn!(tag = "[Location Name Unavailable]", error = %err);
            None
        }
    };

    LocationNames {
        current: named(current),
        destination: named(destination),
    }
}

/// Order for a locally selected driver. Pure assembly.
pub fn confirm(
    user: UserInfo,
    origin: GeoPoint,
    destination: GeoPoint,
    distance_km: f64,
    driver: &DriverProfile,
    names: LocationNames,
) -> OrderPayload {
    info!(tag = "[Order Confirmed]", driver_id = %driver.id.0);
    OrderPayload {
        user: Some(user),
        current_location: Some(origin),
        destination: Some(destination),
        distance_km,
        driver: OrderDriver::Profile(driver.to_owned()),
        current_location_name: names.current,
        destination_location_name: names.destination,
    }
}

fn field<T: DeserializeOwned>(payload: &Value, key: &str) -> Option<T> {
    payload
        .get(key)
        .and_then(|value| serde_json::from_value::<T>(value.to_owned()).ok())
}

/// Order announced by a push notification.
///
/// Never fails: anything unreadable in `orderData` becomes the
/// `{"error": "Failed to parse driver data"}` driver.
pub fn from_notification(payload: &Value) -> OrderPayload {
    let driver = OrderData::classify(payload.get("orderData"))
        .into_driver()
        .unwrap_or_else(|err| {
            warn!(tag = "[Notification Driver Unreadable]", error = %err);
            OrderDriver::default()
        });

    let distance_km = payload
        .get("distance")
        .and_then(|value| value.deserialize_any(LenientNumberVisitor).ok())
        .unwrap_or(0.0);

    OrderPayload {
        user: field::<UserInfo>(payload, "user"),
        current_location: field::<GeoPoint>(payload, "currentLocation"),
        destination: field::<GeoPoint>(payload, "marker"),
        distance_km,
        driver,
        current_location_name: field::<String>(payload, "currentLocationName"),
        destination_location_name: field::<String>(payload, "destinationLocationName")
            .or_else(|| field::<String>(payload, "destinationLocation")),
    }
}

pub fn from_notification_str(payload: &str) -> OrderPayload {
    match serde_json::from_str::<Value>(payload) {
        Ok(payload) => from_notification(&payload),
        Err(err) => {
            warn!(tag = "[Notification Unreadable]", error = %err);
            from_notification(&Value::Null)
        }
    }
}
