/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::common::{polyline, types::*, utils::*};
use crate::domain::types::ride::RideEstimate;
use crate::outbound::external::RouteProvider;
use crate::tools::error::AppError;
use chrono::{DateTime, Local};
use futures::future::join_all;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// One estimate together with the reason its route is missing, if it is.
#[derive(Debug, Clone)]
pub struct Estimation {
    pub estimate: RideEstimate,
    pub route_error: Option<AppError>,
}

/// One fare per driver: `round2(distance_km × rate)`.
pub fn fares(distance_km: f64, drivers: &[DriverProfile]) -> Vec<FareEstimate> {
    drivers
        .iter()
        .map(|driver| FareEstimate {
            driver_id: driver.id.to_owned(),
            distance_km,
            fare: round2(distance_km * driver.rate.inner()),
        })
        .collect()
}

pub struct RouteEstimator {
    routes: Arc<dyn RouteProvider>,
    travel_modes: Vec<TravelMode>,
}

impl RouteEstimator {
    pub fn new(routes: Arc<dyn RouteProvider>, travel_modes: Vec<TravelMode>) -> Self {
        Self {
            routes,
            travel_modes,
        }
    }

    pub async fn estimate(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
        drivers: &[DriverProfile],
    ) -> Estimation {
        self.estimate_at(Local::now(), origin, destination, drivers)
            .await
    }

    /// Route geometry, straight line distance, fares, travel times and ETA.
    ///
    /// Distance and fares never depend on the collaborators: a failed
    /// directions lookup or an undecodable polyline leaves the geometry empty,
    /// a failed travel time lookup leaves its mode out.
    pub async fn estimate_at(
        &self,
        now: DateTime<Local>,
        origin: &GeoPoint,
        destination: &GeoPoint,
        drivers: &[DriverProfile],
    ) -> Estimation {
        let (geometry, travel_times) = tokio::join!(
            self.route_geometry(origin, destination),
            self.travel_times(origin, destination)
        );

        let (geometry, route_error) = match geometry {
            Ok(geometry) => (geometry, None),
            Err(err) => {
                warn!(tag = "[Route Unavailable]", error = %err);
                (RouteGeometry::default(), Some(err))
            }
        };

        let distance_km = distance_km(origin, destination);
        let eta = travel_times
            .get(&TravelMode::Driving)
            .map(|text| estimated_arrival_or_now(now, text));

        info!(
            tag = "[Ride Estimated]",
            distance_km = distance_km,
            route_points = geometry.len(),
            drivers = drivers.len()
        );

        Estimation {
            estimate: RideEstimate {
                origin: Some(*origin),
                destination: Some(*destination),
                geometry,
                distance_km,
                fares: fares(distance_km, drivers),
                travel_times,
                eta,
            },
            route_error,
        }
    }

    pub async fn route_geometry(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<RouteGeometry, AppError> {
        let encoded = self.routes.directions(origin, destination).await?;
        polyline::decode(&encoded)
    }

    async fn travel_times(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> FxHashMap<TravelMode, String> {
        let lookups = self.travel_modes.iter().map(|mode| async move {
            (*mode, self.routes.travel_time(origin, destination, *mode).await)
        });

        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(mode, result)| match result {
                Ok(text) => Some((mode, text)),
                Err(err) => {
                    warn!(tag = "[Travel Time Unavailable]", mode = %mode, error = %err);
                    None
                }
            })
            .collect()
    }
}
