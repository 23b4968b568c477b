/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::common::types::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Everything derived from one origin/destination pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RideEstimate {
    pub origin: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
    pub geometry: RouteGeometry,
    pub distance_km: f64,
    pub fares: Vec<FareEstimate>,
    /// Human readable duration per travel mode; modes whose lookup failed are absent.
    pub travel_times: FxHashMap<TravelMode, String>,
    pub eta: Option<ClockTime>,
}

impl RideEstimate {
    pub fn fare_for(&self, driver_id: &DriverId) -> Option<&FareEstimate> {
        self.fares.iter().find(|fare| &fare.driver_id == driver_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    Applied(Vec<DriverProfile>),
    /// A newer lookup already landed; this answer was dropped.
    Stale { token: RequestToken },
}

/// Transient message shown to the rider.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notice {
    CandidatesUnavailable { message: String },
    RouteUnavailable { message: String },
    NotificationDegraded { message: String },
}
