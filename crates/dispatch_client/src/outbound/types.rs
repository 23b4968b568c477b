/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::common::types::*;
use serde::{Deserialize, Serialize};

// Directions proxy
#[derive(Debug, Deserialize, Serialize)]
pub struct DirectionsResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<DirectionsData>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DirectionsData {
    #[serde(default)]
    pub routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DirectionsRoute {
    pub overview_polyline: OverviewPolyline,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OverviewPolyline {
    pub points: String,
}

// Travel time per mode, shaped like a distance matrix answer
#[derive(Debug, Deserialize, Serialize)]
pub struct TravelTimeResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub rows: Vec<TravelTimeRow>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TravelTimeRow {
    #[serde(default)]
    pub elements: Vec<TravelTimeElement>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TravelTimeElement {
    pub status: String,
    #[serde(default)]
    pub duration: Option<TextValue>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TextValue {
    pub text: String,
}

// Reverse geocoding
#[derive(Debug, Deserialize, Serialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GeocodeResult {
    pub formatted_address: String,
}

// Driver lookup
pub type DriversDataResponse = Vec<DriverProfile>;
