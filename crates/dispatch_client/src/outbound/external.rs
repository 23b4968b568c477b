/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::types::*;
use crate::common::types::*;
use crate::tools::callapi::call_api;
use crate::tools::error::AppError;
use async_trait::async_trait;
use reqwest::{Method, Url};
use std::time::Duration;

fn endpoint(server_uri: &Url, path: &str, params: &[(&str, String)]) -> Result<Url, AppError> {
    let base = server_uri.as_str().trim_end_matches('/');
    Url::parse_with_params(&format!("{base}{path}"), params)
        .map_err(|err| AppError::InvalidRequest(format!("Invalid url for {path} : {err}")))
}

pub async fn get_drivers_data(
    server_uri: &Url,
    ids: &[DriverId],
    timeout: Duration,
) -> Result<DriversDataResponse, AppError> {
    let ids = ids
        .iter()
        .map(|id| id.0.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let url = endpoint(server_uri, "/driver/get-drivers-data", &[("ids", ids)])?;

    call_api::<DriversDataResponse, String>(
        Method::GET,
        &url,
        vec![("content-type", "application/json")],
        None,
        timeout,
    )
    .await
}

pub async fn get_directions(
    server_uri: &Url,
    origin: &GeoPoint,
    destination: &GeoPoint,
    timeout: Duration,
) -> Result<DirectionsResponse, AppError> {
    let url = endpoint(
        server_uri,
        "/api/v1/directions",
        &[
            ("origin", origin.to_query()),
            ("destination", destination.to_query()),
        ],
    )?;

    call_api::<DirectionsResponse, String>(
        Method::GET,
        &url,
        vec![("content-type", "application/json")],
        None,
        timeout,
    )
    .await
}

pub async fn get_travel_time(
    server_uri: &Url,
    origin: &GeoPoint,
    destination: &GeoPoint,
    mode: TravelMode,
    timeout: Duration,
) -> Result<TravelTimeResponse, AppError> {
    let mut params = vec![
        ("origins", origin.to_query()),
        ("destinations", destination.to_query()),
        ("mode", mode.to_string()),
    ];
    if mode == TravelMode::Driving {
        params.push(("departure_time", "now".to_string()));
    }
    let url = endpoint(server_uri, "/api/v1/travel-times", &params)?;

    call_api::<TravelTimeResponse, String>(
        Method::GET,
        &url,
        vec![("content-type", "application/json")],
        None,
        timeout,
    )
    .await
}

pub async fn reverse_geocode(
    server_uri: &Url,
    point: &GeoPoint,
    timeout: Duration,
) -> Result<GeocodeResponse, AppError> {
    let url = endpoint(server_uri, "/api/v1/geocode", &[("latlng", point.to_query())])?;

    call_api::<GeocodeResponse, String>(
        Method::GET,
        &url,
        vec![("content-type", "application/json")],
        None,
        timeout,
    )
    .await
}

/// Batched lookup of driver records by identifier.
#[async_trait]
pub trait DriverProfileProvider: Send + Sync {
    async fn drivers_by_ids(&self, ids: &[DriverId]) -> Result<Vec<DriverProfile>, AppError>;
}

/// Road routing. Always reached through the backend proxy, never a third party directly.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Encoded overview polyline of the first route.
    async fn directions(&self, origin: &GeoPoint, destination: &GeoPoint)
        -> Result<String, AppError>;

    /// Human readable travel time, e.g. `1 hour 5 mins`.
    async fn travel_time(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
        mode: TravelMode,
    ) -> Result<String, AppError>;
}

#[async_trait]
pub trait LocationNameProvider: Send + Sync {
    async fn location_name(&self, point: &GeoPoint) -> Result<String, AppError>;
}

/// All collaborators served by the proxy backend at `server_uri`.
#[derive(Debug, Clone)]
pub struct BackendClient {
    server_uri: Url,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(server_uri: Url, timeout: Duration) -> Self {
        Self {
            server_uri,
            timeout,
        }
    }
}

#[async_trait]
impl DriverProfileProvider for BackendClient {
    async fn drivers_by_ids(&self, ids: &[DriverId]) -> Result<Vec<DriverProfile>, AppError> {
        get_drivers_data(&self.server_uri, ids, self.timeout)
            .await
            .map_err(AppError::into_retrieval)
    }
}

#[async_trait]
impl RouteProvider for BackendClient {
    async fn directions(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<String, AppError> {
        let response = get_directions(&self.server_uri, origin, destination, self.timeout)
            .await
            .map_err(AppError::into_retrieval)?;

        if !response.success {
            return Err(AppError::RetrievalError(
                "Directions lookup was not successful".to_string(),
            ));
        }

        response
            .data
            .and_then(|data| data.routes.into_iter().next())
            .map(|route| route.overview_polyline.points)
            .ok_or_else(|| AppError::RetrievalError("No route found".to_string()))
    }

    async fn travel_time(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
        mode: TravelMode,
    ) -> Result<String, AppError> {
        let response = get_travel_time(&self.server_uri, origin, destination, mode, self.timeout)
            .await
            .map_err(AppError::into_retrieval)?;

        if let Some(status) = response.status.as_deref().filter(|status| *status != "OK") {
            return Err(AppError::RetrievalError(format!(
                "Travel time lookup ({mode}) returned {status}"
            )));
        }

        let element = response
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.elements.into_iter().next())
            .ok_or_else(|| AppError::RetrievalError(format!("No travel time for {mode}")))?;

        match (element.status.as_str(), element.duration) {
            ("OK", Some(duration)) => Ok(duration.text),
            (status, _) => Err(AppError::RetrievalError(format!(
                "Travel time element ({mode}) returned {status}"
            ))),
        }
    }
}

#[async_trait]
impl LocationNameProvider for BackendClient {
    async fn location_name(&self, point: &GeoPoint) -> Result<String, AppError> {
        reverse_geocode(&self.server_uri, point, self.timeout)
            .await
            .map_err(AppError::into_retrieval)?
            .results
            .into_iter()
            .next()
            .map(|result| result.formatted_address)
            .ok_or_else(|| AppError::RetrievalError(format!("No address for {}", point.to_query())))
    }
}
