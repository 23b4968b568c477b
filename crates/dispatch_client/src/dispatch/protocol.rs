/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::common::types::{ConnectionState, DriverCandidateRef, GeoPoint, Latitude, Longitude};
use crate::dispatch::connection::ConnectionManager;
use crate::tools::error::AppError;
use crate::tools::prometheus::DISPATCH_MESSAGES_DROPPED;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RideRequestMessage {
    pub role: Role,
    pub latitude: Latitude,
    pub longitude: Longitude,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    RequestRide(RideRequestMessage),
}

impl OutboundMessage {
    pub fn request_ride(location: GeoPoint) -> Self {
        OutboundMessage::RequestRide(RideRequestMessage {
            role: Role::User,
            latitude: location.latitude,
            longitude: location.longitude,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    NearbyDrivers { drivers: Vec<DriverCandidateRef> },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum InboundFrame {
    NearbyDrivers {
        drivers: Vec<DriverCandidateRef>,
    },
    #[serde(other)]
    Unhandled,
}

/// Reads one inbound dispatch frame.
///
/// `Ok(None)` is a well formed message this client has no use for.
pub fn parse_inbound(frame: &str) -> Result<Option<InboundMessage>, AppError> {
    let value: Value = serde_json::from_str(frame)
        .map_err(|err| AppError::ParseError(format!("Inbound frame is not JSON : {err}")))?;

    match value.get("type") {
        Some(Value::String(_)) => {}
        _ => {
            return Err(AppError::ParseError(
                "Inbound frame without a type".to_string(),
            ))
        }
    }

    match serde_json::from_value::<InboundFrame>(value)
        .map_err(|err| AppError::ParseError(format!("Inbound frame : {err}")))?
    {
        InboundFrame::NearbyDrivers { drivers } => {
            Ok(Some(InboundMessage::NearbyDrivers { drivers }))
        }
        InboundFrame::Unhandled => Ok(None),
    }
}

type CandidateSender = mpsc::UnboundedSender<Vec<DriverCandidateRef>>;

/// Solicits nearby drivers through the dispatch channel and relays the answers.
pub struct RideRequestProtocol {
    connection: ConnectionManager,
    candidates_tx: std::sync::Arc<Mutex<Option<CandidateSender>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl RideRequestProtocol {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            candidates_tx: Default::default(),
            listener: Mutex::new(None),
        }
    }

    /// Every `nearbyDrivers` list received from now on goes to the returned receiver.
    pub fn candidate_refs(&self) -> mpsc::UnboundedReceiver<Vec<DriverCandidateRef>> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut candidates_tx) = self.candidates_tx.lock() {
            *candidates_tx = Some(tx);
        }
        rx
    }

    /// Sends a ride request when the channel is connected and a location is known.
    ///
    /// Returns whether a request went out. Anything else is a silent no-op, the
    /// caller asks again once connected and located.
    pub async fn request_nearby_drivers(&self, location: Option<GeoPoint>) -> bool {
        let Some(location) = location else {
            debug!(tag = "[Ride Request Skipped]", reason = "location unknown");
            return false;
        };

        if self.connection.state() != ConnectionState::Connected {
            debug!(tag = "[Ride Request Skipped]", reason = "not connected");
            return false;
        }

        self.listen();

        match self
            .connection
            .send(&OutboundMessage::request_ride(location))
            .await
        {
            Ok(()) => {
                info!(tag = "[Ride Request Sent]", location = %location.to_query());
                true
            }
            Err(AppError::NotConnectedError) => {
                debug!(tag = "[Ride Request Skipped]", reason = "not connected");
                false
            }
            Err(err) => {
                warn!(tag = "[Ride Request Failed]", error = %err);
                false
            }
        }
    }

    /// Replaces the inbound handler of the previous request cycle.
    fn listen(&self) {
        let mut messages = self.connection.subscribe_messages();
        let candidates_tx = self.candidates_tx.clone();

        let handle = tokio::spawn(async move {
            while let Some(frame) = messages.recv().await {
                match parse_inbound(&frame) {
                    Ok(Some(InboundMessage::NearbyDrivers { drivers })) => {
                        info!(tag = "[Nearby Drivers]", count = drivers.len());
                        let Ok(sender) = candidates_tx.lock() else {
                            continue;
                        };
                        if let Some(tx) = sender.as_ref() {
                            let _ = tx.send(drivers);
                        }
                    }
                    Ok(None) => debug!(tag = "[Dispatch Message Ignored]", frame = %frame),
                    Err(err) => {
                        DISPATCH_MESSAGES_DROPPED.inc();
                        warn!(tag = "[Dispatch Message Dropped]", error = %err, frame = %frame);
                    }
                }
            }
        });

        if let Ok(mut listener) = self.listener.lock() {
            if let Some(previous) = listener.replace(handle) {
                previous.abort();
            }
        }
    }

    pub fn stop(&self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for RideRequestProtocol {
    fn drop(&mut self) {
        self.stop();
    }
}
