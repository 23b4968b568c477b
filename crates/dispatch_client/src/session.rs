/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

//! One rider session: the dispatch channel, the candidate set and the estimate,
//! driven by a single event loop task.

use crate::common::{types::*, utils::distance_km};
use crate::dispatch::{connection::ConnectionManager, protocol::RideRequestProtocol, transport::Transport};
use crate::domain::action::{
    candidates::CandidateResolver,
    estimate::{fares, Estimation, RouteEstimator},
    order,
};
use crate::domain::types::{
    order::{OrderPayload, PushMessage},
    ride::{Notice, ResolveOutcome, RideEstimate},
};
use crate::outbound::external::{DriverProfileProvider, LocationNameProvider, RouteProvider};
use crate::tools::error::AppError;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const NOTICE_CAPACITY: usize = 16;

/// Collaborators and settings a session is wired with.
pub struct SessionContext {
    pub transport: Arc<dyn Transport>,
    pub reconnect_delay: Duration,
    pub drivers: Arc<dyn DriverProfileProvider>,
    pub routes: Arc<dyn RouteProvider>,
    pub places: Arc<dyn LocationNameProvider>,
    pub travel_modes: Vec<TravelMode>,
    pub user: UserInfo,
}

struct Core {
    session_id: Uuid,
    connection: ConnectionManager,
    protocol: RideRequestProtocol,
    resolver: CandidateResolver,
    estimator: RouteEstimator,
    places: Arc<dyn LocationNameProvider>,
    user: UserInfo,
    location_tx: watch::Sender<Option<GeoPoint>>,
    destination_tx: watch::Sender<Option<GeoPoint>>,
    estimate_tx: watch::Sender<RideEstimate>,
    notices: broadcast::Sender<Notice>,
    shutdown_tx: watch::Sender<bool>,
    vehicle: Mutex<Option<VehicleType>>,
    estimate_seq: AtomicU64,
    torn_down: AtomicBool,
}

struct Signals {
    state_rx: watch::Receiver<ConnectionState>,
    location_rx: watch::Receiver<Option<GeoPoint>>,
    destination_rx: watch::Receiver<Option<GeoPoint>>,
    candidates_rx: watch::Receiver<Vec<DriverProfile>>,
    shutdown_rx: watch::Receiver<bool>,
    refs_rx: mpsc::UnboundedReceiver<Vec<DriverCandidateRef>>,
}

pub struct RideSession {
    core: Arc<Core>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl RideSession {
    /// Wires the components and spawns the event loop, which opens the
    /// dispatch channel right away.
    pub fn start(ctx: SessionContext) -> Self {
        let connection = ConnectionManager::new(ctx.transport, ctx.reconnect_delay);
        let protocol = RideRequestProtocol::new(connection.clone());
        let refs_rx = protocol.candidate_refs();
        let resolver = CandidateResolver::new(ctx.drivers);

        let (location_tx, location_rx) = watch::channel(None);
        let (destination_tx, destination_rx) = watch::channel(None);
        let (estimate_tx, _) = watch::channel(RideEstimate::default());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let signals = Signals {
            state_rx: connection.subscribe_state(),
            location_rx,
            destination_rx,
            candidates_rx: resolver.subscribe(),
            shutdown_rx,
            refs_rx,
        };

        let core = Arc::new(Core {
            session_id: Uuid::new_v4(),
            connection,
            protocol,
            resolver,
            estimator: RouteEstimator::new(ctx.routes, ctx.travel_modes),
            places: ctx.places,
            user: ctx.user,
            location_tx,
            destination_tx,
            estimate_tx,
            notices,
            shutdown_tx,
            vehicle: Mutex::new(None),
            estimate_seq: AtomicU64::new(0),
            torn_down: AtomicBool::new(false),
        });

        info!(tag = "[Session Started]", session_id = %core.session_id);
        let event_loop = tokio::spawn(run_event_loop(core.clone(), signals));

        Self {
            core,
            event_loop: Mutex::new(Some(event_loop)),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.core.session_id
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.core.connection.subscribe_state()
    }

    pub fn candidates(&self) -> watch::Receiver<Vec<DriverProfile>> {
        self.core.resolver.subscribe()
    }

    pub fn estimate(&self) -> watch::Receiver<RideEstimate> {
        self.core.estimate_tx.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.core.notices.subscribe()
    }

    pub fn update_location(&self, location: GeoPoint) {
        set_point(&self.core.location_tx, location);
    }

    pub fn select_destination(&self, destination: GeoPoint) {
        set_point(&self.core.destination_tx, destination);
    }

    pub fn select_vehicle(&self, vehicle_type: Option<VehicleType>) {
        if let Ok(mut vehicle) = self.core.vehicle.lock() {
            *vehicle = vehicle_type;
        }
    }

    /// Candidates narrowed to the selected vehicle type, if one is selected.
    pub fn visible_candidates(&self) -> Vec<DriverProfile> {
        let vehicle = self
            .core
            .vehicle
            .lock()
            .ok()
            .and_then(|vehicle| vehicle.to_owned());
        match vehicle {
            Some(vehicle_type) => self.core.resolver.filter_by_vehicle(&vehicle_type),
            None => self.core.resolver.candidates(),
        }
    }

    /// Builds the order for one of the current candidates.
    pub async fn confirm(&self, driver_id: &DriverId) -> Result<OrderPayload, AppError> {
        let origin = (*self.core.location_tx.borrow())
            .ok_or_else(|| AppError::InvalidRequest("Current location unknown".to_string()))?;
        let destination = (*self.core.destination_tx.borrow())
            .ok_or_else(|| AppError::InvalidRequest("Destination not selected".to_string()))?;
        let driver = self
            .core
            .resolver
            .candidates()
            .into_iter()
            .find(|driver| &driver.id == driver_id)
            .ok_or_else(|| {
                AppError::InvalidRequest(format!("Driver {} is not a candidate", driver_id.0))
            })?;

        let names =
            order::resolve_location_names(self.core.places.as_ref(), &origin, &destination).await;

        Ok(order::confirm(
            self.core.user.to_owned(),
            origin,
            destination,
            distance_km(&origin, &destination),
            &driver,
            names,
        ))
    }

    pub fn push_message(&self, push_token: &str, order: &OrderPayload) -> PushMessage {
        PushMessage::ride_request(push_token, order)
    }

    /// Normalizes an inbound acceptance notification. Ignored once torn down.
    pub fn handle_notification(&self, payload: &Value) -> Option<OrderPayload> {
        if self.core.torn_down.load(Ordering::SeqCst) {
            debug!(tag = "[Notification Ignored]", reason = "session torn down");
            return None;
        }

        let order = order::from_notification(payload);
        if !order.driver.is_structured() {
            self.core.notify(Notice::NotificationDegraded {
                message: AppError::NotificationParseError(
                    "driver data could not be read".to_string(),
                )
                .message(),
            });
        }
        Some(order)
    }

    /// Stops the event loop and closes the channel without reconnecting.
    /// Lookups still in flight finish but their results are dropped.
    pub async fn teardown(&self) {
        if self.core.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.core.shutdown_tx.send_replace(true);
        self.core.protocol.stop();
        self.core.resolver.shutdown();
        self.core.connection.close().await;

        let event_loop = self
            .event_loop
            .lock()
            .ok()
            .and_then(|mut event_loop| event_loop.take());
        if let Some(event_loop) = event_loop {
            let _ = event_loop.await;
        }
        info!(tag = "[Session Torn Down]", session_id = %self.core.session_id);
    }
}

fn set_point(tx: &watch::Sender<Option<GeoPoint>>, point: GeoPoint) {
    tx.send_if_modified(|current| {
        if *current == Some(point) {
            false
        } else {
            *current = Some(point);
            true
        }
    });
}

/// Which link and location the last ride request went out for.
#[derive(Default)]
struct RequestCycle {
    generation: u64,
    last_sent: Option<(u64, GeoPoint)>,
}

async fn run_event_loop(core: Arc<Core>, mut signals: Signals) {
    let mut cycle = RequestCycle::default();
    // Off the loop so that a hanging open never delays shutdown
    let connection = core.connection.clone();
    let initial_connect = tokio::spawn(async move { connection.connect().await });

    loop {
        tokio::select! {
            biased;
            _ = signals.shutdown_rx.changed() => break,
            Ok(()) = signals.state_rx.changed() => {
                let state = *signals.state_rx.borrow_and_update();
                info!(tag = "[Connection State]", state = %state);
                if state == ConnectionState::Connected {
                    cycle.generation += 1;
                }
                core.request_drivers(&mut cycle).await;
            }
            Ok(()) = signals.location_rx.changed() => {
                signals.location_rx.borrow_and_update();
                core.request_drivers(&mut cycle).await;
                core.refresh_estimate();
            }
            Ok(()) = signals.destination_rx.changed() => {
                signals.destination_rx.borrow_and_update();
                core.refresh_estimate();
            }
            Some(refs) = signals.refs_rx.recv() => core.spawn_resolve(refs),
            Ok(()) = signals.candidates_rx.changed() => {
                signals.candidates_rx.borrow_and_update();
                core.refresh_fares();
            }
            else => break,
        }
    }

    initial_connect.abort();
    debug!(tag = "[Session Event Loop Stopped]");
}

impl Core {
    fn notify(&self, notice: Notice) {
        warn!(tag = "[Notice]", notice = ?notice);
        let _ = self.notices.send(notice);
    }

    fn points(&self) -> (Option<GeoPoint>, Option<GeoPoint>) {
        let location = *self.location_tx.borrow();
        let destination = *self.destination_tx.borrow();
        (location, destination)
    }

    /// Level triggered: asks for drivers whenever connected and located, once
    /// per link and location. A fresh link re-arms the request.
    async fn request_drivers(&self, cycle: &mut RequestCycle) {
        let location = *self.location_tx.borrow();
        let Some(location) = location else {
            return;
        };
        if self.connection.state() != ConnectionState::Connected
            || cycle.last_sent == Some((cycle.generation, location))
        {
            return;
        }
        if self.protocol.request_nearby_drivers(Some(location)).await {
            cycle.last_sent = Some((cycle.generation, location));
        }
    }

    fn spawn_resolve(self: &Arc<Self>, refs: Vec<DriverCandidateRef>) {
        let token = self.resolver.next_token();
        let core = self.clone();
        tokio::spawn(async move {
            match core.resolver.resolve_as(token, &refs).await {
                Ok(ResolveOutcome::Applied(profiles)) => {
                    debug!(tag = "[Candidates Applied]", token = token.inner(), count = profiles.len())
                }
                Ok(ResolveOutcome::Stale { token }) => {
                    debug!(tag = "[Candidates Stale]", token = token.inner())
                }
                Err(err) => {
                    if !core.torn_down.load(Ordering::SeqCst) {
                        core.notify(Notice::CandidatesUnavailable {
                            message: err.message(),
                        });
                    }
                }
            }
        });
    }

    /// Replaces the estimate for the latest location pair.
    ///
    /// Distance and fares are published at once with an empty route; the
    /// full estimate follows unless a newer pair or a teardown overtakes it.
    fn refresh_estimate(self: &Arc<Self>) {
        let (Some(origin), Some(destination)) = self.points() else {
            return;
        };

        let token = self.estimate_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let distance_km = distance_km(&origin, &destination);
        self.estimate_tx.send_replace(RideEstimate {
            origin: Some(origin),
            destination: Some(destination),
            distance_km,
            fares: fares(distance_km, &self.resolver.candidates()),
            ..Default::default()
        });

        let core = self.clone();
        tokio::spawn(async move {
            let drivers = core.resolver.candidates();
            let Estimation {
                mut estimate,
                route_error,
            } = core.estimator.estimate(&origin, &destination, &drivers).await;

            if core.torn_down.load(Ordering::SeqCst)
                || core.estimate_seq.load(Ordering::SeqCst) != token
            {
                debug!(tag = "[Estimate Discarded]", token = token);
                return;
            }

            estimate.fares = fares(estimate.distance_km, &core.resolver.candidates());
            core.estimate_tx.send_replace(estimate);

            if let Some(err) = route_error {
                core.notify(Notice::RouteUnavailable {
                    message: err.message(),
                });
            }
        });
    }

    fn refresh_fares(&self) {
        let candidates = self.resolver.candidates();
        self.estimate_tx.send_if_modified(|estimate| {
            if estimate.origin.is_none() {
                return false;
            }
            estimate.fares = fares(estimate.distance_km, &candidates);
            true
        });
    }
}
