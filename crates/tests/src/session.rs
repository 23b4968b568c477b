/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::support::*;
use dispatch_client::common::types::*;
use dispatch_client::domain::types::order::OrderDriver;
use dispatch_client::domain::types::ride::Notice;
use dispatch_client::session::{RideSession, SessionContext};
use dispatch_client::tools::error::AppError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    transport: Arc<MemoryTransport>,
    drivers: Arc<FakeDrivers>,
    routes: Arc<FakeRoutes>,
    session: RideSession,
}

fn origin() -> GeoPoint {
    GeoPoint::new(23.8103, 90.4125)
}

fn destination() -> GeoPoint {
    GeoPoint::new(23.8000, 90.4000)
}

fn start(transport_failing: bool) -> Harness {
    let transport = MemoryTransport::new();
    transport.set_failing(transport_failing);
    let drivers = FakeDrivers::with(vec![
        profile("d1", 50.0, VehicleType::Car, GeoPoint::new(23.812, 90.41)),
        profile("d2", 30.0, VehicleType::Motorcycle, GeoPoint::new(23.809, 90.415)),
    ]);
    let routes = FakeRoutes::with(Ok(encode(&[origin(), destination()])));
    routes.travel_time(TravelMode::Driving, "12 mins");

    let session = RideSession::start(SessionContext {
        transport: transport.clone(),
        reconnect_delay: Duration::from_secs(5),
        drivers: drivers.clone(),
        routes: routes.clone(),
        places: Arc::new(FakePlaces { failing: false }),
        travel_modes: vec![TravelMode::Driving, TravelMode::Walking],
        user: UserInfo {
            id: Some(UserId("u1".to_string())),
            name: Some("Nadia".to_string()),
            phone_number: None,
        },
    });

    Harness {
        transport,
        drivers,
        routes,
        session,
    }
}

async fn next_peer(transport: &MemoryTransport) -> anyhow::Result<Peer> {
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            if let Some(peer) = transport.take_peer() {
                return peer;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("no link opened"))
}

fn ride_requests(peer: &mut Peer) -> usize {
    peer.sent()
        .iter()
        .filter(|frame| frame.contains("\"requestRide\""))
        .count()
}

#[tokio::test(start_paused = true)]
async fn requests_once_when_connected_and_located() -> anyhow::Result<()> {
    let h = start(false);
    h.session.update_location(origin());

    let mut peer = next_peer(&h.transport).await?;
    settle().await;
    assert_eq!(ride_requests(&mut peer), 1);

    // Same location again is not a new signal
    h.session.update_location(origin());
    settle().await;
    assert_eq!(ride_requests(&mut peer), 0);

    h.session.update_location(GeoPoint::new(23.811, 90.413));
    settle().await;
    assert_eq!(ride_requests(&mut peer), 1);

    h.session.teardown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn sessions_carry_distinct_ids() -> anyhow::Result<()> {
    let first = start(false);
    let second = start(false);

    assert_eq!(first.session.session_id(), first.session.session_id());
    assert_ne!(first.session.session_id(), second.session.session_id());

    first.session.teardown().await;
    second.session.teardown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn request_waits_for_the_connection() -> anyhow::Result<()> {
    let h = start(true);
    h.session.update_location(origin());
    let mut state = h.session.connection_state();
    settle().await;
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);

    h.transport.set_failing(false);
    wait_until(&mut state, |s| *s == ConnectionState::Connected).await?;
    let mut peer = next_peer(&h.transport).await?;
    settle().await;
    assert_eq!(ride_requests(&mut peer), 1);

    h.session.teardown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn interrupted_request_is_rearmed_after_reconnect() -> anyhow::Result<()> {
    let h = start(false);
    h.session.update_location(origin());
    let mut state = h.session.connection_state();

    let mut first = next_peer(&h.transport).await?;
    settle().await;
    assert_eq!(ride_requests(&mut first), 1);

    first.hang_up();
    wait_until(&mut state, |s| *s == ConnectionState::Disconnected).await?;
    wait_until(&mut state, |s| *s == ConnectionState::Connected).await?;

    let mut second = next_peer(&h.transport).await?;
    settle().await;
    assert_eq!(ride_requests(&mut second), 1);
    assert_eq!(h.transport.opens(), 2);

    h.session.teardown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn candidates_flow_into_fares() -> anyhow::Result<()> {
    let h = start(false);
    h.session.update_location(origin());
    h.session.select_destination(destination());
    let peer = next_peer(&h.transport).await?;
    settle().await;

    peer.push(r#"{"type":"nearbyDrivers","drivers":[{"id":"d1"},{"id":"d2"}]}"#);

    let mut candidates = h.session.candidates();
    wait_until(&mut candidates, |c| c.len() == 2).await?;
    let mut estimate = h.session.estimate();
    wait_until(&mut estimate, |e| e.fares.len() == 2 && !e.geometry.is_empty()).await?;

    let estimate = h.session.estimate().borrow().clone();
    assert!((estimate.distance_km - 1.7114069703405852).abs() < 1e-9);
    assert_eq!(estimate.fare_for(&DriverId("d1".to_string())).map(|f| f.fare), Some(85.57));
    assert_eq!(estimate.fare_for(&DriverId("d2".to_string())).map(|f| f.fare), Some(51.34));
    assert!(estimate.eta.is_some());

    h.session.select_vehicle(Some(VehicleType::Motorcycle));
    let visible = h.session.visible_candidates();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, DriverId("d2".to_string()));
    h.session.select_vehicle(None);
    assert_eq!(h.session.visible_candidates().len(), 2);

    h.session.teardown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn lookup_failure_keeps_candidates_and_notifies() -> anyhow::Result<()> {
    let h = start(false);
    let mut notices = h.session.notices();
    h.session.update_location(origin());
    let peer = next_peer(&h.transport).await?;

    peer.push(r#"{"type":"nearbyDrivers","drivers":[{"id":"d1"}]}"#);
    let mut candidates = h.session.candidates();
    wait_until(&mut candidates, |c| c.len() == 1).await?;

    h.drivers.set_failing(true);
    peer.push(r#"{"type":"nearbyDrivers","drivers":[{"id":"d2"}]}"#);

    let notice = tokio::time::timeout(Duration::from_secs(5), notices.recv()).await??;
    assert!(matches!(notice, Notice::CandidatesUnavailable { .. }));
    assert_eq!(h.session.candidates().borrow()[0].id, DriverId("d1".to_string()));

    h.session.teardown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn route_failure_is_a_notice_not_an_error() -> anyhow::Result<()> {
    let h = start(false);
    *h.routes.polyline.lock().unwrap() = Err(AppError::RetrievalError("proxy down".to_string()));
    let mut notices = h.session.notices();

    h.session.update_location(origin());
    h.session.select_destination(destination());

    let notice = tokio::time::timeout(Duration::from_secs(5), notices.recv()).await??;
    assert!(matches!(notice, Notice::RouteUnavailable { .. }));
    let estimate = h.session.estimate().borrow().clone();
    assert!(estimate.geometry.is_empty());
    assert!(estimate.distance_km > 1.7);

    h.session.teardown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn superseded_estimate_is_discarded() -> anyhow::Result<()> {
    let h = start(false);
    *h.routes.delay.lock().unwrap() = Duration::from_secs(2);
    let elsewhere = GeoPoint::new(23.7500, 90.3900);

    h.session.update_location(origin());
    h.session.select_destination(destination());
    settle().await;
    h.session.select_destination(elsewhere);
    settle().await;

    let mut estimate = h.session.estimate();
    wait_until(&mut estimate, |e| !e.geometry.is_empty()).await?;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let estimate = h.session.estimate().borrow().clone();
    assert_eq!(estimate.destination, Some(elsewhere));
    assert!(!estimate.geometry.is_empty());

    h.session.teardown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn confirm_builds_the_order() -> anyhow::Result<()> {
    let h = start(false);
    h.session.update_location(origin());
    h.session.select_destination(destination());
    let peer = next_peer(&h.transport).await?;
    peer.push(r#"{"type":"nearbyDrivers","drivers":[{"id":"d1"}]}"#);
    let mut candidates = h.session.candidates();
    wait_until(&mut candidates, |c| !c.is_empty()).await?;

    let mut estimate = h.session.estimate();
    wait_until(&mut estimate, |e| !e.fares.is_empty()).await?;

    let order = h.session.confirm(&DriverId("d1".to_string())).await?;

    assert!(matches!(&order.driver, OrderDriver::Profile(p) if p.id.0 == "d1"));
    assert!((order.distance_km - 1.7114069703405852).abs() < 1e-9);
    let quoted = h
        .session
        .estimate()
        .borrow()
        .fare_for(&DriverId("d1".to_string()))
        .map(|fare| fare.fare);
    assert_eq!(order.payable_amount(), quoted);
    assert_eq!(quoted, Some(85.57));
    assert_eq!(order.current_location_name.as_deref(), Some("Place 23.8103,90.4125"));
    assert_eq!(order.destination_location_name.as_deref(), Some("Place 23.8,90.4"));
    assert_eq!(order.user.as_ref().and_then(|u| u.name.as_deref()), Some("Nadia"));

    let unknown = h.session.confirm(&DriverId("d9".to_string())).await;
    assert!(matches!(unknown, Err(AppError::InvalidRequest(_))));

    h.session.teardown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn notifications_degrade_and_stop_after_teardown() -> anyhow::Result<()> {
    let h = start(false);
    let mut notices = h.session.notices();

    let order = h
        .session
        .handle_notification(&json!({"orderData": "not json", "distance": "2.00"}))
        .expect("session alive");
    assert_eq!(order.driver, OrderDriver::default());
    assert_eq!(order.distance_km, 2.0);
    assert!(matches!(notices.recv().await?, Notice::NotificationDegraded { .. }));

    h.session.teardown().await;
    assert!(h
        .session
        .handle_notification(&json!({"orderData": "{\"id\":1}"}))
        .is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn teardown_closes_without_reconnecting() -> anyhow::Result<()> {
    let h = start(false);
    *h.routes.delay.lock().unwrap() = Duration::from_secs(10);
    h.session.update_location(origin());
    h.session.select_destination(destination());
    let _peer = next_peer(&h.transport).await?;
    settle().await;

    h.session.teardown().await;
    assert_eq!(*h.session.connection_state().borrow(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.transport.opens(), 1);
    // The in-flight route lookup finished after teardown and was dropped
    assert!(h.session.estimate().borrow().geometry.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn teardown_is_prompt_while_the_first_open_hangs() -> anyhow::Result<()> {
    let session = RideSession::start(SessionContext {
        transport: Arc::new(HangingTransport),
        reconnect_delay: Duration::from_secs(5),
        drivers: FakeDrivers::with(vec![]),
        routes: FakeRoutes::with(Ok(String::new())),
        places: Arc::new(FakePlaces { failing: false }),
        travel_modes: vec![TravelMode::Driving],
        user: UserInfo::default(),
    });
    session.update_location(origin());
    settle().await;
    assert_eq!(*session.connection_state().borrow(), ConnectionState::Connecting);

    tokio::time::timeout(Duration::from_secs(3), session.teardown()).await?;
    assert_eq!(*session.connection_state().borrow(), ConnectionState::Disconnected);
    Ok(())
}
