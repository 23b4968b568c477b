/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::support::{settle, wait_until, MemoryTransport};
use dispatch_client::common::types::ConnectionState;
use dispatch_client::dispatch::connection::ConnectionManager;
use dispatch_client::tools::error::AppError;
use serde_json::json;
use std::time::Duration;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[tokio::test(start_paused = true)]
async fn connect_opens_once_and_is_idempotent() -> anyhow::Result<()> {
    let transport = MemoryTransport::new();
    let manager = ConnectionManager::new(transport.clone(), RECONNECT_DELAY);
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    manager.connect().await;
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(transport.opens(), 1);

    manager.connect().await;
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(transport.opens(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn injected_close_schedules_exactly_one_reconnect() -> anyhow::Result<()> {
    let transport = MemoryTransport::new();
    let manager = ConnectionManager::new(transport.clone(), RECONNECT_DELAY);
    let mut state = manager.subscribe_state();

    manager.connect().await;
    let mut peer = transport.take_peer().expect("link opened");
    peer.hang_up();

    wait_until(&mut state, |s| *s == ConnectionState::Disconnected).await?;
    settle().await;
    assert_eq!(manager.reconnect_attempts(), 1);
    assert!(manager.reconnect_pending().await);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(transport.opens(), 1);
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    wait_until(&mut state, |s| *s == ConnectionState::Connected).await?;
    assert_eq!(transport.opens(), 2);
    assert_eq!(manager.reconnect_attempts(), 1);
    assert!(!manager.reconnect_pending().await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_opens_retry_without_stacking_timers() -> anyhow::Result<()> {
    let transport = MemoryTransport::new();
    transport.set_failing(true);
    let manager = ConnectionManager::new(transport.clone(), RECONNECT_DELAY);

    manager.connect().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.reconnect_attempts(), 1);

    // An explicit connect while a retry is pending replaces the timer
    manager.connect().await;
    assert_eq!(transport.opens(), 2);
    assert_eq!(manager.reconnect_attempts(), 2);

    tokio::time::sleep(RECONNECT_DELAY + Duration::from_millis(10)).await;
    settle().await;
    assert_eq!(transport.opens(), 3);
    assert_eq!(manager.reconnect_attempts(), 3);

    transport.set_failing(false);
    let mut state = manager.subscribe_state();
    wait_until(&mut state, |s| *s == ConnectionState::Connected).await?;
    assert_eq!(transport.opens(), 4);
    assert!(!manager.reconnect_pending().await);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn close_cancels_reconnect() -> anyhow::Result<()> {
    let transport = MemoryTransport::new();
    let manager = ConnectionManager::new(transport.clone(), RECONNECT_DELAY);
    let mut state = manager.subscribe_state();

    manager.connect().await;
    let mut peer = transport.take_peer().expect("link opened");
    peer.hang_up();
    wait_until(&mut state, |s| *s == ConnectionState::Disconnected).await?;
    settle().await;
    assert!(manager.reconnect_pending().await);

    manager.close().await;
    assert!(!manager.reconnect_pending().await);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.opens(), 1);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn close_while_connected_does_not_reconnect() -> anyhow::Result<()> {
    let transport = MemoryTransport::new();
    let manager = ConnectionManager::new(transport.clone(), RECONNECT_DELAY);

    manager.connect().await;
    let _peer = transport.take_peer().expect("link opened");
    manager.close().await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.reconnect_attempts(), 0);
    assert_eq!(transport.opens(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn send_requires_a_connection() -> anyhow::Result<()> {
    let transport = MemoryTransport::new();
    let manager = ConnectionManager::new(transport.clone(), RECONNECT_DELAY);

    let refused = manager.send(&json!({"type": "ping"})).await;
    assert_eq!(refused, Err(AppError::NotConnectedError));
    assert_eq!(refused.map_err(|err| err.code()), Err("NOT_CONNECTED".to_string()));

    manager.connect().await;
    let mut peer = transport.take_peer().expect("link opened");
    manager.send(&json!({"type": "ping"})).await?;
    assert_eq!(peer.sent(), vec![r#"{"type":"ping"}"#.to_string()]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn inbound_frames_reach_the_latest_subscriber_only() -> anyhow::Result<()> {
    let transport = MemoryTransport::new();
    let manager = ConnectionManager::new(transport.clone(), RECONNECT_DELAY);
    manager.connect().await;
    let peer = transport.take_peer().expect("link opened");

    let mut first = manager.subscribe_messages();
    let mut second = manager.subscribe_messages();
    assert!(first.recv().await.is_none());

    peer.push(r#"{"type":"nearbyDrivers","drivers":[]}"#);
    assert_eq!(
        second.recv().await.as_deref(),
        Some(r#"{"type":"nearbyDrivers","drivers":[]}"#)
    );
    Ok(())
}
