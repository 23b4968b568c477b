/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

//! Lifecycle of the single dispatch channel of a client session.
//!
//! `Disconnected -> Connecting -> Connected -> Disconnected -> (after the reconnect
//! delay) Connecting -> ...` for as long as the session lives. Every opened link gets
//! an epoch; events raised by a link whose epoch is no longer current are ignored, so
//! a late close from a dead socket never tears down its replacement.

use crate::common::types::ConnectionState;
use crate::dispatch::transport::{FrameSink, FrameStream, Link, Transport};
use crate::tools::error::AppError;
use crate::tools::prometheus::DISPATCH_RECONNECTS;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct Shared {
    epoch: u64,
    closed: bool,
    sink: Option<Box<dyn FrameSink>>,
    reader: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    reconnect_delay: Duration,
    state_tx: watch::Sender<ConnectionState>,
    shared: Mutex<Shared>,
    inbound: std::sync::Mutex<Option<mpsc::UnboundedSender<String>>>,
    reconnect_attempts: AtomicU64,
}

/// Exclusive owner of the dispatch connection. Cloning shares the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, reconnect_delay: Duration) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                transport,
                reconnect_delay,
                state_tx,
                shared: Mutex::new(Shared {
                    epoch: 0,
                    closed: false,
                    sink: None,
                    reader: None,
                    reconnect_timer: None,
                }),
                inbound: std::sync::Mutex::new(None),
                reconnect_attempts: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Routes every inbound frame to the returned receiver.
    ///
    /// There is one message subscriber per connection manager: subscribing again
    /// replaces the previous one, whose receiver then ends.
    pub fn subscribe_messages(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut inbound) = self.inner.inbound.lock() {
            *inbound = Some(tx);
        }
        rx
    }

    /// Number of reconnect attempts scheduled since creation.
    pub fn reconnect_attempts(&self) -> u64 {
        self.inner.reconnect_attempts.load(Ordering::SeqCst)
    }

    pub async fn reconnect_pending(&self) -> bool {
        self.inner.shared.lock().await.reconnect_timer.is_some()
    }

    /// Opens the channel unless it is already open or opening.
    pub async fn connect(&self) {
        let epoch = {
            let mut shared = self.inner.shared.lock().await;
            if self.state() != ConnectionState::Disconnected {
                debug!(tag = "[Dispatch Connect Skipped]", state = %self.state());
                return;
            }
            if let Some(timer) = shared.reconnect_timer.take() {
                timer.abort();
            }
            shared.closed = false;
            shared.epoch += 1;
            self.inner.state_tx.send_replace(ConnectionState::Connecting);
            shared.epoch
        };

        info!(tag = "[Dispatch Connecting]", epoch = epoch);

        match self.inner.transport.open().await {
            Ok(link) => self.on_open(epoch, link).await,
            Err(err) => {
                warn!(tag = "[Dispatch Connect Failed]", epoch = epoch, error = %err);
                self.on_link_lost(epoch, false).await;
            }
        }
    }

    async fn on_open(&self, epoch: u64, link: Link) {
        let Link { mut sink, stream } = link;
        let mut shared = self.inner.shared.lock().await;

        if shared.closed || shared.epoch != epoch {
            drop(shared);
            debug!(tag = "[Dispatch Link Discarded]", epoch = epoch);
            sink.close().await;
            return;
        }

        shared.sink = Some(sink);
        shared.reader = Some(self.spawn_reader(epoch, stream));
        self.inner.state_tx.send_replace(ConnectionState::Connected);
        info!(tag = "[Dispatch Connected]", epoch = epoch);
    }

    fn spawn_reader(&self, epoch: u64, mut stream: Box<dyn FrameStream>) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next_frame().await {
                match frame {
                    Ok(frame) => manager.forward(frame),
                    Err(err) => {
                        error!(tag = "[Dispatch Read Error]", epoch = epoch, error = %err);
                        break;
                    }
                }
            }
            info!(tag = "[Dispatch Closed By Peer]", epoch = epoch);
            manager.on_link_lost(epoch, true).await;
        })
    }

    fn forward(&self, frame: String) {
        let Ok(mut inbound) = self.inner.inbound.lock() else {
            return;
        };
        if let Some(tx) = inbound.as_ref() {
            if tx.send(frame).is_err() {
                *inbound = None;
            }
        }
    }

    /// Handles a failed open, a failed write or the end of the inbound stream.
    async fn on_link_lost(&self, epoch: u64, from_reader: bool) {
        let mut shared = self.inner.shared.lock().await;
        if shared.closed || shared.epoch != epoch {
            return;
        }

        shared.epoch += 1;
        let sink = shared.sink.take();
        if let Some(reader) = shared.reader.take() {
            if !from_reader {
                reader.abort();
            }
        }
        self.inner
            .state_tx
            .send_replace(ConnectionState::Disconnected);
        self.schedule_reconnect(&mut shared);
        drop(shared);

        if let Some(mut sink) = sink {
            sink.close().await;
        }
    }

    fn schedule_reconnect(&self, shared: &mut Shared) {
        if shared.reconnect_timer.is_some() {
            return;
        }

        self.inner.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
        DISPATCH_RECONNECTS.inc();
        info!(
            tag = "[Dispatch Reconnect Scheduled]",
            delay = format!("{:?}", self.inner.reconnect_delay)
        );

        let manager = self.clone();
        let delay = self.inner.reconnect_delay;
        shared.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.fire_reconnect().await;
        }));
    }

    async fn fire_reconnect(&self) {
        {
            let mut shared = self.inner.shared.lock().await;
            // This task is the timer; dropping its handle only detaches it.
            shared.reconnect_timer = None;
            if shared.closed {
                return;
            }
        }
        self.connect().await;
    }

    /// Serializes `message` and writes it as one frame.
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<(), AppError> {
        let frame = serde_json::to_string(message)
            .map_err(|err| AppError::SerializationError(err.to_string()))?;

        let mut shared = self.inner.shared.lock().await;
        if self.state() != ConnectionState::Connected {
            return Err(AppError::NotConnectedError);
        }
        let epoch = shared.epoch;
        let result = match shared.sink.as_mut() {
            Some(sink) => sink.send_frame(frame).await,
            None => return Err(AppError::NotConnectedError),
        };
        drop(shared);

        if let Err(err) = &result {
            error!(tag = "[Dispatch Write Error]", epoch = epoch, error = %err);
            self.on_link_lost(epoch, false).await;
        }
        result
    }

    /// Tears the channel down for good: no reconnect is attempted afterwards and
    /// the message subscriber is released.
    pub async fn close(&self) {
        let mut shared = self.inner.shared.lock().await;
        shared.closed = true;
        shared.epoch += 1;
        if let Some(timer) = shared.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(reader) = shared.reader.take() {
            reader.abort();
        }
        let sink = shared.sink.take();
        self.inner
            .state_tx
            .send_replace(ConnectionState::Disconnected);
        drop(shared);

        if let Ok(mut inbound) = self.inner.inbound.lock() {
            *inbound = None;
        }
        if let Some(mut sink) = sink {
            sink.close().await;
        }
        info!(tag = "[Dispatch Closed]");
    }
}
