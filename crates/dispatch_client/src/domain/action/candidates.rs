/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::common::{types::*, utils::distance_km};
use crate::domain::types::ride::ResolveOutcome;
use crate::outbound::external::DriverProfileProvider;
use crate::tools::error::AppError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct ResolverState {
    last_applied: RequestToken,
    shut_down: bool,
}

/// Turns candidate identifiers into driver profiles.
///
/// The candidate set is only ever replaced as a whole. Every lookup takes a
/// token from a monotonic counter and only the answer of the latest issued
/// lookup is applied.
pub struct CandidateResolver {
    provider: Arc<dyn DriverProfileProvider>,
    issued: AtomicU64,
    state: Mutex<ResolverState>,
    candidates_tx: watch::Sender<Vec<DriverProfile>>,
}

impl CandidateResolver {
    pub fn new(provider: Arc<dyn DriverProfileProvider>) -> Self {
        let (candidates_tx, _) = watch::channel(Vec::new());
        Self {
            provider,
            issued: AtomicU64::new(0),
            state: Mutex::new(ResolverState {
                last_applied: RequestToken(0),
                shut_down: false,
            }),
            candidates_tx,
        }
    }

    pub fn candidates(&self) -> Vec<DriverProfile> {
        self.candidates_tx.borrow().to_owned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<DriverProfile>> {
        self.candidates_tx.subscribe()
    }

    /// Looks up `refs` in one batched call and replaces the candidate set.
    ///
    /// On failure the previous set stays in place and a `RetrievalError` is
    /// returned, unless a newer lookup was issued meanwhile, in which case the
    /// failure is as stale as a late success would have been.
    pub async fn resolve(&self, refs: &[DriverCandidateRef]) -> Result<ResolveOutcome, AppError> {
        self.resolve_as(self.next_token(), refs).await
    }

    /// Reserves the token of a lookup that will be started later, so that
    /// lookups spawned onto separate tasks keep the order they were issued in.
    pub fn next_token(&self) -> RequestToken {
        RequestToken(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub async fn resolve_as(
        &self,
        token: RequestToken,
        refs: &[DriverCandidateRef],
    ) -> Result<ResolveOutcome, AppError> {
        if refs.is_empty() {
            return self.apply(token, Vec::new());
        }

        let ids = refs.iter().map(|r| r.id.to_owned()).collect::<Vec<DriverId>>();
        debug!(tag = "[Resolving Candidates]", token = token.inner(), count = ids.len());

        match self.provider.drivers_by_ids(&ids).await {
            Ok(profiles) => self.apply(token, profiles),
            Err(err) => {
                if self.is_superseded(token)? {
                    return Ok(ResolveOutcome::Stale { token });
                }
                warn!(tag = "[Candidate Lookup Failed]", token = token.inner(), error = %err);
                Err(err.into_retrieval())
            }
        }
    }

    fn is_superseded(&self, token: RequestToken) -> Result<bool, AppError> {
        let state = self
            .state
            .lock()
            .map_err(|err| AppError::InternalError(err.to_string()))?;
        Ok(state.shut_down || self.is_outdated(token, &state))
    }

    fn is_outdated(&self, token: RequestToken, state: &ResolverState) -> bool {
        token <= state.last_applied || token.inner() < self.issued.load(Ordering::SeqCst)
    }

    fn apply(
        &self,
        token: RequestToken,
        profiles: Vec<DriverProfile>,
    ) -> Result<ResolveOutcome, AppError> {
        let mut state = self
            .state
            .lock()
            .map_err(|err| AppError::InternalError(err.to_string()))?;

        if state.shut_down || self.is_outdated(token, &state) {
            debug!(
                tag = "[Stale Candidates Discarded]",
                token = token.inner(),
                last_applied = state.last_applied.inner()
            );
            return Ok(ResolveOutcome::Stale { token });
        }

        state.last_applied = token;
        info!(tag = "[Candidates Replaced]", token = token.inner(), count = profiles.len());
        self.candidates_tx.send_replace(profiles.to_owned());
        Ok(ResolveOutcome::Applied(profiles))
    }

    pub fn filter_by_vehicle(&self, vehicle_type: &VehicleType) -> Vec<DriverProfile> {
        self.candidates_tx
            .borrow()
            .iter()
            .filter(|profile| &profile.vehicle_type == vehicle_type)
            .cloned()
            .collect()
    }

    /// Candidates ordered by straight line distance from `point`, nearest first.
    pub fn nearest_to(&self, point: &GeoPoint) -> Vec<DriverProfile> {
        let mut ranked = self
            .candidates_tx
            .borrow()
            .iter()
            .map(|profile| (distance_km(point, &profile.current_location), profile.to_owned()))
            .collect::<Vec<_>>();
        ranked.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        ranked.into_iter().map(|(_, profile)| profile).collect()
    }

    /// Lookups still in flight complete, but their answers are dropped.
    pub fn shutdown(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.shut_down = true;
        }
    }
}
