/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use dispatch_client::{
    common::types::*,
    domain::types::ride::RideEstimate,
    environment::load_config,
    session::RideSession,
    tools::{error::AppError, logger::*, prometheus::gather_metrics},
};
use std::str::FromStr;

fn parse_args() -> Result<(GeoPoint, GeoPoint), AppError> {
    let args = std::env::args().skip(1).collect::<Vec<String>>();
    match args.as_slice() {
        [origin, destination] => Ok((GeoPoint::from_str(origin)?, GeoPoint::from_str(destination)?)),
        _ => Err(AppError::InvalidRequest(
            "usage: dispatch-client <origin lat,lng> <destination lat,lng>".to_string(),
        )),
    }
}

fn cheapest(estimate: &RideEstimate, candidates: &[DriverProfile]) -> Option<DriverId> {
    estimate
        .fares
        .iter()
        .filter(|fare| candidates.iter().any(|driver| driver.id == fare.driver_id))
        .min_by(|a, b| a.fare.total_cmp(&b.fare))
        .map(|fare| fare.driver_id.to_owned())
        .or_else(|| candidates.first().map(|driver| driver.id.to_owned()))
}

async fn book_cheapest(session: &RideSession, push_token: Option<&str>) -> Result<(), AppError> {
    let estimate = session.estimate().borrow().to_owned();
    let candidates = session.visible_candidates();
    let Some(driver_id) = cheapest(&estimate, &candidates) else {
        return Ok(());
    };

    info!(
        tag = "[Estimate]",
        distance_km = estimate.distance_km,
        route_points = estimate.geometry.len(),
        eta = ?estimate.eta,
        travel_times = ?estimate.travel_times
    );

    let order = session.confirm(&driver_id).await?;
    let order_json = serde_json::to_string(&order)
        .map_err(|err| AppError::SerializationError(err.to_string()))?;
    info!(
        tag = "[Order Payload]",
        order = %order_json,
        payable = ?order.payable_amount(),
        focus = ?order.focus_point(),
        destination = ?order.destination_point()
    );

    if let Some(push_token) = push_token {
        let push = serde_json::to_string(&session.push_message(push_token, &order))
            .map_err(|err| AppError::SerializationError(err.to_string()))?;
        info!(tag = "[Driver Push Message]", push = %push);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn start_client() -> Result<(), AppError> {
    let (origin, destination) = parse_args()?;
    let app_config = load_config()?;
    let _guard = setup_tracing(&app_config.logger_cfg)?;

    let session = RideSession::start(app_config.build_context(UserInfo::default())?);
    info!(tag = "[Rider Session]", session_id = %session.session_id());
    session.update_location(origin);
    session.select_destination(destination);

    let mut candidates = session.candidates();
    let mut notices = session.notices();
    let mut booked = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Ok(notice) = notices.recv() => warn!(tag = "[Rider Notice]", notice = ?notice),
            Ok(()) = candidates.changed(), if !booked => {
                let count = candidates.borrow_and_update().len();
                info!(tag = "[Candidates]", count = count);
                if count > 0 {
                    match book_cheapest(&session, app_config.driver_push_token.as_deref()).await {
                        Ok(()) => booked = true,
                        Err(err) => error!(tag = "[Booking Failed]", error = %err),
                    }
                }
            }
        }
    }

    session.teardown().await;
    debug!(tag = "[Metrics]", metrics = %gather_metrics());
    Ok(())
}

fn main() {
    if let Err(err) = start_client() {
        println!("Dispatch client error [{}] : {}", err.code(), err.message());
        std::process::exit(1);
    }
}
