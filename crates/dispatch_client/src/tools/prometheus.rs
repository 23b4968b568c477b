/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use prometheus::{
    opts, register_histogram_vec, register_int_counter, Encoder, HistogramVec, IntCounter,
    TextEncoder,
};

pub static CALL_EXTERNAL_API: once_cell::sync::Lazy<HistogramVec> =
    once_cell::sync::Lazy::new(|| {
        register_histogram_vec!(
            opts!("external_request_duration", "External API requests").into(),
            &["method", "host", "service", "status", "version"]
        )
        .expect("Failed to register external API metrics")
    });

pub static DISPATCH_RECONNECTS: once_cell::sync::Lazy<IntCounter> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter!("dispatch_reconnects", "Dispatch channel reconnects scheduled")
            .expect("Failed to register dispatch reconnect metrics")
    });

pub static DISPATCH_MESSAGES_DROPPED: once_cell::sync::Lazy<IntCounter> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter!(
            "dispatch_messages_dropped",
            "Inbound dispatch frames dropped as malformed"
        )
        .expect("Failed to register dropped message metrics")
    });

/// Observes the latency of one outbound collaborator call.
///
/// * `$method` - HTTP method of the request.
/// * `$host` - scheme, host and port of the target.
/// * `$service` - path of the target.
/// * `$status` - response status, or `UNKNOWN` when no response arrived.
/// * `$start` - `Instant` taken right before the call.
#[macro_export]
macro_rules! call_external_api {
    ($method:expr, $host:expr, $service:expr, $status:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        let version = std::env::var("DEPLOYMENT_VERSION").unwrap_or("DEV".to_string());
        $crate::tools::prometheus::CALL_EXTERNAL_API
            .with_label_values(&[$method, $host, $service, $status, version.as_str()])
            .observe(duration);
    };
}

/// Renders every registered metric in the prometheus text format.
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder
        .encode(&prometheus::gather(), &mut buffer)
        .is_err()
    {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
