/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::common::types::*;
use crate::dispatch::transport::TcpTransport;
use crate::outbound::external::BackendClient;
use crate::session::SessionContext;
use crate::tools::error::AppError;
use crate::tools::logger::LoggerConfig;
use reqwest::Url;
use serde::Deserialize;
use std::env::var;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "./dhall_config/dispatch_client.dhall";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub logger_cfg: LoggerConfig,
    pub dispatch_host: String,
    pub dispatch_port: u16,
    pub reconnect_delay: u64,
    pub server_uri: String,
    pub request_timeout: u64,
    pub travel_modes: Vec<TravelMode>,
    pub driver_push_token: Option<String>,
}

pub fn read_dhall_config(config_path: &str) -> Result<AppConfig, AppError> {
    serde_dhall::from_file(config_path)
        .parse::<AppConfig>()
        .map_err(|err| AppError::InvalidConfiguration(format!("Error reading config: {err}")))
}

/// Reads the file named by `DHALL_CONFIG`, or the default path.
pub fn load_config() -> Result<AppConfig, AppError> {
    let config_path = var("DHALL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    read_dhall_config(&config_path)
}

impl AppConfig {
    pub fn server_url(&self) -> Result<Url, AppError> {
        let url = Url::parse(self.server_uri.as_str()).map_err(|err| {
            AppError::InvalidConfiguration(format!("server_uri {} : {err}", self.server_uri))
        })?;
        if url.cannot_be_a_base() {
            return Err(AppError::InvalidConfiguration(format!(
                "server_uri {} is not a base url",
                self.server_uri
            )));
        }
        Ok(url)
    }

    /// Production wiring: TCP dispatch channel, every collaborator behind the proxy backend.
    pub fn build_context(&self, user: UserInfo) -> Result<SessionContext, AppError> {
        if self.dispatch_host.trim().is_empty() {
            return Err(AppError::InvalidConfiguration(
                "dispatch_host is empty".to_string(),
            ));
        }

        let backend = Arc::new(BackendClient::new(
            self.server_url()?,
            Duration::from_secs(self.request_timeout),
        ));

        Ok(SessionContext {
            transport: Arc::new(TcpTransport::new(&self.dispatch_host, self.dispatch_port)),
            reconnect_delay: Duration::from_secs(self.reconnect_delay),
            drivers: backend.clone(),
            routes: backend.clone(),
            places: backend,
            travel_modes: self.travel_modes.to_owned(),
            user,
        })
    }
}
