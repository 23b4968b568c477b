/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use serde::Serialize;

#[macros::add_error]
#[derive(Clone, PartialEq)]
pub enum AppError {
    InternalError(String),
    InvalidRequest(String),
    DecodeError(String),
    ParseError(String),
    NotConnectedError,
    RetrievalError(String),
    NotificationParseError(String),
    TransportError(String),
    ExternalAPICallError(String),
    SerializationError(String),
    DeserializationError(String),
    InvalidConfiguration(String),
}

impl AppError {
    pub fn message(&self) -> String {
        match self {
            AppError::InternalError(err) => err.to_string(),
            AppError::InvalidRequest(err) => err.to_string(),
            AppError::DecodeError(err) => format!("Malformed polyline : {err}"),
            AppError::ParseError(err) => format!("Unable to parse : {err}"),
            AppError::NotConnectedError => "Dispatch channel is not connected".to_string(),
            AppError::RetrievalError(err) => format!("Lookup failed : {err}"),
            AppError::NotificationParseError(err) => {
                format!("Malformed notification payload : {err}")
            }
            AppError::TransportError(err) => format!("Transport failure : {err}"),
            AppError::ExternalAPICallError(err) => err.to_string(),
            AppError::SerializationError(err) => err.to_string(),
            AppError::DeserializationError(err) => err.to_string(),
            AppError::InvalidConfiguration(err) => format!("Invalid configuration : {err}"),
        }
    }

    pub fn code(&self) -> String {
        match self {
            AppError::InternalError(_) => "INTERNAL_ERROR",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::DecodeError(_) => "DECODE_ERROR",
            AppError::ParseError(_) => "PARSE_ERROR",
            AppError::NotConnectedError => "NOT_CONNECTED",
            AppError::RetrievalError(_) => "RETRIEVAL_ERROR",
            AppError::NotificationParseError(_) => "NOTIFICATION_PARSE_ERROR",
            AppError::TransportError(_) => "TRANSPORT_ERROR",
            AppError::ExternalAPICallError(_) => "EXTERNAL_API_CALL_ERROR",
            AppError::SerializationError(_) => "SERIALIZATION_ERROR",
            AppError::DeserializationError(_) => "DESERIALIZATION_ERROR",
            AppError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
        }
        .to_string()
    }

    /// Collapses an outbound call failure into the lookup failure shown to the rider.
    pub fn into_retrieval(self) -> AppError {
        match self {
            AppError::RetrievalError(_) => self,
            other => AppError::RetrievalError(other.message()),
        }
    }
}
