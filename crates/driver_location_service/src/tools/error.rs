/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use actix_web::{
    http::{header::ContentType, StatusCode},
    HttpResponse, ResponseError,
};
use serde::{Deserialize, Serialize};

use crate::common::types::{DriverId, TimeStamp};

/// Failure body, shaped like the success responses so clients can always read `success`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub error_code: String,
}

#[macros::add_error]
#[derive(PartialEq)]
pub enum AppError {
    InternalError(String),
    InvalidRequest(String),
    UnprocessibleRequest(String),
    LargePayloadSize(usize, usize),
    RequestTimeout,
    InvalidConfiguration(String),
    InvalidPayload(String),
    StaleUpdate(DriverId, TimeStamp, TimeStamp),
    UnknownDriver(DriverId),
}

impl AppError {
    fn error_message(&self) -> ErrorBody {
        ErrorBody {
            success: false,
            message: self.message(),
            error_code: self.code(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::InternalError(err) => err.to_string(),
            AppError::InvalidRequest(err) => err.to_string(),
            AppError::UnprocessibleRequest(err) => err.to_string(),
            AppError::InvalidConfiguration(err) => format!("Invalid configuration : {err}"),
            AppError::InvalidPayload(err) => format!("Invalid payload : {err}"),
            AppError::LargePayloadSize(length, limit) => {
                format!("Content length ({length} Bytes) greater than allowed maximum limit : ({limit} Bytes)")
            }
            AppError::RequestTimeout => "Request timed out".to_string(),
            AppError::StaleUpdate(driver_id, TimeStamp(stored), TimeStamp(received)) => {
                format!("Stale location update ignored : DriverId - {driver_id}, Stored Timestamp - {stored}, Received Timestamp - {received}")
            }
            AppError::UnknownDriver(driver_id) => {
                format!("Driver not found : DriverId - {driver_id}")
            }
        }
    }

    pub fn code(&self) -> String {
        match self {
            AppError::InternalError(_) => "INTERNAL_ERROR",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::UnprocessibleRequest(_) => "UNPROCESSIBLE_REQUEST",
            AppError::LargePayloadSize(_, _) => "LARGE_PAYLOAD_SIZE",
            AppError::RequestTimeout => "REQUEST_TIMEOUT",
            AppError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            AppError::InvalidPayload(_) => "INVALID_PAYLOAD",
            AppError::StaleUpdate(_, _, _) => "STALE_UPDATE",
            AppError::UnknownDriver(_) => "UNKNOWN_DRIVER",
        }
        .to_string()
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(self.error_message())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UnprocessibleRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::LargePayloadSize(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            AppError::StaleUpdate(_, _, _) => StatusCode::CONFLICT,
            AppError::UnknownDriver(_) => StatusCode::NOT_FOUND,
        }
    }
}
