/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::web::Data;

use crate::{
    common::types::*,
    domain::types::ui::location::*,
    environment::AppState,
    tools::{error::AppError, logger::*},
};

pub async fn update_driver_location(
    data: Data<AppState>,
    Payload {
        timestamp,
        driver_id,
        location,
    }: Payload,
) -> Result<DefaultResponse, AppError> {
    match data.tracker.ingest(driver_id, location, timestamp) {
        Ok(_) => Ok(DefaultResponse {
            success: true,
            message: "Location updated".to_string(),
        }),
        // Out of order pings are expected from flaky networks, not a client error
        Err(err @ AppError::StaleUpdate(..)) => Ok(DefaultResponse {
            success: false,
            message: err.message(),
        }),
        Err(err) => {
            warn!(tag = "[Location Update Rejected]", driver_id = %driver_id, error = %err.message());
            Err(err)
        }
    }
}

pub async fn locate_driver(
    data: Data<AppState>,
    driver_id: DriverId,
) -> Result<DriverResponse, AppError> {
    match data.tracker.locate(driver_id) {
        Ok(record) => Ok(DriverResponse {
            success: true,
            message: "Driver found".to_string(),
            driver: record.driver_id,
        }),
        Err(err @ AppError::UnknownDriver(_)) => Ok(DriverResponse {
            success: false,
            message: err.message(),
            driver: driver_id,
        }),
        Err(err) => Err(err),
    }
}
