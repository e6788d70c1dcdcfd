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
    domain::types::internal::location::*,
    environment::AppState,
    tools::error::AppError,
    tracker::TrackerStats,
};

#[macros::measure_duration]
pub async fn find_nearest_drivers(
    data: Data<AppState>,
    NearestDriverRequest { lat, lon, k }: NearestDriverRequest,
) -> Result<NearestDriverResponse, AppError> {
    let drivers = data.tracker.nearest(Point::new(lat, lon), k)?;

    let message = if drivers.is_empty() {
        "No drivers found nearby".to_string()
    } else {
        format!("Found {} nearby drivers", drivers.len())
    };

    Ok(NearestDriverResponse {
        success: true,
        message,
        drivers,
    })
}

pub async fn get_driver_location(
    data: Data<AppState>,
    driver_id: DriverId,
) -> Result<DriverLocationResponse, AppError> {
    let record = data.tracker.locate(driver_id)?;

    Ok(DriverLocationResponse {
        driver_id: record.driver_id,
        lat: record.location.lat,
        lon: record.location.lon,
        timestamp: record.last_update,
        cell: record.cell,
    })
}

pub async fn get_tracker_stats(data: Data<AppState>) -> Result<TrackerStats, AppError> {
    Ok(data.tracker.stats())
}
