/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::{
    get,
    web::{Data, Json, Path, Query},
};

use crate::{
    common::types::*,
    domain::{action::internal::location, types::internal::location::*},
    environment::AppState,
    tools::error::AppError,
    tracker::TrackerStats,
};

#[get("/drivers/nearest")]
pub async fn find_nearest_drivers(
    data: Data<AppState>,
    param_obj: Query<NearestDriverRequest>,
) -> Result<Json<NearestDriverResponse>, AppError> {
    let request_body = param_obj.into_inner();

    Ok(Json(
        location::find_nearest_drivers(data, request_body).await?,
    ))
}

#[get("/internal/driver/{driverId}/location")]
pub async fn get_driver_location(
    data: Data<AppState>,
    path: Path<i64>,
) -> Result<Json<DriverLocationResponse>, AppError> {
    let driver_id = DriverId(path.into_inner());

    Ok(Json(location::get_driver_location(data, driver_id).await?))
}

#[get("/internal/stats")]
pub async fn get_tracker_stats(data: Data<AppState>) -> Result<Json<TrackerStats>, AppError> {
    Ok(Json(location::get_tracker_stats(data).await?))
}
