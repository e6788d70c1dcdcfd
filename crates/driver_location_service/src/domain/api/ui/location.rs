/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::{
    get, post,
    web::{Data, Json, Path},
};

use crate::{
    common::types::*,
    domain::{action::ui::location, types::ui::location::*},
    environment::AppState,
    tools::error::AppError,
};

#[post("/driver/location")]
pub async fn update_driver_location(
    data: Data<AppState>,
    param_obj: Json<Payload>,
) -> Result<Json<DefaultResponse>, AppError> {
    let request_body = param_obj.into_inner();

    Ok(Json(
        location::update_driver_location(data, request_body).await?,
    ))
}

#[get("/driver/{driverId}")]
pub async fn locate_driver(
    data: Data<AppState>,
    path: Path<i64>,
) -> Result<Json<DriverResponse>, AppError> {
    let driver_id = DriverId(path.into_inner());

    Ok(Json(location::locate_driver(data, driver_id).await?))
}
