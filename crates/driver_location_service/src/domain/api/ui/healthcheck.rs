/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::{
    get,
    web::{Data, Json},
};

use crate::{
    domain::types::internal::location::ResponseData, environment::AppState,
    tools::error::AppError,
};

#[get("/healthcheck")]
pub async fn health_check(data: Data<AppState>) -> Result<Json<ResponseData>, AppError> {
    let stats = data.tracker.stats();

    Ok(Json(ResponseData {
        result: format!("Service Is Up, tracking {} drivers", stats.live_drivers),
    }))
}
