/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use serde::{Deserialize, Serialize};

use crate::{common::types::*, tracker::geocell::CellKey};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NearestDriverRequest {
    pub lat: f64,
    pub lon: f64,
    pub k: Option<usize>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NearestDriverResponse {
    pub success: bool,
    pub message: String,
    pub drivers: Vec<DriverId>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationResponse {
    pub driver_id: DriverId,
    pub lat: Latitude,
    pub lon: Longitude,
    pub timestamp: TimeStamp,
    pub cell: CellKey,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ResponseData {
    pub result: String,
}
