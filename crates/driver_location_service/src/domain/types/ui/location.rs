/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::common::types::*;
use serde::{Deserialize, Serialize};

/// A driver's timestamped position, as pushed by the driver app.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Payload {
    pub timestamp: TimeStamp,
    pub driver_id: DriverId,
    pub location: Point,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DefaultResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DriverResponse {
    pub success: bool,
    pub message: String,
    pub driver: DriverId,
}
