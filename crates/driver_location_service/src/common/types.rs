/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct DriverId(pub i64);

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Latitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Longitude(pub f64);

/// Unix epoch seconds, as sent by the driver app.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Hash, Ord)]
pub struct TimeStamp(pub i64);

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Point {
    pub lat: Latitude,
    pub lon: Longitude,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Point {
            lat: Latitude(lat),
            lon: Longitude(lon),
        }
    }
}

#[derive(
    Debug, Clone, Copy, EnumString, Display, Serialize, Deserialize, Eq, Hash, PartialEq, Default,
)]
pub enum DistanceMetric {
    #[default]
    #[strum(serialize = "GREAT_CIRCLE")]
    #[serde(rename = "GREAT_CIRCLE")]
    GreatCircle,
    #[strum(serialize = "PLANAR")]
    #[serde(rename = "PLANAR")]
    Planar,
}

/// A driver together with its distance (in meters) from a query point.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NearbyDriver {
    pub driver_id: DriverId,
    pub distance: f64,
}
