/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::types::*;
use crate::tools::error::AppError;
use chrono::Utc;
use std::f64::consts::PI;

/// Radius of Earth in meters
pub const EARTH_RADIUS_IN_METERS: f64 = 6371000.0;

pub fn deg2rad(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

pub fn current_timestamp() -> TimeStamp {
    TimeStamp(Utc::now().timestamp())
}

/// Shortest signed longitude difference in degrees, in [-180, 180].
pub fn wrapped_lon_delta(Longitude(from): Longitude, Longitude(to): Longitude) -> f64 {
    let delta = (to - from).rem_euclid(360.0);
    if delta > 180.0 {
        delta - 360.0
    } else {
        delta
    }
}

pub fn distance_between_in_meters(latlong1: &Point, latlong2: &Point) -> f64 {
    // Calculating using haversine formula
    let Latitude(lat1) = latlong1.lat;
    let Latitude(lat2) = latlong2.lat;

    let dlat = deg2rad(lat2 - lat1);
    let dlon = deg2rad(wrapped_lon_delta(latlong1.lon, latlong2.lon));

    let rlat1 = deg2rad(lat1);
    let rlat2 = deg2rad(lat2);

    let sq = |x: f64| x * x;

    let h = sq((dlat / 2.0).sin()) + rlat1.cos() * rlat2.cos() * sq((dlon / 2.0).sin());

    // Rounding can push h marginally past 1 for antipodal points
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_IN_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Equirectangular projection centered on `origin`'s latitude.
pub fn planar_distance_in_meters(origin: &Point, target: &Point) -> f64 {
    let Latitude(lat1) = origin.lat;
    let Latitude(lat2) = target.lat;

    let x = deg2rad(wrapped_lon_delta(origin.lon, target.lon)) * deg2rad(lat1).cos();
    let y = deg2rad(lat2 - lat1);

    EARTH_RADIUS_IN_METERS * (x * x + y * y).sqrt()
}

pub fn distance_in_meters(metric: DistanceMetric, origin: &Point, target: &Point) -> f64 {
    match metric {
        DistanceMetric::GreatCircle => distance_between_in_meters(origin, target),
        DistanceMetric::Planar => planar_distance_in_meters(origin, target),
    }
}

pub fn validate_point(point: &Point) -> Result<(), AppError> {
    let Latitude(lat) = point.lat;
    let Longitude(lon) = point.lon;

    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::InvalidPayload(format!(
            "Latitude must be within [-90, 90], got {lat}"
        )));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(AppError::InvalidPayload(format!(
            "Longitude must be within [-180, 180], got {lon}"
        )));
    }
    Ok(())
}

pub fn validate_driver_id(driver_id: &DriverId) -> Result<(), AppError> {
    if driver_id.0 <= 0 {
        return Err(AppError::InvalidPayload(format!(
            "Driver id must be positive, got {driver_id}"
        )));
    }
    Ok(())
}

pub fn validate_timestamp(TimeStamp(ts): &TimeStamp) -> Result<(), AppError> {
    if *ts < 0 {
        return Err(AppError::InvalidPayload(format!(
            "Timestamp must be non-negative epoch seconds, got {ts}"
        )));
    }
    Ok(())
}

/// Rejects timestamps more than `max_clock_skew` seconds ahead of `now`.
pub fn validate_not_in_future(
    TimeStamp(ts): &TimeStamp,
    TimeStamp(now): &TimeStamp,
    max_clock_skew: u64,
) -> Result<(), AppError> {
    let ahead = ts.saturating_sub(*now);
    if ahead > 0 && ahead as u64 > max_clock_skew {
        return Err(AppError::InvalidPayload(format!(
            "Timestamp {ts} is {ahead}s ahead of server time (allowed skew {max_clock_skew}s)"
        )));
    }
    Ok(())
}

/// A location is stale once its age strictly exceeds the threshold.
pub fn is_stale(TimeStamp(last_update): TimeStamp, TimeStamp(now): TimeStamp, threshold: u64) -> bool {
    let age = now.saturating_sub(last_update);
    age > 0 && age as u64 > threshold
}
