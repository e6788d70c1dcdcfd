/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
//! Exact k-nearest-driver search by expanding rings of cells around the query.

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    geocell::{CellGrid, CellKey},
    LocationTracker,
};
use crate::{
    common::{types::*, utils::*},
    tools::{error::AppError, prometheus::NEAREST_QUERY_CANDIDATES},
};

#[derive(Default)]
struct Candidates {
    distances: FxHashMap<DriverId, f64>,
    seen: FxHashSet<DriverId>,
}

impl Candidates {
    fn kth_distance(&self, k: usize) -> Option<f64> {
        if k == 0 || self.distances.len() < k {
            return None;
        }
        let mut distances: Vec<f64> = self.distances.values().copied().collect();
        let (_, kth, _) = distances.select_nth_unstable_by(k - 1, |a, b| a.total_cmp(b));
        Some(*kth)
    }

    fn into_sorted(self, k: usize) -> Vec<NearbyDriver> {
        let mut drivers: Vec<NearbyDriver> = self
            .distances
            .into_iter()
            .map(|(driver_id, distance)| NearbyDriver {
                driver_id,
                distance,
            })
            .collect();
        drivers.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.driver_id.cmp(&b.driver_id))
        });
        drivers.truncate(k);
        drivers
    }
}

/// Smallest distance, in meters, from `query` to any point outside the square of
/// radius `ring` around `center`. Infinite when the square spans the whole grid.
pub fn outside_lower_bound(
    grid: &CellGrid,
    metric: DistanceMetric,
    query: &Point,
    center: CellKey,
    ring: u32,
) -> f64 {
    let Latitude(lat) = query.lat;
    let Longitude(lon) = query.lon;

    let bottom_row = center.row.saturating_sub(ring);
    let top_row = center.row.saturating_add(ring).min(grid.rows() - 1);

    let south_gap = if bottom_row == 0 {
        f64::INFINITY
    } else {
        lat - grid.lat_bounds(bottom_row).0
    };
    let north_gap = if top_row == grid.rows() - 1 {
        f64::INFINITY
    } else {
        grid.lat_bounds(top_row).1 - lat
    };
    let lat_gap = south_gap.min(north_gap).max(0.0);

    let lon_gap = if 2 * ring as u64 + 1 >= grid.cols() as u64 {
        f64::INFINITY
    } else {
        let (west_edge, east_edge) = grid.lon_bounds(center.col);
        let mut east_gap = east_edge - lon;
        let mut west_gap = lon - west_edge;
        for step in 1..=ring as i64 {
            east_gap += grid.col_width(grid.wrap_col(center.col as i64 + step));
            west_gap += grid.col_width(grid.wrap_col(center.col as i64 - step));
        }
        east_gap.min(west_gap).clamp(0.0, 180.0)
    };

    let lat_bound = EARTH_RADIUS_IN_METERS * deg2rad(lat_gap);

    let lon_bound = if lon_gap.is_infinite() {
        f64::INFINITY
    } else {
        match metric {
            DistanceMetric::Planar => {
                EARTH_RADIUS_IN_METERS * deg2rad(lat).cos() * deg2rad(lon_gap)
            }
            DistanceMetric::GreatCircle => {
                // Points beside the square lie within its rows, so their latitude is
                // at most the square's extreme latitude.
                let max_abs_lat = grid
                    .lat_bounds(bottom_row)
                    .0
                    .abs()
                    .max(grid.lat_bounds(top_row).1.abs());
                let scale = (deg2rad(lat).cos() * deg2rad(max_abs_lat).cos()).max(0.0);
                let h = (scale.sqrt() * (deg2rad(lon_gap) / 2.0).sin()).clamp(0.0, 1.0);
                2.0 * EARTH_RADIUS_IN_METERS * h.asin()
            }
        }
    };

    lat_bound.min(lon_bound)
}

impl LocationTracker {
    /// Ids of the (at most) `k` closest live drivers, nearest first.
    pub fn nearest(&self, location: Point, k: Option<usize>) -> Result<Vec<DriverId>, AppError> {
        Ok(self
            .nearest_at(location, k, current_timestamp())?
            .into_iter()
            .map(|driver| driver.driver_id)
            .collect())
    }

    /// Expanding-ring search evaluated with `now` as the staleness reference.
    ///
    /// Ties in distance are broken by ascending driver id. An empty result is a
    /// success, not an error.
    #[macros::measure_duration]
    pub fn nearest_at(
        &self,
        location: Point,
        k: Option<usize>,
        now: TimeStamp,
    ) -> Result<Vec<NearbyDriver>, AppError> {
        validate_point(&location)?;

        let k = self.config.effective_k(k);
        if k == 0 || self.registry.is_empty() {
            return Ok(Vec::new());
        }

        let grid = self.index.grid();
        let center = grid.cell_of(&location);
        let live_drivers = self.registry.len();

        let mut candidates = Candidates::default();
        let mut visited_cells = 0;
        let mut ring = 0;

        loop {
            let cells = self.index.neighbors_of(center, ring);

            if ring > 0 && visited_cells + cells.len() > self.index.cell_count() {
                // Fewer cells exist than the next ring would visit
                for cell in self.index.cell_keys() {
                    self.collect_cell(&cell, &location, now, &mut candidates);
                }
                break;
            }

            for cell in &cells {
                self.collect_cell(cell, &location, now, &mut candidates);
            }
            visited_cells += cells.len();

            if let Some(kth) = candidates.kth_distance(k) {
                let bound = outside_lower_bound(
                    grid,
                    self.config.distance_metric,
                    &location,
                    center,
                    ring,
                );
                if kth < bound {
                    break;
                }
            }

            if candidates.seen.len() >= live_drivers || grid.covers_grid(center, ring) {
                break;
            }

            ring += 1;
        }

        NEAREST_QUERY_CANDIDATES.observe(candidates.seen.len() as f64);

        Ok(candidates.into_sorted(k))
    }

    fn collect_cell(
        &self,
        cell: &CellKey,
        location: &Point,
        now: TimeStamp,
        candidates: &mut Candidates,
    ) {
        self.index.read_cell(cell, |members| {
            for driver_id in members {
                candidates.seen.insert(*driver_id);

                let Some(record) = self.registry.get(driver_id) else {
                    debug_assert!(false, "driver {driver_id} in {cell:?} has no record");
                    continue;
                };
                debug_assert_eq!(record.cell, *cell);

                if is_stale(record.last_update, now, self.config.stale_threshold) {
                    continue;
                }

                let distance =
                    distance_in_meters(self.config.distance_metric, location, &record.location);
                candidates.distances.insert(*driver_id, distance);
            }
        });
    }
}
