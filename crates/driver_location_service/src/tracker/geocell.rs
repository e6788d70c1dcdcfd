/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
//! Fixed-resolution latitude/longitude grid and the cell -> drivers index built on it.
//!
//! Each occupied cell owns its own `RwLock`ed member set. Callers moving a driver lock
//! both cells in ascending `CellKey` order, and run their registry mutation while the
//! locks are held, so a reader of a cell always sees members whose registry record
//! points back at that cell.

use std::{hash::BuildHasherDefault, sync::Arc};

use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::{FxHashSet, FxHasher};
use serde::{Deserialize, Serialize};

use crate::{common::types::*, tools::error::AppError};

pub type FxBuildHasher = BuildHasherDefault<FxHasher>;

type CellMembers = Arc<RwLock<FxHashSet<DriverId>>>;

/// Grid coordinates of a cell. Rows grow northwards from -90, columns eastwards from -180.
///
/// The derived ordering (row, then column) is the global lock order for cells.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct CellKey {
    pub row: u32,
    pub col: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGrid {
    cell_size: f64,
    rows: u32,
    cols: u32,
}

impl CellGrid {
    pub fn new(cell_size_degrees: f64) -> Result<Self, AppError> {
        if !cell_size_degrees.is_finite() || cell_size_degrees <= 0.0 || cell_size_degrees > 180.0
        {
            return Err(AppError::InvalidConfiguration(format!(
                "cell_size_degrees must be within (0, 180], got {cell_size_degrees}"
            )));
        }

        let rows = (180.0 / cell_size_degrees).ceil();
        let cols = (360.0 / cell_size_degrees).ceil();
        if cols > u32::MAX as f64 / 2.0 {
            return Err(AppError::InvalidConfiguration(format!(
                "cell_size_degrees {cell_size_degrees} produces too many cells"
            )));
        }

        Ok(CellGrid {
            cell_size: cell_size_degrees,
            rows: rows as u32,
            cols: cols as u32,
        })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn cell_of(&self, point: &Point) -> CellKey {
        let Latitude(lat) = point.lat;
        let Longitude(lon) = point.lon;

        let row = ((lat + 90.0) / self.cell_size).floor().max(0.0) as u32;
        let col = ((lon + 180.0) / self.cell_size).floor().max(0.0) as u32;

        CellKey {
            row: row.min(self.rows - 1),
            col: col.min(self.cols - 1),
        }
    }

    /// Southern and northern edge of a row, in degrees.
    pub fn lat_bounds(&self, row: u32) -> (f64, f64) {
        let lo = -90.0 + row as f64 * self.cell_size;
        (lo, (lo + self.cell_size).min(90.0))
    }

    /// Western and eastern edge of a column, in degrees.
    pub fn lon_bounds(&self, col: u32) -> (f64, f64) {
        let lo = -180.0 + col as f64 * self.cell_size;
        (lo, (lo + self.cell_size).min(180.0))
    }

    pub fn col_width(&self, col: u32) -> f64 {
        let (lo, hi) = self.lon_bounds(col);
        hi - lo
    }

    pub fn wrap_col(&self, col: i64) -> u32 {
        col.rem_euclid(self.cols as i64) as u32
    }

    fn col_distance(&self, a: u32, b: u32) -> u32 {
        let direct = a.abs_diff(b);
        direct.min(self.cols - direct)
    }

    /// Chebyshev distance in cell steps; columns wrap around the antimeridian.
    pub fn chebyshev(&self, a: CellKey, b: CellKey) -> u32 {
        a.row.abs_diff(b.row).max(self.col_distance(a.col, b.col))
    }

    /// Cells at Chebyshev distance exactly `ring` from `center`, sorted by key.
    pub fn ring(&self, center: CellKey, ring: u32) -> Vec<CellKey> {
        if ring == 0 {
            return vec![center];
        }

        let r = ring as i64;
        let mut cells = Vec::with_capacity(8 * ring as usize);
        let mut push = |dr: i64, dc: i64| {
            let row = center.row as i64 + dr;
            if row < 0 || row >= self.rows as i64 {
                return;
            }
            let cell = CellKey {
                row: row as u32,
                col: self.wrap_col(center.col as i64 + dc),
            };
            // Wide rings wrap onto columns already covered by a smaller ring
            if self.chebyshev(center, cell) == ring {
                cells.push(cell);
            }
        };

        // Top and bottom edges, corners included
        for dc in -r..=r {
            push(-r, dc);
            push(r, dc);
        }
        // Left and right edges, corners excluded
        for dr in (1 - r)..r {
            push(dr, -r);
            push(dr, r);
        }

        cells.sort_unstable();
        cells.dedup();
        cells
    }

    /// Every cell within `ring` steps of `center`.
    pub fn within(&self, center: CellKey, ring: u32) -> Vec<CellKey> {
        (0..=ring)
            .flat_map(|r| self.ring(center, r))
            .collect()
    }

    /// Whether the square of radius `ring` around `center` spans the whole grid.
    pub fn covers_grid(&self, center: CellKey, ring: u32) -> bool {
        let rows_covered = center.row <= ring && center.row as u64 + ring as u64 >= self.rows as u64 - 1;
        let cols_covered = 2 * ring as u64 + 1 >= self.cols as u64;
        rows_covered && cols_covered
    }
}

/// Maps each occupied cell to the set of drivers currently located in it.
///
/// The index only holds driver ids; the `DriverRegistry` owns the records.
pub struct GeocellIndex {
    grid: CellGrid,
    cells: DashMap<CellKey, CellMembers, FxBuildHasher>,
}

impl GeocellIndex {
    pub fn new(grid: CellGrid) -> Self {
        GeocellIndex {
            grid,
            cells: DashMap::with_hasher(FxBuildHasher::default()),
        }
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    // Handles are only cloned under the shard lock, `prune_empty` relies on that.
    fn cell(&self, key: CellKey) -> CellMembers {
        Arc::clone(&self.cells.entry(key).or_default())
    }

    fn existing_cell(&self, key: &CellKey) -> Option<CellMembers> {
        self.cells.get(key).map(|members| Arc::clone(&members))
    }

    /// Moves `driver_id` from `old` (if any) into `new`.
    ///
    /// Both cell locks are taken in ascending key order before `commit` runs; the
    /// membership change is applied only if `commit` returns `true`, and before either
    /// lock is released. Returns the value of `commit`.
    pub fn upsert_with<F>(
        &self,
        driver_id: DriverId,
        old: Option<CellKey>,
        new: CellKey,
        commit: F,
    ) -> bool
    where
        F: FnOnce() -> bool,
    {
        match old {
            Some(old) if old != new => {
                let (low, high) = if old < new { (old, new) } else { (new, old) };
                let low_cell = self.cell(low);
                let high_cell = self.cell(high);

                let mut low_members = low_cell.write();
                let mut high_members = high_cell.write();

                if !commit() {
                    return false;
                }

                let (old_members, new_members) = if old < new {
                    (&mut *low_members, &mut *high_members)
                } else {
                    (&mut *high_members, &mut *low_members)
                };

                let was_member = old_members.remove(&driver_id);
                debug_assert!(was_member, "driver {driver_id} missing from its cell {old:?}");
                new_members.insert(driver_id);
                true
            }
            _ => {
                let cell = self.cell(new);
                let mut members = cell.write();

                if !commit() {
                    return false;
                }

                members.insert(driver_id);
                true
            }
        }
    }

    pub fn upsert(&self, driver_id: DriverId, old: Option<CellKey>, new: CellKey) {
        self.upsert_with(driver_id, old, new, || true);
    }

    /// Removes `driver_id` from `key` under the cell's write lock, if `commit` agrees.
    pub fn remove_with<F>(&self, driver_id: DriverId, key: CellKey, commit: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        let cell = self.cell(key);
        let mut members = cell.write();

        if !commit() {
            return false;
        }

        let was_member = members.remove(&driver_id);
        debug_assert!(was_member, "driver {driver_id} missing from its cell {key:?}");
        true
    }

    pub fn remove(&self, driver_id: DriverId, key: CellKey) -> bool {
        self.remove_with(driver_id, key, || true)
    }

    /// Cells at exactly `ring` steps from `key`, for expanding-ring search.
    pub fn neighbors_of(&self, key: CellKey, ring: u32) -> Vec<CellKey> {
        self.grid.ring(key, ring)
    }

    /// Runs `f` over the members of `key` while holding the cell's read lock.
    ///
    /// Returns `None` for a cell that has never been occupied (or was pruned).
    pub fn read_cell<R, F>(&self, key: &CellKey, f: F) -> Option<R>
    where
        F: FnOnce(&FxHashSet<DriverId>) -> R,
    {
        let cell = self.existing_cell(key)?;
        let members = cell.read();
        Some(f(&members))
    }

    pub fn members(&self, key: &CellKey) -> Vec<DriverId> {
        self.read_cell(key, |members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn cell_keys(&self) -> Vec<CellKey> {
        self.cells.iter().map(|entry| *entry.key()).collect()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn occupied_cell_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|entry| !entry.value().read().is_empty())
            .count()
    }

    /// Drops cells that are empty and not referenced by any in-flight operation.
    ///
    /// Candidates are collected first and removed one key at a time, so a shard
    /// is never write-locked for longer than a single removal.
    pub fn prune_empty(&self) -> usize {
        let is_unused = |_: &CellKey, members: &CellMembers| {
            Arc::strong_count(members) == 1 && members.read().is_empty()
        };

        let candidates: Vec<CellKey> = self
            .cells
            .iter()
            .filter(|entry| entry.value().read().is_empty())
            .map(|entry| *entry.key())
            .collect();

        candidates
            .iter()
            .filter(|key| self.cells.remove_if(*key, is_unused).is_some())
            .count()
    }
}
