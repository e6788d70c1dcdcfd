/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
//! In-memory driver location tracking: registry, geocell index and the operations
//! that keep them consistent.
//!
//! Lock order, outermost first: driver lock, cell locks (ascending `CellKey`),
//! registry shard. Queries skip the driver lock and only ever hold one cell read
//! lock at a time.

pub mod geocell;
pub mod ingestion;
pub mod nearest;
pub mod registry;

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use self::{
    geocell::{CellGrid, FxBuildHasher, GeocellIndex},
    registry::{DriverRecord, DriverRegistry},
};
use crate::{
    common::{types::*, utils::*},
    tools::error::AppError,
};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TrackerConfig {
    pub cell_size_degrees: f64,
    pub distance_metric: DistanceMetric,
    /// Seconds after the last update beyond which a driver is stale.
    pub stale_threshold: u64,
    pub default_k: usize,
    pub max_k: usize,
    /// Seconds a ping's timestamp may run ahead of server time.
    pub max_clock_skew: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            cell_size_degrees: 0.05,
            distance_metric: DistanceMetric::GreatCircle,
            stale_threshold: 300,
            default_k: 5,
            max_k: 100,
            max_clock_skew: 60,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_k == 0 {
            return Err(AppError::InvalidConfiguration(
                "max_k must be at least 1".to_string(),
            ));
        }
        if self.default_k == 0 {
            return Err(AppError::InvalidConfiguration(
                "default_k must be at least 1".to_string(),
            ));
        }
        if self.default_k > self.max_k {
            return Err(AppError::InvalidConfiguration(format!(
                "default_k ({}) must not exceed max_k ({})",
                self.default_k, self.max_k
            )));
        }
        CellGrid::new(self.cell_size_degrees).map(|_| ())
    }

    pub fn effective_k(&self, k: Option<usize>) -> usize {
        k.unwrap_or(self.default_k).min(self.max_k)
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStats {
    pub live_drivers: usize,
    pub occupied_cells: usize,
}

pub struct LocationTracker {
    pub(crate) config: TrackerConfig,
    pub(crate) registry: DriverRegistry,
    pub(crate) index: GeocellIndex,
    driver_locks: DashMap<DriverId, Arc<Mutex<()>>, FxBuildHasher>,
}

impl LocationTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, AppError> {
        config.validate()?;
        let grid = CellGrid::new(config.cell_size_degrees)?;

        Ok(LocationTracker {
            config,
            registry: DriverRegistry::new(grid),
            index: GeocellIndex::new(grid),
            driver_locks: DashMap::with_hasher(FxBuildHasher::default()),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    pub fn index(&self) -> &GeocellIndex {
        &self.index
    }

    /// Serializes every mutation of one driver's record and membership.
    pub(crate) fn driver_lock(&self, driver_id: DriverId) -> Arc<Mutex<()>> {
        Arc::clone(&self.driver_locks.entry(driver_id).or_default())
    }

    /// Drops locks of evicted drivers that nobody is waiting on.
    ///
    /// Candidates are collected first and removed one key at a time, so a shard
    /// is never write-locked for longer than a single removal.
    pub(crate) fn prune_driver_locks(&self) -> usize {
        let is_idle = |driver_id: &DriverId, lock: &Arc<Mutex<()>>| {
            Arc::strong_count(lock) == 1 && !self.registry.contains(driver_id)
        };

        let candidates: Vec<DriverId> = self
            .driver_locks
            .iter()
            .filter(|entry| is_idle(entry.key(), entry.value()))
            .map(|entry| *entry.key())
            .collect();

        candidates
            .iter()
            .filter(|driver_id| self.driver_locks.remove_if(*driver_id, is_idle).is_some())
            .count()
    }

    pub fn locate(&self, driver_id: DriverId) -> Result<DriverRecord, AppError> {
        self.locate_at(driver_id, current_timestamp())
    }

    /// Latest record of a driver, as long as it is not stale at `now`.
    pub fn locate_at(&self, driver_id: DriverId, now: TimeStamp) -> Result<DriverRecord, AppError> {
        validate_driver_id(&driver_id)?;

        self.registry
            .get(&driver_id)
            .filter(|record| !is_stale(record.last_update, now, self.config.stale_threshold))
            .ok_or(AppError::UnknownDriver(driver_id))
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            live_drivers: self.registry.len(),
            occupied_cells: self.index.occupied_cell_count(),
        }
    }

    /// Checks that cell membership and registry records agree.
    ///
    /// Safe to call while other threads ingest: each cell is checked under its read
    /// lock and each record under its driver lock.
    pub fn verify_consistency(&self) -> Result<(), String> {
        for cell in self.index.cell_keys() {
            let mismatch = self.index.read_cell(&cell, |members| {
                members.iter().find_map(|driver_id| match self.registry.get(driver_id) {
                    Some(record) if record.cell == cell => None,
                    Some(record) => Some(format!(
                        "driver {driver_id} listed in {cell:?} but registered in {:?}",
                        record.cell
                    )),
                    None => Some(format!(
                        "driver {driver_id} listed in {cell:?} has no registry record"
                    )),
                })
            });
            if let Some(Some(mismatch)) = mismatch {
                return Err(mismatch);
            }
        }

        for driver_id in self.registry.driver_ids() {
            let lock = self.driver_lock(driver_id);
            let _guard = lock.lock();
            if let Some(record) = self.registry.get(&driver_id) {
                let listed = self
                    .index
                    .read_cell(&record.cell, |members| members.contains(&driver_id))
                    .unwrap_or(false);
                if !listed {
                    return Err(format!(
                        "driver {driver_id} registered in {:?} but missing from that cell",
                        record.cell
                    ));
                }
            }
        }

        Ok(())
    }
}
