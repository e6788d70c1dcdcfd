/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use dashmap::{mapref::entry::Entry, DashMap};
use serde::Serialize;

use super::geocell::{CellGrid, CellKey, FxBuildHasher};
use crate::common::types::*;

/// Latest known position of a driver.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverRecord {
    pub driver_id: DriverId,
    pub location: Point,
    pub last_update: TimeStamp,
    pub cell: CellKey,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PutOutcome {
    Accepted {
        previous_cell: Option<CellKey>,
        cell: CellKey,
    },
    Stale {
        stored: TimeStamp,
    },
}

/// Driver id -> latest record. The single source of truth for "where is driver X now".
pub struct DriverRegistry {
    grid: CellGrid,
    records: DashMap<DriverId, DriverRecord, FxBuildHasher>,
}

impl DriverRegistry {
    pub fn new(grid: CellGrid) -> Self {
        DriverRegistry {
            grid,
            records: DashMap::with_hasher(FxBuildHasher::default()),
        }
    }

    pub fn cell_for(&self, location: &Point) -> CellKey {
        self.grid.cell_of(location)
    }

    pub fn get(&self, driver_id: &DriverId) -> Option<DriverRecord> {
        self.records.get(driver_id).map(|record| *record)
    }

    pub fn contains(&self, driver_id: &DriverId) -> bool {
        self.records.contains_key(driver_id)
    }

    /// Stores the new location unless the stored record is as new or newer.
    pub fn put(&self, driver_id: DriverId, location: Point, timestamp: TimeStamp) -> PutOutcome {
        let cell = self.cell_for(&location);
        let record = DriverRecord {
            driver_id,
            location,
            last_update: timestamp,
            cell,
        };

        match self.records.entry(driver_id) {
            Entry::Occupied(mut entry) => {
                let stored = entry.get().last_update;
                if stored >= timestamp {
                    return PutOutcome::Stale { stored };
                }
                let previous_cell = entry.get().cell;
                entry.insert(record);
                PutOutcome::Accepted {
                    previous_cell: Some(previous_cell),
                    cell,
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
                PutOutcome::Accepted {
                    previous_cell: None,
                    cell,
                }
            }
        }
    }

    pub fn delete(&self, driver_id: &DriverId) -> Option<DriverRecord> {
        self.records.remove(driver_id).map(|(_, record)| record)
    }

    /// Snapshot of the registered ids; later mutations are not reflected.
    pub fn driver_ids(&self) -> Vec<DriverId> {
        self.records.iter().map(|record| *record.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
