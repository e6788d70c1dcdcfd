/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use serde::Serialize;
use tracing::{debug, info};

use super::{geocell::CellKey, registry::PutOutcome, LocationTracker};
use crate::{
    common::{types::*, utils::*},
    tools::{
        error::AppError,
        prometheus::{LIVE_DRIVERS, STALE_LOCATION_UPDATES, TOTAL_LOCATION_UPDATES},
    },
};

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngestAck {
    pub driver_id: DriverId,
    pub cell: CellKey,
    pub previous_cell: Option<CellKey>,
}

impl LocationTracker {
    pub fn ingest(
        &self,
        driver_id: DriverId,
        location: Point,
        timestamp: TimeStamp,
    ) -> Result<IngestAck, AppError> {
        self.ingest_at(driver_id, location, timestamp, current_timestamp())
    }

    /// Applies a location ping to the registry and the geocell index as one step.
    ///
    /// The payload is validated before any state is touched, including a timestamp
    /// running more than `max_clock_skew` ahead of `now`. Pings not strictly newer
    /// than the stored one fail with `StaleUpdate` and change nothing.
    pub fn ingest_at(
        &self,
        driver_id: DriverId,
        location: Point,
        timestamp: TimeStamp,
        now: TimeStamp,
    ) -> Result<IngestAck, AppError> {
        validate_driver_id(&driver_id)?;
        validate_point(&location)?;
        validate_timestamp(&timestamp)?;
        validate_not_in_future(&timestamp, &now, self.config.max_clock_skew)?;

        let lock = self.driver_lock(driver_id);
        let _guard = lock.lock();

        let existing = self.registry.get(&driver_id);
        if let Some(record) = existing {
            if record.last_update >= timestamp {
                return Err(self.reject_stale(driver_id, record.last_update, timestamp));
            }
        }

        let previous_cell = existing.map(|record| record.cell);
        let cell = self.registry.cell_for(&location);

        let mut outcome = None;
        let applied = self.index.upsert_with(driver_id, previous_cell, cell, || {
            let put = self.registry.put(driver_id, location, timestamp);
            outcome = Some(put);
            matches!(put, PutOutcome::Accepted { .. })
        });

        match outcome {
            Some(PutOutcome::Accepted {
                previous_cell,
                cell,
            }) if applied => {
                TOTAL_LOCATION_UPDATES.inc();
                if previous_cell.is_none() {
                    LIVE_DRIVERS.set(self.registry.len() as i64);
                }
                debug!(tag = "[Location Update]", driver_id = %driver_id, ?cell, ?previous_cell);
                Ok(IngestAck {
                    driver_id,
                    cell,
                    previous_cell,
                })
            }
            Some(PutOutcome::Stale { stored }) => {
                Err(self.reject_stale(driver_id, stored, timestamp))
            }
            _ => Err(AppError::InternalError(format!(
                "Location update for driver {driver_id} was not applied"
            ))),
        }
    }

    fn reject_stale(&self, driver_id: DriverId, stored: TimeStamp, received: TimeStamp) -> AppError {
        STALE_LOCATION_UPDATES.inc();
        info!(
            tag = "[Stale Location Update]",
            driver_id = %driver_id,
            stored_timestamp = stored.0,
            received_timestamp = received.0
        );
        AppError::StaleUpdate(driver_id, stored, received)
    }
}
