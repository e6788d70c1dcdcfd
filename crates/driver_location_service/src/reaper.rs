/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::{
    common::{types::*, utils::*},
    tools::{
        logger::*,
        prometheus::{EVICTED_DRIVERS, LIVE_DRIVERS},
    },
    tracker::LocationTracker,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::{sync::Arc, time::Duration};
use tokio::time::{interval, Instant};

impl LocationTracker {
    /// Evicts every driver whose last update is older than the stale threshold at `now`.
    ///
    /// Works from a snapshot of ids and holds at most one driver's locks at a time, so
    /// ingestion and queries are never blocked for longer than a single removal.
    pub fn sweep(&self, now: TimeStamp) -> usize {
        let threshold = self.config.stale_threshold;
        let mut evicted = 0;

        for driver_id in self.registry.driver_ids() {
            let is_candidate = self
                .registry
                .get(&driver_id)
                .is_some_and(|record| is_stale(record.last_update, now, threshold));
            if !is_candidate {
                continue;
            }

            let lock = self.driver_lock(driver_id);
            let _guard = lock.lock();

            // A fresh ping may have landed between the snapshot and the lock
            let Some(record) = self
                .registry
                .get(&driver_id)
                .filter(|record| is_stale(record.last_update, now, threshold))
            else {
                continue;
            };

            let removed = self.index.remove_with(driver_id, record.cell, || {
                self.registry.delete(&driver_id).is_some()
            });
            if removed {
                evicted += 1;
                debug!(tag = "[Driver Evicted]", driver_id = %driver_id, last_update = record.last_update.0);
            }
        }

        let pruned_cells = self.index.prune_empty();
        let pruned_locks = self.prune_driver_locks();

        EVICTED_DRIVERS.inc_by(evicted as u64);
        LIVE_DRIVERS.set(self.registry.len() as i64);

        if evicted > 0 {
            info!(
                tag = "[Reaper Sweep]",
                evicted = evicted,
                pruned_cells = pruned_cells,
                pruned_locks = pruned_locks,
                live_drivers = self.registry.len()
            );
        }

        evicted
    }
}

/// Periodically evicts stale drivers until termination is requested.
pub async fn run_reaper(
    tracker: Arc<LocationTracker>,
    reaper_interval: u64,
    graceful_termination_requested: Arc<AtomicBool>,
) {
    let mut timer = interval(Duration::from_secs(reaper_interval.max(1)));
    let mut termination_check = interval(Duration::from_secs(1));

    loop {
        if graceful_termination_requested.load(Ordering::Relaxed) {
            info!(tag = "[Graceful Shutting Down]", "Stopping freshness reaper");
            break;
        }
        tokio::select! {
            _ = timer.tick() => {
                let start_time = Instant::now();
                let evicted = tracker.sweep(current_timestamp());
                debug!(
                    tag = "[Reaper Tick]",
                    evicted = evicted,
                    latency = format!("{:?}ms", start_time.elapsed().as_millis())
                );
            },
            _ = termination_check.tick() => {},
        }
    }
}
