/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::sync::Arc;

use crate::{
    tools::{error::AppError, logger::*},
    tracker::{LocationTracker, TrackerConfig},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub workers: usize,
    pub logger_cfg: LoggerConfig,
    pub tracker_cfg: TrackerConfig,
    /// Seconds between two freshness sweeps.
    pub reaper_interval: u64,
    /// Milliseconds.
    pub request_timeout: u64,
    pub max_allowed_req_size: usize,
}

pub fn read_dhall_config(config_path: &str) -> Result<AppConfig, String> {
    serde_dhall::from_file(config_path)
        .parse::<AppConfig>()
        .map_err(|err| format!("Error reading config: {err}"))
}

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<LocationTracker>,
    pub reaper_interval: u64,
    pub request_timeout: u64,
    pub max_allowed_req_size: usize,
}

impl AppState {
    pub fn new(app_config: AppConfig) -> Result<AppState, AppError> {
        let tracker = LocationTracker::new(app_config.tracker_cfg.clone())?;

        info!(
            tag = "[Tracker Configuration]",
            cell_size_degrees = app_config.tracker_cfg.cell_size_degrees,
            distance_metric = %app_config.tracker_cfg.distance_metric,
            stale_threshold = app_config.tracker_cfg.stale_threshold,
            default_k = app_config.tracker_cfg.default_k,
            max_k = app_config.tracker_cfg.max_k,
            max_clock_skew = app_config.tracker_cfg.max_clock_skew
        );

        Ok(AppState {
            tracker: Arc::new(tracker),
            reaper_interval: app_config.reaper_interval,
            request_timeout: app_config.request_timeout,
            max_allowed_req_size: app_config.max_allowed_req_size,
        })
    }
}
