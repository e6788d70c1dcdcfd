/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use prometheus::{
    exponential_buckets, histogram_opts, opts, register_histogram, register_histogram_vec,
    register_int_counter, register_int_gauge, Histogram, HistogramVec, IntCounter, IntGauge,
};

pub static INCOMING_API: once_cell::sync::Lazy<HistogramVec> = once_cell::sync::Lazy::new(|| {
    register_histogram_vec!(
        opts!("http_request_duration_seconds", "Incoming API requests").into(),
        &["method", "handler", "status_code", "code", "version"]
    )
    .expect("Failed to register incoming API metrics")
});

pub static TOTAL_LOCATION_UPDATES: once_cell::sync::Lazy<IntCounter> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter!("total_location_updates", "Total Location Updates")
            .expect("Failed to register total location updates metrics")
    });

pub static STALE_LOCATION_UPDATES: once_cell::sync::Lazy<IntCounter> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter!(
            "stale_location_updates",
            "Location updates rejected for carrying an old timestamp"
        )
        .expect("Failed to register stale location updates metrics")
    });

pub static EVICTED_DRIVERS: once_cell::sync::Lazy<IntCounter> = once_cell::sync::Lazy::new(|| {
    register_int_counter!("evicted_drivers", "Drivers evicted by the freshness reaper")
        .expect("Failed to register evicted drivers metrics")
});

pub static LIVE_DRIVERS: once_cell::sync::Lazy<IntGauge> = once_cell::sync::Lazy::new(|| {
    register_int_gauge!("live_drivers", "Drivers currently held in the registry")
        .expect("Failed to register live drivers metrics")
});

pub static NEAREST_QUERY_CANDIDATES: once_cell::sync::Lazy<Histogram> =
    once_cell::sync::Lazy::new(|| {
        register_histogram!(histogram_opts!(
            "nearest_query_candidates",
            "Candidates examined per nearest driver query",
            exponential_buckets(1.0, 2.0, 16).unwrap_or_default()
        ))
        .expect("Failed to register nearest query candidates metrics")
    });

/// Observes the duration of an incoming API request into `INCOMING_API`.
///
/// # Arguments
///
/// * `$method` - The HTTP method of the request (e.g., GET, POST).
/// * `$endpoint` - The endpoint or route of the request.
/// * `$status` - The HTTP status code of the response.
/// * `$code` - Error code of the response, or `SUCCESS`.
/// * `$start` - The time when the request was received.
#[macro_export]
macro_rules! incoming_api {
    ($method:expr, $endpoint:expr, $status:expr, $code:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        let version = std::env::var("DEPLOYMENT_VERSION").unwrap_or("DEV".to_string());
        INCOMING_API
            .with_label_values(&[$method, $endpoint, $status, $code, version.as_str()])
            .observe(duration);
    };
}

/// Builds the `/metrics` endpoint middleware and registers the service metrics with it.
///
/// # Panics
///
/// * If the metrics registry cannot be built or a metric fails to register.
pub fn prometheus_metrics() -> PrometheusMetrics {
    let prometheus = PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus Metrics");

    prometheus
        .registry
        .register(Box::new(INCOMING_API.to_owned()))
        .expect("Failed to register incoming API metrics");

    prometheus
        .registry
        .register(Box::new(TOTAL_LOCATION_UPDATES.to_owned()))
        .expect("Failed to register total location updates metrics");

    prometheus
        .registry
        .register(Box::new(STALE_LOCATION_UPDATES.to_owned()))
        .expect("Failed to register stale location updates metrics");

    prometheus
        .registry
        .register(Box::new(EVICTED_DRIVERS.to_owned()))
        .expect("Failed to register evicted drivers metrics");

    prometheus
        .registry
        .register(Box::new(LIVE_DRIVERS.to_owned()))
        .expect("Failed to register live drivers metrics");

    prometheus
        .registry
        .register(Box::new(NEAREST_QUERY_CANDIDATES.to_owned()))
        .expect("Failed to register nearest query candidates metrics");

    prometheus
}
