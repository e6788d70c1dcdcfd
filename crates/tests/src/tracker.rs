/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

#[cfg(test)]
mod ingestion {
    use driver_location_service::{
        common::{types::*, utils::current_timestamp},
        tools::error::AppError,
        tracker::{LocationTracker, TrackerConfig},
    };

    fn tracker() -> LocationTracker {
        LocationTracker::new(TrackerConfig {
            cell_size_degrees: 1.0,
            ..TrackerConfig::default()
        })
        .expect("valid tracker config")
    }

    #[test]
    fn locate_returns_latest_ingested_location() {
        let tracker = tracker();
        let now = current_timestamp();

        tracker
            .ingest(DriverId(7), Point::new(10.0, 20.0), now)
            .expect("fresh ping is accepted");

        let record = tracker.locate(DriverId(7)).expect("driver 7 is tracked");
        assert_eq!(record.driver_id, DriverId(7));
        assert_eq!(record.location, Point::new(10.0, 20.0));
        assert_eq!(record.last_update, now);
        assert_eq!(tracker.index().members(&record.cell), vec![DriverId(7)]);
    }

    #[test]
    fn moving_driver_changes_cell_membership() {
        let tracker = tracker();
        let TimeStamp(now) = current_timestamp();

        let first = tracker
            .ingest(DriverId(3), Point::new(12.5, 77.5), TimeStamp(now - 5))
            .expect("fresh ping is accepted");
        assert_eq!(first.previous_cell, None);

        let second = tracker
            .ingest(DriverId(3), Point::new(13.5, 78.5), TimeStamp(now))
            .expect("newer ping is accepted");
        assert_eq!(second.previous_cell, Some(first.cell));
        assert_ne!(second.cell, first.cell);

        assert!(tracker.index().members(&first.cell).is_empty());
        assert_eq!(tracker.index().members(&second.cell), vec![DriverId(3)]);
        assert!(tracker.verify_consistency().is_ok());
    }

    #[test]
    fn stale_update_is_a_no_op() {
        let tracker = tracker();
        let TimeStamp(now) = current_timestamp();

        let ack = tracker
            .ingest(DriverId(11), Point::new(1.5, 1.5), TimeStamp(now))
            .expect("fresh ping is accepted");

        for timestamp in [now, now - 1, now - 600] {
            let result = tracker.ingest(DriverId(11), Point::new(40.5, 40.5), TimeStamp(timestamp));
            assert_eq!(
                result,
                Err(AppError::StaleUpdate(
                    DriverId(11),
                    TimeStamp(now),
                    TimeStamp(timestamp)
                ))
            );
        }

        let record = tracker.locate(DriverId(11)).expect("driver 11 is tracked");
        assert_eq!(record.location, Point::new(1.5, 1.5));
        assert_eq!(record.last_update, TimeStamp(now));
        assert_eq!(tracker.index().members(&ack.cell), vec![DriverId(11)]);
        assert_eq!(tracker.stats().occupied_cells, 1);
    }

    #[test]
    fn invalid_payloads_touch_nothing() {
        let tracker = tracker();
        let now = current_timestamp();

        let invalid = [
            (DriverId(1), Point::new(90.5, 0.0), now),
            (DriverId(1), Point::new(0.0, 180.5), now),
            (DriverId(1), Point::new(f64::NAN, 0.0), now),
            (DriverId(1), Point::new(0.0, f64::INFINITY), now),
            (DriverId(0), Point::new(0.0, 0.0), now),
            (DriverId(-4), Point::new(0.0, 0.0), now),
            (DriverId(1), Point::new(0.0, 0.0), TimeStamp(-1)),
        ];

        for (driver_id, location, timestamp) in invalid {
            let result = tracker.ingest(driver_id, location, timestamp);
            assert!(
                matches!(result, Err(AppError::InvalidPayload(_))),
                "{driver_id} {location:?} {timestamp:?} gave {result:?}"
            );
        }

        assert!(tracker.registry().is_empty());
        assert_eq!(tracker.index().cell_count(), 0);
    }

    #[test]
    fn future_timestamps_do_not_pin_drivers() {
        let tracker = tracker();
        let TimeStamp(now) = current_timestamp();

        // Milliseconds sent where seconds are expected
        let result = tracker.ingest(DriverId(5), Point::new(10.0, 10.0), TimeStamp(now * 1000));
        assert!(matches!(result, Err(AppError::InvalidPayload(_))), "{result:?}");
        assert!(tracker.registry().is_empty());
        assert_eq!(tracker.index().cell_count(), 0);

        tracker
            .ingest(DriverId(5), Point::new(11.0, 11.0), TimeStamp(now + 10))
            .expect("timestamps within the allowed skew are accepted");

        let skew = tracker.config().max_clock_skew as i64;
        let result = tracker.ingest_at(
            DriverId(5),
            Point::new(12.0, 12.0),
            TimeStamp(now + skew + 1),
            TimeStamp(now),
        );
        assert!(matches!(result, Err(AppError::InvalidPayload(_))), "{result:?}");

        let record = tracker.locate(DriverId(5)).expect("driver 5 is tracked");
        assert_eq!(record.location, Point::new(11.0, 11.0));
        assert_eq!(record.last_update, TimeStamp(now + 10));

        // Ages out like any other driver
        let later = TimeStamp(now + 10 + tracker.config().stale_threshold as i64 + 1);
        assert_eq!(tracker.sweep(later), 1);
        assert!(tracker.locate_at(DriverId(5), later).is_err());
    }

    #[test]
    fn unknown_driver_is_reported() {
        let tracker = tracker();
        assert_eq!(
            tracker.locate(DriverId(42)),
            Err(AppError::UnknownDriver(DriverId(42)))
        );
    }

    #[test]
    fn poles_and_antimeridian_are_accepted() {
        let tracker = tracker();
        let now = current_timestamp();

        for (id, lat, lon) in [(1, 90.0, 180.0), (2, -90.0, -180.0), (3, 0.0, 180.0)] {
            tracker
                .ingest(DriverId(id), Point::new(lat, lon), now)
                .expect("boundary coordinates are valid");
        }

        assert_eq!(tracker.stats().live_drivers, 3);
        assert!(tracker.verify_consistency().is_ok());
    }
}

#[cfg(test)]
mod nearest {
    use driver_location_service::{
        common::{types::*, utils::*},
        tracker::{LocationTracker, TrackerConfig},
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn tracker(cell_size_degrees: f64, distance_metric: DistanceMetric) -> LocationTracker {
        LocationTracker::new(TrackerConfig {
            cell_size_degrees,
            distance_metric,
            ..TrackerConfig::default()
        })
        .expect("valid tracker config")
    }

    fn brute_force(
        metric: DistanceMetric,
        drivers: &[(DriverId, Point)],
        query: &Point,
        k: usize,
    ) -> Vec<DriverId> {
        let mut ranked: Vec<(f64, DriverId)> = drivers
            .iter()
            .map(|(driver_id, location)| (distance_in_meters(metric, query, location), *driver_id))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        ranked.into_iter().take(k).map(|(_, driver_id)| driver_id).collect()
    }

    fn wrap_lon(lon: f64) -> f64 {
        if lon > 180.0 {
            lon - 360.0
        } else if lon < -180.0 {
            lon + 360.0
        } else {
            lon
        }
    }

    #[test]
    fn returns_two_closest_in_order() {
        let tracker = tracker(0.05, DistanceMetric::GreatCircle);
        let now = current_timestamp();

        tracker.ingest(DriverId(1), Point::new(0.0, 0.0), now).expect("accepted");
        tracker.ingest(DriverId(2), Point::new(0.0, 1.0), now).expect("accepted");
        tracker.ingest(DriverId(3), Point::new(5.0, 5.0), now).expect("accepted");

        let nearest = tracker
            .nearest(Point::new(0.0, 0.1), Some(2))
            .expect("valid query");
        assert_eq!(nearest, vec![DriverId(1), DriverId(2)]);
    }

    #[test]
    fn empty_registry_and_zero_k_give_empty_results() {
        let tracker = tracker(1.0, DistanceMetric::GreatCircle);
        assert!(tracker
            .nearest(Point::new(10.0, 10.0), Some(3))
            .expect("valid query")
            .is_empty());

        tracker
            .ingest(DriverId(1), Point::new(10.0, 10.0), current_timestamp())
            .expect("accepted");
        assert!(tracker
            .nearest(Point::new(10.0, 10.0), Some(0))
            .expect("valid query")
            .is_empty());
    }

    #[test]
    fn k_is_clamped_and_defaulted() {
        let tracker = LocationTracker::new(TrackerConfig {
            cell_size_degrees: 1.0,
            default_k: 2,
            max_k: 3,
            ..TrackerConfig::default()
        })
        .expect("valid tracker config");
        let now = current_timestamp();

        for id in 1..=6 {
            tracker
                .ingest(DriverId(id), Point::new(id as f64 * 0.1, 0.0), now)
                .expect("accepted");
        }

        let query = Point::new(0.0, 0.0);
        assert_eq!(tracker.nearest(query, None).expect("valid query").len(), 2);
        assert_eq!(
            tracker.nearest(query, Some(10)).expect("valid query"),
            vec![DriverId(1), DriverId(2), DriverId(3)]
        );
    }

    #[test]
    fn equidistant_drivers_are_ordered_by_id() {
        let tracker = tracker(1.0, DistanceMetric::GreatCircle);
        let now = current_timestamp();

        tracker.ingest(DriverId(9), Point::new(0.0, 0.5), now).expect("accepted");
        tracker.ingest(DriverId(4), Point::new(0.0, -0.5), now).expect("accepted");
        tracker.ingest(DriverId(6), Point::new(0.0, 0.5), now).expect("accepted");

        let nearest = tracker
            .nearest(Point::new(0.0, 0.0), Some(3))
            .expect("valid query");
        assert_eq!(nearest, vec![DriverId(4), DriverId(6), DriverId(9)]);
    }

    #[test]
    fn invalid_query_point_is_rejected() {
        let tracker = tracker(1.0, DistanceMetric::GreatCircle);
        assert!(tracker.nearest(Point::new(95.0, 0.0), Some(1)).is_err());
    }

    #[test]
    fn matches_brute_force_for_both_metrics() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for metric in [DistanceMetric::GreatCircle, DistanceMetric::Planar] {
            for cell_size in [0.5, 2.0, 7.5] {
                let tracker = tracker(cell_size, metric);
                let now = current_timestamp();
                let mut drivers = Vec::new();

                for id in 1..=300 {
                    // Three clusters: near the antimeridian, near the north pole, and scattered
                    let location = match id % 3 {
                        0 => Point::new(
                            rng.gen_range(-5.0..5.0),
                            wrap_lon(180.0 + rng.gen_range(-5.0..5.0)),
                        ),
                        1 => Point::new(rng.gen_range(80.0..=90.0), rng.gen_range(-180.0..=180.0)),
                        _ => Point::new(rng.gen_range(-60.0..60.0), rng.gen_range(-180.0..=180.0)),
                    };
                    tracker.ingest(DriverId(id), location, now).expect("accepted");
                    drivers.push((DriverId(id), location));
                }

                for _ in 0..60 {
                    let query = match rng.gen_range(0..3) {
                        0 => Point::new(rng.gen_range(-3.0..3.0), wrap_lon(180.0 + rng.gen_range(-3.0..3.0))),
                        1 => Point::new(rng.gen_range(84.0..=90.0), rng.gen_range(-180.0..=180.0)),
                        _ => Point::new(rng.gen_range(-90.0..=90.0), rng.gen_range(-180.0..=180.0)),
                    };
                    let k = rng.gen_range(1..=12);

                    let found: Vec<DriverId> = tracker
                        .nearest_at(query, Some(k), now)
                        .expect("valid query")
                        .into_iter()
                        .map(|driver| driver.driver_id)
                        .collect();

                    assert_eq!(found.len(), k.min(drivers.len()));
                    assert_eq!(
                        found,
                        brute_force(metric, &drivers, &query, k),
                        "{metric} cell {cell_size} query {query:?} k {k}"
                    );
                }
            }
        }
    }

    #[test]
    fn results_are_sorted_by_distance() {
        let mut rng = StdRng::seed_from_u64(17);
        let tracker = tracker(0.25, DistanceMetric::GreatCircle);
        let now = current_timestamp();

        for id in 1..=200 {
            let location = Point::new(rng.gen_range(12.0..13.5), rng.gen_range(77.0..78.5));
            tracker.ingest(DriverId(id), location, now).expect("accepted");
        }

        let found = tracker
            .nearest_at(Point::new(12.9, 77.6), Some(25), now)
            .expect("valid query");
        assert_eq!(found.len(), 25);
        assert!(found.windows(2).all(|pair| pair[0].distance <= pair[1].distance));
    }
}

#[cfg(test)]
mod freshness {
    use driver_location_service::{
        common::{types::*, utils::current_timestamp},
        tools::error::AppError,
        tracker::{LocationTracker, TrackerConfig},
    };

    #[test]
    fn reaper_evicts_stale_drivers() {
        let tracker = LocationTracker::new(TrackerConfig {
            cell_size_degrees: 1.0,
            stale_threshold: 300,
            ..TrackerConfig::default()
        })
        .expect("valid tracker config");
        let TimeStamp(t0) = current_timestamp();

        let stale = tracker
            .ingest(DriverId(9), Point::new(12.9, 77.6), TimeStamp(t0))
            .expect("accepted");
        tracker
            .ingest_at(
                DriverId(10),
                Point::new(12.95, 77.65),
                TimeStamp(t0 + 100),
                TimeStamp(t0 + 100),
            )
            .expect("accepted");

        let later = TimeStamp(t0 + 301);

        // Excluded from queries even before the reaper runs
        let nearest: Vec<DriverId> = tracker
            .nearest_at(Point::new(12.9, 77.6), Some(5), later)
            .expect("valid query")
            .into_iter()
            .map(|driver| driver.driver_id)
            .collect();
        assert_eq!(nearest, vec![DriverId(10)]);
        assert_eq!(
            tracker.locate_at(DriverId(9), later),
            Err(AppError::UnknownDriver(DriverId(9)))
        );

        // Exactly at the threshold the driver is still live
        assert_eq!(tracker.sweep(TimeStamp(t0 + 300)), 0);
        assert_eq!(tracker.sweep(later), 1);

        assert!(tracker.registry().get(&DriverId(9)).is_none());
        assert!(!tracker.index().members(&stale.cell).contains(&DriverId(9)));
        assert!(tracker.locate_at(DriverId(10), later).is_ok());
        assert_eq!(tracker.stats().live_drivers, 1);
        assert!(tracker.verify_consistency().is_ok());

        // An evicted driver starts afresh on its next ping
        tracker
            .ingest_at(
                DriverId(9),
                Point::new(12.9, 77.6),
                TimeStamp(t0 + 400),
                TimeStamp(t0 + 400),
            )
            .expect("accepted");
        assert!(tracker.locate_at(DriverId(9), TimeStamp(t0 + 400)).is_ok());
    }

    #[test]
    fn sweep_prunes_empty_cells() {
        let tracker = LocationTracker::new(TrackerConfig {
            cell_size_degrees: 1.0,
            stale_threshold: 10,
            ..TrackerConfig::default()
        })
        .expect("valid tracker config");
        let TimeStamp(t0) = current_timestamp();

        for id in 1..=20 {
            tracker
                .ingest(DriverId(id), Point::new(id as f64, id as f64), TimeStamp(t0))
                .expect("accepted");
        }
        assert_eq!(tracker.index().cell_count(), 20);

        assert_eq!(tracker.sweep(TimeStamp(t0 + 11)), 20);
        assert_eq!(tracker.index().cell_count(), 0);
        assert!(tracker.registry().is_empty());
    }
}

#[cfg(test)]
mod concurrency {
    use driver_location_service::{
        common::{types::*, utils::current_timestamp},
        tracker::{LocationTracker, TrackerConfig},
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::sync::atomic::{AtomicBool, Ordering};

    const WRITERS: i64 = 8;
    const DRIVERS_PER_WRITER: i64 = 25;
    const UPDATES_PER_WRITER: i64 = 2_000;

    fn tracker() -> LocationTracker {
        LocationTracker::new(TrackerConfig {
            cell_size_degrees: 0.5,
            max_clock_skew: 3_600,
            ..TrackerConfig::default()
        })
        .expect("valid tracker config")
    }

    /// Writers on disjoint driver ids race against readers that keep checking that
    /// every driver sits in exactly the cell its record names.
    #[test]
    fn index_stays_consistent_under_concurrent_ingestion() {
        let tracker = tracker();
        let TimeStamp(t0) = current_timestamp();
        let writers_done = AtomicBool::new(false);

        let last_locations: Vec<Vec<(DriverId, Point)>> = std::thread::scope(|scope| {
            let writers: Vec<_> = (0..WRITERS)
                .map(|writer| {
                    let tracker = &tracker;
                    scope.spawn(move || {
                        let mut rng = StdRng::seed_from_u64(writer as u64);
                        let first_id = writer * DRIVERS_PER_WRITER + 1;
                        let mut last = Vec::new();

                        for update in 0..UPDATES_PER_WRITER {
                            let driver_id = DriverId(first_id + update % DRIVERS_PER_WRITER);
                            let location =
                                Point::new(rng.gen_range(10.0..14.0), rng.gen_range(75.0..79.0));
                            tracker
                                .ingest(driver_id, location, TimeStamp(t0 + update))
                                .expect("increasing timestamps are accepted");
                            if update >= UPDATES_PER_WRITER - DRIVERS_PER_WRITER {
                                last.push((driver_id, location));
                            }
                        }
                        last
                    })
                })
                .collect();

            let readers: Vec<_> = (0..2)
                .map(|_| {
                    let tracker = &tracker;
                    let writers_done = &writers_done;
                    scope.spawn(move || {
                        while !writers_done.load(Ordering::Relaxed) {
                            tracker
                                .verify_consistency()
                                .expect("index and registry agree");
                            let nearest = tracker
                                .nearest(Point::new(12.0, 77.0), Some(10))
                                .expect("valid query");
                            assert!(nearest.len() <= 10);
                            let mut unique = nearest.clone();
                            unique.sort();
                            unique.dedup();
                            assert_eq!(unique.len(), nearest.len());
                        }
                    })
                })
                .collect();

            let last = writers
                .into_iter()
                .map(|writer| writer.join().expect("writer thread panicked"))
                .collect();
            writers_done.store(true, Ordering::Relaxed);
            for reader in readers {
                reader.join().expect("reader thread panicked");
            }
            last
        });

        assert!(tracker.verify_consistency().is_ok());
        assert_eq!(
            tracker.stats().live_drivers,
            (WRITERS * DRIVERS_PER_WRITER) as usize
        );
        for (driver_id, location) in last_locations.into_iter().flatten() {
            let record = tracker.locate(driver_id).expect("driver is tracked");
            assert_eq!(record.location, location);
        }
    }

    /// Several threads push interleaved timestamps for the same driver; only the
    /// newest ping may survive.
    #[test]
    fn same_driver_keeps_newest_ping() {
        let tracker = tracker();
        let TimeStamp(t0) = current_timestamp();
        let driver_id = DriverId(77);

        std::thread::scope(|scope| {
            for writer in 0..4_i64 {
                let tracker = &tracker;
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(100 + writer as u64);
                    for step in 0..500_i64 {
                        let location =
                            Point::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
                        // Stale rejections are expected here
                        let _ = tracker.ingest(driver_id, location, TimeStamp(t0 + step * 4 + writer));
                    }
                });
            }
        });

        let record = tracker.locate(driver_id).expect("driver is tracked");
        assert_eq!(record.last_update, TimeStamp(t0 + 499 * 4 + 3));
        assert_eq!(tracker.index().members(&record.cell), vec![driver_id]);
        assert_eq!(tracker.stats().occupied_cells, 1);
        assert!(tracker.verify_consistency().is_ok());
    }

    #[test]
    fn sweeps_race_with_ingestion() {
        let tracker = LocationTracker::new(TrackerConfig {
            cell_size_degrees: 0.5,
            stale_threshold: 50,
            max_clock_skew: 3_600,
            ..TrackerConfig::default()
        })
        .expect("valid tracker config");
        let TimeStamp(t0) = current_timestamp();

        std::thread::scope(|scope| {
            for writer in 0..4_i64 {
                let tracker = &tracker;
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(200 + writer as u64);
                    for step in 0..1_000_i64 {
                        let driver_id = DriverId(writer * 1_000 + step % 40 + 1);
                        let location =
                            Point::new(rng.gen_range(0.0..3.0), rng.gen_range(0.0..3.0));
                        let _ = tracker.ingest(driver_id, location, TimeStamp(t0 + step));
                    }
                });
            }
            let tracker = &tracker;
            scope.spawn(move || {
                for round in 0..200_i64 {
                    tracker.sweep(TimeStamp(t0 + round * 5));
                }
            });
        });

        assert!(tracker.verify_consistency().is_ok());
    }
}

#[cfg(test)]
mod reaper_task {
    use driver_location_service::{
        common::{types::*, utils::current_timestamp},
        reaper::run_reaper,
        tracker::{LocationTracker, TrackerConfig},
    };
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn reaper_sweeps_and_stops_on_termination() {
        let tracker = Arc::new(
            LocationTracker::new(TrackerConfig {
                cell_size_degrees: 1.0,
                stale_threshold: 60,
                ..TrackerConfig::default()
            })
            .expect("valid tracker config"),
        );
        let TimeStamp(now) = current_timestamp();

        tracker
            .ingest(DriverId(1), Point::new(12.9, 77.6), TimeStamp(now - 1_000))
            .expect("accepted");
        tracker
            .ingest(DriverId(2), Point::new(12.9, 77.6), TimeStamp(now + 30))
            .expect("accepted");

        let graceful_termination_requested = Arc::new(AtomicBool::new(false));
        let reaper = tokio::spawn(run_reaper(
            tracker.clone(),
            3_600,
            graceful_termination_requested.clone(),
        ));

        // The first tick fires immediately
        sleep(Duration::from_millis(300)).await;
        assert!(tracker.registry().get(&DriverId(1)).is_none());
        assert!(tracker.registry().get(&DriverId(2)).is_some());

        graceful_termination_requested.store(true, Ordering::Relaxed);
        timeout(Duration::from_secs(5), reaper)
            .await
            .expect("reaper stops after termination is requested")
            .expect("reaper task panicked");
    }
}
