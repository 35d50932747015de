// Copyright (c) 2025 - Cowboy AI, Inc.
//! Generators for trips and measurements

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use trip_statistics::{GeoPoint, Measurement, Trip, TripId, UserId};

fn origin() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-19T12:00:00Z")
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

/// One step of a trip: position offset, seconds since the previous
/// measurement and the optional speed reading
fn step() -> impl Strategy<Value = (f64, f64, i64, Option<f64>)> {
    (
        -0.02f64..0.02,
        -0.02f64..0.02,
        0i64..600,
        prop::option::of(0.0f64..200.0),
    )
}

/// Valid trip with `0..max` measurements and non-decreasing timestamps
pub fn trip(id: String, max: usize) -> impl Strategy<Value = Trip> {
    prop::collection::vec(step(), 0..max).prop_map(move |steps| {
        let mut latitude = 51.96;
        let mut longitude = 7.62;
        let mut time = origin();

        let measurements = steps
            .into_iter()
            .map(|(dlat, dlon, seconds, speed)| {
                latitude += dlat;
                longitude += dlon;
                time += Duration::seconds(seconds);

                let m = Measurement::new(time, GeoPoint::new(latitude, longitude));
                match speed {
                    Some(kmh) => m.with_speed(kmh),
                    None => m,
                }
            })
            .collect();

        Trip::new(TripId::new(id.clone()), UserId::new("alice"), measurements)
    })
}

/// Several trips of one user with distinct ids
pub fn user_trips(count: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Trip>> {
    count.prop_flat_map(|n| {
        (0..n)
            .map(|i| trip(format!("trip-{i}"), 10))
            .collect::<Vec<_>>()
    })
}
