// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for trip-statistics
//!
//! Deterministic trips and measurements shared by the integration tests.
//! All timestamps are derived from one fixed instant so tests are
//! reproducible.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use trip_statistics::{
    AggregationService, GeoPoint, InMemoryStatisticStore, Measurement, RepositoryConfig,
    StatisticRepository, Trip, TripId, UserId,
};

// Fixed test timestamp (2026-01-19T12:00:00Z)
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

pub const USER_ALICE: &str = "alice";
pub const USER_BOB: &str = "bob";

/// Münster, Prinzipalmarkt
pub const P1: GeoPoint = GeoPoint {
    latitude: 51.9625,
    longitude: 7.6280,
};

/// A few kilometres north-east of P1
pub const P2: GeoPoint = GeoPoint {
    latitude: 51.9900,
    longitude: 7.6800,
};

/// Further east
pub const P3: GeoPoint = GeoPoint {
    latitude: 52.0100,
    longitude: 7.7500,
};

/// Parse the fixed timestamp
pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

/// Fixed timestamp shifted by `minutes`
pub fn at_minute(minutes: i64) -> DateTime<Utc> {
    fixed_timestamp() + Duration::minutes(minutes)
}

/// Three measurements where the fast pair sits in the middle:
///
/// | t       | point | speed |
/// |---------|-------|-------|
/// | +0 min  | P1    | 80    |
/// | +10 min | P2    | 150   |
/// | +30 min | P3    | 40    |
pub fn reference_trip(id: &str, user: &str) -> Trip {
    Trip::new(
        TripId::new(id),
        UserId::new(user),
        vec![
            Measurement::new(at_minute(0), P1).with_speed(80.0),
            Measurement::new(at_minute(10), P2).with_speed(150.0),
            Measurement::new(at_minute(30), P3).with_speed(40.0),
        ],
    )
}

/// Straight trip at a constant speed, one measurement every `step` minutes
pub fn steady_trip(id: &str, user: &str, speed: f64, samples: usize, step: i64) -> Trip {
    let measurements = (0..samples)
        .map(|i| {
            let point = GeoPoint::new(51.90 + 0.01 * i as f64, 7.60);
            Measurement::new(at_minute(step * i as i64), point).with_speed(speed)
        })
        .collect();

    Trip::new(TripId::new(id), UserId::new(user), measurements)
}

/// Trip whose measurements carry no speed at all
pub fn speedless_trip(id: &str, user: &str) -> Trip {
    Trip::new(
        TripId::new(id),
        UserId::new(user),
        vec![
            Measurement::new(at_minute(0), P1),
            Measurement::new(at_minute(15), P2),
        ],
    )
}

/// Service over a fresh in-memory store
pub fn in_memory_service(config: RepositoryConfig) -> (AggregationService, InMemoryStatisticStore) {
    let store = InMemoryStatisticStore::new();
    let repository = StatisticRepository::new(Arc::new(store.clone()), config);
    (AggregationService::new(repository), store)
}
