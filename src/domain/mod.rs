// Copyright (c) 2025 - Cowboy AI, Inc.
//! Driving Statistics Domain Model
//!
//! Pure value objects and functions. Nothing in this module performs I/O;
//! timestamps are passed in by the service layer.
//!
//! # Value Objects
//!
//! - [`Trip`] / [`Measurement`] / [`GeoPoint`] - input supplied by the trip store
//! - [`TripMetrics`] / [`Span`] - distance and duration, split by [`SpeedBucket`]
//! - [`TripSummary`] - the trip id and endpoints kept in the aggregate
//!
//! # Aggregate
//!
//! - [`UserStatistic`] - one cumulative record per user
//! - [`merge_contribution`] / [`reverse_contribution`] - produce replacements

pub mod geodesic;
pub mod metrics;
pub mod statistic;
pub mod trip;

pub use geodesic::geodesic_distance_km;
pub use metrics::{
    compute_trip_metrics, pair_contributions, PairContribution, Span, SpeedBucket, TripMetrics,
    TripSummary,
};
pub use statistic::{fold_contributions, merge_contribution, reverse_contribution, UserStatistic};
pub use trip::{GeoPoint, Measurement, Trip, TripId, UserId, SPEED_PHENOMENON};
