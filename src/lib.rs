//! Incremental per-user driving statistics
//!
//! This crate keeps one cumulative statistic per user (distance and driving
//! time, split by speed regime) and updates it as trips are finalized or
//! deleted, without rescanning trip history.
//!
//! # Layers
//!
//! ```text
//! TripEventSubscriber ─► AggregationService ─► StatisticRepository ─► StatisticStore
//!                              │                      │
//!                     compute_trip_metrics   merge / reverse (pure)
//! ```

pub mod config;
pub mod domain;
pub mod errors;
pub mod repository;
pub mod service;
pub mod store;
pub mod subscriber;

// Re-export commonly used types
pub use config::{DuplicatePolicy, RepositoryConfig, StatisticsConfig};
pub use domain::{
    compute_trip_metrics, GeoPoint, Measurement, Span, SpeedBucket, Trip, TripId, TripMetrics,
    TripSummary, UserId, UserStatistic,
};
pub use errors::{StatisticsError, StatisticsResult, StoreError, StoreResult};
pub use repository::StatisticRepository;
pub use service::{AggregationService, StatisticsService};
pub use store::{InMemoryStatisticStore, NatsStatisticStore, StatisticStore, Versioned};
pub use subscriber::{Delivery, TripEvent, TripEventDispatcher, TripEventSubscriber, TripEventsConfig};
