// Copyright (c) 2025 - Cowboy AI, Inc.
//! Aggregation Service Layer
//!
//! Reacts to trip lifecycle events by running the metrics calculator and
//! handing the result to the repository.
//!
//! # Service Pattern
//!
//! ```text
//! trip finalized → compute_trip_metrics → repository.merge
//! trip deleted   → compute_trip_metrics → repository.reverse
//! ```
//!
//! Deletion recomputes the metrics from the still-available measurements, so
//! exactly what was added is subtracted. The service never persists trips
//! or measurements.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::domain::{
    compute_trip_metrics, merge_contribution, Trip, TripMetrics, TripSummary, UserId, UserStatistic,
};
use crate::errors::StatisticsResult;
use crate::repository::StatisticRepository;

/// Application service for user driving statistics
#[async_trait]
pub trait StatisticsService: Send + Sync {
    /// Add a finalized trip to its owner's statistic
    async fn on_trip_finalized(&self, trip: &Trip) -> StatisticsResult<UserStatistic>;

    /// Remove a deleted trip from its owner's statistic
    async fn on_trip_deleted(&self, trip: &Trip) -> StatisticsResult<UserStatistic>;

    /// Current statistic of a user
    async fn statistic_for(&self, user: &UserId) -> StatisticsResult<Option<UserStatistic>>;

    /// Recompute a user's statistic from their complete trip history
    async fn rebuild(&self, user: &UserId, trips: &[Trip]) -> StatisticsResult<UserStatistic>;
}

/// Repository-backed implementation of [`StatisticsService`]
#[derive(Clone)]
pub struct AggregationService {
    repository: StatisticRepository,
}

impl AggregationService {
    pub fn new(repository: StatisticRepository) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &StatisticRepository {
        &self.repository
    }

    /// The statistic `previous` would become after adding `trip`
    ///
    /// Nothing is written.
    pub fn preview_with_trip(&self, previous: &UserStatistic, trip: &Trip) -> StatisticsResult<UserStatistic> {
        let (metrics, summary) = compute_trip_metrics(trip)?;
        merge_contribution(Some(previous), &previous.user, &metrics, &summary, Utc::now())
    }

    fn contribution(trip: &Trip) -> StatisticsResult<(TripMetrics, TripSummary)> {
        let (metrics, summary) = compute_trip_metrics(trip)?;
        debug!(
            user = %trip.user,
            trip = %trip.id,
            measurements = trip.measurements.len(),
            distance_km = metrics.total_distance_km(),
            duration_h = metrics.total_duration_hours(),
            "Computed trip metrics"
        );
        Ok((metrics, summary))
    }
}

#[async_trait]
impl StatisticsService for AggregationService {
    async fn on_trip_finalized(&self, trip: &Trip) -> StatisticsResult<UserStatistic> {
        let (metrics, summary) = Self::contribution(trip)?;
        self.repository.merge(&trip.user, &metrics, &summary).await
    }

    async fn on_trip_deleted(&self, trip: &Trip) -> StatisticsResult<UserStatistic> {
        let (metrics, _) = Self::contribution(trip)?;
        self.repository.reverse(&trip.user, &metrics, &trip.id).await
    }

    async fn statistic_for(&self, user: &UserId) -> StatisticsResult<Option<UserStatistic>> {
        self.repository.get_by_user(user).await
    }

    async fn rebuild(&self, user: &UserId, trips: &[Trip]) -> StatisticsResult<UserStatistic> {
        debug!(user = %user, trips = trips.len(), "Rebuilding user statistic");

        let contributions = trips
            .iter()
            .filter(|trip| &trip.user == user)
            .map(Self::contribution)
            .collect::<StatisticsResult<Vec<_>>>()?;

        self.repository.rebuild(user, &contributions).await
    }
}
