// Copyright (c) 2025 - Cowboy AI, Inc.
//! User Statistic Repository
//!
//! Owns the one-statistic-per-user invariant and turns the pure merge and
//! reverse functions into atomic read-modify-write cycles.
//!
//! # Transaction Semantics
//!
//! Each write operation is an optimistic transaction:
//! 1. Load the user's record and its revision
//! 2. Compute the replacement (pure function)
//! 3. Write it with compare-and-swap on the revision
//! 4. On a lost race, start over from step 1
//!
//! After `max_conflict_retries` lost races the operation fails with
//! `ConcurrencyConflict`. Data errors (`AlreadyContributed`,
//! `NotContributed`, `NotFound`, `ConsistencyViolation`) are never retried,
//! and no error path writes anything.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RepositoryConfig;
use crate::domain::{
    fold_contributions, merge_contribution, reverse_contribution, TripId, TripMetrics, TripSummary,
    UserId, UserStatistic,
};
use crate::errors::{StatisticsError, StatisticsResult, StoreError};
use crate::store::{StatisticStore, Versioned};

/// Repository for per-user statistic aggregates
#[derive(Clone)]
pub struct StatisticRepository {
    store: Arc<dyn StatisticStore>,
    config: RepositoryConfig,
}

impl StatisticRepository {
    pub fn new(store: Arc<dyn StatisticStore>, config: RepositoryConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Current statistic of a user, `None` if the user has none yet
    ///
    /// # Errors
    /// - `ConsistencyViolation` if storage holds more than one record
    pub async fn get_by_user(&self, user: &UserId) -> StatisticsResult<Option<UserStatistic>> {
        Ok(self.load(user).await?.map(|v| v.record))
    }

    /// Add a trip's metrics to the user's statistic
    ///
    /// Creates the statistic on the first contribution when `auto_create` is
    /// enabled.
    ///
    /// # Errors
    /// - `AlreadyContributed` if the trip was merged before
    /// - `NotFound` if the user has no statistic and `auto_create` is off
    /// - `ConsistencyViolation`, `ConcurrencyConflict`, `Store`
    pub async fn merge(
        &self,
        user: &UserId,
        metrics: &TripMetrics,
        summary: &TripSummary,
    ) -> StatisticsResult<UserStatistic> {
        let auto_create = self.config.auto_create;

        let merged = self
            .transact(user, |current| {
                if current.is_none() && !auto_create {
                    return Err(StatisticsError::NotFound(user.clone()));
                }
                merge_contribution(current, user, metrics, summary, Utc::now())
            })
            .await?;

        info!(
            user = %user,
            trip = %summary.trip,
            trips = merged.trip_count(),
            "Merged trip into user statistic"
        );
        Ok(merged)
    }

    /// Subtract a previously merged trip from the user's statistic
    ///
    /// # Errors
    /// - `NotFound` if the user has no statistic
    /// - `NotContributed` if the trip is not part of it
    /// - `ConsistencyViolation`, `ConcurrencyConflict`, `Store`
    pub async fn reverse(
        &self,
        user: &UserId,
        metrics: &TripMetrics,
        trip: &TripId,
    ) -> StatisticsResult<UserStatistic> {
        let reversed = self
            .transact(user, |current| match current {
                Some(previous) => reverse_contribution(previous, metrics, trip, Utc::now()),
                None => Err(StatisticsError::NotFound(user.clone())),
            })
            .await?;

        info!(
            user = %user,
            trip = %trip,
            trips = reversed.trip_count(),
            "Reversed trip from user statistic"
        );
        Ok(reversed)
    }

    /// Make sure the user has a statistic, creating an empty one if needed
    ///
    /// Idempotent: an existing statistic is returned unchanged.
    pub async fn initialize(&self, user: &UserId) -> StatisticsResult<UserStatistic> {
        for attempt in 1..=self.config.max_conflict_retries {
            if let Some(existing) = self.load(user).await? {
                return Ok(existing.record);
            }

            let empty = UserStatistic::empty(Uuid::now_v7(), user.clone(), Utc::now());
            match self.store.insert(&empty).await {
                Ok(revision) => {
                    info!(user = %user, revision, "Initialized empty user statistic");
                    return Ok(empty);
                }
                Err(StoreError::Conflict(reason)) => {
                    debug!(user = %user, attempt, %reason, "Statistic created concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(self.exhausted(user))
    }

    /// Overwrite the user's statistic with `statistic`
    ///
    /// Backfill path: the stored record id is kept when one exists, totals
    /// and trip set are taken from `statistic` as they are.
    pub async fn replace_all(
        &self,
        user: &UserId,
        statistic: &UserStatistic,
    ) -> StatisticsResult<UserStatistic> {
        let replaced = self
            .transact(user, |current| {
                Ok(UserStatistic {
                    id: current.map(|c| c.id).unwrap_or(statistic.id),
                    user: user.clone(),
                    updated_at: Utc::now(),
                    ..statistic.clone()
                })
            })
            .await?;

        info!(user = %user, trips = replaced.trip_count(), "Replaced user statistic");
        Ok(replaced)
    }

    /// Replace the user's statistic with one folded from `contributions`
    pub async fn rebuild(
        &self,
        user: &UserId,
        contributions: &[(TripMetrics, TripSummary)],
    ) -> StatisticsResult<UserStatistic> {
        let folded = fold_contributions(Uuid::now_v7(), user, contributions, Utc::now())?;
        self.replace_all(user, &folded).await
    }

    /// Load the single record of a user
    async fn load(&self, user: &UserId) -> StatisticsResult<Option<Versioned<UserStatistic>>> {
        let mut found = self.store.find_by_user(user).await?;

        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            count => {
                error!(
                    user = %user,
                    count,
                    "More than one statistic record stored for user"
                );
                Err(StatisticsError::ConsistencyViolation {
                    user: user.clone(),
                    count,
                })
            }
        }
    }

    /// Optimistic read-modify-write loop
    ///
    /// `next` computes the replacement from the current record (or `None`)
    /// and is re-run on every attempt. Its errors end the loop immediately.
    async fn transact<F>(&self, user: &UserId, mut next: F) -> StatisticsResult<UserStatistic>
    where
        F: FnMut(Option<&UserStatistic>) -> StatisticsResult<UserStatistic>,
    {
        for attempt in 1..=self.config.max_conflict_retries {
            let current = self.load(user).await?;
            let replacement = next(current.as_ref().map(|v| &v.record))?;

            let written = match &current {
                Some(v) => self.store.replace(&replacement, v.revision).await,
                None => self.store.insert(&replacement).await,
            };

            match written {
                Ok(revision) => {
                    debug!(user = %user, attempt, revision, "Wrote user statistic");
                    return Ok(replacement);
                }
                Err(StoreError::Conflict(reason)) => {
                    debug!(user = %user, attempt, %reason, "Lost write race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(self.exhausted(user))
    }

    fn exhausted(&self, user: &UserId) -> StatisticsError {
        warn!(
            user = %user,
            attempts = self.config.max_conflict_retries,
            "Giving up after repeated write conflicts"
        );
        StatisticsError::ConcurrencyConflict {
            user: user.clone(),
            attempts: self.config.max_conflict_retries,
        }
    }
}
