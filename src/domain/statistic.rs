// Copyright (c) 2025 - Cowboy AI, Inc.
//! User Statistic Aggregate
//!
//! One cumulative record per user. The record is immutable: merging or
//! reversing a trip produces a complete replacement that the repository
//! writes in a single compare-and-swap.
//!
//! # Contribution Rules
//!
//! ```text
//! merge:   next.metrics = prev.metrics + trip.metrics   trips ∪ {summary}
//! reverse: next.metrics = prev.metrics - trip.metrics   trips \ {trip_id}
//! ```
//!
//! - A trip contributes at most once (`AlreadyContributed`)
//! - Only contributed trips can be reversed (`NotContributed`)
//! - Totals never wrap; an overflowing contribution is rejected (`Overflow`)
//! - Reversing the last trip leaves a zeroed record, never deletes it

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::metrics::{TripMetrics, TripSummary};
use crate::domain::trip::{TripId, UserId};
use crate::errors::{StatisticsError, StatisticsResult};

/// Cumulative driving statistics of one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatistic {
    /// Storage record id
    pub id: Uuid,

    /// Owning user, exactly one record per user
    pub user: UserId,

    /// Sum of the metrics of every contributed trip
    pub metrics: TripMetrics,

    /// Contributed trips keyed by trip id
    #[serde(default)]
    pub trips: BTreeMap<TripId, TripSummary>,

    /// Time of the last merge or reverse
    pub updated_at: DateTime<Utc>,
}

impl UserStatistic {
    /// Empty record, the starting point for the first contribution
    pub fn empty(id: Uuid, user: UserId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            user,
            metrics: TripMetrics::zero(),
            trips: BTreeMap::new(),
            updated_at: at,
        }
    }

    pub fn has_trip(&self, trip: &TripId) -> bool {
        self.trips.contains_key(trip)
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }
}

/// Merge one trip into the user's statistic
///
/// A missing `previous` record is treated as an empty one with a fresh id,
/// so the first and every later contribution go through the same path.
///
/// # Errors
/// - `AlreadyContributed` if the trip is already in the record
pub fn merge_contribution(
    previous: Option<&UserStatistic>,
    user: &UserId,
    metrics: &TripMetrics,
    summary: &TripSummary,
    at: DateTime<Utc>,
) -> StatisticsResult<UserStatistic> {
    let base = match previous {
        Some(prev) => prev.clone(),
        None => UserStatistic::empty(Uuid::now_v7(), user.clone(), at),
    };

    if base.has_trip(&summary.trip) {
        return Err(StatisticsError::AlreadyContributed {
            user: user.clone(),
            trip: summary.trip.clone(),
        });
    }

    let totals = base
        .metrics
        .checked_add(*metrics)
        .ok_or_else(|| StatisticsError::Overflow {
            user: user.clone(),
            trip: summary.trip.clone(),
        })?;

    let mut trips = base.trips;
    trips.insert(summary.trip.clone(), summary.clone());

    Ok(UserStatistic {
        metrics: totals,
        trips,
        updated_at: at,
        ..base
    })
}

/// Subtract one previously merged trip from the user's statistic
///
/// # Errors
/// - `NotContributed` if the trip is not in the record
pub fn reverse_contribution(
    previous: &UserStatistic,
    metrics: &TripMetrics,
    trip: &TripId,
    at: DateTime<Utc>,
) -> StatisticsResult<UserStatistic> {
    if !previous.has_trip(trip) {
        return Err(StatisticsError::NotContributed {
            user: previous.user.clone(),
            trip: trip.clone(),
        });
    }

    let totals = previous
        .metrics
        .checked_sub(*metrics)
        .ok_or_else(|| StatisticsError::Overflow {
            user: previous.user.clone(),
            trip: trip.clone(),
        })?;

    let mut trips = previous.trips.clone();
    trips.remove(trip);

    Ok(UserStatistic {
        metrics: totals,
        trips,
        updated_at: at,
        ..previous.clone()
    })
}

/// Build a statistic from scratch out of per-trip contributions
///
/// Used for backfilling a user whose record is missing or suspect.
pub fn fold_contributions<'a, I>(
    id: Uuid,
    user: &UserId,
    contributions: I,
    at: DateTime<Utc>,
) -> StatisticsResult<UserStatistic>
where
    I: IntoIterator<Item = &'a (TripMetrics, TripSummary)>,
{
    contributions.into_iter().try_fold(
        UserStatistic::empty(id, user.clone(), at),
        |state, (metrics, summary)| merge_contribution(Some(&state), user, metrics, summary, at),
    )
}
