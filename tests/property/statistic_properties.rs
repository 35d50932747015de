// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for merging and reversing user statistics

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use trip_statistics::domain::{merge_contribution, reverse_contribution};
use trip_statistics::{compute_trip_metrics, Trip, UserId, UserStatistic};

use super::strategies::user_trips;

fn at() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-19T12:00:00Z")
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

fn empty() -> UserStatistic {
    UserStatistic::empty(Uuid::nil(), UserId::new("alice"), at())
}

fn merge_all<'a>(start: UserStatistic, trips: impl IntoIterator<Item = &'a Trip>) -> UserStatistic {
    trips.into_iter().fold(start, |state, trip| {
        let (metrics, summary) = compute_trip_metrics(trip).unwrap();
        merge_contribution(Some(&state), &state.user, &metrics, &summary, at()).unwrap()
    })
}

proptest! {
    /// Property: Merge order does not affect the result
    #[test]
    fn prop_merge_is_order_independent(
        trips in user_trips(1..6),
        rotation in 0usize..6,
    ) {
        let forward = merge_all(empty(), &trips);
        let backward = merge_all(empty(), trips.iter().rev());

        let mut rotated = trips.clone();
        let by = rotation % rotated.len();
        rotated.rotate_left(by);
        let rotated = merge_all(empty(), &rotated);

        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(&forward, &rotated);
    }

    /// Property: Reversing a merged trip restores the prior statistic exactly
    #[test]
    fn prop_reverse_undoes_merge(trips in user_trips(2..6)) {
        let (last, earlier) = trips.split_last().unwrap();
        let before = merge_all(empty(), earlier);
        let after = merge_all(before.clone(), [last]);

        let (metrics, _) = compute_trip_metrics(last).unwrap();
        let restored = reverse_contribution(&after, &metrics, &last.id, at()).unwrap();

        prop_assert_eq!(restored, before);
    }

    /// Property: Removing every trip again returns to zero
    #[test]
    fn prop_reverse_all_returns_to_zero(trips in user_trips(1..6)) {
        let full = merge_all(empty(), &trips);

        let drained = trips.iter().rev().fold(full, |state, trip| {
            let (metrics, _) = compute_trip_metrics(trip).unwrap();
            reverse_contribution(&state, &metrics, &trip.id, at()).unwrap()
        });

        prop_assert!(drained.metrics.is_zero());
        prop_assert_eq!(drained.trip_count(), 0);
    }

    /// Property: A trip can only be merged once
    #[test]
    fn prop_second_merge_is_rejected(trips in user_trips(1..4)) {
        let full = merge_all(empty(), &trips);
        let (metrics, summary) = compute_trip_metrics(&trips[0]).unwrap();

        let second = merge_contribution(Some(&full), &full.user, &metrics, &summary, at());
        prop_assert!(second.is_err());
    }
}
