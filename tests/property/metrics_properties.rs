// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for the Trip Metrics Calculator

use proptest::prelude::*;

use trip_statistics::domain::{pair_contributions, Span, TripMetrics};
use trip_statistics::compute_trip_metrics;

use super::strategies::trip;

proptest! {
    /// Property: Metrics are a pure function of the trip
    #[test]
    fn prop_metrics_are_deterministic(t in trip("t".to_string(), 20)) {
        let first = compute_trip_metrics(&t).unwrap();
        let second = compute_trip_metrics(&t).unwrap();

        prop_assert_eq!(first, second);
    }

    /// Property: Total equals the sum over all consecutive pairs
    #[test]
    fn prop_total_is_sum_of_pairs(t in trip("t".to_string(), 20)) {
        let (metrics, _) = compute_trip_metrics(&t).unwrap();
        let pairs = pair_contributions(&t).unwrap();

        prop_assert_eq!(pairs.len(), t.measurements.len().saturating_sub(1));

        let sum = pairs.iter().fold(Span::default(), |acc, p| acc + p.span);
        prop_assert_eq!(metrics.total, sum);
    }

    /// Property: Total equals the three buckets plus the 60..=130 band
    #[test]
    fn prop_total_is_buckets_plus_mid_band(t in trip("t".to_string(), 20)) {
        let (metrics, _) = compute_trip_metrics(&t).unwrap();
        let mid_band = pair_contributions(&t)
            .unwrap()
            .iter()
            .filter(|p| p.bucket.is_none())
            .fold(Span::default(), |acc, p| acc + p.span);

        prop_assert_eq!(
            metrics.total,
            metrics.below_60 + metrics.above_130 + metrics.unknown_speed + mid_band
        );
    }

    /// Property: No component is negative
    #[test]
    fn prop_components_are_non_negative(t in trip("t".to_string(), 20)) {
        let (metrics, _) = compute_trip_metrics(&t).unwrap();

        for span in [metrics.total, metrics.below_60, metrics.above_130, metrics.unknown_speed] {
            prop_assert!(span.distance_mm >= 0);
            prop_assert!(span.duration_ms >= 0);
            prop_assert!(span.distance_mm <= metrics.total.distance_mm);
            prop_assert!(span.duration_ms <= metrics.total.duration_ms);
        }
    }

    /// Property: Duration is last timestamp minus first
    #[test]
    fn prop_duration_spans_the_trip(t in trip("t".to_string(), 20)) {
        let (metrics, summary) = compute_trip_metrics(&t).unwrap();

        match (t.measurements.first(), t.measurements.last()) {
            (Some(first), Some(last)) if t.measurements.len() >= 2 => {
                prop_assert_eq!(
                    metrics.total.duration_ms,
                    (last.time - first.time).num_milliseconds()
                );
                prop_assert_eq!(summary.start, first.point);
                prop_assert_eq!(summary.end, last.point);
            }
            _ => {
                prop_assert_eq!(metrics, TripMetrics::zero());
                prop_assert!(summary.start.is_none() && summary.end.is_none());
            }
        }
    }
}
