// Copyright (c) 2025 - Cowboy AI, Inc.
//! Trip Metrics Calculator
//!
//! Turns the ordered measurement sequence of a trip into distance and
//! duration totals, split by speed regime.
//!
//! # Pairwise Accumulation
//!
//! ```text
//! m[0] ── m[1] ── m[2] ── ... ── m[n-1]
//!   pair 0  pair 1          pair n-2
//! ```
//!
//! Each consecutive pair contributes its geodesic distance and elapsed time
//! to the trip total and to at most one speed bucket. The bucket is chosen by
//! the speed of the *leading* measurement of the pair:
//!
//! | leading speed   | bucket          |
//! |-----------------|-----------------|
//! | not recorded    | `Unknown`       |
//! | > 130 km/h      | `Above130`      |
//! | < 60 km/h       | `Below60`       |
//! | 60..=130 km/h   | none, total only|
//!
//! # Exact Units
//!
//! Pair distances are quantised to whole millimetres and durations are kept
//! in whole milliseconds. All sums are integer sums, so adding and later
//! subtracting the same metrics restores an aggregate bit for bit.
//! Kilometres and hours are derived on read.

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::domain::geodesic::geodesic_distance_km;
use crate::domain::trip::{GeoPoint, Trip, TripId};
use crate::errors::{StatisticsError, StatisticsResult};

/// Milliseconds per hour
pub const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Millimetres per kilometre
pub const MILLIMETRES_PER_KM: f64 = 1_000_000.0;

/// Pairs led by a speed below this limit count as slow driving
pub const SLOW_LIMIT_KMH: f64 = 60.0;

/// Pairs led by a speed above this limit count as fast driving
pub const FAST_LIMIT_KMH: f64 = 130.0;

/// Speed regime sub-total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedBucket {
    Below60,
    Above130,
    Unknown,
}

impl SpeedBucket {
    /// Bucket for a pair led by `speed`, `None` for the 60..=130 km/h band
    pub fn classify(speed: Option<f64>) -> Option<SpeedBucket> {
        match speed {
            None => Some(SpeedBucket::Unknown),
            Some(s) if s > FAST_LIMIT_KMH => Some(SpeedBucket::Above130),
            Some(s) if s < SLOW_LIMIT_KMH => Some(SpeedBucket::Below60),
            Some(_) => None,
        }
    }
}

/// Distance and duration accumulated over some set of measurement pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub distance_mm: i64,
    pub duration_ms: i64,
}

impl Span {
    pub fn new(distance_mm: i64, duration_ms: i64) -> Self {
        Self {
            distance_mm,
            duration_ms,
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_mm as f64 / MILLIMETRES_PER_KM
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_ms as f64 / MILLIS_PER_HOUR
    }

    pub fn is_zero(&self) -> bool {
        self.distance_mm == 0 && self.duration_ms == 0
    }

    /// `None` if either component overflows
    pub fn checked_add(self, rhs: Span) -> Option<Span> {
        Some(Span {
            distance_mm: self.distance_mm.checked_add(rhs.distance_mm)?,
            duration_ms: self.duration_ms.checked_add(rhs.duration_ms)?,
        })
    }

    /// `None` if either component overflows
    pub fn checked_sub(self, rhs: Span) -> Option<Span> {
        Some(Span {
            distance_mm: self.distance_mm.checked_sub(rhs.distance_mm)?,
            duration_ms: self.duration_ms.checked_sub(rhs.duration_ms)?,
        })
    }
}

// Plain operators panic on overflow in debug builds; accumulation uses `checked_*`.
impl Add for Span {
    type Output = Span;

    fn add(self, rhs: Span) -> Span {
        Span {
            distance_mm: self.distance_mm + rhs.distance_mm,
            duration_ms: self.duration_ms + rhs.duration_ms,
        }
    }
}

impl Sub for Span {
    type Output = Span;

    fn sub(self, rhs: Span) -> Span {
        Span {
            distance_mm: self.distance_mm - rhs.distance_mm,
            duration_ms: self.duration_ms - rhs.duration_ms,
        }
    }
}

/// Per-trip (or cumulative) driving metrics
///
/// The three buckets are mutually exclusive; pairs in the 60..=130 km/h band
/// only reach `total`, so `total` is at least as large as any bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripMetrics {
    pub total: Span,
    pub below_60: Span,
    pub above_130: Span,
    pub unknown_speed: Span,
}

impl TripMetrics {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn bucket(&self, bucket: SpeedBucket) -> Span {
        match bucket {
            SpeedBucket::Below60 => self.below_60,
            SpeedBucket::Above130 => self.above_130,
            SpeedBucket::Unknown => self.unknown_speed,
        }
    }

    /// Metrics with one more pair accumulated, `None` on overflow
    pub fn with_pair(self, pair: &PairContribution) -> Option<TripMetrics> {
        let mut next = TripMetrics {
            total: self.total.checked_add(pair.span)?,
            ..self
        };
        match pair.bucket {
            Some(SpeedBucket::Below60) => next.below_60 = next.below_60.checked_add(pair.span)?,
            Some(SpeedBucket::Above130) => next.above_130 = next.above_130.checked_add(pair.span)?,
            Some(SpeedBucket::Unknown) => {
                next.unknown_speed = next.unknown_speed.checked_add(pair.span)?
            }
            None => {}
        }
        Some(next)
    }

    /// Component-wise sum, `None` on overflow
    pub fn checked_add(self, rhs: TripMetrics) -> Option<TripMetrics> {
        Some(TripMetrics {
            total: self.total.checked_add(rhs.total)?,
            below_60: self.below_60.checked_add(rhs.below_60)?,
            above_130: self.above_130.checked_add(rhs.above_130)?,
            unknown_speed: self.unknown_speed.checked_add(rhs.unknown_speed)?,
        })
    }

    /// Component-wise difference, `None` on overflow
    pub fn checked_sub(self, rhs: TripMetrics) -> Option<TripMetrics> {
        Some(TripMetrics {
            total: self.total.checked_sub(rhs.total)?,
            below_60: self.below_60.checked_sub(rhs.below_60)?,
            above_130: self.above_130.checked_sub(rhs.above_130)?,
            unknown_speed: self.unknown_speed.checked_sub(rhs.unknown_speed)?,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.total.is_zero()
            && self.below_60.is_zero()
            && self.above_130.is_zero()
            && self.unknown_speed.is_zero()
    }

    pub fn total_distance_km(&self) -> f64 {
        self.total.distance_km()
    }

    pub fn total_duration_hours(&self) -> f64 {
        self.total.duration_hours()
    }
}

impl Add for TripMetrics {
    type Output = TripMetrics;

    fn add(self, rhs: TripMetrics) -> TripMetrics {
        TripMetrics {
            total: self.total + rhs.total,
            below_60: self.below_60 + rhs.below_60,
            above_130: self.above_130 + rhs.above_130,
            unknown_speed: self.unknown_speed + rhs.unknown_speed,
        }
    }
}

impl Sub for TripMetrics {
    type Output = TripMetrics;

    fn sub(self, rhs: TripMetrics) -> TripMetrics {
        TripMetrics {
            total: self.total - rhs.total,
            below_60: self.below_60 - rhs.below_60,
            above_130: self.above_130 - rhs.above_130,
            unknown_speed: self.unknown_speed - rhs.unknown_speed,
        }
    }
}

/// Minimal record of a trip's contribution, kept for reversal and audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub trip: TripId,
    pub start: Option<GeoPoint>,
    pub end: Option<GeoPoint>,
}

impl TripSummary {
    /// Summary of a trip too short to have endpoints
    pub fn without_endpoints(trip: TripId) -> Self {
        Self {
            trip,
            start: None,
            end: None,
        }
    }
}

/// What one consecutive measurement pair adds to the trip metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairContribution {
    pub bucket: Option<SpeedBucket>,
    pub span: Span,
}

/// Validated view of one measurement
struct Sample {
    point: GeoPoint,
    millis: i64,
    speed: Option<f64>,
}

fn validate_samples(trip: &Trip) -> StatisticsResult<Vec<Sample>> {
    trip.measurements
        .iter()
        .enumerate()
        .map(|(index, m)| {
            let invalid = |reason: String| StatisticsError::InvalidMeasurement { index, reason };

            let point = m.point.ok_or_else(|| invalid("missing geometry".to_string()))?;
            point.validate().map_err(invalid)?;
            let speed = m.speed().map_err(invalid)?;

            Ok(Sample {
                point,
                millis: m.time.timestamp_millis(),
                speed,
            })
        })
        .collect()
}

/// Contributions of every consecutive measurement pair, in trip order
///
/// Iterates pairs `(m[i], m[i+1])` for `i` in `0..n-1`.
///
/// # Errors
/// - `InvalidMeasurement` if any measurement lacks geometry, has an
///   out-of-range coordinate or a non-numeric speed
/// - `InvalidMeasurement` if timestamps go backwards
pub fn pair_contributions(trip: &Trip) -> StatisticsResult<Vec<PairContribution>> {
    let samples = validate_samples(trip)?;

    samples
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let (this, next) = (&pair[0], &pair[1]);

            let duration_ms = next.millis - this.millis;
            if duration_ms < 0 {
                return Err(StatisticsError::InvalidMeasurement {
                    index: i + 1,
                    reason: format!("timestamp precedes previous measurement by {} ms", -duration_ms),
                });
            }

            let distance_mm =
                (geodesic_distance_km(&this.point, &next.point) * MILLIMETRES_PER_KM).round() as i64;

            Ok(PairContribution {
                bucket: SpeedBucket::classify(this.speed),
                span: Span::new(distance_mm, duration_ms),
            })
        })
        .collect()
}

/// Compute the metrics and summary of one trip
///
/// Pure function: same trip, same result. A trip with fewer than two
/// measurements yields zero metrics and a summary without endpoints.
pub fn compute_trip_metrics(trip: &Trip) -> StatisticsResult<(TripMetrics, TripSummary)> {
    let pairs = pair_contributions(trip)?;

    let metrics = pairs
        .iter()
        .enumerate()
        .try_fold(TripMetrics::zero(), |acc, (i, pair)| {
            acc.with_pair(pair).ok_or_else(|| StatisticsError::InvalidMeasurement {
                index: i + 1,
                reason: "accumulated distance or duration overflows".to_string(),
            })
        })?;

    let summary = if trip.measurements.len() < 2 {
        TripSummary::without_endpoints(trip.id.clone())
    } else {
        TripSummary {
            trip: trip.id.clone(),
            start: trip.measurements.first().and_then(|m| m.point),
            end: trip.measurements.last().and_then(|m| m.point),
        }
    };

    Ok((metrics, summary))
}
