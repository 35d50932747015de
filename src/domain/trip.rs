// Copyright (c) 2025 - Cowboy AI, Inc.
//! Trip and Measurement Value Objects
//!
//! Trips are supplied by the trip-persistence collaborator. This crate only
//! reads them; it never stores trips or measurements itself.
//!
//! # Invariants
//!
//! - Measurements within a trip are ordered by timestamp (producer-enforced,
//!   re-checked by the metrics calculator)
//! - Coordinates are WGS84 decimal degrees

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phenomenon name carrying the vehicle speed in km/h
pub const SPEED_PHENOMENON: &str = "Speed";

/// Identity of the user owning trips and statistics
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a recorded trip
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(String);

impl TripId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Geographic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check that both coordinates are finite and within WGS84 bounds
    pub fn validate(&self) -> Result<(), String> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(format!(
                "non-finite coordinate ({}, {})",
                self.latitude, self.longitude
            ));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(format!("latitude {} out of range", self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(format!("longitude {} out of range", self.longitude));
        }
        Ok(())
    }
}

/// One geolocated, timestamped sample with phenomenon values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub time: DateTime<Utc>,

    /// Missing geometry makes the whole trip unusable for statistics
    #[serde(default)]
    pub point: Option<GeoPoint>,

    #[serde(default)]
    pub values: BTreeMap<String, serde_json::Value>,
}

impl Measurement {
    pub fn new(time: DateTime<Utc>, point: GeoPoint) -> Self {
        Self {
            time,
            point: Some(point),
            values: BTreeMap::new(),
        }
    }

    /// Measurement without geometry
    pub fn without_point(time: DateTime<Utc>) -> Self {
        Self {
            time,
            point: None,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, phenomenon: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(phenomenon.into(), value.into());
        self
    }

    pub fn with_speed(self, speed_kmh: f64) -> Self {
        self.with_value(SPEED_PHENOMENON, speed_kmh)
    }

    pub fn phenomenon(&self, name: &str) -> Option<&serde_json::Value> {
        self.values.get(name)
    }

    /// Numeric speed in km/h.
    ///
    /// `Ok(None)` when no speed was recorded (or it was recorded as null),
    /// `Err` when a value is present but not numeric.
    pub fn speed(&self) -> Result<Option<f64>, String> {
        match self.phenomenon(SPEED_PHENOMENON) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| format!("non-numeric {} value: {}", SPEED_PHENOMENON, value)),
        }
    }
}

/// One completed vehicle journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub user: UserId,
    #[serde(default)]
    pub measurements: Vec<Measurement>,
}

impl Trip {
    pub fn new(id: TripId, user: UserId, measurements: Vec<Measurement>) -> Self {
        Self {
            id,
            user,
            measurements,
        }
    }
}
