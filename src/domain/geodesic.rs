// Copyright (c) 2025 - Cowboy AI, Inc.
//! Geodesic distance on the WGS84 ellipsoid

use geo::{Distance, Geodesic, Point};

use crate::domain::trip::GeoPoint;

/// Surface distance between two points in kilometres
pub fn geodesic_distance_km(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let a = Point::new(from.longitude, from.latitude);
    let b = Point::new(to.longitude, to.latitude);

    Geodesic::distance(a, b) / 1000.0
}
