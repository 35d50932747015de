// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module

mod metrics_properties;
mod statistic_properties;
mod strategies;
