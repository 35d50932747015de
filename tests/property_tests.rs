// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Entry Point
//!
//! This test suite uses proptest to verify the arithmetic properties the
//! incremental statistic relies on: per-trip totals are the sum of their
//! pairs, and merging is commutative and reversible.

mod property;
