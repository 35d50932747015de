// Copyright (c) 2025 - Cowboy AI, Inc.
//! Statistics Aggregator Service
//!
//! Listens to trip lifecycle events on NATS and keeps every user's driving
//! statistic up to date in a JetStream key-value bucket.
//!
//! Run with: cargo run --bin statistics-aggregator
//!
//! Prerequisites:
//! 1. NATS server with JetStream enabled (default: localhost:4222)
//! 2. Trip events published under `TRIP_SUBJECT_PREFIX` (default: `trips`),
//!    captured by the `TRIP_STREAM` stream (created when missing)

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use trip_statistics::{
    AggregationService, NatsStatisticStore, StatisticRepository, StatisticsConfig,
    TripEventDispatcher, TripEventSubscriber,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting statistics aggregator");

    let config = StatisticsConfig::from_env().context("Invalid statistics configuration")?;
    info!(
        nats_url = %config.nats_url,
        bucket = %config.store.bucket,
        subjects = %config.events.subjects(),
        stream = %config.events.stream,
        consumer = %config.events.consumer,
        max_retries = config.repository.max_conflict_retries,
        auto_create = config.repository.auto_create,
        duplicates = ?config.duplicate_policy,
        "Configuration loaded"
    );

    let client = async_nats::connect(&config.nats_url)
        .await
        .context("Failed to connect to NATS")?;
    info!("Connected to NATS");

    let store = NatsStatisticStore::from_client(client.clone(), config.store.clone())
        .await
        .context("Failed to open statistics bucket")?;

    let repository = StatisticRepository::new(Arc::new(store), config.repository);
    let service = AggregationService::new(repository);
    let dispatcher = TripEventDispatcher::new(Arc::new(service), config.duplicate_policy);

    let handle = TripEventSubscriber::new(client, config.events.clone(), Arc::new(dispatcher))
        .subscribe()
        .await
        .context("Failed to subscribe to trip events")?;

    tokio::select! {
        result = handle => {
            result.context("Consumer task panicked")?;
            warn!("Trip event consumer ended");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            info!("Shutting down");
        }
    }

    Ok(())
}
