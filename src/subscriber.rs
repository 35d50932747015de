//! Trip event subscriber
//!
//! Consumes trip lifecycle events published by the API layer and feeds
//! them to the [`StatisticsService`]:
//! - Subject-based filtering (`<prefix>.finalized`, `<prefix>.deleted`)
//! - JSON event deserialization, checked against the subject
//! - Durable JetStream pull consumer with explicit acknowledgement
//! - Configurable handling of redelivered or phantom events
//!
//! # Acknowledgement
//!
//! | outcome                                        | reply |
//! |------------------------------------------------|-------|
//! | applied, or guard skipped under `Skip`         | ack   |
//! | malformed payload, subject mismatch            | term  |
//! | invalid measurement, overflowing totals        | term  |
//! | guard under `Fail`, conflict, store failure    | nak   |
//!
//! Nak'd events are redelivered until the consumer's `max_deliver` is
//! reached.

use std::sync::Arc;

use async_nats::jetstream::{self, consumer, stream, AckKind};
use async_nats::Client;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::DuplicatePolicy;
use crate::domain::{Trip, UserStatistic};
use crate::errors::StatisticsError;
use crate::service::StatisticsService;

/// Error types for trip event subscription
#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("NATS error: {0}")]
    Nats(async_nats::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Event {event:?} received on subject {subject}")]
    SubjectMismatch { subject: String, event: &'static str },

    #[error("Statistics error: {0}")]
    Statistics(#[from] StatisticsError),
}

/// Result type for subscribe operations
pub type Result<T> = std::result::Result<T, SubscribeError>;

fn nats<E>(err: E) -> SubscribeError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SubscribeError::Nats(Box::new(err))
}

/// Where trip events are read from
#[derive(Debug, Clone)]
pub struct TripEventsConfig {
    /// Subject prefix; events live under `<prefix>.finalized|deleted`
    pub subject_prefix: String,

    /// JetStream stream capturing `<prefix>.>`
    pub stream: String,

    /// Durable consumer name
    pub consumer: String,

    /// Deliveries per event before JetStream gives up on it
    pub max_deliver: i64,
}

impl Default for TripEventsConfig {
    fn default() -> Self {
        Self {
            subject_prefix: "trips".to_string(),
            stream: "TRIP_EVENTS".to_string(),
            consumer: "statistics-aggregator".to_string(),
            max_deliver: 10,
        }
    }
}

impl TripEventsConfig {
    /// Wildcard subject covering every trip event
    pub fn subjects(&self) -> String {
        format!("{}.>", self.subject_prefix)
    }
}

/// Trip lifecycle event, emitted after the trip was persisted or removed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TripEvent {
    Finalized { trip: Trip },
    Deleted { trip: Trip },
}

impl TripEvent {
    pub fn trip(&self) -> &Trip {
        match self {
            TripEvent::Finalized { trip } | TripEvent::Deleted { trip } => trip,
        }
    }

    fn operation(&self) -> &'static str {
        match self {
            TripEvent::Finalized { .. } => "finalized",
            TripEvent::Deleted { .. } => "deleted",
        }
    }

    /// Subject for this event
    ///
    /// Format: <prefix>.finalized | <prefix>.deleted
    pub fn subject(&self, prefix: &str) -> String {
        format!("{}.{}", prefix, self.operation())
    }

    /// Whether `subject` ends in this event's operation token
    fn matches_subject(&self, subject: &str) -> bool {
        subject.rsplit('.').next() == Some(self.operation())
    }
}

/// What happened to a dispatched event
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The statistic was updated
    Applied(UserStatistic),
    /// A contribution guard fired and the policy is `Skip`
    Skipped(String),
}

/// Reply sent to JetStream for a processed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Done with the event
    Ack,
    /// Redeliver later
    Nak,
    /// Never redeliver, the event cannot succeed
    Term,
}

impl Delivery {
    /// Reply for the result of [`TripEventDispatcher::dispatch_message`]
    pub fn for_result(result: &Result<Outcome>) -> Self {
        match result {
            Ok(_) => Delivery::Ack,
            Err(SubscribeError::Deserialization(_)) | Err(SubscribeError::SubjectMismatch { .. }) => {
                Delivery::Term
            }
            Err(SubscribeError::Statistics(
                StatisticsError::InvalidMeasurement { .. } | StatisticsError::Overflow { .. },
            )) => Delivery::Term,
            Err(_) => Delivery::Nak,
        }
    }

    fn ack_kind(self) -> AckKind {
        match self {
            Delivery::Ack => AckKind::Ack,
            Delivery::Nak => AckKind::Nak(None),
            Delivery::Term => AckKind::Term,
        }
    }
}

/// Routes trip events to the statistics service
pub struct TripEventDispatcher {
    service: Arc<dyn StatisticsService>,
    policy: DuplicatePolicy,
}

impl TripEventDispatcher {
    pub fn new(service: Arc<dyn StatisticsService>, policy: DuplicatePolicy) -> Self {
        Self { service, policy }
    }

    /// Apply one event
    pub async fn dispatch(&self, event: &TripEvent) -> Result<Outcome> {
        let trip = event.trip();
        let result = match event {
            TripEvent::Finalized { trip } => self.service.on_trip_finalized(trip).await,
            TripEvent::Deleted { trip } => self.service.on_trip_deleted(trip).await,
        };

        match result {
            Ok(statistic) => Ok(Outcome::Applied(statistic)),
            Err(e) if e.is_contribution_guard() && self.policy == DuplicatePolicy::Skip => {
                warn!(
                    user = %trip.user,
                    trip = %trip.id,
                    event = event.operation(),
                    error = %e,
                    "Skipping trip event"
                );
                Ok(Outcome::Skipped(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Decode and apply one raw message
    ///
    /// The event type must agree with the last token of `subject`.
    pub async fn dispatch_message(&self, subject: &str, payload: &[u8]) -> Result<Outcome> {
        let event: TripEvent = serde_json::from_slice(payload)?;

        if !event.matches_subject(subject) {
            return Err(SubscribeError::SubjectMismatch {
                subject: subject.to_string(),
                event: event.operation(),
            });
        }

        debug!(
            user = %event.trip().user,
            trip = %event.trip().id,
            event = event.operation(),
            "Processing trip event"
        );

        self.dispatch(&event).await
    }
}

/// Durable JetStream consumer of trip events
pub struct TripEventSubscriber {
    jetstream: jetstream::Context,
    config: TripEventsConfig,
    dispatcher: Arc<TripEventDispatcher>,
}

impl TripEventSubscriber {
    pub fn new(client: Client, config: TripEventsConfig, dispatcher: Arc<TripEventDispatcher>) -> Self {
        Self {
            jetstream: jetstream::new(client),
            config,
            dispatcher,
        }
    }

    /// Bind the stream and durable consumer, then process events in a
    /// background task
    pub async fn subscribe(self) -> Result<JoinHandle<()>> {
        let stream = self
            .jetstream
            .get_or_create_stream(stream::Config {
                name: self.config.stream.clone(),
                subjects: vec![self.config.subjects()],
                ..Default::default()
            })
            .await
            .map_err(nats)?;

        let consumer: consumer::PullConsumer = stream
            .get_or_create_consumer(
                &self.config.consumer,
                consumer::pull::Config {
                    durable_name: Some(self.config.consumer.clone()),
                    filter_subject: self.config.subjects(),
                    ack_policy: consumer::AckPolicy::Explicit,
                    max_deliver: self.config.max_deliver,
                    ..Default::default()
                },
            )
            .await
            .map_err(nats)?;

        let messages = consumer
            .stream()
            .max_messages_per_batch(10)
            .messages()
            .await
            .map_err(nats)?;

        info!(
            stream = %self.config.stream,
            consumer = %self.config.consumer,
            subjects = %self.config.subjects(),
            "Started trip event consumer"
        );

        let handle = tokio::spawn(async move {
            self.process_messages(messages).await;
        });

        Ok(handle)
    }

    async fn process_messages(self, messages: consumer::pull::Stream) {
        tokio::pin!(messages);

        while let Some(message) = messages.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    error!(error = %e, "Failed to receive trip event");
                    continue;
                }
            };

            let subject = message.subject.to_string();
            debug!(
                subject = %subject,
                payload_size = message.payload.len(),
                "Received trip event"
            );

            let result = self.dispatcher.dispatch_message(&subject, &message.payload).await;
            let delivery = Delivery::for_result(&result);

            match &result {
                Ok(Outcome::Applied(statistic)) => {
                    debug!(
                        user = %statistic.user,
                        trips = statistic.trip_count(),
                        "Trip event applied"
                    );
                }
                Ok(Outcome::Skipped(_)) => {}
                Err(e) if delivery == Delivery::Term => {
                    error!(subject = %subject, error = %e, "Dropping trip event");
                }
                Err(e) => {
                    warn!(subject = %subject, error = %e, "Trip event failed, requesting redelivery");
                }
            }

            if let Err(e) = message.ack_with(delivery.ack_kind()).await {
                error!(subject = %subject, ?delivery, error = %e, "Failed to acknowledge trip event");
            }
        }

        warn!(consumer = %self.config.consumer, "Trip event consumer ended");
    }
}

/// Publish a trip event, as the API layer does after persisting a trip
///
/// Waits for the stream's publish acknowledgement.
pub async fn publish_trip_event(client: &Client, prefix: &str, event: &TripEvent) -> Result<()> {
    let payload = serde_json::to_vec(event)?;
    jetstream::new(client.clone())
        .publish(event.subject(prefix), payload.into())
        .await
        .map_err(nats)?
        .await
        .map_err(nats)?;
    Ok(())
}
