//! Error types for statistics aggregation

use thiserror::Error;

use crate::domain::{TripId, UserId};

/// Errors raised while computing or reconciling user statistics
#[derive(Debug, Error)]
pub enum StatisticsError {
    /// A measurement has missing or malformed geometry or values
    #[error("Invalid measurement at index {index}: {reason}")]
    InvalidMeasurement { index: usize, reason: String },

    /// Storage holds more than one aggregate for the same user
    #[error("Consistency violation: {count} statistic records found for user {user}")]
    ConsistencyViolation { user: UserId, count: usize },

    /// The trip is already part of the user's aggregate
    #[error("Trip {trip} already contributed to statistics of user {user}")]
    AlreadyContributed { user: UserId, trip: TripId },

    /// The trip never contributed to the user's aggregate
    #[error("Trip {trip} has not contributed to statistics of user {user}")]
    NotContributed { user: UserId, trip: TripId },

    /// No aggregate exists for the user
    #[error("No statistic found for user {0}")]
    NotFound(UserId),

    /// Adding or removing a trip would overflow a cumulative total
    #[error("Cumulative totals of user {user} overflow when applying trip {trip}")]
    Overflow { user: UserId, trip: TripId },

    /// Optimistic retries exhausted
    #[error("Concurrency conflict for user {user} after {attempts} attempts")]
    ConcurrencyConflict { user: UserId, attempts: u32 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Storage backend error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for statistics operations
pub type StatisticsResult<T> = Result<T, StatisticsError>;

/// Errors raised by a statistic store implementation
#[derive(Debug, Error)]
pub enum StoreError {
    /// Compare-and-swap lost against a concurrent writer
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Backend (NATS, KV bucket) failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl StatisticsError {
    /// Whether the error guards against double counting or phantom reversal.
    ///
    /// Callers may treat these as idempotent no-ops on redelivery.
    pub fn is_contribution_guard(&self) -> bool {
        matches!(
            self,
            StatisticsError::AlreadyContributed { .. }
                | StatisticsError::NotContributed { .. }
                | StatisticsError::NotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_converts_into_statistics_error() {
        let err: StatisticsError = StoreError::Backend("bucket gone".to_string()).into();
        assert!(matches!(err, StatisticsError::Store(StoreError::Backend(_))));
        assert!(err.to_string().contains("bucket gone"));
    }

    #[test]
    fn test_contribution_guards() {
        let user = UserId::new("u1");
        let trip = TripId::new("t1");

        assert!(StatisticsError::NotFound(user.clone()).is_contribution_guard());
        assert!(StatisticsError::AlreadyContributed {
            user: user.clone(),
            trip: trip.clone()
        }
        .is_contribution_guard());
        assert!(!StatisticsError::ConsistencyViolation { user, count: 2 }.is_contribution_guard());
    }
}
