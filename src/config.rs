//! Configuration for the statistics aggregator

use std::str::FromStr;

use crate::errors::{StatisticsError, StatisticsResult};
use crate::store::NatsStoreConfig;
use crate::subscriber::TripEventsConfig;

/// What a caller does when a trip event hits a contribution guard
/// (`AlreadyContributed`, `NotContributed`, `NotFound`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Log a warning and treat the event as handled
    Skip,
    /// Surface the error
    Fail,
}

impl FromStr for DuplicatePolicy {
    type Err = StatisticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            other => Err(StatisticsError::Configuration(format!(
                "unknown duplicate policy {:?}, expected \"skip\" or \"fail\"",
                other
            ))),
        }
    }
}

/// Repository behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Compare-and-swap attempts before giving up with `ConcurrencyConflict`
    pub max_conflict_retries: u32,

    /// Create a user's statistic on their first trip. When disabled the
    /// statistic has to be initialized (or rebuilt) explicitly first.
    pub auto_create: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            auto_create: true,
        }
    }
}

/// Configuration for the aggregator service
#[derive(Debug, Clone)]
pub struct StatisticsConfig {
    /// NATS server URL
    pub nats_url: String,
    /// KV bucket holding the statistics
    pub store: NatsStoreConfig,
    /// Stream and consumer of trip lifecycle events
    pub events: TripEventsConfig,
    /// Repository behaviour
    pub repository: RepositoryConfig,
    /// Handling of redelivered or phantom trip events
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            store: NatsStoreConfig::default(),
            events: TripEventsConfig::default(),
            repository: RepositoryConfig::default(),
            duplicate_policy: DuplicatePolicy::Skip,
        }
    }
}

impl StatisticsConfig {
    /// Load configuration from environment variables
    ///
    /// - `NATS_URL`
    /// - `STATISTICS_BUCKET`
    /// - `TRIP_SUBJECT_PREFIX`
    /// - `TRIP_STREAM`
    /// - `TRIP_CONSUMER`
    /// - `TRIP_MAX_DELIVER`
    /// - `STATISTICS_MAX_RETRIES`
    /// - `STATISTICS_AUTO_CREATE` (`true`/`false`)
    /// - `STATISTICS_DUPLICATES` (`skip`/`fail`)
    pub fn from_env() -> StatisticsResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> StatisticsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_conflict_retries = match lookup("STATISTICS_MAX_RETRIES") {
            Some(raw) => parse_value::<u32>("STATISTICS_MAX_RETRIES", &raw)?,
            None => defaults.repository.max_conflict_retries,
        };
        if max_conflict_retries == 0 {
            return Err(StatisticsError::Configuration(
                "STATISTICS_MAX_RETRIES must be at least 1".to_string(),
            ));
        }

        let max_deliver = match lookup("TRIP_MAX_DELIVER") {
            Some(raw) => parse_value::<i64>("TRIP_MAX_DELIVER", &raw)?,
            None => defaults.events.max_deliver,
        };
        if max_deliver < 1 {
            return Err(StatisticsError::Configuration(
                "TRIP_MAX_DELIVER must be at least 1".to_string(),
            ));
        }

        let auto_create = match lookup("STATISTICS_AUTO_CREATE") {
            Some(raw) => parse_value::<bool>("STATISTICS_AUTO_CREATE", &raw)?,
            None => defaults.repository.auto_create,
        };

        let duplicate_policy = match lookup("STATISTICS_DUPLICATES") {
            Some(raw) => raw.parse()?,
            None => defaults.duplicate_policy,
        };

        Ok(Self {
            nats_url: lookup("NATS_URL").unwrap_or(defaults.nats_url),
            store: NatsStoreConfig {
                bucket: lookup("STATISTICS_BUCKET").unwrap_or(defaults.store.bucket),
                ..defaults.store
            },
            events: TripEventsConfig {
                subject_prefix: lookup("TRIP_SUBJECT_PREFIX").unwrap_or(defaults.events.subject_prefix),
                stream: lookup("TRIP_STREAM").unwrap_or(defaults.events.stream),
                consumer: lookup("TRIP_CONSUMER").unwrap_or(defaults.events.consumer),
                max_deliver,
            },
            repository: RepositoryConfig {
                max_conflict_retries,
                auto_create,
            },
            duplicate_policy,
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> StatisticsResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| StatisticsError::Configuration(format!("invalid value {:?} for {}", raw, key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = StatisticsConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.store.bucket, "USER_STATISTICS");
        assert_eq!(config.events.subjects(), "trips.>");
        assert_eq!(config.events.stream, "TRIP_EVENTS");
        assert_eq!(config.events.max_deliver, 10);
        assert_eq!(config.repository, RepositoryConfig::default());
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Skip);
    }

    #[test]
    fn test_overrides() {
        let config = StatisticsConfig::from_lookup(lookup(&[
            ("NATS_URL", "nats://10.0.0.1:4222"),
            ("STATISTICS_BUCKET", "STATS"),
            ("TRIP_SUBJECT_PREFIX", "envirocar.tracks"),
            ("TRIP_STREAM", "TRACKS"),
            ("TRIP_CONSUMER", "stats-v2"),
            ("TRIP_MAX_DELIVER", "3"),
            ("STATISTICS_MAX_RETRIES", "9"),
            ("STATISTICS_AUTO_CREATE", "false"),
            ("STATISTICS_DUPLICATES", "FAIL"),
        ]))
        .unwrap();

        assert_eq!(config.nats_url, "nats://10.0.0.1:4222");
        assert_eq!(config.store.bucket, "STATS");
        assert_eq!(config.events.subjects(), "envirocar.tracks.>");
        assert_eq!(config.events.stream, "TRACKS");
        assert_eq!(config.events.consumer, "stats-v2");
        assert_eq!(config.events.max_deliver, 3);
        assert_eq!(config.repository.max_conflict_retries, 9);
        assert!(!config.repository.auto_create);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Fail);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for vars in [
            [("STATISTICS_MAX_RETRIES", "many")],
            [("STATISTICS_MAX_RETRIES", "0")],
            [("STATISTICS_AUTO_CREATE", "yes please")],
            [("TRIP_MAX_DELIVER", "0")],
            [("STATISTICS_DUPLICATES", "ignore")],
        ] {
            let err = StatisticsConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, StatisticsError::Configuration(_)), "{vars:?}");
        }
    }
}
