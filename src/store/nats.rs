// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS JetStream Key-Value Statistic Store
//!
//! One KV entry per user under `user.<hex(user_id)>`, holding the JSON
//! encoded [`UserStatistic`]. The KV revision of the entry is the
//! compare-and-swap token handed to the repository:
//!
//! - `insert` → `kv.update` at revision 0 (fails when the key exists); a
//!   deleted or purged key is re-created at its tombstone revision
//! - `replace` → `kv.update` with the expected revision
//!
//! Since the key is derived from the user id, this backend cannot hold two
//! records for one user.

use async_nats::jetstream::context::{GetStreamError, GetStreamErrorKind};
use async_nats::jetstream::{self, kv, ErrorCode};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::{UserId, UserStatistic};
use crate::errors::{StoreError, StoreResult};
use crate::store::{Revision, StatisticStore, Versioned};

/// Configuration for the KV bucket
#[derive(Debug, Clone)]
pub struct NatsStoreConfig {
    /// Bucket name
    pub bucket: String,

    /// Revisions kept per key
    pub history: i64,
}

impl Default for NatsStoreConfig {
    fn default() -> Self {
        Self {
            bucket: "USER_STATISTICS".to_string(),
            history: 5,
        }
    }
}

/// JetStream KV-backed statistic store
///
/// # Example
///
/// ```rust,no_run
/// use trip_statistics::store::{NatsStatisticStore, NatsStoreConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = NatsStatisticStore::connect("nats://localhost:4222", NatsStoreConfig::default()).await?;
///     // Use store...
///     Ok(())
/// }
/// ```
pub struct NatsStatisticStore {
    kv: kv::Store,
}

impl NatsStatisticStore {
    /// Connect to NATS and open (or create) the statistics bucket
    pub async fn connect(nats_url: &str, config: NatsStoreConfig) -> StoreResult<Self> {
        let client = async_nats::connect(nats_url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Self::from_client(client, config).await
    }

    /// Open (or create) the statistics bucket on an existing connection
    pub async fn from_client(client: async_nats::Client, config: NatsStoreConfig) -> StoreResult<Self> {
        let jetstream = jetstream::new(client);

        // A KV bucket is backed by the stream `KV_<bucket>`
        let kv = match jetstream.get_stream(format!("KV_{}", config.bucket)).await {
            Ok(_) => {
                debug!(bucket = %config.bucket, "Using existing statistics bucket");
                jetstream
                    .get_key_value(&config.bucket)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?
            }
            Err(e) if bucket_missing(&e) => {
                info!(bucket = %config.bucket, "Creating statistics bucket");
                jetstream
                    .create_key_value(kv::Config {
                        bucket: config.bucket.clone(),
                        history: config.history,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?
            }
            Err(e) => return Err(StoreError::Backend(e.to_string())),
        };

        Ok(Self { kv })
    }

    /// KV key for a user
    ///
    /// Format: user.<hex of the UTF-8 user id>
    ///
    /// Hex keeps every id inside the KV key alphabet and never introduces
    /// a token separator.
    fn key(user: &UserId) -> String {
        format!("user.{}", hex::encode(user.as_str()))
    }

    /// Latest entry for a key, including delete and purge markers
    async fn entry(&self, key: &str) -> StoreResult<Option<kv::Entry>> {
        self.kv
            .entry(key.to_string())
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// Current live entry for a key, deleted or purged entries count as absent
    async fn live_entry(&self, key: &str) -> StoreResult<Option<kv::Entry>> {
        Ok(self.entry(key).await?.filter(is_live))
    }
}

fn is_live(entry: &kv::Entry) -> bool {
    matches!(entry.operation, kv::Operation::Put)
}

/// Whether a stream lookup failed because the stream does not exist
fn bucket_missing(err: &GetStreamError) -> bool {
    match err.kind() {
        GetStreamErrorKind::JetStream(e) => e.error_code() == ErrorCode::STREAM_NOT_FOUND,
        _ => false,
    }
}

#[async_trait]
impl StatisticStore for NatsStatisticStore {
    async fn find_by_user(&self, user: &UserId) -> StoreResult<Vec<Versioned<UserStatistic>>> {
        let key = Self::key(user);

        match self.live_entry(&key).await? {
            Some(entry) => {
                let record: UserStatistic = serde_json::from_slice(&entry.value)?;
                Ok(vec![Versioned::new(record, entry.revision)])
            }
            None => Ok(Vec::new()),
        }
    }

    async fn insert(&self, statistic: &UserStatistic) -> StoreResult<Revision> {
        let key = Self::key(&statistic.user);
        let payload = serde_json::to_vec(statistic)?;

        // Revision 0 only succeeds for a key that was never written
        let err = match self.kv.update(&key, payload.clone().into(), 0).await {
            Ok(revision) => {
                debug!(user = %statistic.user, revision, "Created statistic entry");
                return Ok(revision);
            }
            Err(e) => e,
        };

        match self.entry(&key).await? {
            Some(existing) if is_live(&existing) => Err(StoreError::Conflict(format!(
                "statistic for user {} already exists at revision {}",
                statistic.user, existing.revision
            ))),
            Some(tombstone) => {
                match self.kv.update(&key, payload.into(), tombstone.revision).await {
                    Ok(revision) => {
                        debug!(
                            user = %statistic.user,
                            revision,
                            tombstone = tombstone.revision,
                            "Re-created deleted statistic entry"
                        );
                        Ok(revision)
                    }
                    Err(e) => match self.live_entry(&key).await? {
                        Some(existing) => Err(StoreError::Conflict(format!(
                            "statistic for user {} was re-created at revision {}",
                            statistic.user, existing.revision
                        ))),
                        None => Err(StoreError::Backend(e.to_string())),
                    },
                }
            }
            None => Err(StoreError::Backend(err.to_string())),
        }
    }

    async fn replace(&self, statistic: &UserStatistic, expected: Revision) -> StoreResult<Revision> {
        let key = Self::key(&statistic.user);
        let payload = serde_json::to_vec(statistic)?;

        match self.kv.update(&key, payload.into(), expected).await {
            Ok(revision) => {
                debug!(user = %statistic.user, revision, "Updated statistic entry");
                Ok(revision)
            }
            // The update error kind does not say whether the revision moved,
            // so look at the entry to tell a lost race from a backend failure.
            Err(e) => match self.live_entry(&key).await? {
                Some(current) if current.revision != expected => Err(StoreError::Conflict(format!(
                    "expected revision {}, found {}",
                    expected, current.revision
                ))),
                None => Err(StoreError::Conflict(format!(
                    "statistic for user {} no longer exists",
                    statistic.user
                ))),
                Some(_) => Err(StoreError::Backend(e.to_string())),
            },
        }
    }
}
