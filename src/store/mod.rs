// Copyright (c) 2025 - Cowboy AI, Inc.
//! Statistic Store Abstraction
//!
//! The storage collaborator that persists [`UserStatistic`] records keyed by
//! user identity. The repository only ever writes whole records, guarded by a
//! revision:
//!
//! ```text
//! find_by_user ──► Versioned { record, revision }
//!                         │
//!                  pure merge/reverse
//!                         │
//! replace(record, revision) ──► Ok(new revision) | Err(Conflict)
//! ```
//!
//! # Store Requirements
//!
//! 1. **Whole-record writes**: a record is replaced atomically or not at all
//! 2. **Compare-and-swap**: `replace` fails with `Conflict` if the stored
//!    revision moved since it was read
//! 3. **Create-if-absent**: `insert` fails with `Conflict` if the user
//!    already has a record
//! 4. **Honest reads**: `find_by_user` returns every record it holds for the
//!    user, duplicates included, so corruption is visible to the caller

use async_trait::async_trait;

use crate::domain::{UserId, UserStatistic};
use crate::errors::StoreResult;

pub mod memory;
pub mod nats;

pub use memory::InMemoryStatisticStore;
pub use nats::{NatsStatisticStore, NatsStoreConfig};

/// Opaque compare-and-swap token
pub type Revision = u64;

/// A stored record together with the revision it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub record: T,
    pub revision: Revision,
}

impl<T> Versioned<T> {
    pub fn new(record: T, revision: Revision) -> Self {
        Self { record, revision }
    }
}

/// Persistence for user statistic records
#[async_trait]
pub trait StatisticStore: Send + Sync {
    /// All records stored for `user`
    ///
    /// An empty vector means the user has no statistic yet. More than one
    /// entry means the one-record-per-user invariant is broken.
    async fn find_by_user(&self, user: &UserId) -> StoreResult<Vec<Versioned<UserStatistic>>>;

    /// Store a record for a user that has none
    ///
    /// # Errors
    /// - `Conflict` if a record already exists for `statistic.user`
    async fn insert(&self, statistic: &UserStatistic) -> StoreResult<Revision>;

    /// Replace the user's record if it is still at `expected`
    ///
    /// # Errors
    /// - `Conflict` if the stored revision differs from `expected` or the
    ///   record disappeared
    async fn replace(&self, statistic: &UserStatistic, expected: Revision) -> StoreResult<Revision>;
}
