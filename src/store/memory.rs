// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-process statistic store
//!
//! Records live behind a `tokio::sync::RwLock`; every write takes the lock
//! for the whole check-and-set, which makes `insert` and `replace` atomic.
//! Used for tests and for embedding the aggregation engine without NATS.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{UserId, UserStatistic};
use crate::errors::{StoreError, StoreResult};
use crate::store::{Revision, StatisticStore, Versioned};

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<Uuid, Versioned<UserStatistic>>,
    last_revision: Revision,
}

impl Inner {
    fn next_revision(&mut self) -> Revision {
        self.last_revision += 1;
        self.last_revision
    }

    fn for_user(&self, user: &UserId) -> Vec<Versioned<UserStatistic>> {
        let mut found: Vec<_> = self
            .records
            .values()
            .filter(|v| &v.record.user == user)
            .cloned()
            .collect();
        found.sort_by_key(|v| v.revision);
        found
    }
}

/// Statistic store held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStatisticStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStatisticStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records exactly as given, e.g. from a storage dump
    ///
    /// No uniqueness check is applied, so a snapshot holding two records for
    /// one user is reproduced faithfully.
    pub async fn load_snapshot(&self, records: Vec<UserStatistic>) {
        let mut inner = self.inner.write().await;
        for record in records {
            let revision = inner.next_revision();
            inner.records.insert(record.id, Versioned::new(record, revision));
        }
    }

    /// Every stored record, ordered by revision
    pub async fn snapshot(&self) -> Vec<UserStatistic> {
        let inner = self.inner.read().await;
        let mut all: Vec<_> = inner.records.values().cloned().collect();
        all.sort_by_key(|v| v.revision);
        all.into_iter().map(|v| v.record).collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StatisticStore for InMemoryStatisticStore {
    async fn find_by_user(&self, user: &UserId) -> StoreResult<Vec<Versioned<UserStatistic>>> {
        Ok(self.inner.read().await.for_user(user))
    }

    async fn insert(&self, statistic: &UserStatistic) -> StoreResult<Revision> {
        let mut inner = self.inner.write().await;

        if !inner.for_user(&statistic.user).is_empty() {
            return Err(StoreError::Conflict(format!(
                "statistic for user {} already exists",
                statistic.user
            )));
        }

        let revision = inner.next_revision();
        inner
            .records
            .insert(statistic.id, Versioned::new(statistic.clone(), revision));

        debug!(user = %statistic.user, revision, "Inserted statistic");
        Ok(revision)
    }

    async fn replace(&self, statistic: &UserStatistic, expected: Revision) -> StoreResult<Revision> {
        let mut inner = self.inner.write().await;

        match inner.records.get(&statistic.id) {
            Some(current) if current.revision == expected && current.record.user == statistic.user => {}
            Some(current) => {
                return Err(StoreError::Conflict(format!(
                    "expected revision {}, found {}",
                    expected, current.revision
                )));
            }
            None => {
                return Err(StoreError::Conflict(format!(
                    "statistic {} no longer exists",
                    statistic.id
                )));
            }
        }

        let revision = inner.next_revision();
        inner
            .records
            .insert(statistic.id, Versioned::new(statistic.clone(), revision));

        debug!(user = %statistic.user, revision, "Replaced statistic");
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    fn record(user: &str) -> UserStatistic {
        UserStatistic::empty(Uuid::now_v7(), UserId::new(user), Utc::now())
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryStatisticStore::new();
        let stat = record("alice");

        let revision = store.insert(&stat).await.unwrap();
        let found = store.find_by_user(&stat.user).await.unwrap();

        assert_eq!(found, vec![Versioned::new(stat, revision)]);
        assert!(store.find_by_user(&UserId::new("bob")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_insert_for_user_conflicts() {
        let store = InMemoryStatisticStore::new();
        store.insert(&record("alice")).await.unwrap();

        let err = store.insert(&record("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_replace_requires_current_revision() {
        let store = InMemoryStatisticStore::new();
        let stat = record("alice");
        let first = store.insert(&stat).await.unwrap();

        let second = assert_ok!(store.replace(&stat, first).await);
        assert!(second > first);

        let err = assert_err!(store.replace(&stat, first).await);
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_replace_missing_record_conflicts() {
        let store = InMemoryStatisticStore::new();
        let err = assert_err!(tokio_test::block_on(store.replace(&record("alice"), 1)));
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_snapshot_keeps_duplicates() {
        let store = InMemoryStatisticStore::new();
        store.load_snapshot(vec![record("alice"), record("alice")]).await;

        let found = store.find_by_user(&UserId::new("alice")).await.unwrap();
        assert_eq!(found.len(), 2);
    }
}
