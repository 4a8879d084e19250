//! Stats storage interface and implementations
//!
//! This module defines the interface for persisting and retrieving player
//! stats records, with an in-memory implementation used by the service.

use crate::error::{Result, StandingsError};
use crate::stats::record::PlayerStatsRecord;
use crate::types::PlayerId;
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for stats storage operations
///
/// Implementations persist whole records; the ranking engine decides what a
/// record contains and serializes writes per player.
#[cfg_attr(test, mockall::automock)]
pub trait StatsStorage: Send + Sync {
    /// Load a player's record, failing with `PlayerNotFound` if there is none
    fn load(&self, player_id: &PlayerId) -> Result<PlayerStatsRecord>;

    /// Look up a player's record
    fn find(&self, player_id: &PlayerId) -> Result<Option<PlayerStatsRecord>>;

    /// Persist the current state of a record, replacing any previous one
    fn save(&self, record: PlayerStatsRecord) -> Result<()>;

    /// Insert a record only if the player has none; returns whether it was inserted
    fn create(&self, record: PlayerStatsRecord) -> Result<bool>;

    /// Remove a player's record (account deletion)
    fn remove(&self, player_id: &PlayerId) -> Result<bool>;

    /// Get every stored record
    fn all(&self) -> Result<Vec<PlayerStatsRecord>>;

    /// Get total number of stored records
    fn count(&self) -> Result<usize>;
}

/// In-memory stats storage implementation
///
/// Records are never evicted.
#[derive(Debug, Default)]
pub struct InMemoryStatsStorage {
    records: RwLock<HashMap<PlayerId, PlayerStatsRecord>>,
}

impl InMemoryStatsStorage {
    /// Create a new in-memory stats storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage pre-populated with records (for tests and fixtures)
    pub fn with_records(records: impl IntoIterator<Item = PlayerStatsRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.player_id.clone(), record))
            .collect();

        Self {
            records: RwLock::new(records),
        }
    }

    fn read_lock(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<PlayerId, PlayerStatsRecord>>> {
        self.records.read().map_err(|_| {
            StandingsError::StorageError {
                message: "Failed to acquire stats read lock".to_string(),
            }
            .into()
        })
    }

    fn write_lock(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<PlayerId, PlayerStatsRecord>>> {
        self.records.write().map_err(|_| {
            StandingsError::StorageError {
                message: "Failed to acquire stats write lock".to_string(),
            }
            .into()
        })
    }
}

impl StatsStorage for InMemoryStatsStorage {
    fn load(&self, player_id: &PlayerId) -> Result<PlayerStatsRecord> {
        self.find(player_id)?.ok_or_else(|| {
            StandingsError::PlayerNotFound {
                player_id: player_id.clone(),
            }
            .into()
        })
    }

    fn find(&self, player_id: &PlayerId) -> Result<Option<PlayerStatsRecord>> {
        let records = self.read_lock()?;
        Ok(records.get(player_id).cloned())
    }

    fn save(&self, record: PlayerStatsRecord) -> Result<()> {
        let mut records = self.write_lock()?;
        records.insert(record.player_id.clone(), record);
        Ok(())
    }

    fn create(&self, record: PlayerStatsRecord) -> Result<bool> {
        let mut records = self.write_lock()?;
        if records.contains_key(&record.player_id) {
            return Ok(false);
        }
        records.insert(record.player_id.clone(), record);
        Ok(true)
    }

    fn remove(&self, player_id: &PlayerId) -> Result<bool> {
        let mut records = self.write_lock()?;
        Ok(records.remove(player_id).is_some())
    }

    fn all(&self) -> Result<Vec<PlayerStatsRecord>> {
        let records = self.read_lock()?;
        Ok(records.values().cloned().collect())
    }

    fn count(&self) -> Result<usize> {
        let records = self.read_lock()?;
        Ok(records.len())
    }
}
