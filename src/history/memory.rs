use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::HistoryError;
use crate::history::{HistoryStorage, MigrationState};

/// History kept in process memory. Lost when dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistoryStorage {
    entries: HashMap<String, MigrationState>,
}

impl InMemoryHistoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl HistoryStorage for InMemoryHistoryStorage {
    async fn get(&self, migration_id: &str) -> Result<MigrationState, HistoryError> {
        Ok(self
            .entries
            .get(migration_id)
            .cloned()
            .unwrap_or(MigrationState::Unapplied))
    }

    async fn put(&mut self, migration_id: &str, state: MigrationState) -> Result<(), HistoryError> {
        match state {
            MigrationState::Unapplied => {
                self.entries.remove(migration_id);
            }
            state => {
                self.entries.insert(migration_id.to_string(), state);
            }
        }
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(String, MigrationState)>, HistoryError> {
        Ok(self
            .entries
            .iter()
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_entries_are_unapplied() {
        let storage = InMemoryHistoryStorage::new();
        assert_eq!(storage.get("nope").await.unwrap(), MigrationState::Unapplied);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn putting_unapplied_removes_the_entry() {
        let mut storage = InMemoryHistoryStorage::new();
        storage.put("a", MigrationState::Unapplied).await.unwrap();
        assert!(storage.is_empty());
        assert!(storage.entries().await.unwrap().is_empty());
    }
}
