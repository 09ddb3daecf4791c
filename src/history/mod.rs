mod memory;

pub use memory::InMemoryHistoryStorage;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::HistoryError;
use crate::migration::Migration;
use crate::version::SchemaVersion;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub migration_id: String,
    pub applied_at: DateTime<Utc>,
    pub schema_version_before: SchemaVersion,
    pub schema_version_after: SchemaVersion,
    pub description: Option<String>,
    /// Position in apply order; breaks ties between equal `applied_at`.
    pub sequence: u64,
}

/// Tombstone left behind when an applied migration is rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRecord {
    pub migration_id: String,
    pub rolled_back_at: DateTime<Utc>,
    pub original_record: MigrationRecord,
}

/// Where a migration id stands. An id moves `Unapplied -> Applied ->
/// RolledBack`, and back to `Applied` only through a recorded reapply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationState {
    Unapplied,
    Applied(MigrationRecord),
    RolledBack(RollbackRecord),
}

impl MigrationState {
    pub fn is_applied(&self) -> bool {
        matches!(self, MigrationState::Applied(_))
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(self, MigrationState::RolledBack(_))
    }

    fn sequence(&self) -> Option<u64> {
        match self {
            MigrationState::Unapplied => None,
            MigrationState::Applied(record) => Some(record.sequence),
            MigrationState::RolledBack(rollback) => Some(rollback.original_record.sequence),
        }
    }
}

/// Persistence for [`MigrationHistory`]. Ids never stored read back as
/// [`MigrationState::Unapplied`].
#[async_trait]
pub trait HistoryStorage: Send + Sync {
    async fn get(&self, migration_id: &str) -> Result<MigrationState, HistoryError>;
    async fn put(&mut self, migration_id: &str, state: MigrationState) -> Result<(), HistoryError>;
    async fn entries(&self) -> Result<Vec<(String, MigrationState)>, HistoryError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordOptions {
    pub force: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackOptions {
    pub cascade: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReapplyOptions {
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackCheck {
    pub allowed: bool,
    pub reason: Option<String>,
    /// Applied migrations built directly on top of this one.
    pub dependent_migrations: Vec<String>,
    /// Every migration that has to be rolled back first, deepest first.
    /// Only filled in when cascading.
    pub cascade_rollbacks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReapplyCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

/// Applied and rolled-back migrations, with the rules for moving between
/// the two.
pub struct MigrationHistory<S: HistoryStorage> {
    storage: S,
}

impl<S: HistoryStorage> MigrationHistory<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Marks `migration` as applied.
    ///
    /// Recording over a rollback tombstone is the caller's decision, see
    /// [`can_reapply`](Self::can_reapply); it is logged unless `force` is set.
    pub async fn record(
        &mut self,
        migration: &Migration,
        options: RecordOptions,
    ) -> Result<(), HistoryError> {
        let id = migration.id();
        match self.storage.get(id).await? {
            MigrationState::Applied(_) => {
                debug!(migration = %id, "migration already recorded");
                return Ok(());
            }
            MigrationState::RolledBack(_) if !options.force => {
                warn!(migration = %id, "recording a previously rolled back migration without force");
            }
            _ => {}
        }

        let sequence = self.next_sequence().await?;
        let record = MigrationRecord {
            migration_id: id.to_string(),
            applied_at: Utc::now(),
            schema_version_before: migration.from_version(),
            schema_version_after: migration.to_version(),
            description: migration.description().map(str::to_string),
            sequence,
        };

        self.storage
            .put(id, MigrationState::Applied(record))
            .await?;
        info!(migration = %id, version = %migration.to_version(), "recorded migration");
        Ok(())
    }

    pub async fn state(&self, migration_id: &str) -> Result<MigrationState, HistoryError> {
        self.storage.get(migration_id).await
    }

    pub async fn has_applied(&self, migration_id: &str) -> Result<bool, HistoryError> {
        Ok(self.state(migration_id).await?.is_applied())
    }

    pub async fn was_rolled_back(&self, migration_id: &str) -> Result<bool, HistoryError> {
        Ok(self.state(migration_id).await?.is_rolled_back())
    }

    /// Whether `migration_id` can be rolled back now.
    ///
    /// A migration depends on another when it is applied and its starting
    /// version is the other's resulting version.
    pub async fn can_rollback(
        &self,
        migration_id: &str,
        options: RollbackOptions,
    ) -> Result<RollbackCheck, HistoryError> {
        let record = match self.state(migration_id).await? {
            MigrationState::Applied(record) => record,
            _ => {
                return Ok(RollbackCheck {
                    allowed: false,
                    reason: Some(format!("migration {} is not applied", migration_id)),
                    ..RollbackCheck::default()
                })
            }
        };

        let applied = self.get_applied_migrations().await?;
        let dependent_migrations: Vec<String> = dependents_of(&record, &applied)
            .map(|r| r.migration_id.clone())
            .collect();

        if dependent_migrations.is_empty() {
            return Ok(RollbackCheck {
                allowed: true,
                ..RollbackCheck::default()
            });
        }

        if !options.cascade {
            return Ok(RollbackCheck {
                allowed: false,
                reason: Some(format!(
                    "migration {} has dependent migrations still applied: {}",
                    migration_id,
                    dependent_migrations.join(", ")
                )),
                dependent_migrations,
                cascade_rollbacks: Vec::new(),
            });
        }

        Ok(RollbackCheck {
            allowed: true,
            reason: None,
            dependent_migrations,
            cascade_rollbacks: cascade_order(&record, &applied),
        })
    }

    pub async fn can_reapply(
        &self,
        migration_id: &str,
        options: ReapplyOptions,
    ) -> Result<ReapplyCheck, HistoryError> {
        let check = match self.state(migration_id).await? {
            MigrationState::Applied(_) => ReapplyCheck {
                allowed: false,
                reason: Some(format!("migration {} is already applied", migration_id)),
            },
            MigrationState::RolledBack(_) if !options.force => ReapplyCheck {
                allowed: false,
                reason: Some(format!(
                    "migration {} was previously rolled back; reapply with force",
                    migration_id
                )),
            },
            _ => ReapplyCheck {
                allowed: true,
                reason: None,
            },
        };
        Ok(check)
    }

    /// Tombstones an applied migration. Does nothing for other states.
    pub async fn record_rollback(&mut self, migration_id: &str) -> Result<(), HistoryError> {
        let original_record = match self.state(migration_id).await? {
            MigrationState::Applied(record) => record,
            state => {
                warn!(migration = %migration_id, ?state, "ignoring rollback of a migration that is not applied");
                return Ok(());
            }
        };

        let rollback = RollbackRecord {
            migration_id: migration_id.to_string(),
            rolled_back_at: Utc::now(),
            original_record,
        };
        self.storage
            .put(migration_id, MigrationState::RolledBack(rollback))
            .await?;
        info!(migration = %migration_id, "recorded rollback");
        Ok(())
    }

    pub async fn get_rollback_record(
        &self,
        migration_id: &str,
    ) -> Result<Option<RollbackRecord>, HistoryError> {
        match self.state(migration_id).await? {
            MigrationState::RolledBack(rollback) => Ok(Some(rollback)),
            _ => Ok(None),
        }
    }

    /// Rollback tombstones, oldest rollback first.
    pub async fn get_rolled_back_migrations(&self) -> Result<Vec<RollbackRecord>, HistoryError> {
        let mut rollbacks: Vec<RollbackRecord> = self
            .storage
            .entries()
            .await?
            .into_iter()
            .filter_map(|(_, state)| match state {
                MigrationState::RolledBack(rollback) => Some(rollback),
                _ => None,
            })
            .collect();
        rollbacks.sort_by(|a, b| {
            a.rolled_back_at
                .cmp(&b.rolled_back_at)
                .then(a.original_record.sequence.cmp(&b.original_record.sequence))
        });
        Ok(rollbacks)
    }

    /// Currently applied migrations in apply order.
    pub async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>, HistoryError> {
        let mut records: Vec<MigrationRecord> = self
            .storage
            .entries()
            .await?
            .into_iter()
            .filter_map(|(_, state)| match state {
                MigrationState::Applied(record) => Some(record),
                _ => None,
            })
            .collect();
        records.sort_by_key(|r| r.sequence);
        Ok(records)
    }

    /// Schema version left by the most recently applied migration, or
    /// `0.0.0` when nothing is applied.
    pub async fn get_current_version(&self) -> Result<SchemaVersion, HistoryError> {
        let applied = self.get_applied_migrations().await?;
        Ok(applied
            .iter()
            .max_by(|a, b| {
                a.applied_at
                    .cmp(&b.applied_at)
                    .then(a.sequence.cmp(&b.sequence))
            })
            .map(|r| r.schema_version_after)
            .unwrap_or_default())
    }

    async fn next_sequence(&self) -> Result<u64, HistoryError> {
        let last = self
            .storage
            .entries()
            .await?
            .iter()
            .filter_map(|(_, state)| state.sequence())
            .max();
        Ok(last.map_or(0, |s| s + 1))
    }
}

fn dependents_of<'a>(
    record: &'a MigrationRecord,
    applied: &'a [MigrationRecord],
) -> impl Iterator<Item = &'a MigrationRecord> + 'a {
    applied.iter().filter(move |other| {
        other.migration_id != record.migration_id
            && other.schema_version_before == record.schema_version_after
    })
}

/// Transitive dependents of `root`, deepest first. Depth is the longest
/// dependency chain from `root`; ties go to the most recently applied.
fn cascade_order(root: &MigrationRecord, applied: &[MigrationRecord]) -> Vec<String> {
    let mut seen = BTreeSet::from([root.migration_id.as_str()]);
    let mut queue = vec![root];
    let mut reachable: Vec<&MigrationRecord> = Vec::new();
    while let Some(current) = queue.pop() {
        for dependent in dependents_of(current, applied) {
            if seen.insert(dependent.migration_id.as_str()) {
                reachable.push(dependent);
                queue.push(dependent);
            }
        }
    }

    // Longest-path relaxation; bounded by the node count so cycles stop.
    let mut depth: BTreeMap<&str, usize> = BTreeMap::new();
    depth.insert(root.migration_id.as_str(), 0);
    for _ in 0..reachable.len() {
        let mut changed = false;
        for parent in std::iter::once(root).chain(reachable.iter().copied()) {
            let Some(&parent_depth) = depth.get(parent.migration_id.as_str()) else {
                continue;
            };
            for child in dependents_of(parent, applied) {
                if child.migration_id == root.migration_id {
                    continue;
                }
                let entry = depth.entry(child.migration_id.as_str()).or_insert(0);
                if *entry < parent_depth + 1 {
                    *entry = parent_depth + 1;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    reachable.sort_by(|a, b| {
        let da = depth.get(a.migration_id.as_str()).copied().unwrap_or_default();
        let db = depth.get(b.migration_id.as_str()).copied().unwrap_or_default();
        db.cmp(&da).then(b.sequence.cmp(&a.sequence))
    });
    reachable.into_iter().map(|r| r.migration_id.clone()).collect()
}

pub fn create_migration_history<S: HistoryStorage>(storage: S) -> MigrationHistory<S> {
    MigrationHistory::new(storage)
}
