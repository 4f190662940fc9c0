//! Per-shard recovery state
//!
//! Every execution shard keeps its own copy of the recovery state so that
//! request handlers can read it without coordination. All copies are written
//! together under one lock, stamped with a version and published on a
//! broadcast channel, so a reader never observes shards disagreeing.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;
use tracing::debug;

use super::state::{RecoveryState, StateTransitionError};

const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// Published after every successful state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub version: u64,
    pub state: RecoveryState,
}

#[derive(Debug)]
struct ShardTable {
    version: u64,
    shards: Vec<RecoveryState>,
}

#[derive(Debug)]
struct Inner {
    table: RwLock<ShardTable>,
    updates: broadcast::Sender<StateSnapshot>,
}

/// Versioned recovery state replicated across shards
#[derive(Debug, Clone)]
pub struct ShardStates {
    inner: Arc<Inner>,
}

impl ShardStates {
    /// Create `shard_count` slots, all `Inactive`. At least one slot exists.
    pub fn new(shard_count: usize) -> Self {
        let (updates, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                table: RwLock::new(ShardTable {
                    version: 0,
                    shards: vec![RecoveryState::Inactive; shard_count.max(1)],
                }),
                updates,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ShardTable> {
        self.inner
            .table
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ShardTable> {
        self.inner
            .table
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn shard_count(&self) -> usize {
        self.read().shards.len()
    }

    /// State seen by the handling shard
    pub fn local(&self) -> RecoveryState {
        self.read().shards[0]
    }

    /// State seen by shard `shard`, if it exists
    pub fn shard(&self, shard: usize) -> Option<RecoveryState> {
        self.read().shards.get(shard).copied()
    }

    /// Every shard's state, in shard order
    pub fn all(&self) -> Vec<RecoveryState> {
        self.read().shards.clone()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let table = self.read();
        StateSnapshot {
            version: table.version,
            state: table.shards[0],
        }
    }

    /// Receive every future state change
    pub fn subscribe(&self) -> broadcast::Receiver<StateSnapshot> {
        self.inner.updates.subscribe()
    }

    /// Claim the recovery: `Inactive -> Starting` on every shard as one step.
    ///
    /// On conflict the current state is returned and nothing changes.
    pub fn try_begin(&self) -> Result<StateSnapshot, RecoveryState> {
        let mut table = self.write();
        let current = table.shards[0];
        if current != RecoveryState::Inactive {
            return Err(current);
        }
        Ok(self.apply(&mut table, RecoveryState::Starting))
    }

    /// Move every shard to `next`, rejecting illegal transitions
    pub fn propagate(&self, next: RecoveryState) -> Result<StateSnapshot, StateTransitionError> {
        let mut table = self.write();
        table.shards[0].transition(next)?;
        Ok(self.apply(&mut table, next))
    }

    /// Force every shard back to `Inactive`. Returns the previous state.
    pub fn reset(&self) -> RecoveryState {
        let mut table = self.write();
        let previous = table.shards[0];
        if previous != RecoveryState::Inactive {
            self.apply(&mut table, RecoveryState::Inactive);
        }
        previous
    }

    fn apply(&self, table: &mut ShardTable, next: RecoveryState) -> StateSnapshot {
        let from = table.shards[0];
        table.shards.iter_mut().for_each(|s| *s = next);
        table.version += 1;

        let snapshot = StateSnapshot {
            version: table.version,
            state: next,
        };
        debug!(from = %from, to = %next, version = snapshot.version, "recovery state propagated");

        // No subscribers is fine.
        let _ = self.inner.updates.send(snapshot);
        snapshot
    }
}
