//! Roster: a policy's per-actor rights table with a calculated cache,
//! a staged change log, and a snapshot/restore backup.
//!
//! The staged `changes` + `backup` pair together form a tiny in-memory WAL:
//! `change` appends a command, `clear_changes` is the commit path,
//! `restore_backup` is the abort path.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::actor::Actor;
use super::rights::Right;

/// The action a staged change applies. This is a closed, two-variant enum
/// rather than an open string/int tag, which structurally rules out the
/// "unrecognized action" programmer error the original interface-based
/// design could hit at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RosterAction {
    Set,
    Unset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub action: RosterAction,
    pub actor: Actor,
    pub rights: Right,
}

/// Everyone's baseline plus the per-actor registry cells. Grouped under one
/// lock because `change` mutates both together.
#[derive(Debug, Clone, Default)]
struct Registry {
    everyone: Right,
    cells: Vec<(Actor, Right)>,
}

#[derive(Debug, Clone)]
struct Backup {
    registry: Registry,
    cache: HashMap<Actor, Right>,
}

#[derive(Debug, Default)]
pub struct Roster {
    registry: RwLock<Registry>,
    cache: RwLock<HashMap<Actor, Right>>,
    changes: RwLock<Vec<ChangeEntry>>,
    backup: RwLock<Option<Backup>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached summary if present; else scans the registry
    /// linearly for the first cell matching `actor`, writing the result
    /// back to the cache. Returns `NoAccess` on miss.
    pub fn lookup(&self, actor: Actor) -> Right {
        if let Some(r) = self.cache.read().get(&actor) {
            return *r;
        }
        let reg = self.registry.read();
        let r = match actor {
            Actor::Everyone => reg.everyone,
            _ => reg
                .cells
                .iter()
                .find(|(a, _)| *a == actor)
                .map(|(_, r)| *r)
                .unwrap_or(Right::NO_ACCESS),
        };
        drop(reg);
        self.cache.write().insert(actor, r);
        r
    }

    pub fn has(&self, actor: Actor, rights: Right) -> bool {
        self.lookup(actor).has(rights)
    }

    pub fn everyone(&self) -> Right {
        self.registry.read().everyone
    }

    /// Ensures a backup exists, then applies the change in-memory and
    /// appends one entry to the staged change log. `Everyone` is stored in
    /// the top-level `everyone` field, not in the registry; for
    /// `User`/`Group`/`RoleGroup`, `Set` upserts a registry cell and
    /// `Unset` removes it.
    pub fn change(&self, action: RosterAction, actor: Actor, rights: Right) {
        self.ensure_backup();

        let mut reg = self.registry.write();
        match actor {
            Actor::Everyone => {
                reg.everyone = match action {
                    RosterAction::Set => rights,
                    RosterAction::Unset => Right::NO_ACCESS,
                };
            }
            _ => match action {
                RosterAction::Set => {
                    if let Some(cell) = reg.cells.iter_mut().find(|(a, _)| *a == actor) {
                        cell.1 = rights;
                    } else {
                        reg.cells.push((actor, rights));
                    }
                }
                RosterAction::Unset => {
                    reg.cells.retain(|(a, _)| *a != actor);
                }
            },
        }
        drop(reg);

        self.cache.write().remove(&actor);
        self.changes.write().push(ChangeEntry { action, actor, rights });
    }

    fn ensure_backup(&self) {
        let mut backup = self.backup.write();
        if backup.is_none() {
            *backup = Some(Backup {
                registry: self.registry.read().clone(),
                cache: self.cache.read().clone(),
            });
        }
    }

    /// Drops `changes` and `backup`; called after a successful store
    /// commit.
    pub fn clear_changes(&self) {
        self.changes.write().clear();
        *self.backup.write() = None;
    }

    /// Atomically restores `(everyone, registry)` from the snapshot and
    /// drops the snapshot and the changes log. No-op if there is no
    /// backup.
    pub fn restore_backup(&self) {
        let mut backup = self.backup.write();
        if let Some(b) = backup.take() {
            *self.registry.write() = b.registry;
            *self.cache.write() = b.cache;
        }
        drop(backup);
        self.changes.write().clear();
    }

    /// Drops every cached summary. Used when a policy's lineage changes
    /// Used when a policy's lineage changes, since that invalidates any cached
    /// access summary computed against the old lineage.
    pub fn invalidate_cache(&self) {
        self.cache.write().clear();
    }

    pub fn has_backup(&self) -> bool {
        self.backup.read().is_some()
    }

    pub fn staged_changes(&self) -> Vec<ChangeEntry> {
        self.changes.read().clone()
    }

    pub fn registry_cells(&self) -> Vec<(Actor, Right)> {
        self.registry.read().cells.clone()
    }
}

impl Clone for Roster {
    fn clone(&self) -> Self {
        Self {
            registry: RwLock::new(self.registry.read().clone()),
            cache: RwLock::new(self.cache.read().clone()),
            changes: RwLock::new(self.changes.read().clone()),
            backup: RwLock::new(self.backup.read().clone()),
        }
    }
}
