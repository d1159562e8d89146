//! Policy Store: the transactional persistence contract the manager
//! is a write-through cache in front of, plus an in-memory default
//! implementation used by tests and by callers with no external store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::ids::PolicyId;

use super::entity::Policy;
use super::error::PolicyError;
use super::roster::{ChangeEntry, Roster, RosterAction};

/// A policy's roster, or the sentinel meaning no roster rows exist yet.
pub enum RosterRecord {
    Empty,
    Present(Roster),
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn create_policy(&self, policy: Policy, roster: Roster) -> Result<(Policy, Roster), PolicyError>;

    /// Updates mutable fields (`parent_id`, `owner_id`, `flags`) and
    /// applies the policy's staged `changes` list as upserts/deletes;
    /// commit clears `changes`.
    async fn update_policy(&self, policy: &Policy, roster: &Roster) -> Result<(), PolicyError>;

    async fn fetch_policy_by_id(&self, id: PolicyId) -> Result<Policy, PolicyError>;
    async fn fetch_policy_by_key(&self, key: &str) -> Result<Policy, PolicyError>;
    async fn fetch_policy_by_object(&self, object_name: &str, object_id: &str) -> Result<Policy, PolicyError>;

    async fn delete_policy(&self, policy: &Policy) -> Result<(), PolicyError>;

    async fn fetch_roster_by_policy_id(&self, id: PolicyId) -> Result<RosterRecord, PolicyError>;
    async fn create_roster(&self, policy_id: PolicyId, roster: &Roster) -> Result<(), PolicyError>;
    async fn update_roster(&self, policy_id: PolicyId, roster: &Roster) -> Result<(), PolicyError>;
    async fn delete_roster(&self, policy_id: PolicyId) -> Result<(), PolicyError>;
}

struct Row {
    policy: Policy,
    everyone: crate::policy::rights::Right,
    cells: Vec<(crate::policy::actor::Actor, crate::policy::rights::Right)>,
}

/// Reference implementation used by tests and by any deployment that does
/// not need durability across restarts. Keeps its own independent copy of
/// each roster's observable state (not a shared `Roster` handle), matching
/// a real store that marshals rows to and from a table.
#[derive(Default)]
pub struct InMemoryPolicyStore {
    rows: RwLock<HashMap<PolicyId, Row>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn create_policy(&self, policy: Policy, roster: Roster) -> Result<(Policy, Roster), PolicyError> {
        let row = Row {
            policy: policy.clone(),
            everyone: roster.everyone(),
            cells: roster.registry_cells(),
        };
        self.rows.write().insert(policy.id(), row);
        Ok((policy, roster))
    }

    async fn update_policy(&self, policy: &Policy, roster: &Roster) -> Result<(), PolicyError> {
        let mut rows = self.rows.write();
        let row = rows.get_mut(&policy.id()).ok_or_else(PolicyError::not_found)?;
        row.policy = policy.clone();
        for change in roster.staged_changes() {
            apply_change(&mut row.everyone, &mut row.cells, &change);
        }
        Ok(())
    }

    async fn fetch_policy_by_id(&self, id: PolicyId) -> Result<Policy, PolicyError> {
        self.rows
            .read()
            .get(&id)
            .map(|r| r.policy.clone())
            .ok_or_else(PolicyError::not_found)
    }

    async fn fetch_policy_by_key(&self, key: &str) -> Result<Policy, PolicyError> {
        self.rows
            .read()
            .values()
            .find(|r| r.policy.key() == Some(key))
            .map(|r| r.policy.clone())
            .ok_or_else(PolicyError::not_found)
    }

    async fn fetch_policy_by_object(&self, object_name: &str, object_id: &str) -> Result<Policy, PolicyError> {
        self.rows
            .read()
            .values()
            .find(|r| r.policy.object() == Some((object_name, object_id)))
            .map(|r| r.policy.clone())
            .ok_or_else(PolicyError::not_found)
    }

    async fn delete_policy(&self, policy: &Policy) -> Result<(), PolicyError> {
        self.rows.write().remove(&policy.id());
        Ok(())
    }

    async fn fetch_roster_by_policy_id(&self, id: PolicyId) -> Result<RosterRecord, PolicyError> {
        let rows = self.rows.read();
        let row = rows.get(&id).ok_or_else(PolicyError::not_found)?;
        if row.cells.is_empty() && row.everyone.is_empty() {
            return Ok(RosterRecord::Empty);
        }
        let roster = Roster::new();
        if !row.everyone.is_empty() {
            roster.change(RosterAction::Set, crate::policy::actor::Actor::Everyone, row.everyone);
        }
        for (actor, rights) in &row.cells {
            roster.change(RosterAction::Set, *actor, *rights);
        }
        roster.clear_changes();
        Ok(RosterRecord::Present(roster))
    }

    async fn create_roster(&self, policy_id: PolicyId, roster: &Roster) -> Result<(), PolicyError> {
        let mut rows = self.rows.write();
        let row = rows.get_mut(&policy_id).ok_or_else(PolicyError::not_found)?;
        row.everyone = roster.everyone();
        row.cells = roster.registry_cells();
        Ok(())
    }

    async fn update_roster(&self, policy_id: PolicyId, roster: &Roster) -> Result<(), PolicyError> {
        let mut rows = self.rows.write();
        let row = rows.get_mut(&policy_id).ok_or_else(PolicyError::not_found)?;
        for change in roster.staged_changes() {
            apply_change(&mut row.everyone, &mut row.cells, &change);
        }
        Ok(())
    }

    async fn delete_roster(&self, policy_id: PolicyId) -> Result<(), PolicyError> {
        let mut rows = self.rows.write();
        let row = rows.get_mut(&policy_id).ok_or_else(PolicyError::not_found)?;
        row.everyone = crate::policy::rights::Right::NO_ACCESS;
        row.cells.clear();
        Ok(())
    }
}

fn apply_change(
    everyone: &mut crate::policy::rights::Right,
    cells: &mut Vec<(crate::policy::actor::Actor, crate::policy::rights::Right)>,
    change: &ChangeEntry,
) {
    use crate::policy::actor::Actor;
    match change.actor {
        Actor::Everyone => {
            *everyone = match change.action {
                RosterAction::Set => change.rights,
                RosterAction::Unset => crate::policy::rights::Right::NO_ACCESS,
            };
        }
        actor => match change.action {
            RosterAction::Set => {
                if let Some(cell) = cells.iter_mut().find(|(a, _)| *a == actor) {
                    cell.1 = change.rights;
                } else {
                    cells.push((actor, change.rights));
                }
            }
            RosterAction::Unset => cells.retain(|(a, _)| *a != actor),
        },
    }
}
