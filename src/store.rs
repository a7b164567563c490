//! The live set of groups and its write-through synchronization with a backend.
//!
//! [`GroupStore`] is the single owner of all group state. It runs as a kameo
//! actor (see [`crate::store_actor`]) so every lookup, mutation and backend
//! write for one request completes before the next request is looked at.

use std::collections::HashMap;

use kameo::Actor;
use log::{error, info, warn};
use storage::{Backend, GroupBackend};

use crate::{
    error::{GroupError, StoreError},
    group::{Group, Retention},
};

#[derive(Actor)]
pub struct GroupStore {
    groups: HashMap<String, Group>,
    backend: Backend,
}

impl GroupStore {
    /// Empty store; nothing is read from the backend.
    pub fn new(backend: Backend) -> Self {
        Self {
            groups: HashMap::new(),
            backend,
        }
    }

    /// Load every persisted group from the backend.
    ///
    /// Documents that can't be read or parsed are left untouched in the
    /// backend and skipped. Documents without any INITIATOR are abandoned
    /// groups and are not brought back to life.
    pub async fn restore(backend: Backend) -> Result<Self, StoreError> {
        let documents = backend.load_all().await?;
        let mut store = Self::new(backend);
        for entry in documents {
            let document = match entry.document {
                Ok(document) => document,
                Err(e) => {
                    error!("Skipping unreadable group document {}: {e}", entry.id);
                    continue;
                }
            };
            let mut group: Group = match serde_json::from_str(&document) {
                Ok(group) => group,
                Err(e) => {
                    error!("Skipping malformed group document {}: {e}", entry.id);
                    continue;
                }
            };
            group.normalize();
            if !group.has_initiator() {
                warn!("Skipping {group}: no initiator left");
                continue;
            }
            store.add(group);
        }
        info!(
            "Restored {} groups from {} backend",
            store.groups.len(),
            store.backend.kind()
        );
        Ok(store)
    }

    pub fn find_by_id(&self, id: &str) -> Result<&Group, GroupError> {
        self.groups
            .get(id)
            .ok_or_else(|| GroupError::GroupNotFound(id.to_string()))
    }

    pub fn find_optional_by_id(&self, id: &str) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn add(&mut self, group: Group) {
        self.groups.insert(group.id().to_string(), group);
    }

    pub fn remove(&mut self, id: &str) -> Option<Group> {
        self.groups.remove(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups_containing_member(&self, member_id: &str) -> Vec<&Group> {
        let mut groups: Vec<&Group> = self
            .groups
            .values()
            .filter(|group| group.contains_member(member_id))
            .collect();
        groups.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(b.id())));
        groups
    }

    /// Apply `change` to a working copy of the group, then run the
    /// backup-or-remove policy on it.
    ///
    /// The live copy is only replaced once the backend accepted the write, so
    /// a failed persist leaves memory exactly as it was before the call.
    pub async fn mutate<T>(
        &mut self,
        group_id: &str,
        change: impl FnOnce(&mut Group) -> Result<T, GroupError>,
    ) -> Result<(T, Retention), StoreError> {
        let mut working = self.find_by_id(group_id)?.clone();
        let outcome = change(&mut working)?;
        let retention = self.backup_or_remove(working).await?;
        Ok((outcome, retention))
    }

    /// Persist the group while it still has an INITIATOR, otherwise drop it
    /// from both memory and backend.
    pub async fn backup_or_remove(&mut self, group: Group) -> Result<Retention, StoreError> {
        let retention = group.retention();
        match retention {
            Retention::Persist => {
                info!("BACKUP {group}");
                let document = serde_json::to_string(&group)?;
                self.backend
                    .save(group.id(), document)
                    .await
                    .inspect_err(|e| error!("Failed to back up {group}: {e}"))?;
                self.add(group);
            }
            Retention::Remove => {
                info!("REMOVE {group}");
                self.backend
                    .delete(group.id())
                    .await
                    .inspect_err(|e| error!("Failed to remove {group}: {e}"))?;
                self.remove(group.id());
            }
        }
        Ok(retention)
    }
}
