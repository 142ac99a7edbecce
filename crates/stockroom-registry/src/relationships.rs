//! Parent/child relationships between entity types
//!
//! Each relationship is tracked by its own [`RelationshipTracker`] with a
//! dedicated lock. Lock order when a store touches a tracker: the store's
//! own table first, then the parent table, then the tracker.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::entity::EntityId;

/// What happens to a parent delete while children exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Refuse the delete
    Restrict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDef {
    pub name: &'static str,
    pub parent_entity: &'static str,
    pub parent_table: &'static str,
    pub child_entity: &'static str,
    pub child_table: &'static str,
    /// Column on the child table holding the parent id
    pub foreign_key: &'static str,
    pub on_delete: DeletePolicy,
}

/// One-to-many association index: parent id to child ids
#[derive(Debug)]
pub struct RelationshipTracker {
    def: RelationDef,
    children: RwLock<HashMap<EntityId, Vec<EntityId>>>,
}

impl RelationshipTracker {
    pub fn new(def: RelationDef) -> Self {
        Self {
            def,
            children: RwLock::new(HashMap::new()),
        }
    }

    pub fn def(&self) -> &RelationDef {
        &self.def
    }

    pub fn add(&self, parent: EntityId, child: EntityId) {
        let mut children = self.children.write();
        let entry = children.entry(parent).or_default();
        if !entry.contains(&child) {
            entry.push(child);
        }
    }

    /// Returns false when the association did not exist
    pub fn remove(&self, parent: EntityId, child: EntityId) -> bool {
        let mut children = self.children.write();
        let Some(entry) = children.get_mut(&parent) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|c| *c != child);
        let removed = entry.len() != before;
        if entry.is_empty() {
            children.remove(&parent);
        }
        removed
    }

    /// Children in insertion order
    pub fn children_of(&self, parent: EntityId) -> Vec<EntityId> {
        self.children.read().get(&parent).cloned().unwrap_or_default()
    }

    pub fn child_count(&self, parent: EntityId) -> usize {
        self.children.read().get(&parent).map_or(0, Vec::len)
    }
}
