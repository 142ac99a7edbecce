//! In-memory entity store
//!
//! Each entity type has one [`MemoryTable`] behind a readers-writer lock.
//! Scoped views share the table and differ only in their [`Scope`].
//!
//! Lock order: own table, then parent table (read), then relationship
//! tracker. A parent delete takes its own table write lock and then reads
//! the tracker; it never touches a child table.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::entity::{Entity, EntityId};
use crate::error::{RegistryError, RegistryResult};
use crate::relationships::RelationshipTracker;
use crate::scope::{Principal, Scope};
use crate::store::{EntityStore, ListFilter, ScopedFactory, StoreRef};

pub struct MemoryTable<E: Entity> {
    rows: RwLock<BTreeMap<EntityId, E>>,
}

impl<E: Entity> MemoryTable<E> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl<E: Entity> Default for MemoryTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a parent table used while attaching children
pub trait ParentTable: Send + Sync {
    fn entity_name(&self) -> &'static str;

    /// Run `attach` under the table's read lock, provided `id` exists and
    /// is visible to `scope`
    fn with_visible(&self, id: EntityId, scope: &Scope, attach: &mut dyn FnMut()) -> RegistryResult<()>;
}

impl<E: Entity> ParentTable for MemoryTable<E> {
    fn entity_name(&self) -> &'static str {
        E::ENTITY_NAME
    }

    fn with_visible(&self, id: EntityId, scope: &Scope, attach: &mut dyn FnMut()) -> RegistryResult<()> {
        let rows = self.rows.read();
        match rows.get(&id) {
            Some(row) if scope.permits(row.ownership()) => {
                attach();
                Ok(())
            }
            _ => Err(RegistryError::not_found(E::ENTITY_NAME, id)),
        }
    }
}

/// Relationship in which this entity is the child
#[derive(Clone)]
pub struct ParentLink {
    pub tracker: Arc<RelationshipTracker>,
    pub parent: Arc<dyn ParentTable>,
}

#[derive(Clone)]
struct Wiring {
    parents: Arc<Vec<ParentLink>>,
    children: Arc<Vec<Arc<RelationshipTracker>>>,
}

/// Hands out scoped views over one shared [`MemoryTable`]
pub struct MemoryFactory<E: Entity> {
    table: Arc<MemoryTable<E>>,
    wiring: Wiring,
}

impl<E: Entity> MemoryFactory<E> {
    pub fn new(
        table: Arc<MemoryTable<E>>,
        parents: Vec<ParentLink>,
        children: Vec<Arc<RelationshipTracker>>,
    ) -> Self {
        Self {
            table,
            wiring: Wiring {
                parents: Arc::new(parents),
                children: Arc::new(children),
            },
        }
    }

    fn view(&self, scope: Scope) -> StoreRef<E> {
        Arc::new(MemoryStore {
            table: self.table.clone(),
            scope,
            wiring: self.wiring.clone(),
        })
    }
}

impl<E: Entity> ScopedFactory<E> for MemoryFactory<E> {
    fn create_user_registry(&self, principal: Option<&Principal>) -> RegistryResult<StoreRef<E>> {
        Ok(self.view(Scope::for_user(principal)?))
    }

    fn create_tenant_registry(&self, tenant_id: EntityId) -> RegistryResult<StoreRef<E>> {
        Ok(self.view(Scope::for_tenant(tenant_id)?))
    }

    fn create_service_registry(&self) -> StoreRef<E> {
        self.view(Scope::Service)
    }
}

pub struct MemoryStore<E: Entity> {
    table: Arc<MemoryTable<E>>,
    scope: Scope,
    wiring: Wiring,
}

impl<E: Entity> MemoryStore<E> {
    /// Associate `child` with every parent it references. On failure the
    /// associations made so far are undone.
    fn attach_parents(&self, entity: &E, child: EntityId) -> RegistryResult<()> {
        self.attach_where(entity, child, |_| true)
    }

    /// Like [`Self::attach_parents`], restricted to the links `include` selects
    fn attach_where(
        &self,
        entity: &E,
        child: EntityId,
        include: impl Fn(&ParentLink) -> bool,
    ) -> RegistryResult<()> {
        let mut attached: Vec<(&ParentLink, EntityId)> = Vec::new();
        for link in self.wiring.parents.iter().filter(|link| include(*link)) {
            let Some(parent_id) = entity.parent_ref(link.tracker.def().foreign_key) else {
                continue;
            };
            let tracker = &link.tracker;
            let result = link
                .parent
                .with_visible(parent_id, &self.scope, &mut || tracker.add(parent_id, child));
            if let Err(e) = result {
                for (done, id) in attached {
                    done.tracker.remove(id, child);
                }
                return Err(e);
            }
            attached.push((link, parent_id));
        }
        Ok(())
    }

    fn detach_parents(&self, entity: &E, child: EntityId) {
        for link in self.wiring.parents.iter() {
            if let Some(parent_id) = entity.parent_ref(link.tracker.def().foreign_key) {
                link.tracker.remove(parent_id, child);
            }
        }
    }

    /// Move `child` from the parents `existing` references to the ones
    /// `entity` references. The new associations are made first, so the
    /// child stays counted under its old parent until the move can no
    /// longer fail.
    fn move_parents(&self, existing: &E, entity: &E, child: EntityId) -> RegistryResult<()> {
        let changed = |link: &ParentLink| {
            let fk = link.tracker.def().foreign_key;
            existing.parent_ref(fk) != entity.parent_ref(fk)
        };
        self.attach_where(entity, child, changed)?;
        for link in self.wiring.parents.iter().filter(|link| changed(*link)) {
            if let Some(parent_id) = existing.parent_ref(link.tracker.def().foreign_key) {
                link.tracker.remove(parent_id, child);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for MemoryStore<E> {
    async fn create(&self, mut entity: E) -> RegistryResult<E> {
        let id = entity.primary_key().unwrap_or_else(EntityId::new_v4);
        entity.set_primary_key(id);
        self.scope.stamp(entity.ownership_mut());

        let mut rows = self.table.rows.write();
        if rows.contains_key(&id) {
            return Err(RegistryError::AlreadyExists {
                entity: E::ENTITY_NAME,
                id: id.to_string(),
            });
        }
        self.attach_parents(&entity, id)?;
        rows.insert(id, entity.clone());

        tracing::debug!(entity = E::ENTITY_NAME, %id, scope = self.scope.kind(), "created");
        Ok(entity)
    }

    async fn get(&self, id: EntityId) -> RegistryResult<E> {
        let rows = self.table.rows.read();
        rows.get(&id)
            .filter(|row| self.scope.permits(row.ownership()))
            .cloned()
            .ok_or_else(|| RegistryError::not_found(E::ENTITY_NAME, id))
    }

    async fn list(&self, filter: &ListFilter) -> RegistryResult<Vec<E>> {
        if let Some((foreign_key, _)) = &filter.parent {
            if E::table_schema().get_field(foreign_key).is_none() {
                return Err(RegistryError::storage(
                    E::ENTITY_NAME,
                    "list",
                    format!("unknown column '{foreign_key}'"),
                ));
            }
        }

        let rows = self.table.rows.read();
        let visible = rows
            .values()
            .filter(|row| self.scope.permits(row.ownership()) && filter.matches(*row))
            .cloned();
        Ok(filter.page(visible))
    }

    async fn update(&self, mut entity: E) -> RegistryResult<E> {
        let id = entity
            .primary_key()
            .ok_or_else(|| RegistryError::not_found(E::ENTITY_NAME, "<unsaved>"))?;

        let mut rows = self.table.rows.write();
        let existing = rows
            .get(&id)
            .filter(|row| self.scope.permits(row.ownership()))
            .cloned()
            .ok_or_else(|| RegistryError::not_found(E::ENTITY_NAME, id))?;

        self.scope.stamp(entity.ownership_mut());

        self.move_parents(&existing, &entity, id)?;
        rows.insert(id, entity.clone());

        tracing::debug!(entity = E::ENTITY_NAME, %id, scope = self.scope.kind(), "updated");
        Ok(entity)
    }

    async fn delete(&self, id: EntityId) -> RegistryResult<()> {
        let mut rows = self.table.rows.write();
        let existing = rows
            .get(&id)
            .filter(|row| self.scope.permits(row.ownership()))
            .ok_or_else(|| RegistryError::not_found(E::ENTITY_NAME, id))?;

        for tracker in self.wiring.children.iter() {
            let children = tracker.child_count(id);
            if children > 0 {
                return Err(RegistryError::CascadeViolation {
                    entity: E::ENTITY_NAME,
                    id: id.to_string(),
                    relation: tracker.def().name.to_string(),
                    children,
                });
            }
        }

        self.detach_parents(existing, id);
        rows.remove(&id);

        tracing::debug!(entity = E::ENTITY_NAME, %id, scope = self.scope.kind(), "deleted");
        Ok(())
    }

    async fn count(&self) -> RegistryResult<usize> {
        let rows = self.table.rows.read();
        Ok(rows.values().filter(|row| self.scope.permits(row.ownership())).count())
    }

    fn scope(&self) -> &Scope {
        &self.scope
    }
}
