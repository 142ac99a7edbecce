//! PostgreSQL backend, selected by the `postgres://` and `postgresql://` schemes
//!
//! Records round-trip through JSONB: writes go through
//! `jsonb_populate_record` and reads come back as `to_jsonb(row)`, so the
//! entity's serde shape must match its declared columns. Every operation is
//! bounded by the configured operation timeout.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use stockroom_core::DatabaseConfig;

use super::{BackendFactory, BackendHandle, RegistrySet};
use crate::entity::{Entity, EntityId};
use crate::error::{RegistryError, RegistryResult};
use crate::models::{self, Area, Commodity, Location, Tenant, User};
use crate::relationships::RelationDef;
use crate::scope::{Principal, Scope};
use crate::store::{EntityStore, ListFilter, ScopedFactory, StoreRef};

#[derive(Debug, Default)]
pub struct PostgresBackend;

impl PostgresBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BackendFactory for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn open(&self, config: &DatabaseConfig) -> RegistryResult<RegistrySet> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.operation_timeout)
            .connect(config.dsn.as_str())
            .await
            .map_err(|e| {
                RegistryError::Connection(format!(
                    "failed to connect to {}: {}",
                    config.dsn.redacted(),
                    e
                ))
            })?;

        let shared = Arc::new(PgShared {
            pool,
            timeout: config.operation_timeout,
        });
        let handle = PgHandle {
            shared: shared.clone(),
        };
        if let Err(e) = handle.ping().await {
            shared.pool.close().await;
            return Err(e);
        }

        tracing::info!(
            dsn = %config.dsn.redacted(),
            max_connections = config.max_connections,
            "connected to PostgreSQL"
        );

        Ok(RegistrySet::new(
            self.name(),
            Arc::new(PgFactory::<Tenant>::new(shared.clone())),
            Arc::new(PgFactory::<User>::new(shared.clone())),
            Arc::new(PgFactory::<Location>::new(shared.clone())),
            Arc::new(PgFactory::<Area>::new(shared.clone())),
            Arc::new(PgFactory::<Commodity>::new(shared)),
            Arc::new(handle),
        ))
    }
}

struct PgShared {
    pool: PgPool,
    timeout: Duration,
}

impl PgShared {
    async fn bounded<T, F>(&self, entity: &'static str, operation: &'static str, fut: F) -> RegistryResult<T>
    where
        F: Future<Output = RegistryResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(entity, operation, timeout = ?self.timeout, "operation cancelled");
                Err(RegistryError::Cancelled {
                    entity,
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }
}

fn db_error(entity: &'static str, operation: &'static str, error: sqlx::Error) -> RegistryError {
    match error {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            RegistryError::Connection(format!("{operation} on {entity}: {error}"))
        }
        other => RegistryError::storage(entity, operation, other),
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Table metadata shared by all views of one entity type
struct PgTable {
    name: &'static str,
    columns: Vec<String>,
    parents: Vec<RelationDef>,
    children: Vec<RelationDef>,
}

impl PgTable {
    fn of<E: Entity>() -> Self {
        let schema = E::table_schema();
        Self {
            name: E::table_name(),
            columns: schema.column_names().into_iter().map(String::from).collect(),
            parents: models::parent_relations(E::table_name()),
            children: models::child_relations(E::table_name()),
        }
    }

    fn column_list(&self) -> String {
        self.columns.join(", ")
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

struct PgFactory<E: Entity> {
    shared: Arc<PgShared>,
    table: Arc<PgTable>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> PgFactory<E> {
    fn new(shared: Arc<PgShared>) -> Self {
        Self {
            shared,
            table: Arc::new(PgTable::of::<E>()),
            _entity: PhantomData,
        }
    }

    fn view(&self, scope: Scope) -> StoreRef<E> {
        Arc::new(PgStore::<E> {
            shared: self.shared.clone(),
            table: self.table.clone(),
            scope,
            _entity: PhantomData,
        })
    }
}

impl<E: Entity> ScopedFactory<E> for PgFactory<E> {
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

struct PgStore<E: Entity> {
    shared: Arc<PgShared>,
    table: Arc<PgTable>,
    scope: Scope,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> PgStore<E> {
    /// Owner predicate on alias `t`, using placeholder `$param` when bound
    fn scope_clause(&self, param: usize) -> (String, Option<EntityId>) {
        match self.scope {
            Scope::Service => ("TRUE".to_string(), None),
            Scope::Tenant(tenant_id) => (format!("t.tenant_id = ${param}"), Some(tenant_id)),
            Scope::User(principal) => (format!("t.user_id = ${param}"), Some(principal.user_id)),
        }
    }

    fn decode(row: &PgRow) -> RegistryResult<E> {
        let value: serde_json::Value = row
            .try_get("row")
            .map_err(|e| RegistryError::storage(E::ENTITY_NAME, "decode", e))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Lock every referenced parent that is visible to this view
    async fn lock_parents(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        entity: &E,
    ) -> RegistryResult<()> {
        for relation in &self.table.parents {
            let Some(parent_id) = entity.parent_ref(relation.foreign_key) else {
                continue;
            };
            let (clause, owner) = self.scope_clause(2);
            let sql = format!(
                "SELECT 1 FROM {} t WHERE t.id = $1 AND {} FOR SHARE",
                relation.parent_table, clause
            );
            let mut query = sqlx::query(&sql).bind(parent_id);
            if let Some(owner) = owner {
                query = query.bind(owner);
            }
            let found = query
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| db_error(E::ENTITY_NAME, "lock parent", e))?;
            if found.is_none() {
                return Err(RegistryError::not_found(relation.parent_entity, parent_id));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for PgStore<E> {
    async fn create(&self, mut entity: E) -> RegistryResult<E> {
        let id = entity.primary_key().unwrap_or_else(EntityId::new_v4);
        entity.set_primary_key(id);
        self.scope.stamp(entity.ownership_mut());
        let payload = serde_json::to_value(&entity)?;

        self.shared
            .bounded(E::ENTITY_NAME, "create", async {
                let mut tx = self
                    .shared
                    .pool
                    .begin()
                    .await
                    .map_err(|e| db_error(E::ENTITY_NAME, "create", e))?;
                self.lock_parents(&mut tx, &entity).await?;

                let columns = self.table.column_list();
                let sql = format!(
                    "INSERT INTO {table} ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)",
                    table = self.table.name,
                );
                sqlx::query(&sql)
                    .bind(&payload)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        if is_unique_violation(&e) {
                            RegistryError::AlreadyExists {
                                entity: E::ENTITY_NAME,
                                id: id.to_string(),
                            }
                        } else {
                            db_error(E::ENTITY_NAME, "create", e)
                        }
                    })?;
                tx.commit()
                    .await
                    .map_err(|e| db_error(E::ENTITY_NAME, "create", e))
            })
            .await?;

        tracing::debug!(entity = E::ENTITY_NAME, %id, scope = self.scope.kind(), "created");
        Ok(entity)
    }

    async fn get(&self, id: EntityId) -> RegistryResult<E> {
        self.shared
            .bounded(E::ENTITY_NAME, "get", async {
                let (clause, owner) = self.scope_clause(2);
                let sql = format!(
                    "SELECT to_jsonb(t) AS row FROM {} t WHERE t.id = $1 AND {}",
                    self.table.name, clause
                );
                let mut query = sqlx::query(&sql).bind(id);
                if let Some(owner) = owner {
                    query = query.bind(owner);
                }
                let row = query
                    .fetch_optional(&self.shared.pool)
                    .await
                    .map_err(|e| db_error(E::ENTITY_NAME, "get", e))?
                    .ok_or_else(|| RegistryError::not_found(E::ENTITY_NAME, id))?;
                Self::decode(&row)
            })
            .await
    }

    async fn list(&self, filter: &ListFilter) -> RegistryResult<Vec<E>> {
        if let Some((foreign_key, _)) = &filter.parent {
            if !self.table.has_column(foreign_key) {
                return Err(RegistryError::storage(
                    E::ENTITY_NAME,
                    "list",
                    format!("unknown column '{foreign_key}'"),
                ));
            }
        }

        self.shared
            .bounded(E::ENTITY_NAME, "list", async {
                let (clause, owner) = self.scope_clause(1);
                let mut sql = format!("SELECT to_jsonb(t) AS row FROM {} t WHERE {}", self.table.name, clause);
                let mut next = if owner.is_some() { 2 } else { 1 };
                if let Some((foreign_key, _)) = &filter.parent {
                    sql.push_str(&format!(" AND t.{foreign_key} = ${next}"));
                    next += 1;
                }
                sql.push_str(" ORDER BY t.id");
                if let Some(limit) = filter.limit {
                    sql.push_str(&format!(" LIMIT {limit}"));
                }
                if filter.offset > 0 {
                    sql.push_str(&format!(" OFFSET {}", filter.offset));
                }
                tracing::trace!(entity = E::ENTITY_NAME, params = next - 1, %sql, "list");

                let mut query = sqlx::query(&sql);
                if let Some(owner) = owner {
                    query = query.bind(owner);
                }
                if let Some((_, parent_id)) = &filter.parent {
                    query = query.bind(*parent_id);
                }
                let rows = query
                    .fetch_all(&self.shared.pool)
                    .await
                    .map_err(|e| db_error(E::ENTITY_NAME, "list", e))?;
                rows.iter().map(Self::decode).collect::<RegistryResult<Vec<E>>>()
            })
            .await
    }

    async fn update(&self, mut entity: E) -> RegistryResult<E> {
        let id = entity
            .primary_key()
            .ok_or_else(|| RegistryError::not_found(E::ENTITY_NAME, "<unsaved>"))?;
        self.scope.stamp(entity.ownership_mut());
        let payload = serde_json::to_value(&entity)?;

        self.shared
            .bounded(E::ENTITY_NAME, "update", async {
                let mut tx = self
                    .shared
                    .pool
                    .begin()
                    .await
                    .map_err(|e| db_error(E::ENTITY_NAME, "update", e))?;
                self.lock_parents(&mut tx, &entity).await?;

                let columns: Vec<&str> = self
                    .table
                    .columns
                    .iter()
                    .map(String::as_str)
                    .filter(|c| *c != "id")
                    .collect();
                let columns = columns.join(", ");
                let (clause, owner) = self.scope_clause(3);
                let sql = format!(
                    "UPDATE {table} AS t SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)) WHERE t.id = $2 AND {clause}",
                    table = self.table.name,
                );
                let mut query = sqlx::query(&sql).bind(&payload).bind(id);
                if let Some(owner) = owner {
                    query = query.bind(owner);
                }
                let result = query
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_error(E::ENTITY_NAME, "update", e))?;
                if result.rows_affected() == 0 {
                    return Err(RegistryError::not_found(E::ENTITY_NAME, id));
                }
                tx.commit()
                    .await
                    .map_err(|e| db_error(E::ENTITY_NAME, "update", e))
            })
            .await?;

        tracing::debug!(entity = E::ENTITY_NAME, %id, scope = self.scope.kind(), "updated");
        Ok(entity)
    }

    async fn delete(&self, id: EntityId) -> RegistryResult<()> {
        self.shared
            .bounded(E::ENTITY_NAME, "delete", async {
                let mut tx = self
                    .shared
                    .pool
                    .begin()
                    .await
                    .map_err(|e| db_error(E::ENTITY_NAME, "delete", e))?;

                let (clause, owner) = self.scope_clause(2);
                let sql = format!(
                    "SELECT t.id FROM {} t WHERE t.id = $1 AND {} FOR UPDATE",
                    self.table.name, clause
                );
                let mut query = sqlx::query(&sql).bind(id);
                if let Some(owner) = owner {
                    query = query.bind(owner);
                }
                let found = query
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| db_error(E::ENTITY_NAME, "delete", e))?;
                if found.is_none() {
                    return Err(RegistryError::not_found(E::ENTITY_NAME, id));
                }

                for relation in &self.table.children {
                    let sql = format!(
                        "SELECT COUNT(*) FROM {} WHERE {} = $1",
                        relation.child_table, relation.foreign_key
                    );
                    let children: i64 = sqlx::query_scalar(&sql)
                        .bind(id)
                        .fetch_one(&mut *tx)
                        .await
                        .map_err(|e| db_error(E::ENTITY_NAME, "delete", e))?;
                    if children > 0 {
                        return Err(RegistryError::CascadeViolation {
                            entity: E::ENTITY_NAME,
                            id: id.to_string(),
                            relation: relation.name.to_string(),
                            children: children as usize,
                        });
                    }
                }

                let sql = format!("DELETE FROM {} WHERE id = $1", self.table.name);
                sqlx::query(&sql)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_error(E::ENTITY_NAME, "delete", e))?;
                tx.commit()
                    .await
                    .map_err(|e| db_error(E::ENTITY_NAME, "delete", e))
            })
            .await?;

        tracing::debug!(entity = E::ENTITY_NAME, %id, scope = self.scope.kind(), "deleted");
        Ok(())
    }

    async fn count(&self) -> RegistryResult<usize> {
        self.shared
            .bounded(E::ENTITY_NAME, "count", async {
                let (clause, owner) = self.scope_clause(1);
                let sql = format!("SELECT COUNT(*) FROM {} t WHERE {}", self.table.name, clause);
                let mut query = sqlx::query_scalar::<_, i64>(&sql);
                if let Some(owner) = owner {
                    query = query.bind(owner);
                }
                let count = query
                    .fetch_one(&self.shared.pool)
                    .await
                    .map_err(|e| db_error(E::ENTITY_NAME, "count", e))?;
                Ok::<_, RegistryError>(count.max(0) as usize)
            })
            .await
    }

    fn scope(&self) -> &Scope {
        &self.scope
    }
}

struct PgHandle {
    shared: Arc<PgShared>,
}

#[async_trait]
impl BackendHandle for PgHandle {
    async fn ping(&self) -> RegistryResult<()> {
        self.shared
            .bounded("database", "ping", async {
                sqlx::query("SELECT 1")
                    .execute(&self.shared.pool)
                    .await
                    .map(|_| ())
                    .map_err(|e| RegistryError::Connection(format!("ping failed: {e}")))
            })
            .await
    }

    async fn close(&self) -> RegistryResult<()> {
        self.shared.pool.close().await;
        Ok(())
    }

    async fn children_of(&self, relation: &str, parent: EntityId) -> RegistryResult<Vec<EntityId>> {
        let def = models::relations()
            .into_iter()
            .find(|r| r.name == relation)
            .ok_or_else(|| {
                RegistryError::storage("relationship", "children_of", format!("unknown relationship '{relation}'"))
            })?;

        self.shared
            .bounded(def.child_entity, "children_of", async {
                let sql = format!(
                    "SELECT id FROM {} WHERE {} = $1 ORDER BY id",
                    def.child_table, def.foreign_key
                );
                sqlx::query_scalar::<_, EntityId>(&sql)
                    .bind(parent)
                    .fetch_all(&self.shared.pool)
                    .await
                    .map_err(|e| db_error(def.child_entity, "children_of", e))
            })
            .await
    }
}
