//! In-memory backend, selected by the `memory://` scheme
//!
//! Intended for tests and local development. Nothing survives the process.

mod store;

pub use store::{MemoryFactory, MemoryStore, MemoryTable, ParentLink, ParentTable};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use stockroom_core::DatabaseConfig;

use super::{BackendFactory, BackendHandle, RegistrySet};
use crate::entity::EntityId;
use crate::error::{RegistryError, RegistryResult};
use crate::models::{Area, Commodity, Location, Tenant, User, AREA_COMMODITIES, LOCATION_AREAS};
use crate::relationships::RelationshipTracker;

#[derive(Debug, Default)]
pub struct MemoryBackend;

impl MemoryBackend {
    pub fn new() -> Self {
        Self
    }

    /// Build a fresh, empty registry set
    pub fn build(&self) -> RegistrySet {
        let location_areas = Arc::new(RelationshipTracker::new(LOCATION_AREAS));
        let area_commodities = Arc::new(RelationshipTracker::new(AREA_COMMODITIES));

        let locations = Arc::new(MemoryTable::<Location>::new());
        let areas = Arc::new(MemoryTable::<Area>::new());
        let commodities = Arc::new(MemoryTable::<Commodity>::new());

        let handle = MemoryHandle {
            trackers: [location_areas.clone(), area_commodities.clone()]
                .into_iter()
                .map(|t| (t.def().name, t))
                .collect(),
            closed: AtomicBool::new(false),
        };

        RegistrySet::new(
            self.name(),
            Arc::new(MemoryFactory::new(Arc::new(MemoryTable::<Tenant>::new()), vec![], vec![])),
            Arc::new(MemoryFactory::new(Arc::new(MemoryTable::<User>::new()), vec![], vec![])),
            Arc::new(MemoryFactory::new(locations.clone(), vec![], vec![location_areas.clone()])),
            Arc::new(MemoryFactory::new(
                areas.clone(),
                vec![ParentLink {
                    tracker: location_areas,
                    parent: locations,
                }],
                vec![area_commodities.clone()],
            )),
            Arc::new(MemoryFactory::new(
                commodities,
                vec![ParentLink {
                    tracker: area_commodities,
                    parent: areas,
                }],
                vec![],
            )),
            Arc::new(handle),
        )
    }
}

#[async_trait]
impl BackendFactory for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open(&self, config: &DatabaseConfig) -> RegistryResult<RegistrySet> {
        tracing::debug!(environment = %config.environment, "opening in-memory registry");
        Ok(self.build())
    }
}

struct MemoryHandle {
    trackers: HashMap<&'static str, Arc<RelationshipTracker>>,
    closed: AtomicBool,
}

#[async_trait]
impl BackendHandle for MemoryHandle {
    async fn ping(&self) -> RegistryResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RegistryError::Connection("in-memory registry is closed".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> RegistryResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    async fn children_of(&self, relation: &str, parent: EntityId) -> RegistryResult<Vec<EntityId>> {
        self.trackers
            .get(relation)
            .map(|tracker| tracker.children_of(parent))
            .ok_or_else(|| RegistryError::storage("relationship", "children_of", format!("unknown relationship '{relation}'")))
    }
}
