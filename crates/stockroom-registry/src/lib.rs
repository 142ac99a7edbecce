//! # stockroom-registry
//!
//! Backend-agnostic persistence for the inventory entities. A
//! [`BackendRegistry`] maps connection-string schemes to backends; opening
//! one yields a [`RegistrySet`] with a scoped factory per entity type.
//! Views created from the same set share state and differ only in which
//! owner's records they can see.
//!
//! ```rust
//! use stockroom_core::DatabaseConfig;
//! use stockroom_registry::{BackendRegistry, ListFilter, models::Location};
//!
//! # tokio_test::block_on(async {
//! let registry = BackendRegistry::with_defaults();
//! let config = DatabaseConfig::new("memory://").unwrap();
//! let set = registry.open(&config).await.unwrap();
//!
//! let locations = set.locations().create_service_registry();
//! locations.create(Location::new("Garage")).await.unwrap();
//! assert_eq!(locations.list(&ListFilter::all()).await.unwrap().len(), 1);
//! # });
//! ```

pub mod backends;
pub mod entity;
pub mod error;
pub mod models;
pub mod relationships;
pub mod scope;
pub mod store;

pub use backends::{BackendFactory, BackendHandle, BackendRegistry, MemoryBackend, PostgresBackend, RegistrySet};
pub use entity::{Entity, EntityId, Ownership};
pub use error::{RegistryError, RegistryResult};
pub use relationships::{DeletePolicy, RelationDef, RelationshipTracker};
pub use scope::{Principal, Scope};
pub use store::{EntityStore, FactoryRef, ListFilter, ScopedFactory, StoreRef};
