//! docorm core: entity metadata, cascading writes and operation frames.
//!
//! # Modules
//!
//! - [`catalog`] - Entity, property and association metadata
//! - [`entity`] - Runtime entity records, identity readers, persisted sets
//! - [`cascade`] - Cascade discovery and the sync/async executors
//! - [`operation`] - Lifecycle events, operation frames, repository facades
//! - [`config`] - Operation configuration and dialect capabilities
//! - [`error`] - Error types

pub mod cascade;
pub mod catalog;
pub mod config;
pub mod entity;
pub mod error;
pub mod operation;

pub use cascade::{
    AsyncCascadeExecutor, AsyncCascadeHelper, CascadeContext, CascadeExecutor, CascadeHelper,
    CascadeOp, OperationContext, Veto,
};
pub use catalog::{
    AssociationDef, Cardinality, CascadePhase, CascadeType, Catalog, EntityDef, PropertyDef,
    PropertyKind, ScalarType,
};
pub use config::{Dialect, DialectCapabilities, OperationConfig};
pub use entity::{EntityRef, IdentityReaders, PersistedSet, Record, Slot};
pub use error::{Error, Result};
pub use operation::{
    AsyncEntitiesOperation, AsyncEntityOperation, AsyncEntityStore, Data, EntitiesOperation,
    EntityEventListener, EntityEventRegistry, EntityOperation, EntityStore, EventType,
    ReactiveRepositoryOperations, RepositoryOperations,
};
