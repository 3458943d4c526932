//! Entity metadata catalog.
//!
//! Entities, their persistent properties in declared order, and the
//! association metadata (multiplicity, cascade flags, mapped-by side, join
//! collection) the compiler and the cascade engine consult.

mod association;
#[allow(clippy::module_inception)]
mod catalog;
mod entity;

pub use association::{AssociationDef, Cardinality, CascadePhase, CascadeType};
pub use catalog::Catalog;
pub use entity::{EntityDef, PropertyDef, PropertyKind, ScalarType};
