//! docorm shared types.
//!
//! This crate defines the values and compiled-query artifacts exchanged
//! between the criteria compiler (`docorm-query`) and whoever executes the
//! resulting documents.
//!
//! # Modules
//!
//! - [`value`] - Scalar values and their document-literal rendering
//! - [`query`] - Compiled queries, parameter bindings, ordering and pagination
//! - [`error`] - Binding errors
//!
//! # Serialization
//!
//! The types derive `rkyv` and `serde` traits, so a compiled query can be
//! cached or shipped to another process:
//!
//! ```ignore
//! let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&compiled).unwrap();
//! ```

pub mod error;
pub mod query;
pub mod value;

pub use error::Error;

pub use query::{
    BindingSource, BindingValueResolver, CompiledQuery, MaterializedQuery, OrderDirection,
    OrderSpec, Pagination, ParameterBinding, PLACEHOLDER_KEY,
};
pub use value::Value;
