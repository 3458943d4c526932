//! docorm criteria compiler.
//!
//! This crate compiles a [`Criterion`] tree, or a whole [`QueryModel`], into
//! the text of a document-store query. Values known only at execution time
//! become positional placeholders (`{$qpidx:N}`) with a matching
//! [`ParameterBinding`](docorm_proto::ParameterBinding), and the text is also
//! returned cut at each placeholder so values can be spliced in later.
//!
//! # Criteria
//!
//! ```text
//! name == 'Fred'               {name:{$eq:'Fred'}}
//! age > ?0 && active           {$and:[{age:{$gt:{$qpidx:0}}},{active:{$eq:true}}]}
//! author.id == 5               {'author._id':{$eq:5}}
//! tags in ?0                   {tags:{$in:{$qpidx:0}}}
//! ```
//!
//! Properties of an associated entity other than its identity can only be
//! used once the association is joined. Joins become `$lookup` stages and
//! turn the query into an aggregation pipeline, as do projections, sort
//! orders and paging.
//!
//! # Usage
//!
//! ```rust
//! use docorm_core::catalog::{Catalog, EntityDef, ScalarType};
//! use docorm_query::{compile, BindingParameter, Criterion};
//!
//! let catalog = Catalog::new().with_entity(
//!     EntityDef::new("Person", "id")
//!         .with_scalar("id", ScalarType::Int64)
//!         .with_scalar("name", ScalarType::String),
//! );
//!
//! let compiled = compile(
//!     &catalog,
//!     "Person",
//!     Criterion::eq("name", BindingParameter::argument(0)),
//! )
//! .unwrap();
//! assert_eq!(compiled.query, "{name:{$eq:{$qpidx:0}}}");
//! assert_eq!(compiled.parts, vec!["{name:{$eq:", "}}"]);
//! ```

pub mod compiler;
pub mod criterion;
pub mod document;
pub mod error;
mod lookup;
pub mod model;
pub mod path;
pub mod state;

pub use compiler::{compile, QueryBuilder};
pub use criterion::{BindingParameter, ComparisonOp, Criterion, CriterionValue};
pub use document::{Doc, Rendered};
pub use error::{CompileError, CompileErrorKind, Result};
pub use model::{Assignment, JoinPath, Projection, QueryModel};
pub use path::PropertyPath;
