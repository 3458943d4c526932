//! Compiled query artifacts.
//!
//! A [`CompiledQuery`] carries the rendered query document both as one text
//! (with `{$qpidx:N}` placeholders) and as the ordered text segments found
//! between placeholders, together with the ordered [`ParameterBinding`]s that
//! say where each placeholder's value comes from.

use crate::error::Error;
use crate::value::Value;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// Key of the placeholder document that marks a bound value.
pub const PLACEHOLDER_KEY: &str = "$qpidx";

/// Where a bound value comes from at execution time.
#[derive(
    Debug, Clone, PartialEq, Eq, Default, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub struct BindingSource {
    /// Parameter name, if the criterion named one.
    pub name: Option<String>,
    /// Index of the call argument supplying the value.
    pub argument_index: Option<u32>,
    /// Property path to read from the argument, for object arguments.
    pub argument_path: Option<Vec<String>>,
}

impl BindingSource {
    /// A source identified by parameter name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// A source identified by call argument index.
    pub fn argument(index: u32) -> Self {
        Self {
            argument_index: Some(index),
            ..Self::default()
        }
    }
}

/// One bound value of a compiled query.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct ParameterBinding {
    /// Placeholder key, the position rendered as a string.
    pub key: String,
    /// Zero-based position, unique and increasing within one compilation.
    pub position: u32,
    /// Where the value comes from.
    pub source: BindingSource,
    /// Property path the criterion was written against.
    pub property_path: Option<Vec<String>>,
    /// Leaf property path the value is compared with after expansion.
    pub outgoing_path: Option<Vec<String>>,
    /// Whether a collection argument expands into several values.
    pub expandable: bool,
}

impl ParameterBinding {
    /// Create a binding at `position`.
    pub fn new(position: u32, source: BindingSource) -> Self {
        Self {
            key: position.to_string(),
            position,
            source,
            property_path: None,
            outgoing_path: None,
            expandable: false,
        }
    }

    /// Set the incoming property path.
    pub fn with_property_path(mut self, path: Vec<String>) -> Self {
        self.property_path = Some(path);
        self
    }

    /// Set the outgoing property path.
    pub fn with_outgoing_path(mut self, path: Vec<String>) -> Self {
        self.outgoing_path = Some(path);
        self
    }

    /// Mark the binding as expandable.
    pub fn expandable(mut self, expandable: bool) -> Self {
        self.expandable = expandable;
        self
    }
}

/// Resolves the value for a binding at execution time.
pub trait BindingValueResolver {
    /// Produce the value for `binding`.
    fn resolve(&self, binding: &ParameterBinding) -> Result<Value, Error>;
}

impl<F> BindingValueResolver for F
where
    F: Fn(&ParameterBinding) -> Result<Value, Error>,
{
    fn resolve(&self, binding: &ParameterBinding) -> Result<Value, Error> {
        self(binding)
    }
}

/// Order specification for sorting results.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct OrderSpec {
    /// Property path to order by.
    pub field: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Create an ascending order spec.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order spec.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Paging information of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct Pagination {
    /// Maximum number of results, `None` for unbounded.
    pub limit: Option<u32>,
    /// Number of results to skip.
    pub offset: u32,
}

impl Pagination {
    /// Create pagination with limit and offset.
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    /// Create pagination with just a limit.
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }

    /// Create pagination with just an offset.
    pub fn offset(offset: u32) -> Self {
        Self {
            limit: None,
            offset,
        }
    }
}

/// Output of one compilation pass.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct CompiledQuery {
    /// Query document text, placeholders included.
    pub query: String,
    /// Text segments of `query` around each placeholder.
    pub parts: Vec<String>,
    /// Update document text, for update statements.
    pub update: Option<String>,
    /// Text segments of `update` around each placeholder.
    pub update_parts: Vec<String>,
    /// Bindings in placeholder order, query placeholders first.
    pub bindings: Vec<ParameterBinding>,
    /// Paging information.
    pub pagination: Option<Pagination>,
}

/// A compiled query with every placeholder replaced by a literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedQuery {
    /// Query document text.
    pub query: String,
    /// Update document text, for update statements.
    pub update: Option<String>,
}

impl CompiledQuery {
    /// Number of placeholders in the query document.
    pub fn query_binding_count(&self) -> usize {
        self.parts.len().saturating_sub(1)
    }

    /// Substitute `values` (one per binding, in position order) into the
    /// text segments.
    pub fn materialize(&self, values: &[Value]) -> Result<MaterializedQuery, Error> {
        if values.len() != self.bindings.len() {
            return Err(Error::BindingCount {
                expected: self.bindings.len(),
                actual: values.len(),
            });
        }

        let split = self.query_binding_count();
        let query = interleave(&self.parts, &values[..split]);
        let update = self
            .update
            .as_ref()
            .map(|_| interleave(&self.update_parts, &values[split..]));
        Ok(MaterializedQuery { query, update })
    }

    /// Resolve each binding through `resolver`, then materialize.
    pub fn bind(&self, resolver: &dyn BindingValueResolver) -> Result<MaterializedQuery, Error> {
        let values = self
            .bindings
            .iter()
            .map(|binding| resolver.resolve(binding))
            .collect::<Result<Vec<_>, _>>()?;
        self.materialize(&values)
    }
}

fn interleave(parts: &[String], values: &[Value]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        out.push_str(part);
        if let Some(value) = values.get(i) {
            value.write_literal(&mut out);
        }
    }
    out
}
