//! Query model: the criterion tree plus joins, ordering, projections and
//! paging of one query.

use docorm_proto::{OrderSpec, Pagination};

use crate::criterion::{Criterion, CriterionValue};

/// An association path declared joined, with an optional alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPath {
    /// Dotted association path from the root entity.
    pub path: String,
    /// Alias of the joined document.
    pub alias: Option<String>,
}

/// What a query returns instead of whole documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Number of matching documents.
    Count,
    /// Only the identity.
    Id,
    /// One property.
    Property(String),
    /// Sum of a property.
    Sum(String),
    /// Minimum of a property.
    Min(String),
    /// Maximum of a property.
    Max(String),
}

/// One `property = value` assignment of an update statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Property path to set.
    pub property: String,
    /// New value.
    pub value: CriterionValue,
}

impl Assignment {
    /// Create an assignment.
    pub fn new(property: impl Into<String>, value: impl Into<CriterionValue>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

/// A query against one root entity.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryModel {
    /// Root entity name.
    pub entity: String,
    /// Root criterion; always a conjunction.
    pub criteria: Criterion,
    /// Declared joins.
    pub joins: Vec<JoinPath>,
    /// Sort order.
    pub order_by: Vec<OrderSpec>,
    /// Projections.
    pub projections: Vec<Projection>,
    /// Paging.
    pub pagination: Option<Pagination>,
}

impl QueryModel {
    /// A query over every document of `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            criteria: Criterion::Conjunction(Vec::new()),
            joins: Vec::new(),
            order_by: Vec::new(),
            projections: Vec::new(),
            pagination: None,
        }
    }

    /// Add a criterion to the root conjunction.
    pub fn filter(mut self, criterion: Criterion) -> Self {
        if let Criterion::Conjunction(children) = &mut self.criteria {
            children.push(criterion);
        }
        self
    }

    /// Declare `path` joined.
    pub fn join(mut self, path: impl Into<String>) -> Self {
        self.joins.push(JoinPath {
            path: path.into(),
            alias: None,
        });
        self
    }

    /// Declare `path` joined under `alias`.
    pub fn join_as(mut self, path: impl Into<String>, alias: impl Into<String>) -> Self {
        self.joins.push(JoinPath {
            path: path.into(),
            alias: Some(alias.into()),
        });
        self
    }

    /// Add a sort order.
    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.order_by.push(order);
        self
    }

    /// Add a projection.
    pub fn project(mut self, projection: Projection) -> Self {
        self.projections.push(projection);
        self
    }

    /// Set paging.
    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}
