//! Compiler from criterion trees to document queries.

use std::sync::Arc;

use docorm_core::catalog::{Catalog, EntityDef};
use docorm_proto::{CompiledQuery, OrderDirection, Value};
use tracing::{debug, trace};

use crate::criterion::{BindingParameter, Criterion, CriterionValue};
use crate::document::{put, render, Doc};
use crate::error::{CompileError, Result};
use crate::lookup;
use crate::model::{Assignment, Projection, QueryModel};
use crate::path::{find_property, leaves, property_path};
use crate::state::QueryState;

/// Compile `criterion` as a query against `entity`.
pub fn compile(catalog: &Catalog, entity: &str, criterion: Criterion) -> Result<CompiledQuery> {
    QueryBuilder::new(catalog).build_query(&QueryModel::new(entity).filter(criterion))
}

/// Builds query, update and delete documents against one catalog.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    catalog: &'a Catalog,
}

impl<'a> QueryBuilder<'a> {
    /// Create a builder for `catalog`.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    fn entity(&self, name: &str) -> Result<Arc<EntityDef>> {
        self.catalog
            .get(name)
            .ok_or_else(|| CompileError::unknown_entity(name))
    }

    /// Build a find query.
    ///
    /// Produces the bare predicate when the query only filters, and an
    /// aggregation pipeline when it also joins, projects, sorts or pages.
    pub fn build_query(&self, model: &QueryModel) -> Result<CompiledQuery> {
        let entity = self.entity(&model.entity)?;
        let mut state = QueryState::new(self.catalog, entity, true);

        let lookups = lookup::build(&mut state, &model.joins)?;
        let predicate = handle(&mut state, &model.criteria)?;

        let mut tail = Vec::new();
        let mut projection = Vec::new();
        for p in &model.projections {
            match p {
                Projection::Count => tail.push(Doc::entry("$count", Doc::string("result"))),
                Projection::Id => put(&mut projection, "_id", Doc::int(1)),
                Projection::Property(name) => {
                    let key = projected(&state, name)?;
                    put(&mut projection, key, Doc::int(1));
                }
                Projection::Sum(name) => aggregate(&state, &mut projection, "$sum", name)?,
                Projection::Min(name) => aggregate(&state, &mut projection, "$min", name)?,
                Projection::Max(name) => aggregate(&state, &mut projection, "$max", name)?,
            }
        }
        if !projection.is_empty() {
            tail.push(Doc::entry("$project", Doc::Object(projection)));
        }

        if !model.order_by.is_empty() {
            let mut sort = Vec::with_capacity(model.order_by.len());
            for order in &model.order_by {
                let path = find_property(&state, &order.field, None)?;
                let direction = match order.direction {
                    OrderDirection::Asc => 1,
                    OrderDirection::Desc => -1,
                };
                put(&mut sort, path.persisted_path(), Doc::int(direction));
            }
            tail.push(Doc::entry("$sort", Doc::Object(sort)));
        }

        if let Some(pagination) = &model.pagination {
            if pagination.offset > 0 {
                tail.push(Doc::entry("$skip", Doc::int(i64::from(pagination.offset))));
            }
            if let Some(limit) = pagination.limit {
                tail.push(Doc::entry("$limit", Doc::int(i64::from(limit))));
            }
        }

        let document = if lookups.is_empty() && tail.is_empty() {
            predicate
        } else {
            let mut pipeline = lookups;
            if !predicate.is_empty_object() {
                pipeline.push(Doc::entry("$match", predicate));
            }
            pipeline.extend(tail);
            Doc::Array(pipeline)
        };

        let rendered = render(&document);
        let bindings = state.into_bindings();
        debug!(entity = %model.entity, bindings = bindings.len(), "compiled query");
        trace!(query = %rendered.text, "query document");
        Ok(CompiledQuery {
            query: rendered.text,
            parts: rendered.parts,
            update: None,
            update_parts: Vec::new(),
            bindings,
            pagination: model.pagination,
        })
    }

    /// Build an update statement: the model's predicate plus a `$set` of
    /// `assignments`.
    pub fn build_update(
        &self,
        model: &QueryModel,
        assignments: &[Assignment],
    ) -> Result<CompiledQuery> {
        let mut state = self.statement_state(model)?;
        if assignments.is_empty() {
            return Err(CompileError::invalid_argument(
                "Cannot build an update without assignments",
            ));
        }

        let predicate = handle(&mut state, &model.criteria)?;
        let mut set = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let path = find_property(&state, &assignment.property, Some("Update"))?;
            let value = value_doc(&mut state, &assignment.value, None, None, false);
            put(&mut set, path.persisted_path(), value);
        }

        let query = render(&predicate);
        let update = render(&Doc::entry("$set", Doc::Object(set)));
        let bindings = state.into_bindings();
        debug!(entity = %model.entity, bindings = bindings.len(), "compiled update");
        Ok(CompiledQuery {
            query: query.text,
            parts: query.parts,
            update: Some(update.text),
            update_parts: update.parts,
            bindings,
            pagination: None,
        })
    }

    /// Build a delete statement: the model's predicate.
    pub fn build_delete(&self, model: &QueryModel) -> Result<CompiledQuery> {
        let mut state = self.statement_state(model)?;
        let predicate = handle(&mut state, &model.criteria)?;

        let query = render(&predicate);
        let bindings = state.into_bindings();
        debug!(entity = %model.entity, bindings = bindings.len(), "compiled delete");
        Ok(CompiledQuery {
            query: query.text,
            parts: query.parts,
            update: None,
            update_parts: Vec::new(),
            bindings,
            pagination: None,
        })
    }

    fn statement_state(&self, model: &QueryModel) -> Result<QueryState<'a>> {
        if !model.joins.is_empty() {
            return Err(CompileError::join_not_allowed());
        }
        let entity = self.entity(&model.entity)?;
        Ok(QueryState::new(self.catalog, entity, false))
    }
}

fn projected(state: &QueryState<'_>, name: &str) -> Result<String> {
    if name != "id" && property_path(state.catalog(), state.entity(), name)?.is_none() {
        return Err(CompileError::invalid_argument(format!(
            "Cannot project on non-existent property: {}",
            name
        )));
    }
    Ok(find_property(state, name, None)?.persisted_path())
}

fn aggregate(
    state: &QueryState<'_>,
    projection: &mut Vec<(String, Doc)>,
    op: &str,
    name: &str,
) -> Result<()> {
    let key = projected(state, name)?;
    let value = Doc::entry(op, Doc::string(format!("${}", key)));
    put(projection, key, value);
    Ok(())
}

/// Compile one criterion to its predicate document.
fn handle(state: &mut QueryState<'_>, criterion: &Criterion) -> Result<Doc> {
    match criterion {
        Criterion::Conjunction(children) => junction(state, "$and", children),
        Criterion::Disjunction(children) => junction(state, "$or", children),
        Criterion::Negation(children) => negation(state, children),
        Criterion::Equals { property, value } => {
            operator(state, criterion.name(), property, "$eq", value)
        }
        Criterion::NotEquals { property, value } => {
            operator(state, criterion.name(), property, "$ne", value)
        }
        Criterion::GreaterThan { property, value } => {
            operator(state, criterion.name(), property, "$gt", value)
        }
        Criterion::GreaterThanEquals { property, value } => {
            operator(state, criterion.name(), property, "$gte", value)
        }
        Criterion::LessThan { property, value } => {
            operator(state, criterion.name(), property, "$lt", value)
        }
        Criterion::LessThanEquals { property, value } => {
            operator(state, criterion.name(), property, "$lte", value)
        }
        Criterion::Regex { property, value } => {
            operator(state, criterion.name(), property, "$regex", value)
        }
        Criterion::IsNull { property } => {
            handle(state, &Criterion::eq(property.as_str(), Value::Null))
        }
        Criterion::IsNotNull { property } => {
            handle(state, &Criterion::ne(property.as_str(), Value::Null))
        }
        Criterion::IsTrue { property } => handle(state, &Criterion::eq(property.as_str(), true)),
        Criterion::IsFalse { property } => handle(state, &Criterion::eq(property.as_str(), false)),
        Criterion::IdEquals(value) => {
            let identity = state.entity().identity.clone().unwrap_or_else(|| "id".into());
            handle(state, &Criterion::eq(identity, value.clone()))
        }
        Criterion::VersionEquals(value) => {
            let entity = state.entity();
            let version = entity.version.clone().ok_or_else(|| {
                CompileError::illegal_state(format!(
                    "Version criteria cannot be used on unversioned entity: {}",
                    entity.name
                ))
            })?;
            handle(state, &Criterion::eq(version, value.clone()))
        }
        Criterion::Between { property, from, to } => handle(
            state,
            &Criterion::and(vec![
                Criterion::gte(property.as_str(), from.clone()),
                Criterion::lte(property.as_str(), to.clone()),
            ]),
        ),
        Criterion::In { property, value } => {
            membership(state, criterion.name(), property, "$in", value)
        }
        Criterion::NotIn { property, value } => {
            membership(state, criterion.name(), property, "$nin", value)
        }
        Criterion::IsEmpty { property } => {
            let key = single_leaf(state, criterion.name(), property)?;
            Ok(Doc::entry(
                "$or",
                Doc::Array(vec![
                    Doc::entry(key.as_str(), Doc::entry("$eq", Doc::string(""))),
                    Doc::entry(key, Doc::entry("$exists", Doc::bool(false))),
                ]),
            ))
        }
        Criterion::IsNotEmpty { property } => {
            let key = single_leaf(state, criterion.name(), property)?;
            Ok(Doc::entry(
                "$and",
                Doc::Array(vec![
                    Doc::entry(key.as_str(), Doc::entry("$ne", Doc::string(""))),
                    Doc::entry(key, Doc::entry("$exists", Doc::bool(true))),
                ]),
            ))
        }
        Criterion::PropertyComparison { op, property, other } => {
            let name = criterion.name();
            let left = find_property(state, property, Some(name))?;
            let right = find_property(state, other, Some(name))?;
            Ok(Doc::entry(
                "$expr",
                Doc::entry(
                    op.operator(),
                    Doc::Array(vec![
                        Doc::string(format!("${}", left.persisted_path())),
                        Doc::string(format!("${}", right.persisted_path())),
                    ]),
                ),
            ))
        }
        Criterion::Like { .. } | Criterion::SizeEquals { .. } => {
            Err(CompileError::unsupported(criterion.name()))
        }
    }
}

fn junction(state: &mut QueryState<'_>, op: &str, children: &[Criterion]) -> Result<Doc> {
    let mut docs = compile_children(state, children)?;
    if docs.len() == 1 {
        return Ok(docs.remove(0));
    }
    if docs.is_empty() {
        return Ok(Doc::object());
    }
    Ok(Doc::entry(op, Doc::Array(docs)))
}

fn negation(state: &mut QueryState<'_>, children: &[Criterion]) -> Result<Doc> {
    let mut docs = compile_children(state, children)?;
    let negated = match docs.len() {
        0 => return Ok(Doc::object()),
        1 => docs.remove(0),
        _ => Doc::entry("$or", Doc::Array(docs)),
    };
    Ok(Doc::entry("$not", negated))
}

fn compile_children(state: &mut QueryState<'_>, children: &[Criterion]) -> Result<Vec<Doc>> {
    let mut docs = Vec::with_capacity(children.len());
    for child in children {
        let doc = handle(state, child)?;
        if !doc.is_empty_object() {
            docs.push(doc);
        }
    }
    Ok(docs)
}

/// `{path: {op: value}}`, one entry per stored leaf of `property`.
fn operator(
    state: &mut QueryState<'_>,
    criterion: &str,
    property: &str,
    op: &str,
    value: &CriterionValue,
) -> Result<Doc> {
    let path = find_property(state, property, Some(criterion))?;
    let leaves = leaves(state.catalog(), &path)?;
    if leaves.is_empty() {
        return Err(CompileError::invalid_argument(format!(
            "Cannot use [{}] criterion on property without comparable values: {}",
            criterion, property
        )));
    }
    let expanded = leaves.len() != 1 || leaves[0].names() != path.names();

    let mut entries = Vec::with_capacity(leaves.len());
    for leaf in &leaves {
        let doc = match value {
            CriterionValue::Literal(literal) => {
                if leaves.len() != 1 {
                    return Err(CompileError::invalid_argument(format!(
                        "Cannot compare embedded property [{}] with a literal value",
                        property
                    )));
                }
                Doc::Literal(literal.clone())
            }
            CriterionValue::Parameter(parameter) if expanded => {
                bind(state, parameter, Some(path.names()), Some(leaf.names()), false)
            }
            CriterionValue::Parameter(parameter) => bind(state, parameter, None, None, false),
        };
        put(&mut entries, leaf.persisted_path(), Doc::entry(op, doc));
    }
    Ok(Doc::Object(entries))
}

/// `{path: {$in|$nin: [values]}}`. A bound value is one expandable binding.
fn membership(
    state: &mut QueryState<'_>,
    criterion: &str,
    property: &str,
    op: &str,
    value: &CriterionValue,
) -> Result<Doc> {
    let key = single_leaf(state, criterion, property)?;
    let values = match value {
        CriterionValue::Literal(literal) => Doc::Array(
            literal
                .elements()
                .into_iter()
                .map(Doc::Literal)
                .collect(),
        ),
        CriterionValue::Parameter(_) => value_doc(state, value, None, None, true),
    };
    Ok(Doc::entry(key, Doc::entry(op, values)))
}

/// Stored path of a criterion property that must not expand to several
/// leaves.
fn single_leaf(state: &QueryState<'_>, criterion: &str, property: &str) -> Result<String> {
    let path = find_property(state, property, Some(criterion))?;
    let mut leaves = leaves(state.catalog(), &path)?;
    if leaves.len() != 1 {
        return Err(CompileError::invalid_argument(format!(
            "Cannot use [{}] criterion on embedded property: {}",
            criterion, property
        )));
    }
    Ok(leaves.remove(0).persisted_path())
}

fn value_doc(
    state: &mut QueryState<'_>,
    value: &CriterionValue,
    incoming: Option<Vec<String>>,
    outgoing: Option<Vec<String>>,
    expandable: bool,
) -> Doc {
    match value {
        CriterionValue::Literal(literal) => Doc::Literal(literal.clone()),
        CriterionValue::Parameter(parameter) => {
            bind(state, parameter, incoming, outgoing, expandable)
        }
    }
}

fn bind(
    state: &mut QueryState<'_>,
    parameter: &BindingParameter,
    incoming: Option<Vec<String>>,
    outgoing: Option<Vec<String>>,
    expandable: bool,
) -> Doc {
    let position = state.push_parameter(parameter, incoming, outgoing, expandable);
    trace!(position, "bound parameter");
    Doc::Placeholder(position)
}
