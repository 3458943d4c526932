//! `$lookup` stages for declared joins.
//!
//! Joins are applied shortest path first. Each joined association becomes a
//! lookup nested in the pipeline of the lookup it hangs off, so
//! `author.publisher` is looked up inside the `author` lookup.

use std::sync::Arc;

use docorm_core::catalog::{AssociationDef, Cardinality, Catalog, EntityDef};
use tracing::trace;

use crate::document::Doc;
use crate::error::{CompileError, Result};
use crate::model::JoinPath;
use crate::path::{leaves, property_path, PropertyPath};
use crate::state::QueryState;

/// Lookups of one entity's pipeline.
struct Stage {
    entity: Arc<EntityDef>,
    lookups: Vec<Lookup>,
}

struct Lookup {
    key: String,
    form: Form,
    unwind: Option<String>,
    child: Stage,
}

enum Form {
    /// Match local fields against foreign fields of `from`.
    Fields {
        from: String,
        local: Vec<String>,
        foreign: Vec<String>,
        alias: String,
    },
    /// Go through a join collection.
    JoinCollection {
        collection: String,
        owner_field: String,
        target_collection: String,
        alias: String,
    },
}

impl Stage {
    fn new(entity: Arc<EntityDef>) -> Self {
        Self {
            entity,
            lookups: Vec::new(),
        }
    }

    fn render(&self) -> Vec<Doc> {
        let mut pipeline = Vec::new();
        for lookup in &self.lookups {
            pipeline.push(lookup.render());
            if let Some(path) = &lookup.unwind {
                pipeline.push(unwind(path));
            }
        }
        pipeline
    }
}

impl Lookup {
    fn render(&self) -> Doc {
        let child = self.child.render();
        match &self.form {
            Form::Fields {
                from,
                local,
                foreign,
                alias,
            } => fields_lookup(from, local, foreign, child, alias),
            Form::JoinCollection {
                collection,
                owner_field,
                target_collection,
                alias,
            } => {
                let inner = vec![
                    lookup(target_collection, target_collection, "_id", child, target_collection),
                    unwind(target_collection),
                    Doc::entry(
                        "$replaceRoot",
                        Doc::entry("newRoot", Doc::string(format!("${}", target_collection))),
                    ),
                ];
                lookup(collection, "_id", owner_field, inner, alias)
            }
        }
    }
}

fn lookup(from: &str, local: &str, foreign: &str, pipeline: Vec<Doc>, alias: &str) -> Doc {
    Doc::entry(
        "$lookup",
        Doc::Object(vec![
            ("from".into(), Doc::string(from)),
            ("localField".into(), Doc::string(local)),
            ("foreignField".into(), Doc::string(foreign)),
            ("pipeline".into(), Doc::Array(pipeline)),
            ("as".into(), Doc::string(alias)),
        ]),
    )
}

/// Single-field lookups use `localField`/`foreignField`; composite ones bind
/// the local fields with `let` and match them in the sub-pipeline.
fn fields_lookup(
    from: &str,
    local: &[String],
    foreign: &[String],
    child: Vec<Doc>,
    alias: &str,
) -> Doc {
    if let ([local], [foreign]) = (local, foreign) {
        return lookup(from, local, foreign, child, alias);
    }

    let mut bindings = Vec::with_capacity(local.len());
    let mut matches = Vec::with_capacity(local.len());
    for (i, (l, f)) in local.iter().zip(foreign).enumerate() {
        let var = format!("v{}", i + 1);
        matches.push(Doc::entry(
            "$eq",
            Doc::Array(vec![
                Doc::string(format!("$${}", var)),
                Doc::string(format!("${}", f)),
            ]),
        ));
        bindings.push((var, Doc::string(format!("${}", l))));
    }
    let expr = if matches.len() > 1 {
        Doc::entry("$and", Doc::Array(matches))
    } else {
        matches.into_iter().next().unwrap_or_else(Doc::object)
    };

    let mut pipeline = vec![Doc::entry("$match", Doc::entry("$expr", expr))];
    pipeline.extend(child);
    Doc::entry(
        "$lookup",
        Doc::Object(vec![
            ("from".into(), Doc::string(from)),
            ("let".into(), Doc::Object(bindings)),
            ("pipeline".into(), Doc::Array(pipeline)),
            ("as".into(), Doc::string(alias)),
        ]),
    )
}

fn unwind(path: &str) -> Doc {
    Doc::entry(
        "$unwind",
        Doc::Object(vec![
            ("path".into(), Doc::string(format!("${}", path))),
            ("preserveNullAndEmptyArrays".into(), Doc::bool(true)),
        ]),
    )
}

/// Stored paths of `entity`'s identity fields.
fn identity_fields(catalog: &Catalog, entity: &Arc<EntityDef>) -> Result<Vec<String>> {
    let identity = entity.identity_property().cloned().ok_or_else(|| {
        CompileError::illegal_state(format!(
            "Cannot join on entity [{}] that has no declared ID",
            entity.name
        ))
    })?;
    let path = PropertyPath::root(entity.clone(), identity);
    Ok(leaves(catalog, &path)?
        .iter()
        .map(PropertyPath::persisted_path)
        .collect())
}

/// Join collection linking the two sides of `association`, declared on
/// `owner` under the property path `names`.
fn join_collection(
    catalog: &Catalog,
    owner: &EntityDef,
    names: &str,
    association: &AssociationDef,
) -> Result<String> {
    let Some(mapped_by) = &association.mapped_by else {
        return Ok(association
            .join_table
            .clone()
            .unwrap_or_else(|| format!("{}_{}", owner.persisted_name(), names.replace('.', "_"))));
    };
    let target = catalog
        .get(&association.target)
        .ok_or_else(|| CompileError::unknown_entity(&association.target))?;
    let owning = target
        .property(mapped_by)
        .and_then(|p| p.as_association())
        .ok_or_else(|| {
            CompileError::illegal_state(format!("Cannot find mapped path: {}", mapped_by))
        })?;
    Ok(owning
        .join_table
        .clone()
        .unwrap_or_else(|| format!("{}_{}", target.persisted_name(), mapped_by.replace('.', "_"))))
}

fn build_form(
    catalog: &Catalog,
    stage_entity: &Arc<EntityDef>,
    path: &PropertyPath,
    association: &AssociationDef,
    target: &Arc<EntityDef>,
) -> Result<Form> {
    let alias = path.persisted_path();
    let owner_collection = stage_entity.persisted_name().to_string();
    let target_collection = target.persisted_name().to_string();

    if association.cardinality == Cardinality::ManyToMany || association.uses_join_table() {
        identity_fields(catalog, target)?;
        identity_fields(catalog, stage_entity)?;
        return Ok(Form::JoinCollection {
            collection: join_collection(catalog, stage_entity, &path.path(), association)?,
            owner_field: owner_collection,
            target_collection,
            alias,
        });
    }

    if let Some(mapped_by) = &association.mapped_by {
        let mapped = property_path(catalog, target, mapped_by)?.ok_or_else(|| {
            CompileError::illegal_state(format!("Cannot find mapped path: {}", mapped_by))
        })?;
        if mapped.property.as_association().is_none() {
            return Err(CompileError::illegal_state(format!(
                "Expected association as a mapped path: {}",
                mapped_by
            )));
        }
        let foreign = leaves(catalog, &mapped)?
            .iter()
            .map(PropertyPath::persisted_path)
            .collect();
        return Ok(Form::Fields {
            from: target_collection,
            local: identity_fields(catalog, stage_entity)?,
            foreign,
            alias,
        });
    }

    let local = leaves(catalog, path)?
        .iter()
        .map(PropertyPath::persisted_path)
        .collect();
    Ok(Form::Fields {
        from: target_collection,
        local,
        foreign: identity_fields(catalog, target)?,
        alias,
    })
}

/// Register `joins` with `state` and build the lookup stages for them.
pub fn build(state: &mut QueryState<'_>, joins: &[JoinPath]) -> Result<Vec<Doc>> {
    if joins.is_empty() {
        return Ok(Vec::new());
    }
    let catalog = state.catalog();
    let mut sorted: Vec<&JoinPath> = joins.iter().collect();
    sorted.sort_by(|a, b| {
        a.path
            .len()
            .cmp(&b.path.len())
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut root = Stage::new(state.entity().clone());
    for join in sorted {
        let mut stage = &mut root;
        let mut segments: Vec<&str> = Vec::new();
        for segment in join.path.split('.').filter(|s| !s.is_empty()) {
            segments.push(segment);
            let this_path = segments.join(".");
            if let Some(i) = stage.lookups.iter().position(|l| l.key == this_path) {
                stage = &mut stage.lookups[i].child;
                segments.clear();
                continue;
            }

            let path = property_path(catalog, &stage.entity, &this_path)?.ok_or_else(|| {
                CompileError::invalid_argument(format!(
                    "Cannot join on non-existent property path: {}",
                    join.path
                ))
            })?;
            let Some(association) = path.property.as_association().cloned() else {
                continue;
            };
            if association.cardinality == Cardinality::Embedded {
                continue;
            }
            let target = catalog
                .get(&association.target)
                .ok_or_else(|| CompileError::unknown_entity(&association.target))?;

            trace!(entity = %stage.entity.name, path = %this_path, "adding lookup");
            let form = build_form(catalog, &stage.entity, &path, &association, &target)?;
            let unwind = association
                .cardinality
                .is_single_ended()
                .then(|| path.persisted_path())
                .filter(|_| !matches!(form, Form::JoinCollection { .. }));
            stage.lookups.push(Lookup {
                key: this_path,
                form,
                unwind,
                child: Stage::new(target),
            });
            let i = stage.lookups.len() - 1;
            stage = &mut stage.lookups[i].child;
            segments.clear();
        }
        state.add_join(&join.path, join.alias.as_deref());
    }
    Ok(root.render())
}
