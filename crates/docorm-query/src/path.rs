//! Property path resolution.
//!
//! A criterion names a property by a dotted path from the root entity. The
//! path resolves to the chain of associations it crosses plus the final
//! property. Crossing a non-embedded association needs that association to
//! be joined, except for reading the identity of a one-valued association,
//! which is stored on the owner.

use std::sync::Arc;

use docorm_core::catalog::{AssociationDef, Cardinality, Catalog, EntityDef, PropertyDef};
use tracing::debug;

use crate::error::{CompileError, Result};
use crate::state::QueryState;

/// One association crossed by a property path.
#[derive(Debug, Clone)]
pub struct PathAssociation {
    /// Entity declaring the association.
    pub owner: Arc<EntityDef>,
    /// The association property.
    pub property: PropertyDef,
    /// Association metadata.
    pub association: AssociationDef,
    /// Entity on the other side.
    pub target: Arc<EntityDef>,
}

impl PathAssociation {
    fn is_embedded(&self) -> bool {
        self.association.cardinality == Cardinality::Embedded
    }
}

/// A resolved property path.
#[derive(Debug, Clone)]
pub struct PropertyPath {
    /// Associations crossed, outermost first.
    pub associations: Vec<PathAssociation>,
    /// Entity declaring `property`.
    pub owner: Arc<EntityDef>,
    /// The final property.
    pub property: PropertyDef,
    /// Alias of the join the path reads through.
    pub alias: Option<String>,
}

impl PropertyPath {
    pub(crate) fn root(owner: Arc<EntityDef>, property: PropertyDef) -> Self {
        Self {
            associations: Vec::new(),
            owner,
            property,
            alias: None,
        }
    }

    /// Property names along the path.
    pub fn names(&self) -> Vec<String> {
        self.associations
            .iter()
            .map(|a| a.property.name.clone())
            .chain(std::iter::once(self.property.name.clone()))
            .collect()
    }

    /// Dotted property names.
    pub fn path(&self) -> String {
        self.names().join(".")
    }

    /// Dotted stored names. Identity properties are stored as `_id`.
    pub fn persisted_path(&self) -> String {
        self.associations
            .iter()
            .map(|a| persisted_segment(&a.owner, &a.property))
            .chain(std::iter::once(persisted_segment(&self.owner, &self.property)))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Stored name of `property` on `owner`.
pub fn persisted_segment<'p>(owner: &EntityDef, property: &'p PropertyDef) -> &'p str {
    if owner.is_identity(&property.name) {
        "_id"
    } else {
        property.persisted_name()
    }
}

/// Walk `name` from `entity`. `None` when some segment does not exist.
pub fn property_path(
    catalog: &Catalog,
    entity: &Arc<EntityDef>,
    name: &str,
) -> Result<Option<PropertyPath>> {
    let segments: Vec<&str> = name.split('.').collect();
    let Some((last, init)) = segments.split_last() else {
        return Ok(None);
    };

    let mut current = entity.clone();
    let mut associations = Vec::with_capacity(init.len());
    for segment in init {
        let Some(property) = current.property(segment) else {
            return Ok(None);
        };
        let Some(association) = property.as_association() else {
            return Ok(None);
        };
        let target = catalog
            .get(&association.target)
            .ok_or_else(|| CompileError::unknown_entity(&association.target))?;
        associations.push(PathAssociation {
            owner: current.clone(),
            property: property.clone(),
            association: association.clone(),
            target: target.clone(),
        });
        current = target;
    }

    let Some(property) = current.property(last).cloned() else {
        return Ok(None);
    };
    Ok(Some(PropertyPath {
        associations,
        owner: current,
        property,
        alias: None,
    }))
}

/// Resolve `name` for a criterion of type `criterion` (`None` for sort
/// orders), checking that every association it reads through is joined.
pub fn find_property(
    state: &QueryState<'_>,
    name: &str,
    criterion: Option<&str>,
) -> Result<PropertyPath> {
    let entity = state.entity();
    let Some(mut path) = property_path(state.catalog(), entity, name)? else {
        if name == "id" {
            if let Some(identity) = entity.identity_property() {
                debug!(entity = %entity.name, identity = %identity.name, "resolving 'id' to the identity property");
                return Ok(PropertyPath::root(entity.clone(), identity.clone()));
            }
        }
        return Err(CompileError::unknown_property(criterion, name));
    };
    if path.associations.is_empty() {
        return Ok(path);
    }

    let mut join: Option<usize> = None;
    let mut names: Vec<&str> = Vec::with_capacity(path.associations.len());
    for (i, step) in path.associations.iter().enumerate() {
        names.push(&step.property.name);
        if step.is_embedded() {
            continue;
        }
        let Some(previous) = join else {
            join = Some(i);
            continue;
        };
        if path.associations[previous]
            .target
            .is_identity(&step.property.name)
        {
            join = None;
        } else {
            require_join(state, &names.join("."))?;
            join = Some(i);
        }
    }

    if let Some(previous) = join {
        if !path.associations[previous]
            .target
            .is_identity(&path.property.name)
        {
            let joined = names.join(".");
            require_join(state, &joined)?;
            path.alias = state.alias(&joined);
        }
    }
    Ok(path)
}

fn require_join(state: &QueryState<'_>, path: &str) -> Result<()> {
    if !state.allow_joins() {
        return Err(CompileError::join_not_allowed());
    }
    if !state.is_joined(path) {
        return Err(CompileError::not_joined(path));
    }
    Ok(())
}

/// Expand `path` to the stored leaves it compares: every leaf property of
/// an embedded value, or the identity of a one-valued association.
pub fn leaves(catalog: &Catalog, path: &PropertyPath) -> Result<Vec<PropertyPath>> {
    let mut out = Vec::new();
    traverse(
        catalog,
        path.associations.clone(),
        path.owner.clone(),
        &path.property,
        true,
        &mut out,
    )?;
    for leaf in &mut out {
        leaf.alias = path.alias.clone();
    }
    Ok(out)
}

fn traverse(
    catalog: &Catalog,
    associations: Vec<PathAssociation>,
    owner: Arc<EntityDef>,
    property: &PropertyDef,
    top: bool,
    out: &mut Vec<PropertyPath>,
) -> Result<()> {
    let Some(association) = property.as_association() else {
        out.push(PropertyPath {
            associations,
            owner,
            property: property.clone(),
            alias: None,
        });
        return Ok(());
    };

    if association.cardinality != Cardinality::Embedded && association.is_foreign_key() {
        if top {
            return Err(CompileError::invalid_argument(format!(
                "Cannot compare foreign key association: {}.{}",
                owner.name, property.name
            )));
        }
        return Ok(());
    }

    let target = catalog
        .get(&association.target)
        .ok_or_else(|| CompileError::unknown_entity(&association.target))?;
    let mut associations = associations;
    associations.push(PathAssociation {
        owner: owner.clone(),
        property: property.clone(),
        association: association.clone(),
        target: target.clone(),
    });

    if association.cardinality == Cardinality::Embedded {
        for embedded in &target.properties {
            traverse(
                catalog,
                associations.clone(),
                target.clone(),
                embedded,
                false,
                out,
            )?;
        }
        return Ok(());
    }

    let identity = target.identity_property().cloned().ok_or_else(|| {
        CompileError::illegal_state(format!("Identity cannot be missing for: {}", target.name))
    })?;
    traverse(catalog, associations, target, &identity, false, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileErrorKind;
    use docorm_core::catalog::ScalarType;

    fn catalog() -> Catalog {
        Catalog::new()
            .with_entity(
                EntityDef::new("Book", "isbn")
                    .with_scalar("isbn", ScalarType::String)
                    .with_scalar("title", ScalarType::String)
                    .with_association("author", AssociationDef::many_to_one("Author"))
                    .with_association("meta", AssociationDef::embedded("Meta")),
            )
            .with_entity(
                EntityDef::new("Author", "id")
                    .with_scalar("id", ScalarType::Int64)
                    .with_scalar("name", ScalarType::String)
                    .with_association("publisher", AssociationDef::many_to_one("Publisher")),
            )
            .with_entity(
                EntityDef::new("Publisher", "id")
                    .with_scalar("id", ScalarType::Int64)
                    .with_scalar("name", ScalarType::String),
            )
            .with_entity(
                EntityDef::embeddable("Meta")
                    .with_scalar("pages", ScalarType::Int32)
                    .with_association("editor", AssociationDef::many_to_one("Author")),
            )
    }

    fn resolve(catalog: &Catalog, joins: &[&str], name: &str) -> Result<PropertyPath> {
        let book = catalog.require("Book").unwrap();
        let mut state = QueryState::new(catalog, book, true);
        for join in joins {
            state.add_join(join, None);
        }
        find_property(&state, name, Some("Equals"))
    }

    #[test]
    fn test_identity_of_association_needs_no_join() {
        let catalog = catalog();
        let path = resolve(&catalog, &[], "author.id").unwrap();
        assert_eq!(path.persisted_path(), "author._id");
    }

    #[test]
    fn test_association_property_needs_join() {
        let catalog = catalog();
        let err = resolve(&catalog, &[], "author.name").unwrap_err();
        assert_eq!(err.message, "Property is not joined at path: author");
        assert!(resolve(&catalog, &["author"], "author.name").is_ok());
    }

    #[test]
    fn test_nested_join_requires_inner_path() {
        let catalog = catalog();
        let err = resolve(&catalog, &["author"], "author.publisher.name").unwrap_err();
        assert_eq!(err.message, "Property is not joined at path: author.publisher");
        assert!(resolve(&catalog, &["author.publisher"], "author.publisher.name").is_ok());
    }

    #[test]
    fn test_embedded_is_transparent() {
        let catalog = catalog();
        let path = resolve(&catalog, &[], "meta.pages").unwrap();
        assert_eq!(path.persisted_path(), "meta.pages");
        assert!(resolve(&catalog, &[], "meta.editor.id").is_ok());
    }

    #[test]
    fn test_joins_disallowed() {
        let catalog = catalog();
        let book = catalog.require("Book").unwrap();
        let state = QueryState::new(&catalog, book, false);
        let err = find_property(&state, "author.name", Some("Equals")).unwrap_err();
        assert_eq!(err.message, "Joins cannot be used in a DELETE or UPDATE operation");
    }

    #[test]
    fn test_id_falls_back_to_identity() {
        let catalog = catalog();
        let path = resolve(&catalog, &[], "id").unwrap();
        assert_eq!(path.property.name, "isbn");
        assert_eq!(path.persisted_path(), "_id");
    }

    #[test]
    fn test_unknown_property() {
        let catalog = catalog();
        let err = resolve(&catalog, &[], "subtitle").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::InvalidArgument);
        assert_eq!(
            err.message,
            "Cannot use [Equals] criterion on non-existent property path: subtitle"
        );
    }

    #[test]
    fn test_embedded_leaves() {
        let catalog = catalog();
        let path = resolve(&catalog, &[], "meta").unwrap();
        let leaves: Vec<String> = leaves(&catalog, &path)
            .unwrap()
            .iter()
            .map(PropertyPath::persisted_path)
            .collect();
        assert_eq!(leaves, vec!["meta.pages".to_string(), "meta.editor._id".to_string()]);
    }
}
