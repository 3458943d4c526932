//! In-memory entity metadata registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::entity::EntityDef;
use crate::error::{Error, Result};

/// Read-only registry of entity definitions.
///
/// Built once at startup and shared by reference (or `Arc`) with the query
/// compiler and the cascade engine.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: HashMap<String, Arc<EntityDef>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity definition, replacing any with the same name.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), Arc::new(entity));
        self
    }

    /// Look up an entity by name.
    pub fn get(&self, name: &str) -> Option<Arc<EntityDef>> {
        self.entities.get(name).cloned()
    }

    /// Look up an entity by name, failing if it is not registered.
    pub fn require(&self, name: &str) -> Result<Arc<EntityDef>> {
        self.get(name).ok_or_else(|| Error::unknown_entity(name))
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Find the inverse side of `owner.property`, as `(entity, property)`.
    ///
    /// A mapped-by side points straight at its owning property; an owning
    /// side is matched by the target property whose `mapped_by` names it.
    pub fn inverse_of(&self, owner: &EntityDef, property: &str) -> Option<(String, String)> {
        let assoc = owner.property(property)?.as_association()?;
        if let Some(mapped_by) = &assoc.mapped_by {
            return Some((assoc.target.clone(), mapped_by.clone()));
        }
        let target = self.get(&assoc.target)?;
        let inverse = target
            .associations()
            .find(|(_, a)| a.target == owner.name && a.mapped_by.as_deref() == Some(property))
            .map(|(p, _)| (target.name.clone(), p.name.clone()));
        inverse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AssociationDef, ScalarType};

    fn catalog() -> Catalog {
        Catalog::new()
            .with_entity(
                EntityDef::new("Author", "id")
                    .with_scalar("id", ScalarType::Int64)
                    .with_association(
                        "books",
                        AssociationDef::one_to_many("Book").with_mapped_by("author"),
                    ),
            )
            .with_entity(
                EntityDef::new("Book", "id")
                    .with_scalar("id", ScalarType::Int64)
                    .with_association("author", AssociationDef::many_to_one("Author")),
            )
    }

    #[test]
    fn test_require_unknown_entity() {
        let err = catalog().require("Missing").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn test_inverse_of_both_sides() {
        let catalog = catalog();
        let author = catalog.require("Author").unwrap();
        let book = catalog.require("Book").unwrap();

        assert_eq!(
            catalog.inverse_of(&author, "books"),
            Some(("Book".to_string(), "author".to_string()))
        );
        assert_eq!(
            catalog.inverse_of(&book, "author"),
            Some(("Author".to_string(), "books".to_string()))
        );
        assert_eq!(catalog.inverse_of(&book, "id"), None);
    }
}
