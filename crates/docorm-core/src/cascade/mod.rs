//! Cascading writes across associations.
//!
//! A write of one entity may need writes of its associated entities first
//! (the owner stores their identity) or afterwards (they, or a join record,
//! store the owner's identity). [`discover`] lists the pending child writes
//! for a phase; [`CascadeExecutor`] and [`AsyncCascadeExecutor`] carry them
//! out through a caller-supplied helper and thread the processed children
//! back into the owner.

mod async_executor;
mod context;
mod discover;
mod executor;

use std::collections::HashSet;
use std::sync::Arc;

pub use async_executor::{AsyncCascadeExecutor, AsyncCascadeHelper};
pub use context::{AssociationStep, OperationContext};
pub use discover::discover;
pub use executor::{CascadeExecutor, CascadeHelper};

use crate::catalog::{AssociationDef, EntityDef};
use crate::entity::{same_instance, EntityRef, Slot};
use crate::error::Result;

/// Where a cascaded child hangs off its owner.
#[derive(Debug, Clone)]
pub struct CascadeContext {
    /// Owner instance.
    pub parent: EntityRef,
    /// Owner entity.
    pub parent_entity: Arc<EntityDef>,
    /// Property names from the owner to the association, through embedded
    /// values.
    pub path: Vec<String>,
    /// Entity or embeddable declaring the association.
    pub declaring: String,
    /// Association metadata.
    pub association: AssociationDef,
}

impl CascadeContext {
    /// The association step this cascade crosses.
    pub fn step(&self) -> AssociationStep {
        AssociationStep::new(
            self.declaring.clone(),
            self.path.last().cloned().unwrap_or_default(),
        )
    }

    /// The path rendered with dots.
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }

    /// Copy of this context pointing at `parent`.
    pub fn with_parent(&self, parent: EntityRef) -> Self {
        Self {
            parent,
            ..self.clone()
        }
    }
}

/// A pending child write.
#[derive(Debug, Clone)]
pub enum CascadeOp {
    /// One-valued association.
    One {
        /// Position of the child.
        cascade: CascadeContext,
        /// Child instance.
        child: EntityRef,
        /// Child entity.
        child_entity: Arc<EntityDef>,
    },
    /// Many-valued association.
    Many {
        /// Position of the children.
        cascade: CascadeContext,
        /// Child instances, never empty.
        children: Vec<EntityRef>,
        /// Child entity.
        child_entity: Arc<EntityDef>,
    },
}

impl CascadeOp {
    /// Position of the child or children.
    pub fn cascade(&self) -> &CascadeContext {
        match self {
            CascadeOp::One { cascade, .. } | CascadeOp::Many { cascade, .. } => cascade,
        }
    }
}

/// Set of batch elements a helper must leave untouched.
#[derive(Debug, Clone, Default)]
pub struct Veto {
    vetoed: HashSet<usize>,
}

impl Veto {
    /// An empty veto.
    pub fn none() -> Self {
        Self::default()
    }

    /// Mark `entity` as vetoed.
    pub fn add(&mut self, entity: &EntityRef) {
        self.vetoed.insert(Arc::as_ptr(entity) as usize);
    }

    /// Whether `entity` is vetoed.
    pub fn is_vetoed(&self, entity: &EntityRef) -> bool {
        self.vetoed.contains(&(Arc::as_ptr(entity) as usize))
    }

    /// Number of vetoed elements.
    pub fn len(&self) -> usize {
        self.vetoed.len()
    }

    /// Whether nothing is vetoed.
    pub fn is_empty(&self) -> bool {
        self.vetoed.is_empty()
    }
}

/// Owner with the slot at `path` replaced by `slot`.
pub(crate) fn substitute(owner: &EntityRef, path: &[String], slot: Slot) -> Result<EntityRef> {
    Ok(Arc::new(owner.with_slot_at(path, slot)?))
}

/// Owner with the single child at `path` replaced, if it changed.
pub(crate) fn substitute_one(
    owner: EntityRef,
    path: &[String],
    original: &EntityRef,
    processed: &EntityRef,
) -> Result<EntityRef> {
    if same_instance(original, processed) {
        return Ok(owner);
    }
    substitute(&owner, path, Slot::One(processed.clone()))
}

/// Owner with the child list at `path` replaced, if any element changed.
pub(crate) fn substitute_many(
    owner: EntityRef,
    path: &[String],
    originals: &[EntityRef],
    processed: &[EntityRef],
) -> Result<EntityRef> {
    let unchanged = originals.len() == processed.len()
        && originals
            .iter()
            .zip(processed)
            .all(|(a, b)| same_instance(a, b));
    if unchanged {
        return Ok(owner);
    }
    substitute(&owner, path, Slot::Many(processed.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Record;

    #[test]
    fn test_veto_is_by_instance() {
        let a = Record::new("Page").into_ref();
        let b = Record::new("Page").into_ref();
        let mut veto = Veto::none();
        veto.add(&a);
        assert!(veto.is_vetoed(&a));
        assert!(!veto.is_vetoed(&b));
        assert_eq!(veto.len(), 1);
    }

    #[test]
    fn test_substitute_one_keeps_owner_when_unchanged() {
        let child = Record::new("Author").into_ref();
        let owner = Record::new("Book").with_one("author", child.clone()).into_ref();
        let path = vec!["author".to_string()];

        let same = substitute_one(owner.clone(), &path, &child, &child).unwrap();
        assert!(same_instance(&same, &owner));

        let stored = Record::new("Author").with_value("id", 1i64).into_ref();
        let replaced = substitute_one(owner.clone(), &path, &child, &stored).unwrap();
        assert!(!same_instance(&replaced, &owner));
        assert!(same_instance(replaced.one("author").unwrap(), &stored));
    }

    #[test]
    fn test_substitute_many() {
        let a = Record::new("Page").into_ref();
        let b = Record::new("Page").into_ref();
        let owner = Record::new("Book")
            .with_many("pages", vec![a.clone(), b.clone()])
            .into_ref();
        let path = vec!["pages".to_string()];

        let stored = Record::new("Page").with_value("id", 2i64).into_ref();
        let replaced = substitute_many(
            owner,
            &path,
            &[a.clone(), b.clone()],
            &[a.clone(), stored.clone()],
        )
        .unwrap();
        let pages = replaced.many("pages").unwrap();
        assert!(same_instance(&pages[0], &a));
        assert!(same_instance(&pages[1], &stored));
    }
}
