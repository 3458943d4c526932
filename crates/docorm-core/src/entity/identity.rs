//! Identity access and identity-keyed bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use docorm_proto::Value;
use tracing::trace;

use super::record::{EntityRef, Record};
use crate::catalog::EntityDef;
use crate::error::{Error, Result};

/// Reads the identity value of instances of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityReader {
    entity: String,
    property: String,
}

impl IdentityReader {
    /// Entity name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Identity property name.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// The identity value of `record`, `None` when absent or null.
    pub fn read<'r>(&self, record: &'r Record) -> Option<&'r Value> {
        record.value(&self.property).filter(|v| !v.is_null())
    }

    /// Whether `record` carries an identity.
    pub fn has_identity(&self, record: &Record) -> bool {
        self.read(record).is_some()
    }
}

/// Cache of [`IdentityReader`]s keyed by entity name.
///
/// Populated lazily and never invalidated; entity metadata is immutable
/// after startup.
#[derive(Debug, Default)]
pub struct IdentityReaders {
    readers: DashMap<String, Arc<IdentityReader>>,
}

impl IdentityReaders {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or build the reader for `entity`.
    pub fn reader(&self, entity: &EntityDef) -> Result<Arc<IdentityReader>> {
        if let Some(reader) = self.readers.get(&entity.name) {
            return Ok(reader.clone());
        }
        let property = entity.identity.clone().ok_or_else(|| {
            Error::IllegalState(format!("entity '{}' has no identity property", entity.name))
        })?;
        trace!(entity = %entity.name, property = %property, "caching identity reader");
        let reader = Arc::new(IdentityReader {
            entity: entity.name.clone(),
            property,
        });
        Ok(self
            .readers
            .entry(entity.name.clone())
            .or_insert(reader)
            .clone())
    }

    /// Whether `record`, an instance of `entity`, carries an identity.
    pub fn has_identity(&self, entity: &EntityDef, record: &Record) -> Result<bool> {
        Ok(self.reader(entity)?.has_identity(record))
    }

    /// Number of cached readers.
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    /// Whether no reader has been built yet.
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

fn instance_key(entity: &EntityRef) -> usize {
    Arc::as_ptr(entity) as usize
}

/// Set of instances already processed during one operation.
///
/// Keyed by instance identity, never by value equality. Each entry keeps
/// the original instance alive and remembers the instance that replaced it,
/// so later encounters of the original can reuse the processed result.
#[derive(Debug, Default, Clone)]
pub struct PersistedSet {
    entries: HashMap<usize, (EntityRef, EntityRef)>,
}

impl PersistedSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `entity` has been processed.
    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.entries.contains_key(&instance_key(entity))
    }

    /// The instance that replaced `entity`, if it has been processed.
    pub fn resolve(&self, entity: &EntityRef) -> Option<EntityRef> {
        self.entries
            .get(&instance_key(entity))
            .map(|(_, replacement)| replacement.clone())
    }

    /// Record `entity` as processed without replacement.
    pub fn insert(&mut self, entity: &EntityRef) {
        self.insert_replaced(entity, entity);
    }

    /// Record `original` as processed into `replacement`. The replacement
    /// itself counts as processed too.
    pub fn insert_replaced(&mut self, original: &EntityRef, replacement: &EntityRef) {
        self.entries.insert(
            instance_key(original),
            (original.clone(), replacement.clone()),
        );
        self.entries
            .entry(instance_key(replacement))
            .or_insert_with(|| (replacement.clone(), replacement.clone()));
    }

    /// Number of tracked instances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been processed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScalarType;

    #[test]
    fn test_reader_cache_is_reused() {
        let readers = IdentityReaders::new();
        let def = EntityDef::new("Book", "id").with_scalar("id", ScalarType::Int64);

        let first = readers.reader(&def).unwrap();
        let second = readers.reader(&def).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(readers.len(), 1);
    }

    #[test]
    fn test_null_identity_is_absent() {
        let readers = IdentityReaders::new();
        let def = EntityDef::new("Book", "id");

        let fresh = Record::new("Book").with_value("id", Value::Null);
        let stored = Record::new("Book").with_value("id", 5i64);
        assert!(!readers.has_identity(&def, &fresh).unwrap());
        assert!(!readers.has_identity(&def, &Record::new("Book")).unwrap());
        assert!(readers.has_identity(&def, &stored).unwrap());
    }

    #[test]
    fn test_embeddable_has_no_reader() {
        let readers = IdentityReaders::new();
        let err = readers.reader(&EntityDef::embeddable("Address")).unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[test]
    fn test_persisted_set_uses_instance_identity() {
        let a = Record::new("Book").with_value("title", "x").into_ref();
        let b = Record::new("Book").with_value("title", "x").into_ref();
        let mut set = PersistedSet::new();
        set.insert(&a);

        assert!(set.contains(&a));
        assert!(!set.contains(&b), "equal values are distinct instances");
    }

    #[test]
    fn test_persisted_set_resolves_replacement() {
        let original = Record::new("Book").into_ref();
        let stored = Record::new("Book").with_value("id", 1i64).into_ref();
        let mut set = PersistedSet::new();
        set.insert_replaced(&original, &stored);

        assert!(Arc::ptr_eq(&set.resolve(&original).unwrap(), &stored));
        assert!(set.contains(&stored));
        assert_eq!(set.len(), 2);
    }
}
