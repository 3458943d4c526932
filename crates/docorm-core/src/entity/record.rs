//! Runtime entity instances.
//!
//! A [`Record`] is an entity instance as the cascade engine sees it: an
//! entity name plus named slots. Instances are shared as [`EntityRef`]s and
//! never mutated in place; replacing a child yields a new parent instance.

use std::sync::Arc;

use docorm_proto::Value;

use crate::error::{Error, Result};

/// Shared handle to an entity instance. Identity is pointer identity.
pub type EntityRef = Arc<Record>;

/// Contents of one property of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Scalar value.
    Value(Value),
    /// Single associated entity.
    One(EntityRef),
    /// List of associated entities.
    Many(Vec<EntityRef>),
    /// Embedded value object.
    Embedded(Record),
}

/// An entity instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entity: String,
    fields: Vec<(String, Slot)>,
}

impl Record {
    /// Create an empty instance of `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fields: Vec::new(),
        }
    }

    /// Set a scalar field.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, Slot::Value(value.into()));
        self
    }

    /// Set a single associated entity.
    pub fn with_one(mut self, name: impl Into<String>, child: EntityRef) -> Self {
        self.set(name, Slot::One(child));
        self
    }

    /// Set a list of associated entities.
    pub fn with_many(mut self, name: impl Into<String>, children: Vec<EntityRef>) -> Self {
        self.set(name, Slot::Many(children));
        self
    }

    /// Set an embedded value object.
    pub fn with_embedded(mut self, name: impl Into<String>, embedded: Record) -> Self {
        self.set(name, Slot::Embedded(embedded));
        self
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> EntityRef {
        Arc::new(self)
    }

    /// Entity name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Get a slot by property name.
    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Get a scalar field by property name.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.get(name) {
            Some(Slot::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// Get a single associated entity by property name.
    pub fn one(&self, name: &str) -> Option<&EntityRef> {
        match self.get(name) {
            Some(Slot::One(child)) => Some(child),
            _ => None,
        }
    }

    /// Get a list of associated entities by property name.
    pub fn many(&self, name: &str) -> Option<&[EntityRef]> {
        match self.get(name) {
            Some(Slot::Many(children)) => Some(children),
            _ => None,
        }
    }

    /// Set a slot, replacing an existing one of the same name.
    pub fn set(&mut self, name: impl Into<String>, slot: Slot) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = slot,
            None => self.fields.push((name, slot)),
        }
    }

    /// Iterate over slots in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.fields.iter().map(|(n, s)| (n.as_str(), s))
    }

    /// Copy of this record with the slot at `path` replaced.
    ///
    /// Every step but the last must name an embedded slot.
    pub fn with_slot_at(&self, path: &[String], slot: Slot) -> Result<Record> {
        let (first, rest) = path
            .split_first()
            .ok_or_else(|| Error::IllegalState("empty property path".into()))?;
        let mut copy = self.clone();
        if rest.is_empty() {
            copy.set(first.clone(), slot);
            return Ok(copy);
        }
        match self.get(first) {
            Some(Slot::Embedded(inner)) => {
                let replaced = inner.with_slot_at(rest, slot)?;
                copy.set(first.clone(), Slot::Embedded(replaced));
                Ok(copy)
            }
            _ => Err(Error::slot_mismatch(&self.entity, first, "an embedded value")),
        }
    }
}

/// Whether `a` and `b` are the same instance.
pub fn same_instance(a: &EntityRef, b: &EntityRef) -> bool {
    Arc::ptr_eq(a, b)
}
