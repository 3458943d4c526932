//! Entity and property definitions.

use super::association::AssociationDef;

/// Scalar property types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Boolean.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit float.
    Float64,
    /// UTF-8 string.
    String,
    /// Timestamp.
    Timestamp,
    /// UUID.
    Uuid,
}

/// What a property holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    /// A scalar value.
    Scalar(ScalarType),
    /// A reference to other entities, or an embedded value object.
    Association(AssociationDef),
}

/// A persistent property of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    /// Property name.
    pub name: String,
    /// Name used in stored documents, when it differs from `name`.
    pub persisted_name: Option<String>,
    /// Property kind.
    pub kind: PropertyKind,
}

impl PropertyDef {
    /// Create a scalar property.
    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            persisted_name: None,
            kind: PropertyKind::Scalar(scalar),
        }
    }

    /// Create an association property.
    pub fn association(name: impl Into<String>, association: AssociationDef) -> Self {
        Self {
            name: name.into(),
            persisted_name: None,
            kind: PropertyKind::Association(association),
        }
    }

    /// Set the stored name.
    pub fn with_persisted_name(mut self, name: impl Into<String>) -> Self {
        self.persisted_name = Some(name.into());
        self
    }

    /// The name used in stored documents.
    pub fn persisted_name(&self) -> &str {
        self.persisted_name.as_deref().unwrap_or(&self.name)
    }

    /// The association metadata, if this is an association.
    pub fn as_association(&self) -> Option<&AssociationDef> {
        match &self.kind {
            PropertyKind::Association(assoc) => Some(assoc),
            PropertyKind::Scalar(_) => None,
        }
    }
}

/// An entity definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDef {
    /// Entity name (unique within the catalog).
    pub name: String,
    /// Collection name used in stored documents, when it differs from `name`.
    pub persisted_name: Option<String>,
    /// Name of the identity property. Embeddables have none.
    pub identity: Option<String>,
    /// Name of the version property, if the entity is versioned.
    pub version: Option<String>,
    /// Whether identities are generated by the store on insert.
    pub generated_identity: bool,
    /// Persistent properties in declared order.
    pub properties: Vec<PropertyDef>,
}

impl EntityDef {
    /// Create a new entity definition with an identity property.
    pub fn new(name: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persisted_name: None,
            identity: Some(identity.into()),
            version: None,
            generated_identity: true,
            properties: Vec::new(),
        }
    }

    /// Create an embeddable value type with no identity.
    pub fn embeddable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persisted_name: None,
            identity: None,
            version: None,
            generated_identity: false,
            properties: Vec::new(),
        }
    }

    /// Set the collection name.
    pub fn with_persisted_name(mut self, name: impl Into<String>) -> Self {
        self.persisted_name = Some(name.into());
        self
    }

    /// Declare the version property.
    pub fn with_version(mut self, property: impl Into<String>) -> Self {
        self.version = Some(property.into());
        self
    }

    /// Declare identities as assigned by the caller.
    pub fn with_assigned_identity(mut self) -> Self {
        self.generated_identity = false;
        self
    }

    /// Add a property.
    pub fn with_property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    /// Add a scalar property.
    pub fn with_scalar(self, name: impl Into<String>, scalar: ScalarType) -> Self {
        self.with_property(PropertyDef::scalar(name, scalar))
    }

    /// Add an association property.
    pub fn with_association(self, name: impl Into<String>, association: AssociationDef) -> Self {
        self.with_property(PropertyDef::association(name, association))
    }

    /// The collection name used in stored documents.
    pub fn persisted_name(&self) -> &str {
        self.persisted_name.as_deref().unwrap_or(&self.name)
    }

    /// Get a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Get the identity property definition.
    pub fn identity_property(&self) -> Option<&PropertyDef> {
        self.identity.as_deref().and_then(|id| self.property(id))
    }

    /// Whether `name` is this entity's identity property.
    pub fn is_identity(&self, name: &str) -> bool {
        self.identity.as_deref() == Some(name)
    }

    /// Iterate over association properties in declared order.
    pub fn associations(&self) -> impl Iterator<Item = (&PropertyDef, &AssociationDef)> {
        self.properties
            .iter()
            .filter_map(|p| p.as_association().map(|a| (p, a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> EntityDef {
        EntityDef::new("Book", "id")
            .with_scalar("id", ScalarType::Int64)
            .with_property(
                PropertyDef::scalar("title", ScalarType::String).with_persisted_name("book_title"),
            )
            .with_association("author", AssociationDef::many_to_one("Author"))
            .with_association("pages", AssociationDef::one_to_many("Page"))
    }

    #[test]
    fn test_property_lookup() {
        let def = book();
        assert!(def.property("title").is_some());
        assert!(def.property("missing").is_none());
        assert_eq!(def.property("title").unwrap().persisted_name(), "book_title");
        assert_eq!(def.property("author").unwrap().persisted_name(), "author");
    }

    #[test]
    fn test_identity() {
        let def = book();
        assert!(def.is_identity("id"));
        assert_eq!(def.identity_property().unwrap().name, "id");
        assert!(EntityDef::embeddable("Address").identity_property().is_none());
    }

    #[test]
    fn test_associations_in_declared_order() {
        let def = book();
        let names: Vec<_> = def.associations().map(|(p, _)| p.name.as_str()).collect();
        assert_eq!(names, vec!["author", "pages"]);
    }
}
