//! Association definitions between entities.

/// Multiplicity of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// One-to-one association.
    OneToOne,
    /// Many-to-one association (reference held by the owner).
    ManyToOne,
    /// One-to-many association (children reference the owner).
    OneToMany,
    /// Many-to-many association (requires a join collection).
    ManyToMany,
    /// Value object stored inline in the owner.
    Embedded,
}

impl Cardinality {
    /// Whether the association holds a single child.
    pub fn is_single_ended(&self) -> bool {
        matches!(self, Cardinality::OneToOne | Cardinality::ManyToOne)
    }

    /// Whether the association holds a list of children.
    pub fn is_many(&self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }
}

/// Write operation a cascade is triggered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CascadeType {
    /// Cascade inserts.
    Persist,
    /// Cascade updates.
    Update,
    /// Cascade every operation.
    All,
}

impl CascadeType {
    /// Whether this flag covers `ty`.
    pub fn covers(&self, ty: CascadeType) -> bool {
        *self == CascadeType::All || *self == ty
    }
}

impl std::fmt::Display for CascadeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CascadeType::Persist => write!(f, "PERSIST"),
            CascadeType::Update => write!(f, "UPDATE"),
            CascadeType::All => write!(f, "ALL"),
        }
    }
}

/// Phase of a write in which an association is cascaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CascadePhase {
    /// Before the owner is written: the owner stores the child's identity.
    Pre,
    /// After the owner is written: the child or a join record stores the
    /// owner's identity.
    Post,
}

/// An association property's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDef {
    /// Target entity name.
    pub target: String,
    /// Multiplicity.
    pub cardinality: Cardinality,
    /// Cascade flags.
    pub cascade: Vec<CascadeType>,
    /// Name of the owning property on the target, for inverse sides.
    pub mapped_by: Option<String>,
    /// Join collection name override for join-table associations.
    pub join_table: Option<String>,
}

impl AssociationDef {
    fn new(target: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            target: target.into(),
            cardinality,
            cascade: Vec::new(),
            mapped_by: None,
            join_table: None,
        }
    }

    /// Create a one-to-one association.
    pub fn one_to_one(target: impl Into<String>) -> Self {
        Self::new(target, Cardinality::OneToOne)
    }

    /// Create a many-to-one association.
    pub fn many_to_one(target: impl Into<String>) -> Self {
        Self::new(target, Cardinality::ManyToOne)
    }

    /// Create a one-to-many association.
    pub fn one_to_many(target: impl Into<String>) -> Self {
        Self::new(target, Cardinality::OneToMany)
    }

    /// Create a many-to-many association.
    pub fn many_to_many(target: impl Into<String>) -> Self {
        Self::new(target, Cardinality::ManyToMany)
    }

    /// Create an embedded association.
    pub fn embedded(target: impl Into<String>) -> Self {
        Self::new(target, Cardinality::Embedded)
    }

    /// Add a cascade flag.
    pub fn with_cascade(mut self, ty: CascadeType) -> Self {
        self.cascade.push(ty);
        self
    }

    /// Mark this side as the inverse of `property` on the target.
    pub fn with_mapped_by(mut self, property: impl Into<String>) -> Self {
        self.mapped_by = Some(property.into());
        self
    }

    /// Override the join collection name.
    pub fn with_join_table(mut self, name: impl Into<String>) -> Self {
        self.join_table = Some(name.into());
        self
    }

    /// Whether writes of `ty` cascade across this association.
    pub fn cascades(&self, ty: CascadeType) -> bool {
        self.cascade.iter().any(|flag| flag.covers(ty))
    }

    /// Whether the foreign key lives on the target side (or in a join
    /// collection) rather than on the owner.
    pub fn is_foreign_key(&self) -> bool {
        if self.join_table.is_some() && self.cardinality != Cardinality::Embedded {
            return true;
        }
        match self.cardinality {
            Cardinality::OneToMany | Cardinality::ManyToMany => true,
            Cardinality::OneToOne => self.mapped_by.is_some(),
            Cardinality::ManyToOne | Cardinality::Embedded => false,
        }
    }

    /// Whether links are stored as records in a join collection.
    ///
    /// Many-valued owning sides always are; single-ended sides only with an
    /// explicit join collection.
    pub fn uses_join_table(&self) -> bool {
        if self.mapped_by.is_some() || self.cardinality == Cardinality::Embedded {
            return false;
        }
        self.cardinality.is_many() || self.join_table.is_some()
    }

    /// Phase in which this association is cascaded.
    pub fn phase(&self) -> CascadePhase {
        if self.is_foreign_key() {
            CascadePhase::Post
        } else {
            CascadePhase::Pre
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_flags() {
        let assoc = AssociationDef::many_to_one("Author").with_cascade(CascadeType::Persist);
        assert!(assoc.cascades(CascadeType::Persist));
        assert!(!assoc.cascades(CascadeType::Update));

        let all = AssociationDef::one_to_many("Page").with_cascade(CascadeType::All);
        assert!(all.cascades(CascadeType::Persist));
        assert!(all.cascades(CascadeType::Update));
    }

    #[test]
    fn test_foreign_key_sides() {
        assert!(!AssociationDef::many_to_one("A").is_foreign_key());
        assert!(!AssociationDef::one_to_one("A").is_foreign_key());
        assert!(AssociationDef::one_to_one("A")
            .with_mapped_by("b")
            .is_foreign_key());
        assert!(AssociationDef::one_to_many("A").is_foreign_key());
        assert!(AssociationDef::many_to_many("A").is_foreign_key());
    }

    #[test]
    fn test_phase_and_join_table() {
        assert_eq!(AssociationDef::many_to_one("A").phase(), CascadePhase::Pre);
        assert_eq!(AssociationDef::one_to_many("A").phase(), CascadePhase::Post);

        assert!(AssociationDef::many_to_many("Tag").uses_join_table());
        assert!(AssociationDef::one_to_many("Page").uses_join_table());
        assert!(!AssociationDef::one_to_many("Page")
            .with_mapped_by("book")
            .uses_join_table());
        assert!(!AssociationDef::one_to_one("A").uses_join_table());

        let linked = AssociationDef::one_to_one("Cover").with_join_table("book_cover");
        assert!(linked.uses_join_table());
        assert!(linked.is_foreign_key());
        assert_eq!(linked.phase(), CascadePhase::Post);
    }
}
