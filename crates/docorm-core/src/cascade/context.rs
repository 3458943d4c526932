//! Per-operation state shared by nested cascades.

use crate::config::{DialectCapabilities, OperationConfig};
use crate::entity::PersistedSet;
use crate::error::{Error, Result};

/// One association crossed by a cascade: `owner.property`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssociationStep {
    /// Entity (or embeddable) declaring the association.
    pub owner: String,
    /// Association property name.
    pub property: String,
}

impl AssociationStep {
    /// Create a step.
    pub fn new(owner: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            property: property.into(),
        }
    }
}

impl std::fmt::Display for AssociationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.owner, self.property)
    }
}

/// State of one top-level repository call.
///
/// Created at call entry, threaded by `&mut` through every nested frame and
/// cascade, and dropped when the call returns. Never shared between calls.
#[derive(Debug)]
pub struct OperationContext {
    declaring_type: String,
    capabilities: DialectCapabilities,
    max_depth: usize,
    associations: Vec<AssociationStep>,
    /// Instances already processed during this call.
    pub persisted: PersistedSet,
}

impl OperationContext {
    /// Create a context from repository configuration.
    pub fn new(config: &OperationConfig) -> Self {
        Self {
            declaring_type: config.declaring_type.clone(),
            capabilities: config.capabilities,
            max_depth: config.max_cascade_depth,
            associations: Vec::new(),
            persisted: PersistedSet::new(),
        }
    }

    /// Type the operation was declared on.
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// Storage capabilities.
    pub fn capabilities(&self) -> &DialectCapabilities {
        &self.capabilities
    }

    /// Associations crossed to reach the entity currently being written,
    /// outermost first.
    pub fn associations(&self) -> &[AssociationStep] {
        &self.associations
    }

    /// Current cascade nesting.
    pub fn depth(&self) -> usize {
        self.associations.len()
    }

    /// Whether `owner.property` has been crossed on the way here.
    pub fn is_on_path(&self, owner: &str, property: &str) -> bool {
        self.associations
            .iter()
            .any(|s| s.owner == owner && s.property == property)
    }

    /// Push `step` before descending into a child write.
    pub fn enter(&mut self, step: AssociationStep) -> Result<()> {
        if self.associations.len() >= self.max_depth {
            return Err(Error::IllegalState(format!(
                "cascade depth {} exceeded at {}",
                self.max_depth, step
            )));
        }
        self.associations.push(step);
        Ok(())
    }

    /// Pop the innermost step.
    pub fn leave(&mut self) {
        self.associations.pop();
    }

    /// Run `f` with `step` pushed, popping it on every exit path.
    pub fn within<T>(
        &mut self,
        step: &AssociationStep,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.enter(step.clone())?;
        let result = f(self);
        self.leave();
        result
    }
}
