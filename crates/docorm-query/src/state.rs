//! Per-compilation state.

use std::collections::BTreeMap;
use std::sync::Arc;

use docorm_core::catalog::{Catalog, EntityDef};
use docorm_proto::ParameterBinding;

use crate::criterion::BindingParameter;

/// State of one compile pass: joins in scope, bindings pushed so far and
/// whether joins are allowed at all.
///
/// A state is never shared between compilations.
#[derive(Debug)]
pub struct QueryState<'a> {
    catalog: &'a Catalog,
    entity: Arc<EntityDef>,
    joins: BTreeMap<String, Option<String>>,
    bindings: Vec<ParameterBinding>,
    position: u32,
    allow_joins: bool,
}

impl<'a> QueryState<'a> {
    /// Create a state for a query rooted at `entity`.
    pub fn new(catalog: &'a Catalog, entity: Arc<EntityDef>, allow_joins: bool) -> Self {
        let capacity = entity.properties.len();
        Self {
            catalog,
            entity,
            joins: BTreeMap::new(),
            bindings: Vec::with_capacity(capacity),
            position: 0,
            allow_joins,
        }
    }

    /// Entity catalog.
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Root entity.
    pub fn entity(&self) -> &Arc<EntityDef> {
        &self.entity
    }

    /// Whether criteria may reach through joined associations.
    pub fn allow_joins(&self) -> bool {
        self.allow_joins
    }

    /// Put `path` in scope as joined.
    pub fn add_join(&mut self, path: &str, alias: Option<&str>) {
        self.joins
            .insert(path.to_string(), alias.map(str::to_string));
    }

    /// Whether `path` or a path under it is joined.
    pub fn is_joined(&self, path: &str) -> bool {
        self.joins.keys().any(|joined| {
            joined == path
                || (joined.starts_with(path) && joined.as_bytes().get(path.len()) == Some(&b'.'))
        })
    }

    /// Alias declared for the join at `path`.
    pub fn alias(&self, path: &str) -> Option<String> {
        self.joins.get(path).cloned().flatten()
    }

    /// Record a bound value at the next position and return the position.
    pub fn push_parameter(
        &mut self,
        parameter: &BindingParameter,
        incoming: Option<Vec<String>>,
        outgoing: Option<Vec<String>>,
        expandable: bool,
    ) -> u32 {
        let position = self.position;
        self.position += 1;

        let mut binding = ParameterBinding::new(position, parameter.source())
            .expandable(expandable || parameter.expandable);
        if let Some(path) = incoming {
            binding = binding.with_property_path(path);
        }
        if let Some(path) = outgoing {
            binding = binding.with_outgoing_path(path);
        }
        self.bindings.push(binding);
        position
    }

    /// Bindings in position order.
    pub fn bindings(&self) -> &[ParameterBinding] {
        &self.bindings
    }

    /// Take the bindings.
    pub fn into_bindings(self) -> Vec<ParameterBinding> {
        self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(catalog: &Catalog) -> QueryState<'_> {
        QueryState::new(catalog, Arc::new(EntityDef::new("Book", "id")), true)
    }

    #[test]
    fn test_positions_increase() {
        let catalog = Catalog::new();
        let mut state = state(&catalog);
        let p = BindingParameter::argument(0);
        assert_eq!(state.push_parameter(&p, None, None, false), 0);
        assert_eq!(state.push_parameter(&p, None, None, true), 1);
        let bindings = state.into_bindings();
        assert_eq!(bindings[1].key, "1");
        assert!(bindings[1].expandable);
        assert!(!bindings[0].expandable);
    }

    #[test]
    fn test_is_joined_matches_prefix() {
        let catalog = Catalog::new();
        let mut state = state(&catalog);
        state.add_join("author.address", Some("addr"));
        assert!(state.is_joined("author"));
        assert!(state.is_joined("author.address"));
        assert!(!state.is_joined("publisher"));
        assert_eq!(state.alias("author.address").as_deref(), Some("addr"));
        assert_eq!(state.alias("author"), None);
    }

    #[test]
    fn test_is_joined_respects_segment_boundaries() {
        let catalog = Catalog::new();
        let mut state = state(&catalog);
        state.add_join("authorship", None);
        assert!(state.is_joined("authorship"));
        assert!(!state.is_joined("author"));
        assert!(!state.is_joined("authorship.owner"));
    }
}
