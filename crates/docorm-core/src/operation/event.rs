//! Entity lifecycle events.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::catalog::EntityDef;
use crate::entity::EntityRef;

/// Lifecycle points at which listeners run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Before insert. May veto.
    PrePersist,
    /// After insert.
    PostPersist,
    /// Before update. May veto.
    PreUpdate,
    /// After update.
    PostUpdate,
    /// Before delete. May veto.
    PreRemove,
    /// After delete.
    PostRemove,
}

/// The entity a listener is looking at.
///
/// Listeners may swap in a different instance with
/// [`set_entity`](Self::set_entity); the frame continues with it.
#[derive(Debug)]
pub struct EntityEventContext<'a> {
    entity_def: &'a EntityDef,
    entity: EntityRef,
}

impl<'a> EntityEventContext<'a> {
    /// Create a context for `entity`.
    pub fn new(entity_def: &'a EntityDef, entity: EntityRef) -> Self {
        Self { entity_def, entity }
    }

    /// Entity metadata.
    pub fn entity_def(&self) -> &EntityDef {
        self.entity_def
    }

    /// Current instance.
    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// Replace the instance.
    pub fn set_entity(&mut self, entity: EntityRef) {
        self.entity = entity;
    }

    /// Take the (possibly replaced) instance.
    pub fn into_entity(self) -> EntityRef {
        self.entity
    }
}

/// Hooks called around entity writes.
///
/// Pre hooks return `false` to veto the write.
pub trait EntityEventListener: Send + Sync {
    /// Whether this listener wants `event` for `entity`.
    fn supports(&self, entity: &EntityDef, event: EventType) -> bool {
        let _ = (entity, event);
        true
    }

    /// Before insert.
    fn pre_persist(&self, ctx: &mut EntityEventContext<'_>) -> bool {
        let _ = ctx;
        true
    }

    /// After insert.
    fn post_persist(&self, ctx: &mut EntityEventContext<'_>) {
        let _ = ctx;
    }

    /// Before update.
    fn pre_update(&self, ctx: &mut EntityEventContext<'_>) -> bool {
        let _ = ctx;
        true
    }

    /// After update.
    fn post_update(&self, ctx: &mut EntityEventContext<'_>) {
        let _ = ctx;
    }

    /// Before delete.
    fn pre_remove(&self, ctx: &mut EntityEventContext<'_>) -> bool {
        let _ = ctx;
        true
    }

    /// After delete.
    fn post_remove(&self, ctx: &mut EntityEventContext<'_>) {
        let _ = ctx;
    }
}

/// Listeners registered for a repository.
#[derive(Default)]
pub struct EntityEventRegistry {
    listeners: RwLock<Vec<Arc<dyn EntityEventListener>>>,
}

impl std::fmt::Debug for EntityEventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityEventRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

impl EntityEventRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Listeners run in registration order.
    pub fn register(&self, listener: Arc<dyn EntityEventListener>) {
        self.listeners.write().push(listener);
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn EntityEventListener>> {
        self.listeners.read().clone()
    }

    /// Run a pre hook. Returns `false` as soon as a listener vetoes.
    pub fn pre(&self, event: EventType, ctx: &mut EntityEventContext<'_>) -> bool {
        for listener in self.snapshot() {
            if !listener.supports(ctx.entity_def(), event) {
                continue;
            }
            let proceed = match event {
                EventType::PrePersist => listener.pre_persist(ctx),
                EventType::PreUpdate => listener.pre_update(ctx),
                EventType::PreRemove => listener.pre_remove(ctx),
                EventType::PostPersist | EventType::PostUpdate | EventType::PostRemove => true,
            };
            if !proceed {
                debug!(entity = %ctx.entity_def().name, event = ?event, "write vetoed by listener");
                return false;
            }
        }
        true
    }

    /// Run a post hook.
    pub fn post(&self, event: EventType, ctx: &mut EntityEventContext<'_>) {
        for listener in self.snapshot() {
            if !listener.supports(ctx.entity_def(), event) {
                continue;
            }
            match event {
                EventType::PostPersist => listener.post_persist(ctx),
                EventType::PostUpdate => listener.post_update(ctx),
                EventType::PostRemove => listener.post_remove(ctx),
                EventType::PrePersist | EventType::PreUpdate | EventType::PreRemove => {}
            }
        }
    }
}
