//! Entity operation frames and repository facades.
//!
//! A frame wraps one storage action in the fixed write protocol:
//! pre-cascade, pre-event (veto point), the action, post-event,
//! post-cascade. Batch frames run the same protocol per element, and a veto
//! excludes only the vetoed element.

mod async_frame;
mod event;
mod frame;
mod reactive;
mod repository;

pub use async_frame::{AsyncEntitiesOperation, AsyncEntityOperation};
pub use event::{EntityEventContext, EntityEventListener, EntityEventRegistry, EventType};
pub use frame::{EntitiesOperation, EntityOperation};
pub use reactive::{AsyncEntityStore, ReactiveRepositoryOperations};
pub use repository::{EntityStore, JoinRecord, RepositoryOperations};

use crate::catalog::CascadeType;
use crate::entity::EntityRef;

/// One element of a batch operation.
#[derive(Debug, Clone)]
pub struct Data {
    /// Current instance; replaced as the element moves through the frame.
    pub entity: EntityRef,
    /// Whether a hook or predicate vetoed this element.
    pub vetoed: bool,
}

impl Data {
    /// Wrap a fresh element.
    pub fn new(entity: EntityRef) -> Self {
        Self {
            entity,
            vetoed: false,
        }
    }
}

/// Write protocol a frame runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    Persist,
    Update,
}

impl WriteKind {
    pub(crate) fn cascade_type(self) -> CascadeType {
        match self {
            WriteKind::Persist => CascadeType::Persist,
            WriteKind::Update => CascadeType::Update,
        }
    }

    pub(crate) fn pre_event(self) -> EventType {
        match self {
            WriteKind::Persist => EventType::PrePersist,
            WriteKind::Update => EventType::PreUpdate,
        }
    }

    pub(crate) fn post_event(self) -> EventType {
        match self {
            WriteKind::Persist => EventType::PostPersist,
            WriteKind::Update => EventType::PostUpdate,
        }
    }
}

/// Non-vetoed instances of a batch, in order.
pub fn surviving(data: Vec<Data>) -> Vec<EntityRef> {
    data.into_iter()
        .filter(|d| !d.vetoed)
        .map(|d| d.entity)
        .collect()
}
