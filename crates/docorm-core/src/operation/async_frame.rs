//! Asynchronous operation frames.
//!
//! The frame methods are `async`: calling one builds the whole protocol as a
//! future and nothing (cascades, hooks, the storage action) runs until it
//! is awaited. The first failing step ends the chain with its error.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use super::event::{EntityEventContext, EntityEventRegistry, EventType};
use super::frame::{record_final, record_written};
use super::{surviving, Data, WriteKind};
use crate::cascade::{AsyncCascadeExecutor, AsyncCascadeHelper, OperationContext};
use crate::catalog::{CascadePhase, EntityDef};
use crate::entity::EntityRef;
use crate::error::{Error, Result};

/// Asynchronous write frame around a single entity.
pub struct AsyncEntityOperation<'a, H: ?Sized> {
    executor: AsyncCascadeExecutor<'a, H>,
    events: &'a EntityEventRegistry,
    entity_def: Arc<EntityDef>,
    entity: EntityRef,
}

impl<'a, H: AsyncCascadeHelper + ?Sized> AsyncEntityOperation<'a, H> {
    /// Create a frame for `entity`.
    pub fn new(
        executor: AsyncCascadeExecutor<'a, H>,
        events: &'a EntityEventRegistry,
        entity_def: Arc<EntityDef>,
        entity: EntityRef,
    ) -> Self {
        Self {
            executor,
            events,
            entity_def,
            entity,
        }
    }

    /// Entity being written.
    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// Insert the entity through `action`, cascading PERSIST.
    pub async fn persist<F, Fut>(
        self,
        ctx: &mut OperationContext,
        action: F,
    ) -> Result<Option<EntityRef>>
    where
        F: FnOnce(EntityRef) -> Fut + Send,
        Fut: Future<Output = Result<EntityRef>> + Send,
    {
        self.write(ctx, WriteKind::Persist, action).await
    }

    /// Update the entity through `action`, cascading UPDATE.
    pub async fn update<F, Fut>(
        self,
        ctx: &mut OperationContext,
        action: F,
    ) -> Result<Option<EntityRef>>
    where
        F: FnOnce(EntityRef) -> Fut + Send,
        Fut: Future<Output = Result<EntityRef>> + Send,
    {
        self.write(ctx, WriteKind::Update, action).await
    }

    /// Delete the entity through `action`.
    pub async fn delete<F, Fut>(self, action: F) -> Result<Option<EntityRef>>
    where
        F: FnOnce(EntityRef) -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        let entity = {
            let mut event = EntityEventContext::new(&self.entity_def, self.entity);
            if !self.events.pre(EventType::PreRemove, &mut event) {
                return Ok(None);
            }
            event.into_entity()
        };
        action(entity.clone()).await?;
        let mut event = EntityEventContext::new(&self.entity_def, entity);
        self.events.post(EventType::PostRemove, &mut event);
        Ok(Some(event.into_entity()))
    }

    async fn write<F, Fut>(
        self,
        ctx: &mut OperationContext,
        kind: WriteKind,
        action: F,
    ) -> Result<Option<EntityRef>>
    where
        F: FnOnce(EntityRef) -> Fut + Send,
        Fut: Future<Output = Result<EntityRef>> + Send,
    {
        let Self {
            executor,
            events,
            entity_def,
            entity: input,
        } = self;
        let ty = kind.cascade_type();

        let entity = executor
            .cascade(ctx, input.clone(), &entity_def, CascadePhase::Pre, ty)
            .await?;

        let entity = {
            let mut event = EntityEventContext::new(&entity_def, entity);
            if !events.pre(kind.pre_event(), &mut event) {
                return Ok(None);
            }
            event.into_entity()
        };
        let stored = action(entity).await?;
        record_written(ctx, &input, &stored);

        let entity = {
            let mut event = EntityEventContext::new(&entity_def, stored.clone());
            events.post(kind.post_event(), &mut event);
            event.into_entity()
        };

        let entity = executor
            .cascade(ctx, entity, &entity_def, CascadePhase::Post, ty)
            .await?;
        record_final(ctx, &input, &stored, &entity);
        Ok(Some(entity))
    }
}

/// Asynchronous write frame around a batch of entities of one type.
///
/// Elements move through the stages in order; one element's cascades
/// complete before the next element's start, since they share the
/// operation context.
pub struct AsyncEntitiesOperation<'a, H: ?Sized> {
    executor: AsyncCascadeExecutor<'a, H>,
    events: &'a EntityEventRegistry,
    entity_def: Arc<EntityDef>,
    data: Vec<Data>,
}

impl<'a, H: AsyncCascadeHelper + ?Sized> AsyncEntitiesOperation<'a, H> {
    /// Create a frame for `entities`. An empty batch is rejected.
    pub fn new(
        executor: AsyncCascadeExecutor<'a, H>,
        events: &'a EntityEventRegistry,
        entity_def: Arc<EntityDef>,
        entities: Vec<EntityRef>,
    ) -> Result<Self> {
        if entities.is_empty() {
            return Err(Error::IllegalState("entities cannot be empty".into()));
        }
        Ok(Self {
            executor,
            events,
            entity_def,
            data: entities.into_iter().map(Data::new).collect(),
        })
    }

    /// Current elements.
    pub fn data(&self) -> &[Data] {
        &self.data
    }

    /// Mark every element matching `predicate` as vetoed.
    pub fn veto(&mut self, predicate: impl Fn(&EntityRef) -> bool) {
        for d in self.data.iter_mut().filter(|d| !d.vetoed) {
            if predicate(&d.entity) {
                d.vetoed = true;
            }
        }
    }

    /// Insert the batch through `action`. Returns the non-vetoed elements.
    pub async fn persist<F, Fut>(self, ctx: &mut OperationContext, action: F) -> Result<Vec<EntityRef>>
    where
        F: FnOnce(Vec<EntityRef>) -> Fut + Send,
        Fut: Future<Output = Result<Vec<EntityRef>>> + Send,
    {
        Ok(surviving(self.write(ctx, WriteKind::Persist, action).await?))
    }

    /// Like [`persist`](Self::persist), returning every element with its
    /// veto flag.
    pub async fn persist_data<F, Fut>(self, ctx: &mut OperationContext, action: F) -> Result<Vec<Data>>
    where
        F: FnOnce(Vec<EntityRef>) -> Fut + Send,
        Fut: Future<Output = Result<Vec<EntityRef>>> + Send,
    {
        self.write(ctx, WriteKind::Persist, action).await
    }

    /// Update the batch through `action`. Returns the non-vetoed elements.
    pub async fn update<F, Fut>(self, ctx: &mut OperationContext, action: F) -> Result<Vec<EntityRef>>
    where
        F: FnOnce(Vec<EntityRef>) -> Fut + Send,
        Fut: Future<Output = Result<Vec<EntityRef>>> + Send,
    {
        Ok(surviving(self.write(ctx, WriteKind::Update, action).await?))
    }

    async fn write<F, Fut>(
        self,
        ctx: &mut OperationContext,
        kind: WriteKind,
        action: F,
    ) -> Result<Vec<Data>>
    where
        F: FnOnce(Vec<EntityRef>) -> Fut + Send,
        Fut: Future<Output = Result<Vec<EntityRef>>> + Send,
    {
        let Self {
            executor,
            events,
            entity_def,
            mut data,
        } = self;
        let ty = kind.cascade_type();
        let inputs: Vec<EntityRef> = data.iter().map(|d| d.entity.clone()).collect();

        for d in data.iter_mut() {
            if d.vetoed {
                continue;
            }
            d.entity = executor
                .cascade(ctx, d.entity.clone(), &entity_def, CascadePhase::Pre, ty)
                .await?;
        }

        for d in data.iter_mut().filter(|d| !d.vetoed) {
            let mut event = EntityEventContext::new(&entity_def, d.entity.clone());
            if events.pre(kind.pre_event(), &mut event) {
                d.entity = event.into_entity();
            } else {
                d.vetoed = true;
            }
        }

        let live: Vec<usize> = (0..data.len()).filter(|&i| !data[i].vetoed).collect();
        if live.is_empty() {
            debug!(entity = %entity_def.name, "every element of the batch was vetoed");
            return Ok(data);
        }

        let stored = action(live.iter().map(|&i| data[i].entity.clone()).collect()).await?;
        if stored.len() != live.len() {
            return Err(Error::IllegalState(format!(
                "storage action returned {} entities for {} inputs",
                stored.len(),
                live.len()
            )));
        }
        for (&i, entity) in live.iter().zip(stored.iter()) {
            record_written(ctx, &inputs[i], entity);
            data[i].entity = entity.clone();
        }

        for &i in &live {
            let mut event = EntityEventContext::new(&entity_def, data[i].entity.clone());
            events.post(kind.post_event(), &mut event);
            data[i].entity = event.into_entity();
        }

        for (&i, written) in live.iter().zip(&stored) {
            data[i].entity = executor
                .cascade(ctx, data[i].entity.clone(), &entity_def, CascadePhase::Post, ty)
                .await?;
            record_final(ctx, &inputs[i], written, &data[i].entity);
        }
        Ok(data)
    }
}
