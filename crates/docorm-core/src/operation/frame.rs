//! Synchronous operation frames.

use std::sync::Arc;

use tracing::debug;

use super::event::{EntityEventContext, EntityEventRegistry, EventType};
use super::{surviving, Data, WriteKind};
use crate::cascade::{CascadeExecutor, CascadeHelper, OperationContext};
use crate::catalog::{CascadePhase, EntityDef};
use crate::entity::EntityRef;
use crate::error::{Error, Result};

/// Write frame around a single entity.
pub struct EntityOperation<'a, H: ?Sized> {
    executor: CascadeExecutor<'a, H>,
    events: &'a EntityEventRegistry,
    entity_def: Arc<EntityDef>,
    entity: EntityRef,
}

impl<'a, H: CascadeHelper + ?Sized> EntityOperation<'a, H> {
    /// Create a frame for `entity`.
    pub fn new(
        executor: CascadeExecutor<'a, H>,
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
    ///
    /// Returns `None` when a pre-persist hook vetoes the write.
    pub fn persist<F>(self, ctx: &mut OperationContext, action: F) -> Result<Option<EntityRef>>
    where
        F: FnOnce(EntityRef) -> Result<EntityRef>,
    {
        self.write(ctx, WriteKind::Persist, action)
    }

    /// Update the entity through `action`, cascading UPDATE.
    ///
    /// Returns `None` when a pre-update hook vetoes the write.
    pub fn update<F>(self, ctx: &mut OperationContext, action: F) -> Result<Option<EntityRef>>
    where
        F: FnOnce(EntityRef) -> Result<EntityRef>,
    {
        self.write(ctx, WriteKind::Update, action)
    }

    /// Delete the entity through `action`. Deletes do not cascade.
    pub fn delete<F>(self, action: F) -> Result<Option<EntityRef>>
    where
        F: FnOnce(&EntityRef) -> Result<()>,
    {
        let mut event = EntityEventContext::new(&self.entity_def, self.entity);
        if !self.events.pre(EventType::PreRemove, &mut event) {
            return Ok(None);
        }
        let entity = event.into_entity();
        action(&entity)?;
        let mut event = EntityEventContext::new(&self.entity_def, entity);
        self.events.post(EventType::PostRemove, &mut event);
        Ok(Some(event.into_entity()))
    }

    fn write<F>(self, ctx: &mut OperationContext, kind: WriteKind, action: F) -> Result<Option<EntityRef>>
    where
        F: FnOnce(EntityRef) -> Result<EntityRef>,
    {
        let Self {
            executor,
            events,
            entity_def,
            entity: input,
        } = self;
        let ty = kind.cascade_type();

        let entity = executor.cascade(ctx, input.clone(), &entity_def, CascadePhase::Pre, ty)?;

        let mut event = EntityEventContext::new(&entity_def, entity);
        if !events.pre(kind.pre_event(), &mut event) {
            return Ok(None);
        }
        let stored = action(event.into_entity())?;
        record_written(ctx, &input, &stored);

        let mut event = EntityEventContext::new(&entity_def, stored.clone());
        events.post(kind.post_event(), &mut event);

        let entity = executor.cascade(ctx, event.into_entity(), &entity_def, CascadePhase::Post, ty)?;
        record_final(ctx, &input, &stored, &entity);
        Ok(Some(entity))
    }
}

/// Remember that `input` was written as `stored`, so a child pointing back
/// at the input reuses the stored instance instead of writing it again.
pub(crate) fn record_written(ctx: &mut OperationContext, input: &EntityRef, stored: &EntityRef) {
    ctx.persisted.insert_replaced(input, stored);
}

/// Point both the input and the stored instance at the entity left after
/// the post-cascade, which replaced the stored one's children.
pub(crate) fn record_final(
    ctx: &mut OperationContext,
    input: &EntityRef,
    stored: &EntityRef,
    last: &EntityRef,
) {
    ctx.persisted.insert_replaced(stored, last);
    ctx.persisted.insert_replaced(input, last);
}

/// Write frame around a batch of entities of one type.
pub struct EntitiesOperation<'a, H: ?Sized> {
    executor: CascadeExecutor<'a, H>,
    events: &'a EntityEventRegistry,
    entity_def: Arc<EntityDef>,
    data: Vec<Data>,
}

impl<'a, H: CascadeHelper + ?Sized> EntitiesOperation<'a, H> {
    /// Create a frame for `entities`. An empty batch is rejected.
    pub fn new(
        executor: CascadeExecutor<'a, H>,
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

    /// Insert the batch through `action`, cascading PERSIST per element.
    /// Returns the non-vetoed elements.
    pub fn persist<F>(self, ctx: &mut OperationContext, action: F) -> Result<Vec<EntityRef>>
    where
        F: FnOnce(Vec<EntityRef>) -> Result<Vec<EntityRef>>,
    {
        Ok(surviving(self.write(ctx, WriteKind::Persist, action)?))
    }

    /// Like [`persist`](Self::persist), returning every element with its
    /// veto flag.
    pub fn persist_data<F>(self, ctx: &mut OperationContext, action: F) -> Result<Vec<Data>>
    where
        F: FnOnce(Vec<EntityRef>) -> Result<Vec<EntityRef>>,
    {
        self.write(ctx, WriteKind::Persist, action)
    }

    /// Update the batch through `action`, cascading UPDATE per element.
    /// Returns the non-vetoed elements.
    pub fn update<F>(self, ctx: &mut OperationContext, action: F) -> Result<Vec<EntityRef>>
    where
        F: FnOnce(Vec<EntityRef>) -> Result<Vec<EntityRef>>,
    {
        Ok(surviving(self.write(ctx, WriteKind::Update, action)?))
    }

    /// Delete the batch through `action`. Returns the non-vetoed elements.
    pub fn delete<F>(mut self, action: F) -> Result<Vec<EntityRef>>
    where
        F: FnOnce(&[EntityRef]) -> Result<()>,
    {
        for d in self.data.iter_mut().filter(|d| !d.vetoed) {
            let mut event = EntityEventContext::new(&self.entity_def, d.entity.clone());
            if self.events.pre(EventType::PreRemove, &mut event) {
                d.entity = event.into_entity();
            } else {
                d.vetoed = true;
            }
        }
        let live = surviving(self.data);
        if live.is_empty() {
            return Ok(live);
        }
        action(&live)?;
        let mut out = Vec::with_capacity(live.len());
        for entity in live {
            let mut event = EntityEventContext::new(&self.entity_def, entity);
            self.events.post(EventType::PostRemove, &mut event);
            out.push(event.into_entity());
        }
        Ok(out)
    }

    fn write<F>(self, ctx: &mut OperationContext, kind: WriteKind, action: F) -> Result<Vec<Data>>
    where
        F: FnOnce(Vec<EntityRef>) -> Result<Vec<EntityRef>>,
    {
        let Self {
            executor,
            events,
            entity_def,
            mut data,
        } = self;
        let ty = kind.cascade_type();
        let inputs: Vec<EntityRef> = data.iter().map(|d| d.entity.clone()).collect();

        for d in data.iter_mut().filter(|d| !d.vetoed) {
            d.entity = executor.cascade(ctx, d.entity.clone(), &entity_def, CascadePhase::Pre, ty)?;
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

        let stored = action(live.iter().map(|&i| data[i].entity.clone()).collect())?;
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
            data[i].entity =
                executor.cascade(ctx, data[i].entity.clone(), &entity_def, CascadePhase::Post, ty)?;
            record_final(ctx, &inputs[i], written, &data[i].entity);
        }
        Ok(data)
    }
}
