//! Asynchronous cascade executor.
//!
//! Same semantics as [`CascadeExecutor`](super::CascadeExecutor), expressed
//! as lazy futures: nothing runs until the returned future is polled, each
//! helper call is awaited before the next starts, and dropping the future
//! abandons the remaining steps.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use tracing::debug;

use super::{
    discover, substitute_many, substitute_one, CascadeContext, CascadeOp, OperationContext, Veto,
};
use crate::catalog::{CascadePhase, CascadeType, Catalog, EntityDef};
use crate::entity::{EntityRef, IdentityReaders};
use crate::error::{Error, Result};

/// Asynchronous storage callbacks a cascade drives.
#[async_trait]
pub trait AsyncCascadeHelper: Send + Sync {
    /// Whether children of `entity` may be inserted as one batch.
    fn supports_batch(&self, ctx: &OperationContext, entity: &EntityDef) -> bool;

    /// Insert one child.
    async fn persist_one(
        &self,
        ctx: &mut OperationContext,
        child: EntityRef,
        entity: &Arc<EntityDef>,
    ) -> Result<EntityRef>;

    /// Insert several children, yielding one element per input in order.
    /// Vetoed elements come back unchanged.
    fn persist_batch<'a>(
        &'a self,
        ctx: &'a mut OperationContext,
        children: Vec<EntityRef>,
        entity: &'a Arc<EntityDef>,
        veto: &'a Veto,
    ) -> BoxStream<'a, Result<EntityRef>>;

    /// Update one child.
    async fn update_one(
        &self,
        ctx: &mut OperationContext,
        child: EntityRef,
        entity: &Arc<EntityDef>,
    ) -> Result<EntityRef>;

    /// Write the join record linking `cascade.parent` to `child`.
    async fn persist_many_association(
        &self,
        ctx: &mut OperationContext,
        cascade: &CascadeContext,
        child: &EntityRef,
        child_entity: &EntityDef,
    ) -> Result<()>;

    /// Write join records linking `cascade.parent` to every non-vetoed child.
    async fn persist_many_association_batch(
        &self,
        ctx: &mut OperationContext,
        cascade: &CascadeContext,
        children: &[EntityRef],
        child_entity: &EntityDef,
        veto: &Veto,
    ) -> Result<()>;
}

/// Carries out the cascades of one entity as a chain of futures.
pub struct AsyncCascadeExecutor<'a, H: ?Sized> {
    catalog: &'a Catalog,
    readers: &'a IdentityReaders,
    helper: &'a H,
}

impl<'a, H: AsyncCascadeHelper + ?Sized> AsyncCascadeExecutor<'a, H> {
    /// Create a new cascade executor.
    pub fn new(catalog: &'a Catalog, readers: &'a IdentityReaders, helper: &'a H) -> Self {
        Self {
            catalog,
            readers,
            helper,
        }
    }

    /// Run the `phase` cascades of a `ty` write of `entity`.
    pub async fn cascade(
        &self,
        ctx: &mut OperationContext,
        entity: EntityRef,
        entity_def: &Arc<EntityDef>,
        phase: CascadePhase,
        ty: CascadeType,
    ) -> Result<EntityRef> {
        if ty == CascadeType::All {
            return Err(Error::InvalidArgument(
                "a cascade runs for PERSIST or UPDATE, not ALL".into(),
            ));
        }
        let ops = discover(self.catalog, ctx, &entity, entity_def, phase, ty)?;
        if ops.is_empty() {
            return Ok(entity);
        }
        debug!(
            entity = %entity_def.name,
            phase = ?phase,
            cascade = %ty,
            ops = ops.len(),
            "running cascades"
        );

        let mut entity = entity;
        for op in ops {
            entity = match op {
                CascadeOp::One {
                    cascade,
                    child,
                    child_entity,
                } => {
                    self.cascade_one(ctx, entity, &cascade, child, &child_entity, ty)
                        .await?
                }
                CascadeOp::Many {
                    cascade,
                    children,
                    child_entity,
                } => {
                    self.cascade_many(ctx, entity, &cascade, children, &child_entity, ty)
                        .await?
                }
            };
        }
        Ok(entity)
    }

    async fn cascade_one(
        &self,
        ctx: &mut OperationContext,
        entity: EntityRef,
        cascade: &CascadeContext,
        child: EntityRef,
        child_entity: &Arc<EntityDef>,
        ty: CascadeType,
    ) -> Result<EntityRef> {
        if let Some(done) = ctx.persisted.resolve(&child) {
            return substitute_one(entity, &cascade.path, &child, &done);
        }

        let step = cascade.step();
        let has_id = self.readers.has_identity(child_entity, &child)?;
        let processed = if !has_id && ty == CascadeType::Persist {
            debug!(path = %cascade.dotted_path(), entity = %child_entity.name, "cascading PERSIST");
            ctx.enter(step.clone())?;
            let result = self.helper.persist_one(ctx, child.clone(), child_entity).await;
            ctx.leave();
            result?
        } else if has_id && ty == CascadeType::Update {
            debug!(path = %cascade.dotted_path(), entity = %child_entity.name, "cascading UPDATE");
            ctx.enter(step.clone())?;
            let result = self.helper.update_one(ctx, child.clone(), child_entity).await;
            ctx.leave();
            result?
        } else {
            child.clone()
        };
        let entity = substitute_one(entity, &cascade.path, &child, &processed)?;

        if !has_id && cascade.association.uses_join_table() {
            debug!(path = %cascade.dotted_path(), "writing join record");
            let link = cascade.with_parent(entity.clone());
            ctx.enter(step)?;
            let result = self
                .helper
                .persist_many_association(ctx, &link, &processed, child_entity)
                .await;
            ctx.leave();
            result?;
        }

        ctx.persisted.insert_replaced(&child, &processed);
        Ok(entity)
    }

    async fn cascade_many(
        &self,
        ctx: &mut OperationContext,
        entity: EntityRef,
        cascade: &CascadeContext,
        children: Vec<EntityRef>,
        child_entity: &Arc<EntityDef>,
        ty: CascadeType,
    ) -> Result<EntityRef> {
        let step = cascade.step();
        let was_persisted: Vec<bool> = children.iter().map(|c| ctx.persisted.contains(c)).collect();
        let mut processed = Vec::with_capacity(children.len());

        if ty == CascadeType::Update {
            for child in &children {
                if let Some(done) = ctx.persisted.resolve(child) {
                    processed.push(done);
                    continue;
                }
                let has_id = self.readers.has_identity(child_entity, child)?;
                ctx.enter(step.clone())?;
                let result = if has_id {
                    debug!(path = %cascade.dotted_path(), entity = %child_entity.name, "cascading UPDATE");
                    self.helper.update_one(ctx, child.clone(), child_entity).await
                } else {
                    debug!(path = %cascade.dotted_path(), entity = %child_entity.name, "cascading PERSIST");
                    self.helper.persist_one(ctx, child.clone(), child_entity).await
                };
                ctx.leave();
                processed.push(result?);
            }
        } else if self.helper.supports_batch(ctx, child_entity) {
            let mut veto = Veto::none();
            for (child, persisted) in children.iter().zip(&was_persisted) {
                if *persisted || self.readers.has_identity(child_entity, child)? {
                    veto.add(child);
                }
            }
            debug!(
                path = %cascade.dotted_path(),
                entity = %child_entity.name,
                count = children.len(),
                vetoed = veto.len(),
                "cascading PERSIST batch"
            );
            ctx.enter(step.clone())?;
            let result: Result<Vec<EntityRef>> = self
                .helper
                .persist_batch(ctx, children.clone(), child_entity, &veto)
                .try_collect()
                .await;
            ctx.leave();
            let stored = result?;
            if stored.len() != children.len() {
                return Err(Error::IllegalState(format!(
                    "batch insert of {} returned {} entities for {} children",
                    child_entity.name,
                    stored.len(),
                    children.len()
                )));
            }
            for ((child, stored), persisted) in children.iter().zip(stored).zip(&was_persisted) {
                // Children written by this batch already carry their own
                // cascades; only earlier writes are looked up.
                let done = if *persisted { ctx.persisted.resolve(child) } else { None };
                processed.push(done.unwrap_or(stored));
            }
        } else {
            for child in &children {
                if let Some(done) = ctx.persisted.resolve(child) {
                    processed.push(done);
                } else if self.readers.has_identity(child_entity, child)? {
                    processed.push(child.clone());
                } else {
                    debug!(path = %cascade.dotted_path(), entity = %child_entity.name, "cascading PERSIST");
                    ctx.enter(step.clone())?;
                    let result = self.helper.persist_one(ctx, child.clone(), child_entity).await;
                    ctx.leave();
                    processed.push(result?);
                }
            }
        }

        let entity = substitute_many(entity, &cascade.path, &children, &processed)?;

        if cascade.association.uses_join_table() && !processed.is_empty() {
            let link = cascade.with_parent(entity.clone());
            if ctx.capabilities().batch_writes {
                let mut veto = Veto::none();
                for (child, persisted) in processed.iter().zip(&was_persisted) {
                    if *persisted {
                        veto.add(child);
                    }
                }
                debug!(path = %cascade.dotted_path(), vetoed = veto.len(), "writing join records");
                ctx.enter(step.clone())?;
                let result = self
                    .helper
                    .persist_many_association_batch(ctx, &link, &processed, child_entity, &veto)
                    .await;
                ctx.leave();
                result?;
            } else {
                for (child, persisted) in processed.iter().zip(&was_persisted) {
                    if *persisted {
                        continue;
                    }
                    debug!(path = %cascade.dotted_path(), "writing join record");
                    ctx.enter(step.clone())?;
                    let result = self
                        .helper
                        .persist_many_association(ctx, &link, child, child_entity)
                        .await;
                    ctx.leave();
                    result?;
                }
            }
        }

        for (child, done) in children.iter().zip(&processed) {
            ctx.persisted.insert_replaced(child, done);
        }
        Ok(entity)
    }
}
