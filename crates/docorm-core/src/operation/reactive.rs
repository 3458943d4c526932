//! Asynchronous repository operations.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use tracing::debug;

use super::async_frame::{AsyncEntitiesOperation, AsyncEntityOperation};
use super::event::EntityEventRegistry;
use super::repository::{batch_entity, join_records, JoinRecord};
use super::{surviving, Data};
use crate::cascade::{
    AsyncCascadeExecutor, AsyncCascadeHelper, CascadeContext, OperationContext, Veto,
};
use crate::catalog::{Catalog, EntityDef};
use crate::config::OperationConfig;
use crate::entity::{EntityRef, IdentityReaders};
use crate::error::Result;

/// Asynchronous storage calls a repository needs.
#[async_trait]
pub trait AsyncEntityStore: Send + Sync {
    /// Insert one entity, returning the stored instance.
    async fn insert_one(&self, entity: &EntityDef, record: EntityRef) -> Result<EntityRef>;

    /// Insert several entities, returning the stored instances in order.
    async fn insert_batch(
        &self,
        entity: &EntityDef,
        records: Vec<EntityRef>,
    ) -> Result<Vec<EntityRef>>;

    /// Update one entity, returning the stored instance.
    async fn update_one(&self, entity: &EntityDef, record: EntityRef) -> Result<EntityRef>;

    /// Delete one entity.
    async fn delete_one(&self, entity: &EntityDef, record: EntityRef) -> Result<()>;

    /// Insert join collection rows.
    async fn insert_join_records(&self, records: Vec<JoinRecord>) -> Result<()>;
}

/// Asynchronous repository entry point.
///
/// Every method returns a lazy future; the operation context is created
/// when the future first runs and dropped when it completes.
pub struct ReactiveRepositoryOperations<S> {
    catalog: Arc<Catalog>,
    readers: Arc<IdentityReaders>,
    events: Arc<EntityEventRegistry>,
    config: OperationConfig,
    store: S,
}

impl<S: AsyncEntityStore> ReactiveRepositoryOperations<S> {
    /// Create repository operations over `store`.
    pub fn new(catalog: Arc<Catalog>, store: S) -> Self {
        Self {
            catalog,
            readers: Arc::new(IdentityReaders::new()),
            events: Arc::new(EntityEventRegistry::new()),
            config: OperationConfig::default(),
            store,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: OperationConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a listener registry.
    pub fn with_events(mut self, events: Arc<EntityEventRegistry>) -> Self {
        self.events = events;
        self
    }

    /// Listener registry.
    pub fn events(&self) -> &EntityEventRegistry {
        &self.events
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Insert `entity` and cascade. `None` if a hook vetoed it.
    pub async fn persist(&self, entity: EntityRef) -> Result<Option<EntityRef>> {
        let def = self.catalog.require(entity.entity())?;
        debug!(entity = %def.name, repository = %self.config.declaring_type, "persist");
        let mut ctx = OperationContext::new(&self.config);
        self.persist_in(&mut ctx, entity, &def).await
    }

    /// Insert several entities of one type. Vetoed entities are left out of
    /// the result.
    pub async fn persist_all(&self, entities: Vec<EntityRef>) -> Result<Vec<EntityRef>> {
        let def = batch_entity(&self.catalog, &entities)?;
        debug!(entity = %def.name, count = entities.len(), "persist all");
        let mut ctx = OperationContext::new(&self.config);
        if self.config.capabilities.supports_batch_insert(&def) {
            let data = self
                .persist_batch_in(&mut ctx, entities, &def, &Veto::none())
                .await?;
            return Ok(surviving(data));
        }
        let mut out = Vec::with_capacity(entities.len());
        for entity in entities {
            if let Some(stored) = self.persist_in(&mut ctx, entity, &def).await? {
                out.push(stored);
            }
        }
        Ok(out)
    }

    /// Update `entity` and cascade. `None` if a hook vetoed it.
    pub async fn update(&self, entity: EntityRef) -> Result<Option<EntityRef>> {
        let def = self.catalog.require(entity.entity())?;
        debug!(entity = %def.name, repository = %self.config.declaring_type, "update");
        let mut ctx = OperationContext::new(&self.config);
        self.update_in(&mut ctx, entity, &def).await
    }

    /// Delete `entity`. Returns `false` if a hook vetoed it.
    pub async fn delete(&self, entity: EntityRef) -> Result<bool> {
        let def = self.catalog.require(entity.entity())?;
        let store = &self.store;
        let target = def.clone();
        let deleted = AsyncEntityOperation::new(self.executor(), &self.events, def, entity)
            .delete(move |record| async move { store.delete_one(&target, record).await })
            .await?;
        Ok(deleted.is_some())
    }

    fn executor(&self) -> AsyncCascadeExecutor<'_, Self> {
        AsyncCascadeExecutor::new(&self.catalog, &self.readers, self)
    }

    async fn persist_in(
        &self,
        ctx: &mut OperationContext,
        entity: EntityRef,
        def: &Arc<EntityDef>,
    ) -> Result<Option<EntityRef>> {
        let store = &self.store;
        let target = def.clone();
        AsyncEntityOperation::new(self.executor(), &self.events, def.clone(), entity)
            .persist(ctx, move |record| async move {
                store.insert_one(&target, record).await
            })
            .await
    }

    async fn persist_batch_in(
        &self,
        ctx: &mut OperationContext,
        entities: Vec<EntityRef>,
        def: &Arc<EntityDef>,
        veto: &Veto,
    ) -> Result<Vec<Data>> {
        let store = &self.store;
        let target = def.clone();
        let mut op =
            AsyncEntitiesOperation::new(self.executor(), &self.events, def.clone(), entities)?;
        op.veto(|e| veto.is_vetoed(e));
        op.persist_data(ctx, move |records| async move {
            store.insert_batch(&target, records).await
        })
        .await
    }

    async fn update_in(
        &self,
        ctx: &mut OperationContext,
        entity: EntityRef,
        def: &Arc<EntityDef>,
    ) -> Result<Option<EntityRef>> {
        let store = &self.store;
        let target = def.clone();
        AsyncEntityOperation::new(self.executor(), &self.events, def.clone(), entity)
            .update(ctx, move |record| async move {
                store.update_one(&target, record).await
            })
            .await
    }
}

#[async_trait]
impl<S: AsyncEntityStore> AsyncCascadeHelper for ReactiveRepositoryOperations<S> {
    fn supports_batch(&self, ctx: &OperationContext, entity: &EntityDef) -> bool {
        ctx.capabilities().supports_batch_insert(entity)
    }

    async fn persist_one(
        &self,
        ctx: &mut OperationContext,
        child: EntityRef,
        entity: &Arc<EntityDef>,
    ) -> Result<EntityRef> {
        Ok(self
            .persist_in(ctx, child.clone(), entity)
            .await?
            .unwrap_or(child))
    }

    fn persist_batch<'a>(
        &'a self,
        ctx: &'a mut OperationContext,
        children: Vec<EntityRef>,
        entity: &'a Arc<EntityDef>,
        veto: &'a Veto,
    ) -> BoxStream<'a, Result<EntityRef>> {
        let originals = children.clone();
        stream::once(self.persist_batch_in(ctx, children, entity, veto))
            .map_ok(move |data| {
                let merged: Vec<Result<EntityRef>> = data
                    .into_iter()
                    .zip(originals.clone())
                    .map(|(d, original)| Ok(if d.vetoed { original } else { d.entity }))
                    .collect();
                stream::iter(merged)
            })
            .try_flatten()
            .boxed()
    }

    async fn update_one(
        &self,
        ctx: &mut OperationContext,
        child: EntityRef,
        entity: &Arc<EntityDef>,
    ) -> Result<EntityRef> {
        Ok(self
            .update_in(ctx, child.clone(), entity)
            .await?
            .unwrap_or(child))
    }

    async fn persist_many_association(
        &self,
        _ctx: &mut OperationContext,
        cascade: &CascadeContext,
        child: &EntityRef,
        child_entity: &EntityDef,
    ) -> Result<()> {
        let records = join_records(
            &self.readers,
            cascade,
            std::slice::from_ref(child),
            child_entity,
            &Veto::none(),
        )?;
        self.store.insert_join_records(records).await
    }

    async fn persist_many_association_batch(
        &self,
        _ctx: &mut OperationContext,
        cascade: &CascadeContext,
        children: &[EntityRef],
        child_entity: &EntityDef,
        veto: &Veto,
    ) -> Result<()> {
        let records = join_records(&self.readers, cascade, children, child_entity, veto)?;
        if records.is_empty() {
            return Ok(());
        }
        self.store.insert_join_records(records).await
    }
}
