//! Synchronous repository operations.
//!
//! [`RepositoryOperations`] is the entry point a repository calls: each call
//! gets a fresh [`OperationContext`], runs the operation frame, and serves
//! as the cascade helper for its own cascades, so every cascaded child goes
//! through a full frame of its own (events and nested cascades included).

use std::sync::Arc;

use docorm_proto::Value;
use tracing::debug;

use super::event::EntityEventRegistry;
use super::frame::{EntitiesOperation, EntityOperation};
use super::Data;
use crate::cascade::{CascadeContext, CascadeExecutor, CascadeHelper, OperationContext, Veto};
use crate::catalog::{Catalog, EntityDef};
use crate::config::OperationConfig;
use crate::entity::{EntityRef, IdentityReaders};
use crate::error::{Error, Result};

/// A row of a join collection linking an owner to one child.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRecord {
    /// Join collection name.
    pub collection: String,
    /// Owner identity.
    pub owner_id: Value,
    /// Child identity.
    pub child_id: Value,
}

/// Storage calls a repository needs.
pub trait EntityStore {
    /// Insert one entity, returning the stored instance.
    fn insert_one(&self, entity: &EntityDef, record: EntityRef) -> Result<EntityRef>;

    /// Insert several entities, returning the stored instances in order.
    fn insert_batch(&self, entity: &EntityDef, records: Vec<EntityRef>) -> Result<Vec<EntityRef>>;

    /// Update one entity, returning the stored instance.
    fn update_one(&self, entity: &EntityDef, record: EntityRef) -> Result<EntityRef>;

    /// Delete one entity.
    fn delete_one(&self, entity: &EntityDef, record: &EntityRef) -> Result<()>;

    /// Insert join collection rows.
    fn insert_join_records(&self, records: Vec<JoinRecord>) -> Result<()>;
}

/// Name of the join collection behind `cascade`'s association.
pub(crate) fn join_collection(cascade: &CascadeContext) -> String {
    cascade.association.join_table.clone().unwrap_or_else(|| {
        format!(
            "{}_{}",
            cascade.parent_entity.persisted_name(),
            cascade.path.join("_")
        )
    })
}

/// Join rows linking `cascade.parent` to every non-vetoed child.
pub(crate) fn join_records(
    readers: &IdentityReaders,
    cascade: &CascadeContext,
    children: &[EntityRef],
    child_entity: &EntityDef,
    veto: &Veto,
) -> Result<Vec<JoinRecord>> {
    let owner_id = readers
        .reader(&cascade.parent_entity)?
        .read(&cascade.parent)
        .cloned()
        .ok_or_else(|| {
            Error::IllegalState(format!(
                "owner of {} has no identity yet",
                cascade.dotted_path()
            ))
        })?;
    let reader = readers.reader(child_entity)?;
    let collection = join_collection(cascade);

    children
        .iter()
        .filter(|child| !veto.is_vetoed(child))
        .map(|child| {
            let child_id = reader.read(child).cloned().ok_or_else(|| {
                Error::IllegalState(format!(
                    "child of {} has no identity yet",
                    cascade.dotted_path()
                ))
            })?;
            Ok(JoinRecord {
                collection: collection.clone(),
                owner_id: owner_id.clone(),
                child_id,
            })
        })
        .collect()
}

/// Resolve the shared entity of a batch, rejecting mixed batches.
pub(crate) fn batch_entity(catalog: &Catalog, entities: &[EntityRef]) -> Result<Arc<EntityDef>> {
    let first = entities
        .first()
        .ok_or_else(|| Error::IllegalState("entities cannot be empty".into()))?;
    if let Some(other) = entities.iter().find(|e| e.entity() != first.entity()) {
        return Err(Error::InvalidArgument(format!(
            "batch mixes entities '{}' and '{}'",
            first.entity(),
            other.entity()
        )));
    }
    catalog.require(first.entity())
}

/// Synchronous repository entry point.
pub struct RepositoryOperations<S> {
    catalog: Arc<Catalog>,
    readers: Arc<IdentityReaders>,
    events: Arc<EntityEventRegistry>,
    config: OperationConfig,
    store: S,
}

impl<S: EntityStore> RepositoryOperations<S> {
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

    /// Share an identity-reader cache.
    pub fn with_readers(mut self, readers: Arc<IdentityReaders>) -> Self {
        self.readers = readers;
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

    /// A fresh context for one call.
    pub fn context(&self) -> OperationContext {
        OperationContext::new(&self.config)
    }

    /// Insert `entity` and cascade. `None` if a hook vetoed it.
    pub fn persist(&self, entity: EntityRef) -> Result<Option<EntityRef>> {
        let def = self.catalog.require(entity.entity())?;
        debug!(entity = %def.name, repository = %self.config.declaring_type, "persist");
        let mut ctx = self.context();
        self.persist_in(&mut ctx, entity, &def)
    }

    /// Insert several entities of one type. Vetoed entities are left out of
    /// the result.
    pub fn persist_all(&self, entities: Vec<EntityRef>) -> Result<Vec<EntityRef>> {
        let def = batch_entity(&self.catalog, &entities)?;
        debug!(entity = %def.name, count = entities.len(), "persist all");
        let mut ctx = self.context();
        if self.config.capabilities.supports_batch_insert(&def) {
            let data = self.persist_batch_in(&mut ctx, entities, &def, &Veto::none())?;
            return Ok(super::surviving(data));
        }
        let mut out = Vec::with_capacity(entities.len());
        for entity in entities {
            if let Some(stored) = self.persist_in(&mut ctx, entity, &def)? {
                out.push(stored);
            }
        }
        Ok(out)
    }

    /// Update `entity` and cascade. `None` if a hook vetoed it.
    pub fn update(&self, entity: EntityRef) -> Result<Option<EntityRef>> {
        let def = self.catalog.require(entity.entity())?;
        debug!(entity = %def.name, repository = %self.config.declaring_type, "update");
        let mut ctx = self.context();
        self.update_in(&mut ctx, entity, &def)
    }

    /// Update several entities of one type.
    pub fn update_all(&self, entities: Vec<EntityRef>) -> Result<Vec<EntityRef>> {
        let def = batch_entity(&self.catalog, &entities)?;
        let mut ctx = self.context();
        let store = &self.store;
        EntitiesOperation::new(self.executor(), &self.events, def.clone(), entities)?.update(
            &mut ctx,
            |records| {
                records
                    .into_iter()
                    .map(|r| store.update_one(&def, r))
                    .collect()
            },
        )
    }

    /// Delete `entity`. Returns `false` if a hook vetoed it.
    pub fn delete(&self, entity: EntityRef) -> Result<bool> {
        let def = self.catalog.require(entity.entity())?;
        let deleted = EntityOperation::new(self.executor(), &self.events, def.clone(), entity)
            .delete(|record| self.store.delete_one(&def, record))?;
        Ok(deleted.is_some())
    }

    fn executor(&self) -> CascadeExecutor<'_, Self> {
        CascadeExecutor::new(&self.catalog, &self.readers, self)
    }

    fn persist_in(
        &self,
        ctx: &mut OperationContext,
        entity: EntityRef,
        def: &Arc<EntityDef>,
    ) -> Result<Option<EntityRef>> {
        EntityOperation::new(self.executor(), &self.events, def.clone(), entity)
            .persist(ctx, |record| self.store.insert_one(def, record))
    }

    fn persist_batch_in(
        &self,
        ctx: &mut OperationContext,
        entities: Vec<EntityRef>,
        def: &Arc<EntityDef>,
        veto: &Veto,
    ) -> Result<Vec<Data>> {
        let mut op = EntitiesOperation::new(self.executor(), &self.events, def.clone(), entities)?;
        op.veto(|e| veto.is_vetoed(e));
        op.persist_data(ctx, |records| self.store.insert_batch(def, records))
    }

    fn update_in(
        &self,
        ctx: &mut OperationContext,
        entity: EntityRef,
        def: &Arc<EntityDef>,
    ) -> Result<Option<EntityRef>> {
        EntityOperation::new(self.executor(), &self.events, def.clone(), entity)
            .update(ctx, |record| self.store.update_one(def, record))
    }
}

impl<S: EntityStore> CascadeHelper for RepositoryOperations<S> {
    fn supports_batch(&self, ctx: &OperationContext, entity: &EntityDef) -> bool {
        ctx.capabilities().supports_batch_insert(entity)
    }

    fn persist_one(
        &self,
        ctx: &mut OperationContext,
        child: EntityRef,
        entity: &Arc<EntityDef>,
    ) -> Result<EntityRef> {
        Ok(self
            .persist_in(ctx, child.clone(), entity)?
            .unwrap_or(child))
    }

    fn persist_batch(
        &self,
        ctx: &mut OperationContext,
        children: Vec<EntityRef>,
        entity: &Arc<EntityDef>,
        veto: &Veto,
    ) -> Result<Vec<EntityRef>> {
        let originals = children.clone();
        let data = self.persist_batch_in(ctx, children, entity, veto)?;
        Ok(data
            .into_iter()
            .zip(originals)
            .map(|(d, original)| if d.vetoed { original } else { d.entity })
            .collect())
    }

    fn update_one(
        &self,
        ctx: &mut OperationContext,
        child: EntityRef,
        entity: &Arc<EntityDef>,
    ) -> Result<EntityRef> {
        Ok(self.update_in(ctx, child.clone(), entity)?.unwrap_or(child))
    }

    fn persist_many_association(
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
        self.store.insert_join_records(records)
    }

    fn persist_many_association_batch(
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
        self.store.insert_join_records(records)
    }
}
