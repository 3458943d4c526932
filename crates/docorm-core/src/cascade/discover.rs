//! Discovery of pending child writes.

use std::sync::Arc;

use tracing::trace;

use super::{CascadeContext, CascadeOp, OperationContext};
use crate::catalog::{Cardinality, CascadePhase, CascadeType, Catalog, EntityDef};
use crate::entity::{EntityRef, Record, Slot};
use crate::error::{Error, Result};

/// List the child writes `entity` needs for `phase` of a `ty` write.
///
/// Associations are visited in declared order; embedded values are walked
/// with the path extended. Absent or null children and empty lists yield no
/// op. An association whose inverse side was crossed to reach `entity` is
/// skipped, so a child never cascades back into its owner.
pub fn discover(
    catalog: &Catalog,
    ctx: &OperationContext,
    entity: &EntityRef,
    entity_def: &Arc<EntityDef>,
    phase: CascadePhase,
    ty: CascadeType,
) -> Result<Vec<CascadeOp>> {
    let mut ops = Vec::new();
    let mut walk = Walk {
        catalog,
        ctx,
        root: entity,
        root_def: entity_def,
        phase,
        ty,
        path: Vec::new(),
    };
    walk.visit(entity, entity_def, &mut ops)?;
    Ok(ops)
}

struct Walk<'a> {
    catalog: &'a Catalog,
    ctx: &'a OperationContext,
    root: &'a EntityRef,
    root_def: &'a Arc<EntityDef>,
    phase: CascadePhase,
    ty: CascadeType,
    path: Vec<String>,
}

impl Walk<'_> {
    fn visit(&mut self, record: &Record, def: &EntityDef, ops: &mut Vec<CascadeOp>) -> Result<()> {
        for (property, assoc) in def.associations() {
            let slot = match record.get(&property.name) {
                None | Some(Slot::Value(docorm_proto::Value::Null)) => continue,
                Some(slot) => slot,
            };

            if assoc.cardinality == Cardinality::Embedded {
                let Slot::Embedded(inner) = slot else {
                    return Err(Error::slot_mismatch(&def.name, &property.name, "an embedded value"));
                };
                let embedded_def = self.catalog.require(&assoc.target)?;
                self.path.push(property.name.clone());
                let result = self.visit(inner, &embedded_def, ops);
                self.path.pop();
                result?;
                continue;
            }

            if !assoc.cascades(self.ty) || assoc.phase() != self.phase {
                continue;
            }

            if let Some((inverse_owner, inverse_property)) =
                self.catalog.inverse_of(def, &property.name)
            {
                if self.ctx.is_on_path(&inverse_owner, &inverse_property) {
                    trace!(
                        owner = %def.name,
                        property = %property.name,
                        "skipping cascade back across inverse association"
                    );
                    continue;
                }
            }

            let child_entity = self.catalog.require(&assoc.target)?;
            let mut path = self.path.clone();
            path.push(property.name.clone());
            let cascade = CascadeContext {
                parent: self.root.clone(),
                parent_entity: self.root_def.clone(),
                path,
                declaring: def.name.clone(),
                association: assoc.clone(),
            };

            match (assoc.cardinality.is_single_ended(), slot) {
                (true, Slot::One(child)) => ops.push(CascadeOp::One {
                    cascade,
                    child: child.clone(),
                    child_entity,
                }),
                (false, Slot::Many(children)) => {
                    if children.is_empty() {
                        continue;
                    }
                    ops.push(CascadeOp::Many {
                        cascade,
                        children: children.clone(),
                        child_entity,
                    });
                }
                (true, _) => {
                    return Err(Error::slot_mismatch(&def.name, &property.name, "a single entity"))
                }
                (false, _) => {
                    return Err(Error::slot_mismatch(&def.name, &property.name, "a list of entities"))
                }
            }
        }
        Ok(())
    }
}
