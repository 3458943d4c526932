//! Runtime entity instances and identity bookkeeping.

mod identity;
mod record;

pub use identity::{IdentityReader, IdentityReaders, PersistedSet};
pub use record::{same_instance, EntityRef, Record, Slot};
