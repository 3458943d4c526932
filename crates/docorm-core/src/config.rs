//! Operation configuration.

use crate::catalog::EntityDef;

/// Default maximum nesting of cascades before an operation is aborted.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 100;

/// Default declaring type recorded on operation contexts.
pub const DEFAULT_DECLARING_TYPE: &str = "repository";

/// Storage dialect an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// Document store.
    #[default]
    Document,
    /// H2.
    H2,
    /// PostgreSQL.
    Postgres,
    /// MySQL.
    MySql,
    /// Oracle.
    Oracle,
    /// SQL Server.
    SqlServer,
}

impl Dialect {
    /// Whether the dialect accepts batched writes at all.
    pub fn allows_batch(&self) -> bool {
        !matches!(self, Dialect::SqlServer)
    }
}

/// Capability flags of the storage target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectCapabilities {
    /// Dialect in use.
    pub dialect: Dialect,
    /// Whether several writes may be sent as one batch.
    pub batch_writes: bool,
}

impl DialectCapabilities {
    /// Capabilities of `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            batch_writes: dialect.allows_batch(),
        }
    }

    /// Disable batched writes.
    pub fn without_batch_writes(mut self) -> Self {
        self.batch_writes = false;
        self
    }

    /// Whether inserts of `entity` may be batched.
    ///
    /// MySQL and Oracle cannot return generated identities from a batch.
    pub fn supports_batch_insert(&self, entity: &EntityDef) -> bool {
        if !self.batch_writes {
            return false;
        }
        match self.dialect {
            Dialect::SqlServer => false,
            Dialect::MySql | Dialect::Oracle => {
                entity.identity.is_some() && !entity.generated_identity
            }
            _ => true,
        }
    }
}

impl Default for DialectCapabilities {
    fn default() -> Self {
        Self::new(Dialect::default())
    }
}

/// Settings shared by every operation of a repository.
#[derive(Debug, Clone)]
pub struct OperationConfig {
    /// Type name recorded on each operation context.
    pub declaring_type: String,

    /// Storage capabilities.
    pub capabilities: DialectCapabilities,

    /// Maximum nesting of cascades.
    pub max_cascade_depth: usize,
}

impl OperationConfig {
    /// Create a configuration for `declaring_type` with default settings.
    pub fn new(declaring_type: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            capabilities: DialectCapabilities::default(),
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
        }
    }

    /// Set the dialect, resetting capabilities to its defaults.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.capabilities = DialectCapabilities::new(dialect);
        self
    }

    /// Set the capabilities.
    pub fn with_capabilities(mut self, capabilities: DialectCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the maximum cascade depth.
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DECLARING_TYPE)
    }
}
