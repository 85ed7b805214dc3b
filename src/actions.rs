//! Classification of action names into reads and writes.

use globset::{GlobSet, GlobSetBuilder};

use crate::pattern;

/// Action patterns that only read data or metadata.
pub const DEFAULT_READ_ACTIONS: &[&str] = &[
    "cluster:monitor/*",
    "cluster:*get*",
    "cluster:*search*",
    "indices:admin/aliases/exists",
    "indices:admin/aliases/get",
    "indices:admin/exists*",
    "indices:admin/get*",
    "indices:admin/mappings/fields/get*",
    "indices:admin/mappings/get*",
    "indices:admin/refresh*",
    "indices:admin/types/exists",
    "indices:admin/validate/*",
    "indices:data/read/*",
    "indices:monitor/*",
    "indices:admin/template/get",
];

/// Decides whether an action only reads.
pub trait ActionTable: Send + Sync {
    /// Returns `true` if `action` is read-only.
    fn is_read(&self, action: &str) -> bool;
}

/// Read-action table backed by `*` wildcard patterns.
///
/// Anything not matched is treated as a write, which is the stricter side
/// for index rewriting.
///
/// # Examples
///
/// ```
/// use request_scope::{ActionTable, ReadActionTable};
///
/// let table = ReadActionTable::default();
/// assert!(table.is_read("indices:data/read/search"));
/// assert!(!table.is_read("indices:data/write/bulk"));
/// ```
#[derive(Debug, Clone)]
pub struct ReadActionTable {
    patterns: Vec<String>,
    set: GlobSet,
}

impl ReadActionTable {
    /// Builds a table from wildcard patterns.
    ///
    /// Patterns that cannot be compiled are skipped with a warning.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for p in patterns.into_iter().map(Into::into) {
            match pattern::glob(&p) {
                Ok(glob) => {
                    builder.add(glob);
                    kept.push(p);
                }
                Err(e) => tracing::warn!(pattern = %p, error = %e, "skipping read action pattern"),
            }
        }
        let set = builder.build().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "read action table failed to build, every action is a write");
            GlobSet::empty()
        });
        Self {
            patterns: kept,
            set,
        }
    }

    /// Patterns this table was built from.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for ReadActionTable {
    fn default() -> Self {
        Self::new(DEFAULT_READ_ACTIONS.iter().copied())
    }
}

impl ActionTable for ReadActionTable {
    fn is_read(&self, action: &str) -> bool {
        self.set.is_match(action)
    }
}
