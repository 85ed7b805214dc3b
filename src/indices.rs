//! Target-index state shared by request and sub-request contexts.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::catalog::ClusterMetadata;
use crate::error::{Error, ResolveError, Result};
use crate::logging::ContextLog;
use crate::options::IndicesOptions;
use crate::resolver::IndexResolver;
use crate::transactional::TransactionalField;

/// Collaborators used to resolve index expressions.
///
/// Cheap to clone; a parent context hands a clone to every sub-request.
#[derive(Clone)]
pub(crate) struct Resolution {
    pub(crate) metadata: Arc<dyn ClusterMetadata>,
    pub(crate) resolver: Arc<dyn IndexResolver>,
}

impl Resolution {
    /// Best-effort expansion against the current snapshot.
    ///
    /// Never fails: `NotFound` is logged at debug, anything else at error,
    /// and both yield an empty set.
    pub(crate) fn expand(
        &self,
        log: ContextLog<'_>,
        options: &IndicesOptions,
        expressions: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        let expressions: Vec<String> = expressions.iter().cloned().collect();
        let snapshot = self.metadata.snapshot();

        match self.resolver.resolve(&snapshot, options, &expressions) {
            Ok(resolved) => resolved,
            Err(ResolveError::NotFound(_)) => {
                log.debug(format_args!(
                    "{} expands to no known index!",
                    expressions.join(",")
                ));
                BTreeSet::new()
            }
            Err(e) => {
                log.error(format_args!(
                    "error while resolving expanded indices of [{}]: {}",
                    expressions.join(","),
                    e
                ));
                BTreeSet::new()
            }
        }
    }
}

/// Transactional target indices plus the rules for rewriting them.
#[derive(Debug, Clone)]
pub(crate) struct TargetIndices {
    field: TransactionalField<BTreeSet<String>>,
    read_only: bool,
    options: IndicesOptions,
}

impl TargetIndices {
    pub(crate) fn new(initial: BTreeSet<String>, read_only: bool, options: IndicesOptions) -> Self {
        Self {
            field: TransactionalField::new("indices", initial),
            read_only,
            options,
        }
    }

    pub(crate) fn current(&self) -> &BTreeSet<String> {
        self.field.get()
    }

    pub(crate) fn initial(&self) -> &BTreeSet<String> {
        self.field.initial()
    }

    pub(crate) fn options(&self) -> &IndicesOptions {
        &self.options
    }

    pub(crate) fn field_mut(&mut self) -> &mut TransactionalField<BTreeSet<String>> {
        &mut self.field
    }

    pub(crate) fn expand(
        &self,
        resolution: &Resolution,
        log: ContextLog<'_>,
        expressions: Option<&BTreeSet<String>>,
    ) -> BTreeSet<String> {
        resolution.expand(log, &self.options, expressions.unwrap_or(self.current()))
    }

    /// Validates and applies a rewrite of the target indices.
    ///
    /// Empty sets are refused; an unchanged set is a no-op that does not
    /// touch the resolver; reads are expanded (falling back to the
    /// unresolved value when nothing matches) and writes are taken verbatim.
    pub(crate) fn set(
        &mut self,
        resolution: &Resolution,
        log: ContextLog<'_>,
        new: BTreeSet<String>,
    ) -> Result<()> {
        if new.is_empty() {
            let from = join(self.current());
            return Err(if self.read_only {
                Error::AmbiguousEmptySet { from }
            } else {
                Error::EmptyIndexSet { from }
            });
        }

        if &new == self.current() {
            log.debug(format_args!("the indices are the same, won't set anything..."));
            return Ok(());
        }

        if !self.read_only {
            self.field.mutate(new);
            return Ok(());
        }

        let expanded = self.expand(resolution, log, Some(&new));
        // An index that does not exist yet is not an error here.
        if expanded.is_empty() {
            self.field.mutate(new);
        } else {
            self.field.mutate(expanded);
        }
        Ok(())
    }
}

pub(crate) fn join(indices: &BTreeSet<String>) -> String {
    indices.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}
