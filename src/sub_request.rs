//! Rewriting of the sub-operations embedded in composite requests.

use std::collections::BTreeSet;

use crate::context::RequestContext;
use crate::error::{Error, Result, RewriteError};
use crate::host::{HostRequest, HostSubRequest};
use crate::indices::{Resolution, TargetIndices};
use crate::logging::ContextLog;
use crate::options::IndicesOptions;
use crate::request::ContextId;

/// What a rewrite callback decided for one sub-operation.
#[derive(Debug)]
pub enum SubRequestOutcome<S: HostSubRequest> {
    /// Keep the sub-operation, with the (possibly rewritten or replaced) context
    Keep(SubRequestContext<S>),
    /// Remove the sub-operation from the composite request
    Drop,
}

/// View over one native sub-operation of a composite request.
///
/// Owns its own transactional target indices, seeded from the indices the
/// sub-operation declares, and shares the parent's resolution facilities and
/// read/write classification. It never commits on its own: once kept by a
/// scan it is delegated to the parent, which writes its indices back into the
/// native sub-operation.
pub struct SubRequestContext<S: HostSubRequest> {
    rendered_id: String,
    action: String,
    position: usize,
    request: S,
    indices: TargetIndices,
    resolution: Resolution,
    default_options: IndicesOptions,
    read_only: bool,
    delegated: bool,
}

impl<S: HostSubRequest> SubRequestContext<S> {
    fn new(
        id: ContextId,
        action: String,
        position: usize,
        request: S,
        resolution: Resolution,
        default_options: IndicesOptions,
        read_only: bool,
    ) -> Self {
        let options = request.indices_options().unwrap_or(default_options);
        let indices = TargetIndices::new(request.indices(), read_only, options);
        Self {
            rendered_id: id.to_string(),
            action,
            position,
            request,
            indices,
            resolution,
            default_options,
            read_only,
            delegated: false,
        }
    }

    /// A fresh context over another native sub-operation, taking this one's
    /// place in the composite request.
    pub fn replaced_by(&self, request: S) -> Self {
        let options = request.indices_options().unwrap_or(self.default_options);
        let indices = TargetIndices::new(request.indices(), self.read_only, options);
        Self {
            rendered_id: self.rendered_id.clone(),
            action: self.action.clone(),
            position: self.position,
            request,
            indices,
            resolution: self.resolution.clone(),
            default_options: self.default_options,
            read_only: self.read_only,
            delegated: false,
        }
    }

    /// Diagnostic identity, derived from the parent's.
    pub fn id(&self) -> &str {
        &self.rendered_id
    }

    /// Position of the sub-operation in the original composite request.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Description of the native sub-operation.
    pub fn description(&self) -> String {
        self.request.description()
    }

    /// Sub-operations always carry indices.
    pub fn involves_indices(&self) -> bool {
        true
    }

    /// Read/write classification inherited from the parent request.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether the parent took over committing this sub-request.
    pub fn is_delegated(&self) -> bool {
        self.delegated
    }

    /// The native sub-operation.
    pub fn request(&self) -> &S {
        &self.request
    }

    /// Current target indices.
    pub fn indices(&self) -> &BTreeSet<String> {
        self.indices.current()
    }

    /// Target indices as declared by the sub-operation.
    pub fn initial_indices(&self) -> &BTreeSet<String> {
        self.indices.initial()
    }

    /// Resolves `expressions` (default: the current indices); best effort,
    /// empty when nothing matches or resolution fails.
    pub fn expanded_indices(&self, expressions: Option<&BTreeSet<String>>) -> BTreeSet<String> {
        self.indices.expand(&self.resolution, self.log(), expressions)
    }

    /// Rewrites the target indices, with the same rules as
    /// [`RequestContext::set_indices`].
    ///
    /// # Errors
    ///
    /// [`Error::EmptyIndexSet`] or [`Error::AmbiguousEmptySet`] if `new` is empty.
    pub fn set_indices(&mut self, new: BTreeSet<String>) -> Result<()> {
        let log = ContextLog::new(&self.rendered_id, &self.action);
        self.indices.set(&self.resolution, log, new)
    }

    /// Logger stamping this sub-request's id on every event.
    pub fn log(&self) -> ContextLog<'_> {
        ContextLog::new(&self.rendered_id, &self.action)
    }

    /// Writes changed indices into the native sub-operation.
    ///
    /// Returns whether the native sub-operation was modified.
    pub(crate) fn apply(&mut self) -> bool {
        let request = &mut self.request;
        self.indices
            .field_mut()
            .commit(|indices| request.set_indices(indices))
    }

    fn delegate(&mut self) {
        self.delegated = true;
        self.apply();
    }
}

impl<S: HostSubRequest> std::fmt::Debug for SubRequestContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubRequestContext")
            .field("id", &self.rendered_id)
            .field("position", &self.position)
            .field("indices", self.indices.current())
            .field("delegated", &self.delegated)
            .finish()
    }
}

impl<R: HostRequest> RequestContext<R> {
    /// Runs `rewrite` over every sub-operation of a composite request.
    ///
    /// Each sub-operation is wrapped in a [`SubRequestContext`] and handed to
    /// `rewrite`, in order. [`SubRequestOutcome::Keep`] keeps it (adopting any
    /// rewritten indices), [`SubRequestOutcome::Drop`] removes it. The host's
    /// sub-operation list is then replaced with the kept ones, in their
    /// original relative order.
    ///
    /// Returns the number of sub-operations seen, before any removal. The
    /// request's own targets are then the union of the kept sub-operations'
    /// targets. A request that is not composite holds no sub-operation and
    /// scans nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOperation`] if the request does not involve indices
    /// - [`Error::SubRequestRewrite`] if `rewrite` fails. The scan stops
    ///   there; sub-operations already handled keep their outcome, the
    ///   failing one and the remaining ones stay in the host list unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use request_scope::catalog::{Catalog, StaticClusterMetadata};
    /// use request_scope::host::{HostRequest, RequestAdapter, SubRequestAdapter};
    /// use request_scope::{RequestInterceptor, SubRequestOutcome};
    ///
    /// let metadata = Arc::new(StaticClusterMetadata::new(Catalog::default()));
    /// let interceptor = RequestInterceptor::new(metadata);
    ///
    /// let request = RequestAdapter::composite(
    ///     "indices:data/read/msearch",
    ///     vec![
    ///         SubRequestAdapter::new("search", ["public"]),
    ///         SubRequestAdapter::new("search", ["secret"]),
    ///     ],
    /// );
    /// let mut ctx = interceptor.context_for(request, None);
    ///
    /// let seen = ctx
    ///     .scan_sub_requests(|sub| {
    ///         if sub.indices().contains("secret") {
    ///             Ok::<_, std::convert::Infallible>(SubRequestOutcome::Drop)
    ///         } else {
    ///             Ok(SubRequestOutcome::Keep(sub))
    ///         }
    ///     })
    ///     .unwrap();
    ///
    /// assert_eq!(seen, 2);
    /// assert_eq!(ctx.request().sub_requests().len(), 1);
    /// ```
    pub fn scan_sub_requests<F, E>(&mut self, mut rewrite: F) -> Result<usize>
    where
        F: FnMut(
            SubRequestContext<R::SubRequest>,
        ) -> std::result::Result<SubRequestOutcome<R::SubRequest>, E>,
        E: Into<RewriteError>,
    {
        self.ensure_scannable()?;
        let outcome = self.rewrite_sub_requests(&mut rewrite);
        self.sync_composite_indices();
        outcome
    }

    fn rewrite_sub_requests<F, E>(&mut self, rewrite: &mut F) -> Result<usize>
    where
        F: FnMut(
            SubRequestContext<R::SubRequest>,
        ) -> std::result::Result<SubRequestOutcome<R::SubRequest>, E>,
        E: Into<RewriteError>,
    {
        let resolution = self.resolution().clone();
        let default_options = self.default_options();
        let read_only = self.is_read_only();
        let action = self.action().to_string();
        let (request, kept_contexts, id, log) = self.scan_parts();

        let natives = request.sub_requests().to_vec();
        let total = natives.len();
        log.debug(format_args!("found {} subrequests", total));

        let mut kept: Vec<SubRequestContext<R::SubRequest>> = Vec::with_capacity(total);
        let mut pending = natives.into_iter().enumerate();

        while let Some((position, native)) = pending.next() {
            let sub = SubRequestContext::new(
                id.child(position),
                action.clone(),
                position,
                native.clone(),
                resolution.clone(),
                default_options,
                read_only,
            );
            let description = sub.description();

            match rewrite(sub) {
                Ok(SubRequestOutcome::Keep(mut sub)) => {
                    sub.delegate();
                    kept.push(sub);
                }
                Ok(SubRequestOutcome::Drop) => {
                    log.debug(format_args!("removing sub-request {}", description));
                }
                Err(e) => {
                    let source: RewriteError = e.into();
                    log.warn(format_args!(
                        "error gathering indices to be replaced in sub-request {}: {}",
                        description, source
                    ));

                    let mut restored: Vec<R::SubRequest> =
                        kept.iter().map(|s| s.request().clone()).collect();
                    restored.push(native);
                    restored.extend(pending.by_ref().map(|(_, n)| n));
                    request.set_sub_requests(restored);
                    *kept_contexts = kept;

                    return Err(Error::SubRequestRewrite {
                        sub_request: description,
                        source,
                    });
                }
            }
        }

        request.set_sub_requests(kept.iter().map(|s| s.request().clone()).collect());
        log.debug(format_args!("kept {} of {} subrequests", kept.len(), total));
        *kept_contexts = kept;

        Ok(total)
    }
}
