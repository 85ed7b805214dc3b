use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::host::{HostRequest, HostSubRequest};
use crate::http::{Headers, HttpMethod};
use crate::indices::{self, Resolution, TargetIndices};
use crate::logging::ContextLog;
use crate::options::IndicesOptions;
use crate::request::{self, ContextId};
use crate::sub_request::SubRequestContext;
use crate::transactional::TransactionalField;

/// Per-request view the policy engine inspects and rewrites.
///
/// A `RequestContext` is built once per intercepted request by
/// [`RequestInterceptor::context_for`](crate::RequestInterceptor::context_for).
/// It classifies the request, passes host descriptors through, and owns the
/// transactional target indices the policy engine may rewrite.
///
/// Classification is fixed at construction:
/// - `involves_indices`: the native request carries indices; every index
///   accessor fails with [`Error::InvalidOperation`] otherwise
/// - `is_composite`: the native request bundles sub-operations
/// - `is_read_only`: the action is in the read-action table
///
/// Rewrites stay inside the context until [`commit`](Self::commit) pushes
/// them into the host request.
///
/// Not designed for concurrent access; a context lives on the thread that
/// processes its request.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use std::sync::Arc;
///
/// use request_scope::catalog::{Catalog, StaticClusterMetadata};
/// use request_scope::host::RequestAdapter;
/// use request_scope::RequestInterceptor;
///
/// let catalog = Catalog::builder().index("logs-2023").index("logs-2024").build();
/// let interceptor = RequestInterceptor::new(Arc::new(StaticClusterMetadata::new(catalog)));
///
/// let request = RequestAdapter::indices_request("indices:data/read/search", ["logs"]);
/// let mut ctx = interceptor.context_for(request, None);
///
/// ctx.set_indices(BTreeSet::from(["logs-*".to_string()])).unwrap();
/// assert_eq!(ctx.indices().unwrap().len(), 2);
/// ```
pub struct RequestContext<R: HostRequest> {
    id: ContextId,
    rendered_id: String,
    action: String,
    request: R,
    involves_indices: bool,
    composite: bool,
    read_only: bool,
    headers: Headers,
    content: OnceCell<String>,
    content_length: OnceCell<usize>,
    indices: TargetIndices,
    response_headers: TransactionalField<BTreeMap<String, String>>,
    sub_requests: Vec<SubRequestContext<R::SubRequest>>,
    resolution: Resolution,
    default_options: IndicesOptions,
}

impl<R: HostRequest> RequestContext<R> {
    pub(crate) fn new(
        request: R,
        correlation_id: Option<String>,
        read_only: bool,
        resolution: Resolution,
        default_options: IndicesOptions,
    ) -> Self {
        let involves_indices = request.involves_indices();
        let composite = request.is_composite();
        let action = request.action().to_string();

        let initial = if involves_indices {
            request.indices()
        } else {
            BTreeSet::new()
        };
        let payload = format!("{}|{}", request.type_name(), indices::join(&initial));
        let id = ContextId::generate(&action, payload.as_bytes(), correlation_id);

        let mut headers = Headers::new();
        for (name, value) in request.headers() {
            headers.insert(name, value);
        }

        let options = request.indices_options().unwrap_or(default_options);

        Self {
            rendered_id: id.to_string(),
            id,
            action,
            involves_indices,
            composite,
            read_only,
            headers,
            content: OnceCell::new(),
            content_length: OnceCell::new(),
            indices: TargetIndices::new(initial, read_only, options),
            response_headers: TransactionalField::new("response_headers", BTreeMap::new()),
            sub_requests: Vec::new(),
            resolution,
            default_options,
            request,
        }
    }

    // ------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------

    /// Whether the request carries indices.
    pub fn involves_indices(&self) -> bool {
        self.involves_indices
    }

    /// Whether the request bundles several native operations.
    pub fn is_composite(&self) -> bool {
        self.composite
    }

    /// Whether the request only reads.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    // ------------------------------------------------------------------
    // Descriptors
    // ------------------------------------------------------------------

    /// Diagnostic identity, `<request>-<payload>[#<correlation id>]`.
    pub fn id(&self) -> &str {
        &self.rendered_id
    }

    /// Correlation id attached by the host, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        self.id.correlation_id()
    }

    /// Action name.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Name of the native request type.
    pub fn type_name(&self) -> &str {
        self.request.type_name()
    }

    /// Request URI.
    pub fn uri(&self) -> &str {
        self.request.uri()
    }

    /// HTTP method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`] for verbs outside
    /// GET/POST/PUT/DELETE/OPTIONS/HEAD.
    pub fn method(&self) -> Result<HttpMethod> {
        self.request.method().parse()
    }

    /// Remote host, with every loopback form rendered as `localhost`.
    pub fn remote_address(&self) -> String {
        request::normalize_remote_address(&self.request.remote_address())
    }

    /// Request body as text; empty if absent or not valid UTF-8.
    pub fn content(&self) -> &str {
        self.content.get_or_init(|| match self.request.content() {
            Some(bytes) => String::from_utf8(bytes.into_owned()).unwrap_or_default(),
            None => String::new(),
        })
    }

    /// Body length in bytes; 0 if there is no body.
    pub fn content_length(&self) -> usize {
        *self
            .content_length
            .get_or_init(|| self.request.content().map_or(0, |bytes| bytes.len()))
    }

    /// Request headers, case-insensitive and ordered by name.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Identifier of the current cluster state.
    pub fn cluster_uuid(&self) -> String {
        self.resolution.metadata.cluster_uuid()
    }

    /// Identifier of the local node.
    pub fn local_node_id(&self) -> String {
        self.resolution.metadata.local_node_id()
    }

    /// Every index and alias name currently known.
    pub fn all_indices_and_aliases(&self) -> BTreeSet<String> {
        self.resolution.metadata.snapshot().all_indices_and_aliases()
    }

    /// Uuids of the concrete indices `name` denotes; empty if unknown.
    pub fn index_metadata(&self, name: &str) -> BTreeSet<String> {
        self.resolution.metadata.snapshot().index_uuids(name)
    }

    /// The host request.
    pub fn request(&self) -> &R {
        &self.request
    }

    /// Gives the host request back, dropping uncommitted rewrites.
    pub fn into_request(self) -> R {
        self.request
    }

    /// Logger stamping this context's id on every event.
    pub fn log(&self) -> ContextLog<'_> {
        ContextLog::new(&self.rendered_id, &self.action)
    }

    // ------------------------------------------------------------------
    // Target indices
    // ------------------------------------------------------------------

    fn ensure_indices(&self, what: &str) -> Result<()> {
        if self.involves_indices {
            Ok(())
        } else {
            Err(Error::InvalidOperation(format!(
                "cannot {} of a request that doesn't involve indices: {}",
                what, self.rendered_id
            )))
        }
    }

    /// Current target indices.
    ///
    /// For composite requests this is the union of the targets of the
    /// sub-operations the request still holds, refreshed by every scan and
    /// commit.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOperation`] if the request does not involve indices.
    pub fn indices(&self) -> Result<&BTreeSet<String>> {
        self.ensure_indices("get indices")?;
        Ok(self.indices.current())
    }

    /// Target indices as declared by the host, before any rewrite.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOperation`] if the request does not involve indices.
    pub fn initial_indices(&self) -> Result<&BTreeSet<String>> {
        self.ensure_indices("get indices")?;
        Ok(self.indices.initial())
    }

    /// Expansion options in effect for this request.
    pub fn indices_options(&self) -> &IndicesOptions {
        self.indices.options()
    }

    /// Resolves `expressions` (default: the current indices) into concrete
    /// index names. Never mutates the context.
    ///
    /// Resolution is best effort: when nothing matches, or the resolver
    /// fails, the result is empty rather than an error.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOperation`] if the request does not involve indices.
    pub fn expanded_indices(
        &self,
        expressions: Option<&BTreeSet<String>>,
    ) -> Result<BTreeSet<String>> {
        self.ensure_indices("get expanded indices")?;
        Ok(self.indices.expand(&self.resolution, self.log(), expressions))
    }

    /// Rewrites the target indices.
    ///
    /// Composite requests keep their targets in their sub-operations and
    /// are rewritten through [`scan_sub_requests`](Self::scan_sub_requests).
    ///
    /// - an unchanged set is a no-op
    /// - read requests store the expansion of `new`, or `new` itself when it
    ///   expands to nothing (the index may simply not exist yet)
    /// - write requests store `new` verbatim
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOperation`] if the request does not involve indices
    ///   or is composite
    /// - [`Error::EmptyIndexSet`] if `new` is empty on a write request, since
    ///   no index means full access downstream
    /// - [`Error::AmbiguousEmptySet`] if `new` is empty on a read request
    pub fn set_indices(&mut self, new: BTreeSet<String>) -> Result<()> {
        self.ensure_indices("set indices")?;
        if self.composite {
            return Err(Error::InvalidOperation(format!(
                "cannot set indices of a composite request, rewrite its sub-requests instead: {}",
                self.rendered_id
            )));
        }
        let log = ContextLog::new(&self.rendered_id, &self.action);
        self.indices.set(&self.resolution, log, new)
    }

    // ------------------------------------------------------------------
    // Response headers and commit
    // ------------------------------------------------------------------

    /// Queues a response header, applied on [`commit`](Self::commit).
    pub fn set_response_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let mut headers = self.response_headers.get().clone();
        headers.insert(name.into(), value.into());
        self.response_headers.mutate(headers);
    }

    /// Response headers queued so far.
    pub fn response_headers(&self) -> &BTreeMap<String, String> {
        self.response_headers.get()
    }

    /// Pushes pending rewrites into the host request.
    ///
    /// Changed target indices go to [`HostRequest::set_indices`], changed
    /// sub-request targets are written into their native sub-operations in
    /// place, and queued response headers go to the host's response-header
    /// hook. Committing twice without new rewrites does nothing.
    pub fn commit(&mut self) {
        let log = ContextLog::new(&self.rendered_id, &self.action);
        let request = &mut self.request;

        if self.involves_indices && !self.composite {
            let pushed = self
                .indices
                .field_mut()
                .commit(|indices| request.set_indices(indices));
            if pushed {
                log.debug(format_args!(
                    "committed indices [{}]",
                    indices::join(self.indices.current())
                ));
            }
        }

        // Kept sub-requests occupy the leading slots of the host list, in
        // order; restored ones after a failed scan follow them untouched.
        let mut natives = request.sub_requests().to_vec();
        let mut changed = 0;
        for (slot, sub) in self.sub_requests.iter_mut().enumerate() {
            if sub.apply() {
                if let Some(native) = natives.get_mut(slot) {
                    *native = sub.request().clone();
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            request.set_sub_requests(natives);
            log.debug(format_args!("committed {} sub-requests", changed));
        }

        self.response_headers
            .commit(|headers| request.commit_response_headers(headers));

        if changed > 0 {
            self.sync_composite_indices();
        }
    }

    // ------------------------------------------------------------------
    // Sub-requests
    // ------------------------------------------------------------------

    /// Whether the host request embeds any sub-operation.
    pub fn has_sub_requests(&self) -> bool {
        !self.request.sub_requests().is_empty()
    }

    /// Sub-request contexts kept by the last [`scan_sub_requests`](Self::scan_sub_requests).
    pub fn sub_requests(&self) -> &[SubRequestContext<R::SubRequest>] {
        &self.sub_requests
    }

    /// Mutable access to the kept sub-request contexts; their rewrites are
    /// applied on the next [`commit`](Self::commit).
    pub fn sub_requests_mut(&mut self) -> &mut [SubRequestContext<R::SubRequest>] {
        &mut self.sub_requests
    }

    pub(crate) fn scan_parts(
        &mut self,
    ) -> (
        &mut R,
        &mut Vec<SubRequestContext<R::SubRequest>>,
        &ContextId,
        ContextLog<'_>,
    ) {
        (
            &mut self.request,
            &mut self.sub_requests,
            &self.id,
            ContextLog::new(&self.rendered_id, &self.action),
        )
    }

    pub(crate) fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub(crate) fn default_options(&self) -> IndicesOptions {
        self.default_options
    }

    pub(crate) fn ensure_scannable(&self) -> Result<()> {
        if self.involves_indices {
            Ok(())
        } else {
            Err(Error::InvalidOperation(format!(
                "cannot replace indices of sub-requests of a request that doesn't involve indices: {}",
                self.rendered_id
            )))
        }
    }

    /// Realigns the targets of a composite request with the sub-operations
    /// the host currently holds.
    pub(crate) fn sync_composite_indices(&mut self) {
        if !self.composite {
            return;
        }
        let current: BTreeSet<String> = self
            .request
            .sub_requests()
            .iter()
            .flat_map(|sub| sub.indices())
            .collect();
        if &current != self.indices.current() {
            self.indices.field_mut().mutate(current);
        }
    }
}

impl<R: HostRequest> std::fmt::Debug for RequestContext<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.rendered_id)
            .field("action", &self.action)
            .field("involves_indices", &self.involves_indices)
            .field("composite", &self.composite)
            .field("read_only", &self.read_only)
            .field("indices", self.indices.current())
            .field("sub_requests", &self.sub_requests.len())
            .finish()
    }
}
