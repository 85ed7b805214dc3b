use std::sync::Arc;

use crate::actions::{ActionTable, ReadActionTable};
use crate::catalog::ClusterMetadata;
use crate::config::InterceptorConfig;
use crate::context::RequestContext;
use crate::host::HostRequest;
use crate::indices::Resolution;
use crate::options::IndicesOptions;
use crate::resolver::{IndexResolver, WildcardResolver};

/// Long-lived entry point creating one [`RequestContext`] per request.
///
/// Holds the collaborators shared by every request: cluster metadata, the
/// index resolver, and the read-action table. Cheap to share across threads;
/// the contexts it creates are not.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use request_scope::catalog::{Catalog, StaticClusterMetadata};
/// use request_scope::host::RequestAdapter;
/// use request_scope::{InterceptorConfig, RequestInterceptor, WildcardResolver};
///
/// let metadata = Arc::new(StaticClusterMetadata::new(Catalog::builder().index("orders").build()));
///
/// let interceptor = RequestInterceptor::builder(metadata)
///     .resolver(WildcardResolver)
///     .config(InterceptorConfig::default())
///     .build();
///
/// let ctx = interceptor.context_for(
///     RequestAdapter::indices_request("indices:data/write/index", ["orders"]),
///     Some("task-7".to_string()),
/// );
///
/// assert!(!ctx.is_read_only());
/// assert!(ctx.id().ends_with("#task-7"));
/// ```
#[derive(Clone)]
pub struct RequestInterceptor {
    resolution: Resolution,
    actions: Arc<dyn ActionTable>,
    default_options: IndicesOptions,
}

impl RequestInterceptor {
    /// Creates an interceptor with the default resolver and configuration.
    pub fn new(metadata: Arc<dyn ClusterMetadata>) -> Self {
        Self::builder(metadata).build()
    }

    /// Starts building an interceptor around `metadata`.
    pub fn builder(metadata: Arc<dyn ClusterMetadata>) -> InterceptorBuilder {
        InterceptorBuilder {
            metadata,
            resolver: None,
            actions: None,
            config: InterceptorConfig::default(),
        }
    }

    /// Builds the context for one incoming request.
    ///
    /// `correlation_id` is an optional host-assigned id (e.g. a task id)
    /// appended to the context id for tracing.
    pub fn context_for<R: HostRequest>(
        &self,
        request: R,
        correlation_id: Option<String>,
    ) -> RequestContext<R> {
        let read_only = self.actions.is_read(request.action());
        let ctx = RequestContext::new(
            request,
            correlation_id,
            read_only,
            self.resolution.clone(),
            self.default_options,
        );
        ctx.log().debug(format_args!(
            "intercepted {} (indices: {}, composite: {}, read only: {})",
            ctx.type_name(),
            ctx.involves_indices(),
            ctx.is_composite(),
            ctx.is_read_only()
        ));
        ctx
    }

    /// Whether `action` is classified as read-only.
    pub fn is_read(&self, action: &str) -> bool {
        self.actions.is_read(action)
    }

    /// Options used for requests that declare none.
    pub fn default_options(&self) -> IndicesOptions {
        self.default_options
    }
}

impl std::fmt::Debug for RequestInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestInterceptor")
            .field("default_options", &self.default_options)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestInterceptor`].
pub struct InterceptorBuilder {
    metadata: Arc<dyn ClusterMetadata>,
    resolver: Option<Arc<dyn IndexResolver>>,
    actions: Option<Arc<dyn ActionTable>>,
    config: InterceptorConfig,
}

impl InterceptorBuilder {
    /// Uses a custom index resolver instead of [`WildcardResolver`].
    pub fn resolver(mut self, resolver: impl IndexResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Uses a custom action table instead of the configured read patterns.
    pub fn action_table(mut self, actions: impl ActionTable + 'static) -> Self {
        self.actions = Some(Arc::new(actions));
        self
    }

    /// Applies a configuration.
    pub fn config(mut self, config: InterceptorConfig) -> Self {
        self.config = config;
        self
    }

    /// Finishes the interceptor.
    ///
    /// Without an explicit action table, one is built from
    /// [`InterceptorConfig::read_actions`].
    pub fn build(self) -> RequestInterceptor {
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(WildcardResolver));
        let config = self.config;
        let actions = self
            .actions
            .unwrap_or_else(|| Arc::new(ReadActionTable::new(config.read_actions)));

        RequestInterceptor {
            resolution: Resolution {
                metadata: self.metadata,
                resolver,
            },
            actions,
            default_options: config.default_indices_options,
        }
    }
}
