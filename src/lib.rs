//! Request interception layer for index-level access control.
//!
//! A multi-tenant data store hands every incoming request to this crate
//! before executing it. The crate wraps the request in a [`RequestContext`]
//! that a policy engine can inspect and rewrite:
//! - **Classification**: whether the request carries indices, bundles
//!   sub-operations, or only reads
//! - **Descriptors**: id, action, method, URI, remote address, headers, body
//! - **Transactional targets**: index rewrites stay inside the context until
//!   [`RequestContext::commit`] pushes them into the host request
//! - **Sub-requests**: composite requests are rewritten one sub-operation at
//!   a time with [`RequestContext::scan_sub_requests`]
//!
//! # Core Types
//!
//! - [`RequestInterceptor`]: long-lived entry point holding cluster metadata,
//!   the index resolver and the read-action table
//! - [`RequestContext`]: per-request view
//! - [`SubRequestContext`]: per-sub-operation view of a composite request
//! - [`TransactionalField`]: value with initial/current state and a commit step
//! - [`host::HostRequest`]: the boundary the host implements
//!
//! # Examples
//!
//! ```
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//!
//! use request_scope::catalog::{Catalog, StaticClusterMetadata};
//! use request_scope::host::{HostRequest, RequestAdapter};
//! use request_scope::{Error, RequestInterceptor};
//!
//! let catalog = Catalog::builder()
//!     .index("tenant-a-logs")
//!     .index("tenant-b-logs")
//!     .build();
//! let interceptor = RequestInterceptor::new(Arc::new(StaticClusterMetadata::new(catalog)));
//!
//! let request = RequestAdapter::indices_request("indices:data/read/search", ["*"]);
//! let mut ctx = interceptor.context_for(request, None);
//!
//! // Narrow a read to the caller's tenant
//! ctx.set_indices(BTreeSet::from(["tenant-a-*".to_string()])).unwrap();
//!
//! // An empty target set would mean "everything" downstream
//! assert!(matches!(
//!     ctx.set_indices(BTreeSet::new()),
//!     Err(Error::AmbiguousEmptySet { .. })
//! ));
//!
//! ctx.commit();
//! let request = ctx.into_request();
//! assert_eq!(request.indices(), BTreeSet::from(["tenant-a-logs".to_string()]));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod actions;
pub mod catalog;
mod config;
mod context;
mod error;
pub mod host;
mod http;
mod indices;
mod interceptor;
mod logging;
mod options;
mod pattern;
mod request;
mod resolver;
mod sub_request;
mod transactional;

pub use actions::{ActionTable, DEFAULT_READ_ACTIONS, ReadActionTable};
pub use config::InterceptorConfig;
pub use context::RequestContext;
pub use error::{Error, ResolveError, Result, RewriteError};
pub use http::{Headers, HttpMethod};
pub use interceptor::{InterceptorBuilder, RequestInterceptor};
pub use logging::ContextLog;
pub use options::IndicesOptions;
pub use request::{ContextId, LOCALHOST, is_loopback, normalize_remote_address};
pub use resolver::{IndexResolver, WildcardResolver};
pub use sub_request::{SubRequestContext, SubRequestOutcome};
pub use transactional::TransactionalField;
