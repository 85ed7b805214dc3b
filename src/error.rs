//! Errors surfaced by request contexts and index resolvers.

use thiserror::Error;

/// Boxed error raised by a caller-supplied sub-request rewrite callback.
pub type RewriteError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for request-context operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal contract violations surfaced by a request context.
///
/// These indicate caller misuse or a policy bug and are never masked.
/// Resolution problems are reported separately through [`ResolveError`]
/// and never escape a context.
#[derive(Debug, Error)]
pub enum Error {
    /// An index accessor was called on a request that does not carry indices,
    /// or the targets of a composite request were set directly.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A write request was rewritten to target no index at all.
    ///
    /// Downstream, no index means full access, so this is always refused.
    #[error(
        "Attempted to set indices from [{from}] to empty set. \
         Specifying no index is the same as full access, therefore this request is forbidden"
    )]
    EmptyIndexSet {
        /// Comma separated indices the request targeted before the rewrite
        from: String,
    },

    /// A read request was rewritten to target no index at all.
    #[error(
        "Attempted to set indices from [{from}] to empty set, \
         probably the request matched no index or was rewritten to nonexistent indices"
    )]
    AmbiguousEmptySet {
        /// Comma separated indices the request targeted before the rewrite
        from: String,
    },

    /// The host reported a verb outside the supported set.
    #[error("Unknown/unsupported http method: {0}")]
    UnsupportedMethod(String),

    /// The rewrite callback failed while scanning sub-requests.
    #[error("Security evaluation failed while rewriting indices of sub-request {sub_request}")]
    SubRequestRewrite {
        /// Description of the sub-request being rewritten
        sub_request: String,
        /// The callback failure
        #[source]
        source: RewriteError,
    },
}

impl Error {
    /// Returns `true` if this is a security-evaluation failure raised during
    /// a sub-request scan.
    pub fn is_security_failure(&self) -> bool {
        matches!(self, Error::SubRequestRewrite { .. })
    }
}

/// Failures reported by an index resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No known index matched the given expressions.
    #[error("no such index [{0}]")]
    NotFound(String),

    /// An explicitly named index is closed and the options forbid closed indices.
    #[error("index [{0}] is closed")]
    IndexClosed(String),
}
