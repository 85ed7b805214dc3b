//! Request identity and remote address descriptors.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use uuid::Uuid;

/// Canonical form of any loopback remote address.
pub const LOCALHOST: &str = "localhost";

/// Diagnostic identity of an intercepted request.
///
/// Rendered as `<request>-<payload>` with an optional `#<correlation id>`
/// suffix. The request part is generated per context, the payload part is a
/// short digest of the action and the native payload. It is only meant for logs and
/// must never be used for equality or persistence.
#[derive(Debug, Clone)]
pub struct ContextId {
    request: String,
    payload: String,
    correlation_id: Option<String>,
}

impl ContextId {
    /// Generates an identity for a request carrying `action` and `payload`.
    pub fn generate(action: &str, payload: &[u8], correlation_id: Option<String>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(action.as_bytes());
        hasher.update(payload);
        let digest = hasher.finalize().to_hex();
        let digest = digest.as_str();

        let request = Uuid::new_v4().simple().to_string();
        Self {
            request: request[..12].to_string(),
            payload: digest[..12].to_string(),
            correlation_id,
        }
    }

    /// Derives the identity of a sub-request from its parent.
    pub(crate) fn child(&self, position: usize) -> Self {
        Self {
            request: format!("{}.{}", self.request, position),
            payload: self.payload.clone(),
            correlation_id: self.correlation_id.clone(),
        }
    }

    /// The correlation id attached by the host, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.request, self.payload)?;
        if let Some(correlation_id) = &self.correlation_id {
            write!(f, "#{}", correlation_id)?;
        }
        Ok(())
    }
}

/// Returns `true` for IPv4/IPv6 loopback, including IPv4-mapped IPv6 forms.
pub fn is_loopback(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
        }
    }
}

/// Renders the remote host of `addr`, collapsing loopback forms into
/// [`LOCALHOST`].
pub fn normalize_remote_address(addr: &SocketAddr) -> String {
    let ip = addr.ip();
    if is_loopback(&ip) {
        LOCALHOST.to_string()
    } else {
        ip.to_string()
    }
}
