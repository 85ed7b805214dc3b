//! Host request boundary.
//!
//! The host (the data store's request pipeline) exposes each intercepted
//! request through [`HostRequest`], and each sub-operation of a composite
//! request through [`HostSubRequest`]. This module contains no framework
//! code; it defines the facts the core reads and the few places it writes
//! back.
//!
//! [`RequestAdapter`] and [`SubRequestAdapter`] are owned, in-memory
//! implementations for hosts that copy request facts out of their own types,
//! and for tests.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv4Addr, SocketAddr};

use crate::options::IndicesOptions;

/// One native sub-operation embedded in a composite request.
///
/// Handles are cloned before being handed to a rewrite callback so a failing
/// callback can never lose the sub-operation.
pub trait HostSubRequest: Clone {
    /// Short human readable description for diagnostics.
    fn description(&self) -> String;

    /// Index expressions the sub-operation declares.
    fn indices(&self) -> BTreeSet<String>;

    /// Replaces the index expressions of the sub-operation.
    fn set_indices(&mut self, indices: &BTreeSet<String>);

    /// Expansion options declared by the sub-operation's native type, if any.
    fn indices_options(&self) -> Option<IndicesOptions> {
        None
    }
}

/// Facts about an incoming request, as provided by the host.
pub trait HostRequest {
    /// Native sub-operation type of composite requests.
    type SubRequest: HostSubRequest;

    /// Action name, e.g. `indices:data/read/search`.
    fn action(&self) -> &str;

    /// Raw HTTP verb.
    fn method(&self) -> &str;

    /// Request URI.
    fn uri(&self) -> &str;

    /// Address of the remote peer.
    fn remote_address(&self) -> SocketAddr;

    /// Raw body, `None` when the request has no body.
    fn content(&self) -> Option<Cow<'_, [u8]>>;

    /// Header name/value pairs as received.
    fn headers(&self) -> Vec<(String, String)>;

    /// Name of the native request type.
    fn type_name(&self) -> &str;

    /// Whether the native request type carries indices.
    fn involves_indices(&self) -> bool;

    /// Whether the native request type bundles several operations.
    fn is_composite(&self) -> bool;

    /// Index expressions the request declares.
    fn indices(&self) -> BTreeSet<String>;

    /// Replaces the index expressions of the request.
    fn set_indices(&mut self, indices: &BTreeSet<String>);

    /// Expansion options declared by the native request type, if any.
    fn indices_options(&self) -> Option<IndicesOptions> {
        None
    }

    /// Embedded sub-operations, in order. Empty for non-composite requests.
    fn sub_requests(&self) -> &[Self::SubRequest] {
        &[]
    }

    /// Replaces the embedded sub-operations.
    fn set_sub_requests(&mut self, _sub_requests: Vec<Self::SubRequest>) {}

    /// Applies response headers. Hosts unable to inject response headers
    /// keep the default no-op.
    fn commit_response_headers(&mut self, _headers: &BTreeMap<String, String>) {}
}

/// In-memory sub-operation.
///
/// # Examples
///
/// ```
/// use request_scope::host::{HostSubRequest, SubRequestAdapter};
///
/// let mut sub = SubRequestAdapter::new("search", ["logs-*"]);
/// assert_eq!(sub.indices().len(), 1);
///
/// sub.set_indices(&["logs-2024".to_string()].into());
/// assert!(sub.indices().contains("logs-2024"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRequestAdapter {
    kind: String,
    indices: BTreeSet<String>,
    options: Option<IndicesOptions>,
}

impl SubRequestAdapter {
    /// Creates a sub-operation of the given kind targeting `indices`.
    pub fn new<I, S>(kind: impl Into<String>, indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: kind.into(),
            indices: indices.into_iter().map(Into::into).collect(),
            options: None,
        }
    }

    /// Declares expansion options for this sub-operation.
    pub fn with_options(mut self, options: IndicesOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Kind of the sub-operation (e.g. `search`, `index`).
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl HostSubRequest for SubRequestAdapter {
    fn description(&self) -> String {
        let indices: Vec<&str> = self.indices.iter().map(String::as_str).collect();
        format!("{}[{}]", self.kind, indices.join(","))
    }

    fn indices(&self) -> BTreeSet<String> {
        self.indices.clone()
    }

    fn set_indices(&mut self, indices: &BTreeSet<String>) {
        self.indices = indices.clone();
    }

    fn indices_options(&self) -> Option<IndicesOptions> {
        self.options
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Plain,
    Indices,
    Composite,
}

/// In-memory host request built from owned data.
///
/// # Examples
///
/// ```
/// use request_scope::host::{HostRequest, RequestAdapter, SubRequestAdapter};
///
/// let mut request = RequestAdapter::composite(
///     "indices:data/read/msearch",
///     vec![
///         SubRequestAdapter::new("search", ["a"]),
///         SubRequestAdapter::new("search", ["b"]),
///     ],
/// );
/// request.set_method("POST");
/// request.add_header("Content-Type", "application/x-ndjson");
///
/// assert!(request.is_composite());
/// assert_eq!(request.indices().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RequestAdapter {
    action: String,
    method: String,
    uri: String,
    remote_address: SocketAddr,
    content: Option<Vec<u8>>,
    headers: Vec<(String, String)>,
    type_name: String,
    shape: Shape,
    indices: BTreeSet<String>,
    options: Option<IndicesOptions>,
    sub_requests: Vec<SubRequestAdapter>,
    response_headers: BTreeMap<String, String>,
}

impl RequestAdapter {
    /// Creates a request that carries no indices (e.g. a cluster-level action).
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            method: "GET".to_string(),
            uri: "/".to_string(),
            remote_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            content: None,
            headers: Vec::new(),
            type_name: "ActionRequest".to_string(),
            shape: Shape::Plain,
            indices: BTreeSet::new(),
            options: None,
            sub_requests: Vec::new(),
            response_headers: BTreeMap::new(),
        }
    }

    /// Creates a request targeting the given index expressions.
    pub fn indices_request<I, S>(action: impl Into<String>, indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut request = Self::new(action);
        request.shape = Shape::Indices;
        request.type_name = "IndicesRequest".to_string();
        request.indices = indices.into_iter().map(Into::into).collect();
        request
    }

    /// Creates a composite request bundling `sub_requests`.
    pub fn composite(action: impl Into<String>, sub_requests: Vec<SubRequestAdapter>) -> Self {
        let mut request = Self::new(action);
        request.shape = Shape::Composite;
        request.type_name = "CompositeIndicesRequest".to_string();
        request.sub_requests = sub_requests;
        request
    }

    /// Sets the raw HTTP verb.
    pub fn set_method(&mut self, method: impl Into<String>) {
        self.method = method.into();
    }

    /// Sets the request URI.
    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    /// Sets the remote peer address.
    pub fn set_remote_address(&mut self, addr: SocketAddr) {
        self.remote_address = addr;
    }

    /// Sets the raw request body.
    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) {
        self.content = Some(content.into());
    }

    /// Adds a header.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Overrides the native type name.
    pub fn set_type_name(&mut self, type_name: impl Into<String>) {
        self.type_name = type_name.into();
    }

    /// Declares expansion options for the request.
    pub fn set_indices_options(&mut self, options: IndicesOptions) {
        self.options = Some(options);
    }

    /// Response headers committed by the core so far.
    pub fn response_headers(&self) -> &BTreeMap<String, String> {
        &self.response_headers
    }
}

impl HostRequest for RequestAdapter {
    type SubRequest = SubRequestAdapter;

    fn action(&self) -> &str {
        &self.action
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn remote_address(&self) -> SocketAddr {
        self.remote_address
    }

    fn content(&self) -> Option<Cow<'_, [u8]>> {
        self.content.as_deref().map(Cow::Borrowed)
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn involves_indices(&self) -> bool {
        self.shape != Shape::Plain
    }

    fn is_composite(&self) -> bool {
        self.shape == Shape::Composite
    }

    /// For composite requests, the union of the sub-operations' indices.
    fn indices(&self) -> BTreeSet<String> {
        match self.shape {
            Shape::Composite => self
                .sub_requests
                .iter()
                .flat_map(|sub| sub.indices.iter().cloned())
                .collect(),
            _ => self.indices.clone(),
        }
    }

    /// Composite requests keep their targets in their sub-operations; use a
    /// sub-request scan to rewrite them.
    fn set_indices(&mut self, indices: &BTreeSet<String>) {
        if self.shape != Shape::Composite {
            self.indices = indices.clone();
        }
    }

    fn indices_options(&self) -> Option<IndicesOptions> {
        self.options
    }

    fn sub_requests(&self) -> &[SubRequestAdapter] {
        &self.sub_requests
    }

    fn set_sub_requests(&mut self, sub_requests: Vec<SubRequestAdapter>) {
        self.sub_requests = sub_requests;
    }

    fn commit_response_headers(&mut self, headers: &BTreeMap<String, String>) {
        self.response_headers = headers.clone();
    }
}
