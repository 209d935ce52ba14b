//! Connection admission
//!
//! The hub does not authenticate anyone. During the WebSocket handshake the
//! server hands the upgrade request to an [`AdmissionHandler`], which either
//! attaches an identity or refuses the connection.

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::session::{Identity, Role};

/// What the admission layer can see of an upgrade request
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Request path
    pub path: String,

    /// Raw query string, if any
    pub query: Option<String>,

    /// Request headers, names lowercased
    pub headers: HashMap<String, String>,
}

impl AdmissionRequest {
    /// Create a request with no headers
    pub fn new(peer_addr: SocketAddr, path: impl Into<String>) -> Self {
        Self {
            peer_addr,
            path: path.into(),
            query: None,
            headers: HashMap::new(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// First value of a query parameter (no percent-decoding)
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .as_deref()?
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

/// Decides who may connect and as whom
pub trait AdmissionHandler: Send + Sync + 'static {
    /// Return the identity to attach, or `None` to refuse the connection
    fn admit(&self, request: &AdmissionRequest) -> Option<Identity>;
}

impl<F> AdmissionHandler for F
where
    F: Fn(&AdmissionRequest) -> Option<Identity> + Send + Sync + 'static,
{
    fn admit(&self, request: &AdmissionRequest) -> Option<Identity> {
        self(request)
    }
}

/// Trusts identity headers injected by an authenticating reverse proxy
///
/// Only suitable when the listener is reachable exclusively through that
/// proxy.
#[derive(Debug, Clone)]
pub struct TrustedHeaderAdmission {
    user_header: String,
    role_header: String,
}

impl Default for TrustedHeaderAdmission {
    fn default() -> Self {
        Self {
            user_header: "x-user-id".to_string(),
            role_header: "x-user-role".to_string(),
        }
    }
}

impl TrustedHeaderAdmission {
    /// Use custom header names
    pub fn new(user_header: &str, role_header: &str) -> Self {
        Self {
            user_header: user_header.to_ascii_lowercase(),
            role_header: role_header.to_ascii_lowercase(),
        }
    }
}

impl AdmissionHandler for TrustedHeaderAdmission {
    fn admit(&self, request: &AdmissionRequest) -> Option<Identity> {
        let user_id = request.header(&self.user_header)?.trim();
        if user_id.is_empty() {
            return None;
        }
        let role = match request.header(&self.role_header) {
            Some(role) => role.parse::<Role>().ok()?,
            None => Role::User,
        };
        Some(Identity::new(user_id, role))
    }
}
