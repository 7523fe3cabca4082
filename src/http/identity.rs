//! Client identity extraction for rate limiting.

use axum::http::HeaderMap;

use crate::ratelimit::Tier;

/// Proxy headers consulted for the client address, in order of preference.
const CLIENT_IP_HEADERS: [&str; 3] = ["x-forwarded-for", "cf-connecting-ip", "x-real-ip"];

/// Address used when no proxy header carries one.
pub const ANONYMOUS: &str = "anonymous";

/// Who a request is counted against.
///
/// The identifier is the client address, optionally scoped to a workspace
/// taken from the request route. Workspace-scoped traffic gets its own
/// window and the workspace quota tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity {
    /// Client address, or [`ANONYMOUS`]
    pub ip: String,
    /// Workspace id from the route, if any
    pub workspace: Option<String>,
}

impl ClientIdentity {
    /// Build an identity from request headers and the request path.
    pub fn from_request(headers: &HeaderMap, path: &str) -> Self {
        Self {
            ip: client_ip(headers),
            workspace: workspace_from_path(path).map(str::to_string),
        }
    }

    /// The rate limit identifier: `<ip>` or `<ip>:workspace:<id>`.
    pub fn identifier(&self) -> String {
        match &self.workspace {
            Some(workspace) => format!("{}:workspace:{}", self.ip, workspace),
            None => self.ip.clone(),
        }
    }

    /// The quota tier this identity falls into.
    pub fn tier(&self) -> Tier {
        if self.workspace.is_some() {
            Tier::Workspace
        } else {
            Tier::Anonymous
        }
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Extract the client address from proxy headers.
///
/// `X-Forwarded-For` may list a chain of proxies; the first entry is the
/// client.
pub fn client_ip(headers: &HeaderMap) -> String {
    CLIENT_IP_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(',').next())
        .map(str::trim)
        .find(|ip| !ip.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string()
}

/// Find the workspace id in a route such as `/api/v1/workspaces/<id>/posts`.
pub fn workspace_from_path(path: &str) -> Option<&str> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    while let Some(segment) = segments.next() {
        if segment == "workspaces" {
            return segments.next();
        }
    }
    None
}
