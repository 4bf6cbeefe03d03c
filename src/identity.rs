//! Service and instance identities derived from discovery output.
//!
//! A [`ServiceIdentity`] is the label-safe form of a discovered service name and
//! an [`InstanceIdentity`] is the reachable address of one running instance.
//! Both are immutable once built and are used as map keys by the baseline
//! tracker, so they derive `Hash`/`Eq` and are cheap to clone.

use std::fmt;
use std::sync::Arc;

/// Normalized name of a logical service.
///
/// Separator characters that are not stable in metric labels (`-`, `.`,
/// whitespace, ...) are replaced with `_`. The raw discovery name is kept
/// alongside because discovery backends must be queried with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceIdentity {
    name: Arc<str>,
    raw: Arc<str>,
}

impl ServiceIdentity {
    pub fn from_discovery(raw: &str) -> Self {
        Self {
            name: Arc::from(normalize_service_name(raw)),
            raw: Arc::from(raw),
        }
    }

    /// Label-safe name used in metric labels and the ignore set.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Name exactly as returned by the discovery backend.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Replaces every character outside `[A-Za-z0-9_:]` with `_`.
pub fn normalize_service_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Reachable address of one running service instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceIdentity {
    host: Arc<str>,
    port: u16,
    uri: Arc<str>,
}

impl InstanceIdentity {
    /// Builds an identity; an empty `uri` defaults to `http://host:port`.
    pub fn new(host: &str, port: u16, uri: &str) -> Self {
        let uri = if uri.trim().is_empty() {
            format!("http://{host}:{port}")
        } else {
            uri.trim().trim_end_matches('/').to_string()
        };
        Self {
            host: Arc::from(host),
            port,
            uri: Arc::from(uri),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// URL of the management agent, e.g. `http://10.0.0.4:8080/jolokia`.
    pub fn endpoint_url(&self, agent_path: &str) -> String {
        let path = agent_path.trim_matches('/');
        if path.is_empty() {
            self.uri.to_string()
        } else {
            format!("{}/{}", self.uri, path)
        }
    }
}

impl fmt::Display for InstanceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
