//! Service discovery backends.
//!
//! A backend answers two questions: which services exist, and which instances
//! of a given service are currently running. Three backends are provided:
//!
//! - [`StaticDiscovery`]: fixed topology from the configuration file
//! - [`ConsulDiscovery`]: Consul catalog and health API
//! - [`EurekaDiscovery`]: Eureka REST API (JSON)
//!
//! Failures are returned to the caller unchanged; backends never retry.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::error::{ExporterError, Result};
use crate::identity::InstanceIdentity;

/// One running instance as reported by a discovery backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredInstance {
    pub host: String,
    pub port: u16,
    /// Base URL of the instance. Empty means `http://host:port`.
    #[serde(default)]
    pub uri: String,
}

impl DiscoveredInstance {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            uri: String::new(),
        }
    }

    pub fn identity(&self) -> InstanceIdentity {
        InstanceIdentity::new(&self.host, self.port, &self.uri)
    }
}

/// Source of the current fleet topology.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Short backend name used in logs and errors.
    fn backend(&self) -> &'static str;

    async fn list_service_names(&self) -> Result<Vec<String>>;

    async fn list_instances(&self, service: &str) -> Result<Vec<DiscoveredInstance>>;
}

// ========== Static ==========

/// Topology fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    services: BTreeMap<String, Vec<DiscoveredInstance>>,
}

impl StaticDiscovery {
    pub fn new(services: BTreeMap<String, Vec<DiscoveredInstance>>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    fn backend(&self) -> &'static str {
        "static"
    }

    async fn list_service_names(&self) -> Result<Vec<String>> {
        Ok(self.services.keys().cloned().collect())
    }

    async fn list_instances(&self, service: &str) -> Result<Vec<DiscoveredInstance>> {
        Ok(self.services.get(service).cloned().unwrap_or_default())
    }
}

// ========== Shared HTTP helpers ==========

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ExporterError::Client)
}

/// Appends path segments to `base`, percent-encoding each segment.
fn endpoint(backend: &str, base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| ExporterError::discovery(backend, format!("invalid base URL '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ExporterError::discovery(backend, format!("base URL '{base}' cannot hold a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// GETs `url` as JSON. `Ok(None)` is returned for 404.
async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: Url) -> Result<Option<T>> {
    let url_str = url.to_string();
    let response = client
        .get(url)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| ExporterError::transport(&url_str, e))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ExporterError::Remote {
            url: url_str,
            status: status.as_u16(),
            message,
        });
    }

    let body = response
        .json::<T>()
        .await
        .map_err(|e| ExporterError::transport(&url_str, e))?;
    Ok(Some(body))
}

// ========== Consul ==========

/// Discovery through the Consul HTTP API.
#[derive(Clone)]
pub struct ConsulDiscovery {
    base_url: String,
    passing_only: bool,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulHealthEntry {
    node: ConsulNode,
    service: ConsulService,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulNode {
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulService {
    #[serde(default)]
    address: String,
    port: u16,
}

impl ConsulDiscovery {
    pub fn new(base_url: &str, passing_only: bool, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            passing_only,
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl Discovery for ConsulDiscovery {
    fn backend(&self) -> &'static str {
        "consul"
    }

    async fn list_service_names(&self) -> Result<Vec<String>> {
        let url = endpoint(self.backend(), &self.base_url, &["v1", "catalog", "services"])?;
        let services: BTreeMap<String, Vec<String>> =
            get_json(&self.client, url).await?.unwrap_or_default();
        debug!(count = services.len(), "consul catalog listed");
        Ok(services.into_keys().collect())
    }

    async fn list_instances(&self, service: &str) -> Result<Vec<DiscoveredInstance>> {
        let mut url = endpoint(self.backend(), &self.base_url, &["v1", "health", "service", service])?;
        if self.passing_only {
            url.query_pairs_mut().append_pair("passing", "true");
        }

        let entries: Vec<ConsulHealthEntry> = get_json(&self.client, url).await?.unwrap_or_default();
        Ok(entries
            .into_iter()
            .map(|entry| {
                let host = if entry.service.address.is_empty() {
                    entry.node.address
                } else {
                    entry.service.address
                };
                DiscoveredInstance::new(host, entry.service.port)
            })
            .collect())
    }
}

// ========== Eureka ==========

/// Discovery through the Eureka REST API.
///
/// `base_url` is the Eureka service URL including its context path, for
/// example `http://eureka:8761/eureka`.
#[derive(Clone)]
pub struct EurekaDiscovery {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct EurekaApplicationsEnvelope {
    applications: EurekaApplications,
}

#[derive(Debug, Default, Deserialize)]
struct EurekaApplications {
    #[serde(default)]
    application: Vec<EurekaApplication>,
}

#[derive(Debug, Deserialize)]
struct EurekaApplicationEnvelope {
    application: EurekaApplication,
}

#[derive(Debug, Deserialize)]
struct EurekaApplication {
    name: String,
    #[serde(default)]
    instance: Vec<EurekaInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EurekaInstance {
    #[serde(default)]
    host_name: String,
    #[serde(default)]
    ip_addr: String,
    #[serde(default)]
    status: String,
    port: EurekaPort,
    #[serde(default)]
    home_page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EurekaPort {
    #[serde(rename = "$")]
    value: u16,
}

impl EurekaInstance {
    fn into_discovered(self) -> DiscoveredInstance {
        let host = if self.host_name.is_empty() {
            self.ip_addr
        } else {
            self.host_name
        };
        DiscoveredInstance {
            host,
            port: self.port.value,
            uri: self.home_page_url.unwrap_or_default(),
        }
    }
}

impl EurekaDiscovery {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl Discovery for EurekaDiscovery {
    fn backend(&self) -> &'static str {
        "eureka"
    }

    async fn list_service_names(&self) -> Result<Vec<String>> {
        let url = endpoint(self.backend(), &self.base_url, &["apps"])?;
        let envelope: Option<EurekaApplicationsEnvelope> = get_json(&self.client, url).await?;
        let mut names: Vec<String> = envelope
            .map(|e| e.applications.application)
            .unwrap_or_default()
            .into_iter()
            .filter(|app| !app.instance.is_empty())
            .map(|app| app.name.to_lowercase())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn list_instances(&self, service: &str) -> Result<Vec<DiscoveredInstance>> {
        let app = service.to_uppercase();
        let url = endpoint(self.backend(), &self.base_url, &["apps", &app])?;
        let envelope: Option<EurekaApplicationEnvelope> = get_json(&self.client, url).await?;
        Ok(envelope
            .map(|e| e.application.instance)
            .unwrap_or_default()
            .into_iter()
            .filter(|instance| instance.status.eq_ignore_ascii_case("UP"))
            .map(EurekaInstance::into_discovered)
            .collect())
    }
}
