//! Jolokia transport for reading MBean attributes over HTTP.
//!
//! Each instance exposes a Jolokia agent (usually at `/jolokia`). A read request
//! names one MBean and a list of attributes; the agent answers with a JSON
//! envelope whose `value` maps attribute names to plain numbers or, for
//! composite attributes such as `HeapMemoryUsage`, to nested objects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{ExporterError, Result};

/// Attribute name to value mapping returned by a single read.
pub type AttributeBag = serde_json::Map<String, Value>;

pub const MEMORY_MBEAN: &str = "java.lang:type=Memory";
pub const HEAP_MEMORY_USAGE: &str = "HeapMemoryUsage";
pub const NON_HEAP_MEMORY_USAGE: &str = "NonHeapMemoryUsage";

pub const MAX_THREADS: &str = "maxThreads";
pub const CURRENT_THREAD_COUNT: &str = "currentThreadCount";
pub const CURRENT_THREADS_BUSY: &str = "currentThreadsBusy";

/// Reads a bag of attributes of one MBean from one instance.
#[async_trait]
pub trait AttributeReader: Send + Sync {
    async fn read(&self, endpoint: &str, mbean: &str, attributes: &[&str]) -> Result<AttributeBag>;
}

/// `ThreadPool` MBean of the connector listening on `port`.
pub fn thread_pool_mbean(connector_prefix: &str, port: u16) -> String {
    format!("Tomcat:type=ThreadPool,name=\"{connector_prefix}-{port}\"")
}

/// `GlobalRequestProcessor` MBean of the connector listening on `port`.
pub fn request_processor_mbean(connector_prefix: &str, port: u16) -> String {
    format!("Tomcat:type=GlobalRequestProcessor,name=\"{connector_prefix}-{port}\"")
}

#[derive(Serialize)]
struct ReadRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    mbean: &'a str,
    attribute: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct ReadResponse {
    status: u16,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
}

/// HTTP client speaking the Jolokia read protocol.
#[derive(Clone)]
pub struct JolokiaClient {
    client: reqwest::Client,
}

impl JolokiaClient {
    /// Creates a client whose requests are aborted after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ExporterError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AttributeReader for JolokiaClient {
    #[instrument(skip(self, attributes), level = "debug")]
    async fn read(&self, endpoint: &str, mbean: &str, attributes: &[&str]) -> Result<AttributeBag> {
        let request = ReadRequest {
            kind: "read",
            mbean,
            attribute: attributes,
        };

        let response = self
            .client
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExporterError::transport(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExporterError::Remote {
                url: endpoint.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let body: ReadResponse = response
            .json()
            .await
            .map_err(|e| ExporterError::transport(endpoint, e))?;
        debug!(%endpoint, %mbean, status = body.status, "jolokia read completed");

        into_attribute_bag(endpoint, mbean, body)
    }
}

fn into_attribute_bag(endpoint: &str, mbean: &str, body: ReadResponse) -> Result<AttributeBag> {
    if body.status != 200 {
        let message = match (body.error_type, body.error) {
            (Some(kind), Some(error)) => format!("{kind}: {error}"),
            (None, Some(error)) => error,
            (Some(kind), None) => kind,
            (None, None) => "no error message".to_string(),
        };
        return Err(ExporterError::Remote {
            url: endpoint.to_string(),
            status: body.status,
            message,
        });
    }

    match body.value {
        Some(Value::Object(bag)) => Ok(bag),
        other => Err(ExporterError::Malformed {
            mbean: mbean.to_string(),
            attribute: "value".to_string(),
            value: other.map(|v| v.to_string()).unwrap_or_else(|| "null".into()),
        }),
    }
}

fn lookup<'a>(bag: &'a AttributeBag, mbean: &str, attribute: &str) -> Result<&'a Value> {
    bag.get(attribute)
        .ok_or_else(|| ExporterError::MissingAttribute {
            mbean: mbean.to_string(),
            attribute: attribute.to_string(),
        })
}

fn malformed(mbean: &str, attribute: &str, value: &Value) -> ExporterError {
    ExporterError::Malformed {
        mbean: mbean.to_string(),
        attribute: attribute.to_string(),
        value: value.to_string(),
    }
}

/// Reads a numeric attribute. Floating point values are floored.
pub fn number(bag: &AttributeBag, mbean: &str, attribute: &str) -> Result<i64> {
    let value = lookup(bag, mbean, attribute)?;
    let Value::Number(n) = value else {
        return Err(malformed(mbean, attribute, value));
    };

    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    if n.is_u64() {
        return Err(malformed(mbean, attribute, value));
    }
    n.as_f64()
        .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
        .map(|f| f.floor() as i64)
        .ok_or_else(|| malformed(mbean, attribute, value))
}

/// Reads a cumulative counter attribute, which must not be negative.
pub fn counter(bag: &AttributeBag, mbean: &str, attribute: &str) -> Result<u64> {
    let value = lookup(bag, mbean, attribute)?;
    let Value::Number(n) = value else {
        return Err(malformed(mbean, attribute, value));
    };

    if let Some(u) = n.as_u64() {
        return Ok(u);
    }
    n.as_f64()
        .filter(|f| f.is_finite() && *f >= 0.0 && *f < u64::MAX as f64)
        .map(|f| f.floor() as u64)
        .ok_or_else(|| malformed(mbean, attribute, value))
}

/// Reads a composite attribute such as `HeapMemoryUsage`.
pub fn composite<'a>(bag: &'a AttributeBag, mbean: &str, attribute: &str) -> Result<&'a AttributeBag> {
    let value = lookup(bag, mbean, attribute)?;
    value
        .as_object()
        .ok_or_else(|| malformed(mbean, attribute, value))
}

/// Integer bytes to megabytes conversion (truncating, so -1 becomes 0).
pub fn bytes_to_megabytes(bytes: i64) -> i64 {
    bytes / 1024 / 1024
}
