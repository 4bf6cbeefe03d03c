//! Integration tests for the HTTP-facing collaborators.
//!
//! Small axum servers bound to 127.0.0.1 stand in for a Jolokia agent, a
//! Consul agent and a Eureka server, so the real reqwest clients are exercised.

mod common;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use herakles_jvm_exporter::jolokia::{AttributeReader, MEMORY_MBEAN};
use herakles_jvm_exporter::metrics::series_labels;
use herakles_jvm_exporter::{
    ConsulDiscovery, CounterKind, DiscoveredInstance, Discovery, EurekaDiscovery, ExporterError,
    GaugeKind, InstanceIdentity, JolokiaClient, ServiceIdentity, SweepOptions,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(2);

/// Serves `app` on an ephemeral port and returns `(host, port)`.
async fn serve(app: Router) -> (String, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    ("127.0.0.1".to_string(), addr.port())
}

/// Jolokia agent whose request count grows by 25 on every processor read.
fn jolokia_agent(port_name: &'static str) -> Router {
    let requests = Arc::new(AtomicU64::new(1000));
    Router::new().route(
        "/jolokia",
        post(move |Json(body): Json<Value>| {
            let requests = requests.clone();
            async move {
                let mbean = body["mbean"].as_str().unwrap_or_default().to_string();
                let value = if mbean == MEMORY_MBEAN {
                    json!({
                        "HeapMemoryUsage": {"init": 0, "used": 268435456u64, "max": 1073741824u64, "committed": 536870912u64},
                        "NonHeapMemoryUsage": {"init": 0, "used": 52428800u64, "max": -1, "committed": 62914560u64}
                    })
                } else if mbean == format!("Tomcat:type=ThreadPool,name=\"{port_name}\"") {
                    json!({"maxThreads": 200, "currentThreadCount": 10, "currentThreadsBusy": 2})
                } else if mbean == format!("Tomcat:type=GlobalRequestProcessor,name=\"{port_name}\"") {
                    let count = requests.fetch_add(25, Ordering::SeqCst);
                    json!({
                        "requestCount": count,
                        "errorCount": 1,
                        "processingTime": 5000,
                        "bytesReceived": 1024,
                        "bytesSent": 4096
                    })
                } else {
                    return Json(json!({
                        "status": 404,
                        "error_type": "javax.management.InstanceNotFoundException",
                        "error": mbean
                    }));
                };
                Json(json!({"request": body, "value": value, "timestamp": 0, "status": 200}))
            }
        }),
    )
}

#[tokio::test]
async fn test_jolokia_client_reads_attributes() {
    let (host, port) = serve(jolokia_agent("http-nio-8080")).await;
    let client = JolokiaClient::new(TIMEOUT).unwrap();
    let url = format!("http://{host}:{port}/jolokia");

    let bag = client
        .read(&url, MEMORY_MBEAN, &["HeapMemoryUsage", "NonHeapMemoryUsage"])
        .await
        .unwrap();
    assert_eq!(bag["HeapMemoryUsage"]["used"], json!(268435456u64));

    let err = client
        .read(&url, "Tomcat:type=ThreadPool,name=\"http-nio-1\"", &["maxThreads"])
        .await
        .unwrap_err();
    match err {
        ExporterError::Remote { status, message, .. } => {
            assert_eq!(status, 404);
            assert!(message.contains("InstanceNotFoundException"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_jolokia_client_reports_http_and_transport_errors() {
    let app = Router::new().route(
        "/jolokia",
        post(|| async { (StatusCode::FORBIDDEN, "access denied") }),
    );
    let (host, port) = serve(app).await;
    let client = JolokiaClient::new(TIMEOUT).unwrap();

    let err = client
        .read(&format!("http://{host}:{port}/jolokia"), MEMORY_MBEAN, &["HeapMemoryUsage"])
        .await
        .unwrap_err();
    assert!(matches!(err, ExporterError::Remote { status: 403, .. }));

    // Bind and drop to get a port nobody listens on
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap().port();
    let err = client
        .read(&format!("http://127.0.0.1:{closed}/jolokia"), MEMORY_MBEAN, &["HeapMemoryUsage"])
        .await
        .unwrap_err();
    assert!(matches!(err, ExporterError::Transport { .. }));
}

#[tokio::test]
async fn test_jolokia_client_times_out() {
    let app = Router::new().route(
        "/jolokia",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"status": 200, "value": {}}))
        }),
    );
    let (host, port) = serve(app).await;
    let client = JolokiaClient::new(Duration::from_millis(100)).unwrap();

    let err = client
        .read(&format!("http://{host}:{port}/jolokia"), MEMORY_MBEAN, &["HeapMemoryUsage"])
        .await
        .unwrap_err();
    assert!(matches!(err, ExporterError::Transport { .. }));
}

#[tokio::test]
async fn test_sweep_against_real_agent() {
    let (host, port) = serve(jolokia_agent("http-nio-0")).await;
    // Port 0 pins the connector MBean name; the uri points at the agent.
    let uri = format!("http://{host}:{port}");
    let discovery = common::FakeDiscovery::new();
    discovery.set_instances(
        "orders",
        vec![DiscoveredInstance {
            host: host.clone(),
            port: 0,
            uri: uri.clone(),
        }],
    );

    let p = common::pipeline(
        Arc::new(JolokiaClient::new(TIMEOUT).unwrap()),
        discovery,
        SweepOptions::default(),
    );
    p.sweep.run().await.wait().await;
    p.sweep.run().await.wait().await;

    let service = ServiceIdentity::from_discovery("orders");
    let instance = InstanceIdentity::new(&host, 0, &uri);
    let labels = series_labels(&service, &instance);

    assert_eq!(p.metrics.gauge_value(GaugeKind::HeapMemoryUsed, &labels), 256);
    assert_eq!(p.metrics.gauge_value(GaugeKind::HeapMemoryMax, &labels), 1024);
    assert_eq!(p.metrics.gauge_value(GaugeKind::NonHeapMemoryUsed, &labels), 50);
    assert_eq!(p.metrics.gauge_value(GaugeKind::CurrentThreadsBusy, &labels), 2);
    assert_eq!(p.metrics.counter_value(CounterKind::RequestCount, &labels), 25);
    assert_eq!(p.metrics.counter_value(CounterKind::BytesSent, &labels), 0);
    assert_eq!(p.stats.samples_failed.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_consul_discovery() {
    let app = Router::new()
        .route(
            "/v1/catalog/services",
            get(|| async { Json(json!({"consul": [], "orders": ["http"], "billing": []})) }),
        )
        .route(
            "/v1/health/service/{name}",
            get(
                |Path(name): Path<String>, Query(query): Query<HashMap<String, String>>| async move {
                    let passing = query.get("passing").map(String::as_str) == Some("true");
                    let entries = match (name.as_str(), passing) {
                        ("orders", true) => json!([
                            {"Node": {"Address": "10.0.0.1"}, "Service": {"Address": "", "Port": 8080}},
                            {"Node": {"Address": "10.0.0.2"}, "Service": {"Address": "192.168.0.2", "Port": 8081}}
                        ]),
                        ("orders", false) => json!([
                            {"Node": {"Address": "10.0.0.1"}, "Service": {"Address": "", "Port": 8080}}
                        ]),
                        _ => json!([]),
                    };
                    Json(entries)
                },
            ),
        );
    let (host, port) = serve(app).await;
    let base = format!("http://{host}:{port}/");

    let consul = ConsulDiscovery::new(&base, true, TIMEOUT).unwrap();
    let mut names = consul.list_service_names().await.unwrap();
    names.sort();
    assert_eq!(names, vec!["billing", "consul", "orders"]);

    let instances = consul.list_instances("orders").await.unwrap();
    assert_eq!(
        instances,
        vec![
            DiscoveredInstance::new("10.0.0.1", 8080),
            DiscoveredInstance::new("192.168.0.2", 8081),
        ]
    );
    assert!(consul.list_instances("billing").await.unwrap().is_empty());

    let all = ConsulDiscovery::new(&base, false, TIMEOUT).unwrap();
    assert_eq!(all.list_instances("orders").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_consul_unreachable_is_an_error() {
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap().port();
    let consul = ConsulDiscovery::new(&format!("http://127.0.0.1:{closed}"), true, TIMEOUT).unwrap();
    assert!(matches!(
        consul.list_service_names().await,
        Err(ExporterError::Transport { .. })
    ));
}

#[tokio::test]
async fn test_consul_client_times_out() {
    let app = Router::new().route(
        "/v1/catalog/services",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({}))
        }),
    );
    let (host, port) = serve(app).await;
    let consul =
        ConsulDiscovery::new(&format!("http://{host}:{port}"), true, Duration::from_millis(100))
            .unwrap();
    assert!(matches!(
        consul.list_service_names().await,
        Err(ExporterError::Transport { .. })
    ));
}

#[tokio::test]
async fn test_eureka_discovery() {
    let app = Router::new()
        .route(
            "/eureka/apps",
            get(|| async {
                Json(json!({"applications": {"application": [
                    {"name": "ORDERS", "instance": [{"hostName": "orders-1", "status": "UP", "port": {"$": 8080}}]},
                    {"name": "IDLE", "instance": []}
                ]}}))
            }),
        )
        .route(
            "/eureka/apps/{name}",
            get(|Path(name): Path<String>| async move {
                if name != "ORDERS" {
                    return Err(StatusCode::NOT_FOUND);
                }
                Ok(Json(json!({"application": {"name": "ORDERS", "instance": [
                    {"hostName": "orders-1", "ipAddr": "10.0.0.1", "status": "UP",
                     "port": {"$": 8080, "@enabled": "true"},
                     "homePageUrl": "http://orders-1:8080/"},
                    {"hostName": "", "ipAddr": "10.0.0.2", "status": "UP", "port": {"$": 8081}},
                    {"hostName": "orders-3", "status": "DOWN", "port": {"$": 8082}}
                ]}})))
            }),
        );
    let (host, port) = serve(app).await;

    let eureka = EurekaDiscovery::new(&format!("http://{host}:{port}/eureka"), TIMEOUT).unwrap();
    assert_eq!(eureka.list_service_names().await.unwrap(), vec!["orders"]);

    let instances = eureka.list_instances("orders").await.unwrap();
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0].uri, "http://orders-1:8080/");
    assert_eq!(instances[0].identity().endpoint_url("/jolokia"), "http://orders-1:8080/jolokia");
    assert_eq!(instances[1], DiscoveredInstance::new("10.0.0.2", 8081));

    assert!(eureka.list_instances("unknown").await.unwrap().is_empty());
}
