//! Root endpoint handler for the landing page.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use std::fmt::Write;
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

const STYLE: &str = "body{font-family:sans-serif;margin:2em auto;max-width:760px;color:#333}\
h1{border-bottom:3px solid #007bff;padding-bottom:8px}\
dt{font-weight:600;color:#555}dd{margin:0 0 8px 0;color:#007bff}\
li{margin:10px 0}a{color:#007bff;font-weight:600}\
.footer{margin-top:30px;color:#666;font-size:.9em}";

/// Values shown on the landing page.
pub struct PageInfo<'a> {
    pub uptime: String,
    pub backend: &'a str,
    pub period_secs: u64,
    pub baselines: usize,
    pub health_enabled: bool,
}

/// Renders the landing page. `/health` is listed only when it is routed.
pub fn render_page(info: &PageInfo<'_>) -> String {
    let mut endpoints = vec![(
        "/metrics",
        "Prometheus metrics: JVM memory, Tomcat threads and requests",
    )];
    if info.health_enabled {
        endpoints.push(("/health", "Sweep, sampler and baseline statistics (text)"));
    }
    endpoints.push(("/config", "Effective configuration (YAML)"));

    let mut items = String::new();
    for (path, desc) in endpoints {
        let _ = writeln!(items, r#"<li><a href="{path}">{path}</a> - {desc}</li>"#);
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Herakles JVM Exporter</title><style>{STYLE}</style></head>
<body>
<h1>Herakles JVM Exporter</h1>
<dl>
<dt>Version</dt><dd>{version}</dd>
<dt>Uptime</dt><dd>{uptime}</dd>
<dt>Discovery backend</dt><dd>{backend}</dd>
<dt>Sweep period</dt><dd>{period}s</dd>
<dt>Tracked baselines</dt><dd>{baselines}</dd>
</dl>
<h2>Endpoints</h2>
<ul>
{items}</ul>
<p class="footer">{FOOTER_TEXT}</p>
</body>
</html>"#,
        version = env!("CARGO_PKG_VERSION"),
        uptime = info.uptime,
        backend = info.backend,
        period = info.period_secs,
        baselines = info.baselines,
    )
}

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.health_stats.record_http_request();

    let uptime_secs = state.start_time.elapsed().as_secs();
    let info = PageInfo {
        uptime: format!(
            "{}h {}m {}s",
            uptime_secs / 3600,
            (uptime_secs % 3600) / 60,
            uptime_secs % 60
        ),
        backend: &state.config.discovery.backend,
        period_secs: state.config.period().as_secs(),
        baselines: state.tracker.len(),
        health_enabled: state.config.enable_health.unwrap_or(true),
    };

    Html(render_page(&info))
}
