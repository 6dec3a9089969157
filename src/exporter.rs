//! Prometheus metrics exporter
//!
//! Publishes gather output through the `metrics` facade so a Prometheus
//! scrape endpoint can serve it. Values that do not parse as numbers
//! (vivifiers may emit anything) are skipped.

use anyhow::Result;
use metrics::gauge;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ExporterConfig;
use crate::engine::Engine;
use crate::gather::Report;
use crate::registry::ThreadSelector;

/// Convert a dotted counter name into a Prometheus metric name
///
/// `hello.world` with prefix `app` becomes `app_hello_world`.
pub fn metric_name(prefix: &str, key: &str) -> String {
    let mut name = String::with_capacity(prefix.len() + 1 + key.len());
    name.push_str(prefix);
    name.push('_');
    name.extend(key.chars().map(|c| match c {
        'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | ':' => c,
        _ => '_',
    }));
    name
}

/// Gather `subtree` and keep the numeric values, renamed for export
pub fn collect(engine: &Engine, config: &ExporterConfig) -> Vec<(String, f64)> {
    let report: Report = engine.report(&config.subtree, ThreadSelector::All, 0);

    report
        .iter()
        .filter_map(|(key, value)| match value.parse::<f64>() {
            Ok(v) => Some((metric_name(&config.prefix, key), v)),
            Err(_) => {
                debug!(key = %key, value = %value, "Skipping non-numeric value");
                None
            }
        })
        .collect()
}

/// Push one round of values into the installed recorder
pub fn publish(engine: &Engine, config: &ExporterConfig) -> usize {
    let values = collect(engine, config);
    let published = values.len();
    for (name, value) in values {
        gauge!(name).set(value);
    }
    published
}

/// Install the Prometheus exporter and start republishing periodically
pub fn init_exporter(engine: Arc<Engine>, config: &ExporterConfig) -> Result<JoinHandle<()>> {
    PrometheusBuilder::new()
        .with_http_listener(config.bind_addr)
        .install()?;

    info!(bind_addr = %config.bind_addr, subtree = %config.subtree, "Counter exporter started");
    Ok(spawn_sync_task(engine, config.clone()))
}

/// Background task that republishes every `interval_secs`
pub fn spawn_sync_task(engine: Arc<Engine>, config: ExporterConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));

        loop {
            interval.tick().await;
            let published = publish(&engine, &config);
            debug!(published, "Counters published");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gather::VivifyNode;
    use std::net::SocketAddr;

    #[test]
    fn test_metric_name_sanitized() {
        assert_eq!(metric_name("app", "hello.world"), "app_hello_world");
        assert_eq!(metric_name("app", "a-b c"), "app_a_b_c");
    }

    #[test]
    fn test_collect_skips_non_numeric() {
        let engine = Engine::new();
        engine.initialize(1);
        let h = engine.create("hello.world");
        engine.add(h, 3);
        engine.create_with_vivifier("text", |node: &mut VivifyNode<'_>| {
            node.emit_child("label", "not-a-number");
            node.emit_child("thread", node.selector());
        });

        let config = ExporterConfig::default();
        let mut values = collect(&engine, &config);
        values.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            values,
            vec![
                ("counters_hello_world".to_string(), 3.0),
                ("counters_text_thread".to_string(), -1.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_sync_task_runs_without_recorder() {
        let engine = Arc::new(Engine::new());
        engine.initialize(1);
        engine.create("a.b");

        let task = spawn_sync_task(engine.clone(), ExporterConfig::default());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());
        task.abort();
    }

    #[tokio::test]
    async fn test_init_exporter_on_ephemeral_port() {
        let engine = Arc::new(Engine::new());
        engine.initialize(1);
        let h = engine.create("served.total");
        engine.add(h, 2);

        let config = ExporterConfig {
            enabled: true,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..ExporterConfig::default()
        };
        let task = init_exporter(engine.clone(), &config).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());
        assert_eq!(publish(&engine, &config), 1);
        task.abort();
    }
}
