//! Process startup
//!
//! Wires a loaded [`Config`] into logging, the engine and the exporter.

use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::exporter::init_exporter;
use crate::util::init_tracing;

/// Install logging, lay out the engine's slots and start the exporter
///
/// An already-installed tracing subscriber is kept. The exporter only
/// starts when `[exporter] enabled` is set; its sync task handle is
/// returned. Starting the exporter requires a Tokio runtime.
pub fn start(engine: Arc<Engine>, config: &Config) -> Result<Option<JoinHandle<()>>> {
    if let Err(e) = init_tracing(&config.logging) {
        warn!(error = %e, "Keeping existing tracing subscriber");
    }

    engine.apply_config(&config.engine);
    info!(
        version = crate::VERSION,
        static_slots = engine.static_slots(),
        dynamic_slots = engine.dynamic_slots(),
        "Counter engine configured"
    );

    if !config.exporter.enabled {
        info!("Counter exporter disabled");
        return Ok(None);
    }

    init_exporter(engine, &config.exporter).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Mode;

    #[test]
    fn test_disabled_exporter_is_not_started() {
        let engine = Arc::new(Engine::new());
        let config = Config::from_toml("[engine]\nstatic_slots = 2\ndynamic_slots = 3\n").unwrap();

        let task = start(engine.clone(), &config).unwrap();
        assert!(task.is_none());
        assert_eq!(engine.mode(), Mode::Initialized);
        assert_eq!(engine.static_slots(), 2);
        assert_eq!(engine.dynamic_slots(), 3);
    }
}
