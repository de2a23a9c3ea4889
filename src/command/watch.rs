//! Replays a mutation script against a snapshot under the change monitor.
use color_eyre::eyre::WrapErr;
use log::*;
use serde::Deserialize;
use std::{path::Path, sync::Arc, time::Duration};
use tokio::time::sleep;

use crate::{
    command::load_config,
    config::DetectorConfig,
    detector::Detector,
    error::DarkscopeError,
    monitor::{ChangeMonitor, MonitorEvent},
    page::{Node, snapshot::SnapshotPage},
    result::Result,
};

/// One scripted change to the page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ScriptStep {
    SetAttribute {
        node: Node,
        name: String,
        value: String,
    },
    RemoveAttribute {
        node: Node,
        name: String,
    },
    /// Flip the system preference. Not an attribute mutation, so it only
    /// shows up in the next re-detection.
    SetPrefersDark {
        value: bool,
    },
    Wait {
        ms: u64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WatchScript {
    pub steps: Vec<ScriptStep>,
}

impl WatchScript {
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> crate::error::Result<Self> {
        debug!("loading watch script: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| {
            DarkscopeError::invalid_config(format!("{}: {e}", path.display()))
        })
    }
}

pub async fn execute(config_path: &Path, snapshot: &Path, script: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let page = SnapshotPage::load(snapshot)
        .wrap_err_with(|| format!("failed to load snapshot {}", snapshot.display()))?;
    let script = WatchScript::load(script)?;
    let detector = Detector::from_config(&config);

    let initial = detector.detect(&page)?;
    let line = serde_json::json!({ "event": "initial", "result": initial });
    println!("{line}");

    replay(detector, Arc::new(page), &config, &script, |event| {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("failed to serialize monitor event: {e}"),
        }
    })
    .await
}

/// Start a monitor on `page`, apply every step, wait for the last debounce
/// window to close, then stop.
pub async fn replay(
    detector: Detector,
    page: Arc<SnapshotPage>,
    config: &DetectorConfig,
    script: &WatchScript,
    on_event: impl FnMut(MonitorEvent) + Send + 'static,
) -> Result<()> {
    let mut monitor = ChangeMonitor::new(detector, Arc::clone(&page), config);
    monitor.start(on_event)?;

    for (index, step) in script.steps.iter().enumerate() {
        debug!("script step {index}: {step:?}");
        apply(&page, step)
            .await
            .wrap_err_with(|| format!("script step {index} failed"))?;
    }

    sleep(config.debounce() * 2).await;
    monitor.stop();

    Ok(())
}

async fn apply(page: &SnapshotPage, step: &ScriptStep) -> Result<()> {
    match step {
        ScriptStep::SetAttribute { node, name, value } => {
            page.set_attribute(node, name, value)?
        }
        ScriptStep::RemoveAttribute { node, name } => page.remove_attribute(node, name)?,
        ScriptStep::SetPrefersDark { value } => page.set_prefers_dark(*value),
        ScriptStep::Wait { ms } => sleep(Duration::from_millis(*ms)).await,
    }

    Ok(())
}
