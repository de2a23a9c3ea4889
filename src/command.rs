//! Command implementations for the darkscope CLI.
//!
//! - **detect**: one detection pass over a page snapshot, reported as text
//!   or JSON
//! - **watch**: replays a mutation script against a snapshot while the
//!   change monitor is running and prints every monitor event

pub mod detect;
pub mod watch;

use log::*;
use std::path::Path;
use tokio::fs;

use crate::{config::DetectorConfig, result::Result};

/// Load detector configuration, falling back to defaults when the file is
/// missing.
pub fn load_config(path: &Path) -> Result<DetectorConfig> {
    let config = DetectorConfig::load(path)?;
    debug!("detector config: {config:?}");
    Ok(config)
}

/// Write `content` to `out_file`, creating parent directories, or print it.
pub async fn write_output(content: &str, out_file: Option<&Path>) -> Result<()> {
    let Some(file_path) = out_file else {
        println!("{content}");
        return Ok(());
    };

    if let Some(parent) = file_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).await?;
    }

    info!("writing report to: {}", file_path.display());
    fs::write(file_path, content).await?;

    Ok(())
}
