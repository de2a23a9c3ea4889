//! One-shot detection against a page snapshot.
use color_eyre::eyre::WrapErr;
use log::*;
use std::{fmt::Write, path::Path};

use crate::{
    cli::OutputFormat,
    command::{load_config, write_output},
    detector::{DetectionResult, Detector},
    page::{Node, snapshot::SnapshotPage},
    result::Result,
    signal::SignalDetail,
};

pub async fn execute(
    config_path: &Path,
    snapshot: &Path,
    format: OutputFormat,
    out_file: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let page = SnapshotPage::load(snapshot)
        .wrap_err_with(|| format!("failed to load snapshot {}", snapshot.display()))?;

    let detector = Detector::from_config(&config);
    info!(
        "running {} rules against {}",
        detector.catalog().len(),
        snapshot.display()
    );

    let result = detector.detect(&page)?;
    let content = render(&result, format)?;

    write_output(&content, out_file).await
}

pub fn render(result: &DetectionResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Text => Ok(render_text(result)),
    }
}

fn render_text(result: &DetectionResult) -> String {
    let mut out = String::new();

    let feature = if result.has_dark_mode_feature { "yes" } else { "no" };
    let _ = writeln!(out, "dark mode feature: {feature}");
    let _ = writeln!(out, "confidence:        {}", result.confidence);
    let _ = writeln!(out, "current theme:     {}", result.current_theme);
    let _ = writeln!(out, "total weight:      {}", result.summary.total_weight);

    if !result.implementation_tags.is_empty() {
        let tags: Vec<&str> = result.implementation_tags.iter().map(String::as_str).collect();
        let _ = writeln!(out, "implementation:    {}", tags.join(", "));
    }

    if !result.summary.libraries.is_empty() {
        let _ = writeln!(out, "libraries:         {}", result.summary.libraries.join(", "));
    }

    let _ = writeln!(out, "signals ({}):", result.signals.len());
    for signal in &result.signals {
        let _ = writeln!(
            out,
            "  [{:<9}] {:<22} {}",
            signal.tier().name(),
            signal.kind().name(),
            describe(signal.detail())
        );
    }

    out.trim_end().to_string()
}

fn describe(detail: &SignalDetail) -> String {
    match detail {
        SignalDetail::Storage { key, value } => format!("storage {key}={value}"),
        SignalDetail::Attribute {
            target,
            name,
            value,
        } => format!("{} {name}=\"{value}\"", target.node()),
        SignalDetail::ClassName { target, class } => {
            format!("{} .{class}", target.node())
        }
        SignalDetail::Library { name, evidence } => format!("{name} ({evidence})"),
        SignalDetail::ToggleControl { selector } => format!("matches {selector}"),
        SignalDetail::CssVariable { name, value } => {
            format!("{} {name}: {value}", Node::Root)
        }
        SignalDetail::SystemPreference { prefers_dark } => match prefers_dark {
            Some(true) => "system prefers dark".into(),
            Some(false) => "system prefers light".into(),
            None => "system preference unavailable".into(),
        },
        SignalDetail::ColorSchemeProperty { value } => format!("color-scheme: {value}"),
        SignalDetail::UtilityDarkClass { class } => format!("class {class}"),
    }
}
