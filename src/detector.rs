//! The detection pipeline: collect, aggregate, resolve, merge.
use log::*;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::{
    aggregator,
    catalog::Catalog,
    collector,
    config::DetectorConfig,
    error::{DarkscopeError, Result},
    page::Page,
    resolver::{self, Theme},
    signal::{ConfidenceTier, Signal},
};

/// Signal counts per tier plus the libraries seen. Derived entirely from
/// the signal list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub very_high: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total_weight: u32,
    /// Distinct library names in first-seen order.
    pub libraries: Vec<String>,
}

impl Summary {
    pub fn from_signals(signals: &[Signal]) -> Self {
        let mut summary = Summary {
            total_weight: aggregator::total_weight(signals),
            ..Default::default()
        };

        for signal in signals {
            match signal.tier() {
                ConfidenceTier::VeryHigh => summary.very_high += 1,
                ConfidenceTier::High => summary.high += 1,
                ConfidenceTier::Medium => summary.medium += 1,
                ConfidenceTier::Low => summary.low += 1,
            }

            if let Some(library) = signal.library()
                && !summary.libraries.iter().any(|l| l == library)
            {
                summary.libraries.push(library.to_string());
            }
        }

        summary
    }
}

/// Output of one detection pass. A plain value: recomputed on every pass,
/// never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub has_dark_mode_feature: bool,
    pub confidence: ConfidenceTier,
    pub current_theme: Theme,
    pub implementation_tags: BTreeSet<String>,
    pub signals: Vec<Signal>,
    pub summary: Summary,
}

impl DetectionResult {
    pub fn new(signals: Vec<Signal>, current_theme: Theme) -> Self {
        Self {
            has_dark_mode_feature: !signals.is_empty(),
            confidence: aggregator::aggregate(&signals),
            current_theme,
            implementation_tags: implementation_tags(&signals),
            summary: Summary::from_signals(&signals),
            signals,
        }
    }
}

/// Coarse implementation labels for the signal kinds and libraries that
/// fired.
pub fn implementation_tags(signals: &[Signal]) -> BTreeSet<String> {
    signals
        .iter()
        .filter_map(|s| s.library().or_else(|| s.kind().implementation_tag()))
        .map(String::from)
        .collect()
}

/// Runs the full pipeline against a page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detector {
    catalog: Catalog,
}

impl Detector {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(Catalog::configured(config))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run one detection pass. Fails only when the page has no document at
    /// all; every other problem degrades to rules not firing.
    pub fn detect(&self, page: &dyn Page) -> Result<DetectionResult> {
        if page.document().is_none() {
            return Err(DarkscopeError::MissingDocument);
        }

        let signals = collector::collect(&self.catalog, page);
        let theme = resolver::resolve_theme(page);
        let result = DetectionResult::new(signals, theme);

        debug!(
            "detection pass: {} signals, weight {}, confidence {}, theme {}",
            result.signals.len(),
            result.summary.total_weight,
            result.confidence,
            result.current_theme
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        signal::SignalKind,
        test_helpers::{page_from_json, storage_page, without_system_preference},
    };

    #[test_log::test]
    fn storage_theme_alone_is_medium() {
        let detector = without_system_preference();
        let page = storage_page(&[("theme", "dark")]);
        let result = detector.detect(&page).unwrap();

        assert_eq!(result.signals.len(), 1);
        assert_eq!(result.signals[0].weight(), 4);
        assert_eq!(result.confidence, ConfidenceTier::Medium);
        assert_eq!(result.current_theme, Theme::Dark);
        assert!(result.has_dark_mode_feature);

        // the ever-present system preference signal keeps it medium
        let result = Detector::default().detect(&page).unwrap();
        assert_eq!(result.summary.total_weight, 5);
        assert_eq!(result.confidence, ConfidenceTier::Medium);
    }

    #[test_log::test]
    fn storage_class_and_utility_reach_high_then_very_high() {
        let page = page_from_json(
            r#"{
                "storage": { "entries": { "theme": "dark" } },
                "document": {
                    "root": { "classes": ["dark"] },
                    "elements": [ { "classes": ["dark:bg-slate-900"] } ]
                }
            }"#,
        );

        let result = without_system_preference().detect(&page).unwrap();
        assert_eq!(result.summary.total_weight, 11);
        assert_eq!(result.confidence, ConfidenceTier::High);

        let result = Detector::default().detect(&page).unwrap();
        assert_eq!(result.summary.total_weight, 12);
        assert_eq!(result.confidence, ConfidenceTier::VeryHigh);
        assert_eq!(
            result.implementation_tags,
            BTreeSet::from([
                "class-toggle".to_string(),
                "javascript".to_string(),
                "utility-css-framework".to_string(),
            ])
        );
    }

    #[test_log::test]
    fn bootstrap_attribute_resolves_dark_at_low_confidence() {
        let page = page_from_json(
            r#"{ "document": { "root": { "attributes": { "data-bs-theme": "dark" } } } }"#,
        );

        let result = without_system_preference().detect(&page).unwrap();
        assert_eq!(result.current_theme, Theme::Dark);
        assert_eq!(result.summary.total_weight, 3);
        assert_eq!(result.confidence, ConfidenceTier::Low);
    }

    #[test_log::test]
    fn bare_page_still_reports_a_feature() {
        let page = page_from_json("{}");
        let result = Detector::default().detect(&page).unwrap();

        assert!(result.has_dark_mode_feature);
        assert_eq!(result.confidence, ConfidenceTier::Low);
        assert_eq!(result.summary.total_weight, 1);
        assert_eq!(result.summary.low, 1);
        assert_eq!(result.current_theme, Theme::Unknown);
        assert!(result.implementation_tags.is_empty());
    }

    #[test_log::test]
    fn empty_signal_list_has_no_feature_but_still_a_tier() {
        let page = page_from_json("{}");
        let result = without_system_preference().detect(&page).unwrap();

        assert!(result.signals.is_empty());
        assert!(!result.has_dark_mode_feature);
        assert_eq!(result.confidence, ConfidenceTier::Low);
        assert_eq!(result.summary, Summary::default());
    }

    #[test_log::test]
    fn repeated_passes_are_identical() {
        let page = page_from_json(
            r##"{
                "storage": { "entries": { "vite-ui-theme": "dark" } },
                "prefers_dark": true,
                "document": {
                    "root": {
                        "classes": ["dark"],
                        "styles": { "--background": "#0a0a0a", "color-scheme": "dark" }
                    },
                    "elements": [ { "tag": "button", "classes": ["theme-toggle"] } ]
                }
            }"##,
        );

        let detector = Detector::default();
        let first = detector.detect(&page).unwrap();
        let second = detector.detect(&page).unwrap();
        assert_eq!(first, second);
    }

    #[test_log::test]
    fn summary_counts_tiers_and_dedups_libraries() {
        let page = page_from_json(
            r#"{ "document": {
                "root": { "attributes": { "data-darkreader-mode": "dynamic" } },
                "elements": [
                    { "classes": ["darkmode-layer"] },
                    { "classes": ["darkmode-toggle"] }
                ],
                "globals": ["DarkReader"]
            } }"#,
        );
        let result = Detector::default().detect(&page).unwrap();

        assert_eq!(
            result.summary.libraries,
            vec!["darkmode-js".to_string(), "darkreader".to_string()]
        );
        assert_eq!(result.summary.very_high, 2);
        assert_eq!(result.summary.high, 2);
        assert_eq!(result.summary.low, 1);
        assert_eq!(result.summary.total_weight, 15);
        assert_eq!(result.confidence, ConfidenceTier::VeryHigh);
        assert_eq!(
            result.implementation_tags,
            BTreeSet::from(["darkmode-js".to_string(), "darkreader".to_string()])
        );
    }

    #[test_log::test]
    fn missing_document_is_rejected() {
        let page = page_from_json(r#"{ "document": null }"#);
        let err = Detector::default().detect(&page).unwrap_err();
        assert!(matches!(err, DarkscopeError::MissingDocument));
    }

    #[test_log::test]
    fn configured_detector_skips_disabled_kinds() {
        let config = DetectorConfig {
            skip_expensive: true,
            disabled_kinds: vec![SignalKind::ClassName],
            ..Default::default()
        };
        let page = page_from_json(
            r#"{ "document": {
                "root": { "classes": ["dark"] },
                "elements": [ { "classes": ["dark:text-white"] } ]
            } }"#,
        );

        let result = Detector::from_config(&config).detect(&page).unwrap();
        let kinds: Vec<SignalKind> = result.signals.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![SignalKind::SystemPreference]);
        // the resolver still reads the page directly
        assert_eq!(result.current_theme, Theme::Dark);
    }
}
