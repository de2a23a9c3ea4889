//! Runs catalog rules against a page and gathers the signals that fire.
//!
//! Collection is total: a refused storage read, an invalid selector or a
//! missing element only means that one rule did not fire. Nothing here
//! writes to the page.
use log::*;

use crate::{
    catalog::{Catalog, Probe, Rule, STORAGE_POSITIVE_VALUES},
    color,
    error::PageError,
    page::{ClassPattern, Document, Node, Page},
    signal::{Signal, SignalDetail},
};

/// Evaluate every rule of `catalog` in order and return the signals that
/// fired, in the same order.
pub fn collect(catalog: &Catalog, page: &dyn Page) -> Vec<Signal> {
    let collector = Collector { page };
    let mut signals = Vec::new();

    for rule in catalog.rules() {
        match collector.evaluate(rule) {
            Ok(Some(signal)) => {
                debug!(
                    "{} rule fired ({} / weight {}): {:?}",
                    rule.kind,
                    signal.tier(),
                    signal.weight(),
                    rule.probe
                );
                signals.push(signal);
            }
            Ok(None) => {}
            Err(e) => {
                debug!("{} rule skipped: {:?}: {e}", rule.kind, rule.probe);
            }
        }
    }

    signals
}

struct Collector<'a> {
    page: &'a dyn Page,
}

impl Collector<'_> {
    fn evaluate(&self, rule: &Rule) -> Result<Option<Signal>, PageError> {
        if let Probe::MediaFeature(query) = rule.probe {
            return Ok(Some(self.media_feature(rule, query)));
        }

        if let Probe::StorageValue { key } = rule.probe {
            return self.storage_value(rule, key);
        }

        let Some(doc) = self.page.document() else {
            return Ok(None);
        };

        let fired = match rule.probe {
            Probe::Attribute {
                target,
                name,
                value,
            } => doc
                .attribute(&target.node(), name)
                .filter(|actual| value.is_none_or(|expected| actual == expected))
                .map(|actual| {
                    let evidence = match value {
                        Some(_) => format!("{} [{name}=\"{actual}\"]", target.node()),
                        None => format!("{} [{name}]", target.node()),
                    };
                    (
                        SignalDetail::Attribute {
                            target,
                            name: name.to_string(),
                            value: actual,
                        },
                        evidence,
                    )
                }),
            Probe::Class { target, class } => doc
                .has_class(&target.node(), class)
                .then(|| {
                    (
                        SignalDetail::ClassName {
                            target,
                            class: class.to_string(),
                        },
                        format!("{}.{class}", target.node()),
                    )
                }),
            Probe::Selector(selector) => doc.query_selector(selector)?.then(|| {
                (
                    SignalDetail::ToggleControl {
                        selector: selector.to_string(),
                    },
                    selector.to_string(),
                )
            }),
            Probe::Global(name) => doc.has_global(name).then(|| {
                (
                    SignalDetail::Library {
                        name: name.to_string(),
                        evidence: format!("window.{name}"),
                    },
                    format!("window.{name}"),
                )
            }),
            Probe::ClassScan(pattern) => class_scan(doc, pattern),
            Probe::CssVariable { name, expect } => doc
                .computed_style(&Node::Root, name)
                .map(|value| value.trim().to_string())
                .filter(|value| color::classify(value) == Some(expect))
                .map(|value| {
                    (
                        SignalDetail::CssVariable {
                            name: name.to_string(),
                            value: value.clone(),
                        },
                        format!("{name}: {value}"),
                    )
                }),
            Probe::ColorScheme => doc
                .computed_style(&Node::Root, "color-scheme")
                .filter(|value| value.contains("dark"))
                .map(|value| {
                    let evidence = format!("color-scheme: {value}");
                    (SignalDetail::ColorSchemeProperty { value }, evidence)
                }),
            Probe::StorageValue { .. } | Probe::MediaFeature(_) => None,
        };

        Ok(fired.map(|(detail, evidence)| build_signal(rule, detail, evidence)))
    }

    fn storage_value(&self, rule: &Rule, key: &str) -> Result<Option<Signal>, PageError> {
        let value = self.page.storage().get(key)?;

        Ok(value
            .filter(|v| STORAGE_POSITIVE_VALUES.contains(&v.as_str()))
            .map(|value| {
                let evidence = format!("storage {key}={value}");
                build_signal(
                    rule,
                    SignalDetail::Storage {
                        key: key.to_string(),
                        value,
                    },
                    evidence,
                )
            }))
    }

    /// Always produces a signal; an unanswerable query is recorded as an
    /// unknown preference.
    fn media_feature(&self, rule: &Rule, query: &str) -> Signal {
        let prefers_dark = match self.page.media().matches(query) {
            Ok(matches) => Some(matches),
            Err(e) => {
                debug!("media query {query} unavailable: {e}");
                None
            }
        };

        Signal::new(
            rule.kind,
            rule.tier,
            SignalDetail::SystemPreference { prefers_dark },
        )
    }
}

fn class_scan(doc: &dyn Document, pattern: ClassPattern) -> Option<(SignalDetail, String)> {
    doc.find_class(pattern).map(|class| {
        let evidence = format!("{pattern} ({class})");
        (SignalDetail::UtilityDarkClass { class }, evidence)
    })
}

/// Library rules report which library fired and the evidence; every other
/// rule keeps its probe specific detail.
fn build_signal(rule: &Rule, detail: SignalDetail, evidence: String) -> Signal {
    let detail = match rule.library {
        Some(name) => SignalDetail::Library {
            name: name.to_string(),
            evidence,
        },
        None => detail,
    };

    Signal::new(rule.kind, rule.tier, detail)
}
