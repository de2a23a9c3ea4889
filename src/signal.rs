//! Evidence records produced by a collection pass.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::page::Node;

/// Category of a detection rule and of the signals it emits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Storage,
    Attribute,
    ClassName,
    Library,
    ToggleControl,
    CssVariable,
    SystemPreference,
    ColorSchemeProperty,
    UtilityDarkClass,
}

impl SignalKind {
    pub const ALL: [SignalKind; 9] = [
        SignalKind::Storage,
        SignalKind::Attribute,
        SignalKind::ClassName,
        SignalKind::Library,
        SignalKind::ToggleControl,
        SignalKind::CssVariable,
        SignalKind::SystemPreference,
        SignalKind::ColorSchemeProperty,
        SignalKind::UtilityDarkClass,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::Storage => "storage",
            SignalKind::Attribute => "attribute",
            SignalKind::ClassName => "class-name",
            SignalKind::Library => "library",
            SignalKind::ToggleControl => "toggle-control",
            SignalKind::CssVariable => "css-variable",
            SignalKind::SystemPreference => "system-preference",
            SignalKind::ColorSchemeProperty => "color-scheme-property",
            SignalKind::UtilityDarkClass => "utility-dark-class",
        }
    }

    /// Coarse implementation label implied by a signal of this kind.
    /// Library signals contribute their library name instead, and the
    /// system preference says nothing about the page itself.
    pub fn implementation_tag(&self) -> Option<&'static str> {
        match self {
            SignalKind::Storage | SignalKind::ToggleControl => Some("javascript"),
            SignalKind::Attribute => Some("data-attribute"),
            SignalKind::ClassName => Some("class-toggle"),
            SignalKind::CssVariable => Some("css-variables"),
            SignalKind::ColorSchemeProperty => Some("css-color-scheme"),
            SignalKind::UtilityDarkClass => Some("utility-css-framework"),
            SignalKind::Library | SignalKind::SystemPreference => None,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed strength of a rule. Ordered from weakest to strongest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceTier {
    /// Weight summed by the aggregator. One-to-one with the tier.
    pub fn weight(&self) -> u32 {
        match self {
            ConfidenceTier::VeryHigh => 4,
            ConfidenceTier::High => 3,
            ConfidenceTier::Medium => 2,
            ConfidenceTier::Low => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConfidenceTier::VeryHigh => "very-high",
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which of the two fixed elements a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Root,
    Body,
}

impl Target {
    pub fn node(self) -> Node {
        match self {
            Target::Root => Node::Root,
            Target::Body => Node::Body,
        }
    }
}

/// Kind specific payload explaining why a signal fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalDetail {
    Storage {
        key: String,
        value: String,
    },
    Attribute {
        target: Target,
        name: String,
        value: String,
    },
    ClassName {
        target: Target,
        class: String,
    },
    Library {
        name: String,
        evidence: String,
    },
    ToggleControl {
        selector: String,
    },
    CssVariable {
        name: String,
        value: String,
    },
    SystemPreference {
        prefers_dark: Option<bool>,
    },
    ColorSchemeProperty {
        value: String,
    },
    UtilityDarkClass {
        class: String,
    },
}

/// One detected piece of evidence. Immutable once built; the weight is
/// always derived from the tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signal {
    kind: SignalKind,
    #[serde(rename = "confidence")]
    tier: ConfidenceTier,
    weight: u32,
    detail: SignalDetail,
}

impl Signal {
    pub fn new(kind: SignalKind, tier: ConfidenceTier, detail: SignalDetail) -> Self {
        Self {
            kind,
            tier,
            weight: tier.weight(),
            detail,
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn tier(&self) -> ConfidenceTier {
        self.tier
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn detail(&self) -> &SignalDetail {
        &self.detail
    }

    /// Library name carried by library signals.
    pub fn library(&self) -> Option<&str> {
        match &self.detail {
            SignalDetail::Library { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_follows_tier() {
        for (tier, weight) in [
            (ConfidenceTier::VeryHigh, 4),
            (ConfidenceTier::High, 3),
            (ConfidenceTier::Medium, 2),
            (ConfidenceTier::Low, 1),
        ] {
            let signal = Signal::new(
                SignalKind::ToggleControl,
                tier,
                SignalDetail::ToggleControl {
                    selector: ".theme-toggle".into(),
                },
            );
            assert_eq!(signal.weight(), weight);
            assert_eq!(signal.tier(), tier);
        }
    }

    #[test]
    fn tiers_order_from_low_to_very_high() {
        assert!(ConfidenceTier::Low < ConfidenceTier::Medium);
        assert!(ConfidenceTier::Medium < ConfidenceTier::High);
        assert!(ConfidenceTier::High < ConfidenceTier::VeryHigh);
    }

    #[test]
    fn kinds_serialize_in_kebab_case() {
        let json = serde_json::to_string(&SignalKind::UtilityDarkClass).unwrap();
        assert_eq!(json, "\"utility-dark-class\"");

        let kind: SignalKind = serde_json::from_str("\"class-name\"").unwrap();
        assert_eq!(kind, SignalKind::ClassName);
        assert_eq!(kind.to_string(), "class-name");
    }

    #[test]
    fn library_accessor_only_reports_library_details() {
        let library = Signal::new(
            SignalKind::Library,
            ConfidenceTier::VeryHigh,
            SignalDetail::Library {
                name: "darkmode-js".into(),
                evidence: ".darkmode-layer".into(),
            },
        );
        assert_eq!(library.library(), Some("darkmode-js"));

        let storage = Signal::new(
            SignalKind::Storage,
            ConfidenceTier::VeryHigh,
            SignalDetail::Storage {
                key: "theme".into(),
                value: "dark".into(),
            },
        );
        assert_eq!(storage.library(), None);
    }
}
