//! The fixed table of detection rules.
//!
//! Rules are plain data: the collector interprets every [`Probe`] with one
//! generic loop, so adding a check means adding a row here. Rule order is
//! evaluation order and therefore the order signals appear in a result.
use crate::{
    color::Shade,
    config::DetectorConfig,
    page::ClassPattern,
    signal::{ConfidenceTier, SignalKind, Target},
};

/// Bumped whenever rules are added, removed or re-tiered.
pub const CATALOG_VERSION: u32 = 1;

/// Stored values that count as "dark mode is on".
pub const STORAGE_POSITIVE_VALUES: [&str; 3] = ["dark", "enabled", "true"];

/// Media feature evaluated for the system preference signal.
pub const DARK_SCHEME_QUERY: &str = "(prefers-color-scheme: dark)";

/// What a rule looks up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Probe {
    /// Storage key whose value is one of [`STORAGE_POSITIVE_VALUES`].
    StorageValue { key: &'static str },
    /// Attribute on the root or body element, with an exact value or, when
    /// `value` is `None`, mere presence.
    Attribute {
        target: Target,
        name: &'static str,
        value: Option<&'static str>,
    },
    Class {
        target: Target,
        class: &'static str,
    },
    /// Any element matches the selector.
    Selector(&'static str),
    /// A named global script handle exists.
    Global(&'static str),
    /// Any class on any element matches. Linear in document size.
    ClassScan(ClassPattern),
    /// Custom property on the root element resolving to a color of the
    /// expected shade.
    CssVariable { name: &'static str, expect: Shade },
    /// Media feature, reported whether or not it matches.
    MediaFeature(&'static str),
    /// Computed `color-scheme` of the root element mentions `dark`.
    ColorScheme,
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub kind: SignalKind,
    pub tier: ConfidenceTier,
    pub probe: Probe,
    /// Library identifier for library fingerprints.
    pub library: Option<&'static str>,
}

impl Rule {
    /// Whether evaluating this rule walks the whole document.
    pub fn is_expensive(&self) -> bool {
        matches!(self.probe, Probe::ClassScan(_))
    }
}

const fn storage(key: &'static str) -> Rule {
    Rule {
        kind: SignalKind::Storage,
        tier: ConfidenceTier::VeryHigh,
        probe: Probe::StorageValue { key },
        library: None,
    }
}

const fn attribute(
    target: Target,
    name: &'static str,
    value: &'static str,
    tier: ConfidenceTier,
) -> Rule {
    Rule {
        kind: SignalKind::Attribute,
        tier,
        probe: Probe::Attribute {
            target,
            name,
            value: Some(value),
        },
        library: None,
    }
}

const fn class(target: Target, class: &'static str, tier: ConfidenceTier) -> Rule {
    Rule {
        kind: SignalKind::ClassName,
        tier,
        probe: Probe::Class { target, class },
        library: None,
    }
}

const fn library(
    name: &'static str,
    probe: Probe,
    tier: ConfidenceTier,
) -> Rule {
    Rule {
        kind: SignalKind::Library,
        tier,
        probe,
        library: Some(name),
    }
}

const fn toggle(selector: &'static str) -> Rule {
    Rule {
        kind: SignalKind::ToggleControl,
        tier: ConfidenceTier::Medium,
        probe: Probe::Selector(selector),
        library: None,
    }
}

const fn css_variable(name: &'static str, expect: Shade) -> Rule {
    Rule {
        kind: SignalKind::CssVariable,
        tier: ConfidenceTier::Medium,
        probe: Probe::CssVariable { name, expect },
        library: None,
    }
}

use ConfidenceTier::{High, Low, Medium, VeryHigh};
use Target::{Body, Root};

static BUILTIN_RULES: &[Rule] = &[
    // storage
    storage("theme"),
    storage("darkMode"),
    storage("dark-mode"),
    storage("color-scheme"),
    storage("theme-preference"),
    storage("vueuse-color-scheme"),
    storage("vite-ui-theme"),
    // attributes
    attribute(Root, "data-theme", "dark", High),
    attribute(Root, "data-bs-theme", "dark", High),
    attribute(Root, "data-mui-color-scheme", "dark", High),
    attribute(Root, "data-mode", "dark", High),
    attribute(Root, "color-mode", "dark", High),
    attribute(Root, "data-theme", "light", Medium),
    attribute(Root, "data-bs-theme", "light", Medium),
    attribute(Root, "data-mui-color-scheme", "light", Medium),
    attribute(Body, "data-theme", "dark", High),
    attribute(Body, "data-bs-theme", "dark", High),
    attribute(Body, "data-mui-color-scheme", "dark", High),
    attribute(Body, "data-mode", "dark", High),
    attribute(Body, "color-mode", "dark", High),
    attribute(Body, "data-theme", "light", Medium),
    // class names
    class(Root, "dark", High),
    class(Root, "dark-mode", High),
    class(Root, "dark-theme", High),
    class(Root, "theme-dark", High),
    class(Root, "light", Medium),
    class(Root, "light-mode", Medium),
    class(Root, "light-theme", Medium),
    class(Root, "theme-light", Medium),
    class(Body, "dark", High),
    class(Body, "dark-mode", High),
    class(Body, "dark-theme", High),
    class(Body, "theme-dark", High),
    class(Body, "light", Medium),
    class(Body, "light-mode", Medium),
    class(Body, "light-theme", Medium),
    class(Body, "theme-light", Medium),
    // library fingerprints
    library("darkmode-js", Probe::Selector(".darkmode-layer"), VeryHigh),
    library("darkmode-js", Probe::Selector(".darkmode-toggle"), VeryHigh),
    library(
        "darkmode-js",
        Probe::Class {
            target: Body,
            class: "darkmode--activated",
        },
        VeryHigh,
    ),
    library("darkreader", Probe::Global("DarkReader"), High),
    library(
        "darkreader",
        Probe::Attribute {
            target: Root,
            name: "data-darkreader-mode",
            value: None,
        },
        High,
    ),
    library(
        "darkreader",
        Probe::ClassScan(ClassPattern::Contains("darkreader")),
        High,
    ),
    // toggle controls
    toggle("[data-theme-toggle]"),
    toggle("[data-toggle-theme]"),
    toggle("[data-dark-mode-toggle]"),
    toggle(".theme-toggle"),
    toggle(".theme-switch"),
    toggle(".theme-switcher"),
    toggle(".dark-mode-toggle"),
    toggle(".mode-toggle"),
    toggle("#theme-toggle"),
    toggle("#dark-mode-toggle"),
    toggle("[aria-label*=\"dark\" i]"),
    toggle("[aria-label*=\"light\" i]"),
    toggle("[aria-label*=\"theme\" i]"),
    toggle("[aria-label*=\"mode\" i]"),
    // css custom properties
    css_variable("--background", Shade::Dark),
    css_variable("--bg", Shade::Dark),
    css_variable("--bg-color", Shade::Dark),
    css_variable("--background-color", Shade::Dark),
    css_variable("--color-background", Shade::Dark),
    css_variable("--body-bg", Shade::Dark),
    css_variable("--text-color", Shade::Light),
    css_variable("--text", Shade::Light),
    css_variable("--foreground", Shade::Light),
    css_variable("--color-text", Shade::Light),
    css_variable("--body-color", Shade::Light),
    // system preference
    Rule {
        kind: SignalKind::SystemPreference,
        tier: Low,
        probe: Probe::MediaFeature(DARK_SCHEME_QUERY),
        library: None,
    },
    // color-scheme property
    Rule {
        kind: SignalKind::ColorSchemeProperty,
        tier: High,
        probe: Probe::ColorScheme,
        library: None,
    },
    // utility dark variants
    Rule {
        kind: SignalKind::UtilityDarkClass,
        tier: VeryHigh,
        probe: Probe::ClassScan(ClassPattern::Prefix("dark:")),
        library: None,
    },
];

/// Ordered, immutable rule set handed to the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    rules: Vec<Rule>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// The full builtin rule table.
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_RULES.to_vec(),
        }
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Builtin rules narrowed by configuration.
    pub fn configured(config: &DetectorConfig) -> Self {
        let mut catalog = Self::builtin().without_kinds(&config.disabled_kinds);
        if config.skip_expensive {
            catalog = catalog.without_expensive();
        }
        catalog
    }

    pub fn without_expensive(self) -> Self {
        Self {
            rules: self.rules.into_iter().filter(|r| !r.is_expensive()).collect(),
        }
    }

    pub fn without_kinds(self, kinds: &[SignalKind]) -> Self {
        Self {
            rules: self
                .rules
                .into_iter()
                .filter(|r| !kinds.contains(&r.kind))
                .collect(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn by_kind(&self, kind: SignalKind) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_rules() {
        let catalog = Catalog::builtin();
        for kind in SignalKind::ALL {
            assert!(catalog.by_kind(kind).count() > 0, "no rules for {kind}");
        }
    }

    #[test]
    fn storage_rules_cover_required_keys_in_order() {
        let keys: Vec<&str> = Catalog::builtin()
            .by_kind(SignalKind::Storage)
            .filter_map(|r| match r.probe {
                Probe::StorageValue { key } => Some(key),
                _ => None,
            })
            .collect();

        assert_eq!(
            keys,
            vec![
                "theme",
                "darkMode",
                "dark-mode",
                "color-scheme",
                "theme-preference",
                "vueuse-color-scheme",
                "vite-ui-theme",
            ]
        );
    }

    #[test]
    fn system_preference_is_a_single_low_rule() {
        let catalog = Catalog::builtin();
        let rules: Vec<&Rule> = catalog.by_kind(SignalKind::SystemPreference).collect();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].tier, ConfidenceTier::Low);
    }

    #[test]
    fn only_class_scans_are_expensive() {
        let catalog = Catalog::builtin();
        let expensive: Vec<&Rule> =
            catalog.rules().iter().filter(|r| r.is_expensive()).collect();

        assert_eq!(expensive.len(), 2);
        assert!(expensive.iter().any(|r| r.kind == SignalKind::UtilityDarkClass));
        assert!(expensive.iter().any(|r| r.library == Some("darkreader")));
    }

    #[test]
    fn only_library_rules_name_a_library() {
        for rule in Catalog::builtin().rules() {
            assert_eq!(
                rule.kind == SignalKind::Library,
                rule.library.is_some(),
                "{rule:?}"
            );
        }
    }

    #[test]
    fn configuration_narrows_the_catalog() {
        let full = Catalog::builtin();

        let config = DetectorConfig {
            skip_expensive: true,
            disabled_kinds: vec![SignalKind::ToggleControl],
            ..Default::default()
        };
        let narrowed = Catalog::configured(&config);

        assert!(narrowed.len() < full.len());
        assert!(narrowed.rules().iter().all(|r| !r.is_expensive()));
        assert_eq!(narrowed.by_kind(SignalKind::ToggleControl).count(), 0);
        assert_eq!(narrowed.by_kind(SignalKind::UtilityDarkClass).count(), 0);
        assert!(narrowed.by_kind(SignalKind::Storage).count() > 0);
    }
}
