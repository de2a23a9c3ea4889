//! Best guess at the theme currently shown by the page.
//!
//! Sources are consulted in a fixed priority order and the first one that
//! answers wins:
//!
//! 1. storage `theme`, `darkMode`, `color-scheme` holding exactly `dark` or
//!    `light`
//! 2. `data-theme` on the root element, or `data-bs-theme` when that is
//!    absent, taken verbatim
//! 3. `dark` then `light` class on the root element
//! 4. unknown
use log::*;
use serde::Serialize;
use std::fmt;

use crate::page::{Node, Page};

/// Storage keys consulted for the current theme, in priority order.
pub const THEME_STORAGE_KEYS: [&str; 3] = ["theme", "darkMode", "color-scheme"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
    Unknown,
}

impl Theme {
    /// Exact `dark` / `light` values only.
    fn from_exact(value: &str) -> Option<Self> {
        match value {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Dark => f.write_str("dark"),
            Theme::Light => f.write_str("light"),
            Theme::Unknown => f.write_str("unknown"),
        }
    }
}

pub fn resolve_theme(page: &dyn Page) -> Theme {
    for key in THEME_STORAGE_KEYS {
        match page.storage().get(key) {
            Ok(Some(value)) => {
                if let Some(theme) = Theme::from_exact(&value) {
                    debug!("theme resolved from storage {key}: {theme}");
                    return theme;
                }
            }
            Ok(None) => {}
            Err(e) => debug!("theme storage {key} unreadable: {e}"),
        }
    }

    let Some(doc) = page.document() else {
        return Theme::Unknown;
    };

    let attribute = ["data-theme", "data-bs-theme"]
        .into_iter()
        .find_map(|name| {
            doc.attribute(&Node::Root, name)
                .filter(|v| !v.is_empty())
                .map(|v| (name, v))
        });

    // A present attribute settles the question even when its value is not
    // one we recognize.
    if let Some((name, value)) = attribute {
        let theme = Theme::from_exact(&value).unwrap_or(Theme::Unknown);
        debug!("theme resolved from root {name}=\"{value}\": {theme}");
        return theme;
    }

    if doc.has_class(&Node::Root, "dark") {
        return Theme::Dark;
    }

    if doc.has_class(&Node::Root, "light") {
        return Theme::Light;
    }

    Theme::Unknown
}
