//! Color parsing and perceptual light/dark classification.
//!
//! Only two textual forms are understood: six digit hex (`#rrggbb`) and
//! `rgb(r, g, b)`. Anything else (named colors, short hex, `rgba()`,
//! `hsl()`, empty strings) is indeterminate and classifies to `None`.
use regex::Regex;
use serde::Serialize;
use std::{str::FromStr, sync::LazyLock};

use crate::error::DarkscopeError;

static HEX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$").unwrap()
});

static RGB_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^rgb\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*\)$")
        .unwrap()
});

/// Luminance at or above this value is light. A value of exactly 0.5 is
/// light.
pub const DARK_LUMINANCE_THRESHOLD: f64 = 0.5;

/// Whether a color reads as dark or light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shade {
    Dark,
    Light,
}

impl Shade {
    /// Map a normalized luminance onto a shade using the strict `< 0.5`
    /// threshold.
    pub fn from_luminance(luminance: f64) -> Self {
        if luminance < DARK_LUMINANCE_THRESHOLD {
            Shade::Dark
        } else {
            Shade::Light
        }
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, Shade::Dark)
    }
}

/// Struct representing an RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Perceptual luminance normalized to `[0, 1]`.
    pub fn luminance(&self) -> f64 {
        let weighted = 0.299 * f64::from(self.0)
            + 0.587 * f64::from(self.1)
            + 0.114 * f64::from(self.2);
        weighted / 255.0
    }

    pub fn shade(&self) -> Shade {
        Shade::from_luminance(self.luminance())
    }
}

impl FromStr for Rgb {
    type Err = DarkscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();

        let (captures, radix) = if let Some(c) = HEX_REGEX.captures(value) {
            (c, 16)
        } else if let Some(c) = RGB_REGEX.captures(value) {
            (c, 10)
        } else {
            return Err(DarkscopeError::invalid_color(value));
        };

        let mut channels = [0u8; 3];

        for (i, channel) in channels.iter_mut().enumerate() {
            let text = captures
                .get(i + 1)
                .map(|m| m.as_str())
                .ok_or_else(|| DarkscopeError::invalid_color(value))?;
            *channel = u8::from_str_radix(text, radix)
                .map_err(|_| DarkscopeError::invalid_color(value))?;
        }

        Ok(Rgb(channels[0], channels[1], channels[2]))
    }
}

/// Classify a color string as dark or light. Returns `None` for any
/// value that is not `#rrggbb` or `rgb(r, g, b)`.
pub fn classify(color: &str) -> Option<Shade> {
    Rgb::from_str(color).ok().map(|rgb| rgb.shade())
}
