//! Heuristic detection of dark-mode support on web pages.
//!
//! A [`Detector`] runs a fixed catalog of rules against a [`page::Page`],
//! scores the evidence into a confidence tier and guesses the theme the
//! page is currently showing. A [`ChangeMonitor`] re-runs detection when the
//! page mutates its own theme attributes.
pub mod aggregator;
pub mod catalog;
pub mod cli;
pub mod collector;
pub mod color;
pub mod command;
pub mod config;
pub mod detector;
pub mod error;
pub mod monitor;
pub mod page;
pub mod resolver;
pub mod result;
pub mod signal;

pub use detector::{DetectionResult, Detector};
pub use error::{DarkscopeError, PageError};
pub use monitor::{ChangeMonitor, MonitorEvent};
pub use resolver::Theme;
pub use signal::{ConfidenceTier, Signal, SignalKind};

#[cfg(test)]
pub mod test_helpers;
