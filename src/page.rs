//! Host environment abstraction.
//!
//! The detector never talks to a browser directly. A host (a browser
//! extension bridge, a headless driver, or the in-memory [`snapshot`] page)
//! implements these traits and hands a [`Page`] to the pipeline. Every read
//! is expected to be synchronous and side-effect free.

pub mod selector;
pub mod snapshot;

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::PageError;

/// Element addressed by the detector or the change monitor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    /// The document element, conventionally `<html>`.
    Root,
    Body,
    /// An element looked up by its id attribute.
    Id(String),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Root => f.write_str("html"),
            Node::Body => f.write_str("body"),
            Node::Id(id) => write!(f, "#{id}"),
        }
    }
}

/// Match applied to every class of every element during a document scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassPattern {
    Prefix(&'static str),
    Contains(&'static str),
}

impl ClassPattern {
    pub fn matches(&self, class: &str) -> bool {
        match self {
            ClassPattern::Prefix(prefix) => class.starts_with(prefix),
            ClassPattern::Contains(needle) => class.contains(needle),
        }
    }
}

impl fmt::Display for ClassPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassPattern::Prefix(prefix) => write!(f, "class^={prefix}"),
            ClassPattern::Contains(needle) => write!(f, "class*={needle}"),
        }
    }
}

/// One observed attribute change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeMutation {
    pub node: Node,
    pub attribute: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Key-value storage (`localStorage` style). Any call may be refused.
#[cfg_attr(test, mockall::automock)]
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, PageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PageError>;
    fn clear(&self) -> Result<(), PageError>;
}

/// Read access to the live element tree.
pub trait Document {
    fn element_exists(&self, node: &Node) -> bool;
    fn attribute(&self, node: &Node, name: &str) -> Option<String>;
    fn has_class(&self, node: &Node, class: &str) -> bool;
    /// Resolved computed style value, custom properties included.
    fn computed_style(&self, node: &Node, property: &str) -> Option<String>;
    /// Whether any element matches the selector.
    fn query_selector(&self, selector: &str) -> Result<bool, PageError>;
    /// First class on any element matching the pattern. Visits every
    /// element, so cost is linear in the size of the document.
    fn find_class(&self, pattern: ClassPattern) -> Option<String>;
    /// Whether a named global script handle is defined.
    fn has_global(&self, name: &str) -> bool;
}

/// Media feature evaluation (`matchMedia`).
#[cfg_attr(test, mockall::automock)]
pub trait MediaMatcher {
    fn matches(&self, query: &str) -> Result<bool, PageError>;
}

/// Attribute mutation observation.
pub trait MutationSource {
    /// Start forwarding attribute mutations on `node` to `sender`. Returns
    /// `None` when the node does not exist.
    fn observe(
        &self,
        node: &Node,
        sender: UnboundedSender<AttributeMutation>,
    ) -> Option<Subscription>;
}

/// Everything a detection pass or a change monitor needs from the host.
pub trait Page: Send + Sync {
    fn storage(&self) -> &dyn Storage;
    /// `None` when there is no document-like object at all.
    fn document(&self) -> Option<&dyn Document>;
    fn media(&self) -> &dyn MediaMatcher;
    fn mutations(&self) -> &dyn MutationSource;
}

/// Handle for an active observation. Unsubscribes when cancelled or
/// dropped.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn cancel(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}
