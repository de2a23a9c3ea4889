//! In-memory page built from a JSON snapshot.
//!
//! `SnapshotPage` implements every host trait over plain data so detection
//! can run without a browser: captured page state from an extension, test
//! fixtures, or CLI input. Attribute writes notify subscribed observers the
//! way a live mutation observer would.
use log::*;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    error::{DarkscopeError, PageError, Result},
    page::{
        AttributeMutation, ClassPattern, Document, MediaMatcher, MutationSource, Node,
        Page, Storage, Subscription,
        selector::{Selectable, SelectorList},
    },
};

const DARK_QUERY: &str = "(prefers-color-scheme:dark)";
const LIGHT_QUERY: &str = "(prefers-color-scheme:light)";

/// One element of a captured page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ElementSnapshot {
    /// Empty when omitted; filled in from the element's position on load.
    pub tag: String,
    pub id: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub classes: Vec<String>,
    /// Computed style values keyed by property name, custom properties
    /// included.
    pub styles: BTreeMap<String, String>,
}

impl ElementSnapshot {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Fold `class` and `id` entries of the attribute map into the
    /// dedicated fields so there is a single source of truth, and give an
    /// untagged element the tag its position implies.
    fn normalize(&mut self, fallback_tag: &str) {
        if self.tag.is_empty() {
            self.tag = fallback_tag.to_string();
        }
        if let Some(class) = self.attributes.remove("class") {
            for c in class.split_whitespace() {
                if !self.classes.iter().any(|existing| existing == c) {
                    self.classes.push(c.to_string());
                }
            }
        }
        if let Some(id) = self.attributes.remove("id") {
            self.id = Some(id);
        }
    }

    fn get_attribute(&self, name: &str) -> Option<String> {
        match name {
            "class" if self.classes.is_empty() => None,
            "class" => Some(self.classes.join(" ")),
            "id" => self.id.clone(),
            _ => self.attributes.get(name).cloned(),
        }
    }

    fn write_attribute(&mut self, name: &str, value: Option<&str>) {
        match (name, value) {
            ("class", Some(v)) => {
                self.classes = v.split_whitespace().map(String::from).collect();
            }
            ("class", None) => self.classes.clear(),
            ("id", v) => self.id = v.map(String::from),
            (_, Some(v)) => {
                self.attributes.insert(name.to_string(), v.to_string());
            }
            (_, None) => {
                self.attributes.remove(name);
            }
        }
    }
}

impl Selectable for ElementSnapshot {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.get_attribute(name)
    }
}

fn default_root() -> ElementSnapshot {
    ElementSnapshot::new("html")
}

fn default_body() -> Option<ElementSnapshot> {
    Some(ElementSnapshot::new("body"))
}

/// Captured element tree plus the global script handles that were defined.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DocumentSnapshot {
    #[serde(default = "default_root")]
    pub root: ElementSnapshot,
    #[serde(default = "default_body")]
    pub body: Option<ElementSnapshot>,
    pub elements: Vec<ElementSnapshot>,
    pub globals: Vec<String>,
}

impl Default for DocumentSnapshot {
    fn default() -> Self {
        Self {
            root: default_root(),
            body: default_body(),
            elements: vec![],
            globals: vec![],
        }
    }
}

impl DocumentSnapshot {
    fn normalize(&mut self) {
        self.root.normalize("html");
        if let Some(body) = self.body.as_mut() {
            body.normalize("body");
        }
        for element in self.elements.iter_mut() {
            element.normalize("div");
        }
    }

    fn all(&self) -> impl Iterator<Item = &ElementSnapshot> {
        std::iter::once(&self.root)
            .chain(self.body.iter())
            .chain(self.elements.iter())
    }

    /// Resolve a node to the element it currently names.
    fn locate(&self, node: &Node) -> Option<Slot> {
        match node {
            Node::Root => Some(Slot::Root),
            Node::Body => self.body.as_ref().map(|_| Slot::Body),
            Node::Id(id) => {
                let has_id = |e: &ElementSnapshot| e.id.as_deref() == Some(id.as_str());
                if has_id(&self.root) {
                    Some(Slot::Root)
                } else if self.body.as_ref().is_some_and(has_id) {
                    Some(Slot::Body)
                } else {
                    self.elements.iter().position(has_id).map(Slot::Element)
                }
            }
        }
    }

    fn at(&self, slot: Slot) -> Option<&ElementSnapshot> {
        match slot {
            Slot::Root => Some(&self.root),
            Slot::Body => self.body.as_ref(),
            Slot::Element(index) => self.elements.get(index),
        }
    }

    fn at_mut(&mut self, slot: Slot) -> Option<&mut ElementSnapshot> {
        match slot {
            Slot::Root => Some(&mut self.root),
            Slot::Body => self.body.as_mut(),
            Slot::Element(index) => self.elements.get_mut(index),
        }
    }

    fn element(&self, node: &Node) -> Option<&ElementSnapshot> {
        self.locate(node).and_then(|slot| self.at(slot))
    }
}

/// Position of an element in the snapshot. Elements are never added or
/// removed, so a slot identifies the same element for the page's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Root,
    Body,
    Element(usize),
}

/// Captured storage contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageSnapshot {
    pub entries: BTreeMap<String, String>,
    /// Every storage call is refused, as with a sandboxed or cross-origin
    /// frame.
    pub denied: bool,
}

/// Root of the snapshot file format.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageSnapshot {
    pub storage: StorageSnapshot,
    pub prefers_dark: bool,
    /// `None` models a page without any document object.
    pub document: Option<DocumentSnapshot>,
}

impl Default for PageSnapshot {
    fn default() -> Self {
        Self {
            storage: StorageSnapshot::default(),
            prefers_dark: false,
            document: Some(DocumentSnapshot::default()),
        }
    }
}

struct SnapshotStorage {
    entries: RwLock<BTreeMap<String, String>>,
    denied: bool,
}

impl SnapshotStorage {
    fn check(&self, op: &str) -> std::result::Result<(), PageError> {
        if self.denied {
            return Err(PageError::AccessDenied(format!("storage {op}")));
        }
        Ok(())
    }
}

impl Storage for SnapshotStorage {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, PageError> {
        self.check("get")?;
        let entries = self
            .entries
            .read()
            .map_err(|_| PageError::Unavailable("storage lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> std::result::Result<(), PageError> {
        self.check("set")?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| PageError::Unavailable("storage lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self) -> std::result::Result<(), PageError> {
        self.check("clear")?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| PageError::Unavailable("storage lock poisoned".into()))?;
        entries.clear();
        Ok(())
    }
}

struct SnapshotMedia {
    prefers_dark: AtomicBool,
}

impl MediaMatcher for SnapshotMedia {
    fn matches(&self, query: &str) -> std::result::Result<bool, PageError> {
        let normalized: String = query.chars().filter(|c| !c.is_whitespace()).collect();
        let prefers_dark = self.prefers_dark.load(Ordering::SeqCst);

        match normalized.to_ascii_lowercase().as_str() {
            DARK_QUERY => Ok(prefers_dark),
            LIGHT_QUERY => Ok(!prefers_dark),
            _ => Ok(false),
        }
    }
}

struct Observer {
    id: u64,
    slot: Slot,
    /// The node as the subscriber named it; mutations are reported with it.
    node: Node,
    sender: UnboundedSender<AttributeMutation>,
}

#[derive(Default)]
struct Observers {
    next_id: u64,
    entries: Vec<Observer>,
}

struct SnapshotDocument {
    state: RwLock<DocumentSnapshot>,
}

impl SnapshotDocument {
    fn read<T>(&self, f: impl FnOnce(&DocumentSnapshot) -> T) -> Option<T> {
        match self.state.read() {
            Ok(state) => Some(f(&state)),
            Err(_) => {
                warn!("document state lock poisoned");
                None
            }
        }
    }
}

impl Document for SnapshotDocument {
    fn element_exists(&self, node: &Node) -> bool {
        self.read(|doc| doc.element(node).is_some())
            .unwrap_or(false)
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        self.read(|doc| doc.element(node).and_then(|e| e.get_attribute(name)))
            .flatten()
    }

    fn has_class(&self, node: &Node, class: &str) -> bool {
        self.read(|doc| doc.element(node).is_some_and(|e| e.has_class(class)))
            .unwrap_or(false)
    }

    fn computed_style(&self, node: &Node, property: &str) -> Option<String> {
        self.read(|doc| {
            doc.element(node)
                .and_then(|e| e.styles.get(property).cloned())
        })
        .flatten()
    }

    fn query_selector(&self, selector: &str) -> std::result::Result<bool, PageError> {
        let list = SelectorList::parse(selector)?;
        self.read(|doc| doc.all().any(|e| list.matches(e)))
            .ok_or_else(|| PageError::Unavailable("document lock poisoned".into()))
    }

    fn find_class(&self, pattern: ClassPattern) -> Option<String> {
        self.read(|doc| {
            doc.all()
                .flat_map(|e| e.classes.iter())
                .find(|c| pattern.matches(c))
                .cloned()
        })
        .flatten()
    }

    fn has_global(&self, name: &str) -> bool {
        self.read(|doc| doc.globals.iter().any(|g| g == name))
            .unwrap_or(false)
    }
}

/// Mutable in-memory page.
pub struct SnapshotPage {
    storage: SnapshotStorage,
    media: SnapshotMedia,
    document: Option<SnapshotDocument>,
    observers: Arc<Mutex<Observers>>,
}

impl From<PageSnapshot> for SnapshotPage {
    fn from(snapshot: PageSnapshot) -> Self {
        let document = snapshot.document.map(|mut doc| {
            doc.normalize();
            SnapshotDocument {
                state: RwLock::new(doc),
            }
        });

        Self {
            storage: SnapshotStorage {
                entries: RwLock::new(snapshot.storage.entries),
                denied: snapshot.storage.denied,
            },
            media: SnapshotMedia {
                prefers_dark: AtomicBool::new(snapshot.prefers_dark),
            },
            document,
            observers: Arc::new(Mutex::new(Observers::default())),
        }
    }
}

impl SnapshotPage {
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: PageSnapshot = serde_json::from_str(json)?;
        Ok(Self::from(snapshot))
    }

    /// Load a snapshot file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("loading page snapshot: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| {
            DarkscopeError::invalid_snapshot(format!("{}: {e}", path.display()))
        })
    }

    pub fn set_prefers_dark(&self, prefers_dark: bool) {
        self.media.prefers_dark.store(prefers_dark, Ordering::SeqCst);
    }

    /// Write an attribute and notify observers of the element `node` names.
    pub fn set_attribute(
        &self,
        node: &Node,
        name: &str,
        value: &str,
    ) -> std::result::Result<(), PageError> {
        self.write_attribute(node, name, Some(value))
    }

    pub fn remove_attribute(
        &self,
        node: &Node,
        name: &str,
    ) -> std::result::Result<(), PageError> {
        self.write_attribute(node, name, None)
    }

    /// Number of live observations, for tests and diagnostics.
    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .map(|o| o.entries.len())
            .unwrap_or_default()
    }

    fn write_attribute(
        &self,
        node: &Node,
        name: &str,
        value: Option<&str>,
    ) -> std::result::Result<(), PageError> {
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| PageError::Unavailable("page has no document".into()))?;

        let (slot, old_value) = {
            let mut state = document
                .state
                .write()
                .map_err(|_| PageError::Unavailable("document lock poisoned".into()))?;
            let missing = || PageError::Unavailable(format!("no element {node}"));
            let slot = state.locate(node).ok_or_else(missing)?;
            let element = state.at_mut(slot).ok_or_else(missing)?;
            let old_value = element.get_attribute(name);
            element.write_attribute(name, value);
            (slot, old_value)
        };

        let mutation = AttributeMutation {
            node: node.clone(),
            attribute: name.to_string(),
            old_value,
            new_value: value.map(String::from),
        };

        self.notify(slot, mutation);
        Ok(())
    }

    fn notify(&self, slot: Slot, mutation: AttributeMutation) {
        let Ok(mut observers) = self.observers.lock() else {
            warn!("observer registry lock poisoned");
            return;
        };

        observers.entries.retain(|observer| {
            if observer.slot != slot {
                return true;
            }
            let delivered = AttributeMutation {
                node: observer.node.clone(),
                ..mutation.clone()
            };
            observer.sender.send(delivered).is_ok()
        });
    }
}

impl MutationSource for SnapshotPage {
    fn observe(
        &self,
        node: &Node,
        sender: UnboundedSender<AttributeMutation>,
    ) -> Option<Subscription> {
        let document = self.document.as_ref()?;
        let slot = document.read(|doc| doc.locate(node)).flatten()?;

        let mut observers = self.observers.lock().ok()?;
        let id = observers.next_id;
        observers.next_id += 1;
        observers.entries.push(Observer {
            id,
            slot,
            node: node.clone(),
            sender,
        });

        let registry = Arc::clone(&self.observers);
        Some(Subscription::new(move || {
            if let Ok(mut observers) = registry.lock() {
                observers.entries.retain(|o| o.id != id);
            }
        }))
    }
}

impl Page for SnapshotPage {
    fn storage(&self) -> &dyn Storage {
        &self.storage
    }

    fn document(&self) -> Option<&dyn Document> {
        self.document.as_ref().map(|d| d as &dyn Document)
    }

    fn media(&self) -> &dyn MediaMatcher {
        &self.media
    }

    fn mutations(&self) -> &dyn MutationSource {
        self
    }
}
