//! Common test helper functions shared across test modules.
use std::collections::BTreeMap;

use crate::{
    catalog::Catalog,
    detector::Detector,
    page::snapshot::{PageSnapshot, SnapshotPage, StorageSnapshot},
    signal::SignalKind,
};

/// Builds a page from an inline JSON snapshot.
///
/// # Example
/// ```ignore
/// let page = page_from_json(r#"{ "document": { "root": { "classes": ["dark"] } } }"#);
/// ```
pub fn page_from_json(json: &str) -> SnapshotPage {
    SnapshotPage::from_json(json).unwrap()
}

/// Builds an otherwise empty page with the given storage entries.
pub fn storage_page(entries: &[(&str, &str)]) -> SnapshotPage {
    let entries: BTreeMap<String, String> = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    SnapshotPage::from(PageSnapshot {
        storage: StorageSnapshot {
            entries,
            denied: false,
        },
        ..Default::default()
    })
}

/// Detector without the always-firing system preference rule, for
/// scenarios that reason about exact weights.
pub fn without_system_preference() -> Detector {
    Detector::new(Catalog::builtin().without_kinds(&[SignalKind::SystemPreference]))
}
