//! Re-runs detection when a page changes its own theme state.
//!
//! The monitor is either idle or observing. While observing it listens for
//! attribute mutations on the root element, the body and any application
//! mount points that exist. The first relevant mutation is reported right
//! away and opens a debounce window. Every further relevant mutation pushes
//! the window's end back, so a burst is scored once it settles: the whole
//! pipeline runs again and the fresh result is reported together with every
//! mutation the window absorbed.
use log::*;
use serde::Serialize;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    runtime::Handle,
    sync::mpsc::{self, UnboundedReceiver},
    task::JoinHandle,
    time::{Instant, sleep_until},
};

use crate::{
    config::DetectorConfig,
    detector::{DetectionResult, Detector},
    error::{DarkscopeError, Result},
    page::{AttributeMutation, Node, Page, Subscription},
};

/// Attributes whose mutation can change the theme.
pub const WATCHED_ATTRIBUTES: [&str; 6] = [
    "class",
    "data-theme",
    "data-mode",
    "color-mode",
    "data-bs-theme",
    "style",
];

pub fn is_watched(attribute: &str) -> bool {
    WATCHED_ATTRIBUTES.contains(&attribute)
}

/// Delivered to the monitor callback, twice per settled burst.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum MonitorEvent {
    /// The mutation that opened the window, reported immediately.
    Mutation(AttributeMutation),
    /// Fresh detection result once the window closes.
    Refreshed {
        result: DetectionResult,
        mutations: Vec<AttributeMutation>,
    },
}

pub type MonitorCallback = Box<dyn FnMut(MonitorEvent) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Observing,
}

type SharedCallback = Arc<Mutex<Option<MonitorCallback>>>;

struct Active {
    callback: SharedCallback,
    task: JoinHandle<()>,
    subscriptions: Vec<Subscription>,
}

pub struct ChangeMonitor<P: Page + 'static> {
    detector: Detector,
    page: Arc<P>,
    debounce: Duration,
    targets: Vec<Node>,
    active: Option<Active>,
}

impl<P: Page + 'static> ChangeMonitor<P> {
    pub fn new(detector: Detector, page: Arc<P>, config: &DetectorConfig) -> Self {
        let targets = [Node::Root, Node::Body]
            .into_iter()
            .chain(config.app_root_ids.iter().cloned().map(Node::Id))
            .collect();

        Self {
            detector,
            page,
            debounce: config.debounce(),
            targets,
            active: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        if self.active.is_some() {
            MonitorState::Observing
        } else {
            MonitorState::Idle
        }
    }

    /// Subscribe to every existing target and begin delivering events.
    /// Must be called from within a tokio runtime.
    pub fn start(
        &mut self,
        callback: impl FnMut(MonitorEvent) + Send + 'static,
    ) -> Result<()> {
        if self.active.is_some() {
            return Err(DarkscopeError::AlreadyObserving);
        }

        if self.page.document().is_none() {
            return Err(DarkscopeError::MissingDocument);
        }

        let runtime = Handle::try_current().map_err(|_| DarkscopeError::NoRuntime)?;

        let (sender, receiver) = mpsc::unbounded_channel();

        let subscriptions: Vec<Subscription> = self
            .targets
            .iter()
            .filter_map(|node| {
                let subscription = self.page.mutations().observe(node, sender.clone());
                if subscription.is_none() {
                    debug!("monitor target {node} not present: skipping");
                }
                subscription
            })
            .collect();

        let callback: MonitorCallback = Box::new(callback);
        let callback: SharedCallback = Arc::new(Mutex::new(Some(callback)));

        let task = runtime.spawn(watch(
            receiver,
            self.detector.clone(),
            Arc::clone(&self.page),
            self.debounce,
            Arc::clone(&callback),
        ));

        info!(
            "change monitor observing {} nodes (debounce {}ms)",
            subscriptions.len(),
            self.debounce.as_millis()
        );

        self.active = Some(Active {
            callback,
            task,
            subscriptions,
        });

        Ok(())
    }

    /// Stop observing. Idempotent. No callback runs once this returns, and
    /// any pending re-detection is cancelled.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        // Waits for an in-flight callback, then disarms all future ones.
        lock(&active.callback).take();
        active.task.abort();
        drop(active.subscriptions);

        info!("change monitor stopped");
    }
}

impl<P: Page + 'static> Drop for ChangeMonitor<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(callback: &SharedCallback) -> std::sync::MutexGuard<'_, Option<MonitorCallback>> {
    callback.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn emit(callback: &SharedCallback, event: MonitorEvent) {
    if let Some(callback) = lock(callback).as_mut() {
        callback(event);
    }
}

async fn watch<P: Page + 'static>(
    mut receiver: UnboundedReceiver<AttributeMutation>,
    detector: Detector,
    page: Arc<P>,
    debounce: Duration,
    callback: SharedCallback,
) {
    let mut window: Vec<AttributeMutation> = vec![];
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            received = receiver.recv() => {
                let Some(mutation) = received else {
                    if deadline.is_some() {
                        debug!("monitor subscriptions closed: running pending refresh");
                        refresh(&detector, &*page, &callback, &mut window);
                    } else {
                        debug!("all monitor subscriptions closed");
                    }
                    break;
                };

                if !is_watched(&mutation.attribute) {
                    continue;
                }

                debug!(
                    "theme mutation on {}: {} {:?} -> {:?}",
                    mutation.node, mutation.attribute, mutation.old_value, mutation.new_value
                );

                let opens_window = deadline.is_none();
                deadline = Some(Instant::now() + debounce);
                window.push(mutation.clone());

                if opens_window {
                    emit(&callback, MonitorEvent::Mutation(mutation));
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                refresh(&detector, &*page, &callback, &mut window);
            }
        }
    }
}

/// Re-run detection and report it with the mutations gathered so far.
fn refresh(
    detector: &Detector,
    page: &dyn Page,
    callback: &SharedCallback,
    window: &mut Vec<AttributeMutation>,
) {
    let mutations = std::mem::take(window);

    match detector.detect(page) {
        Ok(result) => emit(callback, MonitorEvent::Refreshed { result, mutations }),
        Err(e) => warn!("re-detection after mutation failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        page::snapshot::SnapshotPage,
        resolver::Theme,
        signal::{ConfidenceTier, SignalKind},
        test_helpers::page_from_json,
    };
    use tokio::time::sleep;

    type Events = Arc<Mutex<Vec<MonitorEvent>>>;

    fn recorder() -> (Events, impl FnMut(MonitorEvent) + Send + 'static) {
        let events: Events = Arc::new(Mutex::new(vec![]));
        let sink = Arc::clone(&events);
        (events, move |event| sink.lock().unwrap().push(event))
    }

    fn monitor(page: &Arc<SnapshotPage>) -> ChangeMonitor<SnapshotPage> {
        ChangeMonitor::new(
            Detector::default(),
            Arc::clone(page),
            &DetectorConfig::default(),
        )
    }

    fn window() -> Duration {
        DetectorConfig::default().debounce() * 2
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_mutations_produce_exactly_two_callbacks() {
        let page = Arc::new(page_from_json("{}"));
        let mut monitor = monitor(&page);
        let (events, callback) = recorder();
        monitor.start(callback).unwrap();

        page.set_attribute(&Node::Root, "class", "dark").unwrap();
        page.set_attribute(&Node::Root, "class", "dark antialiased").unwrap();
        page.set_attribute(&Node::Root, "class", "dark").unwrap();

        sleep(window()).await;
        monitor.stop();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);

        let MonitorEvent::Mutation(first) = &events[0] else {
            panic!("expected raw mutation first, got {:?}", events[0]);
        };
        assert_eq!(first.node, Node::Root);
        assert_eq!(first.attribute, "class");
        assert_eq!(first.old_value, None);
        assert_eq!(first.new_value.as_deref(), Some("dark"));

        let MonitorEvent::Refreshed { result, mutations } = &events[1] else {
            panic!("expected refreshed result second, got {:?}", events[1]);
        };
        assert_eq!(mutations.len(), 3);
        assert_eq!(result.current_theme, Theme::Dark);
        assert!(
            result
                .signals
                .iter()
                .any(|s| s.kind() == SignalKind::ClassName)
        );
        assert_eq!(result.confidence, ConfidenceTier::Medium);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_windows_report_separately() {
        let page = Arc::new(page_from_json("{}"));
        let mut monitor = monitor(&page);
        let (events, callback) = recorder();
        monitor.start(callback).unwrap();

        page.set_attribute(&Node::Body, "data-theme", "dark").unwrap();
        sleep(window()).await;
        page.set_attribute(&Node::Body, "data-theme", "light").unwrap();
        sleep(window()).await;
        monitor.stop();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], MonitorEvent::Mutation(_)));
        assert!(matches!(events[1], MonitorEvent::Refreshed { .. }));
        assert!(matches!(events[2], MonitorEvent::Mutation(_)));
        assert!(matches!(events[3], MonitorEvent::Refreshed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_longer_than_debounce_settles_into_one_refresh() {
        let page = Arc::new(page_from_json("{}"));
        let mut monitor = monitor(&page);
        let (events, callback) = recorder();
        monitor.start(callback).unwrap();

        let gap = DetectorConfig::default().debounce() * 3 / 5;
        for class in ["dark", "light", "dark", "light", "dark"] {
            page.set_attribute(&Node::Root, "class", class).unwrap();
            sleep(gap).await;
        }
        sleep(window() * 2).await;
        monitor.stop();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], MonitorEvent::Mutation(_)));

        let MonitorEvent::Refreshed { result, mutations } = &events[1] else {
            panic!("expected refreshed result second, got {:?}", events[1]);
        };
        assert_eq!(mutations.len(), 5);
        assert_eq!(result.current_theme, Theme::Dark);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_subscriptions_flush_pending_refresh() {
        let page = Arc::new(page_from_json("{}"));
        let (events, callback) = recorder();
        let callback: MonitorCallback = Box::new(callback);
        let callback: SharedCallback = Arc::new(Mutex::new(Some(callback)));
        let (sender, receiver) = mpsc::unbounded_channel();

        sender
            .send(AttributeMutation {
                node: Node::Root,
                attribute: "class".into(),
                old_value: None,
                new_value: Some("dark".into()),
            })
            .unwrap();
        drop(sender);

        watch(
            receiver,
            Detector::default(),
            Arc::clone(&page),
            DetectorConfig::default().debounce(),
            callback,
        )
        .await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], MonitorEvent::Mutation(_)));

        let MonitorEvent::Refreshed { mutations, .. } = &events[1] else {
            panic!("expected refreshed result second, got {:?}", events[1]);
        };
        assert_eq!(mutations.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unwatched_attributes_are_ignored() {
        let page = Arc::new(page_from_json("{}"));
        let mut monitor = monitor(&page);
        let (events, callback) = recorder();
        monitor.start(callback).unwrap();

        page.set_attribute(&Node::Root, "lang", "en").unwrap();
        page.set_attribute(&Node::Body, "aria-busy", "true").unwrap();
        sleep(window()).await;
        monitor.stop();

        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_refresh_and_silences_callbacks() {
        let page = Arc::new(page_from_json("{}"));
        let mut monitor = monitor(&page);
        let (events, callback) = recorder();
        monitor.start(callback).unwrap();

        page.set_attribute(&Node::Root, "data-theme", "dark").unwrap();
        sleep(Duration::from_millis(1)).await;
        monitor.stop();
        assert_eq!(monitor.state(), MonitorState::Idle);
        assert_eq!(page.observer_count(), 0);

        page.set_attribute(&Node::Root, "data-theme", "light").unwrap();
        sleep(window()).await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], MonitorEvent::Mutation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn absent_app_roots_are_skipped() {
        let page = Arc::new(page_from_json(
            r#"{ "document": { "elements": [ { "id": "__next" } ] } }"#,
        ));
        let mut monitor = monitor(&page);
        let (events, callback) = recorder();
        monitor.start(callback).unwrap();

        // root, body and #__next; #root, #app, #__nuxt and #__layout are absent
        assert_eq!(page.observer_count(), 3);

        page.set_attribute(&Node::Id("__next".into()), "class", "dark")
            .unwrap();
        sleep(window()).await;
        monitor.stop();

        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_follow_the_state_machine() {
        let page = Arc::new(page_from_json("{}"));
        let mut monitor = monitor(&page);
        assert_eq!(monitor.state(), MonitorState::Idle);

        monitor.stop();
        assert_eq!(monitor.state(), MonitorState::Idle);

        monitor.start(|_| {}).unwrap();
        assert_eq!(monitor.state(), MonitorState::Observing);
        assert!(matches!(
            monitor.start(|_| {}),
            Err(DarkscopeError::AlreadyObserving)
        ));

        monitor.stop();
        monitor.stop();
        assert_eq!(monitor.state(), MonitorState::Idle);

        monitor.start(|_| {}).unwrap();
        assert_eq!(monitor.state(), MonitorState::Observing);
        drop(monitor);
        assert_eq!(page.observer_count(), 0);
    }

    #[tokio::test]
    async fn start_requires_a_document() {
        let page = Arc::new(page_from_json(r#"{ "document": null }"#));
        let mut monitor = monitor(&page);
        assert!(matches!(
            monitor.start(|_| {}),
            Err(DarkscopeError::MissingDocument)
        ));
    }

    #[test]
    fn start_outside_a_runtime_fails() {
        let page = Arc::new(page_from_json("{}"));
        let mut monitor = monitor(&page);
        assert!(matches!(
            monitor.start(|_| {}),
            Err(DarkscopeError::NoRuntime)
        ));
        assert_eq!(monitor.state(), MonitorState::Idle);
    }

    #[test]
    fn watched_attribute_set() {
        for attribute in WATCHED_ATTRIBUTES {
            assert!(is_watched(attribute));
        }
        assert!(!is_watched("data-color"));
    }
}
