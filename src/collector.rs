//! Collector runtime
//!
//! One tokio task owns the host document, the [`EngagementTracker`] and the [`Dispatcher`].
//! Host callbacks arrive as [`HostEvent`]s over a channel, so no state is shared and nothing is
//! locked. The task sleeps on the dispatcher's debounce deadline between events and treats
//! cancellation, a closed channel or [`HostEvent::BeforeUnload`] as the page going away.

use std::sync::Arc;

use content_tree::{ArenaDocument, NodeSpec, Viewport};
use engagement_tracker::{EngagementTracker, Mutation};
use serde::Serialize;
use signal_dispatch::{Dispatcher, FlushMode, FlushOutcome, IdentityProvider, Transport};
use signaltap_core_types::{Millis, NodeId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CollectorConfig;
use crate::errors::CollectorError;

const EVENT_CAPACITY: usize = 256;

/// Callbacks a host page delivers to the collector.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    /// Page finished loading; the whole document is scanned.
    Load,
    Intersection { node: NodeId, ratio: f64 },
    PageVisibility { hidden: bool },
    PointerEnter { node: NodeId },
    PointerLeave { node: NodeId },
    Click { node: NodeId },
    Selection { anchor: NodeId, text: String },
    /// A fragment appended under `parent`.
    Insert { parent: NodeId, fragment: NodeSpec },
    Remove { node: NodeId },
    Resize { height: Option<f64> },
    /// Client-side navigation; later batches carry the new URL.
    UrlChanged { url: String },
    BeforeUnload,
}

/// The page a collector runs against.
#[derive(Clone, Debug)]
pub struct Page {
    pub url: String,
    pub document: ArenaDocument,
    pub viewport: Viewport,
}

/// Host page clock derived from the runtime clock. `rate` scales elapsed time so a replay run
/// faster than real time still reports page-time durations.
#[derive(Clone, Copy, Debug)]
pub struct PageClock {
    origin: Instant,
    rate: f64,
}

impl PageClock {
    pub fn start(rate: f64) -> Self {
        Self {
            origin: Instant::now(),
            rate,
        }
    }

    pub fn now(&self) -> Millis {
        let micros = self.origin.elapsed().as_micros() as f64;
        (micros * self.rate / 1_000.0).round() as Millis
    }
}

/// What happened during a collector run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CollectorReport {
    pub events: u64,
    pub tracked_elements: usize,
    pub batches_sent: u64,
    pub elements_sent: u64,
    pub beacons_accepted: u64,
    pub beacons_refused: u64,
    pub below_floor: u64,
    pub not_ready: u64,
    pub failed: u64,
    pub dropped_snapshots: u64,
    /// Snapshots still queued when the task stopped.
    pub pending_at_exit: usize,
}

impl CollectorReport {
    fn record(&mut self, outcome: &FlushOutcome) {
        match outcome {
            FlushOutcome::Idle => {}
            FlushOutcome::NotReady(_) => self.not_ready += 1,
            FlushOutcome::BelowFloor { .. } => self.below_floor += 1,
            FlushOutcome::Sent { elements } => {
                self.batches_sent += 1;
                self.elements_sent += *elements as u64;
            }
            FlushOutcome::BeaconAccepted { elements } => {
                self.beacons_accepted += 1;
                self.elements_sent += *elements as u64;
            }
            FlushOutcome::BeaconRefused(_) => self.beacons_refused += 1,
            FlushOutcome::Failed { .. } => self.failed += 1,
            FlushOutcome::Dropped { snapshots, .. } => {
                self.failed += 1;
                self.dropped_snapshots += *snapshots as u64;
            }
        }
    }
}

pub struct Collector {
    document: ArenaDocument,
    tracker: EngagementTracker,
    dispatcher: Dispatcher,
    clock_rate: f64,
    report: CollectorReport,
}

impl Collector {
    pub fn new(
        config: &CollectorConfig,
        page: Page,
        transport: Arc<dyn Transport>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let tracker = EngagementTracker::new(config.tracker_config(), page.viewport);
        let dispatcher = Dispatcher::new(config.dispatch.clone(), transport, identity, page.url);
        Self {
            document: page.document,
            tracker,
            dispatcher,
            clock_rate: 1.0,
            report: CollectorReport::default(),
        }
    }

    pub fn with_clock_rate(mut self, rate: f64) -> Self {
        self.clock_rate = rate;
        self
    }

    /// Starts the collector task. The page clock starts now.
    pub fn spawn(self) -> CollectorHandle {
        let (sender, receiver) = mpsc::channel(EVENT_CAPACITY);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(receiver, cancel.clone()));
        CollectorHandle {
            sender,
            cancel,
            task,
        }
    }

    async fn run(
        mut self,
        mut events: mpsc::Receiver<HostEvent>,
        cancel: CancellationToken,
    ) -> CollectorReport {
        let clock = PageClock::start(self.clock_rate);
        info!("collector started");
        loop {
            let deadline = self.dispatcher.deadline();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("collector cancelled");
                    break;
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush(FlushMode::Normal).await;
                }
                event = events.recv() => match event {
                    Some(HostEvent::BeforeUnload) => {
                        self.report.events += 1;
                        break;
                    }
                    Some(event) => {
                        self.report.events += 1;
                        self.handle(event, clock.now()).await;
                    }
                    None => {
                        debug!("host event channel closed");
                        break;
                    }
                },
            }
        }
        self.unload(clock.now()).await;
        self.report.tracked_elements = self.tracker.registry().len();
        self.report.pending_at_exit = self.dispatcher.pending_len();
        info!(
            events = self.report.events,
            batches = self.report.batches_sent,
            beacons = self.report.beacons_accepted,
            "collector stopped"
        );
        self.report
    }

    async fn handle(&mut self, event: HostEvent, now: Millis) {
        let root = self.document.root();
        let mut force_beacon = false;
        match event {
            HostEvent::Load => {
                self.tracker.scan(&self.document, root);
            }
            HostEvent::Intersection { node, ratio } => {
                self.tracker.on_intersection(node, ratio, now);
            }
            HostEvent::PageVisibility { hidden } => {
                force_beacon = self.tracker.on_page_visibility(hidden, now);
            }
            HostEvent::PointerEnter { node } => {
                self.tracker.on_pointer_enter(&self.document, node, now);
            }
            HostEvent::PointerLeave { node } => {
                self.tracker.on_pointer_leave(&self.document, node, now);
            }
            HostEvent::Click { node } => {
                self.tracker.on_click(&self.document, node);
            }
            HostEvent::Selection { anchor, text } => {
                self.tracker.on_selection(&self.document, anchor, &text);
            }
            HostEvent::Insert { parent, fragment } => match self.document.insert(parent, &fragment) {
                Ok(node) => {
                    self.tracker
                        .on_mutations(&self.document, &[Mutation::ChildAdded { node }], now);
                }
                Err(err) => warn!(%parent, error = %err, "insert skipped"),
            },
            HostEvent::Remove { node } => match self.document.detach(node) {
                Ok(()) => {
                    self.tracker
                        .on_mutations(&self.document, &[Mutation::ChildRemoved { node }], now);
                }
                Err(err) => warn!(%node, error = %err, "remove skipped"),
            },
            HostEvent::Resize { height } => {
                self.tracker
                    .on_resize(&self.document, root, Viewport { height });
            }
            HostEvent::UrlChanged { url } => {
                debug!(%url, "page url changed");
                self.dispatcher.set_page_url(url);
            }
            HostEvent::BeforeUnload => {}
        }
        self.forward();
        if force_beacon {
            self.flush(FlushMode::Beacon).await;
        }
    }

    async fn unload(&mut self, now: Millis) {
        self.tracker.drain(now);
        self.forward();
        self.flush(FlushMode::Beacon).await;
    }

    fn forward(&mut self) {
        let snapshots = self.tracker.take_snapshots();
        if !snapshots.is_empty() {
            self.dispatcher.collect(snapshots);
        }
    }

    async fn flush(&mut self, mode: FlushMode) {
        let outcome = self.dispatcher.flush(mode).await;
        self.tracker.acknowledge(&self.dispatcher.take_settled());
        self.report.record(&outcome);
    }
}

/// Owner side of a running collector.
pub struct CollectorHandle {
    sender: mpsc::Sender<HostEvent>,
    cancel: CancellationToken,
    task: JoinHandle<CollectorReport>,
}

impl CollectorHandle {
    pub async fn send(&self, event: HostEvent) -> Result<(), CollectorError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| CollectorError::Closed)
    }

    /// Asks the task to unload and stop without waiting for queued events.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Closes the event channel and waits for the final report.
    pub async fn finish(self) -> Result<CollectorReport, CollectorError> {
        drop(self.sender);
        self.task
            .await
            .map_err(|err| CollectorError::Join(err.to_string()))
    }
}
