use std::sync::Arc;

use engagement_tracker::SignalSnapshot;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::DispatchConfig;
use crate::errors::{DispatchError, TransportError};
use crate::identity::IdentityProvider;
use crate::merge::Merger;
use crate::metrics;
use crate::payload::{IdRef, SignalBatch};
use crate::transport::Transport;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlushMode {
    /// Awaited request; the queue is cleared on confirmed success.
    Normal,
    /// Fire-and-forget hand-off for tab hide and unload.
    Beacon,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FlushOutcome {
    /// Nothing was queued.
    Idle,
    /// Configuration or identity incomplete; the queue is kept.
    NotReady(DispatchError),
    /// Every merged record fell below the engagement floor; the queue was cleared.
    BelowFloor { snapshots: usize },
    Sent { elements: usize },
    BeaconAccepted { elements: usize },
    /// Beacon hand-off refused; the queue is kept.
    BeaconRefused(TransportError),
    /// Normal request failed; the queue is kept for the next cycle.
    Failed { attempt: u32, error: TransportError },
    /// Retry limit reached; the queue was discarded.
    Dropped { snapshots: usize, error: TransportError },
}

struct Target {
    endpoint: Url,
    batch: SignalBatch,
    included: Vec<usize>,
}

/// Debounced batching and delivery of queued snapshots.
///
/// Owned by a single task: `collect` arms the debounce deadline, the owner sleeps until
/// [`Dispatcher::deadline`] and then calls [`Dispatcher::flush`]. Snapshots that left the
/// queue for good (delivered, handed to a beacon or dropped at the retry limit) are reported
/// by [`Dispatcher::take_settled`] so the owner can release them from the live records.
pub struct Dispatcher {
    config: DispatchConfig,
    merger: Merger,
    transport: Arc<dyn Transport>,
    identity: Arc<dyn IdentityProvider>,
    page_url: String,
    pending: Vec<SignalSnapshot>,
    settled: Vec<SignalSnapshot>,
    deadline: Option<Instant>,
    failures: u32,
}

impl Dispatcher {
    pub fn new(
        config: DispatchConfig,
        transport: Arc<dyn Transport>,
        identity: Arc<dyn IdentityProvider>,
        page_url: impl Into<String>,
    ) -> Self {
        Self {
            merger: Merger::new(config.engagement_floor_ms),
            config,
            transport,
            identity,
            page_url: page_url.into(),
            pending: Vec::new(),
            settled: Vec::new(),
            deadline: None,
            failures: 0,
        }
    }

    pub fn set_page_url(&mut self, url: impl Into<String>) {
        self.page_url = url.into();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// When the armed debounce fires, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Queues snapshots and arms the debounce if it is not armed yet. A snapshot replaces the
    /// queued one of the same element. Reaching `max_pending` pulls the deadline forward to now.
    pub fn collect<I>(&mut self, snapshots: I)
    where
        I: IntoIterator<Item = SignalSnapshot>,
    {
        let mut received = false;
        for snapshot in snapshots {
            received = true;
            match self
                .pending
                .iter_mut()
                .find(|queued| queued.handle == snapshot.handle)
            {
                Some(queued) => *queued = snapshot,
                None => self.pending.push(snapshot),
            }
        }
        if !received {
            return;
        }
        let now = Instant::now();
        if self.pending.len() >= self.config.max_pending {
            debug!(pending = self.pending.len(), "queue cap reached, flushing early");
            self.deadline = Some(now);
        } else if self.deadline.is_none() {
            self.deadline = Some(now + self.config.debounce());
        }
    }

    /// Snapshots settled by flushes since the last call.
    pub fn take_settled(&mut self) -> Vec<SignalSnapshot> {
        std::mem::take(&mut self.settled)
    }

    pub async fn flush(&mut self, mode: FlushMode) -> FlushOutcome {
        self.deadline = None;
        if self.pending.is_empty() {
            return FlushOutcome::Idle;
        }
        let target = match self.prepare() {
            Ok(Some(target)) => target,
            Ok(None) => {
                let snapshots = self.pending.len();
                self.pending.clear();
                debug!(snapshots, "nothing above the engagement floor");
                return FlushOutcome::BelowFloor { snapshots };
            }
            Err(err) => {
                metrics::record_skipped();
                warn!(error = %err, pending = self.pending.len(), "flush skipped");
                return FlushOutcome::NotReady(err);
            }
        };
        let elements = target.batch.elements.len();
        match mode {
            FlushMode::Normal => self.flush_normal(target, elements).await,
            FlushMode::Beacon => self.flush_beacon(target, elements),
        }
    }

    async fn flush_normal(&mut self, target: Target, elements: usize) -> FlushOutcome {
        match self.transport.post(&target.endpoint, &target.batch).await {
            Ok(()) => {
                let sent = self.settle(&target.included);
                self.failures = 0;
                metrics::record_flush(elements);
                info!(elements, snapshots = sent, "batch delivered");
                FlushOutcome::Sent { elements }
            }
            Err(err) => {
                self.failures += 1;
                metrics::record_failure();
                if self.failures >= self.config.retry_limit {
                    let snapshots = self.settle(&target.included);
                    self.failures = 0;
                    metrics::record_dropped(snapshots);
                    warn!(error = %err, snapshots, "retry limit reached, dropping queue");
                    FlushOutcome::Dropped {
                        snapshots,
                        error: err,
                    }
                } else {
                    error!(error = %err, attempt = self.failures, "batch delivery failed");
                    FlushOutcome::Failed {
                        attempt: self.failures,
                        error: err,
                    }
                }
            }
        }
    }

    fn flush_beacon(&mut self, target: Target, elements: usize) -> FlushOutcome {
        match self.transport.beacon(&target.endpoint, &target.batch) {
            Ok(()) => {
                self.settle(&target.included);
                metrics::record_beacon(elements, true);
                info!(elements, "beacon handed off");
                FlushOutcome::BeaconAccepted { elements }
            }
            Err(err) => {
                metrics::record_beacon(elements, false);
                error!(error = %err, pending = self.pending.len(), "beacon refused");
                FlushOutcome::BeaconRefused(err)
            }
        }
    }

    /// Empties the queue, keeping the snapshots at `included` as settled. The rest fell below
    /// the floor and keep accumulating in their records. Returns the settled count.
    fn settle(&mut self, included: &[usize]) -> usize {
        let before = self.settled.len();
        for (position, snapshot) in std::mem::take(&mut self.pending).into_iter().enumerate() {
            if included.binary_search(&position).is_ok() {
                self.settled.push(snapshot);
            }
        }
        self.settled.len() - before
    }

    /// Builds the batch. `Ok(None)` when the merge leaves nothing to send.
    fn prepare(&self) -> Result<Option<Target>, DispatchError> {
        let endpoint = self
            .config
            .endpoint
            .clone()
            .ok_or(DispatchError::MissingEndpoint)?;
        let source = self
            .config
            .source_id
            .clone()
            .ok_or(DispatchError::MissingSource)?;
        let identity = self.identity.identity();
        let (Some(profile), Some(session)) = (identity.profile, identity.session) else {
            return Err(DispatchError::MissingIdentity);
        };
        let merged = self.merger.partition(&self.pending);
        if merged.elements.is_empty() {
            return Ok(None);
        }
        Ok(Some(Target {
            endpoint,
            batch: SignalBatch {
                profile: IdRef::new(profile.as_str()),
                session: IdRef::new(session.as_str()),
                source: IdRef::new(source.as_str()),
                url: self.page_url.clone(),
                elements: merged.elements,
            },
            included: merged.included,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::identity::StaticIdentity;
    use crate::transport::{DeliveryMode, MemoryTransport};
    use engagement_tracker::{ContentKind, SignalRecord};
    use signaltap_core_types::{ElementHandle, Identity, NodeId, ProfileId, SessionId, SourceId};

    static NEXT_HANDLE: AtomicU32 = AtomicU32::new(1);

    fn snapshot(content: &str, read_ms: u64, hover: u64) -> SignalSnapshot {
        let handle = ElementHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed));
        snapshot_of(handle, content, read_ms, hover)
    }

    fn snapshot_of(handle: ElementHandle, content: &str, read_ms: u64, hover: u64) -> SignalSnapshot {
        let mut record = SignalRecord::new(content);
        record.visible.read_ms = read_ms;
        record.hover_duration_ms = hover;
        SignalSnapshot {
            handle,
            node: NodeId(u64::from(handle.0)),
            id: engagement_tracker::fingerprint("p", content),
            tag: "p".into(),
            kind: ContentKind::Text,
            record,
        }
    }

    fn config() -> DispatchConfig {
        DispatchConfig {
            endpoint: Some(Url::parse("https://collector.test/signals").unwrap()),
            source_id: SourceId::parse("source-1"),
            retry_limit: 3,
            max_pending: 10,
            ..DispatchConfig::default()
        }
    }

    fn identity() -> Arc<StaticIdentity> {
        Arc::new(StaticIdentity::new(Identity::new(
            ProfileId::parse("profile-1"),
            SessionId::parse("session-1"),
        )))
    }

    fn dispatcher(config: DispatchConfig) -> (Dispatcher, MemoryTransport) {
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(
            config,
            Arc::new(transport.clone()),
            identity(),
            "https://news.test/article",
        );
        (dispatcher, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_is_armed_once() {
        let (mut dispatcher, _) = dispatcher(config());
        assert!(dispatcher.deadline().is_none());
        let start = Instant::now();
        dispatcher.collect([snapshot("First item", 2_000, 0)]);
        tokio::time::advance(Duration::from_millis(400)).await;
        dispatcher.collect([snapshot("Second item", 2_000, 0)]);
        assert_eq!(dispatcher.deadline(), Some(start + Duration::from_millis(1_000)));
        dispatcher.collect(Vec::new());
        assert_eq!(dispatcher.pending_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn normal_flush_sends_merged_batch_and_clears() {
        let (mut dispatcher, transport) = dispatcher(config());
        dispatcher.collect([snapshot("Same text", 600, 400), snapshot("same TEXT", 2_000, 0)]);
        assert_eq!(dispatcher.flush(FlushMode::Normal).await, FlushOutcome::Sent { elements: 1 });
        assert_eq!(dispatcher.pending_len(), 0);
        assert!(dispatcher.deadline().is_none());

        let deliveries = transport.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].mode, DeliveryMode::Post);
        let batch = &deliveries[0].batch;
        assert_eq!(batch.profile.id, "profile-1");
        assert_eq!(batch.session.id, "session-1");
        assert_eq!(batch.source.id, "source-1");
        assert_eq!(batch.url, "https://news.test/article");
        assert_eq!(batch.elements[0].duration, 2_600);
        assert_eq!(batch.elements[0].mouse_over_duration, 400);
        assert_eq!(batch.elements[0].duplicate_count, 2);
        assert_eq!(dispatcher.take_settled().len(), 2);
        assert!(dispatcher.take_settled().is_empty());
    }

    #[tokio::test]
    async fn newer_snapshot_replaces_the_queued_one() {
        let (mut dispatcher, transport) = dispatcher(config());
        let handle = ElementHandle(900);
        dispatcher.collect([snapshot_of(handle, "Growing read", 0, 400)]);
        dispatcher.collect([snapshot_of(handle, "Growing read", 2_600, 400)]);
        assert_eq!(dispatcher.pending_len(), 1);

        dispatcher.flush(FlushMode::Normal).await;
        let element = &transport.deliveries()[0].batch.elements[0];
        assert_eq!((element.duration, element.mouse_over_duration), (2_600, 400));
        assert_eq!(element.duplicate_count, 1);
    }

    #[tokio::test]
    async fn below_floor_snapshots_are_not_settled() {
        let (mut dispatcher, _) = dispatcher(config());
        dispatcher.collect([snapshot("Read fully", 3_000, 0), snapshot("Skimmed", 200, 0)]);
        assert_eq!(dispatcher.flush(FlushMode::Normal).await, FlushOutcome::Sent { elements: 1 });
        assert_eq!(dispatcher.pending_len(), 0);
        let settled = dispatcher.take_settled();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].content(), "Read fully");
    }

    #[tokio::test]
    async fn missing_configuration_keeps_the_queue() {
        let (mut dispatcher, transport) = dispatcher(DispatchConfig::default());
        dispatcher.collect([snapshot("Kept around", 3_000, 0)]);
        assert_eq!(
            dispatcher.flush(FlushMode::Beacon).await,
            FlushOutcome::NotReady(DispatchError::MissingEndpoint)
        );
        assert_eq!(dispatcher.pending_len(), 1);
        assert!(transport.deliveries().is_empty());

        let mut partial = Dispatcher::new(
            config(),
            Arc::new(transport.clone()),
            Arc::new(StaticIdentity::new(Identity::new(ProfileId::parse("p"), None))),
            "https://news.test/",
        );
        partial.collect([snapshot("Kept around", 3_000, 0)]);
        assert_eq!(
            partial.flush(FlushMode::Normal).await,
            FlushOutcome::NotReady(DispatchError::MissingIdentity)
        );
        assert_eq!(partial.pending_len(), 1);
    }

    #[tokio::test]
    async fn failures_keep_the_queue_until_the_retry_limit() {
        let (mut dispatcher, transport) = dispatcher(config());
        transport.fail_next_posts(3);
        dispatcher.collect([snapshot("Retry me", 3_000, 0)]);

        for attempt in 1..=2 {
            match dispatcher.flush(FlushMode::Normal).await {
                FlushOutcome::Failed { attempt: got, .. } => assert_eq!(got, attempt),
                other => panic!("unexpected outcome {other:?}"),
            }
            assert_eq!(dispatcher.pending_len(), 1);
        }
        assert!(matches!(
            dispatcher.flush(FlushMode::Normal).await,
            FlushOutcome::Dropped { snapshots: 1, .. }
        ));
        assert_eq!(dispatcher.pending_len(), 0);
        assert_eq!(dispatcher.take_settled().len(), 1);
        assert!(transport.deliveries().is_empty());
    }

    #[tokio::test]
    async fn beacon_refusal_keeps_queue_and_acceptance_clears_it() {
        let (mut dispatcher, transport) = dispatcher(config());
        dispatcher.collect([snapshot("Leaving page", 5_000, 0)]);
        transport.refuse_beacons(true);
        assert!(matches!(
            dispatcher.flush(FlushMode::Beacon).await,
            FlushOutcome::BeaconRefused(_)
        ));
        assert_eq!(dispatcher.pending_len(), 1);
        assert!(dispatcher.take_settled().is_empty());

        transport.refuse_beacons(false);
        assert_eq!(
            dispatcher.flush(FlushMode::Beacon).await,
            FlushOutcome::BeaconAccepted { elements: 1 }
        );
        assert_eq!(dispatcher.pending_len(), 0);
        assert_eq!(transport.deliveries()[0].mode, DeliveryMode::Beacon);
    }

    #[tokio::test]
    async fn below_floor_batch_is_not_transmitted() {
        let (mut dispatcher, transport) = dispatcher(config());
        dispatcher.collect([snapshot("Glanced at", 0, 900)]);
        assert_eq!(
            dispatcher.flush(FlushMode::Normal).await,
            FlushOutcome::BelowFloor { snapshots: 1 }
        );
        assert_eq!(dispatcher.pending_len(), 0);
        assert!(dispatcher.take_settled().is_empty());
        assert!(transport.deliveries().is_empty());
        assert_eq!(dispatcher.flush(FlushMode::Normal).await, FlushOutcome::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_cap_pulls_the_deadline_forward() {
        let (mut dispatcher, _) = dispatcher(config());
        dispatcher.collect((0..9).map(|i| snapshot(&format!("Item {i}"), 2_000, 0)));
        let armed = dispatcher.deadline().unwrap();
        assert!(armed > Instant::now());
        dispatcher.collect([snapshot("Item 9", 2_000, 0)]);
        assert_eq!(dispatcher.deadline(), Some(Instant::now()));
    }

    #[tokio::test]
    async fn counters_move() {
        let before = metrics::snapshot();
        let (mut dispatcher, _) = dispatcher(config());
        dispatcher.collect([snapshot("Counted", 2_000, 0)]);
        dispatcher.flush(FlushMode::Normal).await;
        let after = metrics::snapshot();
        assert!(after.flushes > before.flushes);
        assert!(after.elements_sent > before.elements_sent);
    }
}
