use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};
use url::Url;

use crate::errors::TransportError;
use crate::payload::SignalBatch;

/// Outbound delivery primitive.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Confirmed delivery: `Ok` only after the collector accepted the batch.
    async fn post(&self, endpoint: &Url, batch: &SignalBatch) -> Result<(), TransportError>;

    /// Fire-and-forget submission for the unload path. `Ok` means the batch was handed off
    /// locally; delivery is never confirmed.
    fn beacon(&self, endpoint: &Url, batch: &SignalBatch) -> Result<(), TransportError>;
}

/// JSON over HTTP POST.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    beacons: TaskTracker,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            beacons: TaskTracker::new(),
        })
    }

    /// Waits for in-flight beacons, at most `grace`. Returns `false` on timeout.
    pub async fn settle(&self, grace: Duration) -> bool {
        self.beacons.close();
        tokio::time::timeout(grace, self.beacons.wait()).await.is_ok()
    }

    async fn send(
        client: &reqwest::Client,
        endpoint: Url,
        batch: &SignalBatch,
    ) -> Result<(), TransportError> {
        let response = client.post(endpoint).json(batch).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, endpoint: &Url, batch: &SignalBatch) -> Result<(), TransportError> {
        Self::send(&self.client, endpoint.clone(), batch).await
    }

    fn beacon(&self, endpoint: &Url, batch: &SignalBatch) -> Result<(), TransportError> {
        if self.beacons.is_closed() {
            return Err(TransportError::BeaconRefused("transport is shutting down".into()));
        }
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|err| TransportError::BeaconRefused(err.to_string()))?;
        let client = self.client.clone();
        let endpoint = endpoint.clone();
        let batch = batch.clone();
        self.beacons.spawn_on(
            async move {
                match Self::send(&client, endpoint, &batch).await {
                    Ok(()) => debug!(elements = batch.elements.len(), "beacon delivered"),
                    Err(err) => warn!(error = %err, "beacon delivery failed"),
                }
            },
            &handle,
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Post,
    Beacon,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Delivery {
    pub mode: DeliveryMode,
    pub endpoint: Url,
    pub batch: SignalBatch,
}

#[derive(Debug, Default)]
struct MemoryState {
    deliveries: Vec<Delivery>,
    failing_posts: usize,
    refuse_beacons: bool,
}

/// Captures batches in memory; used for dry runs and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` posts fail with a 503.
    pub fn fail_next_posts(&self, count: usize) {
        self.state.lock().failing_posts = count;
    }

    pub fn refuse_beacons(&self, refuse: bool) {
        self.state.lock().refuse_beacons = refuse;
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.state.lock().deliveries.clone()
    }

    pub fn take_deliveries(&self) -> Vec<Delivery> {
        std::mem::take(&mut self.state.lock().deliveries)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn post(&self, endpoint: &Url, batch: &SignalBatch) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.failing_posts > 0 {
            state.failing_posts -= 1;
            return Err(TransportError::Status(503));
        }
        state.deliveries.push(Delivery {
            mode: DeliveryMode::Post,
            endpoint: endpoint.clone(),
            batch: batch.clone(),
        });
        Ok(())
    }

    fn beacon(&self, endpoint: &Url, batch: &SignalBatch) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.refuse_beacons {
            return Err(TransportError::BeaconRefused("queue full".into()));
        }
        state.deliveries.push(Delivery {
            mode: DeliveryMode::Beacon,
            endpoint: endpoint.clone(),
            batch: batch.clone(),
        });
        Ok(())
    }
}
