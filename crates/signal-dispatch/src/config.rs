use std::time::Duration;

use serde::{Deserialize, Serialize};
use signaltap_core_types::{Millis, SourceId};
use url::Url;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub endpoint: Option<Url>,
    pub source_id: Option<SourceId>,
    /// Quiet interval between the first queued snapshot and the flush.
    pub debounce_ms: Millis,
    /// Merged records below this total visible time are not sent.
    pub engagement_floor_ms: Millis,
    /// Consecutive failed flushes after which the queue is dropped.
    pub retry_limit: u32,
    /// Queue length that forces a flush without waiting for the debounce.
    pub max_pending: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            source_id: None,
            debounce_ms: 1_000,
            engagement_floor_ms: 1_000,
            retry_limit: 5,
            max_pending: 1_000,
        }
    }
}

impl DispatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
