//! Recorded page sessions
//!
//! A trace is a document plus timed host callbacks that address elements by their `id`
//! attribute. [`Trace::compile`] resolves those ids to node ids by applying the trace's own
//! inserts and removals to a mirror of the document, so it yields exactly the node ids the
//! collector's copy will assign.

use std::path::Path;
use std::time::Duration;

use content_tree::{ArenaDocument, DomView, NodeSpec, Viewport};
use serde::{Deserialize, Serialize};
use signaltap_core_types::{Millis, NodeId};
use tokio::fs;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::collector::{CollectorHandle, HostEvent, Page};
use crate::errors::{CollectorError, TraceError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport_height: Option<f64>,
    pub document: NodeSpec,
    #[serde(default)]
    pub events: Vec<TraceEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Offset from the start of the session.
    pub at: Millis,
    #[serde(flatten)]
    pub action: TraceAction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceAction {
    Load,
    Intersection { target: String, ratio: f64 },
    PageVisibility { hidden: bool },
    PointerEnter { target: String },
    PointerLeave { target: String },
    Click { target: String },
    /// Text selected inside `target`; the selection is anchored at its first child node.
    Selection { target: String, text: String },
    Insert { parent: String, fragment: NodeSpec },
    Remove { target: String },
    Resize { height: Option<f64> },
    UrlChanged { url: String },
    BeforeUnload,
}

/// A trace with every target resolved, ready to feed a collector.
#[derive(Clone, Debug)]
pub struct CompiledTrace {
    pub page: Page,
    pub events: Vec<(Millis, HostEvent)>,
    /// Events dropped because their target could not be resolved.
    pub skipped: usize,
}

impl CompiledTrace {
    /// True when the trace itself ends the page (unload event).
    pub fn ends_with_unload(&self) -> bool {
        matches!(self.events.last(), Some((_, HostEvent::BeforeUnload)))
    }
}

impl Trace {
    pub fn from_json(raw: &str) -> Result<Self, TraceError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, TraceError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Reads a trace; `.json` files are parsed as JSON, anything else as YAML.
    pub async fn load(path: &Path) -> Result<Self, TraceError> {
        let raw = fs::read_to_string(path)
            .await
            .map_err(|source| TraceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&raw)
        } else {
            Self::from_yaml(&raw)
        }
    }

    pub fn compile(&self) -> Result<CompiledTrace, TraceError> {
        let document = ArenaDocument::from_spec(&self.document)?;
        let mut mirror = document.clone();

        let mut ordered: Vec<&TraceEvent> = self.events.iter().collect();
        ordered.sort_by_key(|event| event.at);

        let mut events = Vec::with_capacity(ordered.len());
        let mut skipped = 0;
        for event in ordered {
            match resolve(&mut mirror, &event.action) {
                Some(host) => events.push((event.at, host)),
                None => {
                    warn!(at = event.at, action = ?event.action, "trace event skipped");
                    skipped += 1;
                }
            }
        }

        let viewport = Viewport {
            height: self.viewport_height,
        };
        Ok(CompiledTrace {
            page: Page {
                url: self.url.clone(),
                document,
                viewport,
            },
            events,
            skipped,
        })
    }
}

fn resolve(mirror: &mut ArenaDocument, action: &TraceAction) -> Option<HostEvent> {
    let lookup = |mirror: &ArenaDocument, id: &str| -> Option<NodeId> {
        let node = mirror.element_by_id(id);
        if node.is_none() {
            debug!(id, "no connected element with this id");
        }
        node
    };
    let event = match action {
        TraceAction::Load => HostEvent::Load,
        TraceAction::Intersection { target, ratio } => HostEvent::Intersection {
            node: lookup(mirror, target)?,
            ratio: *ratio,
        },
        TraceAction::PageVisibility { hidden } => HostEvent::PageVisibility { hidden: *hidden },
        TraceAction::PointerEnter { target } => HostEvent::PointerEnter {
            node: lookup(mirror, target)?,
        },
        TraceAction::PointerLeave { target } => HostEvent::PointerLeave {
            node: lookup(mirror, target)?,
        },
        TraceAction::Click { target } => HostEvent::Click {
            node: lookup(mirror, target)?,
        },
        TraceAction::Selection { target, text } => {
            let node = lookup(mirror, target)?;
            let anchor = mirror.child_nodes(node).first().copied().unwrap_or(node);
            HostEvent::Selection {
                anchor,
                text: text.clone(),
            }
        }
        TraceAction::Insert { parent, fragment } => {
            let parent = lookup(mirror, parent)?;
            if let Err(err) = mirror.insert(parent, fragment) {
                warn!(%parent, error = %err, "trace insert cannot be applied");
                return None;
            }
            HostEvent::Insert {
                parent,
                fragment: fragment.clone(),
            }
        }
        TraceAction::Remove { target } => {
            let node = lookup(mirror, target)?;
            if let Err(err) = mirror.detach(node) {
                warn!(%node, error = %err, "trace removal cannot be applied");
                return None;
            }
            HostEvent::Remove { node }
        }
        TraceAction::Resize { height } => HostEvent::Resize { height: *height },
        TraceAction::UrlChanged { url } => HostEvent::UrlChanged { url: url.clone() },
        TraceAction::BeforeUnload => HostEvent::BeforeUnload,
    };
    Some(event)
}

/// Wall-clock offset of a trace timestamp at the given playback speed.
pub fn playback_offset(at: Millis, speed: f64) -> Duration {
    if speed == 1.0 {
        Duration::from_millis(at)
    } else {
        Duration::from_micros((at as f64 * 1_000.0 / speed).round() as u64)
    }
}

/// Sends every event at its (scaled) offset from now. Stops early if the collector is gone.
pub async fn play(
    handle: &CollectorHandle,
    events: Vec<(Millis, HostEvent)>,
    speed: f64,
) -> Result<usize, CollectorError> {
    let start = Instant::now();
    let total = events.len();
    for (at, event) in events {
        sleep_until(start + playback_offset(at, speed)).await;
        debug!(at, ?event, "replaying host event");
        handle.send(event).await?;
    }
    info!(events = total, "trace replayed");
    Ok(total)
}
