use content_tree::{extract_content, ContentConfig, ContentSelector, DomView, Viewport};
use serde::{Deserialize, Serialize};
use signaltap_core_types::{ElementHandle, Millis, NodeId};
use tracing::{debug, info};

use crate::dwell::DwellTiers;
use crate::interaction::InteractionTracker;
use crate::record::{BoostEntry, SignalSnapshot};
use crate::registry::Registry;
use crate::visibility::VisibilityTracker;
use crate::watcher::{Mutation, MutationWatcher};

/// Engine tuning shared by selection, visibility and interaction tracking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub content: ContentConfig,
    pub visibility_threshold: f64,
    pub dwell_tiers: DwellTiers,
    pub hover_min_ms: Millis,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            content: ContentConfig::default(),
            visibility_threshold: 0.65,
            dwell_tiers: DwellTiers::default(),
            hover_min_ms: 300,
        }
    }
}

/// Per-page engagement state: selection, the element registry and the outbox of snapshots
/// waiting to be handed to a dispatcher.
#[derive(Debug)]
pub struct EngagementTracker {
    selector: ContentSelector,
    registry: Registry,
    visibility: VisibilityTracker,
    interaction: InteractionTracker,
    watcher: MutationWatcher,
    page_hidden: bool,
    outbox: Vec<SignalSnapshot>,
}

impl EngagementTracker {
    pub fn new(config: TrackerConfig, viewport: Viewport) -> Self {
        Self {
            selector: ContentSelector::new(config.content, viewport),
            registry: Registry::new(),
            visibility: VisibilityTracker::new(config.visibility_threshold, config.dwell_tiers),
            interaction: InteractionTracker::new(config.hover_min_ms),
            watcher: MutationWatcher,
            page_hidden: false,
            outbox: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_page_hidden(&self) -> bool {
        self.page_hidden
    }

    /// Instruments every qualifying node under `root` that is not instrumented yet.
    pub fn scan<D>(&mut self, dom: &D, root: NodeId) -> Vec<ElementHandle>
    where
        D: DomView + ?Sized,
    {
        let candidates = self.selector.select(dom, root, &self.registry);
        let mut added = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Some(tag) = dom.tag(candidate.node) else {
                continue;
            };
            let content = extract_content(dom, candidate.node, self.selector.config());
            if content.is_empty() {
                continue;
            }
            let handle = self
                .registry
                .register(candidate.node, &tag, candidate.classification, content);
            let group = candidate
                .container
                .and_then(|node| self.registry.handle_of(node));
            if let Some(element) = self.registry.get_mut(handle) {
                element.group = group;
            }
            debug!(
                element = %handle,
                node = %candidate.node,
                %tag,
                group = ?candidate.container,
                "element instrumented"
            );
            added.push(handle);
        }
        let new_group = added.iter().any(|handle| {
            self.registry
                .get(*handle)
                .is_some_and(|element| element.is_group())
        });
        if new_group {
            self.regroup(dom);
        }
        if !added.is_empty() {
            info!(root = %root, added = added.len(), total = self.registry.len(), "content scan");
        }
        added
    }

    /// Handles a mutation batch: new subtrees are scanned, removed tracked nodes are closed out.
    pub fn on_mutations<D>(&mut self, dom: &D, batch: &[Mutation], now: Millis) -> Vec<ElementHandle>
    where
        D: DomView + ?Sized,
    {
        let removed = self.watcher.removed_roots(dom, batch);
        if !removed.is_empty() {
            self.retire_disconnected(dom, now);
        }
        let mut added = Vec::new();
        for root in self.watcher.inserted_roots(dom, batch) {
            added.extend(self.scan(dom, root));
        }
        added
    }

    /// Viewport size changed; group fit is size dependent, so the whole document is rescanned.
    pub fn on_resize<D>(&mut self, dom: &D, root: NodeId, viewport: Viewport) -> Vec<ElementHandle>
    where
        D: DomView + ?Sized,
    {
        self.selector.set_viewport(viewport);
        self.scan(dom, root)
    }

    pub fn on_intersection(&mut self, node: NodeId, ratio: f64, now: Millis) {
        let Some(handle) = self.live_handle(node) else {
            return;
        };
        let page_hidden = self.page_hidden;
        let Some(element) = self.registry.get_mut(handle) else {
            return;
        };
        let change = self
            .visibility
            .on_intersection(element, ratio, page_hidden, now);
        if change.accumulated() {
            self.enqueue(handle);
        }
    }

    /// Tab hidden closes every open interval like a visibility exit; returns `true` when the
    /// caller should force a beacon flush. Tab shown resumes elements still intersecting.
    pub fn on_page_visibility(&mut self, hidden: bool, now: Millis) -> bool {
        if hidden == self.page_hidden {
            return false;
        }
        self.page_hidden = hidden;
        if hidden {
            info!(at = now, "page hidden, closing open intervals");
            self.close_all(now);
            true
        } else {
            let handles: Vec<ElementHandle> = self.registry.handles().collect();
            for handle in handles {
                if let Some(element) = self.registry.get_mut(handle) {
                    self.visibility.resume(element, now);
                }
            }
            false
        }
    }

    pub fn on_pointer_enter<D>(&mut self, dom: &D, node: NodeId, now: Millis)
    where
        D: DomView + ?Sized,
    {
        let Some(handle) = self.target_of(dom, node) else {
            return;
        };
        if let Some(element) = self.registry.get_mut(handle) {
            self.interaction.pointer_enter(element, now);
        }
    }

    pub fn on_pointer_leave<D>(&mut self, dom: &D, node: NodeId, now: Millis)
    where
        D: DomView + ?Sized,
    {
        let Some(handle) = self.target_of(dom, node) else {
            return;
        };
        let credited = self
            .registry
            .get_mut(handle)
            .and_then(|element| self.interaction.pointer_leave(element, now));
        if let Some(hover_ms) = credited {
            self.boost_group(handle, BoostEntry { hover_ms, clicks: 0 });
            self.enqueue(handle);
        }
    }

    pub fn on_click<D>(&mut self, dom: &D, node: NodeId)
    where
        D: DomView + ?Sized,
    {
        let Some(handle) = self.target_of(dom, node) else {
            return;
        };
        if let Some(element) = self.registry.get_mut(handle) {
            self.interaction.click(element);
        }
        self.boost_group(handle, BoostEntry { hover_ms: 0, clicks: 1 });
        self.enqueue(handle);
    }

    /// Attaches selected text to the element found by walking up from `anchor` to the nearest
    /// allowed tag. Nothing is enqueued; the text rides the element's next snapshot.
    pub fn on_selection<D>(&mut self, dom: &D, anchor: NodeId, text: &str)
    where
        D: DomView + ?Sized,
    {
        let text = text.trim();
        if text.is_empty() || !dom.is_connected(anchor) {
            return;
        }
        let start = if dom.is_element(anchor) {
            Some(anchor)
        } else {
            dom.parent(anchor)
        };
        let Some(start) = start else {
            return;
        };
        let config = self.selector.config();
        let allowed = std::iter::once(start)
            .chain(dom.ancestors(start))
            .find(|node| dom.tag(*node).is_some_and(|tag| config.is_allowed(&tag)));
        let Some(handle) = allowed.and_then(|node| self.live_handle(node)) else {
            debug!(anchor = %anchor, "selection outside tracked content");
            return;
        };
        if let Some(element) = self.registry.get_mut(handle) {
            self.interaction.select_text(element, text);
        }
    }

    /// Closes every open visible and hover interval and enqueues every record still holding
    /// undispatched engagement (unload path).
    pub fn drain(&mut self, now: Millis) {
        self.close_all(now);
    }

    /// Releases what the dispatcher settled from the records it was taken from.
    pub fn acknowledge(&mut self, settled: &[SignalSnapshot]) {
        for snapshot in settled {
            let Some(element) = self.registry.get_mut(snapshot.handle) else {
                continue;
            };
            element.record.release(&snapshot.record);
        }
        if !settled.is_empty() {
            debug!(settled = settled.len(), "records released");
        }
    }

    /// Hands over the latest snapshot of every element enqueued since the last call.
    pub fn take_snapshots(&mut self) -> Vec<SignalSnapshot> {
        std::mem::take(&mut self.outbox)
    }

    pub fn pending_snapshots(&self) -> usize {
        self.outbox.len()
    }

    fn close_all(&mut self, now: Millis) {
        let handles: Vec<ElementHandle> = self.registry.handles().collect();
        for handle in &handles {
            self.close_element(*handle, now);
        }
        for handle in handles {
            self.enqueue(handle);
        }
    }

    fn close_element(&mut self, handle: ElementHandle, now: Millis) {
        let Some(element) = self.registry.get_mut(handle) else {
            return;
        };
        let visible = self.visibility.close(element, now);
        let hovered = self.interaction.pointer_leave(element, now);
        if let Some(hover_ms) = hovered {
            self.boost_group(handle, BoostEntry { hover_ms, clicks: 0 });
        }
        if visible.accumulated() || hovered.is_some() {
            self.enqueue(handle);
        }
    }

    fn retire_disconnected<D>(&mut self, dom: &D, now: Millis)
    where
        D: DomView + ?Sized,
    {
        let gone: Vec<ElementHandle> = self
            .registry
            .iter()
            .filter(|element| !element.detached && !dom.is_connected(element.node))
            .map(|element| element.handle)
            .collect();
        for handle in gone {
            self.close_element(handle, now);
            if let Some(element) = self.registry.get_mut(handle) {
                element.detached = true;
                element.intersecting = false;
                debug!(element = %handle, "element left the document");
            }
        }
    }

    /// Nearest tracked element at or above `node`.
    fn target_of<D>(&self, dom: &D, node: NodeId) -> Option<ElementHandle>
    where
        D: DomView + ?Sized,
    {
        std::iter::once(node)
            .chain(dom.ancestors(node))
            .find_map(|candidate| self.live_handle(candidate))
    }

    fn live_handle(&self, node: NodeId) -> Option<ElementHandle> {
        self.registry.live(node).map(|element| element.handle)
    }

    /// Links ungrouped leaves to a group that appeared above them after they were instrumented.
    fn regroup<D>(&mut self, dom: &D)
    where
        D: DomView + ?Sized,
    {
        let updates: Vec<(ElementHandle, ElementHandle)> = self
            .registry
            .iter()
            .filter(|element| !element.detached && !element.is_group() && element.group.is_none())
            .filter_map(|element| {
                self.selector
                    .enclosing_container(dom, element.node, &self.registry)
                    .and_then(|node| self.registry.handle_of(node))
                    .map(|group| (element.handle, group))
            })
            .collect();
        for (leaf, group) in updates {
            if let Some(element) = self.registry.get_mut(leaf) {
                element.group = Some(group);
            }
        }
    }

    /// Credits a leaf's engagement to `boost[leaf content]` of its group and enqueues the group.
    fn boost_group(&mut self, leaf: ElementHandle, entry: BoostEntry) {
        let Some((group, content)) = self
            .registry
            .get(leaf)
            .and_then(|element| Some((element.group?, element.content().to_string())))
        else {
            return;
        };
        let Some(group_element) = self.registry.get_mut(group) else {
            return;
        };
        if group_element.detached {
            return;
        }
        self.interaction.boost(group_element, &content, entry);
        self.enqueue(group);
    }

    fn enqueue(&mut self, handle: ElementHandle) {
        let Some(element) = self.registry.get_mut(handle) else {
            return;
        };
        if !element.record.is_eligible() {
            return;
        }
        let snapshot = element.snapshot();
        debug!(element = %handle, duration = snapshot.duration(), "snapshot enqueued");
        // Records are cumulative, so a newer snapshot replaces an older one for the same element.
        match self.outbox.iter_mut().find(|queued| queued.handle == handle) {
            Some(queued) => *queued = snapshot,
            None => self.outbox.push(snapshot),
        }
    }
}
