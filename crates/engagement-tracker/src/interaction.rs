use signaltap_core_types::Millis;
use tracing::debug;

use crate::record::BoostEntry;
use crate::registry::TrackedElement;

/// Hover, click and text-selection accumulation on top of an element's record.
#[derive(Clone, Debug)]
pub struct InteractionTracker {
    hover_min_ms: Millis,
}

impl InteractionTracker {
    pub fn new(hover_min_ms: Millis) -> Self {
        Self { hover_min_ms }
    }

    pub fn hover_min_ms(&self) -> Millis {
        self.hover_min_ms
    }

    /// Opens a hover interval unless one is already open.
    pub fn pointer_enter(&self, element: &mut TrackedElement, now: Millis) {
        if element.hover_since.is_none() {
            element.hover_since = Some(now);
        }
    }

    /// Closes the hover interval. Returns the credited time when it beat the noise floor.
    pub fn pointer_leave(&self, element: &mut TrackedElement, now: Millis) -> Option<Millis> {
        let since = element.hover_since.take()?;
        let elapsed = now.saturating_sub(since);
        if elapsed <= self.hover_min_ms {
            debug!(element = %element.handle, elapsed, "hover below noise floor");
            return None;
        }
        element.record.hover_duration_ms = element.record.hover_duration_ms.saturating_add(elapsed);
        debug!(element = %element.handle, elapsed, "hover credited");
        Some(elapsed)
    }

    pub fn click(&self, element: &mut TrackedElement) {
        element.record.click_count = element.record.click_count.saturating_add(1);
    }

    /// Last write wins.
    pub fn select_text(&self, element: &mut TrackedElement, text: &str) {
        element.record.selected_text = Some(text.to_string());
    }

    /// Credits a nested leaf's engagement to its enclosing group.
    pub fn boost(&self, group: &mut TrackedElement, leaf_content: &str, entry: BoostEntry) {
        group.record.add_boost(leaf_content, entry);
    }
}
