use signaltap_core_types::Millis;
use tracing::debug;

use crate::dwell::{DwellTier, DwellTiers};
use crate::registry::TrackedElement;

/// Outcome of feeding one intersection or visibility change to an element.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VisibilityChange {
    Opened,
    Closed { elapsed: Millis, tier: DwellTier },
    Unchanged,
}

impl VisibilityChange {
    /// True when the close landed in a bucket.
    pub fn accumulated(&self) -> bool {
        matches!(self, VisibilityChange::Closed { tier, .. } if *tier != DwellTier::Discarded)
    }
}

/// Visible/hidden lifecycle per element: at most one open interval at a time, closed intervals
/// bucketed by dwell tier.
#[derive(Clone, Debug)]
pub struct VisibilityTracker {
    threshold: f64,
    tiers: DwellTiers,
}

impl VisibilityTracker {
    pub fn new(threshold: f64, tiers: DwellTiers) -> Self {
        Self { threshold, tiers }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn tiers(&self) -> DwellTiers {
        self.tiers
    }

    /// Applies an intersection report. Intervals only open while the page is shown.
    pub fn on_intersection(
        &self,
        element: &mut TrackedElement,
        ratio: f64,
        page_hidden: bool,
        now: Millis,
    ) -> VisibilityChange {
        element.intersecting = ratio >= self.threshold;
        if element.intersecting {
            if page_hidden {
                VisibilityChange::Unchanged
            } else {
                self.open(element, now)
            }
        } else {
            self.close(element, now)
        }
    }

    pub fn open(&self, element: &mut TrackedElement, now: Millis) -> VisibilityChange {
        if element.visible_since.is_some() {
            return VisibilityChange::Unchanged;
        }
        element.visible_since = Some(now);
        element.record.visible.count += 1;
        debug!(element = %element.handle, at = now, "visible interval opened");
        VisibilityChange::Opened
    }

    /// Closes the open interval, if any, and buckets its length.
    pub fn close(&self, element: &mut TrackedElement, now: Millis) -> VisibilityChange {
        let Some(since) = element.visible_since.take() else {
            return VisibilityChange::Unchanged;
        };
        let elapsed = now.saturating_sub(since);
        let tier = self.tiers.classify(elapsed);
        element.record.visible.record(tier, elapsed);
        debug!(element = %element.handle, elapsed, ?tier, "visible interval closed");
        VisibilityChange::Closed { elapsed, tier }
    }

    /// Re-opens the interval of an element that is still intersecting after the tab returns.
    pub fn resume(&self, element: &mut TrackedElement, now: Millis) -> VisibilityChange {
        if element.intersecting && !element.detached {
            self.open(element, now)
        } else {
            VisibilityChange::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use content_tree::Classification;
    use signaltap_core_types::NodeId;

    fn element() -> TrackedElement {
        let mut registry = Registry::new();
        let handle = registry.register(NodeId(3), "p", Classification::Leaf, "Some paragraph".into());
        registry.get(handle).cloned().unwrap()
    }

    fn tracker() -> VisibilityTracker {
        VisibilityTracker::new(0.65, DwellTiers::default())
    }

    #[test]
    fn enter_and_exit_bucket_the_interval() {
        let tracker = tracker();
        let mut el = element();
        assert_eq!(tracker.on_intersection(&mut el, 0.9, false, 100), VisibilityChange::Opened);
        assert_eq!(el.record.visible.count, 1);
        let change = tracker.on_intersection(&mut el, 0.1, false, 2_700);
        assert_eq!(change, VisibilityChange::Closed { elapsed: 2_600, tier: DwellTier::Scan });
        assert!(change.accumulated());
        assert_eq!(el.record.visible.scan_ms, 2_600);
        assert!(el.visible_since.is_none());
    }

    #[test]
    fn repeated_enter_keeps_one_interval() {
        let tracker = tracker();
        let mut el = element();
        tracker.on_intersection(&mut el, 0.7, false, 0);
        assert_eq!(tracker.on_intersection(&mut el, 1.0, false, 500), VisibilityChange::Unchanged);
        assert_eq!(el.visible_since, Some(0));
        assert_eq!(el.record.visible.count, 1);
    }

    #[test]
    fn ratio_at_threshold_counts_as_visible() {
        let tracker = tracker();
        let mut el = element();
        assert_eq!(tracker.on_intersection(&mut el, 0.65, false, 0), VisibilityChange::Opened);
        assert_eq!(tracker.on_intersection(&mut el, 0.64, false, 10), VisibilityChange::Closed { elapsed: 10, tier: DwellTier::Discarded });
        assert_eq!(el.record.visible.total_ms(), 0);
    }

    #[test]
    fn hidden_page_defers_opening_until_resume() {
        let tracker = tracker();
        let mut el = element();
        assert_eq!(tracker.on_intersection(&mut el, 0.9, true, 0), VisibilityChange::Unchanged);
        assert!(el.intersecting);
        assert_eq!(tracker.resume(&mut el, 50), VisibilityChange::Opened);
        assert_eq!(el.visible_since, Some(50));
    }
}
