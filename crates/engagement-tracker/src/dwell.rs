use serde::{Deserialize, Serialize};
use signaltap_core_types::Millis;

/// Lower bounds of the scroll, scan and read buckets.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DwellTiers {
    pub scroll_ms: Millis,
    pub scan_ms: Millis,
    pub read_ms: Millis,
}

impl Default for DwellTiers {
    fn default() -> Self {
        Self {
            scroll_ms: 1_000,
            scan_ms: 2_500,
            read_ms: 5_000,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DwellTier {
    Discarded,
    Scroll,
    Scan,
    Read,
}

impl DwellTiers {
    pub fn classify(&self, elapsed: Millis) -> DwellTier {
        if elapsed >= self.read_ms {
            DwellTier::Read
        } else if elapsed >= self.scan_ms {
            DwellTier::Scan
        } else if elapsed >= self.scroll_ms {
            DwellTier::Scroll
        } else {
            DwellTier::Discarded
        }
    }

    pub fn is_ascending(&self) -> bool {
        self.scroll_ms < self.scan_ms && self.scan_ms < self.read_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_contiguous() {
        let tiers = DwellTiers::default();
        let cases = [
            (0, DwellTier::Discarded),
            (999, DwellTier::Discarded),
            (1_000, DwellTier::Scroll),
            (2_499, DwellTier::Scroll),
            (2_500, DwellTier::Scan),
            (4_999, DwellTier::Scan),
            (5_000, DwellTier::Read),
            (Millis::MAX, DwellTier::Read),
        ];
        for (elapsed, tier) in cases {
            assert_eq!(tiers.classify(elapsed), tier, "elapsed {elapsed}");
        }
    }

    #[test]
    fn ascending_check() {
        assert!(DwellTiers::default().is_ascending());
        let flat = DwellTiers {
            scroll_ms: 1_000,
            scan_ms: 1_000,
            read_ms: 5_000,
        };
        assert!(!flat.is_ascending());
    }
}
