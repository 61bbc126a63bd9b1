use std::collections::HashMap;

use engagement_tracker::SignalSnapshot;
use signaltap_core_types::Millis;

use crate::payload::{SelectedText, WireElement};

/// Flush-time deduplication of queued snapshots by case-insensitive content.
#[derive(Clone, Copy, Debug)]
pub struct Merger {
    floor_ms: Millis,
}

struct Group {
    element: WireElement,
    selected: Vec<Option<String>>,
    members: Vec<usize>,
}

impl Group {
    fn finish(self) -> (WireElement, Vec<usize>) {
        let element = WireElement {
            selected_text: SelectedText::from_entries(self.selected),
            ..self.element
        };
        (element, self.members)
    }
}

/// Merge result plus the queue positions that fed the kept elements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergedBatch {
    pub elements: Vec<WireElement>,
    pub included: Vec<usize>,
}

impl Merger {
    pub fn new(floor_ms: Millis) -> Self {
        Self { floor_ms }
    }

    /// Groups, drops records below the engagement floor and orders the rest by ascending
    /// `(hover, duration)`.
    pub fn merge(&self, snapshots: &[SignalSnapshot]) -> Vec<WireElement> {
        self.partition(snapshots).elements
    }

    /// Like [`Merger::merge`], also reporting which snapshots ended up in the batch.
    pub fn partition(&self, snapshots: &[SignalSnapshot]) -> MergedBatch {
        let mut batch = MergedBatch::default();
        for group in Self::collate(snapshots) {
            if group.element.duration < self.floor_ms {
                continue;
            }
            let (element, members) = group.finish();
            batch.elements.push(element);
            batch.included.extend(members);
        }
        batch
            .elements
            .sort_by_key(|element| (element.mouse_over_duration, element.duration));
        batch.included.sort_unstable();
        batch
    }

    /// Groups in first-occurrence order without filtering or sorting.
    pub fn group(snapshots: &[SignalSnapshot]) -> Vec<WireElement> {
        Self::collate(snapshots)
            .into_iter()
            .map(|group| group.finish().0)
            .collect()
    }

    fn collate(snapshots: &[SignalSnapshot]) -> Vec<Group> {
        let mut groups: Vec<Group> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (position, snapshot) in snapshots.iter().enumerate() {
            let record = &snapshot.record;
            let key = record.content.to_lowercase();
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Group {
                    element: WireElement {
                        id: snapshot.id.clone(),
                        tag: snapshot.tag.clone(),
                        kind: snapshot.kind,
                        content: record.content.clone(),
                        duration: 0,
                        mouse_over_duration: 0,
                        click_count: 0,
                        selected_text: SelectedText::One(None),
                        duplicate_count: 0,
                        boost: Default::default(),
                    },
                    selected: Vec::new(),
                    members: Vec::new(),
                });
                groups.len() - 1
            });
            let group = &mut groups[slot];
            let element = &mut group.element;
            element.duration = element.duration.saturating_add(snapshot.duration());
            element.mouse_over_duration = element
                .mouse_over_duration
                .saturating_add(record.hover_duration_ms);
            element.click_count = element.click_count.saturating_add(record.click_count);
            element.duplicate_count += 1;
            for (content, entry) in &record.boost {
                element.boost.entry(content.clone()).or_default().absorb(*entry);
            }
            group.selected.push(record.selected_text.clone());
            group.members.push(position);
        }
        groups
    }
}
