// Display cursors over the training-sample store
//
// Each label has at most one "currently shown" sample. The store itself does
// not know about cursors; callers adjust them after every structural edit.
//
// Cursors follow the *same sample*: deleting an earlier sample shifts the
// cursor down so it keeps pointing at what was on screen. Only when the shown
// sample itself is removed does the cursor move, to the sample that took its
// position, or to the new last sample if it was the last one.

use crate::training::store::TrainingSampleStore;

/// Per-label display positions, `None` when the label has nothing to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCursors {
    positions: Vec<Option<usize>>,
}

impl SampleCursors {
    pub fn new(max_labels: u32) -> Self {
        Self {
            positions: vec![None; max_labels as usize],
        }
    }

    fn slot(&self, label: u32) -> Option<usize> {
        let slot = (label as usize).checked_sub(1)?;
        (slot < self.positions.len()).then_some(slot)
    }

    pub fn get(&self, label: u32) -> Option<usize> {
        self.slot(label).and_then(|slot| self.positions[slot])
    }

    /// Point a label's cursor at `index` if that sample exists
    pub fn set(&mut self, store: &TrainingSampleStore, label: u32, index: usize) -> bool {
        match self.slot(label) {
            Some(slot) if index < store.num_samples_for_label(label) => {
                self.positions[slot] = Some(index);
                true
            }
            _ => false,
        }
    }

    /// A sample was appended at `index`; show it
    pub fn on_added(&mut self, label: u32, index: usize) {
        if let Some(slot) = self.slot(label) {
            self.positions[slot] = Some(index);
        }
    }

    /// The sample at `deleted` was removed leaving `remaining` samples
    pub fn on_removed(&mut self, label: u32, deleted: usize, remaining: usize) {
        let Some(slot) = self.slot(label) else {
            return;
        };
        self.positions[slot] = match self.positions[slot] {
            None => None,
            Some(_) if remaining == 0 => None,
            Some(c) if c > deleted => Some(c - 1),
            Some(c) if c >= remaining => Some(remaining - 1),
            Some(c) => Some(c),
        };
    }

    /// A sample moved from (`source`, `index`) to (`target`, `target_index`)
    pub fn on_relabeled(
        &mut self,
        source: u32,
        index: usize,
        source_remaining: usize,
        target: u32,
        target_index: usize,
    ) {
        self.on_removed(source, index, source_remaining);
        self.on_added(target, target_index);
    }

    /// Reset every cursor to its label's last sample
    pub fn reset_to_last(&mut self, store: &TrainingSampleStore) {
        for (slot, position) in self.positions.iter_mut().enumerate() {
            *position = store.num_samples_for_label(slot as u32 + 1).checked_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::data::SampleMatrix;

    fn filled_store(label: u32, count: usize) -> TrainingSampleStore {
        let mut store = TrainingSampleStore::new(2, 9, 10);
        for i in 0..count {
            let rows = vec![vec![i as f64, 0.0]; 12];
            store
                .add_sample(label, SampleMatrix::from_rows(2, rows).unwrap())
                .unwrap();
        }
        store
    }

    #[test]
    fn test_deleting_shown_last_sample_moves_cursor_down() {
        let mut store = filled_store(1, 3);
        let mut cursors = SampleCursors::new(9);
        cursors.on_added(1, 2);

        store.delete_sample(1, 2).unwrap();
        cursors.on_removed(1, 2, store.num_samples_for_label(1));
        assert_eq!(cursors.get(1), Some(1));
    }

    #[test]
    fn test_deleting_only_sample_clears_cursor() {
        let mut store = filled_store(1, 1);
        let mut cursors = SampleCursors::new(9);
        cursors.on_added(1, 0);

        store.delete_sample(1, 0).unwrap();
        cursors.on_removed(1, 0, store.num_samples_for_label(1));
        assert_eq!(cursors.get(1), None);
    }

    #[test]
    fn test_deleting_earlier_sample_keeps_same_sample_shown() {
        let mut store = filled_store(1, 4);
        let mut cursors = SampleCursors::new(9);
        cursors.on_added(1, 3);
        let shown = store.sample(1, 3).cloned();

        store.delete_sample(1, 0).unwrap();
        cursors.on_removed(1, 0, store.num_samples_for_label(1));
        assert_eq!(cursors.get(1), Some(2));
        assert_eq!(store.sample(1, 2).cloned(), shown);
    }

    #[test]
    fn test_deleting_shown_middle_sample_shows_successor() {
        let mut cursors = SampleCursors::new(9);
        cursors.on_added(1, 1);
        cursors.on_removed(1, 1, 3);
        assert_eq!(cursors.get(1), Some(1));
    }

    #[test]
    fn test_deleting_later_sample_leaves_cursor() {
        let mut cursors = SampleCursors::new(9);
        cursors.on_added(1, 0);
        cursors.on_removed(1, 2, 2);
        assert_eq!(cursors.get(1), Some(0));
    }

    #[test]
    fn test_relabel_updates_both_cursors() {
        let mut cursors = SampleCursors::new(9);
        cursors.on_added(1, 0);
        cursors.on_added(2, 4);
        cursors.on_relabeled(1, 0, 0, 2, 5);
        assert_eq!(cursors.get(1), None);
        assert_eq!(cursors.get(2), Some(5));
    }

    #[test]
    fn test_set_and_reset_to_last() {
        let store = filled_store(3, 2);
        let mut cursors = SampleCursors::new(9);
        assert!(cursors.set(&store, 3, 0));
        assert!(!cursors.set(&store, 3, 2));
        assert!(!cursors.set(&store, 0, 0));

        cursors.reset_to_last(&store);
        assert_eq!(cursors.get(3), Some(1));
        assert_eq!(cursors.get(1), None);
    }
}
