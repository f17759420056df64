//! Queue/index coordinator.
//!
//! Holds the last authoritative `(queue, current_index)` pair. The queue is
//! only ever replaced wholesale from `queue_update`; the index is clamped
//! into range and never advanced locally.

use crate::domain::identity::VideoId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueCoordinator {
    queue: Vec<VideoId>,
    current_index: Option<usize>,
}

impl QueueCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace queue and index atomically. Returns the active video after the
    /// update.
    ///
    /// An empty queue leaves the index undefined. Otherwise a missing or
    /// negative index becomes 0 and an index past the end becomes the last
    /// entry.
    pub fn apply_update(&mut self, queue: Vec<VideoId>, current_index: Option<i64>) -> Option<&VideoId> {
        self.current_index = if queue.is_empty() {
            None
        } else {
            let last = queue.len() - 1;
            let index = current_index.unwrap_or(0).max(0);
            Some(usize::try_from(index).map_or(last, |i| i.min(last)))
        };
        self.queue = queue;
        self.active_video_id()
    }

    pub fn active_video_id(&self) -> Option<&VideoId> {
        self.current_index.and_then(|i| self.queue.get(i))
    }

    pub fn queue(&self) -> &[VideoId] {
        &self.queue
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether there is an entry after the current one.
    pub fn can_advance(&self) -> bool {
        self.current_index
            .is_some_and(|i| i + 1 < self.queue.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<VideoId> {
        names.iter().map(|n| VideoId::new(*n)).collect()
    }

    #[test]
    fn empty_queue_has_no_active_video() {
        let mut q = QueueCoordinator::new();
        assert_eq!(q.apply_update(vec![], None), None);
        assert_eq!(q.current_index(), None);
        assert!(!q.can_advance());
    }

    #[test]
    fn index_selects_active_video() {
        let mut q = QueueCoordinator::new();
        assert_eq!(q.apply_update(ids(&["a", "b"]), Some(1)), Some(&VideoId::new("b")));
        assert!(!q.can_advance());

        q.apply_update(ids(&["a", "b", "c"]), Some(1));
        assert!(q.can_advance());
    }

    #[test]
    fn out_of_range_indices_are_clamped() {
        let mut q = QueueCoordinator::new();
        q.apply_update(ids(&["a", "b"]), Some(7));
        assert_eq!(q.current_index(), Some(1));

        q.apply_update(ids(&["a", "b"]), Some(-2));
        assert_eq!(q.current_index(), Some(0));

        q.apply_update(ids(&["a"]), None);
        assert_eq!(q.active_video_id(), Some(&VideoId::new("a")));

        q.apply_update(vec![], Some(3));
        assert_eq!(q.current_index(), None);
    }

    #[test]
    fn update_replaces_wholesale() {
        let mut q = QueueCoordinator::new();
        q.apply_update(ids(&["a", "b", "c"]), Some(2));
        q.apply_update(ids(&["x"]), Some(0));
        assert_eq!(q.queue(), ids(&["x"]).as_slice());
        assert_eq!(q.len(), 1);
    }
}
