//! LRU (Least Recently Used) replacement policy.
//!
//! Recency is the moment a frame became evictable: the victim is the frame
//! that was unpinned longest ago among those still evictable.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::common::FrameId;

/// Capacity-bounded LRU tracker of evictable frames.
///
/// # Structure
/// ```text
///   head (most recent)                         tail (least recent)
///     │                                              │
///     ▼                                              ▼
///  [slot 2: F7] ⇄ [slot 0: F3] ⇄ [slot 4: F1] ⇄ [slot 1: F5]
///
///  index: F7→2, F3→0, F1→4, F5→1
/// ```
/// Nodes live in an arena (`Vec<Node>`) and link to each other by slot
/// index. `index` maps a frame to its slot so `pin` can unlink it in O(1).
/// Freed slots are recycled through `free_slots`.
///
/// # Thread Safety
/// All operations take `&self` and run under one internal `Mutex`, so they
/// are atomic with respect to each other.
///
/// # Example
/// ```
/// use sharddb::buffer::replacer::LruReplacer;
/// use sharddb::FrameId;
///
/// let replacer = LruReplacer::new(8);
/// replacer.unpin(FrameId::new(1));
/// replacer.unpin(FrameId::new(2));
/// replacer.pin(FrameId::new(1));
/// assert_eq!(replacer.victim(), Some(FrameId::new(2)));
/// assert_eq!(replacer.victim(), None);
/// ```
pub struct LruReplacer {
    inner: Mutex<LruList>,
    capacity: usize,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    frame_id: FrameId,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Default)]
struct LruList {
    nodes: Vec<Node>,
    free_slots: Vec<usize>,
    index: HashMap<FrameId, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl LruList {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free_slots: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    /// Link a new node at the head.
    fn push_front(&mut self, frame_id: FrameId) {
        let node = Node {
            frame_id,
            prev: None,
            next: self.head,
        };
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        match self.head {
            Some(old_head) => self.nodes[old_head].prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
        self.index.insert(frame_id, slot);
    }

    /// Unlink the node in `slot` and recycle the slot.
    fn unlink(&mut self, slot: usize) -> FrameId {
        let Node {
            frame_id,
            prev,
            next,
        } = self.nodes[slot];

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }

        self.index.remove(&frame_id);
        self.free_slots.push(slot);
        frame_id
    }
}

impl LruReplacer {
    /// Create a replacer that tracks at most `num_pages` frames.
    pub fn new(num_pages: usize) -> Self {
        Self {
            inner: Mutex::new(LruList::with_capacity(num_pages)),
            capacity: num_pages,
        }
    }

    /// Remove and return the least-recently-unpinned frame.
    ///
    /// Returns `None`, leaving the state untouched, if nothing is evictable.
    pub fn victim(&self) -> Option<FrameId> {
        let mut list = self.inner.lock();
        let tail = list.tail?;
        Some(list.unlink(tail))
    }

    /// The frame is in use: stop tracking it. No-op if not tracked.
    pub fn pin(&self, frame_id: FrameId) {
        let mut list = self.inner.lock();
        let slot = list.index.get(&frame_id).copied();
        if let Some(slot) = slot {
            list.unlink(slot);
        }
    }

    /// The frame became evictable: track it as most recently unpinned.
    ///
    /// No-op if it is already tracked or the replacer is at capacity.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut list = self.inner.lock();
        if list.index.contains_key(&frame_id) || list.len() >= self.capacity {
            return;
        }
        list.push_front(frame_id);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.inner.lock().len()
    }

    /// Maximum number of frames this replacer tracks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    fn f(id: usize) -> FrameId {
        FrameId::new(id)
    }

    #[test]
    fn test_lru_sample() {
        let replacer = LruReplacer::new(7);

        for id in 1..=6 {
            replacer.unpin(f(id));
        }
        replacer.unpin(f(1)); // already tracked, keeps its position
        assert_eq!(replacer.size(), 6);

        assert_eq!(replacer.victim(), Some(f(1)));
        assert_eq!(replacer.victim(), Some(f(2)));
        assert_eq!(replacer.victim(), Some(f(3)));

        replacer.pin(f(3)); // not tracked any more, no-op
        replacer.pin(f(4));
        assert_eq!(replacer.size(), 2);

        replacer.unpin(f(4));
        assert_eq!(replacer.victim(), Some(f(5)));
        assert_eq!(replacer.victim(), Some(f(6)));
        assert_eq!(replacer.victim(), Some(f(4)));
    }

    #[test]
    fn test_pin_then_victim_order() {
        let replacer = LruReplacer::new(10);
        replacer.unpin(f(1));
        replacer.unpin(f(2));
        replacer.unpin(f(3));
        replacer.pin(f(2));

        assert_eq!(replacer.victim(), Some(f(1)));
        assert_eq!(replacer.victim(), Some(f(3)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_victim_on_empty_leaves_state_unchanged() {
        let replacer = LruReplacer::new(2);
        assert_eq!(replacer.victim(), None);
        assert_eq!(replacer.size(), 0);

        replacer.unpin(f(0));
        assert_eq!(replacer.victim(), Some(f(0)));
        assert_eq!(replacer.victim(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_unpin_at_capacity_is_ignored() {
        let replacer = LruReplacer::new(2);
        replacer.unpin(f(0));
        replacer.unpin(f(1));
        replacer.unpin(f(2));
        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.capacity(), 2);

        assert_eq!(replacer.victim(), Some(f(0)));
        assert_eq!(replacer.victim(), Some(f(1)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_slots_are_recycled() {
        let replacer = LruReplacer::new(3);
        for round in 0..100 {
            replacer.unpin(f(round % 3));
            replacer.pin(f(round % 3));
        }
        assert_eq!(replacer.size(), 0);
        assert!(replacer.inner.lock().nodes.len() <= 3);
    }

    #[test]
    fn test_concurrent_unpin() {
        use std::sync::Arc;
        use std::thread;

        let replacer = Arc::new(LruReplacer::new(400));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let replacer = Arc::clone(&replacer);
                thread::spawn(move || {
                    for i in 0..100 {
                        replacer.unpin(f(t * 100 + i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(replacer.size(), 400);
        let mut victims = 0;
        while replacer.victim().is_some() {
            victims += 1;
        }
        assert_eq!(victims, 400);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Unpin(usize),
        Pin(usize),
        Victim,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..12usize).prop_map(Op::Unpin),
            (0..12usize).prop_map(Op::Pin),
            Just(Op::Victim),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]
        #[test]
        fn matches_reference_model(ops in prop::collection::vec(op_strategy(), 1..200)) {
            const CAPACITY: usize = 8;
            let replacer = LruReplacer::new(CAPACITY);
            // front = least recently unpinned
            let mut model: VecDeque<usize> = VecDeque::new();

            for op in ops {
                match op {
                    Op::Unpin(id) => {
                        replacer.unpin(f(id));
                        if !model.contains(&id) && model.len() < CAPACITY {
                            model.push_back(id);
                        }
                    }
                    Op::Pin(id) => {
                        replacer.pin(f(id));
                        model.retain(|&x| x != id);
                    }
                    Op::Victim => {
                        let expected = model.pop_front().map(f);
                        prop_assert_eq!(replacer.victim(), expected);
                    }
                }
                prop_assert_eq!(replacer.size(), model.len());
            }
        }
    }
}
