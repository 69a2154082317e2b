use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Round-robin probe order over the peer ids.
///
/// Each protocol period probes the peer at `next_index`; when the index
/// wraps, the order is Fisher-Yates-shuffled in place, so every peer is
/// probed exactly once per epoch and epochs are independently ordered.
#[derive(Debug)]
pub struct ProbeSchedule {
    order: Vec<u64>,
    next_index: usize,
}

impl ProbeSchedule {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            next_index: 0,
        }
    }

    /// Inserts a new peer at a uniformly random position so a freshly added
    /// peer does not always wait a full epoch for its first probe.
    pub fn insert(&mut self, id: u64, rng: &mut StdRng) {
        let index = rng.gen_range(0..=self.order.len());
        self.order.insert(index, id);
    }

    /// Returns the peer to probe this period and advances the cursor,
    /// reshuffling when an epoch completes.
    pub fn next(&mut self, rng: &mut StdRng) -> Option<u64> {
        if self.order.is_empty() {
            return None;
        }
        let id = self.order[self.next_index];
        self.next_index += 1;
        if self.next_index >= self.order.len() {
            self.next_index = 0;
            self.order.shuffle(rng);
        }
        Some(id)
    }

    /// Uniform pick over all scheduled peers.
    pub fn random(&self, rng: &mut StdRng) -> Option<u64> {
        self.order.choose(rng).copied()
    }

    pub fn ids(&self) -> &[u64] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
