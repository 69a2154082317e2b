use super::types::Update;

/// Bounded, priority-ordered dissemination queue.
///
/// Entries age out once their infection count reaches
/// `round(ln(N + 1) * k)`, where `N` is the current peer-table size and `k`
/// the configured dissemination factor. Per the SWIM analysis this keeps the
/// probability of any alive node missing an update around `1/N` while
/// bounding the piggyback traffic per message.
#[derive(Debug)]
pub struct UpdateBuffer {
    entries: Vec<Update>,
    max_piggyback: usize,
    dissemination_factor: f64,
}

impl UpdateBuffer {
    pub fn new(max_piggyback: usize, dissemination_factor: f64) -> Self {
        Self {
            entries: Vec::new(),
            max_piggyback,
            dissemination_factor,
        }
    }

    /// Appends an update with its infection count reset to zero.
    ///
    /// Duplicates are allowed; each copy ages out independently.
    pub fn add(&mut self, mut update: Update) {
        update.count = 0;
        self.entries.push(update);
    }

    /// Returns up to `max_piggyback` of the least-disseminated still-live
    /// updates to attach to an outgoing message, incrementing the infection
    /// count of every returned entry.
    ///
    /// Entries whose count has reached the current limit are evicted before
    /// selection. Ties on count are broken in insertion order.
    pub fn take(&mut self, peer_count: usize) -> Vec<Update> {
        let limit = self.limit(peer_count);
        self.entries.retain(|u| u.count < limit);
        // Stable sort keeps insertion order among equal counts.
        self.entries.sort_by_key(|u| u.count);

        let n = self.entries.len().min(self.max_piggyback);
        let mut taken = Vec::with_capacity(n);
        for entry in self.entries.iter_mut().take(n) {
            entry.count += 1;
            taken.push(entry.clone());
        }
        taken
    }

    /// Infection-count eviction threshold for the given peer-table size.
    pub fn limit(&self, peer_count: usize) -> u32 {
        ((peer_count as f64 + 1.0).ln() * self.dissemination_factor).round() as u32
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read-only view of the buffered entries, used by state snapshots and
    /// tests.
    pub fn entries(&self) -> &[Update] {
        &self.entries
    }

    #[cfg(test)]
    pub(crate) fn set_count(&mut self, index: usize, count: u32) {
        self.entries[index].count = count;
    }
}
