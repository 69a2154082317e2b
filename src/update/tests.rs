//! Update Buffer Tests
//!
//! Validates the dissemination queue: infection counting, the logarithmic
//! eviction limit, and least-disseminated-first selection.

#[cfg(test)]
mod tests {
    use crate::update::buffer::UpdateBuffer;
    use crate::update::types::{Status, Update};

    fn buffer() -> UpdateBuffer {
        UpdateBuffer::new(6, 3.0)
    }

    // ============================================================
    // STATUS TESTS
    // ============================================================

    #[test]
    fn test_status_string_round_trip() {
        for status in [Status::Alive, Status::Suspect, Status::Down] {
            let parsed: Status = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!("faulty".parse::<Status>().is_err());
        assert!("".parse::<Status>().is_err());
        assert!("Alive".parse::<Status>().is_err(), "status is lowercase on the wire");
    }

    // ============================================================
    // LIMIT TESTS
    // ============================================================

    #[test]
    fn test_limit_is_logarithmic_in_peer_count() {
        let buf = buffer();

        // round(ln(21) * 3) = round(9.13) = 9
        assert_eq!(buf.limit(20), 9);
        // round(ln(2) * 3) = round(2.08) = 2
        assert_eq!(buf.limit(1), 2);
        // An empty peer table keeps nothing alive.
        assert_eq!(buf.limit(0), 0);
    }

    #[test]
    fn test_limit_honors_dissemination_factor() {
        let buf = UpdateBuffer::new(6, 4.0);
        // round(ln(21) * 4) = round(12.18) = 12
        assert_eq!(buf.limit(20), 12);
    }

    // ============================================================
    // ADD TESTS
    // ============================================================

    #[test]
    fn test_add_resets_count() {
        let mut buf = buffer();
        let mut update = Update::new(1, 3, Status::Alive);
        update.count = 7; // receivers ignore the transmitted count
        buf.add(update);

        assert_eq!(buf.entries()[0].count, 0);
    }

    #[test]
    fn test_add_allows_duplicates() {
        let mut buf = buffer();
        buf.add(Update::new(1, 3, Status::Alive));
        buf.add(Update::new(1, 3, Status::Alive));

        assert_eq!(buf.len(), 2);
    }

    // ============================================================
    // TAKE TESTS
    // ============================================================

    #[test]
    fn test_take_caps_at_max_piggyback() {
        let mut buf = buffer();
        for id in 0..10 {
            buf.add(Update::new(id, 1, Status::Alive));
        }

        let taken = buf.take(20);
        assert_eq!(taken.len(), 6);
    }

    #[test]
    fn test_take_increments_counts() {
        let mut buf = buffer();
        buf.add(Update::new(1, 1, Status::Alive));

        let taken = buf.take(20);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].count, 1);
        assert_eq!(buf.entries()[0].count, 1);

        let taken = buf.take(20);
        assert_eq!(taken[0].count, 2);
    }

    #[test]
    fn test_take_evicts_and_orders_least_disseminated_first() {
        // N = 20 peers, so limit = round(ln(21) * 3) = 9. Six entries with
        // counts {6, 7, 8, 8, 8, 9}: the count-9 entry is evicted before
        // selection, the remaining five come back in ascending-count order
        // with their counts incremented.
        let mut buf = buffer();
        let counts = [6u32, 7, 8, 8, 8, 9];
        for (id, count) in counts.iter().enumerate() {
            buf.add(Update::new(id as u64, 1, Status::Suspect));
            buf.set_count(id, *count);
        }

        let taken = buf.take(20);

        assert_eq!(taken.len(), 5, "the count-9 entry is evicted, five remain");
        let ids: Vec<u64> = taken.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4], "ascending count, insertion order on ties");
        let counts_after: Vec<u32> = taken.iter().map(|u| u.count).collect();
        assert_eq!(counts_after, vec![7, 8, 9, 9, 9]);
        assert_eq!(buf.len(), 5, "eviction removed exactly one entry");
    }

    #[test]
    fn test_take_tie_break_is_insertion_order() {
        let mut buf = buffer();
        for id in [42, 7, 99] {
            buf.add(Update::new(id, 1, Status::Alive));
        }

        let ids: Vec<u64> = buf.take(20).iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![42, 7, 99]);
    }

    #[test]
    fn test_update_ages_out_after_limit_takes() {
        let mut buf = buffer();
        buf.add(Update::new(1, 1, Status::Down));

        // limit for N = 1 is round(ln(2) * 3) = 2: the entry survives two
        // takes and is evicted on the third.
        assert_eq!(buf.take(1).len(), 1);
        assert_eq!(buf.take(1).len(), 1);
        assert_eq!(buf.take(1).len(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_counts_stay_below_limit_invariant() {
        let mut buf = buffer();
        for id in 0..4 {
            buf.add(Update::new(id, 1, Status::Alive));
        }

        let limit = buf.limit(20);
        for _ in 0..30 {
            buf.take(20);
            assert!(buf.entries().iter().all(|u| u.count <= limit));
        }
        assert!(buf.is_empty(), "everything ages out eventually");
    }
}
