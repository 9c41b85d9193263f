//! Monotonic request id generation for host correlation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::bridge::protocol::RequestId;

static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate a request id never handed out before in this process.
pub fn next_request_id() -> RequestId {
    RequestId::new(COUNTER.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sequential_ids_are_increasing() {
        let a = next_request_id();
        let b = next_request_id();
        let c = next_request_id();
        assert!(b > a);
        assert!(c > b);
    }

    #[test]
    fn ids_are_never_zero() {
        assert_ne!(next_request_id().as_u64(), 0);
    }

    #[test]
    fn concurrent_ids_are_distinct() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..500).map(|_| next_request_id()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 8 * 500);
    }
}
