use std::sync::atomic::{AtomicU64, Ordering};

/// Source of guide reference numbers.
///
/// The engine draws numbers only in its single-threaded commit phase, so for a
/// given input the sequence of ids is reproducible. Implementations must be
/// shareable across threads because one sequence may serve several engines.
pub trait ReferenceSequence: Send + Sync + std::fmt::Debug {
    /// Next number, never repeating until [`ReferenceSequence::reset`]
    fn next_reference(&self) -> u64;

    /// Restart from the initial value
    fn reset(&self);
}

/// Process-wide style counter backed by an atomic
#[derive(Debug, Default)]
pub struct AtomicReferenceSequence {
    start: u64,
    next: AtomicU64,
}

impl AtomicReferenceSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter whose first value (and reset value) is `start`
    pub fn starting_at(start: u64) -> Self {
        Self {
            start,
            next: AtomicU64::new(start),
        }
    }

    /// Value the next call will return
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl ReferenceSequence for AtomicReferenceSequence {
    fn next_reference(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    fn reset(&self) {
        self.next.store(self.start, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_sequence_and_reset() {
        let seq = AtomicReferenceSequence::starting_at(10);
        assert_eq!(seq.next_reference(), 10);
        assert_eq!(seq.next_reference(), 11);
        assert_eq!(seq.peek(), 12);
        seq.reset();
        assert_eq!(seq.next_reference(), 10);
    }

    #[test]
    fn test_unique_across_threads() {
        let seq = Arc::new(AtomicReferenceSequence::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let seq = Arc::clone(&seq);
                std::thread::spawn(move || (0..250).map(|_| seq.next_reference()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }
}
