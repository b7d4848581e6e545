use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out strictly increasing nonces for the admin key.
///
/// Seeded with the pending nonce minus one so the first `next()` returns the
/// pending nonce itself. Safe to share between worker threads.
#[derive(Debug)]
pub struct NonceSequencer {
    last: AtomicU64,
}

impl NonceSequencer {
    pub fn from_pending(pending: u64) -> Self {
        Self {
            last: AtomicU64::new(pending.wrapping_sub(1)),
        }
    }

    /// Reserve the next nonce.
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Last value handed out (or the seed if none yet).
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn first_nonce_is_pending_nonce() {
        let seq = NonceSequencer::from_pending(42);
        assert_eq!(seq.current(), 41);
        assert_eq!(seq.next(), 42);
        assert_eq!(seq.next(), 43);
        assert_eq!(seq.current(), 43);
    }

    #[test]
    fn fresh_account_starts_at_zero() {
        let seq = NonceSequencer::from_pending(0);
        assert_eq!(seq.current(), u64::MAX);
        assert_eq!(seq.next(), 0);
        assert_eq!(seq.next(), 1);
    }

    #[test]
    fn concurrent_callers_get_contiguous_unique_nonces() {
        const THREADS: usize = 16;
        const PER_THREAD: usize = 500;
        let pending = 1_000;
        let seq = Arc::new(NonceSequencer::from_pending(pending));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let seq = Arc::clone(&seq);
                thread::spawn(move || (0..PER_THREAD).map(|_| seq.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = Vec::with_capacity(THREADS * PER_THREAD);
        for handle in handles {
            all.extend(handle.join().unwrap());
        }

        let unique: HashSet<u64> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());

        let total = (THREADS * PER_THREAD) as u64;
        let expected: HashSet<u64> = (pending..pending + total).collect();
        assert_eq!(unique, expected);
    }
}
