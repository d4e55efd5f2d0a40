//! Write-time version stamps
//!
//! Versions come from the wall clock at nanosecond granularity. When two
//! writes land in the same nanosecond (or the clock steps backwards) the
//! stamp is bumped past the last one issued, so stamps from one clock are
//! strictly increasing.

use crate::common::timestamp_now_nanos;
use crate::replica::Version;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicI64,
}

impl VersionClock {
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    pub fn next(&self) -> Version {
        let now = timestamp_now_nanos();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(observed) => last = observed,
            }
        }
    }

    /// Last stamp handed out (0 if none)
    pub fn last(&self) -> Version {
        self.last.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_strictly_increasing() {
        let clock = VersionClock::new();
        let mut prev = clock.next();
        for _ in 0..10_000 {
            let v = clock.next();
            assert!(v > prev);
            prev = v;
        }
        assert_eq!(clock.last(), prev);
    }

    #[test]
    fn test_unique_across_threads() {
        let clock = Arc::new(VersionClock::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = clock.clone();
                std::thread::spawn(move || (0..1_000).map(|_| clock.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for v in handle.join().unwrap() {
                assert!(seen.insert(v), "duplicate version {}", v);
            }
        }
        assert_eq!(seen.len(), 8_000);
    }
}
