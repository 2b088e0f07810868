//! Session progress counters.
//!
//! Counters are plain atomics so workers can bump them from any task and
//! readers can snapshot them without blocking a download. Solo downloads
//! count toward the overall pair; profile and card voices each keep their
//! own pair. An item is counted as attempted when its download concludes,
//! whether or not it succeeded.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::catalog::Category;

#[derive(Debug, Default)]
struct Counter {
    attempted: AtomicUsize,
    total: AtomicUsize,
}

impl Counter {
    fn load(&self) -> CategoryProgress {
        CategoryProgress {
            attempted: self.attempted.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }
}

/// Attempted versus planned for one counter pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryProgress {
    pub attempted: usize,
    pub total: usize,
}

/// Point-in-time view of session progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    /// Overall progress; solo songs are counted here.
    pub overall: CategoryProgress,
    pub profile: CategoryProgress,
    pub card: CategoryProgress,
}

/// Shared progress state for one download session.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    overall: Counter,
    profile: Counter,
    card: Counter,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the planned item count of each counter pair.
    pub fn set_totals(&self, solo: usize, profile: usize, card: usize) {
        self.overall.total.store(solo, Ordering::SeqCst);
        self.profile.total.store(profile, Ordering::SeqCst);
        self.card.total.store(card, Ordering::SeqCst);
    }

    /// Count one concluded download attempt, successful or not.
    pub fn record_attempt(&self, category: Category) {
        let counter = match category {
            Category::Solo => &self.overall,
            Category::Profile => &self.profile,
            Category::Card => &self.card,
        };
        counter.attempted.fetch_add(1, Ordering::SeqCst);
    }

    /// Non-blocking snapshot of all counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            overall: self.overall.load(),
            profile: self.profile.load(),
            card: self.card.load(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_totals_and_attempts() {
        let tracker = ProgressTracker::new();
        tracker.set_totals(3, 10, 200);

        tracker.record_attempt(Category::Solo);
        tracker.record_attempt(Category::Profile);
        tracker.record_attempt(Category::Profile);
        tracker.record_attempt(Category::Card);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.overall, CategoryProgress { attempted: 1, total: 3 });
        assert_eq!(snapshot.profile, CategoryProgress { attempted: 2, total: 10 });
        assert_eq!(snapshot.card, CategoryProgress { attempted: 1, total: 200 });
    }

    #[test]
    fn test_counters_are_independent() {
        let tracker = ProgressTracker::new();
        tracker.set_totals(0, 5, 5);

        for _ in 0..5 {
            tracker.record_attempt(Category::Card);
        }

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.profile.attempted, 0);
        assert_eq!(snapshot.card.attempted, 5);
    }

    #[test]
    fn test_concurrent_attempts_all_counted() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.set_totals(0, 0, 400);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.record_attempt(Category::Card);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.snapshot().card.attempted, 400);
    }
}
