//! Item id assignment.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a loaded item instance.
pub type ItemId = u64;

/// Hands out item ids that are unique for the lifetime of the factory.
///
/// Implementations must be shareable across threads because trial containers
/// may be filled in parallel.
pub trait ItemIdFactory: Send + Sync {
    fn next_id(&self) -> ItemId;
}

/// Counts upwards from a starting value.
#[derive(Debug, Default)]
pub struct SequentialIdFactory {
    next: AtomicU64,
}

impl SequentialIdFactory {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: ItemId) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl ItemIdFactory for SequentialIdFactory {
    fn next_id(&self) -> ItemId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn ids_are_sequential() {
        let factory = SequentialIdFactory::starting_at(10);
        assert_eq!(factory.next_id(), 10);
        assert_eq!(factory.next_id(), 11);
    }

    #[test]
    fn ids_stay_unique_across_threads() {
        let factory = Arc::new(SequentialIdFactory::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let factory = Arc::clone(&factory);
                std::thread::spawn(move || (0..250).map(|_| factory.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
