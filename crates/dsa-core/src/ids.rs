//! Identifier allocation for primary and secondary users.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues `"{prefix}{n}"` ids from an atomic counter.
///
/// One allocator is owned by whoever builds a population of users; ids are
/// stable for the lifetime of the entity and unique per allocator.
#[derive(Debug)]
pub struct IdAllocator {
    prefix: &'static str,
    next: AtomicU64,
}

impl IdAllocator {
    pub const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(0),
        }
    }

    pub fn for_pus() -> Self {
        Self::new("PU")
    }

    pub fn for_sus() -> Self {
        Self::new("SU")
    }

    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let ids = IdAllocator::for_pus();
        assert_eq!(ids.next_id(), "PU0");
        assert_eq!(ids.next_id(), "PU1");
        assert_eq!(ids.issued(), 2);
        assert_eq!(IdAllocator::for_sus().next_id(), "SU0");
    }

    #[test]
    fn test_unique_across_threads() {
        let ids = IdAllocator::for_sus();
        let mut all: Vec<String> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| (0..100).map(|_| ids.next_id()).collect::<Vec<_>>()))
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 400);
    }
}
