//! Memoized relationship lookups

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{relationship, Contract, Relationship};

/// Memo table for [`relationship`] on compound contracts.
///
/// One coarse lock guards the whole table. Scalar comparisons are cheap and
/// bypass it.
#[derive(Debug, Default)]
pub struct RelationshipCache {
    entries: Mutex<HashMap<(Contract, Contract), Relationship>>,
}

impl RelationshipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relationship(&self, a: &Contract, b: &Contract) -> Relationship {
        if is_scalar(a) && is_scalar(b) {
            return relationship(a, b);
        }
        let key = (a.clone(), b.clone());
        if let Some(found) = self.entries.lock().get(&key) {
            return *found;
        }
        // Computed outside the lock; a racing thread computes the same answer
        let computed = relationship(a, b);
        self.entries.lock().insert(key, computed);
        computed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

fn is_scalar(c: &Contract) -> bool {
    matches!(c, Contract::Primitive(_) | Contract::Super | Contract::Meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_scalars_bypass_table() {
        let cache = RelationshipCache::new();
        assert_eq!(cache.relationship(&Contract::INTEGER, &Contract::REAL), Relationship::Subset);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_compound_results_are_memoized() {
        let cache = RelationshipCache::new();
        let a = Contract::composite([("x", Contract::INTEGER)]);
        let b = Contract::composite([("x", Contract::INTEGER), ("y", Contract::STRING)]);
        assert_eq!(cache.relationship(&a, &b), Relationship::Superset);
        assert_eq!(cache.relationship(&a, &b), Relationship::Superset);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(RelationshipCache::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let arr = Contract::array(Contract::INTEGER, 1 + i % 2);
                    cache.relationship(&arr, &Contract::array(Contract::REAL, 1 + i % 2))
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Relationship::Subset);
        }
        assert_eq!(cache.len(), 2);
    }
}
