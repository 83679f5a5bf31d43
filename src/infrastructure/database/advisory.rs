//! Advisory lock registry
//!
//! String-keyed try-locks used to serialize pairing transactions per
//! chassis number. Keys are hashed to an i64 the way `hashtext()` feeds
//! `pg_advisory_xact_lock`; on SQLite (which has no advisory locks) the
//! registry is process-local, which is sufficient while all writers share
//! the process. A PostgreSQL deployment swaps in the native call behind
//! the same guard shape.

use std::sync::Arc;

use dashmap::DashMap;

/// FNV-1a 64-bit, folded to i64 to match the advisory-lock key space.
fn hash_key(key: &str) -> i64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash as i64
}

/// Process-wide advisory lock registry.
#[derive(Default)]
pub struct LockRegistry {
    held: Arc<DashMap<i64, ()>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self {
            held: Arc::new(DashMap::new()),
        }
    }

    /// Try to acquire the lock for `key`. Returns `None` when another
    /// holder owns it; the returned guard releases on drop.
    pub fn try_lock(&self, key: &str) -> Option<AdvisoryLockGuard> {
        let hashed = hash_key(key);
        match self.held.entry(hashed) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Some(AdvisoryLockGuard {
                    held: Arc::clone(&self.held),
                    hashed,
                })
            }
        }
    }
}

/// RAII guard for one advisory lock.
pub struct AdvisoryLockGuard {
    held: Arc<DashMap<i64, ()>>,
    hashed: i64,
}

impl Drop for AdvisoryLockGuard {
    fn drop(&mut self) {
        self.held.remove(&self.hashed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let registry = LockRegistry::new();
        let guard = registry.try_lock("pairing:CH-001").unwrap();
        assert!(registry.try_lock("pairing:CH-001").is_none());
        drop(guard);
        assert!(registry.try_lock("pairing:CH-001").is_some());
    }

    #[test]
    fn distinct_keys_do_not_contend() {
        let registry = LockRegistry::new();
        let _a = registry.try_lock("pairing:CH-001").unwrap();
        let _b = registry.try_lock("pairing:CH-002").unwrap();
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(hash_key("pairing:CH-001"), hash_key("pairing:CH-001"));
        assert_ne!(hash_key("pairing:CH-001"), hash_key("pairing:CH-002"));
    }
}
