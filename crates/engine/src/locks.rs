//! Keyed lock tables with bounded waits.
//!
//! Every `(product, location)` pair has a single logical mutation point, and
//! every operation document serializes its own transitions. Acquisition waits
//! are bounded: exceeding the timeout surfaces a lock-timeout error to the
//! caller rather than deadlocking, and retrying is the caller's decision.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use parking_lot::lock_api::ArcMutexGuard;

use crate::error::EngineError;

type Slot = Arc<Mutex<()>>;

/// Holds one keyed exclusive section until dropped.
pub struct KeyGuard {
    _guard: ArcMutexGuard<parking_lot::RawMutex, ()>,
}

/// Lazily-populated table of per-key mutexes.
#[derive(Debug)]
pub struct LockTable<K> {
    slots: Mutex<HashMap<K, Slot>>,
    timeout: Duration,
}

impl<K> LockTable<K>
where
    K: Copy + Eq + Ord + Hash + Debug,
{
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn slot(&self, key: K) -> Slot {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))))
    }

    /// Acquire one key's exclusive section within the bounded wait.
    pub fn acquire(&self, key: K) -> Result<KeyGuard, EngineError> {
        let slot = self.slot(key);
        match slot.try_lock_arc_for(self.timeout) {
            Some(guard) => Ok(KeyGuard { _guard: guard }),
            None => Err(EngineError::LockTimeout(format!("{key:?}"))),
        }
    }

    /// Acquire several keys in sorted, deduplicated order (a fixed order
    /// across callers prevents lock-order inversions). On timeout, guards
    /// already taken are released by drop and nothing stays held.
    pub fn acquire_all(&self, keys: &[K]) -> Result<Vec<KeyGuard>, EngineError> {
        let mut ordered: Vec<K> = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for key in ordered {
            guards.push(self.acquire(key)?);
        }
        Ok(guards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn contended_key_times_out() {
        let table = Arc::new(LockTable::new(Duration::from_millis(50)));

        let held = table.acquire(1u32).unwrap();

        let contender = Arc::clone(&table);
        let timed_out = thread::spawn(move || {
            matches!(contender.acquire(1u32), Err(EngineError::LockTimeout(_)))
        })
        .join()
        .unwrap();
        assert!(timed_out);

        drop(held);
        assert!(table.acquire(1u32).is_ok());
    }

    #[test]
    fn different_keys_do_not_contend() {
        let table = LockTable::new(Duration::from_millis(50));
        let _first = table.acquire(1u32).unwrap();
        assert!(table.acquire(2u32).is_ok());
    }

    #[test]
    fn acquire_all_dedupes_keys() {
        let table = LockTable::new(Duration::from_millis(50));
        // A duplicated key would self-deadlock without deduplication.
        let guards = table.acquire_all(&[3u32, 1, 3, 2, 1]).unwrap();
        assert_eq!(guards.len(), 3);
    }
}
