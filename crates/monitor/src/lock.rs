//! Per-deposit monitoring deduplication.
//!
//! Chain events are delivered at-least-once, so a start event may arrive
//! more than once for the same deposit. The lock guarantees a single
//! monitoring task per `(deposit, monitor)` pair.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use keep_tbtc_primitives::DepositId;

/// Tracks which `(deposit, monitor)` pairs are currently being monitored.
#[derive(Debug, Clone, Default)]
pub(crate) struct MonitoringLock {
    held: Arc<Mutex<HashSet<(DepositId, &'static str)>>>,
}

impl MonitoringLock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for the pair, or returns `None` when a task is
    /// already monitoring it. The lock is released when the returned guard
    /// drops.
    pub(crate) fn acquire(
        &self,
        deposit_id: DepositId,
        monitor: &'static str,
    ) -> Option<MonitoringLockGuard> {
        let key = (deposit_id, monitor);
        let mut held = self.held.lock().expect("monitoring lock poisoned");
        if !held.insert(key) {
            return None;
        }
        Some(MonitoringLockGuard {
            held: self.held.clone(),
            key,
        })
    }
}

/// Releases the `(deposit, monitor)` pair on drop.
#[derive(Debug)]
pub(crate) struct MonitoringLockGuard {
    held: Arc<Mutex<HashSet<(DepositId, &'static str)>>>,
    key: (DepositId, &'static str),
}

impl Drop for MonitoringLockGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .expect("monitoring lock poisoned")
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use keep_tbtc_primitives::Address;

    use super::*;

    fn deposit(byte: u8) -> DepositId {
        DepositId(Address::from_bytes([byte; 20]))
    }

    #[test]
    fn second_acquire_fails_until_guard_drops() {
        let locks = MonitoringLock::new();

        let guard = locks.acquire(deposit(1), "retrieve-pubkey").unwrap();
        assert!(locks.acquire(deposit(1), "retrieve-pubkey").is_none());

        // Other monitors and other deposits are unaffected.
        assert!(locks.acquire(deposit(1), "redemption-signature").is_some());
        assert!(locks.acquire(deposit(2), "retrieve-pubkey").is_some());

        drop(guard);
        assert!(locks.acquire(deposit(1), "retrieve-pubkey").is_some());
    }
}
