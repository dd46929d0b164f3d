//! Owned, swappable device configuration.
//!
//! Route handlers never read a global.  They hold an `Arc<DeviceStore>`
//! (through the dispatcher) and take a [`snapshot`](DeviceStore::snapshot) per
//! request.  A reload builds a complete new [`DeviceTable`] and swaps it in
//! with [`replace`](DeviceStore::replace); requests already holding the old
//! snapshot finish against it undisturbed.
//!
//! The only writer is the TLS listener start-up path (plus the initial load in
//! `main`), so there is never contention on the write side.

use std::sync::{Arc, PoisonError, RwLock};

use shelly_core::DeviceTable;

/// Current device table behind an atomic swap.
#[derive(Debug, Default)]
pub struct DeviceStore {
    current: RwLock<Arc<DeviceTable>>,
}

impl DeviceStore {
    /// Creates a store holding `table`.
    pub fn new(table: DeviceTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
        }
    }

    /// Returns the table as of now.
    pub fn snapshot(&self) -> Arc<DeviceTable> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Swaps in a new table, returning the previous one.
    pub fn replace(&self, table: DeviceTable) -> Arc<DeviceTable> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(table))
    }
}
