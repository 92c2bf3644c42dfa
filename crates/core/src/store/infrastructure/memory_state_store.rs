use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::store::domain::state_store::{StateKey, StateStore, StoreError};

/// In-process store used when both roles run in one process and by tests.
///
/// Counts writes so callers can assert that an operation left the store alone.
#[derive(Default)]
pub struct MemoryStateStore {
    cells: Mutex<HashMap<StateKey, String>>,
    writes: AtomicUsize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStateStore {
    fn read_raw(&self, key: StateKey) -> Option<String> {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.get(&key).cloned()
    }

    fn write_raw(&self, key: StateKey, value: &str) -> Result<(), StoreError> {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.insert(key, value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
