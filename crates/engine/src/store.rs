//! In-memory operation document store.
//!
//! Intended for tests/dev and single-process deployments. The write section
//! handed out by [`OperationStore::with_mut`] is what makes a validate commit
//! atomic to operation readers: the ledger append and the status flip happen
//! inside one closure while the store's write lock is held.

use std::collections::HashMap;

use parking_lot::RwLock;

use stockflow_core::OperationId;
use stockflow_operations::Operation;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Default)]
pub struct OperationStore {
    inner: RwLock<HashMap<OperationId, Operation>>,
}

impl OperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, operation: Operation) {
        self.inner.write().insert(operation.id(), operation);
    }

    pub fn get(&self, id: OperationId) -> Option<Operation> {
        self.inner.read().get(&id).cloned()
    }

    /// All stored operations, ordered by reference for stable listings.
    pub fn list(&self) -> Vec<Operation> {
        let mut operations: Vec<Operation> = self.inner.read().values().cloned().collect();
        operations.sort_by(|a, b| a.reference().cmp(b.reference()));
        operations
    }

    /// Run a mutation against one operation inside the store's write section.
    ///
    /// Everything the closure does (including ledger appends) is observed
    /// atomically by operation readers.
    pub fn with_mut<T>(
        &self,
        id: OperationId,
        f: impl FnOnce(&mut Operation) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut inner = self.inner.write();
        let operation = inner.get_mut(&id).ok_or(EngineError::NotFound)?;
        f(operation)
    }
}
