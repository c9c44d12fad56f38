//! `stockflow-engine` — the transactional boundary of the stock engine.
//!
//! Composes the pure operation domain with the stock ledger behind keyed
//! locks, so that availability checks and ledger commits are atomic per
//! `(product, location)` pair. Catalog, warehouse topology, and reference
//! numbering are external collaborators behind traits; in-memory
//! implementations are provided for tests and development.

pub mod collaborators;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod locks;
pub mod reconcile;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use stockflow_ledger::{StockLedger, StockView};

pub use collaborators::{
    CountingReferences, InMemoryCatalog, InMemoryTopology, ProductCatalog, ReferenceSource,
    WarehouseTopology,
};
pub use context::RequestContext;
pub use coordinator::{TransitionOutcome, ValidateOutcome, ValidationCoordinator, ValuedStockRow};
pub use error::{EngineError, EngineResult};
pub use reconcile::{AdjustmentMode, AdjustmentRequest, ReconciliationEngine, TransferRequest};
pub use store::OperationStore;

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bounded wait for keyed locks; exceeding it surfaces a retryable
    /// lock-timeout error instead of deadlocking.
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
        }
    }
}

/// Wire up a coordinator and a reconciliation engine over one shared ledger,
/// view, and lock table.
pub fn build(
    catalog: Arc<dyn ProductCatalog>,
    topology: Arc<dyn WarehouseTopology>,
    references: Arc<dyn ReferenceSource>,
    config: EngineConfig,
) -> (ValidationCoordinator, ReconciliationEngine) {
    let view = Arc::new(StockView::new());
    let ledger = Arc::new(StockLedger::new(Arc::clone(&view)));
    let stock_locks = Arc::new(locks::LockTable::new(config.lock_timeout));
    let op_locks = Arc::new(locks::LockTable::new(config.lock_timeout));
    let operations = Arc::new(OperationStore::new());

    let coordinator = ValidationCoordinator::new(
        Arc::clone(&ledger),
        Arc::clone(&view),
        Arc::clone(&operations),
        Arc::clone(&stock_locks),
        op_locks,
        Arc::clone(&catalog),
        Arc::clone(&topology),
        Arc::clone(&references),
    );
    let reconciliation = ReconciliationEngine::new(
        ledger,
        view,
        stock_locks,
        catalog,
        topology,
        references,
    );

    (coordinator, reconciliation)
}
