//! Reconciliation: internal transfers and stock adjustments.
//!
//! Both execute immediately (no draft/ready staging) but go through the same
//! check-then-append discipline as validate: the `(product, location)` pair
//! locks are held from the availability read until the move is appended and
//! the view updated, so two concurrent requests cannot both pass against
//! stale stock and jointly overdraw a location.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use stockflow_core::{LocationId, MoveId, ProductId};
use stockflow_ledger::{MoveKind, StockKey, StockLedger, StockView, UncommittedMove};

use crate::collaborators::{ProductCatalog, ReferenceSource, WarehouseTopology};
use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use crate::locks::LockTable;

/// Move stock between two locations, immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub product: ProductId,
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub quantity: i64,
}

/// How an adjustment quantity is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentMode {
    /// Replace current stock with the given physical count (emits the delta).
    Set,
    /// Emit the given signed quantity as-is.
    Add,
}

/// Correct stock at a single location, immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRequest {
    pub product: ProductId,
    pub location: LocationId,
    pub quantity: i64,
    pub mode: AdjustmentMode,
}

pub struct ReconciliationEngine {
    ledger: Arc<StockLedger>,
    view: Arc<StockView>,
    stock_locks: Arc<LockTable<StockKey>>,
    catalog: Arc<dyn ProductCatalog>,
    topology: Arc<dyn WarehouseTopology>,
    references: Arc<dyn ReferenceSource>,
}

impl ReconciliationEngine {
    pub fn new(
        ledger: Arc<StockLedger>,
        view: Arc<StockView>,
        stock_locks: Arc<LockTable<StockKey>>,
        catalog: Arc<dyn ProductCatalog>,
        topology: Arc<dyn WarehouseTopology>,
        references: Arc<dyn ReferenceSource>,
    ) -> Self {
        Self {
            ledger,
            view,
            stock_locks,
            catalog,
            topology,
            references,
        }
    }

    /// Execute an internal transfer. Fails with an insufficient-stock error
    /// when the source location does not hold the requested quantity.
    pub fn transfer(&self, ctx: &RequestContext, request: TransferRequest) -> EngineResult<MoveId> {
        self.ensure_known_product(request.product)?;
        self.ensure_known_location(request.from_location)?;
        self.ensure_known_location(request.to_location)?;
        if request.from_location == request.to_location {
            return Err(EngineError::Validation(
                "transfer endpoints must differ".to_string(),
            ));
        }
        if request.quantity <= 0 {
            return Err(EngineError::Validation(
                "transfer quantity must be positive".to_string(),
            ));
        }

        let keys = [
            StockKey::new(request.product, request.from_location),
            StockKey::new(request.product, request.to_location),
        ];
        let _guards = self.stock_locks.acquire_all(&keys)?;

        let available = self
            .view
            .current_quantity(request.product, request.from_location);
        if available < request.quantity {
            return Err(EngineError::InsufficientStock {
                product: request.product,
                requested: request.quantity,
                available,
            });
        }

        let reference = self.references.next_reference(MoveKind::Internal);
        let committed = self.ledger.append(UncommittedMove::internal(
            reference,
            request.product,
            request.from_location,
            request.to_location,
            request.quantity,
            Utc::now(),
        ))?;

        tracing::info!(
            actor = %ctx.actor(),
            reference = committed.reference,
            quantity = request.quantity,
            "internal transfer committed"
        );
        Ok(committed.id)
    }

    /// Execute a stock adjustment. Returns `None` when a `Set` matches the
    /// current quantity (the zero-delta append is suppressed).
    pub fn adjust(
        &self,
        ctx: &RequestContext,
        request: AdjustmentRequest,
    ) -> EngineResult<Option<MoveId>> {
        self.ensure_known_product(request.product)?;
        self.ensure_known_location(request.location)?;
        match request.mode {
            AdjustmentMode::Set if request.quantity < 0 => {
                return Err(EngineError::Validation(
                    "a physical count cannot be negative".to_string(),
                ));
            }
            AdjustmentMode::Add if request.quantity == 0 => {
                return Err(EngineError::Validation(
                    "adjustment quantity cannot be zero".to_string(),
                ));
            }
            _ => {}
        }

        let key = StockKey::new(request.product, request.location);
        let _guard = self.stock_locks.acquire(key)?;

        let delta = match request.mode {
            AdjustmentMode::Set => {
                let current = self
                    .view
                    .current_quantity(request.product, request.location);
                request.quantity - current
            }
            AdjustmentMode::Add => request.quantity,
        };

        if delta == 0 {
            tracing::debug!(
                product = %request.product,
                location = %request.location,
                "set adjustment matches current stock, nothing to append"
            );
            return Ok(None);
        }

        let reference = self.references.next_reference(MoveKind::Adjustment);
        let committed = self.ledger.append(UncommittedMove::adjustment(
            reference,
            request.product,
            request.location,
            delta,
            Utc::now(),
        ))?;

        tracing::info!(
            actor = %ctx.actor(),
            reference = committed.reference,
            delta,
            "stock adjustment committed"
        );
        Ok(Some(committed.id))
    }

    fn ensure_known_product(&self, product: ProductId) -> EngineResult<()> {
        if self.catalog.contains(product) {
            Ok(())
        } else {
            Err(EngineError::Validation(format!("unknown product {product}")))
        }
    }

    fn ensure_known_location(&self, location: LocationId) -> EngineResult<()> {
        if self.topology.contains(location) {
            Ok(())
        } else {
            Err(EngineError::Validation(format!(
                "unknown location {location}"
            )))
        }
    }
}
