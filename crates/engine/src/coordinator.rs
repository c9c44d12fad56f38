//! Validation coordinator: drives operation documents from draft to done and
//! turns a "validate" intent into ledger entries plus exactly one status
//! transition, atomically.
//!
//! Locking discipline: every transition serializes on the operation's own
//! lock first; validate then takes the `(product, location)` pair locks (in
//! sorted order) before re-reading availability, and releases them only after
//! the moves are appended and the status flipped. The sufficiency check a
//! commit relies on is therefore never computed against stale stock.

use std::sync::Arc;

use chrono::Utc;

use stockflow_core::{LocationId, MoveId, OperationId, ProductId, WarehouseId};
use stockflow_ledger::{
    ConsistencyViolation, Move, MoveFilter, MoveKind, StockFilter, StockKey, StockLedger,
    StockRow, StockView, UncommittedMove,
};
use stockflow_operations::{
    DraftEdit, Operation, OperationDraft, OperationKind, OperationStatus, Shortfall,
    StockEndpoint, Sufficiency,
};

use crate::collaborators::{ProductCatalog, ReferenceSource, WarehouseTopology};
use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use crate::locks::LockTable;
use crate::store::OperationStore;

/// Result of a staged transition ("To DO" / "Recheck Stock").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub status: OperationStatus,
    pub shortfalls: Vec<Shortfall>,
}

/// Result of a validate request: the final status, the committed move ids
/// (empty unless `Done`), and the lines still short (empty unless `Waiting`).
/// Enough for the caller to render the outcome without re-fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOutcome {
    pub status: OperationStatus,
    pub moves: Vec<MoveId>,
    pub shortfalls: Vec<Shortfall>,
}

/// One row of the valuation report: current stock priced at catalog unit cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuedStockRow {
    pub product: ProductId,
    pub location: LocationId,
    pub quantity: i64,
    pub unit_cost: Option<u64>,
    pub value: Option<i64>,
}

pub struct ValidationCoordinator {
    ledger: Arc<StockLedger>,
    view: Arc<StockView>,
    operations: Arc<OperationStore>,
    stock_locks: Arc<LockTable<StockKey>>,
    op_locks: Arc<LockTable<OperationId>>,
    catalog: Arc<dyn ProductCatalog>,
    topology: Arc<dyn WarehouseTopology>,
    references: Arc<dyn ReferenceSource>,
}

impl ValidationCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<StockLedger>,
        view: Arc<StockView>,
        operations: Arc<OperationStore>,
        stock_locks: Arc<LockTable<StockKey>>,
        op_locks: Arc<LockTable<OperationId>>,
        catalog: Arc<dyn ProductCatalog>,
        topology: Arc<dyn WarehouseTopology>,
        references: Arc<dyn ReferenceSource>,
    ) -> Self {
        Self {
            ledger,
            view,
            operations,
            stock_locks,
            op_locks,
            catalog,
            topology,
            references,
        }
    }

    /// Create a new operation document in `Draft`.
    pub fn create_operation(
        &self,
        ctx: &RequestContext,
        draft: OperationDraft,
    ) -> EngineResult<Operation> {
        self.resolve_endpoint(draft.endpoint)?;
        self.ensure_known_products(draft.lines.iter().map(|line| line.product))?;

        let kind = draft.kind;
        let reference = self.references.next_reference(match kind {
            OperationKind::Receipt => MoveKind::Receipt,
            OperationKind::Delivery => MoveKind::Delivery,
        });

        let operation = Operation::create(OperationId::new(), reference, draft)?;
        tracing::info!(
            actor = %ctx.actor(),
            reference = operation.reference(),
            kind = ?kind,
            "operation created"
        );
        self.operations.insert(operation.clone());
        Ok(operation)
    }

    /// Edit a draft operation (lines, dates, contact). Draft-only.
    pub fn update_operation(
        &self,
        ctx: &RequestContext,
        id: OperationId,
        edit: DraftEdit,
    ) -> EngineResult<Operation> {
        if let Some(lines) = &edit.lines {
            self.ensure_known_products(lines.iter().map(|line| line.product))?;
        }

        let _op_guard = self.op_locks.acquire(id)?;
        self.operations.with_mut(id, |operation| {
            operation.apply_edit(edit)?;
            tracing::info!(
                actor = %ctx.actor(),
                reference = operation.reference(),
                "operation draft updated"
            );
            Ok(operation.clone())
        })
    }

    /// "To DO": leave `Draft` for `Ready` or `Waiting` based on sufficiency.
    /// No ledger effect; the authoritative check is repeated at validate time.
    pub fn transition_to_do(
        &self,
        ctx: &RequestContext,
        id: OperationId,
    ) -> EngineResult<TransitionOutcome> {
        let _op_guard = self.op_locks.acquire(id)?;
        let operation = self.operations.get(id).ok_or(EngineError::NotFound)?;

        let sufficiency = self.evaluate(&operation)?;
        let status = self
            .operations
            .with_mut(id, |operation| operation.mark_to_do(&sufficiency).map_err(Into::into))?;

        if status == OperationStatus::Waiting {
            tracing::warn!(
                actor = %ctx.actor(),
                reference = operation.reference(),
                shortfalls = sufficiency.shortfalls().len(),
                "operation waiting on stock"
            );
        }
        Ok(TransitionOutcome {
            status,
            shortfalls: sufficiency.shortfalls().to_vec(),
        })
    }

    /// "Recheck Stock": re-run the sufficiency test on a `Waiting` operation.
    /// A no-op on any other status.
    pub fn recheck_stock(
        &self,
        _ctx: &RequestContext,
        id: OperationId,
    ) -> EngineResult<TransitionOutcome> {
        let _op_guard = self.op_locks.acquire(id)?;
        let operation = self.operations.get(id).ok_or(EngineError::NotFound)?;

        if operation.status() != OperationStatus::Waiting {
            return Ok(TransitionOutcome {
                status: operation.status(),
                shortfalls: Vec::new(),
            });
        }

        let sufficiency = self.evaluate(&operation)?;
        let status = self
            .operations
            .with_mut(id, |operation| operation.recheck(&sufficiency).map_err(Into::into))?;

        Ok(TransitionOutcome {
            status,
            shortfalls: sufficiency.shortfalls().to_vec(),
        })
    }

    /// "Validate": commit the operation's effect to the ledger and finalize
    /// it to `Done`, all-or-nothing.
    ///
    /// Availability is re-read under the `(product, location)` pair locks; if
    /// stock changed since `Ready` was computed the operation falls back to
    /// `Waiting` and nothing is appended. A `Waiting` operation validates to
    /// `Waiting` again rather than partially applying.
    pub fn validate(&self, ctx: &RequestContext, id: OperationId) -> EngineResult<ValidateOutcome> {
        let _op_guard = self.op_locks.acquire(id)?;
        let operation = self.operations.get(id).ok_or(EngineError::NotFound)?;

        match operation.status() {
            OperationStatus::Ready => {}
            OperationStatus::Waiting => {
                let sufficiency = self.evaluate(&operation)?;
                return Ok(ValidateOutcome {
                    status: OperationStatus::Waiting,
                    moves: Vec::new(),
                    shortfalls: sufficiency.shortfalls().to_vec(),
                });
            }
            other => {
                return Err(EngineError::InvalidTransition(format!(
                    "validate requires a ready operation, found {}",
                    other.as_str()
                )));
            }
        }

        let location = self.resolve_endpoint(operation.endpoint())?;
        let keys: Vec<StockKey> = operation
            .required_quantities()
            .keys()
            .map(|&product| StockKey::new(product, location))
            .collect();
        let _stock_guards = self.stock_locks.acquire_all(&keys)?;

        let sufficiency =
            operation.evaluate_sufficiency(|product| self.view.current_quantity(product, location));
        if !sufficiency.is_sufficient() {
            let status = self
                .operations
                .with_mut(id, |operation| operation.demote_to_waiting().map_err(Into::into))?;
            tracing::warn!(
                actor = %ctx.actor(),
                reference = operation.reference(),
                "stock changed since ready, operation demoted to waiting"
            );
            return Ok(ValidateOutcome {
                status,
                moves: Vec::new(),
                shortfalls: sufficiency.shortfalls().to_vec(),
            });
        }

        let date = Utc::now();
        let movements: Vec<UncommittedMove> = operation
            .lines()
            .iter()
            .map(|line| match operation.kind() {
                OperationKind::Receipt => UncommittedMove::receipt(
                    operation.reference(),
                    line.product,
                    location,
                    line.quantity,
                    date,
                ),
                OperationKind::Delivery => UncommittedMove::delivery(
                    operation.reference(),
                    line.product,
                    location,
                    -line.quantity,
                    date,
                ),
            })
            .collect();

        // Commit point: ledger append and status flip inside one operation
        // store write section, still under the pair locks.
        let committed = self.operations.with_mut(id, |operation| {
            let committed = self.ledger.append_all(movements)?;
            operation.complete()?;
            Ok(committed)
        })?;

        tracing::info!(
            actor = %ctx.actor(),
            reference = operation.reference(),
            moves = committed.len(),
            "operation validated"
        );
        Ok(ValidateOutcome {
            status: OperationStatus::Done,
            moves: committed.into_iter().map(|entry| entry.id).collect(),
            shortfalls: Vec::new(),
        })
    }

    /// Cancel a not-yet-done operation. No ledger effect.
    pub fn cancel_operation(
        &self,
        ctx: &RequestContext,
        id: OperationId,
    ) -> EngineResult<OperationStatus> {
        let _op_guard = self.op_locks.acquire(id)?;
        let status = self.operations.with_mut(id, |operation| {
            let status = operation.cancel()?;
            tracing::info!(
                actor = %ctx.actor(),
                reference = operation.reference(),
                "operation cancelled"
            );
            Ok(status)
        })?;
        Ok(status)
    }

    pub fn get_operation(&self, id: OperationId) -> EngineResult<Operation> {
        self.operations.get(id).ok_or(EngineError::NotFound)
    }

    pub fn list_operations(&self) -> Vec<Operation> {
        self.operations.list()
    }

    /// The stock ledger history feed.
    pub fn list_moves(&self, filter: &MoveFilter) -> Vec<Move> {
        self.ledger.query(filter)
    }

    /// Current stock rows.
    pub fn current_stock(&self, filter: StockFilter) -> Vec<StockRow> {
        self.view.snapshot(filter)
    }

    /// Total availability of a product across a warehouse's locations.
    pub fn available(&self, product: ProductId, warehouse: WarehouseId) -> i64 {
        let locations = self.topology.locations_in(warehouse);
        self.view.available(product, &locations)
    }

    /// Current stock priced at catalog unit cost.
    pub fn valued_stock(&self) -> Vec<ValuedStockRow> {
        self.view
            .snapshot(StockFilter::default())
            .into_iter()
            .map(|row| {
                let unit_cost = self.catalog.unit_cost(row.product);
                ValuedStockRow {
                    product: row.product,
                    location: row.location,
                    quantity: row.quantity,
                    unit_cost,
                    value: unit_cost.map(|cost| row.quantity * cost as i64),
                }
            })
            .collect()
    }

    /// Compare the materialized view against full ledger replay, healing and
    /// reporting any drifted entries.
    pub fn audit_stock(&self) -> Vec<ConsistencyViolation> {
        self.view.audit(&self.ledger.replay_log())
    }

    /// Resolve an operation endpoint to the concrete stock location it moves
    /// stock at: a warehouse endpoint means that warehouse's default stock
    /// location.
    fn resolve_endpoint(&self, endpoint: StockEndpoint) -> EngineResult<LocationId> {
        match endpoint {
            StockEndpoint::Location(location) => {
                if self.topology.contains(location) {
                    Ok(location)
                } else {
                    Err(EngineError::Validation(format!(
                        "unknown location {location}"
                    )))
                }
            }
            StockEndpoint::Warehouse(warehouse) => {
                self.topology.default_location(warehouse).ok_or_else(|| {
                    EngineError::Validation(format!(
                        "warehouse {warehouse} has no stock location"
                    ))
                })
            }
        }
    }

    fn ensure_known_products(
        &self,
        products: impl IntoIterator<Item = ProductId>,
    ) -> EngineResult<()> {
        for product in products {
            if !self.catalog.contains(product) {
                return Err(EngineError::Validation(format!("unknown product {product}")));
            }
        }
        Ok(())
    }

    fn evaluate(&self, operation: &Operation) -> EngineResult<Sufficiency> {
        let location = self.resolve_endpoint(operation.endpoint())?;
        Ok(operation
            .evaluate_sufficiency(|product| self.view.current_quantity(product, location)))
    }
}
