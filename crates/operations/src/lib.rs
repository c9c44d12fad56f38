//! Operation lifecycle domain (receipts and deliveries).
//!
//! This crate contains the business rules for stock-affecting operation
//! documents, implemented purely as deterministic domain logic (no IO, no
//! locking, no storage). Availability snapshots are handed in by the caller;
//! the authoritative check-then-commit section lives in the engine crate.

pub mod operation;

pub use operation::{
    DraftEdit, Operation, OperationDraft, OperationKind, OperationLine, OperationStatus,
    Shortfall, StockEndpoint, Sufficiency,
};
