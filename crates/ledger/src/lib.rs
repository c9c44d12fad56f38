//! `stockflow-ledger` — append-only stock ledger and the materialized view
//! derived from it.
//!
//! The ledger is the source of truth for stock: every physical movement is an
//! immutable, signed [`Move`] entry. Current quantities are a cache maintained
//! by [`StockView`], updated synchronously on append and rebuildable from full
//! replay at any time. Corrections are new moves; history is never rewritten.

pub mod entry;
pub mod ledger;
pub mod view;

pub use entry::{Move, MoveFilter, MoveKind, UncommittedMove};
pub use ledger::{LedgerError, StockLedger};
pub use view::{ConsistencyViolation, StockFilter, StockKey, StockRow, StockView};
