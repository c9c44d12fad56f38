use std::sync::Arc;
use std::sync::RwLock;

use thiserror::Error;

use stockflow_core::{DomainError, MoveId};

use crate::entry::{Move, MoveFilter, UncommittedMove};
use crate::view::StockView;

/// Ledger operation error.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The movement failed shape validation (zero quantity, missing or
    /// forbidden endpoints for its kind). Nothing was written.
    #[error("invalid move: {0}")]
    InvalidMove(String),

    /// Internal lock poisoned; the ledger cannot be trusted further.
    #[error("ledger lock poisoned")]
    Poisoned,
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        LedgerError::InvalidMove(value.to_string())
    }
}

/// Append-only log of stock movements; the source of truth for current stock.
///
/// Appends assign monotonically increasing sequence numbers under the write
/// lock, so replay order (date, then insertion order) is deterministic. Every
/// successful append applies the move's deltas to the attached [`StockView`]
/// before returning: a caller observing a successful append is guaranteed the
/// view reflects it.
#[derive(Debug)]
pub struct StockLedger {
    entries: RwLock<Vec<Move>>,
    view: Arc<StockView>,
}

impl StockLedger {
    pub fn new(view: Arc<StockView>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            view,
        }
    }

    pub fn view(&self) -> &Arc<StockView> {
        &self.view
    }

    /// Append one movement. Fails without writing if the shape is invalid.
    pub fn append(&self, movement: UncommittedMove) -> Result<Move, LedgerError> {
        let mut committed = self.append_all(vec![movement])?;
        Ok(committed.pop().expect("append_all returns one entry per input"))
    }

    /// Append a batch in one write section (an operation's lines commit
    /// together). All movements are validated before anything is written.
    pub fn append_all(&self, movements: Vec<UncommittedMove>) -> Result<Vec<Move>, LedgerError> {
        for movement in &movements {
            movement.validate()?;
        }

        let mut entries = self.entries.write().map_err(|_| LedgerError::Poisoned)?;

        let mut next = entries.len() as u64 + 1;
        let mut committed = Vec::with_capacity(movements.len());
        for movement in movements {
            let entry = Move {
                id: MoveId::new(),
                sequence: next,
                date: movement.date,
                kind: movement.kind,
                reference: movement.reference,
                product: movement.product,
                from_location: movement.from_location,
                to_location: movement.to_location,
                quantity: movement.quantity,
            };
            next += 1;

            for (location, delta) in entry.deltas() {
                self.view.apply_delta(entry.product, location, delta);
            }

            entries.push(entry.clone());
            committed.push(entry);
        }

        Ok(committed)
    }

    /// Entries matching the filter, ordered by (date, sequence) ascending.
    pub fn query(&self, filter: &MoveFilter) -> Vec<Move> {
        let mut matched: Vec<Move> = self
            .entries
            .read()
            .map(|entries| entries.iter().filter(|e| filter.matches(e)).cloned().collect())
            .unwrap_or_default();

        matched.sort_by_key(|e| (e.date, e.sequence));
        matched
    }

    /// Full ledger contents in replay order.
    pub fn replay_log(&self) -> Vec<Move> {
        self.query(&MoveFilter::default())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
