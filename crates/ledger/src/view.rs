use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockflow_core::{LocationId, ProductId};

use crate::entry::Move;

/// Key of one materialized stock figure: a product at a location.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product: ProductId,
    pub location: LocationId,
}

impl StockKey {
    pub fn new(product: ProductId, location: LocationId) -> Self {
        Self { product, location }
    }
}

/// One row of the current-stock query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRow {
    pub product: ProductId,
    pub location: LocationId,
    pub quantity: i64,
}

/// Filter for current-stock queries. Empty filter matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockFilter {
    pub product: Option<ProductId>,
    pub location: Option<LocationId>,
}

impl StockFilter {
    fn matches(&self, key: &StockKey) -> bool {
        self.product.is_none_or(|p| key.product == p)
            && self.location.is_none_or(|l| key.location == l)
    }
}

/// A materialized entry that disagreed with full ledger replay.
///
/// Should never surface in normal operation: the view has a single writer
/// (the ledger) and every append goes through the same delta derivation as
/// replay. When it does happen the entry is rebuilt from replay and the
/// disagreement reported for operator attention.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "stock view disagrees with ledger replay for product {product} at {location}: recorded {recorded}, replayed {replayed}"
)]
pub struct ConsistencyViolation {
    pub product: ProductId,
    pub location: LocationId,
    pub recorded: i64,
    pub replayed: i64,
}

/// Materialized current quantity per (product, location).
///
/// Derived from the stock ledger and never the system of record: the only
/// writer is the ledger's append path, and the whole map can be rebuilt from
/// replay with identical totals.
#[derive(Debug, Default)]
pub struct StockView {
    quantities: RwLock<HashMap<StockKey, i64>>,
}

impl StockView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current quantity of a product at a location (0 when never moved).
    ///
    /// May be negative: the ledger layer does not prevent over-withdrawal,
    /// the availability checks at the operation layer are the actual guard.
    pub fn current_quantity(&self, product: ProductId, location: LocationId) -> i64 {
        self.quantities
            .read()
            .map(|q| q.get(&StockKey::new(product, location)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total quantity of a product over a set of locations (a warehouse).
    pub fn available(&self, product: ProductId, locations: &[LocationId]) -> i64 {
        locations
            .iter()
            .map(|&location| self.current_quantity(product, location))
            .sum()
    }

    /// Current stock rows matching the filter, ordered by (product, location).
    pub fn snapshot(&self, filter: StockFilter) -> Vec<StockRow> {
        let mut rows: Vec<StockRow> = self
            .quantities
            .read()
            .map(|q| {
                q.iter()
                    .filter(|(key, _)| filter.matches(key))
                    .map(|(key, &quantity)| StockRow {
                        product: key.product,
                        location: key.location,
                        quantity,
                    })
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by_key(|row| (row.product, row.location));
        rows
    }

    /// Apply one location delta. Ledger-only write path.
    pub(crate) fn apply_delta(&self, product: ProductId, location: LocationId, delta: i64) {
        if let Ok(mut quantities) = self.quantities.write() {
            *quantities.entry(StockKey::new(product, location)).or_insert(0) += delta;
        }
    }

    /// Discard the materialized state and replay the given moves.
    ///
    /// Produces totals identical to the incremental path for the same moves.
    pub fn rebuild(&self, moves: &[Move]) {
        let replayed = Self::replay(moves);
        if let Ok(mut quantities) = self.quantities.write() {
            *quantities = replayed;
        }
    }

    /// Compare every materialized entry against full replay, heal mismatches
    /// from the replayed totals, and report them.
    pub fn audit(&self, moves: &[Move]) -> Vec<ConsistencyViolation> {
        let replayed = Self::replay(moves);
        let mut violations = Vec::new();

        if let Ok(mut quantities) = self.quantities.write() {
            // Keys on either side: materialized entries that drifted, and
            // replay totals the view never recorded.
            let mut keys: Vec<StockKey> = quantities.keys().copied().collect();
            keys.extend(replayed.keys().copied());
            keys.sort();
            keys.dedup();

            for key in keys {
                let recorded = quantities.get(&key).copied().unwrap_or(0);
                let expected = replayed.get(&key).copied().unwrap_or(0);
                if recorded != expected {
                    tracing::error!(
                        product = %key.product,
                        location = %key.location,
                        recorded,
                        replayed = expected,
                        "stock view inconsistent with ledger, rebuilding entry from replay"
                    );
                    violations.push(ConsistencyViolation {
                        product: key.product,
                        location: key.location,
                        recorded,
                        replayed: expected,
                    });
                    quantities.insert(key, expected);
                }
            }
        }

        violations
    }

    fn replay(moves: &[Move]) -> HashMap<StockKey, i64> {
        let mut ordered: Vec<&Move> = moves.iter().collect();
        ordered.sort_by_key(|m| (m.date, m.sequence));

        let mut quantities = HashMap::new();
        for entry in ordered {
            for (location, delta) in entry.deltas() {
                *quantities
                    .entry(StockKey::new(entry.product, location))
                    .or_insert(0) += delta;
            }
        }
        quantities
    }
}
