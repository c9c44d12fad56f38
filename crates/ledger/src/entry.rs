use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, LocationId, MoveId, ProductId};

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    /// Inbound from the external boundary (vendor) into a location.
    Receipt,
    /// Outbound from a location to the external boundary (customer).
    Delivery,
    /// Between two locations; one entry carries both endpoints.
    Internal,
    /// Correction at a single location; quantity may carry either sign.
    Adjustment,
}

impl MoveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MoveKind::Receipt => "receipt",
            MoveKind::Delivery => "delivery",
            MoveKind::Internal => "internal",
            MoveKind::Adjustment => "adjustment",
        }
    }
}

/// A movement ready to be appended to the ledger (no id or sequence yet).
///
/// The ledger assigns `id` and `sequence` during append, mirroring the split
/// between decided and committed facts: callers describe the movement, the
/// ledger makes it durable and ordered.
///
/// Sign convention:
/// - positive quantity increases stock at `to_location`
/// - negative quantity decreases stock at `from_location`
/// - an internal move carries both endpoints and a positive quantity,
///   interpreted both ways (minus at source, plus at destination)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedMove {
    pub kind: MoveKind,
    pub reference: String,
    pub product: ProductId,
    pub from_location: Option<LocationId>,
    pub to_location: Option<LocationId>,
    pub quantity: i64,
    pub date: DateTime<Utc>,
}

impl UncommittedMove {
    pub fn receipt(
        reference: impl Into<String>,
        product: ProductId,
        to_location: LocationId,
        quantity: i64,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: MoveKind::Receipt,
            reference: reference.into(),
            product,
            from_location: None,
            to_location: Some(to_location),
            quantity,
            date,
        }
    }

    pub fn delivery(
        reference: impl Into<String>,
        product: ProductId,
        from_location: LocationId,
        quantity: i64,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: MoveKind::Delivery,
            reference: reference.into(),
            product,
            from_location: Some(from_location),
            to_location: None,
            quantity,
            date,
        }
    }

    pub fn internal(
        reference: impl Into<String>,
        product: ProductId,
        from_location: LocationId,
        to_location: LocationId,
        quantity: i64,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: MoveKind::Internal,
            reference: reference.into(),
            product,
            from_location: Some(from_location),
            to_location: Some(to_location),
            quantity,
            date,
        }
    }

    pub fn adjustment(
        reference: impl Into<String>,
        product: ProductId,
        location: LocationId,
        quantity: i64,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: MoveKind::Adjustment,
            reference: reference.into(),
            product,
            from_location: None,
            to_location: Some(location),
            quantity,
            date,
        }
    }

    /// Shape-check the movement against its kind's endpoint and sign rules.
    pub fn validate(&self) -> DomainResult<()> {
        if self.reference.trim().is_empty() {
            return Err(DomainError::validation("move reference cannot be empty"));
        }
        if self.quantity == 0 {
            return Err(DomainError::validation("move quantity cannot be zero"));
        }

        match self.kind {
            MoveKind::Receipt => {
                if self.to_location.is_none() {
                    return Err(DomainError::validation("receipt requires a destination location"));
                }
                if self.from_location.is_some() {
                    return Err(DomainError::validation("receipt cannot have a source location"));
                }
                if self.quantity < 0 {
                    return Err(DomainError::validation("receipt quantity must be positive"));
                }
            }
            MoveKind::Delivery => {
                if self.from_location.is_none() {
                    return Err(DomainError::validation("delivery requires a source location"));
                }
                if self.to_location.is_some() {
                    return Err(DomainError::validation("delivery cannot have a destination location"));
                }
                if self.quantity > 0 {
                    return Err(DomainError::validation("delivery quantity must be negative"));
                }
            }
            MoveKind::Internal => {
                let (Some(from), Some(to)) = (self.from_location, self.to_location) else {
                    return Err(DomainError::validation("internal move requires both endpoints"));
                };
                if from == to {
                    return Err(DomainError::validation("internal move endpoints must differ"));
                }
                if self.quantity < 0 {
                    return Err(DomainError::validation("internal move quantity must be positive"));
                }
            }
            MoveKind::Adjustment => {
                if self.to_location.is_none() {
                    return Err(DomainError::validation("adjustment requires a location"));
                }
                if self.from_location.is_some() {
                    return Err(DomainError::validation("adjustment cannot have a source location"));
                }
            }
        }

        Ok(())
    }
}

/// An immutable, committed ledger entry.
///
/// Moves are never mutated or deleted; corrections are new moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub id: MoveId,
    /// Position in the ledger; assigned on append, makes replay deterministic
    /// together with `date`.
    pub sequence: u64,
    pub date: DateTime<Utc>,
    pub kind: MoveKind,
    pub reference: String,
    pub product: ProductId,
    pub from_location: Option<LocationId>,
    pub to_location: Option<LocationId>,
    pub quantity: i64,
}

impl Move {
    /// The per-location quantity changes this entry contributes.
    ///
    /// This is the single derivation rule shared by the incremental view
    /// update and full replay, so the two paths cannot disagree on encoding.
    pub fn deltas(&self) -> Vec<(LocationId, i64)> {
        match (self.from_location, self.to_location) {
            (Some(from), Some(to)) => vec![(from, -self.quantity), (to, self.quantity)],
            (None, Some(to)) => vec![(to, self.quantity)],
            (Some(from), None) => vec![(from, self.quantity)],
            (None, None) => vec![],
        }
    }

    pub fn touches(&self, location: LocationId) -> bool {
        self.from_location == Some(location) || self.to_location == Some(location)
    }
}

/// Filter for ledger history queries. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveFilter {
    pub product: Option<ProductId>,
    pub location: Option<LocationId>,
    pub kind: Option<MoveKind>,
    pub reference: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl MoveFilter {
    pub fn matches(&self, entry: &Move) -> bool {
        if let Some(product) = self.product {
            if entry.product != product {
                return false;
            }
        }
        if let Some(location) = self.location {
            if !entry.touches(location) {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if entry.kind != kind {
                return false;
            }
        }
        if let Some(reference) = &self.reference {
            if &entry.reference != reference {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.date < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.date > until {
                return false;
            }
        }
        true
    }
}
