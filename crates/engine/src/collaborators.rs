//! External collaborators the engine reads but does not own.
//!
//! The product catalog, warehouse/location topology, and reference numbering
//! are records management owned elsewhere; the engine consumes them behind
//! traits. In-memory implementations are provided for tests and development,
//! the same seam a persistent backend would plug into.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use stockflow_core::{LocationId, ProductId, WarehouseId};
use stockflow_ledger::MoveKind;

/// Read-only product catalog: existence and unit cost for valuation display.
pub trait ProductCatalog: Send + Sync {
    fn contains(&self, product: ProductId) -> bool;

    /// Per-unit cost in the smallest currency unit (e.g. cents).
    fn unit_cost(&self, product: ProductId) -> Option<u64>;
}

/// Read-only warehouse/location topology. Every location belongs to exactly
/// one warehouse; each warehouse has a default stock location that warehouse
/// endpoints resolve to.
pub trait WarehouseTopology: Send + Sync {
    fn contains(&self, location: LocationId) -> bool;

    fn warehouse_of(&self, location: LocationId) -> Option<WarehouseId>;

    fn locations_in(&self, warehouse: WarehouseId) -> Vec<LocationId>;

    fn default_location(&self, warehouse: WarehouseId) -> Option<LocationId>;
}

/// Generator of document/move reference numbers.
pub trait ReferenceSource: Send + Sync {
    fn next_reference(&self, kind: MoveKind) -> String;
}

/// In-memory product catalog.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, Option<u64>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, product: ProductId, unit_cost: Option<u64>) {
        self.products.write().insert(product, unit_cost);
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn contains(&self, product: ProductId) -> bool {
        self.products.read().contains_key(&product)
    }

    fn unit_cost(&self, product: ProductId) -> Option<u64> {
        self.products.read().get(&product).copied().flatten()
    }
}

#[derive(Debug, Default)]
struct TopologyInner {
    by_location: HashMap<LocationId, WarehouseId>,
    by_warehouse: HashMap<WarehouseId, Vec<LocationId>>,
    defaults: HashMap<WarehouseId, LocationId>,
}

/// In-memory warehouse topology.
#[derive(Debug, Default)]
pub struct InMemoryTopology {
    inner: RwLock<TopologyInner>,
}

impl InMemoryTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a location under a warehouse. The first registered location
    /// becomes the warehouse's default stock location.
    pub fn register(&self, warehouse: WarehouseId, location: LocationId) {
        let mut inner = self.inner.write();
        inner.by_location.insert(location, warehouse);
        inner.by_warehouse.entry(warehouse).or_default().push(location);
        inner.defaults.entry(warehouse).or_insert(location);
    }
}

impl WarehouseTopology for InMemoryTopology {
    fn contains(&self, location: LocationId) -> bool {
        self.inner.read().by_location.contains_key(&location)
    }

    fn warehouse_of(&self, location: LocationId) -> Option<WarehouseId> {
        self.inner.read().by_location.get(&location).copied()
    }

    fn locations_in(&self, warehouse: WarehouseId) -> Vec<LocationId> {
        self.inner
            .read()
            .by_warehouse
            .get(&warehouse)
            .cloned()
            .unwrap_or_default()
    }

    fn default_location(&self, warehouse: WarehouseId) -> Option<LocationId> {
        self.inner.read().defaults.get(&warehouse).copied()
    }
}

/// Sequential per-kind reference numbers: `IN/00001`, `OUT/00001`,
/// `INT/00001`, `ADJ/00001`.
#[derive(Debug, Default)]
pub struct CountingReferences {
    receipts: AtomicU64,
    deliveries: AtomicU64,
    transfers: AtomicU64,
    adjustments: AtomicU64,
}

impl CountingReferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferenceSource for CountingReferences {
    fn next_reference(&self, kind: MoveKind) -> String {
        let (prefix, counter) = match kind {
            MoveKind::Receipt => ("IN", &self.receipts),
            MoveKind::Delivery => ("OUT", &self.deliveries),
            MoveKind::Internal => ("INT", &self.transfers),
            MoveKind::Adjustment => ("ADJ", &self.adjustments),
        };
        let number = counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}/{number:05}")
    }
}
