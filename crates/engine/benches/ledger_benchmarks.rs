use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use stockflow_core::{ActorId, LocationId, ProductId, WarehouseId};
use stockflow_engine::{
    CountingReferences, EngineConfig, InMemoryCatalog, InMemoryTopology, ReconciliationEngine,
    RequestContext, ValidationCoordinator, build,
};
use stockflow_ledger::{StockLedger, StockView, UncommittedMove};
use stockflow_operations::{OperationDraft, OperationKind, OperationLine, StockEndpoint};

fn seeded_ledger(entries: u64) -> StockLedger {
    let view = Arc::new(StockView::new());
    let ledger = StockLedger::new(view);
    let product = ProductId::new();
    let location = LocationId::new();
    let date = Utc::now();

    for i in 0..entries {
        ledger
            .append(UncommittedMove::receipt(
                format!("IN/{i:05}"),
                product,
                location,
                1,
                date,
            ))
            .unwrap();
    }
    ledger
}

fn engine() -> (ValidationCoordinator, ReconciliationEngine, WarehouseId, ProductId) {
    let catalog = Arc::new(InMemoryCatalog::new());
    let topology = Arc::new(InMemoryTopology::new());
    let references = Arc::new(CountingReferences::new());

    let warehouse = WarehouseId::new();
    topology.register(warehouse, LocationId::new());
    let product = ProductId::new();
    catalog.add_product(product, Some(100));

    let (coordinator, reconciliation) =
        build(catalog, topology, references, EngineConfig::default());
    (coordinator, reconciliation, warehouse, product)
}

fn bench_ledger_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_append");
    group.throughput(Throughput::Elements(1));

    group.bench_function("receipt_append", |b| {
        let view = Arc::new(StockView::new());
        let ledger = StockLedger::new(view);
        let product = ProductId::new();
        let location = LocationId::new();

        b.iter(|| {
            ledger
                .append(UncommittedMove::receipt(
                    black_box("IN/00001"),
                    product,
                    location,
                    1,
                    Utc::now(),
                ))
                .unwrap()
        });
    });

    group.finish();
}

fn bench_view_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_rebuild");

    for entries in [100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(entries));
        group.bench_with_input(
            BenchmarkId::from_parameter(entries),
            &entries,
            |b, &entries| {
                let ledger = seeded_ledger(entries);
                let log = ledger.replay_log();
                b.iter(|| {
                    let fresh = StockView::new();
                    fresh.rebuild(black_box(&log));
                    fresh
                });
            },
        );
    }

    group.finish();
}

fn bench_receipt_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("receipt_lifecycle");
    group.sample_size(200);

    group.bench_function("create_release_validate", |b| {
        let (coordinator, _reconciliation, warehouse, product) = engine();
        let ctx = RequestContext::new(ActorId::new());

        b.iter(|| {
            let receipt = coordinator
                .create_operation(
                    &ctx,
                    OperationDraft {
                        kind: OperationKind::Receipt,
                        contact: "Northline Logistics".to_string(),
                        scheduled_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
                        endpoint: StockEndpoint::Warehouse(warehouse),
                        responsible: "dana".to_string(),
                        source_doc: None,
                        delivery_address: None,
                        lines: vec![OperationLine {
                            product,
                            quantity: 1,
                        }],
                    },
                )
                .unwrap();
            coordinator.transition_to_do(&ctx, receipt.id()).unwrap();
            coordinator.validate(&ctx, receipt.id()).unwrap()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_ledger_append,
    bench_view_rebuild,
    bench_receipt_lifecycle
);
criterion_main!(benches);
