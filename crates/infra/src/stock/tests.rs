use std::sync::Arc;

use chrono::Utc;
use proptest::prelude::*;

use stockyard_core::{CategoryId, SupplierId};
use stockyard_inventory::NewWarehouse;
use stockyard_products::ProductDetails;

use super::*;

struct Fixture {
    stock: StockAccounting,
}

impl Fixture {
    fn new() -> Self {
        Self {
            stock: StockAccounting::new(EntityStore::in_memory()),
        }
    }

    fn store(&self) -> &EntityStore {
        self.stock.store()
    }

    async fn warehouse(&self, capacity: i64) -> WarehouseId {
        let w = Warehouse::create(
            WarehouseId::new(),
            NewWarehouse {
                name: "Main".to_string(),
                location: "Dock 1".to_string(),
                capacity,
            },
            Utc::now(),
        )
        .unwrap();
        self.store().insert(&w).await.unwrap();
        w.id
    }

    async fn product(&self) -> ProductId {
        let p = Product::create(
            ProductId::new(),
            ProductDetails {
                name: "Widget".to_string(),
                description: None,
                price: 2.5,
                category_id: CategoryId::new(),
                supplier_id: SupplierId::new(),
                sku: None,
            },
            Utc::now(),
        )
        .unwrap();
        self.store().insert(&p).await.unwrap();
        p.id
    }

    async fn add(&self, product_id: ProductId, warehouse_id: WarehouseId, quantity: i64) -> ServiceResult<StockReceipt> {
        self.stock
            .add_stock(AddStock {
                product_id,
                warehouse_id,
                quantity,
                unit_price: None,
                expiry_date: None,
            })
            .await
    }

    async fn usage(&self, warehouse_id: WarehouseId) -> i64 {
        self.stock.live_usage(&warehouse_id).await.unwrap()
    }

    async fn stored_usage(&self, warehouse_id: WarehouseId) -> i64 {
        self.store().get::<Warehouse>(&warehouse_id).await.unwrap().current_usage
    }

    async fn record_at(&self, product_id: ProductId, warehouse_id: WarehouseId) -> Option<InventoryRecord> {
        self.stock.pair_record(&product_id, &warehouse_id).await.unwrap()
    }
}

#[tokio::test]
async fn add_stock_rejects_overflow_then_accepts_within_capacity() {
    let f = Fixture::new();
    let w = f.warehouse(100).await;
    let filler = f.product().await;
    let p = f.product().await;
    f.add(filler, w, 90).await.unwrap();

    let err = f.add(p, w, 20).await.unwrap_err();
    match err.domain() {
        Some(DomainError::CapacityExceeded {
            current_usage,
            capacity,
            requested,
            ..
        }) => {
            assert_eq!(*current_usage, 90);
            assert_eq!(*capacity, 100);
            assert_eq!(*requested, 20);
        }
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
    assert!(f.record_at(p, w).await.is_none());
    assert_eq!(f.stored_usage(w).await, 90);

    let receipt = f.add(p, w, 5).await.unwrap();
    assert_eq!(receipt.current_usage, 95);
    assert_eq!(receipt.capacity, 100);
    assert_eq!(f.usage(w).await, 95);
    assert_eq!(f.stored_usage(w).await, 95);
}

#[tokio::test]
async fn add_stock_merges_into_existing_pair() {
    let f = Fixture::new();
    let w = f.warehouse(50).await;
    let p = f.product().await;

    let first = f.add(p, w, 4).await.unwrap().record;
    let second = f.add(p, w, 6).await.unwrap().record;

    assert_eq!(first.id, second.id);
    assert_eq!(second.stock, 10);
    let actions: Vec<_> = second.audit_log.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Create, AuditAction::Restock]);
    let all = f.store().find_many::<InventoryRecord>(&Filter::All).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn add_stock_copies_product_references() {
    let f = Fixture::new();
    let w = f.warehouse(10).await;
    let p = f.product().await;
    let product = f.store().get::<Product>(&p).await.unwrap();

    let record = f.add(p, w, 1).await.unwrap().record;
    assert_eq!(record.category_id, product.category_id);
    assert_eq!(record.supplier_id, product.supplier_id);
}

#[tokio::test]
async fn add_stock_requires_existing_product_and_warehouse() {
    let f = Fixture::new();
    let w = f.warehouse(10).await;
    let p = f.product().await;

    let err = f.add(ProductId::new(), w, 1).await.unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::NotFound(what)) if what == "product"));

    let err = f.add(p, WarehouseId::new(), 1).await.unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::NotFound(what)) if what == "warehouse"));
}

#[tokio::test]
async fn add_stock_rejects_non_positive_quantity() {
    let f = Fixture::new();
    let w = f.warehouse(10).await;
    let p = f.product().await;
    for q in [0, -3] {
        let err = f.add(p, w, q).await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::Validation(_))));
    }
    assert_eq!(f.usage(w).await, 0);
}

#[tokio::test]
async fn transfer_moves_stock_and_usage() {
    let f = Fixture::new();
    let a = f.warehouse(100).await;
    let b = f.warehouse(100).await;
    let p = f.product().await;
    f.add(p, a, 10).await.unwrap();

    let t = f.stock.transfer(p, a, b, 4).await.unwrap();
    assert_eq!(t.from.stock, 6);
    assert_eq!(t.to.stock, 4);
    assert_eq!(t.to.audit_log[0].action, AuditAction::TransferIn);
    assert!(t.from.has_action(AuditAction::TransferOut));

    assert_eq!(f.usage(a).await, 6);
    assert_eq!(f.usage(b).await, 4);
    assert_eq!(f.stored_usage(a).await, 6);
    assert_eq!(f.stored_usage(b).await, 4);

    // A second transfer merges into the destination record.
    let t = f.stock.transfer(p, a, b, 6).await.unwrap();
    assert_eq!(t.from.stock, 0);
    assert_eq!(t.to.stock, 10);
    assert_eq!(f.stored_usage(a).await, 0);
}

#[tokio::test]
async fn transfer_with_short_source_changes_nothing() {
    let f = Fixture::new();
    let a = f.warehouse(100).await;
    let b = f.warehouse(100).await;
    let p = f.product().await;
    f.add(p, a, 10).await.unwrap();

    let err = f.stock.transfer(p, a, b, 15).await.unwrap_err();
    assert!(matches!(
        err.domain(),
        Some(DomainError::InsufficientStock { available: 10, requested: 15 })
    ));
    assert_eq!(f.record_at(p, a).await.unwrap().stock, 10);
    assert!(f.record_at(p, b).await.is_none());
}

#[tokio::test]
async fn transfer_without_source_record_is_insufficient_stock() {
    let f = Fixture::new();
    let a = f.warehouse(100).await;
    let b = f.warehouse(100).await;
    let p = f.product().await;

    let err = f.stock.transfer(p, a, b, 1).await.unwrap_err();
    assert!(matches!(
        err.domain(),
        Some(DomainError::InsufficientStock { available: 0, requested: 1 })
    ));
}

#[tokio::test]
async fn transfer_rejects_invalid_amount_and_same_warehouse() {
    let f = Fixture::new();
    let a = f.warehouse(100).await;
    let b = f.warehouse(100).await;
    let p = f.product().await;
    f.add(p, a, 10).await.unwrap();

    for q in [0, -1] {
        let err = f.stock.transfer(p, a, b, q).await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::Validation(_))));
    }
    let err = f.stock.transfer(p, a, a, 1).await.unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::Validation(_))));

    assert_eq!(f.record_at(p, a).await.unwrap().stock, 10);
    assert_eq!(f.usage(b).await, 0);
}

#[tokio::test]
async fn transfer_respects_destination_capacity() {
    let f = Fixture::new();
    let a = f.warehouse(100).await;
    let b = f.warehouse(5).await;
    let p = f.product().await;
    f.add(p, a, 10).await.unwrap();

    let err = f.stock.transfer(p, a, b, 6).await.unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::CapacityExceeded { .. })));
    assert_eq!(f.record_at(p, a).await.unwrap().stock, 10);
    assert_eq!(f.usage(b).await, 0);
}

#[tokio::test]
async fn transfer_to_missing_warehouse_is_not_found() {
    let f = Fixture::new();
    let a = f.warehouse(100).await;
    let p = f.product().await;
    f.add(p, a, 10).await.unwrap();

    let err = f.stock.transfer(p, a, WarehouseId::new(), 1).await.unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::NotFound(_))));
    assert_eq!(f.record_at(p, a).await.unwrap().stock, 10);
}

#[tokio::test]
async fn diminish_records_reason_and_releases_usage() {
    let f = Fixture::new();
    let w = f.warehouse(100).await;
    let p = f.product().await;
    let id = f.add(p, w, 5).await.unwrap().record.id;

    let record = f.stock.diminish(id, 3, Some("damaged".to_string())).await.unwrap();
    assert_eq!(record.stock, 2);
    let last = record.audit_log.last().unwrap();
    assert_eq!(last.action, AuditAction::Diminished);
    assert_eq!(last.amount, 3);
    assert_eq!(last.reason.as_deref(), Some("damaged"));
    assert_eq!(record.audit_log.len(), 2);
    assert_eq!(f.stored_usage(w).await, 2);
}

#[tokio::test]
async fn diminish_defaults_reason() {
    let f = Fixture::new();
    let w = f.warehouse(100).await;
    let p = f.product().await;
    let id = f.add(p, w, 5).await.unwrap().record.id;

    let record = f.stock.diminish(id, 1, None).await.unwrap();
    assert_eq!(
        record.audit_log.last().unwrap().reason.as_deref(),
        Some(DEFAULT_DIMINISH_REASON)
    );
    let record = f.stock.diminish(id, 1, Some("  ".to_string())).await.unwrap();
    assert_eq!(
        record.audit_log.last().unwrap().reason.as_deref(),
        Some(DEFAULT_DIMINISH_REASON)
    );
}

#[tokio::test]
async fn diminish_more_than_stock_changes_nothing() {
    let f = Fixture::new();
    let w = f.warehouse(100).await;
    let p = f.product().await;
    let id = f.add(p, w, 5).await.unwrap().record.id;

    let err = f.stock.diminish(id, 6, None).await.unwrap_err();
    assert!(matches!(
        err.domain(),
        Some(DomainError::InsufficientStock { available: 5, requested: 6 })
    ));
    let stored = f.store().get::<InventoryRecord>(&id).await.unwrap();
    assert_eq!(stored.stock, 5);
    assert_eq!(stored.audit_log.len(), 1);
}

#[tokio::test]
async fn diminish_missing_record_is_not_found() {
    let f = Fixture::new();
    let err = f.stock.diminish(InventoryId::new(), 1, None).await.unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::NotFound(_))));
}

#[tokio::test]
async fn set_stock_checks_capacity_on_increase() {
    let f = Fixture::new();
    let w = f.warehouse(20).await;
    let p = f.product().await;
    let id = f.add(p, w, 10).await.unwrap().record.id;

    let err = f
        .stock
        .set_stock(id, InventoryUpdate { stock: Some(25), ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::CapacityExceeded { .. })));

    let record = f
        .stock
        .set_stock(id, InventoryUpdate { stock: Some(3), unit_price: Some(1.25), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(record.stock, 3);
    assert_eq!(record.unit_price, Some(1.25));
    let last = record.audit_log.last().unwrap();
    assert_eq!(last.action, AuditAction::Adjusted);
    assert_eq!(last.amount, -7);
    assert_eq!(f.stored_usage(w).await, 3);
}

#[tokio::test]
async fn remove_record_releases_usage() {
    let f = Fixture::new();
    let w = f.warehouse(20).await;
    let p = f.product().await;
    let id = f.add(p, w, 10).await.unwrap().record.id;

    f.stock.remove_record(id).await.unwrap();
    assert_eq!(f.stored_usage(w).await, 0);
    let err = f.stock.remove_record(id).await.unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::NotFound(_))));
}

#[tokio::test]
async fn delete_warehouse_is_blocked_by_inventory_unless_forced() {
    let f = Fixture::new();
    let w = f.warehouse(20).await;
    let p = f.product().await;
    f.add(p, w, 10).await.unwrap();

    let err = f.stock.delete_warehouse(w, false).await.unwrap_err();
    match err.domain() {
        Some(DomainError::Conflict(msg)) => assert!(msg.contains('1')),
        other => panic!("expected Conflict, got {other:?}"),
    }
    assert!(f.store().find_by_id::<Warehouse>(&w).await.unwrap().is_some());

    assert_eq!(f.stock.delete_warehouse(w, true).await.unwrap(), 1);
    assert!(f.store().find_by_id::<Warehouse>(&w).await.unwrap().is_none());
    assert!(f.record_at(p, w).await.is_none());
}

#[tokio::test]
async fn update_warehouse_cannot_shrink_below_usage() {
    let f = Fixture::new();
    let w = f.warehouse(20).await;
    let p = f.product().await;
    f.add(p, w, 10).await.unwrap();

    let err = f
        .stock
        .update_warehouse(w, WarehouseUpdate { capacity: Some(9), ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::Conflict(_))));

    let updated = f
        .stock
        .update_warehouse(w, WarehouseUpdate { capacity: Some(10), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(updated.capacity, 10);
    assert_eq!(updated.current_usage, 10);
}

#[tokio::test]
async fn remove_product_stock_spans_warehouses() {
    let f = Fixture::new();
    let a = f.warehouse(20).await;
    let b = f.warehouse(20).await;
    let p = f.product().await;
    let other = f.product().await;
    f.add(p, a, 3).await.unwrap();
    f.add(p, b, 4).await.unwrap();
    f.add(other, a, 5).await.unwrap();

    assert_eq!(f.stock.remove_product_stock(p).await.unwrap(), 2);
    assert_eq!(f.stored_usage(a).await, 5);
    assert_eq!(f.stored_usage(b).await, 0);
}

#[tokio::test]
async fn product_reference_rewrites_follow_the_product() {
    let f = Fixture::new();
    let w = f.warehouse(20).await;
    let p = f.product().await;
    f.add(p, w, 3).await.unwrap();

    let mut product = f.store().get::<Product>(&p).await.unwrap();
    let new_category = CategoryId::new();
    product.category_id = Some(new_category);
    assert_eq!(f.stock.refresh_product_references(&product).await.unwrap(), 1);
    assert_eq!(f.record_at(p, w).await.unwrap().category_id, Some(new_category));

    assert_eq!(f.stock.detach_category(new_category).await.unwrap(), 1);
    let record = f.record_at(p, w).await.unwrap();
    assert_eq!(record.category_id, None);
    assert_eq!(record.stock, 3);

    let supplier = product.supplier_id.unwrap();
    assert_eq!(f.stock.detach_supplier(supplier).await.unwrap(), 1);
    assert_eq!(f.record_at(p, w).await.unwrap().supplier_id, None);
}

#[tokio::test]
async fn warehouse_usage_reports_live_figures() {
    let f = Fixture::new();
    let w = f.warehouse(200).await;
    let p = f.product().await;
    f.add(p, w, 50).await.unwrap();

    let u = f.stock.warehouse_usage(w).await.unwrap();
    assert_eq!(u.capacity, 200);
    assert_eq!(u.current_usage, 50);
    assert_eq!(u.available, 150);
    assert_eq!(u.utilization_percent, 25.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_additions_never_overshoot_capacity() {
    let f = Arc::new(Fixture::new());
    let w = f.warehouse(100).await;
    let mut products = Vec::new();
    for _ in 0..8 {
        products.push(f.product().await);
    }

    let mut handles = Vec::new();
    for i in 0..64 {
        let f = f.clone();
        let p = products[i % products.len()];
        handles.push(tokio::spawn(async move { f.add(p, w, 7).await.is_ok() }));
    }
    let mut accepted = 0;
    for h in handles {
        if h.await.unwrap() {
            accepted += 1;
        }
    }

    // 14 * 7 = 98 fits, a 15th would not.
    assert_eq!(accepted, 14);
    assert_eq!(f.usage(w).await, 98);
    assert_eq!(f.stored_usage(w).await, 98);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_opposite_transfers_conserve_stock() {
    let f = Arc::new(Fixture::new());
    let a = f.warehouse(1_000).await;
    let b = f.warehouse(1_000).await;
    let p = f.product().await;
    f.add(p, a, 100).await.unwrap();
    f.add(p, b, 100).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..40 {
        let f = f.clone();
        let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
        handles.push(tokio::spawn(async move {
            let _ = f.stock.transfer(p, from, to, 3).await;
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(f.usage(a).await + f.usage(b).await, 200);
    assert_eq!(f.stored_usage(a).await, f.usage(a).await);
    assert_eq!(f.stored_usage(b).await, f.usage(b).await);
}

#[derive(Debug, Clone)]
enum Op {
    Add { product: usize, warehouse: usize, quantity: i64 },
    Transfer { product: usize, from: usize, to: usize, quantity: i64 },
    Diminish { product: usize, warehouse: usize, quantity: i64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..2usize, -2..40i64).prop_map(|(product, warehouse, quantity)| Op::Add {
            product,
            warehouse,
            quantity
        }),
        (0..3usize, 0..2usize, 0..2usize, -2..40i64).prop_map(|(product, from, to, quantity)| {
            Op::Transfer { product, from, to, quantity }
        }),
        (0..3usize, 0..2usize, -2..40i64).prop_map(|(product, warehouse, quantity)| Op::Diminish {
            product,
            warehouse,
            quantity
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn usage_never_exceeds_capacity_and_failures_do_not_mutate(ops in prop::collection::vec(op_strategy(), 1..30)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let f = Fixture::new();
            let warehouses = [f.warehouse(60).await, f.warehouse(45).await];
            let mut products = Vec::new();
            for _ in 0..3 {
                products.push(f.product().await);
            }

            for op in ops {
                let before = f.store().find_many::<InventoryRecord>(&Filter::All).await.unwrap();
                let result = match op {
                    Op::Add { product, warehouse, quantity } => f
                        .add(products[product], warehouses[warehouse], quantity)
                        .await
                        .map(|_| ()),
                    Op::Transfer { product, from, to, quantity } => f
                        .stock
                        .transfer(products[product], warehouses[from], warehouses[to], quantity)
                        .await
                        .map(|_| ()),
                    Op::Diminish { product, warehouse, quantity } => {
                        match f.record_at(products[product], warehouses[warehouse]).await {
                            Some(r) => f.stock.diminish(r.id, quantity, None).await.map(|_| ()),
                            None => Ok(()),
                        }
                    }
                };

                if result.is_err() {
                    let after = f.store().find_many::<InventoryRecord>(&Filter::All).await.unwrap();
                    assert_eq!(before, after);
                }
                for w in warehouses {
                    let capacity = f.store().get::<Warehouse>(&w).await.unwrap().capacity;
                    let usage = f.usage(w).await;
                    assert!(usage <= capacity, "usage {usage} > capacity {capacity}");
                    assert_eq!(f.stored_usage(w).await, usage);
                }
                let records = f.store().find_many::<InventoryRecord>(&Filter::All).await.unwrap();
                assert!(records.iter().all(|r| r.stock >= 0));
            }
        });
    }
}
