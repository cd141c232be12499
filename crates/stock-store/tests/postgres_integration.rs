//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p stock-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use stock_store::{
    MAX_QUANTITY, NewReservation, NewStock, NewTransfer, NewWarehouse, OrderId, PostgresStore,
    ProductId,
    ReservationStatus, ShopId, SortOrder, StockQuery, StockStore, StoreError, StoreTx,
    TransferQuery, TransferStatus, Version, Warehouse, WarehouseQuery, WarehouseSort,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_inventory_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store(lock_timeout: Duration) -> PostgresStore {
    let info = get_container_info().await;

    let store = PostgresStore::connect(&info.connection_string, 5, lock_timeout)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE stock_transfers, reserved_stocks, stocks, warehouses RESTART IDENTITY",
    )
    .execute(store.pool())
    .await
    .unwrap();

    store
}

async fn warehouse(store: &PostgresStore, shop: i64, name: &str) -> Warehouse {
    store
        .insert_warehouse(NewWarehouse {
            shop_id: ShopId::new(shop),
            name: name.to_string(),
            location: "Jakarta".to_string(),
        })
        .await
        .unwrap()
}

async fn stocked(store: &PostgresStore, warehouse: &Warehouse, product: i64, quantity: i64) {
    let mut tx = store.begin().await.unwrap();
    let stock = tx
        .insert_stocks(&[NewStock {
            product_id: ProductId::new(product),
            warehouse_id: warehouse.id,
        }])
        .await
        .unwrap()
        .remove(0);
    tx.update_quantity(stock.id, quantity, stock.version)
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_availability_does_not_multiply_by_reservations() {
    let store = get_test_store(Duration::from_secs(5)).await;
    let w1 = warehouse(&store, 1, "W1").await;
    let w2 = warehouse(&store, 1, "W2").await;
    stocked(&store, &w1, 7, 100).await;
    stocked(&store, &w2, 7, 50).await;

    let stock = store
        .stock_by_product_and_warehouse(ProductId::new(7), w1.id)
        .await
        .unwrap();
    let mut tx = store.begin().await.unwrap();
    for order in 1..=3 {
        tx.insert_reservation(NewReservation {
            stock_id: stock.id,
            order_id: OrderId::new(order),
            quantity: 10,
        })
        .await
        .unwrap();
    }
    tx.commit().await.unwrap();

    let availability = store.available_by_product(ProductId::new(7)).await.unwrap();
    assert_eq!(availability.quantity, 150);
    assert_eq!(availability.reserved, 30);
    assert_eq!(availability.available, 120);

    let levels = store
        .stock_levels_by_product(ProductId::new(7))
        .await
        .unwrap();
    assert_eq!(levels.len(), 2);
    assert_eq!(levels[0].stock.warehouse_id, w1.id);
    assert_eq!(levels[0].reserved, 30);
    assert_eq!(levels[0].available(), 70);
    assert_eq!(levels[1].reserved, 0);
}

#[tokio::test]
async fn test_inactive_warehouses_are_excluded() {
    let store = get_test_store(Duration::from_secs(5)).await;
    let w1 = warehouse(&store, 1, "W1").await;
    stocked(&store, &w1, 7, 40).await;

    let mut tx = store.begin().await.unwrap();
    tx.set_warehouse_active(w1.id, false).await.unwrap();
    tx.commit().await.unwrap();

    let availability = store.available_by_product(ProductId::new(7)).await.unwrap();
    assert_eq!(availability.available, 0);
    let batch = store
        .available_by_products(&[ProductId::new(7)])
        .await
        .unwrap();
    assert!(batch.is_empty());
}

#[tokio::test]
async fn test_update_quantity_checks_version() {
    let store = get_test_store(Duration::from_secs(5)).await;
    let w1 = warehouse(&store, 1, "W1").await;
    stocked(&store, &w1, 7, 10).await;
    let stock = store
        .stock_by_product_and_warehouse(ProductId::new(7), w1.id)
        .await
        .unwrap();
    assert_eq!(stock.version, Version::new(2));

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .update_quantity(stock.id, 20, Version::first())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::VersionMismatch { .. }));
}

#[tokio::test]
async fn test_negative_quantity_is_a_conflict() {
    let store = get_test_store(Duration::from_secs(5)).await;
    let w1 = warehouse(&store, 1, "W1").await;
    stocked(&store, &w1, 7, 10).await;
    let stock = store
        .stock_by_product_and_warehouse(ProductId::new(7), w1.id)
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .update_quantity(stock.id, -1, stock.version)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn test_quantity_above_limit_is_a_conflict() {
    let store = get_test_store(Duration::from_secs(5)).await;
    let w1 = warehouse(&store, 1, "W1").await;
    stocked(&store, &w1, 7, 10).await;
    let stock = store
        .stock_by_product_and_warehouse(ProductId::new(7), w1.id)
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .update_quantity(stock.id, MAX_QUANTITY + 1, stock.version)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    drop(tx);

    let mut tx = store.begin().await.unwrap();
    tx.update_quantity(stock.id, MAX_QUANTITY, stock.version)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(
        store.get_stock(stock.id).await.unwrap().quantity,
        MAX_QUANTITY
    );
}

#[tokio::test]
async fn test_duplicate_stock_rolls_back_batch() {
    let store = get_test_store(Duration::from_secs(5)).await;
    let w1 = warehouse(&store, 1, "W1").await;
    stocked(&store, &w1, 7, 0).await;

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .insert_stocks(&[
            NewStock {
                product_id: ProductId::new(8),
                warehouse_id: w1.id,
            },
            NewStock {
                product_id: ProductId::new(7),
                warehouse_id: w1.id,
            },
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    drop(tx);

    assert_eq!(store.stocks_by_warehouse(w1.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_order_is_a_conflict() {
    let store = get_test_store(Duration::from_secs(5)).await;
    let w1 = warehouse(&store, 1, "W1").await;
    stocked(&store, &w1, 7, 10).await;
    let stock = store
        .stock_by_product_and_warehouse(ProductId::new(7), w1.id)
        .await
        .unwrap();

    let new = NewReservation {
        stock_id: stock.id,
        order_id: OrderId::new(1),
        quantity: 1,
    };
    let mut tx = store.begin().await.unwrap();
    tx.insert_reservation(new).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx.insert_reservation(new).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn test_reservation_status_update() {
    let store = get_test_store(Duration::from_secs(5)).await;
    let w1 = warehouse(&store, 1, "W1").await;
    stocked(&store, &w1, 7, 10).await;
    let stock = store
        .stock_by_product_and_warehouse(ProductId::new(7), w1.id)
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    let reservation = tx
        .insert_reservation(NewReservation {
            stock_id: stock.id,
            order_id: OrderId::new(5),
            quantity: 4,
        })
        .await
        .unwrap();
    tx.set_reservation_status(reservation.id, ReservationStatus::Cancelled)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let read = store.reservation_by_order(OrderId::new(5)).await.unwrap();
    assert_eq!(read.status, ReservationStatus::Cancelled);
    assert_eq!(store.total_active_by_stock(stock.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_lock_wait_times_out() {
    let store = get_test_store(Duration::from_millis(200)).await;
    let w1 = warehouse(&store, 1, "W1").await;
    stocked(&store, &w1, 7, 10).await;
    let stock = store
        .stock_by_product_and_warehouse(ProductId::new(7), w1.id)
        .await
        .unwrap();

    let mut holder = store.begin().await.unwrap();
    holder.lock_stock(stock.id).await.unwrap();

    let mut waiter = store.begin().await.unwrap();
    let err = waiter.lock_stock(stock.id).await.unwrap_err();
    assert!(matches!(err, StoreError::LockTimeout));
}

#[tokio::test]
async fn test_transfer_listing_and_status() {
    let store = get_test_store(Duration::from_secs(5)).await;
    let w1 = warehouse(&store, 1, "W1").await;
    let w2 = warehouse(&store, 1, "W2").await;
    let foreign = warehouse(&store, 2, "W3").await;

    let transfer = store
        .insert_transfer(NewTransfer {
            product_id: ProductId::new(7),
            from_warehouse_id: w1.id,
            to_warehouse_id: w2.id,
            quantity: 5,
            description: Some("restock".to_string()),
        })
        .await
        .unwrap();
    store
        .insert_transfer(NewTransfer {
            product_id: ProductId::new(7),
            from_warehouse_id: foreign.id,
            to_warehouse_id: w1.id,
            quantity: 5,
            description: None,
        })
        .await
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::NotStarted);

    let mut tx = store.begin().await.unwrap();
    tx.lock_transfer(transfer.id).await.unwrap();
    let updated = tx
        .set_transfer_status(transfer.id, TransferStatus::InProgress, None)
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(updated.description.as_deref(), Some("restock"));

    let page = store
        .list_transfers(ShopId::new(1), &TransferQuery::new())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].status, TransferStatus::InProgress);

    let page = store
        .list_transfers(
            ShopId::new(1),
            &TransferQuery::new().status(TransferStatus::Completed),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_listings_paginate() {
    let store = get_test_store(Duration::from_secs(5)).await;
    let w1 = warehouse(&store, 1, "B").await;
    let w2 = warehouse(&store, 1, "A").await;
    for product in 1..=3 {
        stocked(&store, &w1, product, product * 10).await;
    }
    stocked(&store, &w2, 1, 5).await;

    let page = store
        .list_warehouses(
            ShopId::new(1),
            &WarehouseQuery::new().sort(WarehouseSort::Name, SortOrder::Asc),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].id, w2.id);

    let page = store
        .list_stocks(
            ShopId::new(1),
            &StockQuery::new().warehouse(w1.id).paginate(2, 2),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total_pages(), 2);
}
