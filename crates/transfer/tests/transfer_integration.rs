//! Integration tests for stock transfers against the in-memory store.

use std::sync::Arc;

use inventory::{
    ErrorKind, InMemoryPublisher, ReservationService, StockService, WarehouseService,
};
use stock_store::{
    InMemoryStore, MAX_QUANTITY, NewTransfer, OrderId, ProductId, ShopId, Stock, StockStore,
    TransferId, TransferQuery, TransferStatus, WarehouseId,
};
use transfer::TransferOrchestrator;

const SHOP: ShopId = ShopId::new(1);
const OTHER_SHOP: ShopId = ShopId::new(2);
const PRODUCT: ProductId = ProductId::new(3);

struct TestHarness {
    store: InMemoryStore,
    publisher: InMemoryPublisher,
    stocks: StockService<InMemoryStore>,
    reservations: ReservationService<InMemoryStore>,
    warehouses: WarehouseService<InMemoryStore>,
    transfers: TransferOrchestrator<InMemoryStore>,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let publisher = InMemoryPublisher::new();
        let sink = Arc::new(publisher.clone());

        Self {
            stocks: StockService::new(store.clone(), sink.clone()),
            reservations: ReservationService::new(store.clone(), sink.clone()),
            warehouses: WarehouseService::new(store.clone(), sink.clone()),
            transfers: TransferOrchestrator::new(store.clone(), sink),
            store,
            publisher,
        }
    }

    /// Two warehouses W1 and W2 of `SHOP` holding the given quantities.
    async fn two_warehouses(&self, w1: i64, w2: i64) -> (Stock, Stock) {
        self.warehouses.create(SHOP, "W1", "Medan").await.unwrap();
        self.warehouses.create(SHOP, "W2", "Depok").await.unwrap();
        let rows = self.stocks.init_stock(SHOP, PRODUCT).await.unwrap();
        let first = self
            .stocks
            .update_quantity(rows[0].id, SHOP, w1, None)
            .await
            .unwrap();
        let second = self
            .stocks
            .update_quantity(rows[1].id, SHOP, w2, None)
            .await
            .unwrap();
        self.publisher.clear();
        (first, second)
    }

    async fn quantity(&self, stock: &Stock) -> i64 {
        self.store.get_stock(stock.id).await.unwrap().quantity
    }

    fn request(from: WarehouseId, to: WarehouseId, quantity: i64) -> NewTransfer {
        NewTransfer {
            product_id: PRODUCT,
            from_warehouse_id: from,
            to_warehouse_id: to,
            quantity,
            description: Some("rebalance".into()),
        }
    }
}

#[tokio::test]
async fn begin_then_revert_restores_source() {
    let h = TestHarness::new();
    let (w1, w2) = h.two_warehouses(50, 5).await;

    let created = h
        .transfers
        .create(SHOP, TestHarness::request(w1.warehouse_id, w2.warehouse_id, 20))
        .await
        .unwrap();
    assert_eq!(created.status, TransferStatus::NotStarted);
    assert_eq!(h.quantity(&w1).await, 50);

    let begun = h
        .transfers
        .apply(created.id, TransferStatus::InProgress, None)
        .await
        .unwrap();
    assert_eq!(begun.status, TransferStatus::InProgress);
    assert_eq!(h.quantity(&w1).await, 30);
    assert_eq!(h.publisher.last_for(PRODUCT).unwrap().quantity, 35);

    let reverted = h
        .transfers
        .apply(created.id, TransferStatus::Reverted, Some("truck broke".into()))
        .await
        .unwrap();
    assert_eq!(reverted.status, TransferStatus::Reverted);
    assert_eq!(reverted.description.as_deref(), Some("truck broke"));
    assert_eq!(h.quantity(&w1).await, 50);
    assert_eq!(h.quantity(&w2).await, 5);
}

#[tokio::test]
async fn begin_then_complete_moves_stock() {
    let h = TestHarness::new();
    let (w1, w2) = h.two_warehouses(50, 5).await;
    let created = h
        .transfers
        .create(SHOP, TestHarness::request(w1.warehouse_id, w2.warehouse_id, 20))
        .await
        .unwrap();

    h.transfers
        .apply(created.id, TransferStatus::InProgress, None)
        .await
        .unwrap();
    let completed = h
        .transfers
        .apply(created.id, TransferStatus::Completed, None)
        .await
        .unwrap();
    assert_eq!(completed.status, TransferStatus::Completed);
    assert_eq!(completed.description.as_deref(), Some("rebalance"));

    assert_eq!(h.quantity(&w1).await, 30);
    assert_eq!(h.quantity(&w2).await, 25);
    let availability = h.stocks.availability(PRODUCT).await.unwrap();
    assert_eq!(availability.quantity, 55);
    assert_eq!(h.publisher.last_for(PRODUCT).unwrap().quantity, 55);
}

#[tokio::test]
async fn failed_transfer_keeps_stock_out() {
    let h = TestHarness::new();
    let (w1, w2) = h.two_warehouses(50, 0).await;
    let created = h
        .transfers
        .create(SHOP, TestHarness::request(w1.warehouse_id, w2.warehouse_id, 10))
        .await
        .unwrap();
    h.transfers
        .apply(created.id, TransferStatus::InProgress, None)
        .await
        .unwrap();
    let published = h.publisher.messages().len();

    let failed = h
        .transfers
        .apply(created.id, TransferStatus::Failed, None)
        .await
        .unwrap();
    assert_eq!(failed.status, TransferStatus::Failed);
    assert_eq!(h.quantity(&w1).await, 40);
    assert_eq!(h.quantity(&w2).await, 0);
    assert_eq!(h.publisher.messages().len(), published);
}

#[tokio::test]
async fn begin_is_refused_when_source_is_reserved() {
    let h = TestHarness::new();
    let (w1, w2) = h.two_warehouses(50, 0).await;
    let created = h
        .transfers
        .create(SHOP, TestHarness::request(w1.warehouse_id, w2.warehouse_id, 20))
        .await
        .unwrap();

    h.reservations
        .reserve(PRODUCT, 35, OrderId::new(1))
        .await
        .unwrap();

    let err = h
        .transfers
        .apply(created.id, TransferStatus::InProgress, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(h.quantity(&w1).await, 50);

    let transfer = h.transfers.get(created.id, None).await.unwrap();
    assert_eq!(transfer.status, TransferStatus::NotStarted);
}

#[tokio::test]
async fn disallowed_transitions_are_rejected() {
    let h = TestHarness::new();
    let (w1, w2) = h.two_warehouses(50, 0).await;
    let created = h
        .transfers
        .create(SHOP, TestHarness::request(w1.warehouse_id, w2.warehouse_id, 5))
        .await
        .unwrap();

    for target in [
        TransferStatus::NotStarted,
        TransferStatus::Completed,
        TransferStatus::Reverted,
        TransferStatus::Failed,
    ] {
        let err = h
            .transfers
            .apply(created.id, target, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest, "{target}");
    }

    h.transfers
        .apply(created.id, TransferStatus::InProgress, None)
        .await
        .unwrap();
    h.transfers
        .apply(created.id, TransferStatus::Completed, None)
        .await
        .unwrap();
    let err = h
        .transfers
        .apply(created.id, TransferStatus::Reverted, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(h.quantity(&w1).await, 45);
    assert_eq!(h.quantity(&w2).await, 5);
}

#[tokio::test]
async fn creation_is_validated() {
    let h = TestHarness::new();
    let (w1, w2) = h.two_warehouses(15, 0).await;

    let err = h
        .transfers
        .create(SHOP, TestHarness::request(w1.warehouse_id, w2.warehouse_id, 20))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let err = h
        .transfers
        .create(SHOP, TestHarness::request(w1.warehouse_id, w1.warehouse_id, 5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .transfers
        .create(SHOP, TestHarness::request(w1.warehouse_id, w2.warehouse_id, 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .transfers
        .create(
            SHOP,
            TestHarness::request(w1.warehouse_id, WarehouseId::new(999), 5),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn completion_cannot_push_destination_past_the_row_limit() {
    let h = TestHarness::new();
    let (w1, w2) = h.two_warehouses(10, MAX_QUANTITY).await;

    let err = h
        .transfers
        .create(
            SHOP,
            TestHarness::request(w1.warehouse_id, w2.warehouse_id, i64::MAX),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let created = h
        .transfers
        .create(SHOP, TestHarness::request(w1.warehouse_id, w2.warehouse_id, 5))
        .await
        .unwrap();
    h.transfers
        .apply(created.id, TransferStatus::InProgress, None)
        .await
        .unwrap();
    assert_eq!(h.quantity(&w1).await, 5);

    let err = h
        .transfers
        .apply(created.id, TransferStatus::Completed, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(h.quantity(&w2).await, MAX_QUANTITY);
    assert_eq!(
        h.transfers.get(created.id, None).await.unwrap().status,
        TransferStatus::InProgress
    );

    h.transfers
        .apply(created.id, TransferStatus::Reverted, None)
        .await
        .unwrap();
    assert_eq!(h.quantity(&w1).await, 10);
}

#[tokio::test]
async fn transfers_are_scoped_to_the_shop() {
    let h = TestHarness::new();
    let (w1, w2) = h.two_warehouses(50, 0).await;
    let foreign = h
        .warehouses
        .create(OTHER_SHOP, "Elsewhere", "Bogor")
        .await
        .unwrap();

    let err = h
        .transfers
        .create(SHOP, TestHarness::request(w1.warehouse_id, foreign.id, 5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let created = h
        .transfers
        .create(SHOP, TestHarness::request(w1.warehouse_id, w2.warehouse_id, 5))
        .await
        .unwrap();
    let err = h
        .transfers
        .get(created.id, Some(OTHER_SHOP))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(
        h.transfers.get(created.id, Some(SHOP)).await.unwrap(),
        created
    );

    assert_eq!(
        h.transfers
            .list(OTHER_SHOP, &TransferQuery::new())
            .await
            .unwrap()
            .total,
        0
    );
    let page = h
        .transfers
        .list(SHOP, &TransferQuery::new().status(TransferStatus::NotStarted))
        .await
        .unwrap();
    assert_eq!(page.items, vec![created]);
}

#[tokio::test]
async fn unknown_transfer_is_not_found() {
    let h = TestHarness::new();
    let err = h
        .transfers
        .apply(TransferId::new(42), TransferStatus::InProgress, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn publish_failure_rolls_back_transition() {
    let h = TestHarness::new();
    let (w1, w2) = h.two_warehouses(50, 0).await;
    let created = h
        .transfers
        .create(SHOP, TestHarness::request(w1.warehouse_id, w2.warehouse_id, 20))
        .await
        .unwrap();
    h.publisher.set_fail(true);

    let err = h
        .transfers
        .apply(created.id, TransferStatus::InProgress, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(h.quantity(&w1).await, 50);
    assert_eq!(
        h.transfers.get(created.id, None).await.unwrap().status,
        TransferStatus::NotStarted
    );
}
