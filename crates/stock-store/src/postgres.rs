use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    PgConnection, PgPool, Postgres, QueryBuilder, Row, Transaction,
    postgres::{PgPoolOptions, PgRow},
};

use crate::{
    Availability, NewReservation, NewStock, NewTransfer, NewWarehouse, OrderId, Page, ProductId,
    Reservation, ReservationId, ReservationStatus, Result, ShopId, Stock, StockId, StockLevel,
    StockQuery, StockTransfer, StoreError, TransferId, TransferQuery, TransferStatus, Version,
    Warehouse, WarehouseId, WarehouseQuery,
    store::{StockStore, StoreTx},
};

const WAREHOUSE_COLUMNS: &str = "id, shop_id, name, location, active, created_at, updated_at";
const STOCK_COLUMNS: &str =
    "s.id, s.product_id, s.warehouse_id, s.quantity, s.version, s.created_at, s.updated_at";
const RESERVATION_COLUMNS: &str =
    "id, stock_id, order_id, quantity, status, created_at, updated_at";
const TRANSFER_COLUMNS: &str = "t.id, t.product_id, t.from_warehouse, t.to_warehouse, t.quantity, \
     t.status, t.description, t.created_at, t.updated_at";

/// Active reservation totals per stock row, joined as a sub-select so that
/// several reservations on one row never multiply its quantity.
const ACTIVE_RESERVED: &str = "SELECT stock_id, SUM(quantity) AS reserved \
     FROM reserved_stocks WHERE status = 'active' GROUP BY stock_id";

/// PostgreSQL-backed stock store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Connects a pool of at most `max_connections` to `url`.
    pub async fn connect(url: &str, max_connections: u32, lock_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(pool, lock_timeout))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// A transaction on a [`PostgresStore`] running with `SET LOCAL lock_timeout`.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

fn decode_err(err: crate::ParseStatusError) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

fn row_to_warehouse(row: &PgRow) -> Result<Warehouse> {
    Ok(Warehouse {
        id: WarehouseId::new(row.try_get("id")?),
        shop_id: ShopId::new(row.try_get("shop_id")?),
        name: row.try_get("name")?,
        location: row.try_get("location")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_stock(row: &PgRow) -> Result<Stock> {
    Ok(Stock {
        id: StockId::new(row.try_get("id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        warehouse_id: WarehouseId::new(row.try_get("warehouse_id")?),
        quantity: row.try_get("quantity")?,
        version: Version::new(row.try_get("version")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_reservation(row: &PgRow) -> Result<Reservation> {
    let status: String = row.try_get("status")?;
    Ok(Reservation {
        id: ReservationId::new(row.try_get("id")?),
        stock_id: StockId::new(row.try_get("stock_id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        quantity: row.try_get("quantity")?,
        status: status.parse().map_err(decode_err)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_transfer(row: &PgRow) -> Result<StockTransfer> {
    let status: String = row.try_get("status")?;
    Ok(StockTransfer {
        id: TransferId::new(row.try_get("id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        from_warehouse_id: WarehouseId::new(row.try_get("from_warehouse")?),
        to_warehouse_id: WarehouseId::new(row.try_get("to_warehouse")?),
        quantity: row.try_get("quantity")?,
        status: status.parse().map_err(decode_err)?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn for_update(sql: String, lock: bool) -> String {
    if lock { sql + " FOR UPDATE" } else { sql }
}

async fn fetch_warehouse(
    conn: &mut PgConnection,
    id: WarehouseId,
    lock: bool,
) -> Result<Warehouse> {
    let sql = for_update(
        format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1"),
        lock,
    );
    let row = sqlx::query(&sql)
        .bind(id.as_i64())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| StoreError::not_found("warehouse", id))?;
    row_to_warehouse(&row)
}

async fn fetch_stock(conn: &mut PgConnection, id: StockId, lock: bool) -> Result<Stock> {
    let sql = for_update(
        format!("SELECT {STOCK_COLUMNS} FROM stocks s WHERE s.id = $1"),
        lock,
    );
    let row = sqlx::query(&sql)
        .bind(id.as_i64())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| StoreError::not_found("stock", id))?;
    row_to_stock(&row)
}

async fn fetch_stock_by_pair(
    conn: &mut PgConnection,
    product_id: ProductId,
    warehouse_id: WarehouseId,
    lock: bool,
) -> Result<Stock> {
    let sql = for_update(
        format!(
            "SELECT {STOCK_COLUMNS} FROM stocks s WHERE s.product_id = $1 AND s.warehouse_id = $2"
        ),
        lock,
    );
    let row = sqlx::query(&sql)
        .bind(product_id.as_i64())
        .bind(warehouse_id.as_i64())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| StoreError::not_found("stock for product", product_id))?;
    row_to_stock(&row)
}

async fn fetch_stocks_by_warehouse(
    conn: &mut PgConnection,
    warehouse_id: WarehouseId,
    lock: bool,
) -> Result<Vec<Stock>> {
    let sql = for_update(
        format!("SELECT {STOCK_COLUMNS} FROM stocks s WHERE s.warehouse_id = $1 ORDER BY s.id"),
        lock,
    );
    let rows = sqlx::query(&sql)
        .bind(warehouse_id.as_i64())
        .fetch_all(conn)
        .await?;
    rows.iter().map(row_to_stock).collect()
}

async fn fetch_total_active(conn: &mut PgConnection, stock_id: StockId) -> Result<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM reserved_stocks \
         WHERE stock_id = $1 AND status = 'active'",
    )
    .bind(stock_id.as_i64())
    .fetch_one(conn)
    .await?;
    Ok(total)
}

async fn fetch_totals_active(
    conn: &mut PgConnection,
    stock_ids: &[StockId],
) -> Result<HashMap<StockId, i64>> {
    let ids: Vec<i64> = stock_ids.iter().map(StockId::as_i64).collect();
    let rows = sqlx::query(
        "SELECT stock_id, SUM(quantity)::BIGINT AS reserved FROM reserved_stocks \
         WHERE stock_id = ANY($1) AND status = 'active' GROUP BY stock_id",
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok((
                StockId::new(row.try_get("stock_id")?),
                row.try_get::<i64, _>("reserved")?,
            ))
        })
        .collect()
}

async fn fetch_availability(
    conn: &mut PgConnection,
    product_ids: &[ProductId],
) -> Result<HashMap<ProductId, Availability>> {
    let ids: Vec<i64> = product_ids.iter().map(ProductId::as_i64).collect();
    let sql = format!(
        "SELECT s.product_id, \
                SUM(s.quantity)::BIGINT AS quantity, \
                COALESCE(SUM(r.reserved), 0)::BIGINT AS reserved \
         FROM stocks s \
         JOIN warehouses w ON w.id = s.warehouse_id \
         LEFT JOIN ({ACTIVE_RESERVED}) r ON r.stock_id = s.id \
         WHERE s.product_id = ANY($1) AND w.active = TRUE \
         GROUP BY s.product_id"
    );
    let rows = sqlx::query(&sql).bind(ids).fetch_all(conn).await?;

    rows.iter()
        .map(|row| {
            let product_id = ProductId::new(row.try_get("product_id")?);
            let availability = Availability::from_totals(
                product_id,
                row.try_get("quantity")?,
                row.try_get("reserved")?,
            );
            Ok((product_id, availability))
        })
        .collect()
}

async fn fetch_reservation_by_order(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Reservation> {
    let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reserved_stocks WHERE order_id = $1");
    let row = sqlx::query(&sql)
        .bind(order_id.as_i64())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| StoreError::not_found("reservation for order", order_id))?;
    row_to_reservation(&row)
}

async fn fetch_transfer(
    conn: &mut PgConnection,
    id: TransferId,
    lock: bool,
) -> Result<StockTransfer> {
    let sql = for_update(
        format!("SELECT {TRANSFER_COLUMNS} FROM stock_transfers t WHERE t.id = $1"),
        lock,
    );
    let row = sqlx::query(&sql)
        .bind(id.as_i64())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| StoreError::not_found("stock transfer", id))?;
    row_to_transfer(&row)
}

fn push_stock_filters(qb: &mut QueryBuilder<'_, Postgres>, shop_id: ShopId, query: &StockQuery) {
    qb.push(" FROM stocks s JOIN warehouses w ON w.id = s.warehouse_id WHERE w.shop_id = ");
    qb.push_bind(shop_id.as_i64());
    qb.push(" AND w.active = TRUE");
    if let Some(product_id) = query.product_id {
        qb.push(" AND s.product_id = ").push_bind(product_id.as_i64());
    }
    if let Some(warehouse_id) = query.warehouse_id {
        qb.push(" AND s.warehouse_id = ").push_bind(warehouse_id.as_i64());
    }
}

fn push_transfer_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    shop_id: ShopId,
    query: &TransferQuery,
) {
    qb.push(" FROM stock_transfers t JOIN warehouses w ON w.id = t.from_warehouse WHERE w.shop_id = ");
    qb.push_bind(shop_id.as_i64());
    if let Some(status) = query.status {
        qb.push(" AND t.status = ").push_bind(status.as_str());
    }
}

fn push_warehouse_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    shop_id: ShopId,
    query: &WarehouseQuery,
) {
    qb.push(" FROM warehouses WHERE shop_id = ");
    qb.push_bind(shop_id.as_i64());
    if let Some(active) = query.active {
        qb.push(" AND active = ").push_bind(active);
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, pagination: crate::Pagination) {
    qb.push(" LIMIT ").push_bind(i64::from(pagination.limit));
    qb.push(" OFFSET ").push_bind(pagination.offset() as i64);
}

#[async_trait]
impl StockStore for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await?;
        Ok(PostgresTx { tx })
    }

    async fn insert_warehouse(&self, warehouse: NewWarehouse) -> Result<Warehouse> {
        let sql = format!(
            "INSERT INTO warehouses (shop_id, name, location) VALUES ($1, $2, $3) \
             RETURNING {WAREHOUSE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(warehouse.shop_id.as_i64())
            .bind(&warehouse.name)
            .bind(&warehouse.location)
            .fetch_one(&self.pool)
            .await?;
        row_to_warehouse(&row)
    }

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Warehouse> {
        let mut conn = self.pool.acquire().await?;
        fetch_warehouse(&mut conn, id, false).await
    }

    async fn warehouses_by_shop(&self, shop_id: ShopId) -> Result<Vec<Warehouse>> {
        let sql = format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE shop_id = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(shop_id.as_i64())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_warehouse).collect()
    }

    async fn list_warehouses(
        &self,
        shop_id: ShopId,
        query: &WarehouseQuery,
    ) -> Result<Page<Warehouse>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_warehouse_filters(&mut count, shop_id, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {WAREHOUSE_COLUMNS}"));
        push_warehouse_filters(&mut select, shop_id, query);
        let order = query.sort_order.as_sql();
        select.push(format!(" ORDER BY {} {order}, id {order}", query.sort_by.column()));
        push_page(&mut select, query.pagination);
        let rows = select.build().fetch_all(&self.pool).await?;

        let items = rows.iter().map(row_to_warehouse).collect::<Result<_>>()?;
        Ok(Page::new(items, total as u64, query.pagination))
    }

    async fn get_stock(&self, id: StockId) -> Result<Stock> {
        let mut conn = self.pool.acquire().await?;
        fetch_stock(&mut conn, id, false).await
    }

    async fn stock_by_product_and_warehouse(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Stock> {
        let mut conn = self.pool.acquire().await?;
        fetch_stock_by_pair(&mut conn, product_id, warehouse_id, false).await
    }

    async fn stocks_by_warehouse(&self, warehouse_id: WarehouseId) -> Result<Vec<Stock>> {
        let mut conn = self.pool.acquire().await?;
        fetch_stocks_by_warehouse(&mut conn, warehouse_id, false).await
    }

    async fn stock_levels_by_product(&self, product_id: ProductId) -> Result<Vec<StockLevel>> {
        let sql = format!(
            "SELECT {STOCK_COLUMNS}, w.active AS warehouse_active, \
                    COALESCE(r.reserved, 0)::BIGINT AS reserved \
             FROM stocks s \
             JOIN warehouses w ON w.id = s.warehouse_id \
             LEFT JOIN ({ACTIVE_RESERVED}) r ON r.stock_id = s.id \
             WHERE s.product_id = $1 \
             ORDER BY s.warehouse_id, s.id"
        );
        let rows = sqlx::query(&sql)
            .bind(product_id.as_i64())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(StockLevel {
                    stock: row_to_stock(row)?,
                    warehouse_active: row.try_get("warehouse_active")?,
                    reserved: row.try_get("reserved")?,
                })
            })
            .collect()
    }

    async fn list_stocks(&self, shop_id: ShopId, query: &StockQuery) -> Result<Page<Stock>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_stock_filters(&mut count, shop_id, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {STOCK_COLUMNS}"));
        push_stock_filters(&mut select, shop_id, query);
        let order = query.sort_order.as_sql();
        select.push(format!(" ORDER BY {} {order}, s.id {order}", query.sort_by.column()));
        push_page(&mut select, query.pagination);
        let rows = select.build().fetch_all(&self.pool).await?;

        let items = rows.iter().map(row_to_stock).collect::<Result<_>>()?;
        Ok(Page::new(items, total as u64, query.pagination))
    }

    async fn available_by_product(&self, product_id: ProductId) -> Result<Availability> {
        let mut conn = self.pool.acquire().await?;
        let mut found = fetch_availability(&mut conn, &[product_id]).await?;
        Ok(found
            .remove(&product_id)
            .unwrap_or_else(|| Availability::empty(product_id)))
    }

    async fn available_by_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Availability>> {
        let mut conn = self.pool.acquire().await?;
        fetch_availability(&mut conn, product_ids).await
    }

    async fn reservation_by_order(&self, order_id: OrderId) -> Result<Reservation> {
        let mut conn = self.pool.acquire().await?;
        fetch_reservation_by_order(&mut conn, order_id).await
    }

    async fn total_active_by_stock(&self, stock_id: StockId) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        fetch_total_active(&mut conn, stock_id).await
    }

    async fn insert_transfer(&self, transfer: NewTransfer) -> Result<StockTransfer> {
        let sql = format!(
            "INSERT INTO stock_transfers AS t \
                 (product_id, from_warehouse, to_warehouse, quantity, status, description) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {TRANSFER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(transfer.product_id.as_i64())
            .bind(transfer.from_warehouse_id.as_i64())
            .bind(transfer.to_warehouse_id.as_i64())
            .bind(transfer.quantity)
            .bind(TransferStatus::NotStarted.as_str())
            .bind(&transfer.description)
            .fetch_one(&self.pool)
            .await?;
        row_to_transfer(&row)
    }

    async fn get_transfer(&self, id: TransferId) -> Result<StockTransfer> {
        let mut conn = self.pool.acquire().await?;
        fetch_transfer(&mut conn, id, false).await
    }

    async fn list_transfers(
        &self,
        shop_id: ShopId,
        query: &TransferQuery,
    ) -> Result<Page<StockTransfer>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_transfer_filters(&mut count, shop_id, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {TRANSFER_COLUMNS}"));
        push_transfer_filters(&mut select, shop_id, query);
        let order = query.sort_order.as_sql();
        select.push(format!(" ORDER BY {} {order}, t.id {order}", query.sort_by.column()));
        push_page(&mut select, query.pagination);
        let rows = select.build().fetch_all(&self.pool).await?;

        let items = rows.iter().map(row_to_transfer).collect::<Result<_>>()?;
        Ok(Page::new(items, total as u64, query.pagination))
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn insert_stocks(&mut self, stocks: &[NewStock]) -> Result<Vec<Stock>> {
        if stocks.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO stocks AS s (product_id, warehouse_id) ");
        qb.push_values(stocks, |mut row, stock| {
            row.push_bind(stock.product_id.as_i64())
                .push_bind(stock.warehouse_id.as_i64());
        });
        qb.push(format!(" RETURNING {STOCK_COLUMNS}"));
        let rows = qb.build().fetch_all(&mut *self.tx).await?;
        rows.iter().map(row_to_stock).collect()
    }

    async fn get_warehouse(&mut self, id: WarehouseId) -> Result<Warehouse> {
        fetch_warehouse(&mut *self.tx, id, false).await
    }

    async fn lock_warehouse(&mut self, id: WarehouseId) -> Result<Warehouse> {
        fetch_warehouse(&mut *self.tx, id, true).await
    }

    async fn set_warehouse_active(&mut self, id: WarehouseId, active: bool) -> Result<Warehouse> {
        let sql = format!(
            "UPDATE warehouses SET active = $1, updated_at = NOW() WHERE id = $2 \
             RETURNING {WAREHOUSE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(active)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| StoreError::not_found("warehouse", id))?;
        row_to_warehouse(&row)
    }

    async fn lock_stock(&mut self, id: StockId) -> Result<Stock> {
        fetch_stock(&mut *self.tx, id, true).await
    }

    async fn lock_stock_by_product_and_warehouse(
        &mut self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Result<Stock> {
        fetch_stock_by_pair(&mut *self.tx, product_id, warehouse_id, true).await
    }

    async fn lock_stocks_by_warehouse(&mut self, warehouse_id: WarehouseId) -> Result<Vec<Stock>> {
        fetch_stocks_by_warehouse(&mut *self.tx, warehouse_id, true).await
    }

    async fn update_quantity(
        &mut self,
        id: StockId,
        quantity: i64,
        expected: Version,
    ) -> Result<Stock> {
        let sql = format!(
            "UPDATE stocks AS s SET quantity = $1, version = s.version + 1, updated_at = NOW() \
             WHERE s.id = $2 AND s.version = $3 \
             RETURNING {STOCK_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(quantity)
            .bind(id.as_i64())
            .bind(expected.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => row_to_stock(&row),
            None => {
                fetch_stock(&mut *self.tx, id, false).await?;
                Err(StoreError::VersionMismatch {
                    stock_id: id,
                    expected,
                })
            }
        }
    }

    async fn total_active_by_stock(&mut self, stock_id: StockId) -> Result<i64> {
        fetch_total_active(&mut *self.tx, stock_id).await
    }

    async fn total_active_by_stocks(
        &mut self,
        stock_ids: &[StockId],
    ) -> Result<HashMap<StockId, i64>> {
        fetch_totals_active(&mut *self.tx, stock_ids).await
    }

    async fn available_by_product(&mut self, product_id: ProductId) -> Result<Availability> {
        let mut found = fetch_availability(&mut *self.tx, &[product_id]).await?;
        Ok(found
            .remove(&product_id)
            .unwrap_or_else(|| Availability::empty(product_id)))
    }

    async fn insert_reservation(&mut self, reservation: NewReservation) -> Result<Reservation> {
        let sql = format!(
            "INSERT INTO reserved_stocks (stock_id, order_id, quantity, status) \
             VALUES ($1, $2, $3, $4) RETURNING {RESERVATION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(reservation.stock_id.as_i64())
            .bind(reservation.order_id.as_i64())
            .bind(reservation.quantity)
            .bind(ReservationStatus::Active.as_str())
            .fetch_one(&mut *self.tx)
            .await?;
        row_to_reservation(&row)
    }

    async fn reservation_by_order(&mut self, order_id: OrderId) -> Result<Reservation> {
        fetch_reservation_by_order(&mut *self.tx, order_id).await
    }

    async fn set_reservation_status(
        &mut self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<Reservation> {
        let sql = format!(
            "UPDATE reserved_stocks SET status = $1, updated_at = NOW() WHERE id = $2 \
             RETURNING {RESERVATION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| StoreError::not_found("reservation", id))?;
        row_to_reservation(&row)
    }

    async fn lock_transfer(&mut self, id: TransferId) -> Result<StockTransfer> {
        fetch_transfer(&mut *self.tx, id, true).await
    }

    async fn set_transfer_status(
        &mut self,
        id: TransferId,
        status: TransferStatus,
        description: Option<String>,
    ) -> Result<StockTransfer> {
        let sql = format!(
            "UPDATE stock_transfers AS t \
             SET status = $1, description = COALESCE($2, t.description), updated_at = NOW() \
             WHERE t.id = $3 \
             RETURNING {TRANSFER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(description)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| StoreError::not_found("stock transfer", id))?;
        row_to_transfer(&row)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
