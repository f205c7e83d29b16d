//! `PostgreSQL` implementation of [`OrderRepository`].

use crate::error::classify;
use chrono::{DateTime, Utc};
use orderstream_core::BoxFuture;
use orderstream_core::repository::OrderRepository;
use orderstream_core::{Delivery, Item, OrderHeader, OrderRecord, Payment, RepositoryError};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::{Duration, Instant};

/// Record Store over a `PostgreSQL` connection pool.
///
/// Each record spans four tables (`orders`, `delivery`, `payment`, `items`).
/// Reads and writes of one record run inside a single transaction.
///
/// # Example
///
/// ```no_run
/// use orderstream_postgres::PostgresOrderRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresOrderRepository::connect("postgres://localhost/orders", 10).await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns the classified connection error.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| classify(&e))?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn select_record(&self, id: &str) -> Result<OrderRecord, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(|e| classify(&e))?;

        let order_row = sqlx::query(
            r"
            SELECT order_uid, track_number, entry, locale, internal_signature,
                   customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
            FROM orders
            WHERE order_uid = $1
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| classify(&e))?
        .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        let delivery_row = sqlx::query(
            r"
            SELECT name, phone, zip, city, address, region, email
            FROM delivery
            WHERE order_uid = $1
            ",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| incomplete(id, "delivery", &e))?;

        let payment_row = sqlx::query(
            r"
            SELECT transaction, request_id, currency, provider, amount, payment_dt,
                   bank, delivery_cost, goods_total, custom_fee
            FROM payment
            WHERE order_uid = $1
            ",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| incomplete(id, "payment", &e))?;

        let item_rows = sqlx::query(
            r"
            SELECT chrt_id, track_number, price, rid, name, sale, size,
                   total_price, nm_id, brand, status
            FROM items
            WHERE order_uid = $1
            ORDER BY position ASC
            ",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| classify(&e))?;

        tx.commit().await.map_err(|e| classify(&e))?;

        Ok(OrderRecord {
            order: row_to_header(&order_row).map_err(|e| classify(&e))?,
            delivery: row_to_delivery(&delivery_row).map_err(|e| classify(&e))?,
            payment: row_to_payment(&payment_row).map_err(|e| classify(&e))?,
            items: item_rows
                .iter()
                .map(row_to_item)
                .collect::<Result<_, _>>()
                .map_err(|e| classify(&e))?,
        })
    }

    async fn insert_record(&self, record: &OrderRecord) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(|e| classify(&e))?;
        write_record(&mut tx, record).await.map_err(|e| classify(&e))?;
        tx.commit().await.map_err(|e| classify(&e))
    }

    async fn list_ids_since(&self, since: DateTime<Utc>) -> Result<Vec<String>, RepositoryError> {
        let ids: Vec<(String,)> = sqlx::query_as(
            r"
            SELECT order_uid
            FROM orders
            WHERE date_created >= $1
            ORDER BY date_created ASC
            ",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify(&e))?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}

/// A child row missing for an existing order is a broken record, not absence.
fn incomplete(id: &str, table: &str, err: &sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => {
            RepositoryError::Database(format!("order {id} has no {table} row"))
        }
        other => classify(other),
    }
}

async fn write_record(
    tx: &mut Transaction<'_, Postgres>,
    record: &OrderRecord,
) -> Result<(), sqlx::Error> {
    let order = &record.order;
    sqlx::query(
        r"
        INSERT INTO orders (
            order_uid, track_number, entry, locale, internal_signature,
            customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ",
    )
    .bind(&order.order_uid)
    .bind(&order.track_number)
    .bind(&order.entry)
    .bind(&order.locale)
    .bind(&order.internal_signature)
    .bind(&order.customer_id)
    .bind(&order.delivery_service)
    .bind(&order.shard_key)
    .bind(order.sm_id)
    .bind(order.date_created)
    .bind(&order.oof_shard)
    .execute(&mut **tx)
    .await?;

    let delivery = &record.delivery;
    sqlx::query(
        r"
        INSERT INTO delivery (order_uid, name, phone, zip, city, address, region, email)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ",
    )
    .bind(&order.order_uid)
    .bind(&delivery.name)
    .bind(&delivery.phone)
    .bind(&delivery.zip)
    .bind(&delivery.city)
    .bind(&delivery.address)
    .bind(&delivery.region)
    .bind(&delivery.email)
    .execute(&mut **tx)
    .await?;

    let payment = &record.payment;
    sqlx::query(
        r"
        INSERT INTO payment (
            order_uid, transaction, request_id, currency, provider, amount,
            payment_dt, bank, delivery_cost, goods_total, custom_fee
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ",
    )
    .bind(&order.order_uid)
    .bind(&payment.transaction)
    .bind(&payment.request_id)
    .bind(&payment.currency)
    .bind(&payment.provider)
    .bind(payment.amount)
    .bind(payment.payment_dt)
    .bind(&payment.bank)
    .bind(payment.delivery_cost)
    .bind(payment.goods_total)
    .bind(payment.custom_fee)
    .execute(&mut **tx)
    .await?;

    for (position, item) in (0_i32..).zip(&record.items) {
        sqlx::query(
            r"
            INSERT INTO items (
                order_uid, position, chrt_id, track_number, price, rid, name,
                sale, size, total_price, nm_id, brand, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(&order.order_uid)
        .bind(position)
        .bind(item.chrt_id)
        .bind(&item.track_number)
        .bind(item.price)
        .bind(&item.rid)
        .bind(&item.name)
        .bind(item.sale)
        .bind(&item.size)
        .bind(item.total_price)
        .bind(item.nm_id)
        .bind(&item.brand)
        .bind(item.status)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

fn row_to_header(row: &PgRow) -> Result<OrderHeader, sqlx::Error> {
    Ok(OrderHeader {
        order_uid: row.try_get("order_uid")?,
        track_number: row.try_get("track_number")?,
        entry: row.try_get("entry")?,
        locale: row.try_get("locale")?,
        internal_signature: row.try_get("internal_signature")?,
        customer_id: row.try_get("customer_id")?,
        delivery_service: row.try_get("delivery_service")?,
        shard_key: row.try_get("shardkey")?,
        sm_id: row.try_get("sm_id")?,
        date_created: Some(row.try_get("date_created")?),
        oof_shard: row.try_get("oof_shard")?,
    })
}

fn row_to_delivery(row: &PgRow) -> Result<Delivery, sqlx::Error> {
    Ok(Delivery {
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        zip: row.try_get("zip")?,
        city: row.try_get("city")?,
        address: row.try_get("address")?,
        region: row.try_get("region")?,
        email: row.try_get("email")?,
    })
}

fn row_to_payment(row: &PgRow) -> Result<Payment, sqlx::Error> {
    Ok(Payment {
        transaction: row.try_get("transaction")?,
        request_id: row.try_get("request_id")?,
        currency: row.try_get("currency")?,
        provider: row.try_get("provider")?,
        amount: row.try_get("amount")?,
        payment_dt: row.try_get("payment_dt")?,
        bank: row.try_get("bank")?,
        delivery_cost: row.try_get("delivery_cost")?,
        goods_total: row.try_get("goods_total")?,
        custom_fee: row.try_get("custom_fee")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        chrt_id: row.try_get("chrt_id")?,
        track_number: row.try_get("track_number")?,
        price: row.try_get("price")?,
        rid: row.try_get("rid")?,
        name: row.try_get("name")?,
        sale: row.try_get("sale")?,
        size: row.try_get("size")?,
        total_price: row.try_get("total_price")?,
        nm_id: row.try_get("nm_id")?,
        brand: row.try_get("brand")?,
        status: row.try_get("status")?,
    })
}

fn observe<T>(operation: &'static str, started: Instant, result: &Result<T, RepositoryError>) {
    metrics::histogram!("record_store_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
    if let Err(err) = result {
        if !err.is_not_found() {
            metrics::counter!("record_store_errors_total", "operation" => operation).increment(1);
        }
    }
}

impl OrderRepository for PostgresOrderRepository {
    fn select<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<OrderRecord, RepositoryError>> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.select_record(id).await;
            observe("select", started, &result);
            result
        })
    }

    fn insert<'a>(
        &'a self,
        record: &'a OrderRecord,
    ) -> BoxFuture<'a, Result<(), RepositoryError>> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.insert_record(record).await;
            observe("insert", started, &result);
            if let Err(err) = &result {
                tracing::warn!(order_id = %record.id(), error = %err, "Order insert failed");
            }
            result
        })
    }

    fn list_created_since(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<String>, RepositoryError>> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.list_ids_since(since).await;
            observe("list", started, &result);
            result
        })
    }
}
