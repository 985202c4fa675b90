use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatusType, StatusChange},
    order_objects::OrderQueryFilter,
    traits::OrderFlowError,
};

#[derive(FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    #[sqlx(flatten)]
    item: OrderItem,
}

/// Inserts a new order, its item snapshots and its initial `Pending` history entry using the given connection.
/// This is not atomic. You can embed this call inside a transaction if you need to ensure atomicity, and pass
/// `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderFlowError> {
    if order_exists(&order.order_id, conn).await?.is_some() {
        return Err(OrderFlowError::OrderAlreadyExists(order.order_id));
    }
    let mut inserted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                buyer_email,
                seller_email,
                order_type,
                subtotal,
                delivery_fee,
                total_amount,
                delivery_address,
                phone_number,
                payment_method,
                transaction_id,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.buyer_email)
    .bind(&order.seller_email)
    .bind(order.order_type)
    .bind(order.subtotal)
    .bind(order.delivery_fee)
    .bind(order.total_amount)
    .bind(&order.delivery.delivery_address)
    .bind(&order.delivery.phone_number)
    .bind(order.payment_method)
    .bind(&order.transaction_id)
    .bind(OrderStatusType::Pending)
    .bind(order.created_at)
    .fetch_one(&mut *conn)
    .await?;
    for item in &order.items {
        insert_item(&order.order_id, item, conn).await?;
    }
    insert_status_change(&order.order_id, OrderStatusType::Pending, order.created_at, conn).await?;
    inserted.items = order.items;
    debug!(
        "🗃️ Order [{}] for {} inserted with id {}. {} items, total {}",
        inserted.order_id,
        inserted.seller_email,
        inserted.id,
        inserted.items.len(),
        inserted.total_amount
    );
    Ok(inserted)
}

async fn insert_item(order_id: &OrderId, item: &OrderItem, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO order_items (order_id, listing_id, name, price, quantity, image, category)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(order_id.as_str())
    .bind(item.listing_id)
    .bind(&item.name)
    .bind(item.price)
    .bind(item.quantity)
    .bind(&item.image)
    .bind(item.category)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_status_change(
    order_id: &OrderId,
    status: OrderStatusType,
    occurred_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO order_status_history (order_id, status, occurred_at) VALUES ($1, $2, $3)")
        .bind(order_id.as_str())
        .bind(status)
        .bind(occurred_at)
        .execute(conn)
        .await?;
    trace!("🗃️ Order [{order_id}] entered {status} at {occurred_at}");
    Ok(())
}

/// Checks whether the order with the given `OrderId` already exists in the database. If it does exist, the `id` of the
/// order is returned. If it does not exist, `None` is returned.
pub async fn order_exists(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

/// Returns the order with the given `order_id`, including its items.
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    match order {
        Some(order) => {
            let mut orders = attach_items(vec![order], conn).await?;
            Ok(orders.pop())
        },
        None => Ok(None),
    }
}

/// Loads the items for every order in `orders` with a single query.
async fn attach_items(mut orders: Vec<Order>, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    if orders.is_empty() {
        return Ok(orders);
    }
    let mut builder = QueryBuilder::new(
        "SELECT order_id, listing_id, name, price, quantity, image, category FROM order_items WHERE order_id IN (",
    );
    let mut ids = builder.separated(", ");
    for order in &orders {
        ids.push_bind(order.order_id.to_string());
    }
    builder.push(") ORDER BY id ASC");
    let rows = builder.build_query_as::<OrderItemRow>().fetch_all(conn).await?;
    let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        items.entry(row.order_id).or_default().push(row.item);
    }
    for order in &mut orders {
        order.items = items.remove(&order.order_id).unwrap_or_default();
    }
    Ok(orders)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.to_string());
    }
    if let Some(buyer) = query.buyer_email {
        where_clause.push("buyer_email = ");
        where_clause.push_bind_unseparated(buyer);
    }
    if let Some(seller) = query.seller_email {
        where_clause.push("seller_email = ");
        where_clause.push_bind_unseparated(seller);
    }
    if let Some(tx_id) = query.transaction_id {
        where_clause.push("transaction_id = ");
        where_clause.push_bind_unseparated(tx_id);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, status) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(&mut *conn).await?;
    trace!("🗃️ Result of search_orders: {}", orders.len());
    attach_items(orders, conn).await
}

/// Sets the status of the order to `new_status`, but only if it is currently `expected`. The check and the write are
/// a single statement. A history entry is appended when the update succeeds.
///
/// Returns `None` if the order was not in the expected status (or does not exist).
pub async fn update_order_status(
    order_id: &OrderId,
    expected: OrderStatusType,
    new_status: OrderStatusType,
    occurred_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let updated: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = $2 WHERE order_id = $3 AND status = $4 RETURNING *",
    )
    .bind(new_status)
    .bind(occurred_at)
    .bind(order_id.as_str())
    .bind(expected)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(order) = updated else {
        debug!("🗃️ Order [{order_id}] is no longer {expected}. Status update to {new_status} skipped.");
        return Ok(None);
    };
    insert_status_change(order_id, new_status, occurred_at, conn).await?;
    let mut orders = attach_items(vec![order], conn).await?;
    Ok(orders.pop())
}

/// The status history of the order, oldest first.
pub async fn fetch_status_history(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<StatusChange>, sqlx::Error> {
    sqlx::query_as(
        "SELECT order_id, status, occurred_at FROM order_status_history WHERE order_id = $1 ORDER BY occurred_at, id",
    )
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await
}
