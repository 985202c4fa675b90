use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{NewTransaction, Transaction};

pub async fn insert_transaction(tx: NewTransaction, conn: &mut SqliteConnection) -> Result<Transaction, sqlx::Error> {
    let transaction: Transaction = sqlx::query_as(
        r#"
            INSERT INTO transactions (
                transaction_id,
                transaction_uuid,
                amount,
                status,
                payment_method,
                buyer_email,
                seller_email,
                order_details,
                needs_review,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(tx.transaction_id)
    .bind(tx.transaction_uuid)
    .bind(tx.amount)
    .bind(tx.status)
    .bind(tx.payment_method)
    .bind(tx.buyer_email)
    .bind(tx.seller_email)
    .bind(tx.order_details)
    .bind(tx.needs_review)
    .bind(tx.date)
    .fetch_one(conn)
    .await?;
    debug!(
        "🗃️ Transaction #{} ({}) recorded for {}. Needs review: {}",
        transaction.id, transaction.transaction_uuid, transaction.buyer_email, transaction.needs_review
    );
    Ok(transaction)
}

pub async fn fetch_transaction(id: i64, conn: &mut SqliteConnection) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_transaction_by_uuid(
    transaction_uuid: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE transaction_uuid = $1")
        .bind(transaction_uuid)
        .fetch_optional(conn)
        .await
}

/// Transactions where `email` is either the buyer or the seller, newest first.
pub async fn fetch_transactions_for_email(
    email: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM transactions WHERE buyer_email = $1 OR seller_email = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(email)
    .fetch_all(conn)
    .await
}

pub async fn delete_transaction(id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected())
}
