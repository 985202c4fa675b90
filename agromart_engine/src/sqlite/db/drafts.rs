use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::PaymentDraft;

/// Stores a payment draft. Staging a draft with a transaction uuid that already exists replaces the earlier draft.
pub async fn insert_draft(draft: PaymentDraft, conn: &mut SqliteConnection) -> Result<PaymentDraft, sqlx::Error> {
    let draft: PaymentDraft = sqlx::query_as(
        r#"
            INSERT INTO payment_drafts (
                transaction_uuid,
                cart_id,
                buyer_email,
                delivery_address,
                phone_number,
                total_amount,
                product_code,
                lines,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (transaction_uuid) DO UPDATE SET
                cart_id = excluded.cart_id,
                buyer_email = excluded.buyer_email,
                delivery_address = excluded.delivery_address,
                phone_number = excluded.phone_number,
                total_amount = excluded.total_amount,
                product_code = excluded.product_code,
                lines = excluded.lines,
                created_at = excluded.created_at
            RETURNING *;
        "#,
    )
    .bind(draft.transaction_uuid)
    .bind(draft.cart_id)
    .bind(draft.buyer_email)
    .bind(draft.delivery_address)
    .bind(draft.phone_number)
    .bind(draft.total_amount)
    .bind(draft.product_code)
    .bind(draft.lines)
    .bind(draft.created_at)
    .fetch_one(conn)
    .await?;
    debug!(
        "🗃️ Payment draft {} staged for {} ({} lines, {})",
        draft.transaction_uuid,
        draft.buyer_email,
        draft.lines.len(),
        draft.total_amount
    );
    Ok(draft)
}

pub async fn fetch_draft(transaction_uuid: &str, conn: &mut SqliteConnection) -> Result<Option<PaymentDraft>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_drafts WHERE transaction_uuid = $1")
        .bind(transaction_uuid)
        .fetch_optional(conn)
        .await
}

pub async fn delete_draft(transaction_uuid: &str, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM payment_drafts WHERE transaction_uuid = $1").bind(transaction_uuid).execute(conn).await?;
    Ok(result.rows_affected())
}

/// Deletes every draft created before `cutoff`, returning the deleted drafts.
pub async fn delete_drafts_created_before(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentDraft>, sqlx::Error> {
    let drafts: Vec<PaymentDraft> =
        sqlx::query_as("DELETE FROM payment_drafts WHERE created_at < $1 RETURNING *").bind(cutoff).fetch_all(conn).await?;
    if !drafts.is_empty() {
        debug!("🗃️ {} stale payment drafts deleted", drafts.len());
    }
    Ok(drafts)
}
