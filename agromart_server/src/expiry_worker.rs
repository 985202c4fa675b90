use agromart_engine::{db_types::PaymentDraft, InventoryApi, PaymentApi, SqliteDatabase};
use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;

/// How often the worker looks for stale payment drafts
pub const DRAFT_PURGE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(600);

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// A draft is created when a buyer starts an online payment and is removed when the payment settles. Drafts for
/// payments that were abandoned at the gateway are deleted once they are older than `ttl`. The cart they were taken
/// from is not touched, so its lines keep their stock reservations until the buyer edits the cart.
///
/// Stock idempotency keys older than `ttl` are forgotten on the same schedule.
pub fn start_expiry_worker(
    payments: PaymentApi<SqliteDatabase>,
    inventory: InventoryApi<SqliteDatabase>,
    ttl: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(DRAFT_PURGE_INTERVAL);
        info!("🕰️ Expiry worker started. Drafts and idempotency keys expire after {} hrs", ttl.num_hours());
        loop {
            timer.tick().await;
            trace!("🕰️ Running expiry jobs");
            match inventory.purge_idempotency_keys(ttl).await {
                Ok(0) => trace!("🕰️ No expired idempotency keys"),
                Ok(n) => debug!("🕰️ {n} expired idempotency keys purged"),
                Err(e) => error!("🕰️ Error purging idempotency keys: {e}"),
            }
            match payments.purge_stale_drafts(ttl).await {
                Ok(drafts) if drafts.is_empty() => trace!("🕰️ No stale payment drafts"),
                Ok(drafts) => {
                    info!("🕰️ {} stale payment drafts purged", drafts.len());
                    debug!("🕰️ Purged drafts: {}", draft_list(&drafts));
                },
                Err(e) => {
                    error!("🕰️ Error running payment draft expiry job: {e}");
                },
            }
        }
    })
}

fn draft_list(drafts: &[PaymentDraft]) -> String {
    drafts
        .iter()
        .map(|d| format!("[{}] cart {} of {}", d.transaction_uuid, d.cart_id, d.buyer_email))
        .collect::<Vec<String>>()
        .join(", ")
}
