use std::{collections::HashMap, fmt::Debug};

use chrono::{Duration, Utc};
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sqlx::types::Json;

use crate::{
    db_types::{Money, NewTransaction, PaymentDraft, PaymentMethod, Transaction, TransactionStatus},
    events::{EventProducers, OrderCreatedEvent, PaymentReconciledEvent},
    helpers::{sign_message, signing_message, GatewayCallback, DEFAULT_SIGNED_FIELDS},
    market_api::order_flow_api::{validate_delivery, DEFAULT_DELIVERY_FEE},
    order_splitter::{build_orders, check_declared_total, grand_total, split_cart},
    payment_objects::{GatewayConfig, PaymentInitiation, ReconciliationResult, SignedPaymentRequest},
    traits::{CartError, CartManagement, PaymentError, PaymentManagement},
};

/// Generates a transaction uuid of the form `agromart-{epoch millis}-{random}`
pub fn new_transaction_uuid() -> String {
    let suffix: String = thread_rng().sample_iter(&Alphanumeric).take(6).map(char::from).collect();
    format!("agromart-{}-{suffix}", Utc::now().timestamp_millis())
}

/// `PaymentApi` handles the round trip through the payment gateway.
///
/// 1. [`Self::initiate_payment`] snapshots the buyer's cart into a payment draft and returns the signed form that the
///    buyer's browser posts to the gateway.
/// 2. The gateway redirects the buyer back to the success or failure URL.
/// 3. [`Self::reconcile`] verifies the success callback and turns the draft into orders and one transaction.
pub struct PaymentApi<B> {
    db: B,
    producers: EventProducers,
    config: GatewayConfig,
    delivery_fee: Money,
}

impl<B> Debug for PaymentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi ({})", self.config.product_code)
    }
}

impl<B> PaymentApi<B> {
    pub fn new(db: B, producers: EventProducers, config: GatewayConfig) -> Self {
        Self { db, producers, config, delivery_fee: DEFAULT_DELIVERY_FEE }
    }

    pub fn with_delivery_fee(mut self, fee: Money) -> Self {
        self.delivery_fee = fee;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn secret(&self) -> &str {
        self.config.secret.reveal().as_str()
    }
}

impl<B> PaymentApi<B>
where B: PaymentManagement + CartManagement
{
    /// Stages the buyer's cart for online payment and returns the signed gateway request.
    ///
    /// The cart is left untouched: its lines keep their stock reservations until the payment is reconciled.
    pub async fn initiate_payment(
        &self,
        buyer_email: &str,
        request: PaymentInitiation,
    ) -> Result<SignedPaymentRequest, PaymentError> {
        validate_delivery(&request.delivery)?;
        let cart_id = request.cart_id.as_str();
        let cart = self.db.fetch_cart(cart_id).await?.ok_or_else(|| CartError::CartNotFound(cart_id.to_string()))?;
        if cart.buyer_email != buyer_email {
            return Err(CartError::NotCartOwner(cart_id.to_string()).into());
        }
        let lines = self.db.fetch_cart_lines(cart_id).await?;
        let groups = split_cart(&lines, self.delivery_fee)?;
        let total = grand_total(&groups);
        check_declared_total(request.declared_total, total)?;

        let transaction_uuid = new_transaction_uuid();
        let draft = PaymentDraft {
            transaction_uuid: transaction_uuid.clone(),
            cart_id: cart_id.to_string(),
            buyer_email: buyer_email.to_string(),
            delivery_address: request.delivery.delivery_address,
            phone_number: request.delivery.phone_number,
            total_amount: total,
            product_code: self.config.product_code.clone(),
            lines: Json(lines),
            created_at: Utc::now(),
        };
        let draft = self.db.stage_payment_draft(draft).await?;
        let fields = HashMap::from([
            ("total_amount".to_string(), total.to_decimal_string()),
            ("transaction_uuid".to_string(), transaction_uuid.clone()),
            ("product_code".to_string(), draft.product_code.clone()),
        ]);
        let message = signing_message(DEFAULT_SIGNED_FIELDS, &fields)
            .map_err(|e| PaymentError::ConfigurationError(e.to_string()))?;
        let signature =
            sign_message(self.secret(), &message).map_err(|e| PaymentError::ConfigurationError(e.to_string()))?;
        info!("🔄️💳️ Payment {transaction_uuid} of {total} initiated by {buyer_email} for cart {cart_id}");
        Ok(SignedPaymentRequest::new(total, transaction_uuid, &self.config, signature))
    }

    /// Processes the gateway's success callback.
    ///
    /// * If a transaction already exists for the callback's transaction uuid, it is returned unchanged.
    /// * If a draft is staged for the uuid, the callback must be signed over the draft's uuid and product code, and
    ///   its amount must equal the draft's total. The draft's lines are then split into online orders, and the orders,
    ///   a single completed transaction, and the removal of the draft are committed together.
    /// * If the cart no longer holds the draft's lines at their staged quantities (the buyer edited it, or checked it
    ///   out another way), no orders are created. The payment is recorded as a transaction that needs review.
    /// * If there is no draft, the payment is recorded for manual review, but only if the callback's signature
    ///   verifies against its own values.
    ///
    /// Any signature problem fails with [`PaymentError::SignatureMismatch`] and nothing is written.
    pub async fn reconcile(
        &self,
        buyer_email: &str,
        params: &HashMap<String, String>,
    ) -> Result<ReconciliationResult, PaymentError> {
        let callback = GatewayCallback::from_query(params).map_err(|e| PaymentError::InvalidCallback(e.to_string()))?;
        let uuid = callback.transaction_uuid.clone();
        trace!("🔄️💳️ Reconciling payment {uuid} for {buyer_email}");
        match self.db.fetch_payment_draft(&uuid).await? {
            Some(draft) => self.settle_draft(buyer_email, &callback, draft).await,
            None => self.settle_without_draft(buyer_email, &callback).await,
        }
    }

    async fn settle_draft(
        &self,
        buyer_email: &str,
        callback: &GatewayCallback,
        draft: PaymentDraft,
    ) -> Result<ReconciliationResult, PaymentError> {
        let uuid = draft.transaction_uuid.as_str();
        if draft.buyer_email != buyer_email {
            warn!("🔄️💳️ {buyer_email} sent a callback for payment {uuid}, which belongs to {}", draft.buyer_email);
            return Err(PaymentError::NotDraftOwner(uuid.to_string()));
        }
        if !callback.is_complete() {
            return Err(PaymentError::PaymentNotCompleted(callback.status.clone().unwrap_or_default()));
        }
        let paid = Money::parse_decimal(&callback.total_amount);
        if paid.as_ref().ok() != Some(&draft.total_amount) {
            warn!(
                "🔐️ Payment {uuid} reports an amount of {} but {} was staged. Treating it as a signature failure.",
                callback.total_amount, draft.total_amount
            );
            return Err(PaymentError::SignatureMismatch);
        }
        let overrides = [("transaction_uuid", uuid), ("product_code", draft.product_code.as_str())];
        if !callback.verify(self.secret(), &overrides) {
            warn!("🔐️ Payment {uuid} failed signature verification. Nothing was recorded.");
            return Err(PaymentError::SignatureMismatch);
        }
        let reference = gateway_reference(callback)?;

        let lines = draft.lines.0.clone();
        let groups = split_cart(&lines, self.delivery_fee)?;
        let now = Utc::now();
        let orders =
            build_orders(&groups, buyer_email, &draft.delivery(), PaymentMethod::Online, Some(reference.as_str()), now);
        let order_details = orders.iter().map(|o| o.order_id.to_string()).collect::<Vec<String>>().join(",");
        let transaction = NewTransaction {
            transaction_id: reference,
            transaction_uuid: uuid.to_string(),
            amount: draft.total_amount,
            status: TransactionStatus::Completed,
            payment_method: PaymentMethod::Online,
            buyer_email: buyer_email.to_string(),
            seller_email: orders.first().map(|o| o.seller_email.clone()),
            order_details: Some(order_details),
            needs_review: false,
            date: now,
        };
        let settled = self.db.settle_payment(&draft, orders, transaction).await?;
        if settled.replayed {
            debug!("🔄️💳️ Payment {uuid} had already been reconciled");
        } else if settled.transaction.needs_review {
            warn!(
                "🔄️💳️ Cart {} changed while payment {uuid} was at the gateway. Transaction #{} needs review.",
                draft.cart_id, settled.transaction.id
            );
            let event = PaymentReconciledEvent::new(settled.transaction.clone(), vec![]);
            self.producers.payment_reconciled(event).await;
        } else {
            info!(
                "🔄️💳️ Payment {uuid} reconciled as transaction #{} with {} orders",
                settled.transaction.id,
                settled.orders.len()
            );
            for order in &settled.orders {
                self.producers.order_created(OrderCreatedEvent::new(order.clone())).await;
            }
            let event = PaymentReconciledEvent::new(settled.transaction.clone(), settled.orders.clone());
            self.producers.payment_reconciled(event).await;
        }
        Ok(ReconciliationResult { transaction: settled.transaction, orders: settled.orders, replayed: settled.replayed })
    }

    async fn settle_without_draft(
        &self,
        buyer_email: &str,
        callback: &GatewayCallback,
    ) -> Result<ReconciliationResult, PaymentError> {
        let uuid = callback.transaction_uuid.as_str();
        if let Some(existing) = self.db.fetch_transaction_by_uuid(uuid).await? {
            if existing.buyer_email != buyer_email {
                return Err(PaymentError::NotTransactionOwner(existing.id));
            }
            debug!("🔄️💳️ Payment {uuid} was reconciled before. Returning transaction #{}", existing.id);
            return Ok(ReconciliationResult { transaction: existing, orders: vec![], replayed: true });
        }
        if !callback.is_complete() {
            return Err(PaymentError::PaymentNotCompleted(callback.status.clone().unwrap_or_default()));
        }
        if !callback.verify(self.secret(), &[]) {
            warn!("🔐️ Payment {uuid} has no staged order and its signature does not verify. Nothing was recorded.");
            return Err(PaymentError::SignatureMismatch);
        }
        let amount = Money::parse_decimal(&callback.total_amount)
            .map_err(|e| PaymentError::InvalidCallback(e.to_string()))?;
        let transaction = NewTransaction {
            transaction_id: gateway_reference(callback)?,
            transaction_uuid: uuid.to_string(),
            amount,
            status: TransactionStatus::Completed,
            payment_method: PaymentMethod::Online,
            buyer_email: buyer_email.to_string(),
            seller_email: None,
            order_details: None,
            needs_review: true,
            date: Utc::now(),
        };
        let recorded = self.db.record_unmatched_payment(transaction).await?;
        if !recorded.replayed {
            warn!(
                "🔄️💳️ Payment {uuid} of {amount} from {buyer_email} has no staged order. Transaction #{} needs review.",
                recorded.transaction.id
            );
            let event = PaymentReconciledEvent::new(recorded.transaction.clone(), vec![]);
            self.producers.payment_reconciled(event).await;
        }
        Ok(ReconciliationResult { transaction: recorded.transaction, orders: vec![], replayed: recorded.replayed })
    }

    /// Handles the gateway's failure redirect. Nothing is recorded and the draft is kept, so that the buyer can try
    /// again. Returns the transaction uuid of the failed attempt, if the callback carried one.
    pub async fn payment_failed(&self, buyer_email: &str, params: &HashMap<String, String>) -> Option<String> {
        let uuid = params
            .get("transaction_uuid")
            .cloned()
            .or_else(|| GatewayCallback::from_query(params).ok().map(|c| c.transaction_uuid));
        match &uuid {
            Some(uuid) => info!("🔄️💳️ Payment {uuid} by {buyer_email} failed or was abandoned. The draft is kept."),
            None => info!("🔄️💳️ A payment by {buyer_email} failed or was abandoned"),
        }
        uuid
    }

    pub async fn transactions_for_email(&self, email: &str) -> Result<Vec<Transaction>, PaymentError> {
        self.db.fetch_transactions_for_email(email).await
    }

    /// Deletes a transaction from the buyer's history. The orders it paid for are not affected.
    pub async fn delete_transaction(&self, buyer_email: &str, id: i64) -> Result<(), PaymentError> {
        let tx = self.db.fetch_transaction(id).await?.ok_or(PaymentError::TransactionNotFound(id))?;
        if tx.buyer_email != buyer_email {
            warn!("🔄️💳️ {buyer_email} tried to delete transaction #{id}, which belongs to {}", tx.buyer_email);
            return Err(PaymentError::NotTransactionOwner(id));
        }
        self.db.delete_transaction(id).await?;
        info!("🔄️💳️ Transaction #{id} deleted by {buyer_email}");
        Ok(())
    }

    /// Deletes payment drafts older than `ttl`.
    pub async fn purge_stale_drafts(&self, ttl: Duration) -> Result<Vec<PaymentDraft>, PaymentError> {
        let cutoff = Utc::now() - ttl;
        self.db.purge_stale_drafts(cutoff).await
    }
}

fn gateway_reference(callback: &GatewayCallback) -> Result<String, PaymentError> {
    callback
        .reference
        .clone()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| PaymentError::InvalidCallback("The callback carries no gateway reference".to_string()))
}
