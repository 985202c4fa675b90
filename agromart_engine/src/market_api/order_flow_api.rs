use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    db_types::{
        DeliveryInfo,
        Money,
        Order,
        OrderId,
        OrderStatusType,
        OrderStatusType::{Cancelled, Pending},
        PaymentMethod,
    },
    events::{EventProducers, OrderCreatedEvent, OrderStatusChangedEvent},
    order_objects::{CheckoutRequest, OrderQueryFilter, PartialCheckoutFailure, StatusTimeline},
    order_splitter::{build_orders, check_declared_total, grand_total, split_cart},
    status_timeline::derive_timeline,
    traits::{CartError, CartManagement, OrderFlowError, OrderManagement},
};

/// The flat delivery fee charged on every seller order: Rs. 50
pub const DEFAULT_DELIVERY_FEE: Money = Money::from_paisa(5_000);

/// The smallest step between two status changes of one order
pub const MIN_STATUS_GAP_MS: i64 = 1;

/// `OrderFlowApi` turns carts into seller orders and moves orders through their statuses.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    delivery_fee: Money,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi (delivery fee {})", self.delivery_fee)
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, delivery_fee: DEFAULT_DELIVERY_FEE }
    }

    pub fn with_delivery_fee(mut self, fee: Money) -> Self {
        self.delivery_fee = fee;
        self
    }

    pub fn delivery_fee(&self) -> Money {
        self.delivery_fee
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement + CartManagement
{
    /// Checks out a cash-on-delivery cart.
    ///
    /// The cart is split into one order per seller. Each order is stored, and its lines removed from the cart, in its
    /// own database transaction. Stock is not touched here, since the cart lines already reserved it.
    ///
    /// ## Failure modes
    /// * Online payments are rejected. They go through [`crate::PaymentApi::initiate_payment`] instead.
    /// * If the cart cannot be split, or the declared total is off by a paisa or more, nothing is stored.
    /// * If the first seller order fails to store, its error is returned and nothing is stored.
    /// * If a later seller order fails, the orders stored so far stay committed, and
    ///   [`OrderFlowError::PartialCheckout`] reports them together with the lines that are still in the cart.
    pub async fn checkout(&self, buyer_email: &str, request: CheckoutRequest) -> Result<Vec<Order>, OrderFlowError> {
        if request.payment_method == PaymentMethod::Online {
            return Err(OrderFlowError::ValidationError(
                "Online payments must be completed through the payment gateway".to_string(),
            ));
        }
        validate_delivery(&request.delivery)?;
        let cart_id = request.cart_id.as_str();
        let cart = self.db.fetch_cart(cart_id).await?.ok_or_else(|| CartError::CartNotFound(cart_id.to_string()))?;
        if cart.buyer_email != buyer_email {
            return Err(CartError::NotCartOwner(cart_id.to_string()).into());
        }
        let lines = self.db.fetch_cart_lines(cart_id).await?;
        let groups = split_cart(&lines, self.delivery_fee)?;
        check_declared_total(request.declared_total, grand_total(&groups))?;
        let new_orders =
            build_orders(&groups, buyer_email, &request.delivery, request.payment_method, None, Utc::now());

        let mut committed = Vec::with_capacity(new_orders.len());
        for (i, order) in new_orders.into_iter().enumerate() {
            let order_id = order.order_id.clone();
            match self.db.insert_order(order, cart_id).await {
                Ok(order) => {
                    debug!("🔄️📦️ Order [{order_id}] committed for seller {}", order.seller_email);
                    committed.push(order);
                },
                Err(e) if committed.is_empty() => {
                    warn!("🔄️📦️ Checkout of cart {cart_id} failed on its first order. {e}");
                    return Err(e);
                },
                Err(e) => {
                    let remaining = &groups[i..];
                    warn!(
                        "🔄️📦️ Checkout of cart {cart_id} stopped after {} of {} orders. {e}",
                        committed.len(),
                        groups.len()
                    );
                    self.notify_created(&committed).await;
                    return Err(OrderFlowError::PartialCheckout(PartialCheckoutFailure {
                        orders: committed,
                        failed_sellers: remaining.iter().map(|g| g.seller_email.clone()).collect(),
                        failed_lines: remaining.iter().flat_map(|g| g.lines.clone()).collect(),
                        reason: e.to_string(),
                    }));
                },
            }
        }
        info!("🔄️📦️ Cart {cart_id} checked out by {buyer_email} as {} orders", committed.len());
        self.notify_created(&committed).await;
        Ok(committed)
    }

    async fn notify_created(&self, orders: &[Order]) {
        for order in orders {
            self.producers.order_created(OrderCreatedEvent::new(order.clone())).await;
        }
    }

    pub async fn order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order_by_order_id(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))
    }

    pub async fn orders_for_buyer(&self, buyer_email: &str) -> Result<Vec<Order>, OrderFlowError> {
        self.db.search_orders(OrderQueryFilter::default().with_buyer_email(buyer_email)).await
    }

    pub async fn orders_for_seller(&self, seller_email: &str) -> Result<Vec<Order>, OrderFlowError> {
        self.db.search_orders(OrderQueryFilter::default().with_seller_email(seller_email)).await
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        self.db.search_orders(query).await
    }

    /// Moves an order to a new status on behalf of its seller.
    ///
    /// Orders only move forward, and the seller may skip statuses. The results are summarised in this table:
    ///
    /// | From \ To  | Pending | Processing | Shipping | Delivered | Cancelled |
    /// |------------|---------|------------|----------|-----------|-----------|
    /// | Pending    | Err     | Ok         | Ok       | Ok        | Err (1)   |
    /// | Processing | Err     | Err        | Ok       | Ok        | Err       |
    /// | Shipping   | Err     | Err        | Err      | Ok        | Err       |
    /// | Delivered  | Err     | Err        | Err      | Err       | Err       |
    /// | Cancelled  | Err     | Err        | Err      | Err       | Err       |
    ///
    /// (1) Only the buyer can cancel, using [`Self::cancel_order`].
    ///
    /// A disallowed move fails with [`OrderFlowError::IllegalTransition`]. `occurred_at` defaults to now. A supplied
    /// time must be at least [`MIN_STATUS_GAP_MS`] after the order's last change, so the timeline only moves forward.
    /// The update is a compare-and-swap on the status that was validated, so if another request changes the order
    /// first, this one fails with `IllegalTransition` from the new status.
    pub async fn update_status(
        &self,
        seller_email: &str,
        order_id: &OrderId,
        new_status: OrderStatusType,
        occurred_at: Option<DateTime<Utc>>,
    ) -> Result<Order, OrderFlowError> {
        let order = self.order(order_id).await?;
        if order.seller_email != seller_email {
            warn!("🔄️🚚️ {seller_email} tried to update order [{order_id}], which belongs to {}", order.seller_email);
            return Err(OrderFlowError::NotOrderSeller(order_id.clone()));
        }
        let old_status = order.status;
        if new_status == Cancelled || !old_status.can_transition_to(new_status) {
            return Err(OrderFlowError::IllegalTransition { from: old_status, to: new_status });
        }
        let earliest = order.updated_at + Duration::milliseconds(MIN_STATUS_GAP_MS);
        let occurred_at = match occurred_at {
            Some(at) if at < earliest => {
                return Err(OrderFlowError::ValidationError(format!(
                    "The status change time {at} must be after the order's last change at {}",
                    order.updated_at
                )));
            },
            Some(at) => at,
            None => Utc::now().max(earliest),
        };
        let updated = self.db.update_order_status(order_id, old_status, new_status, occurred_at).await?;
        let Some(updated) = updated else {
            let current = self.order(order_id).await?.status;
            debug!("🔄️🚚️ Order [{order_id}] changed to {current} while {new_status} was being applied");
            return Err(OrderFlowError::IllegalTransition { from: current, to: new_status });
        };
        info!("🔄️🚚️ Order [{order_id}] moved from {old_status} to {new_status}");
        self.producers.status_changed(OrderStatusChangedEvent::new(old_status, updated.clone())).await;
        Ok(updated)
    }

    /// Cancels a pending order on behalf of its buyer. The order is kept with status `Cancelled`, and every item is
    /// returned to stock in the same database transaction.
    pub async fn cancel_order(&self, buyer_email: &str, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let order = self.order(order_id).await?;
        if order.buyer_email != buyer_email {
            warn!("🔄️❌️ {buyer_email} tried to cancel order [{order_id}], which belongs to {}", order.buyer_email);
            return Err(OrderFlowError::NotOrderBuyer(order_id.clone()));
        }
        if order.status != Pending {
            return Err(OrderFlowError::IllegalTransition { from: order.status, to: Cancelled });
        }
        let cancelled_at = Utc::now().max(order.updated_at + Duration::milliseconds(MIN_STATUS_GAP_MS));
        let Some(cancelled) = self.db.cancel_order(order_id, cancelled_at).await? else {
            let current = self.order(order_id).await?.status;
            return Err(OrderFlowError::IllegalTransition { from: current, to: Cancelled });
        };
        info!("🔄️❌️ Order [{order_id}] cancelled by {buyer_email}");
        self.producers.status_changed(OrderStatusChangedEvent::new(Pending, cancelled.clone())).await;
        Ok(cancelled)
    }

    /// The per-status timestamps of the order. Only the order's buyer or seller may see them.
    pub async fn status_timeline(&self, email: &str, order_id: &OrderId) -> Result<StatusTimeline, OrderFlowError> {
        let order = self.order(order_id).await?;
        if order.buyer_email != email && order.seller_email != email {
            return Err(OrderFlowError::NotOrderBuyer(order_id.clone()));
        }
        let history = self.db.fetch_status_history(order_id).await?;
        Ok(derive_timeline(&order, &history))
    }
}

pub(crate) fn validate_delivery(delivery: &DeliveryInfo) -> Result<(), OrderFlowError> {
    if delivery.delivery_address.trim().is_empty() {
        return Err(OrderFlowError::ValidationError("A delivery address is required".to_string()));
    }
    if delivery.phone_number.trim().is_empty() {
        return Err(OrderFlowError::ValidationError("A phone number is required".to_string()));
    }
    Ok(())
}
