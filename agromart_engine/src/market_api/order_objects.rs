use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{CartLine, DeliveryInfo, Money, Order, OrderId, OrderStatusType, PaymentMethod},
    traits::OrderFlowError,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub buyer_email: Option<String>,
    pub seller_email: Option<String>,
    pub transaction_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
}

impl OrderQueryFilter {
    pub fn since<T>(mut self, since: T) -> Result<Self, OrderFlowError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = since.try_into().map_err(|e| OrderFlowError::ValidationError(e.to_string()))?;
        self.since = Some(dt);
        Ok(self)
    }

    pub fn until<T>(mut self, until: T) -> Result<Self, OrderFlowError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = until.try_into().map_err(|e| OrderFlowError::ValidationError(e.to_string()))?;
        self.until = Some(dt);
        Ok(self)
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_buyer_email<S: Into<String>>(mut self, email: S) -> Self {
        self.buyer_email = Some(email.into());
        self
    }

    pub fn with_seller_email<S: Into<String>>(mut self, email: S) -> Self {
        self.seller_email = Some(email.into());
        self
    }

    pub fn with_transaction_id<S: Into<String>>(mut self, transaction_id: S) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.buyer_email.is_none() &&
            self.seller_email.is_none() &&
            self.transaction_id.is_none() &&
            self.status.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(order_id) = &self.order_id {
            write!(f, "order_id: {order_id}. ")?;
        }
        if let Some(buyer) = &self.buyer_email {
            write!(f, "buyer: {buyer}. ")?;
        }
        if let Some(seller) = &self.seller_email {
            write!(f, "seller: {seller}. ")?;
        }
        if let Some(tx_id) = &self.transaction_id {
            write!(f, "transaction_id: {tx_id}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}

/// A buyer's request to turn their cart into orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub cart_id: String,
    #[serde(flatten)]
    pub delivery: DeliveryInfo,
    pub payment_method: PaymentMethod,
    /// The total the client displayed to the buyer, in rupees. If given, it must agree with the server's total to
    /// within one paisa.
    #[serde(default)]
    pub declared_total: Option<f64>,
}

/// Returned when some seller groups of a checkout were committed and a later group failed.
///
/// The committed orders stay committed. Their lines have left the cart; `failed_lines` are still in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialCheckoutFailure {
    pub orders: Vec<Order>,
    pub failed_sellers: Vec<String>,
    pub failed_lines: Vec<CartLine>,
    pub reason: String,
}

/// When an order entered one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTimestamp {
    pub status: OrderStatusType,
    pub at: DateTime<Utc>,
    /// True if the order skipped this status and the time was filled in for display.
    pub synthetic: bool,
}

/// The per-status timestamps of an order, in progression order. Only statuses the order has reached are included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTimeline {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub timestamps: Vec<StatusTimestamp>,
}

impl StatusTimeline {
    pub fn timestamp_for(&self, status: OrderStatusType) -> Option<&StatusTimestamp> {
        self.timestamps.iter().find(|t| t.status == status)
    }
}

/// A buyer's cart with its lines, as shown to the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub cart_id: String,
    pub buyer_email: String,
    pub lines: Vec<CartLine>,
    /// The sum of the line totals, before delivery fees
    pub subtotal: Money,
}

impl CartView {
    pub fn new(cart_id: String, buyer_email: String, lines: Vec<CartLine>) -> Self {
        let subtotal = lines.iter().map(CartLine::line_total).sum();
        Self { cart_id, buyer_email, lines, subtotal }
    }
}
