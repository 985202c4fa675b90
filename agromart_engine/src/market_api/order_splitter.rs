//! Partitions a multi-seller cart into one order per seller.
//!
//! The functions here are pure. They do not touch storage or stock; the cart lines already hold the stock they need.
use chrono::{DateTime, Utc};
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::{
    db_types::{CartLine, DeliveryInfo, ListingKind, Money, NewOrder, OrderId, OrderItem, PaymentMethod},
    traits::OrderFlowError,
};

/// The cart lines belonging to one seller, with the amounts for the order they will become.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerGroup {
    pub seller_email: String,
    pub order_type: ListingKind,
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
}

impl SellerGroup {
    fn new(first: CartLine, delivery_fee: Money) -> Self {
        Self {
            seller_email: first.seller_email.clone(),
            order_type: first.kind,
            lines: vec![first],
            subtotal: Money::default(),
            delivery_fee,
            total_amount: Money::default(),
        }
    }

    fn finalize(mut self) -> Self {
        self.subtotal = self.lines.iter().map(CartLine::line_total).sum();
        self.total_amount = self.subtotal + self.delivery_fee;
        self
    }

    pub fn listing_ids(&self) -> Vec<i64> {
        self.lines.iter().map(|l| l.listing_id).collect()
    }
}

/// Groups the cart lines by seller, in order of each seller's first appearance in the cart. Lines keep their cart
/// order inside a group. Every group is charged the flat `delivery_fee`.
///
/// Fails without producing any group if the cart is empty, if a line has a non-positive price or quantity, or if a
/// line has no seller.
pub fn split_cart(lines: &[CartLine], delivery_fee: Money) -> Result<Vec<SellerGroup>, OrderFlowError> {
    if lines.is_empty() {
        return Err(OrderFlowError::EmptyCart);
    }
    let mut groups: Vec<SellerGroup> = Vec::new();
    for line in lines {
        if !line.unit_price.is_positive() {
            return Err(OrderFlowError::ValidationError(format!(
                "Listing {} has an invalid price of {}",
                line.listing_id, line.unit_price
            )));
        }
        if line.cart_quantity <= 0 {
            return Err(OrderFlowError::ValidationError(format!(
                "Listing {} has an invalid quantity of {}",
                line.listing_id, line.cart_quantity
            )));
        }
        if line.seller_email.trim().is_empty() {
            return Err(OrderFlowError::MissingSellerInfo(line.listing_id));
        }
        match groups.iter_mut().find(|g| g.seller_email == line.seller_email) {
            Some(group) => group.lines.push(line.clone()),
            None => groups.push(SellerGroup::new(line.clone(), delivery_fee)),
        }
    }
    let groups = groups.into_iter().map(SellerGroup::finalize).collect::<Vec<_>>();
    trace!("🔄️🛒️ Cart of {} lines split into {} seller groups", lines.len(), groups.len());
    Ok(groups)
}

/// The grand total the buyer pays across all seller groups
pub fn grand_total(groups: &[SellerGroup]) -> Money {
    groups.iter().map(|g| g.total_amount).sum()
}

/// Accepts a client-declared total only if it is within one paisa of the server's total.
pub fn check_declared_total(declared: Option<f64>, computed: Money) -> Result<(), OrderFlowError> {
    match declared {
        None => Ok(()),
        Some(d) if computed.drift_from(d) < 1.0 => Ok(()),
        Some(d) => {
            warn!("🔄️🛒️ Declared total {d} does not match the computed total of {computed}");
            Err(OrderFlowError::TotalMismatch { declared: format!("{d:.2}"), computed })
        },
    }
}

/// A random tag shared by the orders of one checkout, so that checkouts started in the same millisecond get distinct
/// order ids.
pub fn new_checkout_tag() -> String {
    thread_rng().sample_iter(&Alphanumeric).take(6).map(char::from).collect::<String>().to_ascii_uppercase()
}

/// `ORDER-{epoch millis}-{checkout tag}-{1-based group index}`
pub fn order_id_for_group(created_at: DateTime<Utc>, checkout_tag: &str, group_index: usize) -> OrderId {
    OrderId(format!("ORDER-{}-{checkout_tag}-{}", created_at.timestamp_millis(), group_index + 1))
}

/// Turns the seller groups into orders ready to be stored. All orders of one checkout share `created_at` and the
/// checkout tag in their ids.
pub fn build_orders(
    groups: &[SellerGroup],
    buyer_email: &str,
    delivery: &DeliveryInfo,
    payment_method: PaymentMethod,
    transaction_id: Option<&str>,
    created_at: DateTime<Utc>,
) -> Vec<NewOrder> {
    let tag = new_checkout_tag();
    groups
        .iter()
        .enumerate()
        .map(|(i, group)| NewOrder {
            order_id: order_id_for_group(created_at, &tag, i),
            items: group.lines.iter().map(OrderItem::from).collect(),
            subtotal: group.subtotal,
            delivery_fee: group.delivery_fee,
            total_amount: group.total_amount,
            buyer_email: buyer_email.to_string(),
            seller_email: group.seller_email.clone(),
            order_type: group.order_type,
            delivery: delivery.clone(),
            payment_method,
            transaction_id: transaction_id.map(String::from),
            created_at,
        })
        .collect()
}
