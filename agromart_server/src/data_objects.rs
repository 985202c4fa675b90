use std::fmt::Display;

use agromart_common::Money;
use agromart_engine::{
    db_types::{Category, ListingKind, NewListing, OrderStatusType, StockAdjustment, StockDirection, Unit},
    order_objects::OrderQueryFilter,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// A seller's request to list an item. The seller is always the caller, and the price is in rupees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListingRequest {
    pub name: String,
    pub price: f64,
    pub category: Category,
    pub quantity: i64,
    pub unit: Unit,
    #[serde(default)]
    pub description: String,
    pub image: String,
}

impl NewListingRequest {
    pub fn into_listing(self, kind: ListingKind, seller_email: &str) -> Result<NewListing, ServerError> {
        let price = Money::from_decimal(self.price).map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
        Ok(NewListing {
            kind,
            name: self.name,
            price,
            category: self.category,
            quantity: self.quantity,
            unit: self.unit,
            description: self.description,
            image: self.image,
            seller_email: seller_email.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockChangeRequest {
    pub delta: i64,
    pub direction: StockDirection,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl StockChangeRequest {
    pub fn into_adjustment(self, listing_id: i64, seller_email: &str) -> StockAdjustment {
        let adjustment = match self.direction {
            StockDirection::Increase => StockAdjustment::increase(listing_id, self.delta),
            StockDirection::Decrease => StockAdjustment::decrease(listing_id, self.delta),
        }
        .with_expected_seller(seller_email);
        match self.idempotency_key {
            Some(key) => adjustment.with_idempotency_key(key),
            None => adjustment,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub listing_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartQuantityRequest {
    pub quantity: i64,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyParams {
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
    /// When the change happened. Defaults to now.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Query parameters for the order search. Only a single status can be given in a query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSearchParams {
    pub buyer_email: Option<String>,
    pub seller_email: Option<String>,
    pub transaction_id: Option<String>,
    pub status: Option<OrderStatusType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl From<OrderSearchParams> for OrderQueryFilter {
    fn from(params: OrderSearchParams) -> Self {
        let mut filter = OrderQueryFilter {
            buyer_email: params.buyer_email,
            seller_email: params.seller_email,
            transaction_id: params.transaction_id,
            since: params.since,
            until: params.until,
            ..Default::default()
        };
        if let Some(status) = params.status {
            filter = filter.with_status(status);
        }
        filter
    }
}
