//! Data types that are stored in, or returned from, the engine's database backends.
//!
//! Enum values are persisted as TEXT. The text form of every enum is its `Display` representation, and
//! `FromStr`/`From<String>` round-trip it.
use std::{fmt::Display, str::FromStr};

pub use agromart_common::Money;
use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------     ListingKind     ---------------------------------------------------------
/// The two kinds of listing on the marketplace. Farm products are sold by farmers, agricultural inputs by suppliers.
/// Both are structurally identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Product,
    #[serde(alias = "agri-input", alias = "agriInput")]
    AgriInput,
}

impl ListingKind {
    pub fn categories(&self) -> &'static [Category] {
        match self {
            ListingKind::Product => &[Category::Fruits, Category::Vegetables],
            ListingKind::AgriInput => &[Category::Seeds, Category::Fertilizers, Category::Tools],
        }
    }

    pub fn units(&self) -> &'static [Unit] {
        match self {
            ListingKind::Product => &[Unit::Kg, Unit::Dozen, Unit::Piece],
            ListingKind::AgriInput => &[Unit::Packet, Unit::Bag, Unit::Piece, Unit::Kg],
        }
    }
}

impl Display for ListingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingKind::Product => write!(f, "product"),
            ListingKind::AgriInput => write!(f, "agriinput"),
        }
    }
}

impl FromStr for ListingKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "product" | "products" => Ok(Self::Product),
            "agriinput" | "agri-input" | "agri-inputs" | "agriinputs" => Ok(Self::AgriInput),
            _ => Err(ConversionError(format!("Invalid listing kind: {s}"))),
        }
    }
}

//--------------------------------------       Category      ---------------------------------------------------------
/// Listing categories. Declaration order is the display order used by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Fruits,
    Vegetables,
    Seeds,
    Fertilizers,
    Tools,
}

impl Category {
    pub fn kind(&self) -> ListingKind {
        match self {
            Category::Fruits | Category::Vegetables => ListingKind::Product,
            Category::Seeds | Category::Fertilizers | Category::Tools => ListingKind::AgriInput,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Fruits => "fruits",
            Category::Vegetables => "vegetables",
            Category::Seeds => "seeds",
            Category::Fertilizers => "fertilizers",
            Category::Tools => "tools",
        };
        f.write_str(s)
    }
}

impl FromStr for Category {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fruits" => Ok(Self::Fruits),
            "vegetables" => Ok(Self::Vegetables),
            "seeds" => Ok(Self::Seeds),
            "fertilizers" => Ok(Self::Fertilizers),
            "tools" => Ok(Self::Tools),
            _ => Err(ConversionError(format!("Invalid category: {s}"))),
        }
    }
}

//--------------------------------------         Unit        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum Unit {
    #[sqlx(rename = "KG")]
    #[serde(rename = "KG")]
    Kg,
    Dozen,
    Piece,
    Packet,
    Bag,
}

impl Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Unit::Kg => "KG",
            Unit::Dozen => "Dozen",
            Unit::Piece => "Piece",
            Unit::Packet => "Packet",
            Unit::Bag => "Bag",
        };
        f.write_str(s)
    }
}

impl FromStr for Unit {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KG" | "kg" => Ok(Self::Kg),
            "Dozen" => Ok(Self::Dozen),
            "Piece" => Ok(Self::Piece),
            "Packet" => Ok(Self::Packet),
            "Bag" => Ok(Self::Bag),
            _ => Err(ConversionError(format!("Invalid unit: {s}"))),
        }
    }
}

//--------------------------------------       Listing       ---------------------------------------------------------
pub const MAX_DESCRIPTION_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: i64,
    pub kind: ListingKind,
    pub name: String,
    pub price: Money,
    pub category: Category,
    pub quantity: i64,
    pub unit: Unit,
    pub description: String,
    pub image: String,
    pub seller_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub kind: ListingKind,
    pub name: String,
    pub price: Money,
    pub category: Category,
    pub quantity: i64,
    pub unit: Unit,
    #[serde(default)]
    pub description: String,
    pub image: String,
    pub seller_email: String,
}

impl NewListing {
    /// Checks the field-level rules for a new listing. The error string is suitable for showing to the seller.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("A listing needs a name".to_string());
        }
        if !self.price.is_positive() {
            return Err("Price must be greater than 0".to_string());
        }
        if self.quantity <= 0 {
            return Err("Quantity must be greater than 0".to_string());
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(format!("Description must be {MAX_DESCRIPTION_LENGTH} characters or less"));
        }
        if self.image.trim().is_empty() {
            return Err("An image is required".to_string());
        }
        if self.seller_email.trim().is_empty() {
            return Err("The seller email is required".to_string());
        }
        if self.category.kind() != self.kind {
            return Err(format!("{} is not a valid category for a {} listing", self.category, self.kind));
        }
        if !self.kind.units().contains(&self.unit) {
            return Err(format!("{} is not a valid unit for a {} listing", self.unit, self.kind));
        }
        Ok(())
    }
}

//--------------------------------------  Stock adjustments  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    Increase,
    Decrease,
}

impl Display for StockDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockDirection::Increase => write!(f, "increase"),
            StockDirection::Decrease => write!(f, "decrease"),
        }
    }
}

/// A single signed change to a listing's stock counter.
///
/// `delta` is always positive; the sign comes from `direction`. If `idempotency_key` is supplied, a second adjustment
/// carrying the same key is not applied again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub listing_id: i64,
    pub delta: i64,
    pub direction: StockDirection,
    pub expected_seller: Option<String>,
    pub idempotency_key: Option<String>,
}

impl StockAdjustment {
    pub fn decrease(listing_id: i64, delta: i64) -> Self {
        Self { listing_id, delta, direction: StockDirection::Decrease, expected_seller: None, idempotency_key: None }
    }

    pub fn increase(listing_id: i64, delta: i64) -> Self {
        Self { listing_id, delta, direction: StockDirection::Increase, expected_seller: None, idempotency_key: None }
    }

    pub fn with_expected_seller<S: Into<String>>(mut self, seller: S) -> Self {
        self.expected_seller = Some(seller.into());
        self
    }

    pub fn with_idempotency_key<S: Into<String>>(mut self, key: S) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// The signed change to apply to the stock counter
    pub fn signed_delta(&self) -> i64 {
        match self.direction {
            StockDirection::Increase => self.delta,
            StockDirection::Decrease => -self.delta,
        }
    }
}

//--------------------------------------      Cart types     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub cart_id: String,
    pub buyer_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A buyer's intent to purchase a quantity of one listing. The listing details are captured when the line is first
/// added so that the order can snapshot them at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub listing_id: i64,
    pub kind: ListingKind,
    pub name: String,
    pub image: String,
    pub category: Category,
    pub seller_email: String,
    pub unit_price: Money,
    pub cart_quantity: i64,
}

impl CartLine {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.cart_quantity
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been placed and the seller has not acted on it yet.
    Pending,
    /// The seller is preparing the order.
    Processing,
    /// The order is on its way to the buyer.
    Shipping,
    /// The buyer has received the order.
    Delivered,
    /// The buyer cancelled the order while it was still pending.
    Cancelled,
}

/// The forward progression of a live order.
pub const STATUS_PROGRESSION: [OrderStatusType; 4] = [
    OrderStatusType::Pending,
    OrderStatusType::Processing,
    OrderStatusType::Shipping,
    OrderStatusType::Delivered,
];

impl OrderStatusType {
    /// The position of this status in [`STATUS_PROGRESSION`]. `Cancelled` is not part of the progression.
    pub fn rank(&self) -> Option<usize> {
        STATUS_PROGRESSION.iter().position(|s| s == self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Delivered | OrderStatusType::Cancelled)
    }

    /// Whether an order in this status may move to `next`. Moves are strictly forward and may skip states.
    /// `Cancelled` is reachable only from `Pending`.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        match (self.rank(), next) {
            (Some(0), OrderStatusType::Cancelled) => true,
            (Some(from), next) => next.rank().map(|to| to > from).unwrap_or(false),
            (None, _) => false,
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Processing => write!(f, "Processing"),
            OrderStatusType::Shipping => write!(f, "Shipping"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" | "pending" => Ok(Self::Pending),
            "Processing" | "processing" => Ok(Self::Processing),
            "Shipping" | "shipping" => Ok(Self::Shipping),
            "Delivered" | "delivered" => Ok(Self::Delivered),
            "Cancelled" | "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Online,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Online => write!(f, "online"),
        }
    }
}

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order          -------------------------------------------------------
/// A line of an order. The listing's name, price, image and category are copied at checkout time so that later edits
/// to the listing do not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub listing_id: i64,
    pub name: String,
    pub price: Money,
    pub quantity: i64,
    pub image: String,
    pub category: Category,
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            listing_id: line.listing_id,
            name: line.name.clone(),
            price: line.unit_price,
            quantity: line.cart_quantity,
            image: line.image.clone(),
            category: line.category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub buyer_email: String,
    pub seller_email: String,
    pub order_type: ListingKind,
    pub delivery_address: String,
    pub phone_number: String,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Delivery details supplied by the buyer at checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfo {
    pub delivery_address: String,
    pub phone_number: String,
}

impl DeliveryInfo {
    pub fn new<S1: Into<String>, S2: Into<String>>(delivery_address: S1, phone_number: S2) -> Self {
        Self { delivery_address: delivery_address.into(), phone_number: phone_number.into() }
    }
}

/// A single-seller order that is ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub order_id: OrderId,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub buyer_email: String,
    pub seller_email: String,
    pub order_type: ListingKind,
    pub delivery: DeliveryInfo,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// The listing ids consumed by this order. These are the cart lines that must leave the cart once the order is
    /// committed.
    pub fn listing_ids(&self) -> Vec<i64> {
        self.items.iter().map(|i| i.listing_id).collect()
    }
}

//--------------------------------------    Status history     -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub occurred_at: DateTime<Utc>,
}

//--------------------------------------     Transactions      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Failed => write!(f, "failed"),
            TransactionStatus::Refunded => write!(f, "refunded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    /// The reference issued by the payment gateway
    pub transaction_id: String,
    /// The locally generated id the payment was initiated with
    pub transaction_uuid: String,
    pub amount: Money,
    pub status: TransactionStatus,
    pub payment_method: PaymentMethod,
    pub buyer_email: String,
    pub seller_email: Option<String>,
    /// Comma separated list of the order ids this payment settled
    pub order_details: Option<String>,
    /// Set when the payment could not be matched to a staged order and has to be reconciled by hand.
    pub needs_review: bool,
    #[sqlx(rename = "created_at")]
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub transaction_id: String,
    pub transaction_uuid: String,
    pub amount: Money,
    pub status: TransactionStatus,
    pub payment_method: PaymentMethod,
    pub buyer_email: String,
    pub seller_email: Option<String>,
    pub order_details: Option<String>,
    pub needs_review: bool,
    pub date: DateTime<Utc>,
}

//--------------------------------------    Payment drafts     -------------------------------------------------------
/// An order that has been sent to the payment gateway but not paid for yet. It is keyed by the locally generated
/// transaction uuid, and holds a snapshot of the cart as it was when the payment was initiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDraft {
    pub transaction_uuid: String,
    pub cart_id: String,
    pub buyer_email: String,
    pub delivery_address: String,
    pub phone_number: String,
    pub total_amount: Money,
    pub product_code: String,
    pub lines: Json<Vec<CartLine>>,
    pub created_at: DateTime<Utc>,
}

impl PaymentDraft {
    pub fn delivery(&self) -> DeliveryInfo {
        DeliveryInfo::new(self.delivery_address.clone(), self.phone_number.clone())
    }
}
