use std::collections::HashMap;

use agromart_common::Secret;
use agromart_engine::{
    db_types::Order,
    events::EventProducers,
    payment_objects::{GatewayConfig, SignedPaymentRequest},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    CartApi,
    CatalogApi,
    InventoryApi,
    OrderFlowApi,
    PaymentApi,
    SqliteDatabase,
};
use cucumber::World;
use log::*;

pub const GATEWAY_SECRET: &str = "8gBm/:&EnhH.1/q";

#[derive(Default, Debug, World)]
pub struct MarketWorld {
    pub system: Option<MarketSystem>,
}

#[derive(Debug)]
pub struct MarketSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub inventory: InventoryApi<SqliteDatabase>,
    pub carts: CartApi<SqliteDatabase>,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentApi<SqliteDatabase>,
    pub catalog: CatalogApi<SqliteDatabase>,
    /// Listing ids by listing name
    pub listings: HashMap<String, i64>,
    /// Cart ids by buyer email
    pub buyer_carts: HashMap<String, String>,
    /// Every order placed in the scenario, in the order they were placed
    pub placed: Vec<Order>,
    pub last_payment: Option<SignedPaymentRequest>,
    pub last_error: Option<String>,
}

impl MarketWorld {
    pub fn system(&self) -> &MarketSystem {
        self.system.as_ref().expect("The marketplace has not been set up")
    }

    pub fn system_mut(&mut self) -> &mut MarketSystem {
        self.system.as_mut().expect("The marketplace has not been set up")
    }
}

impl MarketSystem {
    pub async fn new() -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        debug!("🚀️ Created database: {db_path}");
        let config = GatewayConfig::new(Secret::new(GATEWAY_SECRET.to_string()), "EPAYTEST");
        Self {
            db_path,
            inventory: InventoryApi::new(db.clone()),
            carts: CartApi::new(db.clone()),
            orders: OrderFlowApi::new(db.clone(), EventProducers::default()),
            payments: PaymentApi::new(db.clone(), EventProducers::default(), config),
            catalog: CatalogApi::new(db.clone()),
            db,
            listings: HashMap::new(),
            buyer_carts: HashMap::new(),
            placed: Vec::new(),
            last_payment: None,
            last_error: None,
        }
    }

    pub fn listing_id(&self, name: &str) -> i64 {
        *self.listings.get(name).unwrap_or_else(|| panic!("No listing called {name}"))
    }

    /// The buyer's cart, creating it on first use
    pub async fn cart_for(&mut self, buyer: &str) -> String {
        if let Some(id) = self.buyer_carts.get(buyer) {
            return id.clone();
        }
        let cart = self.carts.create_cart(buyer).await.expect("Error creating cart");
        self.buyer_carts.insert(buyer.to_string(), cart.cart_id.clone());
        cart.cart_id
    }

    pub fn order(&self, index: usize) -> &Order {
        self.placed.get(index - 1).unwrap_or_else(|| panic!("Order #{index} was not placed"))
    }
}
