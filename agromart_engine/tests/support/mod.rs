#![allow(dead_code)]

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use agromart_engine::{
    db_types::{Category, DeliveryInfo, Listing, ListingKind, Money, NewListing, Unit},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    InventoryApi,
    SqliteDatabase,
};

pub const FARMER_A: &str = "ram@farm.np";
pub const FARMER_B: &str = "sita@farm.np";
pub const SUPPLIER: &str = "hari@inputs.np";
pub const BUYER: &str = "gita@buyer.np";
pub const OTHER_BUYER: &str = "bikash@buyer.np";

pub async fn setup() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        error!("🚀️ Failed to drop database {url}: {e}");
    }
}

pub fn produce(seller: &str, name: &str, rupees: i64, quantity: i64) -> NewListing {
    NewListing {
        kind: ListingKind::Product,
        name: name.to_string(),
        price: Money::from_rupees(rupees),
        category: Category::Vegetables,
        quantity,
        unit: Unit::Kg,
        description: format!("Fresh {name}"),
        image: format!("uploads/{}.jpg", name.to_lowercase()),
        seller_email: seller.to_string(),
    }
}

pub fn agri_input(seller: &str, name: &str, rupees: i64, quantity: i64) -> NewListing {
    NewListing {
        kind: ListingKind::AgriInput,
        category: Category::Seeds,
        unit: Unit::Packet,
        ..produce(seller, name, rupees, quantity)
    }
}

pub async fn create_listing(db: &SqliteDatabase, listing: NewListing) -> Listing {
    InventoryApi::new(db.clone()).create_listing(listing).await.expect("Error creating listing")
}

pub fn delivery() -> DeliveryInfo {
    DeliveryInfo::new("Ward 4, Bharatpur, Chitwan", "9841000000")
}
