use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, Set};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use storefront_carts::{
    entities::{product, Product, ProductModel},
    events::{self, EventSender},
    migrator::Migrator,
    services::{CartService, ProductCatalogService},
};

/// Fresh in-memory SQLite database with the full schema applied.
///
/// A single connection keeps every statement on the same in-memory database;
/// a pool of more than one would see different empty databases.
pub async fn setup_test_db() -> Arc<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).min_connections(1);

    let db = Database::connect(options)
        .await
        .expect("failed to open in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");

    Arc::new(db)
}

/// Service graph over a fresh database. The event receiver is drained by a
/// background task so channel capacity never blocks a test.
pub async fn setup_services() -> (Arc<DatabaseConnection>, Arc<ProductCatalogService>, Arc<CartService>) {
    let db = setup_test_db().await;
    let (event_sender, event_receiver) = events::event_channel(64);
    let event_sender = Arc::new(event_sender);
    tokio::spawn(events::process_events(event_receiver));

    let catalog = Arc::new(ProductCatalogService::new(db.clone(), event_sender.clone()));
    let carts = Arc::new(CartService::new(db.clone(), catalog.clone(), event_sender));

    (db, catalog, carts)
}

#[allow(dead_code)]
pub fn event_sender_for_tests() -> Arc<EventSender> {
    let (sender, receiver) = events::event_channel(64);
    tokio::spawn(events::process_events(receiver));
    Arc::new(sender)
}

/// Inserts a catalog product with the given stock level.
pub async fn seed_product(
    db: &DatabaseConnection,
    model: &str,
    category: &str,
    selling_price: Decimal,
    quantity: i32,
) -> ProductModel {
    let row = product::ActiveModel {
        model: Set(model.to_string()),
        category: Set(category.to_string()),
        selling_price: Set(selling_price),
        quantity: Set(quantity),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    };

    row.insert(db).await.expect("failed to seed product")
}

/// Current catalog stock for a model.
pub async fn stock_of(db: &DatabaseConnection, model: &str) -> i32 {
    Product::find_by_id(model.to_string())
        .one(db)
        .await
        .expect("query failed")
        .expect("product missing")
        .quantity
}
