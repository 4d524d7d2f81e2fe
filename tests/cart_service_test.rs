mod common;

use assert_matches::assert_matches;
use common::{seed_product, setup_services, stock_of};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storefront_carts::{entities::CartStatus, errors::ServiceError};

#[tokio::test]
async fn get_cart_for_unknown_customer_is_empty() {
    let (_db, _catalog, carts) = setup_services().await;

    let view = carts.get_cart("nobody").await.unwrap();

    assert_eq!(view.customer_id, "nobody");
    assert_eq!(view.status, CartStatus::Unpaid);
    assert!(view.payment_date.is_none());
    assert_eq!(view.total, Decimal::ZERO);
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn add_to_cart_creates_cart_on_first_add() {
    let (db, _catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 10).await;

    let view = carts.add_to_cart("alice", "phone-x").await.unwrap();

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].product_model, "phone-x");
    assert_eq!(view.items[0].quantity, 1);
    assert_eq!(view.items[0].category, "Smartphone");
    assert_eq!(view.items[0].unit_price, dec!(500.00));
    assert_eq!(view.total, dec!(500.00));

    // Adding to the cart never touches catalog stock.
    assert_eq!(stock_of(&db, "phone-x").await, 10);
}

#[tokio::test]
async fn repeated_add_increments_quantity_and_total() {
    let (db, _catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 10).await;

    carts.add_to_cart("alice", "phone-x").await.unwrap();
    let view = carts.add_to_cart("alice", "phone-x").await.unwrap();

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 2);
    assert_eq!(view.total, dec!(1000.00));
}

#[tokio::test]
async fn add_unknown_product_fails() {
    let (_db, _catalog, carts) = setup_services().await;

    let err = carts.add_to_cart("alice", "ghost").await.unwrap_err();

    assert_matches!(err, ServiceError::ProductNotFound(model) if model == "ghost");
}

#[tokio::test]
async fn add_out_of_stock_product_fails() {
    let (db, _catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 0).await;

    let err = carts.add_to_cart("alice", "phone-x").await.unwrap_err();

    assert_matches!(err, ServiceError::EmptyProductStock(model) if model == "phone-x");
    assert!(carts.get_cart("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn total_reflects_mixed_line_items() {
    let (db, _catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 10).await;
    seed_product(&db, "cable-usbc", "Accessory", dec!(9.99), 50).await;

    carts.add_to_cart("alice", "phone-x").await.unwrap();
    carts.add_to_cart("alice", "phone-x").await.unwrap();
    let view = carts.add_to_cart("alice", "cable-usbc").await.unwrap();

    assert_eq!(view.items.len(), 2);
    assert_eq!(view.total, dec!(1009.99));
}

#[tokio::test]
async fn remove_decrements_quantity_above_one() {
    let (db, _catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 10).await;

    carts.add_to_cart("alice", "phone-x").await.unwrap();
    carts.add_to_cart("alice", "phone-x").await.unwrap();
    let view = carts
        .remove_product_from_cart("alice", "phone-x")
        .await
        .unwrap();

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 1);
    assert_eq!(view.total, dec!(500.00));
}

#[tokio::test]
async fn remove_at_quantity_one_deletes_line_item() {
    let (db, _catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 10).await;

    carts.add_to_cart("alice", "phone-x").await.unwrap();
    let view = carts
        .remove_product_from_cart("alice", "phone-x")
        .await
        .unwrap();

    assert!(view.items.is_empty());
    assert_eq!(view.total, Decimal::ZERO);

    // A second remove sees an empty cart, not a missing line item.
    let err = carts
        .remove_product_from_cart("alice", "phone-x")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::EmptyCart(_));
}

#[tokio::test]
async fn remove_checks_preconditions_in_order() {
    let (db, _catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 10).await;
    seed_product(&db, "cable-usbc", "Accessory", dec!(9.99), 50).await;

    // Unknown product beats the missing cart.
    let err = carts
        .remove_product_from_cart("alice", "ghost")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ProductNotFound(_));

    // Known product, but the customer has no cart.
    let err = carts
        .remove_product_from_cart("alice", "phone-x")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::CartNotFound(customer) if customer == "alice");

    // Cart exists but does not hold the product.
    carts.add_to_cart("alice", "phone-x").await.unwrap();
    let err = carts
        .remove_product_from_cart("alice", "cable-usbc")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ProductNotInCart(model) if model == "cable-usbc");
}

#[tokio::test]
async fn clear_cart_empties_items_and_zeroes_total() {
    let (db, _catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 10).await;

    carts.add_to_cart("alice", "phone-x").await.unwrap();
    carts.add_to_cart("alice", "phone-x").await.unwrap();
    let view = carts.clear_cart("alice").await.unwrap();

    assert!(view.items.is_empty());
    assert_eq!(view.total, Decimal::ZERO);
    assert_eq!(view.status, CartStatus::Unpaid);

    // The cart survives as an empty unpaid cart.
    let view = carts.get_cart("alice").await.unwrap();
    assert!(view.is_empty());
}

#[tokio::test]
async fn clear_cart_without_cart_fails() {
    let (_db, _catalog, carts) = setup_services().await;

    let err = carts.clear_cart("alice").await.unwrap_err();

    assert_matches!(err, ServiceError::CartNotFound(customer) if customer == "alice");
}

#[tokio::test]
async fn customers_have_independent_carts() {
    let (db, _catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 10).await;
    seed_product(&db, "cable-usbc", "Accessory", dec!(9.99), 50).await;

    carts.add_to_cart("alice", "phone-x").await.unwrap();
    carts.add_to_cart("bob", "cable-usbc").await.unwrap();

    let alice = carts.get_cart("alice").await.unwrap();
    let bob = carts.get_cart("bob").await.unwrap();

    assert_eq!(alice.items.len(), 1);
    assert_eq!(alice.items[0].product_model, "phone-x");
    assert_eq!(bob.items.len(), 1);
    assert_eq!(bob.items[0].product_model, "cable-usbc");
}

#[tokio::test]
async fn cart_keeps_price_snapshot_after_catalog_change() {
    let (db, catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 10).await;

    carts.add_to_cart("alice", "phone-x").await.unwrap();

    // Stock changes do not rewrite the unit price captured at add time.
    catalog.adjust_stock("phone-x", -3).await.unwrap();
    let view = carts.get_cart("alice").await.unwrap();

    assert_eq!(view.items[0].unit_price, dec!(500.00));
    assert_eq!(view.total, dec!(500.00));
}

#[tokio::test]
async fn concurrent_adds_for_one_customer_serialize() {
    let (db, _catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 10).await;

    let a = {
        let carts = carts.clone();
        tokio::spawn(async move { carts.add_to_cart("alice", "phone-x").await })
    };
    let b = {
        let carts = carts.clone();
        tokio::spawn(async move { carts.add_to_cart("alice", "phone-x").await })
    };

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let view = carts.get_cart("alice").await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 2);
    assert_eq!(view.total, dec!(1000.00));
}

#[tokio::test]
async fn get_all_carts_spans_customers_and_statuses() {
    let (db, _catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 10).await;

    carts.add_to_cart("alice", "phone-x").await.unwrap();
    carts.add_to_cart("bob", "phone-x").await.unwrap();
    carts.checkout_cart("bob").await.unwrap();

    let all = carts.get_all_carts().await.unwrap();

    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|c| c.status == CartStatus::Unpaid));
    assert!(all.iter().any(|c| c.status == CartStatus::Paid));
}

#[tokio::test]
async fn delete_all_carts_wipes_carts_and_items() {
    let (db, _catalog, carts) = setup_services().await;
    seed_product(&db, "phone-x", "Smartphone", dec!(500.00), 10).await;

    carts.add_to_cart("alice", "phone-x").await.unwrap();
    carts.add_to_cart("bob", "phone-x").await.unwrap();

    let deleted = carts.delete_all_carts().await.unwrap();
    assert_eq!(deleted, 2);

    assert!(carts.get_all_carts().await.unwrap().is_empty());
    assert!(carts.get_cart("alice").await.unwrap().is_empty());
}
