//! End-to-end tests for vendors, products and the order lifecycle.

mod common;

use common::{
    TestClient, TestServer, SEEDED_STOCK, SUKUMA_PRICE_CENTS, TOMATO_PRICE_CENTS,
    VENDOR_BUSINESS,
};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn place_sukuma_order(server: &TestServer, customer: &TestClient) -> Value {
    let response = customer
        .place_order(server.ids.vendor_id, &[(server.ids.sukuma_id, 2)])
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_catalog_is_public() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let vendors: Vec<Value> = client.list_vendors().await.json().await.unwrap();
    assert_eq!(vendors.len(), 2);

    let vendor: Value = client
        .get_vendor(server.ids.vendor_id)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(vendor["business_name"], VENDOR_BUSINESS);

    let products: Vec<Value> = client
        .vendor_products(server.ids.vendor_id)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(products.len(), 2);

    assert_eq!(
        client.get_vendor(server.ids.customer_id).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_products_can_be_filtered() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let all: Vec<Value> = client.list_products("").await.json().await.unwrap();
    assert_eq!(all.len(), 3);

    let cereals: Vec<Value> = client
        .list_products("?category=cereals")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(cereals.len(), 1);
    assert_eq!(cereals[0]["id"], server.ids.unga_id);

    let searched: Vec<Value> = client
        .list_products("?search=TOMATO")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0]["price_cents"], TOMATO_PRICE_CENTS);
}

#[tokio::test]
async fn test_vendor_manages_own_products() {
    let server = TestServer::spawn().await;
    let vendor = TestClient::vendor(server.base_url.clone()).await;

    let response = vendor
        .create_product(json!({
            "name": "Managu",
            "category": "vegetables",
            "unit": "bunch",
            "price_cents": 4000,
            "stock": 10
        }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let product: Value = response.json().await.unwrap();
    let product_id = product["id"].as_u64().unwrap() as usize;
    assert_eq!(product["vendor_id"], server.ids.vendor_id);
    assert_eq!(product["is_available"], true);

    let response = vendor
        .update_product(product_id, json!({ "price_cents": 4500, "is_available": false }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["price_cents"], 4500);

    // Hidden from the public listing once unavailable
    let listed: Vec<Value> = vendor.list_products("?search=managu").await.json().await.unwrap();
    assert!(listed.is_empty());

    assert_eq!(
        vendor.delete_product(product_id).await.status(),
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        vendor.get_product(product_id).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_vendor_cannot_touch_other_vendor_products() {
    let server = TestServer::spawn().await;
    let vendor = TestClient::second_vendor(server.base_url.clone()).await;

    let response = vendor
        .update_product(server.ids.sukuma_id, json!({ "price_cents": 1 }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        vendor.delete_product(server.ids.sukuma_id).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_customer_cannot_create_products() {
    let server = TestServer::spawn().await;
    let customer = TestClient::customer(server.base_url.clone()).await;

    let response = customer
        .create_product(json!({
            "name": "Fake",
            "category": "vegetables",
            "unit": "kg",
            "price_cents": 100
        }))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_place_order_prices_from_catalog_and_takes_stock() {
    let server = TestServer::spawn().await;
    let customer = TestClient::customer(server.base_url.clone()).await;

    let order = place_sukuma_order(&server, &customer).await;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["customer_id"], server.ids.customer_id);
    assert_eq!(order["total_cents"], 2 * SUKUMA_PRICE_CENTS);

    let product: Value = customer
        .get_product(server.ids.sukuma_id)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(product["stock"], SEEDED_STOCK - 2);

    let orders: Vec<Value> = customer.list_orders().await.json().await.unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn test_place_order_rejects_invalid_orders() {
    let server = TestServer::spawn().await;
    let customer = TestClient::customer(server.base_url.clone()).await;

    let too_many = customer
        .place_order(server.ids.vendor_id, &[(server.ids.sukuma_id, SEEDED_STOCK + 1)])
        .await;
    assert_eq!(too_many.status(), StatusCode::BAD_REQUEST);

    let wrong_vendor = customer
        .place_order(server.ids.vendor_id, &[(server.ids.unga_id, 1)])
        .await;
    assert_eq!(wrong_vendor.status(), StatusCode::BAD_REQUEST);

    let empty = customer.place_order(server.ids.vendor_id, &[]).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_full_order_lifecycle() {
    let server = TestServer::spawn().await;
    let customer = TestClient::customer(server.base_url.clone()).await;
    let vendor = TestClient::vendor(server.base_url.clone()).await;
    let rider = TestClient::rider(server.base_url.clone()).await;

    let order = place_sukuma_order(&server, &customer).await;
    let order_id = order["id"].as_str().unwrap();

    // Pending orders are not offered to riders yet
    let available: Vec<Value> = rider.available_orders().await.json().await.unwrap();
    assert!(available.is_empty());
    assert_eq!(rider.claim_order(order_id).await.status(), StatusCode::BAD_REQUEST);

    let vendor_orders: Vec<Value> = vendor.list_orders().await.json().await.unwrap();
    assert_eq!(vendor_orders.len(), 1);

    let response = vendor.set_order_status(order_id, "confirmed").await;
    assert_eq!(response.status(), StatusCode::OK);

    let available: Vec<Value> = rider.available_orders().await.json().await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(rider.get_order(order_id).await.status(), StatusCode::OK);

    let response = rider.claim_order(order_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let claimed: Value = response.json().await.unwrap();
    assert_eq!(claimed["rider_id"], server.ids.rider_id);
    assert_eq!(rider.claim_order(order_id).await.status(), StatusCode::CONFLICT);

    assert_eq!(
        vendor.set_order_status(order_id, "preparing").await.status(),
        StatusCode::OK
    );
    assert_eq!(
        rider.set_order_status(order_id, "out_for_delivery").await.status(),
        StatusCode::OK
    );
    let response = rider.set_order_status(order_id, "delivered").await;
    assert_eq!(response.status(), StatusCode::OK);
    let delivered: Value = response.json().await.unwrap();
    assert_eq!(delivered["status"], "delivered");

    // Terminal orders stay terminal
    assert_eq!(
        vendor.set_order_status(order_id, "cancelled").await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_status_changes_respect_roles() {
    let server = TestServer::spawn().await;
    let customer = TestClient::customer(server.base_url.clone()).await;
    let vendor = TestClient::vendor(server.base_url.clone()).await;
    let other_vendor = TestClient::second_vendor(server.base_url.clone()).await;

    let order = place_sukuma_order(&server, &customer).await;
    let order_id = order["id"].as_str().unwrap();

    // Customers can only cancel
    assert_eq!(
        customer.set_order_status(order_id, "confirmed").await.status(),
        StatusCode::FORBIDDEN
    );
    // Vendors of other shops do not see the order at all
    assert_eq!(
        other_vendor.set_order_status(order_id, "confirmed").await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        other_vendor.get_order(order_id).await.status(),
        StatusCode::NOT_FOUND
    );
    // Skipping a step is an invalid transition
    assert_eq!(
        vendor.set_order_status(order_id, "delivered").await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        vendor.set_order_status(order_id, "preparing").await.status(),
        StatusCode::BAD_REQUEST
    );

    let response = customer.set_order_status(order_id, "cancelled").await;
    assert_eq!(response.status(), StatusCode::OK);
}
