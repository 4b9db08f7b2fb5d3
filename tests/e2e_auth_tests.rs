//! End-to-end tests for signup, login, sessions and page gating.

mod common;

use common::{
    TestClient, TestServer, ADMIN_PASS, ADMIN_USER, CUSTOMER_PASS, CUSTOMER_USER, RIDER_PASS,
    RIDER_USER, VENDOR_PASS, VENDOR_USER,
};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_login_with_valid_credentials() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login(CUSTOMER_USER, CUSTOMER_PASS).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().get("set-cookie").is_some());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "customer");
    assert_eq!(body["redirect"], "/dashboard");
    assert!(!body["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_login_redirects_each_role_to_its_dashboard() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    for (handle, password, role, redirect) in [
        (VENDOR_USER, VENDOR_PASS, "vendor", "/vendor/dashboard"),
        (RIDER_USER, RIDER_PASS, "rider", "/rider/dashboard"),
        (ADMIN_USER, ADMIN_PASS, "admin", "/admin"),
    ] {
        let response = client.login(handle, password).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["role"], role);
        assert_eq!(body["redirect"], redirect);
    }
}

#[tokio::test]
async fn test_login_with_invalid_password() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.login(CUSTOMER_USER, "wrong_password").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client.login("nonexistent_user", "password").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_logout_clears_session() {
    let server = TestServer::spawn().await;
    let client = TestClient::customer(server.base_url.clone()).await;

    assert_eq!(client.me().await.status(), StatusCode::OK);

    let response = client.logout().await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(client.me().await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_session_reports_role_and_permissions() {
    let server = TestServer::spawn().await;
    let client = TestClient::rider(server.base_url.clone()).await;

    let response = client.session().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["handle"], RIDER_USER);
    assert_eq!(body["role"], "rider");
    assert_eq!(body["user_id"], server.ids.rider_id);
}

#[tokio::test]
async fn test_bearer_token_authenticates_without_cookie() {
    let server = TestServer::spawn().await;
    let login_client = TestClient::new(server.base_url.clone());
    let body: Value = login_client
        .login(CUSTOMER_USER, CUSTOMER_PASS)
        .await
        .json()
        .await
        .unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let bare = reqwest::Client::new();
    let response = bare
        .get(format!("{}/v1/me", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signup_creates_vendor_and_logs_in() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .signup(json!({
            "handle": "kamau_fruits",
            "password": "matunda123",
            "role": "vendor",
            "display_name": "Kamau",
            "business_name": "Kamau Fruits",
            "location": "Westlands"
        }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["redirect"], "/vendor/dashboard");

    let me: Value = client.me().await.json().await.unwrap();
    assert_eq!(me["user"]["handle"], "kamau_fruits");

    let vendors: Vec<Value> = client.list_vendors().await.json().await.unwrap();
    assert!(vendors
        .iter()
        .any(|v| v["business_name"] == "Kamau Fruits"));
}

#[tokio::test]
async fn test_signup_rejects_bad_input() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let taken = client
        .signup(json!({
            "handle": CUSTOMER_USER,
            "password": "password123",
            "role": "customer",
            "display_name": "Someone"
        }))
        .await;
    assert_eq!(taken.status(), StatusCode::CONFLICT);

    let weak = client
        .signup(json!({
            "handle": "newcustomer",
            "password": "123",
            "role": "customer",
            "display_name": "Someone"
        }))
        .await;
    assert_eq!(weak.status(), StatusCode::BAD_REQUEST);

    let admin = client
        .signup(json!({
            "handle": "sneaky",
            "password": "password123",
            "role": "admin",
            "display_name": "Sneaky"
        }))
        .await;
    assert_eq!(admin.status(), StatusCode::BAD_REQUEST);

    let vendor_without_business = client
        .signup(json!({
            "handle": "nobusiness",
            "password": "password123",
            "role": "vendor",
            "display_name": "No Business"
        }))
        .await;
    assert_eq!(vendor_without_business.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oidc_login_is_unavailable_when_not_configured() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.oidc_login().await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_gated_pages_redirect_by_role() {
    let server = TestServer::spawn().await;

    let anonymous = TestClient::new(server.base_url.clone());
    let response = anonymous.get_page("/checkout").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "/login?redirect=%2Fcheckout"
    );

    let rider = TestClient::rider(server.base_url.clone()).await;
    let response = rider.get_page("/vendor/products").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "/rider/dashboard"
    );
}
