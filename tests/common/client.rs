//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per endpoint. When API routes or request
//! formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client. Redirects are not followed so
    /// tests can look at them.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client logged in with the given credentials
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated_as(base_url: String, handle: &str, password: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(handle, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Authentication of {} failed: {:?}",
            handle,
            response.text().await
        );

        client
    }

    pub async fn customer(base_url: String) -> Self {
        Self::authenticated_as(base_url, CUSTOMER_USER, CUSTOMER_PASS).await
    }

    pub async fn vendor(base_url: String) -> Self {
        Self::authenticated_as(base_url, VENDOR_USER, VENDOR_PASS).await
    }

    pub async fn second_vendor(base_url: String) -> Self {
        Self::authenticated_as(base_url, SECOND_VENDOR_USER, SECOND_VENDOR_PASS).await
    }

    pub async fn rider(base_url: String) -> Self {
        Self::authenticated_as(base_url, RIDER_USER, RIDER_PASS).await
    }

    pub async fn admin(base_url: String) -> Self {
        Self::authenticated_as(base_url, ADMIN_USER, ADMIN_PASS).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .unwrap_or_else(|e| panic!("GET {} failed: {}", path, e))
    }

    async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .unwrap_or_else(|e| panic!("DELETE {} failed: {}", path, e))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap_or_else(|e| panic!("POST {} failed: {}", path, e))
    }

    async fn put_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap_or_else(|e| panic!("PUT {} failed: {}", path, e))
    }

    /// GET on a frontend page, to observe the role redirects.
    pub async fn get_page(&self, path: &str) -> Response {
        self.get(path).await
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/signup
    pub async fn signup(&self, body: Value) -> Response {
        self.post_json("/v1/auth/signup", &body).await
    }

    /// POST /v1/auth/login
    pub async fn login(&self, handle: &str, password: &str) -> Response {
        self.post_json(
            "/v1/auth/login",
            &json!({ "user_handle": handle, "password": password }),
        )
        .await
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.get("/v1/auth/logout").await
    }

    /// GET /v1/auth/session
    pub async fn session(&self) -> Response {
        self.get("/v1/auth/session").await
    }

    /// GET /v1/auth/oidc/login
    pub async fn oidc_login(&self) -> Response {
        self.get("/v1/auth/oidc/login").await
    }

    // ========================================================================
    // Profile
    // ========================================================================

    /// GET /v1/me
    pub async fn me(&self) -> Response {
        self.get("/v1/me").await
    }

    /// PUT /v1/me/profile
    pub async fn update_profile(&self, body: Value) -> Response {
        self.put_json("/v1/me/profile", &body).await
    }

    // ========================================================================
    // Marketplace
    // ========================================================================

    /// GET /v1/vendors
    pub async fn list_vendors(&self) -> Response {
        self.get("/v1/vendors").await
    }

    /// GET /v1/vendors/{id}
    pub async fn get_vendor(&self, vendor_id: usize) -> Response {
        self.get(&format!("/v1/vendors/{}", vendor_id)).await
    }

    /// GET /v1/vendors/{id}/products
    pub async fn vendor_products(&self, vendor_id: usize) -> Response {
        self.get(&format!("/v1/vendors/{}/products", vendor_id))
            .await
    }

    /// GET /v1/products with an optional query string
    pub async fn list_products(&self, query: &str) -> Response {
        self.get(&format!("/v1/products{}", query)).await
    }

    /// GET /v1/products/{id}
    pub async fn get_product(&self, product_id: usize) -> Response {
        self.get(&format!("/v1/products/{}", product_id)).await
    }

    /// POST /v1/products
    pub async fn create_product(&self, body: Value) -> Response {
        self.post_json("/v1/products", &body).await
    }

    /// PUT /v1/products/{id}
    pub async fn update_product(&self, product_id: usize, body: Value) -> Response {
        self.put_json(&format!("/v1/products/{}", product_id), &body)
            .await
    }

    /// DELETE /v1/products/{id}
    pub async fn delete_product(&self, product_id: usize) -> Response {
        self.delete(&format!("/v1/products/{}", product_id)).await
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// POST /v1/orders
    pub async fn place_order(&self, vendor_id: usize, items: &[(usize, u32)]) -> Response {
        let items: Vec<Value> = items
            .iter()
            .map(|(product_id, quantity)| json!({ "product_id": product_id, "quantity": quantity }))
            .collect();
        self.post_json(
            "/v1/orders",
            &json!({
                "vendor_id": vendor_id,
                "items": items,
                "delivery_address": CUSTOMER_ADDRESS,
            }),
        )
        .await
    }

    /// GET /v1/orders
    pub async fn list_orders(&self) -> Response {
        self.get("/v1/orders").await
    }

    /// GET /v1/orders/available
    pub async fn available_orders(&self) -> Response {
        self.get("/v1/orders/available").await
    }

    /// GET /v1/orders/{id}
    pub async fn get_order(&self, order_id: &str) -> Response {
        self.get(&format!("/v1/orders/{}", order_id)).await
    }

    /// PUT /v1/orders/{id}/status
    pub async fn set_order_status(&self, order_id: &str, status: &str) -> Response {
        self.put_json(
            &format!("/v1/orders/{}/status", order_id),
            &json!({ "status": status }),
        )
        .await
    }

    /// POST /v1/orders/{id}/claim
    pub async fn claim_order(&self, order_id: &str) -> Response {
        self.client
            .post(self.url(&format!("/v1/orders/{}/claim", order_id)))
            .send()
            .await
            .expect("Claim request failed")
    }

    // ========================================================================
    // Cart and Loyalty
    // ========================================================================

    /// GET /v1/me/cart
    pub async fn get_cart(&self) -> Response {
        self.get("/v1/me/cart").await
    }

    /// POST /v1/me/cart/items
    pub async fn add_to_cart(&self, product_id: usize, vendor_id: usize, quantity: u32) -> Response {
        self.post_json(
            "/v1/me/cart/items",
            &json!({ "product_id": product_id, "vendor_id": vendor_id, "quantity": quantity }),
        )
        .await
    }

    /// PUT /v1/me/cart/items/{product_id}/{vendor_id}
    pub async fn set_cart_quantity(
        &self,
        product_id: usize,
        vendor_id: usize,
        quantity: u32,
    ) -> Response {
        self.put_json(
            &format!("/v1/me/cart/items/{}/{}", product_id, vendor_id),
            &json!({ "quantity": quantity }),
        )
        .await
    }

    /// DELETE /v1/me/cart/items/{product_id}/{vendor_id}
    pub async fn remove_from_cart(&self, product_id: usize, vendor_id: usize) -> Response {
        self.delete(&format!("/v1/me/cart/items/{}/{}", product_id, vendor_id))
            .await
    }

    /// DELETE /v1/me/cart
    pub async fn clear_cart(&self) -> Response {
        self.delete("/v1/me/cart").await
    }

    /// POST /v1/me/cart/checkout
    pub async fn checkout(&self, body: Value) -> Response {
        self.post_json("/v1/me/cart/checkout", &body).await
    }

    /// GET /v1/me/loyalty
    pub async fn loyalty(&self) -> Response {
        self.get("/v1/me/loyalty").await
    }

    /// POST /v1/me/loyalty/redeem
    pub async fn redeem(&self, reward_id: &str) -> Response {
        self.post_json("/v1/me/loyalty/redeem", &json!({ "reward_id": reward_id }))
            .await
    }

    /// GET /v1/loyalty/rewards
    pub async fn rewards(&self) -> Response {
        self.get("/v1/loyalty/rewards").await
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// GET /v1/notifications
    pub async fn notifications(&self) -> Response {
        self.get("/v1/notifications").await
    }

    /// GET /v1/notifications/unread-count
    pub async fn unread_count(&self) -> Response {
        self.get("/v1/notifications/unread-count").await
    }

    /// POST /v1/notifications/{id}/read
    pub async fn mark_notification_read(&self, notification_id: &str) -> Response {
        self.client
            .post(self.url(&format!("/v1/notifications/{}/read", notification_id)))
            .send()
            .await
            .expect("Mark read request failed")
    }

    /// POST /v1/notifications/read-all
    pub async fn mark_all_notifications_read(&self) -> Response {
        self.client
            .post(self.url("/v1/notifications/read-all"))
            .send()
            .await
            .expect("Mark all read request failed")
    }

    /// GET /v1/notifications/stream
    pub async fn notification_stream(&self) -> Response {
        self.get("/v1/notifications/stream").await
    }

    // ========================================================================
    // Admin
    // ========================================================================

    /// GET /v1/admin/jobs
    pub async fn list_jobs(&self) -> Response {
        self.get("/v1/admin/jobs").await
    }

    /// POST /v1/admin/jobs/{id}/trigger
    pub async fn trigger_job(&self, job_id: &str) -> Response {
        self.client
            .post(self.url(&format!("/v1/admin/jobs/{}/trigger", job_id)))
            .send()
            .await
            .expect("Trigger job request failed")
    }

    /// GET /v1/admin/stats
    pub async fn daily_stats(&self, days: usize) -> Response {
        self.get(&format!("/v1/admin/stats?days={}", days)).await
    }

    // ========================================================================
    // Integrations
    // ========================================================================

    /// POST /api/cron/daily-stats
    pub async fn cron_daily_stats(&self, secret: Option<&str>) -> Response {
        let mut request = self.client.post(self.url("/api/cron/daily-stats"));
        if let Some(secret) = secret {
            request = request.bearer_auth(secret);
        }
        request.send().await.expect("Cron request failed")
    }

    /// POST /api/webhooks/order-update
    pub async fn order_webhook(&self, secret: Option<&str>, payload: Value) -> Response {
        let mut request = self
            .client
            .post(self.url("/api/webhooks/order-update"))
            .json(&payload);
        if let Some(secret) = secret {
            request = request.header("x-webhook-secret", secret);
        }
        request.send().await.expect("Webhook request failed")
    }
}
