//! Shared constants for end-to-end tests
//!
//! When seeded users, products or secrets change, update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

pub const CUSTOMER_USER: &str = "wanjiku";
pub const CUSTOMER_PASS: &str = "customerpass123";
pub const CUSTOMER_ADDRESS: &str = "Kilimani, Argwings Kodhek Rd";

pub const VENDOR_USER: &str = "mama_mboga";
pub const VENDOR_PASS: &str = "vendorpass123";
pub const VENDOR_BUSINESS: &str = "Mama Mboga Fresh";

pub const SECOND_VENDOR_USER: &str = "gikomba_greens";
pub const SECOND_VENDOR_PASS: &str = "vendorpass456";
pub const SECOND_VENDOR_BUSINESS: &str = "Gikomba Greens";

pub const RIDER_USER: &str = "otieno";
pub const RIDER_PASS: &str = "riderpass123";

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASS: &str = "adminpass123";

// ============================================================================
// Seeded Products
// ============================================================================

/// Sukuma wiki bunch from the first vendor, 50 KES.
pub const SUKUMA_PRICE_CENTS: u64 = 5_000;

/// Tomatoes per kg from the first vendor, 120 KES.
pub const TOMATO_PRICE_CENTS: u64 = 12_000;

/// Unga 2kg from the second vendor, 210 KES.
pub const UNGA_PRICE_CENTS: u64 = 21_000;

pub const SEEDED_STOCK: u32 = 20;

// ============================================================================
// Integration Secrets
// ============================================================================

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const CRON_SECRET: &str = "test-cron-secret";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
