use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    BrowseMarketplace,
    PlaceOrders,
    ManageStore,
    DeliverOrders,
    ViewAnalytics,
    ManageMarketplace,
    ServerAdmin,
}

const CUSTOMER_PERMISSIONS: &[Permission] =
    &[Permission::BrowseMarketplace, Permission::PlaceOrders];
const VENDOR_PERMISSIONS: &[Permission] = &[Permission::BrowseMarketplace, Permission::ManageStore];
const RIDER_PERMISSIONS: &[Permission] =
    &[Permission::BrowseMarketplace, Permission::DeliverOrders];
const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::BrowseMarketplace,
    Permission::ViewAnalytics,
    Permission::ManageMarketplace,
    Permission::ServerAdmin,
];

/// Every account has exactly one role, chosen at signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Vendor,
    Rider,
    Admin,
}

impl UserRole {
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            UserRole::Customer => CUSTOMER_PERMISSIONS,
            UserRole::Vendor => VENDOR_PERMISSIONS,
            UserRole::Rider => RIDER_PERMISSIONS,
            UserRole::Admin => ADMIN_PERMISSIONS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Vendor => "vendor",
            UserRole::Rider => "rider",
            UserRole::Admin => "admin",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "customer" => Some(UserRole::Customer),
            "vendor" => Some(UserRole::Vendor),
            "rider" => Some(UserRole::Rider),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    /// Landing page after login.
    pub fn dashboard_path(self) -> &'static str {
        match self {
            UserRole::Customer => "/dashboard",
            UserRole::Vendor => "/vendor/dashboard",
            UserRole::Rider => "/rider/dashboard",
            UserRole::Admin => "/admin",
        }
    }

    /// Roles that can sign themselves up. Admins are provisioned out of band.
    pub fn is_self_service(self) -> bool {
        !matches!(self, UserRole::Admin)
    }
}
