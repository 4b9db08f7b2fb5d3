use super::permissions::UserRole;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: usize,
    pub handle: String,
    pub role: UserRole,
    pub display_name: String,
    pub created: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub phone: Option<String>,
    pub default_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorProfile {
    pub business_name: String,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub is_open: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiderProfile {
    pub vehicle_type: Option<String>,
    pub phone: Option<String>,
    pub is_available: bool,
}

/// Role specific data, one variant per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Profile {
    Customer(CustomerProfile),
    Vendor(VendorProfile),
    Rider(RiderProfile),
    Admin,
}

impl Profile {
    pub fn role(&self) -> UserRole {
        match self {
            Profile::Customer(_) => UserRole::Customer,
            Profile::Vendor(_) => UserRole::Vendor,
            Profile::Rider(_) => UserRole::Rider,
            Profile::Admin => UserRole::Admin,
        }
    }

    /// An empty profile for `role`, used when an identity provider login
    /// provisions a brand new account.
    pub fn default_for(role: UserRole, display_name: &str) -> Profile {
        match role {
            UserRole::Customer => Profile::Customer(CustomerProfile::default()),
            UserRole::Vendor => Profile::Vendor(VendorProfile {
                business_name: display_name.to_string(),
                is_open: true,
                ..Default::default()
            }),
            UserRole::Rider => Profile::Rider(RiderProfile {
                is_available: true,
                ..Default::default()
            }),
            UserRole::Admin => Profile::Admin,
        }
    }
}

/// Partial profile update. Fields that do not apply to the user's role are
/// ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub default_address: Option<String>,
    pub business_name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub is_open: Option<bool>,
    pub vehicle_type: Option<String>,
    pub is_available: Option<bool>,
}

impl ProfileUpdate {
    pub fn apply_to(&self, profile: &mut Profile) {
        match profile {
            Profile::Customer(p) => {
                if let Some(phone) = &self.phone {
                    p.phone = Some(phone.clone());
                }
                if let Some(address) = &self.default_address {
                    p.default_address = Some(address.clone());
                }
            }
            Profile::Vendor(p) => {
                if let Some(name) = &self.business_name {
                    p.business_name = name.clone();
                }
                if let Some(location) = &self.location {
                    p.location = Some(location.clone());
                }
                if let Some(phone) = &self.phone {
                    p.phone = Some(phone.clone());
                }
                if let Some(description) = &self.description {
                    p.description = Some(description.clone());
                }
                if let Some(is_open) = self.is_open {
                    p.is_open = is_open;
                }
            }
            Profile::Rider(p) => {
                if let Some(vehicle) = &self.vehicle_type {
                    p.vehicle_type = Some(vehicle.clone());
                }
                if let Some(phone) = &self.phone {
                    p.phone = Some(phone.clone());
                }
                if let Some(is_available) = self.is_available {
                    p.is_available = is_available;
                }
            }
            Profile::Admin => {}
        }
    }
}

/// A vendor as listed to customers browsing the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorSummary {
    pub id: usize,
    pub display_name: String,
    pub business_name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub is_open: bool,
}
