//! Seeds a fresh pair of databases with one user per role and a few
//! products from two vendors.

use super::constants::*;
use anyhow::Result;
use mboga_pap_server::marketplace::{NewProduct, ProductStore, SqliteMarketplaceStore};
use mboga_pap_server::user::{
    CustomerProfile, PasswordCredentials, Profile, RiderProfile, SqliteUserStore,
    UserAuthCredentialsStore, UserStore, VendorProfile,
};
use std::path::PathBuf;
use tempfile::TempDir;

/// Ids of the seeded rows, handy for building request paths.
#[derive(Debug, Clone, Copy)]
pub struct SeededIds {
    pub customer_id: usize,
    pub vendor_id: usize,
    pub second_vendor_id: usize,
    pub rider_id: usize,
    pub admin_id: usize,
    pub sukuma_id: usize,
    pub tomato_id: usize,
    pub unga_id: usize,
}

fn create_user_with_password(
    store: &SqliteUserStore,
    handle: &str,
    password: &str,
    display_name: &str,
    profile: Profile,
) -> Result<usize> {
    let user_id = store.create_user(handle, display_name, &profile)?;
    store.set_password_credentials(&PasswordCredentials::new(user_id, password)?)?;
    Ok(user_id)
}

fn vendor_profile(business_name: &str) -> Profile {
    Profile::Vendor(VendorProfile {
        business_name: business_name.to_string(),
        location: Some("Nairobi".to_string()),
        phone: None,
        description: None,
        is_open: true,
    })
}

fn product(name: &str, category: &str, unit: &str, price_cents: u64) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        description: None,
        category: category.to_string(),
        unit: unit.to_string(),
        price_cents,
        stock: SEEDED_STOCK,
        is_available: true,
        image_url: None,
    }
}

/// Returns (temp_dir, user_db_path, marketplace_db_path, ids)
pub fn create_test_dbs() -> Result<(TempDir, PathBuf, PathBuf, SeededIds)> {
    let dir = TempDir::new()?;
    let user_db_path = dir.path().join("user.db");
    let marketplace_db_path = dir.path().join("marketplace.db");

    let user_store = SqliteUserStore::new(&user_db_path)?;
    let customer_id = create_user_with_password(
        &user_store,
        CUSTOMER_USER,
        CUSTOMER_PASS,
        "Wanjiku",
        Profile::Customer(CustomerProfile {
            phone: None,
            default_address: Some(CUSTOMER_ADDRESS.to_string()),
        }),
    )?;
    let vendor_id = create_user_with_password(
        &user_store,
        VENDOR_USER,
        VENDOR_PASS,
        "Mama Njeri",
        vendor_profile(VENDOR_BUSINESS),
    )?;
    let second_vendor_id = create_user_with_password(
        &user_store,
        SECOND_VENDOR_USER,
        SECOND_VENDOR_PASS,
        "Baraka",
        vendor_profile(SECOND_VENDOR_BUSINESS),
    )?;
    let rider_id = create_user_with_password(
        &user_store,
        RIDER_USER,
        RIDER_PASS,
        "Otieno",
        Profile::Rider(RiderProfile {
            vehicle_type: Some("motorbike".to_string()),
            phone: None,
            is_available: true,
        }),
    )?;
    let admin_id =
        create_user_with_password(&user_store, ADMIN_USER, ADMIN_PASS, "Admin", Profile::Admin)?;

    let marketplace_store = SqliteMarketplaceStore::new(&marketplace_db_path)?;
    let sukuma_id = marketplace_store
        .create_product(
            vendor_id,
            &product("Sukuma wiki", "vegetables", "bunch", SUKUMA_PRICE_CENTS),
        )?
        .id;
    let tomato_id = marketplace_store
        .create_product(
            vendor_id,
            &product("Tomatoes", "vegetables", "kg", TOMATO_PRICE_CENTS),
        )?
        .id;
    let unga_id = marketplace_store
        .create_product(
            second_vendor_id,
            &product("Unga wa ugali", "cereals", "2kg", UNGA_PRICE_CENTS),
        )?
        .id;

    let ids = SeededIds {
        customer_id,
        vendor_id,
        second_vendor_id,
        rider_id,
        admin_id,
        sukuma_id,
        tomato_id,
        unga_id,
    };
    Ok((dir, user_db_path, marketplace_db_path, ids))
}
