//! The signed in user: profile, cart, checkout and loyalty points.
//!
//! Cart and ledger live in the client state storage, one document per user.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::error::ApiError;
use super::marketplace_routes::after_order_placed;
use super::session::Session;
use super::state::{GuardedClientState, GuardedUserManager, ServerState};
use crate::cart::{Cart, CartAction, CartItem};
use crate::loyalty::{LoyaltyLedger, LoyaltyTier, Reward};
use crate::marketplace::{NewOrder, Order, OrderLineRequest, OrderStore, ProductStore};
use crate::user::{Permission, Profile, ProfileUpdate, User};

#[derive(Serialize)]
struct MeResponse {
    user: User,
    profile: Option<Profile>,
    permissions: Vec<Permission>,
}

#[derive(Serialize)]
struct CartResponse {
    items: Vec<CartItem>,
    total_items: u64,
    subtotal_cents: u64,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        CartResponse {
            total_items: cart.total_items(),
            subtotal_cents: cart.subtotal_cents(),
            items: cart.items,
        }
    }
}

#[derive(Deserialize, Debug)]
struct AddItemBody {
    product_id: usize,
    vendor_id: usize,
    quantity: u32,
}

#[derive(Deserialize, Debug)]
struct QuantityBody {
    quantity: u32,
}

#[derive(Deserialize, Debug, Default)]
struct CheckoutBody {
    delivery_address: Option<String>,
}

#[derive(Serialize, Debug)]
struct CheckoutFailure {
    vendor_id: usize,
    error: String,
}

#[derive(Serialize)]
struct CheckoutResponse {
    orders: Vec<Order>,
    failed: Vec<CheckoutFailure>,
    points_earned: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    loyalty: Option<LoyaltyResponse>,
}

#[derive(Serialize)]
struct LoyaltyResponse {
    #[serde(flatten)]
    ledger: LoyaltyLedger,
    tier: LoyaltyTier,
}

impl From<LoyaltyLedger> for LoyaltyResponse {
    fn from(ledger: LoyaltyLedger) -> Self {
        LoyaltyResponse {
            tier: ledger.tier(),
            ledger,
        }
    }
}

#[derive(Deserialize, Debug)]
struct RedeemBody {
    reward_id: String,
}

#[derive(Serialize)]
struct RedeemResponse {
    reward: Reward,
    loyalty: LoyaltyResponse,
}

async fn get_me(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
) -> Result<Json<MeResponse>, ApiError> {
    let user = user_manager
        .get_user(session.user_id)?
        .ok_or(ApiError::NotFound)?;
    let profile = user_manager.get_profile(session.user_id)?;
    Ok(Json(MeResponse {
        user,
        profile,
        permissions: session.permissions,
    }))
}

async fn update_profile(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    user_manager
        .update_profile(session.user_id, &body)?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn get_cart(
    session: Session,
    State(client_state): State<GuardedClientState>,
) -> Result<Json<CartResponse>, ApiError> {
    session.require(Permission::PlaceOrders)?;
    Ok(Json(client_state.get_cart(session.user_id)?.into()))
}

/// Name, unit and price are taken from the product table, never from the
/// client.
async fn add_cart_item(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<AddItemBody>,
) -> Result<Json<CartResponse>, ApiError> {
    session.require(Permission::PlaceOrders)?;
    let product = state
        .marketplace_store
        .get_product(body.product_id)?
        .filter(|p| p.vendor_id == body.vendor_id)
        .ok_or(ApiError::NotFound)?;
    if !product.is_available {
        return Err(ApiError::BadRequest(format!(
            "Product {} is not available",
            product.id
        )));
    }

    let item = CartItem {
        product_id: product.id,
        vendor_id: product.vendor_id,
        name: product.name,
        unit: product.unit,
        unit_price_cents: product.price_cents,
        quantity: body.quantity,
        image_url: product.image_url,
    };
    let cart = state
        .client_state
        .apply_cart_action(session.user_id, CartAction::AddItem(item))?;
    Ok(Json(cart.into()))
}

async fn update_cart_item(
    session: Session,
    State(client_state): State<GuardedClientState>,
    Path((product_id, vendor_id)): Path<(usize, usize)>,
    Json(body): Json<QuantityBody>,
) -> Result<Json<CartResponse>, ApiError> {
    session.require(Permission::PlaceOrders)?;
    let action = CartAction::UpdateQuantity {
        product_id,
        vendor_id,
        quantity: body.quantity,
    };
    Ok(Json(
        client_state
            .apply_cart_action(session.user_id, action)?
            .into(),
    ))
}

async fn remove_cart_item(
    session: Session,
    State(client_state): State<GuardedClientState>,
    Path((product_id, vendor_id)): Path<(usize, usize)>,
) -> Result<Json<CartResponse>, ApiError> {
    session.require(Permission::PlaceOrders)?;
    let action = CartAction::RemoveItem {
        product_id,
        vendor_id,
    };
    Ok(Json(
        client_state
            .apply_cart_action(session.user_id, action)?
            .into(),
    ))
}

async fn clear_cart(
    session: Session,
    State(client_state): State<GuardedClientState>,
) -> Result<Json<CartResponse>, ApiError> {
    session.require(Permission::PlaceOrders)?;
    Ok(Json(
        client_state
            .apply_cart_action(session.user_id, CartAction::Clear)?
            .into(),
    ))
}

fn order_request(vendor_id: usize, lines: &[CartItem], delivery_address: &str) -> NewOrder {
    NewOrder {
        vendor_id,
        items: lines
            .iter()
            .map(|i| OrderLineRequest {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect(),
        delivery_address: delivery_address.to_string(),
    }
}

async fn checkout(
    session: Session,
    State(state): State<ServerState>,
    body: Option<Json<CheckoutBody>>,
) -> Result<Response, ApiError> {
    session.require(Permission::PlaceOrders)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let delivery_address = match body.delivery_address.filter(|a| !a.trim().is_empty()) {
        Some(address) => address,
        None => match state.user_manager.get_profile(session.user_id)? {
            Some(Profile::Customer(p)) => p
                .default_address
                .filter(|a| !a.trim().is_empty())
                .ok_or_else(|| ApiError::BadRequest("A delivery address is required".to_string()))?,
            _ => {
                return Err(ApiError::BadRequest(
                    "A delivery address is required".to_string(),
                ))
            }
        },
    };

    let store = state.marketplace_store.clone();
    let outcome = state.client_state.checkout(session.user_id, |vendor_id, lines| {
        let request = order_request(vendor_id, lines, &delivery_address);
        store.place_order(session.user_id, &request).map_err(|e| {
            if !e.is_client_error() {
                error!("Checkout order for vendor {} failed: {:#}", vendor_id, e);
            }
            ApiError::from(e)
        })
    })?;

    let orders = outcome.placed;
    if orders.is_empty() {
        return Err(outcome
            .failed
            .into_iter()
            .next()
            .map(|(_, e)| e)
            .unwrap_or_else(|| ApiError::BadRequest("Cart is empty".to_string())));
    }
    let failed: Vec<CheckoutFailure> = outcome
        .failed
        .into_iter()
        .map(|(vendor_id, e)| CheckoutFailure {
            vendor_id,
            error: e.to_string(),
        })
        .collect();

    // The orders are placed whatever happens to the points.
    let total_cents: u64 = orders.iter().map(|o| o.total_cents).sum();
    let (points_earned, loyalty) = match state.client_state.earn_points(
        session.user_id,
        total_cents,
        &format!("Checkout of {} order(s)", orders.len()),
    ) {
        Ok((points, ledger)) => (points, Some(LoyaltyResponse::from(ledger))),
        Err(e) => {
            error!(
                "Could not credit {} cents of spend to customer {}: {}",
                total_cents, session.user_id, e
            );
            (0, None)
        }
    };
    info!(
        "Customer {} checked out {} orders ({} failed), earned {} points",
        session.user_id,
        orders.len(),
        failed.len(),
        points_earned
    );
    if !failed.is_empty() {
        warn!("Checkout for {} left {} vendors in the cart", session.user_id, failed.len());
    }

    for order in &orders {
        after_order_placed(&state, order, "checkout").await;
    }

    let response = CheckoutResponse {
        orders,
        failed,
        points_earned,
        loyalty,
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

async fn get_loyalty(
    session: Session,
    State(client_state): State<GuardedClientState>,
) -> Result<Json<LoyaltyResponse>, ApiError> {
    session.require(Permission::PlaceOrders)?;
    Ok(Json(client_state.get_loyalty(session.user_id)?.into()))
}

async fn redeem_reward(
    session: Session,
    State(client_state): State<GuardedClientState>,
    Json(body): Json<RedeemBody>,
) -> Result<Json<RedeemResponse>, ApiError> {
    session.require(Permission::PlaceOrders)?;
    let (reward, ledger) = client_state.redeem(session.user_id, &body.reward_id)?;
    info!(
        "Customer {} redeemed {} for {} points",
        session.user_id, reward.id, reward.points_required
    );
    Ok(Json(RedeemResponse {
        reward,
        loyalty: ledger.into(),
    }))
}

async fn list_rewards(State(client_state): State<GuardedClientState>) -> Json<Vec<Reward>> {
    Json(client_state.rewards().active().cloned().collect())
}

pub fn make_me_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", get(get_me))
        .route("/profile", put(update_profile))
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_cart_item))
        .route(
            "/cart/items/{product_id}/{vendor_id}",
            put(update_cart_item).delete(remove_cart_item),
        )
        .route("/cart/checkout", post(checkout))
        .route("/loyalty", get(get_loyalty))
        .route("/loyalty/redeem", post(redeem_reward))
        .with_state(state)
}

pub fn make_loyalty_routes(state: ServerState) -> Router {
    Router::new()
        .route("/rewards", get(list_rewards))
        .with_state(state)
}
