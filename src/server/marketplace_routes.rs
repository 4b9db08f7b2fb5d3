//! Vendors, products and orders.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::error::ApiError;
use super::metrics;
use super::session::Session;
use super::state::{GuardedMarketplaceStore, GuardedUserManager, ServerState};
use crate::background_jobs::HookEvent;
use crate::marketplace::{
    NewOrder, NewProduct, Order, OrderParty, OrderStatus, OrderStore, Product, ProductFilter,
    ProductStore, ProductUpdate,
};
use crate::user::{Permission, UserRole, UserStore, VendorSummary};

#[derive(Deserialize, Debug)]
struct StatusBody {
    status: OrderStatus,
}

async fn list_vendors(
    State(user_manager): State<GuardedUserManager>,
) -> Result<Json<Vec<VendorSummary>>, ApiError> {
    Ok(Json(user_manager.store().list_vendors()?))
}

async fn get_vendor(
    State(user_manager): State<GuardedUserManager>,
    Path(id): Path<usize>,
) -> Result<Json<VendorSummary>, ApiError> {
    user_manager
        .store()
        .get_vendor(id)?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn get_vendor_products(
    State(state): State<ServerState>,
    Path(id): Path<usize>,
) -> Result<Json<Vec<Product>>, ApiError> {
    if state.user_manager.store().get_vendor(id)?.is_none() {
        return Err(ApiError::NotFound);
    }
    let filter = ProductFilter {
        vendor_id: Some(id),
        only_available: true,
        ..Default::default()
    };
    Ok(Json(state.marketplace_store.list_products(&filter)?))
}

async fn list_products(
    State(store): State<GuardedMarketplaceStore>,
    Query(mut filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>, ApiError> {
    filter.only_available = true;
    Ok(Json(store.list_products(&filter)?))
}

async fn get_product(
    State(store): State<GuardedMarketplaceStore>,
    Path(id): Path<usize>,
) -> Result<Json<Product>, ApiError> {
    store.get_product(id)?.map(Json).ok_or(ApiError::NotFound)
}

async fn create_product(
    session: Session,
    State(store): State<GuardedMarketplaceStore>,
    Json(body): Json<NewProduct>,
) -> Result<Response, ApiError> {
    session.require(Permission::ManageStore)?;
    body.validate().map_err(ApiError::BadRequest)?;
    let product = store.create_product(session.user_id, &body)?;
    info!(
        "Vendor {} listed product {} ({})",
        session.user_id, product.id, product.name
    );
    Ok((StatusCode::CREATED, Json(product)).into_response())
}

async fn update_product(
    session: Session,
    State(store): State<GuardedMarketplaceStore>,
    Path(id): Path<usize>,
    Json(body): Json<ProductUpdate>,
) -> Result<Json<Product>, ApiError> {
    session.require(Permission::ManageStore)?;
    body.validate().map_err(ApiError::BadRequest)?;
    store
        .update_product(id, session.user_id, &body)?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn delete_product(
    session: Session,
    State(store): State<GuardedMarketplaceStore>,
    Path(id): Path<usize>,
) -> Result<StatusCode, ApiError> {
    session.require(Permission::ManageStore)?;
    if store.delete_product(id, session.user_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

/// Side effects shared by every way of placing an order.
pub(super) async fn after_order_placed(state: &ServerState, order: &Order, source: &str) {
    metrics::record_order_placed(source);
    if let Err(e) = state.notifications.fan_out_order_update(order, None).await {
        warn!("Failed to notify about new order {}: {:#}", order.id, e);
    }
    if let Some(handle) = &state.scheduler_handle {
        handle.fire_hook(HookEvent::OnOrderPlaced);
    }
}

async fn place_order(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<NewOrder>,
) -> Result<Response, ApiError> {
    session.require(Permission::PlaceOrders)?;
    let order = state.marketplace_store.place_order(session.user_id, &body)?;
    info!(
        "Customer {} placed order {} with vendor {}",
        session.user_id, order.id, order.vendor_id
    );
    after_order_placed(&state, &order, "direct").await;
    Ok((StatusCode::CREATED, Json(order)).into_response())
}

async fn list_orders(
    session: Session,
    State(store): State<GuardedMarketplaceStore>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let party = OrderParty::for_user(session.user_id, session.role);
    Ok(Json(store.list_orders(party)?))
}

async fn list_available_orders(
    session: Session,
    State(store): State<GuardedMarketplaceStore>,
) -> Result<Json<Vec<Order>>, ApiError> {
    session.require(Permission::DeliverOrders)?;
    Ok(Json(store.list_claimable_orders()?))
}

/// Parties of the order and admins may see it. Riders may also look at
/// orders they could claim.
fn can_view(session: &Session, order: &Order) -> bool {
    order.involves(session.user_id)
        || session.has_permission(Permission::ManageMarketplace)
        || (session.has_permission(Permission::DeliverOrders)
            && order.rider_id.is_none()
            && order.status.is_claimable())
}

async fn get_order(
    session: Session,
    State(store): State<GuardedMarketplaceStore>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = store.get_order(&id)?.ok_or(ApiError::NotFound)?;
    if !can_view(&session, &order) {
        return Err(ApiError::NotFound);
    }
    Ok(Json(order))
}

async fn update_order_status(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Order>, ApiError> {
    let current = state
        .marketplace_store
        .get_order(&id)?
        .ok_or(ApiError::NotFound)?;
    if session.role != UserRole::Admin && !current.involves(session.user_id) {
        return Err(ApiError::NotFound);
    }
    if !current.status.may_be_set_by(session.role, body.status) {
        return Err(ApiError::Forbidden);
    }

    // Permission was checked against this status; the store refuses the
    // change if another request moved the order in between.
    let (order, previous) = state.marketplace_store.update_order_status(
        &id,
        Some(current.status),
        body.status,
    )?;
    metrics::record_order_status_change(order.status.as_str());
    info!(
        "Order {} moved {} -> {} by user {}",
        order.id,
        previous.as_str(),
        order.status.as_str(),
        session.user_id
    );

    if let Err(e) = state
        .notifications
        .fan_out_order_update(&order, Some(previous))
        .await
    {
        warn!("Failed to notify about order {}: {:#}", order.id, e);
    }
    Ok(Json(order))
}

async fn claim_order(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    session.require(Permission::DeliverOrders)?;
    let order = state.marketplace_store.assign_rider(&id, session.user_id)?;
    info!("Rider {} claimed order {}", session.user_id, order.id);

    if let Err(e) = state.notifications.notify_rider_assigned(&order).await {
        warn!("Failed to notify about rider for order {}: {:#}", order.id, e);
    }
    Ok(Json(order))
}

pub fn make_marketplace_routes(state: ServerState) -> Router {
    Router::new()
        .route("/vendors", get(list_vendors))
        .route("/vendors/{id}", get(get_vendor))
        .route("/vendors/{id}/products", get(get_vendor_products))
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/orders", get(list_orders).post(place_order))
        .route("/orders/available", get(list_available_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/status", put(update_order_status))
        .route("/orders/{id}/claim", post(claim_order))
        .with_state(state)
}
