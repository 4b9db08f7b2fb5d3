//! Products, orders and daily statistics.

mod models;
mod sqlite_marketplace_store;
mod store;

pub use models::{
    DailyStats, NewOrder, NewProduct, Order, OrderError, OrderItem, OrderLineRequest, OrderParty,
    OrderStatus, Product, ProductFilter, ProductUpdate,
};
pub use sqlite_marketplace_store::SqliteMarketplaceStore;
pub use store::{DailyStatsStore, MarketplaceStore, OrderStore, ProductStore};
