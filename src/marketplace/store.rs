use super::models::{
    DailyStats, NewOrder, NewProduct, Order, OrderError, OrderParty, OrderStatus, Product,
    ProductFilter, ProductUpdate,
};
use anyhow::Result;

pub trait ProductStore: Send + Sync {
    fn create_product(&self, vendor_id: usize, product: &NewProduct) -> Result<Product>;

    /// Returns Ok(None) if the product does not exist.
    fn get_product(&self, product_id: usize) -> Result<Option<Product>>;

    fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;

    /// Returns Ok(None) if the product does not exist or is owned by another vendor.
    fn update_product(
        &self,
        product_id: usize,
        vendor_id: usize,
        update: &ProductUpdate,
    ) -> Result<Option<Product>>;

    /// Returns false if nothing was deleted.
    fn delete_product(&self, product_id: usize, vendor_id: usize) -> Result<bool>;
}

pub trait OrderStore: Send + Sync {
    /// Validates the lines against the product table, prices them and
    /// decrements stock, all in one transaction.
    fn place_order(&self, customer_id: usize, order: &NewOrder) -> Result<Order, OrderError>;

    fn get_order(&self, order_id: &str) -> Result<Option<Order>>;

    /// Newest first.
    fn list_orders(&self, party: OrderParty) -> Result<Vec<Order>>;

    /// Orders without a rider that a rider may claim, oldest first.
    fn list_claimable_orders(&self) -> Result<Vec<Order>>;

    /// Applies a status transition, returning the updated order and the
    /// status it had before. Cancelling returns the items to stock.
    ///
    /// With `expected` set the change only applies while the order is still
    /// in that status, otherwise it fails with `OrderError::StatusChanged`.
    fn update_order_status(
        &self,
        order_id: &str,
        expected: Option<OrderStatus>,
        status: OrderStatus,
    ) -> Result<(Order, OrderStatus), OrderError>;

    fn assign_rider(&self, order_id: &str, rider_id: usize) -> Result<Order, OrderError>;
}

pub trait DailyStatsStore: Send + Sync {
    /// Aggregates orders created in `[start, end)` unix seconds into a row
    /// for `date`. `new_users` is left at 0.
    fn compute_daily_stats(&self, date: u32, start: i64, end: i64) -> Result<DailyStats>;

    fn upsert_daily_stats(&self, stats: &DailyStats) -> Result<()>;

    /// The most recent `days` rows, newest first.
    fn get_daily_stats(&self, days: usize) -> Result<Vec<DailyStats>>;
}

pub trait MarketplaceStore: ProductStore + OrderStore + DailyStatsStore + Send + Sync {}

impl<T: ProductStore + OrderStore + DailyStatsStore> MarketplaceStore for T {}
