use super::models::*;
use super::store::{DailyStatsStore, OrderStore, ProductStore};
use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned_db, Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
    DEFAULT_TIMESTAMP,
};
use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, types::Type, types::Value, Connection, OptionalExtension, Row};
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{debug, info};

/// V 0
const PRODUCT_TABLE_V_0: Table = Table {
    name: "product",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("vendor_id", &SqlType::Integer, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!("category", &SqlType::Text, non_null = true),
        sqlite_column!("unit", &SqlType::Text, non_null = true),
        sqlite_column!("price_cents", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "stock",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "is_available",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
        sqlite_column!("image_url", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[
        ("idx_product_vendor", "vendor_id"),
        ("idx_product_category", "category"),
    ],
};

const ORDER_TABLE_V_0: Table = Table {
    name: "customer_order",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true
        ),
        sqlite_column!("customer_id", &SqlType::Integer, non_null = true),
        sqlite_column!("vendor_id", &SqlType::Integer, non_null = true),
        sqlite_column!("rider_id", &SqlType::Integer),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("total_cents", &SqlType::Integer, non_null = true),
        sqlite_column!("delivery_address", &SqlType::Text, non_null = true),
        sqlite_column!("created", &SqlType::Integer, non_null = true),
        sqlite_column!("updated", &SqlType::Integer, non_null = true),
    ],
    unique_constraints: &[],
    indices: &[
        ("idx_order_customer", "customer_id"),
        ("idx_order_vendor", "vendor_id"),
        ("idx_order_created", "created"),
    ],
};

const ORDER_ITEM_TABLE_V_0: Table = Table {
    name: "order_item",
    columns: &[
        sqlite_column!(
            "order_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "customer_order",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("product_id", &SqlType::Integer, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("unit", &SqlType::Text, non_null = true),
        sqlite_column!("unit_price_cents", &SqlType::Integer, non_null = true),
        sqlite_column!("quantity", &SqlType::Integer, non_null = true),
    ],
    unique_constraints: &[],
    indices: &[("idx_order_item_order", "order_id")],
};

const DAILY_STATS_TABLE_V_0: Table = Table {
    name: "daily_stats",
    columns: &[
        sqlite_column!("date", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "orders_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "delivered_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "cancelled_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "revenue_cents",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "new_users",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[],
};

const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        PRODUCT_TABLE_V_0,
        ORDER_TABLE_V_0,
        ORDER_ITEM_TABLE_V_0,
        DAILY_STATS_TABLE_V_0,
    ],
    migration: None,
}];

const PRODUCT_COLUMNS: &str =
    "id, vendor_id, name, description, category, unit, price_cents, stock, is_available, image_url, created";
const ORDER_COLUMNS: &str =
    "id, customer_id, vendor_id, rider_id, status, total_cents, delivery_address, created, updated";

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn product_from_row(row: &Row) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        vendor_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        unit: row.get(5)?,
        price_cents: row.get(6)?,
        stock: row.get(7)?,
        is_available: row.get(8)?,
        image_url: row.get(9)?,
        created: row.get(10)?,
    })
}

/// Reads an order row; items are filled in by `load_items`.
fn order_from_row(row: &Row) -> rusqlite::Result<Order> {
    let status_raw: String = row.get(4)?;
    let status = OrderStatus::from_str(&status_raw).ok_or(rusqlite::Error::InvalidColumnType(
        4,
        "status".to_string(),
        Type::Text,
    ))?;
    Ok(Order {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        vendor_id: row.get(2)?,
        rider_id: row.get(3)?,
        status,
        items: vec![],
        total_cents: row.get(5)?,
        delivery_address: row.get(6)?,
        created: row.get(7)?,
        updated: row.get(8)?,
    })
}

fn query_product(conn: &Connection, product_id: usize) -> rusqlite::Result<Option<Product>> {
    conn.query_row(
        &format!("SELECT {} FROM product WHERE id = ?1", PRODUCT_COLUMNS),
        params![product_id],
        product_from_row,
    )
    .optional()
}

fn load_items(conn: &Connection, order_id: &str) -> rusqlite::Result<Vec<OrderItem>> {
    let mut stmt = conn.prepare(
        "SELECT product_id, name, unit, unit_price_cents, quantity FROM order_item WHERE order_id = ?1 ORDER BY rowid",
    )?;
    let items = stmt
        .query_map(params![order_id], |row| {
            Ok(OrderItem {
                product_id: row.get(0)?,
                name: row.get(1)?,
                unit: row.get(2)?,
                unit_price_cents: row.get(3)?,
                quantity: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

fn query_order(conn: &Connection, order_id: &str) -> rusqlite::Result<Option<Order>> {
    let order = conn
        .query_row(
            &format!("SELECT {} FROM customer_order WHERE id = ?1", ORDER_COLUMNS),
            params![order_id],
            order_from_row,
        )
        .optional()?;
    match order {
        Some(mut order) => {
            order.items = load_items(conn, &order.id)?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

fn query_orders(conn: &Connection, sql: &str, args: Vec<Value>) -> rusqlite::Result<Vec<Order>> {
    let mut stmt = conn.prepare(sql)?;
    let mut orders = stmt
        .query_map(params_from_iter(args), order_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for order in orders.iter_mut() {
        order.items = load_items(conn, &order.id)?;
    }
    Ok(orders)
}

/// Sums quantities of repeated product lines, keeping first-seen order.
fn merge_lines(lines: &[OrderLineRequest]) -> Result<Vec<(usize, u32)>, OrderError> {
    let mut merged: Vec<(usize, u32)> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 {
            return Err(OrderError::ZeroQuantity(line.product_id));
        }
        match merged.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, quantity)) => *quantity = quantity.saturating_add(line.quantity),
            None => merged.push((line.product_id, line.quantity)),
        }
    }
    Ok(merged)
}

#[derive(Clone)]
pub struct SqliteMarketplaceStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMarketplaceStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, VERSIONED_SCHEMAS)?;
        Ok(SqliteMarketplaceStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl ProductStore for SqliteMarketplaceStore {
    fn create_product(&self, vendor_id: usize, product: &NewProduct) -> Result<Product> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO product (vendor_id, name, description, category, unit, price_cents, stock, is_available, image_url) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                vendor_id,
                product.name.trim(),
                product.description,
                product.category.trim(),
                product.unit.trim(),
                product.price_cents,
                product.stock,
                product.is_available,
                product.image_url,
            ],
        )
        .with_context(|| format!("Failed to create product for vendor {}", vendor_id))?;
        let id = conn.last_insert_rowid() as usize;
        query_product(&conn, id)?.context("Product vanished after insert")
    }

    fn get_product(&self, product_id: usize) -> Result<Option<Product>> {
        let conn = self.conn.lock().unwrap();
        Ok(query_product(&conn, product_id)?)
    }

    fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut clauses: Vec<&str> = vec![];
        let mut args: Vec<Value> = vec![];
        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            args.push(Value::Text(category.to_lowercase()));
            clauses.push("LOWER(category) = ?");
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search.to_lowercase());
            args.push(Value::Text(pattern.clone()));
            args.push(Value::Text(pattern));
            clauses.push("(LOWER(name) LIKE ? OR LOWER(COALESCE(description, '')) LIKE ?)");
        }
        if let Some(vendor_id) = filter.vendor_id {
            args.push(Value::Integer(vendor_id as i64));
            clauses.push("vendor_id = ?");
        }
        if filter.only_available {
            clauses.push("is_available = 1");
        }

        let mut sql = format!("SELECT {} FROM product", PRODUCT_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE, id");

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map(params_from_iter(args), product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    fn update_product(
        &self,
        product_id: usize,
        vendor_id: usize,
        update: &ProductUpdate,
    ) -> Result<Option<Product>> {
        let conn = self.conn.lock().unwrap();
        let mut product = match query_product(&conn, product_id)? {
            Some(p) if p.vendor_id == vendor_id => p,
            _ => return Ok(None),
        };
        update.apply_to(&mut product);
        conn.execute(
            "UPDATE product SET name = ?1, description = ?2, category = ?3, unit = ?4, price_cents = ?5, \
             stock = ?6, is_available = ?7, image_url = ?8 WHERE id = ?9",
            params![
                product.name,
                product.description,
                product.category,
                product.unit,
                product.price_cents,
                product.stock,
                product.is_available,
                product.image_url,
                product.id,
            ],
        )?;
        Ok(Some(product))
    }

    fn delete_product(&self, product_id: usize, vendor_id: usize) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM product WHERE id = ?1 AND vendor_id = ?2",
            params![product_id, vendor_id],
        )?;
        Ok(deleted > 0)
    }
}

impl OrderStore for SqliteMarketplaceStore {
    fn place_order(&self, customer_id: usize, order: &NewOrder) -> Result<Order, OrderError> {
        if order.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        let delivery_address = order.delivery_address.trim();
        if delivery_address.is_empty() {
            return Err(OrderError::MissingAddress);
        }
        let lines = merge_lines(&order.items)?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut items = Vec::with_capacity(lines.len());
        let mut total_cents: u64 = 0;
        for (product_id, quantity) in lines {
            let product =
                query_product(&tx, product_id)?.ok_or(OrderError::UnknownProduct(product_id))?;
            if product.vendor_id != order.vendor_id {
                return Err(OrderError::WrongVendor {
                    product_id,
                    vendor_id: order.vendor_id,
                });
            }
            if !product.is_available {
                return Err(OrderError::ProductUnavailable(product_id));
            }
            if product.stock < quantity {
                return Err(OrderError::InsufficientStock {
                    product_id,
                    available: product.stock,
                    requested: quantity,
                });
            }
            tx.execute(
                "UPDATE product SET stock = stock - ?1 WHERE id = ?2",
                params![quantity, product_id],
            )?;
            total_cents =
                total_cents.saturating_add(product.price_cents.saturating_mul(quantity as u64));
            items.push(OrderItem {
                product_id,
                name: product.name,
                unit: product.unit,
                unit_price_cents: product.price_cents,
                quantity,
            });
        }

        let now = unix_now();
        let placed = Order {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id,
            vendor_id: order.vendor_id,
            rider_id: None,
            status: OrderStatus::Pending,
            items,
            total_cents,
            delivery_address: delivery_address.to_string(),
            created: now,
            updated: now,
        };
        tx.execute(
            &format!(
                "INSERT INTO customer_order ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                ORDER_COLUMNS
            ),
            params![
                placed.id,
                placed.customer_id,
                placed.vendor_id,
                placed.rider_id,
                placed.status.as_str(),
                placed.total_cents,
                placed.delivery_address,
                placed.created,
                placed.updated,
            ],
        )?;
        for item in &placed.items {
            tx.execute(
                "INSERT INTO order_item (order_id, product_id, name, unit, unit_price_cents, quantity) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    placed.id,
                    item.product_id,
                    item.name,
                    item.unit,
                    item.unit_price_cents,
                    item.quantity
                ],
            )?;
        }
        tx.commit()?;
        info!(
            "Order {} placed by customer {} with vendor {} for {} cents",
            placed.id, customer_id, placed.vendor_id, placed.total_cents
        );
        Ok(placed)
    }

    fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        let conn = self.conn.lock().unwrap();
        Ok(query_order(&conn, order_id)?)
    }

    fn list_orders(&self, party: OrderParty) -> Result<Vec<Order>> {
        let (clause, args) = match party {
            OrderParty::Customer(id) => ("WHERE customer_id = ?1", vec![Value::Integer(id as i64)]),
            OrderParty::Vendor(id) => ("WHERE vendor_id = ?1", vec![Value::Integer(id as i64)]),
            OrderParty::Rider(id) => ("WHERE rider_id = ?1", vec![Value::Integer(id as i64)]),
            OrderParty::Everyone => ("", vec![]),
        };
        let sql = format!(
            "SELECT {} FROM customer_order {} ORDER BY created DESC, rowid DESC",
            ORDER_COLUMNS, clause
        );
        let conn = self.conn.lock().unwrap();
        Ok(query_orders(&conn, &sql, args)?)
    }

    fn list_claimable_orders(&self) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM customer_order WHERE rider_id IS NULL AND status IN (?1, ?2) ORDER BY created, rowid",
            ORDER_COLUMNS
        );
        let conn = self.conn.lock().unwrap();
        Ok(query_orders(
            &conn,
            &sql,
            vec![
                Value::Text(OrderStatus::Confirmed.as_str().to_string()),
                Value::Text(OrderStatus::Preparing.as_str().to_string()),
            ],
        )?)
    }

    fn update_order_status(
        &self,
        order_id: &str,
        expected: Option<OrderStatus>,
        status: OrderStatus,
    ) -> Result<(Order, OrderStatus), OrderError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut order =
            query_order(&tx, order_id)?.ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        let previous = order.status;
        if let Some(expected) = expected.filter(|e| *e != previous) {
            return Err(OrderError::StatusChanged {
                expected,
                actual: previous,
            });
        }
        if !previous.can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: previous,
                to: status,
            });
        }

        if status == OrderStatus::Cancelled {
            for item in &order.items {
                tx.execute(
                    "UPDATE product SET stock = stock + ?1 WHERE id = ?2",
                    params![item.quantity, item.product_id],
                )?;
            }
            debug!("Returned stock of cancelled order {}", order_id);
        }

        let now = unix_now();
        let updated = tx.execute(
            "UPDATE customer_order SET status = ?1, updated = ?2 WHERE id = ?3 AND status = ?4",
            params![status.as_str(), now, order_id, previous.as_str()],
        )?;
        if updated != 1 {
            return Err(OrderError::Internal(anyhow::anyhow!(
                "Order {} changed during status update",
                order_id
            )));
        }
        tx.commit()?;

        order.status = status;
        order.updated = now;
        Ok((order, previous))
    }

    fn assign_rider(&self, order_id: &str, rider_id: usize) -> Result<Order, OrderError> {
        let conn = self.conn.lock().unwrap();
        let mut order = query_order(&conn, order_id)?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        if order.rider_id.is_some() {
            return Err(OrderError::AlreadyAssigned(order_id.to_string()));
        }
        if !order.status.is_claimable() {
            return Err(OrderError::NotClaimable(order.status));
        }
        let now = unix_now();
        conn.execute(
            "UPDATE customer_order SET rider_id = ?1, updated = ?2 WHERE id = ?3 AND rider_id IS NULL",
            params![rider_id, now, order_id],
        )?;
        order.rider_id = Some(rider_id);
        order.updated = now;
        Ok(order)
    }
}

impl DailyStatsStore for SqliteMarketplaceStore {
    fn compute_daily_stats(&self, date: u32, start: i64, end: i64) -> Result<DailyStats> {
        let conn = self.conn.lock().unwrap();
        let (orders, delivered, cancelled, revenue) = conn.query_row(
            "SELECT COUNT(*), \
                    COALESCE(SUM(CASE WHEN status = ?3 THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN status = ?4 THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN status = ?3 THEN total_cents ELSE 0 END), 0) \
             FROM customer_order WHERE created >= ?1 AND created < ?2",
            params![
                start,
                end,
                OrderStatus::Delivered.as_str(),
                OrderStatus::Cancelled.as_str()
            ],
            |row| {
                Ok((
                    row.get::<usize, i64>(0)?,
                    row.get::<usize, i64>(1)?,
                    row.get::<usize, i64>(2)?,
                    row.get::<usize, i64>(3)?,
                ))
            },
        )?;
        Ok(DailyStats {
            date,
            orders_count: orders.max(0) as u64,
            delivered_count: delivered.max(0) as u64,
            cancelled_count: cancelled.max(0) as u64,
            revenue_cents: revenue.max(0) as u64,
            new_users: 0,
        })
    }

    fn upsert_daily_stats(&self, stats: &DailyStats) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO daily_stats (date, orders_count, delivered_count, cancelled_count, revenue_cents, new_users, updated) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(date) DO UPDATE SET orders_count = excluded.orders_count, \
                delivered_count = excluded.delivered_count, cancelled_count = excluded.cancelled_count, \
                revenue_cents = excluded.revenue_cents, new_users = excluded.new_users, updated = excluded.updated",
            params![
                stats.date,
                stats.orders_count,
                stats.delivered_count,
                stats.cancelled_count,
                stats.revenue_cents,
                stats.new_users,
                unix_now(),
            ],
        )?;
        Ok(())
    }

    fn get_daily_stats(&self, days: usize) -> Result<Vec<DailyStats>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT date, orders_count, delivered_count, cancelled_count, revenue_cents, new_users \
             FROM daily_stats ORDER BY date DESC LIMIT ?1",
        )?;
        let stats = stmt
            .query_map(params![days], |row| {
                Ok(DailyStats {
                    date: row.get(0)?,
                    orders_count: row.get(1)?,
                    delivered_count: row.get(2)?,
                    cancelled_count: row.get(3)?,
                    revenue_cents: row.get(4)?,
                    new_users: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stats)
    }
}
