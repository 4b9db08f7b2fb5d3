//! Shopping cart reducer.
//!
//! Entries are keyed by `(product_id, vendor_id)`. The same product may be
//! sold by several vendors, each one is a distinct entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: usize,
    pub vendor_id: usize,
    pub name: String,
    pub unit: String,
    pub unit_price_cents: u64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CartItem {
    pub fn line_total_cents(&self) -> u64 {
        self.unit_price_cents.saturating_mul(self.quantity as u64)
    }

    fn matches(&self, product_id: usize, vendor_id: usize) -> bool {
        self.product_id == product_id && self.vendor_id == vendor_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartAction {
    AddItem(CartItem),
    RemoveItem {
        product_id: usize,
        vendor_id: usize,
    },
    UpdateQuantity {
        product_id: usize,
        vendor_id: usize,
        quantity: u32,
    },
    Clear,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Cannot add product {product_id} with quantity 0")]
    ZeroQuantity { product_id: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: CartAction) -> Result<(), CartError> {
        match action {
            CartAction::AddItem(item) => self.add_item(item)?,
            CartAction::RemoveItem {
                product_id,
                vendor_id,
            } => self.remove_item(product_id, vendor_id),
            CartAction::UpdateQuantity {
                product_id,
                vendor_id,
                quantity,
            } => self.update_quantity(product_id, vendor_id, quantity),
            CartAction::Clear => self.clear(),
        }
        Ok(())
    }

    /// Adds `item`, merging into an existing entry with the same key.
    ///
    /// When merging, only the quantity changes: the stored name, unit and
    /// price are kept from the first add.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 {
            return Err(CartError::ZeroQuantity {
                product_id: item.product_id,
            });
        }
        match self
            .items
            .iter_mut()
            .find(|i| i.matches(item.product_id, item.vendor_id))
        {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            }
            None => self.items.push(item),
        }
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: usize, vendor_id: usize) {
        self.items.retain(|i| !i.matches(product_id, vendor_id));
    }

    /// Quantity 0 removes the entry.
    pub fn update_quantity(&mut self, product_id: usize, vendor_id: usize, quantity: u32) {
        if quantity == 0 {
            self.remove_item(product_id, vendor_id);
            return;
        }
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.matches(product_id, vendor_id))
        {
            existing.quantity = quantity;
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, product_id: usize, vendor_id: usize) -> Option<&CartItem> {
        self.items.iter().find(|i| i.matches(product_id, vendor_id))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|i| i.quantity as u64).sum()
    }

    pub fn subtotal_cents(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |acc, i| acc.saturating_add(i.line_total_cents()))
    }

    pub fn items_by_vendor(&self) -> BTreeMap<usize, Vec<&CartItem>> {
        let mut grouped: BTreeMap<usize, Vec<&CartItem>> = BTreeMap::new();
        for item in &self.items {
            grouped.entry(item.vendor_id).or_default().push(item);
        }
        grouped
    }
}
