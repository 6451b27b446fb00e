//! Per-pharmacy stock ledger.

use std::collections::BTreeMap;

use super::{DateValue, DomainError, DomainResult, ProductRef};

/// One ledger line: a product held in stock.
#[derive(Debug, Clone, PartialEq)]
pub struct StockEntry {
    pub product: ProductRef,
    /// Always greater than zero
    pub quantity: u32,
    /// Date of the most recent receipt
    pub received_on: DateValue,
}

/// Product stock held by one pharmacy.
///
/// Entries never hold a zero quantity: draining an entry removes it, so
/// [`Storage::quantity`] reports 0 for both absent and depleted products.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Storage {
    entries: BTreeMap<String, StockEntry>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive `quantity` units today, accumulating onto any existing entry.
    pub fn add_product(&mut self, product: ProductRef, quantity: u32) -> DomainResult<()> {
        self.add_product_on(product, quantity, DateValue::today())
    }

    /// Receive `quantity` units on a given date.
    pub fn add_product_on(
        &mut self,
        product: ProductRef,
        quantity: u32,
        received_on: DateValue,
    ) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::OutOfRange {
                field: "quantity",
                value: quantity.to_string(),
            });
        }

        match self.entries.get_mut(product.id()) {
            Some(entry) => {
                entry.quantity = entry.quantity.checked_add(quantity).ok_or_else(|| {
                    DomainError::OutOfRange {
                        field: "quantity",
                        value: format!("{} + {}", entry.quantity, quantity),
                    }
                })?;
                entry.received_on = entry.received_on.max(received_on);
            }
            None => {
                self.entries.insert(
                    product.id().to_string(),
                    StockEntry {
                        product,
                        quantity,
                        received_on,
                    },
                );
            }
        }
        Ok(())
    }

    /// Withdraw `quantity` units. Leaves the ledger untouched on failure.
    pub fn remove_product(&mut self, product_id: &str, quantity: u32) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::OutOfRange {
                field: "quantity",
                value: quantity.to_string(),
            });
        }

        let entry = self
            .entries
            .get_mut(product_id)
            .ok_or_else(|| DomainError::NotFound {
                kind: "product",
                id: product_id.to_string(),
            })?;

        if quantity > entry.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: product_id.to_string(),
                available: entry.quantity,
                requested: quantity,
            });
        }

        entry.quantity -= quantity;
        if entry.quantity == 0 {
            self.entries.remove(product_id);
        }
        Ok(())
    }

    /// Drop a product's entry entirely, returning it if present.
    pub fn take_entry(&mut self, product_id: &str) -> Option<StockEntry> {
        self.entries.remove(product_id)
    }

    /// Quantity on hand; 0 if the product is absent.
    pub fn quantity(&self, product_id: &str) -> u32 {
        self.entries.get(product_id).map_or(0, |e| e.quantity)
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.entries.contains_key(product_id)
    }

    pub fn get(&self, product_id: &str) -> Option<&StockEntry> {
        self.entries.get(product_id)
    }

    /// Entries ordered by product ID.
    pub fn entries(&self) -> impl Iterator<Item = &StockEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of base price times quantity over all entries.
    pub fn total_value(&self) -> f64 {
        self.entries
            .values()
            .map(|e| e.product.base_price() * f64::from(e.quantity))
            .sum()
    }
}
