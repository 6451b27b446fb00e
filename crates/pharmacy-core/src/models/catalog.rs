//! Product catalog keyed by product ID.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::{DomainError, DomainResult, Product, ProductRef};

/// All products known to the application.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    items: BTreeMap<String, ProductRef>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product, returning the shared handle. Duplicate IDs fail.
    pub fn add(&mut self, product: Product) -> DomainResult<ProductRef> {
        let product = Rc::new(product);
        self.insert(product.clone())?;
        Ok(product)
    }

    /// Add an already shared product. Duplicate IDs fail.
    pub fn insert(&mut self, product: ProductRef) -> DomainResult<()> {
        if self.items.contains_key(product.id()) {
            return Err(DomainError::Duplicate {
                kind: "product",
                id: product.id().to_string(),
            });
        }
        self.items.insert(product.id().to_string(), product);
        Ok(())
    }

    /// Remove a product and every analogue link pointing at it.
    pub fn remove(&mut self, id: &str) -> DomainResult<ProductRef> {
        let removed = self.items.remove(id).ok_or_else(|| not_found(id))?;
        for other in self.items.values() {
            other.remove_analogue(id);
        }
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> DomainResult<ProductRef> {
        self.items.get(id).cloned().ok_or_else(|| not_found(id))
    }

    pub fn find(&self, id: &str) -> Option<&ProductRef> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Products ordered by ID.
    pub fn iter(&self) -> impl Iterator<Item = &ProductRef> {
        self.items.values()
    }

    /// Record `analogue_id` as an explicit analogue of `medicine_id`.
    pub fn link_analogue(&self, medicine_id: &str, analogue_id: &str) -> DomainResult<()> {
        let medicine = self.items.get(medicine_id).ok_or_else(|| not_found(medicine_id))?;
        if !self.items.contains_key(analogue_id) {
            return Err(not_found(analogue_id));
        }
        medicine.add_analogue(analogue_id)
    }

    pub fn unlink_analogue(&self, medicine_id: &str, analogue_id: &str) -> DomainResult<bool> {
        let medicine = self.items.get(medicine_id).ok_or_else(|| not_found(medicine_id))?;
        Ok(medicine.remove_analogue(analogue_id))
    }

    /// Explicit analogues resolved through the catalog. Unknown IDs are skipped.
    pub fn explicit_analogues(&self, medicine_id: &str) -> DomainResult<Vec<ProductRef>> {
        let medicine = self.items.get(medicine_id).ok_or_else(|| not_found(medicine_id))?;
        Ok(medicine
            .analogues()
            .iter()
            .filter_map(|id| self.items.get(id).cloned())
            .collect())
    }

    /// Other products sharing the active substance (case-insensitive).
    pub fn substance_analogues(&self, product_id: &str) -> DomainResult<Vec<ProductRef>> {
        let product = self.items.get(product_id).ok_or_else(|| not_found(product_id))?;
        let substance = product.active_substance().trim().to_lowercase();
        Ok(self
            .items
            .values()
            .filter(|p| p.id() != product_id)
            .filter(|p| p.active_substance().trim().to_lowercase() == substance)
            .cloned()
            .collect())
    }

    /// Products whose expiration date has passed.
    pub fn expired(&self) -> Vec<ProductRef> {
        self.items.values().filter(|p| p.is_expired()).cloned().collect()
    }
}

fn not_found(id: &str) -> DomainError {
    DomainError::NotFound {
        kind: "product",
        id: id.to_string(),
    }
}
