//! Pharmacy branch model.

use std::cmp::Ordering;

use super::{
    require_range, require_text, DateValue, DomainError, DomainResult, ProductRef, Storage,
};

/// A pharmacy branch with its own stock ledger.
///
/// Branches compare and order by `id` only.
#[derive(Debug, Clone)]
pub struct Pharmacy {
    id: u32,
    name: String,
    address: String,
    phone: String,
    rent_cost: f64,
    storage: Storage,
}

impl Pharmacy {
    /// Create a branch with an empty stock ledger.
    pub fn new(
        id: u32,
        name: impl Into<String>,
        address: impl Into<String>,
        phone: impl Into<String>,
        rent_cost: f64,
    ) -> DomainResult<Self> {
        if id == 0 {
            return Err(DomainError::InvalidField {
                field: "pharmacy id",
                reason: "must be positive".into(),
            });
        }
        let mut pharmacy = Self {
            id,
            name: String::new(),
            address: String::new(),
            phone: String::new(),
            rent_cost: 0.0,
            storage: Storage::new(),
        };
        pharmacy.set_name(name)?;
        pharmacy.set_address(address)?;
        pharmacy.set_phone(phone)?;
        pharmacy.set_rent_cost(rent_cost)?;
        Ok(pharmacy)
    }

    /// Name given to branches recorded without one.
    pub fn default_name(id: u32) -> String {
        format!("Аптека №{}", id)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn rent_cost(&self) -> f64 {
        self.rent_cost
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> DomainResult<()> {
        let name = name.into();
        require_text("pharmacy name", &name)?;
        self.name = name;
        Ok(())
    }

    pub fn set_address(&mut self, address: impl Into<String>) -> DomainResult<()> {
        let address = address.into();
        require_text("address", &address)?;
        self.address = address;
        Ok(())
    }

    pub fn set_phone(&mut self, phone: impl Into<String>) -> DomainResult<()> {
        let phone = phone.into();
        require_text("phone", &phone)?;
        self.phone = phone;
        Ok(())
    }

    pub fn set_rent_cost(&mut self, rent_cost: f64) -> DomainResult<()> {
        require_range("rent_cost", rent_cost, false, f64::MAX)?;
        self.rent_cost = rent_cost;
        Ok(())
    }

    pub fn add_stock(&mut self, product: ProductRef, quantity: u32) -> DomainResult<()> {
        self.storage
            .add_product(product, quantity)
            .map_err(|e| e.in_pharmacy(self.id))
    }

    pub fn add_stock_on(
        &mut self,
        product: ProductRef,
        quantity: u32,
        received_on: DateValue,
    ) -> DomainResult<()> {
        self.storage
            .add_product_on(product, quantity, received_on)
            .map_err(|e| e.in_pharmacy(self.id))
    }

    pub fn remove_stock(&mut self, product_id: &str, quantity: u32) -> DomainResult<()> {
        self.storage
            .remove_product(product_id, quantity)
            .map_err(|e| e.in_pharmacy(self.id))
    }

    /// Drop a product from this branch regardless of quantity; returns what was held.
    pub fn clear_stock(&mut self, product_id: &str) -> u32 {
        self.storage
            .take_entry(product_id)
            .map_or(0, |entry| entry.quantity)
    }

    pub fn quantity(&self, product_id: &str) -> u32 {
        self.storage.quantity(product_id)
    }

    pub fn has_product(&self, product_id: &str) -> bool {
        self.storage.contains(product_id)
    }

    /// Explicit analogues of `medicine_id` that this branch holds in stock.
    ///
    /// Availability is branch-local: an analogue stocked elsewhere is not returned.
    pub fn find_available_analogues(&self, medicine_id: &str) -> DomainResult<Vec<ProductRef>> {
        let entry = self.storage.get(medicine_id).ok_or_else(|| {
            DomainError::NotFound {
                kind: "product",
                id: medicine_id.to_string(),
            }
            .in_pharmacy(self.id)
        })?;

        Ok(entry
            .product
            .analogues()
            .iter()
            .filter_map(|id| self.storage.get(id))
            .filter(|e| e.quantity > 0)
            .map(|e| e.product.clone())
            .collect())
    }
}

impl PartialEq for Pharmacy {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Pharmacy {}

impl PartialOrd for Pharmacy {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pharmacy {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}
