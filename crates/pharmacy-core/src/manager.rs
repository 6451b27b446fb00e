//! Pharmacy manager: the product catalog, the branch index and the operation log.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, info};

use crate::index::OrderedIndex;
use crate::models::{
    DateValue, DomainError, DomainResult, InventoryOperation, Pharmacy, Product, ProductCatalog,
    ProductRef, EXPIRED_REASON,
};

/// Stock of one product at one branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Availability {
    pub pharmacy_id: u32,
    pub pharmacy_name: String,
    pub quantity: u32,
}

/// Owns every product, branch and operation of a session.
#[derive(Debug, Clone, Default)]
pub struct PharmacyManager {
    catalog: ProductCatalog,
    pharmacies: OrderedIndex<Pharmacy>,
    operations: Vec<InventoryOperation>,
    /// Written-off products, kept so their operations stay resolvable
    archive: BTreeMap<String, ProductRef>,
}

impl PharmacyManager {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    /// Add a product. Fails if its ID is already in the catalog or the archive.
    pub fn add_product(&mut self, product: Product) -> DomainResult<ProductRef> {
        let product = Rc::new(product);
        self.catalog_product(product.clone())?;
        Ok(product)
    }

    /// Add an already shared product, as [`PharmacyManager::add_product`] does.
    pub fn catalog_product(&mut self, product: ProductRef) -> DomainResult<()> {
        if self.archive.contains_key(product.id()) {
            return Err(DomainError::Duplicate {
                kind: "product",
                id: product.id().to_string(),
            });
        }
        self.catalog.insert(product.clone())?;
        debug!(id = product.id(), "product added");
        Ok(())
    }

    /// Remove a product from the catalog.
    ///
    /// Refused while any branch stocks it or any operation refers to it, since
    /// neither could be reloaded once the product is gone from the files.
    pub fn remove_product(&mut self, product_id: &str) -> DomainResult<ProductRef> {
        let in_use = |referenced_by| DomainError::InUse {
            kind: "product",
            id: product_id.to_string(),
            referenced_by,
        };
        if self.pharmacies.iter().any(|p| p.has_product(product_id)) {
            return Err(in_use("branch stock"));
        }
        if self.operations_for_product(product_id).next().is_some() {
            return Err(in_use("recorded operations"));
        }
        let product = self.catalog.remove(product_id)?;
        debug!(id = product_id, "product removed");
        Ok(product)
    }

    pub fn get_product(&self, product_id: &str) -> DomainResult<ProductRef> {
        self.catalog.get(product_id)
    }

    /// Products ordered by ID.
    pub fn products(&self) -> impl Iterator<Item = &ProductRef> {
        self.catalog.iter()
    }

    /// Catalog product or archived (written-off) product.
    pub fn resolve_product(&self, product_id: &str) -> Option<ProductRef> {
        self.catalog
            .find(product_id)
            .or_else(|| self.archive.get(product_id))
            .cloned()
    }

    /// Products written off because they expired.
    pub fn archived_products(&self) -> impl Iterator<Item = &ProductRef> {
        self.archive.values()
    }

    /// Put a product straight into the archive (used when loading expired stock).
    pub fn archive_product(&mut self, product: ProductRef) -> DomainResult<()> {
        if self.catalog.contains(product.id()) || self.archive.contains_key(product.id()) {
            return Err(DomainError::Duplicate {
                kind: "product",
                id: product.id().to_string(),
            });
        }
        self.archive.insert(product.id().to_string(), product);
        Ok(())
    }

    pub fn link_analogue(&mut self, medicine_id: &str, analogue_id: &str) -> DomainResult<()> {
        self.catalog.link_analogue(medicine_id, analogue_id)
    }

    pub fn unlink_analogue(&mut self, medicine_id: &str, analogue_id: &str) -> DomainResult<bool> {
        self.catalog.unlink_analogue(medicine_id, analogue_id)
    }

    /// Catalog-wide analogues: other medicines with the same active substance.
    ///
    /// This is independent of the explicit analogue list on each medicine.
    pub fn get_analogues(&self, product_id: &str) -> DomainResult<Vec<ProductRef>> {
        self.catalog.substance_analogues(product_id)
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// Add a branch. Duplicate IDs fail.
    pub fn add_pharmacy(&mut self, pharmacy: Pharmacy) -> DomainResult<()> {
        let id = pharmacy.id();
        if !self.pharmacies.find_if(|p| p.id() == id).is_end() {
            return Err(DomainError::Duplicate {
                kind: "pharmacy",
                id: id.to_string(),
            });
        }
        self.pharmacies.insert(pharmacy);
        debug!(id, "pharmacy added");
        Ok(())
    }

    pub fn remove_pharmacy(&mut self, pharmacy_id: u32) -> DomainResult<Pharmacy> {
        let cursor = self.pharmacies.find_by(|p| p.id().cmp(&pharmacy_id));
        self.pharmacies
            .remove_at(cursor)
            .map_err(|_| pharmacy_not_found(pharmacy_id))
    }

    pub fn get_pharmacy(&self, pharmacy_id: u32) -> DomainResult<&Pharmacy> {
        let cursor = self.pharmacies.find_by(|p| p.id().cmp(&pharmacy_id));
        self.pharmacies
            .get(cursor)
            .map_err(|_| pharmacy_not_found(pharmacy_id))
    }

    pub fn get_pharmacy_mut(&mut self, pharmacy_id: u32) -> DomainResult<&mut Pharmacy> {
        let cursor = self.pharmacies.find_by(|p| p.id().cmp(&pharmacy_id));
        self.pharmacies
            .get_mut(cursor)
            .map_err(|_| pharmacy_not_found(pharmacy_id))
    }

    /// Branches in ascending ID order.
    pub fn pharmacies(&self) -> impl DoubleEndedIterator<Item = &Pharmacy> {
        self.pharmacies.iter()
    }

    pub fn pharmacy_count(&self) -> usize {
        self.pharmacies.size()
    }

    /// Receive stock of a catalog product at a branch.
    pub fn add_stock(
        &mut self,
        pharmacy_id: u32,
        product_id: &str,
        quantity: u32,
    ) -> DomainResult<()> {
        let product = self.catalog.get(product_id)?;
        self.get_pharmacy_mut(pharmacy_id)?.add_stock(product, quantity)
    }

    pub fn remove_stock(
        &mut self,
        pharmacy_id: u32,
        product_id: &str,
        quantity: u32,
    ) -> DomainResult<()> {
        self.get_pharmacy_mut(pharmacy_id)?
            .remove_stock(product_id, quantity)
    }

    /// Branches holding the product, with quantities, in branch order.
    pub fn get_product_availability(&self, product_id: &str) -> DomainResult<Vec<Availability>> {
        if !self.catalog.contains(product_id) {
            return Err(DomainError::NotFound {
                kind: "product",
                id: product_id.to_string(),
            });
        }
        Ok(self
            .pharmacies
            .iter()
            .filter(|p| p.has_product(product_id))
            .map(|p| Availability {
                pharmacy_id: p.id(),
                pharmacy_name: p.name().to_string(),
                quantity: p.quantity(product_id),
            })
            .collect())
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Record an operation. Duplicate operation IDs fail.
    pub fn add_operation(&mut self, operation: InventoryOperation) -> DomainResult<()> {
        if self.operations.iter().any(|op| op.id() == operation.id()) {
            return Err(DomainError::Duplicate {
                kind: "operation",
                id: operation.id().to_string(),
            });
        }
        self.operations.push(operation);
        Ok(())
    }

    pub fn get_operation(&self, operation_id: &str) -> DomainResult<&InventoryOperation> {
        self.operations
            .iter()
            .find(|op| op.id() == operation_id)
            .ok_or_else(|| operation_not_found(operation_id))
    }

    /// Process an operation. Stock levels are not adjusted.
    pub fn process_operation(&mut self, operation_id: &str) -> DomainResult<()> {
        self.operations
            .iter_mut()
            .find(|op| op.id() == operation_id)
            .ok_or_else(|| operation_not_found(operation_id))?
            .process()
    }

    /// Operations in the order they were recorded.
    pub fn operations(&self) -> &[InventoryOperation] {
        &self.operations
    }

    pub fn operations_for_product<'a>(
        &'a self,
        product_id: &'a str,
    ) -> impl Iterator<Item = &'a InventoryOperation> + 'a {
        self.operations
            .iter()
            .filter(move |op| op.product().id() == product_id)
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// Archive every expired catalog product, clear it from all branches and
    /// record a completed `expired` write-off for it.
    ///
    /// A product that already has an expiry write-off gets no second one.
    /// Returns the IDs of the write-offs created.
    pub fn write_off_expired(&mut self) -> DomainResult<Vec<String>> {
        let mut created = Vec::new();
        for product in self.catalog.expired() {
            self.catalog.remove(product.id())?;

            let mut held: u32 = 0;
            let ids: Vec<u32> = self.pharmacies.iter().map(|p| p.id()).collect();
            for id in ids {
                held = held.saturating_add(self.get_pharmacy_mut(id)?.clear_stock(product.id()));
            }

            if let Some(op_id) = self.record_expiry(product.clone(), held)? {
                created.push(op_id);
            }
            self.archive.insert(product.id().to_string(), product);
        }
        if !created.is_empty() {
            info!(count = created.len(), "expired products written off");
        }
        Ok(created)
    }

    /// Record an expiry write-off for `product` unless one exists.
    ///
    /// Quantity is the stock that was held, or 1 when nothing was in stock.
    pub fn record_expiry(
        &mut self,
        product: ProductRef,
        held: u32,
    ) -> DomainResult<Option<String>> {
        let already = self
            .operations_for_product(product.id())
            .any(|op| op.is_expiry_write_off());
        if already {
            return Ok(None);
        }

        let id = InventoryOperation::generate_id();
        let mut operation = InventoryOperation::write_off(
            id.clone(),
            DateValue::today(),
            product,
            held.max(1),
            EXPIRED_REASON,
        )?;
        operation.process()?;
        self.add_operation(operation)?;
        Ok(Some(id))
    }
}

fn pharmacy_not_found(id: u32) -> DomainError {
    DomainError::NotFound {
        kind: "pharmacy",
        id: id.to_string(),
    }
}

fn operation_not_found(id: &str) -> DomainError {
    DomainError::NotFound {
        kind: "operation",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{info, medicine, tablet};
    use crate::models::{OperationStatus, ProductKind, SyrupFields, TabletFields};

    fn pharmacy(id: u32) -> Pharmacy {
        Pharmacy::new(id, format!("Branch {}", id), "Street 1", "555-0100", 1000.0).unwrap()
    }

    fn manager() -> PharmacyManager {
        let mut manager = PharmacyManager::new();
        manager.add_product(tablet("101", "ibuprofen")).unwrap();
        manager.add_product(tablet("102", "ibuprofen")).unwrap();
        manager.add_product(tablet("103", "paracetamol")).unwrap();
        for id in [20, 5, 12] {
            manager.add_pharmacy(pharmacy(id)).unwrap();
        }
        manager
    }

    #[test]
    fn test_pharmacies_sorted_by_id() {
        let manager = manager();
        let ids: Vec<u32> = manager.pharmacies().map(|p| p.id()).collect();
        assert_eq!(ids, vec![5, 12, 20]);
        assert_eq!(manager.pharmacy_count(), 3);
    }

    #[test]
    fn test_duplicate_pharmacy_rejected() {
        let mut manager = manager();
        let err = manager.add_pharmacy(pharmacy(12)).unwrap_err();
        assert!(matches!(err, DomainError::Duplicate { kind: "pharmacy", .. }));
        assert_eq!(manager.pharmacy_count(), 3);
    }

    #[test]
    fn test_remove_pharmacy() {
        let mut manager = manager();
        let removed = manager.remove_pharmacy(12).unwrap();
        assert_eq!(removed.id(), 12);
        assert!(manager.get_pharmacy(12).is_err());
        assert!(manager.remove_pharmacy(12).is_err());
        assert_eq!(manager.pharmacy_count(), 2);
    }

    #[test]
    fn test_remove_product_in_use_refused() {
        let mut manager = manager();
        manager.add_stock(5, "101", 2).unwrap();
        let err = manager.remove_product("101").unwrap_err();
        assert!(matches!(err, DomainError::InUse { referenced_by: "branch stock", .. }));

        let product = manager.get_product("102").unwrap();
        let op = InventoryOperation::return_goods("r-1", DateValue::today(), product, 1, "dented")
            .unwrap();
        manager.add_operation(op).unwrap();
        let err = manager.remove_product("102").unwrap_err();
        assert!(matches!(err, DomainError::InUse { referenced_by: "recorded operations", .. }));

        assert!(manager.get_product("101").is_ok());
        assert!(manager.get_product("102").is_ok());

        manager.remove_stock(5, "101", 2).unwrap();
        assert_eq!(manager.remove_product("101").unwrap().id(), "101");
        assert!(manager.get_product("101").is_err());
    }

    #[test]
    fn test_duplicate_product_rejected() {
        let mut manager = manager();
        assert!(manager.add_product(tablet("101", "x")).is_err());
        assert!(manager.get_product("999").is_err());
    }

    #[test]
    fn test_product_availability() {
        let mut manager = manager();
        manager.add_stock(20, "101", 4).unwrap();
        manager.add_stock(5, "101", 1).unwrap();

        let availability = manager.get_product_availability("101").unwrap();
        let summary: Vec<(u32, u32)> = availability
            .iter()
            .map(|a| (a.pharmacy_id, a.quantity))
            .collect();
        assert_eq!(summary, vec![(5, 1), (20, 4)]);

        assert!(manager.get_product_availability("103").unwrap().is_empty());
        assert!(manager.get_product_availability("999").is_err());
    }

    #[test]
    fn test_stock_errors_are_branch_scoped() {
        let mut manager = manager();
        manager.add_stock(5, "101", 2).unwrap();
        let err = manager.remove_stock(5, "101", 3).unwrap_err();
        assert!(matches!(err, DomainError::Pharmacy { pharmacy_id: 5, .. }));
        assert_eq!(manager.get_pharmacy(5).unwrap().quantity("101"), 2);

        assert!(manager.add_stock(99, "101", 1).is_err());
        assert!(manager.add_stock(5, "999", 1).is_err());
    }

    #[test]
    fn test_get_analogues_by_substance() {
        let manager = manager();
        let analogues = manager.get_analogues("101").unwrap();
        assert_eq!(analogues.len(), 1);
        assert_eq!(analogues[0].id(), "102");
    }

    #[test]
    fn test_operations() {
        let mut manager = manager();
        let product = manager.get_product("101").unwrap();
        let op = InventoryOperation::return_goods(
            "ret-1",
            DateValue::new(2025, 5, 5).unwrap(),
            product.clone(),
            2,
            "damaged box",
        )
        .unwrap();
        manager.add_operation(op.clone()).unwrap();
        assert!(manager.add_operation(op).is_err());

        manager.process_operation("ret-1").unwrap();
        assert_eq!(
            manager.get_operation("ret-1").unwrap().status(),
            OperationStatus::Completed
        );
        assert!(manager.process_operation("ret-1").is_err());
        assert!(manager.process_operation("missing").is_err());
        assert_eq!(manager.operations_for_product("101").count(), 1);
    }

    #[test]
    fn test_processing_does_not_touch_stock() {
        let mut manager = manager();
        manager.add_stock(5, "101", 3).unwrap();
        let product = manager.get_product("101").unwrap();
        let op = InventoryOperation::write_off(
            "w-1",
            DateValue::today(),
            product,
            3,
            "broken",
        )
        .unwrap();
        manager.add_operation(op).unwrap();
        manager.process_operation("w-1").unwrap();
        assert_eq!(manager.get_pharmacy(5).unwrap().quantity("101"), 3);
    }

    #[test]
    fn test_write_off_expired_clears_branches() {
        let mut manager = manager();
        let stale = Rc::new(
            Product::from_record(
                info("404", DateValue::new(2001, 1, 1).unwrap()),
                medicine("ibuprofen"),
                ProductKind::Tablet(TabletFields {
                    units_per_package: 10,
                    dosage_mg: 200.0,
                    coating: "none".into(),
                }),
            )
            .unwrap(),
        );
        manager.catalog.insert(stale.clone()).unwrap();
        manager.link_analogue("101", "404").unwrap();
        manager.get_pharmacy_mut(5).unwrap().add_stock(stale.clone(), 3).unwrap();
        manager.get_pharmacy_mut(12).unwrap().add_stock(stale, 2).unwrap();

        let created = manager.write_off_expired().unwrap();
        assert_eq!(created.len(), 1);

        let op = manager.get_operation(&created[0]).unwrap();
        assert!(op.is_expiry_write_off());
        assert_eq!(op.quantity(), 5);
        assert_eq!(op.status(), OperationStatus::Completed);

        assert!(manager.get_product("404").is_err());
        assert!(manager.resolve_product("404").is_some());
        assert!(!manager.get_pharmacy(5).unwrap().has_product("404"));
        assert!(manager.get_product("101").unwrap().analogues().is_empty());
        assert!(manager.write_off_expired().unwrap().is_empty());
    }

    #[test]
    fn test_record_expiry_once() {
        let mut manager = PharmacyManager::new();
        let expired = Rc::new(
            Product::from_record(
                info("555", DateValue::new(2001, 1, 1).unwrap()),
                medicine("old"),
                ProductKind::Syrup(SyrupFields {
                    volume_ml: 100.0,
                    has_sugar: false,
                    flavor: "plain".into(),
                }),
            )
            .unwrap(),
        );
        manager.archive_product(expired.clone()).unwrap();

        assert!(manager.record_expiry(expired.clone(), 0).unwrap().is_some());
        assert!(manager.record_expiry(expired, 7).unwrap().is_none());

        let ops = manager.operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].quantity(), 1);
        assert_eq!(ops[0].status(), OperationStatus::Completed);
        assert!(manager.resolve_product("555").is_some());
        assert!(manager.get_product("555").is_err());
    }
}
