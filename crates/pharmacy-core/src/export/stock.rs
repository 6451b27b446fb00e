//! Stock report: what every branch holds and what it is worth.

use serde::{Deserialize, Serialize};

use crate::manager::PharmacyManager;
use crate::models::{DateValue, DosageForm, Pharmacy};

/// Stock across all branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReport {
    /// Report timestamp
    pub generated_at: String,
    /// Branches in ascending ID order
    pub pharmacies: Vec<PharmacyStock>,
    pub total_units: u64,
    pub total_value: f64,
}

/// Stock held by one branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PharmacyStock {
    pub pharmacy_id: u32,
    pub pharmacy_name: String,
    pub lines: Vec<StockLine>,
    pub total_units: u64,
    pub total_value: f64,
}

/// One product at one branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: String,
    pub product_name: String,
    /// tablet, syrup or ointment
    pub dosage_form: String,
    pub is_prescription: bool,
    pub quantity: u32,
    pub unit_price: f64,
    /// unit_price * quantity
    pub value: f64,
    pub expiration_date: DateValue,
    pub received_on: DateValue,
}

impl PharmacyStock {
    fn from_pharmacy(pharmacy: &Pharmacy) -> Self {
        let lines: Vec<StockLine> = pharmacy
            .storage()
            .entries()
            .map(|entry| {
                let product = &entry.product;
                StockLine {
                    product_id: product.id().to_string(),
                    product_name: product.name().to_string(),
                    dosage_form: product.dosage_form().to_string(),
                    is_prescription: product.is_prescription(),
                    quantity: entry.quantity,
                    unit_price: product.base_price(),
                    value: product.base_price() * f64::from(entry.quantity),
                    expiration_date: product.expiration_date(),
                    received_on: entry.received_on,
                }
            })
            .collect();

        Self {
            pharmacy_id: pharmacy.id(),
            pharmacy_name: pharmacy.name().to_string(),
            total_units: lines.iter().map(|l| u64::from(l.quantity)).sum(),
            total_value: lines.iter().map(|l| l.value).sum(),
            lines,
        }
    }
}

impl StockReport {
    /// Build a report from the current state of `manager`.
    pub fn from_manager(manager: &PharmacyManager) -> Self {
        let pharmacies: Vec<PharmacyStock> = manager
            .pharmacies()
            .map(PharmacyStock::from_pharmacy)
            .collect();

        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            total_units: pharmacies.iter().map(|p| p.total_units).sum(),
            total_value: pharmacies.iter().map(|p| p.total_value).sum(),
            pharmacies,
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV, one row per branch and product.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("pharmacy_id,pharmacy_name,product_id,product_name,dosage_form,prescription,quantity,unit_price,value,expiration_date,received_on\n");

        for pharmacy in &self.pharmacies {
            for line in &pharmacy.lines {
                csv.push_str(&format!(
                    "{},{},{},{},{},{},{},{},{},{},{}\n",
                    pharmacy.pharmacy_id,
                    escape_csv(&pharmacy.pharmacy_name),
                    escape_csv(&line.product_id),
                    escape_csv(&line.product_name),
                    line.dosage_form,
                    line.is_prescription,
                    line.quantity,
                    line.unit_price,
                    line.value,
                    line.expiration_date,
                    line.received_on,
                ));
            }
        }

        csv
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::tablet;

    fn manager() -> PharmacyManager {
        let mut manager = PharmacyManager::new();
        manager.add_product(tablet("101", "ibuprofen")).unwrap();
        manager.add_product(tablet("102", "paracetamol")).unwrap();
        manager
            .add_pharmacy(Pharmacy::new(2, "North, Main", "Street 2", "555-0102", 0.0).unwrap())
            .unwrap();
        manager
            .add_pharmacy(Pharmacy::new(1, "Central", "Street 1", "555-0101", 0.0).unwrap())
            .unwrap();
        manager.add_stock(1, "101", 2).unwrap();
        manager.add_stock(1, "102", 1).unwrap();
        manager.add_stock(2, "101", 4).unwrap();
        manager
    }

    #[test]
    fn test_report_totals() {
        let report = StockReport::from_manager(&manager());

        let ids: Vec<u32> = report.pharmacies.iter().map(|p| p.pharmacy_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(report.pharmacies[0].total_units, 3);
        assert_eq!(report.total_units, 7);
        // fixture price is 120.5
        assert!((report.total_value - 7.0 * 120.5).abs() < 1e-9);
        assert_eq!(report.pharmacies[0].lines[0].dosage_form, "tablet");
    }

    #[test]
    fn test_report_json() {
        let json = StockReport::from_manager(&manager()).to_json().unwrap();
        assert!(json.contains("\"pharmacy_name\": \"Central\""));
        assert!(json.contains("2999-01-01"));
    }

    #[test]
    fn test_report_csv() {
        let csv = StockReport::from_manager(&manager()).to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 4); // Header + 3 stock lines
        assert!(lines[0].starts_with("pharmacy_id,"));
        assert!(lines[1].starts_with("1,Central,101,"));
        assert!(lines[3].starts_with("2,\"North, Main\",101,"));
    }

    #[test]
    fn test_empty_report() {
        let report = StockReport::from_manager(&PharmacyManager::new());
        assert!(report.pharmacies.is_empty());
        assert_eq!(report.total_units, 0);
        assert_eq!(report.to_csv().lines().count(), 1);
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
    }
}
