//! Shared product builders for unit tests.

use super::{DateValue, MedicineFields, Product, ProductInfo, ProductKind, TabletFields};

pub(crate) fn info(id: &str, expires: DateValue) -> ProductInfo {
    ProductInfo {
        id: id.into(),
        name: format!("Product {}", id),
        base_price: 120.5,
        expiration_date: expires,
        manufacturer_country: "Germany".into(),
    }
}

pub(crate) fn medicine(substance: &str) -> MedicineFields {
    MedicineFields {
        is_prescription: false,
        active_substance: substance.into(),
        instructions: "After meals".into(),
    }
}

pub(crate) fn tablet(id: &str, substance: &str) -> Product {
    Product::new(
        info(id, DateValue::new(2999, 1, 1).unwrap()),
        medicine(substance),
        ProductKind::Tablet(TabletFields {
            units_per_package: 20,
            dosage_mg: 500.0,
            coating: "film".into(),
        }),
    )
    .unwrap()
}
