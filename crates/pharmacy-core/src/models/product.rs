//! Product models: every product is a medicine in one of three dosage forms.

use std::cell::RefCell;
use std::rc::Rc;

use super::{require_range, require_text, DateValue, DomainError, DomainResult};

/// Shared handle to a product. The catalog, stock ledgers and operations all
/// point at the same instance.
pub type ProductRef = Rc<Product>;

/// Upper bound for package measures (mg, ml, g).
pub const MAX_PACKAGE_MEASURE: f64 = 1000.0;

pub const MAX_UNITS_PER_PACKAGE: u32 = 1000;

/// Capability implemented by each dosage form.
pub trait DosageForm {
    /// Human-readable dosage form (e.g. "tablet").
    fn dosage_form(&self) -> &'static str;
    /// How the medicine is administered (e.g. "oral").
    fn administration_method(&self) -> &'static str;
}

/// Fields every product carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInfo {
    /// Catalog identifier: digits only, at least 3 characters
    pub id: String,
    pub name: String,
    pub base_price: f64,
    pub expiration_date: DateValue,
    pub manufacturer_country: String,
}

/// Fields shared by all medicines.
#[derive(Debug, Clone, PartialEq)]
pub struct MedicineFields {
    pub is_prescription: bool,
    /// Active pharmaceutical ingredient, used for substance-based analogue lookup
    pub active_substance: String,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabletFields {
    pub units_per_package: u32,
    pub dosage_mg: f64,
    pub coating: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyrupFields {
    pub volume_ml: f64,
    pub has_sugar: bool,
    pub flavor: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OintmentFields {
    pub weight_g: f64,
    pub base_type: String,
}

/// Variant-specific part of a product.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductKind {
    Tablet(TabletFields),
    Syrup(SyrupFields),
    Ointment(OintmentFields),
}

impl DosageForm for TabletFields {
    fn dosage_form(&self) -> &'static str {
        "tablet"
    }

    fn administration_method(&self) -> &'static str {
        "oral"
    }
}

impl DosageForm for SyrupFields {
    fn dosage_form(&self) -> &'static str {
        "syrup"
    }

    fn administration_method(&self) -> &'static str {
        "oral"
    }
}

impl DosageForm for OintmentFields {
    fn dosage_form(&self) -> &'static str {
        "ointment"
    }

    fn administration_method(&self) -> &'static str {
        "topical"
    }
}

impl DosageForm for ProductKind {
    fn dosage_form(&self) -> &'static str {
        self.as_form().dosage_form()
    }

    fn administration_method(&self) -> &'static str {
        self.as_form().administration_method()
    }
}

impl ProductKind {
    /// Record tag used in the medicines file.
    pub fn tag(&self) -> &'static str {
        match self {
            ProductKind::Tablet(_) => "TABLET",
            ProductKind::Syrup(_) => "SYRUP",
            ProductKind::Ointment(_) => "OINTMENT",
        }
    }

    fn as_form(&self) -> &dyn DosageForm {
        match self {
            ProductKind::Tablet(t) => t,
            ProductKind::Syrup(s) => s,
            ProductKind::Ointment(o) => o,
        }
    }

    fn validate(&self) -> DomainResult<()> {
        match self {
            ProductKind::Tablet(t) => {
                if !(1..=MAX_UNITS_PER_PACKAGE).contains(&t.units_per_package) {
                    return Err(DomainError::OutOfRange {
                        field: "units_per_package",
                        value: t.units_per_package.to_string(),
                    });
                }
                require_range("dosage_mg", t.dosage_mg, true, MAX_PACKAGE_MEASURE)?;
                require_text("coating", &t.coating)
            }
            ProductKind::Syrup(s) => {
                require_range("volume_ml", s.volume_ml, true, MAX_PACKAGE_MEASURE)?;
                require_text("flavor", &s.flavor)
            }
            ProductKind::Ointment(o) => {
                require_range("weight_g", o.weight_g, true, MAX_PACKAGE_MEASURE)?;
                require_text("base_type", &o.base_type)
            }
        }
    }
}

/// A catalog product.
///
/// Analogues are stored as IDs and resolved through the catalog when needed,
/// so cyclic analogue relationships never form ownership cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    info: ProductInfo,
    medicine: MedicineFields,
    kind: ProductKind,
    analogues: RefCell<Vec<String>>,
}

impl Product {
    /// Create a product. Fails on any invalid field or an already-expired date.
    pub fn new(
        info: ProductInfo,
        medicine: MedicineFields,
        kind: ProductKind,
    ) -> DomainResult<Self> {
        let product = Self::from_record(info, medicine, kind)?;
        if product.is_expired() {
            return Err(DomainError::Expired {
                id: product.info.id.clone(),
                date: product.info.expiration_date,
            });
        }
        Ok(product)
    }

    /// Create a product from persisted data.
    ///
    /// Performs every check of [`Product::new`] except expiry, so that stock
    /// which expired while the application was closed can still be read and
    /// written off.
    pub fn from_record(
        info: ProductInfo,
        medicine: MedicineFields,
        kind: ProductKind,
    ) -> DomainResult<Self> {
        validate_product_id(&info.id)?;
        require_text("name", &info.name)?;
        require_range("base_price", info.base_price, false, f64::MAX)?;
        require_text("manufacturer_country", &info.manufacturer_country)?;
        require_text("active_substance", &medicine.active_substance)?;
        require_text("instructions", &medicine.instructions)?;
        kind.validate()?;

        Ok(Self {
            info,
            medicine,
            kind,
            analogues: RefCell::new(Vec::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn base_price(&self) -> f64 {
        self.info.base_price
    }

    pub fn expiration_date(&self) -> DateValue {
        self.info.expiration_date
    }

    pub fn manufacturer_country(&self) -> &str {
        &self.info.manufacturer_country
    }

    pub fn info(&self) -> &ProductInfo {
        &self.info
    }

    pub fn medicine(&self) -> &MedicineFields {
        &self.medicine
    }

    pub fn kind(&self) -> &ProductKind {
        &self.kind
    }

    pub fn is_prescription(&self) -> bool {
        self.medicine.is_prescription
    }

    pub fn active_substance(&self) -> &str {
        &self.medicine.active_substance
    }

    pub fn is_expired(&self) -> bool {
        self.info.expiration_date.is_expired()
    }

    /// Explicit analogue IDs, in insertion order.
    pub fn analogues(&self) -> Vec<String> {
        self.analogues.borrow().clone()
    }

    pub fn has_analogue(&self, analogue_id: &str) -> bool {
        self.analogues.borrow().iter().any(|a| a == analogue_id)
    }

    /// Add an analogue link. Rejects self-links and duplicates.
    pub fn add_analogue(&self, analogue_id: &str) -> DomainResult<()> {
        if analogue_id == self.info.id {
            return Err(DomainError::SelfAnalogue(analogue_id.to_string()));
        }
        if self.has_analogue(analogue_id) {
            return Err(DomainError::DuplicateAnalogue {
                medicine_id: self.info.id.clone(),
                analogue_id: analogue_id.to_string(),
            });
        }
        self.analogues.borrow_mut().push(analogue_id.to_string());
        Ok(())
    }

    /// Remove an analogue link, returning whether it was present.
    pub fn remove_analogue(&self, analogue_id: &str) -> bool {
        let mut analogues = self.analogues.borrow_mut();
        let before = analogues.len();
        analogues.retain(|a| a != analogue_id);
        analogues.len() != before
    }
}

impl DosageForm for Product {
    fn dosage_form(&self) -> &'static str {
        self.kind.dosage_form()
    }

    fn administration_method(&self) -> &'static str {
        self.kind.administration_method()
    }
}

fn validate_product_id(id: &str) -> DomainResult<()> {
    if id.len() < 3 || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainError::InvalidField {
            field: "product id",
            reason: format!("'{}' must be at least 3 digits", id),
        });
    }
    Ok(())
}
