//! Record line encoding and decoding.
//!
//! ```text
//! [TABLET];id;name;price;expires;country;rx;substance;instructions;form;method;units;<n> mg;coating
//! [SYRUP];id;name;price;expires;country;rx;substance;instructions;form;method;<n> ml;sugar;flavor
//! [OINTMENT];id;name;price;expires;country;rx;substance;instructions;form;method;<n> g;base
//! id;name;address;phone;rent                      pharmacy (legacy: id;address;phone;rent)
//! medicineId;analogueId                           analogue link
//! SUPPLY;id;date;productId;qty;status;source;destination
//! RETURN;id;date;productId;qty;status;reason
//! WRITEOFF;id;date;productId;qty;status;reason
//! productId;pharmacyId;qty;YYYY-MM-DD             stock level
//! ```
//!
//! Field counts are checked before any field is interpreted. Dosage form and
//! administration method are written for readability and ignored on read.

use std::str::FromStr;

use super::{RecordError, RecordResult};
use crate::models::{
    DateValue, DosageForm, InventoryOperation, MedicineFields, OintmentFields, OperationKind,
    OperationStatus, Pharmacy, Product, ProductInfo, ProductKind, ProductRef, StockEntry,
    SyrupFields, TabletFields,
};

pub const SEPARATOR: char = ';';

/// Fields after the tag, per product kind.
const TABLET_FIELDS: usize = 13;
const SYRUP_FIELDS: usize = 13;
const OINTMENT_FIELDS: usize = 12;

const PHARMACY_FIELDS: usize = 5;
const LEGACY_PHARMACY_FIELDS: usize = 4;
const ANALOGUE_FIELDS: usize = 2;
const STOCK_FIELDS: usize = 4;

/// Fields after the tag shared by every operation.
const OPERATION_COMMON_FIELDS: usize = 5;

/// A persisted stock level, before it is matched to a product and a branch.
#[derive(Debug, Clone, PartialEq)]
pub struct StockRecord {
    pub product_id: String,
    pub pharmacy_id: u32,
    pub quantity: u32,
    pub received_on: DateValue,
}

pub fn split_fields(line: &str) -> Vec<&str> {
    line.split(SEPARATOR).collect()
}

fn join(fields: &[String]) -> String {
    fields.join(";")
}

// =========================================================================
// Products
// =========================================================================

pub fn encode_product(product: &Product) -> String {
    let info = product.info();
    let medicine = product.medicine();
    let mut fields = vec![
        format!("[{}]", product.kind().tag()),
        info.id.clone(),
        info.name.clone(),
        info.base_price.to_string(),
        info.expiration_date.to_string(),
        info.manufacturer_country.clone(),
        encode_bool(medicine.is_prescription),
        medicine.active_substance.clone(),
        medicine.instructions.clone(),
        product.dosage_form().to_string(),
        product.administration_method().to_string(),
    ];
    match product.kind() {
        ProductKind::Tablet(t) => fields.extend([
            t.units_per_package.to_string(),
            format!("{} mg", t.dosage_mg),
            t.coating.clone(),
        ]),
        ProductKind::Syrup(s) => fields.extend([
            format!("{} ml", s.volume_ml),
            encode_bool(s.has_sugar),
            s.flavor.clone(),
        ]),
        ProductKind::Ointment(o) => {
            fields.extend([format!("{} g", o.weight_g), o.base_type.clone()])
        }
    }
    join(&fields)
}

/// Decode a product line. Expiry is not checked here; see [`Product::from_record`].
pub fn decode_product(line: &str) -> RecordResult<Product> {
    let fields = split_fields(line);
    let (tag, rest) = fields
        .split_first()
        .ok_or(RecordError::FieldCount {
            expected: TABLET_FIELDS + 1,
            found: 0,
        })?;

    let expected = match tag.trim() {
        "[TABLET]" => TABLET_FIELDS,
        "[SYRUP]" => SYRUP_FIELDS,
        "[OINTMENT]" => OINTMENT_FIELDS,
        other => return Err(RecordError::UnknownTag(other.to_string())),
    };
    check_count(rest, expected)?;

    let info = ProductInfo {
        id: rest[0].to_string(),
        name: rest[1].to_string(),
        base_price: parse_number("base_price", rest[2])?,
        expiration_date: parse_date(rest[3])?,
        manufacturer_country: rest[4].to_string(),
    };
    let medicine = MedicineFields {
        is_prescription: parse_bool("is_prescription", rest[5])?,
        active_substance: rest[6].to_string(),
        instructions: rest[7].to_string(),
    };
    // rest[8] and rest[9] are the derived dosage form and administration method
    let variant = &rest[10..];
    let kind = match tag.trim() {
        "[TABLET]" => ProductKind::Tablet(TabletFields {
            units_per_package: parse_number("units_per_package", variant[0])?,
            dosage_mg: parse_number("dosage_mg", strip_unit(variant[1], "mg"))?,
            coating: variant[2].to_string(),
        }),
        "[SYRUP]" => ProductKind::Syrup(SyrupFields {
            volume_ml: parse_number("volume_ml", strip_unit(variant[0], "ml"))?,
            has_sugar: parse_bool("has_sugar", variant[1])?,
            flavor: variant[2].to_string(),
        }),
        _ => ProductKind::Ointment(OintmentFields {
            weight_g: parse_number("weight_g", strip_unit(variant[0], "g"))?,
            base_type: variant[1].to_string(),
        }),
    };

    Product::from_record(info, medicine, kind).map_err(Into::into)
}

// =========================================================================
// Pharmacies and analogue links
// =========================================================================

pub fn encode_pharmacy(pharmacy: &Pharmacy) -> String {
    join(&[
        pharmacy.id().to_string(),
        pharmacy.name().to_string(),
        pharmacy.address().to_string(),
        pharmacy.phone().to_string(),
        pharmacy.rent_cost().to_string(),
    ])
}

/// Decode a pharmacy line. A legacy line without a name gets
/// [`Pharmacy::default_name`].
pub fn decode_pharmacy(line: &str) -> RecordResult<Pharmacy> {
    let fields = split_fields(line);
    let (id, name, contact) = match fields.len() {
        PHARMACY_FIELDS => (fields[0], Some(fields[1]), &fields[2..]),
        LEGACY_PHARMACY_FIELDS => (fields[0], None, &fields[1..]),
        found => {
            return Err(RecordError::FieldCount {
                expected: PHARMACY_FIELDS,
                found,
            })
        }
    };

    let id: u32 = parse_number("pharmacy id", id)?;
    let name = name.map_or_else(|| Pharmacy::default_name(id), str::to_string);
    let rent_cost = parse_number("rent_cost", contact[2])?;
    Pharmacy::new(id, name, contact[0], contact[1], rent_cost).map_err(Into::into)
}

pub fn encode_analogue(medicine_id: &str, analogue_id: &str) -> String {
    format!("{}{}{}", medicine_id, SEPARATOR, analogue_id)
}

/// Decode an analogue edge into `(medicine_id, analogue_id)`.
pub fn decode_analogue(line: &str) -> RecordResult<(String, String)> {
    let fields = split_fields(line);
    check_count(&fields, ANALOGUE_FIELDS)?;
    Ok((fields[0].trim().to_string(), fields[1].trim().to_string()))
}

// =========================================================================
// Operations
// =========================================================================

pub fn encode_operation(operation: &InventoryOperation) -> String {
    let mut fields = vec![
        operation.kind().tag().to_string(),
        operation.id().to_string(),
        operation.date().to_string(),
        operation.product().id().to_string(),
        operation.quantity().to_string(),
        operation.status().to_string(),
    ];
    match operation.kind() {
        OperationKind::Supply {
            source,
            destination,
        } => fields.extend([source.clone(), destination.clone()]),
        OperationKind::Return { reason } | OperationKind::WriteOff { reason } => {
            fields.push(reason.clone())
        }
    }
    join(&fields)
}

/// Decode an operation line, resolving its product with `resolve`.
pub fn decode_operation(
    line: &str,
    resolve: impl Fn(&str) -> Option<ProductRef>,
) -> RecordResult<InventoryOperation> {
    let fields = split_fields(line);
    let (tag, rest) = fields
        .split_first()
        .ok_or(RecordError::FieldCount {
            expected: OPERATION_COMMON_FIELDS + 1,
            found: 0,
        })?;

    let extra = match tag.trim() {
        "SUPPLY" => 2,
        "RETURN" | "WRITEOFF" => 1,
        other => return Err(RecordError::UnknownTag(other.to_string())),
    };
    check_count(rest, OPERATION_COMMON_FIELDS + extra)?;

    let id = rest[0];
    let date = parse_date(rest[1])?;
    let product_id = rest[2].trim();
    let quantity: u32 = parse_number("quantity", rest[3])?;
    let status = OperationStatus::from_str(rest[4])?;
    let product =
        resolve(product_id).ok_or_else(|| RecordError::UnknownProduct(product_id.to_string()))?;

    let kind = match tag.trim() {
        "SUPPLY" => OperationKind::Supply {
            source: rest[5].to_string(),
            destination: rest[6].to_string(),
        },
        "RETURN" => OperationKind::Return {
            reason: rest[5].to_string(),
        },
        _ => OperationKind::WriteOff {
            reason: rest[5].to_string(),
        },
    };

    InventoryOperation::from_record(id, date, product, quantity, status, kind).map_err(Into::into)
}

// =========================================================================
// Stock levels
// =========================================================================

pub fn encode_stock(pharmacy_id: u32, entry: &StockEntry) -> String {
    join(&[
        entry.product.id().to_string(),
        pharmacy_id.to_string(),
        entry.quantity.to_string(),
        entry.received_on.to_string(),
    ])
}

pub fn decode_stock(line: &str) -> RecordResult<StockRecord> {
    let fields = split_fields(line);
    check_count(&fields, STOCK_FIELDS)?;
    Ok(StockRecord {
        product_id: fields[0].trim().to_string(),
        pharmacy_id: parse_number("pharmacy id", fields[1])?,
        quantity: parse_number("quantity", fields[2])?,
        received_on: parse_date(fields[3])?,
    })
}

// =========================================================================
// Field helpers
// =========================================================================

fn check_count(fields: &[&str], expected: usize) -> RecordResult<()> {
    if fields.len() != expected {
        return Err(RecordError::FieldCount {
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

fn strip_unit<'a>(value: &'a str, unit: &str) -> &'a str {
    let value = value.trim();
    value.strip_suffix(unit).unwrap_or(value).trim_end()
}

fn parse_number<T: FromStr>(field: &'static str, value: &str) -> RecordResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RecordError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

fn parse_bool(field: &'static str, value: &str) -> RecordResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(RecordError::InvalidBool {
            field,
            value: value.to_string(),
        }),
    }
}

fn encode_bool(value: bool) -> String {
    let flag = if value { "1" } else { "0" };
    flag.to_string()
}

fn parse_date(value: &str) -> RecordResult<DateValue> {
    value
        .trim()
        .parse()
        .map_err(|_| RecordError::InvalidDate(value.to_string()))
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::models::fixtures::{info, medicine, tablet};
    use crate::models::DomainError;

    const TABLET_LINE: &str = "[TABLET];101;Nurofen;120.5;2999-01-01;Germany;1;ibuprofen;\
        After meals;tablet;oral;20;200 mg;film";

    #[test]
    fn test_encode_tablet_layout() {
        let line = encode_product(&tablet("101", "paracetamol"));
        assert_eq!(
            line,
            "[TABLET];101;Product 101;120.5;2999-01-01;Germany;0;paracetamol;After meals;\
             tablet;oral;20;500 mg;film"
        );
        assert_eq!(split_fields(&line).len(), TABLET_FIELDS + 1);
    }

    #[test]
    fn test_decode_tablet() {
        let product = decode_product(TABLET_LINE).unwrap();
        assert_eq!(product.id(), "101");
        assert!(product.is_prescription());
        match product.kind() {
            ProductKind::Tablet(t) => {
                assert_eq!(t.units_per_package, 20);
                assert_eq!(t.dosage_mg, 200.0);
                assert_eq!(t.coating, "film");
            }
            other => panic!("expected tablet, got {other:?}"),
        }
    }

    #[test]
    fn test_product_round_trip_for_each_kind() {
        let future = DateValue::new(2999, 12, 31).unwrap();
        let kinds = [
            ProductKind::Tablet(TabletFields {
                units_per_package: 1000,
                dosage_mg: 0.25,
                coating: "enteric".into(),
            }),
            ProductKind::Syrup(SyrupFields {
                volume_ml: 125.5,
                has_sugar: true,
                flavor: "cherry".into(),
            }),
            ProductKind::Ointment(OintmentFields {
                weight_g: 1000.0,
                base_type: "lanolin".into(),
            }),
        ];
        for kind in kinds {
            let product = Product::new(info("250", future), medicine("zinc oxide"), kind).unwrap();
            let decoded = decode_product(&encode_product(&product)).unwrap();
            assert_eq!(decoded, product);
        }
    }

    #[test]
    fn test_short_line_rejected_before_parsing() {
        let err = decode_product("[TABLET];101;Nurofen;abc;2999-01-01;Germany;1").unwrap_err();
        assert_eq!(
            err,
            RecordError::FieldCount {
                expected: 13,
                found: 6
            }
        );
    }

    #[test]
    fn test_unknown_product_tag() {
        let err = decode_product("[CAPSULE];101;x").unwrap_err();
        assert!(matches!(err, RecordError::UnknownTag(tag) if tag == "[CAPSULE]"));
    }

    #[test]
    fn test_unit_suffix_variants() {
        let compact = TABLET_LINE.replace("200 mg", "200mg");
        assert!(decode_product(&compact).is_ok());
        let bare = TABLET_LINE.replace("200 mg", "200");
        assert!(decode_product(&bare).is_ok());
        let wrong = TABLET_LINE.replace("200 mg", "200 ml");
        assert!(matches!(
            decode_product(&wrong),
            Err(RecordError::InvalidNumber { field: "dosage_mg", .. })
        ));
    }

    #[test]
    fn test_bool_spellings() {
        let line = TABLET_LINE.replace(";1;ibuprofen", ";true;ibuprofen");
        assert!(decode_product(&line).unwrap().is_prescription());
        let line = TABLET_LINE.replace(";1;ibuprofen", ";yes;ibuprofen");
        assert!(matches!(
            decode_product(&line),
            Err(RecordError::InvalidBool { .. })
        ));
    }

    #[test]
    fn test_invalid_date_and_domain_errors() {
        let line = TABLET_LINE.replace("2999-01-01", "2999-04-31");
        assert!(matches!(decode_product(&line), Err(RecordError::InvalidDate(_))));

        let line = TABLET_LINE.replace(";20;", ";0;");
        assert!(matches!(
            decode_product(&line),
            Err(RecordError::Domain(DomainError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_expired_product_decodes() {
        let line = TABLET_LINE.replace("2999-01-01", "2001-01-01");
        assert!(decode_product(&line).unwrap().is_expired());
    }

    #[test]
    fn test_pharmacy_lines() {
        let pharmacy = Pharmacy::new(3, "Central", "Lenina 1", "+7 495 000", 1500.5).unwrap();
        let line = encode_pharmacy(&pharmacy);
        assert_eq!(line, "3;Central;Lenina 1;+7 495 000;1500.5");

        let decoded = decode_pharmacy(&line).unwrap();
        assert_eq!(decoded.name(), "Central");
        assert_eq!(decoded.rent_cost(), 1500.5);

        let legacy = decode_pharmacy("4;Mira 2;+7 495 111;900").unwrap();
        assert_eq!(legacy.id(), 4);
        assert_eq!(legacy.name(), "Аптека №4");
        assert_eq!(legacy.address(), "Mira 2");

        assert!(matches!(
            decode_pharmacy("4;Mira 2;900"),
            Err(RecordError::FieldCount { .. })
        ));
        assert!(matches!(
            decode_pharmacy("x;Central;Lenina 1;+7;1"),
            Err(RecordError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_analogue_edge() {
        assert_eq!(encode_analogue("101", "102"), "101;102");
        assert_eq!(
            decode_analogue("101;102").unwrap(),
            ("101".to_string(), "102".to_string())
        );
        assert!(decode_analogue("101").is_err());
    }

    #[test]
    fn test_operation_round_trip() {
        let product = Rc::new(tablet("101", "ibuprofen"));
        let date = DateValue::new(2025, 2, 14).unwrap();
        let resolve = |id: &str| (id == "101").then(|| product.clone());

        let mut supply =
            InventoryOperation::supply("s-1", date, product.clone(), 12, "Warehouse", "Branch 3")
                .unwrap();
        supply.process().unwrap();
        let line = encode_operation(&supply);
        assert_eq!(line, "SUPPLY;s-1;2025-02-14;101;12;completed;Warehouse;Branch 3");
        assert_eq!(decode_operation(&line, resolve).unwrap(), supply);

        let ret = InventoryOperation::return_goods("r-1", date, product.clone(), 1, "damaged")
            .unwrap();
        assert_eq!(decode_operation(&encode_operation(&ret), resolve).unwrap(), ret);

        let write_off =
            InventoryOperation::write_off("w-1", date, product.clone(), 4, "expired").unwrap();
        let decoded = decode_operation(&encode_operation(&write_off), resolve).unwrap();
        assert!(decoded.is_expiry_write_off());
        assert_eq!(decoded, write_off);
    }

    #[test]
    fn test_operation_errors() {
        let product = Rc::new(tablet("101", "ibuprofen"));
        let resolve = |id: &str| (id == "101").then(|| product.clone());

        assert!(matches!(
            decode_operation("RETURN;r-1;2025-02-14;999;1;pending;lost", resolve),
            Err(RecordError::UnknownProduct(id)) if id == "999"
        ));
        assert!(matches!(
            decode_operation("SUPPLY;s-1;2025-02-14;101;1;pending;only-source", resolve),
            Err(RecordError::FieldCount { expected: 7, found: 6 })
        ));
        assert!(matches!(
            decode_operation("MOVE;m-1;2025-02-14;101;1;pending;x", resolve),
            Err(RecordError::UnknownTag(_))
        ));
        assert!(matches!(
            decode_operation("RETURN;r-1;2025-02-14;101;0;pending;lost", resolve),
            Err(RecordError::Domain(_))
        ));
        assert!(matches!(
            decode_operation("RETURN;r-1;2025-02-14;101;1;archived;lost", resolve),
            Err(RecordError::Domain(DomainError::InvalidField { field: "status", .. }))
        ));
    }

    #[test]
    fn test_stock_record() {
        let mut storage = crate::models::Storage::new();
        let received = DateValue::new(2025, 3, 9).unwrap();
        storage
            .add_product_on(Rc::new(tablet("101", "ibuprofen")), 15, received)
            .unwrap();
        let entry = storage.get("101").unwrap();

        let line = encode_stock(8, entry);
        assert_eq!(line, "101;8;15;2025-03-09");
        assert_eq!(
            decode_stock(&line).unwrap(),
            StockRecord {
                product_id: "101".into(),
                pharmacy_id: 8,
                quantity: 15,
                received_on: received,
            }
        );
        assert!(decode_stock("101;8;-1;2025-03-09").is_err());
        assert!(decode_stock("101;8;15").is_err());
    }
}
