//! Domain models for pharmacy inventory tracking.

mod catalog;
mod date;
mod operation;
mod pharmacy;
mod product;
mod storage;

#[cfg(test)]
pub(crate) mod fixtures;

pub use catalog::*;
pub use date::*;
pub use operation::*;
pub use pharmacy::*;
pub use product::*;
pub use storage::*;

use thiserror::Error;

/// Domain validation and state errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Product {id} expired on {date}")]
    Expired { id: String, date: DateValue },

    #[error("Duplicate {kind} id: {id}")]
    Duplicate { kind: &'static str, id: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: u32,
        requested: u32,
    },

    #[error("Operation {id} is already {status}")]
    AlreadyProcessed { id: String, status: OperationStatus },

    #[error("Operation {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: OperationStatus,
        to: OperationStatus,
    },

    #[error("Cannot remove {kind} {id}: still referenced by {referenced_by}")]
    InUse {
        kind: &'static str,
        id: String,
        referenced_by: &'static str,
    },

    #[error("Medicine {0} cannot be its own analogue")]
    SelfAnalogue(String),

    #[error("Medicine {medicine_id} already lists {analogue_id} as an analogue")]
    DuplicateAnalogue {
        medicine_id: String,
        analogue_id: String,
    },

    #[error("Pharmacy {pharmacy_id}: {source}")]
    Pharmacy {
        pharmacy_id: u32,
        #[source]
        source: Box<DomainError>,
    },
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Wrap this error with the identity of the pharmacy it occurred in.
    pub fn in_pharmacy(self, pharmacy_id: u32) -> Self {
        DomainError::Pharmacy {
            pharmacy_id,
            source: Box::new(self),
        }
    }
}

/// Check that a text field is non-empty and safe to store in a record line.
pub(crate) fn require_text(field: &'static str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::InvalidField {
            field,
            reason: "must not be empty".into(),
        });
    }
    if value.contains([';', '\n', '\r']) {
        return Err(DomainError::InvalidField {
            field,
            reason: "must not contain ';' or line breaks".into(),
        });
    }
    Ok(())
}

/// Check that a money or measure value is finite and within `0..=max`.
pub(crate) fn require_range(
    field: &'static str,
    value: f64,
    min_exclusive: bool,
    max: f64,
) -> DomainResult<()> {
    let below = if min_exclusive { value <= 0.0 } else { value < 0.0 };
    if !value.is_finite() || below || value > max {
        return Err(DomainError::OutOfRange {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert!(require_text("name", "Aspirin").is_ok());
        assert!(require_text("name", "   ").is_err());
        assert!(require_text("name", "a;b").is_err());
        assert!(require_text("name", "line\nbreak").is_err());
    }

    #[test]
    fn test_require_range() {
        assert!(require_range("price", 0.0, false, f64::MAX).is_ok());
        assert!(require_range("volume", 0.0, true, 1000.0).is_err());
        assert!(require_range("volume", 1000.0, true, 1000.0).is_ok());
        assert!(require_range("volume", 1000.5, true, 1000.0).is_err());
        assert!(require_range("price", f64::NAN, false, f64::MAX).is_err());
    }

    #[test]
    fn test_pharmacy_scoped_message() {
        let err = DomainError::NotFound {
            kind: "product",
            id: "123".into(),
        }
        .in_pharmacy(7);
        assert_eq!(err.to_string(), "Pharmacy 7: product not found: 123");
    }
}
