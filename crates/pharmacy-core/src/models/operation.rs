//! Inventory operations: supplies, returns and write-offs.
//!
//! An operation records intent and history only. Processing it never touches
//! a stock ledger; callers adjust [`Storage`](super::Storage) themselves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{require_text, DateValue, DomainError, DomainResult, ProductRef};

/// Write-off reason recorded for products that expired before use.
pub const EXPIRED_REASON: &str = "expired";

/// Operation lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Recorded, not yet processed
    Pending,
    /// Processed (terminal)
    Completed,
    /// Abandoned (terminal, set directly)
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Completed => "completed",
            OperationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OperationStatus::Pending),
            "completed" => Ok(OperationStatus::Completed),
            "cancelled" | "canceled" => Ok(OperationStatus::Cancelled),
            other => Err(DomainError::InvalidField {
                field: "status",
                reason: format!("unknown status '{}'", other),
            }),
        }
    }
}

/// Operation-specific data.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    /// Goods moved from `source` to `destination`
    Supply { source: String, destination: String },
    /// Goods returned, e.g. by a customer or to a supplier
    Return { reason: String },
    /// Goods removed from circulation
    WriteOff { reason: String },
}

impl OperationKind {
    /// Record tag used in the operations file.
    pub fn tag(&self) -> &'static str {
        match self {
            OperationKind::Supply { .. } => "SUPPLY",
            OperationKind::Return { .. } => "RETURN",
            OperationKind::WriteOff { .. } => "WRITEOFF",
        }
    }

    /// Reason for returns and write-offs.
    pub fn reason(&self) -> Option<&str> {
        match self {
            OperationKind::Supply { .. } => None,
            OperationKind::Return { reason } | OperationKind::WriteOff { reason } => {
                Some(reason.as_str())
            }
        }
    }

    fn validate(&self) -> DomainResult<()> {
        match self {
            OperationKind::Supply {
                source,
                destination,
            } => {
                require_text("source", source)?;
                require_text("destination", destination)
            }
            OperationKind::Return { reason } | OperationKind::WriteOff { reason } => {
                require_text("reason", reason)
            }
        }
    }
}

/// A recorded stock movement for one product.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryOperation {
    id: String,
    date: DateValue,
    product: ProductRef,
    quantity: u32,
    status: OperationStatus,
    kind: OperationKind,
}

impl InventoryOperation {
    /// Create a pending operation.
    pub fn new(
        id: impl Into<String>,
        date: DateValue,
        product: ProductRef,
        quantity: u32,
        kind: OperationKind,
    ) -> DomainResult<Self> {
        Self::from_record(id, date, product, quantity, OperationStatus::Pending, kind)
    }

    pub fn supply(
        id: impl Into<String>,
        date: DateValue,
        product: ProductRef,
        quantity: u32,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> DomainResult<Self> {
        let kind = OperationKind::Supply {
            source: source.into(),
            destination: destination.into(),
        };
        Self::new(id, date, product, quantity, kind)
    }

    pub fn return_goods(
        id: impl Into<String>,
        date: DateValue,
        product: ProductRef,
        quantity: u32,
        reason: impl Into<String>,
    ) -> DomainResult<Self> {
        let kind = OperationKind::Return {
            reason: reason.into(),
        };
        Self::new(id, date, product, quantity, kind)
    }

    pub fn write_off(
        id: impl Into<String>,
        date: DateValue,
        product: ProductRef,
        quantity: u32,
        reason: impl Into<String>,
    ) -> DomainResult<Self> {
        let kind = OperationKind::WriteOff {
            reason: reason.into(),
        };
        Self::new(id, date, product, quantity, kind)
    }

    /// Rebuild an operation from persisted data, keeping its stored status.
    pub fn from_record(
        id: impl Into<String>,
        date: DateValue,
        product: ProductRef,
        quantity: u32,
        status: OperationStatus,
        kind: OperationKind,
    ) -> DomainResult<Self> {
        let id = id.into();
        require_text("operation id", &id)?;
        if quantity == 0 {
            return Err(DomainError::OutOfRange {
                field: "quantity",
                value: quantity.to_string(),
            });
        }
        kind.validate()?;

        Ok(Self {
            id,
            date,
            product,
            quantity,
            status,
            kind,
        })
    }

    /// Fresh unique operation ID.
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> DateValue {
        self.date
    }

    pub fn product(&self) -> &ProductRef {
        &self.product
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    /// Complete a pending operation. One-shot: fails once completed or cancelled.
    pub fn process(&mut self) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::AlreadyProcessed {
                id: self.id.clone(),
                status: self.status,
            });
        }
        if self.quantity == 0 {
            return Err(DomainError::OutOfRange {
                field: "quantity",
                value: self.quantity.to_string(),
            });
        }

        match &self.kind {
            OperationKind::Supply {
                source,
                destination,
            } => debug!(
                id = %self.id,
                product = self.product.id(),
                quantity = self.quantity,
                %source,
                %destination,
                "supply processed"
            ),
            OperationKind::Return { reason } => debug!(
                id = %self.id,
                product = self.product.id(),
                quantity = self.quantity,
                %reason,
                "return processed"
            ),
            OperationKind::WriteOff { reason } => debug!(
                id = %self.id,
                product = self.product.id(),
                quantity = self.quantity,
                %reason,
                "write-off processed"
            ),
        }

        self.status = OperationStatus::Completed;
        Ok(())
    }

    /// Assign a status directly. A terminal status is never left.
    pub fn set_status(&mut self, status: OperationStatus) -> DomainResult<()> {
        if self.status == status {
            return Ok(());
        }
        if self.status.is_terminal() {
            return Err(DomainError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        Ok(())
    }

    /// True for a write-off recorded because the product expired.
    pub fn is_expiry_write_off(&self) -> bool {
        matches!(&self.kind, OperationKind::WriteOff { reason } if reason == EXPIRED_REASON)
    }
}
