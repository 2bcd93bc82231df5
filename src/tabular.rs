//! Boundary interface to the spreadsheet parser.
//!
//! The parser implementation lives outside this crate; reconciliation only
//! depends on the row schema below and the failure shape. Rows arrive in
//! file order and keep their 1-based row numbers for warning reports; row 0
//! stands for the document itself.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::errors::ServiceError;

/// One count-correction row as parsed from an uploaded workbook.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdjustmentRow {
    pub product_code: String,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    /// Warehouse name or code; absent means the default warehouse.
    pub warehouse_label: Option<String>,
    pub shelf_number: Option<String>,
    pub pack_list: Option<String>,
    pub receiving_no: Option<String>,
    pub supplier: Option<String>,
}

/// Raised when an uploaded document cannot be read at all: corrupt file,
/// missing sheet, missing header row. Aborts the batch before any
/// persistence.
#[derive(Debug, Error)]
#[error("row {row}: {message}")]
pub struct DocumentReadError {
    /// 1-based row the failure was detected at; 0 for the whole document.
    pub row: usize,
    pub message: String,
}

impl DocumentReadError {
    pub fn document(message: impl Into<String>) -> Self {
        Self {
            row: 0,
            message: message.into(),
        }
    }
}

impl From<DocumentReadError> for ServiceError {
    fn from(err: DocumentReadError) -> Self {
        ServiceError::DocumentRead(err.to_string())
    }
}

/// Parses an uploaded workbook into ordered adjustment rows.
pub trait TabularRowReader: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<AdjustmentRow>, DocumentReadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_level_failures_report_row_zero() {
        let err = DocumentReadError::document("empty workbook");
        assert_eq!(err.row, 0);
        assert_eq!(err.to_string(), "row 0: empty workbook");
    }
}
