pub mod inventory_ledger;
pub mod lookups;
pub mod purchase_receipts;
pub mod stock_adjustments;
