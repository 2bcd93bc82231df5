//! Batched master-data resolution.
//!
//! Reconcilers resolve every reference up front, once per request: one
//! query for all SKUs, one scan for warehouse labels, one chain walk for
//! the default warehouse. Nothing here is re-queried per row.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;

use crate::{
    entities::{
        products::{self, Entity as Products},
        warehouses::{self, Entity as Warehouses},
    },
    errors::ServiceError,
};

/// Canonical SKU form: trimmed, upper-cased. Both the product master and
/// the import path normalize through this one function.
pub fn normalize_sku(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Canonical warehouse-label form for case-insensitive matching.
pub fn normalize_label(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Batch SKU resolution against the product master.
#[derive(Clone)]
pub struct ProductCatalogLookup {
    db: Arc<DatabaseConnection>,
}

impl ProductCatalogLookup {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Resolves a set of normalized SKUs in one query. Unknown SKUs are
    /// simply absent from the returned map; no fuzzy matching.
    #[instrument(skip(self, skus), fields(count = skus.len()))]
    pub async fn resolve_by_sku(
        &self,
        skus: &HashSet<String>,
    ) -> Result<HashMap<String, products::Model>, ServiceError> {
        if skus.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Products::find()
            .filter(products::Column::Sku.is_in(skus.iter().cloned()))
            .all(&*self.db)
            .await?;

        Ok(rows.into_iter().map(|p| (p.sku.clone(), p)).collect())
    }
}

/// Warehouse resolution: label matching and the default-warehouse chain.
#[derive(Clone)]
pub struct WarehouseDirectory {
    db: Arc<DatabaseConnection>,
    fallback_warehouse_id: Option<i64>,
}

impl WarehouseDirectory {
    pub fn new(db: Arc<DatabaseConnection>, fallback_warehouse_id: Option<i64>) -> Self {
        Self {
            db,
            fallback_warehouse_id,
        }
    }

    /// Resolves a set of normalized labels against warehouse names and
    /// codes, case-insensitively. The directory is small; one scan serves
    /// the whole batch.
    #[instrument(skip(self, labels), fields(count = labels.len()))]
    pub async fn resolve_by_name_or_code(
        &self,
        labels: &HashSet<String>,
    ) -> Result<HashMap<String, i64>, ServiceError> {
        if labels.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Warehouses::find().all(&*self.db).await?;

        let mut resolved = HashMap::new();
        for warehouse in &rows {
            for key in [
                normalize_label(&warehouse.name),
                normalize_label(&warehouse.code),
            ] {
                if labels.contains(&key) {
                    resolved.entry(key).or_insert(warehouse.id);
                }
            }
        }
        Ok(resolved)
    }

    /// Walks the default-warehouse chain once: explicit `is_default` flag,
    /// then the first active warehouse, then the configured fallback id.
    /// Returns `None` when the chain is exhausted; callers that actually
    /// need a default treat that as a missing reference.
    #[instrument(skip(self))]
    pub async fn default_warehouse_id(&self) -> Result<Option<i64>, ServiceError> {
        if let Some(warehouse) = Warehouses::find()
            .filter(warehouses::Column::IsDefault.eq(true))
            .order_by_asc(warehouses::Column::Id)
            .one(&*self.db)
            .await?
        {
            return Ok(Some(warehouse.id));
        }

        if let Some(warehouse) = Warehouses::find()
            .filter(warehouses::Column::IsActive.eq(true))
            .order_by_asc(warehouses::Column::Id)
            .one(&*self.db)
            .await?
        {
            return Ok(Some(warehouse.id));
        }

        Ok(self.fallback_warehouse_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_normalization_trims_and_uppercases() {
        assert_eq!(normalize_sku("  abc123 "), "ABC123");
        assert_eq!(normalize_sku("ABC123"), "ABC123");
        assert_eq!(normalize_sku(""), "");
    }

    #[test]
    fn sku_normalization_is_idempotent() {
        let once = normalize_sku(" widget-9a ");
        assert_eq!(normalize_sku(&once), once);
    }

    #[test]
    fn label_normalization_lowercases() {
        assert_eq!(normalize_label(" Main-WH "), "main-wh");
    }
}
