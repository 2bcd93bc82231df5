mod common;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, PaginatorTrait};

use common::{adjustment_service, create_product, create_warehouse, dec, ledger, setup_db};
use stockledger_api::{
    entities::{
        stock_adjustment_items::Entity as StockAdjustmentItems,
        stock_adjustments::Entity as StockAdjustments,
        stock_movements::Entity as StockMovements,
    },
    errors::ServiceError,
    services::stock_adjustments::AdjustmentBatch,
    tabular::{AdjustmentRow, DocumentReadError, TabularRowReader},
};

fn row(product_code: &str, quantity: i64) -> AdjustmentRow {
    AdjustmentRow {
        product_code: product_code.to_string(),
        quantity: dec(quantity),
        price: None,
        currency: None,
        warehouse_label: None,
        shelf_number: None,
        pack_list: None,
        receiving_no: None,
        supplier: None,
    }
}

fn batch(rows: Vec<AdjustmentRow>) -> AdjustmentBatch {
    AdjustmentBatch {
        adjustment_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        description: Some("Quarterly count".to_string()),
        rows,
    }
}

#[tokio::test]
async fn count_for_an_unseen_pair_creates_the_item() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let service = adjustment_service(&db);

    let summary = service.reconcile(batch(vec![row("ABC123", 50)])).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 0);
    assert!(summary.warnings.is_empty());

    let balance = ledger(&db)
        .balance(product.id, warehouse.id)
        .await
        .unwrap()
        .expect("item created by first count");
    assert_eq!(balance.quantity_on_hand, dec(50));

    let movements = StockMovements::find().all(&*db).await.unwrap();
    assert_eq!(movements.len(), 1);
    let movement = &movements[0];
    assert_eq!(movement.movement_type, "ADJUSTMENT");
    assert_eq!(movement.before_on_hand, Decimal::ZERO);
    assert_eq!(movement.after_on_hand, dec(50));
    assert_eq!(movement.delta_on_hand, dec(50));
    assert_eq!(movement.source_document_type, "STOCK_ADJUSTMENT");
    assert_eq!(movement.source_document_id, summary.adjustment_id);

    let items = StockAdjustmentItems::find().all(&*db).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].old_quantity, Decimal::ZERO);
    assert_eq!(items[0].new_quantity, dec(50));
}

#[tokio::test]
async fn product_codes_are_normalized_before_lookup() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let service = adjustment_service(&db);

    let summary = service
        .reconcile(batch(vec![row("  abc123 ", 12)]))
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    let balance = ledger(&db)
        .balance(product.id, warehouse.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.quantity_on_hand, dec(12));
}

#[tokio::test]
async fn unknown_sku_is_skipped_and_the_batch_continues() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let service = adjustment_service(&db);

    let summary = service
        .reconcile(batch(vec![row("ZZZZZ", 10), row("ABC123", 5)]))
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.warnings.len(), 1);
    let warning = &summary.warnings[0];
    assert_eq!(warning.row, 1);
    assert_eq!(warning.product_code.as_deref(), Some("ZZZZZ"));
    assert_eq!(warning.reason, "Product not found.");

    let balance = ledger(&db)
        .balance(product.id, warehouse.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.quantity_on_hand, dec(5));
}

#[tokio::test]
async fn warehouse_labels_match_name_or_code_case_insensitively() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let _main = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let overflow = create_warehouse(&db, "OVF", "Overflow Warehouse", false, true).await;
    let service = adjustment_service(&db);

    let mut by_code = row("ABC123", 7);
    by_code.warehouse_label = Some("ovf".to_string());
    let mut by_name = row("ABC123", 9);
    by_name.warehouse_label = Some("OVERFLOW WAREHOUSE".to_string());

    // Second row overwrites the first; both target the overflow warehouse.
    let summary = service.reconcile(batch(vec![by_code, by_name])).await.unwrap();
    assert_eq!(summary.processed, 2);
    assert!(summary.warnings.is_empty());

    let balance = ledger(&db)
        .balance(product.id, overflow.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.quantity_on_hand, dec(9));
}

#[tokio::test]
async fn unmatched_label_warns_and_falls_back_to_the_default_warehouse() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let main = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let service = adjustment_service(&db);

    let mut labeled = row("ABC123", 30);
    labeled.warehouse_label = Some("Atlantis".to_string());

    let summary = service.reconcile(batch(vec![labeled])).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].reason.contains("Atlantis"));

    let balance = ledger(&db)
        .balance(product.id, main.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.quantity_on_hand, dec(30));
}

#[tokio::test]
async fn counts_are_absolute_targets_not_increments() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let service = adjustment_service(&db);

    service.reconcile(batch(vec![row("ABC123", 80)])).await.unwrap();
    let summary = service.reconcile(batch(vec![row("ABC123", 50)])).await.unwrap();

    let balance = ledger(&db)
        .balance(product.id, warehouse.id)
        .await
        .unwrap()
        .unwrap();
    // On-hand equals the counted quantity, not the sum of counts.
    assert_eq!(balance.quantity_on_hand, dec(50));

    let movements = ledger(&db)
        .movements_for_source(
            stockledger_api::entities::stock_movements::SourceDocument::StockAdjustment(
                summary.adjustment_id,
            ),
        )
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].delta_on_hand, dec(-30));
    assert_eq!(movements[0].before_on_hand, dec(80));
    assert_eq!(movements[0].after_on_hand, dec(50));
}

#[tokio::test]
async fn exhausted_default_chain_aborts_with_nothing_persisted() {
    let db = setup_db().await;
    create_product(&db, "ABC123", "Widget").await;
    // No default flag, not active, and no configured fallback: the chain
    // has nowhere to go.
    create_warehouse(&db, "COLD", "Mothballed Warehouse", false, false).await;
    let service = adjustment_service(&db);

    let result = service.reconcile(batch(vec![row("ABC123", 50)])).await;
    assert_matches!(result, Err(ServiceError::ReferenceNotFound(_)));

    // All-or-nothing: the header did not survive the failed batch.
    assert_eq!(StockAdjustments::find().count(&*db).await.unwrap(), 0);
    assert_eq!(StockMovements::find().count(&*db).await.unwrap(), 0);
    assert_eq!(StockAdjustmentItems::find().count(&*db).await.unwrap(), 0);
}

/// Parses `SKU,QTY` lines; any other shape is a document error.
struct CsvStubReader;

impl TabularRowReader for CsvStubReader {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<AdjustmentRow>, DocumentReadError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| DocumentReadError::document("not valid UTF-8"))?;
        if text.trim().is_empty() {
            return Err(DocumentReadError::document("empty workbook"));
        }
        text.lines()
            .enumerate()
            .map(|(i, l)| {
                let (sku, qty) = l.split_once(',').ok_or(DocumentReadError {
                    row: i + 1,
                    message: "missing quantity column".to_string(),
                })?;
                Ok(AdjustmentRow {
                    product_code: sku.to_string(),
                    quantity: qty.trim().parse().map_err(|_| DocumentReadError {
                        row: i + 1,
                        message: format!("'{}' is not a quantity", qty),
                    })?,
                    price: None,
                    currency: None,
                    warehouse_label: None,
                    shelf_number: None,
                    pack_list: None,
                    receiving_no: None,
                    supplier: None,
                })
            })
            .collect()
    }
}

#[tokio::test]
async fn documents_flow_through_the_reader_into_the_ledger() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let service = adjustment_service(&db);

    let summary = service
        .reconcile_document(
            &CsvStubReader,
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            None,
            b"ABC123,50\nZZZZZ,10",
        )
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);
    let balance = ledger(&db)
        .balance(product.id, warehouse.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.quantity_on_hand, dec(50));
}

#[tokio::test]
async fn an_unreadable_document_aborts_before_any_persistence() {
    let db = setup_db().await;
    create_product(&db, "ABC123", "Widget").await;
    create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let service = adjustment_service(&db);

    let result = service
        .reconcile_document(
            &CsvStubReader,
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            None,
            b"",
        )
        .await;
    assert_matches!(result, Err(ServiceError::DocumentRead(msg)) if msg.contains("row 0"));

    assert_eq!(StockAdjustments::find().count(&*db).await.unwrap(), 0);
    assert_eq!(StockMovements::find().count(&*db).await.unwrap(), 0);
}

#[tokio::test]
async fn a_batch_touching_many_pairs_leaves_each_at_its_counted_quantity() {
    let db = setup_db().await;
    let widget = create_product(&db, "ABC123", "Widget").await;
    let gadget = create_product(&db, "XYZ789", "Gadget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let service = adjustment_service(&db);

    let summary = service
        .reconcile(batch(vec![row("ABC123", 41), row("XYZ789", 17)]))
        .await
        .unwrap();
    assert_eq!(summary.processed, 2);

    let ledger = ledger(&db);
    assert_eq!(
        ledger
            .balance(widget.id, warehouse.id)
            .await
            .unwrap()
            .unwrap()
            .quantity_on_hand,
        dec(41)
    );
    assert_eq!(
        ledger
            .balance(gadget.id, warehouse.id)
            .await
            .unwrap()
            .unwrap()
            .quantity_on_hand,
        dec(17)
    );
}
