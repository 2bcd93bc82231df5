mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};

use common::{create_product, create_warehouse, dec, ledger, setup_db};
use stockledger_api::{
    entities::stock_movements::{self, Entity as StockMovements, MovementType, SourceDocument},
    errors::ServiceError,
    services::inventory_ledger::{MovementDraft, MovementMetadata},
};

fn draft(
    product_id: i64,
    warehouse_id: i64,
    delta_on_hand: Decimal,
    delta_reserved: Decimal,
) -> MovementDraft {
    MovementDraft {
        product_id,
        warehouse_id,
        movement_type: MovementType::Adjustment,
        delta_on_hand,
        delta_reserved,
        source: SourceDocument::StockAdjustment(1),
        reference_no: None,
        occurred_at: Utc::now(),
        metadata: MovementMetadata::default(),
    }
}

#[tokio::test]
async fn first_movement_creates_the_balance_row() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let ledger = ledger(&db);

    let txn = db.begin().await.unwrap();
    let applied = ledger
        .apply_movement(&txn, draft(product.id, warehouse.id, dec(50), Decimal::ZERO))
        .await
        .unwrap();
    txn.commit().await.unwrap();

    assert!(applied.item_created);
    assert_eq!(applied.before_on_hand, Decimal::ZERO);
    assert_eq!(applied.after_on_hand, dec(50));

    let balance = ledger
        .balance(product.id, warehouse.id)
        .await
        .unwrap()
        .expect("balance row created");
    assert_eq!(balance.quantity_on_hand, dec(50));
    assert_eq!(balance.quantity_reserved, Decimal::ZERO);
    assert_eq!(balance.quantity_available(), dec(50));
    assert_eq!(balance.version, 1);
}

#[tokio::test]
async fn every_movement_row_reconciles_before_after_and_delta() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let ledger = ledger(&db);

    for (on_hand, reserved) in [(50, 0), (-20, 0), (0, 15), (7, -5), (-37, -10)] {
        let txn = db.begin().await.unwrap();
        ledger
            .apply_movement(
                &txn,
                draft(product.id, warehouse.id, dec(on_hand), dec(reserved)),
            )
            .await
            .unwrap();
        txn.commit().await.unwrap();
    }

    let movements = StockMovements::find().all(&*db).await.unwrap();
    assert_eq!(movements.len(), 5);
    for movement in &movements {
        assert_eq!(
            movement.after_on_hand - movement.before_on_hand,
            movement.delta_on_hand
        );
        assert_eq!(
            movement.after_reserved - movement.before_reserved,
            movement.delta_reserved
        );
    }

    let balance = ledger
        .balance(product.id, warehouse.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.quantity_on_hand, Decimal::ZERO);
    assert_eq!(balance.quantity_reserved, Decimal::ZERO);
}

#[tokio::test]
async fn applying_a_delta_and_its_negation_round_trips() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let ledger = ledger(&db);

    let txn = db.begin().await.unwrap();
    ledger
        .apply_movement(&txn, draft(product.id, warehouse.id, dec(80), Decimal::ZERO))
        .await
        .unwrap();
    txn.commit().await.unwrap();

    let txn = db.begin().await.unwrap();
    ledger
        .apply_movement(&txn, draft(product.id, warehouse.id, dec(35), Decimal::ZERO))
        .await
        .unwrap();
    txn.commit().await.unwrap();

    let txn = db.begin().await.unwrap();
    ledger
        .apply_movement(
            &txn,
            draft(product.id, warehouse.id, dec(-35), Decimal::ZERO),
        )
        .await
        .unwrap();
    txn.commit().await.unwrap();

    let balance = ledger
        .balance(product.id, warehouse.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.quantity_on_hand, dec(80));
}

#[tokio::test]
async fn version_stamp_increments_on_every_write() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let ledger = ledger(&db);

    for _ in 0..4 {
        let txn = db.begin().await.unwrap();
        ledger
            .apply_movement(&txn, draft(product.id, warehouse.id, dec(1), Decimal::ZERO))
            .await
            .unwrap();
        txn.commit().await.unwrap();
    }

    let balance = ledger
        .balance(product.id, warehouse.id)
        .await
        .unwrap()
        .unwrap();
    // Created at version 1, then three guarded updates.
    assert_eq!(balance.version, 4);
    assert_eq!(balance.quantity_on_hand, dec(4));
}

#[tokio::test]
async fn reserve_and_release_touch_only_the_reserved_axis() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let ledger = ledger(&db);

    let txn = db.begin().await.unwrap();
    ledger
        .apply_movement(&txn, draft(product.id, warehouse.id, dec(50), Decimal::ZERO))
        .await
        .unwrap();
    txn.commit().await.unwrap();

    let applied = ledger
        .reserve(
            product.id,
            warehouse.id,
            dec(10),
            SourceDocument::PurchaseOrder(1),
            None,
        )
        .await
        .unwrap();
    assert_eq!(applied.after_on_hand, dec(50));
    assert_eq!(applied.after_reserved, dec(10));

    let balance = ledger
        .balance(product.id, warehouse.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.quantity_available(), dec(40));

    ledger
        .release(
            product.id,
            warehouse.id,
            dec(10),
            SourceDocument::PurchaseOrder(1),
            None,
        )
        .await
        .unwrap();

    let balance = ledger
        .balance(product.id, warehouse.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.quantity_reserved, Decimal::ZERO);
    assert_eq!(balance.quantity_available(), dec(50));
}

#[tokio::test]
async fn releasing_more_than_reserved_fails_and_persists_nothing() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let ledger = ledger(&db);

    ledger
        .reserve(
            product.id,
            warehouse.id,
            dec(5),
            SourceDocument::PurchaseOrder(1),
            None,
        )
        .await
        .unwrap();

    let result = ledger
        .release(
            product.id,
            warehouse.id,
            dec(10),
            SourceDocument::PurchaseOrder(1),
            None,
        )
        .await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));

    let balance = ledger
        .balance(product.id, warehouse.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.quantity_reserved, dec(5));

    // The failed release left no ledger row behind.
    let release_rows = StockMovements::find()
        .filter(stock_movements::Column::MovementType.eq("RELEASE"))
        .all(&*db)
        .await
        .unwrap();
    assert!(release_rows.is_empty());
}

#[tokio::test]
async fn movement_history_is_newest_first_and_source_query_is_ordered() {
    let db = setup_db().await;
    let product = create_product(&db, "ABC123", "Widget").await;
    let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
    let ledger = ledger(&db);

    for delta in [10, 20, 30] {
        let txn = db.begin().await.unwrap();
        ledger
            .apply_movement(
                &txn,
                draft(product.id, warehouse.id, dec(delta), Decimal::ZERO),
            )
            .await
            .unwrap();
        txn.commit().await.unwrap();
    }

    let history = ledger
        .movement_history(product.id, warehouse.id, 2)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].delta_on_hand, dec(30));
    assert_eq!(history[1].delta_on_hand, dec(20));

    let by_source = ledger
        .movements_for_source(SourceDocument::StockAdjustment(1))
        .await
        .unwrap();
    assert_eq!(by_source.len(), 3);
    assert_eq!(by_source[0].delta_on_hand, dec(10));
    assert_eq!(by_source[2].delta_on_hand, dec(30));
}
