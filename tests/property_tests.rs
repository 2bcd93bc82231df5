mod common;

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, TransactionTrait};

use common::{create_product, create_warehouse, dec, ledger, setup_db};
use stockledger_api::{
    entities::stock_movements::{Entity as StockMovements, MovementType, SourceDocument},
    services::inventory_ledger::{MovementDraft, MovementMetadata},
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Any sequence of deltas leaves every ledger row reconciling its
    /// snapshot and the final balance equal to the running sum.
    #[test]
    fn ledger_snapshots_reconcile_for_any_delta_sequence(
        deltas in prop::collection::vec(-50i64..=50, 1..10)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let db = setup_db().await;
            let product = create_product(&db, "PROP-1", "Prop Widget").await;
            let warehouse = create_warehouse(&db, "MAIN", "Main Warehouse", true, true).await;
            let ledger = ledger(&db);

            for delta in &deltas {
                let txn = db.begin().await.unwrap();
                ledger
                    .apply_movement(
                        &txn,
                        MovementDraft {
                            product_id: product.id,
                            warehouse_id: warehouse.id,
                            movement_type: MovementType::Adjustment,
                            delta_on_hand: dec(*delta),
                            delta_reserved: Decimal::ZERO,
                            source: SourceDocument::StockAdjustment(1),
                            reference_no: None,
                            occurred_at: Utc::now(),
                            metadata: MovementMetadata::default(),
                        },
                    )
                    .await
                    .unwrap();
                txn.commit().await.unwrap();
            }

            let movements = StockMovements::find().all(&*db).await.unwrap();
            assert_eq!(movements.len(), deltas.len());
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

            let expected: i64 = deltas.iter().sum();
            let balance = ledger
                .balance(product.id, warehouse.id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(balance.quantity_on_hand, dec(expected));
        });
    }
}
