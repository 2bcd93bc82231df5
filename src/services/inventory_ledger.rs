use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    entities::{
        inventory_items::{self, Entity as InventoryItems},
        stock_movements::{self, Entity as StockMovements, MovementType, SourceDocument},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Re-read attempts when a version-guarded balance update loses the race.
const VERSION_RETRIES: u32 = 3;

/// Free-text metadata carried on a movement row.
#[derive(Debug, Clone, Default)]
pub struct MovementMetadata {
    pub shelf_number: Option<String>,
    pub pack_list: Option<String>,
    pub supplier: Option<String>,
}

/// One movement to record. The contract is delta-based: callers working in
/// absolute target quantities compute `delta = target - current` first.
#[derive(Debug, Clone)]
pub struct MovementDraft {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub movement_type: MovementType,
    pub delta_on_hand: Decimal,
    pub delta_reserved: Decimal,
    pub source: SourceDocument,
    pub reference_no: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub metadata: MovementMetadata,
}

/// Outcome of one applied movement, snapshots included.
#[derive(Debug, Clone)]
pub struct AppliedMovement {
    pub movement_id: i64,
    pub item_id: i64,
    pub before_on_hand: Decimal,
    pub after_on_hand: Decimal,
    pub before_reserved: Decimal,
    pub after_reserved: Decimal,
    pub item_created: bool,
}

/// The single choke point for quantity mutation. Every change to a balance
/// goes through [`apply_movement`](InventoryLedger::apply_movement), which
/// pairs the balance write with exactly one appended ledger row.
#[derive(Clone)]
pub struct InventoryLedger {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
}

impl InventoryLedger {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Applies one movement inside the caller's open transaction.
    ///
    /// Reads the current balance (a missing row counts as zero on both
    /// axes), computes the before/after snapshot, creates or updates the
    /// balance row, and appends the movement. The balance update is guarded
    /// by the row's version stamp; a stale read is retried by re-reading,
    /// and a conflict that survives the retry bound surfaces as
    /// `ConcurrentModification`.
    ///
    /// This never commits: all writes land on `txn` and flush with the
    /// caller's other writes, or not at all.
    ///
    /// Resulting on-hand below zero is not rejected here; count
    /// corrections are trusted input and may legitimately drive a balance
    /// down past zero before a recount.
    #[instrument(skip(self, txn, draft), fields(
        product_id = draft.product_id,
        warehouse_id = draft.warehouse_id,
        movement_type = %draft.movement_type,
    ))]
    pub async fn apply_movement(
        &self,
        txn: &DatabaseTransaction,
        draft: MovementDraft,
    ) -> Result<AppliedMovement, ServiceError> {
        for attempt in 0..=VERSION_RETRIES {
            let existing = InventoryItems::find()
                .filter(inventory_items::Column::ProductId.eq(draft.product_id))
                .filter(inventory_items::Column::WarehouseId.eq(draft.warehouse_id))
                .one(txn)
                .await?;

            match existing {
                None => {
                    let after_on_hand = draft.delta_on_hand;
                    let after_reserved = draft.delta_reserved;
                    let now = Utc::now();

                    let item = inventory_items::ActiveModel {
                        product_id: Set(draft.product_id),
                        warehouse_id: Set(draft.warehouse_id),
                        quantity_on_hand: Set(after_on_hand),
                        quantity_reserved: Set(after_reserved),
                        shelf_number: Set(draft.metadata.shelf_number.clone()),
                        version: Set(1),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    };

                    let inserted = item.insert(txn).await?;
                    let movement = self
                        .append_movement(txn, &draft, Decimal::ZERO, Decimal::ZERO)
                        .await?;

                    info!(
                        item_id = inserted.id,
                        %after_on_hand,
                        "balance created by first movement"
                    );

                    return Ok(AppliedMovement {
                        movement_id: movement.id,
                        item_id: inserted.id,
                        before_on_hand: Decimal::ZERO,
                        after_on_hand,
                        before_reserved: Decimal::ZERO,
                        after_reserved,
                        item_created: true,
                    });
                }
                Some(item) => {
                    let before_on_hand = item.quantity_on_hand;
                    let before_reserved = item.quantity_reserved;
                    let after_on_hand = before_on_hand + draft.delta_on_hand;
                    let after_reserved = before_reserved + draft.delta_reserved;

                    let mut update = InventoryItems::update_many()
                        .col_expr(
                            inventory_items::Column::QuantityOnHand,
                            Expr::value(after_on_hand),
                        )
                        .col_expr(
                            inventory_items::Column::QuantityReserved,
                            Expr::value(after_reserved),
                        )
                        .col_expr(
                            inventory_items::Column::Version,
                            Expr::value(item.version + 1),
                        )
                        .col_expr(
                            inventory_items::Column::UpdatedAt,
                            Expr::value(Utc::now()),
                        )
                        .filter(inventory_items::Column::Id.eq(item.id))
                        .filter(inventory_items::Column::Version.eq(item.version));

                    if let Some(shelf) = &draft.metadata.shelf_number {
                        update = update.col_expr(
                            inventory_items::Column::ShelfNumber,
                            Expr::value(shelf.clone()),
                        );
                    }

                    let result = update.exec(txn).await?;
                    if result.rows_affected == 0 {
                        warn!(
                            item_id = item.id,
                            attempt, "stale balance version, re-reading"
                        );
                        continue;
                    }

                    let movement = self
                        .append_movement(txn, &draft, before_on_hand, before_reserved)
                        .await?;

                    return Ok(AppliedMovement {
                        movement_id: movement.id,
                        item_id: item.id,
                        before_on_hand,
                        after_on_hand,
                        before_reserved,
                        after_reserved,
                        item_created: false,
                    });
                }
            }
        }

        Err(ServiceError::ConcurrentModification(format!(
            "balance for product {} in warehouse {} kept changing underneath the write",
            draft.product_id, draft.warehouse_id
        )))
    }

    async fn append_movement(
        &self,
        txn: &DatabaseTransaction,
        draft: &MovementDraft,
        before_on_hand: Decimal,
        before_reserved: Decimal,
    ) -> Result<stock_movements::Model, ServiceError> {
        let movement = stock_movements::ActiveModel {
            product_id: Set(draft.product_id),
            warehouse_id: Set(draft.warehouse_id),
            movement_type: Set(draft.movement_type.as_ref().to_string()),
            delta_on_hand: Set(draft.delta_on_hand),
            delta_reserved: Set(draft.delta_reserved),
            before_on_hand: Set(before_on_hand),
            after_on_hand: Set(before_on_hand + draft.delta_on_hand),
            before_reserved: Set(before_reserved),
            after_reserved: Set(before_reserved + draft.delta_reserved),
            source_document_type: Set(draft.source.kind().to_string()),
            source_document_id: Set(draft.source.document_id()),
            reference_no: Set(draft.reference_no.clone()),
            occurred_at: Set(draft.occurred_at),
            shelf_number: Set(draft.metadata.shelf_number.clone()),
            pack_list: Set(draft.metadata.pack_list.clone()),
            supplier: Set(draft.metadata.supplier.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        movement.insert(txn).await.map_err(ServiceError::db_error)
    }

    /// Current on-hand quantity inside an open transaction; zero when the
    /// pair has no balance row yet. Absolute-target callers use this to
    /// compute their delta before applying.
    pub async fn current_on_hand(
        &self,
        txn: &DatabaseTransaction,
        product_id: i64,
        warehouse_id: i64,
    ) -> Result<Decimal, ServiceError> {
        let item = InventoryItems::find()
            .filter(inventory_items::Column::ProductId.eq(product_id))
            .filter(inventory_items::Column::WarehouseId.eq(warehouse_id))
            .one(txn)
            .await?;

        Ok(item.map(|i| i.quantity_on_hand).unwrap_or(Decimal::ZERO))
    }

    /// Current balance row for a pair, if any.
    #[instrument(skip(self))]
    pub async fn balance(
        &self,
        product_id: i64,
        warehouse_id: i64,
    ) -> Result<Option<inventory_items::Model>, ServiceError> {
        InventoryItems::find()
            .filter(inventory_items::Column::ProductId.eq(product_id))
            .filter(inventory_items::Column::WarehouseId.eq(warehouse_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Recent movements for a pair, newest first.
    #[instrument(skip(self))]
    pub async fn movement_history(
        &self,
        product_id: i64,
        warehouse_id: i64,
        limit: u64,
    ) -> Result<Vec<stock_movements::Model>, ServiceError> {
        StockMovements::find()
            .filter(stock_movements::Column::ProductId.eq(product_id))
            .filter(stock_movements::Column::WarehouseId.eq(warehouse_id))
            .order_by_desc(stock_movements::Column::Id)
            .limit(limit)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// All movements recorded for one source document, in applied order.
    /// This is the display history for a receipt or adjustment; the
    /// shelf/pack/supplier columns on the rows carry everything the old
    /// receive-trail copies used to.
    #[instrument(skip(self))]
    pub async fn movements_for_source(
        &self,
        source: SourceDocument,
    ) -> Result<Vec<stock_movements::Model>, ServiceError> {
        StockMovements::find()
            .filter(stock_movements::Column::SourceDocumentType.eq(source.kind()))
            .filter(stock_movements::Column::SourceDocumentId.eq(source.document_id()))
            .order_by_asc(stock_movements::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Earmarks quantity against a source document. Reserved is a scalar;
    /// no allocation bookkeeping hangs off it.
    #[instrument(skip(self))]
    pub async fn reserve(
        &self,
        product_id: i64,
        warehouse_id: i64,
        quantity: Decimal,
        source: SourceDocument,
        reference_no: Option<String>,
    ) -> Result<AppliedMovement, ServiceError> {
        self.apply_reservation_movement(
            product_id,
            warehouse_id,
            quantity,
            MovementType::Reserve,
            source,
            reference_no,
        )
        .await
    }

    /// Releases previously reserved quantity.
    #[instrument(skip(self))]
    pub async fn release(
        &self,
        product_id: i64,
        warehouse_id: i64,
        quantity: Decimal,
        source: SourceDocument,
        reference_no: Option<String>,
    ) -> Result<AppliedMovement, ServiceError> {
        self.apply_reservation_movement(
            product_id,
            warehouse_id,
            quantity,
            MovementType::Release,
            source,
            reference_no,
        )
        .await
    }

    async fn apply_reservation_movement(
        &self,
        product_id: i64,
        warehouse_id: i64,
        quantity: Decimal,
        movement_type: MovementType,
        source: SourceDocument,
        reference_no: Option<String>,
    ) -> Result<AppliedMovement, ServiceError> {
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Reservation quantity must be positive".to_string(),
            ));
        }

        let delta_reserved = match movement_type {
            MovementType::Reserve => quantity,
            MovementType::Release => -quantity,
            other => {
                return Err(ServiceError::InvalidOperation(format!(
                    "{} is not a reservation movement",
                    other
                )))
            }
        };

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let applied = self
            .apply_movement(
                &txn,
                MovementDraft {
                    product_id,
                    warehouse_id,
                    movement_type,
                    delta_on_hand: Decimal::ZERO,
                    delta_reserved,
                    source,
                    reference_no,
                    occurred_at: Utc::now(),
                    metadata: MovementMetadata::default(),
                },
            )
            .await?;

        if applied.after_reserved < Decimal::ZERO {
            return Err(ServiceError::InvalidOperation(
                "Cannot release more than the reserved quantity".to_string(),
            ));
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(sender) = &self.event_sender {
            let event = match movement_type {
                MovementType::Reserve => Event::InventoryReserved {
                    product_id,
                    warehouse_id,
                    quantity,
                },
                _ => Event::InventoryReleased {
                    product_id,
                    warehouse_id,
                    quantity,
                },
            };
            sender.send_or_log(event).await;
        }

        Ok(applied)
    }
}
