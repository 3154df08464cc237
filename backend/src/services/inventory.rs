//! Inventory service: stock levels, adjustments, transfers and the movement
//! journal
//!
//! Every change to a stock level goes through [`record_movement`], which
//! applies the balance change and appends the journal entry in the same
//! transaction. The journal is append-only; corrections are new adjustment
//! movements, never edits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::search::{apply_page, apply_predicates};
use shared::filter::MovementFilter;
use shared::models::{MovementType, StockMovement};
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};

/// Inventory service
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

/// Input for a manual stock adjustment
#[derive(Debug, Deserialize)]
pub struct AdjustStockInput {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    /// Signed delta: positive adds stock, negative removes it
    pub quantity: i32,
    pub reason: String,
}

/// Input for transferring stock between warehouses
#[derive(Debug, Deserialize)]
pub struct TransferStockInput {
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub reason: Option<String>,
}

/// Stock level enriched with product identity for listings
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StockLevelView {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

/// A product whose total on-hand quantity fell below its reorder level
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LowStockProduct {
    pub product_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub reorder_level: i32,
    pub on_hand: i64,
}

/// Movement row from database
#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: Uuid,
    warehouse_id: Uuid,
    product_id: Uuid,
    movement_type: String,
    quantity: i32,
    order_reference: Option<String>,
    reason: Option<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl MovementRow {
    fn into_movement(self) -> AppResult<StockMovement> {
        let movement_type = MovementType::from_str(&self.movement_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown movement type: {}", self.movement_type))
        })?;
        Ok(StockMovement {
            id: self.id,
            warehouse_id: self.warehouse_id,
            product_id: self.product_id,
            movement_type,
            quantity: self.quantity,
            order_reference: self.order_reference,
            reason: self.reason,
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

const MOVEMENT_COLUMNS: &str = "id, warehouse_id, product_id, movement_type, quantity, \
                                order_reference, reason, created_by, created_at";

/// Apply a movement to a stock level and append the journal entry
///
/// `quantity` is signed for adjustments and positive for every other
/// movement type, whose direction comes from the type itself. Fails with
/// `InsufficientStock` when the balance would go negative, rolling the
/// surrounding transaction back.
pub(crate) async fn record_movement(
    tx: &mut Transaction<'_, Postgres>,
    warehouse_id: Uuid,
    product_id: Uuid,
    movement_type: MovementType,
    quantity: i32,
    order_reference: Option<&str>,
    reason: Option<&str>,
    user_id: Uuid,
) -> AppResult<()> {
    let delta = match movement_type {
        MovementType::Adjustment => quantity,
        t if t.is_inbound() => quantity,
        _ => -quantity,
    };

    let new_quantity = sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO stock_levels (warehouse_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (warehouse_id, product_id)
        DO UPDATE SET quantity = stock_levels.quantity + EXCLUDED.quantity, updated_at = NOW()
        RETURNING quantity
        "#,
    )
    .bind(warehouse_id)
    .bind(product_id)
    .bind(delta)
    .fetch_one(&mut **tx)
    .await?;

    if new_quantity < 0 {
        return Err(AppError::InsufficientStock(format!(
            "Stock for product {} in warehouse {} would go negative",
            product_id, warehouse_id
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO stock_movements
            (warehouse_id, product_id, movement_type, quantity, order_reference, reason, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(warehouse_id)
    .bind(product_id)
    .bind(movement_type.as_str())
    .bind(quantity)
    .bind(order_reference)
    .bind(reason)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Stock levels for one warehouse
    pub async fn stock_levels(
        &self,
        user: &AuthUser,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<StockLevelView>> {
        if !user.has_permission("inventory", "view") {
            return Err(AppError::InsufficientPermissions);
        }

        let levels = sqlx::query_as::<_, StockLevelView>(
            r#"
            SELECT sl.warehouse_id, sl.product_id, p.sku, p.name AS product_name,
                   sl.quantity, sl.updated_at
            FROM stock_levels sl
            JOIN products p ON p.id = sl.product_id
            WHERE sl.warehouse_id = $1
            ORDER BY p.sku ASC
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(levels)
    }

    /// Manually adjust a stock level, with a mandatory reason
    pub async fn adjust(&self, user: &AuthUser, input: AdjustStockInput) -> AppResult<()> {
        if !user.has_permission("inventory", "adjust") {
            return Err(AppError::InsufficientPermissions);
        }

        if input.quantity == 0 {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Adjustment quantity cannot be zero".to_string(),
            });
        }
        if input.reason.trim().is_empty() {
            return Err(AppError::Validation {
                field: "reason".to_string(),
                message: "Adjustments require a reason".to_string(),
            });
        }

        self.ensure_warehouse(input.warehouse_id).await?;
        self.ensure_product(input.product_id).await?;

        let mut tx = self.db.begin().await?;
        record_movement(
            &mut tx,
            input.warehouse_id,
            input.product_id,
            MovementType::Adjustment,
            input.quantity,
            None,
            Some(input.reason.trim()),
            user.user_id,
        )
        .await?;
        tx.commit().await?;

        Ok(())
    }

    /// Move stock between warehouses
    ///
    /// Records a transfer-out in the source and a transfer-in in the
    /// destination atomically; the journal always shows both sides or
    /// neither.
    pub async fn transfer(&self, user: &AuthUser, input: TransferStockInput) -> AppResult<()> {
        if !user.has_permission("inventory", "transfer") {
            return Err(AppError::InsufficientPermissions);
        }

        if input.quantity <= 0 {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Transfer quantity must be greater than zero".to_string(),
            });
        }
        if input.from_warehouse_id == input.to_warehouse_id {
            return Err(AppError::Validation {
                field: "to_warehouse_id".to_string(),
                message: "Source and destination warehouses must differ".to_string(),
            });
        }

        self.ensure_warehouse(input.from_warehouse_id).await?;
        self.ensure_warehouse(input.to_warehouse_id).await?;
        self.ensure_product(input.product_id).await?;

        let reason = input.reason.as_deref().map(str::trim);

        let mut tx = self.db.begin().await?;
        record_movement(
            &mut tx,
            input.from_warehouse_id,
            input.product_id,
            MovementType::TransferOut,
            input.quantity,
            None,
            reason,
            user.user_id,
        )
        .await?;
        record_movement(
            &mut tx,
            input.to_warehouse_id,
            input.product_id,
            MovementType::TransferIn,
            input.quantity,
            None,
            reason,
            user.user_id,
        )
        .await?;
        tx.commit().await?;

        Ok(())
    }

    /// List journal entries matching a filter, newest first
    pub async fn movements(
        &self,
        user: &AuthUser,
        filter: &MovementFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<StockMovement>> {
        if !user.has_permission("inventory", "view") {
            return Err(AppError::InsufficientPermissions);
        }

        let predicates = filter.predicates();

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM stock_movements WHERE TRUE");
        apply_predicates(&mut count_qb, &predicates);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM stock_movements WHERE TRUE",
            MOVEMENT_COLUMNS
        ));
        apply_predicates(&mut qb, &predicates);
        apply_page(&mut qb, "created_at DESC", pagination);

        let rows: Vec<MovementRow> = qb.build_query_as().fetch_all(&self.db).await?;
        let movements = rows
            .into_iter()
            .map(MovementRow::into_movement)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            data: movements,
            pagination: PaginationMeta::new(pagination, total as u64),
        })
    }

    /// Active products whose total on-hand stock is below their reorder level
    pub async fn low_stock(&self, user: &AuthUser) -> AppResult<Vec<LowStockProduct>> {
        if !user.has_permission("inventory", "view") {
            return Err(AppError::InsufficientPermissions);
        }

        let products = sqlx::query_as::<_, LowStockProduct>(
            r#"
            SELECT p.id AS product_id, p.sku, p.name AS product_name, p.reorder_level,
                   COALESCE(SUM(sl.quantity), 0) AS on_hand
            FROM products p
            LEFT JOIN stock_levels sl ON sl.product_id = p.id
            WHERE p.deleted_at IS NULL AND p.active = true AND p.reorder_level > 0
            GROUP BY p.id, p.sku, p.name, p.reorder_level
            HAVING COALESCE(SUM(sl.quantity), 0) < p.reorder_level
            ORDER BY p.sku ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    async fn ensure_warehouse(&self, warehouse_id: Uuid) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(warehouse_id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Warehouse".to_string()));
        }
        Ok(())
    }

    async fn ensure_product(&self, product_id: Uuid) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Ok(())
    }
}
