//! Purchase order service
//!
//! Creation, editing, the approval/receiving lifecycle and soft deletion.
//! Status rules come from the shared lifecycle table; money comes from the
//! shared calculators. Derived totals are recomputed inside the same
//! transaction as whatever line change triggered them, so an order's stored
//! totals are never stale.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::inventory::record_movement;
use crate::services::search::{apply_page, apply_predicates};
use shared::calc::{line_totals, order_totals, LineFinancials};
use shared::filter::{FilterContext, PurchaseOrderFilter};
use shared::lifecycle::{rejected_fields, PURCHASE_LIFECYCLE};
use shared::models::{
    MovementType, OrderPriority, PurchaseItemStatus, PurchaseOrder, PurchaseOrderItem,
    PurchaseOrderStatus,
};
use shared::reference::{format_reference, next_sequence, period_token};
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::{
    parse_tax_rate, validate_discount_percentage, validate_non_negative_amount, validate_quantity,
};

/// Purchase order service
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: PgPool,
}

/// Input for one order line
#[derive(Debug, Deserialize)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub discount_percentage: Option<Decimal>,
}

impl LineFinancials for OrderItemInput {
    fn quantity_ordered(&self) -> i32 {
        self.quantity
    }

    fn unit_amount(&self) -> Decimal {
        self.unit_cost
    }

    fn discount_percentage(&self) -> Decimal {
        self.discount_percentage.unwrap_or(Decimal::ZERO)
    }
}

/// Input for creating a purchase order
#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderInput {
    pub supplier_name: String,
    pub warehouse_id: Uuid,
    pub priority: Option<OrderPriority>,
    /// Percentage string, e.g. "22" for 22%
    pub tax_rate: Option<String>,
    pub shipping_cost: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
}

/// Input for updating a purchase order's header fields
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePurchaseOrderInput {
    pub supplier_name: Option<String>,
    pub warehouse_id: Option<Uuid>,
    pub priority: Option<OrderPriority>,
    pub tax_rate: Option<String>,
    pub shipping_cost: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Input for updating one order line
#[derive(Debug, Deserialize)]
pub struct UpdateItemInput {
    pub quantity: Option<i32>,
    pub unit_cost: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
}

/// One line of a goods receipt
#[derive(Debug, Deserialize)]
pub struct ReceiveLineInput {
    pub item_id: Uuid,
    pub quantity_received: i32,
    pub quantity_rejected: Option<i32>,
}

/// Input for receiving goods against an order
#[derive(Debug, Deserialize)]
pub struct ReceiveItemsInput {
    pub items: Vec<ReceiveLineInput>,
}

/// Input for cancelling an order
#[derive(Debug, Deserialize)]
pub struct CancelOrderInput {
    pub reason: String,
}

/// A purchase order with its lines
#[derive(Debug, Serialize)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

/// Order row from database
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    reference: String,
    supplier_name: String,
    warehouse_id: Uuid,
    status: String,
    priority: String,
    subtotal: Decimal,
    tax_rate: Decimal,
    tax_amount: Decimal,
    shipping_cost: Decimal,
    discount_amount: Decimal,
    total_amount: Decimal,
    expected_date: Option<NaiveDate>,
    notes: Option<String>,
    cancellation_reason: Option<String>,
    created_by: Uuid,
    approved_by: Option<Uuid>,
    sent_by: Option<Uuid>,
    received_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self) -> AppResult<PurchaseOrder> {
        let status = PurchaseOrderStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown order status: {}", self.status)))?;
        let priority = OrderPriority::from_str(&self.priority).ok_or_else(|| {
            AppError::Internal(format!("Unknown order priority: {}", self.priority))
        })?;
        Ok(PurchaseOrder {
            id: self.id,
            reference: self.reference,
            supplier_name: self.supplier_name,
            warehouse_id: self.warehouse_id,
            status,
            priority,
            subtotal: self.subtotal,
            tax_rate: self.tax_rate,
            tax_amount: self.tax_amount,
            shipping_cost: self.shipping_cost,
            discount_amount: self.discount_amount,
            total_amount: self.total_amount,
            expected_date: self.expected_date,
            notes: self.notes,
            cancellation_reason: self.cancellation_reason,
            created_by: self.created_by,
            approved_by: self.approved_by,
            sent_by: self.sent_by,
            received_by: self.received_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            approved_at: self.approved_at,
            sent_at: self.sent_at,
            received_at: self.received_at,
            cancelled_at: self.cancelled_at,
            closed_at: self.closed_at,
            deleted_at: self.deleted_at,
        })
    }
}

/// Item row from database
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    purchase_order_id: Uuid,
    product_id: Uuid,
    quantity_ordered: i32,
    quantity_received: i32,
    quantity_rejected: i32,
    unit_cost: Decimal,
    discount_percentage: Decimal,
    line_total: Decimal,
    discount_amount: Decimal,
    final_line_total: Decimal,
    item_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_item(self) -> AppResult<PurchaseOrderItem> {
        let item_status = PurchaseItemStatus::from_str(&self.item_status).ok_or_else(|| {
            AppError::Internal(format!("Unknown item status: {}", self.item_status))
        })?;
        Ok(PurchaseOrderItem {
            id: self.id,
            purchase_order_id: self.purchase_order_id,
            product_id: self.product_id,
            quantity_ordered: self.quantity_ordered,
            quantity_received: self.quantity_received,
            quantity_rejected: self.quantity_rejected,
            unit_cost: self.unit_cost,
            discount_percentage: self.discount_percentage,
            line_total: self.line_total,
            discount_amount: self.discount_amount,
            final_line_total: self.final_line_total,
            item_status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, reference, supplier_name, warehouse_id, status, priority, \
     subtotal, tax_rate, tax_amount, shipping_cost, discount_amount, total_amount, \
     expected_date, notes, cancellation_reason, created_by, approved_by, sent_by, received_by, \
     created_at, updated_at, approved_at, sent_at, received_at, cancelled_at, closed_at, deleted_at";

const ITEM_COLUMNS: &str = "id, purchase_order_id, product_id, quantity_ordered, \
     quantity_received, quantity_rejected, unit_cost, discount_percentage, line_total, \
     discount_amount, final_line_total, item_status, created_at, updated_at";

fn validate_item_input(item: &OrderItemInput) -> AppResult<()> {
    validate_quantity(item.quantity).map_err(|message| AppError::Validation {
        field: "quantity".to_string(),
        message: message.to_string(),
    })?;
    validate_non_negative_amount(item.unit_cost).map_err(|message| AppError::Validation {
        field: "unit_cost".to_string(),
        message: message.to_string(),
    })?;
    validate_discount_percentage(item.discount_percentage.unwrap_or(Decimal::ZERO)).map_err(
        |message| AppError::Validation {
            field: "discount_percentage".to_string(),
            message: message.to_string(),
        },
    )?;
    Ok(())
}

fn ensure_owner(user: &AuthUser, created_by: Uuid) -> AppResult<()> {
    if user.bypasses_ownership() || user.user_id == created_by {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You may only act on orders you created".to_string(),
        ))
    }
}

impl PurchaseOrderService {
    /// Create a new PurchaseOrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List purchase orders matching a filter, newest first
    pub async fn list(
        &self,
        user: &AuthUser,
        filter: &PurchaseOrderFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<PurchaseOrder>> {
        if !user.has_permission("purchase_orders", "view") {
            return Err(AppError::InsufficientPermissions);
        }

        let ctx = FilterContext {
            user_id: user.user_id,
        };
        let predicates = filter.predicates(&ctx);

        let mut count_qb =
            QueryBuilder::new("SELECT COUNT(*) FROM purchase_orders WHERE deleted_at IS NULL");
        apply_predicates(&mut count_qb, &predicates);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM purchase_orders WHERE deleted_at IS NULL",
            ORDER_COLUMNS
        ));
        apply_predicates(&mut qb, &predicates);
        apply_page(&mut qb, "created_at DESC", pagination);

        let rows: Vec<OrderRow> = qb.build_query_as().fetch_all(&self.db).await?;
        let orders = rows
            .into_iter()
            .map(OrderRow::into_order)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            data: orders,
            pagination: PaginationMeta::new(pagination, total as u64),
        })
    }

    /// Get a purchase order with its lines
    pub async fn get(&self, user: &AuthUser, order_id: Uuid) -> AppResult<PurchaseOrderDetail> {
        if !user.has_permission("purchase_orders", "view") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        let items = self.load_items(order_id).await?;
        Ok(PurchaseOrderDetail { order, items })
    }

    /// Create a purchase order in draft status
    pub async fn create(
        &self,
        user: &AuthUser,
        input: CreatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrderDetail> {
        if !user.has_permission("purchase_orders", "create") {
            return Err(AppError::InsufficientPermissions);
        }

        if input.supplier_name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "supplier_name".to_string(),
                message: "Supplier name is required".to_string(),
            });
        }
        let tax_rate = match input.tax_rate.as_deref() {
            Some(raw) => parse_tax_rate(raw).map_err(|message| AppError::Validation {
                field: "tax_rate".to_string(),
                message: message.to_string(),
            })?,
            None => Decimal::ZERO,
        };
        let shipping_cost = input.shipping_cost.unwrap_or(Decimal::ZERO);
        let discount_amount = input.discount_amount.unwrap_or(Decimal::ZERO);
        validate_non_negative_amount(shipping_cost).map_err(|message| AppError::Validation {
            field: "shipping_cost".to_string(),
            message: message.to_string(),
        })?;
        validate_non_negative_amount(discount_amount).map_err(|message| AppError::Validation {
            field: "discount_amount".to_string(),
            message: message.to_string(),
        })?;
        for item in &input.items {
            validate_item_input(item)?;
        }

        let warehouse_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(input.warehouse_id)
        .fetch_one(&self.db)
        .await?;
        if !warehouse_exists {
            return Err(AppError::NotFound("Warehouse".to_string()));
        }

        let priority = input.priority.unwrap_or_default();
        let finals: Vec<Decimal> = input
            .items
            .iter()
            .map(|item| line_totals(item).final_line_total)
            .collect();
        let totals = order_totals(&finals, tax_rate, shipping_cost, discount_amount);

        let mut tx = self.db.begin().await?;

        // Derive the next reference from the latest one in this month's
        // bucket. Concurrent creators can collide; the UNIQUE constraint on
        // reference turns the loser into a conflict response.
        let now = Utc::now();
        let latest: Option<String> = sqlx::query_scalar(
            "SELECT reference FROM purchase_orders WHERE reference LIKE $1 \
             ORDER BY reference DESC LIMIT 1",
        )
        .bind(format!("PO-{}-%", period_token(now)))
        .fetch_optional(&mut *tx)
        .await?;
        let reference = format_reference("PO", now, next_sequence(latest.as_deref()));

        let order_row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO purchase_orders
                (reference, supplier_name, warehouse_id, status, priority, subtotal, tax_rate,
                 tax_amount, shipping_cost, discount_amount, total_amount, expected_date, notes,
                 created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(&reference)
        .bind(input.supplier_name.trim())
        .bind(input.warehouse_id)
        .bind(PurchaseOrderStatus::Draft.as_str())
        .bind(priority.as_str())
        .bind(totals.subtotal)
        .bind(tax_rate)
        .bind(totals.tax_amount)
        .bind(totals.shipping_cost)
        .bind(totals.discount_amount)
        .bind(totals.total_amount)
        .bind(input.expected_date)
        .bind(&input.notes)
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AppError::DuplicateEntry("reference".to_string())
            }
            _ => AppError::from(e),
        })?;

        for item in &input.items {
            insert_item(&mut tx, order_row.id, item).await?;
        }

        tx.commit().await?;

        tracing::info!(reference = %reference, "Purchase order created");
        self.detail(order_row).await
    }

    /// Update header fields of a purchase order
    ///
    /// Fields not mutable in the order's current status reject the whole
    /// request, naming every offending field; nothing is partially applied.
    pub async fn update(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: UpdatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrderDetail> {
        if !user.has_permission("purchase_orders", "edit") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;

        let mut touched: Vec<&str> = Vec::new();
        if input.supplier_name.is_some() {
            touched.push("supplier_name");
        }
        if input.warehouse_id.is_some() {
            touched.push("warehouse_id");
        }
        if input.priority.is_some() {
            touched.push("priority");
        }
        if input.tax_rate.is_some() {
            touched.push("tax_rate");
        }
        if input.shipping_cost.is_some() {
            touched.push("shipping_cost");
        }
        if input.discount_amount.is_some() {
            touched.push("discount_amount");
        }
        if input.expected_date.is_some() {
            touched.push("expected_date");
        }
        if input.notes.is_some() {
            touched.push("notes");
        }

        let rejected = rejected_fields(&PURCHASE_LIFECYCLE, order.status, &touched);
        if !rejected.is_empty() {
            return Err(AppError::fields_not_editable(order.status.as_str(), rejected));
        }

        let tax_rate = match input.tax_rate.as_deref() {
            Some(raw) => parse_tax_rate(raw).map_err(|message| AppError::Validation {
                field: "tax_rate".to_string(),
                message: message.to_string(),
            })?,
            None => order.tax_rate,
        };
        let shipping_cost = input.shipping_cost.unwrap_or(order.shipping_cost);
        let discount_amount = input.discount_amount.unwrap_or(order.discount_amount);
        validate_non_negative_amount(shipping_cost).map_err(|message| AppError::Validation {
            field: "shipping_cost".to_string(),
            message: message.to_string(),
        })?;
        validate_non_negative_amount(discount_amount).map_err(|message| AppError::Validation {
            field: "discount_amount".to_string(),
            message: message.to_string(),
        })?;

        let supplier_name = input
            .supplier_name
            .unwrap_or_else(|| order.supplier_name.clone());
        if supplier_name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "supplier_name".to_string(),
                message: "Supplier name is required".to_string(),
            });
        }
        let warehouse_id = input.warehouse_id.unwrap_or(order.warehouse_id);
        let priority = input.priority.unwrap_or(order.priority);
        let expected_date = input.expected_date.or(order.expected_date);
        let notes = input.notes.or_else(|| order.notes.clone());

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            UPDATE purchase_orders
            SET supplier_name = $1, warehouse_id = $2, priority = $3, expected_date = $4,
                notes = $5, updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(supplier_name.trim())
        .bind(warehouse_id)
        .bind(priority.as_str())
        .bind(expected_date)
        .bind(&notes)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        recompute_totals(&mut tx, order_id, tax_rate, shipping_cost, discount_amount).await?;
        tx.commit().await?;

        self.get(user, order_id).await
    }

    /// Add a line to an editable order
    pub async fn add_item(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: OrderItemInput,
    ) -> AppResult<PurchaseOrderDetail> {
        if !user.has_permission("purchase_orders", "edit") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;
        self.ensure_editable(&order)?;
        validate_item_input(&input)?;

        let product_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(input.product_id)
        .fetch_one(&self.db)
        .await?;
        if !product_exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let mut tx = self.db.begin().await?;
        insert_item(&mut tx, order_id, &input).await?;
        recompute_totals(
            &mut tx,
            order_id,
            order.tax_rate,
            order.shipping_cost,
            order.discount_amount,
        )
        .await?;
        tx.commit().await?;

        self.get(user, order_id).await
    }

    /// Update a line on an editable order
    pub async fn update_item(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> AppResult<PurchaseOrderDetail> {
        if !user.has_permission("purchase_orders", "edit") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;
        self.ensure_editable(&order)?;

        let existing = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM purchase_order_items WHERE id = $1 AND purchase_order_id = $2",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order item".to_string()))?;

        let updated = OrderItemInput {
            product_id: existing.product_id,
            quantity: input.quantity.unwrap_or(existing.quantity_ordered),
            unit_cost: input.unit_cost.unwrap_or(existing.unit_cost),
            discount_percentage: Some(
                input
                    .discount_percentage
                    .unwrap_or(existing.discount_percentage),
            ),
        };
        validate_item_input(&updated)?;
        let totals = line_totals(&updated);

        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            UPDATE purchase_order_items
            SET quantity_ordered = $1, unit_cost = $2, discount_percentage = $3,
                line_total = $4, discount_amount = $5, final_line_total = $6, updated_at = NOW()
            WHERE id = $7
            "#,
        )
        .bind(updated.quantity)
        .bind(updated.unit_cost)
        .bind(updated.discount_percentage.unwrap_or(Decimal::ZERO))
        .bind(totals.line_total)
        .bind(totals.discount_amount)
        .bind(totals.final_line_total)
        .bind(item_id)
        .execute(&mut *tx)
        .await?;

        recompute_totals(
            &mut tx,
            order_id,
            order.tax_rate,
            order.shipping_cost,
            order.discount_amount,
        )
        .await?;
        tx.commit().await?;

        self.get(user, order_id).await
    }

    /// Remove a line from an editable order
    pub async fn remove_item(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<PurchaseOrderDetail> {
        if !user.has_permission("purchase_orders", "edit") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;
        self.ensure_editable(&order)?;

        let mut tx = self.db.begin().await?;
        let result =
            sqlx::query("DELETE FROM purchase_order_items WHERE id = $1 AND purchase_order_id = $2")
                .bind(item_id)
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Order item".to_string()));
        }

        recompute_totals(
            &mut tx,
            order_id,
            order.tax_rate,
            order.shipping_cost,
            order.discount_amount,
        )
        .await?;
        tx.commit().await?;

        self.get(user, order_id).await
    }

    /// Submit a draft for approval
    pub async fn submit(&self, user: &AuthUser, order_id: Uuid) -> AppResult<PurchaseOrderDetail> {
        if !user.has_permission("purchase_orders", "edit") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;
        PURCHASE_LIFECYCLE.check_transition(
            order.status,
            PurchaseOrderStatus::PendingApproval,
            None,
        )?;

        let items = self.load_items(order_id).await?;
        if items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "An order needs at least one line before submission".to_string(),
            });
        }

        sqlx::query("UPDATE purchase_orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(PurchaseOrderStatus::PendingApproval.as_str())
            .bind(order_id)
            .execute(&self.db)
            .await?;

        self.get(user, order_id).await
    }

    /// Approve a pending order, stamping who and when
    pub async fn approve(&self, user: &AuthUser, order_id: Uuid) -> AppResult<PurchaseOrderDetail> {
        if !user.has_permission("purchase_orders", "approve") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        PURCHASE_LIFECYCLE.check_transition(order.status, PurchaseOrderStatus::Approved, None)?;

        sqlx::query(
            "UPDATE purchase_orders SET status = $1, approved_by = $2, approved_at = NOW(), \
             updated_at = NOW() WHERE id = $3",
        )
        .bind(PurchaseOrderStatus::Approved.as_str())
        .bind(user.user_id)
        .bind(order_id)
        .execute(&self.db)
        .await?;

        self.get(user, order_id).await
    }

    /// Mark an approved order as sent to the supplier
    pub async fn send(&self, user: &AuthUser, order_id: Uuid) -> AppResult<PurchaseOrderDetail> {
        if !user.has_permission("purchase_orders", "approve") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        PURCHASE_LIFECYCLE.check_transition(
            order.status,
            PurchaseOrderStatus::SentToSupplier,
            None,
        )?;

        sqlx::query(
            "UPDATE purchase_orders SET status = $1, sent_by = $2, sent_at = NOW(), \
             updated_at = NOW() WHERE id = $3",
        )
        .bind(PurchaseOrderStatus::SentToSupplier.as_str())
        .bind(user.user_id)
        .bind(order_id)
        .execute(&self.db)
        .await?;

        self.get(user, order_id).await
    }

    /// Receive goods against an order
    ///
    /// Updates line progress, puts accepted units into stock as receipt
    /// movements and derives the order status from the lines, all in one
    /// transaction.
    pub async fn receive(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: ReceiveItemsInput,
    ) -> AppResult<PurchaseOrderDetail> {
        if !user.has_permission("purchase_orders", "receive") {
            return Err(AppError::InsufficientPermissions);
        }

        if input.items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "A receipt needs at least one line".to_string(),
            });
        }

        let order = self.load_order(order_id).await?;
        if !matches!(
            order.status,
            PurchaseOrderStatus::SentToSupplier | PurchaseOrderStatus::PartiallyReceived
        ) {
            return Err(AppError::InvalidStateTransition(format!(
                "order in status {} cannot receive goods",
                order.status.as_str()
            )));
        }

        let mut tx = self.db.begin().await?;

        for line in &input.items {
            let rejected = line.quantity_rejected.unwrap_or(0);
            if line.quantity_received < 0 || rejected < 0 || line.quantity_received + rejected == 0
            {
                return Err(AppError::Validation {
                    field: "quantity_received".to_string(),
                    message: "Each receipt line must receive or reject at least one unit"
                        .to_string(),
                });
            }

            let item = sqlx::query_as::<_, ItemRow>(&format!(
                "SELECT {} FROM purchase_order_items \
                 WHERE id = $1 AND purchase_order_id = $2 FOR UPDATE",
                ITEM_COLUMNS
            ))
            .bind(line.item_id)
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Order item".to_string()))?;

            let new_received = item.quantity_received + line.quantity_received;
            let new_rejected = item.quantity_rejected + rejected;
            if new_received + new_rejected > item.quantity_ordered {
                return Err(AppError::Validation {
                    field: "quantity_received".to_string(),
                    message: format!(
                        "Receipt exceeds ordered quantity ({} of {})",
                        new_received + new_rejected,
                        item.quantity_ordered
                    ),
                });
            }

            // Rejected units count toward line completion but never enter
            // stock
            let item_status =
                PurchaseItemStatus::from_progress(item.quantity_ordered, new_received + new_rejected);

            sqlx::query(
                r#"
                UPDATE purchase_order_items
                SET quantity_received = $1, quantity_rejected = $2, item_status = $3,
                    updated_at = NOW()
                WHERE id = $4
                "#,
            )
            .bind(new_received)
            .bind(new_rejected)
            .bind(item_status.as_str())
            .bind(line.item_id)
            .execute(&mut *tx)
            .await?;

            if line.quantity_received > 0 {
                record_movement(
                    &mut tx,
                    order.warehouse_id,
                    item.product_id,
                    MovementType::Receipt,
                    line.quantity_received,
                    Some(&order.reference),
                    None,
                    user.user_id,
                )
                .await?;
            }
        }

        let pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM purchase_order_items \
             WHERE purchase_order_id = $1 AND item_status <> $2",
        )
        .bind(order_id)
        .bind(PurchaseItemStatus::FullyReceived.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let to = if pending == 0 {
            PurchaseOrderStatus::FullyReceived
        } else {
            PurchaseOrderStatus::PartiallyReceived
        };
        if to != order.status {
            PURCHASE_LIFECYCLE.check_transition(order.status, to, None)?;
        }

        if to == PurchaseOrderStatus::FullyReceived {
            sqlx::query(
                "UPDATE purchase_orders SET status = $1, received_by = $2, received_at = NOW(), \
                 updated_at = NOW() WHERE id = $3",
            )
            .bind(to.as_str())
            .bind(user.user_id)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("UPDATE purchase_orders SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(to.as_str())
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get(user, order_id).await
    }

    /// Cancel an order, with a mandatory reason
    pub async fn cancel(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: CancelOrderInput,
    ) -> AppResult<PurchaseOrderDetail> {
        if !user.has_permission("purchase_orders", "cancel") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;
        PURCHASE_LIFECYCLE.check_transition(
            order.status,
            PurchaseOrderStatus::Cancelled,
            Some(&input.reason),
        )?;

        sqlx::query(
            "UPDATE purchase_orders SET status = $1, cancellation_reason = $2, \
             cancelled_at = NOW(), updated_at = NOW() WHERE id = $3",
        )
        .bind(PurchaseOrderStatus::Cancelled.as_str())
        .bind(input.reason.trim())
        .bind(order_id)
        .execute(&self.db)
        .await?;

        self.get(user, order_id).await
    }

    /// Close a fully received order
    pub async fn close(&self, user: &AuthUser, order_id: Uuid) -> AppResult<PurchaseOrderDetail> {
        if !user.has_permission("purchase_orders", "approve") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        PURCHASE_LIFECYCLE.check_transition(order.status, PurchaseOrderStatus::Closed, None)?;

        sqlx::query(
            "UPDATE purchase_orders SET status = $1, closed_at = NOW(), updated_at = NOW() \
             WHERE id = $2",
        )
        .bind(PurchaseOrderStatus::Closed.as_str())
        .bind(order_id)
        .execute(&self.db)
        .await?;

        self.get(user, order_id).await
    }

    /// Soft-delete an order
    ///
    /// Only drafts and terminal orders can be deleted; in-flight orders must
    /// be cancelled first.
    pub async fn delete(&self, user: &AuthUser, order_id: Uuid) -> AppResult<()> {
        if !user.has_permission("purchase_orders", "delete") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;
        if !matches!(
            order.status,
            PurchaseOrderStatus::Draft
                | PurchaseOrderStatus::Cancelled
                | PurchaseOrderStatus::Closed
        ) {
            return Err(AppError::InvalidStateTransition(format!(
                "order in status {} cannot be deleted",
                order.status.as_str()
            )));
        }

        sqlx::query("UPDATE purchase_orders SET deleted_at = NOW() WHERE id = $1")
            .bind(order_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    fn ensure_editable(&self, order: &PurchaseOrder) -> AppResult<()> {
        if !PURCHASE_LIFECYCLE.is_editable(order.status) {
            return Err(AppError::fields_not_editable(
                order.status.as_str(),
                vec!["items".to_string()],
            ));
        }
        Ok(())
    }

    async fn load_order(&self, order_id: Uuid) -> AppResult<PurchaseOrder> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE id = $1 AND deleted_at IS NULL",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

        row.into_order()
    }

    async fn load_items(&self, order_id: Uuid) -> AppResult<Vec<PurchaseOrderItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM purchase_order_items WHERE purchase_order_id = $1 \
             ORDER BY created_at ASC",
            ITEM_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ItemRow::into_item).collect()
    }

    async fn detail(&self, row: OrderRow) -> AppResult<PurchaseOrderDetail> {
        let items = self.load_items(row.id).await?;
        Ok(PurchaseOrderDetail {
            order: row.into_order()?,
            items,
        })
    }
}

async fn insert_item(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    item: &OrderItemInput,
) -> AppResult<()> {
    let totals = line_totals(item);

    sqlx::query(
        r#"
        INSERT INTO purchase_order_items
            (purchase_order_id, product_id, quantity_ordered, unit_cost, discount_percentage,
             line_total, discount_amount, final_line_total, item_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(item.unit_cost)
    .bind(item.discount_percentage.unwrap_or(Decimal::ZERO))
    .bind(totals.line_total)
    .bind(totals.discount_amount)
    .bind(totals.final_line_total)
    .bind(PurchaseItemStatus::Pending.as_str())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Recompute and persist every derived monetary field of an order
///
/// Always writes the full set so the stored totals stay consistent with each
/// other.
async fn recompute_totals(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    tax_rate: Decimal,
    shipping_cost: Decimal,
    discount_amount: Decimal,
) -> AppResult<()> {
    let finals: Vec<Decimal> = sqlx::query_scalar(
        "SELECT final_line_total FROM purchase_order_items WHERE purchase_order_id = $1",
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;

    let totals = order_totals(&finals, tax_rate, shipping_cost, discount_amount);

    sqlx::query(
        r#"
        UPDATE purchase_orders
        SET subtotal = $1, tax_rate = $2, tax_amount = $3, shipping_cost = $4,
            discount_amount = $5, total_amount = $6, updated_at = NOW()
        WHERE id = $7
        "#,
    )
    .bind(totals.subtotal)
    .bind(tax_rate)
    .bind(totals.tax_amount)
    .bind(totals.shipping_cost)
    .bind(totals.discount_amount)
    .bind(totals.total_amount)
    .bind(order_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
