//! Sales order service
//!
//! Mirrors the purchase order service on the outbound side: creation and
//! editing of drafts, the approval lifecycle, stock allocation at
//! confirmation, fulfillment that issues stock, and shipping/delivery
//! stamps. Status rules come from the shared lifecycle table.

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
use shared::filter::{FilterContext, SalesOrderFilter};
use shared::lifecycle::{rejected_fields, SALES_LIFECYCLE};
use shared::models::{
    MovementType, OrderPriority, SalesItemStatus, SalesOrder, SalesOrderItem, SalesOrderStatus,
};
use shared::reference::{format_reference, next_sequence, period_token};
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::{
    parse_tax_rate, validate_discount_percentage, validate_email, validate_non_negative_amount,
    validate_quantity,
};

/// Sales order service
#[derive(Clone)]
pub struct SalesOrderService {
    db: PgPool,
}

/// Input for one order line
#[derive(Debug, Deserialize)]
pub struct SalesItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount_percentage: Option<Decimal>,
}

impl LineFinancials for SalesItemInput {
    fn quantity_ordered(&self) -> i32 {
        self.quantity
    }

    fn unit_amount(&self) -> Decimal {
        self.unit_price
    }

    fn discount_percentage(&self) -> Decimal {
        self.discount_percentage.unwrap_or(Decimal::ZERO)
    }
}

/// Input for creating a sales order
#[derive(Debug, Deserialize)]
pub struct CreateSalesOrderInput {
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub warehouse_id: Uuid,
    pub priority: Option<OrderPriority>,
    /// Percentage string, e.g. "22" for 22%
    pub tax_rate: Option<String>,
    pub shipping_cost: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<SalesItemInput>,
}

/// Input for updating a sales order's header fields
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSalesOrderInput {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
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
pub struct UpdateSalesItemInput {
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
}

/// One line of a fulfillment
#[derive(Debug, Deserialize)]
pub struct FulfillLineInput {
    pub item_id: Uuid,
    pub quantity: i32,
}

/// Input for fulfilling an order
#[derive(Debug, Deserialize)]
pub struct FulfillItemsInput {
    pub items: Vec<FulfillLineInput>,
}

/// Input for cancelling an order
#[derive(Debug, Deserialize)]
pub struct CancelOrderInput {
    pub reason: String,
}

/// A sales order with its lines
#[derive(Debug, Serialize)]
pub struct SalesOrderDetail {
    #[serde(flatten)]
    pub order: SalesOrder,
    pub items: Vec<SalesOrderItem>,
}

/// Order row from database
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    reference: String,
    customer_name: String,
    customer_email: Option<String>,
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
    confirmed_by: Option<Uuid>,
    fulfilled_by: Option<Uuid>,
    shipped_by: Option<Uuid>,
    delivered_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
    confirmed_at: Option<DateTime<Utc>>,
    fulfilled_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self) -> AppResult<SalesOrder> {
        let status = SalesOrderStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown order status: {}", self.status)))?;
        let priority = OrderPriority::from_str(&self.priority).ok_or_else(|| {
            AppError::Internal(format!("Unknown order priority: {}", self.priority))
        })?;
        Ok(SalesOrder {
            id: self.id,
            reference: self.reference,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
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
            confirmed_by: self.confirmed_by,
            fulfilled_by: self.fulfilled_by,
            shipped_by: self.shipped_by,
            delivered_by: self.delivered_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            approved_at: self.approved_at,
            confirmed_at: self.confirmed_at,
            fulfilled_at: self.fulfilled_at,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
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
    sales_order_id: Uuid,
    product_id: Uuid,
    quantity_ordered: i32,
    allocated_quantity: i32,
    quantity_fulfilled: i32,
    quantity_shipped: i32,
    quantity_backordered: i32,
    unit_price: Decimal,
    discount_percentage: Decimal,
    line_total: Decimal,
    discount_amount: Decimal,
    final_line_total: Decimal,
    item_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_item(self) -> AppResult<SalesOrderItem> {
        let item_status = SalesItemStatus::from_str(&self.item_status).ok_or_else(|| {
            AppError::Internal(format!("Unknown item status: {}", self.item_status))
        })?;
        Ok(SalesOrderItem {
            id: self.id,
            sales_order_id: self.sales_order_id,
            product_id: self.product_id,
            quantity_ordered: self.quantity_ordered,
            allocated_quantity: self.allocated_quantity,
            quantity_fulfilled: self.quantity_fulfilled,
            quantity_shipped: self.quantity_shipped,
            quantity_backordered: self.quantity_backordered,
            unit_price: self.unit_price,
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

const ORDER_COLUMNS: &str = "id, reference, customer_name, customer_email, warehouse_id, status, \
     priority, subtotal, tax_rate, tax_amount, shipping_cost, discount_amount, total_amount, \
     expected_date, notes, cancellation_reason, created_by, approved_by, confirmed_by, \
     fulfilled_by, shipped_by, delivered_by, created_at, updated_at, approved_at, confirmed_at, \
     fulfilled_at, shipped_at, delivered_at, cancelled_at, closed_at, deleted_at";

const ITEM_COLUMNS: &str = "id, sales_order_id, product_id, quantity_ordered, allocated_quantity, \
     quantity_fulfilled, quantity_shipped, quantity_backordered, unit_price, discount_percentage, \
     line_total, discount_amount, final_line_total, item_status, created_at, updated_at";

fn validate_item_input(item: &SalesItemInput) -> AppResult<()> {
    validate_quantity(item.quantity).map_err(|message| AppError::Validation {
        field: "quantity".to_string(),
        message: message.to_string(),
    })?;
    validate_non_negative_amount(item.unit_price).map_err(|message| AppError::Validation {
        field: "unit_price".to_string(),
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

impl SalesOrderService {
    /// Create a new SalesOrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List sales orders matching a filter, newest first
    pub async fn list(
        &self,
        user: &AuthUser,
        filter: &SalesOrderFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<SalesOrder>> {
        if !user.has_permission("sales_orders", "view") {
            return Err(AppError::InsufficientPermissions);
        }

        let ctx = FilterContext {
            user_id: user.user_id,
        };
        let predicates = filter.predicates(&ctx);

        let mut count_qb =
            QueryBuilder::new("SELECT COUNT(*) FROM sales_orders WHERE deleted_at IS NULL");
        apply_predicates(&mut count_qb, &predicates);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM sales_orders WHERE deleted_at IS NULL",
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

    /// Get a sales order with its lines
    pub async fn get(&self, user: &AuthUser, order_id: Uuid) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "view") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        let items = self.load_items(order_id).await?;
        Ok(SalesOrderDetail { order, items })
    }

    /// Create a sales order in draft status
    pub async fn create(
        &self,
        user: &AuthUser,
        input: CreateSalesOrderInput,
    ) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "create") {
            return Err(AppError::InsufficientPermissions);
        }

        if input.customer_name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "customer_name".to_string(),
                message: "Customer name is required".to_string(),
            });
        }
        if let Some(email) = input.customer_email.as_deref() {
            validate_email(email).map_err(|message| AppError::Validation {
                field: "customer_email".to_string(),
                message: message.to_string(),
            })?;
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

        let now = Utc::now();
        let latest: Option<String> = sqlx::query_scalar(
            "SELECT reference FROM sales_orders WHERE reference LIKE $1 \
             ORDER BY reference DESC LIMIT 1",
        )
        .bind(format!("SO-{}-%", period_token(now)))
        .fetch_optional(&mut *tx)
        .await?;
        let reference = format_reference("SO", now, next_sequence(latest.as_deref()));

        let order_row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO sales_orders
                (reference, customer_name, customer_email, warehouse_id, status, priority,
                 subtotal, tax_rate, tax_amount, shipping_cost, discount_amount, total_amount,
                 expected_date, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(&reference)
        .bind(input.customer_name.trim())
        .bind(&input.customer_email)
        .bind(input.warehouse_id)
        .bind(SalesOrderStatus::Draft.as_str())
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

        tracing::info!(reference = %reference, "Sales order created");
        let items = self.load_items(order_row.id).await?;
        Ok(SalesOrderDetail {
            order: order_row.into_order()?,
            items,
        })
    }

    /// Update header fields of a sales order
    pub async fn update(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: UpdateSalesOrderInput,
    ) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "edit") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;

        let mut touched: Vec<&str> = Vec::new();
        if input.customer_name.is_some() {
            touched.push("customer_name");
        }
        if input.customer_email.is_some() {
            touched.push("customer_email");
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

        let rejected = rejected_fields(&SALES_LIFECYCLE, order.status, &touched);
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

        let customer_name = input
            .customer_name
            .unwrap_or_else(|| order.customer_name.clone());
        if customer_name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "customer_name".to_string(),
                message: "Customer name is required".to_string(),
            });
        }
        let customer_email = input.customer_email.or_else(|| order.customer_email.clone());
        if let Some(email) = customer_email.as_deref() {
            validate_email(email).map_err(|message| AppError::Validation {
                field: "customer_email".to_string(),
                message: message.to_string(),
            })?;
        }
        let warehouse_id = input.warehouse_id.unwrap_or(order.warehouse_id);
        let priority = input.priority.unwrap_or(order.priority);
        let expected_date = input.expected_date.or(order.expected_date);
        let notes = input.notes.or_else(|| order.notes.clone());

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            UPDATE sales_orders
            SET customer_name = $1, customer_email = $2, warehouse_id = $3, priority = $4,
                expected_date = $5, notes = $6, updated_at = NOW()
            WHERE id = $7
            "#,
        )
        .bind(customer_name.trim())
        .bind(&customer_email)
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
        input: SalesItemInput,
    ) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "edit") {
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
        input: UpdateSalesItemInput,
    ) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "edit") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;
        self.ensure_editable(&order)?;

        let existing = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM sales_order_items WHERE id = $1 AND sales_order_id = $2",
            ITEM_COLUMNS
        ))
        .bind(item_id)
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order item".to_string()))?;

        let updated = SalesItemInput {
            product_id: existing.product_id,
            quantity: input.quantity.unwrap_or(existing.quantity_ordered),
            unit_price: input.unit_price.unwrap_or(existing.unit_price),
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
            UPDATE sales_order_items
            SET quantity_ordered = $1, unit_price = $2, discount_percentage = $3,
                line_total = $4, discount_amount = $5, final_line_total = $6, updated_at = NOW()
            WHERE id = $7
            "#,
        )
        .bind(updated.quantity)
        .bind(updated.unit_price)
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
    ) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "edit") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;
        self.ensure_editable(&order)?;

        let mut tx = self.db.begin().await?;
        let result =
            sqlx::query("DELETE FROM sales_order_items WHERE id = $1 AND sales_order_id = $2")
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
    pub async fn submit(&self, user: &AuthUser, order_id: Uuid) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "edit") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;
        SALES_LIFECYCLE.check_transition(order.status, SalesOrderStatus::PendingApproval, None)?;

        let items = self.load_items(order_id).await?;
        if items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "An order needs at least one line before submission".to_string(),
            });
        }

        sqlx::query("UPDATE sales_orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(SalesOrderStatus::PendingApproval.as_str())
            .bind(order_id)
            .execute(&self.db)
            .await?;

        self.get(user, order_id).await
    }

    /// Approve a pending order, stamping who and when
    pub async fn approve(&self, user: &AuthUser, order_id: Uuid) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "approve") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        SALES_LIFECYCLE.check_transition(order.status, SalesOrderStatus::Approved, None)?;

        sqlx::query(
            "UPDATE sales_orders SET status = $1, approved_by = $2, approved_at = NOW(), \
             updated_at = NOW() WHERE id = $3",
        )
        .bind(SalesOrderStatus::Approved.as_str())
        .bind(user.user_id)
        .bind(order_id)
        .execute(&self.db)
        .await?;

        self.get(user, order_id).await
    }

    /// Confirm an approved order and allocate stock to its lines
    ///
    /// Allocation reserves what is on hand; any shortfall is recorded as a
    /// backorder on the line rather than failing the confirmation.
    pub async fn confirm(&self, user: &AuthUser, order_id: Uuid) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "approve") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        SALES_LIFECYCLE.check_transition(order.status, SalesOrderStatus::Confirmed, None)?;

        let mut tx = self.db.begin().await?;

        let items = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM sales_order_items WHERE sales_order_id = $1 \
             ORDER BY created_at ASC FOR UPDATE",
            ITEM_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        for item in &items {
            let on_hand: Option<i32> = sqlx::query_scalar(
                "SELECT quantity FROM stock_levels \
                 WHERE warehouse_id = $1 AND product_id = $2 FOR UPDATE",
            )
            .bind(order.warehouse_id)
            .bind(item.product_id)
            .fetch_optional(&mut *tx)
            .await?;

            let available = on_hand.unwrap_or(0).max(0);
            let allocated = item.quantity_ordered.min(available);
            let backordered = item.quantity_ordered - allocated;
            let item_status = SalesItemStatus::from_progress(item.quantity_ordered, 0, backordered);

            sqlx::query(
                r#"
                UPDATE sales_order_items
                SET allocated_quantity = $1, quantity_backordered = $2, item_status = $3,
                    updated_at = NOW()
                WHERE id = $4
                "#,
            )
            .bind(allocated)
            .bind(backordered)
            .bind(item_status.as_str())
            .bind(item.id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE sales_orders SET status = $1, confirmed_by = $2, confirmed_at = NOW(), \
             updated_at = NOW() WHERE id = $3",
        )
        .bind(SalesOrderStatus::Confirmed.as_str())
        .bind(user.user_id)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(user, order_id).await
    }

    /// Fulfill lines of a confirmed order, issuing stock
    ///
    /// Each fulfilled unit leaves the order's warehouse as an issue movement;
    /// fulfilling more than is on hand fails the whole request.
    pub async fn fulfill(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: FulfillItemsInput,
    ) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "fulfill") {
            return Err(AppError::InsufficientPermissions);
        }

        if input.items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "A fulfillment needs at least one line".to_string(),
            });
        }

        let order = self.load_order(order_id).await?;
        if !matches!(
            order.status,
            SalesOrderStatus::Confirmed | SalesOrderStatus::PartiallyFulfilled
        ) {
            return Err(AppError::InvalidStateTransition(format!(
                "order in status {} cannot be fulfilled",
                order.status.as_str()
            )));
        }

        let mut tx = self.db.begin().await?;

        for line in &input.items {
            if line.quantity <= 0 {
                return Err(AppError::Validation {
                    field: "quantity".to_string(),
                    message: "Fulfillment quantity must be greater than zero".to_string(),
                });
            }

            let item = sqlx::query_as::<_, ItemRow>(&format!(
                "SELECT {} FROM sales_order_items \
                 WHERE id = $1 AND sales_order_id = $2 FOR UPDATE",
                ITEM_COLUMNS
            ))
            .bind(line.item_id)
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Order item".to_string()))?;

            let new_fulfilled = item.quantity_fulfilled + line.quantity;
            if new_fulfilled > item.quantity_ordered {
                return Err(AppError::Validation {
                    field: "quantity".to_string(),
                    message: format!(
                        "Fulfillment exceeds ordered quantity ({} of {})",
                        new_fulfilled, item.quantity_ordered
                    ),
                });
            }

            // Issue the stock; record_movement fails the transaction if the
            // warehouse does not have it
            record_movement(
                &mut tx,
                order.warehouse_id,
                item.product_id,
                MovementType::Issue,
                line.quantity,
                Some(&order.reference),
                None,
                user.user_id,
            )
            .await?;

            let new_backordered = (item.quantity_ordered - new_fulfilled)
                .min(item.quantity_backordered)
                .max(0);
            let item_status = SalesItemStatus::from_progress(
                item.quantity_ordered,
                new_fulfilled,
                new_backordered,
            );

            sqlx::query(
                r#"
                UPDATE sales_order_items
                SET quantity_fulfilled = $1, quantity_backordered = $2, item_status = $3,
                    updated_at = NOW()
                WHERE id = $4
                "#,
            )
            .bind(new_fulfilled)
            .bind(new_backordered)
            .bind(item_status.as_str())
            .bind(line.item_id)
            .execute(&mut *tx)
            .await?;
        }

        let pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sales_order_items \
             WHERE sales_order_id = $1 AND item_status <> $2",
        )
        .bind(order_id)
        .bind(SalesItemStatus::FullyFulfilled.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let to = if pending == 0 {
            SalesOrderStatus::FullyFulfilled
        } else {
            SalesOrderStatus::PartiallyFulfilled
        };
        if to != order.status {
            SALES_LIFECYCLE.check_transition(order.status, to, None)?;
        }

        if to == SalesOrderStatus::FullyFulfilled {
            sqlx::query(
                "UPDATE sales_orders SET status = $1, fulfilled_by = $2, fulfilled_at = NOW(), \
                 updated_at = NOW() WHERE id = $3",
            )
            .bind(to.as_str())
            .bind(user.user_id)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("UPDATE sales_orders SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(to.as_str())
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get(user, order_id).await
    }

    /// Mark a fully fulfilled order as shipped
    pub async fn ship(&self, user: &AuthUser, order_id: Uuid) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "fulfill") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        SALES_LIFECYCLE.check_transition(order.status, SalesOrderStatus::Shipped, None)?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "UPDATE sales_order_items SET quantity_shipped = quantity_fulfilled, \
             updated_at = NOW() WHERE sales_order_id = $1",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE sales_orders SET status = $1, shipped_by = $2, shipped_at = NOW(), \
             updated_at = NOW() WHERE id = $3",
        )
        .bind(SalesOrderStatus::Shipped.as_str())
        .bind(user.user_id)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(user, order_id).await
    }

    /// Mark a shipped order as delivered
    pub async fn deliver(&self, user: &AuthUser, order_id: Uuid) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "fulfill") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        SALES_LIFECYCLE.check_transition(order.status, SalesOrderStatus::Delivered, None)?;

        sqlx::query(
            "UPDATE sales_orders SET status = $1, delivered_by = $2, delivered_at = NOW(), \
             updated_at = NOW() WHERE id = $3",
        )
        .bind(SalesOrderStatus::Delivered.as_str())
        .bind(user.user_id)
        .bind(order_id)
        .execute(&self.db)
        .await?;

        self.get(user, order_id).await
    }

    /// Cancel an order, with a mandatory reason
    pub async fn cancel(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: CancelOrderInput,
    ) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "cancel") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;
        SALES_LIFECYCLE.check_transition(
            order.status,
            SalesOrderStatus::Cancelled,
            Some(&input.reason),
        )?;

        sqlx::query(
            "UPDATE sales_orders SET status = $1, cancellation_reason = $2, \
             cancelled_at = NOW(), updated_at = NOW() WHERE id = $3",
        )
        .bind(SalesOrderStatus::Cancelled.as_str())
        .bind(input.reason.trim())
        .bind(order_id)
        .execute(&self.db)
        .await?;

        self.get(user, order_id).await
    }

    /// Close a delivered order
    pub async fn close(&self, user: &AuthUser, order_id: Uuid) -> AppResult<SalesOrderDetail> {
        if !user.has_permission("sales_orders", "approve") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        SALES_LIFECYCLE.check_transition(order.status, SalesOrderStatus::Closed, None)?;

        sqlx::query(
            "UPDATE sales_orders SET status = $1, closed_at = NOW(), updated_at = NOW() \
             WHERE id = $2",
        )
        .bind(SalesOrderStatus::Closed.as_str())
        .bind(order_id)
        .execute(&self.db)
        .await?;

        self.get(user, order_id).await
    }

    /// Soft-delete an order
    pub async fn delete(&self, user: &AuthUser, order_id: Uuid) -> AppResult<()> {
        if !user.has_permission("sales_orders", "delete") {
            return Err(AppError::InsufficientPermissions);
        }

        let order = self.load_order(order_id).await?;
        ensure_owner(user, order.created_by)?;
        if !matches!(
            order.status,
            SalesOrderStatus::Draft | SalesOrderStatus::Cancelled | SalesOrderStatus::Closed
        ) {
            return Err(AppError::InvalidStateTransition(format!(
                "order in status {} cannot be deleted",
                order.status.as_str()
            )));
        }

        sqlx::query("UPDATE sales_orders SET deleted_at = NOW() WHERE id = $1")
            .bind(order_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    fn ensure_editable(&self, order: &SalesOrder) -> AppResult<()> {
        if !SALES_LIFECYCLE.is_editable(order.status) {
            return Err(AppError::fields_not_editable(
                order.status.as_str(),
                vec!["items".to_string()],
            ));
        }
        Ok(())
    }

    async fn load_order(&self, order_id: Uuid) -> AppResult<SalesOrder> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM sales_orders WHERE id = $1 AND deleted_at IS NULL",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sales order".to_string()))?;

        row.into_order()
    }

    async fn load_items(&self, order_id: Uuid) -> AppResult<Vec<SalesOrderItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM sales_order_items WHERE sales_order_id = $1 ORDER BY created_at ASC",
            ITEM_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ItemRow::into_item).collect()
    }
}

async fn insert_item(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    item: &SalesItemInput,
) -> AppResult<()> {
    let totals = line_totals(item);

    sqlx::query(
        r#"
        INSERT INTO sales_order_items
            (sales_order_id, product_id, quantity_ordered, unit_price, discount_percentage,
             line_total, discount_amount, final_line_total, item_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.discount_percentage.unwrap_or(Decimal::ZERO))
    .bind(totals.line_total)
    .bind(totals.discount_amount)
    .bind(totals.final_line_total)
    .bind(SalesItemStatus::Pending.as_str())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Recompute and persist every derived monetary field of an order
async fn recompute_totals(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    tax_rate: Decimal,
    shipping_cost: Decimal,
    discount_amount: Decimal,
) -> AppResult<()> {
    let finals: Vec<Decimal> = sqlx::query_scalar(
        "SELECT final_line_total FROM sales_order_items WHERE sales_order_id = $1",
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;

    let totals = order_totals(&finals, tax_rate, shipping_cost, discount_amount);

    sqlx::query(
        r#"
        UPDATE sales_orders
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
