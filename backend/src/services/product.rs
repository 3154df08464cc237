//! Product catalog service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::search::{apply_page, apply_predicates};
use shared::filter::ProductFilter;
use shared::models::Product;
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::{validate_non_negative_amount, validate_sku};

/// Product service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit_cost: Decimal,
    pub unit_price: Decimal,
    pub reorder_level: Option<i32>,
}

/// Input for updating a product
#[derive(Debug, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub reorder_level: Option<i32>,
    pub active: Option<bool>,
}

/// Product row from database
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    description: Option<String>,
    category: Option<String>,
    unit_cost: Decimal,
    unit_price: Decimal,
    reorder_level: i32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            description: row.description,
            category: row.category,
            unit_cost: row.unit_cost,
            unit_price: row.unit_price,
            reorder_level: row.reorder_level,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, sku, name, description, category, unit_cost, unit_price, \
                               reorder_level, active, created_at, updated_at, deleted_at";

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List products matching a filter, one page at a time
    pub async fn list(
        &self,
        user: &AuthUser,
        filter: &ProductFilter,
        pagination: &Pagination,
    ) -> AppResult<PaginatedResponse<Product>> {
        if !user.has_permission("products", "view") {
            return Err(AppError::InsufficientPermissions);
        }

        let predicates = filter.predicates();

        let mut count_qb =
            QueryBuilder::new("SELECT COUNT(*) FROM products WHERE deleted_at IS NULL");
        apply_predicates(&mut count_qb, &predicates);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM products WHERE deleted_at IS NULL",
            PRODUCT_COLUMNS
        ));
        apply_predicates(&mut qb, &predicates);
        apply_page(&mut qb, "name ASC", pagination);

        let rows: Vec<ProductRow> = qb.build_query_as().fetch_all(&self.db).await?;

        Ok(PaginatedResponse {
            data: rows.into_iter().map(Product::from).collect(),
            pagination: PaginationMeta::new(pagination, total as u64),
        })
    }

    /// Get a product by id
    pub async fn get(&self, user: &AuthUser, product_id: Uuid) -> AppResult<Product> {
        if !user.has_permission("products", "view") {
            return Err(AppError::InsufficientPermissions);
        }

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1 AND deleted_at IS NULL",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        Ok(row.into())
    }

    /// Create a product
    pub async fn create(&self, user: &AuthUser, input: CreateProductInput) -> AppResult<Product> {
        if !user.has_permission("products", "create") {
            return Err(AppError::InsufficientPermissions);
        }

        validate_sku(&input.sku).map_err(|message| AppError::Validation {
            field: "sku".to_string(),
            message: message.to_string(),
        })?;
        if input.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Name is required".to_string(),
            });
        }
        validate_non_negative_amount(input.unit_cost).map_err(|message| AppError::Validation {
            field: "unit_cost".to_string(),
            message: message.to_string(),
        })?;
        validate_non_negative_amount(input.unit_price).map_err(|message| AppError::Validation {
            field: "unit_price".to_string(),
            message: message.to_string(),
        })?;
        let reorder_level = input.reorder_level.unwrap_or(0);
        if reorder_level < 0 {
            return Err(AppError::Validation {
                field: "reorder_level".to_string(),
                message: "Reorder level cannot be negative".to_string(),
            });
        }

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (sku, name, description, category, unit_cost, unit_price, reorder_level)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&input.sku)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(&input.category)
        .bind(input.unit_cost)
        .bind(input.unit_price)
        .bind(reorder_level)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AppError::DuplicateEntry("sku".to_string())
            }
            _ => AppError::from(e),
        })?;

        Ok(row.into())
    }

    /// Update a product
    pub async fn update(
        &self,
        user: &AuthUser,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        if !user.has_permission("products", "edit") {
            return Err(AppError::InsufficientPermissions);
        }

        let existing = self.get(user, product_id).await?;

        let name = input.name.unwrap_or(existing.name);
        let description = input.description.or(existing.description);
        let category = input.category.or(existing.category);
        let unit_cost = input.unit_cost.unwrap_or(existing.unit_cost);
        let unit_price = input.unit_price.unwrap_or(existing.unit_price);
        let reorder_level = input.reorder_level.unwrap_or(existing.reorder_level);
        let active = input.active.unwrap_or(existing.active);

        if name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Name is required".to_string(),
            });
        }
        validate_non_negative_amount(unit_cost).map_err(|message| AppError::Validation {
            field: "unit_cost".to_string(),
            message: message.to_string(),
        })?;
        validate_non_negative_amount(unit_price).map_err(|message| AppError::Validation {
            field: "unit_price".to_string(),
            message: message.to_string(),
        })?;
        if reorder_level < 0 {
            return Err(AppError::Validation {
                field: "reorder_level".to_string(),
                message: "Reorder level cannot be negative".to_string(),
            });
        }

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products
            SET name = $1, description = $2, category = $3, unit_cost = $4,
                unit_price = $5, reorder_level = $6, active = $7, updated_at = NOW()
            WHERE id = $8 AND deleted_at IS NULL
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(name.trim())
        .bind(&description)
        .bind(&category)
        .bind(unit_cost)
        .bind(unit_price)
        .bind(reorder_level)
        .bind(active)
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        Ok(row.into())
    }

    /// Soft-delete a product
    ///
    /// Historical order lines and movements keep pointing at the record; it
    /// only disappears from listings and can no longer be ordered.
    pub async fn delete(&self, user: &AuthUser, product_id: Uuid) -> AppResult<()> {
        if !user.has_permission("products", "delete") {
            return Err(AppError::InsufficientPermissions);
        }

        let result = sqlx::query(
            "UPDATE products SET deleted_at = NOW(), active = false \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(product_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }

        Ok(())
    }
}
