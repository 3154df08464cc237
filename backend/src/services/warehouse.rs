//! Warehouse registry service

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::models::Warehouse;
use shared::validation::validate_warehouse_code;

/// Warehouse service
#[derive(Clone)]
pub struct WarehouseService {
    db: PgPool,
}

/// Input for creating a warehouse
#[derive(Debug, Deserialize)]
pub struct CreateWarehouseInput {
    pub code: String,
    pub name: String,
    pub address: Option<String>,
}

/// Input for updating a warehouse
#[derive(Debug, Deserialize)]
pub struct UpdateWarehouseInput {
    pub name: Option<String>,
    pub address: Option<String>,
    pub active: Option<bool>,
}

/// Warehouse row from database
#[derive(Debug, sqlx::FromRow)]
struct WarehouseRow {
    id: Uuid,
    code: String,
    name: String,
    address: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Warehouse {
            id: row.id,
            code: row.code,
            name: row.name,
            address: row.address,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

const WAREHOUSE_COLUMNS: &str =
    "id, code, name, address, active, created_at, updated_at, deleted_at";

impl WarehouseService {
    /// Create a new WarehouseService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all warehouses
    pub async fn list(&self, user: &AuthUser) -> AppResult<Vec<Warehouse>> {
        if !user.has_permission("warehouses", "view") {
            return Err(AppError::InsufficientPermissions);
        }

        let rows = sqlx::query_as::<_, WarehouseRow>(&format!(
            "SELECT {} FROM warehouses WHERE deleted_at IS NULL ORDER BY code ASC",
            WAREHOUSE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Warehouse::from).collect())
    }

    /// Get a warehouse by id
    pub async fn get(&self, user: &AuthUser, warehouse_id: Uuid) -> AppResult<Warehouse> {
        if !user.has_permission("warehouses", "view") {
            return Err(AppError::InsufficientPermissions);
        }

        let row = sqlx::query_as::<_, WarehouseRow>(&format!(
            "SELECT {} FROM warehouses WHERE id = $1 AND deleted_at IS NULL",
            WAREHOUSE_COLUMNS
        ))
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;

        Ok(row.into())
    }

    /// Create a warehouse
    pub async fn create(
        &self,
        user: &AuthUser,
        input: CreateWarehouseInput,
    ) -> AppResult<Warehouse> {
        if !user.has_permission("warehouses", "create") {
            return Err(AppError::InsufficientPermissions);
        }

        validate_warehouse_code(&input.code).map_err(|message| AppError::Validation {
            field: "code".to_string(),
            message: message.to_string(),
        })?;
        if input.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Name is required".to_string(),
            });
        }

        let row = sqlx::query_as::<_, WarehouseRow>(&format!(
            r#"
            INSERT INTO warehouses (code, name, address)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            WAREHOUSE_COLUMNS
        ))
        .bind(&input.code)
        .bind(input.name.trim())
        .bind(&input.address)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AppError::DuplicateEntry("code".to_string())
            }
            _ => AppError::from(e),
        })?;

        Ok(row.into())
    }

    /// Update a warehouse
    pub async fn update(
        &self,
        user: &AuthUser,
        warehouse_id: Uuid,
        input: UpdateWarehouseInput,
    ) -> AppResult<Warehouse> {
        if !user.has_permission("warehouses", "edit") {
            return Err(AppError::InsufficientPermissions);
        }

        let existing = self.get(user, warehouse_id).await?;

        let name = input.name.unwrap_or(existing.name);
        let address = input.address.or(existing.address);
        let active = input.active.unwrap_or(existing.active);

        if name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Name is required".to_string(),
            });
        }

        let row = sqlx::query_as::<_, WarehouseRow>(&format!(
            r#"
            UPDATE warehouses
            SET name = $1, address = $2, active = $3, updated_at = NOW()
            WHERE id = $4 AND deleted_at IS NULL
            RETURNING {}
            "#,
            WAREHOUSE_COLUMNS
        ))
        .bind(name.trim())
        .bind(&address)
        .bind(active)
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;

        Ok(row.into())
    }

    /// Soft-delete a warehouse
    ///
    /// Refused while the warehouse still holds stock; transfer or adjust it
    /// out first.
    pub async fn delete(&self, user: &AuthUser, warehouse_id: Uuid) -> AppResult<()> {
        if !user.has_permission("warehouses", "delete") {
            return Err(AppError::InsufficientPermissions);
        }

        let remaining = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0) FROM stock_levels WHERE warehouse_id = $1",
        )
        .bind(warehouse_id)
        .fetch_one(&self.db)
        .await?;

        if remaining > 0 {
            return Err(AppError::Validation {
                field: "warehouse_id".to_string(),
                message: "Warehouse still holds stock and cannot be deleted".to_string(),
            });
        }

        let result = sqlx::query(
            "UPDATE warehouses SET deleted_at = NOW(), active = false \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(warehouse_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Warehouse".to_string()));
        }

        Ok(())
    }
}
