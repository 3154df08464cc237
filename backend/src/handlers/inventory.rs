//! HTTP handlers for inventory endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory::{
    AdjustStockInput, InventoryService, LowStockProduct, StockLevelView, TransferStockInput,
};
use crate::AppState;
use shared::filter::MovementFilter;
use shared::models::StockMovement;
use shared::types::{PaginatedResponse, Pagination};

/// Stock levels for one warehouse
pub async fn get_stock_levels(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockLevelView>>> {
    let service = InventoryService::new(state.db);
    let levels = service.stock_levels(&current_user.0, warehouse_id).await?;
    Ok(Json(levels))
}

/// Manually adjust a stock level
pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<()>> {
    let service = InventoryService::new(state.db);
    service.adjust(&current_user.0, input).await?;
    Ok(Json(()))
}

/// Transfer stock between warehouses
pub async fn transfer_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<TransferStockInput>,
) -> AppResult<Json<()>> {
    let service = InventoryService::new(state.db);
    service.transfer(&current_user.0, input).await?;
    Ok(Json(()))
}

/// List stock movement journal entries
pub async fn list_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<MovementFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<StockMovement>>> {
    let service = InventoryService::new(state.db);
    let page = service
        .movements(&current_user.0, &filter, &pagination)
        .await?;
    Ok(Json(page))
}

/// Products below their reorder level
pub async fn get_low_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<LowStockProduct>>> {
    let service = InventoryService::new(state.db);
    let products = service.low_stock(&current_user.0).await?;
    Ok(Json(products))
}
