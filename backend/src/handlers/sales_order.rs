//! HTTP handlers for sales order endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sales_order::{
    CancelOrderInput, CreateSalesOrderInput, FulfillItemsInput, SalesItemInput, SalesOrderDetail,
    SalesOrderService, UpdateSalesItemInput, UpdateSalesOrderInput,
};
use crate::AppState;
use shared::filter::SalesOrderFilter;
use shared::models::SalesOrder;
use shared::types::{PaginatedResponse, Pagination};

/// List sales orders matching the query filters
pub async fn list_sales_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<SalesOrderFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<SalesOrder>>> {
    let service = SalesOrderService::new(state.db);
    let page = service.list(&current_user.0, &filter, &pagination).await?;
    Ok(Json(page))
}

/// Get a sales order with its lines
pub async fn get_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service.get(&current_user.0, order_id).await?;
    Ok(Json(detail))
}

/// Create a sales order
pub async fn create_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSalesOrderInput>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service.create(&current_user.0, input).await?;
    Ok(Json(detail))
}

/// Update a sales order's header fields
pub async fn update_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateSalesOrderInput>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service.update(&current_user.0, order_id, input).await?;
    Ok(Json(detail))
}

/// Soft-delete a sales order
pub async fn delete_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = SalesOrderService::new(state.db);
    service.delete(&current_user.0, order_id).await?;
    Ok(Json(()))
}

/// Add a line to a sales order
pub async fn add_sales_order_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<SalesItemInput>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service.add_item(&current_user.0, order_id, input).await?;
    Ok(Json(detail))
}

/// Update a line on a sales order
pub async fn update_sales_order_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateSalesItemInput>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service
        .update_item(&current_user.0, order_id, item_id, input)
        .await?;
    Ok(Json(detail))
}

/// Remove a line from a sales order
pub async fn remove_sales_order_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service
        .remove_item(&current_user.0, order_id, item_id)
        .await?;
    Ok(Json(detail))
}

/// Submit a draft for approval
pub async fn submit_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service.submit(&current_user.0, order_id).await?;
    Ok(Json(detail))
}

/// Approve a pending sales order
pub async fn approve_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service.approve(&current_user.0, order_id).await?;
    Ok(Json(detail))
}

/// Confirm an approved order and allocate stock
pub async fn confirm_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service.confirm(&current_user.0, order_id).await?;
    Ok(Json(detail))
}

/// Fulfill lines of a sales order
pub async fn fulfill_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<FulfillItemsInput>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service.fulfill(&current_user.0, order_id, input).await?;
    Ok(Json(detail))
}

/// Mark a fully fulfilled order as shipped
pub async fn ship_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service.ship(&current_user.0, order_id).await?;
    Ok(Json(detail))
}

/// Mark a shipped order as delivered
pub async fn deliver_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service.deliver(&current_user.0, order_id).await?;
    Ok(Json(detail))
}

/// Cancel a sales order
pub async fn cancel_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<CancelOrderInput>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service.cancel(&current_user.0, order_id, input).await?;
    Ok(Json(detail))
}

/// Close a delivered sales order
pub async fn close_sales_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<SalesOrderDetail>> {
    let service = SalesOrderService::new(state.db);
    let detail = service.close(&current_user.0, order_id).await?;
    Ok(Json(detail))
}
