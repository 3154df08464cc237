//! HTTP handlers for purchase order endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::purchase_order::{
    CancelOrderInput, CreatePurchaseOrderInput, OrderItemInput, PurchaseOrderDetail,
    PurchaseOrderService, ReceiveItemsInput, UpdateItemInput, UpdatePurchaseOrderInput,
};
use crate::AppState;
use shared::filter::PurchaseOrderFilter;
use shared::models::PurchaseOrder;
use shared::types::{PaginatedResponse, Pagination};

/// List purchase orders matching the query filters
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<PurchaseOrderFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<PurchaseOrder>>> {
    let service = PurchaseOrderService::new(state.db);
    let page = service.list(&current_user.0, &filter, &pagination).await?;
    Ok(Json(page))
}

/// Get a purchase order with its lines
pub async fn get_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let service = PurchaseOrderService::new(state.db);
    let detail = service.get(&current_user.0, order_id).await?;
    Ok(Json(detail))
}

/// Create a purchase order
pub async fn create_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let service = PurchaseOrderService::new(state.db);
    let detail = service.create(&current_user.0, input).await?;
    Ok(Json(detail))
}

/// Update a purchase order's header fields
pub async fn update_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdatePurchaseOrderInput>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let service = PurchaseOrderService::new(state.db);
    let detail = service.update(&current_user.0, order_id, input).await?;
    Ok(Json(detail))
}

/// Soft-delete a purchase order
pub async fn delete_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = PurchaseOrderService::new(state.db);
    service.delete(&current_user.0, order_id).await?;
    Ok(Json(()))
}

/// Add a line to a purchase order
pub async fn add_purchase_order_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<OrderItemInput>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let service = PurchaseOrderService::new(state.db);
    let detail = service.add_item(&current_user.0, order_id, input).await?;
    Ok(Json(detail))
}

/// Update a line on a purchase order
pub async fn update_purchase_order_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let service = PurchaseOrderService::new(state.db);
    let detail = service
        .update_item(&current_user.0, order_id, item_id, input)
        .await?;
    Ok(Json(detail))
}

/// Remove a line from a purchase order
pub async fn remove_purchase_order_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let service = PurchaseOrderService::new(state.db);
    let detail = service
        .remove_item(&current_user.0, order_id, item_id)
        .await?;
    Ok(Json(detail))
}

/// Submit a draft for approval
pub async fn submit_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let service = PurchaseOrderService::new(state.db);
    let detail = service.submit(&current_user.0, order_id).await?;
    Ok(Json(detail))
}

/// Approve a pending purchase order
pub async fn approve_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let service = PurchaseOrderService::new(state.db);
    let detail = service.approve(&current_user.0, order_id).await?;
    Ok(Json(detail))
}

/// Mark an approved order as sent to the supplier
pub async fn send_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let service = PurchaseOrderService::new(state.db);
    let detail = service.send(&current_user.0, order_id).await?;
    Ok(Json(detail))
}

/// Receive goods against a purchase order
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<ReceiveItemsInput>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let service = PurchaseOrderService::new(state.db);
    let detail = service.receive(&current_user.0, order_id, input).await?;
    Ok(Json(detail))
}

/// Cancel a purchase order
pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<CancelOrderInput>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let service = PurchaseOrderService::new(state.db);
    let detail = service.cancel(&current_user.0, order_id, input).await?;
    Ok(Json(detail))
}

/// Close a fully received purchase order
pub async fn close_purchase_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<PurchaseOrderDetail>> {
    let service = PurchaseOrderService::new(state.db);
    let detail = service.close(&current_user.0, order_id).await?;
    Ok(Json(detail))
}
