//! Route definitions for the Stockroom API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Auth routes (login/register/refresh are public, /me is protected)
        .nest("/auth", auth_routes())
        // Protected routes - product catalog
        .nest("/products", product_routes())
        // Protected routes - warehouse registry
        .nest("/warehouses", warehouse_routes())
        // Protected routes - stock and the movement journal
        .nest("/inventory", inventory_routes())
        // Protected routes - purchase orders
        .nest("/purchase-orders", purchase_order_routes())
        // Protected routes - sales orders
        .nest("/sales-orders", sales_order_routes())
}

/// Authentication routes
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .nest("/me", me_routes())
}

fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::me))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Product catalog routes (protected)
fn product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Warehouse registry routes (protected)
fn warehouse_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_warehouses).post(handlers::create_warehouse),
        )
        .route(
            "/:warehouse_id",
            get(handlers::get_warehouse)
                .put(handlers::update_warehouse)
                .delete(handlers::delete_warehouse),
        )
        .route(
            "/:warehouse_id/stock",
            get(handlers::get_stock_levels),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Inventory routes (protected)
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/adjust", post(handlers::adjust_stock))
        .route("/transfer", post(handlers::transfer_stock))
        .route("/movements", get(handlers::list_movements))
        .route("/low-stock", get(handlers::get_low_stock))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Purchase order routes (protected)
fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_orders).post(handlers::create_purchase_order),
        )
        .route(
            "/:order_id",
            get(handlers::get_purchase_order)
                .put(handlers::update_purchase_order)
                .delete(handlers::delete_purchase_order),
        )
        .route("/:order_id/items", post(handlers::add_purchase_order_item))
        .route(
            "/:order_id/items/:item_id",
            put(handlers::update_purchase_order_item).delete(handlers::remove_purchase_order_item),
        )
        .route("/:order_id/submit", post(handlers::submit_purchase_order))
        .route("/:order_id/approve", post(handlers::approve_purchase_order))
        .route("/:order_id/send", post(handlers::send_purchase_order))
        .route("/:order_id/receive", post(handlers::receive_purchase_order))
        .route("/:order_id/cancel", post(handlers::cancel_purchase_order))
        .route("/:order_id/close", post(handlers::close_purchase_order))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Sales order routes (protected)
fn sales_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_sales_orders).post(handlers::create_sales_order),
        )
        .route(
            "/:order_id",
            get(handlers::get_sales_order)
                .put(handlers::update_sales_order)
                .delete(handlers::delete_sales_order),
        )
        .route("/:order_id/items", post(handlers::add_sales_order_item))
        .route(
            "/:order_id/items/:item_id",
            put(handlers::update_sales_order_item).delete(handlers::remove_sales_order_item),
        )
        .route("/:order_id/submit", post(handlers::submit_sales_order))
        .route("/:order_id/approve", post(handlers::approve_sales_order))
        .route("/:order_id/confirm", post(handlers::confirm_sales_order))
        .route("/:order_id/fulfill", post(handlers::fulfill_sales_order))
        .route("/:order_id/ship", post(handlers::ship_sales_order))
        .route("/:order_id/deliver", post(handlers::deliver_sales_order))
        .route("/:order_id/cancel", post(handlers::cancel_sales_order))
        .route("/:order_id/close", post(handlers::close_sales_order))
        .route_layer(middleware::from_fn(auth_middleware))
}
