//! Business logic services for the Stockroom back-office

pub mod auth;
pub mod inventory;
pub mod product;
pub mod purchase_order;
pub mod sales_order;
pub mod search;
pub mod warehouse;

pub use auth::AuthService;
pub use inventory::InventoryService;
pub use product::ProductService;
pub use purchase_order::PurchaseOrderService;
pub use sales_order::SalesOrderService;
pub use warehouse::WarehouseService;
