//! HTTP handlers for the Stockroom API

pub mod auth;
pub mod inventory;
pub mod product;
pub mod purchase_order;
pub mod sales_order;
pub mod warehouse;

pub use auth::*;
pub use inventory::*;
pub use product::*;
pub use purchase_order::*;
pub use sales_order::*;
pub use warehouse::*;
