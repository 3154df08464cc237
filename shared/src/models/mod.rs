//! Domain models for the Stockroom back-office

mod inventory;
mod order;
mod product;
mod purchase;
mod sales;
mod user;
mod warehouse;

pub use inventory::*;
pub use order::*;
pub use product::*;
pub use purchase::*;
pub use sales::*;
pub use user::*;
pub use warehouse::*;
