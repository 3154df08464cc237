//! Shared types and domain logic for the Stockroom back-office
//!
//! This crate contains the pure business rules shared between the backend,
//! the browser client (via WASM), and tests: financial calculations, order
//! lifecycle rules, reference code handling, and input validation. It
//! performs no I/O.

pub mod calc;
pub mod filter;
pub mod lifecycle;
pub mod models;
pub mod reference;
pub mod types;
pub mod validation;

pub use calc::*;
pub use filter::*;
pub use lifecycle::*;
pub use models::*;
pub use reference::*;
pub use types::*;
pub use validation::*;
