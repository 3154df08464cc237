//! Request middleware

pub(crate) mod auth;

pub use auth::{auth_middleware, AuthUser, CurrentUser};
