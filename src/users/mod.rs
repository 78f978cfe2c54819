//! # Users Module
//!
//! User persistence and the role-gated user management API.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod service;
mod validators;


pub use models::{Role, User};
pub use routes::user_routes;
pub use service::UserService;
