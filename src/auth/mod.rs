//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Registration, credential login and Google login (token or code flow)
//! - Logout, refresh token rotation and the password/email flows
//! - The authorization gate (`AuthedUser`, `require_action`) and the role map

pub mod extractors;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod password;
pub mod roles;
pub mod routes;
pub mod service;
mod validators;


pub use extractors::{authorize, require_action, AuthedUser};
pub use roles::Action;
pub use routes::auth_routes;
pub use service::AuthService;
