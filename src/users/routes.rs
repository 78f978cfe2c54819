//! User management routes
//!
//! Collection and `/:userId` routes are gated per method by role action.
//! `/user/me` only needs a valid access token.

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};

use super::handlers;
use crate::auth::{require_action, Action};

fn gated(route: MethodRouter, action: Action) -> MethodRouter {
    route.route_layer(from_fn_with_state(action, require_action))
}

pub fn user_routes() -> Router {
    Router::new()
        .route(
            "/user",
            gated(get(handlers::get_users), Action::GetUsers)
                .merge(gated(post(handlers::create_user), Action::CreateUsers))
                .merge(gated(delete(handlers::delete_all_users), Action::DeleteUsers)),
        )
        .route(
            "/user/me",
            get(handlers::get_me)
                .patch(handlers::update_me)
                .delete(handlers::delete_me),
        )
        .route(
            "/user/:userId",
            gated(get(handlers::get_user), Action::GetUsers)
                .merge(gated(patch(handlers::update_user), Action::EditUsers))
                .merge(gated(delete(handlers::delete_user), Action::DeleteUsers)),
        )
}
