pub mod auth;
pub mod convert;
pub mod error;
pub mod gate;
pub mod images;
pub mod messages;
pub mod middleware;
pub mod state;
pub mod users;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};

use crate::state::AppState;

/// Assemble the REST surface. The WebSocket gateway route is wired
/// separately by the server binary.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login));

    let protected = Router::new()
        .route("/auth/check", get(auth::check))
        .route("/auth/update-profile", put(auth::update_profile))
        .route("/messages/users", get(messages::get_sidebar_users))
        .route("/messages/send/{id}", post(messages::send_message))
        .route(
            "/messages/conversation/{user_id}",
            delete(messages::delete_conversation),
        )
        .route(
            "/messages/{id}",
            get(messages::get_messages).delete(messages::delete_message),
        )
        .route("/users/search", get(users::search_users))
        .route("/users/private-key", put(users::set_private_key))
        .route("/users/generate-private-key", post(users::generate_private_key))
        .route(
            "/users/verify-private-key/{user_id}",
            post(users::verify_private_key),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new().merge(public).merge(protected).with_state(state)
}
