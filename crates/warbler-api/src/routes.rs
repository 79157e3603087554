use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::resolve_identity;
use crate::{messages, users};

/// Every route sees an `Identity`; access checks happen in the operations.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(messages::timeline))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/users", get(users::list_users))
        .route(
            "/users/{user_id}",
            get(users::show_user)
                .patch(users::update_profile)
                .delete(users::delete_account),
        )
        .route("/users/{user_id}/followers", get(users::followers))
        .route("/users/{user_id}/following", get(users::following))
        .route("/users/{user_id}/likes", get(users::likes))
        .route(
            "/users/{user_id}/follow",
            post(users::follow).delete(users::unfollow),
        )
        .route("/messages", post(messages::create_message))
        .route(
            "/messages/{message_id}",
            get(messages::show_message).delete(messages::delete_message),
        )
        .route("/messages/{message_id}/like", post(messages::toggle_like))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_identity))
        .with_state(state)
}
