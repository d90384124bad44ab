//! HTTP router and handlers.

use crate::app::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub mod attachments;
pub mod messages;
pub mod ui;

/// Assemble the HTTP router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ui::ui_index))
        .route(
            "/messages",
            get(messages::list_messages).delete(messages::clear_messages),
        )
        .route(
            "/messages/:id",
            get(messages::get_message).delete(messages::delete_message),
        )
        .route("/messages/:id/html", get(messages::get_message_html))
        .route("/refresh", post(messages::refresh))
        .route(
            "/attachments/:stored_name",
            get(attachments::download_attachment),
        )
        .with_state(state)
}
