//! Router construction for the overlay API.

use crate::handlers::{editor, publish, trace};
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const API_PREFIX: &str = "/api/dve";

/// Build the full router with every `/api/dve` route.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Editing (draft revision)
        .route("/session/start", post(editor::session_start))
        .route("/element/resolve", post(editor::resolve_element))
        .route("/edit/text", post(editor::edit_text))
        .route("/edit/style", post(editor::edit_style))
        .route("/section/insert", post(editor::insert_section))
        .route("/bind/action", post(editor::bind_action))
        .route("/bind/test", post(editor::test_binding))
        .route("/save-draft", post(editor::save_draft))
        .route("/ops/append", post(editor::append_ops))
        .route("/style/remove", post(editor::remove_style))
        .route("/text/remove", post(editor::remove_text))
        .route("/section/remove", post(editor::remove_section))
        .route("/bind/remove", post(editor::unbind_action))
        .route("/actions", get(editor::list_actions))
        // Publishing
        .route("/preflight", post(publish::preflight))
        .route("/publish", post(publish::publish))
        .route("/rollback", post(publish::rollback))
        .route("/diff", get(publish::diff))
        .route("/audit", get(publish::audit))
        .route("/page/load", get(publish::load_page))
        // Runtime
        .route("/trace", post(trace::ingest));

    Router::new()
        .nest(API_PREFIX, api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
