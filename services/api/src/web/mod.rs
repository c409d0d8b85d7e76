pub mod accounts;
pub mod auth;
pub mod chapters;
pub mod comments;
pub mod middleware;
pub mod reading_lists;
pub mod rest;
pub mod state;
pub mod stories;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use middleware::{load_session, CurrentSession};
pub use state::AppState;

/// Builds every application route. CORS and the docs UI are layered on by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    let session_routes = Router::new()
        .route(
            "/session",
            post(auth::request_code_handler).delete(auth::sign_out_handler),
        )
        .route("/session/validate_otp", post(auth::validate_code_handler))
        .route("/session/resend_otp", post(auth::resend_code_handler))
        .route(
            "/user",
            get(accounts::show_profile_handler).patch(accounts::update_profile_handler),
        );

    let story_routes = Router::new()
        .route("/dashboard", get(stories::dashboard_handler))
        .route(
            "/stories",
            get(stories::list_stories_handler).post(stories::create_story_handler),
        )
        .route("/stories/mine", get(stories::my_stories_handler))
        .route(
            "/stories/{id}",
            get(stories::show_story_handler)
                .patch(stories::update_story_handler)
                .delete(stories::delete_story_handler),
        )
        .route(
            "/stories/{id}/comments",
            get(comments::list_story_comments_handler).post(comments::create_story_comment_handler),
        )
        .route(
            "/stories/{id}/reading_list",
            post(reading_lists::add_to_reading_list_handler),
        );

    let chapter_routes = Router::new()
        .route("/stories/{id}/chapters/new", get(chapters::new_chapter_handler))
        .route("/stories/{id}/chapters", post(chapters::create_chapter_handler))
        .route(
            "/stories/{id}/chapters/{chapter_id}",
            get(chapters::show_chapter_handler)
                .patch(chapters::update_chapter_handler)
                .delete(chapters::delete_chapter_handler),
        )
        .route(
            "/stories/{id}/chapters/{chapter_id}/publish",
            patch(chapters::publish_chapter_handler),
        )
        .route(
            "/stories/{id}/chapters/{chapter_id}/unpublish",
            patch(chapters::unpublish_chapter_handler),
        )
        .route(
            "/stories/{id}/chapters/{chapter_id}/comments",
            get(comments::list_chapter_comments_handler)
                .post(comments::create_chapter_comment_handler),
        );

    let reading_list_routes = Router::new()
        .route("/reading_lists", get(reading_lists::list_reading_list_handler))
        .route(
            "/reading_lists/{id}",
            delete(reading_lists::remove_from_reading_list_handler),
        );

    Router::new()
        .route("/up", get(rest::health_handler))
        .merge(session_routes)
        .merge(story_routes)
        .merge(chapter_routes)
        .merge(reading_list_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            load_session,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
