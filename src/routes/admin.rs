use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Defines the back-office routes, nested under `/api/admin` in
/// `create_router`.
///
/// Access Control:
/// The route authorizer admits only sessions whose **freshly enriched** role
/// is admin to this prefix; everyone else is redirected to sign-in before
/// routing happens. No handler below re-checks the role; the prefix gate
/// covers every route nested here.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/stats
        // Core dashboard metrics (totals and the unpublished queue size).
        .route("/stats", get(handlers::back_office_stats))
        // GET/POST /api/admin/games
        // Lists ALL games including drafts, or creates a new (unpublished) one.
        .route(
            "/games",
            get(handlers::admin_list_games).post(handlers::create_game),
        )
        // PUT/DELETE /api/admin/games/{id}
        // Edits or removes a catalog entry.
        .route(
            "/games/{id}",
            put(handlers::update_game).delete(handlers::delete_game),
        )
        // PUT /api/admin/games/{id}/published
        // The moderation switch: releases a game to the public or pulls it.
        .route("/games/{id}/published", put(handlers::set_game_published))
        // GET /api/admin/users
        // Every registered profile, for the user management table.
        .route("/users", get(handlers::list_users))
        // PUT /api/admin/users/{id}/role
        // Assigns a role. Takes effect on the target's next request because
        // sessions re-read the profile role every time.
        .route("/users/{id}/role", put(handlers::set_user_role))
        // POST /api/admin/uploads/cover
        // Initiates the cover upload pipeline: a short-lived presigned URL
        // lets the browser push image bytes straight to object storage.
        .route("/uploads/cover", post(handlers::get_cover_upload_url))
}
