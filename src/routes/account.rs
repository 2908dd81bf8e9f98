use crate::{AppState, handlers};
use axum::{Router, routing::get, routing::post};

/// Account Router Module
///
/// Defines the routes under the authenticated prefixes: the user's own
/// profile and the review actions.
///
/// Access Control Strategy:
/// These paths sit under `/api/account` and `/api/reviews`, which the route
/// authorizer classifies as authenticated; anonymous requests are redirected
/// before any handler runs. Handlers still pull the `CurrentUser` extractor
/// for the session identity, which drives every Owner-Only check (e.g. in
/// `delete_review`).
pub fn account_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/PATCH /api/account
        // Retrieves or partially updates the signed-in user's own profile.
        // The role column is not reachable from the PATCH payload.
        .route(
            "/api/account",
            get(handlers::get_account).patch(handlers::update_account),
        )
        // POST /api/reviews/{id}   (id = game)
        // Posts a review on a published game; author comes from the session.
        // DELETE /api/reviews/{id} (id = review)
        // Removes a review: owners always, moderators and admins any.
        .route(
            "/api/reviews/{id}",
            post(handlers::add_review).delete(handlers::delete_review),
        )
}
