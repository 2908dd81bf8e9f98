use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Pages Router Module
///
/// The locale-prefixed page-data surface consumed by the UI rendering layer.
/// Each route echoes its data as JSON; the first path segment is the locale,
/// which the locale middleware guarantees is present (it redirects bare
/// paths to their default-locale form before routing).
///
/// Protection tiers are decided by the route authorizer on the
/// locale-stripped path: `/{locale}/account` is authenticated and
/// `/{locale}/admin` is admin-only, in every language, without any
/// per-route wiring here.
pub fn pages_routes() -> Router<AppState> {
    Router::new()
        // GET /{locale}
        // Home: the curated featured rail.
        .route("/{locale}", get(handlers::home_page))
        // GET /{locale}/games
        // The catalog listing, with the same filters as the API surface.
        .route("/{locale}/games", get(handlers::catalog_page))
        // GET /{locale}/games/{id}
        // One published game plus its reviews.
        .route("/{locale}/games/{id}", get(handlers::game_page))
        // GET /{locale}/signin
        // The sign-in shell; also where unauthorized requests land.
        .route("/{locale}/signin", get(handlers::signin_page))
        // GET /{locale}/account
        // The signed-in user's profile page.
        .route("/{locale}/account", get(handlers::account_page))
        // GET /{locale}/admin
        // The back-office dashboard: stats plus the moderation queue.
        .route("/{locale}/admin", get(handlers::admin_page))
}
