use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// The surface that needs no session: the catalog read API and the auth
/// flow's entry points. Anonymous and signed-in clients see exactly the
/// same thing here.
///
/// Security Mandate:
/// Every catalog read in this module (`/api/games/*`) must come through a
/// Repository query that filters on `published=true`. Drafts the back
/// office has not released do not exist as far as this surface is
/// concerned.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer. Answers "ok" without touching
        // any backend, so it stays green even when Postgres is down.
        .route("/health", get(|| async { "ok" }))
        // --- Auth Flow ---
        // POST /api/auth/signin
        // Verifies credentials against the identity provider and establishes
        // the cookie session. Every failure mode answers the same 401.
        .route("/api/auth/signin", post(handlers::sign_in))
        // POST /api/auth/register
        // New account creation at the identity provider plus the mirrored
        // local profile. Does not sign the user in.
        .route("/api/auth/register", post(handlers::register))
        // POST /api/auth/callback
        // Completes an OAuth flow by exchanging the provider's callback code.
        .route("/api/auth/callback", post(handlers::oauth_callback))
        // POST /api/auth/signout
        // Clears the session cookie. Harmless when anonymous.
        .route("/api/auth/signout", post(handlers::sign_out))
        // GET /api/auth/session
        // The probe the UI polls on load: current session or null.
        .route("/api/auth/session", get(handlers::get_session))
        // --- Catalog Read Surface ---
        // GET /api/games?genre=...&year=...&search=...
        // Lists published games with filtering and search. The `published=true`
        // enforcement lives in the Repository query.
        .route("/api/games", get(handlers::list_games))
        // GET /api/games/featured
        // The curated home rail. Static segment, so it wins over `{id}` below.
        .route("/api/games/featured", get(handlers::featured_games))
        // GET /api/games/{id}
        // One published game in full; drafts are a 404 here.
        .route("/api/games/{id}", get(handlers::game_details))
        // GET /api/games/{id}/reviews
        // Lists reviews for a game. Implicitly verifies the parent game is
        // published before releasing anything.
        .route("/api/games/{id}/reviews", get(handlers::list_game_reviews))
}
