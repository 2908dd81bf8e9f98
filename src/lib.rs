use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// The application's services and middleware components.
pub mod auth;
pub mod authorize;
pub mod config;
pub mod handlers;
pub mod identity;
pub mod locale;
pub mod models;
pub mod repository;
pub mod storage;
pub mod verifier;

// Route builders, one module per protection tier (Public, Account, Admin, Pages).
pub mod routes;
use routes::{account, admin, pages, public};

// --- Public Re-exports ---

// The state types main.rs assembles, reachable without deep paths.
pub use config::AppConfig;
pub use identity::{HttpIdentityProvider, IdentityState, MockIdentityProvider};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MediaState, MockMediaStorage, S3MediaStorage};
pub use verifier::{CredentialVerifier, VerifierState};

/// ApiDoc
///
/// The OpenAPI document, generated from every handler carrying a
/// `#[utoipa::path]` annotation and every schema deriving `ToSchema`.
/// Served as JSON at `/api-docs/openapi.json` and browsable through the
/// Swagger UI mount.
#[derive(OpenApi)]
#[openapi(
    // Every documented handler must be listed here or it silently drops
    // out of the generated document.
    paths(
        handlers::sign_in, handlers::oauth_callback, handlers::register,
        handlers::sign_out, handlers::get_session,
        handlers::list_games, handlers::featured_games, handlers::game_details,
        handlers::list_game_reviews,
        handlers::get_account, handlers::update_account,
        handlers::add_review, handlers::delete_review,
        handlers::back_office_stats, handlers::admin_list_games, handlers::create_game,
        handlers::update_game, handlers::set_game_published, handlers::delete_game,
        handlers::list_users, handlers::set_user_role, handlers::get_cover_upload_url,
        handlers::home_page, handlers::catalog_page, handlers::game_page,
        handlers::signin_page, handlers::account_page, handlers::admin_page
    ),
    // Same rule for every request/response body type.
    components(
        schemas(
            models::Role, models::Profile, models::Game, models::Review,
            models::SignInRequest, models::RegisterRequest, models::OAuthCallbackRequest,
            models::UpdateAccountRequest, models::CreateGameRequest, models::UpdateGameRequest,
            models::CreateReviewRequest, models::SetRoleRequest,
            models::CoverUploadRequest, models::CoverUploadResponse,
            models::SessionUser, models::SessionResponse, models::BackOfficeStats,
            models::HomePage, models::CatalogPage, models::GamePage,
            models::SignInPage, models::AccountPage, models::AdminPage,
        )
    ),
    tags(
        (name = "ludex", description = "Ludex game catalog and back-office API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The one container every request works out of. Each field is an Arc'd
/// trait object (or the immutable config), so cloning the state per
/// request is pointer-cheap and nothing in it can drift between requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: the profile and catalog stores behind one trait.
    pub repo: RepositoryState,
    /// Identity Layer: the external auth provider (password checks,
    /// OAuth code exchange, sign-ups).
    pub identity: IdentityState,
    /// Verifier: owns the sign-in decision on top of identity + repository.
    pub verifier: VerifierState,
    /// Media Layer: the object store holding cover art, plus upload signing.
    pub media: MediaState,
    /// Configuration: resolved once at startup, immutable after.
    pub config: AppConfig,
}

// --- FromRef Implementations ---

// Lets a handler take State<RepositoryState> (or any other component) on
// its own instead of destructuring the whole AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for VerifierState {
    fn from_ref(app_state: &AppState) -> VerifierState {
        app_state.verifier.clone()
    }
}

impl FromRef<AppState> for MediaState {
    fn from_ref(app_state: &AppState) -> MediaState {
        app_state.media.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Builds the complete application: every route group merged into one
/// `Router`, then the middleware stack and shared state wrapped around it.
///
/// The protection chain runs outermost-in as **locale, session,
/// authorize**: the locale layer normalizes page URLs first, the session
/// layer materializes whatever identity the request carries, and the
/// authorizer then decides access from the path class plus that session.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // The correlation header, generated and propagated below.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Route Assembly
    let base_router = Router::new()
        // Swagger UI plus the raw OpenAPI JSON it reads.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: catalog reads and the auth flow.
        .merge(public::public_routes())
        // Account Routes: the authenticated prefixes.
        .merge(account::account_routes())
        // Page Data Routes: the locale-prefixed surface.
        .merge(pages::pages_routes())
        // Back-Office Routes: nested under '/api/admin'. No handler here
        // re-checks roles; the authorizer layer below guards the prefix.
        .nest("/api/admin", admin::admin_routes())
        // 3. Protection Chain (layers added innermost-first)
        // 3a. Route authorization: pure decision over path class + session.
        .layer(middleware::from_fn(authorize::authorize_layer))
        // 3b. Session materialization: token decode + profile enrichment.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_layer,
        ))
        // 3c. Locale routing: redirects bare page paths to /en/... first,
        // so both layers below always see locale-stable paths.
        .layer(middleware::from_fn(locale::locale_layer))
        // One shared state for every route above.
        .with_state(state);

    // 4. Request ID and Tracing Layers (outermost, wrapping everything above)
    base_router
        .layer(
            ServiceBuilder::new()
                // 4a. Request ID: stamp a fresh UUID onto every request that arrives.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Tracing: one span per request, opened by trace_span_logger
                // and closed with the response status and latency.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Request ID Propagation: returns x-request-id to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 5. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`. Pulls the `x-request-id` the earlier
/// layer stamped onto the request and records it next to the method and
/// URI, which is what ties a request's log lines together.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
