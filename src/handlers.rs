use crate::{
    AppState,
    auth::{CurrentUser, clear_session_cookie, mint_session_token, session_cookie},
    config::AppConfig,
    identity::IdentityError,
    locale::Locale,
    models::{
        AccountPage, AdminPage, BackOfficeStats, CatalogPage, CoverUploadRequest,
        CoverUploadResponse, CreateGameRequest, CreateReviewRequest, Game, GamePage, HomePage,
        OAuthCallbackRequest, Principal, Profile, RegisterRequest, Review, SessionResponse,
        SessionUser, SetRoleRequest, SignInPage, SignInRequest, UpdateAccountRequest,
        UpdateGameRequest,
    },
    storage::cover_key,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

/// How many games the curated home rail shows.
const FEATURED_RAIL_LIMIT: i64 = 6;

// --- Filter Structs ---

/// GameFilter
///
/// The query parameters the public catalog listing (GET /api/games)
/// accepts, bound through Axum's Query extractor. Absent fields simply
/// survive as `None` and skip their filter.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct GameFilter {
    /// Optional exact-match genre filter.
    pub genre: Option<String>,
    /// Optional release-year filter.
    pub year: Option<i32>,
    /// Optional search string matched against title and summary.
    pub search: Option<String>,
}

// --- Auth Handlers ---

/// establish_session
///
/// Shared tail of every sign-in path: mints the token and sets the cookie,
/// then shapes the response. The failure body is the same generic string
/// credential rejections use.
fn establish_session(
    jar: CookieJar,
    principal: Principal,
    config: &AppConfig,
) -> Result<(CookieJar, Json<SessionResponse>), (StatusCode, &'static str)> {
    let token = mint_session_token(principal.id, &principal.email, principal.role, config)
        .map_err(|e| {
            tracing::error!("Failed to mint session token: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "sign-in failed")
        })?;

    let expires_at = Utc::now() + chrono::Duration::seconds(config.session_ttl_secs as i64);
    let response = SessionResponse {
        user: SessionUser {
            id: principal.id,
            email: principal.email,
            username: principal.username,
            avatar_url: principal.avatar_url,
            role: principal.role,
        },
        expires_at,
    };

    Ok((jar.add(session_cookie(token, config)), Json(response)))
}

/// sign_in
///
/// [Public Route] Verifies an email/password pair and establishes a session.
///
/// *Security*: Every failure (empty input, wrong password, unknown account,
/// provider outage) produces the **same** 401 and the same body. The
/// response never says which check failed.
#[utoipa::path(
    post,
    path = "/api/auth/signin",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Sign-in failed")
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SignInRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), (StatusCode, &'static str)> {
    let principal = match state.verifier.verify(&payload.email, &payload.password).await {
        Ok(principal) => principal,
        Err(failure) => return Err((StatusCode::UNAUTHORIZED, failure.public_message())),
    };

    establish_session(jar, principal, &state.config)
}

/// oauth_callback
///
/// [Public Route] Completes an OAuth flow: the code from the provider's
/// redirect is exchanged server-side, then the session is established exactly
/// like the password path.
#[utoipa::path(
    post,
    path = "/api/auth/callback",
    request_body = OAuthCallbackRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Sign-in failed")
    )
)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<OAuthCallbackRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), (StatusCode, &'static str)> {
    let principal = match state
        .verifier
        .complete_oauth(&payload.provider, &payload.code)
        .await
    {
        Ok(principal) => principal,
        Err(failure) => return Err((StatusCode::UNAUTHORIZED, failure.public_message())),
    };

    establish_session(jar, principal, &state.config)
}

/// register
///
/// [Public Route] Creates an account at the identity provider and mirrors the
/// profile locally.
///
/// *Flow*: Calls the provider's signup endpoint, then upserts the
/// corresponding `profiles` record so the primary keys stay synchronized.
/// Registration does **not** sign the user in; email confirmation may still
/// be pending at the provider.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = Profile),
        (status = 400, description = "Rejected by provider")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Profile>), StatusCode> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Step 1: Create the account at the external identity provider.
    let identity = match state
        .identity
        .sign_up(&payload.email, &payload.password, payload.username.as_deref())
        .await
    {
        Ok(identity) => identity,
        // Collisions and weak passwords come back as a rejection.
        Err(IdentityError::Rejected) => return Err(StatusCode::BAD_REQUEST),
        Err(IdentityError::Unavailable(msg)) => {
            tracing::error!("Registration unavailable: {}", msg);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    // Step 2: Mirror the profile in the local `profiles` table.
    let profile = state
        .repo
        .upsert_profile(&identity)
        .await
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// sign_out
///
/// [Public Route] Clears the session cookie. Tokens are not tracked
/// server-side, so sign-out is purely a cookie removal; calling it while
/// anonymous is a harmless no-op.
#[utoipa::path(
    post,
    path = "/api/auth/signout",
    responses((status = 204, description = "Signed out"))
)]
pub async fn sign_out(jar: CookieJar) -> (CookieJar, StatusCode) {
    (jar.remove(clear_session_cookie()), StatusCode::NO_CONTENT)
}

/// get_session
///
/// [Public Route] The session probe the UI polls on load: the current
/// enriched session, or `null` for anonymous visitors. Never an error.
#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses((status = 200, description = "Current session or null", body = Option<SessionResponse>))
)]
pub async fn get_session(user: Option<CurrentUser>) -> Json<Option<SessionResponse>> {
    Json(user.map(|CurrentUser(session)| SessionResponse::from(&session)))
}

// --- Public Catalog Handlers ---

/// list_games
///
/// [Public Route] Lists published games with filtering and search.
///
/// *Security*: The repository applies the `published=true` filter
/// **unconditionally**, so drafts can never leak through a crafted query.
#[utoipa::path(
    get,
    path = "/api/games",
    params(GameFilter),
    responses((status = 200, description = "List filtered games", body = [Game]))
)]
pub async fn list_games(
    State(state): State<AppState>,
    Query(filter): Query<GameFilter>,
) -> Json<Vec<Game>> {
    let games = state
        .repo
        .list_games(filter.genre, filter.year, filter.search)
        .await;
    Json(games)
}

/// featured_games
///
/// [Public Route] The curated home rail; published and featured only.
#[utoipa::path(
    get,
    path = "/api/games/featured",
    responses((status = 200, description = "Featured games", body = [Game]))
)]
pub async fn featured_games(State(state): State<AppState>) -> Json<Vec<Game>> {
    let featured = state.repo.featured_games(FEATURED_RAIL_LIMIT).await;
    Json(featured)
}

/// game_details
///
/// [Public Route] The catalog detail view, fetched by id. Unpublished games
/// are a 404 here; for the public surface they simply do not exist.
#[utoipa::path(
    get,
    path = "/api/games/{id}",
    params(("id" = Uuid, Path, description = "Game ID")),
    responses(
        (status = 200, description = "Found", body = Game),
        (status = 404, description = "Not Found")
    )
)]
pub async fn game_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Game>, StatusCode> {
    match state.repo.get_published_game(id).await {
        Some(game) => Ok(Json(game)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// list_game_reviews
///
/// [Public Route] Retrieves all reviews for a given game ID. The underlying
/// repository query joins against `games` so reviews of unpublished games
/// stay invisible.
#[utoipa::path(
    get,
    path = "/api/games/{id}/reviews",
    params(("id" = Uuid, Path, description = "Game ID")),
    responses((status = 200, description = "Reviews", body = [Review]))
)]
pub async fn list_game_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Json<Vec<Review>> {
    let reviews = state.repo.list_reviews(id).await;
    Json(reviews)
}

// --- Account Handlers ---

/// get_account
///
/// [Authenticated Route] The signed-in user's own profile.
#[utoipa::path(
    get,
    path = "/api/account",
    responses((status = 200, description = "Profile", body = Profile))
)]
pub async fn get_account(
    CurrentUser(session): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Profile>, StatusCode> {
    match state.repo.get_profile(session.id).await {
        Some(profile) => Ok(Json(profile)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// update_account
///
/// [Authenticated Route] Partial update of the user's own profile (username,
/// avatar). The role column is not reachable from here.
#[utoipa::path(
    patch,
    path = "/api/account",
    request_body = UpdateAccountRequest,
    responses((status = 200, description = "Updated", body = Profile))
)]
pub async fn update_account(
    CurrentUser(session): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateAccountRequest>,
) -> Result<Json<Profile>, StatusCode> {
    match state.repo.update_profile(session.id, payload).await {
        Some(profile) => Ok(Json(profile)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

// --- Review Handlers ---

/// add_review
///
/// [Authenticated Route] Posts a review on a published game. The author is
/// taken from the session, never from the payload.
#[utoipa::path(
    post,
    path = "/api/reviews/{id}",
    params(("id" = Uuid, Path, description = "Game ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review added", body = Review),
        (status = 400, description = "Invalid rating or empty body"),
        (status = 404, description = "Game not found or unpublished")
    )
)]
pub async fn add_review(
    CurrentUser(session): CurrentUser,
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), StatusCode> {
    if !(1..=5).contains(&payload.rating) || payload.body.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Reviews only attach to games the public can actually see.
    if state.repo.get_published_game(game_id).await.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    match state.repo.add_review(game_id, session.id, payload).await {
        Some(review) => Ok((StatusCode::CREATED, Json(review))),
        None => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// delete_review
///
/// [Authenticated Route] Removes a review. Which removal a caller gets
/// depends on who they are.
///
/// *RBAC/Ownership*: moderators and admins may take down any review (Force
/// Delete); everyone else only their own (Owner Delete).
#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    params(("id" = i64, Path, description = "Review ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_review(
    CurrentUser(session): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> StatusCode {
    if session.role.can_moderate() {
        // Moderation override: ignores ownership checks.
        if state.repo.delete_review_moderated(id).await {
            return StatusCode::NO_CONTENT;
        }
    } else {
        // Standard delete: enforces the ownership check against the session id.
        if state.repo.delete_review(id, session.id).await {
            return StatusCode::NO_CONTENT;
        }
    }
    // 404 whether the review was missing or simply not theirs.
    StatusCode::NOT_FOUND
}

// --- Back-Office Handlers ---
//
// None of these carry a role check: the route authorizer only lets admin
// sessions reach the /api/admin prefix in the first place.

/// back_office_stats
///
/// [Back-Office Route] Core counters for the dashboard.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses((status = 200, description = "Stats", body = BackOfficeStats))
)]
pub async fn back_office_stats(State(state): State<AppState>) -> Json<BackOfficeStats> {
    Json(state.repo.get_stats().await)
}

/// admin_list_games
///
/// [Back-Office Route] Retrieves ALL games regardless of their `published`
/// status; drafts sort first.
#[utoipa::path(
    get,
    path = "/api/admin/games",
    responses((status = 200, description = "All games", body = [Game]))
)]
pub async fn admin_list_games(State(state): State<AppState>) -> Json<Vec<Game>> {
    Json(state.repo.list_all_games().await)
}

/// create_game
///
/// [Back-Office Route] Creates a catalog entry. New games start unpublished;
/// releasing them to the public is a separate step.
#[utoipa::path(
    post,
    path = "/api/admin/games",
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Created", body = Game),
        (status = 400, description = "Missing slug or title")
    )
)]
pub async fn create_game(
    State(state): State<AppState>,
    Json(payload): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<Game>), StatusCode> {
    if payload.slug.trim().is_empty() || payload.title.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.repo.create_game(payload).await {
        Some(game) => Ok((StatusCode::CREATED, Json(game))),
        None => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// update_game
///
/// [Back-Office Route] Partial update of a catalog entry.
#[utoipa::path(
    put,
    path = "/api/admin/games/{id}",
    params(("id" = Uuid, Path, description = "Game ID")),
    request_body = UpdateGameRequest,
    responses(
        (status = 200, description = "Updated", body = Game),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_game(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateGameRequest>,
) -> Result<Json<Game>, StatusCode> {
    match state.repo.update_game(id, payload).await {
        Some(game) => Ok(Json(game)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// set_game_published
///
/// [Back-Office Route] Publishes or hides a game.
#[utoipa::path(
    put,
    path = "/api/admin/games/{id}/published",
    params(("id" = Uuid, Path, description = "Game ID")),
    request_body = bool,
    responses(
        (status = 200, description = "Updated", body = Game),
        (status = 404, description = "Not Found")
    )
)]
pub async fn set_game_published(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(published): Json<bool>,
) -> Result<Json<Game>, StatusCode> {
    match state.repo.set_published(id, published).await {
        Some(game) => Ok(Json(game)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// delete_game
///
/// [Back-Office Route] Removes a catalog entry outright; its reviews cascade.
#[utoipa::path(
    delete,
    path = "/api/admin/games/{id}",
    params(("id" = Uuid, Path, description = "Game ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_game(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.repo.delete_game(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// list_users
///
/// [Back-Office Route] Every registered profile, for the user management table.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses((status = 200, description = "All users", body = [Profile]))
)]
pub async fn list_users(State(state): State<AppState>) -> Json<Vec<Profile>> {
    Json(state.repo.list_profiles().await)
}

/// set_user_role
///
/// [Back-Office Route] Assigns a role to a user.
///
/// *Note*: Already-issued tokens are not revoked. Because every request
/// re-reads the profile role, the change still takes effect on the target's
/// very next request, in both directions.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Updated", body = Profile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn set_user_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<Json<Profile>, StatusCode> {
    match state.repo.set_role(id, payload.role).await {
        Some(profile) => Ok(Json(profile)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// get_cover_upload_url
///
/// [Back-Office Route] Presigns an upload URL so the browser sends cover
/// art straight to the bucket instead of through this server.
///
/// *Security*: The URL dies after 10 minutes and its signature binds the
/// declared image MIME type. The object key gets a fresh UUID under
/// `covers/`, so uploads cannot collide or escape that prefix.
#[utoipa::path(
    post,
    path = "/api/admin/uploads/cover",
    request_body = CoverUploadRequest,
    responses(
        (status = 200, description = "URL", body = CoverUploadResponse),
        (status = 400, description = "Not an image type")
    )
)]
pub async fn get_cover_upload_url(
    State(state): State<AppState>,
    Json(payload): Json<CoverUploadRequest>,
) -> impl IntoResponse {
    // Covers are images; anything else is refused before storage is touched.
    if !payload.file_type.starts_with("image/") {
        return (StatusCode::BAD_REQUEST, "cover uploads must be images").into_response();
    }

    let object_key = cover_key(&payload.filename);

    match state
        .media
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
    {
        Ok(url) => {
            let response = CoverUploadResponse {
                upload_url: url,
                resource_key: object_key,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            // The signing failure goes to the log; the client only learns a 500.
            tracing::error!("Storage error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed").into_response()
        }
    }
}

// --- Page Data Handlers ---
//
// The UI layer renders pages from these JSON payloads; each echoes the
// locale back so the client renders the right language. The locale segment
// in the URL is guaranteed valid by the locale middleware, but the parse is
// repeated here so the handlers stay total.

/// home_page
///
/// [Public Page] Data for `GET /{locale}`: the featured rail.
#[utoipa::path(
    get,
    path = "/{locale}",
    params(("locale" = String, Path, description = "UI locale (en/zh)")),
    responses((status = 200, description = "Home page data", body = HomePage))
)]
pub async fn home_page(
    State(state): State<AppState>,
    Path(locale): Path<String>,
) -> Result<Json<HomePage>, StatusCode> {
    let locale = Locale::from_segment(&locale).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(HomePage {
        locale: locale.as_str().to_string(),
        featured: state.repo.featured_games(FEATURED_RAIL_LIMIT).await,
    }))
}

/// catalog_page
///
/// [Public Page] Data for `GET /{locale}/games`, accepting the same filters
/// as the API listing.
#[utoipa::path(
    get,
    path = "/{locale}/games",
    params(("locale" = String, Path, description = "UI locale (en/zh)"), GameFilter),
    responses((status = 200, description = "Catalog page data", body = CatalogPage))
)]
pub async fn catalog_page(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    Query(filter): Query<GameFilter>,
) -> Result<Json<CatalogPage>, StatusCode> {
    let locale = Locale::from_segment(&locale).ok_or(StatusCode::NOT_FOUND)?;
    let games = state
        .repo
        .list_games(filter.genre, filter.year, filter.search)
        .await;
    Ok(Json(CatalogPage {
        locale: locale.as_str().to_string(),
        games,
    }))
}

/// game_page
///
/// [Public Page] Data for `GET /{locale}/games/{id}`: one published game plus
/// its reviews.
#[utoipa::path(
    get,
    path = "/{locale}/games/{id}",
    params(
        ("locale" = String, Path, description = "UI locale (en/zh)"),
        ("id" = Uuid, Path, description = "Game ID")
    ),
    responses(
        (status = 200, description = "Game page data", body = GamePage),
        (status = 404, description = "Not Found")
    )
)]
pub async fn game_page(
    State(state): State<AppState>,
    Path((locale, id)): Path<(String, Uuid)>,
) -> Result<Json<GamePage>, StatusCode> {
    let locale = Locale::from_segment(&locale).ok_or(StatusCode::NOT_FOUND)?;
    let game = state
        .repo
        .get_published_game(id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    let reviews = state.repo.list_reviews(id).await;
    Ok(Json(GamePage {
        locale: locale.as_str().to_string(),
        game,
        reviews,
    }))
}

/// signin_page
///
/// [Public Page] Data for `GET /{locale}/signin`. A shell; the form itself
/// is the UI layer's concern.
#[utoipa::path(
    get,
    path = "/{locale}/signin",
    params(("locale" = String, Path, description = "UI locale (en/zh)")),
    responses((status = 200, description = "Sign-in page data", body = SignInPage))
)]
pub async fn signin_page(Path(locale): Path<String>) -> Result<Json<SignInPage>, StatusCode> {
    let locale = Locale::from_segment(&locale).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(SignInPage {
        locale: locale.as_str().to_string(),
    }))
}

/// account_page
///
/// [Authenticated Page] Data for `GET /{locale}/account`: the signed-in
/// user's profile. Anonymous requests never reach this handler; the route
/// authorizer redirects them to sign-in.
#[utoipa::path(
    get,
    path = "/{locale}/account",
    params(("locale" = String, Path, description = "UI locale (en/zh)")),
    responses((status = 200, description = "Account page data", body = AccountPage))
)]
pub async fn account_page(
    CurrentUser(session): CurrentUser,
    State(state): State<AppState>,
    Path(locale): Path<String>,
) -> Result<Json<AccountPage>, StatusCode> {
    let locale = Locale::from_segment(&locale).ok_or(StatusCode::NOT_FOUND)?;
    let profile = state
        .repo
        .get_profile(session.id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(AccountPage {
        locale: locale.as_str().to_string(),
        profile,
    }))
}

/// admin_page
///
/// [Back-Office Page] Data for `GET /{locale}/admin`: dashboard stats plus
/// the moderation queue (unpublished games). Only admin sessions get here.
#[utoipa::path(
    get,
    path = "/{locale}/admin",
    params(("locale" = String, Path, description = "UI locale (en/zh)")),
    responses((status = 200, description = "Admin page data", body = AdminPage))
)]
pub async fn admin_page(
    State(state): State<AppState>,
    Path(locale): Path<String>,
) -> Result<Json<AdminPage>, StatusCode> {
    let locale = Locale::from_segment(&locale).ok_or(StatusCode::NOT_FOUND)?;
    let stats = state.repo.get_stats().await;
    let pending = state
        .repo
        .list_all_games()
        .await
        .into_iter()
        .filter(|g| !g.published)
        .collect();
    Ok(Json(AdminPage {
        locale: locale.as_str().to_string(),
        stats,
        pending,
    }))
}
