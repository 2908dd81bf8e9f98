use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use ludex::{
    AppState, create_router,
    auth::{Claims, SESSION_COOKIE, mint_session_token},
    config::AppConfig,
    identity::{IdentityState, MockIdentityProvider, VerifiedIdentity},
    models::{
        BackOfficeStats, CoverUploadRequest, CoverUploadResponse, CreateGameRequest,
        CreateReviewRequest, Game, Profile, Review, Role, SessionResponse, UpdateAccountRequest,
        UpdateGameRequest,
    },
    repository::{Repository, RepositoryState},
    storage::MockMediaStorage,
    verifier::CredentialVerifier,
};
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

// Full-stack tests: requests travel the real router, including the locale,
// session, and authorization layers, against stubbed backends. Each request
// goes through `oneshot` so redirects come back raw instead of being
// followed.

/// Stub repository. `profile_role` controls what any profile lookup returns;
/// `None` makes every lookup miss, which is how anonymous and missing-profile
/// paths are exercised.
struct StubRepository {
    profile_role: Option<Role>,
}

impl StubRepository {
    fn with_role(role: Role) -> Self {
        StubRepository {
            profile_role: Some(role),
        }
    }

    fn empty() -> Self {
        StubRepository { profile_role: None }
    }

    fn profile_for(&self, id: Uuid) -> Option<Profile> {
        self.profile_role.map(|role| Profile {
            id,
            email: "player@example.com".to_string(),
            username: Some("player".to_string()),
            avatar_url: None,
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }
}

#[async_trait]
impl Repository for StubRepository {
    async fn get_profile(&self, id: Uuid) -> Option<Profile> {
        self.profile_for(id)
    }
    async fn upsert_profile(&self, identity: &VerifiedIdentity) -> Option<Profile> {
        Some(Profile {
            id: identity.id,
            email: identity.email.clone(),
            username: identity.username.clone(),
            avatar_url: None,
            role: Role::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }
    async fn update_profile(&self, id: Uuid, _req: UpdateAccountRequest) -> Option<Profile> {
        self.profile_for(id)
    }
    async fn list_profiles(&self) -> Vec<Profile> {
        vec![]
    }
    async fn set_role(&self, id: Uuid, _role: Role) -> Option<Profile> {
        self.profile_for(id)
    }
    async fn list_games(
        &self,
        _genre: Option<String>,
        _year: Option<i32>,
        _search: Option<String>,
    ) -> Vec<Game> {
        vec![]
    }
    async fn list_all_games(&self) -> Vec<Game> {
        vec![]
    }
    async fn featured_games(&self, _limit: i64) -> Vec<Game> {
        vec![]
    }
    async fn get_game(&self, _id: Uuid) -> Option<Game> {
        None
    }
    async fn get_published_game(&self, _id: Uuid) -> Option<Game> {
        None
    }
    async fn create_game(&self, _req: CreateGameRequest) -> Option<Game> {
        None
    }
    async fn update_game(&self, _id: Uuid, _req: UpdateGameRequest) -> Option<Game> {
        None
    }
    async fn set_published(&self, _id: Uuid, _published: bool) -> Option<Game> {
        None
    }
    async fn delete_game(&self, _id: Uuid) -> bool {
        false
    }
    async fn add_review(
        &self,
        _game_id: Uuid,
        _user_id: Uuid,
        _req: CreateReviewRequest,
    ) -> Option<Review> {
        None
    }
    async fn list_reviews(&self, _game_id: Uuid) -> Vec<Review> {
        vec![]
    }
    async fn delete_review(&self, _id: i64, _user_id: Uuid) -> bool {
        false
    }
    async fn delete_review_moderated(&self, _id: i64) -> bool {
        false
    }
    async fn get_stats(&self) -> BackOfficeStats {
        BackOfficeStats::default()
    }
}

fn test_state(repo: StubRepository, identity: MockIdentityProvider) -> AppState {
    let repo: RepositoryState = Arc::new(repo);
    let identity: IdentityState = Arc::new(identity);
    let verifier = Arc::new(CredentialVerifier::new(identity.clone(), repo.clone()));

    AppState {
        repo,
        identity,
        verifier,
        media: Arc::new(MockMediaStorage::new()),
        config: AppConfig::default(),
    }
}

fn app(repo: StubRepository) -> Router {
    create_router(test_state(repo, MockIdentityProvider::new()))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn location_of(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("expected a Location header")
        .to_str()
        .unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- Health and Docs ---

#[tokio::test]
async fn test_health_check() {
    let response = app(StubRepository::empty())
        .oneshot(get("/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let response = app(StubRepository::empty())
        .oneshot(get("/api-docs/openapi.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// --- Locale Routing ---

#[tokio::test]
async fn test_root_redirects_to_default_locale() {
    let response = app(StubRepository::empty()).oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location_of(&response), "/en");
}

#[tokio::test]
async fn test_locale_redirect_preserves_the_query_string() {
    let response = app(StubRepository::empty())
        .oneshot(get("/games?year=2003"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location_of(&response), "/en/games?year=2003");
}

#[tokio::test]
async fn test_api_paths_are_exempt_from_locale_redirects() {
    let response = app(StubRepository::empty())
        .oneshot(get("/api/games"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_first_segments_redirect_once_then_404() {
    // "/fr" is not a supported locale, so it is treated as a page path and
    // prefixed. The redirected URI carries a locale, so no second redirect
    // can occur; it just fails to match a route.
    let app = app(StubRepository::empty());

    let response = app.clone().oneshot(get("/fr")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location_of(&response), "/en/fr");

    let response = app.oneshot(get("/en/fr")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- Access Control Through the Full Chain ---

#[tokio::test]
async fn test_account_page_redirects_anonymous_visitors() {
    let response = app(StubRepository::empty())
        .oneshot(get("/en/account"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location_of(&response), "/en/signin");
}

#[tokio::test]
async fn test_admin_api_redirects_anonymous_clients() {
    let response = app(StubRepository::empty())
        .oneshot(get("/api/admin/stats"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    // API paths carry no locale, so the redirect target is bare.
    assert_eq!(location_of(&response), "/signin");
}

#[tokio::test]
async fn test_local_bypass_still_respects_roles() {
    let user_id = Uuid::new_v4();

    // A plain user through the dev bypass is treated like any signed-in
    // user: the back office stays closed.
    let request = Request::builder()
        .method(Method::GET)
        .uri("/en/admin")
        .header("x-user-id", user_id.to_string())
        .body(Body::empty())
        .unwrap();
    let response = app(StubRepository::with_role(Role::User))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location_of(&response), "/en/signin");

    // An admin profile opens it.
    let request = Request::builder()
        .method(Method::GET)
        .uri("/en/admin")
        .header("x-user-id", user_id.to_string())
        .body(Body::empty())
        .unwrap();
    let response = app(StubRepository::with_role(Role::Admin))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cover_upload_guarded_by_the_admin_prefix() {
    let user_id = Uuid::new_v4();
    let payload = CoverUploadRequest {
        filename: "cover.webp".to_string(),
        file_type: "image/webp".to_string(),
    };

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/admin/uploads/cover")
        .header("x-user-id", user_id.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();
    let response = app(StubRepository::with_role(Role::Admin))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let upload: CoverUploadResponse = body_json(response).await;
    assert!(upload.upload_url.contains("signature=fake"));
    assert!(upload.resource_key.starts_with("covers/"));

    // The same request from a plain user never reaches the handler.
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/admin/uploads/cover")
        .header("x-user-id", user_id.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();
    let response = app(StubRepository::with_role(Role::User))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

// --- Session Lifecycle Over HTTP ---

#[tokio::test]
async fn test_sign_in_rejects_unknown_accounts() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/signin")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({"email": "ghost@example.com", "password": "nope"}).to_string(),
        ))
        .unwrap();
    let response = app(StubRepository::empty())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"sign-in failed");
}

#[tokio::test]
async fn test_cookie_session_round_trip() {
    let account_id = Uuid::new_v4();
    let identity =
        MockIdentityProvider::new().with_account(account_id, "gamer@example.com", "hunter2");
    let app = create_router(test_state(StubRepository::with_role(Role::User), identity));

    // Sign in and capture the session cookie.
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/signin")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({"email": "gamer@example.com", "password": "hunter2"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("sign-in should set the session cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("ludex_session="));

    let cookie_pair = set_cookie.split(';').next().unwrap().to_string();

    // Replay the cookie against the session probe.
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/auth/session")
        .header(header::COOKIE, cookie_pair)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let session: Option<SessionResponse> = body_json(response).await;
    let session = session.expect("cookie should authenticate the probe");
    assert_eq!(session.user.id, account_id);
}

#[tokio::test]
async fn test_admin_cookie_flow_reaches_the_back_office() {
    let account_id = Uuid::new_v4();
    let identity =
        MockIdentityProvider::new().with_account(account_id, "curator@example.com", "hunter2");
    let app = create_router(test_state(StubRepository::with_role(Role::Admin), identity));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/signin")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({"email": "curator@example.com", "password": "hunter2"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie_pair = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("sign-in should set the session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    // The cookie alone carries the admin through the back-office gate.
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/admin/stats")
        .header(header::COOKIE, cookie_pair)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stats: BackOfficeStats = body_json(response).await;
    assert_eq!(stats.total_games, 0);
}

#[tokio::test]
async fn test_sign_out_clears_the_session_cookie() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/signout")
        .body(Body::empty())
        .unwrap();
    let response = app(StubRepository::empty())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("sign-out should clear the cookie")
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with(&format!("{}=", SESSION_COOKIE)));
}

#[tokio::test]
async fn test_bearer_tokens_authenticate_api_clients() {
    let user_id = Uuid::new_v4();
    let config = AppConfig::default();
    let token = mint_session_token(user_id, "player@example.com", Role::User, &config).unwrap();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/account")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app(StubRepository::with_role(Role::User))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let profile: Profile = body_json(response).await;
    assert_eq!(profile.id, user_id);
}

#[tokio::test]
async fn test_stale_admin_tokens_cannot_open_the_back_office() {
    // The token still says admin, but the profile store has since demoted
    // the account. The enriched role wins and the gate closes.
    let user_id = Uuid::new_v4();
    let config = AppConfig::default();
    let token = mint_session_token(user_id, "player@example.com", Role::Admin, &config).unwrap();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/admin/stats")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app(StubRepository::with_role(Role::User))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location_of(&response), "/signin");
}

#[tokio::test]
async fn test_garbage_cookies_degrade_to_anonymous() {
    // Public reads still work.
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/games")
        .header(header::COOKIE, format!("{}=not-a-token", SESSION_COOKIE))
        .body(Body::empty())
        .unwrap();
    let response = app(StubRepository::empty())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Protected reads treat the request as anonymous, not as an error.
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/account")
        .header(header::COOKIE, format!("{}=not-a-token", SESSION_COOKIE))
        .body(Body::empty())
        .unwrap();
    let response = app(StubRepository::empty())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location_of(&response), "/signin");
}

// --- Sliding Refresh ---

fn aged_token(user_id: Uuid, issued_secs_ago: i64, config: &AppConfig) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        email: "player@example.com".to_string(),
        role: Role::User,
        iat: (now - issued_secs_ago) as usize,
        exp: (now + 24 * 60 * 60) as usize,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_old_cookie_sessions_are_reissued() {
    let user_id = Uuid::new_v4();
    let config = AppConfig::default();
    // Issued six days ago: well past the half-life of the seven-day TTL.
    let token = aged_token(user_id, 6 * 24 * 60 * 60, &config);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/auth/session")
        .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
        .body(Body::empty())
        .unwrap();
    let response = app(StubRepository::with_role(Role::User))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("an aged cookie session should be re-minted")
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with(&format!("{}=", SESSION_COOKIE)));
    // The re-minted token is a fresh signature, not the one we sent.
    assert!(!set_cookie.contains(&token));
}

#[tokio::test]
async fn test_fresh_cookie_sessions_are_left_alone() {
    let user_id = Uuid::new_v4();
    let config = AppConfig::default();
    let token = aged_token(user_id, 0, &config);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/auth/session")
        .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
        .body(Body::empty())
        .unwrap();
    let response = app(StubRepository::with_role(Role::User))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_bearer_sessions_are_never_reissued() {
    // Bearer clients manage their own tokens; even an aged one comes back
    // without a Set-Cookie.
    let user_id = Uuid::new_v4();
    let config = AppConfig::default();
    let token = aged_token(user_id, 6 * 24 * 60 * 60, &config);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/auth/session")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app(StubRepository::with_role(Role::User))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}
