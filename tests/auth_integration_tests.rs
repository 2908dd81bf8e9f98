use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, request::Parts},
};
use axum_extra::extract::cookie::SameSite;
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use ludex::{
    AppState,
    auth::{
        Claims, CurrentUser, SESSION_COOKIE, clear_session_cookie, decode_session_token, enrich,
        mint_session_token, session_cookie,
    },
    config::{AppConfig, Env},
    identity::{MockIdentityProvider, VerifiedIdentity},
    models::{
        BackOfficeStats, CreateGameRequest, CreateReviewRequest, Game, Profile, Review, Role,
        UpdateAccountRequest, UpdateGameRequest,
    },
    repository::{Repository, RepositoryState},
    storage::MockMediaStorage,
    verifier::CredentialVerifier,
};
use std::sync::Arc;
use uuid::Uuid;

// --- Mock Repository for Session Logic ---

#[derive(Default)]
struct MockAuthRepo {
    profile_to_return: Option<Profile>,
}

#[async_trait]
impl Repository for MockAuthRepo {
    async fn get_profile(&self, _id: Uuid) -> Option<Profile> {
        self.profile_to_return.clone()
    }
    // The session layer only reads profiles; everything else is inert filler.
    async fn upsert_profile(&self, _identity: &VerifiedIdentity) -> Option<Profile> {
        self.profile_to_return.clone()
    }
    async fn update_profile(&self, _id: Uuid, _req: UpdateAccountRequest) -> Option<Profile> {
        None
    }
    async fn list_profiles(&self) -> Vec<Profile> {
        vec![]
    }
    async fn set_role(&self, _id: Uuid, _role: Role) -> Option<Profile> {
        None
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

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

fn test_config(env: Env, jwt_secret: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.env = env;
    config.jwt_secret = jwt_secret.to_string();
    config
}

fn test_profile(id: Uuid, role: Role) -> Profile {
    Profile {
        id,
        email: "profile@example.com".to_string(),
        username: Some("tester".to_string()),
        avatar_url: None,
        role,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Signs arbitrary claims with the test secret, for expiry and tamper cases
/// that `mint_session_token` would never produce itself.
fn create_token(user_id: Uuid, role: Role, iat: i64, exp: i64) -> String {
    let claims = Claims {
        sub: user_id,
        email: "token@example.com".to_string(),
        role,
        iat: iat as usize,
        exp: exp as usize,
    };
    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(env: Env, repo: MockAuthRepo, jwt_secret: &str) -> AppState {
    let repo: RepositoryState = Arc::new(repo);
    let identity = Arc::new(MockIdentityProvider::new());
    let verifier = Arc::new(CredentialVerifier::new(identity.clone(), repo.clone()));

    AppState {
        repo,
        identity,
        verifier,
        media: Arc::new(MockMediaStorage::new()),
        config: test_config(env, jwt_secret),
    }
}

/// Builds a bodyless request and hands back just its `Parts`.
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

// --- Token Tests ---

#[tokio::test]
async fn test_token_round_trip() {
    let config = test_config(Env::Local, TEST_JWT_SECRET);
    let token = mint_session_token(TEST_USER_ID, "mint@example.com", Role::Moderator, &config)
        .expect("minting should succeed");

    let claims = decode_session_token(&token, &config).expect("token should decode");
    assert_eq!(claims.sub, TEST_USER_ID);
    assert_eq!(claims.email, "mint@example.com");
    assert_eq!(claims.role, Role::Moderator);

    // exp should land one full TTL after iat.
    assert_eq!(
        claims.exp - claims.iat,
        config.session_ttl_secs as usize,
        "token lifetime should equal the configured TTL"
    );
}

#[tokio::test]
async fn test_decode_rejects_wrong_secret() {
    let config = test_config(Env::Local, TEST_JWT_SECRET);
    let token = mint_session_token(TEST_USER_ID, "mint@example.com", Role::User, &config).unwrap();

    let other = test_config(Env::Local, "a-totally-different-secret");
    assert!(decode_session_token(&token, &other).is_none());
}

#[tokio::test]
async fn test_decode_rejects_expired_token() {
    let now = Utc::now().timestamp();
    // Expired an hour ago, comfortably past any validation leeway.
    let token = create_token(TEST_USER_ID, Role::User, now - 7200, now - 3600);

    let config = test_config(Env::Local, TEST_JWT_SECRET);
    assert!(decode_session_token(&token, &config).is_none());
}

#[tokio::test]
async fn test_decode_rejects_garbage() {
    let config = test_config(Env::Local, TEST_JWT_SECRET);
    assert!(decode_session_token("not-a-jwt-at-all", &config).is_none());
    assert!(decode_session_token("", &config).is_none());
}

// --- Enrichment Tests ---

#[tokio::test]
async fn test_enrichment_prefers_the_fresh_profile_role() {
    // Token says User; the profile store has since promoted them to Admin.
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: TEST_USER_ID,
        email: "token@example.com".to_string(),
        role: Role::User,
        iat: now as usize,
        exp: (now + 3600) as usize,
    };

    let repo: RepositoryState = Arc::new(MockAuthRepo {
        profile_to_return: Some(test_profile(TEST_USER_ID, Role::Admin)),
    });

    let session = enrich(&claims, &repo).await;
    assert_eq!(session.role, Role::Admin, "fresh role must win");
    assert_eq!(session.token_role, Role::User, "snapshot kept for diagnostics");
    assert_eq!(session.username.as_deref(), Some("tester"));
    assert_eq!(session.email, "profile@example.com");
}

#[tokio::test]
async fn test_enrichment_demotes_stale_admin_tokens() {
    // Token says Admin; the profile store has since revoked that.
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: TEST_USER_ID,
        email: "token@example.com".to_string(),
        role: Role::Admin,
        iat: now as usize,
        exp: (now + 3600) as usize,
    };

    let repo: RepositoryState = Arc::new(MockAuthRepo {
        profile_to_return: Some(test_profile(TEST_USER_ID, Role::User)),
    });

    let session = enrich(&claims, &repo).await;
    assert_eq!(session.role, Role::User);
    assert_eq!(session.token_role, Role::Admin);
}

#[tokio::test]
async fn test_enrichment_fails_closed_when_the_profile_is_missing() {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: TEST_USER_ID,
        email: "token@example.com".to_string(),
        role: Role::Admin,
        iat: now as usize,
        exp: (now + 3600) as usize,
    };

    let repo: RepositoryState = Arc::new(MockAuthRepo {
        profile_to_return: None,
    });

    let session = enrich(&claims, &repo).await;
    // Still a session (the token is valid), but never more than User.
    assert_eq!(session.id, TEST_USER_ID);
    assert_eq!(session.email, "token@example.com");
    assert_eq!(session.role, Role::User);
    assert_eq!(session.expires_at.timestamp(), (now + 3600));
}

// --- Extractor Tests ---

#[tokio::test]
async fn test_current_user_reads_the_materialized_session() {
    let app_state = create_app_state(Env::Local, MockAuthRepo::default(), TEST_JWT_SECRET);

    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: TEST_USER_ID,
        email: "token@example.com".to_string(),
        role: Role::User,
        iat: now as usize,
        exp: (now + 3600) as usize,
    };
    let repo: RepositoryState = Arc::new(MockAuthRepo {
        profile_to_return: Some(test_profile(TEST_USER_ID, Role::User)),
    });
    let session = enrich(&claims, &repo).await;

    let mut parts = get_request_parts(Method::GET, "/api/account".parse().unwrap());
    parts.extensions.insert(session);

    let current = CurrentUser::from_request_parts(&mut parts, &app_state).await;
    assert!(current.is_ok());
    assert_eq!(current.unwrap().0.id, TEST_USER_ID);
}

#[tokio::test]
async fn test_current_user_rejects_anonymous_requests() {
    let app_state = create_app_state(Env::Local, MockAuthRepo::default(), TEST_JWT_SECRET);

    let mut parts = get_request_parts(Method::GET, "/api/account".parse().unwrap());

    let current = CurrentUser::from_request_parts(&mut parts, &app_state).await;
    assert!(current.is_err());
    assert_eq!(current.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_optional_current_user_never_rejects() {
    use axum::extract::OptionalFromRequestParts;

    let app_state = create_app_state(Env::Local, MockAuthRepo::default(), TEST_JWT_SECRET);

    let mut parts = get_request_parts(Method::GET, "/api/auth/session".parse().unwrap());
    let current = <CurrentUser as OptionalFromRequestParts<AppState>>::from_request_parts(
        &mut parts, &app_state,
    )
    .await;

    assert!(matches!(current, Ok(None)));
}

// --- Cookie Tests ---

#[tokio::test]
async fn test_session_cookie_is_locked_down() {
    let config = test_config(Env::Local, TEST_JWT_SECRET);
    let cookie = session_cookie("token-value".to_string(), &config);

    assert_eq!(cookie.name(), SESSION_COOKIE);
    assert_eq!(cookie.value(), "token-value");
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    // Local development runs over plain http.
    assert_ne!(cookie.secure(), Some(true));
}

#[tokio::test]
async fn test_session_cookie_is_secure_in_production() {
    let config = test_config(Env::Production, TEST_JWT_SECRET);
    let cookie = session_cookie("token-value".to_string(), &config);
    assert_eq!(cookie.secure(), Some(true));
}

#[tokio::test]
async fn test_clear_cookie_targets_the_session_cookie() {
    let cookie = clear_session_cookie();
    assert_eq!(cookie.name(), SESSION_COOKIE);
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.path(), Some("/"));
}
