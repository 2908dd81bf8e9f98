use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity & Authorization Schemas ---

/// Role
///
/// The enumerated access level stored per profile. This is the single source
/// for every authorization decision in the application; nothing compares raw
/// role strings outside this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    /// Standard account: browse the catalog, manage their own reviews.
    #[default]
    User,
    /// Full back-office access.
    Admin,
    /// May remove any review, but has no back-office access.
    Moderator,
}

impl Role {
    /// Parses the profile-store text representation. Unknown values collapse
    /// to `User` so a corrupted row can never widen privileges.
    pub fn parse(s: &str) -> Role {
        match s {
            "admin" => Role::Admin,
            "moderator" => Role::Moderator,
            _ => Role::User,
        }
    }

    /// The text representation persisted in the profile store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Moderator => "moderator",
        }
    }

    /// Whether this role may remove other users' reviews.
    pub fn can_moderate(&self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }
}

/// Principal
///
/// The normalized identity produced by a successful credential check or OAuth
/// callback: remote identity attributes plus the profile-store role. The
/// authorization flow never mutates it; role changes happen in the profile
/// store and surface on the next session materialization.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Principal {
    /// The unique identifier, shared with the identity provider's user record.
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub email_verified: bool,
}

/// ProfileRow
///
/// What sqlx reads out of the `profiles` table, before any interpretation.
/// The role column is plain text here; lifting the row into `Profile`
/// parses it into the `Role` enum.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile
///
/// The profile-store record for one principal id: role, username, avatar.
/// Re-read on every session materialization; this is where role changes
/// made in the back office take effect without a re-login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            email: row.email,
            username: row.username,
            avatar_url: row.avatar_url,
            role: Role::parse(&row.role),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// --- Catalog Schemas (Mapped to Database) ---

/// Game
///
/// A catalog entry from the `games` table. Only rows with `published = true`
/// are visible on the public surface; the back office sees everything.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Game {
    pub id: Uuid,
    /// URL-stable identifier used by the page routes (e.g. "hollow-knight").
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub genre: String,
    /// Object-store key of the cover art, set after the presigned upload flow.
    pub cover_image: Option<String>,
    pub release_year: i32,
    // Only published games exist on the public surface; every public
    // repository query filters on this.
    pub published: bool,
    // Curated home-page rail, toggled in the back office.
    pub featured: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Review
///
/// One row of `reviews` plus the author's username, which the repository
/// joins in so responses never need a second lookup. Publicly listed only
/// for published games.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Review {
    // BIGSERIAL; reviews arrive in volumes a plain serial would outgrow.
    pub id: i64,
    pub game_id: Uuid,
    pub user_id: Uuid,
    /// 1–5 stars, validated at the handler boundary.
    pub rating: i32,
    pub body: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // Not a reviews column; the repository joins it in from profiles.
    #[sqlx(default)]
    pub author_username: Option<String>,
}

// --- Request Payloads ---

/// SignInRequest
///
/// Input payload for the credential sign-in endpoint (POST /api/auth/signin).
/// The password goes straight to the identity provider; this application
/// neither stores nor logs it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// RegisterRequest
///
/// Input payload for open sign-up (POST /api/auth/register).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
}

/// OAuthCallbackRequest
///
/// Input payload for the OAuth completion endpoint (POST /api/auth/callback).
/// The authorization code is exchanged with the identity provider; the
/// provider integration internals live behind the IdentityProvider trait.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OAuthCallbackRequest {
    /// Provider id as configured at the identity provider (e.g. "google").
    pub provider: String,
    pub code: String,
}

/// UpdateAccountRequest
///
/// Partial update payload for the caller's own profile
/// (PATCH /api/account). Every field is an `Option` with
/// `skip_serializing_if`, so an omitted field neither appears on the wire
/// nor overwrites anything.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateAccountRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// CreateGameRequest
///
/// Input payload for creating a catalog entry (POST /api/admin/games).
/// New games start unpublished; publication is a separate moderation step.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateGameRequest {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub genre: String,
    pub release_year: i32,
    /// Object-store key from the presigned cover upload flow.
    pub cover_image_key: Option<String>,
}

/// UpdateGameRequest
///
/// Partial update payload for a catalog entry
/// (PUT /api/admin/games/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateGameRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
}

/// CreateReviewRequest
///
/// Input payload for a new review (POST /api/reviews/{game_id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateReviewRequest {
    pub rating: i32,
    pub body: String,
}

/// SetRoleRequest
///
/// Input payload for the back-office role change endpoint
/// (PUT /api/admin/users/{id}/role).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// CoverUploadRequest
///
/// Input payload for a cover-art upload URL (POST /api/admin/uploads/cover).
/// Both fields end up baked into the presigned URL as constraints.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct CoverUploadRequest {
    /// Filename as the admin picked it; its extension survives into the key.
    #[schema(example = "cover.webp")]
    pub filename: String,
    /// Declared MIME type. Must be an image, and the signed URL holds the
    /// upload to it.
    #[schema(example = "image/webp")]
    pub file_type: String,
}

/// CoverUploadResponse
///
/// What the back office gets back: a presigned URL the browser PUTs the
/// file to, and the key under which the object will exist afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct CoverUploadResponse {
    /// Where to PUT the file, valid for a few minutes.
    pub upload_url: String,
    /// The key the object will live under; stored on the game row as
    /// `cover_image`.
    pub resource_key: String,
}

// --- Session & Dashboard Schemas (Output) ---

/// SessionUser
///
/// The user payload inside a session response: the enriched (profile-fresh)
/// view of the signed-in principal.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
}

/// SessionResponse
///
/// Output schema for sign-in and the session probe endpoint
/// (GET /api/auth/session). The probe returns `null` for anonymous requests.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SessionResponse {
    pub user: SessionUser,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
}

/// BackOfficeStats
///
/// Output schema for the back-office dashboard (GET /api/admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BackOfficeStats {
    pub total_games: i64,
    pub total_users: i64,
    pub total_reviews: i64,
    /// Catalog entries still waiting on `published`.
    pub unpublished_games: i64,
}

// --- Page Data Schemas (Output) ---
//
// The UI rendering layer is an external collaborator; the locale-prefixed
// page routes serve it the data each page needs.

/// HomePage
///
/// Data for `GET /{locale}`: the curated featured rail.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct HomePage {
    pub locale: String,
    pub featured: Vec<Game>,
}

/// CatalogPage
///
/// Data for `GET /{locale}/games`: the filtered public listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CatalogPage {
    pub locale: String,
    pub games: Vec<Game>,
}

/// GamePage
///
/// Data for `GET /{locale}/games/{id}`: one published game plus its reviews.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct GamePage {
    pub locale: String,
    pub game: Game,
    pub reviews: Vec<Review>,
}

/// SignInPage
///
/// Data for `GET /{locale}/signin`: a shell; the form itself is the UI
/// layer's concern.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignInPage {
    pub locale: String,
}

/// AccountPage
///
/// Data for `GET /{locale}/account`: the signed-in user's profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AccountPage {
    pub locale: String,
    pub profile: Profile,
}

/// AdminPage
///
/// Data for `GET /{locale}/admin`: dashboard stats plus the moderation queue
/// (unpublished games).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminPage {
    pub locale: String,
    pub stats: BackOfficeStats,
    pub pending: Vec<Game>,
}
