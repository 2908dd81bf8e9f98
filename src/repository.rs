use crate::identity::VerifiedIdentity;
use crate::models::{
    BackOfficeStats, CreateGameRequest, CreateReviewRequest, Game, Profile, ProfileRow, Review,
    Role, UpdateAccountRequest, UpdateGameRequest,
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

const GAME_COLUMNS: &str = "id, slug, title, summary, genre, cover_image, release_year, published, featured, created_at, updated_at";
const PROFILE_COLUMNS: &str = "id, email, username, avatar_url, role, created_at, updated_at";

/// Repository Trait
///
/// Everything the application persists, as one interface. Handlers and
/// middleware call these methods without knowing whether Postgres or a
/// test double is behind them.
///
/// The **Send + Sync** bounds (with `async_trait`) let `Arc<dyn Repository>`
/// cross Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Profiles ---
    // Read on every session materialization; the role here is authoritative.
    async fn get_profile(&self, id: Uuid) -> Option<Profile>;
    // Get-or-create after external auth success. Never touches the role column.
    async fn upsert_profile(&self, identity: &VerifiedIdentity) -> Option<Profile>;
    // Self-service partial update (username / avatar).
    async fn update_profile(&self, id: Uuid, req: UpdateAccountRequest) -> Option<Profile>;
    // Back-office user listing.
    async fn list_profiles(&self) -> Vec<Profile>;
    // Back-office role change. Takes effect on the target's next request.
    async fn set_role(&self, id: Uuid, role: Role) -> Option<Profile>;

    // --- Catalog Retrieval ---
    // Storefront listing with optional genre/year/search narrowing; drafts excluded.
    async fn list_games(
        &self,
        genre: Option<String>,
        year: Option<i32>,
        search: Option<String>,
    ) -> Vec<Game>;
    // Back-office access: retrieves all games regardless of status.
    async fn list_all_games(&self) -> Vec<Game>;
    // The curated home-page rail.
    async fn featured_games(&self, limit: i64) -> Vec<Game>;

    // Two fetch-by-id flavors; they differ in whether drafts are visible.
    async fn get_game(&self, id: Uuid) -> Option<Game>;
    async fn get_published_game(&self, id: Uuid) -> Option<Game>;

    // --- Catalog Administration ---
    async fn create_game(&self, req: CreateGameRequest) -> Option<Game>;
    // Partial update; absent fields keep their current values.
    async fn update_game(&self, id: Uuid, req: UpdateGameRequest) -> Option<Game>;
    // Changes public visibility.
    async fn set_published(&self, id: Uuid, published: bool) -> Option<Game>;
    async fn delete_game(&self, id: Uuid) -> bool;

    // --- Reviews ---
    async fn add_review(
        &self,
        game_id: Uuid,
        user_id: Uuid,
        req: CreateReviewRequest,
    ) -> Option<Review>;
    async fn list_reviews(&self, game_id: Uuid) -> Vec<Review>;

    /// Owner path: removes the review only when `user_id` wrote it.
    async fn delete_review(&self, id: i64, user_id: Uuid) -> bool;

    /// Moderation path: removes the review no matter who wrote it.
    async fn delete_review_moderated(&self, id: i64) -> bool;

    // --- Dashboard ---
    async fn get_stats(&self) -> BackOfficeStats;
}

/// RepositoryState
///
/// How the rest of the crate holds the persistence layer: a trait object
/// behind an `Arc`, cloned into every handler that needs it.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The production `Repository`, speaking to Postgres through a shared `PgPool`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Wraps an already-connected pool; no I/O happens here.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- PROFILES ---

    /// get_profile
    ///
    /// Fetches the profile-store record for one principal. The session layer
    /// calls this on every request carrying a token, so a failure here must
    /// degrade (None) rather than error the request.
    async fn get_profile(&self, id: Uuid) -> Option<Profile> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
        sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_profile error: {:?}", e);
                None
            })
            .map(Profile::from)
    }

    /// upsert_profile
    ///
    /// The local half of account creation: after the identity provider has
    /// accepted someone, this writes (or refreshes) the profile row keyed by
    /// the provider's user id.
    /// **Security**: the role column is never written here; an upsert cannot
    /// reset or elevate a role assigned in the back office.
    async fn upsert_profile(&self, identity: &VerifiedIdentity) -> Option<Profile> {
        let sql = format!(
            r#"
            INSERT INTO profiles (id, email, username, avatar_url, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'user', NOW(), NOW())
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                username = COALESCE(profiles.username, EXCLUDED.username),
                avatar_url = COALESCE(profiles.avatar_url, EXCLUDED.avatar_url),
                updated_at = NOW()
            RETURNING {PROFILE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(identity.id)
            .bind(&identity.email)
            .bind(&identity.username)
            .bind(&identity.avatar_url)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("upsert_profile error: {:?}", e);
                None
            })
            .map(Profile::from)
    }

    /// update_profile
    ///
    /// Self-service profile edit. Each column falls back to its current value
    /// through `COALESCE`, so the request may carry any subset of the fields.
    async fn update_profile(&self, id: Uuid, req: UpdateAccountRequest) -> Option<Profile> {
        let sql = format!(
            r#"
            UPDATE profiles
            SET username = COALESCE($2, username),
                avatar_url = COALESCE($3, avatar_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(id)
            .bind(req.username)
            .bind(req.avatar_url)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("update_profile error: {:?}", e);
                None
            })
            .map(Profile::from)
    }

    /// list_profiles
    ///
    /// Back-office listing of every registered account.
    async fn list_profiles(&self) -> Vec<Profile> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC");
        match sqlx::query_as::<_, ProfileRow>(&sql).fetch_all(&self.pool).await {
            Ok(rows) => rows.into_iter().map(Profile::from).collect(),
            Err(e) => {
                tracing::error!("list_profiles error: {:?}", e);
                vec![]
            }
        }
    }

    /// set_role
    ///
    /// Writes a new role. Sessions already minted keep their old token; the
    /// change takes effect on the target's next session materialization.
    async fn set_role(&self, id: Uuid, role: Role) -> Option<Profile> {
        let sql = format!(
            "UPDATE profiles SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {PROFILE_COLUMNS}"
        );
        sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("set_role error: {:?}", e);
                None
            })
            .map(Profile::from)
    }

    // --- CATALOG RETRIEVAL ---

    /// list_games
    ///
    /// Grows the storefront query clause by clause with `QueryBuilder`, binding
    /// every user-supplied value so none of it is ever spliced into the SQL text.
    /// **Security**: the base query pins `WHERE published = true`; the optional
    /// genre, year and search filters can only narrow that set.
    async fn list_games(
        &self,
        genre: Option<String>,
        year: Option<i32>,
        search: Option<String>,
    ) -> Vec<Game> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"
            SELECT
                id, slug, title, summary, genre,
                cover_image, release_year, published, featured,
                created_at, updated_at
            FROM games
            WHERE published = true
            "#,
        );

        if let Some(g) = genre {
            builder.push(" AND genre = ");
            builder.push_bind(g);
        }

        if let Some(y) = year {
            builder.push(" AND release_year = ");
            builder.push_bind(y);
        }

        if let Some(s) = search {
            // ILIKE so the match ignores case in both title and summary.
            let search_pattern = format!("%{}%", s);
            builder.push(" AND (title ILIKE ");
            builder.push_bind(search_pattern.clone());
            builder.push(" OR summary ILIKE ");
            builder.push_bind(search_pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC");

        let query = builder.build_query_as::<Game>();

        match query.fetch_all(&self.pool).await {
            Ok(g) => g,
            Err(e) => {
                tracing::error!("list_games error: {:?}", e);
                vec![]
            }
        }
    }

    /// list_all_games
    ///
    /// Back-office listing; drafts are in scope and sort ahead of released
    /// titles.
    async fn list_all_games(&self) -> Vec<Game> {
        let sql = format!(
            "SELECT {GAME_COLUMNS} FROM games ORDER BY published ASC, created_at DESC"
        );
        match sqlx::query_as::<_, Game>(&sql).fetch_all(&self.pool).await {
            Ok(g) => g,
            Err(e) => {
                tracing::error!("list_all_games error: {:?}", e);
                vec![]
            }
        }
    }

    /// featured_games
    ///
    /// Retrieves the curated home-page rail.
    /// **Security**: Enforces `published = true`; featuring never leaks a draft.
    async fn featured_games(&self, limit: i64) -> Vec<Game> {
        let sql = format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE published = true AND featured = true ORDER BY updated_at DESC LIMIT $1"
        );
        match sqlx::query_as::<_, Game>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        {
            Ok(g) => g,
            Err(e) => {
                tracing::error!("featured_games error: {:?}", e);
                vec![]
            }
        }
    }

    /// get_game
    ///
    /// Fetch by id with no published filter. Back-office paths use this once
    /// the route authorizer has already let the request through.
    async fn get_game(&self, id: Uuid) -> Option<Game> {
        let sql = format!("SELECT {GAME_COLUMNS} FROM games WHERE id = $1");
        sqlx::query_as::<_, Game>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_game error: {:?}", e);
                None
            })
    }

    /// get_published_game
    ///
    /// Fetch by id, but a draft comes back as `None` just like a missing row.
    /// The storefront detail page and the review submission path both go
    /// through here.
    async fn get_published_game(&self, id: Uuid) -> Option<Game> {
        let sql = format!("SELECT {GAME_COLUMNS} FROM games WHERE id = $1 AND published = true");
        sqlx::query_as::<_, Game>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_published_game error: {:?}", e);
                None
            })
    }

    // --- CATALOG ADMINISTRATION ---

    /// create_game
    ///
    /// Inserts a new catalog entry. All new games start `published = false`,
    /// so releasing to the public is an explicit second step.
    async fn create_game(&self, req: CreateGameRequest) -> Option<Game> {
        let new_id = Uuid::new_v4();
        let sql = format!(
            r#"
            INSERT INTO games (id, slug, title, summary, genre, cover_image, release_year, published, featured, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, false, false, NOW(), NOW())
            RETURNING {GAME_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Game>(&sql)
            .bind(new_id)
            .bind(req.slug)
            .bind(req.title)
            .bind(req.summary)
            .bind(req.genre)
            .bind(req.cover_image_key)
            .bind(req.release_year)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                // Includes unique-slug violations; the handler maps None to a 500.
                tracing::error!("create_game error: {:?}", e);
            })
            .ok()
    }

    /// update_game
    ///
    /// Partial update via `COALESCE`; absent fields keep their current value.
    async fn update_game(&self, id: Uuid, req: UpdateGameRequest) -> Option<Game> {
        let sql = format!(
            r#"
            UPDATE games
            SET title = COALESCE($2, title),
                summary = COALESCE($3, summary),
                genre = COALESCE($4, genre),
                release_year = COALESCE($5, release_year),
                cover_image = COALESCE($6, cover_image),
                featured = COALESCE($7, featured),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {GAME_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Game>(&sql)
            .bind(id)
            .bind(req.title)
            .bind(req.summary)
            .bind(req.genre)
            .bind(req.release_year)
            .bind(req.cover_image_key)
            .bind(req.featured)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("update_game error: {:?}", e);
                None
            })
    }

    /// set_published
    ///
    /// Flips the visibility flag. Used by the back-office publish handler.
    async fn set_published(&self, id: Uuid, published: bool) -> Option<Game> {
        let sql = format!(
            "UPDATE games SET published = $2, updated_at = NOW() WHERE id = $1 RETURNING {GAME_COLUMNS}"
        );
        sqlx::query_as::<_, Game>(&sql)
            .bind(id)
            .bind(published)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("set_published error: {:?}", e);
                None
            })
    }

    /// delete_game
    ///
    /// Removes a catalog entry; review rows cascade at the schema level.
    async fn delete_game(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM games WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_game error: {:?}", e);
                false
            }
        }
    }

    // --- REVIEWS ---

    /// add_review
    ///
    /// Inserts the review and resolves the author's username in the same
    /// statement, so the caller gets a response-ready `Review` straight back.
    async fn add_review(
        &self,
        game_id: Uuid,
        user_id: Uuid,
        req: CreateReviewRequest,
    ) -> Option<Review> {
        // The CTE keeps the INSERT and the username lookup to one round trip.
        let sql = r#"
            WITH inserted AS (
                INSERT INTO reviews (game_id, user_id, rating, body) VALUES ($1, $2, $3, $4)
                RETURNING id, game_id, user_id, rating, body, created_at
            )
            SELECT i.id, i.game_id, i.user_id, i.rating, i.body, i.created_at, p.username as author_username
            FROM inserted i JOIN profiles p ON i.user_id = p.id
        "#;
        sqlx::query_as::<_, Review>(sql)
            .bind(game_id)
            .bind(user_id)
            .bind(req.rating)
            .bind(req.body)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("add_review error: {:?}", e);
            })
            .ok()
    }

    /// list_reviews
    ///
    /// Reviews for one game, newest first. The join against `games` keeps
    /// reviews of unpublished titles out of public responses even when the
    /// review rows themselves exist.
    async fn list_reviews(&self, game_id: Uuid) -> Vec<Review> {
        let sql = r#"
            SELECT
                r.id, r.game_id, r.user_id, r.rating, r.body, r.created_at,
                p.username as author_username
            FROM reviews r
            JOIN profiles p ON r.user_id = p.id
            JOIN games g ON r.game_id = g.id
            WHERE r.game_id = $1 AND g.published = true
            ORDER BY r.created_at DESC
        "#;
        sqlx::query_as::<_, Review>(sql)
            .bind(game_id)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_default()
    }

    /// delete_review
    ///
    /// **Owner-Only**: the author id rides in the `WHERE` clause, so someone
    /// else's delete matches zero rows and comes back `false`.
    async fn delete_review(&self, id: i64, user_id: Uuid) -> bool {
        match sqlx::query("DELETE FROM reviews WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_review error: {:?}", e);
                false
            }
        }
    }

    /// delete_review_moderated
    ///
    /// **Moderation Override**: only the review id matters here; the back
    /// office may take down anyone's review.
    async fn delete_review_moderated(&self, id: i64) -> bool {
        match sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_review_moderated error: {:?}", e);
                false
            }
        }
    }

    // --- DASHBOARD ---

    /// get_stats
    ///
    /// One round of COUNT queries feeding the back-office dashboard tiles.
    async fn get_stats(&self) -> BackOfficeStats {
        let total_games = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM games")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);
        let total_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);
        let total_reviews = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);
        let unpublished_games =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM games WHERE published = false")
                .fetch_one(&self.pool)
                .await
                .unwrap_or(0);
        BackOfficeStats {
            total_games,
            total_users,
            total_reviews,
            unpublished_games,
        }
    }
}
