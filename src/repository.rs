use crate::models::{
    AdminDashboardStats, Category, Event, EventDraft, NewUser, Role, User,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, PgPool};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

/// RepoError
///
/// Persistence failures, already classified for the HTTP layer. Constraint violations
/// become `Conflict`/`InvalidReference`/`HasDependents`; anything else stays `Database`.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidReference(String),
    #[error("{0}")]
    HasDependents(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// The persistence collaborator as the rest of the application sees it: a record store
/// with simple create/read/update/delete operations, each atomic on its own.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across handlers.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Cheap connectivity probe for the admin dashboard.
    async fn ping(&self) -> Result<(), RepoError>;

    // --- Users ---
    // `email` must already be normalized (see `models::normalize_email`).
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;

    // --- Events ---
    // Listings are ordered by start time, soonest first.
    async fn list_events(&self, category_slug: Option<&str>) -> Result<Vec<Event>, RepoError>;
    async fn list_events_by_organizer(&self, organizer_id: Uuid) -> Result<Vec<Event>, RepoError>;
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, RepoError>;
    async fn create_event(&self, draft: EventDraft) -> Result<Event, RepoError>;
    async fn update_event(&self, id: Uuid, draft: EventDraft) -> Result<Event, RepoError>;
    async fn delete_event(&self, id: Uuid) -> Result<(), RepoError>;

    // --- Categories ---
    async fn list_categories(&self) -> Result<Vec<Category>, RepoError>;
    async fn create_category(&self, name: &str, slug: &str) -> Result<Category, RepoError>;
    async fn update_category(&self, id: Uuid, name: &str, slug: &str) -> Result<Category, RepoError>;
    /// Refuses with `HasDependents` while events still reference the category.
    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError>;

    async fn get_stats(&self) -> Result<AdminDashboardStats, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const EVENT_SLUG_TAKEN: &str = "An event with this title already exists";
const CATEGORY_TAKEN: &str = "A category with this name already exists";
const EMAIL_TAKEN: &str = "User with this email already exists";
const BAD_EVENT_REFERENCE: &str = "Invalid category or organizer selected";
const CATEGORY_IN_USE: &str = "Cannot delete a category that still has events";

// --- Postgres ---

/// UserRow
///
/// Raw `users` row. The role column is TEXT and parsed into `Role` on the way out.
#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    role: String,
    password_hash: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let role = row.role.parse().unwrap_or_else(|_| {
            // Least privilege for anything the schema should not contain.
            tracing::warn!(user_id = %row.id, role = %row.role, "unknown role in users table");
            Role::User
        });
        User {
            id: row.id,
            email: row.email,
            name: row.name,
            role,
            password_hash: row.password_hash,
        }
    }
}

const EVENT_COLUMNS: &str = "id, title, slug, description, starts_at, ends_at, location, \
     latitude, longitude, category_id, organizer_id, image_url, created_at";

/// Maps constraint violations onto the domain errors; everything else stays opaque.
fn classify(err: sqlx::Error, unique: &str, foreign_key: &str) -> RepoError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return RepoError::Conflict(unique.to_string());
        }
        if db.is_foreign_key_violation() {
            return RepoError::InvalidReference(foreign_key.to_string());
        }
    }
    RepoError::Database(err)
}

/// PostgresRepository
///
/// The production `Repository`, backed by the `users`, `categories` and `events` tables.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn ping(&self) -> Result<(), RepoError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, name, role, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, name, role, password_hash FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"INSERT INTO users (id, email, name, role, password_hash)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, email, name, role, password_hash"#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, EMAIL_TAKEN, EMAIL_TAKEN))?;
        Ok(row.into())
    }

    /// list_events
    ///
    /// The category filter joins on the slug so callers never need the category id.
    async fn list_events(&self, category_slug: Option<&str>) -> Result<Vec<Event>, RepoError> {
        let events = sqlx::query_as::<_, Event>(
            r#"SELECT e.id, e.title, e.slug, e.description, e.starts_at, e.ends_at, e.location,
                      e.latitude, e.longitude, e.category_id, e.organizer_id, e.image_url, e.created_at
               FROM events e
               JOIN categories c ON c.id = e.category_id
               WHERE ($1::TEXT IS NULL OR c.slug = $1)
               ORDER BY e.starts_at ASC"#,
        )
        .bind(category_slug)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn list_events_by_organizer(&self, organizer_id: Uuid) -> Result<Vec<Event>, RepoError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE organizer_id = $1 ORDER BY starts_at ASC"
        );
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(organizer_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, RepoError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_event(&self, draft: EventDraft) -> Result<Event, RepoError> {
        let sql = format!(
            r#"INSERT INTO events (id, title, slug, description, starts_at, ends_at, location,
                                   latitude, longitude, category_id, organizer_id, image_url, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
               RETURNING {EVENT_COLUMNS}"#
        );
        sqlx::query_as::<_, Event>(&sql)
            .bind(Uuid::new_v4())
            .bind(&draft.title)
            .bind(&draft.slug)
            .bind(&draft.description)
            .bind(draft.starts_at)
            .bind(draft.ends_at)
            .bind(&draft.location)
            .bind(draft.latitude)
            .bind(draft.longitude)
            .bind(draft.category_id)
            .bind(draft.organizer_id)
            .bind(&draft.image_url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, EVENT_SLUG_TAKEN, BAD_EVENT_REFERENCE))
    }

    async fn update_event(&self, id: Uuid, draft: EventDraft) -> Result<Event, RepoError> {
        let sql = format!(
            r#"UPDATE events
               SET title = $2, slug = $3, description = $4, starts_at = $5, ends_at = $6,
                   location = $7, latitude = $8, longitude = $9, category_id = $10,
                   organizer_id = $11, image_url = $12
               WHERE id = $1
               RETURNING {EVENT_COLUMNS}"#
        );
        sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .bind(&draft.title)
            .bind(&draft.slug)
            .bind(&draft.description)
            .bind(draft.starts_at)
            .bind(draft.ends_at)
            .bind(&draft.location)
            .bind(draft.latitude)
            .bind(draft.longitude)
            .bind(draft.category_id)
            .bind(draft.organizer_id)
            .bind(&draft.image_url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, EVENT_SLUG_TAKEN, BAD_EVENT_REFERENCE))?
            .ok_or(RepoError::NotFound)
    }

    async fn delete_event(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepoError> {
        Ok(sqlx::query_as::<_, Category>(
            r#"SELECT c.id, c.name, c.slug, COUNT(e.id) AS event_count
               FROM categories c
               LEFT JOIN events e ON e.category_id = c.id
               GROUP BY c.id
               ORDER BY c.name ASC"#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_category(&self, name: &str, slug: &str) -> Result<Category, RepoError> {
        sqlx::query_as::<_, Category>(
            r#"INSERT INTO categories (id, name, slug) VALUES ($1, $2, $3)
               RETURNING id, name, slug, 0::BIGINT AS event_count"#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, CATEGORY_TAKEN, CATEGORY_TAKEN))
    }

    async fn update_category(&self, id: Uuid, name: &str, slug: &str) -> Result<Category, RepoError> {
        sqlx::query_as::<_, Category>(
            r#"UPDATE categories SET name = $2, slug = $3 WHERE id = $1
               RETURNING id, name, slug,
                         (SELECT COUNT(*) FROM events WHERE category_id = $1) AS event_count"#,
        )
        .bind(id)
        .bind(name)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, CATEGORY_TAKEN, CATEGORY_TAKEN))?
        .ok_or(RepoError::NotFound)
    }

    /// delete_category
    ///
    /// `events.category_id` is a RESTRICT foreign key, so a violation here means the
    /// category is still in use.
    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match classify(e, CATEGORY_TAKEN, CATEGORY_IN_USE) {
                RepoError::InvalidReference(msg) => RepoError::HasDependents(msg),
                other => other,
            })?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn get_stats(&self) -> Result<AdminDashboardStats, RepoError> {
        let (event_count, user_count, category_count): (i64, i64, i64) = sqlx::query_as(
            r#"SELECT (SELECT COUNT(*) FROM events),
                      (SELECT COUNT(*) FROM users),
                      (SELECT COUNT(*) FROM categories)"#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(AdminDashboardStats {
            event_count,
            user_count,
            category_count,
        })
    }
}

// --- In-Memory ---

#[derive(Default)]
struct MemoryData {
    users: Vec<User>,
    categories: Vec<Category>,
    events: Vec<Event>,
}

impl MemoryData {
    fn with_count(&self, category: &Category) -> Category {
        Category {
            event_count: self
                .events
                .iter()
                .filter(|e| e.category_id == category.id)
                .count() as i64,
            ..category.clone()
        }
    }

    fn check_event(&self, draft: &EventDraft, skip: Option<Uuid>) -> Result<(), RepoError> {
        if self
            .events
            .iter()
            .any(|e| e.slug == draft.slug && Some(e.id) != skip)
        {
            return Err(RepoError::Conflict(EVENT_SLUG_TAKEN.to_string()));
        }
        let category_exists = self.categories.iter().any(|c| c.id == draft.category_id);
        let organizer_exists = self.users.iter().any(|u| u.id == draft.organizer_id);
        if !category_exists || !organizer_exists {
            return Err(RepoError::InvalidReference(BAD_EVENT_REFERENCE.to_string()));
        }
        Ok(())
    }
}

/// MemoryRepository
///
/// An in-process `Repository` with the same constraint semantics as the Postgres schema
/// (unique emails and slugs, foreign keys, restricted category deletes). Used by the
/// test-suite and for running the service without a database.
#[derive(Default)]
pub struct MemoryRepository {
    data: Mutex<MemoryData>,
    /// When true, every operation fails with a database error.
    failing: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn data(&self) -> Result<MutexGuard<'_, MemoryData>, RepoError> {
        if self.failing {
            return Err(RepoError::Database(sqlx::Error::PoolTimedOut));
        }
        self.data
            .lock()
            .map_err(|_| RepoError::Database(sqlx::Error::Protocol("memory store poisoned".into())))
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn ping(&self) -> Result<(), RepoError> {
        self.data().map(|_| ())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        Ok(self.data()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.data()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let mut data = self.data()?;
        if data.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Conflict(EMAIL_TAKEN.to_string()));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            role: user.role,
            password_hash: user.password_hash,
        };
        data.users.push(created.clone());
        Ok(created)
    }

    async fn list_events(&self, category_slug: Option<&str>) -> Result<Vec<Event>, RepoError> {
        let data = self.data()?;
        let category_id = match category_slug {
            Some(slug) => match data.categories.iter().find(|c| c.slug == slug) {
                Some(c) => Some(c.id),
                None => return Ok(vec![]),
            },
            None => None,
        };
        let mut events: Vec<Event> = data
            .events
            .iter()
            .filter(|e| category_id.is_none_or(|id| e.category_id == id))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.starts_at);
        Ok(events)
    }

    async fn list_events_by_organizer(&self, organizer_id: Uuid) -> Result<Vec<Event>, RepoError> {
        let mut events: Vec<Event> = self
            .data()?
            .events
            .iter()
            .filter(|e| e.organizer_id == organizer_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.starts_at);
        Ok(events)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, RepoError> {
        Ok(self.data()?.events.iter().find(|e| e.id == id).cloned())
    }

    async fn create_event(&self, draft: EventDraft) -> Result<Event, RepoError> {
        let mut data = self.data()?;
        data.check_event(&draft, None)?;
        let event = Event {
            id: Uuid::new_v4(),
            title: draft.title,
            slug: draft.slug,
            description: draft.description,
            starts_at: draft.starts_at,
            ends_at: draft.ends_at,
            location: draft.location,
            latitude: draft.latitude,
            longitude: draft.longitude,
            category_id: draft.category_id,
            organizer_id: draft.organizer_id,
            image_url: draft.image_url,
            created_at: Utc::now(),
        };
        data.events.push(event.clone());
        Ok(event)
    }

    async fn update_event(&self, id: Uuid, draft: EventDraft) -> Result<Event, RepoError> {
        let mut data = self.data()?;
        if !data.events.iter().any(|e| e.id == id) {
            return Err(RepoError::NotFound);
        }
        data.check_event(&draft, Some(id))?;
        let event = data
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(RepoError::NotFound)?;
        event.title = draft.title;
        event.slug = draft.slug;
        event.description = draft.description;
        event.starts_at = draft.starts_at;
        event.ends_at = draft.ends_at;
        event.location = draft.location;
        event.latitude = draft.latitude;
        event.longitude = draft.longitude;
        event.category_id = draft.category_id;
        event.organizer_id = draft.organizer_id;
        event.image_url = draft.image_url;
        Ok(event.clone())
    }

    async fn delete_event(&self, id: Uuid) -> Result<(), RepoError> {
        let mut data = self.data()?;
        let before = data.events.len();
        data.events.retain(|e| e.id != id);
        if data.events.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, RepoError> {
        let data = self.data()?;
        let mut categories: Vec<Category> =
            data.categories.iter().map(|c| data.with_count(c)).collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, name: &str, slug: &str) -> Result<Category, RepoError> {
        let mut data = self.data()?;
        if data.categories.iter().any(|c| c.name == name || c.slug == slug) {
            return Err(RepoError::Conflict(CATEGORY_TAKEN.to_string()));
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: slug.to_string(),
            event_count: 0,
        };
        data.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, name: &str, slug: &str) -> Result<Category, RepoError> {
        let mut data = self.data()?;
        if data
            .categories
            .iter()
            .any(|c| c.id != id && (c.name == name || c.slug == slug))
        {
            return Err(RepoError::Conflict(CATEGORY_TAKEN.to_string()));
        }
        let category = data
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepoError::NotFound)?;
        category.name = name.to_string();
        category.slug = slug.to_string();
        let updated = category.clone();
        Ok(data.with_count(&updated))
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError> {
        let mut data = self.data()?;
        if !data.categories.iter().any(|c| c.id == id) {
            return Err(RepoError::NotFound);
        }
        if data.events.iter().any(|e| e.category_id == id) {
            return Err(RepoError::HasDependents(CATEGORY_IN_USE.to_string()));
        }
        data.categories.retain(|c| c.id != id);
        Ok(())
    }

    async fn get_stats(&self) -> Result<AdminDashboardStats, RepoError> {
        let data = self.data()?;
        Ok(AdminDashboardStats {
            event_count: data.events.len() as i64,
            user_count: data.users.len() as i64,
            category_count: data.categories.len() as i64,
        })
    }
}
