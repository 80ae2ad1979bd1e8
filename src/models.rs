use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::token::Identity;

// --- Identity & Roles ---

/// Role
///
/// The sole authorization axis. Variants are declared in privilege order, so
/// `Role::Admin > Role::User` and `role >= required` answers "is this enough?".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
    Default,
)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    /// Whether this role carries at least the privileges of `required`.
    pub fn satisfies(&self, required: Role) -> bool {
        *self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// User
///
/// The canonical account record owned by the persistence layer. The password hash
/// never leaves the server: it is skipped on serialization.
#[derive(Debug, Clone, Serialize, Default)]
pub struct User {
    pub id: Uuid,
    // Always stored lowercase; uniqueness is case-insensitive.
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// NewUser
///
/// Insert payload for `Repository::create_user`. The email must already be normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub password_hash: String,
}

/// UserProfile
///
/// The public projection of a `User` exchanged with the browser: `{id, email, name, role}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Lowercases and trims an email so lookups and inserts agree on one spelling.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// --- Events & Categories ---

/// Category
///
/// A grouping of events. `event_count` is computed on read and ignored on write.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[sqlx(default)]
    pub event_count: i64,
}

/// Event
///
/// A listed event. Coordinates are filled in by the geocoder when the location resolves.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub starts_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub ends_at: DateTime<Utc>,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub category_id: Uuid,
    pub organizer_id: Uuid,
    pub image_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// EventDraft
///
/// Fully validated write payload for creating or replacing an event.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub category_id: Uuid,
    pub organizer_id: Uuid,
    pub image_url: Option<String>,
}

/// Derives a URL slug: lowercase, keep `[a-z0-9 -]`, whitespace runs become `-`,
/// repeated dashes collapse to one.
pub fn slugify(input: &str) -> String {
    let kept: String = input
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();

    let mut slug = String::with_capacity(kept.len());
    for word in kept.split_whitespace() {
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(word);
    }

    let mut collapsed = String::with_capacity(slug.len());
    for c in slug.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
}

// --- Request Payloads ---

/// LoginRequest
///
/// Body of `POST /api/auth/login`. Missing fields deserialize as empty strings so the
/// handler can answer with a 400 instead of a body-rejection status.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// RegisterRequest
///
/// Body of `POST /api/auth/register`. New accounts always get `Role::User`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// EventInput
///
/// Create/update payload for events. Everything is optional at the wire level; the
/// handlers decide what is required and answer 400 otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EventInput {
    pub title: Option<String>,
    pub description: Option<String>,
    #[ts(type = "string | null")]
    pub starts_at: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub ends_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub category_id: Option<Uuid>,
    pub image_url: Option<String>,
    /// Admin endpoints only: assign the event to another organizer.
    pub organizer_id: Option<Uuid>,
}

/// CategoryInput
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryInput {
    #[serde(default)]
    pub name: String,
}

/// EventFilter
///
/// Query parameters for event listings (`?category=<slug>`).
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct EventFilter {
    /// Restrict the listing to one category slug.
    pub category: Option<String>,
}

/// LocationQuery
///
/// `?address=<free text>` for forward location lookups.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationQuery {
    pub address: String,
}

/// CoordinatesQuery
///
/// `?lat=<latitude>&lon=<longitude>` for reverse lookups.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CoordinatesQuery {
    pub lat: f64,
    pub lon: f64,
}

// --- Responses ---

/// AuthResponse
///
/// Success body for login and registration: `{success, user, message}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub success: bool,
    pub user: UserProfile,
    pub message: String,
}

/// AddressResponse
///
/// Reverse lookup answer: the address nearest to the given coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AddressResponse {
    pub address: String,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// AdminDashboardStats
///
/// Counters for the admin dashboard (`GET /api/admin/stats`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub event_count: i64,
    pub user_count: i64,
    pub category_count: i64,
}

/// MeResponse
///
/// Body of `GET /api/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MeResponse {
    pub user: UserProfile,
}

/// ValidateAdminResponse
///
/// Body of `/api/auth/validate-admin`. `error` is only present on the 403 answer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ValidateAdminResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// ErrorBody
///
/// The shape of every error answer: `{ "error": <message> }`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
}

// --- Page View Models ---
//
// Server-rendered pages hand these to the UI layer as JSON.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsPage {
    pub user: Identity,
    pub events: Vec<Event>,
    pub categories: Vec<Category>,
    pub selected_category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetailPage {
    pub user: Identity,
    pub event: Event,
    // Organizer or admin: the UI shows edit/delete actions.
    pub can_manage: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEventsPage {
    pub user: Identity,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInPage {
    pub redirect: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnauthorizedPage {
    pub required_role: String,
    pub attempted_path: String,
    /// Where the "go home" action leads; never back into `/admin`.
    pub home_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDashboardPage {
    pub user: Identity,
    pub stats: AdminDashboardStats,
    pub database_connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCategoriesPage {
    pub user: Identity,
    pub categories: Vec<Category>,
}
