/// Handler Module Index
///
/// Handlers are grouped by the surface they serve. API handlers answer with JSON and
/// status codes; page loaders answer with JSON view models for the UI layer and stop
/// with redirects when the caller may not see the page.

/// Login, registration, logout and "who am I".
pub mod auth;

/// Event and category reads, plus the caller's own events.
pub mod events;

/// Address lookups backing the event forms.
pub mod geocode;

/// Admin-only event, category and statistics endpoints.
pub mod admin;

/// Server-rendered page loaders.
pub mod pages;
