/// Router Module Index
///
/// Splits the routing table by the access tier the gate assigns to each path.
/// Grouping here is organisational: enforcement happens in `gate::access_gate`,
/// which is layered over the whole router, and again in the handler extractors.

/// Paths the gate lets through without a credential.
pub mod public;

/// Paths requiring any signed-in user.
pub mod authenticated;

/// `/admin*` pages and `/api/admin*` endpoints. ADMIN only.
pub mod admin;
