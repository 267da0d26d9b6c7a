/// Router Module Index
///
/// Routing is split by access level. Page routes sit behind the edge route guard;
/// API routes are reachable directly, so the authenticated and admin modules enforce
/// access in their own extractors as well.

/// Client shell pages (`/`, `/login`, `/admin`, ...).
pub mod pages;

/// Anonymous API: session endpoints, health, public uploads listing.
pub mod public;

/// API routes requiring a valid session.
pub mod authenticated;

/// API routes requiring the live admin flag, nested under `/api/admin`.
pub mod admin;
