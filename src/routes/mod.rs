/// Router Module Index
///
/// Routes are grouped by who may reach them. The grouping decides which middleware
/// wraps a route; the per-permission checks live in the handlers.

/// Reachable by anyone: health, session endpoints and catalogue browsing.
pub mod public;

/// Requires a resolved identity (bearer token, or the dev header in local mode).
pub mod authenticated;

/// Resource management. Requires an identity and, inside each handler, the
/// resource's permission (`videosManager`, `manageSeries`, `manageUsers`).
pub mod manage;
