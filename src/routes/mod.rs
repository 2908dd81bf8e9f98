/// Router Module Index
///
/// The application's routes, one module per protection tier, so each file
/// mirrors one prefix table in the route authorizer. Access control itself
/// is applied centrally (session + authorizer layers in `create_router`);
/// the split keeps each surface reviewable on its own.
///
/// Routes any client may hit, anonymous included: the catalog read surface
/// and the auth flows. Visibility is the repository's concern on this tier;
/// every query a public handler reaches for filters on `published = true`
/// itself.
pub mod public;

/// Routes under the authenticated prefixes (/api/account, /api/reviews).
/// The route authorizer redirects anonymous requests before they get here.
pub mod account;

/// Routes under /api/admin, reachable only by admin sessions.
pub mod admin;

/// Locale-prefixed page-data routes (/{locale}/...). Their protection tier
/// is decided by the authorizer from the locale-stripped path.
pub mod pages;
