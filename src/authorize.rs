use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    auth::Session,
    locale::{locale_of, strip_locale},
    models::Role,
};

/// Where unauthorized page requests are sent.
pub const SIGN_IN_PATH: &str = "/signin";

/// Route prefixes reserved for the back office.
pub const ADMIN_PREFIXES: &[&str] = &["/admin", "/api/admin"];

/// Route prefixes that require any signed-in principal.
pub const AUTHENTICATED_PREFIXES: &[&str] = &["/account", "/api/account", "/api/reviews"];

/// RouteClass
///
/// The protection tier of a logical path. Derived from static prefix tables,
/// never from per-route annotations, so the protection surface is auditable
/// in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Authenticated,
    Admin,
}

/// AccessDecision
///
/// The outcome of authorization for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    RedirectToSignIn,
}

/// matches_prefix
///
/// Segment-aware prefix test: "/admin" matches "/admin" and "/admin/games"
/// but never "/administrator". Plain `starts_with` would get that wrong.
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// classify
///
/// Maps a path to its protection tier. The locale prefix is stripped first,
/// so "/zh/admin" is protected exactly like "/admin"; localization must
/// never open a side door. Admin wins when prefix tables would overlap.
pub fn classify(path: &str) -> RouteClass {
    let logical = strip_locale(path);

    if ADMIN_PREFIXES.iter().any(|p| matches_prefix(logical, p)) {
        return RouteClass::Admin;
    }
    if AUTHENTICATED_PREFIXES
        .iter()
        .any(|p| matches_prefix(logical, p))
    {
        return RouteClass::Authenticated;
    }
    RouteClass::Public
}

/// authorize
///
/// The pure access decision: given the request path and whatever session the
/// request carries, let it through or send it to sign-in.
///
/// **Information hiding**: a signed-in user with the wrong role gets the
/// same redirect as an anonymous visitor, so probing URLs reveals nothing
/// about which protected areas exist.
pub fn authorize(path: &str, session: Option<&Session>) -> AccessDecision {
    match classify(path) {
        RouteClass::Public => AccessDecision::Allow,
        RouteClass::Authenticated => match session {
            Some(_) => AccessDecision::Allow,
            None => AccessDecision::RedirectToSignIn,
        },
        RouteClass::Admin => match session {
            // The enriched role decides; the token snapshot never does.
            Some(s) if s.role == Role::Admin => AccessDecision::Allow,
            _ => AccessDecision::RedirectToSignIn,
        },
    }
}

/// Authorization Middleware
///
/// Runs after the session middleware, so the `Session` (if any) is already
/// in request extensions. Centralizing the decision here means no handler
/// under a protected prefix needs its own role check; adding a route under
/// "/admin" is protected by construction.
pub async fn authorize_layer(req: Request, next: Next) -> Response {
    let path = req.uri().path();
    let decision = authorize(path, req.extensions().get::<Session>());

    match decision {
        AccessDecision::Allow => next.run(req).await,
        AccessDecision::RedirectToSignIn => {
            // Keep the visitor's locale when the request carried one.
            let target = match locale_of(path) {
                Some(locale) => format!("/{}{}", locale.as_str(), SIGN_IN_PATH),
                None => SIGN_IN_PATH.to_string(),
            };
            Redirect::temporary(&target).into_response()
        }
    }
}
