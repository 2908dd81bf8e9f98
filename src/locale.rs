use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::authorize::matches_prefix;

/// Locale
///
/// The UI languages the catalog serves. Every page URL carries one of these
/// as its first segment; the API surface does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

/// The locale used when a request expresses no preference.
pub const DEFAULT_LOCALE: Locale = Locale::En;

/// Prefixes that bypass locale routing entirely: machine surfaces and
/// static assets have no language.
pub const LOCALE_EXEMPT_PREFIXES: &[&str] = &[
    "/api",
    "/assets",
    "/favicon.ico",
    "/health",
    "/api-docs",
    "/swagger-ui",
];

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Zh => "zh",
        }
    }

    /// Parses a path segment; `None` for anything that is not a known locale.
    pub fn from_segment(segment: &str) -> Option<Locale> {
        match segment {
            "en" => Some(Locale::En),
            "zh" => Some(Locale::Zh),
            _ => None,
        }
    }
}

/// locale_of
///
/// The locale carried by a path, if its first segment is one.
pub fn locale_of(path: &str) -> Option<Locale> {
    let first = path
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or("");
    Locale::from_segment(first)
}

/// strip_locale
///
/// Removes a leading locale segment so route classification sees the same
/// logical path in every language: "/zh/admin" becomes "/admin". Paths
/// without a locale prefix come back unchanged.
pub fn strip_locale(path: &str) -> &str {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let first = trimmed.split('/').next().unwrap_or("");

    if Locale::from_segment(first).is_none() {
        return path;
    }

    let rest = &trimmed[first.len()..];
    if rest.is_empty() { "/" } else { rest }
}

/// Locale Middleware
///
/// The outermost routing concern: every page request must carry a locale.
/// 1. Machine surfaces (API, docs, health, assets) pass through untouched.
/// 2. Paths already carrying a locale pass through.
/// 3. Everything else is redirected to the default-locale form of the same
///    path, query string preserved: "/games?year=2003" lands on
///    "/en/games?year=2003".
pub async fn locale_layer(req: Request, next: Next) -> Response {
    let path = req.uri().path();

    if LOCALE_EXEMPT_PREFIXES
        .iter()
        .any(|p| matches_prefix(path, p))
    {
        return next.run(req).await;
    }

    if locale_of(path).is_some() {
        return next.run(req).await;
    }

    let suffix = if path == "/" { "" } else { path };
    let target = match req.uri().query() {
        Some(q) => format!("/{}{}?{}", DEFAULT_LOCALE.as_str(), suffix, q),
        None => format!("/{}{}", DEFAULT_LOCALE.as_str(), suffix),
    };

    Redirect::temporary(&target).into_response()
}
