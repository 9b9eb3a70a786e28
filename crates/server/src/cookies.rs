use axum_extra::extract::cookie::{Cookie, SameSite};
use cookie::CookieBuilder;

/// Site-wide, script-inaccessible cookie; the attributes every cookie set by
/// this server shares.
pub(crate) fn site_cookie(name: &'static str, value: String) -> CookieBuilder<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
}

/// Cookie to hand to `remove`; the path must match the one it was set with.
pub(crate) fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}
