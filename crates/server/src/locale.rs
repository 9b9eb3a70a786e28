use std::{convert::Infallible, sync::Arc};

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use shared::messages::Locale;
use tracing::debug;

use crate::{app_state::AppState, cookies::site_cookie};

pub(crate) const LOCALE_COOKIE: &str = "localeCookie";
const LOCALE_COOKIE_MAX_AGE: time::Duration = time::Duration::hours(1);

#[derive(Debug, Deserialize)]
struct LanguageQuery {
    language: Option<String>,
}

/// Locale of the current request: the `language` query parameter, then the
/// locale cookie, then the configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RequestLocale {
    pub(crate) locale: Locale,
    /// Set when the request switched language and the choice must be stored.
    pub(crate) switched: bool,
}

impl RequestLocale {
    pub(crate) fn resolve(parts: &Parts, default: Locale) -> Self {
        let requested = Query::<LanguageQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(query)| query.language)
            .and_then(|raw| match raw.parse::<Locale>() {
                Ok(locale) => Some(locale),
                Err(error) => {
                    debug!(%error, "ignoring language parameter");
                    None
                }
            });
        if let Some(locale) = requested {
            return Self {
                locale,
                switched: true,
            };
        }

        let stored = CookieJar::from_headers(&parts.headers)
            .get(LOCALE_COOKIE)
            .and_then(|cookie| cookie.value().parse().ok());
        Self {
            locale: stored.unwrap_or(default),
            switched: false,
        }
    }

    /// Adds the locale cookie when the request switched language.
    pub(crate) fn remember(&self, jar: CookieJar) -> CookieJar {
        if !self.switched {
            return jar;
        }
        jar.add(
            site_cookie(LOCALE_COOKIE, self.locale.code().to_string())
                .max_age(LOCALE_COOKIE_MAX_AGE),
        )
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestLocale {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::resolve(parts, state.default_locale))
    }
}
