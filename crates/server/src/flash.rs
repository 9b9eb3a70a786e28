use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use crate::cookies::{removal, site_cookie};

pub(crate) const FLASH_COOKIE: &str = "flash";

/// Stores a one-time message for the page the client is redirected to.
pub(crate) fn put(jar: CookieJar, message: &str) -> CookieJar {
    jar.add(site_cookie(FLASH_COOKIE, URL_SAFE_NO_PAD.encode(message.as_bytes())))
}

/// Reads the pending message, if any, and clears it so it is shown once.
pub(crate) fn take(jar: CookieJar) -> (CookieJar, Option<String>) {
    let Some(raw) = jar.get(FLASH_COOKIE).map(|cookie| cookie.value().to_owned()) else {
        return (jar, None);
    };
    let message = decode(&raw).filter(|message| !message.is_empty());
    (jar.remove(removal(FLASH_COOKIE)), message)
}

fn decode(raw: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(raw.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}
