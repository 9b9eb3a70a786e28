use std::sync::Arc;

use axum::{
    extract::{FromRef, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::{
    cookie::{CookieJar, Key, SignedCookieJar},
    Form, FormRejection,
};
use serde::Deserialize;
use server_api::{users::hash_password, ServiceError};
use shared::{domain::UserDto, messages::Locale, view::LoginView};
use tracing::{debug, info, warn};

use crate::{
    app_state::AppState,
    controller::{internal_error, Resource},
    cookies::{removal, site_cookie},
    flash,
    locale::RequestLocale,
    resources::Persons,
};

pub(crate) const LOGIN_PATH: &str = "/login";
pub(crate) const LOGOUT_PATH: &str = "/logout";
pub(crate) const SESSION_COOKIE: &str = "session";

/// Key that signs the session cookie, so a client cannot forge a username.
#[derive(Clone)]
pub(crate) struct SessionKey(Key);

impl SessionKey {
    pub(crate) fn from_secret(secret: Option<&str>) -> Self {
        match secret.map(|secret| Key::try_from(secret.as_bytes())) {
            Some(Ok(key)) => Self(key),
            Some(Err(error)) => {
                warn!(%error, "session secret rejected, generating a random key");
                Self(Key::generate())
            }
            None => {
                warn!("no session secret configured, sessions end when the server restarts");
                Self(Key::generate())
            }
        }
    }
}

impl FromRef<Arc<AppState>> for SessionKey {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.session_key.clone()
    }
}

impl From<SessionKey> for Key {
    fn from(key: SessionKey) -> Self {
        key.0
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LoginForm {
    username: String,
    password: String,
}

pub(crate) async fn login_page(
    State(state): State<Arc<AppState>>,
    locale: RequestLocale,
    jar: CookieJar,
) -> Response {
    let (jar, success_message) = flash::take(jar);
    let view = LoginView {
        success_message,
        ..login_view(&state, locale.locale, String::new())
    };
    (locale.remember(jar), Json(view)).into_response()
}

/// Checks the submitted password against the stored digest. An unknown
/// username and a wrong password get the same answer.
pub(crate) async fn login(
    State(state): State<Arc<AppState>>,
    locale: RequestLocale,
    jar: CookieJar,
    session: SignedCookieJar<SessionKey>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Response {
    let jar = locale.remember(jar);
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            info!(%rejection, "unreadable sign-in submission");
            let page = refused(&state, locale.locale, String::new(), "validation.message.invalidForm");
            return (jar, page).into_response();
        }
    };

    match authenticate(&state, &form.username, &form.password).await {
        Ok(true) => {
            info!(username = %form.username, "signed in");
            let session = session.add(site_cookie(SESSION_COOKIE, form.username));
            (jar, session, Redirect::to(Persons::PATH)).into_response()
        }
        Ok(false) => {
            info!(username = %form.username, "sign-in refused");
            let page = refused(
                &state,
                locale.locale,
                form.username,
                "login.message.invalidCredentials",
            );
            (jar, page).into_response()
        }
        Err(err) => (jar, internal_error(&state, locale.locale, &err)).into_response(),
    }
}

pub(crate) async fn logout(
    State(state): State<Arc<AppState>>,
    locale: RequestLocale,
    jar: CookieJar,
    session: SignedCookieJar<SessionKey>,
) -> Response {
    if let Some(cookie) = session.get(SESSION_COOKIE) {
        info!(username = %cookie.value(), "signed out");
    }
    let message = state
        .catalog
        .message("login.message.loggedOut", &[], locale.locale);
    let jar = flash::put(locale.remember(jar), &message);
    (jar, session.remove(removal(SESSION_COOKIE)), Redirect::to(LOGIN_PATH)).into_response()
}

/// Lets the request through only with a validly signed session naming a
/// user that still exists; everyone else is sent to the sign-in page.
pub(crate) async fn require_session(
    State(state): State<Arc<AppState>>,
    locale: RequestLocale,
    session: SignedCookieJar<SessionKey>,
    request: Request,
    next: Next,
) -> Response {
    let Some(username) = session.get(SESSION_COOKIE).map(|cookie| cookie.value().to_owned()) else {
        debug!(path = %request.uri().path(), "no session, redirecting to sign-in");
        return Redirect::to(LOGIN_PATH).into_response();
    };

    match state.api.users.get_by_username(&username).await {
        Ok(_) => next.run(request).await,
        Err(ServiceError::Rejected(_)) => {
            info!(%username, "session names a user that no longer exists");
            (session.remove(removal(SESSION_COOKIE)), Redirect::to(LOGIN_PATH)).into_response()
        }
        Err(err) => internal_error(&state, locale.locale, &err),
    }
}

async fn authenticate(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<bool, ServiceError<UserDto>> {
    if username.trim().is_empty() {
        return Ok(false);
    }
    match state.api.users.get_by_username(username).await {
        Ok(user) => Ok(user.password == hash_password(password)),
        Err(ServiceError::Rejected(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

fn refused(state: &AppState, locale: Locale, username: String, key: &str) -> Response {
    let view = LoginView {
        error_messages: vec![state.catalog.message(key, &[], locale)],
        ..login_view(state, locale, username)
    };
    (StatusCode::BAD_REQUEST, Json(view)).into_response()
}

fn login_view(state: &AppState, locale: Locale, username: String) -> LoginView {
    LoginView {
        header_title: state.catalog.message("login.headerTitle", &[], locale),
        action: LOGIN_PATH.to_string(),
        username,
        success_message: None,
        error_messages: Vec::new(),
        locale,
    }
}
