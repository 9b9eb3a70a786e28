use std::{fmt, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::{cookie::CookieJar, Form, FormRejection};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use server_api::{ApiContext, CrudApi, ServiceError};
use shared::{
    error::{ApiError, ErrorCode, MessageArg, ValidationError},
    messages::Locale,
    view::{FormMode, ListView},
};
use tracing::{error, info};

use crate::{app_state::AppState, flash, locale::RequestLocale};

/// A managed record type exposed through the generic list/create/update/
/// delete cycle.
pub(crate) trait Resource: Send + Sync + 'static {
    type Id: Copy + fmt::Display + From<i64> + Send + Sync + 'static;
    type Dto: Clone + Default + fmt::Debug + Serialize + Send + Sync + 'static;
    type Form: DeserializeOwned + Send + 'static;
    type Service: CrudApi<Self::Dto, Id = Self::Id> + ?Sized;

    /// Message key prefix, e.g. `role`.
    const PREFIX: &'static str;
    const PATH: &'static str;

    fn service(api: &ApiContext) -> &Self::Service;

    /// Converts submitted form values; failures keep what the user typed.
    fn from_form(form: Self::Form) -> Result<Self::Dto, ValidationError<Self::Dto>>;

    fn display_name(dto: &Self::Dto) -> String;

    /// Message key and names of related records touched by an update or delete.
    fn affected(_dto: &Self::Dto) -> Option<(&'static str, String)> {
        None
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct IdForm {
    #[serde(default)]
    id: Option<String>,
}

pub(crate) fn parse_id<I: From<i64>>(raw: Option<&str>) -> Option<I> {
    raw.map(str::trim)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| raw.parse::<i64>().ok())
        .map(I::from)
}

pub(crate) async fn show<R: Resource>(
    State(state): State<Arc<AppState>>,
    locale: RequestLocale,
    jar: CookieJar,
    Query(query): Query<PageQuery>,
) -> Response {
    let (jar, success_message) = flash::take(jar);
    let service = R::service(&state.api);
    let outcome = match parse_id::<R::Id>(query.id.as_deref()) {
        None => Ok((FormMode::Create, R::Dto::default())),
        Some(id) => service.get(id).await.map(|dto| (FormMode::Edit, dto)),
    };

    let response = match outcome {
        Ok((mode, command)) => {
            match list_view::<R>(&state, locale.locale, mode, command, success_message, Vec::new())
                .await
            {
                Ok(view) => Json(view).into_response(),
                Err(err) => internal_error(&state, locale.locale, &err),
            }
        }
        Err(err) => render_failure::<R>(&state, locale.locale, FormMode::Create, true, err).await,
    };
    (locale.remember(jar), response).into_response()
}

pub(crate) async fn create<R: Resource>(
    State(state): State<Arc<AppState>>,
    locale: RequestLocale,
    jar: CookieJar,
    form: Result<Form<R::Form>, FormRejection>,
) -> Response {
    let result = match read_form::<R, _>(form).and_then(R::from_form) {
        Ok(dto) => {
            let name = R::display_name(&dto);
            R::service(&state.api).create(dto).await.map(|_| name)
        }
        Err(rejection) => Err(rejection.into()),
    };
    let jar = locale.remember(jar);

    match result {
        Ok(name) => {
            let message = state.catalog.message(
                &format!("{}.successMessage.create", R::PREFIX),
                &[MessageArg::text(name)],
                locale.locale,
            );
            redirect_with_flash::<R>(jar, &message)
        }
        Err(err) => (
            jar,
            render_failure::<R>(&state, locale.locale, FormMode::Create, false, err).await,
        )
            .into_response(),
    }
}

pub(crate) async fn update<R: Resource>(
    State(state): State<Arc<AppState>>,
    locale: RequestLocale,
    jar: CookieJar,
    form: Result<Form<R::Form>, FormRejection>,
) -> Response {
    let result = match read_form::<R, _>(form) {
        Ok(form) => match R::from_form(form) {
            Ok(dto) => R::service(&state.api).update(dto).await,
            Err(rejection) => Err(rejection.into()),
        },
        // Unreadable submissions have no values to keep.
        Err(rejection) => {
            let response =
                render_failure::<R>(&state, locale.locale, FormMode::Create, true, rejection.into())
                    .await;
            return (locale.remember(jar), response).into_response();
        }
    };
    let jar = locale.remember(jar);

    match result {
        Ok(updated) => redirect_with_flash::<R>(
            jar,
            &success_message::<R>(&state, locale.locale, "update", &updated),
        ),
        Err(err) => (
            jar,
            render_failure::<R>(&state, locale.locale, FormMode::Edit, false, err).await,
        )
            .into_response(),
    }
}

pub(crate) async fn delete<R: Resource>(
    State(state): State<Arc<AppState>>,
    locale: RequestLocale,
    jar: CookieJar,
    form: Result<Form<IdForm>, FormRejection>,
) -> Response {
    let result = match read_form::<R, _>(form) {
        Ok(form) => match parse_id::<R::Id>(form.id.as_deref()) {
            Some(id) => R::service(&state.api).delete(id).await,
            None => Err(ValidationError::new(
                ErrorCode::NotFound,
                format!("{}.validation.message.notFound", R::PREFIX),
                R::Dto::default(),
                vec![MessageArg::text(form.id.unwrap_or_default())],
            )
            .into()),
        },
        Err(rejection) => Err(rejection.into()),
    };
    let jar = locale.remember(jar);

    match result {
        Ok(deleted) => redirect_with_flash::<R>(
            jar,
            &success_message::<R>(&state, locale.locale, "delete", &deleted),
        ),
        Err(err) => (
            jar,
            render_failure::<R>(&state, locale.locale, FormMode::Create, true, err).await,
        )
            .into_response(),
    }
}

/// Unwraps a submitted form. A body that cannot be decoded at all becomes a
/// validation failure so it is rendered like any other rejected submission.
fn read_form<R: Resource, F>(
    form: Result<Form<F>, FormRejection>,
) -> Result<F, ValidationError<R::Dto>> {
    form.map(|Form(form)| form).map_err(|rejection| {
        info!(resource = R::PREFIX, %rejection, "unreadable form submission");
        ValidationError::new(
            ErrorCode::Validation,
            "validation.message.invalidForm",
            R::Dto::default(),
            Vec::new(),
        )
    })
}

/// Turns a failed service call into a response. Rejections re-render the
/// list page with HTTP 400; anything else is a 500 with the detail only in
/// the log.
///
/// The submitted values stay in the form unless `force_create` is set or
/// the record is gone, in which case a blank create form is shown.
pub(crate) async fn render_failure<R: Resource>(
    state: &AppState,
    locale: Locale,
    mode: FormMode,
    force_create: bool,
    err: ServiceError<R::Dto>,
) -> Response {
    let rejection = match err {
        ServiceError::Rejected(rejection) => rejection,
        unexpected => return internal_error(state, locale, &unexpected),
    };

    for message in state.catalog.localize(&rejection.errors, Locale::English) {
        info!(resource = R::PREFIX, code = ?rejection.code, %message, "request rejected");
    }

    let (mode, command) = if force_create || rejection.code == ErrorCode::NotFound {
        (FormMode::Create, R::Dto::default())
    } else {
        (mode, rejection.target)
    };
    let error_messages = state.catalog.localize(&rejection.errors, locale);

    match list_view::<R>(state, locale, mode, command, None, error_messages).await {
        Ok(view) => (StatusCode::BAD_REQUEST, Json(view)).into_response(),
        Err(err) => internal_error(state, locale, &err),
    }
}

async fn list_view<R: Resource>(
    state: &AppState,
    locale: Locale,
    mode: FormMode,
    command: R::Dto,
    success_message: Option<String>,
    error_messages: Vec<String>,
) -> Result<ListView<R::Dto>, ServiceError<R::Dto>> {
    let data = R::service(&state.api).list().await?;
    Ok(ListView {
        header_title: state.catalog.message(
            &format!("{}.{}", R::PREFIX, mode.header_suffix()),
            &[],
            locale,
        ),
        mode,
        action: format!("{}{}", R::PATH, mode.action()),
        command,
        data,
        success_message,
        error_messages,
        locale,
    })
}

fn success_message<R: Resource>(
    state: &AppState,
    locale: Locale,
    action: &str,
    dto: &R::Dto,
) -> String {
    let mut message = state.catalog.message(
        &format!("{}.successMessage.{action}", R::PREFIX),
        &[MessageArg::text(R::display_name(dto))],
        locale,
    );
    if let Some((key, names)) = R::affected(dto).filter(|(_, names)| !names.is_empty()) {
        message.push(' ');
        message.push_str(&state.catalog.message(key, &[MessageArg::text(names)], locale));
    }
    message
}

fn redirect_with_flash<R: Resource>(jar: CookieJar, message: &str) -> Response {
    (flash::put(jar, message), Redirect::to(R::PATH)).into_response()
}

pub(crate) fn internal_error(state: &AppState, locale: Locale, err: &dyn fmt::Display) -> Response {
    error!(%err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new(
            ErrorCode::Internal,
            state.catalog.message("error.internal", &[], locale),
        )),
    )
        .into_response()
}
