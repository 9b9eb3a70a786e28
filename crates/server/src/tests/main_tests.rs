use super::*;
use axum::{
    body::{self, Body},
    http::{header, Request, Response},
};
use serde_json::Value;
use server_api::CrudApi;
use shared::{
    domain::{RoleDto, UserDto},
    messages::Locale,
};
use tower::ServiceExt;

/// Router with a signed-in administrator; every helper request carries the
/// session cookie.
struct TestApp {
    router: Router,
    api: ApiContext,
    session: String,
}

async fn test_app() -> TestApp {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let api = ApiContext::new(storage);
    api.users
        .create(UserDto {
            username: "admin".into(),
            password: "admin-pass".into(),
            ..Default::default()
        })
        .await
        .expect("admin user");
    let state = AppState {
        api: api.clone(),
        catalog: MessageCatalog::embedded().expect("catalog"),
        default_locale: Locale::English,
        session_key: SessionKey::from_secret(None),
    };
    let router = build_router(Arc::new(state));

    let login = form_request("/login", "username=admin&password=admin-pass", None);
    let response = send(&router, login).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let session = cookie_pair(&response, "session");
    TestApp {
        router,
        api,
        session,
    }
}

async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.expect("response")
}

fn form_request(uri: &str, form: &str, cookie: Option<&str>) -> Request<Body> {
    let mut request =
        Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    request.body(Body::from(form.to_string())).expect("request")
}

fn with_session(app: &TestApp, cookie: Option<&str>) -> String {
    match cookie {
        Some(cookie) => format!("{}; {cookie}", app.session),
        None => app.session.clone(),
    }
}

async fn get_page(app: &TestApp, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let request = Request::get(uri)
        .header(header::COOKIE, with_session(app, cookie))
        .body(Body::empty())
        .expect("request");
    send(&app.router, request).await
}

async fn post_form(app: &TestApp, uri: &str, form: &str) -> Response<Body> {
    send(&app.router, form_request(uri, form, Some(&app.session))).await
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn set_cookies<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// `name=value` pair of the first Set-Cookie header for `name`.
fn cookie_pair<B>(response: &Response<B>, name: &str) -> String {
    set_cookies(response)
        .into_iter()
        .find(|cookie| cookie.starts_with(&format!("{name}=")))
        .and_then(|cookie| cookie.split(';').next().map(str::to_string))
        .unwrap_or_else(|| panic!("missing {name} cookie"))
}

fn error_messages(view: &Value) -> Vec<String> {
    view["error_messages"]
        .as_array()
        .map(|messages| {
            messages
                .iter()
                .filter_map(|m| m.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app().await;
    let response = get_page(&app, "/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn root_redirects_to_persons() {
    let app = test_app().await;
    let response = get_page(&app, "/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/persons");
}

#[tokio::test]
async fn page_without_id_shows_blank_create_form() {
    let app = test_app().await;
    let response = get_page(&app, "/roles?id=abc", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let view = json_body(response).await;
    assert_eq!(view["header_title"], "Create Role");
    assert_eq!(view["mode"], "create");
    assert_eq!(view["action"], "/roles/create");
    assert_eq!(view["command"]["name"], "");
    assert_eq!(view["data"], serde_json::json!([]));
}

#[tokio::test]
async fn create_redirects_and_flash_is_shown_once() {
    let app = test_app().await;

    let response = post_form(&app, "/roles/create", "name=Admin").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/roles");
    let flash = cookie_pair(&response, "flash");

    let response = get_page(&app, "/roles", Some(&flash)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response)
        .iter()
        .any(|cookie| cookie.starts_with("flash=;") && cookie.contains("Max-Age=0")));
    let view = json_body(response).await;
    assert_eq!(view["success_message"], "Role Admin has been created.");
    assert_eq!(view["data"][0]["name"], "Admin");

    let view = json_body(get_page(&app, "/roles", None).await).await;
    assert!(view.get("success_message").is_none());
}

#[tokio::test]
async fn page_with_id_shows_edit_form() {
    let app = test_app().await;
    let id = app.api
        .roles
        .create(RoleDto {
            name: "Clerk".into(),
            ..Default::default()
        })
        .await
        .expect("role");

    let view = json_body(get_page(&app, &format!("/roles?id={id}"), None).await).await;
    assert_eq!(view["header_title"], "Update Role");
    assert_eq!(view["mode"], "edit");
    assert_eq!(view["action"], "/roles/update");
    assert_eq!(view["command"]["name"], "Clerk");
}

#[tokio::test]
async fn unknown_id_forces_create_mode_with_message() {
    let app = test_app().await;
    let response = get_page(&app, "/roles?id=999", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let view = json_body(response).await;
    assert_eq!(view["mode"], "create");
    assert_eq!(
        error_messages(&view),
        vec!["Role with ID 999 was not found."]
    );
}

#[tokio::test]
async fn duplicate_keeps_submitted_values() {
    let app = test_app().await;
    post_form(&app, "/roles/create", "name=Admin").await;

    let response = post_form(&app, "/roles/create", "name=Admin").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let view = json_body(response).await;
    assert_eq!(error_messages(&view), vec!["Role Admin already exists."]);
    assert_eq!(view["command"]["name"], "Admin");
    assert_eq!(view["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn empty_name_is_reported_with_translated_label() {
    let app = test_app().await;
    let response = post_form(&app, "/roles/create", "name=+++").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let view = json_body(response).await;
    assert_eq!(error_messages(&view), vec!["Name must not be empty."]);
    assert!(app.api.roles.list().await.expect("list").is_empty());

    let response = post_form(&app, "/roles/create?language=es", "name=").await;
    let view = json_body(response).await;
    assert_eq!(error_messages(&view), vec!["Nombre no debe estar vacío."]);
}

#[tokio::test]
async fn deleting_assigned_role_lists_persons_and_resets_form() {
    let app = test_app().await;
    post_form(&app, "/roles/create", "name=Admin").await;
    let response = post_form(
        &app,
        "/persons/create",
        "first_name=Jose&last_name=Rizal&roles=1&employed=on",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = post_form(&app, "/roles/delete", "id=1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let view = json_body(response).await;
    assert_eq!(
        error_messages(&view),
        vec!["Role is still assigned to the following persons: Jose Rizal."]
    );
    assert_eq!(view["mode"], "create");
    assert_eq!(view["command"]["name"], "");
    assert_eq!(view["data"][0]["persons"][0]["name"], "Jose Rizal");
}

#[tokio::test]
async fn update_success_names_affected_roles() {
    let app = test_app().await;
    post_form(&app, "/roles/create", "name=Admin").await;
    post_form(&app, "/roles/create", "name=Clerk").await;
    post_form(&app, "/persons/create", "first_name=Jose&last_name=Rizal").await;

    let response = post_form(
        &app,
        "/persons/update",
        "id=1&first_name=Jose&last_name=Rizal&birthday=1861-06-19&roles=1%2C2",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let flash = cookie_pair(&response, "flash");

    let view = json_body(get_page(&app, "/persons", Some(&flash)).await).await;
    assert_eq!(
        view["success_message"],
        "Person Jose Rizal has been updated. Affected roles: Admin; Clerk."
    );
    assert_eq!(view["data"][0]["birthday"], "1861-06-19");
}

#[tokio::test]
async fn malformed_birthday_keeps_submitted_person() {
    let app = test_app().await;
    let response = post_form(
        &app,
        "/persons/create",
        "first_name=Jose&last_name=Rizal&birthday=19-06-1861",
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let view = json_body(response).await;
    assert_eq!(
        error_messages(&view),
        vec!["Birthday must be a date in the form YYYY-MM-DD."]
    );
    assert_eq!(view["command"]["name"]["first_name"], "Jose");
    assert!(app.api.persons.list().await.expect("list").is_empty());
}

#[tokio::test]
async fn update_of_missing_record_forces_create_mode() {
    let app = test_app().await;
    let response = post_form(&app, "/roles/update", "id=42&name=Ghost").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let view = json_body(response).await;
    assert_eq!(view["mode"], "create");
    assert_eq!(view["command"]["name"], "");
    assert_eq!(error_messages(&view), vec!["Role with ID 42 was not found."]);
}

#[tokio::test]
async fn user_views_never_expose_passwords() {
    let app = test_app().await;
    let response = post_form(&app, "/users/create", "username=alice&password=secret").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let view = json_body(get_page(&app, "/users?id=2", None).await).await;
    assert_eq!(view["command"]["username"], "alice");
    assert!(view["command"].get("password").is_none());
    let users = view["data"].as_array().expect("users");
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|user| user.get("password").is_none()));
}

#[tokio::test]
async fn language_switch_is_remembered_in_cookie() {
    let app = test_app().await;
    let response = get_page(&app, "/roles?language=es", None).await;
    let locale = cookie_pair(&response, "localeCookie");
    assert_eq!(locale, "localeCookie=es");
    assert!(set_cookies(&response)
        .iter()
        .any(|cookie| cookie.contains("Max-Age=3600")));
    let view = json_body(response).await;
    assert_eq!(view["header_title"], "Crear rol");
    assert_eq!(view["locale"], "spanish");

    let response = get_page(&app, "/roles", Some(&locale)).await;
    assert!(set_cookies(&response).is_empty());
    let view = json_body(response).await;
    assert_eq!(view["header_title"], "Crear rol");
}

#[tokio::test]
async fn unexpected_failures_return_generic_500() {
    let app = test_app().await;
    app.api.storage.pool().close().await;

    let response = get_page(&app, "/roles", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["code"], "internal");
    assert_eq!(body["message"], "An unexpected error occurred.");
}

#[tokio::test]
async fn repeated_role_values_are_all_assigned() {
    let app = test_app().await;
    post_form(&app, "/roles/create", "name=Admin").await;
    post_form(&app, "/roles/create", "name=Clerk").await;

    let response = post_form(
        &app,
        "/persons/create",
        "first_name=Jose&last_name=Rizal&roles=1&roles=2",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let people = app.api.persons.list().await.expect("list");
    let roles: Vec<_> = people[0].roles.iter().map(|role| role.name.as_str()).collect();
    assert_eq!(roles, vec!["Admin", "Clerk"]);
}

#[tokio::test]
async fn unreadable_form_is_rendered_as_validation_failure() {
    let app = test_app().await;
    let request = Request::post("/roles/create")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, app.session.as_str())
        .body(Body::from(r#"{"name":"Admin"}"#))
        .expect("request");
    let response = send(&app.router, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let view = json_body(response).await;
    assert_eq!(
        error_messages(&view),
        vec!["The submitted form could not be read."]
    );
    assert_eq!(view["mode"], "create");
    assert!(app.api.roles.list().await.expect("list").is_empty());
}

#[tokio::test]
async fn admin_pages_require_sign_in() {
    let app = test_app().await;
    for uri in ["/roles", "/persons", "/users"] {
        let request = Request::get(uri).body(Body::empty()).expect("request");
        let response = send(&app.router, request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    let response = send(&app.router, form_request("/roles/create", "name=Admin", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.api.roles.list().await.expect("list").is_empty());
}

#[tokio::test]
async fn forged_session_is_refused() {
    let app = test_app().await;
    let request = Request::get("/roles")
        .header(header::COOKIE, "session=admin")
        .body(Body::empty())
        .expect("request");
    let response = send(&app.router, request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn wrong_password_and_unknown_user_get_same_message() {
    let app = test_app().await;
    for form in ["username=admin&password=nope", "username=ghost&password=admin-pass"] {
        let response = send(&app.router, form_request("/login", form, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(set_cookies(&response).is_empty());
        let view = json_body(response).await;
        assert_eq!(error_messages(&view), vec!["Invalid username or password."]);
        assert_eq!(view["action"], "/login");
    }

    let response = send(
        &app.router,
        form_request("/login?language=es", "username=admin&password=nope", None),
    )
    .await;
    let view = json_body(response).await;
    assert_eq!(error_messages(&view), vec!["Usuario o contraseña no válidos."]);
}

#[tokio::test]
async fn logout_ends_session_and_says_so_once() {
    let app = test_app().await;
    let response = send(&app.router, form_request("/logout", "", Some(&app.session))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
    assert!(set_cookies(&response)
        .iter()
        .any(|cookie| cookie.starts_with("session=;") && cookie.contains("Max-Age=0")));
    let flash = cookie_pair(&response, "flash");

    let request = Request::get("/login")
        .header(header::COOKIE, flash.as_str())
        .body(Body::empty())
        .expect("request");
    let view = json_body(send(&app.router, request).await).await;
    assert_eq!(view["header_title"], "Sign In");
    assert_eq!(view["success_message"], "You have been signed out.");
}

#[tokio::test]
async fn deleted_user_loses_session() {
    let app = test_app().await;
    let response = post_form(&app, "/users/delete", "id=1").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = get_page(&app, "/roles", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}
