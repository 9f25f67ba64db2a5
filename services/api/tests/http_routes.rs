//! HTTP tests for the API routes, served from in-memory stores

mod support;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::{Months, Utc};
use hms_api::{models::UserType, repositories::UserStore, routes::create_router};
use serde_json::{Value, json};
use support::{app_state, harness, registration};
use tower::ServiceExt;

fn app() -> Router {
    create_router(app_state(&harness()))
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn put_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn register_body(username: &str) -> Value {
    json!({
        "email": format!("{}@hospital.example", username),
        "password": support::PASSWORD,
        "username": username,
        "firstname": "Test",
        "lastname": "User",
    })
}

/// Register and log in, returning the user id and session token
async fn sign_up(app: &Router, username: &str) -> (String, String) {
    let response = send(app, post_json("/api/user/create", register_body(username))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = json_body(response).await["user"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(
        app,
        post_json(
            "/api/user/login",
            json!({
                "email": format!("{}@hospital.example", username),
                "password": support::PASSWORD,
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = json_body(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    (id, token)
}

#[tokio::test]
async fn test_welcome_and_fallback() {
    let app = app();

    let response = send(&app, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["message"],
        hms_api::messages::WELCOME
    );

    let response = send(
        &app,
        Request::builder().uri("/api/nope").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_check() {
    let response = send(
        &app(),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_register_trims_input_and_hides_password() {
    let app = app();

    let response = send(
        &app,
        post_json(
            "/api/user/create",
            json!({
                "email": "  nurse@hospital.example ",
                "password": support::PASSWORD,
                "username": " nurse",
                "firstname": "Test ",
                "lastname": "User",
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["user"]["email"], "nurse@hospital.example");
    assert_eq!(body["user"]["username"], "nurse");
    assert_eq!(body["user"]["status"], "active");
    assert!(!body.to_string().contains("password"));
}

#[tokio::test]
async fn test_register_ignores_type_in_body() {
    let app = app();
    let mut body = register_body("sneaky");
    body["type"] = json!("admin");

    let response = send(&app, post_json("/api/user/create", body)).await;
    let body = json_body(response).await;
    assert_eq!(body["user"]["type"], UserType::User.as_str());
}

#[tokio::test]
async fn test_register_errors() {
    let app = app();
    sign_up(&app, "nurse").await;

    let response = send(&app, post_json("/api/user/create", register_body("nurse"))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "User already exists");

    let response = send(&app, post_json("/api/user/create", json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["message"],
        "Both email and password are required."
    );

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/user/create")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\":"))
        .unwrap();
    let response = send(&app, malformed).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let app = app();
    send(&app, post_json("/api/user/create", register_body("nurse"))).await;

    let response = send(
        &app,
        post_json(
            "/api/user/login",
            json!({ "email": "nurse@hospital.example", "password": support::PASSWORD }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=3600"));

    let body = json_body(response).await;
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user"]["email"], "nurse@hospital.example");
    assert!(body["token"].as_str().is_some());
}

#[tokio::test]
async fn test_login_errors() {
    let app = app();
    send(&app, post_json("/api/user/create", register_body("nurse"))).await;

    let response = send(
        &app,
        post_json(
            "/api/user/login",
            json!({ "email": "nobody@hospital.example", "password": "whatever1" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["message"],
        "No account found with this email. Please register."
    );

    let response = send(
        &app,
        post_json(
            "/api/user/login",
            json!({ "email": "nurse@hospital.example", "password": "wrong-password" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_login_refused_after_sweep() {
    let h = harness();
    let app = create_router(app_state(&h));
    send(&app, post_json("/api/user/create", register_body("nurse"))).await;
    let user = h
        .users
        .find_by_email("nurse@hospital.example")
        .await
        .unwrap()
        .unwrap();
    let long_ago = Utc::now().checked_sub_months(Months::new(7)).unwrap();
    h.users.touch_last_active(user.id, long_ago).await.unwrap();
    h.service.cleanup_inactive_users(Utc::now()).await.unwrap();

    for password in [support::PASSWORD, "wrong-password"] {
        let response = send(
            &app,
            post_json(
                "/api/user/login",
                json!({ "email": "nurse@hospital.example", "password": password }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(
            json_body(response).await["message"],
            "User is deactivated, because of inactivity"
        );
    }
}

#[tokio::test]
async fn test_current_user_by_cookie_and_bearer() {
    let app = app();
    let (id, token) = sign_up(&app, "nurse").await;

    let by_cookie = Request::builder()
        .uri("/api/current/user")
        .header(header::COOKIE, format!("jwt={}", token))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, by_cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["user"]["id"], id.as_str());
    assert_eq!(body["token"], token.as_str());

    let response = send(&app, get_with_bearer("/api/current/user", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        Request::builder()
            .uri("/api/current/user")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["message"], "User is not authorized");

    let response = send(&app, get_with_bearer("/api/current/user", "forged.token.value")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let app = app();

    for uri in [
        "/api/user/get/all",
        "/api/user/search?search=nurse",
        "/api/user/get/00000000-0000-0000-0000-000000000000",
    ] {
        let response = send(&app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_list_and_get_users() {
    let app = app();
    let (id, token) = sign_up(&app, "nurse").await;
    sign_up(&app, "doctor").await;

    // query={"username":"nurse"}&select=username email
    let uri = "/api/user/get/all?query=%7B%22username%22%3A%22nurse%22%7D&select=username%20email";
    let response = send(&app, get_with_bearer(uri, &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"], id.as_str());
    assert_eq!(users[0]["username"], "nurse");
    assert!(users[0].get("firstname").is_none());

    let response = send(&app, get_with_bearer("/api/user/get/all?limit=1", &token)).await;
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

    let response = send(&app, get_with_bearer(&format!("/api/user/get/{}", id), &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["user"], json!({ "id": id }));

    let response = send(&app, get_with_bearer("/api/user/get/not-a-uuid", &token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "Invalid user ID");

    let response = send(
        &app,
        get_with_bearer(&format!("/api/user/get/{}?populateArray=roles", id), &token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["message"],
        "An unexpected error occurred. Please try again later."
    );
}

#[tokio::test]
async fn test_update_profile() {
    let app = app();
    let (_, token) = sign_up(&app, "nurse").await;

    let response = send(
        &app,
        put_json("/api/user/update", &token, json!({ "firstname": " Florence " })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Update successful");
    assert_eq!(body["user"]["firstname"], "Florence");

    let response = send(
        &app,
        put_json("/api/user/update", &token, json!({ "status": "archived" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    sign_up(&app, "doctor").await;
    let response = send(
        &app,
        put_json(
            "/api/user/update",
            &token,
            json!({ "email": "doctor@hospital.example" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "Email already exists");
}

#[tokio::test]
async fn test_remove_user_and_stale_session() {
    let app = app();
    let (id, token) = sign_up(&app, "nurse").await;

    let remove = Request::builder()
        .method("DELETE")
        .uri(format!("/api/user/remove/{}", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, remove).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Delete successful");
    assert_eq!(body["user"]["id"], id.as_str());

    // The token outlives the account it was issued for
    let response = send(&app, get_with_bearer("/api/current/user", &token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "User data is not complete");

    let remove_again = Request::builder()
        .method("DELETE")
        .uri(format!("/api/user/remove/{}", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, remove_again).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "User not found");
}

#[tokio::test]
async fn test_search_users() {
    let h = harness();
    let app = create_router(app_state(&h));
    let mut florence = registration("fnightingale");
    florence.firstname = "Florence".to_string();
    h.service.register(florence).await.unwrap();
    let (_, token) = sign_up(&app, "nurse").await;

    let response = send(&app, get_with_bearer("/api/user/search?search=florence", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let hits = body.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["username"], "fnightingale");
    assert!(hits[0]["score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = app();
    let (id, token) = sign_up(&app, "nurse").await;

    let logout = Request::builder()
        .method("POST")
        .uri("/api/user/logout")
        .header(header::COOKIE, format!("jwt={}", token))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, logout).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("jwt=;"));
    assert!(cookie.contains("Max-Age=0"));

    let body = json_body(response).await;
    assert_eq!(body["message"], "Logout successful, token cleared.");
    assert_eq!(body["user"]["kind"], "user");
    assert_eq!(body["user"]["id"], id.as_str());

    let anonymous = Request::builder()
        .method("POST")
        .uri("/api/user/logout")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, anonymous).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["user"].is_null());
}
