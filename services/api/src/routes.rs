//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_extra::extract::{CookieJar, Query};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    error::{UserError, UserResult},
    extract::TrimmedJson,
    messages,
    middleware::{SessionToken, require_identity, session_middleware},
    models::Identity,
    query::{GetParams, ListParams},
    service::{LoginRequest, ProfileUpdate, Registration},
    state::AppState,
};

/// Search query string
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search: String,
}

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/user/get/all", get(get_users))
        .route("/user/get/:id", get(get_user))
        .route("/user/remove/:id", delete(remove_user))
        .route("/user/search", get(search_users))
        .route_layer(middleware::from_fn(require_identity));

    let api_routes = Router::new()
        .route("/user/create", post(create_user))
        .route("/user/login", post(login))
        .route("/user/logout", post(logout))
        .route("/user/update", put(update_user))
        .route("/current/user", get(current_user))
        .merge(protected_routes);

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .with_state(state)
}

fn parse_id(raw: &str) -> UserResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| UserError::Validation(messages::INVALID_ID.to_string()))
}

pub async fn welcome() -> impl IntoResponse {
    Json(json!({ "message": messages::WELCOME }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.users.health_check().await;
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database { "ok" } else { "degraded" },
            "service": "hms-api",
            "database": database,
        })),
    )
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": messages::ROUTE_NOT_FOUND })),
    )
}

/// Register a new account
pub async fn create_user(
    State(state): State<AppState>,
    TrimmedJson(registration): TrimmedJson<Registration>,
) -> UserResult<impl IntoResponse> {
    let user = state.users.register(registration).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": messages::USER_REGISTERED,
            "user": user,
        })),
    ))
}

/// Log in and set the session cookie
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    TrimmedJson(credentials): TrimmedJson<LoginRequest>,
) -> UserResult<impl IntoResponse> {
    let outcome = state.users.login(credentials).await?;
    let jar = state
        .cookies
        .attach(jar, outcome.token.clone(), outcome.expires_in);

    Ok((
        jar,
        Json(json!({
            "message": messages::LOGIN,
            "user": outcome.user,
            "token": outcome.token,
        })),
    ))
}

/// Clear the session cookie
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    identity: Option<Extension<Identity>>,
) -> impl IntoResponse {
    let user = state
        .users
        .logout(identity.map(|Extension(identity)| identity))
        .await;

    (
        state.cookies.revoke(jar),
        Json(json!({
            "message": messages::LOGOUT,
            "user": user,
        })),
    )
}

/// Profile of the signed-in user, with the token that authenticated it
pub async fn current_user(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    token: Option<Extension<SessionToken>>,
) -> UserResult<Json<Value>> {
    let user = state
        .users
        .current_user(identity.as_ref().map(|Extension(identity)| identity))?;

    Ok(Json(json!({
        "user": user,
        "token": token.map(|Extension(SessionToken(token))| token),
    })))
}

/// Update the signed-in user's profile
pub async fn update_user(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    TrimmedJson(update): TrimmedJson<ProfileUpdate>,
) -> UserResult<Json<Value>> {
    let user = state
        .users
        .update_profile(identity.as_ref().map(|Extension(identity)| identity), update)
        .await?;

    Ok(Json(json!({
        "message": messages::UPDATE,
        "user": user,
    })))
}

/// List users with filter, sort, limit and select
pub async fn get_users(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> UserResult<Json<Vec<Value>>> {
    Ok(Json(state.users.list_users(params).await?))
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<GetParams>,
) -> UserResult<Json<Value>> {
    let user = state.users.get_user(parse_id(&id)?, &params).await?;
    Ok(Json(json!({ "user": user })))
}

/// Delete a user by ID
pub async fn remove_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> UserResult<Json<Value>> {
    let user = state
        .users
        .delete_user(Some(&identity), parse_id(&id)?)
        .await?;

    Ok(Json(json!({
        "message": messages::DELETE,
        "user": user,
    })))
}

/// Ranked text search over names and email
pub async fn search_users(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> UserResult<impl IntoResponse> {
    Ok(Json(state.users.search_users(&params.search).await?))
}
