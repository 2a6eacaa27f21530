//!
//! Expense tracker HTTP API
//! ------------------------
//! Axum routes under `/api`. Each protected handler declares an `AuthRequirement`, asks the
//! `SessionAuthority` for a verdict from the request cookies, and matches on it.
//!
//! Responsibilities:
//! - Register/login/logout; login issues the access + refresh cookie pair.
//! - Categories, transactions and groups backed by the in-memory `SharedStore`.
//! - Propagating a renewed access token: re-set the `accessToken` cookie and add
//!   `refreshedTokenMessage` to the success body.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{
    AuthRequirement, AuthVerdict, Denial, Renewal, SessionAuthority, SessionClaims, TokenCodec, TokenIssuer,
    ADMIN_ROLE, REGULAR_ROLE,
};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::security;
use crate::store::SharedStore;
use crate::transport;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub authority: Arc<SessionAuthority>,
    pub issuer: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        let codec = TokenCodec::new(&config.secret);
        Self {
            store: SharedStore::new(),
            authority: Arc::new(SessionAuthority::new(codec.clone(), config.access_ttl)),
            issuer: Arc::new(TokenIssuer::new(codec, config.access_ttl, config.refresh_ttl)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "expensetracker ok" }))
        .route("/api/register", post(register))
        .route("/api/admin", post(register_admin))
        .route("/api/login", post(login))
        .route("/api/logout", get(logout))
        .route("/api/users", get(list_users))
        .route("/api/users/{username}", get(get_user))
        .route("/api/users/{username}/transactions", post(create_transaction).get(user_transactions))
        .route("/api/categories", post(create_category).get(list_categories))
        .route("/api/transactions", get(all_transactions))
        .route("/api/groups", post(create_group).get(list_groups))
        .route("/api/groups/{name}", get(get_group))
        .route("/api/groups/{name}/transactions", get(group_transactions))
        .with_state(state)
}

/// Serve the API on an already bound listener until the task is dropped.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!(target: "startup", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, AppState::new(&config)).await
}

// ---------------------------------------------------------------------------
// Session gate
// ---------------------------------------------------------------------------

/// Caller whose session satisfied a requirement.
struct Session {
    claims: SessionClaims,
    renewal: Option<Renewal>,
}

fn authorize(state: &AppState, headers: &HeaderMap, requirement: &AuthRequirement) -> AppResult<Session> {
    authorize_any(state, headers, std::slice::from_ref(requirement))
}

/// First requirement that allows wins; otherwise the last denial is reported.
fn authorize_any(state: &AppState, headers: &HeaderMap, requirements: &[AuthRequirement]) -> AppResult<Session> {
    let (access, refresh) = transport::session_tokens(headers);
    let mut denial = Denial::MissingCredentials;
    for requirement in requirements {
        let outcome = state.authority.verify(access.as_deref(), refresh.as_deref(), requirement);
        match outcome.verdict {
            AuthVerdict::Allowed => {
                let claims = outcome.claims
                    .ok_or_else(|| AppError::internal("auth", "allowed verdict without claims"))?;
                return Ok(Session { claims, renewal: outcome.renewal });
            }
            AuthVerdict::Denied(d) => denial = d,
        }
    }
    Err(denial.into())
}

/// Success body `{data, refreshedTokenMessage?}`, re-setting the access cookie on renewal.
fn reply(state: &AppState, session: &Session, status: StatusCode, data: Value) -> Response {
    let mut headers = HeaderMap::new();
    let mut body = json!({ "data": data });
    if let Some(renewal) = &session.renewal {
        if let Some(cookie) = transport::access_cookie(&renewal.access_token, state.authority.access_ttl()) {
            headers.append(header::SET_COOKIE, cookie);
        }
        body["refreshedTokenMessage"] = json!(renewal.notice);
    }
    (status, headers, Json(body)).into_response()
}

fn non_empty(fields: &[&str]) -> AppResult<()> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(AppError::user("missing_parameters", "Missing or empty parameters"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Account handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn register(State(state): State<AppState>, payload: Result<Json<RegisterPayload>, JsonRejection>) -> AppResult<Response> {
    let Json(payload) = payload?;
    create_account(&state, payload, REGULAR_ROLE)
}

async fn register_admin(State(state): State<AppState>, payload: Result<Json<RegisterPayload>, JsonRejection>) -> AppResult<Response> {
    let Json(payload) = payload?;
    create_account(&state, payload, ADMIN_ROLE)
}

fn create_account(state: &AppState, payload: RegisterPayload, role: &str) -> AppResult<Response> {
    non_empty(&[payload.username.as_str(), payload.email.as_str(), payload.password.as_str()])?;
    if !payload.email.contains('@') {
        return Err(AppError::user("invalid_email", "Invalid email format"));
    }
    let hash = security::hash_password(&payload.password)?;
    let user = state.store.0.write().register_user(payload.username.trim(), payload.email.trim(), hash, role)?;
    info!(target: "http", username = %user.username, role = %user.role, "user registered");
    let message = if role == ADMIN_ROLE { "Admin added successfully" } else { "User added successfully" };
    Ok((StatusCode::OK, Json(json!({ "data": { "message": message } }))).into_response())
}

async fn login(State(state): State<AppState>, payload: Result<Json<LoginPayload>, JsonRejection>) -> AppResult<Response> {
    let Json(payload) = payload?;
    non_empty(&[payload.email.as_str(), payload.password.as_str()])?;
    let user = state.store.0.read().user_by_email(payload.email.trim()).cloned()
        .ok_or_else(|| AppError::user("not_registered", "please you need to register"))?;
    if !security::verify_password(&user.password_hash, &payload.password) {
        return Err(AppError::user("wrong_credentials", "wrong credentials"));
    }

    let pair = state.issuer.issue_pair(&user.identity())?;
    state.store.0.write().set_refresh_token(&user.username, Some(pair.refresh_token.clone()))?;

    let mut headers = HeaderMap::new();
    if let Some(c) = transport::access_cookie(&pair.access_token, state.issuer.access_ttl) {
        headers.append(header::SET_COOKIE, c);
    }
    if let Some(c) = transport::refresh_cookie(&pair.refresh_token, state.issuer.refresh_ttl) {
        headers.append(header::SET_COOKIE, c);
    }
    info!(target: "http", username = %user.username, "login");
    Ok((StatusCode::OK, headers, Json(json!({ "data": pair }))).into_response())
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let (_, refresh) = transport::session_tokens(&headers);
    let refresh = refresh
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::user("missing_refresh_token", "Missing refresh token"))?;
    let username = {
        let mut store = state.store.0.write();
        let username = store.user_by_refresh_token(&refresh).map(|u| u.username.clone())
            .ok_or_else(|| AppError::user("user_not_found", "User not found"))?;
        store.set_refresh_token(&username, None)?;
        username
    };
    let mut out = HeaderMap::new();
    transport::clear_session_cookies(&mut out);
    info!(target: "http", username = %username, "logout");
    Ok((StatusCode::OK, out, Json(json!({ "data": { "message": "User logged out" } }))).into_response())
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let session = authorize(&state, &headers, &AuthRequirement::Admin)?;
    let users = state.store.0.read().users();
    Ok(reply(&state, &session, StatusCode::OK, json!(users)))
}

async fn get_user(State(state): State<AppState>, headers: HeaderMap, Path(username): Path<String>) -> AppResult<Response> {
    let session = authorize_any(&state, &headers, &[AuthRequirement::user(&username), AuthRequirement::Admin])?;
    let user = state.store.0.read().user(&username).map(|u| u.view())
        .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))?;
    Ok(reply(&state, &session, StatusCode::OK, json!(user)))
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CategoryPayload {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    color: String,
}

async fn create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CategoryPayload>, JsonRejection>,
) -> AppResult<Response> {
    let session = authorize(&state, &headers, &AuthRequirement::Admin)?;
    let Json(payload) = payload?;
    non_empty(&[payload.kind.as_str(), payload.color.as_str()])?;
    let category = state.store.0.write().create_category(payload.kind.trim(), payload.color.trim())?;
    Ok(reply(&state, &session, StatusCode::OK, json!(category)))
}

async fn list_categories(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let session = authorize(&state, &headers, &AuthRequirement::Simple)?;
    let categories = state.store.0.read().categories();
    Ok(reply(&state, &session, StatusCode::OK, json!(categories)))
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TransactionPayload {
    #[serde(default)]
    username: String,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(rename = "type", default)]
    kind: String,
}

async fn create_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
    payload: Result<Json<TransactionPayload>, JsonRejection>,
) -> AppResult<Response> {
    let session = authorize(&state, &headers, &AuthRequirement::user(&username))?;
    let Json(payload) = payload?;
    non_empty(&[payload.username.as_str(), payload.kind.as_str()])?;
    if payload.username != username {
        return Err(AppError::user("username_mismatch", "Username in the body does not match the route"));
    }
    let amount = payload.amount.filter(|a| a.is_finite())
        .ok_or_else(|| AppError::user("invalid_amount", "Amount must be a number"))?;
    let tx = state.store.0.write().create_transaction(&username, amount, payload.kind.trim())?;
    Ok(reply(&state, &session, StatusCode::OK, json!(tx)))
}

/// Transactions joined with their category color.
fn with_color(state: &AppState, txs: Vec<crate::store::Transaction>) -> Value {
    let store = state.store.0.read();
    let rows: Vec<Value> = txs
        .into_iter()
        .map(|t| {
            let color = store.category(&t.kind).map(|c| c.color.clone()).unwrap_or_default();
            json!({ "username": t.username, "amount": t.amount, "type": t.kind, "date": t.date, "color": color })
        })
        .collect();
    json!(rows)
}

async fn user_transactions(State(state): State<AppState>, headers: HeaderMap, Path(username): Path<String>) -> AppResult<Response> {
    let session = authorize(&state, &headers, &AuthRequirement::user(&username))?;
    let txs = {
        let store = state.store.0.read();
        if store.user(&username).is_none() {
            return Err(AppError::not_found("user_not_found", "User not found"));
        }
        store.transactions_by_users(std::slice::from_ref(&username))
    };
    let data = with_color(&state, txs);
    Ok(reply(&state, &session, StatusCode::OK, data))
}

async fn all_transactions(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let session = authorize(&state, &headers, &AuthRequirement::Admin)?;
    let txs = state.store.0.read().transactions();
    let data = with_color(&state, txs);
    Ok(reply(&state, &session, StatusCode::OK, data))
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    member_emails: Vec<String>,
}

async fn create_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GroupPayload>, JsonRejection>,
) -> AppResult<Response> {
    let session = authorize(&state, &headers, &AuthRequirement::Simple)?;
    let Json(payload) = payload?;
    non_empty(&[payload.name.as_str()])?;
    let created = state.store.0.write().create_group(payload.name.trim(), &session.claims.email, &payload.member_emails)?;
    info!(target: "http", group = %created.group.name, members = created.group.members.len(), "group created");
    Ok(reply(&state, &session, StatusCode::OK, json!(created)))
}

async fn list_groups(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let session = authorize(&state, &headers, &AuthRequirement::Admin)?;
    let groups = state.store.0.read().groups();
    Ok(reply(&state, &session, StatusCode::OK, json!(groups)))
}

/// Require a session, then the caller's membership in the group or the admin role.
/// Anonymous callers get 401 before the group name is looked up.
fn group_session(state: &AppState, headers: &HeaderMap, name: &str) -> AppResult<(Session, crate::store::Group)> {
    authorize(state, headers, &AuthRequirement::Simple)?;
    let group = state.store.0.read().group(name).cloned()
        .ok_or_else(|| AppError::not_found("group_not_found", "Group not found"))?;
    let session = authorize_any(
        state,
        headers,
        &[AuthRequirement::group(group.members.iter().cloned()), AuthRequirement::Admin],
    )?;
    Ok((session, group))
}

async fn get_group(State(state): State<AppState>, headers: HeaderMap, Path(name): Path<String>) -> AppResult<Response> {
    let (session, group) = group_session(&state, &headers, &name)?;
    Ok(reply(&state, &session, StatusCode::OK, json!(group)))
}

async fn group_transactions(State(state): State<AppState>, headers: HeaderMap, Path(name): Path<String>) -> AppResult<Response> {
    let (session, group) = group_session(&state, &headers, &name)?;
    let txs = {
        let store = state.store.0.read();
        store.transactions_by_users(&store.member_usernames(&group))
    };
    let data = with_color(&state, txs);
    Ok(reply(&state, &session, StatusCode::OK, data))
}
