use std::time::Duration;

use axum::{
    extract::{Path, Query, RawQuery},
    http::{StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;

/// What `GET /echo` saw of the incoming request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub path: String,
    pub query: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub title: String,
    pub skills: Vec<String>,
}

#[derive(Deserialize)]
pub struct SlowParams {
    #[serde(default)]
    pub ms: u64,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", get(echo_query).post(echo_body))
        .route("/empty", get(empty))
        .route("/status/{code}", get(status))
        .route("/slow", get(slow))
        .route("/profile", get(profile))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo_query(uri: Uri, RawQuery(query): RawQuery) -> Json<Echo> {
    Json(Echo {
        path: uri.path().to_string(),
        query: query.unwrap_or_default(),
    })
}

async fn echo_body(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {}", status.as_u16()))
}

async fn slow(Query(params): Query<SlowParams>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(params.ms)).await;
    Json(serde_json::json!({ "slept": params.ms }))
}

async fn profile() -> Json<Profile> {
    Json(Profile {
        name: "Ada Lovelace".to_string(),
        title: "Analyst".to_string(),
        skills: vec!["mathematics".to_string(), "poetry".to_string()],
    })
}
