use anyhow::{anyhow, Result};
use common::ServerConfig;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, routes, Build, Rocket, State};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::query::{self, RawPageParams, ValidationErrors};
use crate::storage::{self, StoryView};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Response structure for `/`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

/// Validation failures, nested the way API clients already expect:
/// `{"errorsInApi": {"posts": {field: message}}}`.
#[derive(Debug, Serialize)]
pub struct ApiErrors {
    pub posts: ValidationErrors,
}

/// Body of `/posts`. Both variants are sent with status 200.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PostsResponse {
    Stories(Vec<StoryView>),
    Invalid {
        #[serde(rename = "errorsInApi")]
        errors_in_api: ApiErrors,
    },
}

#[get("/")]
async fn index() -> Json<StatusResponse> {
    Json(StatusResponse { status: "success" })
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Paginated stories. Invalid parameters are reported in the body, not
/// through the status code; a store failure is a 500.
#[get("/posts?<params..>")]
async fn posts(state: &State<AppState>, params: RawPageParams) -> Result<Json<PostsResponse>, Status> {
    let request = match query::validate(&params) {
        Ok(request) => request,
        Err(errors) => {
            tracing::debug!("posts: rejected query: {}", errors);
            return Ok(Json(PostsResponse::Invalid {
                errors_in_api: ApiErrors { posts: errors },
            }));
        }
    };

    let stories = storage::select_page(&state.db, &request).await.map_err(|e| {
        tracing::error!("failed to query stories: {}", e);
        Status::InternalServerError
    })?;

    Ok(Json(PostsResponse::Stories(stories)))
}

/// Build the Rocket instance without launching it, applying `[server]`
/// bind/port from the configuration when present.
pub fn build_rocket(state: AppState, server: Option<&ServerConfig>) -> Rocket<Build> {
    let mut fig = rocket::Config::figment();

    if let Some(server) = server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }

    rocket::custom(fig)
        .manage(state)
        .mount("/", routes![index, health, posts])
}

/// Launch the HTTP server and block until Rocket shuts down (ctrl-c, SIGTERM).
pub async fn launch_rocket(state: AppState, server: Option<&ServerConfig>) -> Result<()> {
    tracing::info!("Starting Rocket HTTP server");
    build_rocket(state, server)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
