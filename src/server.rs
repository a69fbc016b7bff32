use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Json, Router, routing::post};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::agent::{Agent, Outcome};
use crate::context::{AccessContext, resolve_token};
use crate::engine::{SecureEngine, Value, render_schema};
use crate::error::ShadowviewError;
use crate::propose::{ChatTurn, QueryProposer};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SecureEngine>,
    pub proposer: Arc<dyn QueryProposer + Send + Sync>,
    pub max_retries: usize,
}

#[derive(Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub token: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Deserialize)]
pub struct SchemaRequest {
    pub identity: AccessContext,
}

#[derive(Serialize)]
pub struct SchemaResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub sql: String,
    pub identity: AccessContext,
}

impl AskResponse {
    fn error(message: String) -> Self {
        Self {
            status: "error".into(),
            message,
            sql: None,
            columns: None,
            rows: None,
            row_count: None,
        }
    }
}

fn status_for(e: &ShadowviewError) -> StatusCode {
    match e {
        ShadowviewError::Identity(_) => StatusCode::UNAUTHORIZED,
        ShadowviewError::InvalidSyntax(_)
        | ShadowviewError::Forbidden(_)
        | ShadowviewError::Execution(_) => StatusCode::BAD_REQUEST,
        ShadowviewError::Config(_) | ShadowviewError::ViewConstruction(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::POST])
        .allow_headers(Any);
    Router::new()
        .route("/v1/query", post({
            let state = state.clone();
            move |Json(req): Json<AskRequest>| {
                let state = state.clone();
                async move {
                    let ctx = resolve_token(Some(req.token.as_str()));
                    if !ctx.has_any_visibility() {
                        warn!(subject = ctx.subject_id(), "rejected token with no visibility");
                        let body = AskResponse::error("Invalid token or no permissions".into());
                        return Ok::<_, (StatusCode, &'static str)>((StatusCode::UNAUTHORIZED, Json(body)));
                    }
                    // The engine is synchronous today; keep it off the runtime threads.
                    let outcome = tokio::task::spawn_blocking(move || {
                        let agent = Agent::new(&state.engine, state.proposer.as_ref(), state.max_retries);
                        agent.process(&req.question, &ctx, &req.history)
                    })
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Join error");
                        (StatusCode::INTERNAL_SERVER_ERROR, "Join error")
                    })?;
                    match outcome {
                        Ok(Outcome::Rows { sql, result, message }) => {
                            info!(rows = result.row_count, "query complete");
                            let body = AskResponse {
                                status: "success".into(),
                                message,
                                sql: Some(sql),
                                columns: Some(result.columns),
                                rows: Some(result.rows),
                                row_count: Some(result.row_count),
                            };
                            Ok((StatusCode::OK, Json(body)))
                        }
                        Ok(Outcome::Chat { message }) => {
                            let body = AskResponse {
                                status: "chat".into(),
                                message,
                                sql: None,
                                columns: None,
                                rows: None,
                                row_count: None,
                            };
                            Ok((StatusCode::OK, Json(body)))
                        }
                        Err(e) => {
                            let status = status_for(&e);
                            warn!(error = %e, code = %status.as_u16(), "query error");
                            Ok((status, Json(AskResponse::error(e.to_string()))))
                        }
                    }
                }
            }
        }))
        .route("/v1/auth/context", post(
            move |Json(req): Json<TokenRequest>| async move {
                Json(resolve_token(Some(req.token.as_str())))
            }
        ))
        .route("/v1/schema", post({
            let state = state.clone();
            move |Json(req): Json<SchemaRequest>| {
                let state = state.clone();
                async move {
                    let result = tokio::task::spawn_blocking(move || {
                        state.engine.describe_schema(&req.identity)
                    })
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Join error");
                        (StatusCode::INTERNAL_SERVER_ERROR, "Join error")
                    })?;
                    match result {
                        Ok(columns) => {
                            let body = SchemaResponse {
                                status: "success".into(),
                                schema: Some(render_schema(&columns)),
                                message: None,
                            };
                            Ok::<_, (StatusCode, &'static str)>((StatusCode::OK, Json(body)))
                        }
                        Err(e) => {
                            let status = status_for(&e);
                            warn!(error = %e, code = %status.as_u16(), "schema error");
                            let body = SchemaResponse {
                                status: "error".into(),
                                schema: None,
                                message: Some(e.to_string()),
                            };
                            Ok((status, Json(body)))
                        }
                    }
                }
            }
        }))
        .route("/v1/execute", post({
            let state = state.clone();
            move |Json(req): Json<ExecuteRequest>| {
                let state = state.clone();
                async move {
                    let ExecuteRequest { sql, identity } = req;
                    let candidate = sql.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        state.engine.execute(&candidate, &identity)
                    })
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Join error");
                        (StatusCode::INTERNAL_SERVER_ERROR, "Join error")
                    })?;
                    match result {
                        Ok(result) => {
                            info!(rows = result.row_count, "execute complete");
                            let body = AskResponse {
                                status: "success".into(),
                                message: format!("Found {} records.", result.row_count),
                                sql: Some(sql),
                                columns: Some(result.columns),
                                rows: Some(result.rows),
                                row_count: Some(result.row_count),
                            };
                            Ok::<_, (StatusCode, &'static str)>((StatusCode::OK, Json(body)))
                        }
                        Err(e) => {
                            let status = status_for(&e);
                            warn!(error = %e, code = %status.as_u16(), "execute error");
                            Ok((status, Json(AskResponse::error(e.to_string()))))
                        }
                    }
                }
            }
        }))
        .layer(cors)
}
