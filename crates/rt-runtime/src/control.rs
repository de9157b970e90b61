//! Control-plane HTTP handlers (spec §6 "Control endpoints"). Shaped
//! like the rest of the workspace's actix handlers: `web::Data` for
//! shared state, explicit match-based error-to-response mapping, no
//! centralized error middleware.

use crate::manager::{RuntimeError, RuntimeManager};
use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use std::sync::Arc;

const DEFAULT_GRACEFUL_TIMEOUT_MS: u64 = 10_000;

fn map_error(err: RuntimeError) -> HttpResponse {
    match err {
        RuntimeError::OperationConflict(op) => HttpResponse::Conflict().json(serde_json::json!({
            "error": "operation_conflict",
            "message": format!("operation '{op}' is already in progress"),
        })),
        RuntimeError::Config(e) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": "config_error",
            "message": e.to_string(),
        })),
        RuntimeError::Other(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "internal_error",
            "message": e.to_string(),
        })),
    }
}

pub async fn reload_config(runtime: web::Data<Arc<RuntimeManager>>) -> impl Responder {
    match runtime.reload_config().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({"status": "reloaded"})),
        Err(e) => map_error(e),
    }
}

pub async fn restart(runtime: web::Data<Arc<RuntimeManager>>) -> impl Responder {
    match runtime.restart(DEFAULT_GRACEFUL_TIMEOUT_MS).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({"status": "restarted"})),
        Err(e) => map_error(e),
    }
}

pub async fn clear_order_board(runtime: web::Data<Arc<RuntimeManager>>) -> impl Responder {
    match runtime.singleton_order_board().await {
        Some(board) => {
            board.clear_order_board("manual_clear").await;
            HttpResponse::Ok().json(serde_json::json!({"status": "order_board_cleared"}))
        }
        None => HttpResponse::Conflict().json(serde_json::json!({
            "error": "not_running",
            "message": "runtime is not running",
        })),
    }
}

pub async fn clear_gear_state(runtime: web::Data<Arc<RuntimeManager>>) -> impl Responder {
    match runtime.singleton_gear().await {
        Some(gear) => match gear.reset().await {
            Ok(()) => HttpResponse::Ok().json(serde_json::json!({"status": "gear_state_cleared"})),
            Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": e.to_string(),
            })),
        },
        None => HttpResponse::Conflict().json(serde_json::json!({
            "error": "not_running",
            "message": "runtime is not running",
        })),
    }
}

#[derive(Serialize)]
struct StatusResponse {
    state: String,
    runtime: RuntimeBlock,
    operation: Option<OperationBlock>,
    updated_at_ms: i64,
}

#[derive(Serialize)]
struct RuntimeBlock {
    active: bool,
}

#[derive(Serialize)]
struct OperationBlock {
    name: String,
    started_at_ms: i64,
}

pub async fn status(runtime: web::Data<Arc<RuntimeManager>>) -> impl Responder {
    let status = runtime.get_status().await;
    HttpResponse::Ok().json(StatusResponse {
        state: format!("{:?}", status.state),
        runtime: RuntimeBlock { active: status.active },
        operation: status.operation.map(|op| OperationBlock {
            name: op.name,
            started_at_ms: op.started_at_ms,
        }),
        updated_at_ms: status.updated_at_ms,
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/control")
            .route("/reload-config", web::post().to(reload_config))
            .route("/restart", web::post().to(restart))
            .route("/clear-order-board", web::post().to(clear_order_board))
            .route("/clear-gear-state", web::post().to(clear_gear_state))
            .route("/status", web::get().to(status)),
    );
}
