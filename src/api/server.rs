//! Search endpoint
//!
//! Transport-level failures (missing/empty input) are client errors; every
//! domain-level outcome (success, no-results, exhausted retries) is a
//! structured per-job status in the body. Only genuinely unhandled internal
//! failures become server errors.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{error, info};

use crate::models::DateRange;
use crate::orchestrator::BatchScheduler;

/// Shared handler state
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<BatchScheduler>,
}

/// Request body for `POST /buscar`
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(rename = "DSProcesso")]
    ds_processo: Option<JsonValue>,
    #[serde(rename = "DataInicio")]
    data_inicio: Option<String>,
    #[serde(rename = "DataFim")]
    data_fim: Option<String>,
}

/// The validated identifier input: one or many
enum IdentifierInput {
    Single(String),
    Many(Vec<String>),
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/buscar", post(buscar_handler))
        .with_state(state)
}

/// Binds the listener and serves the router until shutdown
pub async fn serve(scheduler: Arc<BatchScheduler>, port: u16) -> anyhow::Result<()> {
    let app = router(ApiState { scheduler });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("🌐 API rodando na porta {}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn buscar_handler(
    State(state): State<ApiState>,
    Json(request): Json<SearchRequest>,
) -> (StatusCode, Json<JsonValue>) {
    let input = match parse_identifiers(request.ds_processo) {
        Ok(input) => input,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": message })));
        }
    };

    let date_range = match (request.data_inicio, request.data_fim) {
        (None, None) => None,
        (Some(start), Some(end)) => Some(DateRange { start, end }),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "DataInicio e DataFim devem ser informados juntos" })),
            );
        }
    };

    let identifiers = match &input {
        IdentifierInput::Single(identifier) => vec![identifier.clone()],
        IdentifierInput::Many(identifiers) => identifiers.clone(),
    };

    match state.scheduler.run(identifiers, date_range).await {
        Ok(reports) => {
            let body = match input {
                IdentifierInput::Single(_) => match reports.into_iter().next() {
                    Some(report) => json!(report),
                    None => json!({ "error": "Nenhum resultado encontrado" }),
                },
                IdentifierInput::Many(_) => json!(reports),
            };
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            error!("unhandled batch failure: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Erro ao processar o request",
                    "details": e.to_string(),
                })),
            )
        }
    }
}

/// Accepts one identifier or a non-empty array of identifiers
fn parse_identifiers(value: Option<JsonValue>) -> Result<IdentifierInput, String> {
    match value {
        None | Some(JsonValue::Null) => Err("DSProcesso é obrigatório".to_string()),
        Some(JsonValue::String(identifier)) => {
            let identifier = identifier.trim().to_string();
            if identifier.is_empty() {
                Err("DSProcesso é obrigatório".to_string())
            } else {
                Ok(IdentifierInput::Single(identifier))
            }
        }
        Some(JsonValue::Array(values)) => {
            if values.is_empty() {
                return Err("DSProcesso não pode ser uma lista vazia".to_string());
            }
            let mut identifiers = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    JsonValue::String(identifier) if !identifier.trim().is_empty() => {
                        identifiers.push(identifier.trim().to_string());
                    }
                    _ => {
                        return Err(
                            "DSProcesso deve ser uma string ou lista de strings".to_string()
                        );
                    }
                }
            }
            Ok(IdentifierInput::Many(identifiers))
        }
        Some(_) => Err("DSProcesso deve ser uma string ou lista de strings".to_string()),
    }
}
