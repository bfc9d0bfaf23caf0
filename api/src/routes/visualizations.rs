// SPDX-License-Identifier: CC0-1.0

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bitcoin::Txid;
use serde::Deserialize;
use std::str::FromStr;
use trace_engine::TraceResult;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct VisualizationQuery {
    pub txid: String,
    pub vout: Option<u32>,
    pub direction: Option<String>,
    pub max_depth: Option<u32>,
}

async fn resolve_trace(state: &AppState, query: &VisualizationQuery) -> Result<TraceResult, AppError> {
    let txid = Txid::from_str(&query.txid).map_err(|e| AppError::BadRequest(format!("invalid txid: {e}")))?;
    let max_depth = query.max_depth.unwrap_or(state.config.default_trace_depth).min(state.config.max_trace_depth);
    let backward = query.direction.as_deref() == Some("backward");
    if backward {
        Ok(state.engine.trace_backward(txid, max_depth, None).await)
    } else {
        Ok(state.engine.trace_forward(txid, query.vout.unwrap_or(0), max_depth, None).await)
    }
}

pub async fn render(
    State(state): State<AppState>,
    Path((view, format)): Path<(String, String)>,
    Query(query): Query<VisualizationQuery>,
) -> Result<Response, AppError> {
    let result = resolve_trace(&state, &query).await?;

    let response = match (view.as_str(), format.as_str()) {
        ("timeline", "ascii") => render::timeline::ascii(&result).into_response(),
        ("timeline", "mermaid") => render::timeline::mermaid(&result).into_response(),
        ("timeline", "html") => ([(header::CONTENT_TYPE, "text/html")], render::timeline::html(&result)).into_response(),
        ("timeline", "json") => Json(render::timeline::json(&result)).into_response(),
        ("flow-diagram", "ascii") | ("graph", "ascii") => render::graph::ascii(&result).into_response(),
        ("flow-diagram", "mermaid") | ("graph", "mermaid") => render::graph::mermaid(&result).into_response(),
        ("flow-diagram", "html") | ("graph", "html") => {
            ([(header::CONTENT_TYPE, "text/html")], render::graph::html(&result)).into_response()
        }
        ("flow-diagram", "json") | ("graph", "json") => Json(render::graph::json(&result)).into_response(),
        _ => return Err(AppError::BadRequest(format!("unknown view/format: {view}/{format}"))),
    };

    Ok(response)
}
