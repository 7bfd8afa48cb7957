//! Research handlers

use super::types::{
    ApiResponse, ClarifyRequest, ClarifyResponse, RefineRequest, RefineResponse, ResearchResponse,
};
use crate::{AppState, WebResult};
use axum::{extract::rejection::JsonRejection, extract::State, response::Json};
use quarry_research::{ResearchOrchestrator, ResearchQuery};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run the pipeline for an already structured query
pub async fn conduct_research(
    State(state): State<AppState>,
    payload: Result<Json<ResearchQuery>, JsonRejection>,
) -> WebResult<Json<ApiResponse<ResearchResponse>>> {
    let Json(query) = payload?;
    info!("Research requested for topic: {}", query.topic);

    // Dropping the handler (client went away) cancels the run
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let output = state
        .orchestrator
        .run_from_refined_query(query, cancel)
        .await?;

    Ok(Json(ApiResponse::ok(ResearchResponse::from(output))))
}

/// Clarifying questions for a topic
pub async fn clarify_topic(
    State(state): State<AppState>,
    payload: Result<Json<ClarifyRequest>, JsonRejection>,
) -> WebResult<Json<ApiResponse<ClarifyResponse>>> {
    let Json(request) = payload?;

    let questions = state
        .orchestrator
        .get_clarifying_questions(&request.topic)
        .await?;
    let prompt = ResearchOrchestrator::format_clarifying_prompt(&questions);

    Ok(Json(ApiResponse::ok(ClarifyResponse { questions, prompt })))
}

/// Turn a clarification answer into a structured query
pub async fn refine_query(
    State(state): State<AppState>,
    payload: Result<Json<RefineRequest>, JsonRejection>,
) -> WebResult<Json<ApiResponse<RefineResponse>>> {
    let Json(request) = payload?;

    let query = state
        .orchestrator
        .process_answer(&request.topic, &request.question, &request.answer)
        .await?;

    Ok(Json(ApiResponse::ok(RefineResponse { query })))
}
