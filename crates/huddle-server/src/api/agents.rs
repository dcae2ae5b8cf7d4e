// ABOUTME: Agent directory handlers: list visible agents, create or update your own, delete them.
// ABOUTME: Also registers and lists knowledge file metadata for an agent's vector store.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;

use huddle_agent::split_model_id;
use huddle_core::{Agent, KnowledgeFile, is_valid_slug};
use huddle_store::new_agent_id;

use crate::api::error::ApiError;
use crate::app_state::SharedState;
use crate::auth::Identity;

const MAX_NAME_CHARS: usize = 100;
const MAX_PROMPT_CHARS: usize = 16_000;

/// Request body for POST /api/agents. Agents are addressed by slug.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub agent_prompt: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub vector_store_id: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

impl AgentRequest {
    fn validate(&self) -> Result<String, ApiError> {
        let slug = self.slug.trim().trim_start_matches('@').to_lowercase();
        if !is_valid_slug(&slug) {
            return Err(ApiError::BadRequest(format!("invalid agent slug: {}", self.slug)));
        }
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
            return Err(ApiError::BadRequest(format!(
                "agent name must be 1-{} characters",
                MAX_NAME_CHARS
            )));
        }
        if name.chars().any(char::is_control) {
            return Err(ApiError::BadRequest(
                "agent name must not contain control characters".to_string(),
            ));
        }
        if self.agent_prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(ApiError::BadRequest(format!(
                "agent prompt exceeds {} characters",
                MAX_PROMPT_CHARS
            )));
        }
        if let Some(model_id) = &self.model_id {
            split_model_id(model_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        }
        Ok(slug)
    }
}

/// GET /api/agents - Public agents plus the caller's own.
pub async fn list_agents(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Agent>>, ApiError> {
    Ok(Json(state.store.list_agents_for(&identity.user_id).await?))
}

/// POST /api/agents - Create an agent, or update one the caller owns.
pub async fn upsert_agent(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<AgentRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let slug = request.validate()?;

    let existing = state.store.get_agent_by_slug(&slug).await?;
    let (id, status) = match existing {
        Some(agent) if agent.user_id != identity.user_id => {
            return Err(ApiError::Conflict(format!("agent slug already taken: {}", slug)));
        }
        Some(agent) => (agent.id, StatusCode::OK),
        None => (new_agent_id(), StatusCode::CREATED),
    };

    let agent = Agent {
        id,
        slug,
        name: request.name.trim().to_string(),
        agent_prompt: request.agent_prompt,
        model_id: request.model_id.filter(|m| !m.trim().is_empty()),
        vector_store_id: request.vector_store_id.filter(|v| !v.trim().is_empty()),
        is_public: request.is_public,
        user_id: identity.user_id,
    };
    state.store.upsert_agent(&agent).await?;
    let created = status == StatusCode::CREATED;
    tracing::info!(slug = %agent.slug, owner = %agent.user_id, created, "agent saved");

    Ok((status, Json(agent)).into_response())
}

/// Look up an agent the caller owns. Others' agents read as missing.
async fn owned_agent(
    state: &SharedState,
    slug: &str,
    identity: &Identity,
) -> Result<Agent, ApiError> {
    state
        .store
        .get_agent_by_slug(slug)
        .await?
        .filter(|a| a.user_id == identity.user_id)
        .ok_or_else(|| ApiError::NotFound(format!("agent not found: {}", slug)))
}

/// DELETE /api/agents/{slug}
pub async fn delete_agent(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    let agent = owned_agent(&state, &slug, &identity).await?;
    if !state.store.delete_agent(&agent.id, &identity.user_id).await? {
        return Err(ApiError::NotFound(format!("agent not found: {}", slug)));
    }
    tracing::info!(slug = %agent.slug, "agent deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/agents/{slug}/files
pub async fn list_files(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<KnowledgeFile>>, ApiError> {
    let agent = state
        .store
        .get_agent_by_slug(&slug)
        .await?
        .filter(|a| a.is_accessible_to(&identity.user_id))
        .ok_or_else(|| ApiError::NotFound(format!("agent not found: {}", slug)))?;

    let files = match &agent.vector_store_id {
        Some(store_id) => {
            state
                .store
                .get_vector_store_files_by_user(&agent.user_id, store_id)
                .await?
        }
        None => Vec::new(),
    };
    Ok(Json(files))
}

/// POST /api/agents/{slug}/files - Register a file already uploaded to the agent's store.
pub async fn add_file(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Path(slug): Path<String>,
    payload: Result<Json<KnowledgeFile>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(file) = payload?;
    if file.id.trim().is_empty() || file.name.trim().is_empty() {
        return Err(ApiError::BadRequest("file id and name are required".to_string()));
    }

    let agent = owned_agent(&state, &slug, &identity).await?;
    let store_id = agent
        .vector_store_id
        .ok_or_else(|| ApiError::BadRequest(format!("agent @{} has no knowledge store", slug)))?;

    state
        .store
        .add_vector_store_file(&identity.user_id, &store_id, &file)
        .await?;
    Ok((StatusCode::CREATED, Json(file)).into_response())
}
