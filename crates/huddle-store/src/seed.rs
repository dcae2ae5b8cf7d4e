// ABOUTME: Loads a YAML agent directory file and upserts its agents into a ChatStore at startup.
// ABOUTME: Seeded agents default to public and owned by the `system` user.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use ulid::Ulid;

use huddle_core::{Agent, is_valid_slug};

use crate::store::{ChatStore, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("io error reading agents file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid agents yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid agent slug: {0}")]
    InvalidSlug(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
struct SeedAgent {
    #[serde(default)]
    id: Option<String>,
    slug: String,
    name: String,
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    vector_store: Option<String>,
    #[serde(default = "default_public")]
    public: bool,
    #[serde(default = "default_owner")]
    owner: String,
}

fn default_public() -> bool {
    true
}

fn default_owner() -> String {
    "system".to_string()
}

/// Parse agents from YAML text. Ids are derived from the slug when absent so
/// reseeding the same file updates rows instead of duplicating them.
pub fn parse_agents(yaml: &str) -> Result<Vec<Agent>, SeedError> {
    let entries: Vec<SeedAgent> = serde_yaml::from_str(yaml)?;
    entries
        .into_iter()
        .map(|entry| {
            let slug = entry.slug.trim().to_lowercase();
            if !is_valid_slug(&slug) {
                return Err(SeedError::InvalidSlug(entry.slug));
            }
            Ok(Agent {
                id: entry.id.unwrap_or_else(|| format!("seed-{}", slug)),
                slug,
                name: entry.name,
                agent_prompt: entry.prompt,
                model_id: entry.model,
                vector_store_id: entry.vector_store,
                is_public: entry.public,
                user_id: entry.owner,
            })
        })
        .collect()
}

pub fn load_agents_file(path: &Path) -> Result<Vec<Agent>, SeedError> {
    let yaml = std::fs::read_to_string(path)?;
    parse_agents(&yaml)
}

/// Upsert every agent, returning how many were written.
pub async fn seed_agents(store: &dyn ChatStore, agents: &[Agent]) -> Result<usize, SeedError> {
    for agent in agents {
        store.upsert_agent(agent).await?;
        tracing::debug!(slug = %agent.slug, "seeded agent");
    }
    Ok(agents.len())
}

/// A fresh agent id for agents created through the API.
pub fn new_agent_id() -> String {
    Ulid::new().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;

    const YAML: &str = r#"
- slug: Ops
  name: Ops Helper
  prompt: You know our deploy pipeline.
  model: openai/gpt-5
- slug: hr
  name: HR
  prompt: Answer policy questions.
  vector_store: vs_handbook
  public: false
  owner: alice
"#;

    #[test]
    fn parses_agents_with_defaults() {
        let agents = parse_agents(YAML).unwrap();
        assert_eq!(agents.len(), 2);

        assert_eq!(agents[0].slug, "ops");
        assert_eq!(agents[0].id, "seed-ops");
        assert_eq!(agents[0].model_id.as_deref(), Some("openai/gpt-5"));
        assert!(agents[0].is_public);
        assert_eq!(agents[0].user_id, "system");

        assert!(!agents[1].is_public);
        assert_eq!(agents[1].user_id, "alice");
        assert_eq!(agents[1].vector_store_id.as_deref(), Some("vs_handbook"));
    }

    #[test]
    fn rejects_invalid_slug() {
        let err = parse_agents("- slug: '-bad'\n  name: x\n  prompt: y\n").unwrap_err();
        assert!(matches!(err, SeedError::InvalidSlug(_)));
    }

    #[tokio::test]
    async fn seeding_twice_updates_in_place() {
        let store = SqliteStore::open_in_memory().unwrap();
        let agents = parse_agents(YAML).unwrap();

        assert_eq!(seed_agents(&store, &agents).await.unwrap(), 2);
        assert_eq!(seed_agents(&store, &agents).await.unwrap(), 2);

        assert_eq!(store.list_agents_for("alice").await.unwrap().len(), 2);
        assert_eq!(store.list_agents_for("bob").await.unwrap().len(), 1);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("agents.yaml");
        std::fs::write(&path, YAML).unwrap();
        assert_eq!(load_agents_file(&path).unwrap().len(), 2);
    }
}
