// ABOUTME: SQLite-backed ChatStore for agents, chats, messages, knowledge files, and usage.
// ABOUTME: Queries run on a blocking thread against a single mutex-guarded connection.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use huddle_core::{Agent, Chat, ChatMessage, KnowledgeFile, TurnUsage};

use crate::store::{ChatStore, StoreError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS agents (
        id TEXT PRIMARY KEY,
        slug TEXT NOT NULL UNIQUE COLLATE NOCASE,
        name TEXT NOT NULL,
        agent_prompt TEXT NOT NULL,
        model_id TEXT,
        vector_store_id TEXT,
        is_public INTEGER NOT NULL DEFAULT 0,
        user_id TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS vector_store_files (
        id TEXT NOT NULL,
        store_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        PRIMARY KEY (store_id, id)
    );

    CREATE TABLE IF NOT EXISTS chats (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        chat_id TEXT NOT NULL,
        role TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (chat_id) REFERENCES chats(id)
    );

    CREATE INDEX IF NOT EXISTS messages_by_chat ON messages(chat_id);

    CREATE TABLE IF NOT EXISTS usage (
        chat_id TEXT NOT NULL,
        model_id TEXT NOT NULL,
        input_tokens INTEGER NOT NULL,
        output_tokens INTEGER NOT NULL,
        recorded_at TEXT NOT NULL
    );";

/// A ChatStore backed by one SQLite database file.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database at `path`, creating the schema if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    /// An empty store that lives only as long as the process.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut guard)
        })
        .await?
    }
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn agent_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        agent_prompt: row.get(3)?,
        model_id: row.get(4)?,
        vector_store_id: row.get(5)?,
        is_public: row.get(6)?,
        user_id: row.get(7)?,
    })
}

const AGENT_COLUMNS: &str =
    "id, slug, name, agent_prompt, model_id, vector_store_id, is_public, user_id";

#[async_trait]
impl ChatStore for SqliteStore {
    async fn get_agent_by_slug(&self, slug: &str) -> Result<Option<Agent>, StoreError> {
        let slug = slug.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM agents WHERE slug = ?1 COLLATE NOCASE",
                AGENT_COLUMNS
            );
            let agent = conn
                .query_row(&sql, params![slug], agent_from_row)
                .optional()?;
            Ok(agent)
        })
        .await
    }

    async fn list_agents_for(&self, user_id: &str) -> Result<Vec<Agent>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM agents WHERE is_public = 1 OR user_id = ?1 ORDER BY slug ASC",
                AGENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![user_id], agent_from_row)?;

            let mut agents = Vec::new();
            for row in rows {
                agents.push(row?);
            }
            Ok(agents)
        })
        .await
    }

    async fn upsert_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        let agent = agent.clone();
        self.with_conn(move |conn| {
            let result = conn.execute(
                "INSERT INTO agents (id, slug, name, agent_prompt, model_id, vector_store_id, is_public, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    slug = excluded.slug,
                    name = excluded.name,
                    agent_prompt = excluded.agent_prompt,
                    model_id = excluded.model_id,
                    vector_store_id = excluded.vector_store_id,
                    is_public = excluded.is_public",
                params![
                    agent.id,
                    agent.slug,
                    agent.name,
                    agent.agent_prompt,
                    agent.model_id,
                    agent.vector_store_id,
                    agent.is_public,
                    agent.user_id,
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::SlugTaken(agent.slug))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn delete_agent(&self, id: &str, owner: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        let owner = owner.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM agents WHERE id = ?1 AND user_id = ?2",
                params![id, owner],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn get_vector_store_files_by_user(
        &self,
        user_id: &str,
        store_id: &str,
    ) -> Result<Vec<KnowledgeFile>, StoreError> {
        let user_id = user_id.to_string();
        let store_id = store_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, size_bytes FROM vector_store_files
                 WHERE user_id = ?1 AND store_id = ?2 ORDER BY name ASC",
            )?;
            let rows = stmt.query_map(params![user_id, store_id], |row| {
                Ok(KnowledgeFile {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    size_bytes: row.get(2)?,
                })
            })?;

            let mut files = Vec::new();
            for row in rows {
                files.push(row?);
            }
            Ok(files)
        })
        .await
    }

    async fn add_vector_store_file(
        &self,
        user_id: &str,
        store_id: &str,
        file: &KnowledgeFile,
    ) -> Result<(), StoreError> {
        let user_id = user_id.to_string();
        let store_id = store_id.to_string();
        let file = file.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO vector_store_files (id, store_id, user_id, name, size_bytes)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(store_id, id) DO UPDATE SET
                    name = excluded.name,
                    size_bytes = excluded.size_bytes",
                params![file.id, store_id, user_id, file.name, file.size_bytes],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let chat = conn
                .query_row(
                    "SELECT id, user_id, title, created_at FROM chats WHERE id = ?1",
                    params![id],
                    |row| {
                        let created_at: String = row.get(3)?;
                        Ok(Chat {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            title: row.get(2)?,
                            created_at: parse_timestamp(3, &created_at)?,
                        })
                    },
                )
                .optional()?;
            Ok(chat)
        })
        .await
    }

    async fn save_chat(&self, chat: &Chat) -> Result<(), StoreError> {
        let chat = chat.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO chats (id, user_id, title, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET title = excluded.title",
                params![
                    chat.id,
                    chat.user_id,
                    chat.title,
                    chat.created_at.to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let chat_id = chat_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare("SELECT body FROM messages WHERE chat_id = ?1 ORDER BY rowid ASC")?;
            let rows = stmt.query_map(params![chat_id], |row| row.get::<_, String>(0))?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(serde_json::from_str(&row?)?);
            }
            Ok(messages)
        })
        .await
    }

    async fn save_messages(
        &self,
        chat_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), StoreError> {
        if messages.is_empty() {
            return Ok(());
        }
        let chat_id = chat_id.to_string();
        let messages = messages.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO messages (id, chat_id, role, body, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET body = excluded.body
                     WHERE messages.chat_id = excluded.chat_id",
                )?;
                for message in &messages {
                    let written = stmt.execute(params![
                        message.id,
                        chat_id,
                        message.role.as_str(),
                        serde_json::to_string(message)?,
                        message.metadata.created_at.to_rfc3339(),
                    ])?;
                    // Zero rows means the id lives in another chat; the
                    // uncommitted transaction rolls back on drop.
                    if written == 0 {
                        return Err(StoreError::MessageIdTaken(message.id.clone()));
                    }
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn record_usage(&self, usage: &TurnUsage) -> Result<(), StoreError> {
        let usage = usage.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO usage (chat_id, model_id, input_tokens, output_tokens, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    usage.chat_id,
                    usage.model_id,
                    usage.input_tokens,
                    usage.output_tokens,
                    Utc::now().to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await
    }
}
