// ABOUTME: Configuration loading and validation for the huddle server.
// ABOUTME: Reads HUDDLE_* environment variables and refuses insecure or malformed combinations.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use huddle_agent::split_model_id;

pub const DEFAULT_BIND: &str = "127.0.0.1:7441";
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4-5-20250929";
pub const DEFAULT_MAX_AGENT_STEPS: u32 = 5;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HUDDLE_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("HUDDLE_BIND {0} is not a loopback address; set HUDDLE_ALLOW_REMOTE=true to expose the server")]
    RemoteBindNotAllowed(SocketAddr),

    #[error("HUDDLE_ALLOW_REMOTE is true but HUDDLE_AUTH_TOKENS is not set; refusing to start without authentication")]
    RemoteWithoutToken,

    #[error("HUDDLE_AUTH_TOKENS entry must look like token=user: {0}")]
    InvalidAuthToken(String),

    #[error("HUDDLE_MAX_AGENT_STEPS must be a positive integer: {0}")]
    InvalidMaxSteps(String),

    #[error("HUDDLE_DEFAULT_MODEL is not a known model id: {0}")]
    InvalidDefaultModel(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct HuddleConfig {
    pub home: PathBuf,
    pub bind: SocketAddr,
    pub allow_remote: bool,
    /// Bearer token to user id. Empty means single-user local mode.
    pub auth_tokens: HashMap<String, String>,
    pub admin_users: HashSet<String>,
    pub default_model: String,
    pub max_agent_steps: u32,
    pub tools_url: Option<String>,
    pub agents_file: Option<PathBuf>,
}

impl HuddleConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - HUDDLE_HOME: data directory (default: ~/.huddle)
    /// - HUDDLE_BIND: socket address to bind (default: 127.0.0.1:7441)
    /// - HUDDLE_ALLOW_REMOTE: allow non-loopback binds (default: false)
    /// - HUDDLE_AUTH_TOKENS: comma-separated `token=user` pairs (optional)
    /// - HUDDLE_ADMIN_USERS: comma-separated user ids with admin tools (optional)
    /// - HUDDLE_DEFAULT_MODEL: model for the primary turn and unpinned agents
    /// - HUDDLE_MAX_AGENT_STEPS: tool-loop budget per agent run (default: 5)
    /// - HUDDLE_TOOLS_URL: base URL of the external tool gateway (optional)
    /// - HUDDLE_AGENTS_FILE: YAML file of agents to seed at startup (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = non_empty_var("HUDDLE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/tmp"))
                    .join(".huddle")
            });

        let bind_str = non_empty_var("HUDDLE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let allow_remote = std::env::var("HUDDLE_ALLOW_REMOTE")
            .map(|v| v == "true" || v == "1" || v == "yes")
            .unwrap_or(false);

        let auth_tokens = match non_empty_var("HUDDLE_AUTH_TOKENS") {
            Some(raw) => parse_auth_tokens(&raw)?,
            None => HashMap::new(),
        };

        let admin_users = non_empty_var("HUDDLE_ADMIN_USERS")
            .map(|raw| split_list(&raw).map(String::from).collect())
            .unwrap_or_default();

        let default_model =
            non_empty_var("HUDDLE_DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if split_model_id(&default_model).is_err() {
            return Err(ConfigError::InvalidDefaultModel(default_model));
        }

        let max_agent_steps = match non_empty_var("HUDDLE_MAX_AGENT_STEPS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidMaxSteps(raw))?,
            None => DEFAULT_MAX_AGENT_STEPS,
        };

        let tools_url = non_empty_var("HUDDLE_TOOLS_URL");
        let agents_file = non_empty_var("HUDDLE_AGENTS_FILE").map(PathBuf::from);

        let config = Self {
            home,
            bind,
            allow_remote,
            auth_tokens,
            admin_users,
            default_model,
            max_agent_steps,
            tools_url,
            agents_file,
        };
        config.validate()?;
        Ok(config)
    }

    /// Security checks, re-run after command-line overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.allow_remote && !self.bind.ip().is_loopback() {
            return Err(ConfigError::RemoteBindNotAllowed(self.bind));
        }
        if self.allow_remote && self.auth_tokens.is_empty() {
            return Err(ConfigError::RemoteWithoutToken);
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.home.join("huddle.db")
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_auth_tokens(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    split_list(raw)
        .map(|entry| match entry.split_once('=') {
            Some((token, user)) if !token.trim().is_empty() && !user.trim().is_empty() => {
                Ok((token.trim().to_string(), user.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidAuthToken(entry.to_string())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 9] = [
        "HUDDLE_HOME",
        "HUDDLE_BIND",
        "HUDDLE_ALLOW_REMOTE",
        "HUDDLE_AUTH_TOKENS",
        "HUDDLE_ADMIN_USERS",
        "HUDDLE_DEFAULT_MODEL",
        "HUDDLE_MAX_AGENT_STEPS",
        "HUDDLE_TOOLS_URL",
        "HUDDLE_AGENTS_FILE",
    ];

    /// SAFETY: Only call while holding ENV_MUTEX.
    unsafe fn clear_env() {
        for var in VARS {
            // SAFETY: caller holds ENV_MUTEX, ensuring no concurrent env var access
            unsafe { std::env::remove_var(var) };
        }
    }

    /// Run `from_env` with the given variables set, then clear them.
    fn load_with(vars: &[(&str, &str)]) -> Result<HuddleConfig, ConfigError> {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: holding ENV_MUTEX, no concurrent env var access
        unsafe {
            clear_env();
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }
        let result = HuddleConfig::from_env();
        // SAFETY: holding ENV_MUTEX, no concurrent env var access
        unsafe { clear_env() };
        result
    }

    #[test]
    fn config_loads_defaults() {
        let config = load_with(&[]).unwrap();

        assert_eq!(config.bind, DEFAULT_BIND.parse::<SocketAddr>().unwrap());
        assert!(!config.allow_remote);
        assert!(config.auth_tokens.is_empty());
        assert!(config.admin_users.is_empty());
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert_eq!(config.max_agent_steps, DEFAULT_MAX_AGENT_STEPS);
        assert!(config.tools_url.is_none());
        assert!(config.home.to_string_lossy().contains(".huddle"));
        assert!(config.db_path().ends_with("huddle.db"));
    }

    #[test]
    fn config_parses_tokens_and_admins() {
        let config = load_with(&[
            ("HUDDLE_AUTH_TOKENS", "tok-a=alice, tok-b=bob"),
            ("HUDDLE_ADMIN_USERS", "alice"),
            ("HUDDLE_MAX_AGENT_STEPS", "8"),
            ("HUDDLE_TOOLS_URL", "http://localhost:9000"),
        ])
        .unwrap();

        assert_eq!(config.auth_tokens.get("tok-b").map(String::as_str), Some("bob"));
        assert!(config.admin_users.contains("alice"));
        assert_eq!(config.max_agent_steps, 8);
        assert_eq!(config.tools_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn config_rejects_remote_without_token() {
        let err = load_with(&[("HUDDLE_ALLOW_REMOTE", "true")]).unwrap_err();
        assert!(
            err.to_string().contains("HUDDLE_AUTH_TOKENS"),
            "error should mention auth tokens: {}",
            err
        );
    }

    #[test]
    fn config_rejects_public_bind_without_opt_in() {
        let err = load_with(&[("HUDDLE_BIND", "0.0.0.0:7441")]).unwrap_err();
        assert!(matches!(err, ConfigError::RemoteBindNotAllowed(_)));

        let config = load_with(&[
            ("HUDDLE_BIND", "0.0.0.0:7441"),
            ("HUDDLE_ALLOW_REMOTE", "1"),
            ("HUDDLE_AUTH_TOKENS", "t=alice"),
        ])
        .unwrap();
        assert!(config.allow_remote);
    }

    #[test]
    fn config_rejects_malformed_values() {
        assert!(matches!(
            load_with(&[("HUDDLE_BIND", "nope")]).unwrap_err(),
            ConfigError::InvalidBind(_)
        ));
        assert!(matches!(
            load_with(&[("HUDDLE_AUTH_TOKENS", "just-a-token")]).unwrap_err(),
            ConfigError::InvalidAuthToken(_)
        ));
        assert!(matches!(
            load_with(&[("HUDDLE_MAX_AGENT_STEPS", "0")]).unwrap_err(),
            ConfigError::InvalidMaxSteps(_)
        ));
        assert!(matches!(
            load_with(&[("HUDDLE_DEFAULT_MODEL", "llama-3")]).unwrap_err(),
            ConfigError::InvalidDefaultModel(_)
        ));
    }
}
