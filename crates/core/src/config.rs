use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Source of raw override values, keyed by env var name.
///
/// `Config::apply_env` passes the process environment; tests pass a map.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|s| !s.is_empty())
    }
}

impl EnvSource for std::collections::HashMap<&str, &str> {
    fn get(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, key)
            .map(|v| v.to_string())
            .filter(|s| !s.is_empty())
    }
}

fn parse_or<T: std::str::FromStr>(source: &dyn EnvSource, key: &str, current: T) -> T {
    match source.get(key) {
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Unparseable config override, keeping default");
                current
            }
        },
        None => current,
    }
}

fn parse_flag(source: &dyn EnvSource, key: &str, current: bool) -> bool {
    match source.get(key).as_deref() {
        Some("1") | Some("true") | Some("yes") | Some("on") => true,
        Some("0") | Some("false") | Some("no") | Some("off") => false,
        Some(other) => {
            tracing::warn!(key, value = other, "Unrecognized boolean override, keeping default");
            current
        }
        None => current,
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Complete runtime configuration.
///
/// Built once at startup (defaults, then an optional TOML file, then env
/// overrides, then CLI flags applied on the value) and passed by reference
/// into the gateway, the tool registry and the agent loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub agent: AgentConfig,
    pub workspace: WorkspaceConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load config from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(&ProcessEnv);
    }

    /// Overlay values from `source` on top of the current config.
    pub fn apply_overrides(&mut self, source: &dyn EnvSource) {
        if let Some(key) = source.get("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = source.get("KEAA_MODEL") {
            self.gemini.model_name = model;
        }
        self.agent.max_steps = parse_or(source, "KEAA_MAX_STEPS", self.agent.max_steps);
        self.agent.strict_actions = parse_flag(source, "KEAA_STRICT_ACTIONS", self.agent.strict_actions);
        if let Some(dir) = source.get("KEAA_INPUT_DIR") {
            self.workspace.input_dir = PathBuf::from(dir);
        }
        if let Some(dir) = source.get("KEAA_WORKING_DIR") {
            self.workspace.working_dir = PathBuf::from(dir);
        }
        if let Some(dir) = source.get("KEAA_EXPERIMENTS_DIR") {
            self.workspace.experiments_dir = PathBuf::from(dir);
        }
        if let Some(python) = source.get("KEAA_PYTHON") {
            self.workspace.python_bin = python;
        }
        self.workspace.offline = parse_flag(source, "KEAA_OFFLINE", self.workspace.offline);
        if let Some(host) = source.get("KEAA_HOST") {
            self.server.host = host;
        }
        self.server.port = parse_or(source, "KEAA_PORT", self.server.port);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_steps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "agent.max_steps".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }

    /// Offline when forced, or when no API key is available.
    pub fn is_offline(&self) -> bool {
        self.workspace.offline || !self.gemini.is_configured()
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  gemini:     model={}, key={}",
            self.gemini.model_name,
            if self.gemini.is_configured() { "set" } else { "(none)" }
        );
        tracing::info!(
            "  agent:      max_steps={}, strict_actions={}",
            self.agent.max_steps,
            self.agent.strict_actions
        );
        tracing::info!(
            "  workspace:  input={}, working={}, experiments={}",
            self.workspace.input_dir.display(),
            self.workspace.working_dir.display(),
            self.workspace.experiments_dir.display()
        );
        tracing::info!("  mode:       {}", if self.is_offline() { "offline" } else { "online" });
    }
}

// ── Gemini ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub model_name: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    /// Upper bound for a single backend call, retries excluded.
    pub request_timeout_secs: u64,
    /// Extra attempts for transport errors, HTTP 429 and 5xx.
    pub max_retries: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model_name: "gemini-2.5-pro".to_string(),
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            temperature: 0.7,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 8192,
            request_timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl GeminiConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

// ── Agent loop ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum reasoning steps per workflow run.
    pub max_steps: usize,
    /// Report `Action:` lines without a closing parenthesis instead of ignoring them.
    pub strict_actions: bool,
    pub tool_timeout_secs: u64,
    /// Characters of a tool observation shown in logs and the transcript display.
    pub display_truncate: usize,
    /// Markdown file replacing the generated system instructions.
    pub system_instructions_path: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            strict_actions: false,
            tool_timeout_secs: 300,
            display_truncate: 500,
            system_instructions_path: None,
        }
    }
}

// ── Workspace (sandbox directories) ───────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub input_dir: PathBuf,
    pub working_dir: PathBuf,
    pub experiments_dir: PathBuf,
    /// Force the offline mock backend even when an API key is present.
    pub offline: bool,
    /// Interpreter used by the `execute_code` tool.
    pub python_bin: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("/kaggle/input"),
            working_dir: PathBuf::from("/kaggle/working"),
            experiments_dir: PathBuf::from("/kaggle/working/experiments"),
            offline: false,
            python_bin: "python3".to_string(),
        }
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            cors_origin: "*".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_sandbox_layout() {
        let config = Config::default();
        assert_eq!(config.gemini.model_name, "gemini-2.5-pro");
        assert_eq!(config.agent.max_steps, 10);
        assert_eq!(config.workspace.experiments_dir, PathBuf::from("/kaggle/working/experiments"));
        assert!(config.is_offline(), "no key means offline");
    }

    #[test]
    fn test_api_key_switches_online() {
        let mut config = Config::default();
        let env: HashMap<&str, &str> = HashMap::from([("GEMINI_API_KEY", "abc")]);
        config.apply_overrides(&env);
        assert!(!config.is_offline());

        let forced: HashMap<&str, &str> = HashMap::from([("KEAA_OFFLINE", "true")]);
        config.apply_overrides(&forced);
        assert!(config.is_offline());
    }

    #[test]
    fn test_empty_key_is_not_configured() {
        let mut config = Config::default();
        let env: HashMap<&str, &str> = HashMap::from([("GEMINI_API_KEY", "")]);
        config.apply_overrides(&env);
        assert!(config.gemini.api_key.is_none());
        assert!(config.is_offline());
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let mut config = Config::default();
        let env: HashMap<&str, &str> = HashMap::from([
            ("KEAA_MAX_STEPS", "4"),
            ("KEAA_PORT", "not-a-port"),
            ("KEAA_WORKING_DIR", "/tmp/work"),
            ("KEAA_MODEL", "gemini-2.5-flash"),
        ]);
        config.apply_overrides(&env);
        assert_eq!(config.agent.max_steps, 4);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.workspace.working_dir, PathBuf::from("/tmp/work"));
        assert_eq!(config.gemini.model_name, "gemini-2.5-flash");
    }

    #[test]
    fn test_toml_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keaa.toml");
        std::fs::write(&path, "[agent]\nmax_steps = 3\n\n[workspace]\ninput_dir = \"/data\"\n").unwrap();

        let config = Config::from_toml_file(&path).unwrap();
        assert_eq!(config.agent.max_steps, 3);
        assert_eq!(config.workspace.input_dir, PathBuf::from("/data"));
        assert_eq!(config.gemini.top_k, 64);
    }

    #[test]
    fn test_missing_toml_file_is_error() {
        let err = Config::from_toml_file(Path::new("/no/such/keaa.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let mut config = Config::default();
        config.agent.max_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = Config::default();
        config.gemini.api_key = Some("secret".into());
        let s = toml::to_string_pretty(&config).unwrap();
        assert!(!s.contains("secret"));
    }
}
