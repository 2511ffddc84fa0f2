//! Configuration management for the policy assistant.
//!
//! Configuration is merged from three sources, later ones winning:
//! - Built-in defaults
//! - A YAML config file (`.policy/config.yaml` or `POLICY_CONFIG`)
//! - Environment variables
//!
//! CLI flags are applied on top with [`AppConfig::with_overrides`].
//! The provider credential has no default; a missing key is fatal.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

const DEFAULT_CONFIG_PATH: &str = ".policy/config.yaml";
const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Credential for the embedding and generation provider
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Provider base URL override (proxies, tests)
    pub provider_url: Option<String>,

    /// Document database connection string (`sqlite://<dir>` or a bare directory)
    pub db_uri: String,

    /// Database name, becomes `<dir>/<db_name>.sqlite`
    pub db_name: String,

    /// Collection holding every tenant's segment records
    pub collection: String,

    /// Directory holding one vector index file per tenant
    pub index_dir: PathBuf,

    /// Config file that was merged, if any
    pub config_file: Option<PathBuf>,

    /// Chunking and search parameters
    pub retrieval: RetrievalSettings,

    /// Provider model identifiers
    pub models: ModelSettings,

    /// Optional YAML prompt definition replacing the built-in chat prompt
    pub prompt_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Chunking and retrieval parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_top_k() -> usize {
    3
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
        }
    }
}

/// Model identifiers for the two provider calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_generation_model")]
    pub generation: String,

    #[serde(default = "default_embedding_model")]
    pub embedding: String,
}

fn default_generation_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            generation: default_generation_model(),
            embedding: default_embedding_model(),
        }
    }
}

/// YAML config file structure. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    provider: Option<ProviderSection>,
    database: Option<DatabaseSection>,
    index: Option<IndexSection>,
    retrieval: Option<RetrievalSettings>,
    models: Option<ModelSettings>,
    logging: Option<LoggingSection>,
    #[serde(rename = "promptFile")]
    prompt_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProviderSection {
    #[serde(rename = "apiKeyEnv")]
    api_key_env: Option<String>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    uri: Option<String>,
    name: Option<String>,
    collection: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct IndexSection {
    dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            provider_url: None,
            db_uri: "sqlite://./data".to_string(),
            db_name: "policy_db".to_string(),
            collection: "policy_chunks".to_string(),
            index_dir: PathBuf::from("./indexes"),
            config_file: None,
            retrieval: RetrievalSettings::default(),
            models: ModelSettings::default(),
            prompt_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - `GEMINI_API_KEY`: provider credential (required)
    /// - `POLICY_CONFIG`: path to a YAML config file
    /// - `POLICY_DB_URI`: document database connection string
    /// - `POLICY_DB_NAME`: database name
    /// - `POLICY_COLLECTION`: collection name
    /// - `POLICY_INDEX_DIR`: vector index directory
    /// - `POLICY_GEMINI_URL`: provider base URL override
    /// - `RUST_LOG`: log level
    /// - `NO_COLOR`: disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use policy_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None).expect("Failed to load config");
    /// println!("Index dir: {:?}", config.index_dir);
    /// ```
    pub fn load(config_file: Option<PathBuf>) -> AppResult<Self> {
        Self::load_with(config_file, |key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` for environment variables.
    pub fn load_with<F>(config_file: Option<PathBuf>, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let explicit = config_file
            .or_else(|| lookup("POLICY_CONFIG").map(PathBuf::from));
        let config_path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut api_key_env = DEFAULT_API_KEY_ENV.to_string();

        if config_path.exists() {
            let file = read_config_file(&config_path)?;
            if let Some(env_name) = config.merge_file(file) {
                api_key_env = env_name;
            }
            config.config_file = Some(config_path);
        } else if let Some(path) = explicit {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                path
            )));
        }

        // Environment variables override the YAML config
        if let Some(uri) = lookup("POLICY_DB_URI") {
            config.db_uri = uri;
        }
        if let Some(name) = lookup("POLICY_DB_NAME") {
            config.db_name = name;
        }
        if let Some(collection) = lookup("POLICY_COLLECTION") {
            config.collection = collection;
        }
        if let Some(dir) = lookup("POLICY_INDEX_DIR") {
            config.index_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("POLICY_GEMINI_URL") {
            config.provider_url = Some(url);
        }
        if let Some(level) = lookup("RUST_LOG") {
            config.log_level = Some(level);
        }
        if lookup("NO_COLOR").is_some() {
            config.no_color = true;
        }

        config.api_key = lookup(&api_key_env).unwrap_or_default();
        if config.api_key.trim().is_empty() {
            return Err(AppError::Config(format!(
                "{} not set in environment",
                api_key_env
            )));
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge a parsed config file. Returns the credential variable name if
    /// the file overrides it.
    fn merge_file(&mut self, file: ConfigFile) -> Option<String> {
        let mut api_key_env = None;

        if let Some(provider) = file.provider {
            api_key_env = provider.api_key_env;
            if provider.endpoint.is_some() {
                self.provider_url = provider.endpoint;
            }
        }

        if let Some(db) = file.database {
            if let Some(uri) = db.uri {
                self.db_uri = uri;
            }
            if let Some(name) = db.name {
                self.db_name = name;
            }
            if let Some(collection) = db.collection {
                self.collection = collection;
            }
        }

        if let Some(dir) = file.index.and_then(|i| i.dir) {
            self.index_dir = dir;
        }

        if let Some(retrieval) = file.retrieval {
            self.retrieval = retrieval;
        }

        if let Some(models) = file.models {
            self.models = models;
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }

        if file.prompt_file.is_some() {
            self.prompt_file = file.prompt_file;
        }

        api_key_env
    }

    /// Apply CLI overrides, giving precedence to flags over environment.
    pub fn with_overrides(
        mut self,
        index_dir: Option<PathBuf>,
        db_uri: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(index_dir) = index_dir {
            self.index_dir = index_dir;
        }

        if let Some(db_uri) = db_uri {
            self.db_uri = db_uri;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Validate settings that would otherwise fail deep inside a request.
    pub fn validate(&self) -> AppResult<()> {
        if self.db_uri.trim().is_empty() {
            return Err(AppError::Config(
                "Document database connection string is empty".to_string(),
            ));
        }

        if !is_identifier(&self.collection) {
            return Err(AppError::Config(format!(
                "Collection name must be alphanumeric or underscore: {:?}",
                self.collection
            )));
        }

        if self.db_name.trim().is_empty() {
            return Err(AppError::Config("Database name is empty".to_string()));
        }

        let retrieval = &self.retrieval;
        if retrieval.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be positive".to_string()));
        }
        if retrieval.chunk_overlap >= retrieval.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                retrieval.chunk_overlap, retrieval.chunk_size
            )));
        }
        if retrieval.top_k == 0 {
            return Err(AppError::Config("top_k must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Path of the SQLite file backing the document database.
    pub fn database_path(&self) -> PathBuf {
        let dir = self
            .db_uri
            .strip_prefix("sqlite://")
            .unwrap_or(&self.db_uri);
        Path::new(dir).join(format!("{}.sqlite", self.db_name))
    }
}

fn read_config_file(path: &Path) -> AppResult<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

    serde_yaml::from_str(&contents)
        .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn load(temp: &TempDir, vars: HashMap<String, String>) -> AppResult<AppConfig> {
        // Point at a config path that does not exist unless a test writes it.
        let path = temp.path().join("config.yaml");
        let explicit = if path.exists() { Some(path) } else { None };
        AppConfig::load_with(explicit, |k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults_with_key() {
        let temp = TempDir::new().unwrap();
        let config = load(&temp, env(&[("GEMINI_API_KEY", "secret")])).unwrap();

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.db_name, "policy_db");
        assert_eq!(config.collection, "policy_chunks");
        assert_eq!(config.retrieval.chunk_size, 1000);
        assert_eq!(config.retrieval.chunk_overlap, 100);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.models.generation, "gemini-2.0-flash");
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let temp = TempDir::new().unwrap();
        let err = load(&temp, env(&[])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_empty_db_uri_is_fatal() {
        let temp = TempDir::new().unwrap();
        let err = load(
            &temp,
            env(&[("GEMINI_API_KEY", "k"), ("POLICY_DB_URI", "  ")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("connection string"));
    }

    #[test]
    fn test_env_overrides() {
        let temp = TempDir::new().unwrap();
        let config = load(
            &temp,
            env(&[
                ("GEMINI_API_KEY", "k"),
                ("POLICY_DB_URI", "sqlite:///var/lib/policy"),
                ("POLICY_DB_NAME", "hr"),
                ("POLICY_COLLECTION", "segments"),
                ("POLICY_INDEX_DIR", "/tmp/idx"),
            ]),
        )
        .unwrap();

        assert_eq!(config.database_path(), PathBuf::from("/var/lib/policy/hr.sqlite"));
        assert_eq!(config.collection, "segments");
        assert_eq!(config.index_dir, PathBuf::from("/tmp/idx"));
    }

    #[test]
    fn test_yaml_merge_and_env_precedence() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("config.yaml"),
            r#"
provider:
  apiKeyEnv: HR_GEMINI_KEY
database:
  name: from_yaml
  collection: yaml_chunks
retrieval:
  chunk_size: 500
  chunk_overlap: 50
  top_k: 5
"#,
        )
        .unwrap();

        let config = load(
            &temp,
            env(&[("HR_GEMINI_KEY", "k"), ("POLICY_DB_NAME", "from_env")]),
        )
        .unwrap();

        assert_eq!(config.db_name, "from_env");
        assert_eq!(config.collection, "yaml_chunks");
        assert_eq!(config.retrieval.chunk_size, 500);
        assert_eq!(config.retrieval.top_k, 5);
        assert!(config.config_file.is_some());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = AppConfig {
            api_key: "k".to_string(),
            ..Default::default()
        };
        config.retrieval.chunk_overlap = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_collection_must_be_identifier() {
        let config = AppConfig {
            collection: "chunks; DROP TABLE x".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(
            Some(PathBuf::from("/srv/idx")),
            None,
            None,
            true,
            false,
        );

        assert_eq!(config.index_dir, PathBuf::from("/srv/idx"));
        assert!(config.verbose);
        assert_eq!(config.log_level, Some("debug".to_string()));
    }
}
