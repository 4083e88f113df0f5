use std::{
    env,
    error::Error,
    fmt::Display,
    path::{Path, PathBuf},
};

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use sqlxgen_core::{Engine, filter::NameFilter, introspect::SchemaSelection};

const DATABASE_URL: &str = "DATABASE_URL";
pub const CONFIG_FILE: &str = "sqlxgen.toml";
pub const DEFAULT_BANNER: &str = "// Code generated by sqlxgen. DO NOT EDIT.";

#[derive(Debug, Clone)]
pub enum ConfigError {
    DbUrlNotFound,
    Unreadable { path: PathBuf, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::DbUrlNotFound => write!(
                f,
                "Database URL not found, set database-url in the config or the {DATABASE_URL} environment variable."
            ),
            ConfigError::Unreadable { path, reason } => {
                write!(f, "encountered '{reason}' attempting to read {}", path.display())
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CodeGenerator {
    #[default]
    Rust,
    Json,
}

fn default_include() -> Vec<String> {
    vec!["^.+$".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ModelsConfig {
    /// Defaults per engine when left out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<Vec<String>>,
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            schemas: None,
            include: default_include(),
            exclude: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct QueriesConfig {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for QueriesConfig {
    fn default() -> Self {
        Self {
            paths: vec![],
            include: default_include(),
            exclude: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[must_use]
pub struct TomlConfig {
    #[serde(default)]
    pub engine: Engine,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    #[serde(default)]
    pub mode: CodeGenerator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub queries: QueriesConfig,
}

impl TomlConfig {
    pub fn template(engine: Engine) -> Self {
        Self {
            engine,
            database_url: None,
            mode: CodeGenerator::Rust,
            target: Some("src/db.gen.rs".into()),
            banner: Some(DEFAULT_BANNER.to_string()),
            models: ModelsConfig {
                schemas: Some(engine.default_schemas()),
                ..ModelsConfig::default()
            },
            queries: QueriesConfig {
                paths: vec!["queries".into()],
                ..QueriesConfig::default()
            },
        }
    }
}

/// Configuration with every pattern compiled.
#[derive(Debug, Clone)]
pub struct SqlxGenConfig {
    pub engine: Engine,
    pub database_url: Option<String>,
    pub mode: CodeGenerator,
    /// Standard output when unset.
    pub target: Option<PathBuf>,
    pub banner: String,
    pub models: SchemaSelection,
    pub query_paths: Vec<PathBuf>,
    pub queries: NameFilter,
}

pub fn db_url() -> Result<String, Box<dyn Error>> {
    // a missing .env file is not an error
    dotenv().ok();
    Ok(env::var(DATABASE_URL).map_err(|_| ConfigError::DbUrlNotFound)?)
}

impl SqlxGenConfig {
    pub fn from_toml_config(config: TomlConfig) -> Result<Self, Box<dyn Error>> {
        let engine = config.engine;
        let models = SchemaSelection {
            schemas: config
                .models
                .schemas
                .unwrap_or_else(|| engine.default_schemas()),
            tables: NameFilter::new(&config.models.include, &config.models.exclude)?,
        };
        let queries = NameFilter::new(&config.queries.include, &config.queries.exclude)?;

        Ok(Self {
            engine,
            database_url: config.database_url,
            mode: config.mode,
            target: config.target,
            banner: config.banner.unwrap_or_else(|| DEFAULT_BANNER.to_string()),
            models,
            query_paths: config.queries.paths,
            queries,
        })
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let raw = std::fs::read_to_string(path).map_err(|error| ConfigError::Unreadable {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
        let config: TomlConfig = toml::from_str(&raw)?;
        Self::from_toml_config(config)
    }

    pub fn database_url(&self) -> Result<String, Box<dyn Error>> {
        match &self.database_url {
            Some(url) => Ok(url.clone()),
            None => db_url(),
        }
    }
}
