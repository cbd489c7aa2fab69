//! Runtime configuration
//!
//! One `Config` is built at process start from the environment and passed by
//! reference into each component's constructor. Nothing reads globals after
//! startup.

use crate::error::{AskError, Result};
use crate::llm::GenerationSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Semantic description of a queryable table. The catalog supplies live
/// columns and sample rows; this supplies the business meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub router: GenerationSettings,
    pub synthesizer: GenerationSettings,
    pub summarizer: GenerationSettings,
    pub chart: GenerationSettings,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub llm: LlmConfig,
    pub tables: Vec<TableConfig>,
    /// Column every synthesized query must filter by the requesting user.
    pub identity_column: String,
    /// Sample rows embedded per table in routing/synthesis prompts.
    pub sample_rows: usize,
    /// Chart generate/execute/repair attempts before giving up.
    pub chart_max_attempts: u8,
    /// Operation budget for one sandboxed chart script evaluation.
    pub chart_op_budget: u64,
}

impl Config {
    /// Build from environment variables (after `dotenv` has run).
    pub fn from_env() -> Result<Self> {
        let database_url = require_env("DATABASE_URL")?;
        let endpoint = require_env("LLM_ENDPOINT")?;
        let api_key = require_env("LLM_API_KEY")?;
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let tables_file = require_env("ASKDATA_TABLES_FILE")?;
        let tables = load_tables_file(Path::new(&tables_file))?;

        let identity_column =
            std::env::var("ASKDATA_IDENTITY_COLUMN").unwrap_or_else(|_| "UserEmail".to_string());

        Ok(Self {
            database_url,
            llm: LlmConfig {
                endpoint,
                api_key,
                model,
                router: GenerationSettings::default(),
                synthesizer: GenerationSettings::default(),
                summarizer: GenerationSettings::default(),
                chart: GenerationSettings::deterministic(),
            },
            tables,
            identity_column,
            sample_rows: env_or("ASKDATA_SAMPLE_ROWS", 3)?,
            chart_max_attempts: env_or("ASKDATA_CHART_ATTEMPTS", 3)?,
            chart_op_budget: env_or("ASKDATA_CHART_OP_BUDGET", 500_000)?,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| AskError::Config(format!("{} is not set", name)))
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AskError::Config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

fn load_tables_file(path: &Path) -> Result<Vec<TableConfig>> {
    let raw = std::fs::read_to_string(path)?;
    let tables: Vec<TableConfig> = serde_json::from_str(&raw)?;
    if tables.is_empty() {
        return Err(AskError::Config(format!(
            "{} lists no tables",
            path.display()
        )));
    }
    Ok(tables)
}
