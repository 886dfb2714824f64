//! Layered client configuration.
//!
//! Priority, lowest first: built-in defaults, the YAML file, `BULLDOZER_`
//! environment variables (`BULLDOZER_API__BASE_URL=...`), then CLI flags
//! (which also read their own `env` names through clap).

use std::env;
use std::path::Path;

use clap::{Parser, ValueEnum};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::types::ChatOptions;

/// File looked up in the working directory when no path is given.
const DEFAULT_CONFIG_STEM: &str = "bulldozer";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "BULLDOZER_CONFIG", global = true)]
    pub config: Option<String>,

    /// Backend API root, e.g. http://localhost:8000/api
    #[arg(long, env = "BULLDOZER_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "BULLDOZER_TIMEOUT_SECS", global = true)]
    pub timeout_secs: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, env = "BULLDOZER_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub chat: ChatOptions,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("api.base_url", "http://localhost:8000/api")?
            .set_default("api.timeout_secs", 120)?
            .set_default("chat.enable_deep_thinking", false)?
            .set_default("chat.enable_background_investigation", true)?
            .set_default("chat.report_style", crate::types::DEFAULT_REPORT_STYLE)?
            .set_default("logging.format", LogFormat::Pretty.as_str())?;

        // 2. Config file: explicit path must exist, ./bulldozer.{yaml,toml,json} may not
        builder = match &cli.config {
            Some(path) => builder.add_source(File::from(Path::new(path)).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_STEM).required(false)),
        };

        // 3. Environment, e.g. BULLDOZER_CHAT__REPORT_STYLE=investigator
        builder = builder.add_source(
            Environment::with_prefix("BULLDOZER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI overrides
        if let Some(url) = &cli.base_url {
            builder = builder.set_override("api.base_url", url.as_str())?;
        }
        if let Some(secs) = cli.timeout_secs {
            builder = builder.set_override("api.timeout_secs", secs)?;
        }
        if let Some(format) = cli.log_format {
            builder = builder.set_override("logging.format", format.as_str())?;
        }

        let mut cfg: Self = builder.build()?.try_deserialize()?;
        cfg.resolve_env_references();
        Ok(cfg)
    }

    /// Replace `$NAME` string values with the value of env var `NAME`.
    fn resolve_env_references(&mut self) {
        self.api.base_url = resolve_env_reference(&self.api.base_url);
        self.chat.report_style = resolve_env_reference(&self.chat.report_style);
    }
}

/// Resolve a `$NAME` reference; unset variables resolve to `NAME` itself.
fn resolve_env_reference(value: &str) -> String {
    match value.strip_prefix('$') {
        Some(name) => env::var(name).unwrap_or_else(|_| name.to_string()),
        None => value.to_string(),
    }
}
