use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::sources::Source;

pub const DEFAULT_CONFIG_PATH: &str = "tasksync.toml";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:54321";
pub const DEFAULT_TOKEN_ENV: &str = "TASKSYNC_ACCESS_TOKEN";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub api_url: Option<String>,
    pub access_token_env: Option<String>,
    pub source: Option<String>,
    pub list: Option<String>,
    pub label: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    /// Name of the environment variable holding the session token.
    pub access_token_env: String,
    pub source: Source,
    pub list: Option<String>,
    pub label: Option<String>,
    pub timeout_secs: u64,
}

impl Config {
    /// Load the config file and apply CLI overrides.
    ///
    /// An explicit `--config` path must exist; the default path is optional.
    pub fn load(cli: &Cli) -> Result<Self> {
        let file_config = match cli.config.as_deref() {
            Some(path) => read_config(Path::new(path))?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    read_config(path)?
                } else {
                    ConfigFile::default()
                }
            }
        };
        merge(file_config, cli)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Session token from the configured environment variable. Blank values
    /// count as signed out.
    pub fn access_token(&self) -> Option<String> {
        std::env::var(&self.access_token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}

fn read_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Err(Error::ConfigNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<ConfigFile> {
    let config: ConfigFile = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &ConfigFile) -> Result<()> {
    if let Some(ref source) = config.source {
        source.parse::<Source>()?;
    }
    if let Some(ref url) = config.api_url {
        validate_api_url(url)?;
    }
    if let Some(ref name) = config.access_token_env
        && name.trim().is_empty()
    {
        return Err(Error::ConfigValidation(
            "access_token_env must not be empty".to_string(),
        ));
    }
    if let Some(timeout) = config.timeout_secs
        && timeout == 0
    {
        return Err(Error::ConfigValidation(
            "timeout_secs must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_api_url(url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::ConfigValidation(format!(
            "api_url must start with http:// or https://, got: {url}"
        )))
    }
}

pub fn merge(file: ConfigFile, cli: &Cli) -> Result<Config> {
    let source = match cli.source.as_deref().or(file.source.as_deref()) {
        Some(raw) => raw.parse::<Source>()?,
        None => Source::Native,
    };
    let api_url = cli
        .api_url
        .clone()
        .or(file.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    validate_api_url(&api_url)?;

    Ok(Config {
        api_url,
        access_token_env: file
            .access_token_env
            .unwrap_or_else(|| DEFAULT_TOKEN_ENV.to_string()),
        source,
        list: cli.list.clone().or(file.list),
        label: cli.label.clone().or(file.label),
        timeout_secs: file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
    })
}
