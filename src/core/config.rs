use crate::core::instrument::InstrumentType;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";
pub const DEFAULT_HISTORY_FILE: &str = "historical_fund_data.csv";

fn default_retries() -> usize {
    2
}

fn default_cookie_url() -> String {
    DEFAULT_YAHOO_COOKIE_URL.to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
    #[serde(default = "default_retries")]
    pub retries: usize,
    /// Issues the session cookie that fund profile requests are authorized with.
    #[serde(default = "default_cookie_url")]
    pub cookie_url: String,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        YahooProviderConfig {
            base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            retries: default_retries(),
            cookie_url: default_cookie_url(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub yahoo: YahooProviderConfig,
}

fn default_history_start() -> HashMap<InstrumentType, NaiveDate> {
    HashMap::from([(
        InstrumentType::Cryptocurrency,
        NaiveDate::from_ymd_opt(2014, 9, 17).unwrap_or_default(),
    )])
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub symbols: Vec<String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub data_path: Option<String>,
    pub history_file: Option<String>,
    #[serde(default = "default_history_start")]
    pub history_start: HashMap<InstrumentType, NaiveDate>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("org", "fundhist", "fundhist")
            .context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Location of the cached price table.
    pub fn history_file_path(&self) -> Result<PathBuf> {
        let file_name = self.history_file.as_deref().unwrap_or(DEFAULT_HISTORY_FILE);
        Ok(self.data_dir()?.join(file_name))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
