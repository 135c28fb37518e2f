use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE: &str = "http://localhost:8787";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct ConfigFile {
    api_base: Option<String>,
    password: Option<String>,
    log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base: String,
    pub password: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            password: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// `config.json` in the platform config directory, if one can be determined.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "daily")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Defaults, then the config file, then `.env` and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        if let Some(path) = path.filter(|p| p.exists()) {
            config.apply_file(&path)?;
        }

        dotenvy::dotenv().ok();
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let file: ConfigFile = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        if let Some(api_base) = file.api_base {
            self.set_api_base(&api_base);
        }
        if let Some(password) = file.password {
            self.password = Some(password.trim().to_string());
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(api_base) = non_empty("DAILY_API_BASE") {
            self.set_api_base(&api_base);
        }
        if let Some(password) = non_empty("DAILY_PASSWORD") {
            self.password = Some(password.trim().to_string());
        }
        if let Some(level) = non_empty("DAILY_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Command-line flags win over everything else.
    pub fn apply_overrides(&mut self, api_base: Option<&str>, log_level: Option<&str>) {
        if let Some(api_base) = api_base {
            self.set_api_base(api_base);
        }
        if let Some(level) = log_level {
            self.log_level = level.to_string();
        }
    }

    fn set_api_base(&mut self, value: &str) {
        self.api_base = value.trim().trim_end_matches('/').to_string();
    }
}
