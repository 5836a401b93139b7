// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const APP_NAME: &str = "orderdesk";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_LOG_FILTER: &str = "warn";
const CONFIG_PATH_ENV: &str = "ORDERDESK_CONFIG_PATH";
const TOKEN_ENV: &str = "ORDERDESK_API_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub token: Option<String>,
    /// Signs in with this address when no token is configured; the password
    /// comes from ORDERDESK_PASSWORD.
    pub email: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
            token: None,
            email: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub show_archived: Option<bool>,
    /// Show and edit timestamps in UTC instead of the local offset.
    pub utc: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub filter: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [api], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        self.base_url().with_context(|| {
            format!("invalid api.base_url in {}", path.display())
        })?;

        if let Some(timeout) = &self.api.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "api.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(filter) = &self.log.filter
            && filter.trim().is_empty()
        {
            bail!(
                "log.filter in {} is empty; remove it or use a level such as \"info\"",
                path.display()
            );
        }

        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        let raw = self
            .api
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let url = Url::parse(raw).with_context(|| format!("parse base url {raw:?}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "base url {raw:?} uses scheme {:?}; use http or https",
                url.scheme()
            );
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    /// The environment token wins over the file so secrets can stay out of it.
    pub fn token(&self) -> Option<String> {
        env::var(TOKEN_ENV)
            .ok()
            .or_else(|| self.api.token.clone())
            .map(|token| token.trim().to_owned())
            .filter(|token| !token.is_empty())
    }

    pub fn email(&self) -> Option<&str> {
        self.api
            .email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    pub fn show_archived(&self) -> bool {
        self.ui.show_archived.unwrap_or(false)
    }

    pub fn utc(&self) -> bool {
        self.ui.utc.unwrap_or(false)
    }

    pub fn log_filter(&self) -> &str {
        self.log.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let data_root = dirs::data_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].file to a writable path")
        })?;
        Ok(data_root.join(APP_NAME).join("orderdesk.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# orderdesk config\n# Place this file at: {}\n\nversion = 1\n\n[api]\nbase_url = \"{}\"\ntimeout = \"{}\"\n# Prefer {} over storing the token here.\n# token = \"...\"\n# Or sign in on startup; the password comes from ORDERDESK_PASSWORD.\n# email = \"admin@example.com\"\n\n[ui]\nshow_archived = false\nutc = false\n\n[log]\n# Overridden by ORDERDESK_LOG.\nfilter = \"{}\"\n# file = \"/absolute/path/to/orderdesk.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_TIMEOUT,
            TOKEN_ENV,
            DEFAULT_LOG_FILTER,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
