//! TOML configuration parsing.
//!
//! All settings live in one TOML file (see `config/docchat.example.toml`).
//! Every section has defaults, so an empty file is a valid configuration
//! for local development. The `API_URL` environment variable overrides
//! `backend.base_url`, matching how the original deployment configured the
//! inference backend.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `backend.base_url`.
pub const API_URL_ENV: &str = "API_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Where the proxy forwards queries (the extraction/inference service).
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_backend_base_url")]
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: default_backend_base_url(),
        }
    }
}

/// Bind address for the streaming proxy.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
        }
    }
}

/// Where the client sends queries (normally the local proxy).
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            proxy_url: default_proxy_url(),
        }
    }
}

/// Location of the durable session-handle store.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            path: default_session_path(),
        }
    }
}

fn default_backend_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_bind() -> String {
    "127.0.0.1:7410".to_string()
}
fn default_proxy_url() -> String {
    "http://127.0.0.1:7410".to_string()
}
fn default_session_path() -> PathBuf {
    PathBuf::from("./data/session.json")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.is_empty() {
            config.backend.base_url = url;
        }
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    for (name, url) in [
        ("backend.base_url", &config.backend.base_url),
        ("client.proxy_url", &config.client.proxy_url),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("{} must be an http(s) URL, got '{}'", name, url);
        }
    }

    if config.server.bind.is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}
