use figment::{
    Figment,
    providers::{Env, Format, Toml, Yaml},
};
use serde::Deserialize;
use std::path::Path;

use crate::auth::{self, AuthError};

const ENV_PREFIX: &str = "OMNIAUTH_";

/// Configuration for the demo server
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: auth::Settings,
}

/// Listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load from an optional TOML/YAML file, then `OMNIAUTH_` environment
    /// variables (`__` separates nested keys, e.g. `OMNIAUTH_AUTH__JWT__SECRET`)
    pub fn load(path: Option<&Path>) -> Result<Self, AuthError> {
        Self::figment(path).extract().map_err(|e| {
            let key = if e.path.is_empty() {
                "config".to_string()
            } else {
                e.path.join(".")
            };
            AuthError::invalid_config(key, e.to_string())
        })
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new();

        if let Some(path) = path {
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            figment = if is_yaml {
                figment.merge(Yaml::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}
