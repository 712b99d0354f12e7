// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reconcile::CompositeKeyScheme;

pub const DEFAULT_LENS_CONTRACT_ADDRESS: &str = "0xDb46d1Dc155634FbC732f92E853b10B288AD5a1d";
pub const DEFAULT_IPFS_GATEWAY_URL: &str = "https://subsquid.myfilebase.com/";
pub const DEFAULT_SEPANA_BASE_URL: &str = "https://api.sepana.io";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} env variable must be set")]
    Missing(&'static str),

    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub ipfs: IpfsConfig,
    pub search: SearchConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Lowercased address of the Lens hub contract
    pub contract_address: String,
    pub log_source_path: PathBuf,
    pub batch_blocks: usize,
    pub indexer_id: String,
    pub key_scheme: CompositeKeyScheme,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpfsConfig {
    pub gateway_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key: String,
    pub engine_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Retries after the first attempt
    pub retry_attempts: u32,
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment. `main` loads `.env`
    /// beforehand.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        Ok(Config {
            database: DatabaseConfig {
                url: vars.required("DATABASE_URL")?,
                max_connections: vars.parsed("DATABASE_MAX_CONNECTIONS", 10, "a number")?,
            },
            server: ServerConfig {
                host: vars.or("SERVER_HOST", "127.0.0.1"),
                port: vars.parsed("SERVER_PORT", 8080, "a port number")?,
            },
            chain: ChainConfig {
                contract_address: vars
                    .or("LENS_CONTRACT_ADDRESS", DEFAULT_LENS_CONTRACT_ADDRESS)
                    .to_lowercase(),
                log_source_path: PathBuf::from(vars.or("LOG_SOURCE_PATH", "./data/lens-logs.jsonl")),
                batch_blocks: vars.parsed("BATCH_BLOCKS", 100, "a positive number")?,
                indexer_id: vars.or("INDEXER_ID", "lens_indexer"),
                key_scheme: vars.parsed(
                    "COMPOSITE_KEY_SCHEME",
                    CompositeKeyScheme::default(),
                    "`concatenated` or `difference`",
                )?,
            },
            ipfs: IpfsConfig {
                gateway_url: vars.or("IPFS_GATEWAY_URL", DEFAULT_IPFS_GATEWAY_URL),
            },
            search: SearchConfig {
                base_url: vars.or("SEPANA_BASE_URL", DEFAULT_SEPANA_BASE_URL),
                api_key: vars.required("SEPANA_API_KEY")?,
                engine_id: vars.required("SEPANA_ENGINE_ID")?,
            },
            http: HttpConfig {
                retry_attempts: vars.parsed("HTTP_RETRY_ATTEMPTS", 5, "a number")?,
                timeout: Duration::from_secs(vars.parsed("HTTP_TIMEOUT_SECS", 30, "a number")?),
            },
        })
        .and_then(Config::validate)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.chain.batch_blocks == 0 {
            return Err(ConfigError::Invalid {
                name: "BATCH_BLOCKS",
                expected: "a positive number",
                value: "0".to_string(),
            });
        }
        Ok(self)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(
        &self,
        name: &'static str,
        default: T,
        expected: &'static str,
    ) -> Result<T, ConfigError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                name,
                expected,
                value,
            }),
        }
    }
}
