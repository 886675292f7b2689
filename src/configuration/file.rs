//! JSON configuration files.
//!
//! A file describes a single hashing configuration, eg:
//!
//! {"legacy": {"partition_count": 8}}
//! {"elastic": {"partition_count": 4, "tokens_per_partition": 16}}
//! {"raw": {"scheme_type": "legacy", "bytes": "0000000008"}}
use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigurationError, Result},
    utils::serde_hex_bytes,
};

use super::{Configuration, SchemeType};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(flatten)]
    pub scheme: SchemeConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeConfig {
    Legacy(LegacyConfig),
    Elastic(ElasticConfig),
    Raw(RawConfig),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LegacyConfig {
    pub partition_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ElasticConfig {
    pub partition_count: u32,
    pub tokens_per_partition: u32,
}

/// A configuration blob in the binary format described in [`super`], hex encoded
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RawConfig {
    pub scheme_type: SchemeType,
    #[serde(with = "serde_hex_bytes")]
    pub bytes: Bytes,
}

impl Config {
    /// Reads and parses the JSON file at `path`
    ///
    /// # Errors
    /// Returns [`crate::error::Error::Io`] if the file can't be read and [`ConfigurationError::InvalidFile`]
    /// if it isn't a valid configuration file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let stringified_json = std::fs::read_to_string(path)?;
        Self::from_json(&stringified_json)
    }

    pub fn from_json(stringified_json: &str) -> Result<Self> {
        serde_json::from_str(stringified_json).map_err(|e| {
            ConfigurationError::InvalidFile {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates this file into a [`Configuration`]
    pub fn to_configuration(&self) -> Result<Configuration> {
        match &self.scheme {
            SchemeConfig::Legacy(legacy) => Configuration::legacy(legacy.partition_count),
            SchemeConfig::Elastic(elastic) => Configuration::elastic_uniform(
                elastic.partition_count,
                elastic.tokens_per_partition,
            ),
            SchemeConfig::Raw(raw) => Configuration::decode_as(raw.scheme_type, &raw.bytes),
        }
    }
}
