//! Module that contains the hashing [`Configuration`] and its binary codec.
//!
//! A [`Configuration`] is immutable. Changing the topology (eg: adding a partition) always produces a new one,
//! which is then published through [`crate::hashinator::Hashinator`].
//!
//! When serialized, a [`Configuration`] looks like the following (big endian):
//!
//! [1 byte - scheme discriminant][payload]
//!
//! Legacy payload:  [4 bytes - partition count]
//! Elastic payload: [4 bytes - entry count][entry count * ([8 bytes - token][4 bytes - partition id])]
//!
//! Elastic entries are written in ascending token order.
use std::{fmt::Display, mem::size_of, num::NonZeroU32};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;
use tracing::{event, instrument, Level};

use crate::error::{ConfigurationError, Result};

pub mod elastic;
pub mod file;

pub use elastic::ElasticConfiguration;

/// The partitioning schemes a [`Configuration`] can describe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum SchemeType {
    Legacy = 0,
    Elastic = 1,
}

impl TryFrom<u8> for SchemeType {
    type Error = ConfigurationError;

    fn try_from(discriminant: u8) -> std::result::Result<Self, Self::Error> {
        match discriminant {
            0 => Ok(SchemeType::Legacy),
            1 => Ok(SchemeType::Elastic),
            got => Err(ConfigurationError::UnknownDiscriminant { got }),
        }
    }
}

/// Modulo partitioning over a fixed number of partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyConfiguration {
    partition_count: NonZeroU32,
}

impl LegacyConfiguration {
    /// # Errors
    /// Returns [`ConfigurationError::ZeroPartitions`] if `partition_count` is 0
    pub fn new(partition_count: u32) -> Result<Self> {
        let partition_count =
            NonZeroU32::new(partition_count).ok_or(ConfigurationError::ZeroPartitions)?;
        Ok(Self { partition_count })
    }

    pub fn partition_count(&self) -> NonZeroU32 {
        self.partition_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Configuration {
    Legacy(LegacyConfiguration),
    Elastic(ElasticConfiguration),
}

impl Configuration {
    /// Builds a legacy configuration with `partition_count` partitions
    pub fn legacy(partition_count: u32) -> Result<Self> {
        Ok(Self::Legacy(LegacyConfiguration::new(partition_count)?))
    }

    /// Builds an elastic configuration with evenly spaced tokens. See [`ElasticConfiguration::uniform`]
    pub fn elastic_uniform(partition_count: u32, tokens_per_partition: u32) -> Result<Self> {
        Ok(Self::Elastic(ElasticConfiguration::uniform(
            partition_count,
            tokens_per_partition,
        )?))
    }

    pub fn scheme_type(&self) -> SchemeType {
        match self {
            Configuration::Legacy(_) => SchemeType::Legacy,
            Configuration::Elastic(_) => SchemeType::Elastic,
        }
    }

    /// For legacy, the configured count. For elastic, the number of distinct partition ids on the ring.
    pub fn partition_count(&self) -> u32 {
        match self {
            Configuration::Legacy(legacy) => legacy.partition_count().get(),
            Configuration::Elastic(elastic) => elastic.partition_count(),
        }
    }

    /// Serializes a [`Configuration`] into its binary format (see top level comment for format)
    pub fn encode(&self) -> Bytes {
        match self {
            Configuration::Legacy(legacy) => {
                let mut buf = BytesMut::with_capacity(size_of::<u8>() + size_of::<u32>());
                buf.put_u8(SchemeType::Legacy as u8);
                buf.put_u32(legacy.partition_count().get());
                buf.freeze()
            }
            Configuration::Elastic(elastic) => {
                let mut buf = BytesMut::with_capacity(
                    size_of::<u8>() + size_of::<u32>() + elastic.len() * ELASTIC_ENTRY_SIZE,
                );
                buf.put_u8(SchemeType::Elastic as u8);
                buf.put_u32(elastic.len() as u32);
                for (token, partition_id) in elastic.entries() {
                    buf.put_u64(token);
                    buf.put_u32(partition_id);
                }
                buf.freeze()
            }
        }
    }

    /// Deserializes bytes into a validated [`Configuration`]
    ///
    /// # Errors
    /// Returns [`crate::error::Error::Configuration`] if the discriminant is unknown, the payload is truncated or
    /// followed by extra bytes, or the decoded configuration violates its invariants (see [`LegacyConfiguration::new`]
    /// and [`ElasticConfiguration::new`])
    #[instrument(level = "debug", skip(bytes), fields(len = bytes.len()))]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut bytes = bytes;
        ensure_remaining(bytes, size_of::<u8>())?;
        let scheme_type = SchemeType::try_from(bytes.get_u8())?;
        event!(Level::TRACE, "Will decode {} payload", scheme_type);

        let configuration = match scheme_type {
            SchemeType::Legacy => {
                ensure_remaining(bytes, size_of::<u32>())?;
                Configuration::Legacy(LegacyConfiguration::new(bytes.get_u32())?)
            }
            SchemeType::Elastic => {
                ensure_remaining(bytes, size_of::<u32>())?;
                let n_entries = bytes.get_u32() as usize;
                let expected_size = n_entries.saturating_mul(ELASTIC_ENTRY_SIZE);
                ensure_remaining(bytes, expected_size)?;

                let mut entries = Vec::with_capacity(n_entries);
                for _ in 0..n_entries {
                    let token = bytes.get_u64();
                    let partition_id = bytes.get_u32();
                    entries.push((token, partition_id));
                }
                Configuration::Elastic(ElasticConfiguration::new(entries)?)
            }
        };

        if bytes.has_remaining() {
            return Err(ConfigurationError::TrailingBytes {
                count: bytes.remaining(),
            }
            .into());
        }

        Ok(configuration)
    }

    /// Same as [`Configuration::decode`] but also requires the encoded discriminant to match `expected`
    pub fn decode_as(expected: SchemeType, bytes: &[u8]) -> Result<Self> {
        let configuration = Self::decode(bytes)?;
        if configuration.scheme_type() != expected {
            return Err(ConfigurationError::SchemeTypeMismatch {
                expected,
                got: configuration.scheme_type(),
            }
            .into());
        }

        Ok(configuration)
    }
}

impl Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Configuration::Legacy(legacy) => {
                write!(f, "legacy: {} partitions", legacy.partition_count())
            }
            Configuration::Elastic(elastic) => write!(
                f,
                "elastic: {} partitions, {} tokens",
                elastic.partition_count(),
                elastic.len()
            ),
        }
    }
}

const ELASTIC_ENTRY_SIZE: usize = size_of::<u64>() + size_of::<u32>();

fn ensure_remaining(bytes: &[u8], needed: usize) -> Result<()> {
    if bytes.len() < needed {
        return Err(ConfigurationError::Truncated {
            needed,
            remaining: bytes.len(),
        }
        .into());
    }

    Ok(())
}
