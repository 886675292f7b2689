//! This module defines the errors that can be returned by the hashinator.
//!
//! None of these errors are retryable by the hashinator itself: every operation is a pure function
//! of its inputs, so retrying without changing the input reproduces the same error.
use std::fmt::Display;

use serde::Serialize;

use crate::{configuration::SchemeType, value::ValueType};

pub type Result<T> = std::result::Result<T, Error>;

/// Error enum with all possible variants
#[derive(Debug, Serialize)]
pub enum Error {
    /// Malformed or semantically invalid configuration. The previously published state (if any) stays active.
    Configuration(ConfigurationError),
    /// A value whose type can't be used as a partitioning key. This is a contract violation by the caller.
    UnsupportedType { value_type: UnsupportedValueType },
    /// [`crate::hashinator::Hashinator::hash_to_partition`] was called before any configuration was published
    NotInitialized,
    /// Malformed value bytes received on the wire
    InvalidValue { reason: String },
    Io { reason: String },
}

/// The offending type of an [`Error::UnsupportedType`]
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedValueType {
    /// A known type that is not a legal partitioning key (eg: FLOAT)
    Known(ValueType),
    /// A wire type tag this crate doesn't know about
    UnknownTag(i8),
}

impl Error {
    /// Returns true if this is an instance of a [`Error::Configuration`] variant
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Returns true if this is an instance of a [`Error::NotInitialized`] variant
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Error::NotInitialized)
    }

    /// Returns true if this is an instance of a [`Error::UnsupportedType`] variant
    pub fn is_unsupported_type(&self) -> bool {
        matches!(self, Error::UnsupportedType { .. })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

impl From<ConfigurationError> for Error {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    ZeroPartitions,
    EmptyRing,
    UnsortedTokens {
        index: usize,
    },
    DuplicateToken {
        token: u64,
    },
    PartitionIdOutOfRange {
        partition_id: u32,
        partition_count: u32,
    },
    UnknownDiscriminant {
        got: u8,
    },
    SchemeTypeMismatch {
        expected: SchemeType,
        got: SchemeType,
    },
    Truncated {
        needed: usize,
        remaining: usize,
    },
    TrailingBytes {
        count: usize,
    },
    RingTooLarge {
        tokens: u64,
        max: usize,
    },
    InvalidRebalance {
        reason: String,
    },
    InvalidFile {
        reason: String,
    },
}
