//! This file contains the [`Hashinator`] - the component every caller goes through to map a partitioning key to a
//! partition.
//!
//! The hashinator holds the currently published [`Generation`]: a configuration plus the scheme built from it.
//! A generation is never mutated. Reconfiguring builds a complete new generation off to the side and publishes it with
//! a single atomic pointer swap, so a reader sees either the old or the new generation, never a mix of both.
//!
//! Readers ([`Hashinator::hash_to_partition`], [`Hashinator::current_partition_count`]) never take a lock. A reader
//! keeps the generation it loaded alive for the duration of its call, so a concurrent swap can't invalidate it.
//! Callers that need many lookups to agree can pin a generation with [`Hashinator::snapshot`].
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use tracing::{event, instrument, Level};

use crate::{
    configuration::{Configuration, SchemeType},
    error::{Error, Result},
    partitioning::{PartitionId, PartitioningScheme, Scheme},
    value::{NormalizedKey, Value},
};

/// One published (scheme type, configuration, scheme) triple
#[derive(Debug)]
pub struct Generation {
    id: u64,
    configuration: Configuration,
    scheme: Scheme,
}

impl Generation {
    /// Generation ids start at 1 and increase by one on every publication
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn scheme_type(&self) -> SchemeType {
        self.configuration.scheme_type()
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn partition_count(&self) -> u32 {
        self.scheme.partition_count()
    }

    /// Normalizes `value` and routes it with this generation's scheme
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedType`] if `value` can't be used as a partitioning key
    pub fn hash_to_partition(&self, value: &Value) -> Result<PartitionId> {
        Ok(self.hash_key(&value.normalize()?))
    }

    pub fn hash_key(&self, key: &NormalizedKey) -> PartitionId {
        self.scheme.partition_for(key)
    }
}

pub struct Hashinator {
    current: ArcSwapOption<Generation>,
    // serializes publishers and holds the id of the last published generation
    last_generation_id: Mutex<u64>,
}

impl std::fmt::Debug for Hashinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.current.load() {
            Some(generation) => write!(
                f,
                "Hashinator: generation {} ({})",
                generation.id, generation.configuration
            ),
            None => write!(f, "Hashinator: not initialized"),
        }
    }
}

impl Default for Hashinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Hashinator {
    /// Creates a hashinator without any published configuration. Every lookup fails with
    /// [`Error::NotInitialized`] until [`Hashinator::initialize`] succeeds.
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            last_generation_id: Mutex::new(0),
        }
    }

    /// Creates a hashinator and initializes it with the given configuration bytes
    pub fn with_configuration(scheme_type: SchemeType, config_bytes: &[u8]) -> Result<Self> {
        let hashinator = Self::new();
        hashinator.initialize(scheme_type, config_bytes)?;
        Ok(hashinator)
    }

    /// Decodes `config_bytes`, builds the matching scheme and publishes both as the new current generation.
    /// Returns the id of the published generation.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the bytes can't be decoded, describe an invalid configuration or describe a
    /// different scheme than `scheme_type`. The current generation (if any) is left untouched in that case.
    #[instrument(
        name = "hashinator::initialize",
        level = "info",
        skip(self, config_bytes),
        fields(len = config_bytes.len())
    )]
    pub fn initialize(&self, scheme_type: SchemeType, config_bytes: &[u8]) -> Result<u64> {
        match Configuration::decode_as(scheme_type, config_bytes) {
            Ok(configuration) => Ok(self.publish(configuration)),
            Err(err) => {
                event!(
                    Level::WARN,
                    "Rejected {} configuration, keeping the current generation: {}",
                    scheme_type,
                    err
                );
                Err(err)
            }
        }
    }

    /// Publishes an already validated [`Configuration`] as the new current generation and returns its id
    pub fn publish(&self, configuration: Configuration) -> u64 {
        let scheme = Scheme::from_configuration(&configuration);
        // the guarded value is a plain counter, a panic in another publisher can't leave it inconsistent
        let mut last_generation_id = self
            .last_generation_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = *last_generation_id + 1;

        event!(
            Level::INFO,
            "Publishing generation {} ({})",
            id,
            configuration
        );
        self.current.store(Some(Arc::new(Generation {
            id,
            configuration,
            scheme,
        })));
        *last_generation_id = id;

        id
    }

    /// Returns the current generation. Lookups made through it are unaffected by later reconfigurations.
    ///
    /// # Errors
    /// Returns [`Error::NotInitialized`] if nothing was published yet
    pub fn snapshot(&self) -> Result<Arc<Generation>> {
        self.current.load_full().ok_or(Error::NotInitialized)
    }

    /// Maps `value` to a partition using the current generation
    ///
    /// # Errors
    /// Returns [`Error::NotInitialized`] if nothing was published yet and [`Error::UnsupportedType`] if `value` can't be
    /// used as a partitioning key
    pub fn hash_to_partition(&self, value: &Value) -> Result<PartitionId> {
        match &*self.current.load() {
            Some(generation) => generation.hash_to_partition(value),
            None => Err(Error::NotInitialized),
        }
    }

    /// Maps a BIGINT to a partition
    pub fn hash_i64(&self, v: i64) -> Result<PartitionId> {
        self.hash_to_partition(&Value::BigInt(v))
    }

    /// Maps a STRING to a partition (hashed through its utf8 bytes)
    pub fn hash_str(&self, v: &str) -> Result<PartitionId> {
        self.hash_to_partition(&Value::from(v))
    }

    /// Maps a VARBINARY to a partition
    pub fn hash_bytes(&self, v: Bytes) -> Result<PartitionId> {
        self.hash_to_partition(&Value::VarBinary(Some(v)))
    }

    /// The partition count implied by the current generation: the configured count for legacy and the number of
    /// distinct partitions on the ring for elastic
    pub fn current_partition_count(&self) -> Result<u32> {
        match &*self.current.load() {
            Some(generation) => Ok(generation.partition_count()),
            None => Err(Error::NotInitialized),
        }
    }

    /// The scheme type of the current generation
    pub fn current_scheme_type(&self) -> Result<SchemeType> {
        match &*self.current.load() {
            Some(generation) => Ok(generation.scheme_type()),
            None => Err(Error::NotInitialized),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::Hashinator;
    use crate::{
        configuration::{Configuration, SchemeType},
        error::{ConfigurationError, Error},
        value::{Value, ValueType},
    };

    fn legacy_bytes(partition_count: u32) -> Bytes {
        Configuration::legacy(partition_count).unwrap().encode()
    }

    #[test]
    fn test_not_initialized() {
        let hashinator = Hashinator::new();
        assert!(hashinator.hash_i64(1).err().unwrap().is_not_initialized());
        assert!(hashinator
            .current_partition_count()
            .err()
            .unwrap()
            .is_not_initialized());
        assert!(hashinator.snapshot().is_err());
    }

    #[test]
    fn test_initialize_and_hash() {
        let hashinator =
            Hashinator::with_configuration(SchemeType::Legacy, &legacy_bytes(3)).unwrap();
        assert_eq!(hashinator.hash_i64(2).unwrap(), 1);
        assert_eq!(hashinator.current_partition_count().unwrap(), 3);
        assert_eq!(
            hashinator.current_scheme_type().unwrap(),
            SchemeType::Legacy
        );
    }

    #[test]
    fn test_nulls_of_every_type_go_to_partition_zero() {
        let hashinator = Hashinator::new();
        for configuration in [
            Configuration::legacy(2).unwrap(),
            Configuration::legacy(997).unwrap(),
            Configuration::elastic_uniform(13, 8).unwrap(),
        ] {
            hashinator.publish(configuration);
            for value_type in [
                ValueType::Null,
                ValueType::TinyInt,
                ValueType::SmallInt,
                ValueType::Integer,
                ValueType::BigInt,
                ValueType::String,
                ValueType::VarBinary,
            ] {
                assert_eq!(
                    hashinator
                        .hash_to_partition(&Value::null_of(value_type))
                        .unwrap(),
                    0,
                    "{}",
                    value_type
                );
            }
        }
    }

    #[test]
    fn test_unsupported_type_is_not_defaulted() {
        let hashinator =
            Hashinator::with_configuration(SchemeType::Legacy, &legacy_bytes(4)).unwrap();
        assert!(hashinator
            .hash_to_partition(&Value::Float(0.5))
            .err()
            .unwrap()
            .is_unsupported_type());
    }

    #[test]
    fn test_failed_initialize_keeps_previous_generation() {
        let hashinator =
            Hashinator::with_configuration(SchemeType::Legacy, &legacy_bytes(3)).unwrap();
        let before = hashinator.snapshot().unwrap();

        // zero partitions
        let err = hashinator
            .initialize(SchemeType::Legacy, &[0u8, 0, 0, 0, 0])
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::ZeroPartitions)
        ));

        // scheme type disagrees with the bytes
        assert!(hashinator
            .initialize(SchemeType::Elastic, &legacy_bytes(5))
            .err()
            .unwrap()
            .is_configuration());

        let after = hashinator.snapshot().unwrap();
        assert_eq!(after.id(), before.id());
        assert_eq!(hashinator.current_partition_count().unwrap(), 3);
    }

    #[test]
    fn test_generation_ids_increase() {
        let hashinator = Hashinator::new();
        assert_eq!(hashinator.initialize(SchemeType::Legacy, &legacy_bytes(1)).unwrap(), 1);
        let elastic = Configuration::elastic_uniform(4, 4).unwrap().encode();
        assert_eq!(hashinator.initialize(SchemeType::Elastic, &elastic).unwrap(), 2);
        assert_eq!(hashinator.current_scheme_type().unwrap(), SchemeType::Elastic);
        assert_eq!(hashinator.current_partition_count().unwrap(), 4);
    }

    #[test]
    fn test_pinned_generation_survives_reconfiguration() {
        let hashinator =
            Hashinator::with_configuration(SchemeType::Legacy, &legacy_bytes(1)).unwrap();
        let pinned = hashinator.snapshot().unwrap();

        hashinator
            .initialize(SchemeType::Legacy, &legacy_bytes(1000))
            .unwrap();

        assert_eq!(pinned.partition_count(), 1);
        assert_eq!(pinned.hash_to_partition(&Value::BigInt(42)).unwrap(), 0);
        assert_eq!(hashinator.current_partition_count().unwrap(), 1000);
        assert_eq!(hashinator.hash_i64(42).unwrap(), 704);
    }

    #[test]
    fn test_typed_entry_points_agree_with_values() {
        let hashinator = Hashinator::new();
        hashinator.publish(Configuration::legacy(16).unwrap());

        assert_eq!(
            hashinator.hash_str("hello").unwrap(),
            hashinator
                .hash_bytes(Bytes::from_static(b"hello"))
                .unwrap()
        );
        assert_eq!(hashinator.hash_str("hello").unwrap(), 7);
        assert_eq!(
            hashinator.hash_i64(7).unwrap(),
            hashinator.hash_to_partition(&Value::TinyInt(7)).unwrap()
        );
    }
}
