//! Module that contains the different partitioning schemes
use crate::{configuration::Configuration, value::NormalizedKey};

pub mod elastic;
pub mod hash;
pub mod legacy;

use elastic::ElasticScheme;
use legacy::LegacyScheme;

/// Identifier of a partition, always in [0, partition count)
pub type PartitionId = u32;

/// This trait defines a PartitioningScheme (ie: how keys are split amongst partitions)
///
/// Schemes are immutable once constructed from a [`Configuration`], so they can be shared by any number of
/// concurrent readers. Changing the topology means building a new scheme.
pub trait PartitioningScheme {
    /// returns the partition owning the given key
    fn partition_for(&self, key: &NormalizedKey) -> PartitionId;

    /// returns the number of partitions keys can be routed to
    fn partition_count(&self) -> u32;
}

/// The closed set of schemes a [`Configuration`] can build
#[derive(Clone, Debug)]
pub enum Scheme {
    Legacy(LegacyScheme),
    Elastic(ElasticScheme),
}

impl Scheme {
    pub fn from_configuration(configuration: &Configuration) -> Self {
        match configuration {
            Configuration::Legacy(legacy) => Scheme::Legacy(LegacyScheme::new(legacy)),
            Configuration::Elastic(elastic) => Scheme::Elastic(ElasticScheme::new(elastic)),
        }
    }
}

impl PartitioningScheme for Scheme {
    fn partition_for(&self, key: &NormalizedKey) -> PartitionId {
        match self {
            Scheme::Legacy(scheme) => scheme.partition_for(key),
            Scheme::Elastic(scheme) => scheme.partition_for(key),
        }
    }

    fn partition_count(&self) -> u32 {
        match self {
            Scheme::Legacy(scheme) => scheme.partition_count(),
            Scheme::Elastic(scheme) => scheme.partition_count(),
        }
    }
}
