//! The legacy [`PartitioningScheme`]: hash the key and take it modulo the partition count.
//!
//! Every key may move when the partition count changes, which is why [`super::elastic`] exists.
use std::num::NonZeroU32;

use crate::{configuration::LegacyConfiguration, value::NormalizedKey};

use super::{
    hash::{hash32_of_bytes, non_negative_i32, non_negative_i64, token_of_i64},
    PartitionId, PartitioningScheme,
};

#[derive(Clone, Debug)]
pub struct LegacyScheme {
    partition_count: NonZeroU32,
}

impl LegacyScheme {
    pub fn new(configuration: &LegacyConfiguration) -> Self {
        Self {
            partition_count: configuration.partition_count(),
        }
    }

    /// Maps `key` to a partition in [0, partition_count).
    ///
    /// NULL always goes to partition 0. Integers use the 64 bit token and bytes the 32 bit hash from [`super::hash`];
    /// the hash is made non negative before taking the modulo.
    pub fn hash(key: &NormalizedKey, partition_count: NonZeroU32) -> PartitionId {
        let partition_count = partition_count.get() as i64;
        let partition = match key {
            NormalizedKey::Null => return 0,
            NormalizedKey::Integer(v) => {
                non_negative_i64(token_of_i64(*v) as i64) % partition_count
            }
            NormalizedKey::Bytes(b) => {
                non_negative_i32(hash32_of_bytes(b)) as i64 % partition_count
            }
        };

        partition as PartitionId
    }
}

impl PartitioningScheme for LegacyScheme {
    fn partition_for(&self, key: &NormalizedKey) -> PartitionId {
        Self::hash(key, self.partition_count)
    }

    fn partition_count(&self) -> u32 {
        self.partition_count.get()
    }
}
