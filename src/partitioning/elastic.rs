//! The elastic [`PartitioningScheme`]: consistent hashing over the token ring of an [`ElasticConfiguration`].
//!
//! A key is owned by the first token whose value is >= the key's token, wrapping around to the first token of the ring
//! when the key's token is past the last one. See [`crate::configuration::elastic`] for how the ring is laid out and
//! edited.
use crate::{configuration::ElasticConfiguration, value::NormalizedKey};

use super::{hash::token_of, PartitionId, PartitioningScheme};

#[derive(Clone, Debug)]
pub struct ElasticScheme {
    tokens: Vec<u64>,
    partitions: Vec<PartitionId>,
    partition_count: u32,
}

impl ElasticScheme {
    pub fn new(configuration: &ElasticConfiguration) -> Self {
        Self {
            tokens: configuration.tokens().to_vec(),
            partitions: configuration.partitions().to_vec(),
            partition_count: configuration.partition_count(),
        }
    }

    /// Returns the partition owning position `token` on the ring
    pub fn partition_for_token(&self, token: u64) -> PartitionId {
        self.partitions[self.owner_index(token)]
    }

    fn owner_index(&self, token: u64) -> usize {
        // a validated configuration always has at least one token
        self.tokens.partition_point(|elem| *elem < token) % self.tokens.len()
    }
}

impl PartitioningScheme for ElasticScheme {
    /// NULL keys have no position on the ring and are routed to partition 0, same as the legacy scheme
    fn partition_for(&self, key: &NormalizedKey) -> PartitionId {
        match token_of(key) {
            Some(token) => self.partition_for_token(token),
            None => 0,
        }
    }

    fn partition_count(&self) -> u32 {
        self.partition_count
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use quickcheck::{Arbitrary, Gen};

    use super::ElasticScheme;
    use crate::{
        configuration::ElasticConfiguration,
        partitioning::{hash::token_of_i64, PartitioningScheme},
        value::NormalizedKey,
    };

    fn test_ring() -> ElasticScheme {
        ElasticScheme::new(
            &ElasticConfiguration::new(vec![(10, 0), (20, 1), (30, 2), (40, 3)]).unwrap(),
        )
    }

    struct TableTest {
        token: u64,
        owner: u32,
    }

    #[test]
    fn test_partition_for_token_table() {
        let ring = test_ring();
        let test_cases = vec![
            TableTest { token: 0, owner: 0 },
            TableTest { token: 5, owner: 0 },
            TableTest { token: 10, owner: 0 },
            TableTest { token: 11, owner: 1 },
            TableTest { token: 19, owner: 1 },
            TableTest { token: 20, owner: 1 },
            TableTest { token: 21, owner: 2 },
            TableTest { token: 30, owner: 2 },
            TableTest { token: 31, owner: 3 },
            TableTest { token: 40, owner: 3 },
            // this is where we go around the ring back to partition 0
            TableTest { token: 41, owner: 0 },
            TableTest {
                token: u64::MAX,
                owner: 0,
            },
        ];

        for test_case in test_cases {
            assert_eq!(
                ring.partition_for_token(test_case.token),
                test_case.owner,
                "token {}",
                test_case.token
            );
        }
    }

    #[test]
    fn test_single_token() {
        let ring = ElasticScheme::new(&ElasticConfiguration::new(vec![(1 << 40, 0)]).unwrap());
        for token in [0, 1 << 40, u64::MAX] {
            assert_eq!(ring.partition_for_token(token), 0);
        }
    }

    #[test]
    fn test_null_goes_to_partition_zero() {
        // partition 0 owns no range near the start of this ring, NULL still goes to 0
        let ring = ElasticScheme::new(
            &ElasticConfiguration::new(vec![(10, 1), (u64::MAX, 0)]).unwrap(),
        );
        assert_eq!(ring.partition_for(&NormalizedKey::Null), 0);
    }

    #[test]
    fn test_empty_bytes_use_the_ring() {
        // the token of an empty sequence is 0, owned by the first token of the ring (partition 1 here)
        let ring = ElasticScheme::new(
            &ElasticConfiguration::new(vec![(10, 1), (u64::MAX, 0)]).unwrap(),
        );
        assert_eq!(ring.partition_for(&NormalizedKey::Bytes(Bytes::new())), 1);
    }

    #[test]
    fn test_integer_keys_use_the_shared_token() {
        let ring = ElasticScheme::new(&ElasticConfiguration::uniform(8, 32).unwrap());
        for v in [0i64, 1, 2, 42, -1, i64::MIN, i64::MAX] {
            assert_eq!(
                ring.partition_for(&NormalizedKey::Integer(v)),
                ring.partition_for_token(token_of_i64(v))
            );
        }
    }

    #[derive(Debug, Clone)]
    struct RingInput {
        partition_count: u32,
        tokens_per_partition: u32,
        keys: Vec<i64>,
    }

    impl Arbitrary for RingInput {
        fn arbitrary(g: &mut Gen) -> Self {
            Self {
                partition_count: u32::arbitrary(g) % 64 + 1,
                tokens_per_partition: u32::arbitrary(g) % 16 + 1,
                keys: Vec::<i64>::arbitrary(g),
            }
        }
    }

    // Randomized inputs - every key must land on a partition of the ring
    #[quickcheck]
    fn test_partition_in_range_randomized(input: RingInput) {
        let ring = ElasticScheme::new(
            &ElasticConfiguration::uniform(input.partition_count, input.tokens_per_partition)
                .unwrap(),
        );
        assert_eq!(ring.partition_count(), input.partition_count);
        for key in input.keys {
            assert!(ring.partition_for(&NormalizedKey::Integer(key)) < input.partition_count);
        }
    }
}
