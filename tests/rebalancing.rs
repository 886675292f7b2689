//! Elastic rebalancing must only move the keys it has to.
use hashinator::{
    configuration::{Configuration, ElasticConfiguration},
    hashinator::Hashinator,
    partitioning::{elastic::ElasticScheme, hash::token_of_i64},
    value::Value,
};
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use rand::Rng;

fn random_keys(n: usize) -> Vec<i64> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| rng.gen())
        .filter(|v| *v != i64::MIN)
        .collect()
}

/// Publishes `before` and `after` one at a time and returns the partition of every key under each of them
fn assignments(
    before: ElasticConfiguration,
    after: ElasticConfiguration,
    keys: &[i64],
) -> Vec<(u32, u32)> {
    let hashinator = Hashinator::new();
    hashinator.publish(Configuration::Elastic(before));
    let old = hashinator.snapshot().unwrap();
    hashinator.publish(Configuration::Elastic(after));
    let new = hashinator.snapshot().unwrap();

    keys.iter()
        .map(|v| {
            (
                old.hash_to_partition(&Value::BigInt(*v)).unwrap(),
                new.hash_to_partition(&Value::BigInt(*v)).unwrap(),
            )
        })
        .collect()
}

#[test]
fn test_add_partition_only_moves_keys_to_the_new_partition() {
    let before = ElasticConfiguration::uniform(8, 16).unwrap();
    let after = before.add_partition(16).unwrap();
    assert_eq!(after.partition_count(), 9);

    let keys = random_keys(10_000);
    let mut moved = 0;
    for (old, new) in assignments(before, after, &keys) {
        if old != new {
            assert_eq!(new, 8);
            moved += 1;
        }
    }

    // the new partition took over half of 16 of the 128 ranges, about 1/16th of the keys
    assert!(moved > 0);
    assert!(moved < keys.len() / 4);
}

#[test]
fn test_moved_keys_fall_inside_the_new_ranges() {
    let before = ElasticConfiguration::uniform(4, 4).unwrap();
    let after = before.add_partition(4).unwrap();

    // the ranges owned by the new partition: (previous token, token]
    let new_ranges: Vec<(u64, u64)> = after
        .tokens()
        .iter()
        .enumerate()
        .filter(|(i, _)| after.partitions()[*i] == 4)
        .map(|(i, token)| {
            let previous = if i == 0 {
                after.tokens()[after.len() - 1]
            } else {
                after.tokens()[i - 1]
            };
            (previous, *token)
        })
        .collect();
    let in_new_range = |token: u64| {
        new_ranges.iter().any(|(start, end)| {
            if start < end {
                token > *start && token <= *end
            } else {
                token > *start || token <= *end
            }
        })
    };

    let keys = random_keys(10_000);
    for (v, (old, new)) in keys.iter().zip(assignments(before, after, &keys)) {
        assert_eq!(old != new, in_new_range(token_of_i64(*v)), "key {}", v);
    }
}

#[test]
fn test_remove_partition_only_moves_its_keys() {
    let before = ElasticConfiguration::uniform(6, 8).unwrap();
    let after = before.remove_last_partition().unwrap();
    assert_eq!(after.partition_count(), 5);

    for (old, new) in assignments(before, after, &random_keys(10_000)) {
        if old == 5 {
            assert!(new < 5);
        } else {
            assert_eq!(old, new);
        }
    }
}

#[test]
fn test_removed_keys_go_to_ring_successors() {
    // partition 2 owns (20, 30], its keys must go to the owner of token 40
    let before =
        ElasticConfiguration::new(vec![(10, 0), (20, 1), (30, 2), (40, 1), (u64::MAX / 2, 0)])
            .unwrap();
    let after = before.remove_last_partition().unwrap();
    assert_eq!(
        after.entries().collect::<Vec<_>>(),
        vec![(10, 0), (20, 1), (40, 1), (u64::MAX / 2, 0)]
    );

    let (old, new) = (ElasticScheme::new(&before), ElasticScheme::new(&after));
    for token in 21..=30 {
        assert_eq!(old.partition_for_token(token), 2);
        assert_eq!(new.partition_for_token(token), 1);
    }
    for token in [0, 10, 11, 20, 31, 40, 41, u64::MAX / 2, u64::MAX] {
        assert_eq!(old.partition_for_token(token), new.partition_for_token(token));
    }
}

#[derive(Debug, Clone)]
struct RebalanceInput {
    partition_count: u32,
    tokens_per_partition: u32,
    new_tokens: u32,
}

impl Arbitrary for RebalanceInput {
    fn arbitrary(g: &mut Gen) -> Self {
        Self {
            partition_count: u32::arbitrary(g) % 32 + 1,
            tokens_per_partition: u32::arbitrary(g) % 8 + 1,
            new_tokens: u32::arbitrary(g) % 8 + 1,
        }
    }
}

#[quickcheck]
fn test_grow_then_shrink_is_stable(input: RebalanceInput) {
    let before =
        ElasticConfiguration::uniform(input.partition_count, input.tokens_per_partition).unwrap();
    let grown = before.add_partition(input.new_tokens).unwrap();
    assert_eq!(grown.partition_count(), input.partition_count + 1);
    assert_eq!(grown.len(), before.len() + input.new_tokens as usize);

    let keys = random_keys(200);
    for (old, new) in assignments(before.clone(), grown.clone(), &keys) {
        assert!(old == new || new == input.partition_count);
    }

    // shrinking back moves every key to where it was
    let shrunk = grown.remove_last_partition().unwrap();
    assert_eq!(shrunk, before);
}
