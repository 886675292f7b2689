//! The token table behind the elastic (consistent hashing) scheme.
//!
//! The hash space is [0, 2^64) viewed as a ring. Every token is a position on the ring owned by exactly one partition,
//! and a partition owns the range that ends at its token: (previous token, token]. The first token also owns
//! everything past the last token (the range wraps around the ring).
//!
//! Example with a hash space from 0 to 99:
//! tokens:     [ 10 ,  40 ,  70 ]
//! partitions: [  0 ,   1 ,   2 ]
//!
//! hash 25 -> owned by partition 1 (token 40)
//! hash 70 -> owned by partition 2 (token 70)
//! hash 85 -> owned by partition 0 (token 10) since the ring wraps
//!
//! Topology changes are expressed as edits to the token table that produce a new [`ElasticConfiguration`].
//! Inserting a token only moves the keys inside the range it splits off. Removing tokens only moves the keys
//! they owned, to the next token on the ring.
use std::collections::BTreeSet;

use tracing::{event, instrument, Level};

use crate::{
    error::{ConfigurationError, Result},
    partitioning::PartitionId,
};

/// Upper bound on the number of tokens in a ring
pub const MAX_RING_TOKENS: usize = 1 << 20;

/// A validated, immutable token table.
///
/// Invariants:
///  1. the ring is not empty
///  2. tokens are unique and sorted in ascending order
///  3. partition ids are dense: every id is in [0, partition_count) and every id in that range owns a token.
///     In particular, partition 0 always exists.
///  4. the ring holds at most [`MAX_RING_TOKENS`] tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticConfiguration {
    tokens: Vec<u64>,
    partitions: Vec<PartitionId>,
    partition_count: u32,
}

impl ElasticConfiguration {
    /// Builds a token table from `(token, partition_id)` entries
    ///
    /// # Errors
    /// Returns [`ConfigurationError`] if any of the invariants listed on [`ElasticConfiguration`] doesn't hold
    pub fn new(entries: Vec<(u64, PartitionId)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(ConfigurationError::EmptyRing.into());
        }
        ensure_ring_size(entries.len() as u64)?;

        for (index, window) in entries.windows(2).enumerate() {
            let (previous, current) = (window[0].0, window[1].0);
            if previous == current {
                return Err(ConfigurationError::DuplicateToken { token: current }.into());
            }
            if previous > current {
                return Err(ConfigurationError::UnsortedTokens { index: index + 1 }.into());
            }
        }

        let distinct: BTreeSet<PartitionId> = entries.iter().map(|(_, p)| *p).collect();
        let partition_count = distinct.len() as u32;
        // ids are unique in the set, so max < count means the set is exactly [0, count)
        if let Some(&max) = distinct.iter().next_back() {
            if max >= partition_count {
                return Err(ConfigurationError::PartitionIdOutOfRange {
                    partition_id: max,
                    partition_count,
                }
                .into());
            }
        }

        let (tokens, partitions) = entries.into_iter().unzip();
        Ok(Self {
            tokens,
            partitions,
            partition_count,
        })
    }

    /// Builds a ring with `tokens_per_partition` tokens for each of the `partition_count` partitions.
    ///
    /// Tokens are evenly spaced: token `i` sits at `i * (u64::MAX / total)` and is owned by partition
    /// `i % partition_count`, so consecutive ranges belong to different partitions.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::RingTooLarge`] if the ring would hold more than [`MAX_RING_TOKENS`] tokens
    pub fn uniform(partition_count: u32, tokens_per_partition: u32) -> Result<Self> {
        if partition_count == 0 {
            return Err(ConfigurationError::ZeroPartitions.into());
        }
        if tokens_per_partition == 0 {
            return Err(ConfigurationError::EmptyRing.into());
        }

        let total = partition_count as u64 * tokens_per_partition as u64;
        ensure_ring_size(total)?;
        let step = u64::MAX / total;
        let entries = (0..total)
            .map(|i| (i * step, (i % partition_count as u64) as PartitionId))
            .collect();

        Self::new(entries)
    }

    /// Number of distinct partitions on the ring
    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    /// Number of tokens on the ring
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Always false; an [`ElasticConfiguration`] can't be constructed without tokens
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[u64] {
        &self.tokens
    }

    pub fn partitions(&self) -> &[PartitionId] {
        &self.partitions
    }

    /// `(token, partition_id)` pairs in ascending token order
    pub fn entries(&self) -> impl Iterator<Item = (u64, PartitionId)> + '_ {
        self.tokens
            .iter()
            .copied()
            .zip(self.partitions.iter().copied())
    }

    /// Returns a new configuration with one extra partition (its id is the current partition count).
    ///
    /// The new partition receives `n_tokens` tokens. Each one is placed at the midpoint of the widest range on the
    /// ring at the time it is inserted, so the new partition takes over half of that range from its current owner and
    /// nothing else moves.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::InvalidRebalance`] if `n_tokens` is 0 or the ring has no range left to split
    /// and [`ConfigurationError::RingTooLarge`] if the grown ring would exceed [`MAX_RING_TOKENS`]
    #[instrument(level = "info", skip(self), fields(partition_count = self.partition_count))]
    pub fn add_partition(&self, n_tokens: u32) -> Result<Self> {
        if n_tokens == 0 {
            return Err(ConfigurationError::InvalidRebalance {
                reason: "A new partition needs at least one token".to_string(),
            }
            .into());
        }

        ensure_ring_size(self.len() as u64 + n_tokens as u64)?;

        let new_partition = self.partition_count;
        let mut tokens = self.tokens.clone();
        let mut partitions = self.partitions.clone();

        for _ in 0..n_tokens {
            let (start, width) = widest_range(&tokens);
            if width < 2 {
                return Err(ConfigurationError::InvalidRebalance {
                    reason: "No token range is wide enough to be split".to_string(),
                }
                .into());
            }

            let token = start.wrapping_add(width / 2);
            match tokens.binary_search(&token) {
                Ok(_) => {
                    return Err(ConfigurationError::InvalidRebalance {
                        reason: format!("Token {} is already on the ring", token),
                    }
                    .into())
                }
                Err(index) => {
                    event!(Level::DEBUG, "Inserting token {} at index {}", token, index);
                    tokens.insert(index, token);
                    partitions.insert(index, new_partition);
                }
            }
        }

        Self::new(tokens.into_iter().zip(partitions).collect())
    }

    /// Returns a new configuration without the partition holding the highest id. Its keys move to the partitions
    /// owning the next tokens on the ring.
    ///
    /// Only the highest id can be removed so that ids stay dense, and partition 0 can never be removed since
    /// every NULL key is routed to it.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::InvalidRebalance`] if the ring only holds partition 0
    #[instrument(level = "info", skip(self), fields(partition_count = self.partition_count))]
    pub fn remove_last_partition(&self) -> Result<Self> {
        if self.partition_count == 1 {
            return Err(ConfigurationError::InvalidRebalance {
                reason: "Partition 0 can't be removed".to_string(),
            }
            .into());
        }

        let removed = self.partition_count - 1;
        Self::new(self.entries().filter(|(_, p)| *p != removed).collect())
    }
}

fn ensure_ring_size(tokens: u64) -> Result<()> {
    if tokens > MAX_RING_TOKENS as u64 {
        return Err(ConfigurationError::RingTooLarge {
            tokens,
            max: MAX_RING_TOKENS,
        }
        .into());
    }

    Ok(())
}

/// Returns the exclusive start and the width of the widest range on the ring. Ties go to the lowest token.
///
/// The range owned by token `i` is (token[i - 1], token[i]], and the one owned by token 0 wraps around from the last token.
/// A single token owns the entire ring, which is reported as a width of [`u64::MAX`].
fn widest_range(tokens: &[u64]) -> (u64, u64) {
    let last = tokens[tokens.len() - 1];
    if tokens.len() == 1 {
        return (last, u64::MAX);
    }

    let mut widest = (last, tokens[0].wrapping_sub(last));
    for window in tokens.windows(2) {
        let width = window[1] - window[0];
        if width > widest.1 {
            widest = (window[0], width);
        }
    }

    widest
}
