//! Butterfly exchange pattern.
//!
//! Round `r` pairs rank with `rank XOR (1 << r)`. For a power-of-two group
//! one sweep of `ceil(log2 P)` rounds carries every rank's input to every
//! other rank, directly or transitively, provided each node merges
//! deterministically. For other group sizes some pairings fall outside the
//! group and those ranks sit the round out; [`dissemination_schedule`]
//! repeats the sweep so the surviving exchange graph still reaches every
//! node.

/// The partner of `rank` in butterfly round `round` (zero-based), or `None`
/// when the pairing falls outside the group.
pub fn partner(rank: i32, round: u32, partition_count: i32) -> Option<i32> {
    if rank < 0 || rank >= partition_count {
        return None;
    }
    let candidate = rank ^ (1 << round);
    (candidate < partition_count).then_some(candidate)
}

/// Number of butterfly rounds needed for `partition_count` partitions:
/// `ceil(log2 P)`, and 0 for a single partition.
pub fn required_rounds(partition_count: i32) -> u32 {
    if partition_count <= 1 {
        return 0;
    }
    let p = partition_count as u32;
    u32::BITS - (p - 1).leading_zeros()
}

/// The exchange schedule that completes an all-to-all dissemination.
///
/// A power-of-two group needs exactly one sweep of the rounds. Otherwise
/// the ranks above the largest power-of-two block pair with the block only
/// in the top round, so their input cannot reach the rest of the group in
/// one sweep; a second sweep lets the block's complete hypercube spread it.
pub fn dissemination_schedule(partition_count: i32) -> Vec<u32> {
    let rounds = required_rounds(partition_count);
    if rounds == 0 {
        return Vec::new();
    }
    let power_of_two = partition_count & (partition_count - 1) == 0;
    let sweeps = if power_of_two { 1 } else { 2 };
    std::iter::repeat(0..rounds).take(sweeps).flatten().collect()
}
