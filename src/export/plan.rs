//! Partition planning for sharded exports
//!
//! Splits the row space `[0, total_rows - 1]` into contiguous, gap-free,
//! non-overlapping offset ranges, one per shard. Partition sizes come from
//! integer division; the final partition absorbs the remainder so the union
//! always covers the full row space exactly once.

/// An inclusive, zero-based row-offset range assigned to one shard.
///
/// Offsets are relative to the source query's own ordering. Invariant:
/// `low <= high` for every partition - empty partitions are never planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Shard index, `0..shard_count`
    pub index: usize,

    /// First row offset covered (inclusive)
    pub low: u64,

    /// Last row offset covered (inclusive)
    pub high: u64,
}

impl Partition {
    /// Number of rows in this partition
    pub fn len(&self) -> u64 {
        self.high - self.low + 1
    }

    /// Label used for thread names, progress bars and log events
    pub fn label(&self) -> String {
        format!("shard-{}", self.index)
    }
}

/// Clamp a requested shard count to something the planner can satisfy.
///
/// A shard must own at least one row, so the effective count is
/// `max(1, min(requested, total_rows))`.
pub fn clamp_shard_count(requested: usize, total_rows: u64) -> usize {
    requested.max(1).min(total_rows.max(1) as usize)
}

/// Compute the partition plan for `total_rows` rows across `shard_count`
/// shards.
///
/// The shard count is clamped internally, so callers may pass the requested
/// value directly. `total_rows == 0` is a job-level configuration error and
/// must be rejected before planning; the planner itself requires at least
/// one row.
///
/// Example: 100 rows over 3 shards yields `[0,32] [33,65] [66,99]`.
pub fn plan(total_rows: u64, shard_count: usize) -> Vec<Partition> {
    debug_assert!(total_rows > 0, "planner requires at least one row");

    let shards = clamp_shard_count(shard_count, total_rows);
    let shard_size = total_rows / shards as u64;

    let mut partitions = Vec::with_capacity(shards);
    for index in 0..shards {
        let low = index as u64 * shard_size;
        let high = if index == shards - 1 {
            // Final partition absorbs the integer-division remainder
            total_rows - 1
        } else {
            low + shard_size - 1
        };
        partitions.push(Partition { index, low, high });
    }

    partitions
}
