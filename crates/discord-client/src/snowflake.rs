//! Snowflake identifiers.
//!
//! IDs embed their creation time: the top 42 bits are milliseconds since
//! the platform epoch. Message IDs therefore increase monotonically within a
//! channel, and a timestamp can be turned into an ID usable as a paging
//! anchor.

/// First millisecond of 2015, the platform epoch.
pub const EPOCH_MS: i64 = 1_420_070_400_000;

const TIMESTAMP_SHIFT: u32 = 22;

/// Creation time of an ID in Unix milliseconds.
pub fn timestamp_ms(id: u64) -> i64 {
    (id >> TIMESTAMP_SHIFT) as i64 + EPOCH_MS
}

/// Smallest ID that could have been created at `unix_ms`.
///
/// Times before the epoch clamp to zero.
pub fn from_timestamp_ms(unix_ms: i64) -> u64 {
    let since_epoch = (unix_ms - EPOCH_MS).max(0) as u64;
    since_epoch << TIMESTAMP_SHIFT
}
