use std::path::PathBuf;

use crate::descriptor::Direction;

/// Errors detected while loading or validating queue descriptors.
///
/// All of these are fatal at startup; the link never runs with an invalid set.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The queue file could not be read.
    #[error("failed to read queue spec {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The queue file exceeds the configured size limit.
    #[error("queue spec {} too large ({size} bytes, max {max})", .path.display())]
    TooLarge {
        path: PathBuf,
        size: u64,
        max: usize,
    },

    /// The queue file is not valid JSON or does not have the descriptor shape.
    #[error("queue spec is not valid: {0}")]
    Json(#[from] serde_json::Error),

    /// The queue file failed the structural JSON Schema check.
    #[error("queue spec failed schema check: {0}")]
    Schema(String),

    /// `dir` is neither `h2f` nor `f2h`.
    #[error("unrecognized direction in queue descriptor {descriptor} (expected \"h2f\" or \"f2h\")")]
    UnknownDirection { descriptor: String },

    /// Ids in one direction have a gap or a duplicate.
    #[error("{direction} queue ids are not contiguous: expected id {expected}, found {descriptor}")]
    NonContiguousIds {
        direction: Direction,
        expected: usize,
        descriptor: String,
    },

    /// Item width is zero or negative.
    #[error("item width must be positive in {descriptor}")]
    NonPositiveWidth { descriptor: String },

    /// Item width does not fit the header's width field.
    #[error("item width exceeds {max} bytes in {descriptor}")]
    WidthTooLarge { descriptor: String, max: usize },

    /// A capacity is zero or negative.
    #[error("{field} must be positive in {descriptor}")]
    NonPositiveCapacity {
        descriptor: String,
        field: &'static str,
    },

    /// A capacity does not fit the header's count field.
    #[error("{field} exceeds {max} items in {descriptor}")]
    CapacityTooLarge {
        descriptor: String,
        field: &'static str,
        max: usize,
    },

    /// More queues in one direction than the id byte can address.
    #[error("too many {direction} queues ({count}, max {max})")]
    TooManyQueues {
        direction: Direction,
        count: usize,
        max: usize,
    },

    /// The queue file declares no queues at all.
    #[error("queue spec declares no queues")]
    NoQueues,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
