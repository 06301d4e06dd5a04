use std::fmt;
use std::time::Duration;

use qlink_config::Direction;

/// Failures of a single bounded FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("buffer full")]
    Full,
    #[error("buffer empty")]
    Empty,
    #[error("item is {actual} bytes, expected {expected}")]
    WidthMismatch { expected: usize, actual: usize },
}

/// Application-facing queue errors. All are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// No room; retry after the link drains the queue.
    #[error("{direction} queue {queue} is full ({capacity} items)")]
    Full {
        direction: Direction,
        queue: u8,
        capacity: usize,
    },

    /// Nothing to dequeue yet.
    #[error("{direction} queue {queue} is empty")]
    Empty { direction: Direction, queue: u8 },

    /// The queue index is out of range for this endpoint.
    #[error("no {direction} queue {queue} ({count} configured)")]
    UnknownQueue {
        direction: Direction,
        queue: usize,
        count: usize,
    },

    /// The item length does not match the queue width.
    #[error("item for {direction} queue {queue} is {actual} bytes, expected {expected}")]
    WidthMismatch {
        direction: Direction,
        queue: u8,
        expected: usize,
        actual: usize,
    },
}

/// The frame kind a violation was detected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Data,
    Credit,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Data => f.write_str("DATA"),
            FrameKind::Credit => f.write_str("CREDIT"),
        }
    }
}

/// The two endpoints disagree about configuration or credit state.
///
/// There is no resynchronization frame, so a violation halts the receive
/// direction it was detected on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("DATA header for {direction} queue {queue} declares width {observed}, configured width is {expected}")]
    WidthMismatch {
        direction: Direction,
        queue: u8,
        expected: u8,
        observed: u8,
    },

    #[error("{kind} frame addresses unknown {direction} queue {queue} ({count} configured)")]
    UnknownQueue {
        kind: FrameKind,
        direction: Direction,
        queue: u8,
        count: usize,
    },

    #[error("{direction} queue {queue} overflowed its {capacity}-item buffer: sender exceeded granted credit")]
    Overflow {
        direction: Direction,
        queue: u8,
        capacity: usize,
    },

    #[error("credit grant of {credits} for {direction} queue {queue} exceeds receiver capacity {capacity}")]
    CreditOverflow {
        direction: Direction,
        queue: u8,
        credits: u16,
        capacity: u16,
    },
}

/// Errors from driving an endpoint over a stream.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("transport error: {0}")]
    Transport(#[from] qlink_transport::TransportError),

    #[error("frame error: {0}")]
    Frame(#[from] qlink_frame::FrameError),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, LinkError>;
