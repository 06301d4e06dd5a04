//! Framing for the qlink multi-queue link.
//!
//! Every frame starts with a fixed 4-byte header. The first byte selects the
//! frame kind:
//! - `0x00..=0xFD`: DATA for that queue id, followed by `count` raw items
//! - `0xFE`: CREDIT grant for a queue of the opposite direction
//! - `0xFF`: NOOP keepalive
//!
//! Items carry no per-item header; the receiver knows their width from the
//! DATA header and the queue configuration.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_header, encode_header, encode_item, FrameConfig, Header, HEADER_SIZE, MAX_QUEUE_ID,
    QID_CREDIT, QID_NOOP,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
