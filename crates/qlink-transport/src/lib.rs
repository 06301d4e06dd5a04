//! Byte-stream channel primitives for the qlink link layer.
//!
//! This is the physical layer below the multi-queue protocol. It only moves
//! bytes; it never interprets them and never retransmits. Provided channels:
//! - TCP (device side listens, host side connects with retries)
//! - An in-process duplex pair used for simulation and tests
//!
//! Everything above builds on [`LinkStream`], or on any `Read + Write` type.

pub mod config;
pub mod error;
pub mod memory;
pub mod stream;
pub mod tcp;

pub use config::{TcpConfig, DEFAULT_ADDRESS, DEFAULT_CONNECT_ATTEMPTS};
pub use error::{Result, TransportError};
pub use memory::MemoryChannel;
pub use stream::LinkStream;
pub use tcp::TcpLink;
