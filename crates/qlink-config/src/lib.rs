//! Queue descriptor configuration for the qlink link.
//!
//! A link is described by a JSON array of queue descriptors, each naming a
//! direction (`h2f` host-to-device or `f2h` device-to-host), a per-direction
//! id, an item width in bytes, and a capacity on each side. This crate turns
//! that list into a validated [`QueueSet`]: ids contiguous from 0 in each
//! direction, widths and capacities positive and within what the wire format
//! can express.

pub mod config;
pub mod descriptor;
pub mod error;
#[cfg(feature = "schema")]
pub mod schema;
pub mod set;

pub use config::LoaderConfig;
pub use descriptor::{Direction, QueueDescriptor, RawQueueSpec};
pub use error::{ConfigError, Result};
pub use set::{QueueSet, MAX_CAPACITY, MAX_QUEUES_PER_DIRECTION, MAX_WIDTH};
