//! Credit-based multiplexing of fixed-width queues between a host and a
//! device over one byte stream.
//!
//! # Crate Structure
//!
//! - [`transport`] — byte-stream channels (TCP, in-process memory pair)
//! - [`frame`] — 4-byte frame headers, raw item encoding, frame reader/writer
//! - [`config`] — queue descriptor loading and validation
//! - [`engine`] — queue buffers, credit accounting, receive state machine,
//!   send arbiter and the stream driver
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use qlink::config::QueueSet;
//! use qlink::engine::{Endpoint, Link, LinkConfig};
//! use qlink::transport::{TcpConfig, TcpLink};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let queues = QueueSet::from_path("queues.json".as_ref())?;
//! let stream = TcpLink::connect(&TcpConfig::default())?;
//! let mut link = Link::over_stream(Endpoint::host(&queues), stream, LinkConfig::default())?;
//! link.endpoint_mut().enqueue(0, vec![0u8; 8])?;
//! link.run_until(Duration::from_secs(5), |endpoint| {
//!     endpoint.inbound()[0].occupancy() > 0
//! })?;
//! println!("{:?}", link.endpoint_mut().dequeue(0)?);
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use qlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use qlink_frame::*;
}

/// Re-export queue configuration types.
pub mod config {
    pub use qlink_config::*;
}

/// Re-export engine types.
pub mod engine {
    pub use qlink_engine::*;
}

pub use qlink_config::{Direction, QueueSet};
pub use qlink_engine::{Endpoint, Link, LinkConfig, Role};
