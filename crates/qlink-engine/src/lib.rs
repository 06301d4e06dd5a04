//! Credit-based multiplexing of fixed-width queues over one byte channel.
//!
//! An [`Endpoint`] holds the runtime state of every queue for one side of the
//! link (host or device). Its two halves run independently:
//!
//! - the receive state machine consumes inbound bytes, routing DATA bursts
//!   into inbound queues and CREDIT frames into outbound queues;
//! - the send arbiter picks at most one frame per send opportunity, in a
//!   static priority order: credit grants, then data headers, then the items
//!   of the burst in progress.
//!
//! They share nothing but the per-queue counters. [`Link`] drives an endpoint
//! over a stream.

pub mod arbiter;
pub mod buffer;
pub mod endpoint;
pub mod error;
pub mod link;
pub mod queue;
pub mod receiver;
pub mod snapshot;

pub use arbiter::{Arbiter, Burst, Candidate, Transmit};
pub use buffer::ItemBuffer;
pub use endpoint::{Endpoint, Role};
pub use error::{BufferError, FrameKind, LinkError, ProtocolViolation, QueueError, Result};
pub use link::{Link, LinkConfig, StepOutcome};
pub use queue::{InboundQueue, OutboundQueue, QueueStats};
pub use receiver::{Receiver, RecvEvent, RecvState};
pub use snapshot::{EndpointSnapshot, QueueSnapshot};
