use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tracing::info;

use qlink_config::{Direction, QueueSet};

use crate::arbiter::{Arbiter, Burst, Transmit};
use crate::error::{ProtocolViolation, QueueError};
use crate::queue::{InboundQueue, OutboundQueue};
use crate::receiver::{Receiver, RecvEvent, RecvState};
use crate::snapshot::{EndpointSnapshot, QueueSnapshot};

/// Which side of the link an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Device,
}

impl Role {
    /// Direction of the queues this side sends on.
    pub fn outbound(self) -> Direction {
        match self {
            Role::Host => Direction::H2f,
            Role::Device => Direction::F2h,
        }
    }

    /// Direction of the queues this side receives on.
    pub fn inbound(self) -> Direction {
        self.outbound().opposite()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Host => f.write_str("host"),
            Role::Device => f.write_str("device"),
        }
    }
}

/// All queue state for one side of the link.
///
/// The endpoint does no I/O. Feed received bytes to [`Endpoint::receive`]
/// and put whatever [`Endpoint::poll_send`] returns on the wire.
///
/// Credits start out so that the host may fill the device's h2f buffers
/// immediately and owes the device a grant of its whole f2h capacity; the
/// device starts with no credit and nothing owed.
#[derive(Debug, Clone)]
pub struct Endpoint {
    role: Role,
    outbound: Vec<OutboundQueue>,
    inbound: Vec<InboundQueue>,
    receiver: Receiver,
    arbiter: Arbiter,
}

impl Endpoint {
    pub fn new(role: Role, queues: &QueueSet) -> Self {
        let outbound: Vec<OutboundQueue> = queues
            .queues(role.outbound())
            .iter()
            .map(|descriptor| {
                let credits = match descriptor.direction {
                    Direction::H2f => descriptor.receiver_capacity,
                    Direction::F2h => 0,
                };
                OutboundQueue::new(descriptor.clone(), credits)
            })
            .collect();
        let inbound: Vec<InboundQueue> = queues
            .queues(role.inbound())
            .iter()
            .map(|descriptor| {
                let owed = match descriptor.direction {
                    Direction::F2h => descriptor.receiver_capacity,
                    Direction::H2f => 0,
                };
                InboundQueue::new(descriptor.clone(), owed)
            })
            .collect();

        info!(
            %role,
            outbound = outbound.len(),
            inbound = inbound.len(),
            "endpoint created"
        );

        Self {
            role,
            arbiter: Arbiter::new(inbound.len(), outbound.len()),
            receiver: Receiver::new(role.inbound()),
            outbound,
            inbound,
        }
    }

    pub fn host(queues: &QueueSet) -> Self {
        Self::new(Role::Host, queues)
    }

    pub fn device(queues: &QueueSet) -> Self {
        Self::new(Role::Device, queues)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn outbound(&self) -> &[OutboundQueue] {
        &self.outbound
    }

    pub fn inbound(&self) -> &[InboundQueue] {
        &self.inbound
    }

    /// Queue one item for sending on outbound queue `queue`.
    pub fn enqueue(&mut self, queue: usize, item: impl Into<Bytes>) -> Result<(), QueueError> {
        let direction = self.role.outbound();
        let count = self.outbound.len();
        self.outbound
            .get_mut(queue)
            .ok_or(QueueError::UnknownQueue {
                direction,
                queue,
                count,
            })?
            .push(item.into())
    }

    /// Take the oldest received item from inbound queue `queue`.
    pub fn dequeue(&mut self, queue: usize) -> Result<Bytes, QueueError> {
        let direction = self.role.inbound();
        let count = self.inbound.len();
        self.inbound
            .get_mut(queue)
            .ok_or(QueueError::UnknownQueue {
                direction,
                queue,
                count,
            })?
            .pop()
    }

    /// One send opportunity. `None` means nothing is eligible.
    pub fn poll_send(&mut self) -> Option<Transmit> {
        self.arbiter.poll(&mut self.inbound, &mut self.outbound)
    }

    /// Consume at most one header or item from `src`.
    ///
    /// A CREDIT frame may arrive while an outbound burst is in progress. Its
    /// value replaces the credit at once, and every item still owed by that
    /// burst is charged against it, flooring at zero.
    pub fn receive(&mut self, src: &mut BytesMut) -> Result<Option<RecvEvent>, ProtocolViolation> {
        self.receiver
            .step(src, &mut self.inbound, &mut self.outbound)
    }

    /// Consume everything complete in `src`; returns the number of events.
    pub fn receive_all(&mut self, src: &mut BytesMut) -> Result<usize, ProtocolViolation> {
        let mut events = 0;
        while self.receive(src)?.is_some() {
            events += 1;
        }
        Ok(events)
    }

    pub fn burst(&self) -> Option<Burst> {
        self.arbiter.burst()
    }

    pub fn receive_state(&self) -> RecvState {
        self.receiver.state()
    }

    /// The violation that halted receive, if any.
    pub fn violation(&self) -> Option<&ProtocolViolation> {
        self.receiver.halted()
    }

    /// Nothing queued to send, no credit owed, no frame half-done.
    pub fn is_quiescent(&self) -> bool {
        self.burst().is_none()
            && self.receive_state() == RecvState::Idle
            && self.outbound.iter().all(|q| q.occupancy() == 0)
            && self.inbound.iter().all(|q| q.pending_grant() == 0)
    }

    pub fn snapshot(&self) -> EndpointSnapshot {
        EndpointSnapshot {
            role: self.role,
            outbound: self.outbound.iter().map(QueueSnapshot::outbound).collect(),
            inbound: self.inbound.iter().map(QueueSnapshot::inbound).collect(),
            burst: self.burst(),
            receive: self.receive_state(),
            violation: self.violation().map(ToString::to_string),
        }
    }
}
