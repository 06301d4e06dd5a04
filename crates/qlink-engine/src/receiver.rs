use bytes::BytesMut;
use serde::Serialize;
use tracing::{debug, error, trace};

use qlink_config::Direction;
use qlink_frame::{decode_header, Header};

use crate::error::{FrameKind, ProtocolViolation};
use crate::queue::{InboundQueue, OutboundQueue};

/// Where the receiver is in the inbound byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecvState {
    /// Next bytes are a frame header.
    Idle,
    /// Next bytes are `remaining` items of `width` bytes for `queue`.
    AwaitingItems { queue: u8, remaining: u16, width: u8 },
}

/// One unit of progress made by [`Receiver::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvEvent {
    /// A DATA header was accepted.
    BurstStarted { queue: u8, count: u16 },
    /// An item was stored; `remaining` more belong to the same burst.
    Item { queue: u8, remaining: u16 },
    /// A CREDIT frame updated an outbound queue.
    Credit { queue: u8, credits: u16 },
    /// A NOOP frame was skipped.
    Noop,
}

/// Receive state machine for one endpoint.
///
/// DATA frames address the endpoint's inbound queues; CREDIT frames address
/// its outbound queues. After the first violation the receiver stops
/// consuming input and keeps returning that violation.
#[derive(Debug, Clone)]
pub struct Receiver {
    inbound: Direction,
    state: RecvState,
    halted: Option<ProtocolViolation>,
}

impl Receiver {
    /// Receiver for an endpoint whose inbound queues run in `inbound`.
    pub fn new(inbound: Direction) -> Self {
        Self {
            inbound,
            state: RecvState::Idle,
            halted: None,
        }
    }

    pub fn state(&self) -> RecvState {
        self.state
    }

    pub fn halted(&self) -> Option<&ProtocolViolation> {
        self.halted.as_ref()
    }

    /// Consume at most one header or one item from `src`.
    ///
    /// Returns `Ok(None)` when `src` does not hold enough bytes to make
    /// progress; nothing is consumed in that case.
    pub fn step(
        &mut self,
        src: &mut BytesMut,
        inbound: &mut [InboundQueue],
        outbound: &mut [OutboundQueue],
    ) -> Result<Option<RecvEvent>, ProtocolViolation> {
        if let Some(violation) = &self.halted {
            return Err(violation.clone());
        }
        let result = self.advance(src, inbound, outbound);
        if let Err(violation) = &result {
            error!(%violation, "receive halted");
            self.halted = Some(violation.clone());
        }
        result
    }

    fn advance(
        &mut self,
        src: &mut BytesMut,
        inbound: &mut [InboundQueue],
        outbound: &mut [OutboundQueue],
    ) -> Result<Option<RecvEvent>, ProtocolViolation> {
        match self.state {
            RecvState::Idle => {
                let Some(header) = decode_header(src) else {
                    return Ok(None);
                };
                trace!(%header, "header received");
                self.on_header(header, inbound, outbound).map(Some)
            }
            RecvState::AwaitingItems {
                queue,
                remaining,
                width,
            } => {
                let width_bytes = usize::from(width);
                if src.len() < width_bytes {
                    return Ok(None);
                }
                let target = self.inbound_queue(inbound, queue, FrameKind::Data)?;
                let item = src.split_to(width_bytes).freeze();
                target.accept(item)?;

                let remaining = remaining - 1;
                if remaining == 0 {
                    target.record_burst();
                    self.state = RecvState::Idle;
                } else {
                    self.state = RecvState::AwaitingItems {
                        queue,
                        remaining,
                        width,
                    };
                }
                Ok(Some(RecvEvent::Item { queue, remaining }))
            }
        }
    }

    fn on_header(
        &mut self,
        header: Header,
        inbound: &mut [InboundQueue],
        outbound: &mut [OutboundQueue],
    ) -> Result<RecvEvent, ProtocolViolation> {
        match header {
            Header::Data {
                queue,
                count,
                width,
            } => {
                let target = self.inbound_queue(inbound, queue, FrameKind::Data)?;
                let expected = target.descriptor().width;
                if width != expected {
                    return Err(ProtocolViolation::WidthMismatch {
                        direction: self.inbound,
                        queue,
                        expected,
                        observed: width,
                    });
                }
                debug!(queue = %target.descriptor().label(), count, "burst started");
                if count > 0 {
                    self.state = RecvState::AwaitingItems {
                        queue,
                        remaining: count,
                        width,
                    };
                }
                Ok(RecvEvent::BurstStarted { queue, count })
            }
            Header::Credit { queue, credits } => {
                let count = outbound.len();
                let target = outbound.get_mut(usize::from(queue)).ok_or(
                    ProtocolViolation::UnknownQueue {
                        kind: FrameKind::Credit,
                        direction: self.inbound.opposite(),
                        queue,
                        count,
                    },
                )?;
                target.apply_grant(credits)?;
                Ok(RecvEvent::Credit { queue, credits })
            }
            Header::Noop => Ok(RecvEvent::Noop),
        }
    }

    fn inbound_queue<'q>(
        &self,
        inbound: &'q mut [InboundQueue],
        queue: u8,
        kind: FrameKind,
    ) -> Result<&'q mut InboundQueue, ProtocolViolation> {
        let count = inbound.len();
        inbound
            .get_mut(usize::from(queue))
            .ok_or(ProtocolViolation::UnknownQueue {
                kind,
                direction: self.inbound,
                queue,
                count,
            })
    }
}
