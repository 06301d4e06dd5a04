use bytes::Bytes;
use serde::Serialize;
use tracing::debug;

use qlink_frame::Header;

use crate::queue::{InboundQueue, OutboundQueue};

/// One entry of the fixed send schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// Return pending credit for inbound queue `n`.
    Grant(u8),
    /// Start a burst on outbound queue `n`.
    Header(u8),
    /// Send the next item of the burst in progress.
    Items,
}

/// A DATA header has been sent and `remaining` of its items have not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Burst {
    pub queue: u8,
    pub remaining: u16,
}

/// What to put on the wire for one send opportunity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transmit {
    Header(Header),
    Item { queue: u8, item: Bytes },
}

/// Static-priority scheduler for outbound frames.
///
/// The schedule is grants for every inbound queue, then headers for every
/// outbound queue, then burst items; the first enabled candidate fires.
/// Grants and headers are only enabled between bursts, so a burst's items
/// always follow its header back to back.
#[derive(Debug, Clone)]
pub struct Arbiter {
    schedule: Vec<Candidate>,
    burst: Option<Burst>,
}

impl Arbiter {
    pub fn new(inbound: usize, outbound: usize) -> Self {
        let grants = (0..inbound).filter_map(|n| u8::try_from(n).ok().map(Candidate::Grant));
        let headers = (0..outbound).filter_map(|n| u8::try_from(n).ok().map(Candidate::Header));
        let schedule = grants
            .chain(headers)
            .chain(std::iter::once(Candidate::Items))
            .collect();
        Self {
            schedule,
            burst: None,
        }
    }

    pub fn schedule(&self) -> &[Candidate] {
        &self.schedule
    }

    pub fn burst(&self) -> Option<Burst> {
        self.burst
    }

    /// Fire the highest-priority enabled candidate, if any.
    pub fn poll(
        &mut self,
        inbound: &mut [InboundQueue],
        outbound: &mut [OutboundQueue],
    ) -> Option<Transmit> {
        let Self { schedule, burst } = self;
        schedule
            .iter()
            .find_map(|candidate| fire(*candidate, burst, inbound, outbound))
    }
}

fn fire(
    candidate: Candidate,
    burst: &mut Option<Burst>,
    inbound: &mut [InboundQueue],
    outbound: &mut [OutboundQueue],
) -> Option<Transmit> {
    match candidate {
        Candidate::Grant(n) => {
            if burst.is_some() {
                return None;
            }
            let credits = inbound.get_mut(usize::from(n))?.take_grant()?;
            debug!(queue = n, credits, "sending credit");
            Some(Transmit::Header(Header::Credit { queue: n, credits }))
        }
        Candidate::Header(n) => {
            if burst.is_some() {
                return None;
            }
            let queue = outbound.get(usize::from(n))?;
            let count = queue.ready();
            if count == 0 {
                return None;
            }
            *burst = Some(Burst {
                queue: n,
                remaining: count,
            });
            debug!(queue = %queue.descriptor().label(), count, "starting burst");
            Some(Transmit::Header(Header::Data {
                queue: n,
                count,
                width: queue.descriptor().width,
            }))
        }
        Candidate::Items => {
            let Burst { queue, remaining } = (*burst)?;
            let Some(source) = outbound.get_mut(usize::from(queue)) else {
                *burst = None;
                return None;
            };
            // Occupancy only grows outside the arbiter, so a declared burst
            // always has its items.
            let Some(item) = source.take_item() else {
                *burst = None;
                return None;
            };
            let remaining = remaining - 1;
            if remaining == 0 {
                source.record_burst();
                *burst = None;
            } else {
                *burst = Some(Burst { queue, remaining });
            }
            Some(Transmit::Item { queue, item })
        }
    }
}
