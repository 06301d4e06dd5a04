use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, trace};

use qlink_config::QueueDescriptor;

use crate::buffer::ItemBuffer;
use crate::error::{BufferError, ProtocolViolation, QueueError};

/// Lifetime counters for one queue on one endpoint.
///
/// On the sending side `bursts` and `items_sent` count what was transmitted
/// and the credit fields count grants received; on the receiving side they
/// count what arrived and the grants sent back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub items_sent: u64,
    pub items_received: u64,
    pub bursts: u64,
    pub credit_frames: u64,
    pub credits_granted: u64,
}

/// Sending-side state: the application's FIFO plus the credit the peer has
/// granted for it.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    descriptor: QueueDescriptor,
    buffer: ItemBuffer,
    credits: u16,
    stats: QueueStats,
}

impl OutboundQueue {
    pub fn new(descriptor: QueueDescriptor, credits: u16) -> Self {
        let buffer = ItemBuffer::new(
            descriptor.width_bytes(),
            usize::from(descriptor.sender_capacity),
        );
        let credits = credits.min(descriptor.receiver_capacity);
        Self {
            descriptor,
            buffer,
            credits,
            stats: QueueStats::default(),
        }
    }

    pub fn descriptor(&self) -> &QueueDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> u8 {
        self.descriptor.id
    }

    pub fn occupancy(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    /// Items the receiver has most recently authorized.
    pub fn credits(&self) -> u16 {
        self.credits
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    /// Application enqueue.
    pub fn push(&mut self, item: Bytes) -> Result<(), QueueError> {
        self.buffer.enqueue(item).map_err(|err| match err {
            BufferError::Full => QueueError::Full {
                direction: self.descriptor.direction,
                queue: self.descriptor.id,
                capacity: self.buffer.capacity(),
            },
            BufferError::Empty => QueueError::Empty {
                direction: self.descriptor.direction,
                queue: self.descriptor.id,
            },
            BufferError::WidthMismatch { expected, actual } => QueueError::WidthMismatch {
                direction: self.descriptor.direction,
                queue: self.descriptor.id,
                expected,
                actual,
            },
        })
    }

    /// Apply a CREDIT frame. The value replaces the current credit.
    pub fn apply_grant(&mut self, credits: u16) -> Result<(), ProtocolViolation> {
        let capacity = self.descriptor.receiver_capacity;
        if credits > capacity {
            return Err(ProtocolViolation::CreditOverflow {
                direction: self.descriptor.direction,
                queue: self.descriptor.id,
                credits,
                capacity,
            });
        }
        debug!(
            queue = %self.descriptor.label(),
            previous = self.credits,
            credits,
            "credit granted"
        );
        self.credits = credits;
        self.stats.credit_frames += 1;
        self.stats.credits_granted += u64::from(credits);
        Ok(())
    }

    /// Size of the burst that could start now: `min(occupancy, credits)`.
    pub fn ready(&self) -> u16 {
        let occupancy = u16::try_from(self.buffer.len()).unwrap_or(u16::MAX);
        occupancy.min(self.credits)
    }

    /// Dequeue the next item of a burst and consume one credit.
    ///
    /// Items of a declared burst were authorized when its header went out, so
    /// a smaller grant arriving mid-burst only floors the credit at zero.
    pub(crate) fn take_item(&mut self) -> Option<Bytes> {
        let item = self.buffer.dequeue().ok()?;
        self.credits = self.credits.saturating_sub(1);
        self.stats.items_sent += 1;
        trace!(queue = %self.descriptor.label(), credits = self.credits, "item sent");
        Some(item)
    }

    pub(crate) fn record_burst(&mut self) {
        self.stats.bursts += 1;
    }
}

/// Receiving-side state: the FIFO the peer fills plus the credit owed back
/// to it.
#[derive(Debug, Clone)]
pub struct InboundQueue {
    descriptor: QueueDescriptor,
    buffer: ItemBuffer,
    pending_grant: u16,
    stats: QueueStats,
}

impl InboundQueue {
    pub fn new(descriptor: QueueDescriptor, pending_grant: u16) -> Self {
        let capacity = descriptor.receiver_capacity;
        let buffer = ItemBuffer::new(descriptor.width_bytes(), usize::from(capacity));
        Self {
            descriptor,
            buffer,
            pending_grant: pending_grant.min(capacity),
            stats: QueueStats::default(),
        }
    }

    pub fn descriptor(&self) -> &QueueDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> u8 {
        self.descriptor.id
    }

    pub fn occupancy(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Slots freed by the application and not yet granted back.
    pub fn pending_grant(&self) -> u16 {
        self.pending_grant
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    /// Application dequeue. Frees one slot for the next grant.
    pub fn pop(&mut self) -> Result<Bytes, QueueError> {
        let item = self.buffer.dequeue().map_err(|_| QueueError::Empty {
            direction: self.descriptor.direction,
            queue: self.descriptor.id,
        })?;
        self.pending_grant = self
            .pending_grant
            .saturating_add(1)
            .min(self.descriptor.receiver_capacity);
        Ok(item)
    }

    /// Oldest item, without consuming it or freeing credit.
    pub fn peek(&self) -> Option<&Bytes> {
        self.buffer.front()
    }

    /// Store an item that arrived on the wire.
    pub(crate) fn accept(&mut self, item: Bytes) -> Result<(), ProtocolViolation> {
        match self.buffer.enqueue(item) {
            Ok(()) => {
                self.stats.items_received += 1;
                Ok(())
            }
            Err(BufferError::WidthMismatch { expected, actual }) => {
                Err(ProtocolViolation::WidthMismatch {
                    direction: self.descriptor.direction,
                    queue: self.descriptor.id,
                    expected: u8::try_from(expected).unwrap_or(u8::MAX),
                    observed: u8::try_from(actual).unwrap_or(u8::MAX),
                })
            }
            Err(_) => Err(ProtocolViolation::Overflow {
                direction: self.descriptor.direction,
                queue: self.descriptor.id,
                capacity: self.buffer.capacity(),
            }),
        }
    }

    /// Take the whole pending grant, leaving zero behind.
    pub(crate) fn take_grant(&mut self) -> Option<u16> {
        if self.pending_grant == 0 {
            return None;
        }
        let credits = std::mem::take(&mut self.pending_grant);
        self.stats.credit_frames += 1;
        self.stats.credits_granted += u64::from(credits);
        Some(credits)
    }

    pub(crate) fn record_burst(&mut self) {
        self.stats.bursts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlink_config::Direction;

    fn descriptor(direction: Direction, width: u8, sender: u16, receiver: u16) -> QueueDescriptor {
        QueueDescriptor {
            direction,
            id: 0,
            width,
            sender_capacity: sender,
            receiver_capacity: receiver,
            name: None,
        }
    }

    #[test]
    fn ready_is_min_of_occupancy_and_credits() {
        let mut q = OutboundQueue::new(descriptor(Direction::H2f, 2, 16, 4), 4);
        assert_eq!(q.ready(), 0);
        for _ in 0..6 {
            q.push(Bytes::from_static(&[0, 0])).unwrap();
        }
        assert_eq!(q.ready(), 4);
        q.apply_grant(1).unwrap();
        assert_eq!(q.ready(), 1);
    }

    #[test]
    fn initial_credit_clamped_to_receiver_capacity() {
        let q = OutboundQueue::new(descriptor(Direction::H2f, 2, 16, 4), 100);
        assert_eq!(q.credits(), 4);
    }

    #[test]
    fn grant_replaces_credit() {
        let mut q = OutboundQueue::new(descriptor(Direction::F2h, 4, 4, 8), 0);
        q.apply_grant(0).unwrap();
        q.apply_grant(5).unwrap();
        assert_eq!(q.credits(), 5);
        q.apply_grant(3).unwrap();
        assert_eq!(q.credits(), 3);
        assert_eq!(q.stats().credit_frames, 3);
        assert_eq!(q.stats().credits_granted, 8);
    }

    #[test]
    fn grant_above_capacity_is_violation() {
        let mut q = OutboundQueue::new(descriptor(Direction::F2h, 4, 4, 8), 0);
        assert_eq!(
            q.apply_grant(9),
            Err(ProtocolViolation::CreditOverflow {
                direction: Direction::F2h,
                queue: 0,
                credits: 9,
                capacity: 8,
            })
        );
        assert_eq!(q.credits(), 0);
    }

    #[test]
    fn take_item_consumes_credit() {
        let mut q = OutboundQueue::new(descriptor(Direction::H2f, 1, 4, 4), 2);
        q.push(Bytes::from_static(&[7])).unwrap();
        assert_eq!(q.take_item().as_deref(), Some(&[7u8][..]));
        assert_eq!(q.credits(), 1);
        assert_eq!(q.take_item(), None);
        assert_eq!(q.stats().items_sent, 1);
    }

    #[test]
    fn push_errors_carry_queue() {
        let mut q = OutboundQueue::new(descriptor(Direction::H2f, 2, 1, 4), 4);
        assert!(matches!(
            q.push(Bytes::from_static(&[1])),
            Err(QueueError::WidthMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
        q.push(Bytes::from_static(&[1, 2])).unwrap();
        assert!(matches!(
            q.push(Bytes::from_static(&[1, 2])),
            Err(QueueError::Full { capacity: 1, .. })
        ));
    }

    #[test]
    fn pop_accrues_pending_grant() {
        let mut q = InboundQueue::new(descriptor(Direction::H2f, 1, 4, 2), 0);
        assert_eq!(q.take_grant(), None);
        q.accept(Bytes::from_static(&[1])).unwrap();
        q.accept(Bytes::from_static(&[2])).unwrap();
        assert_eq!(q.pop().unwrap()[0], 1);
        assert_eq!(q.pending_grant(), 1);
        assert_eq!(q.pop().unwrap()[0], 2);
        assert_eq!(q.take_grant(), Some(2));
        assert_eq!(q.pending_grant(), 0);
        assert!(matches!(q.pop(), Err(QueueError::Empty { .. })));
    }

    #[test]
    fn accept_past_capacity_overflows() {
        let mut q = InboundQueue::new(descriptor(Direction::F2h, 1, 4, 1), 1);
        q.accept(Bytes::from_static(&[1])).unwrap();
        assert_eq!(
            q.accept(Bytes::from_static(&[2])),
            Err(ProtocolViolation::Overflow {
                direction: Direction::F2h,
                queue: 0,
                capacity: 1,
            })
        );
        assert_eq!(q.occupancy(), 1);
    }
}
