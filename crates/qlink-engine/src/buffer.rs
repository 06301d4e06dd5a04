use std::collections::VecDeque;

use bytes::Bytes;

use crate::error::BufferError;

/// Bounded FIFO of fixed-width items.
///
/// Occupancy is always the length of the backing deque; there is no separate
/// counter to drift.
#[derive(Debug, Clone)]
pub struct ItemBuffer {
    width: usize,
    capacity: usize,
    items: VecDeque<Bytes>,
}

impl ItemBuffer {
    pub fn new(width: usize, capacity: usize) -> Self {
        Self {
            width,
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an item at the tail.
    pub fn enqueue(&mut self, item: Bytes) -> Result<(), BufferError> {
        if item.len() != self.width {
            return Err(BufferError::WidthMismatch {
                expected: self.width,
                actual: item.len(),
            });
        }
        if self.is_full() {
            return Err(BufferError::Full);
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Remove the oldest item.
    pub fn dequeue(&mut self) -> Result<Bytes, BufferError> {
        self.items.pop_front().ok_or(BufferError::Empty)
    }

    /// Oldest item, without removing it.
    pub fn front(&self) -> Option<&Bytes> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn free(&self) -> usize {
        self.capacity - self.items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(tag: u8) -> Bytes {
        Bytes::from(vec![tag; 4])
    }

    #[test]
    fn fifo_order() {
        let mut buf = ItemBuffer::new(4, 8);
        for tag in 1..=5 {
            buf.enqueue(item(tag)).unwrap();
        }
        let order: Vec<u8> = (0..5).map(|_| buf.dequeue().unwrap()[0]).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
        assert!(buf.is_empty());
    }

    #[test]
    fn interleaved_fifo_order() {
        let mut buf = ItemBuffer::new(4, 2);
        buf.enqueue(item(1)).unwrap();
        buf.enqueue(item(2)).unwrap();
        assert_eq!(buf.dequeue().unwrap()[0], 1);
        buf.enqueue(item(3)).unwrap();
        assert_eq!(buf.dequeue().unwrap()[0], 2);
        assert_eq!(buf.dequeue().unwrap()[0], 3);
    }

    #[test]
    fn full_and_empty() {
        let mut buf = ItemBuffer::new(4, 2);
        assert_eq!(buf.dequeue(), Err(BufferError::Empty));
        buf.enqueue(item(1)).unwrap();
        buf.enqueue(item(2)).unwrap();
        assert!(buf.is_full());
        assert_eq!(buf.free(), 0);
        assert_eq!(buf.enqueue(item(3)), Err(BufferError::Full));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.front().map(|b| b[0]), Some(1));
    }

    #[test]
    fn wrong_width_rejected() {
        let mut buf = ItemBuffer::new(4, 2);
        assert_eq!(
            buf.enqueue(Bytes::from_static(&[1, 2])),
            Err(BufferError::WidthMismatch {
                expected: 4,
                actual: 2
            })
        );
        assert!(buf.is_empty());
    }
}
