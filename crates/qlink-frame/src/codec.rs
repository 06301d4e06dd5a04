use std::fmt;
use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Every frame header is exactly 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Tag byte of a CREDIT frame.
pub const QID_CREDIT: u8 = 0xFE;

/// Tag byte of a NOOP frame.
pub const QID_NOOP: u8 = 0xFF;

/// Highest queue id that can appear in a DATA header.
pub const MAX_QUEUE_ID: u8 = 0xFD;

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    /// `count` items of `width` bytes each follow for `queue`.
    Data { queue: u8, count: u16, width: u8 },
    /// The peer may now send `credits` items into `queue`.
    Credit { queue: u8, credits: u16 },
    /// Keepalive; carries nothing.
    Noop,
}

impl Header {
    /// Wire representation.
    ///
    /// ```text
    /// DATA   : qid  | count lo | count hi  | width
    /// CREDIT : 0xFE | qid      | credit lo | credit hi
    /// NOOP   : 0xFF | 0        | 0         | 0
    /// ```
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        match self {
            Header::Data {
                queue,
                count,
                width,
            } => {
                let [lo, hi] = count.to_le_bytes();
                [queue, lo, hi, width]
            }
            Header::Credit { queue, credits } => {
                let [lo, hi] = credits.to_le_bytes();
                [QID_CREDIT, queue, lo, hi]
            }
            Header::Noop => [QID_NOOP, 0, 0, 0],
        }
    }

    /// Parse a header. Every byte pattern is a valid header.
    pub fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        match bytes[0] {
            QID_NOOP => Header::Noop,
            QID_CREDIT => Header::Credit {
                queue: bytes[1],
                credits: u16::from_le_bytes([bytes[2], bytes[3]]),
            },
            queue => Header::Data {
                queue,
                count: u16::from_le_bytes([bytes[1], bytes[2]]),
                width: bytes[3],
            },
        }
    }

    /// Number of payload bytes that follow this header on the wire.
    pub fn payload_len(&self) -> usize {
        match self {
            Header::Data { count, width, .. } => usize::from(*count) * usize::from(*width),
            Header::Credit { .. } | Header::Noop => 0,
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Header::Data {
                queue,
                count,
                width,
            } => write!(f, "DATA q{queue} count={count} width={width}"),
            Header::Credit { queue, credits } => write!(f, "CREDIT q{queue} credits={credits}"),
            Header::Noop => f.write_str("NOOP"),
        }
    }
}

/// Append a header to `dst`.
pub fn encode_header(header: &Header, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    dst.put_slice(&header.to_bytes());
}

/// Append one raw item to `dst`.
pub fn encode_item(item: &[u8], dst: &mut BytesMut) -> Result<()> {
    if item.len() > usize::from(u8::MAX) {
        return Err(FrameError::ItemTooWide {
            width: item.len(),
            max: usize::from(u8::MAX),
        });
    }
    dst.reserve(item.len());
    dst.put_slice(item);
    Ok(())
}

/// Decode a header from the front of `src`.
///
/// Returns `None` if fewer than [`HEADER_SIZE`] bytes are buffered. On
/// success, consumes exactly the header bytes; item payload is left in place.
pub fn decode_header(src: &mut BytesMut) -> Option<Header> {
    if src.len() < HEADER_SIZE {
        return None;
    }
    let bytes = [src[0], src[1], src[2], src[3]];
    src.advance(HEADER_SIZE);
    Some(Header::from_bytes(bytes))
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Widest item in the inbound direction. Sizes the staging buffer so a
    /// single read can always hold at least one whole item.
    pub max_item_width: usize,
    /// Read timeout applied to the stream. `None` blocks.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to the stream. `None` blocks.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_item_width: usize::from(u8::MAX),
            read_timeout: Some(Duration::from_millis(10)),
            write_timeout: None,
        }
    }
}

impl FrameConfig {
    /// Default timeouts with a staging buffer sized for `max_item_width`.
    pub fn for_max_item_width(max_item_width: usize) -> Self {
        Self {
            max_item_width,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_header_layout() {
        let header = Header::Data {
            queue: 2,
            count: 0x0103,
            width: 8,
        };
        assert_eq!(header.to_bytes(), [2, 0x03, 0x01, 8]);
        assert_eq!(header.payload_len(), 0x0103 * 8);
    }

    #[test]
    fn credit_header_layout() {
        let header = Header::Credit {
            queue: 1,
            credits: 300,
        };
        assert_eq!(header.to_bytes(), [0xFE, 1, 0x2C, 0x01]);
        assert_eq!(header.payload_len(), 0);
    }

    #[test]
    fn tag_bytes_select_frame_kind() {
        assert_eq!(Header::from_bytes([0xFF, 9, 9, 9]), Header::Noop);
        assert_eq!(
            Header::from_bytes([0xFE, 3, 5, 0]),
            Header::Credit {
                queue: 3,
                credits: 5
            }
        );
        assert_eq!(
            Header::from_bytes([0xFD, 1, 0, 4]),
            Header::Data {
                queue: MAX_QUEUE_ID,
                count: 1,
                width: 4
            }
        );
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x00, 0x01, 0x00][..]);
        assert!(decode_header(&mut buf).is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn decode_leaves_payload_in_place() {
        let mut buf = BytesMut::new();
        encode_header(
            &Header::Data {
                queue: 0,
                count: 1,
                width: 2,
            },
            &mut buf,
        );
        encode_item(&[0xAA, 0xBB], &mut buf).unwrap();

        let header = decode_header(&mut buf).unwrap();
        assert_eq!(header.payload_len(), 2);
        assert_eq!(buf.as_ref(), &[0xAA, 0xBB]);
    }

    #[test]
    fn back_to_back_headers() {
        let mut buf = BytesMut::new();
        encode_header(&Header::Noop, &mut buf);
        encode_header(
            &Header::Credit {
                queue: 0,
                credits: 8,
            },
            &mut buf,
        );

        assert_eq!(decode_header(&mut buf), Some(Header::Noop));
        assert_eq!(
            decode_header(&mut buf),
            Some(Header::Credit {
                queue: 0,
                credits: 8
            })
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_item_rejected() {
        let mut buf = BytesMut::new();
        let err = encode_item(&[0u8; 256], &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::ItemTooWide { width: 256, .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn header_display() {
        let header = Header::Data {
            queue: 1,
            count: 3,
            width: 4,
        };
        assert_eq!(header.to_string(), "DATA q1 count=3 width=4");
        assert_eq!(Header::Noop.to_string(), "NOOP");
    }
}
