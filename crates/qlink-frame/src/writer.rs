use std::io::{self, ErrorKind, Write};
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use qlink_transport::LinkStream;
use tracing::trace;

use crate::codec::{encode_header, encode_item, FrameConfig, Header, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

/// Puts headers and raw items on a `Write` stream.
///
/// Frame units are queued into an outgoing buffer and handed to the stream
/// by [`send_pending`](Self::send_pending), which never waits on a
/// non-blocking stream. Bytes the stream refuses stay queued for the next
/// call. With a `write_timeout` configured, a stall that outlasts it is
/// reported as [`FrameError::WriteTimeout`].
pub struct FrameWriter<T> {
    inner: T,
    outgoing: BytesMut,
    write_timeout: Option<Duration>,
    stalled_since: Option<Instant>,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            outgoing: BytesMut::with_capacity(HEADER_SIZE.max(config.max_item_width)),
            write_timeout: config.write_timeout,
            stalled_since: None,
        }
    }

    pub fn queue_header(&mut self, header: &Header) {
        trace!(%header, "tx header");
        encode_header(header, &mut self.outgoing);
    }

    /// Queue one item. Nothing is queued if the item is too wide.
    pub fn queue_item(&mut self, item: &[u8]) -> Result<()> {
        encode_item(item, &mut self.outgoing)
    }

    /// Queued bytes not yet accepted by the stream.
    pub fn pending(&self) -> usize {
        self.outgoing.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Write queued bytes until they are gone or the stream would block.
    ///
    /// Returns the number of bytes the stream accepted during this call.
    pub fn send_pending(&mut self) -> Result<usize> {
        let mut written = 0;
        while !self.outgoing.is_empty() {
            let attempt = Instant::now();
            match self.inner.write(&self.outgoing) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    self.outgoing.advance(n);
                    self.stalled_since = None;
                    written += n;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    let since = *self.stalled_since.get_or_insert(attempt);
                    if let Some(limit) = self.write_timeout {
                        if since.elapsed() >= limit {
                            return Err(FrameError::WriteTimeout(limit));
                        }
                    }
                    return Ok(written);
                }
                Err(err) => return Err(write_failure(err)),
            }
        }
        self.flush_inner()?;
        Ok(written)
    }

    /// Write every queued byte, retrying a non-blocking stream until it
    /// drains or the write timeout expires.
    pub fn send_all(&mut self) -> Result<()> {
        loop {
            self.send_pending()?;
            if self.outgoing.is_empty() {
                return Ok(());
            }
            std::thread::yield_now();
        }
    }

    pub fn write_header(&mut self, header: &Header) -> Result<()> {
        self.queue_header(header);
        self.send_all()
    }

    pub fn write_item(&mut self, item: &[u8]) -> Result<()> {
        self.queue_item(item)?;
        self.send_all()
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn flush_inner(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(write_failure(err)),
            }
        }
    }
}

impl FrameWriter<LinkStream> {
    /// Wrap the write half of a link stream, applying `config.write_timeout`.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn write_failure(err: io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            FrameError::ConnectionClosed
        }
        _ => FrameError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_header;

    #[test]
    fn burst_layout() {
        let mut writer = FrameWriter::new(Vec::new());
        writer
            .write_header(&Header::Data {
                queue: 3,
                count: 2,
                width: 2,
            })
            .unwrap();
        writer.write_item(&[0xA1, 0xA2]).unwrap();
        writer.write_item(&[0xB1, 0xB2]).unwrap();
        assert!(!writer.has_pending());

        let mut wire = BytesMut::from(writer.get_ref().as_slice());
        assert_eq!(
            decode_header(&mut wire),
            Some(Header::Data {
                queue: 3,
                count: 2,
                width: 2
            })
        );
        assert_eq!(wire.as_ref(), &[0xA1, 0xA2, 0xB1, 0xB2]);
    }

    #[test]
    fn item_wider_than_a_byte_count_is_rejected() {
        let mut writer = FrameWriter::new(Vec::new());
        assert!(matches!(
            writer.write_item(&[0u8; 256]),
            Err(FrameError::ItemTooWide { width: 256, .. })
        ));
        assert!(!writer.has_pending());
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn interrupted_writes_are_retried() {
        let sink = Stuttering {
            interruptions: 2,
            accepted: Vec::new(),
        };
        let mut writer = FrameWriter::new(sink);
        writer
            .write_header(&Header::Credit {
                queue: 1,
                credits: 0x0203,
            })
            .unwrap();
        assert_eq!(writer.into_inner().accepted, vec![0xFE, 1, 0x03, 0x02]);
    }

    #[test]
    fn refused_bytes_stay_queued() {
        let mut writer = FrameWriter::new(Backpressure {
            refusals: 1,
            accepted: Vec::new(),
        });
        writer.queue_header(&Header::Noop);

        assert_eq!(writer.send_pending().unwrap(), 0);
        assert_eq!(writer.pending(), HEADER_SIZE);

        assert_eq!(writer.send_pending().unwrap(), HEADER_SIZE);
        assert!(!writer.has_pending());
        assert_eq!(writer.into_inner().accepted, vec![0xFF, 0, 0, 0]);
    }

    #[test]
    fn stall_past_write_timeout_fails() {
        let config = FrameConfig {
            write_timeout: Some(Duration::from_millis(20)),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(
            Backpressure {
                refusals: usize::MAX,
                accepted: Vec::new(),
            },
            config,
        );

        let started = Instant::now();
        assert!(matches!(
            writer.write_item(&[7; 8]),
            Err(FrameError::WriteTimeout(limit)) if limit == Duration::from_millis(20)
        ));
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(writer.pending(), 8);
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut writer = FrameWriter::new(Stalled);
        assert!(matches!(
            writer.write_header(&Header::Noop),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn dropped_peer_means_closed() {
        let (host, device) = qlink_transport::MemoryChannel::pair();
        drop(device);
        let mut writer = FrameWriter::new(host);
        assert!(matches!(
            writer.write_item(&[1, 2, 3]),
            Err(FrameError::ConnectionClosed)
        ));
    }

    /// Interrupted `interruptions` times, then accepts one byte per call.
    struct Stuttering {
        interruptions: usize,
        accepted: Vec<u8>,
    }

    impl Write for Stuttering {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.interruptions > 0 {
                self.interruptions -= 1;
                return Err(io::Error::from(ErrorKind::Interrupted));
            }
            self.accepted.push(buf[0]);
            Ok(1)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Would block `refusals` times, then accepts everything.
    struct Backpressure {
        refusals: usize,
        accepted: Vec<u8>,
    }

    impl Write for Backpressure {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.refusals > 0 {
                self.refusals -= 1;
                return Err(io::Error::from(ErrorKind::WouldBlock));
            }
            self.accepted.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Stalled;

    impl Write for Stalled {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
