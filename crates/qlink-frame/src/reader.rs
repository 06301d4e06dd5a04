use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use qlink_transport::LinkStream;

use crate::codec::{FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const MIN_STAGING_SIZE: usize = 512;

/// Accumulates raw link bytes for the receive state machine.
///
/// The reader does not know where items begin or end; that depends on the
/// receive state. It only moves bytes from the stream into a buffer that the
/// state machine consumes from the front.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    staging: Vec<u8>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        let staging_size = (HEADER_SIZE + config.max_item_width).max(MIN_STAGING_SIZE);
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            staging: vec![0u8; staging_size],
        }
    }

    /// Perform one read from the stream into the buffer.
    ///
    /// Returns the number of bytes added; `0` means nothing was available
    /// before the read timed out. EOF is reported as
    /// `Err(FrameError::ConnectionClosed)`.
    pub fn fill(&mut self) -> Result<usize> {
        loop {
            match self.inner.read(&mut self.staging) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    self.buf.extend_from_slice(&self.staging[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Ok(0)
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Buffered bytes not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// The receive buffer, consumed from the front by the state machine.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Size of the staging region used for each read.
    pub fn staging_size(&self) -> usize {
        self.staging.len()
    }
}

impl FrameReader<LinkStream> {
    /// Create a frame reader for `LinkStream` and apply read timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: qlink_transport::TransportError) -> FrameError {
    match err {
        qlink_transport::TransportError::Io(io)
        | qlink_transport::TransportError::Accept(io) => FrameError::Io(io),
        qlink_transport::TransportError::Bind { source, .. }
        | qlink_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
