use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;
use crate::memory::MemoryChannel;

/// A connected link stream — implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations.
/// It wraps either a TCP connection or one end of an in-process pair.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    Tcp(TcpStream),
    Memory(MemoryChannel),
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Tcp(stream) => stream.read(buf),
            LinkStreamInner::Memory(channel) => channel.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Tcp(stream) => stream.write(buf),
            LinkStreamInner::Memory(channel) => channel.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            LinkStreamInner::Tcp(stream) => stream.flush(),
            LinkStreamInner::Memory(channel) => channel.flush(),
        }
    }
}

impl LinkStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: LinkStreamInner::Tcp(stream),
        }
    }

    /// Wrap one end of an in-process pair.
    pub fn from_memory(channel: MemoryChannel) -> Self {
        Self {
            inner: LinkStreamInner::Memory(channel),
        }
    }

    /// Set read timeout on the underlying stream.
    ///
    /// A read that times out surfaces as `WouldBlock` or `TimedOut`, which the
    /// frame reader treats as "no input this opportunity".
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            LinkStreamInner::Memory(channel) => {
                channel.set_read_timeout(timeout);
                Ok(())
            }
        }
    }

    /// Set write timeout on the underlying stream. In-memory writes never block.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            LinkStreamInner::Memory(_) => Ok(()),
        }
    }

    /// Switch the stream between blocking and non-blocking mode.
    ///
    /// Applies to every clone of a TCP stream, reads and writes alike. In
    /// non-blocking mode both surface `WouldBlock` instead of waiting, and
    /// the stream timeouts no longer apply. Memory reads follow their read
    /// timeout and memory writes never block, so this is a no-op for them.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => stream.set_nonblocking(nonblocking).map_err(Into::into),
            LinkStreamInner::Memory(_) => Ok(()),
        }
    }

    /// Try to clone this stream. Both handles address the same connection.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            LinkStreamInner::Memory(channel) => Ok(Self::from_memory(channel.clone())),
        }
    }

    /// Close both directions of the connection.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => match stream.shutdown(Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(err.into()),
            },
            LinkStreamInner::Memory(channel) => {
                channel.close();
                Ok(())
            }
        }
    }

    /// Remote address for diagnostics, if the transport has one.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            LinkStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:unknown".to_string()),
            LinkStreamInner::Memory(_) => "memory".to_string(),
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            LinkStreamInner::Tcp(_) => f.debug_struct("LinkStream").field("type", &"tcp").finish(),
            LinkStreamInner::Memory(_) => f
                .debug_struct("LinkStream")
                .field("type", &"memory")
                .finish(),
        }
    }
}
