use std::io::{Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use qlink_frame::{FrameConfig, FrameReader, FrameWriter, Header};
use qlink_transport::LinkStream;

use crate::arbiter::Transmit;
use crate::endpoint::Endpoint;
use crate::error::{LinkError, Result};

/// Session driver settings.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Send a NOOP after this long without any other frame. `None` disables.
    pub idle_keepalive: Option<Duration>,
    /// Sleep between idle steps in [`Link::run_until`] and [`Link::pause`].
    pub poll_interval: Duration,
    /// Reader/writer settings. `max_item_width` is replaced by the widest
    /// inbound queue of the endpoint.
    pub frame: FrameConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            idle_keepalive: None,
            poll_interval: Duration::from_millis(1),
            frame: FrameConfig::default(),
        }
    }
}

/// What one [`Link::step`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Outgoing bytes were accepted by the stream.
    pub sent: bool,
    /// Receive events processed.
    pub received: usize,
}

impl StepOutcome {
    pub fn is_idle(&self) -> bool {
        !self.sent && self.received == 0
    }
}

/// Drives an [`Endpoint`] over a byte stream.
///
/// Each step takes one send opportunity, then processes every complete frame
/// unit already buffered. The stream is read whenever the step sent nothing
/// or left outgoing bytes the stream refused, so a peer stuck writing to us
/// is always drained.
///
/// A frame unit refused by a non-blocking stream stays queued in the writer
/// and is retried by the next step before the arbiter is polled again.
pub struct Link<R, W> {
    endpoint: Endpoint,
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    config: LinkConfig,
    last_send: Instant,
}

impl<R: Read, W: Write> Link<R, W> {
    pub fn new(endpoint: Endpoint, reader: R, writer: W, config: LinkConfig) -> Self {
        let frame = frame_config_for(&endpoint, &config.frame);
        Self {
            reader: FrameReader::with_config(reader, frame.clone()),
            writer: FrameWriter::with_config(writer, frame),
            endpoint,
            config,
            last_send: Instant::now(),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut Endpoint {
        &mut self.endpoint
    }

    pub fn into_endpoint(self) -> Endpoint {
        self.endpoint
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// One send opportunity plus receive processing.
    pub fn step(&mut self) -> Result<StepOutcome> {
        let sent = self.send_opportunity()?;
        let mut received = self.drain()?;
        let quiet = !sent && received == 0;
        if (quiet || self.writer.has_pending()) && self.reader.fill()? > 0 {
            received += self.drain()?;
        }
        Ok(StepOutcome { sent, received })
    }

    /// Step until `done` holds and every queued outgoing byte has been
    /// accepted by the stream, sleeping `poll_interval` on idle steps.
    pub fn run_until<F>(&mut self, timeout: Duration, mut done: F) -> Result<()>
    where
        F: FnMut(&Endpoint) -> bool,
    {
        let deadline = Instant::now() + timeout;
        while !(done(&self.endpoint) && !self.writer.has_pending()) {
            if Instant::now() >= deadline {
                return Err(LinkError::Timeout(timeout));
            }
            if self.step()?.is_idle() {
                self.pause();
            }
        }
        Ok(())
    }

    /// Sleep for `poll_interval`. For callers driving [`step`](Self::step)
    /// themselves after an idle step.
    pub fn pause(&self) {
        if !self.config.poll_interval.is_zero() {
            std::thread::sleep(self.config.poll_interval);
        }
    }

    /// Outgoing bytes queued but not yet accepted by the stream.
    pub fn pending_output(&self) -> usize {
        self.writer.pending()
    }

    fn send_opportunity(&mut self) -> Result<bool> {
        if self.writer.has_pending() {
            let moved = self.writer.send_pending()?;
            if moved > 0 {
                self.last_send = Instant::now();
            }
            return Ok(moved > 0);
        }

        match self.endpoint.poll_send() {
            Some(Transmit::Header(header)) => self.writer.queue_header(&header),
            Some(Transmit::Item { queue, item }) => {
                trace!(queue, len = item.len(), "tx item");
                self.writer.queue_item(&item)?;
            }
            None => {
                let due = self
                    .config
                    .idle_keepalive
                    .is_some_and(|interval| self.last_send.elapsed() >= interval);
                if !due {
                    return Ok(false);
                }
                self.writer.queue_header(&Header::Noop);
            }
        }
        let moved = self.writer.send_pending()?;
        if moved > 0 {
            self.last_send = Instant::now();
        }
        Ok(moved > 0)
    }

    fn drain(&mut self) -> Result<usize> {
        let events = self.endpoint.receive_all(self.reader.buffer_mut())?;
        if events > 0 {
            debug!(events, buffered = self.reader.buffered(), "rx processed");
        }
        Ok(events)
    }
}

impl Link<LinkStream, LinkStream> {
    /// Split a connected stream into reader and writer halves and drive
    /// `endpoint` over it.
    ///
    /// The stream is switched to non-blocking mode so that neither half can
    /// hold up a step. `frame.write_timeout` then bounds how long queued
    /// outgoing bytes may stall before the step fails.
    pub fn over_stream(endpoint: Endpoint, stream: LinkStream, config: LinkConfig) -> Result<Self> {
        info!(
            role = %endpoint.role(),
            peer = %stream.peer_label(),
            "link established"
        );
        let frame = frame_config_for(&endpoint, &config.frame);
        let reader = FrameReader::with_config_link(stream.try_clone()?, frame.clone())?;
        let writer = FrameWriter::with_config_link(stream, frame)?;
        writer.get_ref().set_nonblocking(true)?;
        Ok(Self {
            endpoint,
            reader,
            writer,
            config,
            last_send: Instant::now(),
        })
    }

    /// Close the underlying connection in both directions.
    pub fn shutdown(&self) -> Result<()> {
        self.writer.get_ref().shutdown().map_err(LinkError::from)
    }
}

fn frame_config_for(endpoint: &Endpoint, base: &FrameConfig) -> FrameConfig {
    let max_item_width = endpoint
        .inbound()
        .iter()
        .map(|queue| queue.descriptor().width_bytes())
        .max()
        .unwrap_or(0);
    FrameConfig {
        max_item_width,
        ..base.clone()
    }
}
