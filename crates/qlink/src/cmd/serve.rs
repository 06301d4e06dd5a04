use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use qlink_engine::{Endpoint, Link, LinkConfig, LinkError};
use qlink_frame::FrameError;
use qlink_transport::{TcpConfig, TcpLink};
use tracing::{debug, info, warn};

use crate::cmd::{load_queue_set, parse_duration, ServeArgs};
use crate::exit::{link_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;

enum StepDisposition {
    Continue { idle: bool },
    Disconnected,
    Fatal(CliError),
}

pub fn run(args: ServeArgs, _format: OutputFormat) -> CliResult<i32> {
    let queues = load_queue_set(&args.spec, true)?;
    let config = LinkConfig {
        idle_keepalive: args.keepalive.as_deref().map(parse_duration).transpose()?,
        ..LinkConfig::default()
    };

    let listener = TcpLink::bind(&TcpConfig::with_address(args.listen.as_str()))
        .map_err(|err| transport_error("bind failed", err))?;
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, h2f = queues.h2f().len(), f2h = queues.f2h().len(), "device listening");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        let stream = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        let mut link = Link::over_stream(Endpoint::device(&queues), stream, config.clone())
            .map_err(|err| link_error("link setup failed", err))?;

        while running.load(Ordering::SeqCst) {
            match classify_step(link.step()) {
                StepDisposition::Continue { idle } => {
                    if echo_pending(link.endpoint_mut()) == 0 && idle {
                        link.pause();
                    }
                }
                StepDisposition::Disconnected => break,
                StepDisposition::Fatal(err) => return Err(err),
            }
        }

        let snapshot = link.endpoint().snapshot();
        info!(
            snapshot = %serde_json::to_string(&snapshot).unwrap_or_default(),
            "host disconnected"
        );
        if args.once {
            break;
        }
    }

    Ok(SUCCESS)
}

/// Service the device side of an echo link.
///
/// Each h2f queue `j` is forwarded to f2h queue `j` when that queue exists
/// and has the same width; items on other h2f queues are consumed and
/// dropped. An item is only taken off an h2f queue when its f2h partner has
/// room, so echoing never loses items. Returns the number of items moved.
pub(crate) fn echo_pending(endpoint: &mut Endpoint) -> usize {
    let mut moved = 0;
    for q in 0..endpoint.inbound().len() {
        let width = endpoint.inbound()[q].descriptor().width;
        let partner = endpoint
            .outbound()
            .get(q)
            .filter(|out| out.descriptor().width == width)
            .map(|out| !out.is_full());

        match partner {
            Some(false) => continue,
            Some(true) => {
                while !endpoint.outbound()[q].is_full() {
                    let Ok(item) = endpoint.dequeue(q) else {
                        break;
                    };
                    if let Err(err) = endpoint.enqueue(q, item) {
                        warn!(error = %err, "echo enqueue failed");
                        break;
                    }
                    moved += 1;
                }
            }
            None => {
                while let Ok(item) = endpoint.dequeue(q) {
                    debug!(queue = q, len = item.len(), "dropping item with no echo queue");
                }
            }
        }
    }
    moved
}

fn classify_step(result: Result<qlink_engine::StepOutcome, LinkError>) -> StepDisposition {
    match result {
        Ok(outcome) => StepDisposition::Continue {
            idle: outcome.is_idle(),
        },
        Err(LinkError::Frame(FrameError::ConnectionClosed)) => StepDisposition::Disconnected,
        Err(LinkError::Frame(FrameError::Io(err)))
            if matches!(
                err.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
            ) =>
        {
            StepDisposition::Disconnected
        }
        Err(err) => StepDisposition::Fatal(link_error("link failed", err)),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlink_config::{QueueSet, RawQueueSpec};
    use qlink_engine::ProtocolViolation;

    fn device_with_items() -> Endpoint {
        let queues = QueueSet::validate(vec![
            RawQueueSpec::new("h2f", 0, 2, 4, 4),
            RawQueueSpec::new("h2f", 1, 1, 4, 4),
            RawQueueSpec::new("f2h", 0, 2, 4, 1),
        ])
        .unwrap();
        let mut device = Endpoint::device(&queues);
        let mut wire = bytes_for(&[
            qlink_frame::Header::Data {
                queue: 0,
                count: 2,
                width: 2,
            },
            qlink_frame::Header::Data {
                queue: 1,
                count: 1,
                width: 1,
            },
        ]);
        device.receive_all(&mut wire).unwrap();
        device
    }

    fn bytes_for(headers: &[qlink_frame::Header]) -> bytes::BytesMut {
        let mut wire = bytes::BytesMut::new();
        for header in headers {
            qlink_frame::encode_header(header, &mut wire);
            let len = header.payload_len();
            wire.extend_from_slice(&vec![0x5A; len]);
        }
        wire
    }

    #[test]
    fn echo_respects_partner_capacity() {
        let mut device = device_with_items();
        // f2h[0] holds one item; the second h2f[0] item waits.
        assert_eq!(echo_pending(&mut device), 1);
        assert_eq!(device.outbound()[0].occupancy(), 1);
        assert_eq!(device.inbound()[0].occupancy(), 1);
        // h2f[1] has no partner and is drained.
        assert_eq!(device.inbound()[1].occupancy(), 0);
    }

    #[test]
    fn closed_connection_is_disconnect() {
        assert!(matches!(
            classify_step(Err(LinkError::Frame(FrameError::ConnectionClosed))),
            StepDisposition::Disconnected
        ));
    }

    #[test]
    fn violation_is_fatal() {
        let err = LinkError::Protocol(ProtocolViolation::CreditOverflow {
            direction: qlink_config::Direction::F2h,
            queue: 0,
            credits: 9,
            capacity: 1,
        });
        match classify_step(Err(err)) {
            StepDisposition::Fatal(cli) => assert_eq!(cli.code, crate::exit::PROTOCOL_ERROR),
            _ => panic!("expected fatal disposition"),
        }
    }
}
