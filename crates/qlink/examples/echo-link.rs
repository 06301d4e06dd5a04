//! Echo link: a device thread echoes each h2f queue into the f2h queue with
//! the same index over TCP loopback, and the host checks what comes back.
//!
//! Run with:
//!   cargo run --example echo-link
//!
//! The queue layout is `examples/queues.json` in this crate; the same file
//! drives `qlink serve` and `qlink send` (feature `cli`).

use std::thread;
use std::time::Duration;

use qlink::engine::LinkError;
use qlink::frame::FrameError;
use qlink::transport::{TcpConfig, TcpLink};
use qlink::{Endpoint, Link, LinkConfig, QueueSet};

const QUEUES: &str = include_str!("queues.json");
const ROUNDS: u8 = 16;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let queues = QueueSet::from_json_str(QUEUES)?;
    let listener = TcpLink::bind(&TcpConfig::with_address("127.0.0.1:0"))?;
    let addr = listener.local_addr()?;
    eprintln!("Device listening on {addr}");

    let device_queues = queues.clone();
    let device = thread::spawn(move || -> Result<(), LinkError> {
        let stream = listener.accept()?;
        let mut link =
            Link::over_stream(Endpoint::device(&device_queues), stream, LinkConfig::default())?;
        loop {
            let outcome = match link.step() {
                Ok(outcome) => outcome,
                Err(LinkError::Frame(FrameError::ConnectionClosed)) => return Ok(()),
                Err(err) => return Err(err),
            };
            let pairs = link.endpoint().inbound().len().min(link.endpoint().outbound().len());
            let mut moved = 0;
            for q in 0..pairs {
                if link.endpoint().outbound()[q].is_full() {
                    continue;
                }
                if let Ok(item) = link.endpoint_mut().dequeue(q) {
                    link.endpoint_mut().enqueue(q, item)?;
                    moved += 1;
                }
            }
            if moved == 0 && outcome.is_idle() {
                link.pause();
            }
        }
    });

    let stream = TcpLink::connect(&TcpConfig::with_address(addr.to_string()))?;
    let mut host = Link::over_stream(Endpoint::host(&queues), stream, LinkConfig::default())?;

    for round in 0..ROUNDS {
        for (q, descriptor) in queues.h2f().iter().enumerate() {
            let item = vec![round; descriptor.width_bytes()];
            host.endpoint_mut().enqueue(q, item.clone())?;
            host.run_until(Duration::from_secs(5), |endpoint| {
                endpoint.inbound()[q].occupancy() > 0
            })?;
            let echoed = host.endpoint_mut().dequeue(q)?;
            if echoed.as_ref() != item.as_slice() {
                return Err(format!("queue {q} echoed {echoed:?}, sent {item:?}").into());
            }
        }
    }

    for queue in host.endpoint().outbound() {
        let stats = queue.stats();
        eprintln!(
            "{}: {} items in {} bursts",
            queue.descriptor().label(),
            stats.items_sent,
            stats.bursts
        );
    }

    host.shutdown()?;
    device.join().map_err(|_| "device thread panicked")??;
    Ok(())
}
