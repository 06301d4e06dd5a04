use std::time::{Duration, Instant};

use qlink_config::QueueSet;
use qlink_engine::{Endpoint, Link, LinkConfig};
use qlink_frame::FrameConfig;
use qlink_transport::{LinkStream, MemoryChannel};
use tracing::info;

use crate::cmd::serve::echo_pending;
use crate::cmd::{load_queue_set, parse_duration, LoopbackArgs};
use crate::exit::{link_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_loopback, LoopbackReport, OutputFormat};

type MemoryLink = Link<LinkStream, LinkStream>;

pub fn run(args: LoopbackArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let queues = load_queue_set(&args.spec, true)?;
    let report = simulate(&queues, args.items, timeout)?;
    print_loopback(&report, format);
    Ok(SUCCESS)
}

/// Drive a host and a device link over an in-process channel until every
/// h2f queue has carried `items` items and both sides have gone idle.
fn simulate(queues: &QueueSet, items: usize, timeout: Duration) -> CliResult<LoopbackReport> {
    let config = LinkConfig {
        poll_interval: Duration::ZERO,
        frame: FrameConfig {
            read_timeout: None,
            ..FrameConfig::default()
        },
        ..LinkConfig::default()
    };
    let (host_end, device_end) = MemoryChannel::pair();
    let mut host = Link::over_stream(
        Endpoint::host(queues),
        LinkStream::from_memory(host_end),
        config.clone(),
    )
    .map_err(|err| link_error("host setup failed", err))?;
    let mut device = Link::over_stream(
        Endpoint::device(queues),
        LinkStream::from_memory(device_end),
        config,
    )
    .map_err(|err| link_error("device setup failed", err))?;

    let widths: Vec<usize> = queues.h2f().iter().map(|q| q.width_bytes()).collect();
    let mut offered = vec![0usize; widths.len()];
    let mut idle_rounds = 0;
    let started = Instant::now();

    while idle_rounds < 2 {
        if started.elapsed() >= timeout {
            return Err(CliError::new(
                TIMEOUT,
                format!("loopback did not settle within {timeout:?}"),
            ));
        }

        for (q, width) in widths.iter().enumerate() {
            while offered[q] < items {
                let item = pattern(*width, offered[q]);
                if host.endpoint_mut().enqueue(q, item).is_err() {
                    break;
                }
                offered[q] += 1;
            }
        }

        let host_step = host
            .step()
            .map_err(|err| link_error("host link failed", err))?;
        let device_step = device
            .step()
            .map_err(|err| link_error("device link failed", err))?;
        let echoed = echo_pending(device.endpoint_mut());
        let drained = drain_host(&mut host);

        let settled = offered.iter().all(|n| *n == items)
            && host_step.is_idle()
            && device_step.is_idle()
            && echoed == 0
            && drained == 0
            && host.pending_output() == 0
            && device.pending_output() == 0
            && empty(host.endpoint())
            && empty(device.endpoint());
        idle_rounds = if settled { idle_rounds + 1 } else { 0 };
    }

    let elapsed = started.elapsed();
    info!(items, ?elapsed, "loopback settled");
    Ok(LoopbackReport::new(
        items,
        elapsed,
        host.endpoint().snapshot(),
        device.endpoint().snapshot(),
    ))
}

fn drain_host(host: &mut MemoryLink) -> usize {
    let mut drained = 0;
    for q in 0..host.endpoint().inbound().len() {
        while host.endpoint_mut().dequeue(q).is_ok() {
            drained += 1;
        }
    }
    drained
}

fn empty(endpoint: &Endpoint) -> bool {
    endpoint.outbound().iter().all(|q| q.occupancy() == 0)
        && endpoint.inbound().iter().all(|q| q.occupancy() == 0)
}

/// Item `n` of a queue: its index, little endian, repeated to fill `width`.
fn pattern(width: usize, n: usize) -> Vec<u8> {
    let tag = (n as u64).to_le_bytes();
    (0..width).map(|i| tag[i % tag.len()]).collect()
}
