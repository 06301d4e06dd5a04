//! Endpoints driven by `Link` over real channels.

use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use qlink_config::{QueueSet, RawQueueSpec};
use qlink_engine::{Endpoint, Link, LinkConfig, LinkError};
use qlink_frame::{FrameConfig, FrameError, FrameWriter};
use qlink_transport::{LinkStream, MemoryChannel, TcpConfig, TcpLink};

fn queues() -> QueueSet {
    QueueSet::validate(vec![
        RawQueueSpec::new("h2f", 0, 4, 4, 2),
        RawQueueSpec::new("h2f", 1, 1, 2, 3),
        RawQueueSpec::new("f2h", 0, 4, 3, 2),
        RawQueueSpec::new("f2h", 1, 8, 2, 2),
    ])
    .unwrap()
}

/// Move received h2f items to the f2h queue with the same index and width.
fn echo(endpoint: &mut Endpoint) {
    for q in 0..endpoint.inbound().len() {
        let Some(out) = endpoint.outbound().get(q) else {
            continue;
        };
        if out.is_full() || out.descriptor().width != endpoint.inbound()[q].descriptor().width {
            continue;
        }
        if let Ok(item) = endpoint.dequeue(q) {
            endpoint.enqueue(q, item).unwrap();
        }
    }
}

fn nonblocking() -> LinkConfig {
    LinkConfig {
        poll_interval: Duration::ZERO,
        frame: FrameConfig {
            read_timeout: None,
            ..FrameConfig::default()
        },
        ..LinkConfig::default()
    }
}

#[test]
fn memory_echo_round_trip() {
    let queues = queues();
    let (a, b) = MemoryChannel::pair();
    let mut host =
        Link::over_stream(Endpoint::host(&queues), LinkStream::from_memory(a), nonblocking())
            .unwrap();
    let mut device =
        Link::over_stream(Endpoint::device(&queues), LinkStream::from_memory(b), nonblocking())
            .unwrap();

    let total = 40u32;
    let mut queued = 0u32;
    let mut returned = Vec::new();

    for _ in 0..100_000 {
        if queued < total
            && host
                .endpoint_mut()
                .enqueue(0, queued.to_le_bytes().to_vec())
                .is_ok()
        {
            queued += 1;
        }
        // h2f queue 1 has no width-matched f2h partner; its items are only consumed.
        let _ = host.endpoint_mut().enqueue(1, vec![0xEEu8]);

        host.step().unwrap();
        device.step().unwrap();
        echo(device.endpoint_mut());
        let _ = device.endpoint_mut().dequeue(1);

        while let Ok(item) = host.endpoint_mut().dequeue(0) {
            returned.push(u32::from_le_bytes(item.as_ref().try_into().unwrap()));
        }
        if returned.len() == total as usize {
            break;
        }
    }

    assert_eq!(returned, (0..total).collect::<Vec<_>>());
    let stats = host.endpoint().outbound()[0].stats();
    assert_eq!(stats.items_sent, u64::from(total));
    assert!(stats.bursts > 0);
    assert!(host.endpoint().violation().is_none());
    assert!(device.endpoint().violation().is_none());
}

#[test]
fn tcp_echo_round_trip() {
    let queues = queues();
    let listener = TcpLink::bind(&TcpConfig::with_address("127.0.0.1:0")).unwrap();
    let addr = listener.local_addr().unwrap();

    let device_queues = queues.clone();
    let server = thread::spawn(move || {
        let stream = listener.accept().unwrap();
        let mut device =
            Link::over_stream(Endpoint::device(&device_queues), stream, LinkConfig::default())
                .unwrap();
        loop {
            match device.step() {
                Ok(_) => echo(device.endpoint_mut()),
                Err(LinkError::Frame(_)) => break,
                Err(err) => panic!("device link failed: {err}"),
            }
        }
        device.into_endpoint()
    });

    let stream = TcpLink::connect(&TcpConfig::with_address(addr.to_string())).unwrap();
    let mut host =
        Link::over_stream(Endpoint::host(&queues), stream, LinkConfig::default()).unwrap();

    let payloads: Vec<[u8; 4]> = (0..10u8).map(|n| [n, n, n, n]).collect();
    let mut pending = payloads.iter();
    let mut next = pending.next();
    let mut returned = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(10);

    while returned.len() < payloads.len() {
        assert!(Instant::now() < deadline, "echo did not complete");
        if let Some(item) = next {
            if host.endpoint_mut().enqueue(0, item.to_vec()).is_ok() {
                next = pending.next();
            }
        }
        host.step().unwrap();
        while let Ok(item) = host.endpoint_mut().dequeue(0) {
            returned.push(<[u8; 4]>::try_from(item.as_ref()).unwrap());
        }
    }
    assert_eq!(returned, payloads);

    host.shutdown().unwrap();
    let device = server.join().unwrap();
    assert_eq!(device.inbound()[0].stats().items_received, 10);
}

#[test]
fn run_until_times_out() {
    let queues = queues();
    let (a, _b) = MemoryChannel::pair();
    let mut host =
        Link::over_stream(Endpoint::host(&queues), LinkStream::from_memory(a), nonblocking())
            .unwrap();
    let result = host.run_until(Duration::from_millis(20), |endpoint| {
        endpoint.inbound()[0].occupancy() > 0
    });
    assert!(matches!(result, Err(LinkError::Timeout(_))));
}

/// Run one side of a full-duplex bulk transfer until it has sent and
/// received `items` items on queue 0, then wait for the peer before the
/// stream is dropped.
fn bulk_side(
    mut link: Link<LinkStream, LinkStream>,
    items: usize,
    fill: u8,
    peers: &Barrier,
) -> Result<(), LinkError> {
    for _ in 0..items {
        link.endpoint_mut().enqueue(0, vec![fill; 255])?;
    }
    let result = link.run_until(Duration::from_secs(30), |endpoint| {
        endpoint.burst().is_none()
            && endpoint.outbound()[0].occupancy() == 0
            && endpoint.inbound()[0].occupancy() == items
    });
    peers.wait();
    result
}

#[test]
fn tcp_bulk_bursts_in_both_directions() {
    const ITEMS: usize = 60_000;
    let queues = QueueSet::validate(vec![
        RawQueueSpec::new("h2f", 0, 255, 60_000, 60_000),
        RawQueueSpec::new("f2h", 0, 255, 60_000, 60_000),
    ])
    .unwrap();
    let listener = TcpLink::bind(&TcpConfig::with_address("127.0.0.1:0")).unwrap();
    let addr = listener.local_addr().unwrap();
    let peers = Arc::new(Barrier::new(2));
    let (done_tx, done_rx) = mpsc::channel();

    let device_queues = queues.clone();
    let device_peers = Arc::clone(&peers);
    let device_done = done_tx.clone();
    thread::spawn(move || {
        let stream = listener.accept().unwrap();
        let link =
            Link::over_stream(Endpoint::device(&device_queues), stream, LinkConfig::default())
                .unwrap();
        let result = bulk_side(link, ITEMS, 0xDD, &device_peers);
        device_done.send(("device", result.map_err(|err| err.to_string()))).unwrap();
    });

    thread::spawn(move || {
        let stream = TcpLink::connect(&TcpConfig::with_address(addr.to_string())).unwrap();
        let link = Link::over_stream(Endpoint::host(&queues), stream, LinkConfig::default())
            .unwrap();
        let result = bulk_side(link, ITEMS, 0xAA, &peers);
        done_tx.send(("host", result.map_err(|err| err.to_string()))).unwrap();
    });

    for _ in 0..2 {
        let (side, result) = done_rx
            .recv_timeout(Duration::from_secs(60))
            .expect("bulk transfer stalled");
        assert_eq!(result, Ok(()), "{side} failed");
    }
}

#[test]
fn tcp_write_timeout_fails_when_peer_stops_reading() {
    let listener = TcpLink::bind(&TcpConfig::with_address("127.0.0.1:0")).unwrap();
    let addr = listener.local_addr().unwrap();
    let (hold_tx, hold_rx) = mpsc::channel::<()>();
    let server = thread::spawn(move || {
        let _stream = listener.accept().unwrap();
        let _ = hold_rx.recv();
    });

    let stream = TcpLink::connect(&TcpConfig::with_address(addr.to_string())).unwrap();
    let config = FrameConfig {
        write_timeout: Some(Duration::from_millis(100)),
        ..FrameConfig::default()
    };
    let mut writer = FrameWriter::with_config_link(stream, config).unwrap();

    let item = [0x5Au8; 255];
    let deadline = Instant::now() + Duration::from_secs(30);
    let err = loop {
        assert!(Instant::now() < deadline, "writes never reported the stall");
        if let Err(err) = writer.write_item(&item) {
            break err;
        }
    };
    assert!(matches!(err, FrameError::WriteTimeout(_)), "{err}");

    hold_tx.send(()).unwrap();
    server.join().unwrap();
}
