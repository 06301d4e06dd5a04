use qlink_engine::{Endpoint, Link, LinkConfig};
use qlink_transport::{TcpConfig, TcpLink};
use tracing::info;

use crate::cmd::{load_queue_set, parse_duration, SendArgs};
use crate::exit::{link_error, queue_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_item, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let queues = load_queue_set(&args.spec, true)?;
    let item = parse_hex(&args.hex)?;

    let reply_queue = match args.wait_queue {
        Some(q) => Some(queues.f2h().get(q).cloned().ok_or_else(|| {
            CliError::new(
                USAGE,
                format!("--wait-queue {q}: only {} f2h queues", queues.f2h().len()),
            )
        })?),
        None => None,
    };

    let mut endpoint = Endpoint::host(&queues);
    endpoint
        .enqueue(args.queue, item)
        .map_err(|err| queue_error("enqueue failed", err))?;

    let tcp = TcpConfig {
        address: args.connect.clone(),
        attempts: args.attempts,
        ..TcpConfig::default()
    };
    let stream = TcpLink::connect(&tcp).map_err(|err| transport_error("connect failed", err))?;
    let mut link = Link::over_stream(endpoint, stream, LinkConfig::default())
        .map_err(|err| link_error("link setup failed", err))?;

    let queue = args.queue;
    link.run_until(timeout, |endpoint| {
        endpoint.burst().is_none()
            && endpoint
                .outbound()
                .get(queue)
                .is_some_and(|q| q.occupancy() == 0)
    })
    .map_err(|err| link_error("send failed", err))?;
    info!(queue, "item sent");

    if let Some(reply) = reply_queue {
        let index = usize::from(reply.id);
        link.run_until(timeout, |endpoint| {
            endpoint
                .inbound()
                .get(index)
                .is_some_and(|q| q.occupancy() > 0)
        })
        .map_err(|err| link_error("waiting for reply failed", err))?;
        let item = link
            .endpoint_mut()
            .dequeue(index)
            .map_err(|err| queue_error("dequeue failed", err))?;
        print_item(&reply, &item, format);
    }

    if let Err(err) = link.shutdown() {
        tracing::debug!(error = %err, "shutdown after send failed");
    }
    Ok(SUCCESS)
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect();
    hex::decode(&digits)
        .map_err(|err| CliError::new(USAGE, format!("--hex is not valid hex: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_accepts_prefix_and_separators() {
        assert_eq!(parse_hex("0x0102_0304").unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(parse_hex("de ad be ef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn parse_hex_rejects_odd_length() {
        let err = parse_hex("abc").unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
