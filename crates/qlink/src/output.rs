use std::io::IsTerminal;
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use qlink_config::{Direction, QueueDescriptor, QueueSet};
use qlink_engine::{EndpointSnapshot, QueueSnapshot};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MaxItemWidth {
    h2f: usize,
    f2h: usize,
}

#[derive(Serialize)]
struct QueueSetOutput<'a> {
    schema_id: &'a str,
    valid: bool,
    h2f: &'a [QueueDescriptor],
    f2h: &'a [QueueDescriptor],
    max_item_width: MaxItemWidth,
}

pub fn print_queue_set(queues: &QueueSet, format: OutputFormat) {
    let widths = MaxItemWidth {
        h2f: queues.max_item_width(Direction::H2f),
        f2h: queues.max_item_width(Direction::F2h),
    };
    match format {
        OutputFormat::Json => {
            let out = QueueSetOutput {
                schema_id: "https://schemas.3leaps.dev/qlink/cli/v1/queue-set.schema.json",
                valid: true,
                h2f: queues.h2f(),
                f2h: queues.f2h(),
                max_item_width: widths,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DIR", "ID", "NAME", "WIDTH_B", "HOST_CAP", "DEVICE_CAP"]);
            for q in queues.h2f().iter().chain(queues.f2h()) {
                table.add_row(vec![
                    q.direction.to_string(),
                    q.id.to_string(),
                    q.name.clone().unwrap_or_default(),
                    q.width.to_string(),
                    q.host_capacity().to_string(),
                    q.device_capacity().to_string(),
                ]);
            }
            println!("{table}");
            println!("max item width: h2f={} f2h={}", widths.h2f, widths.f2h);
        }
        OutputFormat::Pretty => {
            print!("{}", queues.summary());
            println!("max item width: h2f={} f2h={}", widths.h2f, widths.f2h);
        }
    }
}

#[derive(Serialize)]
struct ItemOutput<'a> {
    schema_id: &'a str,
    direction: Direction,
    queue: u8,
    width: u8,
    hex: String,
}

pub fn print_item(queue: &QueueDescriptor, item: &[u8], format: OutputFormat) {
    let hex = hex::encode(item);
    match format {
        OutputFormat::Json => print_json(&ItemOutput {
            schema_id: "https://schemas.3leaps.dev/qlink/cli/v1/item-received.schema.json",
            direction: queue.direction,
            queue: queue.id,
            width: queue.width,
            hex,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["QUEUE", "WIDTH_B", "ITEM"])
                .add_row(vec![queue.label(), queue.width.to_string(), hex]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{} {hex}", queue.label()),
    }
}

#[derive(Serialize)]
pub struct LoopbackReport {
    pub items_per_queue: usize,
    pub elapsed_ms: u128,
    pub host: EndpointSnapshot,
    pub device: EndpointSnapshot,
}

impl LoopbackReport {
    pub fn new(
        items_per_queue: usize,
        elapsed: Duration,
        host: EndpointSnapshot,
        device: EndpointSnapshot,
    ) -> Self {
        Self {
            items_per_queue,
            elapsed_ms: elapsed.as_millis(),
            host,
            device,
        }
    }
}

#[derive(Serialize)]
struct LoopbackOutput<'a> {
    schema_id: &'a str,
    #[serde(flatten)]
    report: &'a LoopbackReport,
}

pub fn print_loopback(report: &LoopbackReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&LoopbackOutput {
            schema_id: "https://schemas.3leaps.dev/qlink/cli/v1/loopback-report.schema.json",
            report,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "ENDPOINT", "QUEUE", "SENT", "RECEIVED", "BURSTS", "CREDIT_FRAMES", "CREDITS",
                ]);
            for snapshot in [&report.host, &report.device] {
                for q in snapshot.outbound.iter().chain(&snapshot.inbound) {
                    table.add_row(vec![
                        snapshot.role.to_string(),
                        queue_label(q),
                        q.stats.items_sent.to_string(),
                        q.stats.items_received.to_string(),
                        q.stats.bursts.to_string(),
                        q.stats.credit_frames.to_string(),
                        q.stats.credits_granted.to_string(),
                    ]);
                }
            }
            println!("{table}");
            println!("elapsed: {} ms", report.elapsed_ms);
        }
        OutputFormat::Pretty => {
            for snapshot in [&report.host, &report.device] {
                for q in snapshot.outbound.iter().chain(&snapshot.inbound) {
                    println!(
                        "{} {}: sent={} received={} bursts={} credit_frames={} credits={}",
                        snapshot.role,
                        queue_label(q),
                        q.stats.items_sent,
                        q.stats.items_received,
                        q.stats.bursts,
                        q.stats.credit_frames,
                        q.stats.credits_granted
                    );
                }
            }
            println!("elapsed: {} ms", report.elapsed_ms);
        }
    }
}

fn queue_label(q: &QueueSnapshot) -> String {
    format!("{}[{}]", q.direction, q.id)
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
