use serde::Serialize;

use qlink_config::Direction;

use crate::arbiter::Burst;
use crate::endpoint::Role;
use crate::queue::{InboundQueue, OutboundQueue, QueueStats};
use crate::receiver::RecvState;

/// Point-in-time view of one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub direction: Direction,
    pub id: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub width: u8,
    pub capacity: usize,
    pub occupancy: usize,
    /// Sending side: credit available. Receiving side: credit owed.
    pub credits: u16,
    #[serde(flatten)]
    pub stats: QueueStats,
}

impl QueueSnapshot {
    pub fn outbound(queue: &OutboundQueue) -> Self {
        let descriptor = queue.descriptor();
        Self {
            direction: descriptor.direction,
            id: descriptor.id,
            name: descriptor.name.clone(),
            width: descriptor.width,
            capacity: queue.capacity(),
            occupancy: queue.occupancy(),
            credits: queue.credits(),
            stats: queue.stats(),
        }
    }

    pub fn inbound(queue: &InboundQueue) -> Self {
        let descriptor = queue.descriptor();
        Self {
            direction: descriptor.direction,
            id: descriptor.id,
            name: descriptor.name.clone(),
            width: descriptor.width,
            capacity: queue.capacity(),
            occupancy: queue.occupancy(),
            credits: queue.pending_grant(),
            stats: queue.stats(),
        }
    }
}

/// Point-in-time view of an endpoint, for diagnostics output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointSnapshot {
    pub role: Role,
    pub outbound: Vec<QueueSnapshot>,
    pub inbound: Vec<QueueSnapshot>,
    pub burst: Option<Burst>,
    pub receive: RecvState,
    pub violation: Option<String>,
}
