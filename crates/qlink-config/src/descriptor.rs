use std::fmt;

use serde::{Deserialize, Serialize};

/// Transfer direction of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Host to device.
    H2f,
    /// Device to host.
    F2h,
}

impl Direction {
    /// Parse the `dir` field of a queue spec.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "h2f" => Some(Direction::H2f),
            "f2h" => Some(Direction::F2h),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::H2f => "h2f",
            Direction::F2h => "f2h",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::H2f => Direction::F2h,
            Direction::F2h => Direction::H2f,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One queue descriptor as written in the queue file, before validation.
///
/// Capacities are named from each endpoint's perspective: `capacity_h_I` is
/// the host-side buffer, `capacity_f_I` the device-side buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQueueSpec {
    pub dir: String,
    pub id: i64,
    #[serde(rename = "width_B")]
    pub width_b: i64,
    #[serde(rename = "capacity_h_I")]
    pub capacity_h: i64,
    #[serde(rename = "capacity_f_I")]
    pub capacity_f: i64,
    /// Optional label used in diagnostics only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RawQueueSpec {
    pub fn new(dir: &str, id: i64, width_b: i64, capacity_h: i64, capacity_f: i64) -> Self {
        Self {
            dir: dir.to_string(),
            id,
            width_b,
            capacity_h,
            capacity_f,
            name: None,
        }
    }
}

impl fmt::Display for RawQueueSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{dir:{} id:{} width_B:{} capacity_h_I:{} capacity_f_I:{}",
            self.dir, self.id, self.width_b, self.capacity_h, self.capacity_f
        )?;
        if let Some(name) = &self.name {
            write!(f, " name:{name}")?;
        }
        f.write_str("}")
    }
}

/// A validated queue descriptor.
///
/// Field types encode the wire limits: one byte for the id and the width,
/// two bytes for capacities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueDescriptor {
    pub direction: Direction,
    pub id: u8,
    /// Bytes per item.
    pub width: u8,
    /// Items the sending endpoint can buffer.
    pub sender_capacity: u16,
    /// Items the receiving endpoint can buffer; bounds the credit in flight.
    pub receiver_capacity: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl QueueDescriptor {
    pub fn width_bytes(&self) -> usize {
        usize::from(self.width)
    }

    /// Host-side buffer size, whichever role the host plays for this queue.
    pub fn host_capacity(&self) -> u16 {
        match self.direction {
            Direction::H2f => self.sender_capacity,
            Direction::F2h => self.receiver_capacity,
        }
    }

    /// Device-side buffer size.
    pub fn device_capacity(&self) -> u16 {
        match self.direction {
            Direction::H2f => self.receiver_capacity,
            Direction::F2h => self.sender_capacity,
        }
    }

    /// Short label for logs, e.g. `h2f[0]` or `f2h[2] (audio)`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{}[{}] ({name})", self.direction, self.id),
            None => format!("{}[{}]", self.direction, self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parse_and_display() {
        assert_eq!(Direction::parse("h2f"), Some(Direction::H2f));
        assert_eq!(Direction::parse("f2h"), Some(Direction::F2h));
        assert_eq!(Direction::parse("H2F"), None);
        assert_eq!(Direction::F2h.to_string(), "f2h");
        assert_eq!(Direction::H2f.opposite(), Direction::F2h);
    }

    #[test]
    fn raw_spec_uses_file_field_names() {
        let raw: RawQueueSpec = serde_json::from_str(
            r#"{"dir":"h2f","id":0,"width_B":8,"capacity_h_I":4,"capacity_f_I":2}"#,
        )
        .unwrap();
        assert_eq!(raw, RawQueueSpec::new("h2f", 0, 8, 4, 2));
        assert_eq!(
            raw.to_string(),
            "{dir:h2f id:0 width_B:8 capacity_h_I:4 capacity_f_I:2}"
        );
    }

    #[test]
    fn capacities_follow_endpoint_perspective() {
        let h2f = QueueDescriptor {
            direction: Direction::H2f,
            id: 0,
            width: 4,
            sender_capacity: 16,
            receiver_capacity: 8,
            name: None,
        };
        assert_eq!(h2f.host_capacity(), 16);
        assert_eq!(h2f.device_capacity(), 8);

        let f2h = QueueDescriptor {
            direction: Direction::F2h,
            ..h2f.clone()
        };
        assert_eq!(f2h.host_capacity(), 8);
        assert_eq!(f2h.device_capacity(), 16);
        assert_eq!(f2h.label(), "f2h[0]");
    }
}
