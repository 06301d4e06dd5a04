use std::fmt::Write as _;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::LoaderConfig;
use crate::descriptor::{Direction, QueueDescriptor, RawQueueSpec};
use crate::error::{ConfigError, Result};

/// Widest item a DATA header can declare.
pub const MAX_WIDTH: usize = u8::MAX as usize;

/// Largest capacity a count or credit field can carry.
pub const MAX_CAPACITY: usize = u16::MAX as usize;

/// Ids 0..=0xFD are queue ids; 0xFE and 0xFF tag CREDIT and NOOP frames.
pub const MAX_QUEUES_PER_DIRECTION: usize = 0xFE;

/// The validated queue configuration of one link.
///
/// Queues of each direction are stored in id order, so a queue's id is its
/// index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSet {
    h2f: Vec<QueueDescriptor>,
    f2h: Vec<QueueDescriptor>,
}

impl QueueSet {
    /// Validate an unordered list of raw descriptors.
    pub fn validate(raw: Vec<RawQueueSpec>) -> Result<Self> {
        let mut h2f = Vec::new();
        let mut f2h = Vec::new();
        for spec in raw {
            match Direction::parse(&spec.dir) {
                Some(Direction::H2f) => h2f.push(spec),
                Some(Direction::F2h) => f2h.push(spec),
                None => {
                    return Err(ConfigError::UnknownDirection {
                        descriptor: spec.to_string(),
                    })
                }
            }
        }

        let h2f = number_direction(Direction::H2f, h2f)?;
        let f2h = number_direction(Direction::F2h, f2h)?;
        if h2f.is_empty() && f2h.is_empty() {
            return Err(ConfigError::NoQueues);
        }

        debug!(h2f = h2f.len(), f2h = f2h.len(), "queue descriptors validated");
        Ok(Self { h2f, f2h })
    }

    /// Parse and validate a JSON document with default loader settings.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_json_str_with_config(text, &LoaderConfig::default())
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str_with_config(text: &str, config: &LoaderConfig) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        #[cfg(feature = "schema")]
        if config.check_schema {
            crate::schema::check_document(&value)?;
        }
        #[cfg(not(feature = "schema"))]
        let _ = config;
        let raw: Vec<RawQueueSpec> = serde_json::from_value(value)?;
        Self::validate(raw)
    }

    /// Load and validate a spec file with default loader settings.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_path_with_config(path, &LoaderConfig::default())
    }

    /// Load and validate a spec file.
    pub fn from_path_with_config(path: &Path, config: &LoaderConfig) -> Result<Self> {
        let read_err = |source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        };
        let file = std::fs::File::open(path).map_err(read_err)?;
        let size = file.metadata().map_err(read_err)?.len();
        if size > config.max_spec_file_size as u64 {
            return Err(ConfigError::TooLarge {
                path: path.to_path_buf(),
                size,
                max: config.max_spec_file_size,
            });
        }

        let read_limit = u64::try_from(config.max_spec_file_size.saturating_add(1))
            .unwrap_or(u64::MAX);
        let mut text = String::new();
        file.take(read_limit)
            .read_to_string(&mut text)
            .map_err(read_err)?;
        if text.len() > config.max_spec_file_size {
            return Err(ConfigError::TooLarge {
                path: path.to_path_buf(),
                size: text.len() as u64,
                max: config.max_spec_file_size,
            });
        }

        info!(path = %path.display(), "loading queue spec");
        Self::from_json_str_with_config(&text, config)
    }

    /// Queues of one direction, in id order.
    pub fn queues(&self, direction: Direction) -> &[QueueDescriptor] {
        match direction {
            Direction::H2f => &self.h2f,
            Direction::F2h => &self.f2h,
        }
    }

    pub fn h2f(&self) -> &[QueueDescriptor] {
        &self.h2f
    }

    pub fn f2h(&self) -> &[QueueDescriptor] {
        &self.f2h
    }

    /// Widest item in `direction`, or 0 if it has no queues.
    ///
    /// One staging buffer serves every queue of a direction, so it must be at
    /// least this wide.
    pub fn max_item_width(&self, direction: Direction) -> usize {
        self.queues(direction)
            .iter()
            .map(QueueDescriptor::width_bytes)
            .max()
            .unwrap_or(0)
    }

    /// Multi-line listing of both directions.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for direction in [Direction::H2f, Direction::F2h] {
            let _ = writeln!(out, "{direction} queues:");
            for q in self.queues(direction) {
                let _ = writeln!(
                    out,
                    "  {}: width_B:{:3} capacity_h_I:{:5} capacity_f_I:{:5}",
                    q.label(),
                    q.width,
                    q.host_capacity(),
                    q.device_capacity()
                );
            }
        }
        out
    }
}

fn number_direction(
    direction: Direction,
    mut specs: Vec<RawQueueSpec>,
) -> Result<Vec<QueueDescriptor>> {
    if specs.len() > MAX_QUEUES_PER_DIRECTION {
        return Err(ConfigError::TooManyQueues {
            direction,
            count: specs.len(),
            max: MAX_QUEUES_PER_DIRECTION,
        });
    }

    specs.sort_by_key(|spec| spec.id);

    let mut out = Vec::with_capacity(specs.len());
    for (expected, spec) in specs.into_iter().enumerate() {
        if spec.id != expected as i64 {
            return Err(ConfigError::NonContiguousIds {
                direction,
                expected,
                descriptor: spec.to_string(),
            });
        }
        out.push(check_descriptor(direction, expected, spec)?);
    }
    Ok(out)
}

fn check_descriptor(
    direction: Direction,
    id: usize,
    spec: RawQueueSpec,
) -> Result<QueueDescriptor> {
    if spec.width_b <= 0 {
        return Err(ConfigError::NonPositiveWidth {
            descriptor: spec.to_string(),
        });
    }
    let width = u8::try_from(spec.width_b).map_err(|_| ConfigError::WidthTooLarge {
        descriptor: spec.to_string(),
        max: MAX_WIDTH,
    })?;

    let capacity_h = check_capacity(&spec, "capacity_h_I", spec.capacity_h)?;
    let capacity_f = check_capacity(&spec, "capacity_f_I", spec.capacity_f)?;
    let (sender_capacity, receiver_capacity) = match direction {
        Direction::H2f => (capacity_h, capacity_f),
        Direction::F2h => (capacity_f, capacity_h),
    };

    let id = u8::try_from(id).map_err(|_| ConfigError::TooManyQueues {
        direction,
        count: id + 1,
        max: MAX_QUEUES_PER_DIRECTION,
    })?;

    Ok(QueueDescriptor {
        direction,
        id,
        width,
        sender_capacity,
        receiver_capacity,
        name: spec.name,
    })
}

fn check_capacity(spec: &RawQueueSpec, field: &'static str, value: i64) -> Result<u16> {
    if value <= 0 {
        return Err(ConfigError::NonPositiveCapacity {
            descriptor: spec.to_string(),
            field,
        });
    }
    u16::try_from(value).map_err(|_| ConfigError::CapacityTooLarge {
        descriptor: spec.to_string(),
        field,
        max: MAX_CAPACITY,
    })
}
