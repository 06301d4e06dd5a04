/// Errors that can occur while moving frames over a stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An item does not fit the one-byte width field of a DATA header.
    #[error("item too wide ({width} bytes, max {max})")]
    ItemTooWide { width: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// Outgoing bytes made no progress for the configured write timeout.
    #[error("write stalled for {0:?}")]
    WriteTimeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, FrameError>;
