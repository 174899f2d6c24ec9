//! Error types for the chunk streaming core.
//!
//! Only the fatal conditions become `Error` variants. The non-fatal
//! cases (a block op against a slot that doesn't hold the requested
//! chunk, a short or corrupt region read, an invalid view distance
//! request) are recovered inline by the caller and never surfaced here.

use thiserror::Error;

/// Core-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while writing region data, or while staging/saving a world.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A region file's on-disk table or sector data is structurally invalid
    /// in a way that cannot be treated as "absent" (wrong file size, bad
    /// magic length field, etc).
    #[error("invalid region data: {0}")]
    InvalidRegionData(String),

    /// A pool allocator has no free slots left. Indicates a misconfigured
    /// `POOL_SIZE` for the active view distance; the caller has no safe
    /// recovery.
    #[error("pool exhausted: {0}")]
    PoolExhausted(&'static str),
}

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;
