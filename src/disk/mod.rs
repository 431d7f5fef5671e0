/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use std::path::PathBuf;
use thiserror::Error;

pub mod config;
pub mod manager;

pub use config::DiskConfig;
pub use manager::{BlockAddress, DiskManager};

/// Custom errors to be used by the simulated disk.
#[derive(Debug, Error)]
pub enum DiskError {
    #[error("could not read disk configuration: {0}")]
    Config(String),

    #[error("block {0} is out of range")]
    BlockOutOfRange(u32),

    #[error("block payload is {actual} bytes, expected {expected}")]
    BadPayloadSize { expected: usize, actual: usize },

    #[error("sector file {path}: {source}")]
    Sector {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
