/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::disk::DiskError;
use thiserror::Error;

pub mod extendible_hash;

pub use extendible_hash::ExtendibleHashIndex;

/// Custom errors to be used by index structures.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no free block available for an index page")]
    OutOfSpace,

    #[error("bucket split exhausted the {max_bits} usable hash bits")]
    DepthExhausted { max_bits: u32 },

    #[error("directory of depth {depth} no longer fits the header block")]
    DirectoryFull { depth: u32 },

    #[error("index page {block} is corrupt: {reason}")]
    Corrupt { block: u32, reason: String },

    #[error(transparent)]
    Disk(#[from] DiskError),
}
