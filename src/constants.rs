/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

/// Note: This file is NOT a configuration file. The type aliases and global
/// constants below are primarily meant to improve readability throughout the
/// codebase. The values should not be modified unless explicitly annotated
/// with "safe to modify".

/// Type aliases
pub type BlockIdT = u32;
pub type SlotIdT = u32;
pub type BufferFrameIdT = usize;

/// Block 0 holds the catalog text, block 1 the packed block bitmap.
pub const CATALOG_BLOCK_ID: BlockIdT = 0;
pub const BITMAP_BLOCK_ID: BlockIdT = 1;
pub const RESERVED_BLOCKS: BlockIdT = 2;

/// Fixed-format pages: 4 header counters of 4 ASCII characters each.
pub const FIXED_HEADER_SIZE: usize = 16;

/// Slotted pages: 2 header counters, then 8-byte slot directory entries.
pub const SLOTTED_HEADER_SIZE: usize = 8;
pub const SLOT_ENTRY_SIZE: usize = 8;

/// Variable records carry a per-field (offset, length) pair of 3 ASCII
/// characters each.
pub const FIELD_SUBHEADER_SIZE: usize = 6;

/// Each platter always carries two recording surfaces.
pub const SURFACES_PER_PLATTER: u32 = 2;

/// Name of the geometry file persisted inside the disk root directory.
pub const DISK_CONFIG_FILENAME: &str = "disk.cfg";

/// Relation that `select where` materializes into when no output name is
/// given; it is dropped again after printing.
pub const TEMP_RESULT_RELATION: &str = "temp_result";

pub const DEFAULT_FRAME_COUNT: usize = 64; // safe to modify
