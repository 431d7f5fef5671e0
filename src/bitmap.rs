/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::constants::{BlockIdT, BITMAP_BLOCK_ID, RESERVED_BLOCKS};
use crate::disk::{DiskError, DiskManager};

/// Free-space map of the disk: one bit per block, set when the block is
/// allocated. Persisted in block 1, packed LSB-first within each byte.
///
/// Blocks 0 (catalog) and 1 (the bitmap itself) are permanently reserved and
/// never handed out by `first_free`.
pub struct BlockBitmap {
    bits: Vec<u8>,
    total_blocks: u32,
}

impl BlockBitmap {
    /// Create an all-free bitmap for `total_blocks` blocks.
    pub fn new(total_blocks: u32) -> Self {
        Self {
            bits: vec![0u8; (total_blocks as usize + 7) / 8],
            total_blocks,
        }
    }

    pub fn total_blocks(&self) -> u32 {
        self.total_blocks
    }

    /// Read the persisted bitmap from block 1.
    ///
    /// Returns `false` when the stored map does not have the two reserved
    /// bits set, which means the disk was never initialized (or the block
    /// was clobbered); the caller is expected to re-initialize and save.
    pub fn load(&mut self, disk: &DiskManager) -> Result<bool, DiskError> {
        let data = disk.read_block(BITMAP_BLOCK_ID)?;
        let len = self.bits.len();
        if data.len() < len {
            return Ok(false);
        }
        self.bits.copy_from_slice(&data[..len]);
        Ok(self.get(0) && self.get(1))
    }

    /// Mark the reserved blocks allocated and leave everything else free.
    pub fn initialize(&mut self) {
        self.bits.fill(0);
        for block in 0..RESERVED_BLOCKS {
            self.set(block, true);
        }
    }

    /// Persist the bitmap into block 1, zero-padded to the block size.
    pub fn save(&self, disk: &DiskManager) -> Result<(), DiskError> {
        let mut block = vec![0u8; disk.block_size()];
        let len = self.bits.len().min(block.len());
        block[..len].copy_from_slice(&self.bits[..len]);
        disk.write_block(BITMAP_BLOCK_ID, &block)
    }

    /// Set the allocation bit for `block`. Panics on an out-of-range index;
    /// that is a programmer error, not a runtime condition.
    pub fn set(&mut self, block: BlockIdT, allocated: bool) {
        assert!(
            block < self.total_blocks,
            "bitmap index {block} out of range (total {})",
            self.total_blocks
        );
        let byte = (block / 8) as usize;
        let bit = block % 8;
        if allocated {
            self.bits[byte] |= 1 << bit;
        } else {
            self.bits[byte] &= !(1 << bit);
        }
    }

    /// Return the allocation bit for `block`. Panics on an out-of-range
    /// index.
    pub fn get(&self, block: BlockIdT) -> bool {
        assert!(
            block < self.total_blocks,
            "bitmap index {block} out of range (total {})",
            self.total_blocks
        );
        let byte = (block / 8) as usize;
        let bit = block % 8;
        self.bits[byte] & (1 << bit) != 0
    }

    /// First free block, scanning upward from the end of the reserved
    /// range. Blocks 0 and 1 are never returned.
    pub fn first_free(&self) -> Option<BlockIdT> {
        (RESERVED_BLOCKS..self.total_blocks).find(|&block| !self.get(block))
    }

    /// Number of free blocks outside the reserved range.
    pub fn free_blocks(&self) -> u32 {
        (RESERVED_BLOCKS..self.total_blocks)
            .filter(|&block| !self.get(block))
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskConfig;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DiskManager) {
        let dir = TempDir::new().unwrap();
        let config = DiskConfig {
            platters: 1,
            tracks: 2,
            sectors: 4,
            block_size: 64,
            blocks_per_sector: 2,
        };
        let manager = DiskManager::open(dir.path().join("disk"), config).unwrap();
        (dir, manager)
    }

    #[test]
    fn test_reserved_blocks_never_free() {
        let mut bitmap = BlockBitmap::new(32);
        bitmap.initialize();
        assert!(bitmap.get(0));
        assert!(bitmap.get(1));
        assert_eq!(bitmap.first_free(), Some(2));

        bitmap.set(2, true);
        assert_eq!(bitmap.first_free(), Some(3));
        bitmap.set(2, false);
        assert_eq!(bitmap.first_free(), Some(2));
    }

    #[test]
    fn test_exhaustion() {
        let mut bitmap = BlockBitmap::new(4);
        bitmap.initialize();
        bitmap.set(2, true);
        bitmap.set(3, true);
        assert_eq!(bitmap.first_free(), None);
        assert_eq!(bitmap.free_blocks(), 0);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_panics() {
        let bitmap = BlockBitmap::new(8);
        bitmap.get(8);
    }

    #[test]
    fn test_persistence_round_trip() {
        let (_dir, disk) = setup();

        let mut bitmap = BlockBitmap::new(disk.total_blocks());
        // An unwritten disk block has no reserved bits set.
        assert!(!bitmap.load(&disk).unwrap());

        bitmap.initialize();
        bitmap.set(5, true);
        bitmap.set(9, true);
        bitmap.save(&disk).unwrap();

        let mut reloaded = BlockBitmap::new(disk.total_blocks());
        assert!(reloaded.load(&disk).unwrap());
        assert!(reloaded.get(5));
        assert!(reloaded.get(9));
        assert!(!reloaded.get(6));
        assert_eq!(reloaded.first_free(), Some(2));
    }

    #[test]
    fn test_packing_is_lsb_first() {
        let (_dir, disk) = setup();

        let mut bitmap = BlockBitmap::new(disk.total_blocks());
        bitmap.initialize();
        bitmap.save(&disk).unwrap();

        let raw = disk.read_block(1).unwrap();
        // Bits 0 and 1 set -> 0b0000_0011 in the first byte.
        assert_eq!(raw[0], 0b0000_0011);
    }
}
