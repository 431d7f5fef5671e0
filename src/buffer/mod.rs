/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::constants::{BlockIdT, BufferFrameIdT};
use crate::disk::{DiskError, DiskManager};

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

pub mod replacement;

pub use replacement::{ClockReplacer, LruReplacer, PageReplacer, ReplacerAlgorithm};

/// A single buffer frame holding one disk block.
///
/// The frame metadata drives replacement: `last_used` is the logical access
/// time consumed by LRU, `referenced` the second-chance bit consumed by
/// CLOCK, and a non-zero `pin_count` vetoes eviction entirely.
pub struct Frame {
    block_id: Option<BlockIdT>,
    data: Vec<u8>,
    dirty: bool,
    last_used: i64,
    pin_count: u32,
    referenced: bool,
}

impl Frame {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_id: None,
            data: vec![0u8; block_size],
            dirty: false,
            last_used: -1,
            pin_count: 0,
            referenced: false,
        }
    }

    pub fn block_id(&self) -> Option<BlockIdT> {
        self.block_id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn last_used(&self) -> i64 {
        self.last_used
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn referenced(&self) -> bool {
        self.referenced
    }

    pub(crate) fn set_referenced(&mut self) {
        self.referenced = true;
    }

    pub(crate) fn clear_referenced(&mut self) {
        self.referenced = false;
    }

    #[cfg(test)]
    pub(crate) fn test_fill(&mut self, block_id: Option<BlockIdT>, last_used: i64, pins: u32) {
        self.block_id = block_id;
        self.last_used = last_used;
        self.pin_count = pins;
    }
}

/// The buffer pool: a fixed set of frames caching disk blocks.
///
/// Blocks are faulted in on first access; a replacement policy picks the
/// frame to recycle, and a dirty victim is written back through the disk
/// manager before its frame is reused. The pool is strictly single-threaded,
/// like the rest of the engine.
pub struct BufferManager {
    disk: Rc<DiskManager>,
    frames: Vec<Frame>,
    block_table: HashMap<BlockIdT, BufferFrameIdT>,
    replacer: Box<dyn PageReplacer>,
    clock: i64,
}

/// Custom errors to be used by the buffer manager.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("every buffer frame is pinned")]
    AllFramesPinned,

    #[error("block {0} is not resident in the buffer")]
    NotResident(BlockIdT),

    #[error("block {0} is not pinned")]
    UnpinUnpinned(BlockIdT),

    #[error("buffer must have at least one frame")]
    NoFrames,

    #[error(transparent)]
    Disk(#[from] DiskError),
}

impl BufferManager {
    /// Construct a pool of `frame_count` frames over the given disk.
    pub fn new(
        disk: Rc<DiskManager>,
        frame_count: usize,
        algorithm: ReplacerAlgorithm,
    ) -> Result<Self, BufferError> {
        if frame_count == 0 {
            return Err(BufferError::NoFrames);
        }
        let replacer: Box<dyn PageReplacer> = match algorithm {
            ReplacerAlgorithm::Lru => Box::new(LruReplacer::new()),
            ReplacerAlgorithm::Clock => Box::new(ClockReplacer::new()),
        };
        let block_size = disk.block_size();
        Ok(Self {
            disk,
            frames: (0..frame_count).map(|_| Frame::new(block_size)).collect(),
            block_table: HashMap::with_capacity(frame_count),
            replacer,
            clock: 0,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn policy_name(&self) -> &'static str {
        self.replacer.name()
    }

    pub fn clock_hand(&self) -> Option<BufferFrameIdT> {
        self.replacer.hand()
    }

    /// Return the frame bytes of a block, faulting it in if necessary.
    ///
    /// On a miss the replacer picks a victim frame; a dirty victim is
    /// written back before the frame is recycled. The victim's mapping is
    /// removed before the new block is loaded, so a failed read leaves no
    /// stale mapping behind. Fails with `AllFramesPinned` when nothing can
    /// be evicted.
    pub fn get_block(&mut self, block_id: BlockIdT) -> Result<&mut [u8], BufferError> {
        self.clock += 1;

        if let Some(&frame_id) = self.block_table.get(&block_id) {
            let frame = &mut self.frames[frame_id];
            frame.last_used = self.clock;
            frame.set_referenced();
            return Ok(&mut frame.data);
        }

        let frame_id = self
            .replacer
            .pick_victim(&mut self.frames)
            .ok_or(BufferError::AllFramesPinned)?;

        if let Some(victim_id) = self.frames[frame_id].block_id {
            self.block_table.remove(&victim_id);
            if self.frames[frame_id].dirty {
                debug!(block = victim_id, frame = frame_id, "writing back dirty victim");
                self.disk.write_block(victim_id, &self.frames[frame_id].data)?;
            }
        }

        let data = self.disk.read_block(block_id)?;
        let frame = &mut self.frames[frame_id];
        frame.data = data;
        frame.block_id = Some(block_id);
        frame.dirty = false;
        frame.last_used = self.clock;
        frame.pin_count = 0;
        frame.set_referenced();
        self.block_table.insert(block_id, frame_id);
        Ok(&mut self.frames[frame_id].data)
    }

    /// Fault the block in, pin it, and return a guard that unpins on drop.
    /// All page access in the engine goes through this; the raw id-based
    /// calls below exist for the shell's inspection commands.
    pub fn fetch(&mut self, block_id: BlockIdT) -> Result<BlockGuard<'_>, BufferError> {
        self.get_block(block_id)?;
        let frame_id = self.block_table[&block_id];
        self.frames[frame_id].pin_count += 1;
        Ok(BlockGuard { manager: self, frame_id })
    }

    pub fn mark_dirty(&mut self, block_id: BlockIdT) -> Result<(), BufferError> {
        let frame_id = self.resident_frame(block_id)?;
        self.frames[frame_id].dirty = true;
        Ok(())
    }

    pub fn pin(&mut self, block_id: BlockIdT) -> Result<(), BufferError> {
        let frame_id = self.resident_frame(block_id)?;
        self.frames[frame_id].pin_count += 1;
        Ok(())
    }

    pub fn unpin(&mut self, block_id: BlockIdT) -> Result<(), BufferError> {
        let frame_id = self.resident_frame(block_id)?;
        let frame = &mut self.frames[frame_id];
        if frame.pin_count == 0 {
            return Err(BufferError::UnpinUnpinned(block_id));
        }
        frame.pin_count -= 1;
        Ok(())
    }

    /// Drop a block from the buffer without writing it back. Used when the
    /// block has been freed: its cached contents are meaningless, and a
    /// later write-back would clobber whatever the block is reallocated to.
    pub fn discard(&mut self, block_id: BlockIdT) {
        if let Some(frame_id) = self.block_table.remove(&block_id) {
            let frame = &mut self.frames[frame_id];
            frame.block_id = None;
            frame.dirty = false;
            frame.pin_count = 0;
            frame.last_used = -1;
            frame.clear_referenced();
        }
    }

    /// Write a resident dirty block back to disk.
    pub fn flush_block(&mut self, block_id: BlockIdT) -> Result<(), BufferError> {
        let frame_id = self.resident_frame(block_id)?;
        let frame = &mut self.frames[frame_id];
        if frame.dirty {
            self.disk.write_block(block_id, &frame.data)?;
            frame.dirty = false;
        }
        Ok(())
    }

    /// Write every dirty frame back to disk.
    pub fn flush_all(&mut self) -> Result<(), BufferError> {
        for frame in &mut self.frames {
            if let Some(block_id) = frame.block_id {
                if frame.dirty {
                    self.disk.write_block(block_id, &frame.data)?;
                    frame.dirty = false;
                }
            }
        }
        Ok(())
    }

    fn resident_frame(&self, block_id: BlockIdT) -> Result<BufferFrameIdT, BufferError> {
        self.block_table
            .get(&block_id)
            .copied()
            .ok_or(BufferError::NotResident(block_id))
    }
}

/// A pinned view of one buffered block.
///
/// Holding the guard keeps the block pinned (it cannot be evicted); dropping
/// it releases the pin on every path, error paths included. Derefs to the
/// raw block bytes so the typed page views can be layered on top.
pub struct BlockGuard<'a> {
    manager: &'a mut BufferManager,
    frame_id: BufferFrameIdT,
}

impl BlockGuard<'_> {
    pub fn block_id(&self) -> BlockIdT {
        // A pinned frame always holds a block.
        self.manager.frames[self.frame_id].block_id.unwrap()
    }

    pub fn mark_dirty(&mut self) {
        self.manager.frames[self.frame_id].dirty = true;
    }
}

impl Deref for BlockGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.manager.frames[self.frame_id].data
    }
}

impl DerefMut for BlockGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.manager.frames[self.frame_id].data
    }
}

impl Drop for BlockGuard<'_> {
    fn drop(&mut self) {
        let frame = &mut self.manager.frames[self.frame_id];
        debug_assert!(frame.pin_count > 0);
        frame.pin_count = frame.pin_count.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskConfig;
    use tempfile::TempDir;

    fn setup(frame_count: usize, algorithm: ReplacerAlgorithm) -> (TempDir, BufferManager) {
        let dir = TempDir::new().unwrap();
        let config = DiskConfig {
            platters: 1,
            tracks: 2,
            sectors: 4,
            block_size: 64,
            blocks_per_sector: 2,
        };
        let disk = Rc::new(DiskManager::open(dir.path().join("disk"), config).unwrap());
        let manager = BufferManager::new(disk, frame_count, algorithm).unwrap();
        (dir, manager)
    }

    #[test]
    fn test_zero_frames_rejected() {
        let dir = TempDir::new().unwrap();
        let config = DiskConfig {
            platters: 1,
            tracks: 1,
            sectors: 2,
            block_size: 64,
            blocks_per_sector: 2,
        };
        let disk = Rc::new(DiskManager::open(dir.path().join("disk"), config).unwrap());
        assert!(matches!(
            BufferManager::new(disk, 0, ReplacerAlgorithm::Lru),
            Err(BufferError::NoFrames)
        ));
    }

    #[test]
    fn test_dirty_write_back_on_flush() {
        let (_dir, mut buffer) = setup(2, ReplacerAlgorithm::Lru);

        let bytes = buffer.get_block(4).unwrap();
        bytes.fill(0x5a);
        buffer.mark_dirty(4).unwrap();
        buffer.flush_block(4).unwrap();

        let disk = buffer.disk.clone();
        assert_eq!(disk.read_block(4).unwrap(), vec![0x5a; 64]);
    }

    #[test]
    fn test_lru_eviction_writes_back() {
        let (_dir, mut buffer) = setup(2, ReplacerAlgorithm::Lru);
        let disk = buffer.disk.clone();

        buffer.get_block(2).unwrap().fill(b'a');
        buffer.mark_dirty(2).unwrap();
        buffer.get_block(3).unwrap();
        // Third access evicts block 2, the least recently used.
        buffer.get_block(4).unwrap();

        assert!(buffer.block_table.get(&2).is_none());
        assert!(buffer.block_table.get(&3).is_some());
        assert_eq!(disk.read_block(2).unwrap(), vec![b'a'; 64]);
    }

    #[test]
    fn test_hit_refreshes_lru_order() {
        let (_dir, mut buffer) = setup(2, ReplacerAlgorithm::Lru);

        buffer.get_block(2).unwrap();
        buffer.get_block(3).unwrap();
        // Touch block 2 so block 3 becomes the LRU victim.
        buffer.get_block(2).unwrap();
        buffer.get_block(4).unwrap();

        assert!(buffer.block_table.contains_key(&2));
        assert!(!buffer.block_table.contains_key(&3));
    }

    #[test]
    fn test_pin_prevents_eviction() {
        let (_dir, mut buffer) = setup(2, ReplacerAlgorithm::Lru);

        buffer.get_block(2).unwrap();
        buffer.pin(2).unwrap();
        buffer.get_block(3).unwrap();
        buffer.pin(3).unwrap();

        assert!(matches!(
            buffer.get_block(4),
            Err(BufferError::AllFramesPinned)
        ));

        buffer.unpin(3).unwrap();
        assert!(buffer.get_block(4).is_ok());
        assert!(buffer.block_table.contains_key(&2));
    }

    #[test]
    fn test_unpin_unpinned_errors() {
        let (_dir, mut buffer) = setup(2, ReplacerAlgorithm::Lru);
        buffer.get_block(2).unwrap();
        assert!(matches!(
            buffer.unpin(2),
            Err(BufferError::UnpinUnpinned(2))
        ));
    }

    #[test]
    fn test_operations_on_nonresident_block() {
        let (_dir, mut buffer) = setup(2, ReplacerAlgorithm::Lru);
        assert!(matches!(buffer.pin(9), Err(BufferError::NotResident(9))));
        assert!(matches!(
            buffer.mark_dirty(9),
            Err(BufferError::NotResident(9))
        ));
    }

    #[test]
    fn test_guard_unpins_on_drop() {
        let (_dir, mut buffer) = setup(2, ReplacerAlgorithm::Lru);

        {
            let mut guard = buffer.fetch(2).unwrap();
            guard[0] = 0xff;
            guard.mark_dirty();
            assert_eq!(guard.block_id(), 2);
        }
        let frame_id = buffer.block_table[&2];
        assert_eq!(buffer.frames[frame_id].pin_count(), 0);
        assert!(buffer.frames[frame_id].is_dirty());
    }

    #[test]
    fn test_discard_drops_dirty_contents() {
        let (_dir, mut buffer) = setup(2, ReplacerAlgorithm::Lru);
        let disk = buffer.disk.clone();

        buffer.get_block(2).unwrap().fill(b'q');
        buffer.mark_dirty(2).unwrap();
        buffer.discard(2);

        buffer.flush_all().unwrap();
        assert_eq!(disk.read_block(2).unwrap(), vec![0u8; 64]);
        assert!(matches!(buffer.pin(2), Err(BufferError::NotResident(2))));
    }

    #[test]
    fn test_clock_eviction_cycle() {
        let (_dir, mut buffer) = setup(2, ReplacerAlgorithm::Clock);

        buffer.get_block(2).unwrap();
        buffer.get_block(3).unwrap();
        // Both frames carry a fresh reference bit; the sweep clears them
        // and recycles frame 0.
        buffer.get_block(4).unwrap();
        assert!(!buffer.block_table.contains_key(&2));
        assert!(buffer.block_table.contains_key(&3));
        assert!(buffer.block_table.contains_key(&4));
    }

    #[test]
    fn test_flush_all_clears_dirty_flags() {
        let (_dir, mut buffer) = setup(4, ReplacerAlgorithm::Lru);
        let disk = buffer.disk.clone();

        for block in [2u32, 3, 4] {
            buffer.get_block(block).unwrap().fill(block as u8);
            buffer.mark_dirty(block).unwrap();
        }
        buffer.flush_all().unwrap();

        for block in [2u32, 3, 4] {
            assert_eq!(disk.read_block(block).unwrap(), vec![block as u8; 64]);
            let frame_id = buffer.block_table[&block];
            assert!(!buffer.frames[frame_id].is_dirty());
        }
    }
}
