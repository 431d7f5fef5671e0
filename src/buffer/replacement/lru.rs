/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::buffer::replacement::PageReplacer;
use crate::buffer::Frame;
use crate::constants::BufferFrameIdT;

/// Least-recently-used eviction.
///
/// An empty frame is always preferred; otherwise the unpinned frame with
/// the smallest access timestamp loses.
#[derive(Debug, Default)]
pub struct LruReplacer;

impl LruReplacer {
    pub fn new() -> Self {
        Self
    }
}

impl PageReplacer for LruReplacer {
    fn pick_victim(&mut self, frames: &mut [Frame]) -> Option<BufferFrameIdT> {
        let mut victim: Option<BufferFrameIdT> = None;
        let mut oldest = i64::MAX;
        for (id, frame) in frames.iter().enumerate() {
            if frame.block_id().is_none() {
                return Some(id);
            }
            if frame.pin_count() == 0 && frame.last_used() < oldest {
                oldest = frame.last_used();
                victim = Some(id);
            }
        }
        victim
    }

    fn name(&self) -> &'static str {
        "lru"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_empty_frame() {
        let mut frames = vec![Frame::new(16), Frame::new(16)];
        frames[0].test_fill(Some(3), 10, 0);
        let mut lru = LruReplacer::new();
        assert_eq!(lru.pick_victim(&mut frames), Some(1));
    }

    #[test]
    fn test_evicts_oldest_unpinned() {
        let mut frames = vec![Frame::new(16), Frame::new(16), Frame::new(16)];
        frames[0].test_fill(Some(3), 5, 0);
        frames[1].test_fill(Some(4), 2, 0);
        frames[2].test_fill(Some(5), 9, 0);
        let mut lru = LruReplacer::new();
        assert_eq!(lru.pick_victim(&mut frames), Some(1));
    }

    #[test]
    fn test_pinned_frames_are_skipped() {
        let mut frames = vec![Frame::new(16), Frame::new(16)];
        frames[0].test_fill(Some(3), 1, 1);
        frames[1].test_fill(Some(4), 8, 0);
        let mut lru = LruReplacer::new();
        assert_eq!(lru.pick_victim(&mut frames), Some(1));
    }

    #[test]
    fn test_all_pinned_fails() {
        let mut frames = vec![Frame::new(16), Frame::new(16)];
        frames[0].test_fill(Some(3), 1, 1);
        frames[1].test_fill(Some(4), 2, 2);
        let mut lru = LruReplacer::new();
        assert_eq!(lru.pick_victim(&mut frames), None);
    }
}
