/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::constants::{SlotIdT, SLOTTED_HEADER_SIZE, SLOT_ENTRY_SIZE};
use crate::page::{read_ascii_int, write_ascii_int, PageError};

/// Header counter offsets. Each counter is a 4-character ASCII decimal.
const NUM_RECORDS_OFFSET: usize = 0;
const HEAP_END_OFFSET: usize = 4;

const COUNTER_WIDTH: usize = 4;

/// Slot-directory offset value marking a tombstone.
const TOMBSTONE: i32 = -1;

/// A typed view over a page holding variable-length records.
///
/// The slot directory grows down from the header while record payloads grow
/// up from the end of the page:
///
/// ```text
/// +--------+-----------------+--------------+---------------------+
/// | HEADER | SLOT DIRECTORY  | ... FREE ... | (<- grows) RECORDS  |
/// +--------+-----------------+--------------+---------------------+
/// ^ 0      ^ 8                              ^ heap_end
/// ```
///
/// Each slot entry is two 4-character counters (offset, length). Deleting a
/// record only tombstones its slot; the payload bytes are reclaimed by
/// `compact`, which rewrites the page and renumbers the slots. Callers must
/// not hold slot indices across a compaction.
pub struct SlottedPage<'a> {
    bytes: &'a mut [u8],
}

impl<'a> SlottedPage<'a> {
    /// Initialize an empty page: no slots, heap end at the page boundary.
    pub fn init(bytes: &mut [u8]) -> Result<(), PageError> {
        bytes.fill(0);
        write_ascii_int(bytes, NUM_RECORDS_OFFSET, COUNTER_WIDTH, 0)?;
        write_ascii_int(bytes, HEAP_END_OFFSET, COUNTER_WIDTH, bytes.len() as i32)
    }

    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    /// Logical slot count, tombstones included.
    pub fn num_records(&self) -> Result<u32, PageError> {
        let num = read_ascii_int(self.bytes, NUM_RECORDS_OFFSET, COUNTER_WIDTH)?;
        if num < 0 {
            return Err(PageError::BadCounter { offset: NUM_RECORDS_OFFSET });
        }
        Ok(num as u32)
    }

    /// Lowest byte offset currently occupied by record data.
    pub fn heap_end(&self) -> Result<usize, PageError> {
        let end = read_ascii_int(self.bytes, HEAP_END_OFFSET, COUNTER_WIDTH)?;
        if end < 0 || end as usize > self.bytes.len() {
            return Err(PageError::BadCounter { offset: HEAP_END_OFFSET });
        }
        Ok(end as usize)
    }

    /// Bytes available for one more insertion (slot entry included).
    pub fn free_space(&self) -> Result<usize, PageError> {
        let directory_end =
            SLOTTED_HEADER_SIZE + self.num_records()? as usize * SLOT_ENTRY_SIZE;
        Ok(self.heap_end()?.saturating_sub(directory_end))
    }

    /// Append a record: payload at the bottom of the heap, a fresh slot at
    /// the top of the directory.
    pub fn insert(&mut self, record: &[u8]) -> Result<SlotIdT, PageError> {
        let num_records = self.num_records()?;
        let heap_end = self.heap_end()?;
        let directory_end = SLOTTED_HEADER_SIZE + num_records as usize * SLOT_ENTRY_SIZE;

        if record.len() + SLOT_ENTRY_SIZE > heap_end.saturating_sub(directory_end) {
            return Err(PageError::PageFull);
        }

        let offset = heap_end - record.len();
        self.bytes[offset..heap_end].copy_from_slice(record);

        write_ascii_int(self.bytes, directory_end, COUNTER_WIDTH, offset as i32)?;
        write_ascii_int(
            self.bytes,
            directory_end + COUNTER_WIDTH,
            COUNTER_WIDTH,
            record.len() as i32,
        )?;
        write_ascii_int(
            self.bytes,
            NUM_RECORDS_OFFSET,
            COUNTER_WIDTH,
            num_records as i32 + 1,
        )?;
        write_ascii_int(self.bytes, HEAP_END_OFFSET, COUNTER_WIDTH, offset as i32)?;
        Ok(num_records)
    }

    /// Tombstone a slot. The payload stays in place until `compact`.
    pub fn delete(&mut self, slot: SlotIdT) -> Result<(), PageError> {
        if slot >= self.num_records()? {
            return Err(PageError::SlotOutOfBounds(slot));
        }
        let entry = SLOTTED_HEADER_SIZE + slot as usize * SLOT_ENTRY_SIZE;
        write_ascii_int(self.bytes, entry, COUNTER_WIDTH, TOMBSTONE)
    }

    /// The (offset, length) entry of a slot, or `None` for a tombstone.
    pub fn slot(&self, slot: SlotIdT) -> Result<Option<(usize, usize)>, PageError> {
        if slot >= self.num_records()? {
            return Err(PageError::SlotOutOfBounds(slot));
        }
        let entry = SLOTTED_HEADER_SIZE + slot as usize * SLOT_ENTRY_SIZE;
        let offset = read_ascii_int(self.bytes, entry, COUNTER_WIDTH)?;
        if offset == TOMBSTONE {
            return Ok(None);
        }
        let length = read_ascii_int(self.bytes, entry + COUNTER_WIDTH, COUNTER_WIDTH)?;
        if offset < 0 || length < 0 || offset as usize + length as usize > self.bytes.len() {
            return Err(PageError::BadCounter { offset: entry });
        }
        Ok(Some((offset as usize, length as usize)))
    }

    /// Payload bytes of a slot, or `None` for a tombstone.
    pub fn record_bytes(&self, slot: SlotIdT) -> Result<Option<&[u8]>, PageError> {
        Ok(self
            .slot(slot)?
            .map(|(offset, length)| &self.bytes[offset..offset + length]))
    }

    /// Number of non-tombstoned slots.
    pub fn live_records(&self) -> Result<u32, PageError> {
        let mut live = 0;
        for slot in 0..self.num_records()? {
            if self.slot(slot)?.is_some() {
                live += 1;
            }
        }
        Ok(live)
    }

    /// Drop tombstones and repack the heap. Live records keep their
    /// relative order but are renumbered into a contiguous directory.
    pub fn compact(&mut self) -> Result<(), PageError> {
        let mut survivors: Vec<Vec<u8>> = Vec::new();
        for slot in 0..self.num_records()? {
            if let Some(bytes) = self.record_bytes(slot)? {
                survivors.push(bytes.to_vec());
            }
        }

        Self::init(self.bytes)?;
        for record in &survivors {
            self.insert(record)?;
        }
        Ok(())
    }
}
