/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::bitmap::BlockBitmap;
use crate::constants::{BlockIdT, SlotIdT};
use crate::disk::DiskManager;
use crate::index::IndexError;

use std::collections::{BTreeMap, BTreeSet};

/// Byte offsets within the header block: global depth, key size, bucket
/// capacity, then one 4-byte directory entry per 2^global_depth slots.
const HEADER_META_SIZE: usize = 12;

/// Byte offsets within a bucket block: local depth, entry count, then
/// `(key, block, slot)` entries of `key_size + 8` bytes.
const BUCKET_HEADER_SIZE: usize = 8;

/// One index entry: a fixed-width key prefix and the record's location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashEntry {
    pub key: Vec<u8>,
    pub block: BlockIdT,
    pub slot: SlotIdT,
}

/// A bucket holds entries whose hashes agree on its bottom `local_depth`
/// bits.
#[derive(Clone, Debug, Default)]
pub struct Bucket {
    pub local_depth: u32,
    pub entries: Vec<HashEntry>,
}

/// An extendible hash index over the primary key of a fixed relation.
///
/// The persisted form is one header block (directory) plus one block per
/// bucket, all written through the disk manager directly rather than the
/// buffer pool. The whole structure is also kept in memory; lookups never
/// touch the disk.
///
/// Keys are padded with spaces (or truncated) to `key_size` bytes and
/// hashed with FNV-1a; a bucket overflow splits the bucket, doubling the
/// directory when the bucket's local depth has caught up with the global
/// depth. Buckets are never merged and the directory never shrinks.
pub struct ExtendibleHashIndex {
    header_block: BlockIdT,
    block_size: usize,
    global_depth: u32,
    key_size: usize,
    bucket_capacity: usize,
    directory: Vec<BlockIdT>,
    buckets: BTreeMap<BlockIdT, Bucket>,
}

impl ExtendibleHashIndex {
    /// Allocate and persist a fresh index: a header plus two depth-1
    /// buckets.
    pub fn create(
        disk: &DiskManager,
        bitmap: &mut BlockBitmap,
        key_size: usize,
        bucket_capacity: usize,
    ) -> Result<Self, IndexError> {
        debug_assert!(key_size > 0 && bucket_capacity > 0);

        let header_block = allocate(bitmap)?;
        let first = allocate(bitmap)?;
        let second = allocate(bitmap)?;

        let mut buckets = BTreeMap::new();
        buckets.insert(first, Bucket { local_depth: 1, entries: Vec::new() });
        buckets.insert(second, Bucket { local_depth: 1, entries: Vec::new() });

        let index = Self {
            header_block,
            block_size: disk.block_size(),
            global_depth: 1,
            key_size,
            bucket_capacity,
            directory: vec![first, second],
            buckets,
        };
        index.save(disk)?;
        Ok(index)
    }

    /// Load a persisted index from its header block.
    pub fn load(disk: &DiskManager, header_block: BlockIdT) -> Result<Self, IndexError> {
        let block_size = disk.block_size();
        let header = disk.read_block(header_block)?;
        let corrupt = |reason: &str| IndexError::Corrupt {
            block: header_block,
            reason: reason.to_string(),
        };

        let global_depth = read_i32(&header, 0);
        let key_size = read_i32(&header, 4);
        let bucket_capacity = read_i32(&header, 8);
        if global_depth < 1 || key_size < 1 || bucket_capacity < 1 {
            return Err(corrupt("bad header counters"));
        }
        let global_depth = global_depth as u32;
        let directory_len = 1usize
            .checked_shl(global_depth)
            .filter(|len| HEADER_META_SIZE + len * 4 <= block_size)
            .ok_or_else(|| corrupt("directory does not fit the header block"))?;

        let mut directory = Vec::with_capacity(directory_len);
        for i in 0..directory_len {
            directory.push(read_i32(&header, HEADER_META_SIZE + i * 4) as BlockIdT);
        }

        let key_size = key_size as usize;
        let bucket_capacity = bucket_capacity as usize;
        let entry_size = key_size + 8;

        let mut buckets = BTreeMap::new();
        for &bucket_block in &directory {
            if buckets.contains_key(&bucket_block) {
                continue;
            }
            let data = disk.read_block(bucket_block)?;
            let local_depth = read_i32(&data, 0);
            let count = read_i32(&data, 4);
            if local_depth < 0
                || local_depth as u32 > global_depth
                || count < 0
                || BUCKET_HEADER_SIZE + count as usize * entry_size > block_size
            {
                return Err(IndexError::Corrupt {
                    block: bucket_block,
                    reason: "bad bucket header".to_string(),
                });
            }

            let mut entries = Vec::with_capacity(count as usize);
            for i in 0..count as usize {
                let at = BUCKET_HEADER_SIZE + i * entry_size;
                entries.push(HashEntry {
                    key: data[at..at + key_size].to_vec(),
                    block: read_i32(&data, at + key_size) as BlockIdT,
                    slot: read_i32(&data, at + key_size + 4) as SlotIdT,
                });
            }
            buckets.insert(
                bucket_block,
                Bucket { local_depth: local_depth as u32, entries },
            );
        }

        Ok(Self {
            header_block,
            block_size,
            global_depth,
            key_size,
            bucket_capacity,
            directory,
            buckets,
        })
    }

    /// Persist the header and every bucket, zero-padded to full blocks.
    pub fn save(&self, disk: &DiskManager) -> Result<(), IndexError> {
        let mut header = vec![0u8; self.block_size];
        write_i32(&mut header, 0, self.global_depth as i32);
        write_i32(&mut header, 4, self.key_size as i32);
        write_i32(&mut header, 8, self.bucket_capacity as i32);
        for (i, &bucket_block) in self.directory.iter().enumerate() {
            write_i32(&mut header, HEADER_META_SIZE + i * 4, bucket_block as i32);
        }
        disk.write_block(self.header_block, &header)?;

        let entry_size = self.key_size + 8;
        for (&bucket_block, bucket) in &self.buckets {
            let mut data = vec![0u8; self.block_size];
            write_i32(&mut data, 0, bucket.local_depth as i32);
            write_i32(&mut data, 4, bucket.entries.len() as i32);
            for (i, entry) in bucket.entries.iter().enumerate() {
                let at = BUCKET_HEADER_SIZE + i * entry_size;
                data[at..at + self.key_size].copy_from_slice(&entry.key);
                write_i32(&mut data, at + self.key_size, entry.block as i32);
                write_i32(&mut data, at + self.key_size + 4, entry.slot as i32);
            }
            disk.write_block(bucket_block, &data)?;
        }
        Ok(())
    }

    pub fn header_block(&self) -> BlockIdT {
        self.header_block
    }

    pub fn global_depth(&self) -> u32 {
        self.global_depth
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn bucket_capacity(&self) -> usize {
        self.bucket_capacity
    }

    pub fn directory(&self) -> &[BlockIdT] {
        &self.directory
    }

    /// The unique bucket blocks referenced by the directory.
    pub fn bucket_blocks(&self) -> BTreeSet<BlockIdT> {
        self.directory.iter().copied().collect()
    }

    pub fn bucket(&self, block: BlockIdT) -> Option<&Bucket> {
        self.buckets.get(&block)
    }

    /// The bucket block a key hashes into.
    pub fn bucket_block_for(&self, key: &str) -> BlockIdT {
        let key = self.normalize(key.as_bytes());
        self.directory[self.directory_index(&key)]
    }

    /// Insert an entry, splitting buckets as needed. Inserting a triple
    /// that is already present is a no-op. Returns `true` when the insert
    /// allocated new blocks (the caller must persist the bitmap).
    pub fn insert(
        &mut self,
        disk: &DiskManager,
        bitmap: &mut BlockBitmap,
        key: &[u8],
        block: BlockIdT,
        slot: SlotIdT,
    ) -> Result<bool, IndexError> {
        let key = self.normalize(key);
        let mut allocated = false;

        loop {
            let dir_idx = self.directory_index(&key);
            let bucket_block = self.directory[dir_idx];
            let bucket = self
                .buckets
                .get_mut(&bucket_block)
                .ok_or(IndexError::Corrupt {
                    block: bucket_block,
                    reason: "directory references an unloaded bucket".to_string(),
                })?;

            if bucket
                .entries
                .iter()
                .any(|e| e.key == key && e.block == block && e.slot == slot)
            {
                return Ok(allocated);
            }

            if bucket.entries.len() < self.bucket_capacity {
                bucket.entries.push(HashEntry { key, block, slot });
                self.save(disk)?;
                return Ok(allocated);
            }

            self.split(bitmap, dir_idx)?;
            allocated = true;
        }
    }

    /// All record locations stored under a key.
    pub fn search(&self, key: &str) -> Vec<(BlockIdT, SlotIdT)> {
        let key = self.normalize(key.as_bytes());
        let bucket_block = self.directory[self.directory_index(&key)];
        match self.buckets.get(&bucket_block) {
            Some(bucket) => bucket
                .entries
                .iter()
                .filter(|e| e.key == key)
                .map(|e| (e.block, e.slot))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Remove the entry matching the exact triple, if present. Buckets are
    /// never merged.
    pub fn remove(
        &mut self,
        disk: &DiskManager,
        key: &[u8],
        block: BlockIdT,
        slot: SlotIdT,
    ) -> Result<(), IndexError> {
        let key = self.normalize(key);
        let bucket_block = self.directory[self.directory_index(&key)];
        if let Some(bucket) = self.buckets.get_mut(&bucket_block) {
            let before = bucket.entries.len();
            bucket
                .entries
                .retain(|e| !(e.key == key && e.block == block && e.slot == slot));
            if bucket.entries.len() != before {
                self.save(disk)?;
            }
        }
        Ok(())
    }

    /// Split the bucket behind a directory slot.
    ///
    /// When the bucket already uses every global bit, the directory is
    /// doubled first (appending a copy of itself preserves all existing
    /// mappings). Entries are then redistributed by their next hash bit,
    /// and every directory slot that pointed at the old bucket is re-aimed
    /// according to that bit.
    fn split(&mut self, bitmap: &mut BlockBitmap, dir_idx: usize) -> Result<(), IndexError> {
        let old_block = self.directory[dir_idx];
        let old_depth = self.buckets[&old_block].local_depth;

        let max_bits = (8 * self.key_size as u32).min(32);
        if old_depth >= max_bits {
            return Err(IndexError::DepthExhausted { max_bits });
        }

        if old_depth == self.global_depth {
            let doubled = self.directory.len() * 2;
            if HEADER_META_SIZE + doubled * 4 > self.block_size {
                return Err(IndexError::DirectoryFull {
                    depth: self.global_depth + 1,
                });
            }
            self.directory.extend_from_within(..);
            self.global_depth += 1;
        }

        let new_block = allocate(bitmap)?;
        let new_depth = old_depth + 1;
        let mask = (1u32 << new_depth) - 1;
        let suffix = dir_idx as u32 & mask;

        let old_bucket = self.buckets.get_mut(&old_block).unwrap();
        old_bucket.local_depth = new_depth;
        let entries = std::mem::take(&mut old_bucket.entries);

        let (stay, migrate): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| hash_key(&e.key) & mask == suffix);

        self.buckets.get_mut(&old_block).unwrap().entries = stay;
        self.buckets.insert(
            new_block,
            Bucket { local_depth: new_depth, entries: migrate },
        );

        for (i, slot) in self.directory.iter_mut().enumerate() {
            if *slot == old_block && i as u32 & mask != suffix {
                *slot = new_block;
            }
        }
        Ok(())
    }

    #[inline]
    fn directory_index(&self, key: &[u8]) -> usize {
        (hash_key(key) & ((1u32 << self.global_depth) - 1)) as usize
    }

    /// Space-pad or truncate a key to the index's fixed key width.
    fn normalize(&self, key: &[u8]) -> Vec<u8> {
        let mut key = key.to_vec();
        key.truncate(self.key_size);
        key.resize(self.key_size, b' ');
        key
    }
}

/// FNV-1a over the raw key bytes.
fn hash_key(key: &[u8]) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &byte in key {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

fn allocate(bitmap: &mut BlockBitmap) -> Result<BlockIdT, IndexError> {
    let block = bitmap.first_free().ok_or(IndexError::OutOfSpace)?;
    bitmap.set(block, true);
    Ok(block)
}

#[inline]
fn read_i32(data: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

#[inline]
fn write_i32(data: &mut [u8], offset: usize, value: i32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
