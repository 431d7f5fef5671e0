/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::bitmap::BlockBitmap;
use crate::buffer::{BufferError, BufferManager, ReplacerAlgorithm};
use crate::catalog::{Catalog, CatalogError};
use crate::constants::{
    BlockIdT, SlotIdT, FIXED_HEADER_SIZE, SLOTTED_HEADER_SIZE, SLOT_ENTRY_SIZE,
};
use crate::disk::{BlockAddress, DiskError, DiskManager};
use crate::index::{ExtendibleHashIndex, IndexError};
use crate::page::{FixedPage, PageError, SlottedPage};
use crate::relation::record::{self, Overflow, RecordError};
use crate::relation::{CompareOp, Field, FieldType, Predicate, Relation};

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;
use tracing::{info, warn};

/// Byte overhead of a hash bucket block (local depth + entry count).
const BUCKET_OVERHEAD: usize = 8;

/// Size of an index entry besides the key (block id + slot id).
const ENTRY_OVERHEAD: usize = 8;

/// The engine owns every subsystem and orchestrates them: relations live in
/// the catalog, their pages flow through the buffer pool, blocks come from
/// the bitmap, and fixed relations keep an extendible hash index over their
/// first field (the primary key).
///
/// The engine is strictly single-threaded; operations run to completion in
/// invocation order.
pub struct Engine {
    disk: Rc<DiskManager>,
    bitmap: BlockBitmap,
    catalog: Catalog,
    buffer: BufferManager,
    indices: HashMap<String, ExtendibleHashIndex>,
}

/// Custom errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("relation '{0}' not found")]
    UnknownRelation(String),

    #[error("field '{field}' not found in relation '{relation}'")]
    UnknownField { relation: String, field: String },

    #[error("no free block available")]
    OutOfSpace,

    #[error("record does not fit an empty page")]
    RecordTooLarge,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Disk(#[from] DiskError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
}

/// Space accounting for one data block, for the inspection commands.
pub struct BlockUsage {
    pub block: BlockIdT,
    pub address: BlockAddress,
    pub used_bytes: usize,
    pub block_size: usize,
}

/// Disk-wide space accounting.
pub struct CapacityReport {
    pub total_blocks: u32,
    pub block_size: usize,
    pub free_blocks: u32,
    pub used_blocks: u32,
    pub data_blocks: u32,
    pub data_bytes: usize,
}

impl Engine {
    /// Boot the engine: load (or initialize) the bitmap, load the catalog,
    /// and load the hash index of every fixed relation that has one.
    pub fn new(
        disk: DiskManager,
        frame_count: usize,
        algorithm: ReplacerAlgorithm,
    ) -> Result<Self, EngineError> {
        let disk = Rc::new(disk);
        let buffer = BufferManager::new(disk.clone(), frame_count, algorithm)?;

        let mut bitmap = BlockBitmap::new(disk.total_blocks());
        if !bitmap.load(&disk)? {
            info!("bitmap missing or uninitialized, formatting");
            bitmap.initialize();
            bitmap.save(&disk)?;
        }

        let mut catalog = Catalog::new();
        catalog.load(&disk)?;

        let mut indices = HashMap::new();
        for relation in catalog.iter() {
            if let Some(header) = relation.hash_index_block {
                match ExtendibleHashIndex::load(&disk, header) {
                    Ok(index) => {
                        indices.insert(relation.name.clone(), index);
                    }
                    Err(e) => {
                        warn!(relation = %relation.name, error = %e, "failed to load hash index");
                    }
                }
            }
        }

        Ok(Self { disk, bitmap, catalog, buffer, indices })
    }

    pub fn disk(&self) -> &DiskManager {
        &self.disk
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn bitmap(&self) -> &BlockBitmap {
        &self.bitmap
    }

    pub fn buffer(&self) -> &BufferManager {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut BufferManager {
        &mut self.buffer
    }

    pub fn index(&self, relation: &str) -> Option<&ExtendibleHashIndex> {
        self.indices.get(relation)
    }

    /// Flush every dirty frame and persist catalog, bitmap and indices.
    /// Skipping this on exit loses recent writes.
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        self.buffer.flush_all()?;
        for index in self.indices.values() {
            index.save(&self.disk)?;
        }
        self.catalog.save(&self.disk)?;
        self.bitmap.save(&self.disk)?;
        Ok(())
    }

    /// Create a relation, replacing any existing one of the same name. A
    /// fixed relation also gets a hash index over its first field, sized so
    /// one bucket fills a block.
    pub fn create_relation(
        &mut self,
        name: &str,
        is_fixed: bool,
        fields: Vec<Field>,
    ) -> Result<(), EngineError> {
        if fields.is_empty() {
            return Err(EngineError::InvalidArgument(
                "a relation needs at least one field".to_string(),
            ));
        }
        let record_size: usize = fields.iter().map(|f| f.size.max(0) as usize).sum();
        if is_fixed {
            if fields.iter().any(|f| f.size <= 0) {
                return Err(EngineError::InvalidArgument(
                    "fixed relations need positive field sizes".to_string(),
                ));
            }
            if record_size + FIXED_HEADER_SIZE > self.disk.block_size() {
                return Err(EngineError::RecordTooLarge);
            }
        }

        if self.catalog.has(name) {
            self.drop_relation(name)?;
        }

        let block = self.allocate_block()?;
        {
            let mut guard = self.buffer.fetch(block)?;
            if is_fixed {
                FixedPage::init(&mut guard, record_size)?;
            } else {
                SlottedPage::init(&mut guard)?;
            }
            guard.mark_dirty();
        }

        let mut hash_index_block = None;
        if is_fixed {
            let key_size = fields[0].size as usize;
            let bucket_capacity =
                (self.disk.block_size() - BUCKET_OVERHEAD) / (key_size + ENTRY_OVERHEAD);
            if bucket_capacity == 0 {
                return Err(EngineError::InvalidArgument(format!(
                    "key of {key_size} bytes is too wide for an index bucket"
                )));
            }
            let index =
                ExtendibleHashIndex::create(&self.disk, &mut self.bitmap, key_size, bucket_capacity)?;
            hash_index_block = Some(index.header_block());
            self.indices.insert(name.to_string(), index);
        }

        self.catalog.add(Relation {
            name: name.to_string(),
            is_fixed,
            fields,
            blocks: vec![block],
            hash_index_block,
        })?;
        self.bitmap.save(&self.disk)?;
        self.catalog.save(&self.disk)?;
        Ok(())
    }

    /// Release every block the relation owns (data, index header, index
    /// buckets) and drop its catalog entry. Returns false when the relation
    /// does not exist.
    pub fn drop_relation(&mut self, name: &str) -> Result<bool, EngineError> {
        let Some(relation) = self.catalog.get(name).cloned() else {
            warn!(relation = name, "relation to drop not found");
            return Ok(false);
        };

        for &block in &relation.blocks {
            self.bitmap.set(block, false);
            self.buffer.discard(block);
        }

        let index = match self.indices.remove(name) {
            Some(index) => Some(index),
            None => relation
                .hash_index_block
                .and_then(|header| ExtendibleHashIndex::load(&self.disk, header).ok()),
        };
        match index {
            Some(index) => {
                self.bitmap.set(index.header_block(), false);
                self.buffer.discard(index.header_block());
                for block in index.bucket_blocks() {
                    self.bitmap.set(block, false);
                    self.buffer.discard(block);
                }
            }
            None => {
                // An unloadable index can only give back its header block.
                if let Some(header) = relation.hash_index_block {
                    self.bitmap.set(header, false);
                }
            }
        }

        self.catalog.remove(name)?;
        self.bitmap.save(&self.disk)?;
        self.catalog.save(&self.disk)?;
        Ok(true)
    }

    /// Insert one record given as per-field values. A value longer than its
    /// fixed-width field is an error here; CSV loads truncate instead.
    /// Returns the (block, slot) the record landed in.
    pub fn insert_values(
        &mut self,
        relation: &str,
        values: &[String],
    ) -> Result<(BlockIdT, SlotIdT), EngineError> {
        self.insert_with_overflow(relation, values, Overflow::Reject)
    }

    fn insert_with_overflow(
        &mut self,
        relation: &str,
        values: &[String],
        overflow: Overflow,
    ) -> Result<(BlockIdT, SlotIdT), EngineError> {
        let rel = self.relation(relation)?;
        let record = if rel.is_fixed {
            record::encode_fixed(&rel.fields, values, overflow)?
        } else {
            record::encode_var(&rel.fields, values)?
        };
        self.insert_record(relation, record)
    }

    /// Insert an already-encoded record and upsert the index entry for its
    /// primary-key prefix.
    fn insert_record(
        &mut self,
        relation: &str,
        record: Vec<u8>,
    ) -> Result<(BlockIdT, SlotIdT), EngineError> {
        let rel = self.relation(relation)?.clone();
        let location = if rel.is_fixed {
            self.insert_fixed(&rel, &record)?
        } else {
            self.insert_slotted(&rel, &record)?
        };

        if rel.is_fixed {
            if let Some(index) = self.indices.get_mut(&rel.name) {
                let key_size = index.key_size().min(record.len());
                let allocated = index.insert(
                    &self.disk,
                    &mut self.bitmap,
                    &record[..key_size],
                    location.0,
                    location.1,
                )?;
                if allocated {
                    self.bitmap.save(&self.disk)?;
                }
            }
        }
        Ok(location)
    }

    fn insert_fixed(
        &mut self,
        rel: &Relation,
        record: &[u8],
    ) -> Result<(BlockIdT, SlotIdT), EngineError> {
        let record_size = rel.record_size();
        if record_size + FIXED_HEADER_SIZE > self.disk.block_size() {
            return Err(EngineError::RecordTooLarge);
        }

        for block in probe_order(&rel.blocks) {
            if let Some(slot) = self.try_insert_fixed(block, record, record_size)? {
                return Ok((block, slot));
            }
        }

        let block = self.allocate_block()?;
        let slot = {
            let mut guard = self.buffer.fetch(block)?;
            FixedPage::init(&mut guard, record_size)?;
            let mut page = FixedPage::new(&mut guard);
            let slot = page.insert(record)?;
            guard.mark_dirty();
            slot
        };
        self.append_block(&rel.name, block)?;
        Ok((block, slot))
    }

    fn try_insert_fixed(
        &mut self,
        block: BlockIdT,
        record: &[u8],
        record_size: usize,
    ) -> Result<Option<SlotIdT>, EngineError> {
        let mut guard = self.buffer.fetch(block)?;
        let mut page = FixedPage::new(&mut guard);
        match page.record_size() {
            Ok(size) if size == record_size => {}
            Ok(size) => {
                warn!(block, page_size = size, expected = record_size, "record size mismatch, skipping page");
                return Ok(None);
            }
            Err(e) => {
                warn!(block, error = %e, "invalid page header, skipping page");
                return Ok(None);
            }
        }
        match page.insert(record) {
            Ok(slot) => {
                guard.mark_dirty();
                Ok(Some(slot))
            }
            Err(PageError::PageFull) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_slotted(
        &mut self,
        rel: &Relation,
        record: &[u8],
    ) -> Result<(BlockIdT, SlotIdT), EngineError> {
        if SLOTTED_HEADER_SIZE + SLOT_ENTRY_SIZE + record.len() > self.disk.block_size() {
            return Err(EngineError::RecordTooLarge);
        }

        for block in probe_order(&rel.blocks) {
            if let Some(slot) = self.try_insert_slotted(block, record)? {
                return Ok((block, slot));
            }
        }

        let block = self.allocate_block()?;
        let slot = {
            let mut guard = self.buffer.fetch(block)?;
            SlottedPage::init(&mut guard)?;
            let mut page = SlottedPage::new(&mut guard);
            let slot = page.insert(record)?;
            guard.mark_dirty();
            slot
        };
        self.append_block(&rel.name, block)?;
        Ok((block, slot))
    }

    fn try_insert_slotted(
        &mut self,
        block: BlockIdT,
        record: &[u8],
    ) -> Result<Option<SlotIdT>, EngineError> {
        let mut guard = self.buffer.fetch(block)?;
        let mut page = SlottedPage::new(&mut guard);
        if let Err(e) = page.num_records() {
            warn!(block, error = %e, "invalid page header, skipping page");
            return Ok(None);
        }
        match page.insert(record) {
            Ok(slot) => {
                guard.mark_dirty();
                Ok(Some(slot))
            }
            Err(PageError::PageFull) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Decode every live record of a relation, in block order then slot
    /// order, which is insertion order until records are deleted.
    pub fn scan_relation(&mut self, name: &str) -> Result<Vec<Vec<String>>, EngineError> {
        let rel = self.relation(name)?.clone();
        let mut rows = Vec::new();
        for &block in &rel.blocks {
            let mut guard = self.buffer.fetch(block)?;
            let scanned = if rel.is_fixed {
                scan_fixed_page(&FixedPage::new(&mut guard), &rel)
            } else {
                scan_slotted_page(&SlottedPage::new(&mut guard), &rel)
            };
            match scanned {
                Ok(mut page_rows) => rows.append(&mut page_rows),
                Err(e) => warn!(block, error = %e, "skipping invalid page"),
            }
        }
        Ok(rows)
    }

    /// Find every record matching `field OP value` and return its location
    /// and raw bytes. A fixed relation probed on its primary key with `==`
    /// goes through the hash index; everything else is a full scan.
    fn collect_matches(
        &mut self,
        rel: &Relation,
        field_idx: usize,
        op: CompareOp,
        value: &str,
    ) -> Result<Vec<(BlockIdT, SlotIdT, Vec<u8>)>, EngineError> {
        if rel.is_fixed && field_idx == 0 && op == CompareOp::Eq {
            if let Some(index) = self.indices.get(&rel.name) {
                let hits = index.search(value);
                return self.verify_index_hits(rel, value, hits);
            }
        }

        let field_type = rel.fields[field_idx].field_type;
        let predicate = Predicate { op, value };
        let mut matches = Vec::new();

        for &block in &rel.blocks {
            let mut guard = self.buffer.fetch(block)?;
            let result = if rel.is_fixed {
                match_fixed_page(&FixedPage::new(&mut guard), rel, field_idx, field_type, &predicate)
            } else {
                match_slotted_page(&SlottedPage::new(&mut guard), rel, field_idx, field_type, &predicate)
            };
            match result {
                Ok(mut found) => {
                    matches.extend(found.drain(..).map(|(slot, bytes)| (block, slot, bytes)));
                }
                Err(e) => warn!(block, error = %e, "skipping invalid page"),
            }
        }
        Ok(matches)
    }

    /// Resolve index hits back into live records, dropping entries whose
    /// slot has been freed or whose key no longer matches.
    fn verify_index_hits(
        &mut self,
        rel: &Relation,
        value: &str,
        hits: Vec<(BlockIdT, SlotIdT)>,
    ) -> Result<Vec<(BlockIdT, SlotIdT, Vec<u8>)>, EngineError> {
        let key_width = rel.fields[0].size.max(0) as usize;
        let mut matches = Vec::new();
        for (block, slot) in hits {
            let mut guard = self.buffer.fetch(block)?;
            let page = FixedPage::new(&mut guard);
            let bytes = match resolve_hit(&page, slot) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    warn!(block, slot, error = %e, "skipping invalid page behind index hit");
                    continue;
                }
            };
            if String::from_utf8_lossy(&bytes[..key_width.min(bytes.len())]).trim() != value.trim()
            {
                continue;
            }
            matches.push((block, slot, bytes));
        }
        Ok(matches)
    }

    /// Materialize every record matching `field OP value` into `output`
    /// (created or replaced, same schema). Returns the match count.
    pub fn select_where(
        &mut self,
        relation: &str,
        field: &str,
        op: CompareOp,
        value: &str,
        output: &str,
    ) -> Result<usize, EngineError> {
        let rel = self.relation(relation)?.clone();
        let field_idx = self.field_index(&rel, field)?;
        let matches = self.collect_matches(&rel, field_idx, op, value)?;

        self.create_relation(output, rel.is_fixed, rel.fields.clone())?;
        let count = matches.len();
        for (_, _, bytes) in matches {
            self.insert_record(output, bytes)?;
        }
        Ok(count)
    }

    /// Delete every record matching `field OP value`. Fixed relations push
    /// freed slots on the page free stack and drop the index entries;
    /// slotted relations tombstone and compact each touched page once.
    pub fn delete_where(
        &mut self,
        relation: &str,
        field: &str,
        op: CompareOp,
        value: &str,
    ) -> Result<usize, EngineError> {
        let rel = self.relation(relation)?.clone();
        let field_idx = self.field_index(&rel, field)?;
        let matches = self.collect_matches(&rel, field_idx, op, value)?;

        let key_width = rel.fields[0].size.max(0) as usize;
        let mut touched = BTreeSet::new();
        for (block, slot, bytes) in &matches {
            let mut guard = self.buffer.fetch(*block)?;
            if rel.is_fixed {
                let mut page = FixedPage::new(&mut guard);
                page.delete(*slot)?;
                guard.mark_dirty();
                drop(guard);
                if let Some(index) = self.indices.get_mut(&rel.name) {
                    index.remove(&self.disk, &bytes[..key_width.min(bytes.len())], *block, *slot)?;
                }
            } else {
                let mut page = SlottedPage::new(&mut guard);
                page.delete(*slot)?;
                guard.mark_dirty();
                touched.insert(*block);
            }
        }

        self.compact_blocks(&touched)?;
        Ok(matches.len())
    }

    /// Rewrite every record whose `match_field` equals `match_value` with
    /// the new values. Fixed records are rewritten in place (maintaining
    /// the index when the key changes); variable records are tombstoned and
    /// reinserted, then the touched pages compacted.
    pub fn modify(
        &mut self,
        relation: &str,
        match_field: &str,
        match_value: &str,
        new_values: &[String],
    ) -> Result<usize, EngineError> {
        let rel = self.relation(relation)?.clone();
        let field_idx = self.field_index(&rel, match_field)?;
        let matches = self.collect_matches(&rel, field_idx, CompareOp::Eq, match_value)?;
        if matches.is_empty() {
            return Ok(0);
        }

        if rel.is_fixed {
            let record = record::encode_fixed(&rel.fields, new_values, Overflow::Reject)?;
            let key_width = rel.fields[0].size.max(0) as usize;
            for (block, slot, old) in &matches {
                {
                    let mut guard = self.buffer.fetch(*block)?;
                    let mut page = FixedPage::new(&mut guard);
                    page.overwrite(*slot, &record)?;
                    guard.mark_dirty();
                }
                if let Some(index) = self.indices.get_mut(&rel.name) {
                    let old_key = &old[..key_width.min(old.len())];
                    let new_key = &record[..key_width];
                    if old_key != new_key {
                        index.remove(&self.disk, old_key, *block, *slot)?;
                        let allocated =
                            index.insert(&self.disk, &mut self.bitmap, new_key, *block, *slot)?;
                        if allocated {
                            self.bitmap.save(&self.disk)?;
                        }
                    }
                }
            }
        } else {
            let record = record::encode_var(&rel.fields, new_values)?;
            let mut touched = BTreeSet::new();
            for (block, slot, _) in &matches {
                let mut guard = self.buffer.fetch(*block)?;
                let mut page = SlottedPage::new(&mut guard);
                page.delete(*slot)?;
                guard.mark_dirty();
                touched.insert(*block);
            }
            self.compact_blocks(&touched)?;
            for _ in &matches {
                self.insert_record(relation, record.clone())?;
            }
        }
        Ok(matches.len())
    }

    /// Create (or replace) a relation from a CSV file: line 1 holds
    /// `<type> <size>` tokens, line 2 the field names, the rest records.
    /// Returns the number of records loaded.
    pub fn create_relation_from_csv(
        &mut self,
        name: &str,
        path: &Path,
        is_fixed: bool,
    ) -> Result<usize, EngineError> {
        let mut records = csv_reader(path)?.into_records();

        let type_row = records
            .next()
            .ok_or_else(|| EngineError::InvalidArgument("CSV file is empty".to_string()))??;
        let mut types = Vec::new();
        for token in type_row.iter() {
            types.push(parse_type_token(token)?);
        }

        let name_row = records.next().ok_or_else(|| {
            EngineError::InvalidArgument("CSV has no field-name line".to_string())
        })??;
        if name_row.len() != types.len() {
            return Err(EngineError::InvalidArgument(
                "CSV field names and types disagree".to_string(),
            ));
        }

        let fields: Vec<Field> = name_row
            .iter()
            .zip(&types)
            .map(|(field_name, &(field_type, size))| {
                Field::new(field_name, field_type, if is_fixed { size } else { -1 })
            })
            .collect();
        let field_count = fields.len();
        self.create_relation(name, is_fixed, fields)?;

        let mut inserted = 0;
        for row in records {
            let row = row?;
            if row.iter().all(str::is_empty) {
                continue;
            }
            if row.len() != field_count {
                warn!(line = row.position().map(|p| p.line()), "CSV row has the wrong field count, skipped");
                continue;
            }
            let values: Vec<String> = row.iter().map(str::to_string).collect();
            self.insert_with_overflow(name, &values, Overflow::Truncate)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Append up to `limit` records from a CSV file into an existing
    /// relation, skipping the two header lines.
    pub fn insert_n_from_csv(
        &mut self,
        name: &str,
        path: &Path,
        limit: usize,
    ) -> Result<usize, EngineError> {
        let field_count = self.relation(name)?.fields.len();
        let mut records = csv_reader(path)?.into_records();

        for _ in 0..2 {
            records.next().ok_or_else(|| {
                EngineError::InvalidArgument("CSV is missing its header lines".to_string())
            })??;
        }

        let mut inserted = 0;
        for row in records {
            if inserted >= limit {
                break;
            }
            let row = row?;
            if row.iter().all(str::is_empty) {
                continue;
            }
            if row.len() != field_count {
                warn!(line = row.position().map(|p| p.line()), "CSV row has the wrong field count, skipped");
                continue;
            }
            let values: Vec<String> = row.iter().map(str::to_string).collect();
            self.insert_with_overflow(name, &values, Overflow::Truncate)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Per-block usage of a relation, for `rel_block_info`.
    pub fn relation_block_info(&mut self, name: &str) -> Result<Vec<BlockUsage>, EngineError> {
        let rel = self.relation(name)?.clone();
        let block_size = self.disk.block_size();
        let mut usage = Vec::with_capacity(rel.blocks.len());
        for &block in &rel.blocks {
            let used_bytes = self.block_used_bytes(block, rel.is_fixed)?;
            usage.push(BlockUsage {
                block,
                address: self.disk.position_of(block)?,
                used_bytes,
                block_size,
            });
        }
        Ok(usage)
    }

    /// Disk-wide accounting, for `disk_cap`.
    pub fn disk_capacity(&mut self) -> Result<CapacityReport, EngineError> {
        let total_blocks = self.bitmap.total_blocks();
        let free_blocks = self.bitmap.free_blocks();

        let data: Vec<(bool, Vec<BlockIdT>)> = self
            .catalog
            .iter()
            .map(|rel| (rel.is_fixed, rel.blocks.clone()))
            .collect();

        let mut data_blocks = 0;
        let mut data_bytes = 0;
        for (is_fixed, blocks) in data {
            for block in blocks {
                data_blocks += 1;
                match self.block_used_bytes(block, is_fixed) {
                    Ok(bytes) => data_bytes += bytes,
                    Err(e) => warn!(block, error = %e, "skipping block in capacity report"),
                }
            }
        }

        Ok(CapacityReport {
            total_blocks,
            block_size: self.disk.block_size(),
            free_blocks,
            used_blocks: total_blocks - free_blocks,
            data_blocks,
            data_bytes,
        })
    }

    fn block_used_bytes(&mut self, block: BlockIdT, is_fixed: bool) -> Result<usize, EngineError> {
        let mut guard = self.buffer.fetch(block)?;
        let block_size = guard.len();
        if is_fixed {
            let page = FixedPage::new(&mut guard);
            Ok(FIXED_HEADER_SIZE + page.record_size()? * page.active_records()? as usize)
        } else {
            let page = SlottedPage::new(&mut guard);
            Ok(SLOTTED_HEADER_SIZE
                + SLOT_ENTRY_SIZE * page.num_records()? as usize
                + (block_size - page.heap_end()?))
        }
    }

    fn relation(&self, name: &str) -> Result<&Relation, EngineError> {
        self.catalog
            .get(name)
            .ok_or_else(|| EngineError::UnknownRelation(name.to_string()))
    }

    fn field_index(&self, rel: &Relation, field: &str) -> Result<usize, EngineError> {
        rel.field_index(field).ok_or_else(|| EngineError::UnknownField {
            relation: rel.name.clone(),
            field: field.to_string(),
        })
    }

    fn allocate_block(&mut self) -> Result<BlockIdT, EngineError> {
        let block = self.bitmap.first_free().ok_or(EngineError::OutOfSpace)?;
        self.bitmap.set(block, true);
        Ok(block)
    }

    /// Record a freshly allocated data block in the catalog and persist
    /// both maps.
    fn append_block(&mut self, relation: &str, block: BlockIdT) -> Result<(), EngineError> {
        let rel = self
            .catalog
            .get_mut(relation)
            .ok_or_else(|| EngineError::UnknownRelation(relation.to_string()))?;
        rel.blocks.push(block);
        self.bitmap.save(&self.disk)?;
        self.catalog.save(&self.disk)?;
        Ok(())
    }

    fn compact_blocks(&mut self, blocks: &BTreeSet<BlockIdT>) -> Result<(), EngineError> {
        for &block in blocks {
            let mut guard = self.buffer.fetch(block)?;
            let mut page = SlottedPage::new(&mut guard);
            page.compact()?;
            guard.mark_dirty();
        }
        Ok(())
    }
}

/// Try the relation's last block first, then the remaining blocks in order.
fn probe_order(blocks: &[BlockIdT]) -> Vec<BlockIdT> {
    let mut order = Vec::with_capacity(blocks.len());
    if let Some((&last, rest)) = blocks.split_last() {
        order.push(last);
        order.extend_from_slice(rest);
    }
    order
}

fn scan_fixed_page(page: &FixedPage<'_>, rel: &Relation) -> Result<Vec<Vec<String>>, EngineError> {
    let page_record_size = page.record_size()?;
    if page_record_size != rel.record_size() {
        return Err(PageError::RecordSizeMismatch {
            record: rel.record_size(),
            page: page_record_size,
        }
        .into());
    }
    let mut rows = Vec::new();
    for slot in page.live_slots()? {
        rows.push(record::decode_fixed(&rel.fields, page.slot_bytes(slot)?));
    }
    Ok(rows)
}

fn scan_slotted_page(
    page: &SlottedPage<'_>,
    rel: &Relation,
) -> Result<Vec<Vec<String>>, EngineError> {
    let mut rows = Vec::new();
    for slot in 0..page.num_records()? {
        let Some(bytes) = page.record_bytes(slot)? else {
            continue;
        };
        match record::decode_var(&rel.fields, bytes) {
            Ok(values) => rows.push(values),
            Err(e) => warn!(slot, error = %e, "skipping undecodable record"),
        }
    }
    Ok(rows)
}

fn match_fixed_page(
    page: &FixedPage<'_>,
    rel: &Relation,
    field_idx: usize,
    field_type: FieldType,
    predicate: &Predicate<'_>,
) -> Result<Vec<(SlotIdT, Vec<u8>)>, EngineError> {
    let page_record_size = page.record_size()?;
    if page_record_size != rel.record_size() {
        return Err(PageError::RecordSizeMismatch {
            record: rel.record_size(),
            page: page_record_size,
        }
        .into());
    }

    let offset = rel.field_offset(field_idx);
    let width = rel.fields[field_idx].size.max(0) as usize;
    let mut found = Vec::new();
    for slot in page.live_slots()? {
        let bytes = page.slot_bytes(slot)?;
        let cell = String::from_utf8_lossy(&bytes[offset..offset + width]);
        if predicate.matches(field_type, cell.trim()) == Some(true) {
            found.push((slot, bytes.to_vec()));
        }
    }
    Ok(found)
}

fn match_slotted_page(
    page: &SlottedPage<'_>,
    rel: &Relation,
    field_idx: usize,
    field_type: FieldType,
    predicate: &Predicate<'_>,
) -> Result<Vec<(SlotIdT, Vec<u8>)>, EngineError> {
    let mut found = Vec::new();
    for slot in 0..page.num_records()? {
        let Some(bytes) = page.record_bytes(slot)? else {
            continue;
        };
        let values = match record::decode_var(&rel.fields, bytes) {
            Ok(values) => values,
            Err(e) => {
                warn!(slot, error = %e, "skipping undecodable record");
                continue;
            }
        };
        if predicate.matches(field_type, &values[field_idx]) == Some(true) {
            found.push((slot, bytes.to_vec()));
        }
    }
    Ok(found)
}

/// Look up one index hit; `None` when the slot has since been freed.
fn resolve_hit(page: &FixedPage<'_>, slot: SlotIdT) -> Result<Option<Vec<u8>>, PageError> {
    if page.deleted_slots()?.contains(&slot) {
        return Ok(None);
    }
    Ok(Some(page.slot_bytes(slot)?.to_vec()))
}

fn csv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, EngineError> {
    Ok(csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?)
}

fn parse_type_token(token: &str) -> Result<(FieldType, i32), EngineError> {
    let mut parts = token.split_whitespace();
    let tag = parts
        .next()
        .ok_or_else(|| EngineError::InvalidArgument("empty CSV type token".to_string()))?;
    let field_type = FieldType::from_tag(tag)
        .ok_or_else(|| EngineError::InvalidArgument(format!("unknown field type '{tag}'")))?;
    let size: i32 = parts
        .next()
        .ok_or_else(|| EngineError::InvalidArgument(format!("type token '{token}' has no size")))?
        .parse()
        .map_err(|_| EngineError::InvalidArgument(format!("bad size in type token '{token}'")))?;
    Ok((field_type, size))
}
