/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::constants::{BlockIdT, CATALOG_BLOCK_ID};
use crate::disk::{DiskError, DiskManager};
use crate::relation::{Field, FieldType, Relation};

use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// The catalog maintains every relation known to the engine and persists
/// them as text in block 0, one stanza per relation:
///
/// ```text
/// <name> (fix|var) <num_fields> <hash_index_block>
/// <field_name> <type> [<size>]      -- size only for fixed relations
/// ...
/// <block_id> <block_id> ...
/// ```
///
/// `hash_index_block` is -1 for relations without an index; a legacy
/// three-token header line is accepted and means the same. Parsing is
/// whitespace-delimited and tolerant: blank lines are skipped and a
/// malformed stanza is dropped with a warning instead of failing the load.
#[derive(Default)]
pub struct Catalog {
    relations: HashMap<String, Relation>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("relation '{0}' already exists")]
    Duplicate(String),

    #[error("relation '{0}' not found")]
    Unknown(String),

    #[error("catalog text does not fit block 0")]
    Full,

    #[error(transparent)]
    Disk(#[from] DiskError),
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Relation> {
        self.relations.get_mut(name)
    }

    pub fn add(&mut self, relation: Relation) -> Result<(), CatalogError> {
        if self.has(&relation.name) {
            return Err(CatalogError::Duplicate(relation.name));
        }
        self.relations.insert(relation.name.clone(), relation);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Relation, CatalogError> {
        self.relations
            .remove(name)
            .ok_or_else(|| CatalogError::Unknown(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Replace the in-memory catalog with the stanzas stored in block 0.
    pub fn load(&mut self, disk: &DiskManager) -> Result<(), CatalogError> {
        let raw = disk.read_block(CATALOG_BLOCK_ID)?;
        let text = String::from_utf8_lossy(&raw);
        let text = text.split('\0').next().unwrap_or("");

        self.relations.clear();
        let mut lines = text.lines();
        while let Some(line) = lines.next() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some(header) = parse_header(line) else {
                warn!(line, "skipping malformed catalog stanza");
                continue;
            };
            let (name, is_fixed, num_fields, hash_index_block) = header;

            let mut fields = Vec::with_capacity(num_fields);
            for _ in 0..num_fields {
                let Some(field_line) = lines.next() else {
                    break;
                };
                match parse_field(field_line, is_fixed) {
                    Some(field) => fields.push(field),
                    None => {
                        warn!(line = field_line, "skipping malformed catalog field");
                    }
                }
            }
            if fields.len() != num_fields {
                warn!(relation = %name, "dropping truncated catalog stanza");
                continue;
            }

            let blocks = match lines.next() {
                Some(line) => line
                    .split_whitespace()
                    .filter_map(|token| token.parse::<BlockIdT>().ok())
                    .collect(),
                None => Vec::new(),
            };

            self.relations.insert(
                name.clone(),
                Relation {
                    name,
                    is_fixed,
                    fields,
                    blocks,
                    hash_index_block,
                },
            );
        }
        Ok(())
    }

    /// Serialize every relation into block 0, zero-padded to the block
    /// size. Fails when the text no longer fits the block.
    pub fn save(&self, disk: &DiskManager) -> Result<(), CatalogError> {
        let mut text = String::new();
        for relation in self.relations.values() {
            render_stanza(&mut text, relation);
        }

        let mut block = vec![0u8; disk.block_size()];
        if text.len() > block.len() {
            return Err(CatalogError::Full);
        }
        block[..text.len()].copy_from_slice(text.as_bytes());
        disk.write_block(CATALOG_BLOCK_ID, &block)?;
        Ok(())
    }
}

fn parse_header(line: &str) -> Option<(String, bool, usize, Option<BlockIdT>)> {
    let mut parts = line.split_whitespace();
    let name = parts.next()?.to_string();
    let is_fixed = match parts.next()? {
        "fix" => true,
        "var" => false,
        _ => return None,
    };
    let num_fields: usize = parts.next()?.parse().ok()?;
    if num_fields == 0 {
        return None;
    }
    // The index pointer is absent in catalogs written before it existed.
    let hash_index_block = match parts.next() {
        Some(token) => {
            let value: i64 = token.parse().ok()?;
            (value >= 0).then_some(value as BlockIdT)
        }
        None => None,
    };
    Some((name, is_fixed, num_fields, hash_index_block))
}

fn parse_field(line: &str, is_fixed: bool) -> Option<Field> {
    let mut parts = line.split_whitespace();
    let name = parts.next()?;
    let field_type = FieldType::from_tag(parts.next()?)?;
    let size = if is_fixed {
        let size: i32 = parts.next()?.parse().ok()?;
        if size <= 0 {
            return None;
        }
        size
    } else {
        -1
    };
    Some(Field::new(name, field_type, size))
}

fn render_stanza(out: &mut String, relation: &Relation) {
    let mode = if relation.is_fixed { "fix" } else { "var" };
    let index_block = relation
        .hash_index_block
        .map_or(-1i64, |block| block as i64);
    out.push_str(&format!(
        "{} {} {} {}\n",
        relation.name,
        mode,
        relation.fields.len(),
        index_block
    ));
    for field in &relation.fields {
        if relation.is_fixed {
            out.push_str(&format!("{} {} {}\n", field.name, field.field_type, field.size));
        } else {
            out.push_str(&format!("{} {}\n", field.name, field.field_type));
        }
    }
    let blocks: Vec<String> = relation.blocks.iter().map(|b| b.to_string()).collect();
    out.push_str(&blocks.join(" "));
    out.push('\n');
}
