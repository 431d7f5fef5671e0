/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::constants::SURFACES_PER_PLATTER;
use crate::disk::DiskError;

use std::fmt::{self, Formatter};
use std::fs;
use std::path::Path;

/// Geometry of a simulated disk.
///
/// A disk is a stack of platters with two recording surfaces each; every
/// surface holds `tracks` tracks of `sectors` sectors, and every sector file
/// packs `blocks_per_sector` blocks of `block_size` bytes.
///
/// The configuration is persisted inside the disk root as newline-separated
/// `key=value` pairs. The keys are the historical on-disk names and must not
/// be changed, or existing disk directories will stop loading:
///
/// ```text
/// platos=2
/// pistas=16
/// sectores=32
/// block_size=512
/// blocks_per_sector=2
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiskConfig {
    pub platters: u32,
    pub tracks: u32,
    pub sectors: u32,
    pub block_size: usize,
    pub blocks_per_sector: u32,
}

impl DiskConfig {
    /// Total number of addressable blocks for this geometry.
    pub fn total_blocks(&self) -> u32 {
        self.platters * SURFACES_PER_PLATTER * self.tracks * self.sectors * self.blocks_per_sector
    }

    /// Size of one sector file in bytes.
    pub fn sector_file_size(&self) -> usize {
        self.blocks_per_sector as usize * self.block_size
    }

    /// Parse a configuration from `key=value` lines. Lines without an `=`
    /// are skipped; unknown keys are skipped; a missing or non-numeric value
    /// for a known key is an error.
    pub fn parse(text: &str) -> Result<Self, DiskError> {
        let mut platters = None;
        let mut tracks = None;
        let mut sectors = None;
        let mut block_size = None;
        let mut blocks_per_sector = None;

        for line in text.lines() {
            let line = line.trim();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value: u64 = value
                .trim()
                .parse()
                .map_err(|_| DiskError::Config(format!("bad value for '{key}': '{value}'")))?;
            if value == 0 {
                return Err(DiskError::Config(format!("'{key}' must be positive")));
            }
            match key.trim() {
                "platos" => platters = Some(value as u32),
                "pistas" => tracks = Some(value as u32),
                "sectores" => sectors = Some(value as u32),
                "block_size" => block_size = Some(value as usize),
                "blocks_per_sector" => blocks_per_sector = Some(value as u32),
                _ => {}
            }
        }

        let missing = |key: &str| DiskError::Config(format!("missing key '{key}'"));
        Ok(Self {
            platters: platters.ok_or_else(|| missing("platos"))?,
            tracks: tracks.ok_or_else(|| missing("pistas"))?,
            sectors: sectors.ok_or_else(|| missing("sectores"))?,
            block_size: block_size.ok_or_else(|| missing("block_size"))?,
            blocks_per_sector: blocks_per_sector.ok_or_else(|| missing("blocks_per_sector"))?,
        })
    }

    /// Load a configuration file from `path`.
    pub fn load(path: &Path) -> Result<Self, DiskError> {
        let text = fs::read_to_string(path)
            .map_err(|e| DiskError::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&text)
    }

    /// Write the configuration to `path` in the `key=value` format.
    pub fn save(&self, path: &Path) -> Result<(), DiskError> {
        fs::write(path, self.to_string())?;
        Ok(())
    }
}

impl fmt::Display for DiskConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "platos={}", self.platters)?;
        writeln!(f, "pistas={}", self.tracks)?;
        writeln!(f, "sectores={}", self.sectors)?;
        writeln!(f, "block_size={}", self.block_size)?;
        writeln!(f, "blocks_per_sector={}", self.blocks_per_sector)
    }
}
