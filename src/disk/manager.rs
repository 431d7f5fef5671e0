/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::constants::{BlockIdT, DISK_CONFIG_FILENAME, SURFACES_PER_PLATTER};
use crate::disk::{DiskConfig, DiskError};

use std::fmt::{self, Formatter};
use std::fs::{self, OpenOptions};
use std::io::prelude::*;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tracing::info;

/// The disk manager simulates a rotating disk over a directory tree. Every
/// platter, surface and track is a directory, every sector a flat file of
/// `blocks_per_sector` blocks:
///
/// ```text
/// <root>/disk.cfg
/// <root>/plato{i}/superficie{j}/pista{k}/sector{m}
/// ```
///
/// Linear block indices map onto the geometry lexicographically over
/// (platter, surface, track, sector, block-within-sector).
pub struct DiskManager {
    root: PathBuf,
    config: DiskConfig,
}

/// Physical location of a block, for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockAddress {
    pub platter: u32,
    pub surface: u32,
    pub track: u32,
    pub sector: u32,
    /// Index of the block within its sector file.
    pub offset: u32,
}

impl fmt::Display for BlockAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "platter {}, surface {}, track {}, sector {}, block-in-sector {}",
            self.platter, self.surface, self.track, self.sector, self.offset
        )
    }
}

impl DiskManager {
    /// Open the disk rooted at `root` with the supplied geometry.
    ///
    /// The geometry persisted in `<root>/disk.cfg` is compared against
    /// `config`; if the file is missing, the values differ, or the directory
    /// hierarchy is incomplete, the root is destroyed and re-created from
    /// scratch. This is destructive by design: a disk whose geometry changed
    /// cannot keep its contents.
    pub fn open(root: impl Into<PathBuf>, config: DiskConfig) -> Result<Self, DiskError> {
        let root = root.into();
        let manager = Self { root, config };

        let internal = manager.root.join(DISK_CONFIG_FILENAME);
        let matches = match DiskConfig::load(&internal) {
            Ok(existing) => existing == config,
            Err(_) => false,
        };

        if !matches || !manager.is_complete() {
            manager.rebuild()?;
        }
        Ok(manager)
    }

    pub fn config(&self) -> &DiskConfig {
        &self.config
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    pub fn total_blocks(&self) -> u32 {
        self.config.total_blocks()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a linear block index to its physical position.
    pub fn position_of(&self, block_id: BlockIdT) -> Result<BlockAddress, DiskError> {
        if block_id >= self.total_blocks() {
            return Err(DiskError::BlockOutOfRange(block_id));
        }
        let cfg = &self.config;
        let per_sector = cfg.blocks_per_sector;
        let per_track = cfg.sectors * per_sector;
        let per_surface = cfg.tracks * per_track;
        let per_platter = SURFACES_PER_PLATTER * per_surface;

        let mut rest = block_id;
        let platter = rest / per_platter;
        rest %= per_platter;
        let surface = rest / per_surface;
        rest %= per_surface;
        let track = rest / per_track;
        rest %= per_track;
        let sector = rest / per_sector;
        let offset = rest % per_sector;

        Ok(BlockAddress {
            platter,
            surface,
            track,
            sector,
            offset,
        })
    }

    /// Read a full block into a freshly allocated buffer.
    pub fn read_block(&self, block_id: BlockIdT) -> Result<Vec<u8>, DiskError> {
        let pos = self.position_of(block_id)?;
        let path = self.sector_path(&pos);

        let mut file =
            fs::File::open(&path).map_err(|source| DiskError::Sector { path: path.clone(), source })?;
        let mut data = vec![0u8; self.config.block_size];
        file.seek(SeekFrom::Start(
            pos.offset as u64 * self.config.block_size as u64,
        ))
        .map_err(|source| DiskError::Sector { path: path.clone(), source })?;
        file.read_exact(&mut data)
            .map_err(|source| DiskError::Sector { path, source })?;
        Ok(data)
    }

    /// Write a full block. The payload must be exactly one block long.
    pub fn write_block(&self, block_id: BlockIdT, data: &[u8]) -> Result<(), DiskError> {
        if data.len() != self.config.block_size {
            return Err(DiskError::BadPayloadSize {
                expected: self.config.block_size,
                actual: data.len(),
            });
        }
        let pos = self.position_of(block_id)?;
        let path = self.sector_path(&pos);

        let mut file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|source| DiskError::Sector { path: path.clone(), source })?;
        file.seek(SeekFrom::Start(
            pos.offset as u64 * self.config.block_size as u64,
        ))
        .map_err(|source| DiskError::Sector { path: path.clone(), source })?;
        file.write_all(data)
            .map_err(|source| DiskError::Sector { path: path.clone(), source })?;
        file.flush()
            .map_err(|source| DiskError::Sector { path, source })?;
        Ok(())
    }

    /// Destroy the root directory and create a pristine hierarchy of
    /// zero-filled sector files, then persist the geometry.
    pub fn rebuild(&self) -> Result<(), DiskError> {
        info!(root = %self.root.display(), "rebuilding disk structure");

        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        fs::create_dir_all(&self.root)?;

        let cfg = &self.config;
        let zeros = vec![0u8; cfg.sector_file_size()];
        for platter in 0..cfg.platters {
            for surface in 0..SURFACES_PER_PLATTER {
                for track in 0..cfg.tracks {
                    let dir = self
                        .root
                        .join(format!("plato{platter}"))
                        .join(format!("superficie{surface}"))
                        .join(format!("pista{track}"));
                    fs::create_dir_all(&dir)?;
                    for sector in 0..cfg.sectors {
                        fs::write(dir.join(format!("sector{sector}")), &zeros)?;
                    }
                }
            }
        }

        self.config.save(&self.root.join(DISK_CONFIG_FILENAME))
    }

    /// Cheap completeness probe: the last sector file of the hierarchy
    /// exists and has the right length.
    fn is_complete(&self) -> bool {
        let cfg = &self.config;
        let pos = BlockAddress {
            platter: cfg.platters - 1,
            surface: SURFACES_PER_PLATTER - 1,
            track: cfg.tracks - 1,
            sector: cfg.sectors - 1,
            offset: 0,
        };
        match fs::metadata(self.sector_path(&pos)) {
            Ok(meta) => meta.len() == cfg.sector_file_size() as u64,
            Err(_) => false,
        }
    }

    fn sector_path(&self, pos: &BlockAddress) -> PathBuf {
        self.root
            .join(format!("plato{}", pos.platter))
            .join(format!("superficie{}", pos.surface))
            .join(format!("pista{}", pos.track))
            .join(format!("sector{}", pos.sector))
    }
}
