/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use platterdb::buffer::ReplacerAlgorithm;
use platterdb::disk::{DiskConfig, DiskManager};
use platterdb::engine::Engine;
use platterdb::relation::{Field, FieldType};
use tempfile::TempDir;

/// Shared scaffolding for engine-level tests: a small disk in a temporary
/// directory.
pub const TEST_FRAME_COUNT: usize = 8;

pub fn test_config() -> DiskConfig {
    DiskConfig {
        platters: 1,
        tracks: 2,
        sectors: 8,
        block_size: 256,
        blocks_per_sector: 2,
    }
}

pub struct TestContext {
    pub dir: TempDir,
    pub engine: Engine,
}

pub fn setup() -> TestContext {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, TEST_FRAME_COUNT, ReplacerAlgorithm::Lru);
    TestContext { dir, engine }
}

pub fn open_engine(dir: &TempDir, frames: usize, algorithm: ReplacerAlgorithm) -> Engine {
    let disk = DiskManager::open(dir.path().join("disk"), test_config()).unwrap();
    Engine::new(disk, frames, algorithm).unwrap()
}

/// The `emp(id:string 4, name:string 8, age:int 2)` schema used throughout.
pub fn emp_fields() -> Vec<Field> {
    vec![
        Field::new("id", FieldType::Str, 4),
        Field::new("name", FieldType::Str, 8),
        Field::new("age", FieldType::Int, 2),
    ]
}

pub fn note_fields() -> Vec<Field> {
    vec![
        Field::new("id", FieldType::Int, -1),
        Field::new("body", FieldType::Str, -1),
    ]
}

pub fn values(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
