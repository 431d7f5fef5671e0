/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use anyhow::Context;
use clap::Parser;
use platterdb::constants::DEFAULT_FRAME_COUNT;
use platterdb::disk::{DiskConfig, DiskManager};
use platterdb::engine::Engine;
use platterdb::shell::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// A pedagogical relational storage engine over a simulated rotating disk.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Root directory of the simulated disk.
    #[arg(long, default_value = "disk")]
    root: PathBuf,

    /// External geometry configuration file (key=value lines). A geometry
    /// that differs from the one stored in the disk root re-creates the
    /// disk destructively.
    #[arg(long, default_value = "disk.cfg")]
    config: PathBuf,

    /// Number of buffer pool frames.
    #[arg(long, default_value_t = DEFAULT_FRAME_COUNT)]
    frames: usize,

    /// Page replacement policy: lru or clock.
    #[arg(long, default_value = "lru")]
    policy: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = DiskConfig::load(&args.config)
        .with_context(|| format!("reading disk configuration {}", args.config.display()))?;
    let algorithm = args
        .policy
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let disk = DiskManager::open(&args.root, config)
        .with_context(|| format!("opening disk at {}", args.root.display()))?;
    let engine = Engine::new(disk, args.frames, algorithm).context("starting engine")?;

    Shell::new(engine).run().context("running shell")?;
    Ok(())
}
