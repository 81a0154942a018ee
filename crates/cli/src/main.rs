// NibSnap - 4-bit Microcontroller Snapshot Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nibsnap_config::SnapshotProfile;
use nibsnap_core::diag::StateDump;
use nibsnap_core::machine::RamMachine;
use nibsnap_core::session::SessionStore;
use nibsnap_core::slots::SlotTemplate;
use nibsnap_core::storage::FileStorage;
use nibsnap_core::{Format, Geometry, SnapshotRecord, TickBase, Timestamps};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

const EXIT_CODEC_ERROR: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "NibSnap snapshot tool", long_about = None)]
struct Cli {
    /// Path to the snapshot profile (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the registers and memory map stored in a snapshot
    Inspect {
        file: PathBuf,

        /// Emit the parsed record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-encode a snapshot in another format
    Convert {
        input: PathBuf,
        output: PathBuf,

        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Tick counter to resolve Compact timer deltas against
        #[arg(long)]
        tick_base: Option<u32>,
    },
    /// Write a zeroed machine state into the next free slot
    New {
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Show the next free and most recent slot
    Slots {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Compact,
    Legacy,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Compact => Format::Compact,
            FormatArg::Legacy => Format::Legacy,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout is reserved for command output
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let profile = match load_profile(cli.config.as_deref()) {
        Ok(p) => p,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    match run(cli.command, &profile) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_CODEC_ERROR)
        }
    }
}

fn load_profile(path: Option<&Path>) -> Result<SnapshotProfile> {
    match path {
        Some(p) => {
            info!("Loading snapshot profile: {:?}", p);
            SnapshotProfile::from_file(p)
        }
        None => Ok(SnapshotProfile::default()),
    }
}

fn session(profile: &SnapshotProfile, dir: Option<&Path>) -> Result<SessionStore<FileStorage>> {
    let mut slots =
        SlotTemplate::from_config(&profile.slots).context("Invalid slot template in profile")?;
    if let Some(dir) = dir {
        slots = slots.in_dir(dir);
    }
    Ok(SessionStore::with_slots(FileStorage, slots))
}

fn run(command: Command, profile: &SnapshotProfile) -> Result<()> {
    let geometry = Geometry::from_config(&profile.geometry);
    let default_format = Format::from(profile.save.format);

    match command {
        Command::Inspect { file, json } => inspect(&file, json, geometry, profile),
        Command::Convert {
            input,
            output,
            format,
            tick_base,
        } => {
            let store = session(profile, None)?;
            let format = format.map_or(default_format, Format::from);
            let record = store
                .inspect(&input, geometry)
                .with_context(|| format!("Failed to load {:?}", input))?;
            let base_tick = base_tick(&record, tick_base, profile);
            let converted = record
                .convert(format, base_tick)
                .with_context(|| format!("Cannot convert {:?} to {:?}", input, format))?;
            store
                .save_record(&output, &converted)
                .with_context(|| format!("Failed to save {:?}", output))?;
            println!("{:?} -> {:?}: {}", record.format(), format, output.display());
            Ok(())
        }
        Command::New { format, dir } => {
            let store = session(profile, dir.as_deref())?;
            let machine = RamMachine::new(geometry);
            let path = store
                .save_next(&machine, format.map_or(default_format, Format::from))
                .context("Failed to write new snapshot")?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Slots { dir } => {
            let store = session(profile, dir.as_deref())?;
            println!(
                "next free: {}",
                store.slots.path_for(store.next_free()).display()
            );
            match store.most_recent() {
                Some(i) => println!("most recent: {}", store.slots.path_for(i).display()),
                None => println!("most recent: none"),
            }
            Ok(())
        }
    }
}

fn inspect(file: &Path, json: bool, geometry: Geometry, profile: &SnapshotProfile) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    let record = SnapshotRecord::decode(bytes.as_slice(), geometry)
        .with_context(|| format!("Failed to parse {:?}", file))?;

    if json {
        let digest = format!("{:x}", Sha256::digest(&bytes));
        let report = serde_json::json!({
            "path": file,
            "format": record.format(),
            "size": bytes.len(),
            "sha256": digest,
            "record": record,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut machine = RamMachine::new(geometry);
    let base_tick = base_tick(&record, None, profile);
    record.apply(&mut machine, TickBase::Reset(base_tick))?;
    println!("format: {:?} ({} bytes)", record.format(), bytes.len());
    if let Timestamps::Relative {
        clk_delta,
        prog_delta,
    } = record.timestamps
    {
        println!("clk delta:  0x{:08X}", clk_delta);
        println!("prog delta: 0x{:08X}", prog_delta);
    }
    print!("{}", StateDump(&machine));
    Ok(())
}

/// Tick counter that Compact timer deltas resolve against when no machine is running.
///
/// An explicit value wins over a `reset` policy in the profile. Otherwise the
/// smallest base that keeps every timestamp from wrapping is used.
fn base_tick(record: &SnapshotRecord, explicit: Option<u32>, profile: &SnapshotProfile) -> u32 {
    match explicit.map_or(TickBase::from(profile.load.tick_base), TickBase::Reset) {
        TickBase::Reset(t) => t,
        TickBase::Current => record.min_base_tick(),
    }
}
