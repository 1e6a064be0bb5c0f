//! `bwfm`: command-line front end for the FullMAC bring-up core.
//!
//! ```text
//! USAGE:
//!   bwfm attach [--chip 4345|43430]   Identify a simulated chip, list cores and RAM
//!   bwfm probe  [--chip 4345|43430]   Full bring-up: chip, firmware attach, init
//!   bwfm erom <file>                  Decode a raw little-endian EROM dump
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `warn`).

use anyhow::{bail, Context, Result};
use bwfm_chip::cores;
use bwfm_driver::backends::SimBus;
use bwfm_driver::device::{format_mac, Band};
use bwfm_driver::erom::scan_erom_at;
use bwfm_driver::{BwfmDevice, Channel, Chip, Core, DriverConfig, RecordingStation};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Backplane address a dump is mapped at before scanning.
const DUMP_BASE: u32 = 0x1810_0000;

#[derive(Parser)]
#[command(name = "bwfm", about = "Broadcom/Cypress FullMAC bring-up tool", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum SimChip {
    /// BCM4345, ARM CR4 with TCM.
    #[value(name = "4345")]
    Bcm4345,
    /// BCM43430, ARM CM3 with SOCRAM.
    #[value(name = "43430")]
    Bcm43430,
}

impl SimChip {
    fn bus(self) -> SimBus {
        match self {
            Self::Bcm4345 => SimBus::bcm4345(),
            Self::Bcm43430 => SimBus::bcm43430(),
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Identify the chip, list its cores and size its RAM.
    Attach {
        /// Simulated part.
        #[arg(long, value_enum, default_value = "4345")]
        chip: SimChip,
    },
    /// Bring the chip and firmware all the way up and start scanning.
    Probe {
        /// Simulated part.
        #[arg(long, value_enum, default_value = "4345")]
        chip: SimChip,
    },
    /// Decode an EROM dump (raw little-endian 32-bit words).
    Erom {
        /// Dump file.
        file: std::path::PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Attach { chip } => cmd_attach(chip)?,
        Cmd::Probe { chip } => cmd_probe(chip)?,
        Cmd::Erom { file } => cmd_erom(&file)?,
    }

    Ok(())
}

fn cmd_attach(sim: SimChip) -> Result<()> {
    let mut bus = sim.bus();
    let chip = Chip::attach(&mut bus).context("chip attach failed")?;
    print_chip(&chip);
    Ok(())
}

fn cmd_probe(sim: SimChip) -> Result<()> {
    let mut dev = BwfmDevice::new(sim.bus(), RecordingStation::default(), DriverConfig::from_env());

    let chip = dev.chip_attach().context("chip attach failed")?;
    print_chip(chip);

    info!("chip up, querying firmware");
    let fw = dev.attach().context("firmware attach failed")?;
    println!();
    println!("Firmware");
    println!("  MAC      {}", format_mac(&fw.mac));
    println!("  io type  {}", fw.io_type);
    println!("  HT/VHT   {}/{}", fw.nmode, fw.vhtmode);
    let (g2, g5) = band_counts(&fw.channels);
    println!("  channels {g2} x 2 GHz, {g5} x 5 GHz");

    info!("initialising interface");
    dev.init().context("init failed")?;
    let ran = dev.run_pending();
    println!();
    println!("Station  {} ({ran} queued commands run)", dev.state());
    dev.stop().context("stop failed")?;
    dev.run_pending();
    Ok(())
}

/// Channel counts as (2 GHz, 5 GHz).
fn band_counts(channels: &[Channel]) -> (usize, usize) {
    let g2 = channels.iter().filter(|c| c.band == Band::Ghz2).count();
    (g2, channels.len() - g2)
}

fn decode_words(raw: &[u8]) -> Result<Vec<u32>> {
    if raw.len() % 4 != 0 {
        bail!("{} bytes is not a whole number of words", raw.len());
    }
    Ok(raw
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}

fn cmd_erom(path: &std::path::Path) -> Result<()> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let words = decode_words(&raw).with_context(|| path.display().to_string())?;
    info!(words = words.len(), base = DUMP_BASE, "scanning EROM dump");

    let found = scan_dump(&words)?;

    println!("{} cores in {} words", found.len(), words.len());
    print_cores(&found);
    Ok(())
}

fn scan_dump(words: &[u32]) -> Result<Vec<Core>> {
    let mut bus = SimBus::new();
    bus.load_erom(DUMP_BASE, words);
    scan_erom_at(&mut bus, DUMP_BASE).context("EROM scan failed")
}

fn print_chip(chip: &Chip) {
    let info = chip.info();
    println!("Chip     BCM{} rev {} ({})", info.name, info.rev, info.interconnect);
    if let Some(cpu) = chip.cpu_arch() {
        println!("CPU      {cpu}");
    }
    println!(
        "RAM      {} KiB at {:#x}, {} KiB retained",
        info.ram_size / 1024,
        info.ram_base,
        info.sr_size / 1024
    );
    println!("PMU      rev {}", info.pmu_rev);
    println!();
    print_cores(chip.cores());
}

fn print_cores(found: &[Core]) {
    for core in found {
        let tag = if cores::is_cpu(core.id) { " *" } else { "" };
        println!("  {core}{tag}");
    }
}
