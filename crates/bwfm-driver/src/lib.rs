//! Chip bring-up and control core for Broadcom / Cypress FullMAC radios.
//!
//! The driver sits between a bus transport (SDIO, PCIe) and a station
//! engine. It identifies the chip from its enumeration ROM, halts and
//! releases the on-chip CPU through the AI wrapper registers, sizes RAM,
//! talks to the running firmware over BCDC and turns firmware events into
//! station state changes and synthesized beacons.
//!
//! # Layering
//!
//! ```text
//! Net80211 (station engine)
//!    ↑ upcalls                 ↓ set_key / new_state (queued)
//! BwfmDevice ── CommandQueue ── Worker thread
//!    │ FwVar  ("mpc", "wsec", "escan", …)
//!    │ Bcdc   (16-byte header, request ids, deadline)
//!    │ Chip   (EROM registry, AI wrapper, RAM sizing)
//! Bus  (read32 / write32 / txctl / rxctl)
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use bwfm_driver::backends::SimBus;
//! use bwfm_driver::{BwfmDevice, DriverConfig, RecordingStation};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dev = BwfmDevice::new(SimBus::bcm4345(), RecordingStation::default(), DriverConfig::from_env());
//! let chip = dev.chip_attach()?;
//! println!("{} with {} KiB RAM", chip.info().name, chip.info().ram_size / 1024);
//! dev.attach()?;
//! dev.init()?;
//! dev.run_pending();
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`bus`] | Transport trait |
//! | [`erom`] | Enumeration ROM scanner |
//! | [`chip`] | Core registry, wrapper control, CPU strategies, RAM sizing |
//! | [`bcdc`] | Control protocol framing and request/response matching |
//! | [`fwvar`] | Typed firmware command and variable access |
//! | [`wire`] | Firmware parameter blocks (join, escan, keys, event mask) |
//! | [`event`] | Event frame and escan result parsing, beacon synthesis |
//! | [`cmdq`] | Host command ring and worker thread |
//! | [`device`] | Lifecycle, station operations, receive dispatch |
//! | [`backends`] | Simulated chip |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
pub mod bcdc;
pub mod bus;
pub mod chip;
pub mod cmdq;
pub mod config;
pub mod device;
pub mod erom;
mod error;
pub mod event;
pub mod fwvar;
pub mod net80211;
pub mod wire;

pub use bcdc::{Bcdc, Proto};
pub use bus::Bus;
pub use chip::{Chip, ChipInfo, Core, CoreControl, CpuArch, RamSize};
pub use cmdq::{CommandQueue, HostCmd, Worker};
pub use config::DriverConfig;
pub use device::{BwfmDevice, Channel, FirmwareInfo};
pub use error::{BwfmError, Result};
pub use fwvar::FwVar;
pub use net80211::{KeyInfo, Net80211, RecordingStation, StationState};

/// Common imports for driver users.
pub mod prelude {
    pub use crate::{
        Bus, BwfmDevice, BwfmError, Chip, DriverConfig, FwVar, KeyInfo, Net80211, Result,
        StationState,
    };
}
