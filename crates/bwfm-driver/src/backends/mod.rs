//! Bus implementations
//!
//! Real transports (SDIO, PCIe) live with their host stacks and plug in
//! through [`Bus`](crate::bus::Bus). This crate ships one backend:
//!
//! - **Sim**: in-process chip model with a scripted firmware, used by the
//!   CLI demo and by every integration test.

pub mod sim;

pub use sim::{EromBuilder, FwRequest, SimBus, SimFirmware};
