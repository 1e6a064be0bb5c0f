//! Silicon model for Broadcom / Cypress FullMAC radios (BCM43xx, CYW43xx).
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the silicon: backplane register offsets, wrapper-register
//! bits, core identifiers, the EROM descriptor format and the per-chip
//! tables the bring-up code consults.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Chip-common, agent wrapper, SOCRAM/SYSMEM and ARM CR4 registers |
//! | [`cores`] | Backplane core ids (CPU variants, memories, 802.11 MAC, PMU) |
//! | [`erom`] | EROM descriptor layout, decode and encode helpers |
//! | [`chipid`] | Chip ids, chip-id register fields, RAM base and retention tables |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod chipid;
pub mod cores;
pub mod erom;
pub mod regs;
