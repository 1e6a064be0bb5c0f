//! RAM geometry
//!
//! Three memory controllers report their size three different ways:
//!
//! | Controller | Source |
//! |------------|--------|
//! | SOCRAM rev <= 7, rev 12 | bank count, bank size and lone bank size packed in coreinfo |
//! | SOCRAM newer, SYSMEM | per-bank info selected through the bank index register |
//! | ARM CR4 TCM | A/B bank counts in CAP, per-bank info via the CR4 bank index |

use super::{Chip, Core};
use crate::bus::Bus;
use crate::error::Result;
use bwfm_chip::chipid;
use bwfm_chip::regs::{
    armcr4, bankidx, bankinfo, coreinfo, ARMCR4_BANKIDX, ARMCR4_BANKINFO, ARMCR4_CAP,
    SOCRAM_BANKIDX, SOCRAM_BANKINFO, SOCRAM_COREINFO,
};
use tracing::debug;

/// Total and retention RAM in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RamSize {
    /// Total RAM.
    pub size: u32,
    /// RAM kept across save/restore.
    pub retained: u32,
}

impl Chip {
    /// Size a SOCRAM core, resetting it first if it is down.
    ///
    /// # Errors
    ///
    /// Returns error if a bus access fails.
    pub fn socram_ramsize(&self, bus: &mut dyn Bus, core: &Core) -> Result<RamSize> {
        if !self.is_up(bus, core)? {
            self.reset(bus, core, 0, 0, 0)?;
        }

        let info = bus.read32(core.base + SOCRAM_COREINFO)?;
        let banks = (info & coreinfo::SRNB_MASK) >> coreinfo::SRNB_SHIFT;

        let mut ram = if core.rev <= 7 || core.rev == 12 {
            RamSize {
                size: socram_direct_size(info),
                retained: 0,
            }
        } else {
            enumerate_banks(bus, core, banks)?
        };

        if let Some(retained) = chipid::retention_override(self.info.chip, self.info.rev) {
            ram.retained = retained;
        }
        debug!(core = core.name(), rev = core.rev, banks, ?ram, "socram sized");
        Ok(ram)
    }

    /// Size a SYSMEM core, resetting it first if it is down.
    ///
    /// # Errors
    ///
    /// Returns error if a bus access fails.
    pub fn sysmem_ramsize(&self, bus: &mut dyn Bus, core: &Core) -> Result<RamSize> {
        if !self.is_up(bus, core)? {
            self.reset(bus, core, 0, 0, 0)?;
        }

        let info = bus.read32(core.base + SOCRAM_COREINFO)?;
        let banks = (info & coreinfo::SRNB_MASK) >> coreinfo::SRNB_SHIFT;
        let ram = enumerate_banks(bus, core, banks)?;
        debug!(core = core.name(), banks, ?ram, "sysmem sized");
        Ok(ram)
    }

    /// Size the CR4 tightly coupled memory.
    ///
    /// # Errors
    ///
    /// Returns error if a bus access fails.
    pub fn tcm_ramsize(&self, bus: &mut dyn Bus, core: &Core) -> Result<RamSize> {
        let cap = bus.read32(core.base + ARMCR4_CAP)?;
        let nab = (cap & armcr4::TCBANB_MASK) >> armcr4::TCBANB_SHIFT;
        let nbb = (cap & armcr4::TCBBNB_MASK) >> armcr4::TCBBNB_SHIFT;

        let mut size = 0u32;
        for idx in 0..nab + nbb {
            bus.write32(core.base + ARMCR4_BANKIDX, idx)?;
            let info = bus.read32(core.base + ARMCR4_BANKINFO)?;
            size = size.wrapping_add(
                ((info & armcr4::BANKINFO_BSZ_MASK) + 1) * armcr4::BANKINFO_BSZ_MULT,
            );
        }
        debug!(nab, nbb, size, "tcm sized");
        Ok(RamSize { size, retained: 0 })
    }
}

/// Old-style SOCRAM size from the coreinfo word alone.
///
/// `banks` full banks of `1 << (srbsz + 14)` bytes, except that a non-zero
/// lone-standalone-bank field replaces one of them with a bank of
/// `1 << (lss - 1 + 14)` bytes.
pub fn socram_direct_size(info: u32) -> u32 {
    let mut banks = (info & coreinfo::SRNB_MASK) >> coreinfo::SRNB_SHIFT;
    let bank_size = info & coreinfo::SRBSZ_MASK;
    let lss = (info & coreinfo::LSS_MASK) >> coreinfo::LSS_SHIFT;
    if lss != 0 {
        banks = banks.saturating_sub(1);
    }
    let mut size = banks.wrapping_mul(1 << (bank_size + coreinfo::SRBSZ_BASE));
    if lss != 0 {
        size = size.wrapping_add(1 << ((lss - 1) + coreinfo::SRBSZ_BASE));
    }
    size
}

fn enumerate_banks(bus: &mut dyn Bus, core: &Core, banks: u32) -> Result<RamSize> {
    let mut ram = RamSize::default();
    for idx in 0..banks {
        bus.write32(
            core.base + SOCRAM_BANKIDX,
            (bankidx::MEMTYPE_RAM << bankidx::MEMTYPE_SHIFT) | idx,
        )?;
        let info = bus.read32(core.base + SOCRAM_BANKINFO)?;
        let bank = ((info & bankinfo::SZMASK) + 1) * bankinfo::SZBASE;
        ram.size = ram.size.wrapping_add(bank);
        if info & bankinfo::RETNTRAM_MASK != 0 {
            ram.retained = ram.retained.wrapping_add(bank);
        }
    }
    Ok(ram)
}
