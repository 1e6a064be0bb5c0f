//! Backplane register map.
//!
//! Offsets are relative to the owning core's base address (functional
//! registers) or wrapper base address (agent registers). The chip-common
//! core always sits at [`CHIP_BASE`].
//!
//! ```text
//! 0x1800_0000  chip-common  (chip id, capabilities, EROM pointer)
//! 0x1800_0600  PMU block inside chip-common on older parts
//! wrap + 0x408 IOCTL        (clock enable / force gate / core bits)
//! wrap + 0x800 RESET_CTL    (bit 0: core held in reset)
//! ```

// ── Chip-common ──────────────────────────────────────────────────────────────

/// Backplane address of the chip-common core.
pub const CHIP_BASE: u32 = 0x1800_0000;

/// Chip id / revision / package / interconnect type word.
pub const CHIP_REG_CHIPID: u32 = 0x0000;
/// Chip-common capability bitmask.
pub const CHIP_REG_CAPABILITIES: u32 = 0x0004;
/// Extended chip-common capability bitmask.
pub const CHIP_REG_CAPABILITIES_EXT: u32 = 0x00AC;
/// Backplane address of the enumeration ROM.
pub const CHIP_REG_EROMPTR: u32 = 0x00FC;
/// PMU capability word (low byte is the PMU revision).
pub const CHIP_REG_PMUCAPABILITIES: u32 = 0x0604;

/// Chip-common capability bits.
pub mod capabilities {
    /// A PMU is present.
    pub const PMU: u32 = 0x1000_0000;
}

/// Extended capability bits.
pub mod capabilities_ext {
    /// Always-on-backplane present: the PMU is a separate core.
    pub const AOB_PRESENT: u32 = 0x0000_0040;
}

/// PMU capability fields.
pub mod pmucaps {
    /// PMU revision.
    pub const REV_MASK: u32 = 0x0000_00FF;
}

// ── Agent (wrapper) registers ────────────────────────────────────────────────

/// Wrapper IOCTL register.
pub const AGENT_IOCTL: u32 = 0x0408;
/// Wrapper reset control register.
pub const AGENT_RESET_CTL: u32 = 0x0800;

/// IOCTL bits shared by every core.
pub mod ioctl {
    /// Core clock enable.
    pub const CLK: u32 = 0x0001;
    /// Force gated clock.
    pub const FGC: u32 = 0x0002;
    /// ARM CR4 / CA7: hold the CPU halted.
    pub const ARMCR4_CPUHALT: u32 = 0x0020;
    /// 802.11 core: PHY clock enable.
    pub const D11_PHYCLOCKEN: u32 = 0x0004;
    /// 802.11 core: PHY reset.
    pub const D11_PHYRESET: u32 = 0x0008;
}

/// RESET_CTL bits.
pub mod reset_ctl {
    /// Core is held in reset.
    pub const RESET: u32 = 0x0001;
}

// ── SOCRAM / SYSMEM ──────────────────────────────────────────────────────────
// SYSMEM shares the coreinfo and bank registers with SOCRAM.

/// Core info word: bank count, bank size, lone standalone bank size.
pub const SOCRAM_COREINFO: u32 = 0x0000;
/// Bank index select.
pub const SOCRAM_BANKIDX: u32 = 0x0010;
/// Per-bank info of the selected bank.
pub const SOCRAM_BANKINFO: u32 = 0x0040;
/// Per-bank power-down array.
pub const SOCRAM_BANKPDA: u32 = 0x0044;

/// Core info fields.
pub mod coreinfo {
    /// Bank size is `1 << (field + SRBSZ_BASE)`.
    pub const SRBSZ_BASE: u32 = 14;
    /// Bank size field.
    pub const SRBSZ_MASK: u32 = 0x0000_000F;
    /// Number of banks.
    pub const SRNB_MASK: u32 = 0x0000_00F0;
    /// Shift of [`SRNB_MASK`].
    pub const SRNB_SHIFT: u32 = 4;
    /// Lone standalone bank size (`0` = none).
    pub const LSS_MASK: u32 = 0x00F0_0000;
    /// Shift of [`LSS_MASK`].
    pub const LSS_SHIFT: u32 = 20;
}

/// Bank index fields.
pub mod bankidx {
    /// Memory type RAM.
    pub const MEMTYPE_RAM: u32 = 0;
    /// Shift of the memory type.
    pub const MEMTYPE_SHIFT: u32 = 8;
}

/// Bank info fields.
pub mod bankinfo {
    /// Bank size unit in bytes.
    pub const SZBASE: u32 = 8192;
    /// Bank size in units, minus one.
    pub const SZMASK: u32 = 0x0000_007F;
    /// Bank is retention RAM.
    pub const RETNTRAM_MASK: u32 = 0x0001_0000;
}

// ── ARM CR4 TCM ──────────────────────────────────────────────────────────────

/// Capability word: A/B TCM bank counts.
pub const ARMCR4_CAP: u32 = 0x0004;
/// TCM bank index select.
pub const ARMCR4_BANKIDX: u32 = 0x0040;
/// TCM bank info.
pub const ARMCR4_BANKINFO: u32 = 0x0044;

/// CR4 capability fields.
pub mod armcr4 {
    /// Number of A banks.
    pub const TCBANB_MASK: u32 = 0x0000_000F;
    /// Shift of [`TCBANB_MASK`].
    pub const TCBANB_SHIFT: u32 = 0;
    /// Number of B banks.
    pub const TCBBNB_MASK: u32 = 0x0000_00F0;
    /// Shift of [`TCBBNB_MASK`].
    pub const TCBBNB_SHIFT: u32 = 4;
    /// Bank size in units, minus one.
    pub const BANKINFO_BSZ_MASK: u32 = 0x0000_003F;
    /// Bank size unit in bytes.
    pub const BANKINFO_BSZ_MULT: u32 = 8192;
}
