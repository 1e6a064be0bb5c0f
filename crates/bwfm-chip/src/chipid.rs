//! Chip identification and per-chip tables.
//!
//! The chip-id register at [`crate::regs::CHIP_BASE`] packs the chip id,
//! its revision and the backplane interconnect type. Everything else the
//! driver needs to know per chip that the hardware does not report (where
//! RAM sits in the ARM address map, retention quirks) lives in the tables
//! below.

use core::fmt;

/// Chip id field.
pub const CHIPID_ID_MASK: u32 = 0x0000_FFFF;
/// Chip revision field.
pub const CHIPID_REV_MASK: u32 = 0x000F_0000;
/// Shift of [`CHIPID_REV_MASK`].
pub const CHIPID_REV_SHIFT: u32 = 16;
/// Interconnect type field.
pub const CHIPID_TYPE_MASK: u32 = 0xF000_0000;
/// Shift of [`CHIPID_TYPE_MASK`].
pub const CHIPID_TYPE_SHIFT: u32 = 28;

// ── Chip ids ─────────────────────────────────────────────────────────────────
// Some parts are numbered in decimal, some in hex. Both forms are kept as
// they appear on the silicon.

/// BCM4334.
pub const BCM4334: u32 = 0x4334;
/// BCM4335.
pub const BCM4335: u32 = 0x4335;
/// BCM4339.
pub const BCM4339: u32 = 0x4339;
/// BCM4345.
pub const BCM4345: u32 = 0x4345;
/// BCM4350.
pub const BCM4350: u32 = 0x4350;
/// BCM4354.
pub const BCM4354: u32 = 0x4354;
/// BCM4356.
pub const BCM4356: u32 = 0x4356;
/// BCM4358.
pub const BCM4358: u32 = 0x4358;
/// BCM4359.
pub const BCM4359: u32 = 0x4359;
/// BCM4365.
pub const BCM4365: u32 = 0x4365;
/// BCM4366.
pub const BCM4366: u32 = 0x4366;
/// BCM4371.
pub const BCM4371: u32 = 0x4371;
/// CYW4373.
pub const CYW4373: u32 = 0x4373;
/// BCM43430 / CYW43430.
pub const BCM43430: u32 = 43430;
/// BCM43465.
pub const BCM43465: u32 = 43465;
/// BCM43525.
pub const BCM43525: u32 = 43525;
/// BCM43567.
pub const BCM43567: u32 = 43567;
/// BCM43569.
pub const BCM43569: u32 = 43569;
/// BCM43570.
pub const BCM43570: u32 = 43570;
/// BCM43602.
pub const BCM43602: u32 = 43602;

/// Backplane flavour reported in the chip-id register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interconnect {
    /// Sonics Silicon Backplane. Recognised but not driven.
    Sb,
    /// ARM AMBA "advanced interconnect" with DMP wrappers and an EROM.
    Ai,
    /// Anything else.
    Unknown(u8),
}

impl Interconnect {
    /// Decode the 4-bit type field.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Sb,
            1 => Self::Ai,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for Interconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sb => write!(f, "SB"),
            Self::Ai => write!(f, "AI"),
            Self::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// Decoded chip-id register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipIdent {
    /// Chip id.
    pub chip: u32,
    /// Chip revision.
    pub rev: u32,
    /// Interconnect type.
    pub interconnect: Interconnect,
}

impl ChipIdent {
    /// Decode a raw chip-id register value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_reg(reg: u32) -> Self {
        Self {
            chip: reg & CHIPID_ID_MASK,
            rev: (reg & CHIPID_REV_MASK) >> CHIPID_REV_SHIFT,
            interconnect: Interconnect::from_raw(
                ((reg & CHIPID_TYPE_MASK) >> CHIPID_TYPE_SHIFT) as u8,
            ),
        }
    }

    /// Marketing name, e.g. `4345` or `43430`.
    #[must_use]
    pub fn name(&self) -> String {
        chip_name(self.chip)
    }
}

/// Format a chip id the way the part is marketed.
///
/// Ids in the 0x4000..=0xa000 window are hex part numbers (`0x4345` prints
/// as `4345`); the rest are decimal part numbers (`43430`).
#[must_use]
pub fn chip_name(chip: u32) -> String {
    if chip > 0xa000 || chip < 0x4000 {
        format!("{chip}")
    } else {
        format!("{chip:x}")
    }
}

/// Start of RAM in the ARM address map for CR4/CA7 and SYSMEM chips.
///
/// `None` for chips not in the table.
#[must_use]
pub const fn ram_base(chip: u32) -> Option<u32> {
    match chip {
        BCM4345 => Some(0x0019_8000),
        BCM4335 | BCM4339 | BCM4350 | BCM4354 | BCM4356 | BCM43567 | BCM43569 | BCM43570
        | BCM4358 | BCM4359 | BCM43602 | BCM4371 => Some(0x0018_0000),
        BCM43465 | BCM43525 | BCM4365 | BCM4366 => Some(0x0020_0000),
        CYW4373 => Some(0x0016_0000),
        _ => None,
    }
}

/// Retained SRAM size override for chips that misreport it.
#[must_use]
pub const fn retention_override(chip: u32, rev: u32) -> Option<u32> {
    match chip {
        BCM4334 if rev < 2 => Some(32 * 1024),
        BCM43430 => Some(64 * 1024),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_chip_id_register() {
        let id = ChipIdent::from_reg(0x1001_4345);
        assert_eq!(id.chip, 0x4345);
        assert_eq!(id.rev, 1);
        assert_eq!(id.interconnect, Interconnect::Ai);
        assert_eq!(id.name(), "4345");

        let sb = ChipIdent::from_reg(0x0000_4330);
        assert_eq!(sb.interconnect, Interconnect::Sb);
    }

    #[test]
    fn decimal_names() {
        assert_eq!(chip_name(BCM43430), "43430");
        assert_eq!(chip_name(BCM43602), "43602");
        assert_eq!(chip_name(0x4373), "4373");
    }

    #[test]
    fn ram_base_table() {
        assert_eq!(ram_base(BCM4345), Some(0x19_8000));
        assert_eq!(ram_base(BCM43569), Some(0x18_0000));
        assert_eq!(ram_base(BCM4366), Some(0x20_0000));
        assert_eq!(ram_base(CYW4373), Some(0x16_0000));
        assert_eq!(ram_base(BCM43430), None);
    }

    #[test]
    fn retention_quirks() {
        assert_eq!(retention_override(BCM4334, 1), Some(32 * 1024));
        assert_eq!(retention_override(BCM4334, 2), None);
        assert_eq!(retention_override(BCM43430, 0), Some(64 * 1024));
        assert_eq!(retention_override(BCM4345, 0), None);
    }
}
