//! Backplane core identifiers.
//!
//! The EROM reports each core by its 12-bit part number. Only the cores the
//! bring-up path cares about are named here; anything else is carried
//! through as a raw id.

/// Chip-common: chip id, capabilities, EROM pointer.
pub const CHIPCOMMON: u16 = 0x800;
/// On-chip SRAM (SOCRAM).
pub const INTERNAL_MEM: u16 = 0x80E;
/// 802.11 MAC.
pub const IEEE80211: u16 = 0x812;
/// PMU on always-on-backplane parts.
pub const PMU: u16 = 0x827;
/// SDIO device core.
pub const SDIO_DEV: u16 = 0x829;
/// ARM Cortex-M3 CPU.
pub const ARM_CM3: u16 = 0x82A;
/// PCIe gen2 core.
pub const PCIE2: u16 = 0x83C;
/// ARM Cortex-R4 CPU with TCM.
pub const ARM_CR4: u16 = 0x83E;
/// ARM Cortex-A7 CPU.
pub const ARM_CA7: u16 = 0x847;
/// System memory (SYSMEM).
pub const SYS_MEM: u16 = 0x849;

/// Human-readable core name for logs.
#[must_use]
pub const fn name(id: u16) -> &'static str {
    match id {
        CHIPCOMMON => "chipcommon",
        INTERNAL_MEM => "socram",
        IEEE80211 => "80211",
        PMU => "pmu",
        SDIO_DEV => "sdio",
        ARM_CM3 => "arm-cm3",
        PCIE2 => "pcie2",
        ARM_CR4 => "arm-cr4",
        ARM_CA7 => "arm-ca7",
        SYS_MEM => "sysmem",
        _ => "unknown",
    }
}

/// True if `id` is one of the CPU cores the driver knows how to start.
#[must_use]
pub const fn is_cpu(id: u16) -> bool {
    matches!(id, ARM_CM3 | ARM_CR4 | ARM_CA7)
}
