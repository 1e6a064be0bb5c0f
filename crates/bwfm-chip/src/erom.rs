//! Enumeration ROM (EROM) descriptor format.
//!
//! The EROM is a table of 32-bit little-endian words. The low nibble of
//! every word is a descriptor tag:
//!
//! ```text
//! xxxx_xxx1  component       (two words: part number, then wrapper counts + rev)
//! xxxx_xxx3  master port
//! xxxx_xxx5  address         (bit 3 set: an upper 32-bit word follows)
//! 0000_000F  end of table
//! ```
//!
//! Address descriptors carry a 4 KiB aligned base, a slave type (plain
//! slave, bridge, slave wrapper, master wrapper) and a size type. Only
//! 4 KiB regions are register windows the driver uses.

/// Descriptor tag mask.
pub const DESC_MASK: u32 = 0x0000_000F;
/// Component descriptor.
pub const DESC_COMPONENT: u32 = 0x0000_0001;
/// Master port descriptor.
pub const DESC_MASTER_PORT: u32 = 0x0000_0003;
/// Address descriptor.
pub const DESC_ADDRESS: u32 = 0x0000_0005;
/// Address/size wider than 32 bits: one extra word follows.
pub const DESC_ADDRSIZE_GT32: u32 = 0x0000_0008;
/// End of table.
pub const DESC_EOT: u32 = 0x0000_000F;

/// Upper bound on the table size. The EROM occupies one 4 KiB window.
pub const EROM_MAX_BYTES: u32 = 0x1000;

/// Component descriptor fields.
pub mod comp {
    /// Designer (JEP106 code) in the first word.
    pub const DESIGNER: u32 = 0xFFF0_0000;
    /// Shift of [`DESIGNER`].
    pub const DESIGNER_S: u32 = 20;
    /// Part number (core id) in the first word.
    pub const PARTNUM: u32 = 0x000F_FF00;
    /// Shift of [`PARTNUM`].
    pub const PARTNUM_S: u32 = 8;
    /// Core revision in the second word.
    pub const REVISION: u32 = 0xFF00_0000;
    /// Shift of [`REVISION`].
    pub const REVISION_S: u32 = 24;
    /// Slave wrapper count in the second word.
    pub const NUM_SWRAP: u32 = 0x00F8_0000;
    /// Shift of [`NUM_SWRAP`].
    pub const NUM_SWRAP_S: u32 = 19;
    /// Master wrapper count in the second word.
    pub const NUM_MWRAP: u32 = 0x0007_C000;
    /// Shift of [`NUM_MWRAP`].
    pub const NUM_MWRAP_S: u32 = 14;
}

/// Master port descriptor fields.
pub mod master_port {
    /// Port number.
    pub const NUM: u32 = 0x0000_00F0;
    /// Shift of [`NUM`].
    pub const NUM_S: u32 = 4;
}

/// Address (slave port) descriptor fields.
pub mod slave {
    /// 4 KiB aligned base address.
    pub const ADDR_BASE: u32 = 0xFFFF_F000;
    /// Slave type.
    pub const TYPE: u32 = 0x0000_00C0;
    /// Shift of [`TYPE`].
    pub const TYPE_S: u32 = 6;
    /// Plain register window.
    pub const TYPE_SLAVE: u32 = 0;
    /// Slave wrapper.
    pub const TYPE_SWRAP: u32 = 2;
    /// Master wrapper.
    pub const TYPE_MWRAP: u32 = 3;
    /// Size type.
    pub const SIZE_TYPE: u32 = 0x0000_0030;
    /// Shift of [`SIZE_TYPE`].
    pub const SIZE_TYPE_S: u32 = 4;
    /// 4 KiB region.
    pub const SIZE_4K: u32 = 0;
    /// 8 KiB region.
    pub const SIZE_8K: u32 = 1;
    /// Size given by a following size descriptor.
    pub const SIZE_DESC: u32 = 3;
}

/// Broadcom's designer code, as found in real component descriptors.
pub const DESIGNER_BROADCOM: u32 = 0x4BF;

/// Descriptor tag of a raw EROM word.
#[must_use]
pub const fn desc_type(word: u32) -> u32 {
    word & DESC_MASK
}

/// True for an address descriptor, with or without the 64-bit flag.
#[must_use]
pub const fn is_address(desc: u32) -> bool {
    desc & !DESC_ADDRSIZE_GT32 == DESC_ADDRESS
}

/// Core id from the first component word.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn part_number(word: u32) -> u16 {
    ((word & comp::PARTNUM) >> comp::PARTNUM_S) as u16
}

/// Wrapper counts and revision from the second component word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Master wrapper count.
    pub master_wraps: u8,
    /// Slave wrapper count.
    pub slave_wraps: u8,
    /// Core revision.
    pub revision: u8,
}

impl ComponentInfo {
    /// Decode the second component word.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_word(word: u32) -> Self {
        Self {
            master_wraps: ((word & comp::NUM_MWRAP) >> comp::NUM_MWRAP_S) as u8,
            slave_wraps: ((word & comp::NUM_SWRAP) >> comp::NUM_SWRAP_S) as u8,
            revision: ((word & comp::REVISION) >> comp::REVISION_S) as u8,
        }
    }

    /// True if the component has no wrapper ports at all.
    #[must_use]
    pub const fn has_no_wrappers(&self) -> bool {
        self.master_wraps == 0 && self.slave_wraps == 0
    }
}

/// Size type of an address descriptor.
#[must_use]
pub const fn size_type(word: u32) -> u32 {
    (word & slave::SIZE_TYPE) >> slave::SIZE_TYPE_S
}

/// Slave type of an address descriptor.
#[must_use]
pub const fn slave_type(word: u32) -> u32 {
    (word & slave::TYPE) >> slave::TYPE_S
}

/// Base address of an address descriptor.
#[must_use]
pub const fn slave_base(word: u32) -> u32 {
    word & slave::ADDR_BASE
}

// ── Encoders ─────────────────────────────────────────────────────────────────
// Used to build EROM images for simulated chips and test fixtures.

/// Both words of a component descriptor.
#[must_use]
pub const fn encode_component(id: u16, revision: u8, master_wraps: u8, slave_wraps: u8) -> [u32; 2] {
    let first = (DESIGNER_BROADCOM << comp::DESIGNER_S)
        | (((id as u32) << comp::PARTNUM_S) & comp::PARTNUM)
        | DESC_COMPONENT;
    let second = ((revision as u32) << comp::REVISION_S)
        | (((slave_wraps as u32) << comp::NUM_SWRAP_S) & comp::NUM_SWRAP)
        | (((master_wraps as u32) << comp::NUM_MWRAP_S) & comp::NUM_MWRAP)
        | DESC_COMPONENT;
    [first, second]
}

/// A master port descriptor.
#[must_use]
pub const fn encode_master_port(num: u8) -> u32 {
    (((num as u32) << master_port::NUM_S) & master_port::NUM) | DESC_MASTER_PORT
}

/// A 32-bit address descriptor.
#[must_use]
pub const fn encode_address(base: u32, slave_type: u32, size_type: u32) -> u32 {
    (base & slave::ADDR_BASE)
        | ((slave_type << slave::TYPE_S) & slave::TYPE)
        | ((size_type << slave::SIZE_TYPE_S) & slave::SIZE_TYPE)
        | DESC_ADDRESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_encoding_decodes() {
        let [first, second] = encode_component(0x83E, 2, 1, 1);
        assert_eq!(desc_type(first), DESC_COMPONENT);
        assert_eq!(desc_type(second), DESC_COMPONENT);
        assert_eq!(part_number(first), 0x83E);
        let info = ComponentInfo::from_word(second);
        assert_eq!(info.revision, 2);
        assert_eq!(info.master_wraps, 1);
        assert_eq!(info.slave_wraps, 1);
        assert!(!info.has_no_wrappers());
    }

    #[test]
    fn address_fields() {
        let word = encode_address(0x1810_1000, slave::TYPE_SWRAP, slave::SIZE_4K);
        assert!(is_address(desc_type(word)));
        assert_eq!(slave_base(word), 0x1810_1000);
        assert_eq!(slave_type(word), slave::TYPE_SWRAP);
        assert_eq!(size_type(word), slave::SIZE_4K);
    }

    #[test]
    fn wide_address_still_address() {
        assert!(is_address(DESC_ADDRESS | DESC_ADDRSIZE_GT32));
        assert!(!is_address(DESC_EOT));
        assert!(!is_address(DESC_MASTER_PORT));
    }
}
