//! EROM scanner
//!
//! Walks the enumeration ROM of an AI backplane and returns every core that
//! has a usable register window. The table lives in chip register space and
//! is not trusted: every read is bounded to one 4 KiB window and a table
//! without an end marker inside it is rejected.

use crate::bus::Bus;
use crate::chip::Core;
use crate::error::{BwfmError, Result};
use bwfm_chip::cores;
use bwfm_chip::erom::{
    desc_type, is_address, part_number, size_type, slave, slave_base, slave_type, ComponentInfo,
    DESC_ADDRSIZE_GT32, DESC_COMPONENT, DESC_EOT, DESC_MASTER_PORT, EROM_MAX_BYTES,
};
use bwfm_chip::regs::{CHIP_BASE, CHIP_REG_EROMPTR};
use tracing::{debug, trace};

/// Bounded cursor over the EROM words.
struct EromCursor<'a, B: Bus + ?Sized> {
    bus: &'a mut B,
    start: u32,
    offset: u32,
}

impl<'a, B: Bus + ?Sized> EromCursor<'a, B> {
    fn new(bus: &'a mut B, start: u32) -> Self {
        Self {
            bus,
            start,
            offset: 0,
        }
    }

    const fn addr(&self) -> u32 {
        self.start.wrapping_add(self.offset)
    }

    fn peek(&mut self) -> Result<u32> {
        if self.offset >= EROM_MAX_BYTES {
            return Err(BwfmError::malformed_erom(
                self.addr(),
                "no end-of-table marker within the EROM window",
            ));
        }
        self.bus.read32(self.addr())
    }

    fn next(&mut self) -> Result<u32> {
        let val = self.peek()?;
        self.skip(4);
        Ok(val)
    }

    fn skip(&mut self, bytes: u32) {
        self.offset = self.offset.saturating_add(bytes);
    }
}

/// Scan the EROM pointed to by the chip-common EROM pointer register.
///
/// # Errors
///
/// Returns error if a bus read fails, a component descriptor is not
/// followed by its second word, or the table runs past its window without
/// an end marker. No partial core list is returned in any of these cases.
pub fn scan_erom<B: Bus + ?Sized>(bus: &mut B) -> Result<Vec<Core>> {
    let erom = bus.read32(CHIP_BASE + CHIP_REG_EROMPTR)?;
    debug!(erom = format_args!("{erom:#010x}"), "scanning EROM");
    scan_erom_at(bus, erom)
}

/// Scan an EROM table starting at `erom`.
///
/// # Errors
///
/// See [`scan_erom`].
pub fn scan_erom_at<B: Bus + ?Sized>(bus: &mut B, erom: u32) -> Result<Vec<Core>> {
    let mut cursor = EromCursor::new(bus, erom);
    let mut found = Vec::new();

    loop {
        let val = cursor.next()?;
        let desc = desc_type(val);
        if desc == DESC_EOT {
            break;
        }
        if desc != DESC_COMPONENT {
            continue;
        }

        let id = part_number(val);
        let at = cursor.addr();
        let val = cursor.next()?;
        if desc_type(val) != DESC_COMPONENT {
            return Err(BwfmError::malformed_erom(
                at,
                format!("component {id:#x} is missing its second descriptor word"),
            ));
        }

        let info = ComponentInfo::from_word(val);
        if info.has_no_wrappers() && id != cores::PMU {
            trace!(id = format_args!("{id:#x}"), "skipping component without wrappers");
            continue;
        }

        let Some((base, wrap)) = region_addresses(&mut cursor)? else {
            trace!(id = format_args!("{id:#x}"), "no usable register window");
            continue;
        };

        found.push(Core {
            id,
            rev: info.revision,
            base,
            wrap,
        });
    }

    Ok(found)
}

/// Find the functional base and wrapper base of the component just read.
///
/// `Ok(None)` means the component has no usable window and is skipped.
fn region_addresses<B: Bus + ?Sized>(cursor: &mut EromCursor<'_, B>) -> Result<Option<(u32, u32)>> {
    let mut base = 0;
    let mut wrap = 0;

    let first = desc_type(cursor.peek()?);
    let wrap_type = if first == DESC_MASTER_PORT {
        cursor.skip(4);
        slave::TYPE_MWRAP
    } else if is_address(first) {
        slave::TYPE_SWRAP
    } else {
        return Ok(None);
    };

    loop {
        // Advance to the next address descriptor. The next component ends
        // this one with whatever was found so far.
        let (val, desc) = loop {
            let val = cursor.peek()?;
            let desc = desc_type(val);
            if desc == DESC_COMPONENT {
                return Ok(Some((base, wrap)));
            }
            if desc == DESC_EOT {
                return Ok(None);
            }
            cursor.skip(4);
            if is_address(desc) {
                break (val, desc);
            }
        };

        if desc & DESC_ADDRSIZE_GT32 != 0 {
            cursor.skip(4);
        }

        let size = size_type(val);
        if size == slave::SIZE_DESC {
            let size_word = cursor.peek()?;
            cursor.skip(if desc_type(size_word) & DESC_ADDRSIZE_GT32 != 0 {
                8
            } else {
                4
            });
        }
        if size != slave::SIZE_4K {
            continue;
        }

        let kind = slave_type(val);
        if base == 0 && kind == slave::TYPE_SLAVE {
            base = slave_base(val);
        }
        if wrap == 0 && kind == wrap_type {
            wrap = slave_base(val);
        }
        if base != 0 && wrap != 0 {
            return Ok(Some((base, wrap)));
        }
    }
}
