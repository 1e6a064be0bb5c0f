//! Chip bring-up and core lifecycle
//!
//! [`Chip::attach`] identifies the silicon, builds the core registry from the
//! EROM, parks the CPU, sizes RAM and records the capability words. After
//! that the registry is read-only; [`Chip::set_active`] later releases the
//! CPU once firmware has been downloaded.
//!
//! Core reset and clock gating go through a [`CoreControl`] selected once
//! from the interconnect type. Only the AI backplane is driven.

mod ai;
mod ramsize;

pub use ai::AiCoreControl;
pub use ramsize::RamSize;

use crate::bus::Bus;
use crate::erom::scan_erom;
use crate::error::{BwfmError, Result};
use bwfm_chip::chipid::{self, ChipIdent, Interconnect};
use bwfm_chip::cores;
use bwfm_chip::regs::{
    capabilities, capabilities_ext, ioctl, pmucaps, CHIP_BASE, CHIP_REG_CAPABILITIES,
    CHIP_REG_CAPABILITIES_EXT, CHIP_REG_CHIPID, CHIP_REG_PMUCAPABILITIES, SOCRAM_BANKIDX,
    SOCRAM_BANKPDA,
};
use std::fmt;
use tracing::{debug, info, warn};

/// A hardware block discovered on the backplane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Core {
    /// Core id (EROM part number).
    pub id: u16,
    /// Core revision.
    pub rev: u8,
    /// Functional register base.
    pub base: u32,
    /// Agent wrapper register base.
    pub wrap: u32,
}

impl Core {
    /// Log-friendly core name.
    pub const fn name(&self) -> &'static str {
        cores::name(self.id)
    }
}

impl fmt::Display for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#05x}:{:<2} {:<10} base {:#010x} wrap {:#010x}",
            self.id,
            self.rev,
            self.name(),
            self.base,
            self.wrap
        )
    }
}

/// Wrapper-register protocol for one interconnect flavour.
pub trait CoreControl: fmt::Debug + Send + Sync {
    /// Core clocked, not force-gated and out of reset.
    ///
    /// # Errors
    ///
    /// Returns error if a wrapper read fails.
    fn is_up(&self, bus: &mut dyn Bus, core: &Core) -> Result<bool>;

    /// Put the core into reset with `pre_reset` core bits, leaving
    /// `reset` core bits set afterwards.
    ///
    /// # Errors
    ///
    /// Returns error if a wrapper access fails. A core that does not enter
    /// reset in time is logged, not reported.
    fn disable(&self, bus: &mut dyn Bus, core: &Core, pre_reset: u32, reset: u32) -> Result<()>;

    /// Disable then bring the core back out of reset with `post_reset`
    /// core bits.
    ///
    /// # Errors
    ///
    /// Returns error if a wrapper access fails. Timeouts are logged only.
    fn reset(
        &self,
        bus: &mut dyn Bus,
        core: &Core,
        pre_reset: u32,
        reset: u32,
        post_reset: u32,
    ) -> Result<()>;
}

/// Backplane flavour selected at attach.
#[derive(Debug, Clone, Copy)]
enum Backplane {
    Ai(AiCoreControl),
}

impl Backplane {
    fn select(kind: Interconnect) -> Result<Self> {
        match kind {
            Interconnect::Ai => Ok(Self::Ai(AiCoreControl)),
            Interconnect::Sb => Err(BwfmError::UnsupportedInterconnect {
                kind: "SB".into(),
            }),
            Interconnect::Unknown(raw) => Err(BwfmError::UnsupportedInterconnect {
                kind: format!("type {raw}"),
            }),
        }
    }

    fn control(&self) -> &dyn CoreControl {
        match self {
            Self::Ai(ctl) => ctl,
        }
    }
}

/// CPU flavour driving activation, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuArch {
    /// ARM Cortex-R4 with TCM.
    Cr4,
    /// ARM Cortex-A7.
    Ca7,
    /// ARM Cortex-M3 with SOCRAM.
    Cm3,
}

impl CpuArch {
    /// Core id of this CPU.
    pub const fn core_id(self) -> u16 {
        match self {
            Self::Cr4 => cores::ARM_CR4,
            Self::Ca7 => cores::ARM_CA7,
            Self::Cm3 => cores::ARM_CM3,
        }
    }
}

impl fmt::Display for CpuArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(cores::name(self.core_id()))
    }
}

/// What attach learned about the silicon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipInfo {
    /// Chip id.
    pub chip: u32,
    /// Chip revision.
    pub rev: u32,
    /// Marketing name.
    pub name: String,
    /// Interconnect flavour.
    pub interconnect: Interconnect,
    /// RAM base in the ARM address map (0 when unknown).
    pub ram_base: u32,
    /// RAM size in bytes.
    pub ram_size: u32,
    /// Retention (save/restore) RAM size in bytes.
    pub sr_size: u32,
    /// Chip-common capabilities.
    pub cc_caps: u32,
    /// Chip-common extended capabilities.
    pub cc_caps_ext: u32,
    /// PMU capabilities.
    pub pmu_caps: u32,
    /// PMU revision.
    pub pmu_rev: u32,
}

/// An attached chip: identity, core registry and reset protocol.
#[derive(Debug)]
pub struct Chip {
    info: ChipInfo,
    cores: Vec<Core>,
    backplane: Backplane,
}

impl Chip {
    /// Identify and prepare the chip behind `bus`.
    ///
    /// # Errors
    ///
    /// Returns error on bus failure, an SB or unknown interconnect, a
    /// malformed EROM, a missing CPU core, a CM3 chip without SOCRAM, or a
    /// missing core that the passive-mode sequence needs.
    pub fn attach(bus: &mut dyn Bus) -> Result<Self> {
        bus.prepare()?;

        let ident = ChipIdent::from_reg(bus.read32(CHIP_BASE + CHIP_REG_CHIPID)?);
        let backplane = Backplane::select(ident.interconnect)?;
        let cores = scan_erom(bus)?;

        let mut chip = Self {
            info: ChipInfo {
                chip: ident.chip,
                rev: ident.rev,
                name: ident.name(),
                interconnect: ident.interconnect,
                ram_base: 0,
                ram_size: 0,
                sr_size: 0,
                cc_caps: 0,
                cc_caps_ext: 0,
                pmu_caps: 0,
                pmu_rev: 0,
            },
            cores,
            backplane,
        };
        info!(
            chip = %chip.info.name,
            rev = chip.info.rev,
            interconnect = %chip.info.interconnect,
            cores = chip.cores.len(),
            "chip identified"
        );
        for core in &chip.cores {
            debug!("{core}");
        }

        chip.validate_cores()?;

        chip.set_passive(bus)?;
        if bus.supports_reset() {
            bus.reset()?;
            chip.set_passive(bus)?;
        }

        chip.size_ram(bus)?;

        let cc = chip.require_core(cores::CHIPCOMMON)?;
        chip.info.cc_caps = bus.read32(cc.base + CHIP_REG_CAPABILITIES)?;
        chip.info.cc_caps_ext = bus.read32(cc.base + CHIP_REG_CAPABILITIES_EXT)?;

        if chip.info.cc_caps & capabilities::PMU != 0 {
            let pmu = chip.pmu()?;
            chip.info.pmu_caps = bus.read32(pmu.base + CHIP_REG_PMUCAPABILITIES)?;
            chip.info.pmu_rev = chip.info.pmu_caps & pmucaps::REV_MASK;
        }

        bus.setup()?;

        info!(
            ram_base = format_args!("{:#x}", chip.info.ram_base),
            ram_size = chip.info.ram_size,
            sr_size = chip.info.sr_size,
            pmu_rev = chip.info.pmu_rev,
            "chip attached"
        );
        Ok(chip)
    }

    fn validate_cores(&self) -> Result<()> {
        let Some(cpu) = self.cpu_arch() else {
            return Err(BwfmError::invalid_state("CPU core not detected"));
        };
        if cpu == CpuArch::Cm3 && self.core(cores::INTERNAL_MEM).is_none() {
            return Err(BwfmError::core_not_found(cores::INTERNAL_MEM));
        }
        Ok(())
    }

    fn size_ram(&mut self, bus: &mut dyn Bus) -> Result<()> {
        let ram = if let Some(cr4) = self.core(cores::ARM_CR4) {
            let ram = self.tcm_ramsize(bus, &cr4)?;
            self.info.ram_base = self.lookup_ram_base();
            ram
        } else if let Some(sysmem) = self.core(cores::SYS_MEM) {
            let ram = self.sysmem_ramsize(bus, &sysmem)?;
            self.info.ram_base = self.lookup_ram_base();
            ram
        } else if let Some(socram) = self.core(cores::INTERNAL_MEM) {
            self.socram_ramsize(bus, &socram)?
        } else {
            RamSize::default()
        };
        self.info.ram_size = ram.size;
        self.info.sr_size = ram.retained;
        Ok(())
    }

    fn lookup_ram_base(&self) -> u32 {
        chipid::ram_base(self.info.chip).unwrap_or_else(|| {
            warn!(chip = %self.info.name, "unknown chip, RAM base left at 0");
            0
        })
    }

    /// Chip identity and sizing.
    pub const fn info(&self) -> &ChipInfo {
        &self.info
    }

    /// All cores in EROM order.
    pub fn cores(&self) -> &[Core] {
        &self.cores
    }

    /// First core with `id`.
    pub fn core(&self, id: u16) -> Option<Core> {
        self.cores.iter().find(|c| c.id == id).copied()
    }

    fn require_core(&self, id: u16) -> Result<Core> {
        self.core(id).ok_or_else(|| BwfmError::core_not_found(id))
    }

    /// Core that owns the PMU registers.
    ///
    /// Chips with chip-common rev >= 35 and an always-on backplane carry a
    /// separate PMU core; everything else keeps the PMU in chip-common.
    ///
    /// # Errors
    ///
    /// Returns error if the chip has no chip-common core.
    pub fn pmu(&self) -> Result<Core> {
        let cc = self.require_core(cores::CHIPCOMMON)?;
        if cc.rev >= 35 && self.info.cc_caps_ext & capabilities_ext::AOB_PRESENT != 0 {
            if let Some(pmu) = self.core(cores::PMU) {
                return Ok(pmu);
            }
        }
        Ok(cc)
    }

    /// CPU flavour, first of CR4, CA7, CM3 present.
    pub fn cpu_arch(&self) -> Option<CpuArch> {
        [CpuArch::Cr4, CpuArch::Ca7, CpuArch::Cm3]
            .into_iter()
            .find(|arch| self.core(arch.core_id()).is_some())
    }

    /// Wrapper-register protocol for this chip.
    pub fn control(&self) -> &dyn CoreControl {
        self.backplane.control()
    }

    /// See [`CoreControl::is_up`].
    ///
    /// # Errors
    ///
    /// Returns error if a wrapper read fails.
    pub fn is_up(&self, bus: &mut dyn Bus, core: &Core) -> Result<bool> {
        self.control().is_up(bus, core)
    }

    /// See [`CoreControl::disable`].
    ///
    /// # Errors
    ///
    /// Returns error if a wrapper access fails.
    pub fn disable(&self, bus: &mut dyn Bus, core: &Core, pre_reset: u32, reset: u32) -> Result<()> {
        self.control().disable(bus, core, pre_reset, reset)
    }

    /// See [`CoreControl::reset`].
    ///
    /// # Errors
    ///
    /// Returns error if a wrapper access fails.
    pub fn reset(
        &self,
        bus: &mut dyn Bus,
        core: &Core,
        pre_reset: u32,
        reset: u32,
        post_reset: u32,
    ) -> Result<()> {
        self.control().reset(bus, core, pre_reset, reset, post_reset)
    }

    /// Release the CPU to run firmware from `reset_vector`.
    ///
    /// # Errors
    ///
    /// Returns [`BwfmError::UnsupportedCpu`] on CM3 chips, which have no
    /// activation path, and bus errors otherwise.
    pub fn set_active(&self, bus: &mut dyn Bus, reset_vector: u32) -> Result<()> {
        match self.cpu_arch() {
            Some(arch @ (CpuArch::Cr4 | CpuArch::Ca7)) => {
                bus.activate(reset_vector)?;
                let cpu = self.require_core(arch.core_id())?;
                self.reset(bus, &cpu, ioctl::ARMCR4_CPUHALT, 0, 0)?;
                info!(cpu = %arch, reset_vector = format_args!("{reset_vector:#x}"), "CPU released");
                Ok(())
            }
            Some(CpuArch::Cm3) => Err(BwfmError::UnsupportedCpu {
                arch: cores::name(cores::ARM_CM3),
            }),
            None => Err(BwfmError::invalid_state("CPU core not detected")),
        }
    }

    /// Halt the CPU and hold the MAC with its PHY clocked.
    ///
    /// # Errors
    ///
    /// Returns error if a needed core is missing or a bus access fails.
    pub fn set_passive(&self, bus: &mut dyn Bus) -> Result<()> {
        match self.cpu_arch() {
            Some(arch @ (CpuArch::Cr4 | CpuArch::Ca7)) => {
                let cpu = self.require_core(arch.core_id())?;
                let halt = bus.read32(cpu.wrap + bwfm_chip::regs::AGENT_IOCTL)?
                    & ioctl::ARMCR4_CPUHALT;
                self.reset(
                    bus,
                    &cpu,
                    halt,
                    ioctl::ARMCR4_CPUHALT,
                    ioctl::ARMCR4_CPUHALT,
                )?;
                self.reset_mac(bus)
            }
            Some(CpuArch::Cm3) => {
                let cpu = self.require_core(cores::ARM_CM3)?;
                self.disable(bus, &cpu, 0, 0)?;
                self.reset_mac(bus)?;
                let socram = self.require_core(cores::INTERNAL_MEM)?;
                self.reset(bus, &socram, 0, 0, 0)?;
                if self.info.chip == chipid::BCM43430 {
                    bus.write32(socram.base + SOCRAM_BANKIDX, 3)?;
                    bus.write32(socram.base + SOCRAM_BANKPDA, 0)?;
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn reset_mac(&self, bus: &mut dyn Bus) -> Result<()> {
        let d11 = self.require_core(cores::IEEE80211)?;
        self.reset(
            bus,
            &d11,
            ioctl::D11_PHYRESET | ioctl::D11_PHYCLOCKEN,
            ioctl::D11_PHYCLOCKEN,
            ioctl::D11_PHYCLOCKEN,
        )
    }

    /// Build a chip from an already scanned registry, skipping the bus
    /// sequence. Used by tools that decode saved EROM dumps.
    ///
    /// # Errors
    ///
    /// Returns error if `info` names an interconnect the driver cannot manage.
    pub fn from_parts(info: ChipInfo, cores: Vec<Core>) -> Result<Self> {
        let backplane = Backplane::select(info.interconnect)?;
        Ok(Self {
            info,
            cores,
            backplane,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(chip: u32) -> ChipInfo {
        ChipInfo {
            chip,
            rev: 0,
            name: chipid::chip_name(chip),
            interconnect: Interconnect::Ai,
            ram_base: 0,
            ram_size: 0,
            sr_size: 0,
            cc_caps: 0,
            cc_caps_ext: capabilities_ext::AOB_PRESENT,
            pmu_caps: 0,
            pmu_rev: 0,
        }
    }

    fn core(id: u16, rev: u8) -> Core {
        Core {
            id,
            rev,
            base: 0x1800_0000 | (u32::from(id) << 4),
            wrap: 0x1810_0000 | (u32::from(id) << 4),
        }
    }

    #[test]
    fn cpu_priority() {
        let chip = Chip::from_parts(
            info(0x4345),
            vec![core(cores::ARM_CM3, 1), core(cores::ARM_CA7, 1), core(cores::ARM_CR4, 1)],
        )
        .unwrap();
        assert_eq!(chip.cpu_arch(), Some(CpuArch::Cr4));

        let chip =
            Chip::from_parts(info(0x4345), vec![core(cores::ARM_CM3, 1), core(cores::ARM_CA7, 1)])
                .unwrap();
        assert_eq!(chip.cpu_arch(), Some(CpuArch::Ca7));
    }

    #[test]
    fn first_core_with_id_wins() {
        let mut second = core(cores::IEEE80211, 9);
        second.base = 0xdead_0000;
        let chip =
            Chip::from_parts(info(0x4345), vec![core(cores::IEEE80211, 1), second]).unwrap();
        assert_eq!(chip.core(cores::IEEE80211).unwrap().rev, 1);
    }

    #[test]
    fn pmu_selection() {
        let old = Chip::from_parts(
            info(0x4345),
            vec![core(cores::CHIPCOMMON, 34), core(cores::PMU, 1)],
        )
        .unwrap();
        assert_eq!(old.pmu().unwrap().id, cores::CHIPCOMMON);

        let new = Chip::from_parts(
            info(0x4345),
            vec![core(cores::CHIPCOMMON, 35), core(cores::PMU, 1)],
        )
        .unwrap();
        assert_eq!(new.pmu().unwrap().id, cores::PMU);

        let mut no_aob = info(0x4345);
        no_aob.cc_caps_ext = 0;
        let no_aob =
            Chip::from_parts(no_aob, vec![core(cores::CHIPCOMMON, 40), core(cores::PMU, 1)])
                .unwrap();
        assert_eq!(no_aob.pmu().unwrap().id, cores::CHIPCOMMON);
    }

    #[test]
    fn sb_is_rejected() {
        let mut sb = info(0x4330);
        sb.interconnect = Interconnect::Sb;
        assert!(matches!(
            Chip::from_parts(sb, Vec::new()),
            Err(BwfmError::UnsupportedInterconnect { .. })
        ));
    }
}
