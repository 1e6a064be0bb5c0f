//! AI backplane wrapper protocol
//!
//! Every core on an AI backplane sits behind an agent wrapper with two
//! registers the driver uses: IOCTL (clock enable, force gate, core
//! specific bits) and RESET_CTL (bit 0 holds the core in reset).

use super::{Core, CoreControl};
use crate::bus::Bus;
use crate::error::Result;
use bwfm_chip::regs::{ioctl, reset_ctl, AGENT_IOCTL, AGENT_RESET_CTL};
use tracing::warn;

/// Polls waiting for RESET_CTL to latch in [`AiCoreControl::disable`].
pub const DISABLE_POLLS: u32 = 300;
/// Delay between disable polls (µs).
pub const DISABLE_DELAY_US: u32 = 20;
/// Polls waiting for RESET_CTL to clear in [`AiCoreControl::reset`].
pub const RESET_POLLS: u32 = 50;
/// Delay between reset polls (µs).
pub const RESET_DELAY_US: u32 = 60;

/// Wrapper protocol for the ARM AMBA advanced interconnect.
#[derive(Debug, Clone, Copy, Default)]
pub struct AiCoreControl;

impl CoreControl for AiCoreControl {
    fn is_up(&self, bus: &mut dyn Bus, core: &Core) -> Result<bool> {
        let ctl = bus.read32(core.wrap + AGENT_IOCTL)?;
        let rst = bus.read32(core.wrap + AGENT_RESET_CTL)?;
        Ok(ctl & (ioctl::FGC | ioctl::CLK) == ioctl::CLK && rst & reset_ctl::RESET == 0)
    }

    fn disable(&self, bus: &mut dyn Bus, core: &Core, pre_reset: u32, reset: u32) -> Result<()> {
        let rst = bus.read32(core.wrap + AGENT_RESET_CTL)?;
        if rst & reset_ctl::RESET == 0 {
            bus.write32(core.wrap + AGENT_IOCTL, pre_reset | ioctl::FGC | ioctl::CLK)?;
            bus.read32(core.wrap + AGENT_IOCTL)?;

            bus.write32(core.wrap + AGENT_RESET_CTL, reset_ctl::RESET)?;

            let mut latched = false;
            for _ in 0..DISABLE_POLLS {
                bus.delay_us(DISABLE_DELAY_US);
                if bus.read32(core.wrap + AGENT_RESET_CTL)? == reset_ctl::RESET {
                    latched = true;
                    break;
                }
            }
            if !latched {
                warn!(core = core.name(), "timeout waiting for core to enter reset");
            }
        }

        bus.write32(core.wrap + AGENT_IOCTL, reset | ioctl::FGC | ioctl::CLK)?;
        bus.read32(core.wrap + AGENT_IOCTL)?;
        Ok(())
    }

    fn reset(
        &self,
        bus: &mut dyn Bus,
        core: &Core,
        pre_reset: u32,
        reset: u32,
        post_reset: u32,
    ) -> Result<()> {
        self.disable(bus, core, pre_reset, reset)?;

        let mut cleared = false;
        for _ in 0..RESET_POLLS {
            if bus.read32(core.wrap + AGENT_RESET_CTL)? & reset_ctl::RESET == 0 {
                cleared = true;
                break;
            }
            bus.write32(core.wrap + AGENT_RESET_CTL, 0)?;
            bus.delay_us(RESET_DELAY_US);
        }
        if !cleared {
            warn!(core = core.name(), "timeout waiting for core to leave reset");
        }

        bus.write32(core.wrap + AGENT_IOCTL, post_reset | ioctl::CLK)?;
        bus.read32(core.wrap + AGENT_IOCTL)?;
        Ok(())
    }
}
