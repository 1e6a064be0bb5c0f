//! Simulated chip backend
//!
//! Implements [`Bus`] over a sparse register file and a scripted firmware.
//! The register file behaves like plain memory unless told otherwise:
//!
//! - [`SimBus::stick`] pins a register to a value and ignores writes
//!   (a core that never leaves reset, say).
//! - [`SimBus::bank`] makes one register read through an index register
//!   (the SOCRAM and CR4 bank info windows).
//!
//! The firmware side answers BCDC requests from a table of variables and
//! numeric commands, records every request and can be told to fail, to
//! answer late with a stale request id, or not to answer at all.
//!
//! ## Presets
//!
//! | Constructor | CPU | Memory |
//! |-------------|-----|--------|
//! | [`SimBus::bcm4345`] | ARM CR4 | TCM, 5 banks of 128 KiB |
//! | [`SimBus::bcm43430`] | ARM CM3 | SOCRAM rev 8, 4 banks of 128 KiB, one retained |

use crate::bcdc::{flags, BcdcHeader, BCDC_HEADER_LEN};
use crate::bus::Bus;
use crate::chip::Core;
use crate::error::{BwfmError, Result};
use crate::fwvar::cmd;
use crate::wire::band;
use bwfm_chip::erom::{encode_address, encode_component, encode_master_port, slave, DESC_EOT};
use bwfm_chip::regs::{
    capabilities, ARMCR4_BANKIDX, ARMCR4_BANKINFO, ARMCR4_CAP, CHIP_BASE, CHIP_REG_CAPABILITIES,
    CHIP_REG_CHIPID, CHIP_REG_EROMPTR, CHIP_REG_PMUCAPABILITIES, SOCRAM_BANKIDX, SOCRAM_BANKINFO,
    SOCRAM_COREINFO,
};
use bwfm_chip::{chipid, cores};
use bytes::{BufMut, BytesMut};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, trace};

/// Firmware status for an unknown command or variable.
pub const BCME_UNSUPPORTED: i32 = -23;

/// MAC address the simulated firmware reports.
pub const SIM_MAC: [u8; 6] = [0x00, 0x90, 0x4c, 0x0a, 0x43, 0x45];

/// Where presets place the EROM.
pub const SIM_EROM_BASE: u32 = 0x1813_f000;

/// Register windows used by the presets.
pub mod layout {
    use crate::chip::Core;
    use bwfm_chip::cores;

    /// Chip-common.
    pub const CHIPCOMMON: Core = Core {
        id: cores::CHIPCOMMON,
        rev: 43,
        base: 0x1800_0000,
        wrap: 0x1810_0000,
    };
    /// 802.11 MAC.
    pub const D11: Core = Core {
        id: cores::IEEE80211,
        rev: 42,
        base: 0x1800_1000,
        wrap: 0x1810_1000,
    };
    /// ARM CR4 (BCM4345 preset).
    pub const ARM_CR4: Core = Core {
        id: cores::ARM_CR4,
        rev: 7,
        base: 0x1800_2000,
        wrap: 0x1810_2000,
    };
    /// SDIO device core.
    pub const SDIO_DEV: Core = Core {
        id: cores::SDIO_DEV,
        rev: 21,
        base: 0x1800_3000,
        wrap: 0x1810_3000,
    };
    /// ARM CM3 (BCM43430 preset).
    pub const ARM_CM3: Core = Core {
        id: cores::ARM_CM3,
        rev: 9,
        base: 0x1800_4000,
        wrap: 0x1810_4000,
    };
    /// SOCRAM (BCM43430 preset).
    pub const SOCRAM: Core = Core {
        id: cores::INTERNAL_MEM,
        rev: 8,
        base: 0x1800_5000,
        wrap: 0x1810_5000,
    };
}

/// Bank size field for 128 KiB banks (units of 8 KiB, minus one).
const BANK_128K: u32 = 15;

/// Preset BCM4345 RAM size.
pub const BCM4345_RAM_SIZE: u32 = 5 * 128 * 1024;
/// Preset BCM43430 RAM size.
pub const BCM43430_RAM_SIZE: u32 = 4 * 128 * 1024;
/// PMU revision the presets report.
pub const SIM_PMU_REV: u32 = 28;

/// Builds EROM images.
#[derive(Debug, Clone, Default)]
pub struct EromBuilder {
    words: Vec<u32>,
}

impl EromBuilder {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Component descriptor pair.
    #[must_use]
    pub fn component(mut self, id: u16, rev: u8, master_wraps: u8, slave_wraps: u8) -> Self {
        self.words
            .extend_from_slice(&encode_component(id, rev, master_wraps, slave_wraps));
        self
    }

    /// Master port descriptor.
    #[must_use]
    pub fn master_port(mut self, num: u8) -> Self {
        self.words.push(encode_master_port(num));
        self
    }

    /// 32-bit address descriptor.
    #[must_use]
    pub fn address(mut self, base: u32, slave_type: u32, size_type: u32) -> Self {
        self.words.push(encode_address(base, slave_type, size_type));
        self
    }

    /// Arbitrary word.
    #[must_use]
    pub fn raw(mut self, word: u32) -> Self {
        self.words.push(word);
        self
    }

    /// A core with one 4 KiB register window and one slave wrapper.
    #[must_use]
    pub fn core(self, core: &Core) -> Self {
        self.component(core.id, core.rev, 0, 1)
            .address(core.base, slave::TYPE_SLAVE, slave::SIZE_4K)
            .address(core.wrap, slave::TYPE_SWRAP, slave::SIZE_4K)
    }

    /// End-of-table marker.
    #[must_use]
    pub fn eot(mut self) -> Self {
        self.words.push(DESC_EOT);
        self
    }

    /// The finished table.
    pub fn build(self) -> Vec<u32> {
        self.words
    }
}

/// One request seen by [`SimFirmware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FwRequest {
    /// Opcode.
    pub cmd: u32,
    /// Variable name for `GET_VAR` / `SET_VAR`.
    pub var: Option<String>,
    /// Argument bytes (after the name for variables).
    pub data: Vec<u8>,
    /// Set rather than get.
    pub set: bool,
}

/// Scripted firmware answering BCDC requests.
#[derive(Debug, Clone)]
pub struct SimFirmware {
    vars: HashMap<String, Vec<u8>>,
    cmds: HashMap<u32, Vec<u8>>,
    var_failures: HashMap<String, i32>,
    cmd_failures: HashMap<u32, i32>,
    log: Vec<FwRequest>,
}

impl Default for SimFirmware {
    fn default() -> Self {
        Self::new()
    }
}

impl SimFirmware {
    /// Firmware with a MAC address, HT on, VHT off, both bands and an
    /// empty event mask.
    pub fn new() -> Self {
        let mut fw = Self {
            vars: HashMap::new(),
            cmds: HashMap::new(),
            var_failures: HashMap::new(),
            cmd_failures: HashMap::new(),
            log: Vec::new(),
        };
        fw.set_var("cur_etheraddr", &SIM_MAC);
        fw.set_var_int("nmode", 1);
        fw.set_var_int("vhtmode", 0);
        fw.set_var_int("wsec", 0);
        fw.set_var("event_msgs", &[0u8; crate::event::EVENT_MASK_LEN]);
        fw.set_cmd_int(cmd::GET_VERSION, 1);
        let mut bands = Vec::with_capacity(12);
        for word in [2, band::BAND_5G, band::BAND_2G] {
            bands.extend_from_slice(&u32::to_le_bytes(word));
        }
        fw.set_cmd(cmd::GET_BANDLIST, &bands);
        fw
    }

    /// Set variable `name`.
    pub fn set_var(&mut self, name: &str, value: &[u8]) {
        self.vars.insert(name.to_owned(), value.to_vec());
    }

    /// Set a 32-bit variable.
    pub fn set_var_int(&mut self, name: &str, value: u32) {
        self.set_var(name, &value.to_le_bytes());
    }

    /// Forget variable `name`; later gets fail as unsupported.
    pub fn remove_var(&mut self, name: &str) {
        self.vars.remove(name);
    }

    /// Set the value returned for numeric get `cmd`.
    pub fn set_cmd(&mut self, cmd: u32, value: &[u8]) {
        self.cmds.insert(cmd, value.to_vec());
    }

    /// Set a 32-bit numeric command value.
    pub fn set_cmd_int(&mut self, cmd: u32, value: u32) {
        self.set_cmd(cmd, &value.to_le_bytes());
    }

    /// Current value of `name`.
    pub fn var(&self, name: &str) -> Option<&[u8]> {
        self.vars.get(name).map(Vec::as_slice)
    }

    /// Current 32-bit value of `name`.
    pub fn var_int(&self, name: &str) -> Option<u32> {
        le_u32(self.var(name)?)
    }

    /// Last value for numeric command `cmd`.
    pub fn cmd_value(&self, cmd: u32) -> Option<&[u8]> {
        self.cmds.get(&cmd).map(Vec::as_slice)
    }

    /// Last 32-bit value for numeric command `cmd`.
    pub fn cmd_int(&self, cmd: u32) -> Option<u32> {
        le_u32(self.cmd_value(cmd)?)
    }

    /// Answer every access to `name` with firmware `status`.
    pub fn fail_var(&mut self, name: &str, status: i32) {
        self.var_failures.insert(name.to_owned(), status);
    }

    /// Answer every `cmd` with firmware `status`.
    pub fn fail_cmd(&mut self, cmd: u32, status: i32) {
        self.cmd_failures.insert(cmd, status);
    }

    /// Every request, oldest first.
    pub fn requests(&self) -> &[FwRequest] {
        &self.log
    }

    /// Values written to `name`, oldest first.
    pub fn var_writes(&self, name: &str) -> Vec<&[u8]> {
        self.log
            .iter()
            .filter(|r| r.set && r.var.as_deref() == Some(name))
            .map(|r| r.data.as_slice())
            .collect()
    }

    /// Names of variables written, in order.
    pub fn set_var_names(&self) -> Vec<&str> {
        self.log
            .iter()
            .filter(|r| r.set)
            .filter_map(|r| r.var.as_deref())
            .collect()
    }

    /// Handle one request; `Err` carries the firmware status.
    fn handle(&mut self, cmd: u32, set: bool, payload: &[u8]) -> std::result::Result<Vec<u8>, i32> {
        let (var, data) = if cmd == cmd::GET_VAR || cmd == cmd::SET_VAR {
            let nul = payload.iter().position(|&b| b == 0).ok_or(BCME_BADARG)?;
            let name = String::from_utf8_lossy(&payload[..nul]).into_owned();
            (Some(name), payload[nul + 1..].to_vec())
        } else {
            (None, payload.to_vec())
        };
        self.log.push(FwRequest {
            cmd,
            var: var.clone(),
            data: data.clone(),
            set,
        });

        if let Some(&status) = self.cmd_failures.get(&cmd) {
            return Err(status);
        }
        match var {
            Some(name) => {
                if let Some(&status) = self.var_failures.get(&name) {
                    return Err(status);
                }
                if set {
                    self.vars.insert(name, data);
                    Ok(payload.to_vec())
                } else {
                    self.vars.get(&name).cloned().ok_or(BCME_UNSUPPORTED)
                }
            }
            None if set => {
                self.cmds.insert(cmd, data);
                Ok(payload.to_vec())
            }
            None => self.cmds.get(&cmd).cloned().ok_or(BCME_UNSUPPORTED),
        }
    }
}

const BCME_BADARG: i32 = -2;

fn le_u32(raw: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(raw.get(..4)?.try_into().ok()?))
}

#[derive(Debug, Clone)]
struct BankedReg {
    index: u32,
    mask: u32,
    values: Vec<u32>,
}

/// In-process chip model.
#[derive(Debug, Clone, Default)]
pub struct SimBus {
    regs: HashMap<u32, u32>,
    stuck: HashMap<u32, u32>,
    banked: HashMap<u32, BankedReg>,
    failing: HashSet<u32>,
    writes: Vec<(u32, u32)>,
    firmware: SimFirmware,
    responses: VecDeque<Vec<u8>>,
    stale_responses: usize,
    dropped_responses: usize,
    supports_reset: bool,
    resets: usize,
    activated: Option<u32>,
    prepared: bool,
    setup_done: bool,
}

impl SimBus {
    /// Empty register file and default firmware.
    pub fn new() -> Self {
        Self::default()
    }

    /// BCM4345: CR4 CPU, TCM, PMU in chip-common.
    pub fn bcm4345() -> Self {
        let mut bus = Self::new();
        bus.install_chip(
            chipid::BCM4345,
            6,
            &[layout::CHIPCOMMON, layout::D11, layout::ARM_CR4, layout::SDIO_DEV],
        );
        // 3 A banks, 2 B banks
        bus.poke(layout::ARM_CR4.base + ARMCR4_CAP, 0x23);
        bus.bank(
            layout::ARM_CR4.base + ARMCR4_BANKIDX,
            layout::ARM_CR4.base + ARMCR4_BANKINFO,
            0xF,
            &[BANK_128K; 5],
        );
        bus
    }

    /// BCM43430: CM3 CPU, banked SOCRAM, PMU in chip-common.
    pub fn bcm43430() -> Self {
        let mut bus = Self::new();
        bus.install_chip(
            chipid::BCM43430,
            1,
            &[layout::CHIPCOMMON, layout::D11, layout::ARM_CM3, layout::SOCRAM, layout::SDIO_DEV],
        );
        bus.poke(layout::SOCRAM.base + SOCRAM_COREINFO, 4 << 4);
        bus.bank(
            layout::SOCRAM.base + SOCRAM_BANKIDX,
            layout::SOCRAM.base + SOCRAM_BANKINFO,
            0xF,
            &[BANK_128K, BANK_128K, BANK_128K, BANK_128K | 0x0001_0000],
        );
        bus
    }

    /// Program the chip id register, capability words and an EROM listing
    /// `cores`.
    pub fn install_chip(&mut self, chip: u32, rev: u32, chip_cores: &[Core]) {
        let ai = 1 << chipid::CHIPID_TYPE_SHIFT;
        self.poke(
            CHIP_BASE + CHIP_REG_CHIPID,
            ai | (rev << chipid::CHIPID_REV_SHIFT) | (chip & chipid::CHIPID_ID_MASK),
        );
        self.poke(CHIP_BASE + CHIP_REG_CAPABILITIES, capabilities::PMU);
        self.poke(CHIP_BASE + CHIP_REG_PMUCAPABILITIES, 0x0010_0000 | SIM_PMU_REV);
        let erom = chip_cores
            .iter()
            .fold(EromBuilder::new(), |b, core| b.core(core))
            .eot()
            .build();
        self.load_erom(SIM_EROM_BASE, &erom);
        debug!(
            chip = %chipid::chip_name(chip),
            cores = chip_cores.len(),
            cpu = chip_cores.iter().any(|c| cores::is_cpu(c.id)),
            "sim chip installed"
        );
    }

    /// Place an EROM image at `base` and point chip-common at it.
    pub fn load_erom(&mut self, base: u32, words: &[u32]) {
        for (addr, &word) in (base..).step_by(4).zip(words) {
            self.regs.insert(addr, word);
        }
        self.poke(CHIP_BASE + CHIP_REG_EROMPTR, base);
    }

    /// Set a register without logging a write.
    pub fn poke(&mut self, addr: u32, val: u32) {
        self.regs.insert(addr, val);
    }

    /// Current register value as the driver would read it.
    pub fn peek(&self, addr: u32) -> u32 {
        if let Some(&val) = self.stuck.get(&addr) {
            return val;
        }
        if let Some(bank) = self.banked.get(&addr) {
            let idx = self.regs.get(&bank.index).copied().unwrap_or(0) & bank.mask;
            return usize::try_from(idx)
                .ok()
                .and_then(|i| bank.values.get(i))
                .copied()
                .unwrap_or(0);
        }
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    /// Pin `addr` to `val`; writes are logged but ignored.
    pub fn stick(&mut self, addr: u32, val: u32) {
        self.stuck.insert(addr, val);
    }

    /// Make `info` read `values[index & mask]`, where `index` is the last
    /// value written to `index_addr`.
    pub fn bank(&mut self, index_addr: u32, info: u32, mask: u32, values: &[u32]) {
        self.banked.insert(
            info,
            BankedReg {
                index: index_addr,
                mask,
                values: values.to_vec(),
            },
        );
    }

    /// Fail every access to `addr`.
    pub fn fail_at(&mut self, addr: u32) {
        self.failing.insert(addr);
    }

    /// Every register write, oldest first.
    pub fn writes(&self) -> &[(u32, u32)] {
        &self.writes
    }

    /// Firmware model.
    pub const fn firmware(&self) -> &SimFirmware {
        &self.firmware
    }

    /// Firmware model, mutably.
    pub fn firmware_mut(&mut self) -> &mut SimFirmware {
        &mut self.firmware
    }

    /// Precede each of the next `count` responses with one carrying the
    /// previous request id.
    pub fn inject_stale(&mut self, count: usize) {
        self.stale_responses = count;
    }

    /// Swallow the next `count` responses.
    pub fn drop_responses(&mut self, count: usize) {
        self.dropped_responses = count;
    }

    /// Queue a raw control message for the driver to receive.
    pub fn push_response(&mut self, msg: &[u8]) {
        self.responses.push_back(msg.to_vec());
    }

    /// Whether [`Bus::reset`] is honoured.
    pub fn set_supports_reset(&mut self, on: bool) {
        self.supports_reset = on;
    }

    /// Bus resets performed.
    pub const fn resets(&self) -> usize {
        self.resets
    }

    /// Reset vector passed to [`Bus::activate`], if any.
    pub const fn activated(&self) -> Option<u32> {
        self.activated
    }

    /// Whether [`Bus::prepare`] and [`Bus::setup`] ran.
    pub const fn lifecycle(&self) -> (bool, bool) {
        (self.prepared, self.setup_done)
    }

    fn check(&self, addr: u32) -> Result<()> {
        if self.failing.contains(&addr) {
            return Err(BwfmError::transfer_failed(format!(
                "backplane access {addr:#010x} failed"
            )));
        }
        Ok(())
    }

    fn respond(&mut self, req: &BcdcHeader, result: std::result::Result<Vec<u8>, i32>) {
        if self.dropped_responses > 0 {
            self.dropped_responses -= 1;
            trace!(cmd = req.cmd, "sim response dropped");
            return;
        }
        if self.stale_responses > 0 {
            self.stale_responses -= 1;
            let old = req.reqid().wrapping_sub(1);
            let stale = BcdcHeader {
                cmd: req.cmd,
                len: 4,
                flags: (req.flags & !flags::ID_MASK) | (u32::from(old) << flags::ID_SHIFT),
                status: 0,
            };
            let mut msg = BytesMut::new();
            stale.put(&mut msg);
            msg.put_u32_le(0xdead_beef);
            self.responses.push_back(msg.to_vec());
        }

        let (payload, resp_flags, status) = match result {
            Ok(payload) => (payload, req.flags, 0),
            #[allow(clippy::cast_sign_loss)]
            Err(status) => (Vec::new(), req.flags | flags::ERROR, status as u32),
        };
        let hdr = BcdcHeader {
            cmd: req.cmd,
            len: u32::try_from(payload.len()).unwrap_or(u32::MAX),
            flags: resp_flags,
            status,
        };
        let mut msg = BytesMut::with_capacity(BCDC_HEADER_LEN + payload.len());
        hdr.put(&mut msg);
        msg.put_slice(&payload);
        self.responses.push_back(msg.to_vec());
    }
}

impl Bus for SimBus {
    fn read32(&mut self, addr: u32) -> Result<u32> {
        self.check(addr)?;
        Ok(self.peek(addr))
    }

    fn write32(&mut self, addr: u32, val: u32) -> Result<()> {
        self.check(addr)?;
        self.writes.push((addr, val));
        if !self.stuck.contains_key(&addr) {
            self.regs.insert(addr, val);
        }
        Ok(())
    }

    fn txctl(&mut self, msg: &[u8]) -> Result<()> {
        let hdr = BcdcHeader::parse(msg)
            .ok_or_else(|| BwfmError::transfer_failed("control message shorter than header"))?;
        let end = BCDC_HEADER_LEN
            .saturating_add(usize::try_from(hdr.len).unwrap_or(usize::MAX))
            .min(msg.len());
        let result = self
            .firmware
            .handle(hdr.cmd, hdr.is_set(), &msg[BCDC_HEADER_LEN..end]);
        self.respond(&hdr, result);
        Ok(())
    }

    fn rxctl(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        let Some(msg) = self.responses.pop_front() else {
            std::thread::sleep(timeout.min(Duration::from_millis(1)));
            return Ok(None);
        };
        let n = msg.len().min(buf.len());
        buf[..n].copy_from_slice(&msg[..n]);
        Ok(Some(n))
    }

    fn prepare(&mut self) -> Result<()> {
        self.prepared = true;
        Ok(())
    }

    fn supports_reset(&self) -> bool {
        self.supports_reset
    }

    fn reset(&mut self) -> Result<()> {
        self.resets += 1;
        Ok(())
    }

    fn activate(&mut self, reset_vector: u32) -> Result<()> {
        self.activated = Some(reset_vector);
        Ok(())
    }

    fn setup(&mut self) -> Result<()> {
        self.setup_done = true;
        Ok(())
    }

    fn delay_us(&mut self, _us: u32) {}
}
