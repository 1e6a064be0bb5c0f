//! Device orchestration
//!
//! [`BwfmDevice`] ties one bus, one attached chip and one station engine
//! together. The control path (attach, init, stop, rx) runs on the caller;
//! station callbacks are queued on the command ring and executed by
//! [`BwfmDevice::run_pending`], normally from the [`Worker`] started by
//! [`BwfmDevice::spawn_worker`]. Share the device behind a mutex so the two
//! never issue firmware transactions at the same time.

use crate::bcdc::Bcdc;
use crate::bus::Bus;
use crate::chip::Chip;
use crate::cmdq::{CommandQueue, HostCmd, Worker};
use crate::config::DriverConfig;
use crate::error::{BwfmError, Result};
use crate::event::{self, ev, status, EscanResults, EVENT_LAST, EVENT_MASK_LEN};
use crate::fwvar::{cmd, FwVar};
use crate::net80211::{JoinTarget, KeyInfo, Net80211, StationState};
use crate::wire::{self, band, EventMask, WsecKey, CHANNELS_2GHZ, CHANNELS_5GHZ};
use bytes::Buf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Radio band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    /// 2.4 GHz.
    Ghz2,
    /// 5 GHz.
    Ghz5,
}

/// A channel the firmware can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    /// IEEE channel number.
    pub number: u8,
    /// Band.
    pub band: Band,
    /// HT (802.11n) allowed.
    pub ht: bool,
}

impl Channel {
    /// Centre frequency in MHz.
    pub fn freq_mhz(&self) -> u32 {
        let n = u32::from(self.number);
        match self.band {
            Band::Ghz2 if n == 14 => 2484,
            Band::Ghz2 => 2407 + 5 * n,
            Band::Ghz5 => 5000 + 5 * n,
        }
    }
}

/// What firmware attach learned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareInfo {
    /// Firmware io type (`GET_VERSION`).
    pub io_type: u32,
    /// Station MAC address.
    pub mac: [u8; 6],
    /// HT supported.
    pub nmode: u32,
    /// VHT supported.
    pub vhtmode: u32,
    /// Usable channels.
    pub channels: Vec<Channel>,
}

/// One FullMAC device.
#[derive(Debug)]
pub struct BwfmDevice<B: Bus, N: Net80211> {
    proto: Bcdc<B>,
    chip: Option<Chip>,
    fw: Option<FirmwareInfo>,
    station: N,
    queue: Arc<CommandQueue>,
    config: DriverConfig,
    state: StationState,
    running: bool,
}

impl<B: Bus, N: Net80211> BwfmDevice<B, N> {
    /// Device over `bus` reporting to `station`.
    pub fn new(bus: B, station: N, config: DriverConfig) -> Self {
        Self {
            proto: Bcdc::new(bus, config.ctl_timeout),
            chip: None,
            fw: None,
            station,
            queue: Arc::new(CommandQueue::new(config.cmd_ring_capacity)),
            config,
            state: StationState::Init,
            running: false,
        }
    }

    /// Firmware command transport.
    pub fn proto(&mut self) -> &mut Bcdc<B> {
        &mut self.proto
    }

    /// Bus.
    pub fn bus(&self) -> &B {
        self.proto.bus()
    }

    /// Bus, mutably.
    pub fn bus_mut(&mut self) -> &mut B {
        self.proto.bus_mut()
    }

    /// Station engine.
    pub const fn station(&self) -> &N {
        &self.station
    }

    /// Station engine, mutably.
    pub fn station_mut(&mut self) -> &mut N {
        &mut self.station
    }

    /// Attached chip.
    pub const fn chip(&self) -> Option<&Chip> {
        self.chip.as_ref()
    }

    /// Firmware attach result.
    pub const fn firmware(&self) -> Option<&FirmwareInfo> {
        self.fw.as_ref()
    }

    /// Current station state as seen by the driver.
    pub const fn state(&self) -> StationState {
        self.state
    }

    /// True between [`init`](Self::init) and [`stop`](Self::stop).
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Command ring.
    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    /// Configuration in use.
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    // ── Bring-up ─────────────────────────────────────────────────────────

    /// Identify the chip and build its core registry.
    ///
    /// # Errors
    ///
    /// See [`Chip::attach`].
    pub fn chip_attach(&mut self) -> Result<&Chip> {
        let chip = Chip::attach(self.proto.bus_mut())?;
        Ok(&*self.chip.insert(chip))
    }

    /// Release the CPU after firmware download.
    ///
    /// # Errors
    ///
    /// Returns error if the chip is not attached or activation fails.
    pub fn chip_set_active(&mut self, reset_vector: u32) -> Result<()> {
        let chip = self
            .chip
            .as_ref()
            .ok_or_else(|| BwfmError::invalid_state("chip not attached"))?;
        chip.set_active(self.proto.bus_mut(), reset_vector)
    }

    /// Query the running firmware for identity and band support.
    ///
    /// # Errors
    ///
    /// Returns error if the io type, MAC address or band list cannot be
    /// read. `nmode`/`vhtmode` failures fall back to 0.
    pub fn attach(&mut self) -> Result<&FirmwareInfo> {
        let io_type = self.proto.cmd_get_int(cmd::GET_VERSION)?;

        let mut mac = [0u8; 6];
        self.proto.get_data("cur_etheraddr", &mut mac)?;

        let nmode = self.proto.get_int("nmode").unwrap_or(0);
        let vhtmode = self.proto.get_int("vhtmode").unwrap_or(0);

        let mut raw = [0u8; 12];
        let n = self.proto.cmd_get_data(cmd::GET_BANDLIST, &mut raw)?;
        let n = n.min(raw.len());
        let mut words = &raw[..n - n % 4];
        let count = if words.remaining() >= 4 { words.get_u32_le() } else { 0 };

        let mut channels = Vec::new();
        for _ in 0..count {
            if words.remaining() < 4 {
                break;
            }
            match words.get_u32_le() {
                band::BAND_2G => {
                    debug!(nmode, vhtmode, "2 GHz band");
                    channels.extend(CHANNELS_2GHZ.iter().map(|&number| Channel {
                        number,
                        band: Band::Ghz2,
                        ht: nmode != 0,
                    }));
                }
                band::BAND_5G => {
                    debug!(nmode, vhtmode, "5 GHz band");
                    channels.extend(CHANNELS_5GHZ.iter().map(|&number| Channel {
                        number,
                        band: Band::Ghz5,
                        ht: nmode != 0,
                    }));
                }
                other => warn!(band = other, "unsupported band"),
            }
        }

        info!(
            mac = %format_mac(&mac),
            io_type,
            channels = channels.len(),
            "firmware attached"
        );
        Ok(&*self.fw.insert(FirmwareInfo {
            io_type,
            mac,
            nmode,
            vhtmode,
            channels,
        }))
    }

    /// Configure the firmware for station mode and start scanning.
    ///
    /// # Errors
    ///
    /// Returns the first failing mandatory step; best-effort settings are
    /// only logged.
    pub fn init(&mut self) -> Result<()> {
        self.proto.set_int("mpc", 1)?;
        self.proto.set_data("join_pref", &wire::join_pref_params())?;

        let mut raw = [0u8; EVENT_MASK_LEN];
        self.proto.get_data("event_msgs", &mut raw)?;
        let mut mask = EventMask::from_bytes(raw);
        for e in [ev::IF, ev::LINK, ev::ASSOC, ev::SET_SSID, ev::ESCAN_RESULT] {
            mask.enable(e);
        }
        self.proto.set_data("event_msgs", mask.as_bytes())?;

        self.proto
            .cmd_set_int(cmd::SET_SCAN_CHANNEL_TIME, self.config.scan_channel_time)?;
        self.proto
            .cmd_set_int(cmd::SET_SCAN_UNASSOC_TIME, self.config.scan_unassoc_time)?;
        self.proto
            .cmd_set_int(cmd::SET_SCAN_PASSIVE_TIME, self.config.scan_passive_time)?;
        self.proto.cmd_set_int(cmd::SET_PM, self.config.power_mode)?;

        self.best_effort("txbf", |p| p.set_int("txbf", 1));
        self.best_effort("up", |p| p.cmd_set_int(cmd::UP, 0));
        self.best_effort("infra", |p| p.cmd_set_int(cmd::SET_INFRA, 1));
        self.best_effort("ap", |p| p.cmd_set_int(cmd::SET_AP, 0));
        if self.config.disable_offloads {
            for var in ["arp_ol", "arpoe", "ndoe", "toe"] {
                self.best_effort(var, |p| p.set_int(var, 0));
            }
        }
        // The host supplicant runs the 4-way handshake.
        self.best_effort("sup_wpa", |p| p.set_int("sup_wpa", 0));

        self.running = true;
        info!("interface up");
        self.new_state(StationState::Scan, -1)
    }

    /// Take the interface down.
    ///
    /// # Errors
    ///
    /// Returns error if the INIT transition cannot be queued. Firmware
    /// failures are logged.
    pub fn stop(&mut self) -> Result<()> {
        self.running = false;
        self.new_state(StationState::Init, -1)?;
        self.best_effort("down", |p| p.cmd_set_int(cmd::DOWN, 1));
        self.best_effort("pm", |p| p.cmd_set_int(cmd::SET_PM, 0));
        info!("interface down");
        Ok(())
    }

    fn best_effort<F>(&mut self, what: &str, op: F)
    where
        F: FnOnce(&mut Bcdc<B>) -> Result<()>,
    {
        if let Err(e) = op(&mut self.proto) {
            warn!(setting = what, error = %e, "firmware setting failed");
        }
    }

    // ── Station operations ───────────────────────────────────────────────

    /// Program security and start joining the engine's target BSS.
    ///
    /// # Errors
    ///
    /// Returns error if the engine has no target or a mandatory security
    /// setting fails. A rejected `join` falls back to `SET_SSID`.
    pub fn connect(&mut self) -> Result<()> {
        let target = self
            .station
            .join_target()
            .ok_or_else(|| BwfmError::invalid_state("no BSS selected"))?;
        self.connect_to(&target)
    }

    fn connect_to(&mut self, target: &JoinTarget) -> Result<()> {
        if let Some(rsn) = &target.rsn {
            self.proto.set_data("wpaie", &rsn.ie)?;
            self.proto.set_int("wpa_auth", wire::wpa_auth_for(rsn))?;
            self.proto.set_int("wsec", wire::wsec_for(rsn))?;
        } else {
            self.proto.set_int("wpa_auth", wire::wpa_auth::DISABLED)?;
            self.proto.set_int("wsec", wire::wsec::NONE)?;
        }
        self.proto.set_int("auth", wire::AUTH_OPEN)?;
        self.proto.set_int("mfp", wire::MFP_NONE)?;

        if target.ssid.is_empty() || target.ssid.len() >= wire::MAX_SSID_LEN {
            debug!(len = target.ssid.len(), "SSID not joinable, security only");
            return Ok(());
        }

        let params = wire::ext_join_params(&target.ssid, &target.bssid);
        if let Err(e) = self.proto.set_data("join", &params) {
            debug!(error = %e, "extended join rejected, using SET_SSID");
            let params = wire::join_params(&target.ssid, &target.bssid);
            self.proto.cmd_set_data(cmd::SET_SSID, &params)?;
        }
        info!(
            ssid = %String::from_utf8_lossy(&target.ssid),
            bssid = %format_mac(&target.bssid),
            "joining"
        );
        Ok(())
    }

    /// Start a firmware scan. Results arrive as `ESCAN_RESULT` events.
    ///
    /// # Errors
    ///
    /// Propagates the firmware error.
    pub fn scan(&mut self) -> Result<()> {
        self.proto.set_data("escan", &wire::escan_params())
    }

    /// Queue installation of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`BwfmError::QueueFull`] if the ring is full.
    pub fn set_key(&self, key: KeyInfo) -> Result<()> {
        self.queue.enqueue(HostCmd::SetKey(key))
    }

    /// Queue removal of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`BwfmError::QueueFull`] if the ring is full.
    pub fn delete_key(&self, key: KeyInfo) -> Result<()> {
        self.queue.enqueue(HostCmd::DeleteKey(key))
    }

    /// Queue a station state change.
    ///
    /// # Errors
    ///
    /// Returns [`BwfmError::QueueFull`] if the ring is full.
    pub fn new_state(&self, state: StationState, arg: i32) -> Result<()> {
        self.queue.enqueue(HostCmd::NewState { state, arg })
    }

    /// Run every queued command. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let queue = Arc::clone(&self.queue);
        queue.drain(|cmd| self.execute(cmd))
    }

    fn execute(&mut self, cmd: HostCmd) {
        let result = match cmd {
            HostCmd::SetKey(key) => self.install_key(&key),
            HostCmd::DeleteKey(key) => self.remove_key(&key),
            HostCmd::NewState { state, arg } => {
                self.enter_state(state, arg);
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "host command failed");
        }
    }

    fn install_key(&mut self, key: &KeyInfo) -> Result<()> {
        let Some((algo, wsec_enable)) = wire::cipher_algo(key.cipher) else {
            warn!(cipher = ?key.cipher, "cipher not supported");
            return Ok(());
        };

        let ext_key = !key.group && !key.cipher.is_wep();
        let mut record = WsecKey {
            index: u32::from(key.id),
            data: key.key.clone(),
            algo,
            flags: 0,
            ea: [0; 6],
        };
        if ext_key && key.peer[0] & 0x01 == 0 {
            record.ea = key.peer;
        }
        if !ext_key {
            record.flags = wire::WSEC_PRIMARY_KEY;
        }

        self.proto.set_data("wsec_key", &record.encode()?)?;
        let wsec = self.proto.get_int("wsec")?;
        self.proto.set_int("wsec", wsec | wsec_enable)?;
        debug!(id = key.id, cipher = ?key.cipher, "key installed");
        Ok(())
    }

    fn remove_key(&mut self, key: &KeyInfo) -> Result<()> {
        let record = WsecKey {
            index: u32::from(key.id),
            flags: wire::WSEC_PRIMARY_KEY,
            ..WsecKey::default()
        };
        self.proto.set_data("wsec_key", &record.encode()?)?;
        debug!(id = key.id, "key removed");
        Ok(())
    }

    fn enter_state(&mut self, to: StationState, arg: i32) {
        let from = self.state;
        debug!(%from, %to, "state change");
        match to {
            StationState::Scan => {
                if let Err(e) = self.scan() {
                    warn!(error = %e, "scan request failed");
                }
            }
            StationState::Auth => {
                if let Err(e) = self.connect() {
                    warn!(error = %e, "connect failed");
                }
            }
            _ => {}
        }
        self.state = to;
        self.station.state_changed(from, to, arg);
    }

    // ── Receive path ─────────────────────────────────────────────────────

    /// Handle one frame received from the firmware data channel.
    pub fn rx(&mut self, frame: &[u8]) {
        if event::is_event(frame) {
            self.rx_event(frame);
            return;
        }
        if self.station.rsn_active() && event::is_eapol(frame) {
            self.station.recv_eapol(frame);
        } else {
            self.station.recv_data(frame);
        }
    }

    fn rx_event(&mut self, frame: &[u8]) {
        let event = match event::parse_event(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "event dropped");
                return;
            }
        };
        let msg = &event.msg;
        if msg.event_type >= EVENT_LAST {
            return;
        }

        let next = match msg.event_type {
            ev::ESCAN_RESULT => {
                self.rx_escan(msg.status, event.data);
                None
            }
            ev::SET_SSID if msg.status == status::SUCCESS => Some(StationState::Run),
            ev::ASSOC if msg.status == status::SUCCESS => Some(StationState::Assoc),
            ev::SET_SSID | ev::ASSOC => Some(StationState::Scan),
            ev::LINK if msg.status == status::SUCCESS && msg.reason == 0 => None,
            ev::LINK => Some(StationState::Scan),
            other => {
                debug!(
                    event = other,
                    status = msg.status,
                    reason = msg.reason,
                    datalen = msg.datalen,
                    "unhandled event"
                );
                None
            }
        };

        if let Some(state) = next {
            if let Err(e) = self.new_state(state, -1) {
                warn!(%state, error = %e, "state change dropped");
            }
        }
    }

    fn rx_escan(&mut self, scan_status: u32, data: &[u8]) {
        if scan_status != status::PARTIAL {
            self.station.end_scan();
            return;
        }
        let results = match EscanResults::parse(data) {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "scan results dropped");
                return;
            }
        };
        for bss in results.bss() {
            match bss.to_beacon() {
                Some(beacon) => self.station.recv_beacon(&beacon, bss.rssi()),
                None => warn!(bssid = %format_mac(&bss.bssid()), "BSS IEs out of range"),
            }
        }
    }
}

impl<B, N> BwfmDevice<B, N>
where
    B: Bus + 'static,
    N: Net80211 + 'static,
{
    /// Start the worker thread serving `device`'s command ring.
    ///
    /// The thread locks `device` for each drain. Dropping the returned
    /// [`Worker`] never blocks on it; [`Worker::join`] does, so call it
    /// without the device lock held.
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned.
    pub fn spawn_worker(device: &Arc<Mutex<Self>>) -> Result<Worker> {
        let queue = Arc::clone(
            device
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .queue(),
        );
        let dev = Arc::clone(device);
        Worker::spawn("bwfm-task", queue, move || {
            dev.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .run_pending();
        })
    }
}

/// `aa:bb:cc:dd:ee:ff`.
pub fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_frequencies() {
        let ch = |number, band| Channel {
            number,
            band,
            ht: false,
        };
        assert_eq!(ch(1, Band::Ghz2).freq_mhz(), 2412);
        assert_eq!(ch(13, Band::Ghz2).freq_mhz(), 2472);
        assert_eq!(ch(36, Band::Ghz5).freq_mhz(), 5180);
        assert_eq!(ch(165, Band::Ghz5).freq_mhz(), 5825);
    }

    #[test]
    fn mac_formatting() {
        assert_eq!(format_mac(&[0, 0x10, 0x18, 0xab, 0xcd, 0xef]), "00:10:18:ab:cd:ef");
    }
}
