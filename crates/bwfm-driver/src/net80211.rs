//! 802.11 station engine interface
//!
//! The station state machine, scan table and key management live outside
//! the driver. The driver calls into it through [`Net80211`] and is called
//! back through the device entry points ([`crate::BwfmDevice::new_state`],
//! [`crate::BwfmDevice::set_key`] and friends).

use std::fmt;

/// Station state, in the order a connection walks through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationState {
    /// Interface down.
    Init,
    /// Looking for a BSS.
    Scan,
    /// Authenticating with the chosen BSS.
    Auth,
    /// Associated.
    Assoc,
    /// Data path open.
    Run,
}

impl fmt::Display for StationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "INIT",
            Self::Scan => "SCAN",
            Self::Auth => "AUTH",
            Self::Assoc => "ASSOC",
            Self::Run => "RUN",
        })
    }
}

/// Cipher suites the engine may hand to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cipher {
    /// WEP with a 40-bit key.
    Wep40,
    /// WEP with a 104-bit key.
    Wep104,
    /// TKIP.
    Tkip,
    /// CCMP (AES).
    Ccmp,
    /// BIP (management frame protection); not offloaded.
    Bip,
}

impl Cipher {
    /// True for the WEP variants.
    pub const fn is_wep(self) -> bool {
        matches!(self, Self::Wep40 | Self::Wep104)
    }
}

/// RSN protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsnProto {
    /// WPA1.
    Wpa,
    /// WPA2 / RSN.
    Rsn,
}

/// Authentication and key management suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Akm {
    /// Pre-shared key.
    Psk,
    /// 802.1X.
    Ieee8021x,
    /// Pre-shared key with SHA-256 key derivation.
    Sha256Psk,
    /// 802.1X with SHA-256 key derivation.
    Sha256Ieee8021x,
}

/// Security settings for a protected BSS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsnConfig {
    /// WPA or RSN information element to put in the (re)association request.
    pub ie: Vec<u8>,
    /// Protocols enabled.
    pub protocols: Vec<RsnProto>,
    /// AKMs enabled.
    pub akms: Vec<Akm>,
    /// Pairwise ciphers enabled.
    pub pairwise: Vec<Cipher>,
    /// Group cipher.
    pub group: Cipher,
}

/// The BSS the engine wants to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTarget {
    /// Desired SSID.
    pub ssid: Vec<u8>,
    /// BSSID of the chosen node.
    pub bssid: [u8; 6],
    /// Security, `None` for an open network.
    pub rsn: Option<RsnConfig>,
}

/// Key handed down by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    /// Key index.
    pub id: u8,
    /// Cipher.
    pub cipher: Cipher,
    /// Key material, at most 32 bytes.
    pub key: Vec<u8>,
    /// Group key (as opposed to pairwise).
    pub group: bool,
    /// BSSID of the node the key belongs to.
    pub peer: [u8; 6],
}

/// Upcalls from the driver into the station engine.
pub trait Net80211: Send {
    /// BSS currently selected for association, if any.
    fn join_target(&self) -> Option<JoinTarget>;

    /// True when RSN is negotiated and EAPOL frames go to the supplicant.
    fn rsn_active(&self) -> bool;

    /// The driver moved from `from` to `to`.
    fn state_changed(&mut self, from: StationState, to: StationState, arg: i32);

    /// Firmware finished a scan.
    fn end_scan(&mut self);

    /// A beacon synthesized from a scan result.
    fn recv_beacon(&mut self, frame: &[u8], rssi: i16);

    /// An EAPOL frame for the supplicant.
    fn recv_eapol(&mut self, frame: &[u8]);

    /// A data frame for the network stack.
    fn recv_data(&mut self, frame: &[u8]);
}

/// Station engine that records every upcall.
///
/// Useful for tools and tests that drive the device without a real
/// network stack.
#[derive(Debug, Default, Clone)]
pub struct RecordingStation {
    /// Target returned from [`Net80211::join_target`].
    pub target: Option<JoinTarget>,
    /// Transitions seen, oldest first.
    pub transitions: Vec<(StationState, StationState)>,
    /// Completed scans.
    pub scans_done: usize,
    /// Beacons with their RSSI.
    pub beacons: Vec<(Vec<u8>, i16)>,
    /// EAPOL frames.
    pub eapol: Vec<Vec<u8>>,
    /// Data frames.
    pub data: Vec<Vec<u8>>,
}

impl RecordingStation {
    /// Recorder that will try to join `target`.
    pub fn with_target(target: JoinTarget) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    /// Most recent state, if any transition happened.
    pub fn state(&self) -> Option<StationState> {
        self.transitions.last().map(|&(_, to)| to)
    }
}

impl Net80211 for RecordingStation {
    fn join_target(&self) -> Option<JoinTarget> {
        self.target.clone()
    }

    fn rsn_active(&self) -> bool {
        self.target.as_ref().is_some_and(|t| t.rsn.is_some())
    }

    fn state_changed(&mut self, from: StationState, to: StationState, _arg: i32) {
        self.transitions.push((from, to));
    }

    fn end_scan(&mut self) {
        self.scans_done += 1;
    }

    fn recv_beacon(&mut self, frame: &[u8], rssi: i16) {
        self.beacons.push((frame.to_vec(), rssi));
    }

    fn recv_eapol(&mut self, frame: &[u8]) {
        self.eapol.push(frame.to_vec());
    }

    fn recv_data(&mut self, frame: &[u8]) {
        self.data.push(frame.to_vec());
    }
}
