//! Firmware request structures
//!
//! Little-endian, naturally aligned layouts the firmware expects as
//! variable payloads. Everything is encoded into [`BytesMut`] field by
//! field; nothing is transmuted.

use crate::error::{BwfmError, Result};
use crate::event::{EVENT_LAST, EVENT_MASK_LEN};
use crate::net80211::{Akm, Cipher, RsnConfig, RsnProto};
use bytes::{BufMut, BytesMut};

/// Longest SSID the firmware accepts.
pub const MAX_SSID_LEN: usize = 32;
/// Broadcast address.
pub const ETHER_BROADCAST: [u8; 6] = [0xff; 6];

/// 2.4 GHz channels the driver enables.
pub const CHANNELS_2GHZ: [u8; 13] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13];
/// 5 GHz channels the driver enables.
pub const CHANNELS_5GHZ: [u8; 29] = [
    34, 36, 38, 40, 42, 44, 46, 48, 52, 56, 60, 64, 100, 104, 108, 112, 116, 120, 124, 128, 132,
    136, 140, 144, 149, 153, 157, 161, 165,
];

/// Band ids reported by `GET_BANDLIST`.
pub mod band {
    /// 5 GHz.
    pub const BAND_5G: u32 = 1;
    /// 2.4 GHz.
    pub const BAND_2G: u32 = 2;
}

/// `wpa_auth` values.
pub mod wpa_auth {
    /// No WPA.
    pub const DISABLED: u32 = 0x0000;
    /// WPA with 802.1X.
    pub const WPA_UNSPECIFIED: u32 = 0x0002;
    /// WPA-PSK.
    pub const WPA_PSK: u32 = 0x0004;
    /// WPA2 with 802.1X.
    pub const WPA2_UNSPECIFIED: u32 = 0x0040;
    /// WPA2-PSK.
    pub const WPA2_PSK: u32 = 0x0080;
    /// WPA2 802.1X with SHA-256.
    pub const WPA2_1X_SHA256: u32 = 0x1000;
    /// WPA2-PSK with SHA-256.
    pub const WPA2_PSK_SHA256: u32 = 0x8000;
}

/// `wsec` bits.
pub mod wsec {
    /// Open.
    pub const NONE: u32 = 0;
    /// WEP.
    pub const WEP: u32 = 1 << 0;
    /// TKIP.
    pub const TKIP: u32 = 1 << 1;
    /// AES.
    pub const AES: u32 = 1 << 2;
}

/// `auth` value for open system.
pub const AUTH_OPEN: u32 = 0;
/// `mfp` value for no management frame protection.
pub const MFP_NONE: u32 = 0;

/// Crypto algorithms in a `wsec_key` record.
pub mod crypto_algo {
    /// WEP 40.
    pub const WEP1: u32 = 1;
    /// TKIP.
    pub const TKIP: u32 = 2;
    /// WEP 104.
    pub const WEP128: u32 = 3;
    /// AES-CCM.
    pub const AES_CCM: u32 = 4;
}

/// `wsec_key` flag for the primary (default transmit) key.
pub const WSEC_PRIMARY_KEY: u32 = 1 << 1;

/// Join preference types.
pub mod join_pref {
    /// Plain RSSI.
    pub const RSSI: u8 = 1;
    /// RSSI with a per-band boost.
    pub const RSSI_DELTA: u8 = 4;
    /// Boost applied to the preferred band (dB).
    pub const RSSI_BOOST: u8 = 8;
    /// 5 GHz band selector.
    pub const BAND_5G: u8 = 1;
}

/// Escan request version.
pub const ESCAN_REQ_VERSION: u32 = 1;
/// Escan action: start.
pub const ESCAN_ACTION_START: u16 = 1;
/// Sync id the driver stamps on scans.
pub const ESCAN_SYNC_ID: u16 = 0x1234;
/// Scan type: passive.
pub const SCANTYPE_PASSIVE: u8 = 1;
/// BSS type: any.
pub const BSS_TYPE_ANY: u8 = 2;

/// Encoded `wsec_key` length.
pub const WSEC_KEY_LEN: usize = 164;
/// Encoded join parameters length.
pub const JOIN_PARAMS_LEN: usize = 52;
/// Encoded extended join parameters length.
pub const EXT_JOIN_PARAMS_LEN: usize = 72;
/// Encoded escan request length (no channels, no SSIDs).
pub const ESCAN_PARAMS_LEN: usize = 76;

fn put_ssid(buf: &mut BytesMut, ssid: &[u8]) {
    let len = ssid.len().min(MAX_SSID_LEN);
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u32_le(len as u32);
    let mut raw = [0u8; MAX_SSID_LEN];
    raw[..len].copy_from_slice(&ssid[..len]);
    buf.put_slice(&raw);
}

fn put_assoc_params(buf: &mut BytesMut, bssid: &[u8; 6]) {
    buf.put_slice(bssid);
    buf.put_bytes(0, 2);
    buf.put_u32_le(0); // chanspec_num
    buf.put_u16_le(0); // chanspec_list[0]
    buf.put_bytes(0, 2);
}

/// Join preferences: RSSI with a 5 GHz boost, then plain RSSI.
pub const fn join_pref_params() -> [u8; 8] {
    [
        join_pref::RSSI_DELTA,
        2,
        join_pref::RSSI_BOOST,
        join_pref::BAND_5G,
        join_pref::RSSI,
        2,
        0,
        0,
    ]
}

/// Parameters for `SET_SSID`.
pub fn join_params(ssid: &[u8], bssid: &[u8; 6]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(JOIN_PARAMS_LEN);
    put_ssid(&mut buf, ssid);
    put_assoc_params(&mut buf, bssid);
    buf
}

/// Parameters for the `join` variable. Scan fields are left to the
/// firmware (-1).
pub fn ext_join_params(ssid: &[u8], bssid: &[u8; 6]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(EXT_JOIN_PARAMS_LEN);
    put_ssid(&mut buf, ssid);
    buf.put_i8(-1); // scan_type
    buf.put_bytes(0, 3);
    buf.put_i32_le(-1); // nprobes
    buf.put_i32_le(-1); // active_time
    buf.put_i32_le(-1); // passive_time
    buf.put_i32_le(-1); // home_time
    put_assoc_params(&mut buf, bssid);
    buf
}

/// Parameters for the `escan` variable: passive scan of every channel
/// for any BSS.
pub fn escan_params() -> BytesMut {
    let mut buf = BytesMut::with_capacity(ESCAN_PARAMS_LEN);
    buf.put_u32_le(ESCAN_REQ_VERSION);
    buf.put_u16_le(ESCAN_ACTION_START);
    buf.put_u16_le(ESCAN_SYNC_ID);
    put_ssid(&mut buf, &[]);
    buf.put_slice(&ETHER_BROADCAST);
    buf.put_u8(BSS_TYPE_ANY);
    buf.put_u8(SCANTYPE_PASSIVE);
    buf.put_i32_le(-1); // nprobes
    buf.put_i32_le(-1); // active_time
    buf.put_i32_le(-1); // passive_time
    buf.put_i32_le(-1); // home_time
    buf.put_u32_le(0); // channel_num
    buf.put_u16_le(0); // channel_list[0]
    buf.put_bytes(0, 2);
    buf
}

/// Firmware key record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WsecKey {
    /// Key index.
    pub index: u32,
    /// Key material (up to 32 bytes).
    pub data: Vec<u8>,
    /// Crypto algorithm.
    pub algo: u32,
    /// Flags.
    pub flags: u32,
    /// Peer address for pairwise keys, zero otherwise.
    pub ea: [u8; 6],
}

impl WsecKey {
    /// Encode into the 164-byte firmware record.
    ///
    /// # Errors
    ///
    /// Returns error if the key material is longer than 32 bytes.
    pub fn encode(&self) -> Result<BytesMut> {
        let mut data = [0u8; 32];
        if self.data.len() > data.len() {
            return Err(BwfmError::invalid_argument(format!(
                "key of {} bytes",
                self.data.len()
            )));
        }
        data[..self.data.len()].copy_from_slice(&self.data);

        let mut buf = BytesMut::with_capacity(WSEC_KEY_LEN);
        buf.put_u32_le(self.index);
        #[allow(clippy::cast_possible_truncation)]
        buf.put_u32_le(self.data.len() as u32);
        buf.put_slice(&data);
        buf.put_bytes(0, 18 * 4); // pad_1
        buf.put_u32_le(self.algo);
        buf.put_u32_le(self.flags);
        buf.put_bytes(0, 3 * 4); // pad_2
        buf.put_u32_le(0); // iv_initialized
        buf.put_u32_le(0); // pad_3
        buf.put_u32_le(0); // rxiv.hi
        buf.put_u16_le(0); // rxiv.lo
        buf.put_bytes(0, 2);
        buf.put_bytes(0, 2 * 4); // pad_4
        buf.put_slice(&self.ea);
        buf.put_bytes(0, 2);
        Ok(buf)
    }
}

/// Firmware algorithm and `wsec` enable bit for `cipher`, if the firmware
/// offloads it.
pub const fn cipher_algo(cipher: Cipher) -> Option<(u32, u32)> {
    match cipher {
        Cipher::Wep40 => Some((crypto_algo::WEP1, wsec::WEP)),
        Cipher::Wep104 => Some((crypto_algo::WEP128, wsec::WEP)),
        Cipher::Tkip => Some((crypto_algo::TKIP, wsec::TKIP)),
        Cipher::Ccmp => Some((crypto_algo::AES_CCM, wsec::AES)),
        Cipher::Bip => None,
    }
}

/// `wpa_auth` value for the enabled protocols and AKMs.
pub fn wpa_auth_for(rsn: &RsnConfig) -> u32 {
    let has = |akm: Akm| rsn.akms.contains(&akm);
    let mut auth = wpa_auth::DISABLED;
    if rsn.protocols.contains(&RsnProto::Wpa) {
        if has(Akm::Psk) {
            auth |= wpa_auth::WPA_PSK;
        }
        if has(Akm::Ieee8021x) {
            auth |= wpa_auth::WPA_UNSPECIFIED;
        }
    }
    if rsn.protocols.contains(&RsnProto::Rsn) {
        if has(Akm::Psk) {
            auth |= wpa_auth::WPA2_PSK;
        }
        if has(Akm::Sha256Psk) {
            auth |= wpa_auth::WPA2_PSK_SHA256;
        }
        if has(Akm::Ieee8021x) {
            auth |= wpa_auth::WPA2_UNSPECIFIED;
        }
        if has(Akm::Sha256Ieee8021x) {
            auth |= wpa_auth::WPA2_1X_SHA256;
        }
    }
    auth
}

/// `wsec` value for the enabled pairwise and group ciphers.
pub fn wsec_for(rsn: &RsnConfig) -> u32 {
    let uses = |c: Cipher| rsn.group == c || rsn.pairwise.contains(&c);
    let mut bits = wsec::NONE;
    if uses(Cipher::Tkip) {
        bits |= wsec::TKIP;
    }
    if uses(Cipher::Ccmp) {
        bits |= wsec::AES;
    }
    bits
}

/// The `event_msgs` bitmap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventMask([u8; EVENT_MASK_LEN]);

impl EventMask {
    /// Mask from the raw firmware bytes.
    pub const fn from_bytes(raw: [u8; EVENT_MASK_LEN]) -> Self {
        Self(raw)
    }

    /// Enable delivery of `event`. Ids beyond the mask are ignored.
    pub fn enable(&mut self, event: u32) {
        if event < EVENT_LAST {
            self.0[(event / 8) as usize] |= 1 << (event % 8);
        }
    }

    /// Whether `event` is enabled.
    pub const fn is_enabled(&self, event: u32) -> bool {
        event < EVENT_LAST && self.0[(event / 8) as usize] & (1 << (event % 8)) != 0
    }

    /// Raw bytes for the firmware.
    pub const fn as_bytes(&self) -> &[u8; EVENT_MASK_LEN] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ev;

    #[test]
    fn encoded_lengths() {
        assert_eq!(join_params(b"net", &[1; 6]).len(), JOIN_PARAMS_LEN);
        assert_eq!(ext_join_params(b"net", &[1; 6]).len(), EXT_JOIN_PARAMS_LEN);
        assert_eq!(escan_params().len(), ESCAN_PARAMS_LEN);
        assert_eq!(WsecKey::default().encode().unwrap().len(), WSEC_KEY_LEN);
    }

    #[test]
    fn escan_layout() {
        let p = escan_params();
        assert_eq!(&p[0..4], &1u32.to_le_bytes());
        assert_eq!(&p[4..6], &1u16.to_le_bytes());
        assert_eq!(&p[6..8], &0x1234u16.to_le_bytes());
        // scan_params starts at 8: ssid (36), bssid, bss_type, scan_type
        assert_eq!(&p[44..50], &ETHER_BROADCAST);
        assert_eq!(p[50], BSS_TYPE_ANY);
        assert_eq!(p[51], SCANTYPE_PASSIVE);
        assert_eq!(&p[52..56], &(-1i32).to_le_bytes());
        assert_eq!(&p[64..68], &(-1i32).to_le_bytes());
        assert_eq!(&p[68..72], &0u32.to_le_bytes());
    }

    #[test]
    fn ext_join_layout() {
        let p = ext_join_params(b"home", &[0xaa; 6]);
        assert_eq!(&p[0..4], &4u32.to_le_bytes());
        assert_eq!(&p[4..8], b"home");
        assert_eq!(p[36], 0xff);
        assert_eq!(&p[40..44], &(-1i32).to_le_bytes());
        assert_eq!(&p[56..62], &[0xaa; 6]);
    }

    #[test]
    fn wsec_key_layout() {
        let key = WsecKey {
            index: 2,
            data: vec![0x11; 16],
            algo: crypto_algo::AES_CCM,
            flags: WSEC_PRIMARY_KEY,
            ea: [1, 2, 3, 4, 5, 6],
        };
        let raw = key.encode().unwrap();
        assert_eq!(&raw[0..4], &2u32.to_le_bytes());
        assert_eq!(&raw[4..8], &16u32.to_le_bytes());
        assert_eq!(&raw[8..24], &[0x11; 16]);
        assert_eq!(&raw[112..116], &4u32.to_le_bytes());
        assert_eq!(&raw[116..120], &2u32.to_le_bytes());
        assert_eq!(&raw[156..162], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn oversize_key_rejected() {
        let key = WsecKey {
            data: vec![0; 33],
            ..WsecKey::default()
        };
        assert!(key.encode().is_err());
    }

    #[test]
    fn wpa2_psk_ccmp() {
        let rsn = RsnConfig {
            ie: Vec::new(),
            protocols: vec![RsnProto::Rsn],
            akms: vec![Akm::Psk, Akm::Sha256Psk],
            pairwise: vec![Cipher::Ccmp],
            group: Cipher::Tkip,
        };
        assert_eq!(wpa_auth_for(&rsn), wpa_auth::WPA2_PSK | wpa_auth::WPA2_PSK_SHA256);
        assert_eq!(wsec_for(&rsn), wsec::AES | wsec::TKIP);
    }

    #[test]
    fn event_mask_bits() {
        let mut mask = EventMask::default();
        for e in [ev::IF, ev::LINK, ev::ASSOC, ev::SET_SSID, ev::ESCAN_RESULT] {
            mask.enable(e);
        }
        assert_eq!(mask.as_bytes()[0], 0x81); // SET_SSID 0, ASSOC 7
        assert_eq!(mask.as_bytes()[2], 0x01); // LINK 16
        assert_eq!(mask.as_bytes()[6], 0x40); // IF 54
        assert_eq!(mask.as_bytes()[8], 0x20); // ESCAN_RESULT 69
        mask.enable(500);
        assert!(mask.is_enabled(ev::LINK));
        assert!(!mask.is_enabled(ev::LINK + 1));
    }
}
