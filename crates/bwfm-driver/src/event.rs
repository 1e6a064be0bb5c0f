//! Firmware event and scan-result decoding
//!
//! Firmware events arrive on the data path as Ethernet frames with the
//! link-control ethertype and a vendor header. Unlike the control channel,
//! all event header fields are big-endian:
//!
//! ```text
//! 0   ethernet header      dst(6) src(6) type(2) = 0x886c
//! 14  vendor header        subtype(2) length(2) version(1) oui(3) usr_subtype(2)
//! 24  event message        version(2) flags(2) event_type(4) status(4) reason(4)
//!                          auth_type(4) datalen(4) addr(6) ifname(16) ifidx(1) bsscfgidx(1)
//! 72  event data
//! ```
//!
//! Escan results inside `ESCAN_RESULT` event data are little-endian again.

use crate::error::{BwfmError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

/// Ethertype of firmware events.
pub const ETHERTYPE_LINK_CTL: u16 = 0x886c;
/// Ethertype of EAPOL frames.
pub const ETHERTYPE_PAE: u16 = 0x888e;
/// Vendor OUI on event frames.
pub const BRCM_OUI: [u8; 3] = [0x00, 0x10, 0x18];
/// Vendor user subtype of events.
pub const BRCM_SUBTYPE_EVENT: u16 = 1;

/// Ethernet header length.
pub const ETHER_HDR_LEN: usize = 14;
/// Offset of the event message.
const MSG_OFFSET: usize = ETHER_HDR_LEN + 10;
/// Full event header length.
pub const EVENT_HDR_LEN: usize = MSG_OFFSET + 48;

/// Number of event ids the firmware defines.
pub const EVENT_LAST: u32 = 139;
/// Bytes in the `event_msgs` bitmap.
pub const EVENT_MASK_LEN: usize = 18;

/// Event ids the driver enables or handles.
pub mod ev {
    /// Join by SSID completed.
    pub const SET_SSID: u32 = 0;
    /// Association completed.
    pub const ASSOC: u32 = 7;
    /// Link up or down.
    pub const LINK: u32 = 16;
    /// Interface added or removed.
    pub const IF: u32 = 54;
    /// Incremental scan results.
    pub const ESCAN_RESULT: u32 = 69;
}

/// Event status values.
pub mod status {
    /// Operation succeeded.
    pub const SUCCESS: u32 = 0;
    /// More results follow.
    pub const PARTIAL: u32 = 8;
}

/// Decoded event message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMsg {
    /// Message version.
    pub version: u16,
    /// Flags.
    pub flags: u16,
    /// Event id.
    pub event_type: u32,
    /// Status.
    pub status: u32,
    /// Reason code.
    pub reason: u32,
    /// Authentication type.
    pub auth_type: u32,
    /// Length of the event data.
    pub datalen: u32,
    /// Peer address.
    pub addr: [u8; 6],
    /// Interface name.
    pub ifname: [u8; 16],
    /// Interface index.
    pub ifidx: u8,
    /// BSS configuration index.
    pub bsscfgidx: u8,
}

/// An event frame: header plus the trailing event data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<'a> {
    /// Message header.
    pub msg: EventMsg,
    /// Event data following the header.
    pub data: &'a [u8],
}

fn ethertype(frame: &[u8]) -> Option<u16> {
    frame
        .get(12..ETHER_HDR_LEN)
        .map(|mut b| b.get_u16())
}

/// True if `frame` is a firmware event.
pub fn is_event(frame: &[u8]) -> bool {
    if frame.len() < MSG_OFFSET || ethertype(frame) != Some(ETHERTYPE_LINK_CTL) {
        return false;
    }
    let vendor = &frame[ETHER_HDR_LEN..MSG_OFFSET];
    vendor[5..8] == BRCM_OUI && (&vendor[8..10]).get_u16() == BRCM_SUBTYPE_EVENT
}

/// True if `frame` carries EAPOL.
pub fn is_eapol(frame: &[u8]) -> bool {
    ethertype(frame) == Some(ETHERTYPE_PAE)
}

/// Decode an event frame.
///
/// # Errors
///
/// Returns error if the frame is not an event or is shorter than the event
/// header.
pub fn parse_event(frame: &[u8]) -> Result<Event<'_>> {
    if !is_event(frame) {
        return Err(BwfmError::malformed_frame("not a firmware event"));
    }
    if frame.len() < EVENT_HDR_LEN {
        return Err(BwfmError::malformed_frame(format!(
            "event of {} bytes, header needs {EVENT_HDR_LEN}",
            frame.len()
        )));
    }

    let mut b = &frame[MSG_OFFSET..EVENT_HDR_LEN];
    let version = b.get_u16();
    let flags = b.get_u16();
    let event_type = b.get_u32();
    let status = b.get_u32();
    let reason = b.get_u32();
    let auth_type = b.get_u32();
    let datalen = b.get_u32();
    let mut addr = [0u8; 6];
    b.copy_to_slice(&mut addr);
    let mut ifname = [0u8; 16];
    b.copy_to_slice(&mut ifname);
    let ifidx = b.get_u8();
    let bsscfgidx = b.get_u8();

    Ok(Event {
        msg: EventMsg {
            version,
            flags,
            event_type,
            status,
            reason,
            auth_type,
            datalen,
            addr,
            ifname,
            ifidx,
            bsscfgidx,
        },
        data: &frame[EVENT_HDR_LEN..],
    })
}

/// Build an event frame. Used by simulated firmware and fixtures.
pub fn build_event(msg: &EventMsg, data: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(EVENT_HDR_LEN + data.len());
    buf.put_slice(&[0xff; 6]);
    buf.put_slice(&msg.addr);
    buf.put_u16(ETHERTYPE_LINK_CTL);

    buf.put_u16(0x8001); // subtype
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u16((EVENT_HDR_LEN - ETHER_HDR_LEN + data.len()) as u16);
    buf.put_u8(0); // version
    buf.put_slice(&BRCM_OUI);
    buf.put_u16(BRCM_SUBTYPE_EVENT);

    buf.put_u16(msg.version);
    buf.put_u16(msg.flags);
    buf.put_u32(msg.event_type);
    buf.put_u32(msg.status);
    buf.put_u32(msg.reason);
    buf.put_u32(msg.auth_type);
    buf.put_u32(msg.datalen);
    buf.put_slice(&msg.addr);
    buf.put_slice(&msg.ifname);
    buf.put_u8(msg.ifidx);
    buf.put_u8(msg.bsscfgidx);
    buf.put_slice(data);
    buf
}

impl EventMsg {
    /// Message with only the id, status and reason set.
    pub const fn new(event_type: u32, status: u32, reason: u32) -> Self {
        Self {
            version: 2,
            flags: 0,
            event_type,
            status,
            reason,
            auth_type: 0,
            datalen: 0,
            addr: [0; 6],
            ifname: [0; 16],
            ifidx: 0,
            bsscfgidx: 0,
        }
    }
}

// ── Escan results ────────────────────────────────────────────────────────────

/// Escan results header length.
pub const ESCAN_RESULTS_HDR_LEN: usize = 12;
/// Fixed part of a BSS info record.
pub const BSS_INFO_LEN: usize = 128;

/// One `ESCAN_RESULT` payload.
#[derive(Debug, Clone, Copy)]
pub struct EscanResults<'a> {
    /// Declared buffer length.
    pub buflen: u32,
    /// Results version.
    pub version: u32,
    /// Sync id of the scan request.
    pub sync_id: u16,
    /// Number of BSS records.
    pub bss_count: u16,
    records: &'a [u8],
}

impl<'a> EscanResults<'a> {
    /// Validate the results header against the event data length.
    ///
    /// # Errors
    ///
    /// Returns error if the data is shorter than the header, shorter than
    /// the declared `buflen`, or too short for `bss_count` fixed records.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < ESCAN_RESULTS_HDR_LEN {
            return Err(BwfmError::malformed_frame("escan results too small"));
        }
        let mut b = &data[..ESCAN_RESULTS_HDR_LEN];
        let buflen = b.get_u32_le();
        let version = b.get_u32_le();
        let sync_id = b.get_u16_le();
        let bss_count = b.get_u16_le();

        if usize::try_from(buflen).map_or(true, |l| data.len() < l) {
            return Err(BwfmError::malformed_frame(format!(
                "escan buflen {buflen} exceeds {} received bytes",
                data.len()
            )));
        }
        let records = &data[ESCAN_RESULTS_HDR_LEN..];
        if records.len() < usize::from(bss_count) * BSS_INFO_LEN {
            return Err(BwfmError::malformed_frame(format!(
                "{bss_count} BSS records do not fit in {} bytes",
                records.len()
            )));
        }

        Ok(Self {
            buflen,
            version,
            sync_id,
            bss_count,
            records,
        })
    }

    /// BSS records, walked by each record's declared length.
    pub const fn bss(&self) -> BssIter<'a> {
        BssIter {
            rest: self.records,
            left: self.bss_count,
        }
    }
}

/// Iterator over the BSS records of an [`EscanResults`].
#[derive(Debug, Clone)]
pub struct BssIter<'a> {
    rest: &'a [u8],
    left: u16,
}

impl<'a> Iterator for BssIter<'a> {
    type Item = BssInfo<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.left == 0 || self.rest.len() < BSS_INFO_LEN {
            return None;
        }
        self.left -= 1;

        let declared = (&self.rest[4..8]).get_u32_le();
        let len = match usize::try_from(declared) {
            Ok(l) if (BSS_INFO_LEN..=self.rest.len()).contains(&l) => l,
            _ => {
                warn!(declared, remaining = self.rest.len(), "bad BSS record length");
                self.left = 0;
                return None;
            }
        };
        let (record, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(BssInfo { raw: record })
    }
}

/// One BSS record, borrowed from the event buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BssInfo<'a> {
    raw: &'a [u8],
}

impl<'a> BssInfo<'a> {
    /// Record length as declared.
    pub fn length(&self) -> u32 {
        (&self.raw[4..8]).get_u32_le()
    }

    /// BSSID.
    pub fn bssid(&self) -> [u8; 6] {
        let mut out = [0u8; 6];
        out.copy_from_slice(&self.raw[8..14]);
        out
    }

    /// Beacon interval (TU).
    pub fn beacon_period(&self) -> u16 {
        (&self.raw[14..16]).get_u16_le()
    }

    /// Capability field.
    pub fn capability(&self) -> u16 {
        (&self.raw[16..18]).get_u16_le()
    }

    /// SSID as reported in the fixed part.
    pub fn ssid(&self) -> &'a [u8] {
        let len = usize::from(self.raw[18]).min(32);
        &self.raw[19..19 + len]
    }

    /// Received signal strength (dBm).
    pub fn rssi(&self) -> i16 {
        (&self.raw[78..80]).get_i16_le()
    }

    /// Information elements, or `None` if the declared range falls outside
    /// the record.
    pub fn ies(&self) -> Option<&'a [u8]> {
        let off = usize::from((&self.raw[116..118]).get_u16_le());
        let len = usize::try_from((&self.raw[120..124]).get_u32_le()).ok()?;
        let end = off.checked_add(len)?;
        self.raw.get(off..end)
    }

    /// Beacon frame carrying this record's fields and IEs, for handing to
    /// the station engine's management input.
    pub fn to_beacon(&self) -> Option<Bytes> {
        let ies = self.ies()?;
        let bssid = self.bssid();
        let mut buf = BytesMut::with_capacity(BEACON_HDR_LEN + BEACON_FIXED_LEN + ies.len());
        buf.put_u8(0x80); // mgmt | beacon
        buf.put_u8(0x00); // no DS
        buf.put_u16_le(0); // duration
        buf.put_slice(&[0xff; 6]);
        buf.put_slice(&bssid);
        buf.put_slice(&bssid);
        buf.put_u16_le(0); // seq
        buf.put_bytes(0, 8); // timestamp
        buf.put_u16_le(self.beacon_period());
        buf.put_u16_le(self.capability());
        buf.put_slice(ies);
        Some(buf.freeze())
    }
}

/// 802.11 management header length.
pub const BEACON_HDR_LEN: usize = 24;
/// Timestamp, interval and capability.
pub const BEACON_FIXED_LEN: usize = 12;

/// Fixture builder for a BSS record with IEs appended after the fixed part.
pub fn build_bss_info(bssid: [u8; 6], ssid: &[u8], rssi: i16, ies: &[u8]) -> BytesMut {
    let len = BSS_INFO_LEN + ies.len();
    let mut buf = BytesMut::with_capacity(len);
    buf.put_u32_le(109); // version
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u32_le(len as u32);
    buf.put_slice(&bssid);
    buf.put_u16_le(100); // beacon period
    buf.put_u16_le(0x0431); // capability
    let ssid_len = ssid.len().min(32);
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u8(ssid_len as u8);
    let mut raw = [0u8; 32];
    raw[..ssid_len].copy_from_slice(&ssid[..ssid_len]);
    buf.put_slice(&raw);
    buf.put_bytes(0, 78 - buf.len());
    buf.put_i16_le(rssi);
    buf.put_bytes(0, 116 - buf.len());
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u16_le(BSS_INFO_LEN as u16);
    buf.put_bytes(0, 2);
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u32_le(ies.len() as u32);
    buf.put_bytes(0, BSS_INFO_LEN - buf.len());
    buf.put_slice(ies);
    buf
}

/// Fixture builder for escan results wrapping `records`.
pub fn build_escan_results(records: &[BytesMut]) -> BytesMut {
    let body: usize = records.iter().map(BytesMut::len).sum();
    let mut buf = BytesMut::with_capacity(ESCAN_RESULTS_HDR_LEN + body);
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u32_le((ESCAN_RESULTS_HDR_LEN + body) as u32);
    buf.put_u32_le(109);
    buf.put_u16_le(crate::wire::ESCAN_SYNC_ID);
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u16_le(records.len() as u16);
    for r in records {
        buf.put_slice(r);
    }
    buf
}
