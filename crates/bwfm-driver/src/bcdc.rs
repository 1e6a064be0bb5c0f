//! BCDC control protocol
//!
//! Each firmware command is one request/response pair on the bus control
//! pipe. Both directions carry the same 16-byte little-endian header:
//!
//! ```text
//! 0   cmd     firmware opcode
//! 4   len     payload length
//! 8   flags   bit 0 error | bit 1 set | bits 12..15 interface | bits 16..31 request id
//! 12  status  firmware status (valid when the error bit is set)
//! 16  payload
//! ```
//!
//! Responses are matched on the request id. Anything carrying another id is
//! a leftover from an earlier transaction and is dropped. The wait for the
//! matching response is bounded by the configured control timeout.

use crate::bus::Bus;
use crate::error::{BwfmError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Header length in bytes.
pub const BCDC_HEADER_LEN: usize = 16;
/// Largest payload a single transaction carries.
pub const BCDC_MAX_PAYLOAD: usize = 8192;

/// Header flag bits.
pub mod flags {
    /// Firmware reports failure; `status` holds the code.
    pub const ERROR: u32 = 0x0000_0001;
    /// Set request (clear for get).
    pub const SET: u32 = 0x0000_0002;
    /// Interface index field.
    pub const IF_MASK: u32 = 0x0000_F000;
    /// Shift of [`IF_MASK`].
    pub const IF_SHIFT: u32 = 12;
    /// Request id field.
    pub const ID_MASK: u32 = 0xFFFF_0000;
    /// Shift of [`ID_MASK`].
    pub const ID_SHIFT: u32 = 16;
}

/// Decoded BCDC header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BcdcHeader {
    /// Firmware opcode.
    pub cmd: u32,
    /// Payload length.
    pub len: u32,
    /// Flag word.
    pub flags: u32,
    /// Firmware status.
    pub status: u32,
}

impl BcdcHeader {
    /// Header for an outgoing request.
    #[allow(clippy::cast_possible_truncation)]
    pub fn request(cmd: u32, len: usize, ifidx: u8, reqid: u16, set: bool) -> Self {
        let mut flags = (u32::from(reqid) << flags::ID_SHIFT)
            | ((u32::from(ifidx) << flags::IF_SHIFT) & flags::IF_MASK);
        if set {
            flags |= flags::SET;
        }
        Self {
            cmd,
            len: len as u32,
            flags,
            status: 0,
        }
    }

    /// Request id carried in the flags.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn reqid(&self) -> u16 {
        ((self.flags & flags::ID_MASK) >> flags::ID_SHIFT) as u16
    }

    /// Interface index carried in the flags.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn ifidx(&self) -> u8 {
        ((self.flags & flags::IF_MASK) >> flags::IF_SHIFT) as u8
    }

    /// True for set requests.
    pub const fn is_set(&self) -> bool {
        self.flags & flags::SET != 0
    }

    /// True if the firmware flagged an error.
    pub const fn is_error(&self) -> bool {
        self.flags & flags::ERROR != 0
    }

    /// Append the little-endian header to `buf`.
    pub fn put(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.cmd);
        buf.put_u32_le(self.len);
        buf.put_u32_le(self.flags);
        buf.put_u32_le(self.status);
    }

    /// Decode a header from the front of `buf`.
    ///
    /// Returns `None` if `buf` is shorter than a header.
    pub fn parse(mut buf: &[u8]) -> Option<Self> {
        if buf.len() < BCDC_HEADER_LEN {
            return None;
        }
        Some(Self {
            cmd: buf.get_u32_le(),
            len: buf.get_u32_le(),
            flags: buf.get_u32_le(),
            status: buf.get_u32_le(),
        })
    }
}

/// Firmware command transport.
pub trait Proto {
    /// Issue a get command. `buf` carries the request payload in and the
    /// response payload out.
    ///
    /// Returns the number of response bytes copied into `buf`, which is the
    /// smaller of the response length and `buf.len()`.
    ///
    /// # Errors
    ///
    /// Returns error on oversize payload, bus failure, timeout, or a
    /// firmware error status.
    fn query_dcmd(&mut self, ifidx: u8, cmd: u32, buf: &mut [u8]) -> Result<usize>;

    /// Issue a set command.
    ///
    /// # Errors
    ///
    /// Returns error on oversize payload, bus failure, timeout, or a
    /// firmware error status.
    fn set_dcmd(&mut self, ifidx: u8, cmd: u32, buf: &[u8]) -> Result<()>;
}

/// BCDC engine owning the bus.
#[derive(Debug)]
pub struct Bcdc<B: Bus> {
    bus: B,
    reqid: u16,
    timeout: Duration,
}

impl<B: Bus> Bcdc<B> {
    /// Wrap `bus` with a response timeout.
    pub const fn new(bus: B, timeout: Duration) -> Self {
        Self {
            bus,
            reqid: 0,
            timeout,
        }
    }

    /// Underlying bus.
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    /// Underlying bus, mutably (register access during bring-up).
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Give the bus back.
    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Id used by the most recent request.
    pub const fn last_reqid(&self) -> u16 {
        self.reqid
    }

    /// Response timeout.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn next_reqid(&mut self) -> u16 {
        self.reqid = self.reqid.wrapping_add(1);
        if self.reqid == 0 {
            self.reqid = 1;
        }
        self.reqid
    }

    /// Send one request and wait for its response payload.
    fn transact(&mut self, ifidx: u8, cmd: u32, payload: &[u8], set: bool) -> Result<Bytes> {
        if payload.len() > BCDC_MAX_PAYLOAD {
            return Err(BwfmError::PayloadTooLarge {
                len: payload.len(),
                max: BCDC_MAX_PAYLOAD,
            });
        }
        if u32::from(ifidx) > flags::IF_MASK >> flags::IF_SHIFT {
            return Err(BwfmError::invalid_argument(format!(
                "interface index {ifidx} out of range"
            )));
        }

        let reqid = self.next_reqid();
        let hdr = BcdcHeader::request(cmd, payload.len(), ifidx, reqid, set);
        let mut msg = BytesMut::with_capacity(BCDC_HEADER_LEN + payload.len());
        hdr.put(&mut msg);
        msg.put_slice(payload);

        trace!(cmd, reqid, set, len = payload.len(), "bcdc request");
        self.bus.txctl(&msg)?;

        let deadline = Instant::now() + self.timeout;
        let mut rx = vec![0u8; BCDC_HEADER_LEN + BCDC_MAX_PAYLOAD];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(cmd, reqid, "control response timeout");
                return Err(BwfmError::Timeout {
                    cmd,
                    duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }

            let Some(n) = self.bus.rxctl(&mut rx, remaining)? else {
                continue;
            };
            let Some(resp) = BcdcHeader::parse(&rx[..n]) else {
                warn!(len = n, "runt control response dropped");
                continue;
            };
            if resp.reqid() != reqid {
                debug!(expected = reqid, got = resp.reqid(), "stale control response dropped");
                continue;
            }
            if resp.is_error() {
                #[allow(clippy::cast_possible_wrap)]
                let status = resp.status as i32;
                debug!(cmd, status, "firmware returned error");
                return Err(BwfmError::Firmware { cmd, status });
            }

            let avail = n - BCDC_HEADER_LEN;
            let len = usize::try_from(resp.len).map_or(avail, |l| l.min(avail));
            return Ok(Bytes::copy_from_slice(
                &rx[BCDC_HEADER_LEN..BCDC_HEADER_LEN + len],
            ));
        }
    }
}

impl<B: Bus> Proto for Bcdc<B> {
    fn query_dcmd(&mut self, ifidx: u8, cmd: u32, buf: &mut [u8]) -> Result<usize> {
        let resp = self.transact(ifidx, cmd, buf, false)?;
        let n = resp.len().min(buf.len());
        buf[..n].copy_from_slice(&resp[..n]);
        Ok(n)
    }

    fn set_dcmd(&mut self, ifidx: u8, cmd: u32, buf: &[u8]) -> Result<()> {
        self.transact(ifidx, cmd, buf, true).map(drop)
    }
}
