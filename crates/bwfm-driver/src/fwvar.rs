//! Firmware variables
//!
//! Typed access on top of any [`Proto`]. Numeric commands go straight to the
//! firmware opcode; named variables are sent as `name\0` followed by the
//! payload through the `GET_VAR` / `SET_VAR` opcodes. Integers are
//! little-endian on the wire.

use crate::bcdc::Proto;
use crate::error::{BwfmError, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Firmware opcodes used by the driver.
pub mod cmd {
    /// Firmware interface version.
    pub const GET_VERSION: u32 = 1;
    /// Bring the radio up.
    pub const UP: u32 = 2;
    /// Take the radio down.
    pub const DOWN: u32 = 3;
    /// Infrastructure (1) or IBSS (0).
    pub const SET_INFRA: u32 = 20;
    /// Join by SSID.
    pub const SET_SSID: u32 = 26;
    /// Power-management mode.
    pub const SET_PM: u32 = 86;
    /// Access-point mode.
    pub const SET_AP: u32 = 118;
    /// Supported bands.
    pub const GET_BANDLIST: u32 = 140;
    /// Active scan dwell per channel.
    pub const SET_SCAN_CHANNEL_TIME: u32 = 185;
    /// Unassociated scan dwell.
    pub const SET_SCAN_UNASSOC_TIME: u32 = 187;
    /// Passive scan dwell.
    pub const SET_SCAN_PASSIVE_TIME: u32 = 258;
    /// Read a named variable.
    pub const GET_VAR: u32 = 262;
    /// Write a named variable.
    pub const SET_VAR: u32 = 263;
}

/// Firmware variable access. Implemented for every [`Proto`].
///
/// All operations address interface 0. Failures are passed through from the
/// transport unchanged; nothing is retried here.
pub trait FwVar: Proto {
    /// Numeric get; returns bytes copied into `data`.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    fn cmd_get_data(&mut self, cmd: u32, data: &mut [u8]) -> Result<usize> {
        self.query_dcmd(0, cmd, data)
    }

    /// Numeric set.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    fn cmd_set_data(&mut self, cmd: u32, data: &[u8]) -> Result<()> {
        self.set_dcmd(0, cmd, data)
    }

    /// Numeric get of a 32-bit value.
    ///
    /// # Errors
    ///
    /// Propagates the transport error; a reply shorter than four bytes is
    /// [`BwfmError::MalformedFrame`].
    fn cmd_get_int(&mut self, cmd: u32) -> Result<u32> {
        let mut raw = [0u8; 4];
        let n = self.cmd_get_data(cmd, &mut raw)?;
        decode_u32(&raw, n)
    }

    /// Numeric set of a 32-bit value.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    fn cmd_set_int(&mut self, cmd: u32, val: u32) -> Result<()> {
        self.cmd_set_data(cmd, &val.to_le_bytes())
    }

    /// Read variable `name` into `data`; returns bytes copied.
    ///
    /// The current contents of `data` are sent as the request argument.
    ///
    /// # Errors
    ///
    /// Returns error if `name` contains NUL, or propagates the transport
    /// error.
    fn get_data(&mut self, name: &str, data: &mut [u8]) -> Result<usize> {
        let mut req = var_request(name, data)?;
        let n = self.cmd_get_data(cmd::GET_VAR, &mut req)?;
        let n = n.min(data.len());
        data[..n].copy_from_slice(&req[..n]);
        Ok(n)
    }

    /// Write variable `name`.
    ///
    /// # Errors
    ///
    /// Returns error if `name` contains NUL, or propagates the transport
    /// error.
    fn set_data(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let req = var_request(name, data)?;
        self.cmd_set_data(cmd::SET_VAR, &req)
    }

    /// Read a 32-bit variable.
    ///
    /// # Errors
    ///
    /// See [`FwVar::get_data`]; a reply shorter than four bytes is
    /// [`BwfmError::MalformedFrame`].
    fn get_int(&mut self, name: &str) -> Result<u32> {
        let mut raw = [0u8; 4];
        let n = self.get_data(name, &mut raw)?;
        decode_u32(&raw, n)
    }

    /// Write a 32-bit variable.
    ///
    /// # Errors
    ///
    /// See [`FwVar::set_data`].
    fn set_int(&mut self, name: &str, val: u32) -> Result<()> {
        self.set_data(name, &val.to_le_bytes())
    }
}

impl<P: Proto + ?Sized> FwVar for P {}

/// `name\0` followed by `data`.
///
/// # Errors
///
/// Returns error if `name` contains an interior NUL.
pub fn var_request(name: &str, data: &[u8]) -> Result<BytesMut> {
    if name.as_bytes().contains(&0) {
        return Err(BwfmError::invalid_argument(format!(
            "variable name {name:?} contains NUL"
        )));
    }
    let mut req = BytesMut::with_capacity(name.len() + 1 + data.len());
    req.put_slice(name.as_bytes());
    req.put_u8(0);
    req.put_slice(data);
    Ok(req)
}

fn decode_u32(raw: &[u8; 4], n: usize) -> Result<u32> {
    if n < raw.len() {
        return Err(BwfmError::malformed_frame(format!(
            "integer reply of {n} bytes"
        )));
    }
    Ok((&raw[..]).get_u32_le())
}
