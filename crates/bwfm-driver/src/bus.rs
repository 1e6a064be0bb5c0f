//! Bus abstraction
//!
//! The driver core never touches a transport directly. SDIO, PCIe and the
//! in-process simulator all sit behind [`Bus`]: 32-bit backplane register
//! access for bring-up, plus a control-message pipe for BCDC.
//!
//! The optional hooks default to no-ops so a transport only implements what
//! it actually has.

use crate::error::Result;
use std::fmt::Debug;
use std::time::Duration;

/// Transport between the host and the chip.
pub trait Bus: Debug + Send {
    /// Read a 32-bit backplane register.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    fn read32(&mut self, addr: u32) -> Result<u32>;

    /// Write a 32-bit backplane register.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    fn write32(&mut self, addr: u32, val: u32) -> Result<()>;

    /// Send one control message to the firmware.
    ///
    /// # Errors
    ///
    /// Returns error if the message could not be queued on the transport.
    fn txctl(&mut self, msg: &[u8]) -> Result<()>;

    /// Receive one control message into `buf`, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time, otherwise the
    /// number of bytes written to `buf`. A message longer than `buf` is
    /// truncated.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails.
    fn rxctl(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>>;

    /// Bring the bus core into a state where backplane access works.
    ///
    /// # Errors
    ///
    /// Returns error if the transport cannot be prepared.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Whether [`Bus::reset`] does anything on this transport.
    fn supports_reset(&self) -> bool {
        false
    }

    /// Reset the bus core. Called during attach when supported.
    ///
    /// # Errors
    ///
    /// Returns error if the reset fails.
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    /// Install the firmware reset vector before the CPU is released.
    ///
    /// # Errors
    ///
    /// Returns error if the vector cannot be written.
    fn activate(&mut self, _reset_vector: u32) -> Result<()> {
        Ok(())
    }

    /// Transport specific setup after the chip is attached.
    ///
    /// # Errors
    ///
    /// Returns error if setup fails.
    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    /// Busy-wait between wrapper register polls.
    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(u64::from(us)));
    }
}

impl<B: Bus + ?Sized> Bus for Box<B> {
    fn read32(&mut self, addr: u32) -> Result<u32> {
        (**self).read32(addr)
    }

    fn write32(&mut self, addr: u32, val: u32) -> Result<()> {
        (**self).write32(addr, val)
    }

    fn txctl(&mut self, msg: &[u8]) -> Result<()> {
        (**self).txctl(msg)
    }

    fn rxctl(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        (**self).rxctl(buf, timeout)
    }

    fn prepare(&mut self) -> Result<()> {
        (**self).prepare()
    }

    fn supports_reset(&self) -> bool {
        (**self).supports_reset()
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn activate(&mut self, reset_vector: u32) -> Result<()> {
        (**self).activate(reset_vector)
    }

    fn setup(&mut self) -> Result<()> {
        (**self).setup()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us);
    }
}
