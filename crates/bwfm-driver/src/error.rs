//! Error types for bwfm driver operations

use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, BwfmError>;

/// Errors that can occur while bringing up or talking to the chip
#[derive(Debug, Error)]
pub enum BwfmError {
    /// I/O error from the host side (thread spawn, file access)
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Bus read, write or control message failed
    #[error("Transfer failed: {reason}")]
    TransferFailed {
        /// Reason for failure
        reason: String,
    },

    /// No matching control response arrived in time
    #[error("No response to firmware command {cmd} after {duration_ms}ms")]
    Timeout {
        /// Firmware opcode that was sent
        cmd: u32,
        /// Time waited in milliseconds
        duration_ms: u64,
    },

    /// Firmware answered with its error flag set
    #[error("Firmware command {cmd} failed with status {status}")]
    Firmware {
        /// Firmware opcode that was sent
        cmd: u32,
        /// Status word reported by the firmware
        status: i32,
    },

    /// Control payload exceeds the transaction buffer
    #[error("Payload of {len} bytes exceeds the {max} byte control buffer")]
    PayloadTooLarge {
        /// Requested payload length
        len: usize,
        /// Maximum payload length
        max: usize,
    },

    /// EROM descriptor stream is structurally invalid
    #[error("Malformed EROM at {addr:#010x}: {reason}")]
    MalformedErom {
        /// Address of the offending word
        addr: u32,
        /// What was wrong
        reason: String,
    },

    /// Backplane type the driver cannot manage
    #[error("Unsupported SoC interconnect: {kind}")]
    UnsupportedInterconnect {
        /// Interconnect description
        kind: String,
    },

    /// CPU core present but no activation strategy exists for it
    #[error("Unsupported CPU architecture: {arch}")]
    UnsupportedCpu {
        /// CPU core name
        arch: &'static str,
    },

    /// A core required for the operation was not found in the EROM
    #[error("Core {id:#05x} ({name}) not present")]
    CoreNotFound {
        /// Core id
        id: u16,
        /// Core name
        name: &'static str,
    },

    /// Command ring has no free slot
    #[error("Command queue full ({capacity} entries)")]
    QueueFull {
        /// Ring capacity
        capacity: usize,
    },

    /// Received frame is truncated or its lengths are inconsistent
    #[error("Malformed frame: {reason}")]
    MalformedFrame {
        /// What was wrong
        reason: String,
    },

    /// Caller passed a value the operation cannot use
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong
        reason: String,
    },

    /// Device is in the wrong state for the operation
    #[error("Device in invalid state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },
}

impl BwfmError {
    /// Create a transfer failed error
    pub fn transfer_failed(reason: impl Into<String>) -> Self {
        Self::TransferFailed {
            reason: reason.into(),
        }
    }

    /// Create a malformed EROM error
    pub fn malformed_erom(addr: u32, reason: impl Into<String>) -> Self {
        Self::MalformedErom {
            addr,
            reason: reason.into(),
        }
    }

    /// Create a missing core error
    pub fn core_not_found(id: u16) -> Self {
        Self::CoreNotFound {
            id,
            name: bwfm_chip::cores::name(id),
        }
    }

    /// Create a malformed frame error
    pub fn malformed_frame(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }

    /// Firmware status carried by this error, if any
    pub const fn firmware_status(&self) -> Option<i32> {
        match self {
            Self::Firmware { status, .. } => Some(*status),
            _ => None,
        }
    }
}
