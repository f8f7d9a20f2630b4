use std::time::Duration;

use thiserror::Error;

/// Top-level failure of one control command invocation.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Ambient settings rejected before any device interaction.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("no eligible device found, make sure the headset is connected")]
    NoEligibleDevice,

    #[error("{count} eligible devices are connected, specify the device address with --mac")]
    AmbiguousDevice { count: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Failures of the Bluetooth link itself: discovery, connect, read and write.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bluetooth unavailable: {0}")]
    Unavailable(String),

    #[error("invalid device address {0:?}")]
    InvalidAddress(String),

    #[error("device discovery failed: {0}")]
    Discovery(String),

    #[error("failed to connect to {address}: {reason}")]
    Open { address: String, reason: String },

    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("connection closed by device")]
    Closed,

    #[error("session is not open")]
    NotOpen,
}

/// Malformed frames and rejected replies.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("reply too short: {len} bytes")]
    ReplyTooShort { len: usize },

    #[error("command not acknowledged: reply type 0x{got:02X}")]
    NotAcknowledged { got: u8 },

    #[error("checksum rejected by device: marker 0x{got:02X}")]
    ChecksumRejected { got: u8 },

    #[error("frame is not delimited by start/end markers")]
    MissingMarker,

    #[error("escape marker at end of frame")]
    DanglingEscape,

    #[error("invalid escape sequence: 0x{0:02X}")]
    InvalidEscape(u8),

    #[error("declared payload length {declared} does not match actual {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("checksum mismatch: computed 0x{computed:02X}, frame carries 0x{carried:02X}")]
    ChecksumMismatch { computed: u8, carried: u8 },

    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

pub type Result<T> = std::result::Result<T, ControlError>;
