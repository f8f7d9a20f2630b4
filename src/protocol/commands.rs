/// Wire constants for the headset control protocol.
/// Every command travels inside a frame of type [`DATA_TYPE_COMMAND`].

// Frame data types
pub const DATA_TYPE_COMMAND: u8 = 0x0C;
pub const DATA_TYPE_ACK: u8 = 0x01;

/// Fixed checksum byte the device places before the end marker of an
/// acknowledgement when it accepted our frame.
pub const CHECKSUM_ACCEPTED: u8 = 0x02;

// Framing markers
pub const START_MARKER: u8 = 0x3E; // '>'
pub const END_MARKER: u8 = 0x3C; // '<'
pub const ESCAPE_MARKER: u8 = 0x3D; // '='

// Set parameter
pub const CMD_SET_PARAMETER: u8 = 104;

// Parameter sub-types
pub const PARAM_NOISE_AMBIENT: u8 = 2;

// Field selectors inside the noise/ambient payload
pub const FIELD_NOISE_CANCEL_LEVEL: u8 = 1;
pub const FIELD_AMBIENT_LEVEL: u8 = 1;

/// Transmitted in place of the ambient level when the feature is disabled.
pub const AMBIENT_DISABLED: u8 = 0xFF;
