use crate::error::ControlError;

// Process exit codes. 1 and 2 keep the historical meaning for device selection.
pub const SUCCESS: u8 = 0;
pub const NO_DEVICE: u8 = 1;
pub const AMBIGUOUS_DEVICE: u8 = 2;
pub const INVALID_PARAMETERS: u8 = 3;
pub const TRANSPORT_ERROR: u8 = 4;
pub const PROTOCOL_ERROR: u8 = 5;
pub const USAGE: u8 = 64;
pub const CONFIG: u8 = 78;

pub fn code_for(err: &ControlError) -> u8 {
    match err {
        ControlError::InvalidParameters(_) => INVALID_PARAMETERS,
        ControlError::NoEligibleDevice => NO_DEVICE,
        ControlError::AmbiguousDevice { .. } => AMBIGUOUS_DEVICE,
        ControlError::Transport(_) => TRANSPORT_ERROR,
        ControlError::Protocol(_) => PROTOCOL_ERROR,
    }
}
