use crate::error::{ControlError, ProtocolError};
use crate::protocol::commands::*;

/// Lowest accepted ambient sound level; disables the feature.
pub const LEVEL_DISABLED: i32 = -1;
/// Highest ambient sound level the headset accepts.
pub const LEVEL_MAX: i32 = 19;
/// Focus on voice needs at least this ambient sound level.
pub const VOICE_FOCUS_MIN_LEVEL: i32 = 2;

/// Noise cancelling strength derived from the ambient level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseCancel {
    Off = 0,
    Low = 1,
    High = 2,
}

impl NoiseCancel {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Off),
            1 => Some(Self::Low),
            2 => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

/// Sound control effect state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Off = 0,
    On = 1,
    Adjusting = 16,
    AdjustmentComplete = 17,
}

impl Effect {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Off),
            1 => Some(Self::On),
            16 => Some(Self::Adjusting),
            17 => Some(Self::AdjustmentComplete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Adjusting => "adjusting",
            Self::AdjustmentComplete => "adjustment_complete",
        }
    }
}

/// Validated ambient sound settings.
///
/// `level` is -1 (disabled) or 0..=19; 0 and 1 select noise suppression.
/// Focus on voice is only available from level 2 upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbientSettings {
    level: i8,
    voice_focus: bool,
}

impl AmbientSettings {
    pub fn new(level: i32, voice_focus: bool) -> Result<Self, ControlError> {
        if !(LEVEL_DISABLED..=LEVEL_MAX).contains(&level) {
            return Err(ControlError::InvalidParameters(format!(
                "ambient sound level {} out of range {}..={}",
                level, LEVEL_DISABLED, LEVEL_MAX
            )));
        }
        if voice_focus && level < VOICE_FOCUS_MIN_LEVEL {
            return Err(ControlError::InvalidParameters(format!(
                "focus on voice requires ambient sound level >= {}, got {}",
                VOICE_FOCUS_MIN_LEVEL, level
            )));
        }
        Ok(Self {
            level: level as i8,
            voice_focus,
        })
    }

    pub fn encode(&self) -> AmbientPayload {
        let noise_cancel = match self.level {
            0 => NoiseCancel::High,
            1 => NoiseCancel::Low,
            _ => NoiseCancel::Off,
        };

        let (effect, ambient_level) = if self.level == LEVEL_DISABLED as i8 {
            (Effect::Off, AMBIENT_DISABLED)
        } else {
            (Effect::AdjustmentComplete, self.level as u8)
        };

        AmbientPayload {
            effect,
            noise_cancel,
            voice_focus: self.voice_focus,
            ambient_level,
        }
    }
}

/// The "set noise cancelling / ambient sound" command payload.
///
/// Layout (8 bytes):
/// ```text
/// [104] [2] [effect] [1] [noise_cancel] [1] [voice_focus] [ambient_level]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbientPayload {
    pub effect: Effect,
    pub noise_cancel: NoiseCancel,
    pub voice_focus: bool,
    /// Raw transmitted level, `0xFF` when disabled.
    pub ambient_level: u8,
}

impl AmbientPayload {
    pub const SIZE: usize = 8;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [
            CMD_SET_PARAMETER,
            PARAM_NOISE_AMBIENT,
            self.effect as u8,
            FIELD_NOISE_CANCEL_LEVEL,
            self.noise_cancel as u8,
            FIELD_AMBIENT_LEVEL,
            self.voice_focus as u8,
            self.ambient_level,
        ]
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let data: &[u8; Self::SIZE] = data.try_into().map_err(|_| {
            ProtocolError::InvalidPayload(format!(
                "expected {} bytes, got {}",
                Self::SIZE,
                data.len()
            ))
        })?;

        let tags = [data[0], data[1], data[3], data[5]];
        let expected = [
            CMD_SET_PARAMETER,
            PARAM_NOISE_AMBIENT,
            FIELD_NOISE_CANCEL_LEVEL,
            FIELD_AMBIENT_LEVEL,
        ];
        if tags != expected {
            return Err(ProtocolError::InvalidPayload(format!(
                "unexpected command tags {:?}",
                tags
            )));
        }

        let effect = Effect::from_byte(data[2])
            .ok_or_else(|| ProtocolError::InvalidPayload(format!("unknown effect {}", data[2])))?;
        let noise_cancel = NoiseCancel::from_byte(data[4]).ok_or_else(|| {
            ProtocolError::InvalidPayload(format!("unknown noise cancel level {}", data[4]))
        })?;
        let voice_focus = match data[6] {
            0 => false,
            1 => true,
            b => {
                return Err(ProtocolError::InvalidPayload(format!(
                    "invalid voice focus flag {}",
                    b
                )))
            }
        };

        Ok(Self {
            effect,
            noise_cancel,
            voice_focus,
            ambient_level: data[7],
        })
    }
}

impl std::fmt::Display for AmbientPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "effect={} noise_cancel={} voice_focus={} level=",
            self.effect.as_str(),
            self.noise_cancel.as_str(),
            self.voice_focus
        )?;
        if self.ambient_level == AMBIENT_DISABLED {
            write!(f, "disabled")
        } else {
            write!(f, "{}", self.ambient_level)
        }
    }
}
