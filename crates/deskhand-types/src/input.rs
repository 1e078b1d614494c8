//! Pointer and key input actions.
//!
//! Pointer samples arrive on the datagram channel as a fixed-width record
//! after the event code: phase (1 byte), button (1 byte), then normalised
//! x and y as big-endian u16. Key actions arrive on the keyboard stream as
//! delimited fields.

use thiserror::Error;

use crate::screen::ScreenSize;

/// Upper bound of the normalised pointer coordinate range.
pub const POINTER_RANGE: u16 = 1000;

/// Encoded length of a pointer sample.
pub const SAMPLE_LEN: usize = 6;

/// A malformed input record from the wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputWireError {
    #[error("pointer sample too short: {len} of {SAMPLE_LEN} bytes")]
    SampleTooShort { len: usize },

    #[error("unknown pointer phase {0}")]
    BadPhase(u8),

    #[error("unknown pointer button {0}")]
    BadButton(u8),

    #[error("unknown key state {0}")]
    BadKeyState(u64),
}

/// What a pointer sample asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerPhase {
    /// Button released (or plain movement when no button is set).
    Release,
    /// Button pressed.
    Press,
    ScrollDown,
    ScrollUp,
}

impl PointerPhase {
    fn from_wire(value: u8) -> Result<Self, InputWireError> {
        match value {
            0 => Ok(Self::Release),
            1 => Ok(Self::Press),
            2 => Ok(Self::ScrollDown),
            3 => Ok(Self::ScrollUp),
            other => Err(InputWireError::BadPhase(other)),
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            Self::Release => 0,
            Self::Press => 1,
            Self::ScrollDown => 2,
            Self::ScrollUp => 3,
        }
    }
}

/// Pointer button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

impl PointerButton {
    /// Wire value 0 means "no button" and decodes to `None`.
    fn from_wire(value: u8) -> Result<Option<Self>, InputWireError> {
        match value {
            0 => Ok(None),
            1 => Ok(Some(Self::Left)),
            2 => Ok(Some(Self::Right)),
            3 => Ok(Some(Self::Middle)),
            other => Err(InputWireError::BadButton(other)),
        }
    }

    fn to_wire(button: Option<Self>) -> u8 {
        match button {
            None => 0,
            Some(Self::Left) => 1,
            Some(Self::Right) => 2,
            Some(Self::Middle) => 3,
        }
    }
}

/// Scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Key press/release state as carried on the keyboard channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    Pressed,
    Released,
}

impl KeyState {
    /// Decode the numeric key state field (1 = pressed, 2 = released).
    pub fn from_wire(value: u64) -> Result<Self, InputWireError> {
        match value {
            1 => Ok(Self::Pressed),
            2 => Ok(Self::Released),
            other => Err(InputWireError::BadKeyState(other)),
        }
    }
}

/// One decoded pointer sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerSample {
    pub phase: PointerPhase,
    /// `None` means movement only.
    pub button: Option<PointerButton>,
    /// Normalised 0..=[`POINTER_RANGE`].
    pub x: u16,
    /// Normalised 0..=[`POINTER_RANGE`].
    pub y: u16,
}

impl PointerSample {
    /// Decode the fixed-width record. Trailing bytes are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, InputWireError> {
        if data.len() < SAMPLE_LEN {
            return Err(InputWireError::SampleTooShort { len: data.len() });
        }
        Ok(Self {
            phase: PointerPhase::from_wire(data[0])?,
            button: PointerButton::from_wire(data[1])?,
            x: u16::from_be_bytes([data[2], data[3]]),
            y: u16::from_be_bytes([data[4], data[5]]),
        })
    }

    /// Encode to the fixed-width record.
    #[must_use]
    pub fn encode(&self) -> [u8; SAMPLE_LEN] {
        let x = self.x.to_be_bytes();
        let y = self.y.to_be_bytes();
        [
            self.phase.to_wire(),
            PointerButton::to_wire(self.button),
            x[0],
            x[1],
            y[0],
            y[1],
        ]
    }

    /// Map the normalised coordinates onto a screen, clamped to its bounds.
    #[must_use]
    pub fn to_pixels(&self, screen: ScreenSize) -> (u32, u32) {
        let scale = |value: u16, extent: u32| -> u32 {
            let scaled = u64::from(value) * u64::from(extent) / u64::from(POINTER_RANGE);
            u32::try_from(scaled)
                .unwrap_or(u32::MAX)
                .min(extent.saturating_sub(1))
        };
        (scale(self.x, screen.width), scale(self.y, screen.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_roundtrip() {
        let sample = PointerSample {
            phase: PointerPhase::Press,
            button: Some(PointerButton::Left),
            x: 500,
            y: 256,
        };
        assert_eq!(PointerSample::decode(&sample.encode()), Ok(sample));
    }

    #[test]
    fn coordinates_may_contain_zero_bytes() {
        let sample = PointerSample {
            phase: PointerPhase::Release,
            button: None,
            x: 256, // encodes as 0x01 0x00
            y: 0,
        };
        let encoded = sample.encode();
        assert!(encoded.contains(&0));
        assert_eq!(PointerSample::decode(&encoded), Ok(sample));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut data = PointerSample {
            phase: PointerPhase::ScrollUp,
            button: None,
            x: 1,
            y: 2,
        }
        .encode()
        .to_vec();
        data.extend_from_slice(b"extra");
        assert!(PointerSample::decode(&data).is_ok());
    }

    #[test]
    fn short_sample_is_rejected() {
        assert_eq!(
            PointerSample::decode(&[1, 1, 0]),
            Err(InputWireError::SampleTooShort { len: 3 })
        );
    }

    #[test]
    fn bad_phase_and_button_are_rejected() {
        assert_eq!(
            PointerSample::decode(&[9, 0, 0, 0, 0, 0]),
            Err(InputWireError::BadPhase(9))
        );
        assert_eq!(
            PointerSample::decode(&[0, 9, 0, 0, 0, 0]),
            Err(InputWireError::BadButton(9))
        );
    }

    #[test]
    fn pixel_mapping_scales_and_clamps() {
        let screen = ScreenSize::new(1920, 1080);
        let sample = PointerSample {
            phase: PointerPhase::Release,
            button: None,
            x: 500,
            y: 1000,
        };
        assert_eq!(sample.to_pixels(screen), (960, 1079));

        let wild = PointerSample {
            x: u16::MAX,
            ..sample
        };
        assert_eq!(wild.to_pixels(screen).0, 1919);
    }

    #[test]
    fn key_state_values() {
        assert_eq!(KeyState::from_wire(1), Ok(KeyState::Pressed));
        assert_eq!(KeyState::from_wire(2), Ok(KeyState::Released));
        assert_eq!(
            KeyState::from_wire(7),
            Err(InputWireError::BadKeyState(7))
        );
    }
}
