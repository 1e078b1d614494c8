//! Screen geometry.

use serde::{Deserialize, Serialize};

/// Screen dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions scaled by `factor`, truncated to whole pixels.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let scale = |extent: u32| (f64::from(extent) * factor) as u32;
        Self {
            width: scale(self.width),
            height: scale(self.height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_truncates() {
        let size = ScreenSize::new(1920, 1080);
        assert_eq!(size.scaled(0.9), ScreenSize::new(1728, 972));
        assert_eq!(size.scaled(1.0), size);
    }

    #[test]
    fn serde_roundtrip() {
        let size = ScreenSize::new(2560, 1440);
        let json = serde_json::to_string(&size).unwrap();
        let back: ScreenSize = serde_json::from_str(&json).unwrap();
        assert_eq!(back, size);
    }
}
