//! Failure kinds carried in `ERRR` responses.

use std::fmt;

/// Numeric error kind sent as the first field of a failure response.
///
/// The wire value is the minimal big-endian encoding of the discriminant,
/// so `UnknownError` encodes as an empty field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FailureKind {
    UnknownError = 0,
    FileNotFound = 1,
    BadPath = 2,
    FailureToSendKey = 3,
    CouldntVerifyKey = 4,
}

impl FailureKind {
    /// Numeric wire value.
    #[must_use]
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Decode a wire value; anything unrecognised is `UnknownError`.
    #[must_use]
    pub fn from_value(value: u64) -> Self {
        match value {
            1 => Self::FileNotFound,
            2 => Self::BadPath,
            3 => Self::FailureToSendKey,
            4 => Self::CouldntVerifyKey,
            _ => Self::UnknownError,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnknownError => "unknown error",
            Self::FileNotFound => "file not found",
            Self::BadPath => "bad path",
            Self::FailureToSendKey => "failure to send key",
            Self::CouldntVerifyKey => "couldn't verify key",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_roundtrip() {
        for kind in [
            FailureKind::UnknownError,
            FailureKind::FileNotFound,
            FailureKind::BadPath,
            FailureKind::FailureToSendKey,
            FailureKind::CouldntVerifyKey,
        ] {
            assert_eq!(FailureKind::from_value(u64::from(kind.value())), kind);
        }
    }

    #[test]
    fn unrecognised_values_fold_to_unknown() {
        assert_eq!(FailureKind::from_value(99), FailureKind::UnknownError);
    }
}
