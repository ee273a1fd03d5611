//! Codec error types.
//!
//! Every decode and encode failure is a typed variant carrying the field it
//! concerns. There are no `String` variants: callers match on the variant
//! and the `Display` output is derived from the typed fields.

/// A characteristic payload could not be turned into a domain value.
///
/// Decode errors are recoverable per payload: the transport delivered bytes
/// successfully but they do not follow the characteristic's layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload must have an exact size and does not.
    #[error("{characteristic} payload must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// Characteristic name (e.g. "Battery Level").
        characteristic: &'static str,
        /// Expected byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },

    /// The payload announces a field (through its flags or a type code) that
    /// is not actually present.
    #[error("{field} needs {needed} bytes but the payload has {actual}")]
    Truncated {
        /// Field that could not be read.
        field: &'static str,
        /// Total payload length needed to read the field.
        needed: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// A field was read but its value is outside the range the
    /// characteristic allows.
    #[error("{field} value {value} is out of range")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// The rejected raw value.
        value: i64,
    },
}

/// A command value cannot be represented in its characteristic's wire format.
///
/// Raised while building a command, before any transport call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The value lies outside the inclusive `[min, max]` range of the field.
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        /// Field name (e.g. "red", "alert level").
        field: &'static str,
        /// Rejected value.
        value: i64,
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
}

/// Check that `data` has exactly `expected` bytes.
pub(crate) fn expect_len(
    characteristic: &'static str,
    data: &[u8],
    expected: usize,
) -> Result<(), DecodeError> {
    if data.len() == expected {
        Ok(())
    } else {
        Err(DecodeError::InvalidLength {
            characteristic,
            expected,
            actual: data.len(),
        })
    }
}

/// Check that `data` has at least `needed` bytes to read `field`.
pub(crate) fn expect_min_len(
    field: &'static str,
    data: &[u8],
    needed: usize,
) -> Result<(), DecodeError> {
    if data.len() >= needed {
        Ok(())
    } else {
        Err(DecodeError::Truncated {
            field,
            needed,
            actual: data.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_invalid_length_error() {
        let err = DecodeError::InvalidLength {
            characteristic: "Battery Level",
            expected: 1,
            actual: 0,
        };
        assert_eq!(err.to_string(), "Battery Level payload must be 1 bytes, got 0");
    }

    #[test]
    fn should_display_truncated_error() {
        let err = DecodeError::Truncated {
            field: "timestamp",
            needed: 12,
            actual: 7,
        };
        assert_eq!(
            err.to_string(),
            "timestamp needs 12 bytes but the payload has 7"
        );
    }

    #[test]
    fn should_display_out_of_range_decode_error() {
        let err = DecodeError::OutOfRange {
            field: "battery level",
            value: 140,
        };
        assert_eq!(err.to_string(), "battery level value 140 is out of range");
    }

    #[test]
    fn should_display_out_of_range_encode_error() {
        let err = EncodeError::OutOfRange {
            field: "red",
            value: 300,
            min: 0,
            max: 255,
        };
        assert_eq!(err.to_string(), "red must be within 0..=255, got 300");
    }

    #[test]
    fn should_accept_exact_length() {
        assert!(expect_len("Tx Power Level", &[0x00], 1).is_ok());
    }

    #[test]
    fn should_reject_longer_payload_for_exact_length() {
        let err = expect_len("Tx Power Level", &[0x00, 0x01], 1).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidLength {
                characteristic: "Tx Power Level",
                expected: 1,
                actual: 2,
            }
        );
    }

    #[test]
    fn should_reject_short_payload_for_min_length() {
        let err = expect_min_len("temperature", &[0x00], 5).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { needed: 5, actual: 1, .. }));
    }
}
