//! One-time pickup codes.

use serde::{Deserialize, Serialize};

/// Errors that can occur when reading an [`Otp`] typed by a pharmacist.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    /// Nothing was entered.
    #[error("OTP is required")]
    Empty,
    /// The code contains characters other than ASCII digits.
    #[error("OTP must contain only digits")]
    NotNumeric,
}

/// The pickup code issued when a patient sends a prescription to the pharmacy.
///
/// The backend issues six digits. The client only requires a non-empty digit
/// string and leaves the exact match to the server, so a wrong code of the
/// right shape still reaches the backend and is rejected there.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Otp(String);

impl Otp {
    /// Length of the codes the backend issues.
    pub const ISSUED_LENGTH: usize = 6;

    /// Parse a code, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::Empty`] for blank input and
    /// [`OtpError::NotNumeric`] when anything but digits remains.
    pub fn parse(s: &str) -> Result<Self, OtpError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(OtpError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpError::NotNumeric);
        }
        Ok(Self(s.to_owned()))
    }

    /// The code as typed (without surrounding whitespace).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Pickup codes are shown to the patient once; keep them out of logs.
impl std::fmt::Debug for Otp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Otp([REDACTED])")
    }
}

impl std::fmt::Display for Otp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Otp {
    type Err = OtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims() {
        assert_eq!(Otp::parse(" 042917 ").unwrap().as_str(), "042917");
    }

    #[test]
    fn test_parse_rejects_blank_and_letters() {
        assert_eq!(Otp::parse(""), Err(OtpError::Empty));
        assert_eq!(Otp::parse("12a456"), Err(OtpError::NotNumeric));
    }

    #[test]
    fn test_debug_redacts_code() {
        let otp = Otp::parse("123456").unwrap();
        assert!(!format!("{otp:?}").contains("123456"));
    }
}
