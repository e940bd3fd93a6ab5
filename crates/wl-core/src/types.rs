//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The value is not a recognizable device identifier.
    #[error("invalid device identifier: {value}")]
    InvalidDeviceId { value: String },

    /// The timezone offset is outside the supported range.
    #[error("timezone offset out of range: {minutes} minutes")]
    TzOffsetOutOfRange { minutes: i32 },

    /// Invalid session source value.
    #[error("invalid session source: {value}")]
    InvalidSessionSource { value: String },
}

/// How a session was opened.
///
/// This enum encodes the valid source tags, preventing invalid string values.
/// The tag is advisory metadata for reporting; it is not part of the
/// single-open-session invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    /// Opened or closed by an explicit user action.
    Manual,
    /// Opened or closed by the presence-tracking loop.
    Auto,
}

impl SessionSource {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for SessionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "auto" => Ok(Self::Auto),
            _ => Err(ValidationError::InvalidSessionSource {
                value: s.to_string(),
            }),
        }
    }
}

/// Generates an integer row-ID newtype with common trait implementations.
macro_rules! define_row_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database row ID.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw row ID.
            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_row_id!(
    /// A user identifier.
    ///
    /// Users are created by the administrative surface; the tracking core
    /// only reads them.
    UserId
);

define_row_id!(
    /// A session identifier.
    SessionId
);

/// A validated device identifier: a hardware (MAC) address.
///
/// Stored normalized to lowercase, colon-separated form so identifiers
/// compare equal regardless of how the source wrote them (`AA-BB-...`,
/// `aa:bb:...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Parses and normalizes a device identifier.
    ///
    /// Accepts six two-digit hex groups separated by `:` or `-`.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ValidationError> {
        let raw = value.as_ref().trim();
        if raw.is_empty() {
            return Err(ValidationError::Empty {
                field: "device identifier",
            });
        }
        let groups: Vec<&str> = raw.split([':', '-']).collect();
        let valid = groups.len() == 6
            && groups
                .iter()
                .all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()));
        if !valid {
            return Err(ValidationError::InvalidDeviceId {
                value: raw.to_string(),
            });
        }
        Ok(Self(groups.join(":").to_ascii_lowercase()))
    }

    /// Returns the normalized identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for DeviceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Maximum supported timezone offset magnitude, in minutes (18 hours).
const MAX_TZ_OFFSET_MINUTES: i32 = 18 * 60;

/// A validated timezone offset.
///
/// Uses the convention of JavaScript's `Date.getTimezoneOffset`: the number
/// of minutes to *add* to a local wall-clock time to obtain UTC. An offset
/// of `-60` therefore means the local zone is one hour ahead of UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct TzOffset(i32);

impl TzOffset {
    /// UTC itself.
    pub const UTC: Self = Self(0);

    /// Creates a new offset after range validation.
    pub fn new(minutes: i32) -> Result<Self, ValidationError> {
        if minutes.abs() > MAX_TZ_OFFSET_MINUTES {
            return Err(ValidationError::TzOffsetOutOfRange { minutes });
        }
        Ok(Self(minutes))
    }

    /// Returns the offset in minutes.
    #[must_use]
    pub const fn minutes(self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for TzOffset {
    type Error = ValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TzOffset> for i32 {
    fn from(offset: TzOffset) -> Self {
        offset.0
    }
}

impl fmt::Display for TzOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TzOffset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let minutes: i32 = s
            .parse()
            .map_err(|_| format!("not a whole number of minutes: {s}"))?;
        Self::new(minutes).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_normalizes_case_and_separators() {
        let id = DeviceId::new("AA-BB-CC-11-22-33").unwrap();
        assert_eq!(id.as_str(), "aa:bb:cc:11:22:33");
        assert_eq!(id, DeviceId::new("aa:bb:cc:11:22:33").unwrap());
    }

    #[test]
    fn device_id_rejects_garbage() {
        assert!(DeviceId::new("").is_err());
        assert!(DeviceId::new("Interface:").is_err());
        assert!(DeviceId::new("aa:bb:cc:11:22").is_err());
        assert!(DeviceId::new("zz:bb:cc:11:22:33").is_err());
        assert!(DeviceId::new("192.168.1.10").is_err());
    }

    #[test]
    fn device_id_serde_roundtrip() {
        let id = DeviceId::new("aa:bb:cc:11:22:33").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"aa:bb:cc:11:22:33\"");
        let parsed: DeviceId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn device_id_serde_rejects_invalid() {
        let result: Result<DeviceId, _> = serde_json::from_str("\"not-a-mac\"");
        assert!(result.is_err());
    }

    #[test]
    fn tz_offset_validates_range() {
        assert!(TzOffset::new(0).is_ok());
        assert!(TzOffset::new(-60).is_ok());
        assert!(TzOffset::new(720).is_ok());
        assert!(TzOffset::new(18 * 60 + 1).is_err());
        assert!(TzOffset::new(-(18 * 60 + 1)).is_err());
    }

    #[test]
    fn tz_offset_parses_from_str() {
        assert_eq!("-60".parse::<TzOffset>().unwrap().minutes(), -60);
        assert!("abc".parse::<TzOffset>().is_err());
        assert!("99999".parse::<TzOffset>().is_err());
    }

    #[test]
    fn session_source_from_str() {
        assert_eq!(
            "manual".parse::<SessionSource>().unwrap(),
            SessionSource::Manual
        );
        assert_eq!("auto".parse::<SessionSource>().unwrap(), SessionSource::Auto);
        assert!("nfc".parse::<SessionSource>().is_err());
    }

    #[test]
    fn session_source_serde_roundtrip() {
        let json = serde_json::to_string(&SessionSource::Auto).unwrap();
        assert_eq!(json, "\"auto\"");
        let parsed: SessionSource = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, SessionSource::Auto);
    }

    #[test]
    fn user_id_roundtrips_through_i64() {
        let id = UserId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(UserId::from(42), id);
        assert_eq!(id.to_string(), "42");
    }
}
