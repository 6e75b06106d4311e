//! Registry of the STOMP protocol levels this client speaks.

use std::fmt;
use std::str::FromStr;

use crate::protocol::ConnectError;

/// A supported STOMP protocol level.
///
/// Levels are ordered, so `level >= ProtocolLevel::V1_1` reads as
/// "1.1 or later".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolLevel {
    V1_0,
    V1_1,
    V1_2,
}

impl ProtocolLevel {
    const ALL: [ProtocolLevel; 3] = [ProtocolLevel::V1_0, ProtocolLevel::V1_1, ProtocolLevel::V1_2];

    pub const fn as_str(self) -> &'static str {
        match self {
            ProtocolLevel::V1_0 => "1.0",
            ProtocolLevel::V1_1 => "1.1",
            ProtocolLevel::V1_2 => "1.2",
        }
    }

    pub const fn latest() -> Self {
        ProtocolLevel::V1_2
    }

    /// Heart-beating was introduced with 1.1.
    #[inline]
    pub fn supports_heartbeats(self) -> bool {
        self >= ProtocolLevel::V1_1
    }

    /// Header values are escaped from 1.1 on, except in CONNECT and CONNECTED frames.
    #[inline]
    pub fn escapes_headers(self) -> bool {
        self >= ProtocolLevel::V1_1
    }

    /// `\r` is an escape sequence only at 1.2.
    #[inline]
    pub fn escapes_carriage_return(self) -> bool {
        self >= ProtocolLevel::V1_2
    }

    /// Parses a comma separated `accept-version` value, every level must be supported.
    pub fn parse_list(value: &str) -> Result<Vec<ProtocolLevel>, ConnectError> {
        value.split(',').map(ProtocolLevel::try_from).collect()
    }
}

impl TryFrom<&str> for ProtocolLevel {
    type Error = ConnectError;

    fn try_from(str: &str) -> Result<Self, Self::Error> {
        match str {
            "1.0" => Ok(ProtocolLevel::V1_0),
            "1.1" => Ok(ProtocolLevel::V1_1),
            "1.2" => Ok(ProtocolLevel::V1_2),
            _ => Err(ConnectError::unsupported_protocol(str)),
        }
    }
}

impl FromStr for ProtocolLevel {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProtocolLevel::try_from(s)
    }
}

impl fmt::Display for ProtocolLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact membership test against the supported levels.
pub fn supported(level: &str) -> bool {
    ProtocolLevel::try_from(level).is_ok()
}

/// Every supported level, oldest first. Each call starts a fresh iteration.
pub fn protocols() -> impl Iterator<Item = ProtocolLevel> + Clone {
    ProtocolLevel::ALL.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_levels_are_supported() {
        assert!(supported("1.0"));
        assert!(supported("1.1"));
        assert!(supported("1.2"));
    }

    #[test]
    fn unknown_levels_are_rejected() {
        for level in ["9.9", "", "1", "1.10", "1.1 ", " 1.1", "1.2.0", "v1.2"] {
            assert!(!supported(level), "level {level:?} should be rejected");
        }
        assert_eq!(ProtocolLevel::try_from("9.9"), Err(ConnectError::UnsupportedProtocol { level: "9.9".to_string() }));
    }

    #[test]
    fn enumeration_is_ordered_and_restartable() {
        let first: Vec<_> = protocols().map(ProtocolLevel::as_str).collect();
        let second: Vec<_> = protocols().map(ProtocolLevel::as_str).collect();
        assert_eq!(first, vec!["1.0", "1.1", "1.2"]);
        assert_eq!(first, second);

        for level in protocols() {
            assert!(supported(level.as_str()));
            assert_eq!(level.as_str().parse::<ProtocolLevel>(), Ok(level));
        }
    }

    #[test]
    fn level_capabilities() {
        assert!(!ProtocolLevel::V1_0.supports_heartbeats());
        assert!(ProtocolLevel::V1_1.supports_heartbeats());
        assert!(ProtocolLevel::V1_1.escapes_headers());
        assert!(!ProtocolLevel::V1_1.escapes_carriage_return());
        assert!(ProtocolLevel::V1_2.escapes_carriage_return());
        assert_eq!(ProtocolLevel::latest(), ProtocolLevel::V1_2);
    }

    #[test]
    fn parse_accept_version_list() {
        assert_eq!(ProtocolLevel::parse_list("1.0,1.1,1.2"), Ok(vec![ProtocolLevel::V1_0, ProtocolLevel::V1_1, ProtocolLevel::V1_2]));
        assert_eq!(ProtocolLevel::parse_list("1.2"), Ok(vec![ProtocolLevel::V1_2]));
        assert!(ProtocolLevel::parse_list("1.1,2.0").is_err());
    }
}
