//! Room identifiers
//!
//! Keys the per-room turn managers and travels inside every scheduled alarm,
//! so a deadline can only ever reach the room that scheduled it. These are
//! internal keys, not the codes players type to join a room.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};

/// A unique identifier for a room, displayed as eight hex digits
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct RoomId(u32);

impl RoomId {
    /// Creates a new random room ID
    pub fn new() -> Self {
        Self(fastrand::u32(..))
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = ParseIntError;

    /// Parses a room ID from its hex representation
    ///
    /// # Errors
    ///
    /// Returns a `ParseIntError` if the string is not a valid 32-bit hex number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u32::from_str_radix(s, 16)?))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_display_format() {
        assert_eq!(RoomId(0).to_string(), "00000000");
        assert_eq!(RoomId(0xbeef).to_string(), "0000beef");
        assert_eq!(RoomId(u32::MAX).to_string(), "ffffffff");
    }

    #[test]
    fn test_room_id_from_str() {
        assert_eq!(RoomId::from_str("0000beef").unwrap(), RoomId(0xbeef));
        assert!(RoomId::from_str("xyz").is_err());
        assert!(RoomId::from_str("").is_err());
        assert!(RoomId::from_str("100000000").is_err());
    }

    #[test]
    fn test_room_id_serialization() {
        let id = RoomId(0x00c0_ffee);
        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, "\"00c0ffee\"");

        let deserialized: RoomId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, id);
        assert!(serde_json::from_str::<RoomId>("123").is_err());
    }
}
