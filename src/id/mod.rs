use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

mod digraph;
mod set;

pub use digraph::Digraph;
pub use set::{ZidSet, ZidSlice};

pub const ZID_LEN: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Zid(u64);

impl Zid {
    pub const INVALID: Zid = Zid(0);
    pub const MAX: Zid = Zid(99_999_999_999_999);

    // Computed zettel
    pub const VERSION: Zid = Zid(1);
    pub const HOST: Zid = Zid(2);
    pub const OPERATING_SYSTEM: Zid = Zid(3);
    pub const LOG: Zid = Zid(7);
    pub const MEMORY: Zid = Zid(8);
    pub const BOX_MANAGER: Zid = Zid(20);
    pub const ZETTEL_INDEX: Zid = Zid(21);
    pub const METADATA_KEYS: Zid = Zid(22);
    pub const WARNINGS: Zid = Zid(29);

    // Constant zettel
    pub const LICENSE: Zid = Zid(4);
    pub const AUTHORS: Zid = Zid(5);
    pub const DEPENDENCIES: Zid = Zid(6);
    pub const CONFIGURATION: Zid = Zid(100);
    pub const BASE_TEMPLATE: Zid = Zid(10_100);
    pub const BASE_CSS: Zid = Zid(20_001);
    pub const EMOJI: Zid = Zid(40_001);
    pub const HOME: Zid = Zid(10_000_000_000);

    pub const fn from_u64(value: u64) -> Option<Zid> {
        if value == 0 || value > Self::MAX.0 {
            None
        } else {
            Some(Zid(value))
        }
    }

    pub fn parse(value: &str) -> Result<Zid, ParseZidError> {
        if value.len() != ZID_LEN {
            return Err(ParseZidError::Length(value.to_string()));
        }
        let mut result = 0u64;
        for byte in value.bytes() {
            if !byte.is_ascii_digit() {
                return Err(ParseZidError::NotNumeric(value.to_string()));
            }
            result = result * 10 + u64::from(byte - b'0');
        }
        if result == 0 {
            return Err(ParseZidError::Zero);
        }
        Ok(Zid(result))
    }

    pub fn now(with_seconds: bool) -> Zid {
        Self::from_datetime(OffsetDateTime::now_utc(), with_seconds)
    }

    pub fn from_datetime(ts: OffsetDateTime, with_seconds: bool) -> Zid {
        let seconds = if with_seconds { u64::from(ts.second()) } else { 0 };
        let value = u64::from(ts.year().unsigned_abs() % 10_000) * 10_000_000_000
            + u64::from(u8::from(ts.month())) * 100_000_000
            + u64::from(ts.day()) * 1_000_000
            + u64::from(ts.hour()) * 10_000
            + u64::from(ts.minute()) * 100
            + seconds;
        Zid(value.max(1))
    }

    pub fn is_valid(self) -> bool {
        self.0 > 0 && self.0 <= Self::MAX.0
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn fields(self) -> [u64; 6] {
        let v = self.0;
        [
            v / 10_000_000_000,
            (v / 100_000_000) % 100,
            (v / 1_000_000) % 100,
            (v / 10_000) % 100,
            (v / 100) % 100,
            v % 100,
        ]
    }
}

impl fmt::Display for Zid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:014}", self.0)
    }
}

impl FromStr for Zid {
    type Err = ParseZidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Zid::parse(s)
    }
}

impl Serialize for Zid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Zid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Zid::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseZidError {
    Length(String),
    NotNumeric(String),
    Zero,
}

impl fmt::Display for ParseZidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseZidError::Length(value) => {
                write!(f, "zid '{}' must have {} digits", value, ZID_LEN)
            }
            ParseZidError::NotNumeric(value) => write!(f, "zid '{}' is not numeric", value),
            ParseZidError::Zero => write!(f, "zid must not be zero"),
        }
    }
}

impl Error for ParseZidError {}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
