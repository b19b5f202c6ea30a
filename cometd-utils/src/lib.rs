//! Shared helpers for the cometd message crates.
//!
//! The only thing living here today is [`Bytesize`], the human readable byte
//! size used by configuration (`zip_message_size_threshold = "50K"`).
//!
//! ```rust
//! use cometd_utils::{to_bytesize, Bytesize};
//!
//! let size = Bytesize::from("1M512K");
//! assert_eq!(size.as_usize(), 1_572_864);
//! assert_eq!(to_bytesize("2048"), 2048);
//! assert_eq!(Bytesize(51200).to_string(), "50K");
//! ```

#![deny(unsafe_code)]

use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::{
    de::{self, Deserializer, Visitor},
    ser::Serializer,
    Deserialize, Serialize,
};

const BYTESIZE_K: usize = 1024;
const BYTESIZE_M: usize = 1048576;
const BYTESIZE_G: usize = 1073741824;

/// Byte count that reads and prints as `2G512M`, `50K`, `17B`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bytesize(pub usize);

impl Bytesize {
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0 as u64
    }

    #[inline]
    pub fn as_usize(&self) -> usize {
        self.0
    }

    /// Format as the largest units first, e.g. `2148532224` => `2G1M`.
    #[inline]
    pub fn string(&self) -> String {
        let mut v = self.0;
        if v == 0 {
            return "0B".into();
        }
        let mut res = String::new();

        for (unit, suffix) in [(BYTESIZE_G, 'G'), (BYTESIZE_M, 'M'), (BYTESIZE_K, 'K')] {
            let n = v / unit;
            if n > 0 {
                res.push_str(&format!("{n}{suffix}"));
                v %= unit;
            }
        }

        if v > 0 {
            res.push_str(&format!("{v}B"));
        }

        res
    }
}

impl Deref for Bytesize {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Bytesize {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<usize> for Bytesize {
    fn from(v: usize) -> Self {
        Bytesize(v)
    }
}

impl From<&str> for Bytesize {
    fn from(v: &str) -> Self {
        Bytesize(to_bytesize(v))
    }
}

impl std::str::FromStr for Bytesize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_bytesize(s).map(Bytesize)
    }
}

impl fmt::Display for Bytesize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.string())
    }
}

impl fmt::Debug for Bytesize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.string())?;
        Ok(())
    }
}

impl Serialize for Bytesize {
    #[inline]
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.string())
    }
}

struct BytesizeVisitor;

impl Visitor<'_> for BytesizeVisitor {
    type Value = Bytesize;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a byte count or a size string such as \"50K\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        parse_bytesize(v).map(Bytesize).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        usize::try_from(v).map(Bytesize).map_err(|_| E::custom(format!("byte size {v} is too large")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        usize::try_from(v).map(Bytesize).map_err(|_| E::custom(format!("invalid byte size {v}")))
    }
}

impl<'de> Deserialize<'de> for Bytesize {
    #[inline]
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(BytesizeVisitor)
    }
}

/// Parse a byte size string, returning `0` when it is not valid.
#[inline]
pub fn to_bytesize(text: &str) -> usize {
    parse_bytesize(text).unwrap_or_default()
}

/// Parse a byte size string. Bare numbers are bytes; units are `B`, `K`, `M`, `G`
/// (optionally followed by `B`) and may be chained, e.g. `1G512M`.
pub fn parse_bytesize(text: &str) -> Result<usize, String> {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<usize>() {
        return Ok(v);
    }
    let upper = trimmed.to_uppercase().replace("GB", "G").replace("MB", "M").replace("KB", "K");
    if upper.is_empty() {
        return Err("empty byte size".into());
    }

    let mut total: usize = 0;
    for part in upper.split_inclusive(['G', 'M', 'K', 'B']) {
        let mut chars = part.chars();
        let unit = match chars.next_back() {
            Some('B') => 1,
            Some('K') => BYTESIZE_K,
            Some('M') => BYTESIZE_M,
            Some('G') => BYTESIZE_G,
            _ => return Err(format!("unknown unit in byte size '{text}'")),
        };
        let n = chars.as_str().trim().parse::<usize>().map_err(|_| format!("invalid byte size '{text}'"))?;
        total = n
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| format!("byte size '{text}' is too large"))?;
    }
    Ok(total)
}
