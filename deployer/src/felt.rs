//! The network's native integer: an element of the prime field used by Cairo contracts.

use num_bigint::BigUint;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr, sync::OnceLock};
use thiserror::Error;

/// `P = 2^251 + 17 * 2^192 + 1`, big-endian hex.
const FIELD_PRIME_HEX: &[u8] =
    b"800000000000011000000000000000000000000000000000000000000000001";

/// Short strings are packed into a single felt, leaving the top byte free.
pub const MAX_SHORT_STRING_LEN: usize = 31;

fn field_prime() -> &'static BigUint {
    static PRIME: OnceLock<BigUint> = OnceLock::new();
    PRIME.get_or_init(|| {
        BigUint::parse_bytes(FIELD_PRIME_HEX, 16).unwrap_or_else(|| unreachable!("constant prime"))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeltError {
    #[error("`{0}` does not fit in a field element")]
    Overflow(String),
    #[error("`{value}` is not a valid number: {reason}")]
    Malformed { value: String, reason: &'static str },
    #[error("short string `{value}` is {len} bytes long, at most {MAX_SHORT_STRING_LEN} fit in a field element")]
    ShortStringTooLong { value: String, len: usize },
    #[error("short string `{0}` contains non-ASCII characters")]
    NonAsciiShortString(String),
}

/// A field element, stored big-endian. Always strictly below the field prime.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Felt([u8; 32]);

impl Felt {
    pub const ZERO: Felt = Felt([0; 32]);

    /// Builds a felt from big-endian bytes, failing if the value is not below the prime.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Result<Self, FeltError> {
        Self::from_biguint(BigUint::from_bytes_be(&bytes), || hex::encode(bytes))
    }

    /// Builds a felt from the low 251 bits of `bytes`, which always fit below the prime.
    ///
    /// Used for values derived from hashes (addresses and transaction hashes).
    pub fn from_be_bytes_truncated(mut bytes: [u8; 32]) -> Self {
        bytes[0] &= 0x07;
        Felt(bytes)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn from_hex_str(s: &str) -> Result<Self, FeltError> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() {
            return Err(FeltError::Malformed {
                value: s.to_string(),
                reason: "missing hex digits",
            });
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FeltError::Malformed {
                value: s.to_string(),
                reason: "invalid hex digit",
            });
        }
        let value = BigUint::parse_bytes(digits.as_bytes(), 16).ok_or(FeltError::Malformed {
            value: s.to_string(),
            reason: "invalid hex digit",
        })?;
        Self::from_biguint(value, || s.to_string())
    }

    pub fn from_dec_str(s: &str) -> Result<Self, FeltError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FeltError::Malformed {
                value: s.to_string(),
                reason: "expected decimal digits",
            });
        }
        let value = BigUint::parse_bytes(s.as_bytes(), 10).ok_or(FeltError::Malformed {
            value: s.to_string(),
            reason: "expected decimal digits",
        })?;
        Self::from_biguint(value, || s.to_string())
    }

    /// Packs an ASCII string of at most 31 bytes into a felt, big-endian.
    pub fn from_short_string(s: &str) -> Result<Self, FeltError> {
        if !s.is_ascii() {
            return Err(FeltError::NonAsciiShortString(s.to_string()));
        }
        if s.len() > MAX_SHORT_STRING_LEN {
            return Err(FeltError::ShortStringTooLong {
                value: s.to_string(),
                len: s.len(),
            });
        }
        let mut bytes = [0u8; 32];
        bytes[32 - s.len()..].copy_from_slice(s.as_bytes());
        Ok(Felt(bytes))
    }

    fn from_biguint(value: BigUint, display: impl FnOnce() -> String) -> Result<Self, FeltError> {
        if &value >= field_prime() {
            return Err(FeltError::Overflow(display()));
        }
        let be = value.to_bytes_be();
        let mut bytes = [0u8; 32];
        bytes[32 - be.len()..].copy_from_slice(&be);
        Ok(Felt(bytes))
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Felt(bytes)
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[16..].copy_from_slice(&value.to_be_bytes());
        Felt(bytes)
    }
}

impl FromStr for Felt {
    type Err = FeltError;

    /// Parses `0x`-prefixed hex or plain decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("0x") || s.starts_with("0X") {
            Felt::from_hex_str(s)
        } else {
            Felt::from_dec_str(s)
        }
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIME_DEC: &str =
        "3618502788666131213697322783095070105623107215331596699973092056135872020481";

    #[test]
    fn parses_hex_and_decimal() {
        assert_eq!("0xAAA".parse::<Felt>().unwrap(), Felt::from(0xaaau64));
        assert_eq!("1234".parse::<Felt>().unwrap(), Felt::from(1234u64));
        assert_eq!(
            Felt::from(0xbbbu64).to_string(),
            "0x0000000000000000000000000000000000000000000000000000000000000bbb"
        );
    }

    #[test]
    fn largest_element_fits_and_prime_overflows() {
        let max = format!("0x{}", "800000000000011000000000000000000000000000000000000000000000000");
        assert!(max.parse::<Felt>().is_ok());

        let prime = format!("0x{}", std::str::from_utf8(FIELD_PRIME_HEX).unwrap());
        assert!(matches!(prime.parse::<Felt>(), Err(FeltError::Overflow(_))));
        assert!(matches!(PRIME_DEC.parse::<Felt>(), Err(FeltError::Overflow(_))));
        assert!(matches!(
            Felt::from_be_bytes([0xff; 32]),
            Err(FeltError::Overflow(_))
        ));
    }

    #[test]
    fn malformed_input() {
        for input in ["", "0x", "0xzz", "12a", "-1", "1 2", "0x+ff", "0x1_0", "+12"] {
            assert!(
                matches!(input.parse::<Felt>(), Err(FeltError::Malformed { .. })),
                "{input:?}"
            );
        }
    }

    #[test]
    fn short_strings() {
        let felt = Felt::from_short_string("1234").unwrap();
        assert_eq!(felt, Felt::from(0x3132_3334u64));
        assert!(Felt::from_short_string(&"a".repeat(31)).is_ok());
        assert_eq!(
            Felt::from_short_string(&"a".repeat(32)),
            Err(FeltError::ShortStringTooLong {
                value: "a".repeat(32),
                len: 32
            })
        );
        assert!(matches!(
            Felt::from_short_string("lörds"),
            Err(FeltError::NonAsciiShortString(_))
        ));
    }

    #[test]
    fn truncated_bytes_stay_in_field() {
        let felt = Felt::from_be_bytes_truncated([0xff; 32]);
        assert_eq!(felt.to_be_bytes()[0], 0x07);
        assert!(Felt::from_be_bytes(felt.to_be_bytes()).is_ok());
    }

    #[test]
    fn serde_as_hex_string() {
        let felt = Felt::from(42u64);
        let json = serde_json::to_string(&felt).unwrap();
        assert_eq!(
            json,
            "\"0x000000000000000000000000000000000000000000000000000000000000002a\""
        );
        assert_eq!(serde_json::from_str::<Felt>(&json).unwrap(), felt);
        assert!(serde_json::from_str::<Felt>("\"0xnope\"").is_err());
    }
}
