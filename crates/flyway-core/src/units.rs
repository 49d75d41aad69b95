//! Units that appear in flow records. Each unit prints and parses with its own suffix, so a
//! data rate reads back from `1Gbps` and a transfer size from a bare integer.

use std::num::ParseIntError;

macro_rules! unit {
    ($name: ident, $suffix: literal) => {
        #[allow(missing_docs)]
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            Ord,
            PartialEq,
            Eq,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            /// Zero of this unit.
            pub const ZERO: $name = Self::new(0);

            /// One of this unit.
            pub const ONE: $name = Self::new(1);

            /// Creates a new value.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub const fn into_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", self.0, $suffix)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseUnitError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s
                    .strip_suffix($suffix)
                    .ok_or(ParseUnitError::MissingSuffix { expected: $suffix })?;
                Ok(Self(digits.parse()?))
            }
        }
    };
}

unit!(Bytes, "");
unit!(Gbps, "Gbps");

/// Error parsing a unit value.
#[derive(Debug, thiserror::Error)]
pub enum ParseUnitError {
    /// The value did not end in the unit's suffix.
    #[error("missing unit suffix `{expected}`")]
    MissingSuffix {
        /// The suffix that was expected.
        expected: &'static str,
    },

    /// The numeric part was not an unsigned integer.
    #[error("failed to parse unit value")]
    ParseInt(#[from] ParseIntError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gbps_display_and_parse_agree() {
        assert_eq!(Gbps::new(10).to_string(), "10Gbps");
        assert_eq!("10Gbps".parse::<Gbps>().unwrap(), Gbps::new(10));
    }

    #[test]
    fn gbps_requires_suffix() {
        assert!(matches!(
            "10".parse::<Gbps>(),
            Err(ParseUnitError::MissingSuffix { expected: "Gbps" })
        ));
        assert!(matches!(
            "tenGbps".parse::<Gbps>(),
            Err(ParseUnitError::ParseInt(_))
        ));
    }

    #[test]
    fn bytes_are_bare_integers() {
        assert_eq!(Bytes::new(100_000_000).to_string(), "100000000");
        assert_eq!("1234".parse::<Bytes>().unwrap(), Bytes::new(1234));
    }
}
