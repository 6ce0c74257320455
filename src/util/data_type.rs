//! DataType - element type tag of a stored variable.

use std::fmt;
use std::str::FromStr;

/// How the elements of a variable are stored in a time step.
///
/// Together with the bit width of the variable this fully determines
/// how raw bytes are decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataType {
    /// No data (structural variable)
    #[default]
    None,
    /// Signed integers
    Int,
    /// IEEE floating point
    Float,
}

impl DataType {
    /// Canonical upper case name as written in results files.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Int => "INT",
            Self::Float => "FLOAT",
        }
    }

    /// Legacy numeric code.
    pub const fn code(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Int => 1,
            Self::Float => 2,
        }
    }

    /// Parse from a header token. Unknown names map to `None`.
    pub fn parse(token: &str) -> Self {
        token.parse().unwrap_or_default()
    }
}

impl FromStr for DataType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("NONE") || s == "0" {
            Ok(Self::None)
        } else if s.eq_ignore_ascii_case("INT") || s == "1" {
            Ok(Self::Int)
        } else if s.eq_ignore_ascii_case("FLOAT") || s == "2" {
            Ok(Self::Float)
        } else {
            Err(())
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
