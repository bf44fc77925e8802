use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::multispace0,
    combinator::{all_consuming, map, opt},
    number::complete::double,
    sequence::{delimited, pair},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::core::{HelperError, Result};

/// Binary size units, as printed by `SHOW FILES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum SizeUnit {
    B,
    KB,
    MB,
    GB,
    TB,
    PB,
}

impl SizeUnit {
    #[must_use]
    pub const fn factor(self) -> f64 {
        match self {
            Self::B => 1.0,
            Self::KB => 1024.0,
            Self::MB => 1024.0 * 1024.0,
            Self::GB => 1024.0 * 1024.0 * 1024.0,
            Self::TB => 1024.0 * 1024.0 * 1024.0 * 1024.0,
            Self::PB => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        }
    }

    #[must_use]
    pub fn from_bytes(self, bytes: f64) -> f64 {
        bytes / self.factor()
    }
}

fn unit(input: &str) -> IResult<&str, SizeUnit> {
    alt((
        map(tag_no_case("KB"), |_| SizeUnit::KB),
        map(tag_no_case("MB"), |_| SizeUnit::MB),
        map(tag_no_case("GB"), |_| SizeUnit::GB),
        map(tag_no_case("TB"), |_| SizeUnit::TB),
        map(tag_no_case("PB"), |_| SizeUnit::PB),
        map(tag_no_case("B"), |_| SizeUnit::B),
    ))(input)
}

fn size(input: &str) -> IResult<&str, (f64, Option<SizeUnit>)> {
    delimited(multispace0, pair(double, opt(delimited(multispace0, unit, multispace0))), multispace0)(input)
}

/// Parses `20.50MB`, `1.2 KB` or a bare byte count into bytes.
pub fn parse_size(text: &str) -> Result<f64> {
    all_consuming(size)(text)
        .map(|(_, (n, unit))| n * unit.unwrap_or(SizeUnit::B).factor())
        .map_err(|_| HelperError::Parse(format!("'{text}' is not a size")))
}
