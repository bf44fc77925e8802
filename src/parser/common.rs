use crate::core::{ColumnType, HelperError, Result};
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while},
    character::complete::{alpha1, char, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, recognize},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

pub fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

fn length_arg(input: &str) -> IResult<&str, usize> {
    delimited(
        ws(char('(')),
        ws(map_res(digit1, |s: &str| s.parse::<usize>())),
        ws(char(')')),
    )(input)
}

fn column_type(input: &str) -> IResult<&str, ColumnType> {
    alt((
        map(
            preceded(
                tag_no_case("DECIMAL"),
                opt(delimited(
                    ws(char('(')),
                    tuple((
                        ws(map_res(digit1, |s: &str| s.parse::<u8>())),
                        opt(preceded(ws(char(',')), ws(map_res(digit1, |s: &str| s.parse::<u8>())))),
                    )),
                    ws(char(')')),
                )),
            ),
            |params| match params {
                Some((p, Some(s))) => ColumnType::Decimal { precision: p, scale: s },
                Some((p, None)) => ColumnType::Decimal { precision: p, scale: 0 },
                // engine default for a bare DECIMAL
                None => ColumnType::Decimal { precision: 9, scale: 0 },
            },
        ),
        map(tag_no_case("TINYINT"), |_| ColumnType::TinyInt),
        map(tag_no_case("SMALLINT"), |_| ColumnType::SmallInt),
        map(tag_no_case("BIGINT"), |_| ColumnType::BigInt),
        map(alt((tag_no_case("INTEGER"), tag_no_case("INT"))), |_| ColumnType::Int),
        map(alt((tag_no_case("DOUBLE"), tag_no_case("REAL"))), |_| ColumnType::Double),
        map(tag_no_case("FLOAT"), |_| ColumnType::Float),
        map(tag_no_case("STRING"), |_| ColumnType::String),
        map(preceded(tag_no_case("VARCHAR"), opt(length_arg)), |len| ColumnType::Varchar {
            max_length: len.unwrap_or(65_535),
        }),
        map(preceded(tag_no_case("CHAR"), opt(length_arg)), |len| ColumnType::Char {
            length: len.unwrap_or(1),
        }),
        map(tag_no_case("TIMESTAMP"), |_| ColumnType::Timestamp),
        map(tag_no_case("DATE"), |_| ColumnType::Date),
        map(tag_no_case("BOOLEAN"), |_| ColumnType::Boolean),
        map(tag_no_case("BINARY"), |_| ColumnType::Binary),
    ))(input)
}

/// Parses a type as printed by `DESCRIBE` (`bigint`, `decimal(10,2)`, `struct<a:int>`).
pub fn parse_column_type(input: &str) -> Result<ColumnType> {
    let input = input.trim();
    let lowered = input.to_ascii_lowercase();
    if ["struct<", "array<", "map<"].iter().any(|p| lowered.starts_with(p)) {
        return Ok(ColumnType::Complex(input.to_string()));
    }
    all_consuming(ws(column_type))(input)
        .map(|(_, t)| t)
        .map_err(|_| HelperError::Parse(format!("unknown column type '{input}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_column_types() {
        assert_eq!(parse_column_type("bigint").unwrap(), ColumnType::BigInt);
        assert_eq!(parse_column_type("INT").unwrap(), ColumnType::Int);
        assert_eq!(
            parse_column_type("decimal(10,2)").unwrap(),
            ColumnType::Decimal { precision: 10, scale: 2 }
        );
        assert_eq!(
            parse_column_type("varchar(20)").unwrap(),
            ColumnType::Varchar { max_length: 20 }
        );
        assert_eq!(parse_column_type(" string ").unwrap(), ColumnType::String);
        assert_eq!(
            parse_column_type("struct<a:int,b:string>").unwrap(),
            ColumnType::Complex("struct<a:int,b:string>".into())
        );
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(parse_column_type("geometry").is_err());
        assert!(parse_column_type("int extra").is_err());
    }

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("fecha_corte rest").unwrap(), (" rest", "fecha_corte"));
        assert!(identifier("1abc").is_err());
    }
}
