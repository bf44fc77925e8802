//! Decoding of escaped byte literals (`b'caf\xc3\xa9'`) that some result
//! paths produce for string and struct columns.

use nom::{
    branch::alt,
    bytes::complete::take_while_m_n,
    character::complete::{anychar, char, none_of},
    combinator::{all_consuming, map, map_res, value},
    multi::many0,
    sequence::{delimited, preceded},
    IResult,
};

fn hex_byte(input: &str) -> IResult<&str, u8> {
    preceded(
        char('x'),
        map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |h: &str| {
            u8::from_str_radix(h, 16)
        }),
    )(input)
}

fn escape(input: &str) -> IResult<&str, Vec<u8>> {
    preceded(
        char('\\'),
        alt((
            map(hex_byte, |b| vec![b]),
            value(vec![b'\n'], char('n')),
            value(vec![b'\r'], char('r')),
            value(vec![b'\t'], char('t')),
            value(vec![0], char('0')),
            map(anychar, |c| c.to_string().into_bytes()),
        )),
    )(input)
}

fn body<'a>(quote: char) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<u8>> {
    let stop = if quote == '\'' { "'\\" } else { "\"\\" };
    map(
        many0(alt((escape, map(none_of(stop), |c| c.to_string().into_bytes())))),
        |chunks| chunks.concat(),
    )
}

fn byte_literal(input: &str) -> IResult<&str, Vec<u8>> {
    preceded(
        char('b'),
        alt((
            delimited(char('\''), body('\''), char('\'')),
            delimited(char('"'), body('"'), char('"')),
        )),
    )(input)
}

/// Returns the decoded text when `text` is a byte literal holding UTF-8,
/// `None` otherwise.
#[must_use]
pub fn decode_byte_literal(text: &str) -> Option<String> {
    let (_, bytes) = all_consuming(byte_literal)(text.trim()).ok()?;
    String::from_utf8(bytes).ok()
}
