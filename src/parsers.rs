//! The `Parse` trait for attribute and property values, plus the small grammars shared
//! by many of them.

use cssparser::{Parser, ParserInput, Token};
use markup5ever::QualName;

use crate::error::*;

/// A value that can be read from a `cssparser::Parser`.
pub trait Parse: Sized {
    /// Reads one value, leaving the parser just after it.
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>>;

    /// Parses a whole string as a single value; trailing tokens are an error.
    fn parse_str(s: &str) -> Result<Self, ParseError<'_>> {
        let mut input = ParserInput::new(s);
        Parser::new(&mut input).parse_entirely(Self::parse)
    }
}

/// Skips a comma if there is one.
pub fn optional_comma(parser: &mut Parser<'_, '_>) {
    let _ = parser.try_parse(|p| p.expect_comma());
}

/// Rejects infinities and NaN, which cssparser lets through for huge literals.
pub fn finite_f32(n: f32) -> Result<f32, ValueErrorKind> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(ValueErrorKind::value_error("expected finite number"))
    }
}

/// Parses an attribute's value, tagging errors with the attribute name.
pub trait ParseValue<T: Parse> {
    fn parse(&self, value: &str) -> Result<T, ElementError>;
}

impl<T: Parse> ParseValue<T> for QualName {
    fn parse(&self, value: &str) -> Result<T, ElementError> {
        let mut input = ParserInput::new(value);

        Parser::new(&mut input)
            .parse_entirely(T::parse)
            .attribute(self.clone())
    }
}

impl<T: Parse> Parse for Option<T> {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        T::parse(parser).map(Some)
    }
}

impl Parse for f64 {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        let loc = parser.current_source_location();
        let n = parser.expect_number()?;

        finite_f32(n)
            .map(f64::from)
            .map_err(|e| loc.new_custom_error(e))
    }
}

impl Parse for i32 {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        Ok(parser.expect_integer()?)
    }
}

/// A number that must be zero or positive.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NonNegative(pub f64);

impl Parse for NonNegative {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        let loc = parser.current_source_location();

        match f64::parse(parser)? {
            n if n >= 0.0 => Ok(NonNegative(n)),
            _ => Err(loc.new_custom_error(ValueErrorKind::value_error(
                "expected non negative number",
            ))),
        }
    }
}

/// A number or a percentage, as used by `opacity` and gradient stop offsets.
///
/// Percentages are returned as fractions, so `50%` parses as `0.5`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NumberOrPercentage(pub f64);

impl Parse for NumberOrPercentage {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        let loc = parser.current_source_location();

        let value = match *parser.next()? {
            Token::Number { value, .. } => value,
            Token::Percentage { unit_value, .. } => unit_value,
            ref t => return Err(loc.new_unexpected_token_error(t.clone())),
        };

        finite_f32(value)
            .map(|v| NumberOrPercentage(f64::from(v)))
            .map_err(|e| loc.new_custom_error(e))
    }
}

/// One or two values; a single value is used for both.
///
/// Filter primitives use this for `stdDeviation`, `radius`, `baseFrequency` and
/// friends, where the pair is an x and a y component.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NumberOptionalNumber<T: Parse>(pub T, pub T);

impl<T: Parse + Copy> Parse for NumberOptionalNumber<T> {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        let first = T::parse(parser)?;

        if parser.is_exhausted() {
            return Ok(NumberOptionalNumber(first, first));
        }

        optional_comma(parser);
        let second = T::parse(parser)?;

        Ok(NumberOptionalNumber(first, second))
    }
}

/// How many numbers a [`NumberList`] must have.
#[derive(Eq, PartialEq)]
pub enum NumberListLength {
    Exact(usize),
    Unbounded,
}

/// A list of numbers separated by whitespace and/or commas.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NumberList(pub Vec<f64>);

impl NumberList {
    /// Reads numbers until `length` is reached, or until the input runs out for
    /// an unbounded list.  Only an unbounded list may be empty.
    pub fn parse<'i>(
        parser: &mut Parser<'i, '_>,
        length: NumberListLength,
    ) -> Result<Self, ParseError<'i>> {
        let mut numbers = Vec::new();

        if length == NumberListLength::Unbounded && parser.is_exhausted() {
            return Ok(NumberList(numbers));
        }

        numbers.push(f64::parse(parser)?);

        while match length {
            NumberListLength::Exact(n) => numbers.len() < n,
            NumberListLength::Unbounded => !parser.is_exhausted(),
        } {
            optional_comma(parser);
            numbers.push(f64::parse(parser)?);
        }

        Ok(NumberList(numbers))
    }

    pub fn parse_str(s: &str, length: NumberListLength) -> Result<NumberList, ParseError<'_>> {
        let mut input = ParserInput::new(s);
        Parser::new(&mut input).parse_entirely(|p| Self::parse(p, length))
    }
}

impl Parse for NumberList {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        NumberList::parse(parser, NumberListLength::Unbounded)
    }
}

/// Matches the next token against a set of case-insensitive keywords.
///
/// Expands to a `Result` whose error is a `cssparser::BasicParseError`, so that it can be
/// used with `?` in any `Parse` implementation:
///
/// ```
/// # #[macro_use] extern crate rsvg;
/// # use cssparser::{ParserInput, Parser};
/// # fn main() -> Result<(), cssparser::BasicParseError<'static>> {
/// # let mut input = ParserInput::new("evenodd");
/// # let mut parser = Parser::new(&mut input);
/// let nonzero = parse_identifiers!(
///     parser,
///     "nonzero" => true,
///     "evenodd" => false,
/// )?;
/// # assert!(!nonzero);
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! parse_identifiers {
    ($parser:expr,
     $($str:expr => $val:expr,)+) => {
        {
            let loc = $parser.current_source_location();
            let token = $parser.next()?;

            match token {
                $(cssparser::Token::Ident(ref cow) if cow.eq_ignore_ascii_case($str) => Ok($val),)+

                _ => Err(loc.new_basic_unexpected_token_error(token.clone()))
            }
        }
    };
}

/// An author-defined identifier, like a filter primitive's `result` name.
///
/// The CSS-wide keywords and `default` are reserved and cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomIdent(pub String);

impl Parse for CustomIdent {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        const RESERVED: [&str; 4] = ["initial", "inherit", "unset", "default"];

        let loc = parser.current_source_location();
        let token = parser.next()?;

        match token {
            Token::Ident(ref cow) if !RESERVED.iter().any(|r| cow.eq_ignore_ascii_case(r)) => {
                Ok(CustomIdent(cow.to_string()))
            }

            _ => Err(loc.new_basic_unexpected_token_error(token.clone()).into()),
        }
    }
}
