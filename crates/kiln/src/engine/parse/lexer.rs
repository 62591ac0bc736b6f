//! Lexical grammar: words, literals, parameters and symbols.
//!
//! Every terminal skips the whitespace in front of it, so the grammar never
//! deals with blanks itself.

use kiln_core::stmt::Value;
use nom::{
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{opt, recognize, value},
    error::{ContextError, ErrorKind, ParseError},
    sequence::pair,
    IResult, Parser,
};
use std::{cmp::Ordering, fmt};

pub(super) type PResult<'q, O> = IResult<&'q str, O, SyntaxError<'q>>;

/// Where parsing stopped and what the grammar wanted there.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct SyntaxError<'q> {
    /// Unparsed input, starting at the offending token
    pub(super) input: &'q str,
    pub(super) expected: Option<Expected>,

    /// Set for malformed tokens, replacing the expected/found message
    pub(super) message: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Expected {
    Keyword(&'static str),
    Symbol(&'static str),
    Label(&'static str),
}

impl<'q> SyntaxError<'q> {
    pub(super) fn expected(input: &'q str, expected: Expected) -> SyntaxError<'q> {
        SyntaxError {
            input: input.trim_start(),
            expected: Some(expected),
            message: None,
        }
    }

    /// A token that starts well but cannot be completed. Never backtracks.
    fn malformed<O>(input: &'q str, message: &'static str) -> PResult<'q, O> {
        Err(nom::Err::Failure(SyntaxError {
            input,
            expected: None,
            message: Some(message),
        }))
    }
}

impl<'q> ParseError<&'q str> for SyntaxError<'q> {
    fn from_error_kind(input: &'q str, _kind: ErrorKind) -> Self {
        SyntaxError {
            input: input.trim_start(),
            expected: None,
            message: None,
        }
    }

    fn append(_input: &'q str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    /// Keeps whichever alternative got further into the query.
    fn or(self, other: Self) -> Self {
        match self.input.len().cmp(&other.input.len()) {
            Ordering::Less => self,
            Ordering::Greater => other,
            Ordering::Equal if other.expected.is_none() => self,
            Ordering::Equal => other,
        }
    }
}

impl<'q> ContextError<&'q str> for SyntaxError<'q> {
    fn add_context(input: &'q str, context: &'static str, mut other: Self) -> Self {
        // Only label failures on the construct's first token
        if other.message.is_none() && other.input.len() == input.trim_start().len() {
            other.expected = Some(Expected::Label(context));
        }
        other
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Keyword(word) => f.write_str(&word.to_ascii_uppercase()),
            Expected::Symbol(symbol) => write!(f, "`{symbol}`"),
            Expected::Label(label) => f.write_str(label),
        }
    }
}

/// Symbols in longest-match order.
const SYMBOLS: &[&str] = &[
    "<>", "!=", "<=", ">=", "||", "(", ")", ",", ".", "=", "<", ">", "+", "-", "*", "/", "%",
];

pub(super) fn ws<'q>(input: &'q str) -> PResult<'q, &'q str> {
    multispace0(input)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// An identifier. Keywords are words too; the grammar decides.
pub(super) fn word<'q>(input: &'q str) -> PResult<'q, &'q str> {
    let (input, _) = ws(input)?;
    let parsed: PResult<'q, &'q str> = recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_word_char),
    ))
    .parse(input);
    parsed.map_err(|err| err.map(|_| SyntaxError::expected(input, Expected::Label("an identifier"))))
}

/// A case-insensitive keyword that is not the prefix of a longer word.
pub(super) fn keyword<'q>(name: &'static str) -> impl Fn(&'q str) -> PResult<'q, ()> {
    move |input| {
        let (input, _) = ws(input)?;
        let matched: PResult<'q, &'q str> = tag_no_case(name).parse(input);
        match matched {
            Ok((rest, _)) if !rest.starts_with(is_word_char) => Ok((rest, ())),
            _ => Err(nom::Err::Error(SyntaxError::expected(
                input,
                Expected::Keyword(name),
            ))),
        }
    }
}

pub(super) fn symbol<'q>(text: &'static str) -> impl Fn(&'q str) -> PResult<'q, ()> {
    move |input| {
        let (input, _) = ws(input)?;
        let matched: PResult<'q, ()> = value((), tag(text)).parse(input);
        matched.map_err(|err| err.map(|_| SyntaxError::expected(input, Expected::Symbol(text))))
    }
}

/// An integer or decimal literal. Integers take an optional `L` suffix and
/// narrow to `I32` when they fit.
pub(super) fn number<'q>(input: &'q str) -> PResult<'q, Value> {
    let (input, _) = ws(input)?;
    let parsed: PResult<'q, &'q str> =
        recognize(pair(digit1, opt(pair(char('.'), digit1)))).parse(input);
    let (rest, text) = parsed?;

    if text.contains('.') {
        return match text.parse() {
            Ok(v) => Ok((rest, Value::F64(v))),
            Err(_) => SyntaxError::malformed(input, "invalid decimal literal"),
        };
    }

    let rest = rest
        .strip_prefix(|c: char| matches!(c, 'L' | 'l'))
        .unwrap_or(rest);

    match text.parse::<i64>() {
        Ok(v) => Ok((
            rest,
            match i32::try_from(v) {
                Ok(v) => Value::I32(v),
                Err(_) => Value::I64(v),
            },
        )),
        Err(_) => SyntaxError::malformed(input, "integer literal out of range"),
    }
}

/// A single-quoted string; `''` stands for one quote.
pub(super) fn string<'q>(input: &'q str) -> PResult<'q, String> {
    let (input, _) = ws(input)?;
    let quote: PResult<'q, char> = char('\'').parse(input);
    let (mut rest, _) = quote?;

    let mut text = String::new();
    loop {
        let chunk: PResult<'q, &'q str> = take_while(|c: char| c != '\'').parse(rest);
        let (after, chunk) = chunk?;
        text.push_str(chunk);

        if let Some(after) = after.strip_prefix("''") {
            text.push('\'');
            rest = after;
        } else if let Some(after) = after.strip_prefix('\'') {
            return Ok((after, text));
        } else {
            return SyntaxError::malformed(input, "unterminated string literal");
        }
    }
}

/// `:name`
pub(super) fn named_param<'q>(input: &'q str) -> PResult<'q, String> {
    let (input, _) = ws(input)?;
    let colon: PResult<'q, char> = char(':').parse(input);
    let (rest, _) = colon?;

    let name: PResult<'q, &'q str> = take_while1(is_word_char).parse(rest);
    match name {
        Ok((rest, name)) => Ok((rest, name.to_string())),
        Err(_) => SyntaxError::malformed(input, "expected parameter name after `:`"),
    }
}

/// `?1`
pub(super) fn positional_param<'q>(input: &'q str) -> PResult<'q, u32> {
    let (input, _) = ws(input)?;
    let mark: PResult<'q, char> = char('?').parse(input);
    let (rest, _) = mark?;

    let digits: PResult<'q, &'q str> = digit1(rest);
    let Ok((rest, digits)) = digits else {
        return SyntaxError::malformed(input, "positional parameters must be numbered, e.g. `?1`");
    };

    match digits.parse() {
        Ok(position) => Ok((rest, position)),
        Err(_) => SyntaxError::malformed(input, "invalid parameter position"),
    }
}

/// How the token at the start of `input` reads in an error message.
pub(super) fn describe(input: &str) -> String {
    let input = input.trim_start();
    let Some(first) = input.chars().next() else {
        return "end of query".to_string();
    };

    let rest = [
        string(input).map(|(rest, _)| rest).ok(),
        word(input).map(|(rest, _)| rest).ok(),
        number(input).map(|(rest, _)| rest).ok(),
        named_param(input).map(|(rest, _)| rest).ok(),
        positional_param(input).map(|(rest, _)| rest).ok(),
        SYMBOLS.iter().find_map(|symbol| input.strip_prefix(symbol)),
    ]
    .into_iter()
    .flatten()
    .next();

    let token = &input[..rest.map_or(first.len_utf8(), |rest| input.len() - rest.len())];
    if token.starts_with('\'') {
        token.to_string()
    } else {
        format!("`{token}`")
    }
}
