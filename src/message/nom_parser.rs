//! Nom-based line splitter.
//!
//! Splits one already-delimited protocol line into borrowed pieces:
//!
//! ```text
//! [@tags] [:prefix] <verb> [params...] [:trailing]
//! ```

use nom::{
    bytes::complete::{take_till1, take_while},
    character::complete::char,
    combinator::{opt, verify},
    error::{context, VerboseError, VerboseErrorKind},
    sequence::preceded,
    IResult,
};

use crate::error::ParseError;

type ParseResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

fn spaces(input: &str) -> ParseResult<'_, &str> {
    take_while(|c| c == ' ')(input)
}

fn tag_block(input: &str) -> ParseResult<'_, &str> {
    context(
        "reading the tag block",
        preceded(char('@'), take_till1(|c| c == ' ')),
    )(input)
}

fn prefix(input: &str) -> ParseResult<'_, &str> {
    context(
        "reading the prefix",
        preceded(char(':'), take_till1(|c| c == ' ')),
    )(input)
}

fn verb(input: &str) -> ParseResult<'_, &str> {
    context(
        "reading the verb",
        verify(take_till1(|c| c == ' '), |v: &str| {
            !v.starts_with(':') && !v.starts_with('@')
        }),
    )(input)
}

/// Split what follows the verb into middle params and the trailing part.
fn split_params(mut rest: &str) -> (Vec<&str>, Option<&str>) {
    let mut params = Vec::new();
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            return (params, None);
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            return (params, Some(trailing));
        }
        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }
}

fn line(input: &str) -> ParseResult<'_, RawLine<'_>> {
    let (input, _) = spaces(input)?;
    let (input, tags) = opt(tag_block)(input)?;
    let (input, _) = spaces(input)?;
    let (input, prefix) = opt(prefix)(input)?;
    let (input, _) = spaces(input)?;
    let (input, verb) = verb(input)?;
    let (params, trailing) = split_params(input);

    Ok((
        "",
        RawLine {
            tags,
            prefix,
            verb,
            params,
            trailing,
        },
    ))
}

/// A line split into borrowed slices of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine<'a> {
    /// Tag block without the leading `@`.
    pub tags: Option<&'a str>,
    /// Prefix without the leading `:`.
    pub prefix: Option<&'a str>,
    /// The verb token, case preserved.
    pub verb: &'a str,
    /// Middle parameters.
    pub params: Vec<&'a str>,
    /// Final free-text parameter, without its `:`.
    pub trailing: Option<&'a str>,
}

impl<'a> RawLine<'a> {
    /// Split `input` into its components.
    ///
    /// A trailing CR/LF is ignored. Fails only for an empty line or a line
    /// with no verb token.
    pub fn parse(input: &'a str) -> Result<Self, ParseError> {
        let trimmed = input.trim_end_matches(['\r', '\n']);
        if trimmed.trim_start_matches(' ').is_empty() {
            return Err(ParseError::malformed(input, 0, "reading an empty line"));
        }

        match line(trimmed) {
            Ok((_, raw)) => Ok(raw),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let mut position = trimmed.len();
                let mut what = "reading the verb";
                for (rest, kind) in &e.errors {
                    position = trimmed.len() - rest.len();
                    if let VerboseErrorKind::Context(ctx) = kind {
                        what = ctx;
                    }
                }
                Err(ParseError::malformed(input, position, what))
            }
            Err(nom::Err::Incomplete(_)) => Err(ParseError::malformed(
                input,
                trimmed.len(),
                "reading incomplete input",
            )),
        }
    }
}
