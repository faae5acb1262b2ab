//! LDraw record parser.
//!
//! Records are parsed one line at a time. A record whose kind is unknown
//! is not an error; it is simply skipped. A record of a known kind whose
//! fields do not parse is reported so the caller can drop it.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;

use l2rib_math::{Mat4, Mat4Ext, Vec3};
use thiserror::Error;

use super::types::*;

/// Errors that can occur while parsing a single record.
#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("line {line}: missing field in type {kind} record")]
    MissingField { line: usize, kind: u32 },

    #[error("line {line}: invalid number `{token}`")]
    InvalidNumber { line: usize, token: String },

    #[error("line {line}: invalid colour `{token}`")]
    InvalidColour { line: usize, token: String },

    #[error("line {line}: part reference without a part name")]
    MissingPartName { line: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Read an LDraw file as text.
///
/// Files are not required to be UTF-8; invalid byte sequences (Latin-1
/// author names, typically) become U+FFFD instead of failing the read.
pub fn read_source<P: AsRef<Path>>(path: P) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Queue of numbered records, consumed front to back.
///
/// A consumer that hits a record it should not handle (a sub-document
/// boundary) puts it back with [`LineStream::push_front`].
#[derive(Clone, Debug, Default)]
pub struct LineStream {
    lines: VecDeque<(usize, String)>,
}

impl LineStream {
    /// Create a stream from file contents. Line numbers start at 1.
    pub fn new(content: &str) -> Self {
        let lines = content
            .lines()
            .enumerate()
            .map(|(i, s)| (i + 1, s.trim_end_matches('\r').to_string()))
            .collect();
        Self { lines }
    }

    /// Create a stream from already numbered records.
    pub fn from_records(records: Vec<(usize, String)>) -> Self {
        Self {
            lines: records.into(),
        }
    }

    pub fn next_record(&mut self) -> Option<(usize, String)> {
        self.lines.pop_front()
    }

    pub fn push_front(&mut self, record: (usize, String)) {
        self.lines.push_front(record);
    }

    pub fn peek(&self) -> Option<&(usize, String)> {
        self.lines.front()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

/// Split the leading whitespace-delimited token off `s`.
fn split_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(end) => Some((&s[..end], &s[end..])),
        None => Some((s, "")),
    }
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Leading command kind of a record, if it has a numeric one.
fn command_kind(line: &str) -> Option<(u32, &str)> {
    let (token, rest) = split_token(line)?;
    if !is_numeric(token) {
        return None;
    }
    token.parse().ok().map(|kind| (kind, rest))
}

/// If `line` is a `0 FILE <name>` record, return the normalized name.
pub fn file_boundary(line: &str) -> Option<PartId> {
    let (kind, rest) = command_kind(line)?;
    if kind != 0 {
        return None;
    }
    match split_token(rest)? {
        ("FILE", name) => Some(PartId::normalize(name)),
        _ => None,
    }
}

/// Cursor over the fields of one record.
struct Fields<'a> {
    rest: &'a str,
    line: usize,
    kind: u32,
}

impl<'a> Fields<'a> {
    fn token(&mut self) -> ParseResult<&'a str> {
        let (token, rest) = split_token(self.rest).ok_or(ParseError::MissingField {
            line: self.line,
            kind: self.kind,
        })?;
        self.rest = rest;
        Ok(token)
    }

    fn float(&mut self) -> ParseResult<f32> {
        let token = self.token()?;
        token.parse().map_err(|_| ParseError::InvalidNumber {
            line: self.line,
            token: token.to_string(),
        })
    }

    fn point(&mut self) -> ParseResult<Vec3> {
        Ok(Vec3::new(self.float()?, self.float()?, self.float()?))
    }

    fn points<const N: usize>(&mut self) -> ParseResult<[Vec3; N]> {
        let mut points = [Vec3::ZERO; N];
        for p in points.iter_mut() {
            *p = self.point()?;
        }
        Ok(points)
    }

    fn colour(&mut self) -> ParseResult<ColourToken> {
        let token = self.token()?;
        parse_colour_token(token).ok_or_else(|| ParseError::InvalidColour {
            line: self.line,
            token: token.to_string(),
        })
    }
}

/// Parse the colour field: decimal palette index, or hexadecimal direct
/// colour (with or without a `0x` prefix).
pub fn parse_colour_token(token: &str) -> Option<ColourToken> {
    if is_numeric(token) {
        return token.parse().ok().map(ColourToken::Index);
    }
    let hex = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u32::from_str_radix(hex, 16).ok().map(ColourToken::Direct)
}

/// Parse a single record.
///
/// Returns `Ok(None)` for blank lines and records without a recognized
/// numeric kind.
pub fn parse_command(line_number: usize, line: &str) -> ParseResult<Option<Command>> {
    let Some((kind, rest)) = command_kind(line) else {
        return Ok(None);
    };
    let mut fields = Fields {
        rest,
        line: line_number,
        kind,
    };

    let command = match kind {
        0 => Command::Meta(parse_meta(rest)),
        1 => Command::PartRef(parse_part_ref(&mut fields)?),
        2 => Command::Line(LineSeg {
            colour: fields.colour()?,
            points: fields.points()?,
        }),
        3 => Command::Triangle(Triangle {
            colour: fields.colour()?,
            points: fields.points()?,
        }),
        4 => Command::Quad(Quad {
            colour: fields.colour()?,
            points: fields.points()?,
        }),
        5 => {
            let colour = fields.colour()?;
            let [a, b, c, d] = fields.points()?;
            Command::OptionalLine(OptionalLine {
                colour,
                points: [a, b],
                controls: [c, d],
            })
        }
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn parse_meta(rest: &str) -> Meta {
    match split_token(rest) {
        Some(("FILE", name)) => Meta::File(PartId::normalize(name)),
        Some(("!COLOUR", definition)) => Meta::Colour(definition.trim().to_string()),
        Some(("WRITE" | "PRINT", text)) => Meta::Write(text.trim().to_string()),
        _ => Meta::Comment,
    }
}

fn parse_part_ref(fields: &mut Fields<'_>) -> ParseResult<PartRef> {
    let colour = fields.colour()?;
    let translation = fields.point()?;
    let mut rows = [0.0; 9];
    for value in rows.iter_mut() {
        *value = fields.float()?;
    }

    let part = PartId::normalize(fields.rest);
    if part.is_empty() {
        return Err(ParseError::MissingPartName { line: fields.line });
    }

    Ok(PartRef {
        colour,
        matrix: Mat4::from_placement(translation, rows).with_zero_scale_clamped(),
        part,
    })
}
