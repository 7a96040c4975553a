//! CSV injection guard
//!
//! Cells that start with a spreadsheet formula trigger are prefixed with an
//! apostrophe so spreadsheet applications show them as text. Control
//! characters that could break row framing are removed before the `csv`
//! writer quotes the record.

use std::borrow::Cow;

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::Result;

/// Characters that make spreadsheet applications evaluate a cell.
pub const FORMULA_TRIGGERS: [char; 4] = ['=', '+', '-', '@'];

const NEUTRALIZER: char = '\'';

/// Cell sanitisation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectionGuard {
    /// Let plain signed decimals like `-74.006` through without a prefix.
    pub allow_signed_numbers: bool,
}

impl InjectionGuard {
    /// Strict guard: every formula trigger is neutralised.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Strip control characters and neutralise formula triggers.
    pub fn sanitize<'a>(&self, cell: &'a str) -> Cow<'a, str> {
        let cleaned = strip_controls(cell);

        if !cleaned.starts_with(FORMULA_TRIGGERS) {
            return cleaned;
        }

        if self.allow_signed_numbers && is_signed_number(&cleaned) {
            return cleaned;
        }

        let mut out = String::with_capacity(cleaned.len() + 1);
        out.push(NEUTRALIZER);
        out.push_str(&cleaned);
        Cow::Owned(out)
    }

    /// Sanitise `cells` and encode them as one RFC 4180 record, `\r\n`
    /// terminator included.
    ///
    /// Only cells holding a delimiter, quote or line break are quoted. A
    /// record made of a single empty cell is written as `""` so it does not
    /// read back as a blank line.
    pub fn encode_record<'a, I>(&self, cells: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let cells: Vec<Cow<'a, str>> = cells.into_iter().map(|cell| self.sanitize(cell)).collect();
        let capacity = cells.iter().map(|cell| cell.len() + 3).sum::<usize>() + 2;

        let mut line = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::CRLF)
            .buffer_capacity(capacity)
            .from_writer(Vec::with_capacity(capacity));
        line.write_record(cells.iter().map(|cell| cell.as_bytes()))?;
        line.into_inner().map_err(|err| err.into_error().into())
    }
}

/// Sanitise with the strict policy.
pub fn sanitize(cell: &str) -> Cow<'_, str> {
    InjectionGuard::strict().sanitize(cell)
}

/// Encode one record with the strict policy.
pub fn encode_record<'a, I>(cells: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a str>,
{
    InjectionGuard::strict().encode_record(cells)
}

/// Remove NUL and other C0 controls except tab and newline.
///
/// `\r\n` collapses to `\n`; a lone `\r` is dropped.
fn strip_controls(cell: &str) -> Cow<'_, str> {
    let needs_work = cell
        .chars()
        .any(|c| c.is_ascii_control() && c != '\t' && c != '\n');
    if !needs_work {
        return Cow::Borrowed(cell);
    }

    let mut out = String::with_capacity(cell.len());
    let mut chars = cell.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    out.push('\n');
                    chars.next();
                }
            }
            '\t' | '\n' => out.push(c),
            c if c.is_ascii_control() => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// `-12`, `+0.5`, `-74.006`: sign, digits, at most one point.
fn is_signed_number(cell: &str) -> bool {
    let Some(rest) = cell.strip_prefix(['-', '+']) else {
        return false;
    };
    let (int, frac) = rest.split_once('.').unwrap_or((rest, ""));
    !int.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
        && !(rest.ends_with('.'))
}
