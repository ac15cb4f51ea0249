//! Line-level parsing of the `.dat` file: tokenized lines, structural
//! markers, result-set headers and data rows.

use std::io::{self, BufRead};
use std::sync::LazyLock;

use regex::Regex;

use crate::entities::{DatEntity, ResultLocation};

static COMPONENT_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((.*?)\)").expect("component group pattern is valid"));

/// A non-blank line split at whitespace.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DatLine {
    pub line_no: usize,
    pub tokens: Vec<String>,
}

impl DatLine {
    /// The line with all whitespace removed. CalculiX writes its markers
    /// letter-spaced (`S T E P`), this turns them into plain words.
    pub fn condensed(&self) -> String {
        self.tokens.concat()
    }
}

/// Pull-based reader over the non-blank lines of a `.dat` file. A line can
/// be handed back with [`LineCursor::unread`] so the enclosing state sees it
/// again.
pub(crate) struct LineCursor<R> {
    reader: R,
    buf: String,
    line_no: usize,
    pending: Option<DatLine>,
}

impl<R: BufRead> LineCursor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line_no: 0,
            pending: None,
        }
    }

    pub fn next_line(&mut self) -> io::Result<Option<DatLine>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let tokens: Vec<String> = self.buf.split_whitespace().map(str::to_string).collect();
            if !tokens.is_empty() {
                return Ok(Some(DatLine {
                    line_no: self.line_no,
                    tokens,
                }));
            }
        }
    }

    pub fn unread(&mut self, line: DatLine) {
        debug_assert!(self.pending.is_none(), "only one line can be handed back");
        self.pending = Some(line);
    }
}

/// Structural markers of the `.dat` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Marker {
    /// `S T E P  n`
    Step(u32),
    /// `I N C R E M E N T  n`
    Increment,
    /// `E I G E N V A L U E   N U M B E R  n`
    EigenvalueNumber,
    /// `E I G E N V A L U E   O U T P U T`
    EigenvalueOutput,
    /// `B U C K L I N G   F A C T O R   O U T P U T`
    BucklingFactorOutput,
}

pub(crate) fn marker(line: &DatLine) -> Option<Marker> {
    let condensed = line.condensed();
    if let Some(rest) = condensed.strip_prefix("STEP") {
        return rest.parse().ok().map(Marker::Step);
    }
    if condensed.starts_with("INCREMENT") {
        return Some(Marker::Increment);
    }
    if condensed.starts_with("EIGENVALUENUMBER") {
        return Some(Marker::EigenvalueNumber);
    }
    if condensed.starts_with("EIGENVALUEOUTPUT") {
        return Some(Marker::EigenvalueOutput);
    }
    if condensed.starts_with("BUCKLINGFACTOROUTPUT") {
        return Some(Marker::BucklingFactorOutput);
    }
    None
}

/// Parsed result-set header, e.g.
/// `displacements (vx,vy,vz) for set NALL and time  0.1000000E+01`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Header {
    pub entity: DatEntity,
    pub set_name: String,
    pub step_time: f64,
    pub component_names: Vec<String>,
}

/// Parses a result-set header. Returns `None` for anything that is not the
/// header of a known entity, including `total ...` headers.
pub(crate) fn parse_header(tokens: &[String]) -> Option<Header> {
    if tokens.first().is_some_and(|t| t.eq_ignore_ascii_case("total")) {
        return None;
    }

    // the entity name ends at the first '(' or the word 'for'
    let end = tokens
        .iter()
        .position(|t| t.starts_with('(') || t == "for")?;
    let entity: DatEntity = tokens[..end].join(" ").to_lowercase().parse().ok()?;

    let step_time: f64 = tokens.last()?.parse().ok()?;
    let i_and = tokens.iter().position(|t| t == "and")?;
    let set_name = match tokens.iter().position(|t| t == "set") {
        Some(i_set) if i_set < i_and => tokens[i_set + 1..i_and].join(" "),
        _ => String::new(),
    };

    Some(Header {
        entity,
        set_name,
        step_time,
        component_names: parse_component_names(&tokens.join(" ")),
    })
}

/// All parenthesized groups of the line, comma separated and trimmed.
pub(crate) fn parse_component_names(line: &str) -> Vec<String> {
    COMPONENT_GROUP
        .captures_iter(line)
        .flat_map(|caps| {
            caps.get(1)
                .map_or("", |m| m.as_str())
                .split(',')
                .map(|c| c.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|c| !c.is_empty())
        .collect()
}

/// Parses a data row into its id and components.
///
/// Integration point rows carry the integration point number as second
/// column, which is skipped. Trailing non-numeric tokens are dropped.
/// `None` means the line is not a data row and ends the current block.
pub(crate) fn parse_data_row(tokens: &[String], location: ResultLocation) -> Option<(u32, Vec<f64>)> {
    let id: u32 = tokens.first()?.parse().ok()?;
    let first_component = match location {
        ResultLocation::IntegrationPoint => {
            tokens.get(1)?.parse::<u32>().ok()?;
            2
        }
        ResultLocation::Nodal | ResultLocation::Element => 1,
    };

    let mut components = tokens.get(first_component..)?;
    while let Some((last, rest)) = components.split_last() {
        if last.parse::<f64>().is_ok() {
            break;
        }
        components = rest;
    }
    if components.is_empty() {
        return None;
    }

    let values = components
        .iter()
        .map(|t| t.parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()?;
    Some((id, values))
}

/// Parses `n` floats starting at `start`.
pub(crate) fn parse_floats<const N: usize>(tokens: &[String], start: usize) -> Option<[f64; N]> {
    let slice = tokens.get(start..start + N)?;
    let mut out = [0.0; N];
    for (dst, token) in out.iter_mut().zip(slice) {
        *dst = token.parse().ok()?;
    }
    Some(out)
}
