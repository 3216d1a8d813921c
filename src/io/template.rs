//! # Template editor
//!
//! Patches FAST-family text input files in place while keeping every byte the
//! patch does not touch. Two layouts exist and are treated as distinct
//! variants of [`TemplateFormat`]:
//!
//! - **Row** files (`.fst`, HydroDyn, ElastoDyn, MoorDyn option lines):
//!   one parameter per line, value before name, free text after.
//!
//!   ```text
//!        320   WtrDpth     - Water depth (meters)
//!   "hydrodyn.dat"    HydroFile   - Name of file containing hydrodynamic input parameters (quoted string)
//!   ```
//!
//! - **Column** files (MoorDyn tables): a header row names the columns, a
//!   units row follows, then one data row per line / node, keyed by its first
//!   token.
//!
//!   ```text
//!   Line     LineType  UnstrLen  NumSegs    NodeAnch  NodeFair  Flags/Outputs
//!   (-)      (-)       (m)         (-)       (-)       (-)       (-)
//!   1        main      902.2       20         1         4         p
//!   ```
//!
//! ## Matching
//! Lines are tokenized on whitespace (a double-quoted string is one token).
//! A key only matches whole tokens: `Name`, or `Name(i)` for indexed
//! parameters. `X` therefore never matches `WaveX` or `FX`.
//!
//! In row files a run of `n` adjacent key tokens must either start the line
//! (values are the `n` tokens after the run) or follow exactly `n` value
//! tokens (values are those `n` tokens). Key names that appear anywhere else
//! on a line are description text and are ignored.
//!
//! ## Alignment
//! Only the value token is rewritten. The whitespace gap after it shrinks or
//! grows (never below one space) so the following column keeps its position.
//! Writing a value that is already present leaves the file byte-identical.
//!
//! ## Mismatches
//! A key with no matching line, or a matched row too short to hold the value,
//! is a [`TemplateError`] under [`MismatchPolicy::Fail`] and a logged skip
//! under [`MismatchPolicy::Skip`].

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateFormat {
    Row,
    Column,
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateFormat::Row => f.write_str("row-format"),
            TemplateFormat::Column => f.write_str("column-format"),
        }
    }
}

/// Section titles that only occur in MoorDyn-style tabular files.
const COLUMN_SECTIONS: &[&str] = &[
    "LINE TYPES",
    "LINE DICTIONARY",
    "LINE PROPERTIES",
    "NODE PROPERTIES",
    "CONNECTION PROPERTIES",
    "POINTS",
];

impl TemplateFormat {
    /// Classifies a file by its header signature.
    pub fn detect(text: &str) -> Self {
        let banner = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        if banner.to_ascii_uppercase().contains("MOORDYN") {
            return TemplateFormat::Column;
        }
        let tabular = text.lines().filter(|l| is_section_rule(l)).any(|l| {
            let upper = l.to_ascii_uppercase();
            COLUMN_SECTIONS.iter().any(|s| upper.contains(s))
        });
        if tabular { TemplateFormat::Column } else { TemplateFormat::Row }
    }
}

/// What to do when a patch entry cannot be placed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    #[default]
    Fail,
    Skip,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: `{name}` matches no parameter line")]
    NoMatch { path: PathBuf, name: String },

    #[error("{path}:{line}: `{name}` found but the row has no value at the expected position")]
    ShortRow { path: PathBuf, name: String, line: usize },

    #[error("{path} is a {found} template; the {expected} writer cannot edit it")]
    FormatMismatch {
        path: PathBuf,
        found: TemplateFormat,
        expected: TemplateFormat,
    },
}

/// A single replacement: one value, or one value per index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchValue {
    Scalar(String),
    Indexed(IndexMap<String, String>),
}

/// Ordered set of parameter overrides.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Patch {
    entries: IndexMap<String, PatchValue>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.entries.insert(name.into(), PatchValue::Scalar(value.to_string()));
        self
    }

    pub fn indexed<I, K, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: ToString,
        V: ToString,
    {
        let map = values.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        self.entries.insert(name.into(), PatchValue::Indexed(map));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PatchValue) {
        self.entries.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PatchValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Wraps a path in the double quotes FAST expects for file references.
pub fn quoted(path: impl AsRef<Path>) -> String {
    format!("\"{}\"", path.as_ref().display())
}

// -----------------------------------------------------------------------------
// Tokens
// -----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

fn tokens(line: &str) -> Vec<Span> {
    let bytes = line.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        if bytes[i] == b'"' {
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' && bytes[i] != b'\n' {
                i += 1;
            }
            if i < bytes.len() && bytes[i] == b'"' {
                i += 1;
            }
        }
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        out.push(Span { start, end: i });
    }
    out
}

fn text(line: &str, span: Span) -> &str {
    &line[span.start..span.end]
}

/// `None` = bare key, `Some(i)` = `Name(i)`.
fn key_ref<'a>(token: &'a str, name: &str) -> Option<Option<&'a str>> {
    let rest = token.strip_prefix(name)?;
    if rest.is_empty() {
        return Some(None);
    }
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    (!inner.is_empty()).then_some(Some(inner))
}

fn is_section_rule(line: &str) -> bool {
    line.trim_start().starts_with("---")
}

/// Rewrites one token, absorbing the length change in the following gap.
fn replace_span(line: &str, span: Span, value: &str) -> String {
    let old = text(line, span);
    if old == value {
        return line.to_string();
    }
    let after = &line[span.end..];
    let gap_len = after.bytes().take_while(|b| *b == b' ' || *b == b'\t').count();
    let (gap, rest) = after.split_at(gap_len);
    let trailing = rest.trim_end_matches(['\r', '\n']).is_empty();
    let gap = if trailing || gap.contains('\t') {
        gap.to_string()
    } else {
        let width = gap.len() as isize + old.chars().count() as isize - value.chars().count() as isize;
        " ".repeat(width.max(1) as usize)
    };
    format!("{}{}{}{}", &line[..span.start], value, gap, rest)
}

// -----------------------------------------------------------------------------
// Row layout
// -----------------------------------------------------------------------------

enum RowMatch<'a> {
    None,
    Short,
    /// (index of the key, value span) for each key in the run.
    Found(Vec<(Option<&'a str>, Span)>),
}

fn locate_row<'a>(line: &'a str, name: &str) -> RowMatch<'a> {
    let toks = tokens(line);
    let Some(start) = toks.iter().position(|t| key_ref(text(line, *t), name).is_some()) else {
        return RowMatch::None;
    };
    let keys: Vec<Option<&str>> = toks[start..]
        .iter()
        .map_while(|t| key_ref(text(line, *t), name))
        .collect();
    let n = keys.len();
    let values = if start == 0 {
        match toks.get(n..2 * n) {
            Some(v) => v,
            None => return RowMatch::Short,
        }
    } else if start == n {
        &toks[..n]
    } else {
        return RowMatch::None;
    };
    RowMatch::Found(keys.into_iter().zip(values.iter().copied()).collect())
}

// -----------------------------------------------------------------------------
// Template
// -----------------------------------------------------------------------------

/// An input file held as its original lines (line endings included).
#[derive(Clone, Debug)]
pub struct Template {
    path: PathBuf,
    format: TemplateFormat,
    lines: Vec<String>,
    policy: MismatchPolicy,
}

impl Template {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| TemplateError::Io { path: path.to_path_buf(), source })?;
        Ok(Self::parse(path, &text))
    }

    /// Builds a template from text; `path` is only used in error messages.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            format: TemplateFormat::detect(text),
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
            policy: MismatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MismatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn format(&self) -> TemplateFormat {
        self.format
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> String {
        self.lines.concat()
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), TemplateError> {
        let path = path.as_ref();
        fs::write(path, self.text())
            .map_err(|source| TemplateError::Io { path: path.to_path_buf(), source })
    }

    /// Applies `patch` with the writer matching this file's format.
    pub fn apply(&mut self, patch: &Patch) -> Result<(), TemplateError> {
        match self.format {
            TemplateFormat::Row => self.apply_rows(patch),
            TemplateFormat::Column => self.apply_columns(patch),
        }
    }

    /// Row writer. Refuses column-format files.
    pub fn apply_rows(&mut self, patch: &Patch) -> Result<(), TemplateError> {
        self.expect_format(TemplateFormat::Row)?;
        for (name, value) in patch.iter() {
            self.patch_rows(name, value)?;
        }
        Ok(())
    }

    /// Column writer. Table columns are edited by header position; names
    /// without a table header fall back to the row rules (MoorDyn option
    /// lines). Refuses row-format files.
    pub fn apply_columns(&mut self, patch: &Patch) -> Result<(), TemplateError> {
        self.expect_format(TemplateFormat::Column)?;
        for (name, value) in patch.iter() {
            match self.find_header(name) {
                Some((header, col)) => self.patch_column(name, value, header, col)?,
                None => self.patch_rows(name, value)?,
            }
        }
        Ok(())
    }

    /// Replaces every quoted relative path held by a `*File` parameter with
    /// the same path resolved against `base`. Returns the number rewritten.
    pub fn rebase_file_refs(&mut self, base: &Path) -> usize {
        if self.format != TemplateFormat::Row {
            return 0;
        }
        let mut rewritten = 0;
        for line in self.lines.iter_mut() {
            let toks = tokens(line);
            let (Some(value), Some(key)) = (toks.first().copied(), toks.get(1).copied()) else {
                continue;
            };
            let name = text(line, key).split('(').next().unwrap_or("");
            if !name.ends_with("File") {
                continue;
            }
            let Some(inner) = text(line, value).strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
                continue;
            };
            let placeholder = ["", "unused", "none", "default"]
                .iter()
                .any(|p| inner.eq_ignore_ascii_case(p));
            if placeholder || Path::new(inner).is_absolute() {
                continue;
            }
            let resolved = quoted(base.join(inner));
            *line = replace_span(line, value, &resolved);
            rewritten += 1;
        }
        rewritten
    }

    /// Value of a row-format parameter (first match).
    pub fn row_value(&self, name: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match locate_row(line, name) {
            RowMatch::Found(slots) => slots.first().map(|(_, span)| text(line, *span)),
            _ => None,
        })
    }

    /// Value of a table column, for the row keyed by `index` or, when `index`
    /// is `None`, the first data row after the header.
    pub fn column_value(&self, name: &str, index: Option<&str>) -> Option<&str> {
        let (header, col) = self.find_header(name)?;
        let row = match index {
            Some(idx) => self.find_data_row(header, idx)?,
            None => header + 2,
        };
        let line = self.lines.get(row)?;
        tokens(line).get(col).map(|span| text(line, *span))
    }

    fn expect_format(&self, expected: TemplateFormat) -> Result<(), TemplateError> {
        if self.format == expected {
            Ok(())
        } else {
            Err(TemplateError::FormatMismatch {
                path: self.path.clone(),
                found: self.format,
                expected,
            })
        }
    }

    fn mismatch(&self, err: TemplateError) -> Result<(), TemplateError> {
        match self.policy {
            MismatchPolicy::Fail => Err(err),
            MismatchPolicy::Skip => {
                warn!(error = %err, "template entry skipped");
                Ok(())
            }
        }
    }

    fn no_match(&self, name: impl Into<String>) -> TemplateError {
        TemplateError::NoMatch { path: self.path.clone(), name: name.into() }
    }

    fn short_row(&self, name: impl Into<String>, line: usize) -> TemplateError {
        TemplateError::ShortRow { path: self.path.clone(), name: name.into(), line: line + 1 }
    }

    fn patch_rows(&mut self, name: &str, value: &PatchValue) -> Result<(), TemplateError> {
        let mut hit_any = false;
        let mut hit_indices: HashSet<String> = HashSet::new();
        let mut short_rows = Vec::new();

        for li in 0..self.lines.len() {
            let line = &self.lines[li];
            let mut edits: Vec<(Span, &str)> = match locate_row(line, name) {
                RowMatch::None => continue,
                RowMatch::Short => {
                    short_rows.push(li);
                    continue;
                }
                RowMatch::Found(slots) => match value {
                    PatchValue::Scalar(v) => slots.iter().map(|(_, span)| (*span, v.as_str())).collect(),
                    PatchValue::Indexed(map) => slots
                        .iter()
                        .filter_map(|(idx, span)| {
                            let idx = (*idx)?;
                            let v = map.get(idx)?;
                            hit_indices.insert(idx.to_string());
                            Some((*span, v.as_str()))
                        })
                        .collect(),
                },
            };
            if edits.is_empty() {
                continue;
            }
            hit_any = true;
            edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
            let mut updated = line.clone();
            for (span, v) in edits {
                updated = replace_span(&updated, span, v);
            }
            debug!(path = %self.path.display(), line = li + 1, name, "patched row");
            self.lines[li] = updated;
        }

        for li in short_rows {
            self.mismatch(self.short_row(name, li))?;
        }
        match value {
            PatchValue::Scalar(_) if !hit_any => self.mismatch(self.no_match(name)),
            PatchValue::Indexed(map) => {
                for idx in map.keys().filter(|k| !hit_indices.contains(*k)) {
                    self.mismatch(self.no_match(format!("{name}({idx})")))?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Header row containing `name` as a column title, followed by a units row.
    fn find_header(&self, name: &str) -> Option<(usize, usize)> {
        self.lines.iter().enumerate().find_map(|(li, line)| {
            let col = tokens(line).iter().position(|t| text(line, *t) == name)?;
            let units = self.lines.get(li + 1)?;
            let first = tokens(units).first().copied()?;
            text(units, first).starts_with('(').then_some((li, col))
        })
    }

    fn find_data_row(&self, header: usize, index: &str) -> Option<usize> {
        self.lines
            .iter()
            .enumerate()
            .skip(header + 2)
            .take_while(|(_, line)| !is_section_rule(line))
            .find(|(_, line)| {
                tokens(line).first().is_some_and(|t| text(line, *t) == index)
            })
            .map(|(li, _)| li)
    }

    fn replace_cell(&mut self, name: &str, row: usize, col: usize, value: &str) -> Result<(), TemplateError> {
        let line = &self.lines[row];
        match tokens(line).get(col) {
            Some(span) => {
                self.lines[row] = replace_span(line, *span, value);
                debug!(path = %self.path.display(), line = row + 1, name, "patched column");
                Ok(())
            }
            None => self.mismatch(self.short_row(name, row)),
        }
    }

    fn patch_column(
        &mut self,
        name: &str,
        value: &PatchValue,
        header: usize,
        col: usize,
    ) -> Result<(), TemplateError> {
        match value {
            PatchValue::Scalar(v) => {
                let row = header + 2;
                let is_data = self.lines.get(row).is_some_and(|l| !is_section_rule(l) && !l.trim().is_empty());
                if !is_data {
                    return self.mismatch(self.short_row(name, header + 1));
                }
                self.replace_cell(name, row, col, v)
            }
            PatchValue::Indexed(map) => {
                for (idx, v) in map {
                    match self.find_data_row(header, idx) {
                        Some(row) => self.replace_cell(name, row, col, v)?,
                        None => self.mismatch(self.no_match(format!("{name}({idx})")))?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Row writer: `template` → `output` with `patch` applied.
pub fn generate(
    template: impl AsRef<Path>,
    output: impl AsRef<Path>,
    patch: &Patch,
    policy: MismatchPolicy,
) -> Result<(), TemplateError> {
    let mut t = Template::load(template)?.with_policy(policy);
    t.apply_rows(patch)?;
    t.write(output)
}

/// Column writer for MoorDyn-style tables.
pub fn generate_columns(
    template: impl AsRef<Path>,
    output: impl AsRef<Path>,
    patch: &Patch,
    policy: MismatchPolicy,
) -> Result<(), TemplateError> {
    let mut t = Template::load(template)?.with_policy(policy);
    t.apply_columns(patch)?;
    t.write(output)
}
