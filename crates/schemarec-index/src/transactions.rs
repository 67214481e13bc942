//! Training transactions in TSV form, and conversion from raw JSONL records.
//!
//! One transaction per line, labels separated by tabs (`key=value` tags,
//! property names, or `t#`-prefixed types). Blank lines and empty cells are
//! ignored; a line made only of tabs is an empty transaction.
//!
//! Raw extracts arrive as JSON lines, optionally prefixed with the JSON text
//! sequence record separator (`0x1E`). Each record contributes the entries of
//! its `tags` object (or, when that is missing or empty, its `properties`
//! object) as `key=value` cells. Records with fewer than two tags and lines
//! that are not JSON are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::tree::{SchemaTree, SchemaTreeBuilder};

/// JSON text sequence record separator.
const RECORD_SEPARATOR: char = '\u{1e}';

/// Call `sink` with the non-empty cells of every transaction in `reader`.
pub fn for_each_tsv_transaction<R, F>(reader: R, mut sink: F) -> Result<usize>
where
    R: BufRead,
    F: FnMut(&[&str]),
{
    let mut added = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading transaction line {}", lineno + 1))?;
        let line = line.trim_end_matches(['\r', '\n']);
        if !line.contains('\t') && line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split('\t').map(str::trim).filter(|c| !c.is_empty()).collect();
        sink(&cells);
        added += 1;
    }
    Ok(added)
}

/// Feed every transaction in `reader` into `builder`.
pub fn read_tsv_into<R: BufRead>(reader: R, builder: &mut SchemaTreeBuilder) -> Result<usize> {
    for_each_tsv_transaction(reader, |cells| builder.add_transaction(cells.iter().copied()))
}

/// Build a tree from TSV transactions.
pub fn read_tsv<R: BufRead>(reader: R) -> Result<SchemaTree> {
    let mut builder = SchemaTreeBuilder::new();
    read_tsv_into(reader, &mut builder)?;
    Ok(builder.build())
}

/// Build a tree from a TSV transaction file.
pub fn load_tsv(path: &Path) -> Result<SchemaTree> {
    let file =
        File::open(path).with_context(|| format!("opening transactions {}", path.display()))?;
    let mut builder = SchemaTreeBuilder::new();
    let added = read_tsv_into(BufReader::new(file), &mut builder)
        .with_context(|| format!("reading transactions {}", path.display()))?;
    let tree = builder.build();
    info!(
        path = %path.display(),
        transactions = added,
        items = tree.registry().len(),
        nodes = tree.len(),
        "loaded schema tree"
    );
    Ok(tree)
}

// ============================================================================
// JSONL records
// ============================================================================

/// Counters from one pass over a JSONL extract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonlStats {
    /// Non-blank input lines.
    pub lines: usize,
    /// Lines that did not parse as JSON.
    pub malformed: usize,
    /// Records with at least two tags.
    pub kept: usize,
}

/// Parse one JSONL line, dropping a leading record separator.
pub fn parse_record(line: &str) -> Option<Value> {
    let line = line.strip_prefix(RECORD_SEPARATOR).unwrap_or(line);
    serde_json::from_str(line).ok()
}

/// The tag object of a record: `tags` if non-empty, else `properties`.
fn tag_object(record: &Value) -> Option<&Map<String, Value>> {
    match record.get("tags") {
        Some(Value::Object(tags)) if !tags.is_empty() => Some(tags),
        _ => record.get("properties").and_then(Value::as_object),
    }
}

/// `key=value` cells for a record, sorted by key.
///
/// String values are used verbatim, other values as JSON text. Tabs and line
/// breaks become spaces so every cell stays inside its TSV column.
pub fn record_tags(record: &Value) -> Vec<String> {
    let Some(tags) = tag_object(record) else {
        return Vec::new();
    };
    tags.iter()
        .map(|(key, value)| {
            let cell = match value {
                Value::String(s) => format!("{key}={s}"),
                other => format!("{key}={other}"),
            };
            cell.replace(['\t', '\r', '\n'], " ")
        })
        .collect()
}

/// Call `sink` with the tags of every record that has at least two.
///
/// Invalid UTF-8 is replaced rather than rejected.
pub fn for_each_jsonl_record<R, F>(mut reader: R, mut sink: F) -> Result<JsonlStats>
where
    R: BufRead,
    F: FnMut(Vec<String>) -> Result<()>,
{
    let mut stats = JsonlStats::default();
    let mut buf = Vec::new();
    let mut lineno = 0usize;
    loop {
        buf.clear();
        lineno += 1;
        let read = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("reading JSONL line {lineno}"))?;
        if read == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() || line == "\u{1e}" {
            continue;
        }
        stats.lines += 1;

        let Some(record) = parse_record(line) else {
            stats.malformed += 1;
            continue;
        };
        let tags = record_tags(&record);
        if tags.len() > 1 {
            stats.kept += 1;
            sink(tags)?;
        }
    }
    debug!(
        lines = stats.lines,
        malformed = stats.malformed,
        kept = stats.kept,
        "scanned JSONL records"
    );
    Ok(stats)
}

/// Feed every usable JSONL record into `builder` as one transaction.
pub fn read_jsonl_into<R: BufRead>(reader: R, builder: &mut SchemaTreeBuilder) -> Result<JsonlStats> {
    for_each_jsonl_record(reader, |tags| {
        builder.add_transaction(tags);
        Ok(())
    })
}

/// Build a tree straight from a JSONL extract.
pub fn load_jsonl(path: &Path) -> Result<SchemaTree> {
    let file = File::open(path).with_context(|| format!("opening records {}", path.display()))?;
    let mut builder = SchemaTreeBuilder::new();
    let stats = read_jsonl_into(BufReader::new(file), &mut builder)
        .with_context(|| format!("reading records {}", path.display()))?;
    let tree = builder.build();
    info!(
        path = %path.display(),
        transactions = stats.kept,
        malformed = stats.malformed,
        items = tree.registry().len(),
        "loaded schema tree from JSONL"
    );
    Ok(tree)
}

/// Rewrite a JSONL extract as TSV transactions.
pub fn convert_jsonl_to_tsv<R: BufRead, W: Write>(reader: R, mut out: W) -> Result<JsonlStats> {
    let stats = for_each_jsonl_record(reader, |tags| {
        writeln!(out, "{}", tags.join("\t")).context("writing TSV transaction")
    })?;
    out.flush().context("flushing TSV output")?;
    Ok(stats)
}
