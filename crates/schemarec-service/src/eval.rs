//! Offline evaluation against a gold file.
//!
//! Each non-blank line of the eval file is `query<TAB>gold`, both sides lists
//! of labels separated by `,` or `;`. For every case the service is asked to
//! recommend from the query labels, and the ranked list is scored:
//!
//! - `hit@1`: the first recommendation is a gold label
//! - `hit@K`: any of the first `K` recommendations is a gold label
//! - `AP@K`: `Σ precision@i · rel_i / min(|gold|, K)` over the first `K`
//!
//! Large gold files are cut down with [`sample_eval_lines`], which draws a
//! fixed number of lines with a seeded RNG so runs stay comparable.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use schemarec_index::Recommendations;
use serde::Serialize;
use tracing::debug;

use crate::{RecoMode, RecommenderService};

/// `K` used when none is given.
pub const DEFAULT_TOP_K: usize = 3;

/// Lines kept by [`sample_eval_lines`] when none is given.
pub const DEFAULT_SAMPLE_SIZE: usize = 300;

/// Seed used by [`sample_eval_lines`] when none is given.
pub const DEFAULT_SAMPLE_SEED: u64 = 42;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("eval file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A reader failed before a path was known.
    #[error("failed to read eval cases: {0}")]
    Read(#[source] std::io::Error),
    #[error("eval line {line}: {message}")]
    Format { line: usize, message: String },
    #[error("cannot sample {requested} lines from {available}")]
    SampleTooLarge { requested: usize, available: usize },
}

/// One evaluation case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalCase {
    pub line: usize,
    pub query: Vec<String>,
    pub gold: Vec<String>,
}

/// Metrics for one case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseMetrics {
    pub line: usize,
    pub slice: &'static str,
    pub hit_at_1: bool,
    pub hit_at_k: bool,
    pub average_precision: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SliceSummary {
    pub cases: usize,
    pub mean_hit_at_1: f64,
    pub mean_hit_at_k: f64,
    pub mean_average_precision: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub top_k: usize,
    pub mode: String,
    pub overall: SliceSummary,
    pub slices: BTreeMap<&'static str, SliceSummary>,
    pub cases: Vec<CaseMetrics>,
}

fn split_labels(s: &str) -> Vec<String> {
    s.split([',', ';'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse one eval line (1-based `line` for error messages).
pub fn parse_eval_line(line: usize, text: &str) -> Result<EvalCase, EvalError> {
    let mut parts = text.split('\t');
    let (Some(query), Some(gold), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(EvalError::Format {
            line,
            message: "expected exactly one TAB between query and gold".to_string(),
        });
    };
    Ok(EvalCase {
        line,
        query: split_labels(query),
        gold: split_labels(gold),
    })
}

pub fn read_eval_cases<R: BufRead>(reader: R) -> Result<Vec<EvalCase>, EvalError> {
    let mut cases = Vec::new();
    for (idx, text) in reader.lines().enumerate() {
        let text = text.map_err(EvalError::Read)?;
        let text = text.trim_end_matches('\r');
        if text.trim().is_empty() {
            continue;
        }
        cases.push(parse_eval_line(idx + 1, text)?);
    }
    Ok(cases)
}

pub fn load_eval_cases(path: &Path) -> Result<Vec<EvalCase>, EvalError> {
    let io_err = |source: std::io::Error| EvalError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    read_eval_cases(BufReader::new(file)).map_err(|err| match err {
        EvalError::Read(source) => io_err(source),
        other => other,
    })
}

/// Coarse category of a query, taken from its first tag's key.
pub fn slice_of(query: &[String]) -> &'static str {
    let Some(first) = query.first() else {
        return "misc";
    };
    let key = first.split('=').next().unwrap_or(first);
    match key {
        "building" => "building",
        "highway" => "highway",
        "railway" => "railway",
        "waterway" => "waterway",
        "addr:city" => "address",
        _ => "misc",
    }
}

/// Score one ranked list against its gold labels.
pub fn score_case(case: &EvalCase, recs: &Recommendations, top_k: usize) -> CaseMetrics {
    let gold: HashSet<&str> = case.gold.iter().map(String::as_str).collect();
    let labels = recs.labels();

    let hit_at_1 = labels.first().is_some_and(|l| gold.contains(l));
    let hit_at_k = labels.iter().take(top_k).any(|l| gold.contains(l));

    let mut score = 0.0;
    let mut hits = 0usize;
    for (i, label) in labels.iter().take(top_k).enumerate() {
        if gold.contains(label) {
            hits += 1;
            score += hits as f64 / (i + 1) as f64;
        }
    }
    let denom = gold.len().min(top_k);
    let average_precision = if denom == 0 { 0.0 } else { score / denom as f64 };

    CaseMetrics {
        line: case.line,
        slice: slice_of(&case.query),
        hit_at_1,
        hit_at_k,
        average_precision,
    }
}

fn summarize<'a>(rows: impl Iterator<Item = &'a CaseMetrics>) -> SliceSummary {
    let mut summary = SliceSummary::default();
    for row in rows {
        summary.cases += 1;
        summary.mean_hit_at_1 += f64::from(u8::from(row.hit_at_1));
        summary.mean_hit_at_k += f64::from(u8::from(row.hit_at_k));
        summary.mean_average_precision += row.average_precision;
    }
    if summary.cases > 0 {
        let n = summary.cases as f64;
        summary.mean_hit_at_1 /= n;
        summary.mean_hit_at_k /= n;
        summary.mean_average_precision /= n;
    }
    summary
}

/// Run every case through `service` and aggregate.
pub fn evaluate(
    service: &RecommenderService,
    cases: &[EvalCase],
    top_k: usize,
    mode: RecoMode,
) -> EvalReport {
    let no_types: [&str; 0] = [];
    let rows: Vec<CaseMetrics> = cases
        .iter()
        .map(|case| {
            let recs = service.recommend_with_mode(&case.query, &no_types, mode);
            score_case(case, &recs, top_k)
        })
        .collect();

    let mut slices = BTreeMap::new();
    for slice in rows.iter().map(|r| r.slice).collect::<HashSet<_>>() {
        slices.insert(slice, summarize(rows.iter().filter(|r| r.slice == slice)));
    }
    let overall = summarize(rows.iter());
    debug!(cases = overall.cases, top_k, %mode, "evaluation finished");

    EvalReport {
        top_k,
        mode: mode.to_string(),
        overall,
        slices,
        cases: rows,
    }
}

fn write_rows<'a, W: Write>(
    top_k: usize,
    rows: impl Iterator<Item = &'a CaseMetrics>,
    mut out: W,
) -> std::io::Result<()> {
    writeln!(out, "slice,prec1,prec{top_k},map{top_k}")?;
    for row in rows {
        writeln!(
            out,
            "{},{},{},{}",
            row.slice,
            u8::from(row.hit_at_1),
            u8::from(row.hit_at_k),
            row.average_precision
        )?;
    }
    out.flush()
}

/// Write one CSV row per case: `slice,prec1,prec<K>,map<K>`.
pub fn write_csv<W: Write>(report: &EvalReport, out: W) -> std::io::Result<()> {
    write_rows(report.top_k, report.cases.iter(), out)
}

/// `<stem>_<slice>.<ext>` next to `base`.
pub fn slice_csv_path(base: &Path, slice: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{slice}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{slice}"),
    };
    base.with_file_name(name)
}

/// Write one CSV per slice, with the same columns as [`write_csv`].
///
/// Returns the written paths in slice order.
pub fn write_slice_csvs(report: &EvalReport, base: &Path) -> Result<Vec<PathBuf>, EvalError> {
    let mut written = Vec::with_capacity(report.slices.len());
    for slice in report.slices.keys() {
        let path = slice_csv_path(base, slice);
        let io_err = |source: std::io::Error| EvalError::Io {
            path: path.clone(),
            source,
        };
        let file = File::create(&path).map_err(io_err)?;
        let rows = report.cases.iter().filter(|row| row.slice == *slice);
        write_rows(report.top_k, rows, std::io::BufWriter::new(file)).map_err(io_err)?;
        debug!(slice = *slice, path = %path.display(), "wrote slice csv");
        written.push(path);
    }
    Ok(written)
}

// ============================================================================
// Down-sampling
// ============================================================================

/// Draw `n` distinct lines with an RNG seeded by `seed`.
///
/// The same input, `n` and `seed` always give the same lines in the same
/// order. Asking for more lines than exist is an error.
pub fn sample_eval_lines<T: Clone>(lines: &[T], n: usize, seed: u64) -> Result<Vec<T>, EvalError> {
    if n > lines.len() {
        return Err(EvalError::SampleTooLarge {
            requested: n,
            available: lines.len(),
        });
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(rand::seq::index::sample(&mut rng, lines.len(), n)
        .into_iter()
        .map(|i| lines[i].clone())
        .collect())
}

/// Sample `n` non-blank lines of `input` into `output`.
pub fn sample_eval_file(input: &Path, output: &Path, n: usize, seed: u64) -> Result<usize, EvalError> {
    let read_err = |source: std::io::Error| EvalError::Io {
        path: input.to_path_buf(),
        source,
    };
    let file = File::open(input).map_err(read_err)?;
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(read_err)?;
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            lines.push(line.to_string());
        }
    }

    let sampled = sample_eval_lines(&lines, n, seed)?;
    let write_err = |source: std::io::Error| EvalError::Io {
        path: output.to_path_buf(),
        source,
    };
    let mut out = std::io::BufWriter::new(File::create(output).map_err(write_err)?);
    for line in &sampled {
        writeln!(out, "{line}").map_err(write_err)?;
    }
    out.flush().map_err(write_err)?;
    debug!(available = lines.len(), kept = sampled.len(), seed, "sampled eval lines");
    Ok(sampled.len())
}
