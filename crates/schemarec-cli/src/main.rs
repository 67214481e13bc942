//! schemarec CLI
//!
//! - `recommend`: rank missing properties for a partially described entity
//! - `evaluate`: score a recommender mode against a gold file
//! - `stats`: summarize a training set (and optionally a hierarchy)
//! - `convert`: turn a JSONL extract into TSV transactions
//! - `edges`: weighted tag co-occurrence edges for hierarchy building
//! - `sample-eval`: draw a seeded subset of a gold file

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use schemarec_hierarchy::cooccurrence::{self, CooccurrenceCounter, DEFAULT_MIN_COUNT};
use schemarec_hierarchy::Hierarchy;
use schemarec_index::transactions;
use schemarec_service::eval::{
    self, EvalReport, DEFAULT_SAMPLE_SEED, DEFAULT_SAMPLE_SIZE, DEFAULT_TOP_K,
};
use schemarec_service::{RecoMode, RecommenderService, ServiceConfig};

#[derive(Parser)]
#[command(name = "schemarec")]
#[command(
    author,
    version,
    about = "Property recommendations from schema trees and tag hierarchies"
)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

/// Where the indexes come from. Flags override fields of `--config`.
#[derive(Args)]
struct SourceArgs {
    /// Service config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Training transactions (TSV, one transaction per line)
    #[arg(short, long)]
    transactions: Option<PathBuf>,
    /// Tag hierarchy (JSON forest)
    #[arg(long)]
    hierarchy: Option<PathBuf>,
    /// `tree`, `hierarchy` or `hybrid`; anything else means `tree`
    #[arg(long)]
    mode: Option<String>,
    /// Also recommend types
    #[arg(long)]
    include_types: bool,
}

impl SourceArgs {
    fn service_config(&self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_json_file(path)?,
            None => ServiceConfig::default(),
        };
        if let Some(path) = &self.transactions {
            config.transactions_path = path.clone();
        }
        if let Some(path) = &self.hierarchy {
            config.hierarchy_path = Some(path.clone());
        }
        if let Some(mode) = &self.mode {
            config.mode = RecoMode::from(mode.as_str());
        }
        if self.include_types {
            config.include_types = true;
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend properties for an entity given some of its properties/types.
    Recommend {
        #[command(flatten)]
        source: SourceArgs,
        /// Types of the entity (without the `t#` prefix), comma separated
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
        /// Print `{"recommendations": [...]}` instead of `label: score` lines
        #[arg(long)]
        json: bool,
        /// Properties the entity already has
        properties: Vec<String>,
    },

    /// Evaluate against a gold file of `query<TAB>gold` lines.
    Evaluate {
        #[command(flatten)]
        source: SourceArgs,
        /// Gold file
        #[arg(long)]
        evalfile: PathBuf,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        topk: usize,
        /// Per-case CSV output
        #[arg(long)]
        outfile: Option<PathBuf>,
        /// Also write `<outfile stem>_<slice>.<ext>` for every slice
        #[arg(long, requires = "outfile")]
        slices: bool,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show counts and the most frequent items of a training set.
    Stats {
        #[command(flatten)]
        source: SourceArgs,
        /// Number of items to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Convert a JSONL extract (one record per line) into TSV transactions.
    Convert {
        /// JSONL input
        input: PathBuf,
        /// TSV output
        output: PathBuf,
    },

    /// Count tag co-occurrences and write the weighted edge list as JSON.
    Edges {
        /// TSV transactions to count
        #[arg(long, conflicts_with = "records", required_unless_present = "records")]
        transactions: Option<PathBuf>,
        /// JSONL records to count
        #[arg(long)]
        records: Option<PathBuf>,
        /// Edge list output (JSON array of `{source, target, weight}`)
        #[arg(long)]
        out: PathBuf,
        /// Drop pairs seen fewer times than this
        #[arg(long, default_value_t = DEFAULT_MIN_COUNT)]
        min_count: u64,
    },

    /// Draw a fixed-size, seeded sample of a gold file.
    SampleEval {
        /// Gold file to sample from
        input: PathBuf,
        /// Sampled gold file
        output: PathBuf,
        /// Lines to keep
        #[arg(short, default_value_t = DEFAULT_SAMPLE_SIZE)]
        n: usize,
        #[arg(long, default_value_t = DEFAULT_SAMPLE_SEED)]
        seed: u64,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Recommend {
            source,
            types,
            json,
            properties,
        } => cmd_recommend(&source, &properties, &types, json),
        Commands::Evaluate {
            source,
            evalfile,
            topk,
            outfile,
            slices,
            json,
        } => cmd_evaluate(&source, &evalfile, topk, outfile.as_deref(), slices, json),
        Commands::Stats { source, top } => cmd_stats(&source, top),
        Commands::Convert { input, output } => cmd_convert(&input, &output),
        Commands::Edges {
            transactions,
            records,
            out,
            min_count,
        } => cmd_edges(transactions.as_deref(), records.as_deref(), &out, min_count),
        Commands::SampleEval {
            input,
            output,
            n,
            seed,
        } => cmd_sample_eval(&input, &output, n, seed),
    }
}

fn cmd_recommend(
    source: &SourceArgs,
    properties: &[String],
    types: &[String],
    json: bool,
) -> Result<()> {
    let config = source.service_config()?;
    let mode = config.mode;
    let service = RecommenderService::open(config)?;

    let recs = service.recommend(properties, types);
    info!(count = recs.len(), %mode, "recommendation done");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &recs)?;
        writeln!(out)?;
    } else {
        write!(out, "{recs}")?;
    }

    eprintln!(
        "{} {} recommendations ({} mode, top-10 avg {:.4})",
        "ok".green().bold(),
        recs.len(),
        mode.to_string().cyan(),
        recs.top10_avg_probability()
    );
    Ok(())
}

fn cmd_evaluate(
    source: &SourceArgs,
    evalfile: &Path,
    topk: usize,
    outfile: Option<&Path>,
    slices: bool,
    json: bool,
) -> Result<()> {
    let config = source.service_config()?;
    let mode = config.mode;
    let service = RecommenderService::open(config)?;
    let cases = eval::load_eval_cases(evalfile)?;

    println!(
        "{} {} cases from {}",
        "Evaluating".green().bold(),
        cases.len(),
        evalfile.display()
    );
    let report = eval::evaluate(&service, &cases, topk, mode);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(path) = outfile {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        eval::write_csv(&report, &mut writer)?;
        writer.flush()?;
        eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());

        if slices {
            for written in eval::write_slice_csvs(&report, path)? {
                eprintln!("{} {}", "wrote".green().bold(), written.display().to_string().bold());
            }
        }
    }
    Ok(())
}

fn print_report(report: &EvalReport) {
    let k = report.top_k;
    println!(
        "  {:<10} {:>6} {:>8} {:>8} {:>8}",
        "slice".bold(),
        "cases",
        "prec@1",
        format!("prec@{k}"),
        format!("map@{k}")
    );
    let rows = report
        .slices
        .iter()
        .map(|(name, s)| (*name, s))
        .chain(std::iter::once(("overall", &report.overall)));
    for (name, summary) in rows {
        println!(
            "  {:<10} {:>6} {:>8.4} {:>8.4} {:>8.4}",
            name,
            summary.cases,
            summary.mean_hit_at_1,
            summary.mean_hit_at_k,
            summary.mean_average_precision
        );
    }
    println!("  {} {}", "→".cyan(), report.mode);
}

fn cmd_stats(source: &SourceArgs, top: usize) -> Result<()> {
    let config = source.service_config()?;
    let tree = transactions::load_tsv(&config.transactions_path)?;
    let registry = tree.registry();

    println!(
        "{} {}",
        "Schema tree".green().bold(),
        config.transactions_path.display()
    );
    println!("  {} {} transactions", "→".yellow(), tree.total_transactions());
    println!("  {} {} distinct items", "→".yellow(), registry.len());
    println!("  {} {} nodes", "→".yellow(), tree.len());

    for item in registry.rank_order_snapshot().take(top) {
        let kind = if item.is_type() { "type" } else { "property" };
        println!(
            "    {:>4}  {:<40} {:>8}  {}",
            item.rank(),
            item.label(),
            item.total_count(),
            kind.dimmed()
        );
    }

    if let Some(path) = &config.hierarchy_path {
        let hierarchy = Hierarchy::load(path)?;
        println!("{} {}", "Hierarchy".green().bold(), path.display());
        println!("  {} {} groups", "→".yellow(), hierarchy.group_count());
        println!("  {} {} tags", "→".yellow(), hierarchy.tag_count());
    }
    Ok(())
}

fn open_input(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn cmd_convert(input: &Path, output: &Path) -> Result<()> {
    let stats = transactions::convert_jsonl_to_tsv(open_input(input)?, create_output(output)?)
        .with_context(|| format!("converting {}", input.display()))?;
    println!(
        "{} {} of {} records ({} malformed)",
        "Converted".green().bold(),
        stats.kept,
        stats.lines,
        stats.malformed
    );
    println!("  {} {}", "→".cyan(), output.display());
    Ok(())
}

fn cmd_edges(
    tsv: Option<&Path>,
    jsonl: Option<&Path>,
    out: &Path,
    min_count: u64,
) -> Result<()> {
    let mut counter = CooccurrenceCounter::new();
    match (tsv, jsonl) {
        (Some(path), _) => {
            transactions::for_each_tsv_transaction(open_input(path)?, |cells| {
                counter.add_record(cells.iter().copied())
            })
            .with_context(|| format!("reading transactions {}", path.display()))?;
        }
        (None, Some(path)) => {
            transactions::for_each_jsonl_record(open_input(path)?, |tags| {
                counter.add_record(tags);
                Ok(())
            })
            .with_context(|| format!("reading records {}", path.display()))?;
        }
        (None, None) => anyhow::bail!("one of --transactions or --records is required"),
    }

    let edges = counter.edges(min_count);
    let mut writer = create_output(out)?;
    cooccurrence::write_edges_json(&edges, &mut writer)
        .with_context(|| format!("writing {}", out.display()))?;
    writer.flush()?;

    println!(
        "{} {} edges from {} records ({} distinct pairs, min count {})",
        "Counted".green().bold(),
        edges.len(),
        counter.records(),
        counter.pair_count(),
        min_count
    );
    println!("  {} {}", "→".cyan(), out.display());
    Ok(())
}

fn cmd_sample_eval(input: &Path, output: &Path, n: usize, seed: u64) -> Result<()> {
    let kept = eval::sample_eval_file(input, output, n, seed)?;
    println!(
        "{} {} lines (seed {})",
        "Sampled".green().bold(),
        kept,
        seed
    );
    println!("  {} {}", "→".cyan(), output.display());
    Ok(())
}
