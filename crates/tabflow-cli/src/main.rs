//! tabflow CLI: run single table transformations over CSV files.
//!
//! Output goes to stdout as CSV (or a text grid for `look`). Set `RUST_LOG`
//! to see sort/spill diagnostics on stderr.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tabflow_core::config::EngineConfig;
use tabflow_core::field::KeySpec;
use tabflow_core::table::{SharedTable, Table};
use tabflow_io::{CsvDialect, CsvSource, CsvWriter};
use tabflow_operators::{cut, distinct_by, melt, pivot, Agg, SortOptions, SortView};

#[derive(Parser)]
#[command(name = "tabflow")]
#[command(about = "Lazy table transformations over delimited text", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOpts {
    /// Rows held in memory before a sorted run is spilled (overrides config)
    #[arg(long, global = true)]
    buffer_rows: Option<usize>,

    /// Spill directory (overrides config)
    #[arg(long, global = true)]
    spill_dir: Option<String>,

    /// Read and write tab-separated values
    #[arg(long, global = true)]
    tsv: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort rows by one or more fields (whole rows when no key is given)
    Sort {
        input: PathBuf,

        /// Comma-separated key fields; prefix a field with '-' for descending
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        key: Vec<String>,

        #[arg(short, long)]
        reverse: bool,
    },

    /// Drop duplicate rows (or rows with a duplicate key)
    Distinct {
        input: PathBuf,

        #[arg(short, long, value_delimiter = ',')]
        key: Vec<String>,
    },

    /// Keep only the named fields, in the given order
    Cut {
        input: PathBuf,

        #[arg(required = true, value_delimiter = ',')]
        fields: Vec<String>,
    },

    /// Turn variable columns into (variable, value) rows
    Melt {
        input: PathBuf,

        #[arg(short, long, value_delimiter = ',', required = true)]
        key: Vec<String>,
    },

    /// Cross-tabulate: rows by `row`, columns by `column`, cells aggregating `value`
    Pivot {
        input: PathBuf,
        row: String,
        column: String,
        value: String,

        /// sum, count, min, max, mean, list, first or last
        #[arg(short, long, default_value = "sum")]
        agg: String,
    },

    /// Print the first rows as a text grid
    Look {
        input: PathBuf,

        #[arg(short = 'n', long, default_value = "10")]
        rows: usize,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = engine_config(&cli.global);
    tracing::debug!(?config, "engine config");
    let dialect = if cli.global.tsv {
        CsvDialect::tsv()
    } else {
        CsvDialect::default()
    };
    let open = |path: &PathBuf| -> SharedTable { Arc::new(CsvSource::new(path).with_dialect(dialect)) };
    let opts = SortOptions::from_config(&config);

    let table: SharedTable = match &cli.command {
        Commands::Sort {
            input,
            key,
            reverse,
        } => Arc::new(
            SortView::new(open(input), parse_key(key))
                .reverse(*reverse)
                .options(opts),
        ),
        Commands::Distinct { input, key } => {
            Arc::new(distinct_by(open(input), parse_key(key)).options(opts))
        }
        Commands::Cut { input, fields } => Arc::new(cut(open(input), fields.iter().map(String::as_str))),
        Commands::Melt { input, key } => Arc::new(melt(open(input)).key(key.iter().map(String::as_str))),
        Commands::Pivot {
            input,
            row,
            column,
            value,
            agg,
        } => {
            let agg: Agg = agg.parse()?;
            Arc::new(pivot(open(input), row.as_str(), column.as_str(), value.as_str(), agg.reducer()).options(opts))
        }
        Commands::Look { input, rows } => {
            let grid = render_look(open(input).as_ref(), *rows)?;
            io::stdout().lock().write_all(grid.as_bytes())?;
            return Ok(());
        }
    };

    let stdout = io::stdout();
    let mut writer = CsvWriter::to_writer(stdout.lock(), dialect);
    let written = writer.write_table(table.as_ref())?;
    tracing::info!(rows = written, "wrote output");
    Ok(())
}

fn engine_config(global: &GlobalOpts) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(rows) = global.buffer_rows {
        config.sort_buffer_rows = rows.max(1);
    }
    if let Some(dir) = &global.spill_dir {
        config.spill_dir = Some(dir.clone());
    }
    config
}

/// `a,-b` sorts by `a` ascending then `b` descending; empty means whole rows.
fn parse_key(fields: &[String]) -> KeySpec {
    fields.iter().fold(KeySpec::all(), |key, f| match f.strip_prefix('-') {
        Some(name) => key.desc(name),
        None => key.asc(f.as_str()),
    })
}

/// Text grid of the header and the first `limit` rows.
fn render_look(table: &dyn Table, limit: usize) -> tabflow_core::Result<String> {
    let it = table.iter()?;
    let header = it.header().clone();
    let mut cells: Vec<Vec<String>> = Vec::new();
    for row in it.take(limit) {
        cells.push(row?.iter().map(ToString::to_string).collect());
    }
    let ncols = cells.iter().map(Vec::len).chain([header.len()]).max().unwrap_or(0);
    let mut widths = vec![0usize; ncols];
    for line in std::iter::once(&header).chain(cells.iter()) {
        for (i, c) in line.iter().enumerate() {
            widths[i] = widths[i].max(c.chars().count());
        }
    }

    let rule = |ch: char| {
        let mut s = String::from("+");
        for w in &widths {
            s.extend(std::iter::repeat(ch).take(w + 2));
            s.push('+');
        }
        s.push('\n');
        s
    };
    let line = |values: &[String]| {
        let mut s = String::from("|");
        for (i, w) in widths.iter().enumerate() {
            let v = values.get(i).map(String::as_str).unwrap_or("");
            s.push_str(&format!(" {v:<w$} |"));
        }
        s.push('\n');
        s
    };

    let mut out = rule('-');
    out.push_str(&line(&header));
    out.push_str(&rule('='));
    for row in &cells {
        out.push_str(&line(row));
        out.push_str(&rule('-'));
    }
    Ok(out)
}
