use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use graph3d::renderer::MIN_NUMERIC_COLUMNS;
use graph3d::{
    graph, render, ChartError, ChartRegistry, ChartRequest, ColumnRole, OutputFormat,
    RenderOptions, Table,
};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "graph3d")]
#[command(about = "Render 3D charts from numeric columns of a CSV file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Preview a dataset and list its numeric columns
    Columns {
        /// CSV (or .json) file, or '-' for stdin
        input: PathBuf,
        /// Number of preview rows
        #[arg(long, default_value_t = 5)]
        head: usize,
    },
    /// List the available chart types
    Charts,
    /// Render a chart from three numeric columns
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// CSV (or .json) file, or '-' for stdin
    input: PathBuf,
    /// Chart type, by menu label (e.g. "Surface Plot") or short name (e.g. surface)
    #[arg(long)]
    chart: String,
    #[arg(long)]
    x: String,
    #[arg(long)]
    y: String,
    #[arg(long)]
    z: String,
    /// Column driving marker size (bubble charts)
    #[arg(long)]
    size: Option<String>,
    /// Column driving marker color
    #[arg(long)]
    color: Option<String>,
    /// Extra role binding as ROLE=COLUMN (repeatable), e.g. size=rainfall
    #[arg(long, value_name = "ROLE=COLUMN", value_parser = parse_binding)]
    bind: Vec<(ColumnRole, String)>,
    #[arg(long, value_enum)]
    format: Option<Format>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Render options as JSON, e.g. '{"width": 1024, "type": "svg"}'
    #[arg(long)]
    options: Option<String>,
    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Png,
    Svg,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Columns { input, head } => show_columns(&input, head),
        Command::Charts => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            for label in ChartRegistry::global().menu() {
                writeln!(handle, "{label}").context("Failed to write to stdout")?;
            }
            Ok(())
        }
        Command::Render(args) => run_render(args),
    }
}

fn parse_binding(raw: &str) -> std::result::Result<(ColumnRole, String), String> {
    let (role, column) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ROLE=COLUMN, got '{raw}'"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("no column given for role '{role}'"));
    }
    Ok((role.parse()?, column.to_string()))
}

fn load_table(input: &Path) -> Result<Table> {
    if input == Path::new("-") {
        let mut bytes = Vec::new();
        io::stdin()
            .read_to_end(&mut bytes)
            .context("Failed to read CSV from stdin")?;
        Ok(Table::from_reader(bytes.as_slice())?)
    } else {
        Table::from_path(input).with_context(|| format!("Failed to load '{}'", input.display()))
    }
}

fn show_columns(input: &Path, head: usize) -> Result<()> {
    let table = load_table(input)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "rows: {}", table.row_count())?;
    writeln!(out, "{}", table.headers().join("\t"))?;
    for row in table.head(head) {
        writeln!(out, "{}", row.join("\t"))?;
    }

    let numeric = table.numeric_columns();
    writeln!(out, "numeric columns: {}", numeric.join(", "))?;
    out.flush().context("Failed to flush stdout")?;

    if numeric.len() < MIN_NUMERIC_COLUMNS {
        return Err(ChartError::InsufficientColumns {
            required: MIN_NUMERIC_COLUMNS,
            found: numeric.len(),
        }
        .into());
    }
    Ok(())
}

fn resolve_options(args: &RenderArgs) -> Result<RenderOptions> {
    let mut options = match &args.options {
        Some(json) => RenderOptions::from_json(json).context("Invalid --options JSON")?,
        None => RenderOptions::default(),
    };
    if let Some(width) = args.width {
        options.width = width;
    }
    if let Some(height) = args.height {
        options.height = height;
    }
    match args.format {
        Some(Format::Png) => options.format = OutputFormat::Png,
        Some(Format::Svg) => options.format = OutputFormat::Svg,
        Some(Format::Json) | None => {}
    }
    Ok(options)
}

fn run_render(args: RenderArgs) -> Result<()> {
    let options = resolve_options(&args)?;
    let table = load_table(&args.input)?;

    let mut request = ChartRequest::xyz(&args.chart, &args.x, &args.y, &args.z);
    if let Some(size) = &args.size {
        request = request.bind(ColumnRole::Size, size);
    }
    if let Some(color) = &args.color {
        request = request.bind(ColumnRole::Color, color);
    }
    for (role, column) in &args.bind {
        request = request.bind(*role, column);
    }

    let chart = render(&table, &request)?;
    info!(chart = %chart.kind, "rendered chart description");

    let bytes = if args.format == Some(Format::Json) {
        serde_json::to_vec_pretty(&chart).context("Failed to serialise chart")?
    } else {
        graph::render_description(&chart, &options).context("Failed to render chart")?
    };

    match &args.output {
        Some(path) => fs::write(path, &bytes)
            .with_context(|| format!("Failed to write '{}'", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&bytes)
                .context("Failed to write output to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
        }
    }

    Ok(())
}
