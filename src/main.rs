use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datawalk::{
    grid::open_grid,
    header::{extract_header_row, merge_headers, SENTINEL},
    recipe::{self, Recipe},
    render::{render_grid, render_table},
    vector::{read_kmz, EqualArea},
};
use reqwest::Client;
use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "datawalk", about = "Fetch, read, reshape and render public data files")]
struct Cli {
    /// Downloads and extracted archives go here
    #[arg(long, env = "DATAWALK_WORK_DIR", default_value = "work", global = true)]
    work_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a YAML recipe
    Run {
        recipe: PathBuf,
        /// Print the run report as JSON after the rendered output
        #[arg(long)]
        json: bool,
    },
    /// Print the merged labels of a header split across rows
    Header {
        csv: PathBuf,
        #[arg(long, default_value_t = 0)]
        skip: usize,
        /// 1 or 2
        #[arg(long, default_value_t = 2)]
        rows: usize,
        #[arg(long, default_value = SENTINEL)]
        sentinel: String,
    },
    /// List the features of a KMZ with geometry types and areas
    Kmz {
        file: PathBuf,
        #[arg(long, default_value_t = 50)]
        max_rows: usize,
    },
    /// List a netCDF file's variables, or render one of them
    Grid {
        file: PathBuf,
        #[arg(long)]
        variable: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,datawalk=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) configure dirs ───────────────────────────────────────────
    let cli = Cli::parse();
    fs::create_dir_all(&cli.work_dir)
        .with_context(|| format!("creating work dir {}", cli.work_dir.display()))?;
    let start = Instant::now();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    // ─── 3) dispatch ─────────────────────────────────────────────────
    match cli.command {
        Command::Run { recipe: path, json } => {
            let recipe = Recipe::load(&path)
                .with_context(|| format!("loading recipe {}", path.display()))?;
            let client = Client::new();
            let report = recipe::run(&recipe, &client, &cli.work_dir, &mut out)
                .await
                .with_context(|| format!("running recipe {}", recipe.name))?;
            if json {
                serde_json::to_writer_pretty(&mut out, &report)?;
                writeln!(out)?;
            }
        }
        Command::Header {
            csv,
            skip,
            rows,
            sentinel,
        } => {
            let top = extract_header_row(&csv, skip, 1)
                .with_context(|| format!("reading header of {}", csv.display()))?;
            let labels = match rows {
                1 => top,
                2 => {
                    let bottom = extract_header_row(&csv, skip + 1, 1)?;
                    merge_headers(&top, &bottom, &sentinel)?
                }
                n => anyhow::bail!("--rows must be 1 or 2, got {}", n),
            };
            for (i, label) in labels.iter().enumerate() {
                writeln!(out, "{:>3}  {}", i + 1, label)?;
            }
        }
        Command::Kmz { file, max_rows } => {
            let dest = cli.work_dir.join(
                file.file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "kmz".to_string()),
            );
            let (features, _) = read_kmz(&file, &dest)
                .with_context(|| format!("reading {}", file.display()))?;
            let table = features.to_table(&EqualArea::wgs84())?;
            render_table(&mut out, &table, max_rows)?;
        }
        Command::Grid { file, variable } => {
            let grid = open_grid(&file).with_context(|| format!("opening {}", file.display()))?;
            match variable {
                None => {
                    for v in grid.list_variables()? {
                        writeln!(
                            out,
                            "{}({})  {}",
                            v.name,
                            v.dimensions.join(", "),
                            v.description.unwrap_or_default()
                        )?;
                    }
                }
                Some(name) => {
                    let var = grid.read_variable(&name)?;
                    if var.values.ndim() == 2 {
                        render_grid(&mut out, &var)?;
                    } else {
                        let s = var.summary();
                        writeln!(
                            out,
                            "{} {:?} valid {} missing {} min {:?} max {:?} mean {:?}",
                            var.name,
                            var.shape(),
                            s.valid,
                            s.missing,
                            s.min,
                            s.max,
                            s.mean
                        )?;
                    }
                }
            }
        }
    }

    info!(elapsed = ?start.elapsed(), "done");
    Ok(())
}
