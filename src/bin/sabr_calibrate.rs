//! sabr-calibrate: per-smile SABR calibration from a quotes CSV.
//!
//! Reads quotes, groups them into (expiry, tenor) smiles, calibrates each one
//! with a fixed beta and writes `<outdir>/calibration_results.csv`.
//!
//! ```text
//! sabr-calibrate --in quotes.csv --outdir results --beta 0.5 --vega-weighted --multistart 5
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use sabr_lib::io::{group_smiles, read_quote_rows, write_results, ResultRow, DEFAULT_MIN_MATURITY};
use sabr_lib::{calibrate_smiles, plot, CalibrationConfig, SmileQuote};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const RESULTS_FILE: &str = "calibration_results.csv";

/// Calibrate SABR (Hagan IV) per smile from CSV.
#[derive(Parser, Debug)]
#[command(name = "sabr-calibrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input CSV path
    #[arg(long = "in", value_name = "CSV")]
    input: PathBuf,

    /// Output directory
    #[arg(long, default_value = "results")]
    outdir: PathBuf,

    /// Fixed beta in (0, 1] [default: 0.5]
    #[arg(long)]
    beta: Option<f64>,

    /// Use vega-weighted least squares (without --config the fit is unweighted otherwise)
    #[arg(long)]
    vega_weighted: bool,

    /// Number of starts, the first unperturbed [default: 3]
    #[arg(long)]
    multistart: Option<usize>,

    /// Max residual evaluations per start [default: 300]
    #[arg(long)]
    max_nfev: Option<usize>,

    /// Random seed [default: 42]
    #[arg(long)]
    seed: Option<u64>,

    /// Maturity floor in years
    #[arg(long, default_value_t = DEFAULT_MIN_MATURITY)]
    min_maturity: f64,

    /// TOML calibration config; command-line flags override it
    #[arg(long, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Also write one SVG smile chart per expiry into the output directory
    #[arg(long)]
    plot: bool,

    /// Calibrate smiles in parallel
    #[arg(long)]
    parallel: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn calibration_config(&self) -> Result<CalibrationConfig> {
        let mut config = match &self.config {
            Some(path) => CalibrationConfig::from_toml_file(path)?,
            None => CalibrationConfig {
                vega_weighted: false,
                ..CalibrationConfig::default()
            },
        };
        if let Some(beta) = self.beta {
            config.beta = beta;
        }
        if self.vega_weighted {
            config.vega_weighted = true;
        }
        if let Some(multistart) = self.multistart {
            config.multistart = multistart;
        }
        if let Some(max_nfev) = self.max_nfev {
            config.max_evals = max_nfev;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.parallel {
            config.parallel_smiles = true;
        }
        if self.verbose {
            config.verbosity = config.verbosity.max(1);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.calibration_config()?;
    std::fs::create_dir_all(&cli.outdir)
        .with_context(|| format!("Failed to create output directory {}", cli.outdir.display()))?;

    let rows = read_quote_rows(&cli.input)?;
    let groups = group_smiles(&rows, cli.min_maturity)?;
    info!(
        quotes = rows.len(),
        smiles = groups.len(),
        beta = config.beta,
        vega_weighted = config.vega_weighted,
        multistart = config.multistart,
        "calibrating"
    );

    let quotes: Vec<SmileQuote> = groups.iter().map(|g| g.quote.clone()).collect();
    let results = calibrate_smiles(&quotes, &config);

    let mut out_rows = Vec::with_capacity(results.len());
    for (group, result) in groups.iter().zip(&results) {
        if !result.success {
            warn!(expiry = %group.key.expiry, tenor = %group.key.tenor, "solver did not converge");
        }
        if cli.plot {
            let name = if group.key.tenor.is_empty() {
                format!("smile_{}.svg", group.key.expiry)
            } else {
                format!("smile_{}_{}.svg", group.key.expiry, group.key.tenor)
            };
            plot::plot_smile(cli.outdir.join(name), &group.key, &group.quote, result)?;
        }
        out_rows.push(ResultRow::new(&group.key, result));
    }

    let out_csv = cli.outdir.join(RESULTS_FILE);
    write_results(&out_csv, &out_rows)?;
    println!("Wrote {}", out_csv.display());
    Ok(())
}
