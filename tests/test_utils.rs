#![allow(dead_code)] // Each test binary uses a different subset of helpers

use sabr_lib::io::{group_smiles, read_quote_rows, SmileGroup, DEFAULT_MIN_MATURITY};
use sabr_lib::{CalibrationConfig, SABRParams, SmileQuote};

pub const SAMPLE_SMILES: &str = "tests/data/sample_smiles.csv";

/// Parameters the three smiles in `sample_smiles.csv` were generated with
/// (beta = 0.5), in file order.
pub const SAMPLE_PARAMS: [(f64, f64, f64); 3] = [(2.0, -0.3, 0.5), (2.1, -0.25, 0.4), (2.2, -0.2, 0.35)];

/// Load and group the bundled fixture
pub fn load_sample_smiles() -> Result<Vec<SmileGroup>, Box<dyn std::error::Error>> {
    let rows = read_quote_rows(SAMPLE_SMILES)?;
    Ok(group_smiles(&rows, DEFAULT_MIN_MATURITY)?)
}

/// Equity-style skewed smile at F=100, T=1 used throughout the scenario tests
pub fn skew_quote() -> SmileQuote {
    SmileQuote::new(
        100.0,
        1.0,
        &[80.0, 90.0, 100.0, 110.0, 120.0],
        &[0.28, 0.24, 0.22, 0.23, 0.26],
    )
}

/// Smile whose market vols are exactly produced by `params`
pub fn synthetic_quote(forward: f64, maturity: f64, strikes: &[f64], params: &SABRParams) -> SmileQuote {
    let ivs: Vec<f64> = strikes
        .iter()
        .map(|&k| params.implied_vol(forward, k, maturity))
        .collect();
    SmileQuote::new(forward, maturity, strikes, &ivs)
}

/// Strikes from 70% to 130% of `forward`
pub fn strike_ladder(forward: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| forward * (0.7 + 0.6 * i as f64 / (n - 1) as f64))
        .collect()
}

/// Default settings with logging of every smile enabled
pub fn create_verbose_test_config() -> CalibrationConfig {
    CalibrationConfig {
        verbosity: 2,
        ..CalibrationConfig::default()
    }
}

pub fn create_test_config() -> CalibrationConfig {
    CalibrationConfig::default()
}
