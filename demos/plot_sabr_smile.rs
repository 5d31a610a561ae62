// Example: plot_sabr_smile.rs
// Calibrates every smile of a quotes CSV and writes one SVG per smile
// comparing market IVs with the calibrated SABR curve.
//
// Usage:
//     cargo run --example plot_sabr_smile -- <csv_path> [out_dir]
//
// The CSV uses the same columns as the sabr-calibrate binary.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use sabr_lib::io::{group_smiles, read_quote_rows, DEFAULT_MIN_MATURITY};
use sabr_lib::{calibrate_smile, default_configs, plot};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(anyhow!("Usage: {} <csv_file> [out_dir]", args[0]));
    }
    let out_dir = PathBuf::from(args.get(2).map(String::as_str).unwrap_or("."));
    std::fs::create_dir_all(&out_dir)?;

    let rows = read_quote_rows(&args[1])?;
    let groups = group_smiles(&rows, DEFAULT_MIN_MATURITY)?;
    println!("Loaded {} quotes in {} smiles", rows.len(), groups.len());

    let config = default_configs::production();
    for group in &groups {
        let result = calibrate_smile(&group.quote, &config);
        println!(
            "{} {:>3}: alpha={:.5} rho={:+.4} nu={:.4} rmse={:.2}bp",
            group.key.expiry,
            group.key.tenor,
            result.alpha(),
            result.rho(),
            result.nu(),
            result.rmse_iv_bps
        );

        let path = out_dir.join(format!("sabr_smile_{}.svg", group.key.expiry));
        plot::plot_smile(&path, &group.key, &group.quote, &result)?;
        println!("   chart saved to {}", path.display());
    }
    Ok(())
}
