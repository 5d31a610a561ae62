//! SVG charts of calibrated smiles.

use crate::calibration::types::{CalibrationResult, SmileQuote};
use crate::io::SmileKey;
use crate::models::sabr::sabr_model::SabrSlice;
use crate::models::traits::SmileModel;
use anyhow::{anyhow, Result};
use plotters::prelude::*;
use std::path::Path;

const CURVE_STEPS: usize = 250;

/// Draw market implied vols (dots) against the calibrated Hagan curve (line)
/// and write the chart as SVG to `path`.
pub fn plot_smile(
    path: impl AsRef<Path>,
    key: &SmileKey,
    quote: &SmileQuote,
    result: &CalibrationResult,
) -> Result<()> {
    if quote.is_empty() {
        return Err(anyhow!("Cannot plot an empty smile for {}", key.expiry));
    }
    let path = path.as_ref();

    let min_strike = quote.strikes.iter().copied().fold(f64::INFINITY, f64::min);
    let max_strike = quote.strikes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (x_min, x_max) = if max_strike > min_strike {
        (min_strike, max_strike)
    } else {
        (min_strike * 0.9, max_strike * 1.1)
    };

    let slice = SabrSlice::new(quote.forward, quote.maturity, result.params);
    let model_line: Vec<(f64, f64)> = (0..=CURVE_STEPS)
        .map(|i| {
            let strike = x_min + (x_max - x_min) * i as f64 / CURVE_STEPS as f64;
            (strike, slice.implied_vol(strike) * 100.0)
        })
        .collect();
    let market_points: Vec<(f64, f64)> = quote.points().map(|(k, iv)| (k, iv * 100.0)).collect();

    let (min_iv, max_iv) = market_points
        .iter()
        .chain(&model_line)
        .map(|&(_, v)| v)
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let padding = ((max_iv - min_iv) * 0.05).max(0.5);
    let y_min = (min_iv - padding).max(0.0);
    let y_max = max_iv + padding;

    let tenor = if key.tenor.is_empty() {
        String::new()
    } else {
        format!(" {}", key.tenor)
    };
    let caption = format!(
        "SABR smile {}{} | beta={:.2} rho={:.3} nu={:.3} | RMSE {:.2} bp",
        key.expiry,
        tenor,
        result.params.beta,
        result.params.rho,
        result.params.nu,
        result.rmse_iv_bps
    );

    let root = SVGBackend::new(path, (1280, 768)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| anyhow!("Failed to prepare {}: {}", path.display(), e))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(caption, ("sans-serif", 26))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| anyhow!("Failed to build chart: {}", e))?;

    chart
        .configure_mesh()
        .x_desc("Strike")
        .y_desc("Implied Vol (%)")
        .draw()
        .map_err(|e| anyhow!("Failed to draw mesh: {}", e))?;

    chart
        .draw_series(LineSeries::new(model_line, &RED))
        .map_err(|e| anyhow!("Failed to draw model curve: {}", e))?
        .label("SABR (Hagan)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .draw_series(
            market_points
                .iter()
                .map(|pt| Circle::new(*pt, 4, BLUE.filled())),
        )
        .map_err(|e| anyhow!("Failed to draw market points: {}", e))?
        .label("Market")
        .legend(|(x, y)| Circle::new((x + 10, y), 4, BLUE.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| anyhow!("Failed to draw legend: {}", e))?;

    root.present()
        .map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;
    Ok(())
}
