// Example: calibrate_demo.rs
// Calibrates a synthetic equity skew with each configuration preset and prints
// the fitted parameters next to a per-strike model/market comparison.
//
// Usage:
//     cargo run --example calibrate_demo

use sabr_lib::{calibrate_smile, default_configs, evaluate_sabr, price_with_sabr, SmileQuote};

fn main() {
    let quote = SmileQuote::new(
        100.0,
        1.0,
        &[70.0, 80.0, 90.0, 100.0, 110.0, 120.0, 130.0],
        &[0.33, 0.28, 0.24, 0.22, 0.23, 0.26, 0.29],
    )
    .with_discount(0.97);

    println!("SABR calibration presets (F=100, T=1y, beta=0.5)\n");

    let presets = [
        ("minimal", default_configs::minimal()),
        ("fast", default_configs::fast()),
        ("production", default_configs::production()),
        ("research", default_configs::research()),
    ];

    for (name, config) in &presets {
        let result = calibrate_smile(&quote, config);
        println!("{}:", name);
        println!("   starts: {}  max evals: {}", config.multistart, config.max_evals);
        println!(
            "   alpha={:.6} rho={:.6} nu={:.6}",
            result.alpha(),
            result.rho(),
            result.nu()
        );
        println!(
            "   rmse={:.3}bp  price rmse={:.3}bp  nfev={}  success={}  runtime={:.2}ms",
            result.rmse_iv_bps, result.rmse_price_bps, result.nfev, result.success, result.runtime_ms
        );
        println!("   objective: {:.3e}\n", evaluate_sabr(&quote, &result.params, config));
    }

    let best = calibrate_smile(&quote, &default_configs::research());
    println!("Strike | Market IV% | Model IV% | Diff bp | Model price");
    for row in price_with_sabr(best.params, &quote) {
        println!(
            "{:>6.1} | {:>10.3} | {:>9.3} | {:>7.2} | {:>11.4}",
            row.strike,
            row.market_iv * 100.0,
            row.model_iv * 100.0,
            (row.model_iv - row.market_iv) * 1e4,
            row.model_price
        );
    }
}
