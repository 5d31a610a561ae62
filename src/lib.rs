//! # SABR-Lib: Hagan SABR Smile Calibration
//!
//! `sabr-lib` fits the SABR stochastic-volatility model to a single maturity's
//! implied-volatility smile. It bundles a forward Black pricer, the Hagan (2002)
//! lognormal implied-vol approximation and a seeded multistart
//! Levenberg-Marquardt least-squares calibrator.
//!
//! ## Core Features
//!
//! - **Black Pricer**: forward-measure calls and puts, vega and implied-vol inversion
//! - **Hagan Formula**: closed-form SABR implied vol with a numerically stable ATM branch
//! - **Calibration**: vega-weighted least squares in an unconstrained coordinate system,
//!   with deterministic seeded multistart and optional parallel trials
//! - **Outer Layers**: CSV ingestion and output, SVG smile charts and a command-line driver
//!
//! ## Quick Start
//!
//! ```rust
//! use sabr_lib::{calibrate_smile, default_configs, price_with_sabr, SmileQuote};
//!
//! let quote = SmileQuote::new(
//!     100.0,
//!     1.0,
//!     &[80.0, 90.0, 100.0, 110.0, 120.0],
//!     &[0.28, 0.24, 0.22, 0.23, 0.26],
//! );
//!
//! // Fit alpha, rho and nu with beta fixed at 0.5
//! let result = calibrate_smile(&quote, &default_configs::fast());
//! println!("alpha={:.4} rho={:.4} nu={:.4}", result.alpha(), result.rho(), result.nu());
//!
//! // Compare model and market per strike
//! for row in price_with_sabr(result.params, &quote) {
//!     println!("K={} model_iv={:.4} market_iv={:.4}", row.strike, row.model_iv, row.market_iv);
//! }
//! ```
//!
//! ## Configuration Presets
//!
//! - `production()`: more multistart trials and a larger evaluation budget
//! - `fast()`: single start for development
//! - `research()`: many parallel trials with tight tolerances
//! - `minimal()`: quick validation settings

// ================================================================================================
// MODULES
// ================================================================================================

pub mod calibration;
pub mod io;
pub mod models;
pub mod plot;

// ================================================================================================
// IMPORTS
// ================================================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use models::{
    sabr::{sabr_calibrator, sabr_model::SabrSlice},
    utils::price_option,
};

// ================================================================================================
// PUBLIC RE-EXPORTS
// ================================================================================================

// Core types for market data and configuration
pub use calibration::{
    config::{CalibrationConfig, InitialGuessConfig, PerturbationConfig},
    types::{CalibrationResult, PricingResult, SmileQuote},
};

// Black pricer
pub use models::black::{black_implied_vol, black_price, black_vega, OptionSide};

// SABR model types and helpers
pub use models::sabr::{
    hagan::implied_vol as hagan_implied_vol,
    sabr_calibrator::{from_unconstrained, to_unconstrained},
    sabr_model::SABRParams,
};

// ================================================================================================
// DEFAULT CONFIGURATIONS
// ================================================================================================

/// Pre-configured calibration settings for common use cases.
///
/// # Available Configurations
///
/// - [`production()`]: Production-grade settings for live use
/// - [`fast()`]: Development-optimized settings
/// - [`research()`]: High-precision settings for research
/// - [`minimal()`]: Quick validation settings
pub mod default_configs {
    use crate::calibration::config::CalibrationConfig;

    /// Production-grade configuration.
    ///
    /// **Characteristics:**
    /// - Multistart trials: 5
    /// - Evaluation budget per trial: 500
    /// - Tolerances: 1e-10
    ///
    /// # Example
    ///
    /// ```rust
    /// use sabr_lib::default_configs;
    ///
    /// let config = default_configs::production();
    /// assert_eq!(config.multistart, 5);
    /// ```
    pub fn production() -> CalibrationConfig {
        CalibrationConfig::production()
    }

    /// Fast configuration for development and testing.
    ///
    /// **Characteristics:**
    /// - Single unperturbed start
    /// - Evaluation budget per trial: 100
    /// - Tolerances: 1e-8
    pub fn fast() -> CalibrationConfig {
        CalibrationConfig::fast()
    }

    /// High-precision configuration for research and backtesting.
    ///
    /// **Characteristics:**
    /// - Multistart trials: 16, solved in parallel
    /// - Evaluation budget per trial: 2,000
    /// - Tolerances: 1e-12
    pub fn research() -> CalibrationConfig {
        CalibrationConfig::research()
    }

    /// Minimal configuration for quick validation and debugging.
    pub fn minimal() -> CalibrationConfig {
        CalibrationConfig::minimal()
    }
}

/// Calibrate SABR parameters (alpha, rho, nu) to one maturity's smile.
///
/// Beta is fixed at `config.beta`. A `rand::rngs::StdRng` seeded from
/// `config.seed` drives the multistart perturbations, so repeated calls with
/// identical inputs return identical parameters.
///
/// # Arguments
///
/// * `quote` - Forward, maturity, discount factor, option side and the
///   `(strike, market_iv)` pairs of a single expiry.
/// * `config` - Calibration settings. Use [`default_configs`] for presets.
///
/// # Returns
///
/// Always returns a [`CalibrationResult`]; non-convergence is reported through
/// `success = false` with best-effort parameters. An empty smile yields the
/// initial-guess parameters with NaN RMSE fields.
///
/// # Example
///
/// ```rust
/// use sabr_lib::{calibrate_smile, CalibrationConfig, SmileQuote};
///
/// let quote = SmileQuote::new(100.0, 1.0, &[80.0, 100.0, 120.0], &[0.26, 0.22, 0.24]);
/// let result = calibrate_smile(&quote, &CalibrationConfig::default());
/// assert!(result.alpha() > 0.0);
/// assert!(result.rho().abs() < 1.0);
/// ```
pub fn calibrate_smile(quote: &SmileQuote, config: &CalibrationConfig) -> CalibrationResult {
    let mut rng = StdRng::seed_from_u64(config.seed);
    calibrate_smile_with_rng(quote, config, &mut rng)
}

/// Same as [`calibrate_smile`] but draws the multistart perturbations from a
/// caller-supplied generator. `config.seed` is ignored.
pub fn calibrate_smile_with_rng<R: Rng>(
    quote: &SmileQuote,
    config: &CalibrationConfig,
    rng: &mut R,
) -> CalibrationResult {
    sabr_calibrator::calibrate_with_rng(quote, config, rng)
}

/// Calibrate a batch of independent smiles.
///
/// Every smile gets its own generator seeded from `config.seed`, so each
/// result equals a standalone [`calibrate_smile`] call. With
/// `config.parallel_smiles` the smiles are solved on the rayon pool; results
/// are returned in input order either way.
pub fn calibrate_smiles(quotes: &[SmileQuote], config: &CalibrationConfig) -> Vec<CalibrationResult> {
    if config.parallel_smiles {
        quotes
            .par_iter()
            .map(|q| calibrate_smile(q, config))
            .collect()
    } else {
        quotes.iter().map(|q| calibrate_smile(q, config)).collect()
    }
}

/// Evaluate the calibration objective for a fixed parameter set.
///
/// This is the weighted sum of squared implied-vol residuals that
/// [`calibrate_smile`] minimises, using the weighting scheme from `config`.
pub fn evaluate_sabr(quote: &SmileQuote, params: &SABRParams, config: &CalibrationConfig) -> f64 {
    sabr_calibrator::evaluate_objective(quote, params, config)
}

/// Price every strike of `quote` with SABR-implied vols.
///
/// Prices use the quote's side and discount factor. Market prices come from
/// the same Black formula at the quoted vols. Results are sorted by strike.
pub fn price_with_sabr(params: SABRParams, quote: &SmileQuote) -> Vec<PricingResult> {
    let slice = SabrSlice::new(quote.forward, quote.maturity, params);

    let mut results: Vec<PricingResult> = quote
        .points()
        .map(|(strike, market_iv)| {
            let model = price_option(quote.side, strike, quote.discount, &slice);
            let market_price = black_price(
                quote.forward,
                strike,
                quote.maturity,
                market_iv,
                quote.side,
                quote.discount,
            );
            PricingResult {
                side: quote.side,
                strike,
                market_iv,
                model_iv: model.model_iv,
                market_price,
                model_price: model.price,
            }
        })
        .collect();

    results.sort_by(|a, b| a.strike.total_cmp(&b.strike));
    results
}
