// src/models/sabr/sabr_calibrator.rs

//! SABR model calibrator implementation
//!
//! Fits `(alpha, rho, nu)` for a fixed `beta` by weighted least squares in
//! implied-vol space. The free parameters are optimised in the unconstrained
//! coordinates `(ln alpha, atanh rho, ln nu)`, so every candidate the solver
//! proposes maps back to `alpha > 0`, `nu > 0`, `rho in (-1, 1)` without box
//! constraints. Global search is a seeded multistart around an ATM-based
//! initial guess.

use crate::calibration::config::CalibrationConfig;
use crate::calibration::pipeline::run_multistart;
use crate::calibration::types::{CalibrationResult, ModelCalibrator, SmileQuote};
use crate::models::black::{black_price, black_vega};
use crate::models::sabr::hagan::{PARAM_FLOOR, RHO_BOUND};
use crate::models::sabr::sabr_model::SABRParams;
use crate::models::utils::{nearest_strike_index, rmse};
use rand::Rng;
use rand_distr::StandardNormal;
use std::time::Instant;
use tracing::{info, warn};

/// Map `(alpha, rho, nu)` to the solver's unconstrained coordinates.
pub fn to_unconstrained(alpha: f64, rho: f64, nu: f64) -> [f64; 3] {
    [
        alpha.max(PARAM_FLOOR).ln(),
        rho.clamp(-RHO_BOUND, RHO_BOUND).atanh(),
        nu.max(PARAM_FLOOR).ln(),
    ]
}

/// Inverse of [`to_unconstrained`]: `(exp, tanh, exp)`.
pub fn from_unconstrained(x: &[f64]) -> (f64, f64, f64) {
    (x[0].exp(), x[1].tanh(), x[2].exp())
}

/// Per-strike residual weights.
///
/// Vega weights are `vega_i / (sum(vega) + 1e-12)` floored at `floor`; the
/// floor keeps zero-vega wings in the fit, so the weights need not sum to one.
/// Without vega weighting every strike gets `1/n`.
pub fn residual_weights(quote: &SmileQuote, vega_weighted: bool, floor: f64) -> Vec<f64> {
    let n = quote.len();
    if !vega_weighted {
        return vec![1.0 / n.max(1) as f64; n];
    }
    // discount cancels in the normalisation
    let vegas: Vec<f64> = quote
        .points()
        .map(|(k, iv)| black_vega(quote.forward, k, quote.maturity, iv, 1.0))
        .collect();
    let total = vegas.iter().sum::<f64>() + 1e-12;
    vegas.iter().map(|v| (v / total).max(floor)).collect()
}

/// Unperturbed starting point `(alpha0, rho0, nu0)`.
///
/// `alpha0` is the market vol at the strike nearest the forward scaled by
/// `F^(1-beta)`, so that the leading Hagan term reproduces the ATM level.
pub fn initial_guess(quote: &SmileQuote, config: &CalibrationConfig) -> (f64, f64, f64) {
    let atm_iv = nearest_strike_index(&quote.strikes, quote.forward)
        .map(|i| quote.market_ivs[i])
        .unwrap_or(0.0);
    let alpha0 = (atm_iv * quote.forward.powf(1.0 - config.beta)).max(config.initial_guess.alpha_floor);
    (alpha0, config.initial_guess.rho0, config.initial_guess.nu0)
}

/// Starting points for every multistart trial, in unconstrained coordinates.
///
/// Trial 0 is the initial guess itself and consumes no random draws. Each
/// further trial consumes exactly three standard normals from `rng`, in the
/// order alpha, rho, nu.
pub fn multistart_seeds<R: Rng>(
    guess: (f64, f64, f64),
    config: &CalibrationConfig,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    let (alpha0, rho0, nu0) = guess;
    let p = &config.perturbation;
    let trials = config.multistart.max(1);

    let mut seeds = Vec::with_capacity(trials);
    seeds.push(to_unconstrained(alpha0, rho0, nu0).to_vec());
    for _ in 1..trials {
        let za: f64 = rng.sample(StandardNormal);
        let zr: f64 = rng.sample(StandardNormal);
        let zn: f64 = rng.sample(StandardNormal);
        let alpha = alpha0 * (p.alpha_log_std * za).exp();
        let rho = (rho0 + p.rho_std * zr).clamp(-p.rho_clip, p.rho_clip);
        let nu = nu0 * (p.nu_log_std * zn).exp();
        seeds.push(to_unconstrained(alpha, rho, nu).to_vec());
    }
    seeds
}

/// Calibrator for the SABR model with 3 free parameters per smile:
/// [ln alpha, atanh rho, ln nu]
#[derive(Debug, Clone)]
pub struct SABRModelCalibrator<'a> {
    quote: &'a SmileQuote,
    beta: f64,
    sqrt_weights: Vec<f64>,
}

impl<'a> SABRModelCalibrator<'a> {
    pub fn new(quote: &'a SmileQuote, config: &CalibrationConfig) -> Self {
        let weights = residual_weights(quote, config.vega_weighted, config.weight_floor);
        Self {
            quote,
            beta: config.beta,
            sqrt_weights: weights.iter().map(|w| w.sqrt()).collect(),
        }
    }

    /// Parameters represented by an unconstrained vector.
    ///
    /// `tanh` saturates to exactly +-1 for large `|x[1]|`, so rho is pulled back
    /// inside `RHO_BOUND`.
    pub fn params_from(&self, x: &[f64]) -> SABRParams {
        let (alpha, rho, nu) = from_unconstrained(x);
        SABRParams {
            alpha,
            beta: self.beta,
            rho: rho.clamp(-RHO_BOUND, RHO_BOUND),
            nu,
        }
    }

    pub fn model_ivs(&self, params: &SABRParams) -> Vec<f64> {
        self.quote
            .strikes
            .iter()
            .map(|&k| params.implied_vol(self.quote.forward, k, self.quote.maturity))
            .collect()
    }

    /// Weighted sum of squared implied-vol errors at `params`
    pub fn weighted_sse(&self, params: &SABRParams) -> f64 {
        self.weighted_residuals(params).iter().map(|r| r * r).sum()
    }

    fn weighted_residuals(&self, params: &SABRParams) -> Vec<f64> {
        self.model_ivs(params)
            .iter()
            .zip(&self.quote.market_ivs)
            .zip(&self.sqrt_weights)
            .map(|((model, market), sw)| sw * (model - market))
            .collect()
    }

    /// Unweighted implied-vol RMSE at `params`
    pub fn iv_rmse(&self, params: &SABRParams) -> f64 {
        let model = self.model_ivs(params);
        rmse(model.iter().zip(&self.quote.market_ivs).map(|(m, q)| m - q))
    }

    /// RMSE between Black prices at model and market vols, in basis points
    pub fn price_rmse_bps(&self, params: &SABRParams) -> f64 {
        let q = self.quote;
        let model = self.model_ivs(params);
        let errors = q.points().zip(&model).map(|((k, market_iv), &model_iv)| {
            black_price(q.forward, k, q.maturity, model_iv, q.side, q.discount)
                - black_price(q.forward, k, q.maturity, market_iv, q.side, q.discount)
        });
        1e4 * rmse(errors)
    }
}

impl ModelCalibrator for SABRModelCalibrator<'_> {
    fn model_name(&self) -> &str {
        "sabr"
    }

    fn param_count(&self) -> usize {
        3
    }

    fn param_names(&self) -> Vec<&str> {
        vec!["alpha", "rho", "nu"]
    }

    /// `sqrt(w_i) * (model_iv_i - market_iv_i)` for every strike
    fn residuals(&self, x: &[f64]) -> Vec<f64> {
        self.weighted_residuals(&self.params_from(x))
    }

    fn fit_rmse(&self, x: &[f64]) -> f64 {
        self.iv_rmse(&self.params_from(x))
    }
}

/// Calibrate one smile drawing multistart perturbations from `rng`.
///
/// Returns best-effort parameters in every case; see [`CalibrationResult`] for
/// the meaning of `success`. An empty smile yields the initial-guess parameters
/// with NaN RMSE fields, `nfev = 0` and `success = false`.
pub fn calibrate_with_rng<R: Rng>(
    quote: &SmileQuote,
    config: &CalibrationConfig,
    rng: &mut R,
) -> CalibrationResult {
    let started = Instant::now();
    let calibrator = SABRModelCalibrator::new(quote, config);
    let guess = initial_guess(quote, config);
    let seeds = multistart_seeds(guess, config, rng);

    let outcome = if quote.is_empty() {
        None
    } else {
        run_multistart(&calibrator, &seeds, &config.lm_config(), config.parallel_trials)
    };

    let Some(outcome) = outcome else {
        let (alpha, rho, nu) = guess;
        return CalibrationResult {
            params: SABRParams {
                alpha,
                beta: config.beta,
                rho,
                nu,
            },
            success: false,
            nfev: 0,
            rmse_iv: f64::NAN,
            rmse_iv_bps: f64::NAN,
            rmse_price_bps: f64::NAN,
            runtime_ms: started.elapsed().as_secs_f64() * 1000.0,
            best_trial: 0,
            trials: 0,
        };
    };

    let best = outcome.best_trial();
    let params = calibrator.params_from(&best.solution.x);
    let rmse_iv = calibrator.iv_rmse(&params);
    let rmse_price_bps = calibrator.price_rmse_bps(&params);
    let success = best.solution.success();

    if config.verbosity > 0 {
        info!(
            forward = quote.forward,
            maturity = quote.maturity,
            alpha = params.alpha,
            rho = params.rho,
            nu = params.nu,
            rmse_iv_bps = 1e4 * rmse_iv,
            trial = best.index,
            "SABR smile calibrated"
        );
    }
    if !success {
        warn!(
            reason = ?best.solution.reason,
            nfev = best.solution.nfev,
            rmse_iv,
            "winning SABR trial did not report convergence"
        );
    }

    CalibrationResult {
        params,
        success,
        nfev: best.solution.nfev,
        rmse_iv,
        rmse_iv_bps: 1e4 * rmse_iv,
        rmse_price_bps,
        runtime_ms: started.elapsed().as_secs_f64() * 1000.0,
        best_trial: best.index,
        trials: outcome.trials.len(),
    }
}

/// Weighted least-squares objective of `params` on `quote`, i.e. the quantity
/// the calibrator minimises (sum of squared weighted residuals).
pub fn evaluate_objective(quote: &SmileQuote, params: &SABRParams, config: &CalibrationConfig) -> f64 {
    SABRModelCalibrator::new(quote, config).weighted_sse(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn skew_quote() -> SmileQuote {
        SmileQuote::new(
            100.0,
            1.0,
            &[80.0, 90.0, 100.0, 110.0, 120.0],
            &[0.28, 0.24, 0.22, 0.23, 0.26],
        )
    }

    #[test]
    fn test_unconstrained_round_trip() {
        for &(a, r, n) in &[(0.2, -0.3, 0.4), (1e-3, 0.9998, 5.0), (3.7, -0.9998, 1e-4), (1.0, 0.0, 1.0)] {
            let x = to_unconstrained(a, r, n);
            let (a2, r2, n2) = from_unconstrained(&x);
            assert!((a2 - a).abs() <= 1e-14 * a, "alpha {} -> {}", a, a2);
            assert!((r2 - r).abs() < 1e-12, "rho {} -> {}", r, r2);
            assert!((n2 - n).abs() <= 1e-14 * n, "nu {} -> {}", n, n2);
        }
    }

    #[test]
    fn test_unconstrained_clamps_rho() {
        let x = to_unconstrained(0.2, 1.0, 0.4);
        assert!(x[1].is_finite());
        assert!((from_unconstrained(&x).1 - RHO_BOUND).abs() < 1e-12);
    }

    #[test]
    fn test_saturated_rho_stays_inside_the_bound() {
        assert_eq!(from_unconstrained(&[0.0, 20.0, 0.0]).1, 1.0);

        let quote = skew_quote();
        let calibrator = SABRModelCalibrator::new(&quote, &CalibrationConfig::default());
        assert_eq!(calibrator.params_from(&[0.0, 20.0, 0.0]).rho, RHO_BOUND);
        assert_eq!(calibrator.params_from(&[0.0, -40.0, 0.0]).rho, -RHO_BOUND);
        let p = calibrator.params_from(&[0.3, 0.5, -1.0]);
        assert_eq!(p.rho, 0.5_f64.tanh());
        assert_eq!(p.beta, 0.5);
    }

    #[test]
    fn test_uniform_weights() {
        let w = residual_weights(&skew_quote(), false, 1e-6);
        assert_eq!(w.len(), 5);
        assert!(w.iter().all(|&x| x == 0.2));
    }

    #[test]
    fn test_vega_weights_peak_at_the_money_and_are_floored() {
        let w = residual_weights(&skew_quote(), true, 1e-6);
        assert!(w[2] > w[0] && w[2] > w[4]);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        // far wing with vanishing vega is floored, not dropped
        let q = SmileQuote::new(100.0, 0.25, &[100.0, 1000.0], &[0.2, 0.2]);
        let w = residual_weights(&q, true, 1e-6);
        assert_eq!(w[1], 1e-6);
        assert!(w.iter().sum::<f64>() > 1.0);
    }

    #[test]
    fn test_initial_guess_uses_nearest_strike() {
        let config = CalibrationConfig::default();
        let (a, r, n) = initial_guess(&skew_quote(), &config);
        assert!((a - 0.22 * 10.0).abs() < 1e-12);
        assert_eq!(r, -0.2);
        assert_eq!(n, 0.5);

        let empty = SmileQuote::new(100.0, 1.0, &[], &[]);
        assert_eq!(initial_guess(&empty, &config).0, 1e-4);
    }

    #[test]
    fn test_seed_generation_consumes_three_draws_per_trial() {
        let config = CalibrationConfig {
            multistart: 4,
            ..CalibrationConfig::default()
        };
        let guess = (2.2, -0.2, 0.5);
        let mut rng = StdRng::seed_from_u64(7);
        let seeds = multistart_seeds(guess, &config, &mut rng);
        assert_eq!(seeds.len(), 4);
        assert_eq!(seeds[0], to_unconstrained(2.2, -0.2, 0.5).to_vec());

        // replay the draws by hand
        let mut replay = StdRng::seed_from_u64(7);
        for seed in &seeds[1..] {
            let za: f64 = replay.sample(StandardNormal);
            let zr: f64 = replay.sample(StandardNormal);
            let zn: f64 = replay.sample(StandardNormal);
            let expected = to_unconstrained(
                2.2 * (0.2 * za).exp(),
                (-0.2 + 0.15 * zr).clamp(-0.85, 0.85),
                0.5 * (0.3 * zn).exp(),
            );
            assert_eq!(seed, &expected.to_vec());
        }

        // a single-trial run draws nothing
        let single = CalibrationConfig {
            multistart: 1,
            ..CalibrationConfig::default()
        };
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        multistart_seeds(guess, &single, &mut a);
        assert_eq!(a.gen::<u64>(), b.gen::<u64>());
    }

    #[test]
    fn test_residuals_are_weighted_vol_errors() {
        let quote = skew_quote();
        let config = CalibrationConfig::default();
        let calibrator = SABRModelCalibrator::new(&quote, &config);
        let x = to_unconstrained(2.0, -0.3, 0.4);
        let params = calibrator.params_from(&x);
        let weights = residual_weights(&quote, true, 1e-6);
        let r = calibrator.residuals(&x);
        for i in 0..quote.len() {
            let model = params.implied_vol(100.0, quote.strikes[i], 1.0);
            let expected = weights[i].sqrt() * (model - quote.market_ivs[i]);
            assert!((r[i] - expected).abs() < 1e-15);
        }
        let sse: f64 = r.iter().map(|v| v * v).sum();
        assert!((evaluate_objective(&quote, &params, &config) - sse).abs() < 1e-15);
    }

    #[test]
    fn test_calibrate_with_rng_is_deterministic() {
        let quote = skew_quote();
        let config = CalibrationConfig::default();
        let a = calibrate_with_rng(&quote, &config, &mut StdRng::seed_from_u64(42));
        let b = calibrate_with_rng(&quote, &config, &mut StdRng::seed_from_u64(42));
        assert_eq!(a.params, b.params);
        assert_eq!(a.nfev, b.nfev);
        assert_eq!(a.best_trial, b.best_trial);
        assert_eq!(a.trials, 3);
        assert_eq!(a.rmse_iv.to_bits(), b.rmse_iv.to_bits());
    }

    #[test]
    fn test_empty_smile() {
        let quote = SmileQuote::new(100.0, 1.0, &[], &[]);
        let result = calibrate_with_rng(&quote, &CalibrationConfig::default(), &mut StdRng::seed_from_u64(1));
        assert!(!result.success);
        assert_eq!(result.nfev, 0);
        assert_eq!(result.trials, 0);
        assert!(result.rmse_iv.is_nan());
        assert!(result.rmse_price_bps.is_nan());
        assert_eq!(result.params.alpha, 1e-4);
    }
}
