use crate::models::black::OptionSide;
use crate::models::sabr::sabr_model::SABRParams;
use serde::{Deserialize, Serialize};

/// One maturity's observed smile: forward, maturity, discount and the
/// (strike, market implied vol) pairs.
///
/// Built by the data loader (or directly by callers) and treated as immutable by
/// the calibrator. Strikes and vols are expected to be strictly positive; the
/// calibrator does not validate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmileQuote {
    /// Forward price of the underlying for this maturity
    pub forward: f64,
    /// Time to expiration in years
    pub maturity: f64,
    /// Discount factor to expiry, in (0, 1]
    pub discount: f64,
    /// Option side used for the price-space diagnostics
    pub side: OptionSide,
    /// Strikes, sorted ascending by the loader
    pub strikes: Vec<f64>,
    /// Market implied vols (decimal, e.g. 0.25 for 25%) aligned with `strikes`
    pub market_ivs: Vec<f64>,
}

impl SmileQuote {
    /// Smile with unit discount and call side.
    ///
    /// `strikes` and `market_ivs` must have the same length. Debug builds panic
    /// on a mismatch; release builds keep the common prefix.
    pub fn new(forward: f64, maturity: f64, strikes: &[f64], market_ivs: &[f64]) -> Self {
        debug_assert_eq!(
            strikes.len(),
            market_ivs.len(),
            "strikes and market_ivs must be aligned"
        );
        let n = strikes.len().min(market_ivs.len());
        Self {
            forward,
            maturity,
            discount: 1.0,
            side: OptionSide::Call,
            strikes: strikes[..n].to_vec(),
            market_ivs: market_ivs[..n].to_vec(),
        }
    }

    pub fn with_discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_side(mut self, side: OptionSide) -> Self {
        self.side = side;
        self
    }

    pub fn len(&self) -> usize {
        self.strikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strikes.is_empty()
    }

    /// Iterate over `(strike, market_iv)` pairs.
    pub fn points(&self) -> impl ExactSizeIterator<Item = (f64, f64)> + '_ {
        self.strikes
            .iter()
            .copied()
            .zip(self.market_ivs.iter().copied())
    }
}

/// Outcome of a single-smile SABR calibration.
///
/// `success` is the local solver's own convergence flag for the winning trial.
/// It can be `false` while the fit is good, so inspect the RMSE fields rather
/// than relying on it alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub params: SABRParams,
    /// Solver convergence flag of the winning trial
    pub success: bool,
    /// Residual evaluations spent by the winning trial
    pub nfev: usize,
    /// RMSE between model and market implied vols (absolute)
    pub rmse_iv: f64,
    /// `rmse_iv` in basis points
    pub rmse_iv_bps: f64,
    /// RMSE of reconstructed Black prices, in basis points of notional
    pub rmse_price_bps: f64,
    /// Wall-clock time of the whole calibration call
    pub runtime_ms: f64,
    /// Index of the multistart trial that was selected
    pub best_trial: usize,
    /// Number of multistart trials run
    pub trials: usize,
}

impl CalibrationResult {
    pub fn alpha(&self) -> f64 {
        self.params.alpha
    }

    pub fn beta(&self) -> f64 {
        self.params.beta
    }

    pub fn rho(&self) -> f64 {
        self.params.rho
    }

    pub fn nu(&self) -> f64 {
        self.params.nu
    }
}

/// Per-strike model vs market comparison for a calibrated smile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub side: OptionSide,
    pub strike: f64,
    pub market_iv: f64,
    pub model_iv: f64,
    pub market_price: f64,
    pub model_price: f64,
}

/// Model calibrator trait: the seam between a concrete smile model and the
/// generic multistart least-squares pipeline.
///
/// Parameter vectors `x` live in the model's unconstrained space; the
/// calibrator is responsible for mapping them back to admissible parameters.
pub trait ModelCalibrator: Send + Sync {
    /// Returns the name of the model (e.g., "sabr")
    fn model_name(&self) -> &str;

    /// How many parameters are in the model's optimization vector
    fn param_count(&self) -> usize;

    /// Returns parameter names in the order they appear in the optimization vector
    fn param_names(&self) -> Vec<&str>;

    /// Residual vector minimised (in the sum-of-squares sense) by the solver
    fn residuals(&self, x: &[f64]) -> Vec<f64>;

    /// Post-hoc fit metric used to rank multistart trials (lower is better)
    fn fit_rmse(&self, x: &[f64]) -> f64;
}
