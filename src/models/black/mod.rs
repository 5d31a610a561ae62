// Black (1976) forward-measure pricing helpers used by the SABR calibrator for
// vega weighting and for the price-space consistency check.  Greeks other than
// vega are intentionally omitted.

use anyhow::{anyhow, Result};
use roots::{find_root_brent, SimpleConvergency};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Lower and upper volatility bounds searched by [`black_implied_vol`].
const IV_SEARCH_BOUNDS: (f64, f64) = (1e-6, 5.0);

/// Side of a European option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    #[default]
    Call,
    Put,
}

impl OptionSide {
    pub fn is_call(self) -> bool {
        matches!(self, OptionSide::Call)
    }

    /// Undiscounted payoff at forward `f` for strike `k`.
    pub fn intrinsic(self, f: f64, k: f64) -> f64 {
        match self {
            OptionSide::Call => (f - k).max(0.0),
            OptionSide::Put => (k - f).max(0.0),
        }
    }
}

impl FromStr for OptionSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "C" | "CALL" => Ok(OptionSide::Call),
            "P" | "PUT" => Ok(OptionSide::Put),
            other => Err(anyhow!("Invalid option type: {}", other)),
        }
    }
}

impl fmt::Display for OptionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionSide::Call => write!(f, "call"),
            OptionSide::Put => write!(f, "put"),
        }
    }
}

pub(crate) fn norm_cdf(x: f64) -> f64 {
    // 0.5 * [1 + erf(x / sqrt(2))]
    0.5 * (1.0 + libm::erf(x / std::f64::consts::SQRT_2))
}

pub(crate) fn norm_pdf(x: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

fn is_degenerate(f: f64, k: f64, t: f64, sigma: f64) -> bool {
    t <= 0.0 || sigma <= 0.0 || f <= 0.0 || k <= 0.0
}

fn d1(f: f64, k: f64, t: f64, sigma: f64) -> f64 {
    ((f / k).ln() + 0.5 * sigma * sigma * t) / (sigma * t.sqrt())
}

/// Discounted price of a European option on a forward under the Black model.
///
/// Degenerate inputs (non-positive `t`, `sigma`, `f` or `k`) fall back to the
/// discounted intrinsic value so that an optimiser probing a zero volatility
/// never sees NaN.
pub fn black_price(f: f64, k: f64, t: f64, sigma: f64, side: OptionSide, df: f64) -> f64 {
    if is_degenerate(f, k, t, sigma) {
        return df * side.intrinsic(f, k);
    }
    let vol_sqrt_t = sigma * t.sqrt();
    let d1 = d1(f, k, t, sigma);
    let d2 = d1 - vol_sqrt_t;
    let price = match side {
        OptionSide::Call => f * norm_cdf(d1) - k * norm_cdf(d2),
        OptionSide::Put => k * norm_cdf(-d2) - f * norm_cdf(-d1),
    };
    df * price
}

/// Black vega, `df * F * sqrt(T) * phi(d1)`. Zero for degenerate inputs.
pub fn black_vega(f: f64, k: f64, t: f64, sigma: f64, df: f64) -> f64 {
    if is_degenerate(f, k, t, sigma) {
        return 0.0;
    }
    df * f * t.sqrt() * norm_pdf(d1(f, k, t, sigma))
}

/// Invert [`black_price`] for the volatility with Brent's method.
///
/// # Errors
///
/// Fails when the inputs are degenerate, when `price` lies outside the
/// no-arbitrage band `[df * intrinsic, df * F]` (calls) / `[df * intrinsic, df * K]`
/// (puts), or when the root search does not converge inside the volatility
/// search bounds.
pub fn black_implied_vol(
    price: f64,
    f: f64,
    k: f64,
    t: f64,
    side: OptionSide,
    df: f64,
) -> Result<f64> {
    if t <= 0.0 || f <= 0.0 || k <= 0.0 || df <= 0.0 {
        return Err(anyhow!(
            "Invalid inputs for implied vol: f={}, k={}, t={}, df={}",
            f,
            k,
            t,
            df
        ));
    }

    let lower = df * side.intrinsic(f, k);
    let upper = match side {
        OptionSide::Call => df * f,
        OptionSide::Put => df * k,
    };
    if !price.is_finite() || price <= lower || price >= upper {
        return Err(anyhow!(
            "Price {} outside no-arbitrage band ({}, {}) for {} k={}",
            price,
            lower,
            upper,
            side,
            k
        ));
    }

    let objective = |sigma: f64| black_price(f, k, t, sigma, side, df) - price;
    let (lo, hi) = IV_SEARCH_BOUNDS;
    let mut convergency = SimpleConvergency {
        eps: 1e-12_f64,
        max_iter: 200,
    };
    find_root_brent(lo, hi, &objective, &mut convergency)
        .map_err(|e| anyhow!("Implied vol root search failed for k={}: {:?}", k, e))
}
