// src/models/sabr/sabr_model.rs

//! SABR (Stochastic Alpha Beta Rho) model for a single maturity slice.
//!
//! The forward follows a CEV process with stochastic volatility:
//!
//! ```text
//! dF = α_t · F^β · dW₁
//! dα = ν · α_t · dW₂
//! dW₁·dW₂ = ρ dt
//! ```
//!
//! Implied volatilities are obtained from the Hagan expansion in
//! [`crate::models::sabr::hagan`].

use crate::models::sabr::hagan;
use crate::models::traits::SmileModel;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// SABR parameters for a single smile.
///
/// `beta` is a fixed input of the calibration; only `alpha`, `rho` and `nu`
/// are fitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SABRParams {
    /// Volatility-of-forward scale (must be > 0)
    pub alpha: f64,
    /// CEV skew exponent in (0, 1]
    pub beta: f64,
    /// Forward/volatility correlation in (-1, 1)
    pub rho: f64,
    /// Volatility of volatility (must be > 0)
    pub nu: f64,
}

impl SABRParams {
    /// Creates a parameter set with range validation.
    pub fn new(alpha: f64, beta: f64, rho: f64, nu: f64) -> Result<Self> {
        let params = Self {
            alpha,
            beta,
            rho,
            nu,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return Err(anyhow!("SABRParams: alpha={} must be > 0 and finite", self.alpha));
        }
        if !(self.beta > 0.0 && self.beta <= 1.0) {
            return Err(anyhow!("SABRParams: beta={} must be in (0, 1]", self.beta));
        }
        if !(self.rho > -1.0 && self.rho < 1.0) {
            return Err(anyhow!("SABRParams: rho={} must be in (-1, 1)", self.rho));
        }
        if !(self.nu > 0.0 && self.nu.is_finite()) {
            return Err(anyhow!("SABRParams: nu={} must be > 0 and finite", self.nu));
        }
        Ok(())
    }

    /// Hagan implied volatility at strike `k` for forward `f` and maturity `t`.
    pub fn implied_vol(&self, f: f64, k: f64, t: f64) -> f64 {
        hagan::implied_vol(f, k, t, self.alpha, self.beta, self.rho, self.nu)
    }
}

/// A SABR smile bound to its forward and maturity.
#[derive(Debug, Clone, PartialEq)]
pub struct SabrSlice {
    pub forward: f64,
    pub maturity: f64,
    pub params: SABRParams,
}

impl SabrSlice {
    pub fn new(forward: f64, maturity: f64, params: SABRParams) -> Self {
        Self {
            forward,
            maturity,
            params,
        }
    }

    /// Model implied vols for every strike in `strikes`.
    pub fn implied_vols(&self, strikes: &[f64]) -> Vec<f64> {
        strikes.iter().map(|&k| self.implied_vol(k)).collect()
    }
}

impl SmileModel for SabrSlice {
    type Parameters = SABRParams;

    fn parameters(&self) -> &Self::Parameters {
        &self.params
    }

    fn forward(&self) -> f64 {
        self.forward
    }

    fn maturity(&self) -> f64 {
        self.maturity
    }

    fn implied_vol(&self, strike: f64) -> f64 {
        self.params.implied_vol(self.forward, strike, self.maturity)
    }
}
