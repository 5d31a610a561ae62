use crate::calibration::solver::LmConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Random perturbation applied to the initial guess for multistart trials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerturbationConfig {
    /// Std-dev of the log-normal multiplier on alpha
    pub alpha_log_std: f64,
    /// Std-dev of the additive normal shift on rho
    pub rho_std: f64,
    /// Perturbed rho is clipped to [-rho_clip, rho_clip]
    pub rho_clip: f64,
    /// Std-dev of the log-normal multiplier on nu
    pub nu_log_std: f64,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        Self {
            alpha_log_std: 0.2,
            rho_std: 0.15,
            rho_clip: 0.85,
            nu_log_std: 0.3,
        }
    }
}

/// Priors for the unperturbed starting point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InitialGuessConfig {
    /// Starting correlation (equity-like negative skew)
    pub rho0: f64,
    /// Starting vol-of-vol
    pub nu0: f64,
    /// Lower bound on the ATM-derived alpha
    pub alpha_floor: f64,
}

impl Default for InitialGuessConfig {
    fn default() -> Self {
        Self {
            rho0: -0.2,
            nu0: 0.5,
            alpha_floor: 1e-4,
        }
    }
}

/// Main configuration struct for SABR calibration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationConfig {
    /// Fixed CEV exponent (never fitted)
    #[serde(default = "default_beta")]
    pub beta: f64,

    /// Weight residuals by normalised Black vega instead of uniformly
    #[serde(default = "default_vega_weighted")]
    pub vega_weighted: bool,

    /// Lower bound on each normalised vega weight
    #[serde(default = "default_weight_floor")]
    pub weight_floor: f64,

    /// Total number of local solves (the first is unperturbed)
    #[serde(default = "default_multistart")]
    pub multistart: usize,

    /// Seed of the multistart random generator
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Residual evaluation budget per trial
    #[serde(default = "default_max_evals")]
    pub max_evals: usize,

    #[serde(default = "default_tolerance")]
    pub ftol: f64,

    #[serde(default = "default_tolerance")]
    pub xtol: f64,

    #[serde(default = "default_tolerance")]
    pub gtol: f64,

    /// Solve multistart trials on the rayon thread pool
    #[serde(default)]
    pub parallel_trials: bool,

    /// Calibrate independent smiles on the rayon thread pool
    #[serde(default)]
    pub parallel_smiles: bool,

    /// Verbosity level (0=silent, 1=per smile, 2=per trial)
    #[serde(default)]
    pub verbosity: u8,

    #[serde(default)]
    pub perturbation: PerturbationConfig,

    #[serde(default)]
    pub initial_guess: InitialGuessConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            beta: default_beta(),
            vega_weighted: default_vega_weighted(),
            weight_floor: default_weight_floor(),
            multistart: default_multistart(),
            seed: default_seed(),
            max_evals: default_max_evals(),
            ftol: default_tolerance(),
            xtol: default_tolerance(),
            gtol: default_tolerance(),
            parallel_trials: false,
            parallel_smiles: false,
            verbosity: 0,
            perturbation: PerturbationConfig::default(),
            initial_guess: InitialGuessConfig::default(),
        }
    }
}

impl CalibrationConfig {
    /// Default configuration for production calibration
    pub fn production() -> Self {
        Self {
            multistart: 5,
            max_evals: 500,
            ..Self::default()
        }
    }

    /// Fast configuration for development and testing
    pub fn fast() -> Self {
        Self {
            multistart: 1,
            max_evals: 100,
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
            ..Self::default()
        }
    }

    /// High-precision configuration for research and backtesting
    pub fn research() -> Self {
        Self {
            multistart: 16,
            max_evals: 2000,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            parallel_trials: true,
            ..Self::default()
        }
    }

    /// Minimal configuration for quick validation and debugging
    pub fn minimal() -> Self {
        Self {
            multistart: 1,
            max_evals: 30,
            ftol: 1e-6,
            xtol: 1e-6,
            gtol: 1e-6,
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse calibration config")
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Local solver settings derived from this configuration
    pub fn lm_config(&self) -> LmConfig {
        LmConfig {
            max_evals: self.max_evals.max(1),
            ftol: self.ftol,
            xtol: self.xtol,
            gtol: self.gtol,
            ..LmConfig::default()
        }
    }
}

fn default_beta() -> f64 {
    0.5
}

fn default_vega_weighted() -> bool {
    true
}

fn default_weight_floor() -> f64 {
    1e-6
}

fn default_multistart() -> usize {
    3
}

fn default_seed() -> u64 {
    42
}

fn default_max_evals() -> usize {
    300
}

fn default_tolerance() -> f64 {
    1e-10
}
