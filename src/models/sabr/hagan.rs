// src/models/sabr/hagan.rs

//! Hagan et al. (2002) asymptotic expansion of the SABR implied volatility.
//!
//! The lognormal (Black) implied volatility is
//!
//! ```text
//! σ(K) = α / D · z/χ(z) · [1 + T·((1-β)²/24 · α²/(FK)^(1-β)
//!                                + ρβνα / (4 (FK)^((1-β)/2))
//!                                + (2-3ρ²)/24 · ν²)]
//!
//! D    = (FK)^((1-β)/2) · [1 + (1-β)²/24 · ln²(F/K) + (1-β)⁴/1920 · ln⁴(F/K)]
//! z    = ν/α · (FK)^((1-β)/2) · ln(F/K)
//! χ(z) = ln[(sqrt(1 - 2ρz + z²) + z - ρ) / (1 - ρ)]
//! ```
//!
//! Both `z/χ` at `K → F` and `z/χ` at `χ → 0` are removable singularities; they
//! are handled by an explicit ATM branch and an explicit limit respectively.

/// Relative moneyness `|K-F|/F` below which the ATM expansion is used.
pub const ATM_THRESHOLD: f64 = 1e-6;

/// Floor applied to alpha and nu before evaluation.
pub const PARAM_FLOOR: f64 = 1e-12;

/// Bound on |rho| applied before evaluation.
pub const RHO_BOUND: f64 = 0.9999;

/// Admissible beta range after clamping.
pub const BETA_BOUNDS: (f64, f64) = (1e-6, 0.9999);

const CHI_EPS: f64 = 1e-12;
const SQRT_ARG_FLOOR: f64 = 1e-18;

/// Apply the parameter floors/clamps shared by every evaluation path.
///
/// Returns `(alpha, beta, rho, nu)`.
pub fn clamp_params(alpha: f64, beta: f64, rho: f64, nu: f64) -> (f64, f64, f64, f64) {
    (
        alpha.max(PARAM_FLOOR),
        beta.clamp(BETA_BOUNDS.0, BETA_BOUNDS.1),
        rho.clamp(-RHO_BOUND, RHO_BOUND),
        nu.max(PARAM_FLOOR),
    )
}

/// Time-correction bracket `(1 + T·[...])` shared by both regimes, with
/// `fk_beta = (FK)^((1-β)/2)` (equal to `F^(1-β)` at the money).
fn time_correction(t: f64, alpha: f64, beta: f64, rho: f64, nu: f64, fk_beta: f64) -> f64 {
    let one_m_beta = 1.0 - beta;
    let term = (one_m_beta * one_m_beta / 24.0) * alpha * alpha / (fk_beta * fk_beta)
        + (rho * beta * nu * alpha) / (4.0 * fk_beta)
        + ((2.0 - 3.0 * rho * rho) / 24.0) * nu * nu;
    1.0 + term * t
}

fn atm_implied_vol(f: f64, t: f64, alpha: f64, beta: f64, rho: f64, nu: f64) -> f64 {
    let f_pow = f.powf(1.0 - beta);
    alpha / f_pow * time_correction(t, alpha, beta, rho, nu, f_pow)
}

/// SABR implied Black volatility under the Hagan approximation.
///
/// Never fails: non-positive `f`, `k` or `t`, a non-positive denominator and any
/// non-finite or negative intermediate result all map to `0.0`, which callers
/// treat as "not meaningfully defined".
pub fn implied_vol(f: f64, k: f64, t: f64, alpha: f64, beta: f64, rho: f64, nu: f64) -> f64 {
    let (alpha, beta, rho, nu) = clamp_params(alpha, beta, rho, nu);
    if t <= 0.0 || k <= 0.0 || f <= 0.0 {
        return 0.0;
    }

    let vol = if ((k - f) / f).abs() < ATM_THRESHOLD {
        atm_implied_vol(f, t, alpha, beta, rho, nu)
    } else {
        general_implied_vol(f, k, t, alpha, beta, rho, nu)
    };

    if vol.is_finite() && vol > 0.0 {
        vol
    } else {
        0.0
    }
}

fn general_implied_vol(f: f64, k: f64, t: f64, alpha: f64, beta: f64, rho: f64, nu: f64) -> f64 {
    let log_fk = (f / k).ln();
    let one_m_beta = 1.0 - beta;
    let fk_beta = (f * k).powf(one_m_beta / 2.0);

    let z = (nu / alpha) * fk_beta * log_fk;
    let sqrt_term = (1.0 - 2.0 * rho * z + z * z).max(SQRT_ARG_FLOOR).sqrt();
    let chi = ((sqrt_term + z - rho) / (1.0 - rho)).ln();
    let z_over_chi = if chi.abs() < CHI_EPS { 1.0 } else { z / chi };

    let log_fk2 = log_fk * log_fk;
    let log_fk4 = log_fk2 * log_fk2;
    let omb2 = one_m_beta * one_m_beta;
    let d = fk_beta * (1.0 + (omb2 / 24.0) * log_fk2 + (omb2 * omb2 / 1920.0) * log_fk4);
    if d <= 0.0 {
        return 0.0;
    }

    alpha / d * z_over_chi * time_correction(t, alpha, beta, rho, nu, fk_beta)
}

#[cfg(test)]
mod tests {
    use super::*;

    const F: f64 = 100.0;
    const T: f64 = 1.0;
    const ALPHA: f64 = 2.0;
    const BETA: f64 = 0.5;
    const RHO: f64 = -0.3;
    const NU: f64 = 0.4;

    fn iv(k: f64) -> f64 {
        implied_vol(F, k, T, ALPHA, BETA, RHO, NU)
    }

    #[test]
    fn test_atm_branch_matches_expansion() {
        let f_pow = F.powf(1.0 - BETA);
        let expected = ALPHA / f_pow
            * (1.0
                + T * ((1.0 - BETA).powi(2) / 24.0 * ALPHA * ALPHA / F.powf(2.0 - 2.0 * BETA)
                    + RHO * BETA * NU * ALPHA / (4.0 * f_pow)
                    + (2.0 - 3.0 * RHO * RHO) * NU * NU / 24.0));
        assert!((iv(F) - expected).abs() < 1e-14);
    }

    #[test]
    fn test_continuity_across_atm_threshold() {
        let atm = iv(F);
        for &rel in &[1e-9, 5e-7, 9.9e-7, 1.01e-6, 2e-6, 1e-5] {
            let up = iv(F * (1.0 + rel));
            let dn = iv(F * (1.0 - rel));
            assert!((up - atm).abs() < 1e-5, "jump above F at rel={}", rel);
            assert!((dn - atm).abs() < 1e-5, "jump below F at rel={}", rel);
        }
    }

    #[test]
    fn test_negative_rho_produces_downward_skew() {
        assert!(iv(80.0) > iv(100.0));
        assert!(iv(80.0) > iv(120.0));
    }

    #[test]
    fn test_degenerate_domain_returns_zero() {
        assert_eq!(implied_vol(F, 90.0, 0.0, ALPHA, BETA, RHO, NU), 0.0);
        assert_eq!(implied_vol(F, 0.0, T, ALPHA, BETA, RHO, NU), 0.0);
        assert_eq!(implied_vol(-1.0, 90.0, T, ALPHA, BETA, RHO, NU), 0.0);
        assert_eq!(implied_vol(F, -5.0, T, ALPHA, BETA, RHO, NU), 0.0);
    }

    #[test]
    fn test_extreme_params_are_clamped() {
        // rho = ±1 would make chi's denominator vanish without clamping
        for &rho in &[-1.0, 1.0, -5.0, 5.0] {
            let v = implied_vol(F, 70.0, T, ALPHA, BETA, rho, NU);
            assert!(v.is_finite() && v >= 0.0, "rho={} gave {}", rho, v);
        }
        let v = implied_vol(F, 70.0, T, -1.0, 2.0, 0.0, -1.0);
        assert!(v.is_finite() && v >= 0.0);
    }

    #[test]
    fn test_zero_nu_limit_has_unit_z_over_chi() {
        // With nu floored to 1e-12, z/chi is exactly the chi -> 0 limit.
        let k = 90.0;
        let v = implied_vol(F, k, T, ALPHA, BETA, RHO, 0.0);
        let log_fk = (F / k).ln();
        let fk_beta = (F * k).powf((1.0 - BETA) / 2.0);
        let d = fk_beta
            * (1.0 + (1.0 - BETA).powi(2) / 24.0 * log_fk.powi(2)
                + (1.0 - BETA).powi(4) / 1920.0 * log_fk.powi(4));
        let corr = 1.0 + T * ((1.0 - BETA).powi(2) / 24.0 * ALPHA * ALPHA / (fk_beta * fk_beta));
        assert!((v - ALPHA / d * corr).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_params() {
        let (a, b, r, n) = clamp_params(0.0, 1.5, -2.0, -1.0);
        assert_eq!(a, PARAM_FLOOR);
        assert_eq!(b, BETA_BOUNDS.1);
        assert_eq!(r, -RHO_BOUND);
        assert_eq!(n, PARAM_FLOOR);
    }
}
