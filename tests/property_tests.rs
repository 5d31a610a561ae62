//! Property-based tests using proptest.
//!
//! Invariants of the Hagan formula, the Black pricer and the solver
//! reparameterization, checked over random inputs.

use proptest::prelude::*;
use sabr_lib::models::sabr::sabr_calibrator::SABRModelCalibrator;
use sabr_lib::{
    black_price, black_vega, from_unconstrained, hagan_implied_vol, to_unconstrained, CalibrationConfig,
    OptionSide, SABRParams, SmileQuote,
};

fn side() -> impl Strategy<Value = OptionSide> {
    prop_oneof![Just(OptionSide::Call), Just(OptionSide::Put)]
}

// --- Hagan implied vol ---

proptest! {
    /// Any positive (F, K, T) and any parameter values, including ones outside
    /// the admissible domain, give a finite non-negative vol.
    #[test]
    fn hagan_vol_is_finite_and_non_negative(
        f in 1e-3_f64..1e4,
        k in 1e-3_f64..1e4,
        t in 1e-6_f64..30.0,
        alpha in -1.0_f64..10.0,
        beta in -0.5_f64..1.5,
        rho in -1.5_f64..1.5,
        nu in -1.0_f64..5.0,
    ) {
        let vol = hagan_implied_vol(f, k, t, alpha, beta, rho, nu);
        prop_assert!(vol.is_finite(), "vol not finite: {}", vol);
        prop_assert!(vol >= 0.0, "vol negative: {}", vol);
    }
}

proptest! {
    /// The ATM branch and the general branch agree across the switch point.
    #[test]
    fn hagan_vol_is_continuous_at_the_money(
        f in 10.0_f64..500.0,
        atm_vol in 0.05_f64..0.8,
        beta in 0.1_f64..0.99,
        rho in -0.9_f64..0.9,
        nu in 0.01_f64..2.0,
        t in 0.05_f64..5.0,
    ) {
        let alpha = atm_vol * f.powf(1.0 - beta);
        let atm = hagan_implied_vol(f, f, t, alpha, beta, rho, nu);
        let inside = hagan_implied_vol(f, f * (1.0 + 1e-9), t, alpha, beta, rho, nu);
        let outside = hagan_implied_vol(f, f * (1.0 + 2e-6), t, alpha, beta, rho, nu);

        prop_assert!((inside - atm).abs() <= 1e-9 * atm, "inside {} vs atm {}", inside, atm);
        prop_assert!((outside - atm).abs() <= 1e-4 * atm, "outside {} vs atm {}", outside, atm);
    }
}

// --- Black pricer ---

proptest! {
    #[test]
    fn black_price_is_increasing_in_vol(
        k in 50.0_f64..200.0,
        t in 0.01_f64..5.0,
        sigma in 0.01_f64..1.5,
        bump in 1e-3_f64..0.5,
        df in 0.5_f64..1.0,
        side in side(),
    ) {
        let f = 100.0;
        let lo = black_price(f, k, t, sigma, side, df);
        let hi = black_price(f, k, t, sigma + bump, side, df);
        prop_assert!(hi >= lo, "price decreased: {} -> {}", lo, hi);
        prop_assert!(black_vega(f, k, t, sigma, df) >= 0.0);
        prop_assert!(black_vega(f, f, t, sigma, df) > 0.0);
    }
}

proptest! {
    #[test]
    fn black_price_respects_no_arbitrage_bounds(
        f in 1.0_f64..500.0,
        k in 1.0_f64..500.0,
        t in 1e-4_f64..10.0,
        sigma in 1e-3_f64..2.0,
        df in 0.1_f64..1.0,
    ) {
        let call = black_price(f, k, t, sigma, OptionSide::Call, df);
        let put = black_price(f, k, t, sigma, OptionSide::Put, df);
        let tol = 1e-9 * f.max(k);

        prop_assert!(call >= df * (f - k).max(0.0) - tol);
        prop_assert!(call <= df * f + tol);
        prop_assert!(put >= df * (k - f).max(0.0) - tol);
        prop_assert!(put <= df * k + tol);
        prop_assert!((call - put - df * (f - k)).abs() <= tol);
    }
}

proptest! {
    /// Vanishing maturity collapses the price to discounted intrinsic value and
    /// the vega to zero.
    #[test]
    fn black_price_tends_to_intrinsic(
        k in 50.0_f64..150.0,
        sigma in 0.05_f64..1.0,
        df in 0.5_f64..1.0,
        side in side(),
    ) {
        let f = 100.0;
        let t = 1e-12;
        let price = black_price(f, k, t, sigma, side, df);
        prop_assert!((price - df * side.intrinsic(f, k)).abs() < 1e-4);
        prop_assert!(black_vega(f, k, t, sigma, df) < 1e-3);
        prop_assert_eq!(black_vega(f, k, 0.0, sigma, df), 0.0);
    }
}

// --- Reparameterization ---

proptest! {
    #[test]
    fn unconstrained_round_trip(
        log_alpha in -8.0_f64..3.0,
        rho in -0.999_f64..0.999,
        log_nu in -8.0_f64..2.0,
    ) {
        let alpha = log_alpha.exp();
        let nu = log_nu.exp();
        let x = to_unconstrained(alpha, rho, nu);
        let (a, r, n) = from_unconstrained(&x);
        prop_assert!((a - alpha).abs() <= 1e-13 * alpha);
        prop_assert!((r - rho).abs() <= 1e-12);
        prop_assert!((n - nu).abs() <= 1e-13 * nu);
    }
}

proptest! {
    /// Every unconstrained vector maps into the admissible domain.
    #[test]
    fn unconstrained_vectors_map_to_admissible_params(
        x0 in -30.0_f64..30.0,
        x1 in -30.0_f64..30.0,
        x2 in -30.0_f64..30.0,
    ) {
        let (alpha, rho, nu) = from_unconstrained(&[x0, x1, x2]);
        prop_assert!(alpha > 0.0);
        prop_assert!(nu > 0.0);
        prop_assert!((-1.0..=1.0).contains(&rho));

        // calibrated parameters keep rho strictly inside (-1, 1)
        let quote = SmileQuote::new(100.0, 1.0, &[90.0, 100.0, 110.0], &[0.24, 0.22, 0.23]);
        let calibrator = SABRModelCalibrator::new(&quote, &CalibrationConfig::default());
        let params = calibrator.params_from(&[x0, x1, x2]);
        prop_assert!(params.rho.abs() < 1.0);
        prop_assert!(SABRParams::new(params.alpha, params.beta, params.rho, params.nu).is_ok());
    }
}
