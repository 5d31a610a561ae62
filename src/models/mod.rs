pub mod black;
pub mod sabr;

/// Common traits used by all smile models
pub mod traits {
    /// Smile model trait for strike-space implied volatility
    pub trait SmileModel {
        type Parameters;

        fn parameters(&self) -> &Self::Parameters;
        fn forward(&self) -> f64;
        fn maturity(&self) -> f64;
        /// Implied Black volatility at `strike`; `0.0` when undefined.
        fn implied_vol(&self, strike: f64) -> f64;
    }
}

/// Utility functions shared by the calibrators and pricing helpers
pub mod utils {
    use crate::models::black::{black_price, OptionSide};
    use crate::models::traits::SmileModel;

    /// Option pricing result
    #[derive(Debug, Clone, Copy)]
    pub struct OptionPricingResult {
        pub price: f64,
        pub model_iv: f64,
    }

    /// Price an option off a smile model with the Black formula
    pub fn price_option<T: SmileModel>(
        side: OptionSide,
        strike: f64,
        discount: f64,
        model: &T,
    ) -> OptionPricingResult {
        let model_iv = model.implied_vol(strike);
        let price = black_price(
            model.forward(),
            strike,
            model.maturity(),
            model_iv,
            side,
            discount,
        );
        OptionPricingResult { price, model_iv }
    }

    /// Root mean square of `errors`; NaN for an empty slice.
    pub fn rmse(errors: impl ExactSizeIterator<Item = f64>) -> f64 {
        let n = errors.len();
        if n == 0 {
            return f64::NAN;
        }
        (errors.map(|e| e * e).sum::<f64>() / n as f64).sqrt()
    }

    /// Index of the strike closest to `forward`. `None` for an empty slice.
    pub fn nearest_strike_index(strikes: &[f64], forward: f64) -> Option<usize> {
        strikes
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (*a - forward)
                    .abs()
                    .partial_cmp(&(*b - forward).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    }

}
