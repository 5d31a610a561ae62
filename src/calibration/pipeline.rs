use crate::calibration::solver::{levenberg_marquardt, LmConfig, LmResult};
use crate::calibration::types::ModelCalibrator;
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// One local solve started from a multistart seed point.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    /// Position of the starting point in the seed list
    pub index: usize,
    /// Post-hoc fit metric reported by the calibrator
    pub rmse: f64,
    pub solution: LmResult,
}

/// All trials of a multistart run plus the selected one.
#[derive(Debug, Clone)]
pub struct MultistartOutcome {
    pub trials: Vec<TrialOutcome>,
    /// Position of the selected trial in `trials`
    pub best: usize,
}

impl MultistartOutcome {
    pub fn best_trial(&self) -> &TrialOutcome {
        &self.trials[self.best]
    }
}

/// Solve from a single starting point and score the solution.
pub fn run_trial(
    model: &dyn ModelCalibrator,
    index: usize,
    start: &[f64],
    lm_config: &LmConfig,
) -> TrialOutcome {
    let solution = levenberg_marquardt(|x| model.residuals(x), start, lm_config);
    let rmse = model.fit_rmse(&solution.x);
    debug!(
        model = model.model_name(),
        trial = index,
        params = ?model.param_names(),
        x = ?solution.x,
        rmse,
        nfev = solution.nfev,
        reason = ?solution.reason,
        "multistart trial finished"
    );
    TrialOutcome {
        index,
        rmse,
        solution,
    }
}

/// Ordering used for trial selection: lower RMSE wins, NaN ranks last, ties
/// keep the earlier trial.
fn compare_trials(a: &TrialOutcome, b: &TrialOutcome) -> Ordering {
    match (a.rmse.is_nan(), b.rmse.is_nan()) {
        (true, true) => a.index.cmp(&b.index),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a
            .rmse
            .partial_cmp(&b.rmse)
            .unwrap_or(Ordering::Equal)
            .then(a.index.cmp(&b.index)),
    }
}

/// Run an independent local solve from every starting point and pick the trial
/// with the lowest post-hoc RMSE, regardless of the solver's own convergence
/// flag.
///
/// With `parallel` the trials are solved on the rayon pool; the selection only
/// depends on `(rmse, index)` so the winner is the same as in the sequential
/// run. Start points whose length differs from the model's `param_count` are
/// skipped with a warning. Returns `None` when no start point is usable.
pub fn run_multistart(
    model: &dyn ModelCalibrator,
    starts: &[Vec<f64>],
    lm_config: &LmConfig,
    parallel: bool,
) -> Option<MultistartOutcome> {
    let dim = model.param_count();
    let valid: Vec<(usize, &Vec<f64>)> = starts
        .iter()
        .enumerate()
        .filter(|(i, s)| {
            let ok = s.len() == dim;
            if !ok {
                warn!(
                    model = model.model_name(),
                    trial = *i,
                    expected = dim,
                    actual = s.len(),
                    "skipping start point of wrong dimension"
                );
            }
            ok
        })
        .collect();

    let trials: Vec<TrialOutcome> = if parallel {
        valid
            .par_iter()
            .map(|&(i, s)| run_trial(model, i, s, lm_config))
            .collect()
    } else {
        valid
            .iter()
            .map(|&(i, s)| run_trial(model, i, s, lm_config))
            .collect()
    };

    let best = trials
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| compare_trials(a, b))
        .map(|(pos, _)| pos)?;

    Some(MultistartOutcome { trials, best })
}
