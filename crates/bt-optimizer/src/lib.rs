//! bt-optimizer
//!
//! Coordinate-descent integer position optimizer: projects a continuous
//! target onto integer contracts while minimizing tracking error to that
//! target plus a trading-cost penalty. Pure function of its inputs — no
//! state carried across calls, matching the ancestor `DynamicOptimizer`'s
//! stateless contract.

mod matrix;

pub use matrix::Matrix;

use bt_types::{DynamicOptConfig, Error, OptimizationResult, Result};

/// `Σ_i [ |proposed_i - current_i| * costs_i * cost_penalty_scalar
///        + (asymmetric_risk_buffer * |proposed_i - current_i| * costs_i, if proposed_i != current_i) ]`
///
/// Kept as two additive terms per the source material rather than
/// collapsed into one scalar: see DESIGN.md for why `cost_penalty_scalar`
/// and `asymmetric_risk_buffer` are both retained despite multiplying the
/// same `trade_size * cost` quantity.
fn cost_penalty(current: &[f64], proposed: &[f64], costs: &[f64], cfg: &DynamicOptConfig) -> f64 {
    let mut total = 0.0;
    for i in 0..current.len() {
        let trade_size = (proposed[i] - current[i]).abs();
        if trade_size == 0.0 {
            continue;
        }
        total += trade_size * costs[i] * cfg.cost_penalty_scalar;
        total += cfg.asymmetric_risk_buffer * trade_size * costs[i];
    }
    total
}

/// `tau * sqrt(max(0, diffᵀ · Σ · diff)) + cost_penalty` where
/// `diff = proposed - target`.
fn tracking_error(target: &[f64], proposed: &[f64], covariance: &Matrix, penalty: f64, tau: f64) -> f64 {
    let diff: Vec<f64> = proposed
        .iter()
        .zip(target.iter())
        .map(|(p, t)| p - t)
        .collect();
    let quad = covariance.quadratic_form(&diff).max(0.0);
    tau * quad.sqrt() + penalty
}

fn objective(
    current: &[f64],
    target: &[f64],
    proposed: &[f64],
    covariance: &Matrix,
    costs: &[f64],
    cfg: &DynamicOptConfig,
) -> f64 {
    let penalty = cost_penalty(current, proposed, costs, cfg);
    tracking_error(target, proposed, covariance, penalty, cfg.tau)
}

/// Single-period coordinate descent: for each asset, try `+weight`/`-weight`
/// and keep the move if it strictly improves the objective by more than
/// `convergence_threshold`; repeat until a full sweep makes no improvement
/// or `max_iterations` is reached. Positions are integer-rounded only once,
/// at the end.
pub fn optimize_single_period(
    current_positions: &[f64],
    target_positions: &[f64],
    covariance: &Matrix,
    costs: &[f64],
    weights: &[f64],
    cfg: &DynamicOptConfig,
) -> Result<OptimizationResult> {
    let n = current_positions.len();
    if n == 0 {
        return Err(Error::InvalidArgument("empty positions".into()));
    }
    if target_positions.len() != n || costs.len() != n || weights.len() != n {
        return Err(Error::InvalidArgument(
            "current/target/costs/weights length mismatch".into(),
        ));
    }
    if covariance.dim() != n {
        return Err(Error::InvalidArgument(format!(
            "covariance dimension {} does not match {} assets",
            covariance.dim(),
            n
        )));
    }
    if cfg.tau <= 0.0 {
        return Err(Error::InvalidArgument("tau must be > 0".into()));
    }

    let mut proposed = current_positions.to_vec();

    let mut iterations = 0u32;
    let mut converged = false;

    while iterations < cfg.max_iterations {
        iterations += 1;
        let mut improved = false;

        for i in 0..n {
            let mut best_error = objective(current_positions, target_positions, &proposed, covariance, costs, cfg);
            let mut best_value = proposed[i];

            for delta in [-1.0_f64, 1.0_f64] {
                let mut temp = proposed.clone();
                temp[i] += delta * weights[i];
                let err = objective(current_positions, target_positions, &temp, covariance, costs, cfg);
                if err < best_error - cfg.convergence_threshold {
                    best_error = err;
                    best_value = temp[i];
                }
            }

            if best_value != proposed[i] {
                proposed[i] = best_value;
                improved = true;
            }
        }

        if !improved {
            converged = true;
            break;
        }
    }

    let final_positions: Vec<f64> = proposed.iter().map(|x| x.round()).collect();
    let final_cost = cost_penalty(current_positions, &final_positions, costs, cfg);
    let final_error = tracking_error(target_positions, &final_positions, covariance, final_cost, cfg.tau);

    Ok(OptimizationResult {
        positions: final_positions,
        tracking_error: final_error,
        cost_penalty: final_cost,
        iterations,
        converged,
    })
}

/// Multi-period/batch entry point: validates shapes then delegates to
/// [`optimize_single_period`]. No internal state is kept across calls.
pub fn optimize(
    current_positions: &[f64],
    target_positions: &[f64],
    covariance: &Matrix,
    costs: &[f64],
    weights: &[f64],
    cfg: &DynamicOptConfig,
) -> Result<OptimizationResult> {
    if current_positions.len() != target_positions.len() {
        return Err(Error::InvalidArgument(
            "current_positions and target_positions must be the same length".into(),
        ));
    }
    optimize_single_period(current_positions, target_positions, covariance, costs, weights, cfg)
}

/// Validates a config update: `tau` and `cost_penalty_scalar` must be
/// strictly positive. Never silently clamped.
pub fn update_config(cfg: &DynamicOptConfig) -> Result<()> {
    if cfg.tau <= 0.0 {
        return Err(Error::InvalidArgument("tau must be > 0".into()));
    }
    if cfg.cost_penalty_scalar <= 0.0 {
        return Err(Error::InvalidArgument("cost_penalty_scalar must be > 0".into()));
    }
    Ok(())
}
