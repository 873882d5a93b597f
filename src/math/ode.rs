use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{ArboError, Result};

/// Integration scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Method {
    /// Dormand–Prince 4(5) with adaptive step size.
    Dopri5,
    /// Classic fixed-step RK4; `dt` is shrunk so grid points are hit exactly.
    Rk4 { dt: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub method: Method,
    pub rtol: f64,
    pub atol: f64,
    /// Initial step; 0.0 picks one from the span.
    pub first_step: f64,
    pub min_step: f64,
    pub max_step: f64,
    /// Accepted + rejected steps allowed before giving up.
    pub max_steps: usize,
    /// Optional wall-clock bound in seconds.
    pub max_wall_secs: Option<f64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: Method::Dopri5,
            rtol: 1e-3,
            atol: 1e-6,
            first_step: 0.0,
            min_step: 1e-12,
            max_step: f64::INFINITY,
            max_steps: 100_000,
            max_wall_secs: None,
        }
    }
}

impl SolverOptions {
    pub fn check(&self) -> Result<()> {
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return Err(ArboError::invalid("rtol must be finite and > 0"));
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            return Err(ArboError::invalid("atol must be finite and > 0"));
        }
        if self.max_steps == 0 {
            return Err(ArboError::invalid("max_steps must be > 0"));
        }
        if !(self.max_step > 0.0) || !(self.min_step >= 0.0) || self.min_step > self.max_step {
            return Err(ArboError::invalid("step bounds must satisfy 0 <= min_step <= max_step"));
        }
        if let Method::Rk4 { dt } = self.method {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(ArboError::invalid("rk4 dt must be finite and > 0"));
            }
        }
        if let Some(secs) = self.max_wall_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ArboError::invalid("max_wall_secs must be finite and > 0"));
            }
        }
        Ok(())
    }

    fn initial_step(&self, span: f64) -> f64 {
        if self.first_step > 0.0 {
            self.first_step.min(span)
        } else {
            (span * 1e-3).max(self.min_step).min(self.max_step).min(span)
        }
    }

    fn deadline(&self, started: Instant) -> Option<Instant> {
        self.max_wall_secs
            .map(|secs| started + Duration::from_secs_f64(secs))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SolverStats {
    pub n_rhs: usize,
    pub n_accepted: usize,
    pub n_rejected: usize,
}

/// Solution sampled at the requested grid times: `y[i]` is the state at `t[i]`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trajectory {
    pub t: Vec<f64>,
    pub y: Vec<Vec<f64>>,
    pub stats: SolverStats,
}

impl Trajectory {
    fn with_capacity(n: usize) -> Self {
        Self {
            t: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            stats: SolverStats::default(),
        }
    }

    fn push(&mut self, t: f64, y: &[f64]) {
        self.t.push(t);
        self.y.push(y.to_vec());
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

/// Workspace for allocation-free RK4 steps
pub struct Rk4Workspace {
    pub k1: Vec<f64>,
    pub k2: Vec<f64>,
    pub k3: Vec<f64>,
    pub k4: Vec<f64>,
    pub ytmp: Vec<f64>,
}

impl Rk4Workspace {
    pub fn new(n: usize) -> Self {
        Self {
            k1: vec![0.0; n],
            k2: vec![0.0; n],
            k3: vec![0.0; n],
            k4: vec![0.0; n],
            ytmp: vec![0.0; n],
        }
    }
}

/// One classic RK4 step of size `dt`, in place. Errors from `f` abort the step
/// and leave `y` untouched.
pub fn rk4_step_ws<F>(y: &mut [f64], t: f64, dt: f64, ws: &mut Rk4Workspace, mut f: F) -> Result<()>
where
    F: FnMut(f64, &[f64], &mut [f64]) -> Result<()>,
{
    let n = y.len();
    let (k1, k2, k3, k4, ytmp) = (&mut ws.k1, &mut ws.k2, &mut ws.k3, &mut ws.k4, &mut ws.ytmp);

    f(t, y, k1)?;

    for i in 0..n {
        ytmp[i] = y[i] + 0.5 * dt * k1[i];
    }
    f(t + 0.5 * dt, ytmp, k2)?;

    for i in 0..n {
        ytmp[i] = y[i] + 0.5 * dt * k2[i];
    }
    f(t + 0.5 * dt, ytmp, k3)?;

    for i in 0..n {
        ytmp[i] = y[i] + dt * k3[i];
    }
    f(t + dt, ytmp, k4)?;

    for i in 0..n {
        y[i] += (dt / 6.0) * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
    Ok(())
}

/// Integrate `dy/dt = f(t, y)` from `grid[0]` and report the state at every grid time.
///
/// The grid must be non-empty, finite and strictly increasing, and `y0` finite.
/// Errors returned by `f` propagate unchanged; running out of steps, time, or
/// step size, or producing a non-finite state, yields
/// [`ArboError::IntegrationFailed`] with the grid points reached so far.
pub fn integrate<F>(grid: &[f64], y0: &[f64], opts: &SolverOptions, f: F) -> Result<Trajectory>
where
    F: FnMut(f64, &[f64], &mut [f64]) -> Result<()>,
{
    opts.check()?;
    check_grid(grid)?;
    if y0.iter().any(|v| !v.is_finite()) {
        return Err(ArboError::invalid("initial state must be finite"));
    }

    match opts.method {
        Method::Dopri5 => dopri5(grid, y0, opts, f),
        Method::Rk4 { dt } => rk4_grid(grid, y0, dt, opts, f),
    }
}

fn check_grid(grid: &[f64]) -> Result<()> {
    if grid.is_empty() {
        return Err(ArboError::invalid("time grid is empty"));
    }
    if grid.iter().any(|t| !t.is_finite()) {
        return Err(ArboError::invalid("time grid must be finite"));
    }
    if grid.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ArboError::invalid("time grid must be strictly increasing"));
    }
    Ok(())
}

fn failed(t: f64, reason: impl Into<String>, partial: Trajectory) -> ArboError {
    let reason = reason.into();
    log::warn!("integration failed at t={t:.4}: {reason}");
    ArboError::IntegrationFailed {
        t,
        reason,
        partial: Box::new(partial),
    }
}

fn rk4_grid<F>(grid: &[f64], y0: &[f64], dt: f64, opts: &SolverOptions, mut f: F) -> Result<Trajectory>
where
    F: FnMut(f64, &[f64], &mut [f64]) -> Result<()>,
{
    let started = Instant::now();
    let deadline = opts.deadline(started);
    let mut out = Trajectory::with_capacity(grid.len());
    let mut ws = Rk4Workspace::new(y0.len());
    let mut y = y0.to_vec();
    out.push(grid[0], &y);

    for w in grid.windows(2) {
        let (t0, t1) = (w[0], w[1]);
        let n_sub = ((t1 - t0) / dt).ceil().max(1.0) as usize;
        let h = (t1 - t0) / n_sub as f64;
        for s in 0..n_sub {
            let t = t0 + s as f64 * h;
            if out.stats.n_accepted >= opts.max_steps {
                return Err(failed(t, format!("exceeded max_steps={}", opts.max_steps), out));
            }
            if deadline.is_some_and(|d| Instant::now() > d) {
                return Err(failed(t, "exceeded wall-clock limit", out));
            }
            rk4_step_ws(&mut y, t, h, &mut ws, &mut f)?;
            out.stats.n_rhs += 4;
            out.stats.n_accepted += 1;
            if y.iter().any(|v| !v.is_finite()) {
                return Err(failed(t + h, "state became non-finite", out));
            }
        }
        out.push(t1, &y);
    }
    Ok(out)
}

// Dormand–Prince tableau
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th order weights (advancing solution)
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// y5 - y4
const E1: f64 = B1 - 5179.0 / 57600.0;
const E3: f64 = B3 - 7571.0 / 16695.0;
const E4: f64 = B4 - 393.0 / 640.0;
const E5: f64 = B5 - (-92097.0 / 339200.0);
const E6: f64 = B6 - 187.0 / 2100.0;
const E7: f64 = -1.0 / 40.0;

fn dopri5<F>(grid: &[f64], y0: &[f64], opts: &SolverOptions, mut f: F) -> Result<Trajectory>
where
    F: FnMut(f64, &[f64], &mut [f64]) -> Result<()>,
{
    let n = y0.len();
    let started = Instant::now();
    let deadline = opts.deadline(started);
    let mut out = Trajectory::with_capacity(grid.len());
    out.push(grid[0], y0);
    if grid.len() == 1 {
        return Ok(out);
    }

    let span = grid[grid.len() - 1] - grid[0];
    let mut t = grid[0];
    let mut y = y0.to_vec();
    let mut h = opts.initial_step(span);

    let mut k1 = vec![0.0; n];
    let mut k2 = vec![0.0; n];
    let mut k3 = vec![0.0; n];
    let mut k4 = vec![0.0; n];
    let mut k5 = vec![0.0; n];
    let mut k6 = vec![0.0; n];
    let mut k7 = vec![0.0; n];
    let mut y_tmp = vec![0.0; n];
    let mut y_new = vec![0.0; n];

    f(t, &y, &mut k1)?;
    out.stats.n_rhs += 1;

    let mut next = 1;
    while next < grid.len() {
        if out.stats.n_accepted + out.stats.n_rejected >= opts.max_steps {
            return Err(failed(t, format!("exceeded max_steps={}", opts.max_steps), out));
        }
        if deadline.is_some_and(|d| Instant::now() > d) {
            return Err(failed(t, "exceeded wall-clock limit", out));
        }

        let target = grid[next];
        let mut h_try = h.min(opts.max_step);
        let clipped = t + h_try >= target;
        if clipped {
            h_try = target - t;
        }

        for i in 0..n {
            y_tmp[i] = y[i] + h_try * A21 * k1[i];
        }
        f(t + h_try / 5.0, &y_tmp, &mut k2)?;

        for i in 0..n {
            y_tmp[i] = y[i] + h_try * (A31 * k1[i] + A32 * k2[i]);
        }
        f(t + 3.0 * h_try / 10.0, &y_tmp, &mut k3)?;

        for i in 0..n {
            y_tmp[i] = y[i] + h_try * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
        }
        f(t + 4.0 * h_try / 5.0, &y_tmp, &mut k4)?;

        for i in 0..n {
            y_tmp[i] = y[i] + h_try * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
        }
        f(t + 8.0 * h_try / 9.0, &y_tmp, &mut k5)?;

        for i in 0..n {
            y_tmp[i] = y[i]
                + h_try * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
        }
        f(t + h_try, &y_tmp, &mut k6)?;

        for i in 0..n {
            y_new[i] = y[i] + h_try * (B1 * k1[i] + B3 * k3[i] + B4 * k4[i] + B5 * k5[i] + B6 * k6[i]);
        }
        // FSAL
        f(t + h_try, &y_new, &mut k7)?;
        out.stats.n_rhs += 6;

        let mut err_norm = 0.0;
        for i in 0..n {
            let ei = h_try
                * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
            let sc = opts.atol + opts.rtol * y[i].abs().max(y_new[i].abs());
            err_norm += (ei / sc) * (ei / sc);
        }
        err_norm = (err_norm / n as f64).sqrt();

        let accepted = err_norm.is_finite() && err_norm <= 1.0;
        if accepted {
            t = if clipped { target } else { t + h_try };
            y.copy_from_slice(&y_new);
            k1.copy_from_slice(&k7);
            out.stats.n_accepted += 1;
            if y.iter().any(|v| !v.is_finite()) {
                return Err(failed(t, "state became non-finite", out));
            }
            if clipped {
                out.push(t, &y);
                next += 1;
            }
        } else {
            out.stats.n_rejected += 1;
        }

        let factor = if !err_norm.is_finite() {
            0.2
        } else if err_norm == 0.0 {
            5.0
        } else {
            (0.9 * err_norm.powf(-0.2)).clamp(0.2, 5.0)
        };
        let proposed = (h_try * factor).min(opts.max_step);
        // A step shortened to land on a grid point says nothing against the old size.
        h = if accepted && clipped { proposed.max(h) } else { proposed };
        if h < opts.min_step {
            return Err(failed(t, format!("step size {h:.3e} fell below min_step"), out));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn decay(_t: f64, y: &[f64], dy: &mut [f64]) -> Result<()> {
        dy[0] = -0.5 * y[0];
        Ok(())
    }

    #[test]
    fn dopri5_hits_every_grid_point() {
        let grid: Vec<f64> = (0..=10).map(|i| i as f64).collect();
        let traj = integrate(&grid, &[1.0], &SolverOptions::default(), decay).unwrap();
        assert_eq!(traj.t, grid);
        for (t, y) in traj.t.iter().zip(&traj.y) {
            assert_relative_eq!(y[0], (-0.5 * t).exp(), max_relative = 1e-3);
        }
    }

    #[test]
    fn rk4_matches_exponential_decay() {
        let grid = [0.0, 0.5, 2.0, 4.0];
        let opts = SolverOptions {
            method: Method::Rk4 { dt: 0.1 },
            ..SolverOptions::default()
        };
        let traj = integrate(&grid, &[2.0], &opts, decay).unwrap();
        assert_relative_eq!(traj.y[3][0], 2.0 * (-2.0f64).exp(), max_relative = 1e-6);
    }

    #[test]
    fn rejects_non_increasing_grid() {
        let err = integrate(&[0.0, 1.0, 1.0], &[1.0], &SolverOptions::default(), decay).unwrap_err();
        assert!(matches!(err, ArboError::InvalidInput(_)));
    }

    #[test]
    fn step_budget_reports_partial_trajectory() {
        let grid: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        let opts = SolverOptions {
            max_steps: 5,
            max_step: 0.5,
            ..SolverOptions::default()
        };
        let err = integrate(&grid, &[1.0], &opts, decay).unwrap_err();
        match err {
            ArboError::IntegrationFailed { partial, .. } => {
                assert!(!partial.is_empty());
                assert!(partial.len() < grid.len());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rhs_errors_propagate() {
        let err = integrate(&[0.0, 1.0], &[1.0], &SolverOptions::default(), |t, _y, _dy| {
            Err(ArboError::degenerate(t, "test"))
        })
        .unwrap_err();
        assert!(matches!(err, ArboError::ModelDegenerate { .. }));
    }
}
