use std::time::Instant;

use arbo::model::capacity::Capacity;
use arbo::model::rates::Entomology;
use arbo::{solve_model, ArboState, FittedParams, FixedParams, Method, SolverOptions};

fn main() -> anyhow::Result<()> {
    let y0 = ArboState {
        a: 1000.0,
        ms: 5000.0,
        mi: 1.0,
        hs: 9999.0,
        hi: 1.0,
        ..ArboState::default()
    };
    let grid: Vec<f64> = (0..=365).map(|d| d as f64).collect();
    let run = |opts: SolverOptions| {
        solve_model(
            &grid,
            &y0,
            FittedParams { b: 0.5, beta: 0.3 },
            FixedParams::default(),
            Entomology::Fixed,
            Capacity::Constant(50.0),
            &opts,
        )
    };

    let t_start = Instant::now();
    let adaptive = run(SolverOptions::default())?;
    let dur1 = t_start.elapsed();

    let t_start2 = Instant::now();
    let fixed_step = run(SolverOptions {
        method: Method::Rk4 { dt: 0.05 },
        ..SolverOptions::default()
    })?;
    let dur2 = t_start2.elapsed();

    let last = grid.len() - 1;
    let diff = (adaptive.infected_plus_recovered()[last] - fixed_step.infected_plus_recovered()[last]).abs();

    println!("dopri5_ms,dopri5_rhs,rk4_ms,rk4_rhs,final_cases_abs_diff");
    println!(
        "{:.3},{},{:.3},{},{:.3e}",
        dur1.as_secs_f64() * 1000.0,
        adaptive.stats.n_rhs,
        dur2.as_secs_f64() * 1000.0,
        fixed_step.stats.n_rhs,
        diff
    );
    Ok(())
}
