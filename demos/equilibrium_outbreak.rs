use arbo::calibration::{disease_free_state, equilibrium_capacity};
use arbo::model::capacity::Capacity;
use arbo::model::rates::{EntomologicalRates, Entomology};
use arbo::{solve_model, FittedParams, FixedParams, SolverOptions};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let fixed = FixedParams::default();
    let rates = EntomologicalRates::fixed();

    // Start the vectors at their disease-free balance and seed one case.
    let ms = 20_000.0;
    let c0 = equilibrium_capacity(ms, &rates, &fixed)?;
    let y0 = disease_free_state(ms, 50_000.0, 1.0, &rates, &fixed)?;
    let capacity = Capacity::Constant(c0 / 10f64.powi(fixed.d));

    let grid: Vec<f64> = (0..=365).map(|d| d as f64).collect();
    let traj = solve_model(
        &grid,
        &y0,
        FittedParams { b: 0.5, beta: 0.3 },
        fixed,
        Entomology::Fixed,
        capacity,
        &SolverOptions::default(),
    )?;

    println!("day,mosquitoes,humans,exposed,infectious,cumulative");
    let m = traj.mosquito_totals();
    let h = traj.human_totals();
    let cum = traj.infected_plus_recovered();
    for i in (0..traj.len()).step_by(7) {
        let Some(s) = traj.state(i) else { continue };
        println!(
            "{:.0},{:.0},{:.0},{:.1},{:.1},{:.1}",
            traj.t[i], m[i], h[i], s.he, s.hi, cum[i]
        );
    }
    Ok(())
}
