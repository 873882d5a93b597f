use anyhow::Context;

use crate::math::ode::Trajectory;
use crate::model::arbo::Compartment;

/// Run metadata written above the trajectory table.
pub struct RunHeader<'a> {
    pub run_id: &'a str,
    pub b: f64,
    pub beta: f64,
    pub capacity: &'a str,
    pub rate_mode: &'a str,
}

pub fn write_trajectory_log(
    out_dir: impl AsRef<std::path::Path>,
    header: &RunHeader<'_>,
    traj: &Trajectory,
) -> anyhow::Result<std::path::PathBuf> {
    use std::io::Write;

    std::fs::create_dir_all(out_dir.as_ref()).context("create logs dir failed")?;
    let path = out_dir.as_ref().join(format!("arbo_{}.txt", header.run_id));
    let mut f = std::fs::File::create(&path)
        .with_context(|| format!("create trajectory log file failed (path={:?})", path))?;

    writeln!(f, "run_id={}", header.run_id)?;
    writeln!(f, "b={:.6}", header.b)?;
    writeln!(f, "beta={:.6}", header.beta)?;
    writeln!(f, "capacity={}", header.capacity)?;
    writeln!(f, "rates={}", header.rate_mode)?;
    writeln!(f, "points={}", traj.len())?;
    writeln!(f)?;
    writeln!(f, "t,A,Ms,Me,Mi,Hs,He,Hi,Hr")?;

    for (t, y) in traj.t.iter().zip(&traj.y) {
        anyhow::ensure!(y.len() == Compartment::ALL.len(), "state has {} components", y.len());
        write!(f, "{:.2}", t)?;
        for v in y {
            write!(f, ",{:.0}", v)?;
        }
        writeln!(f)?;
    }

    Ok(path)
}
