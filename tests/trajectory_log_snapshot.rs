use arbo::io::trajectory_log::{write_trajectory_log, RunHeader};
use arbo::math::ode::SolverStats;
use arbo::Trajectory;

#[test]
fn trajectory_log_snapshot_small() {
    let traj = Trajectory {
        t: vec![0.0, 0.5, 1.0],
        y: vec![
            vec![1000.0, 5000.0, 0.0, 1.0, 9999.0, 0.0, 1.0, 0.0],
            vec![1210.4, 4987.2, 3.1, 1.2, 9998.6, 0.4, 0.96, 0.05],
            vec![1398.9, 4970.8, 6.3, 1.4, 9998.1, 0.8, 0.97, 0.1],
        ],
        stats: SolverStats::default(),
    };

    let tmp = tempfile::tempdir().expect("tempdir");
    let path = write_trajectory_log(
        tmp.path(),
        &RunHeader {
            run_id: "TEST-SMALL",
            b: 0.5,
            beta: 0.3,
            capacity: "constant 50",
            rate_mode: "fixed",
        },
        &traj,
    )
    .expect("write trajectory log");

    assert!(path.ends_with("arbo_TEST-SMALL.txt"));
    let s = std::fs::read_to_string(path).expect("read trajectory log");
    insta::assert_snapshot!(s);
}
