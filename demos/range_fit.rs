use std::fs::File;

use rangefit::kinematics::range_model::{GroundStation, RangeModel};
use rangefit::kinematics::KinematicState;
use rangefit::least_squares::problem::ObservationSet;
use rangefit::least_squares::SolverParams;
use rangefit::rangefit_errors::RangefitError;

/// Fit the initial state of a ballistic target from five ranges and export the iterations.
///
/// Writes `xnew.csv` (state after each update), `res.csv` (update vectors) and
/// `rms.csv` (step and residual norms) in the working directory.
///
/// Run with `RUST_LOG=debug cargo run --example range_fit` to see every iteration.
fn main() -> Result<(), RangefitError> {
    env_logger::init();

    let station = GroundStation::new(1.0, 1.0);
    let observations = ObservationSet::from_slices(
        &[0.0, 1.0, 2.0, 3.0, 4.0],
        &[7.0, 8.00390597, 8.94427191, 9.801147892, 10.630145813],
    )?;
    let guess = KinematicState::new(1.5, 10.0, 2.2, 0.5, 0.3);

    let params = SolverParams::builder()
        .tolerance(1e-6)
        .max_iterations(1000)
        .build()?;
    println!("{params:#}");

    let mut solver = RangeModel::solver(station, observations, &guess).with_params(params);
    let fit = solver.run()?;

    println!("{}", solver.history());
    println!(
        "status = {:?}, iterations = {}, ||step|| = {:.3e}, ||r|| = {:.3e}",
        fit.status,
        fit.iterations,
        fit.error_norm,
        fit.residual_norm()
    );
    println!("initial state: {}", KinematicState::from_vector(&fit.state)?);

    let history = solver.history();
    history.write_states_csv(File::create("xnew.csv")?)?;
    history.write_steps_csv(File::create("res.csv")?)?;
    history.write_norms_csv(File::create("rms.csv")?)?;

    Ok(())
}
