use nalgebra::Vector3;
use symkin::config::KinematicsConfig;
use symkin::reference::{planar_2dof_chain, planar_2dof_pose};
use symkin::{compute_symbolic_pose, evaluate_numeric_pose_chopped, solve_ik, IkTarget};

fn logger_init(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logger_init(log::LevelFilter::Debug)?;

    let config = match std::env::args().nth(1) {
        Some(path) => KinematicsConfig::load(path)?,
        None => KinematicsConfig::default(),
    };

    let chain = planar_2dof_chain()?;
    println!("{}", compute_symbolic_pose(&chain));

    let joints = [1.57, 1.57];
    let links = [1., 1.];
    let pose = evaluate_numeric_pose_chopped(&chain, &joints, &links, config.chop_tolerance)?;
    println!("poe position: {}", pose.position().transpose());
    println!(
        "closed form:  {:?}",
        planar_2dof_pose((joints[0], joints[1]), (links[0], links[1]))
    );

    let target = IkTarget::Position(Vector3::new(0.5, -1.2, 0.));
    let solution = solve_ik(&chain, target, &[0.3, 0.8], &links, config.ik)?;
    println!(
        "ik: {:?} after {} iterations",
        solution.joints, solution.iterations
    );
    Ok(())
}
