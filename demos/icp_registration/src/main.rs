use argh::FromArgs;
use glam::DVec3;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::path::{Path, PathBuf};

use rigreg::icp::{self as ricp, Correspondence, IcpConfig, IcpRegistration};
use rigreg::k3d::{transforms::axis_angle_to_rotation_matrix, PointCloud, RigidTransform};

#[derive(FromArgs)]
/// Example of rigid registration: closed-form localization and ICP
struct Args {
    /// path to a json file with the icp configuration
    #[argh(option)]
    config: Option<PathBuf>,

    /// override the maximum number of icp iterations
    #[argh(option)]
    max_iterations: Option<usize>,

    /// override the correspondence rejection distance
    #[argh(option)]
    rejection_distance: Option<f64>,

    /// enable the median absolute deviation outlier filter
    #[argh(switch)]
    robust: bool,

    /// number of points in the synthetic reference cloud
    #[argh(option, default = "2000")]
    num_points: usize,

    /// rotation angle in radians of the synthetic motion
    #[argh(option, default = "0.05")]
    angle: f64,

    /// seed of the synthetic data
    #[argh(option, default = "0")]
    seed: u64,
}

fn load_config(path: Option<&Path>) -> Result<IcpConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let file = std::fs::File::open(path)?;
            let config: IcpConfig = serde_json::from_reader(std::io::BufReader::new(file))?;
            Ok(config)
        }
        None => Ok(IcpConfig::default()),
    }
}

fn apply_overrides(mut config: IcpConfig, args: &Args) -> IcpConfig {
    if let Some(max_iterations) = args.max_iterations {
        config.max_iterations = max_iterations;
    }
    if let Some(distance) = args.rejection_distance {
        config.correspondence_rejection_distance = Some(distance);
    }
    if args.robust {
        config.robust_rejection = true;
    }
    config
}

fn localize_five_points() -> Result<(), Box<dyn std::error::Error>> {
    let reference = PointCloud::new(vec![
        [8.1472, 0.9754, 1.5761],
        [9.0579, 2.7850, 9.7059],
        [1.2699, 5.4688, 9.5717],
        [9.1338, 9.5751, 4.8538],
        [6.3236, 9.6489, 8.0028],
    ]);
    let source = PointCloud::new(vec![
        [8.8294, 3.6256, 2.4910],
        [10.8155, 4.5095, 10.5825],
        [2.8133, 5.8770, 11.9861],
        [9.1199, 11.7824, 6.8562],
        [6.8916, 10.9934, 10.3535],
    ]);
    let correspondences = Correspondence::one_to_one(&reference, &source)?;

    let transform = ricp::solve(&reference, &source, &correspondences)?;
    println!("Localization transform: {:?}", transform.to_rows());

    let max_residual = reference
        .points()
        .iter()
        .zip(source.points())
        .map(|(r, s)| {
            let p = transform.transform_point(s);
            (DVec3::from_array(*r) - DVec3::from_array(p)).length()
        })
        .fold(0.0, f64::max);
    let status = if max_residual < 1e-4 { "passed" } else { "failed" };
    println!("Localization {status}: max residual {max_residual:e}");

    Ok(())
}

fn register_synthetic(args: &Args, config: &IcpConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(args.seed);

    let points_ref = (0..args.num_points)
        .map(|_| {
            [
                rng.random_range(-5.0..5.0),
                rng.random_range(-5.0..5.0),
                rng.random_range(-2.0..2.0),
            ]
        })
        .collect::<Vec<_>>();

    let expected = RigidTransform::from_rotation_translation(
        axis_angle_to_rotation_matrix(&[0.1, 0.2, 1.0], args.angle)?,
        DVec3::new(0.1, -0.05, 0.02),
    );

    // the source sees a shuffled three quarters of the scene from the moved frame
    let mut subset = points_ref.clone();
    subset.shuffle(&mut rng);
    subset.truncate(args.num_points * 3 / 4);
    let source = PointCloud::new(expected.inverse().transform_points(&subset));
    let reference = PointCloud::new(points_ref);
    println!("Reference cloud: #{} points", reference.len());
    println!("Source cloud: #{} points", source.len());

    let registration = IcpRegistration::new(&reference, config.clone())?;
    log::info!("Registering with {:?}", registration.config());

    let indexed = registration.reference();
    println!(
        "Reference bounds: {:?} - {:?}",
        indexed.get_min_bound(),
        indexed.get_max_bound()
    );

    let result = registration.register(&source)?;
    println!("ICP registration result: {}", serde_json::to_string_pretty(&result)?);

    let error = result.transform.compose(&expected.inverse());
    println!(
        "Error with respect to the ground truth: rotation {:e} rad, translation {:e}",
        error.rotation_angle(),
        error.translation().length()
    );

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = apply_overrides(load_config(args.config.as_deref())?, &args);
    config.validate()?;

    localize_five_points()?;
    register_synthetic(&args, &config)?;

    Ok(())
}
