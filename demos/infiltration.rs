//! Infiltration of water into a single-layered soil profile.
//!
//! A 1 m deep loam column starts at a pressure head of -100 cm. The surface is
//! held at 1 cm of ponding and water drains freely at the bottom. Run with the
//! path of the HYDRUS-1D executable:
//!
//! ```text
//! cargo run --example infiltration -- ../source/hydrus
//! ```

use std::env;
use std::error::Error;
use std::path::PathBuf;

use soil_column::{
    BottomBoundary, BoundaryConditions, ExitStatus, Hydrus1D, IterationCriteria, Material, ModelBuilder, ProfileBuilder,
    TimeConfig, TopBoundary, Units,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let exe = env::args().nth(1).map_or_else(|| PathBuf::from("hydrus"), PathBuf::from);
    let ws = PathBuf::from("example_1");

    let loam = Material::new(0.078, 0.43, 0.036, 1.56, 24.96, 0.5);

    // 100 elements of 1 cm, initial pressure head -100 cm, 1 cm at the surface
    let mut builder = ProfileBuilder::build(-100.0, 1.0, -100.0)?;
    builder.set_surface_head(1.0)?;
    builder.mark_observations(&[-20.0, -40.0, -60.0, -80.0, -100.0])?;
    let profile = builder.finish();

    let boundary = BoundaryConditions::configure(
        TopBoundary::ConstantHead { head: 1.0 },
        BottomBoundary::FreeDrainage,
        &profile,
    )?
    .with_iteration(IterationCriteria::new(10, 0.001, 1.0)?);

    let print_times = TimeConfig::derive_print_schedule(0.0, 1.0, 12)?;
    let time = TimeConfig::configure(0.0, 1.0, 0.001, 0.00001, 5.0, print_times)?;

    let mut ml = ModelBuilder::new("model");
    ml.description("Infiltration of Water into a Single-Layered Soil Profile")
        .units(Units::default());
    ml.materials_mut().add(loam)?;
    ml.profile(profile).boundary(boundary).time(time).working_dir(&ws);
    let spec = ml.validate()?;

    let model = Hydrus1D::new(spec, exe);
    model.write_input()?;
    let result = model.simulate()?;

    if result.status != ExitStatus::Success {
        println!(
            "simulation ended with {:?}: {}",
            result.status,
            result.diagnostic.as_deref().unwrap_or("no diagnostic")
        );
        return Ok(());
    }

    println!("{:>10} {:>14} {:>14}", "time", "surface flux", "bottom flux");
    let surface = result.series("Actual Surface Flux").unwrap_or_default();
    let bottom = result.series("Bottom Flux").unwrap_or_default();
    for ((t, v_top), (_, v_bot)) in surface.iter().zip(bottom) {
        println!("{t:>10.4} {v_top:>14.6} {v_bot:>14.6}");
    }

    for snapshot in &result.profile_snapshots {
        println!("t = {:.4}: {:.3} cm of water stored", snapshot.time, snapshot.water_storage());
    }

    println!("{:>10} {:>8} {:>12}", "head", "theta", "K");
    let heads: Vec<f64> = (0..8).map(|i| -(10f64.powi(i))).collect();
    for point in loam.hydraulic_curve(&heads) {
        println!("{:>10.1} {:>8.4} {:>12.4e}", point.head, point.theta, point.k);
    }
    Ok(())
}
