//! Models shared by the integration tests

use std::path::Path;

use soil_column::{
    BottomBoundary, BoundaryConditions, Material, ModelBuilder, ModelSpec, ProfileBuilder, TimeConfig, TopBoundary,
    Units,
};

/// Infiltration of water into a 1 m deep single-layered loam column with a
/// 1 cm ponded surface and free drainage.
pub fn infiltration_model(working_dir: &Path) -> ModelSpec {
    let mut builder = ProfileBuilder::build(-100.0, 1.0, -100.0).unwrap();
    builder.set_surface_head(1.0).unwrap();
    builder
        .mark_observations(&[-20.0, -40.0, -60.0, -80.0, -100.0])
        .unwrap();
    let profile = builder.finish();

    let boundary = BoundaryConditions::configure(
        TopBoundary::ConstantHead { head: 1.0 },
        BottomBoundary::FreeDrainage,
        &profile,
    )
    .unwrap();
    let print_times = TimeConfig::derive_print_schedule(0.0, 1.0, 12).unwrap();
    let time = TimeConfig::configure(0.0, 1.0, 0.001, 0.00001, 5.0, print_times).unwrap();

    let mut ml = ModelBuilder::new("model");
    ml.description("Infiltration of Water into a Single-Layered Soil Profile")
        .units(Units::default());
    ml.materials_mut()
        .add(Material::new(0.078, 0.43, 0.036, 1.56, 24.96, 0.5))
        .unwrap();
    ml.profile(profile)
        .boundary(boundary)
        .time(time)
        .working_dir(working_dir);
    ml.validate().unwrap()
}
