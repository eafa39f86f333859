use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::boundary_cond::{BottomBoundary, BoundaryConditions, HeadTable, IterationCriteria, TopBoundary};
use crate::error::Error;
use crate::model::{ModelBuilder, ModelSpec};
use crate::profile::ProfileBuilder;
use crate::soil_hydra::{Material, MaterialCatalog, MaterialId};
use crate::time_info::{PrintSteps, StepControl, TimeConfig};
use crate::units::Units;

// A complete model as a TOML document: units, time, water flow, boundaries,
// materials (texture name or parameters) and a layered profile
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub working_dir: PathBuf,
    #[serde(default)]
    pub units: Units,
    #[serde(default)]
    pub short_output: bool,
    #[serde(default = "default_cos_alpha")]
    pub cos_alpha: f64,
    pub time: TimeSection,
    #[serde(default)]
    pub water_flow: WaterFlowSection,
    pub boundary: BoundarySection,
    pub materials: Vec<MaterialEntry>,
    pub profile: ProfileSection,
}

fn default_cos_alpha() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeSection {
    #[serde(default)]
    pub t_init: f64,
    pub t_max: f64,
    pub dt_init: f64,
    pub dt_min: f64,
    pub dt_max: f64,
    /// Explicit print times; takes precedence over `print_count`.
    pub print_times: Option<Vec<f64>>,
    /// Number of evenly spaced print times ending at `t_max`.
    pub print_count: Option<usize>,
    pub step_control: Option<StepControl>,
    pub print_steps: Option<PrintSteps>,
}

// Iteration criteria and the interval of tabulated hydraulic functions
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct WaterFlowSection {
    pub max_iter: u32,
    pub tol_th: f64,
    pub tol_h: f64,
    pub ha: f64,
    pub hb: f64,
}

impl Default for WaterFlowSection {
    fn default() -> Self {
        let iteration = IterationCriteria::default();
        let head_table = HeadTable::default();
        WaterFlowSection {
            max_iter: iteration.max_iter,
            tol_th: iteration.tol_th,
            tol_h: iteration.tol_h,
            ha: head_table.ha,
            hb: head_table.hb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoundarySection {
    pub top: TopBoundary,
    pub bottom: BottomBoundary,
}

/// A material given by textural class or by its parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MaterialEntry {
    Texture { texture: String },
    Parameters(Material),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfileSection {
    pub bottom: f64,
    pub spacing: f64,
    pub initial_head: f64,
    pub surface_head: Option<f64>,
    #[serde(default)]
    pub observations: Vec<f64>,
    #[serde(default)]
    pub layers: Vec<LayerSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LayerSection {
    pub top: f64,
    pub bottom: f64,
    pub material: MaterialId,
}

impl ModelConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Builds every component, failing on the first one that is invalid on
    /// its own. Cross-component checks are left to [`ModelBuilder::validate`].
    pub fn into_builder(self) -> Result<ModelBuilder, Error> {
        let mut materials = MaterialCatalog::new();
        for entry in &self.materials {
            match entry {
                MaterialEntry::Texture { texture } => materials.add_texture(texture, &self.units)?,
                MaterialEntry::Parameters(material) => materials.add(*material)?,
            };
        }

        let section = &self.profile;
        let mut builder = ProfileBuilder::build(section.bottom, section.spacing, section.initial_head)?;
        for layer in &section.layers {
            builder.assign_material(layer.top, layer.bottom, layer.material)?;
        }
        if let Some(head) = section.surface_head {
            builder.set_surface_head(head)?;
        }
        builder.mark_observations(&section.observations)?;
        let profile = builder.finish();

        let flow = self.water_flow;
        let boundary = BoundaryConditions::configure(self.boundary.top, self.boundary.bottom, &profile)?
            .with_iteration(IterationCriteria::new(flow.max_iter, flow.tol_th, flow.tol_h)?)
            .with_head_table(HeadTable::new(flow.ha, flow.hb)?);

        let t = self.time;
        let print_times = match t.print_times {
            Some(times) => times,
            None => TimeConfig::derive_print_schedule(t.t_init, t.t_max, t.print_count.unwrap_or(1))?,
        };
        let mut time = TimeConfig::configure(t.t_init, t.t_max, t.dt_init, t.dt_min, t.dt_max, print_times)?;
        if let Some(control) = t.step_control {
            time = time.with_step_control(control)?;
        }
        if let Some(steps) = t.print_steps {
            time = time.with_print_steps(steps)?;
        }

        let mut ml = ModelBuilder::new(self.name);
        ml.description(self.description)
            .units(self.units)
            .short_output(self.short_output)
            .cos_alpha(self.cos_alpha)
            .materials(materials)
            .profile(profile)
            .boundary(boundary)
            .time(time)
            .working_dir(self.working_dir);
        Ok(ml)
    }

    /// Builds and validates the model in one go.
    pub fn build(self) -> Result<ModelSpec, Error> {
        Ok(self.into_builder()?.validate()?)
    }
}
