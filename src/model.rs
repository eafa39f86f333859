use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::boundary_cond::{BoundaryConditions, TopBoundary};
use crate::error::{AggregateValidationError, Finding, ValidationError};
use crate::profile::Profile;
use crate::soil_hydra::MaterialCatalog;
use crate::time_info::TimeConfig;
use crate::units::Units;

/// Mutable collection of model parts, turned into a [`ModelSpec`] by [`validate`](Self::validate).
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    name: String,
    description: String,
    units: Units,
    materials: MaterialCatalog,
    profile: Option<Profile>,
    boundary: Option<BoundaryConditions>,
    time: Option<TimeConfig>,
    working_dir: Option<PathBuf>,
    short_output: bool,
    cos_alpha: f64,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ModelBuilder {
            name: name.into(),
            description: String::new(),
            units: Units::default(),
            materials: MaterialCatalog::new(),
            profile: None,
            boundary: None,
            time: None,
            working_dir: None,
            short_output: false,
            cos_alpha: 1.0,
        }
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    pub fn units(&mut self, units: Units) -> &mut Self {
        self.units = units;
        self
    }

    pub fn materials(&mut self, materials: MaterialCatalog) -> &mut Self {
        self.materials = materials;
        self
    }

    /// Catalog being assembled, for adding materials in place.
    pub fn materials_mut(&mut self) -> &mut MaterialCatalog {
        &mut self.materials
    }

    pub fn profile(&mut self, profile: Profile) -> &mut Self {
        self.profile = Some(profile);
        self
    }

    pub fn boundary(&mut self, boundary: BoundaryConditions) -> &mut Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn time(&mut self, time: TimeConfig) -> &mut Self {
        self.time = Some(time);
        self
    }

    pub fn working_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Print profile information only at print times (`lShort`).
    pub fn short_output(&mut self, short: bool) -> &mut Self {
        self.short_output = short;
        self
    }

    /// Cosine of the angle between the flow direction and the vertical.
    pub fn cos_alpha(&mut self, cos_alpha: f64) -> &mut Self {
        self.cos_alpha = cos_alpha;
        self
    }

    /// Runs every cross-component check and freezes the model.
    ///
    /// All findings are collected before returning, so one call reports every
    /// problem in the configuration.
    pub fn validate(&self) -> Result<ModelSpec, AggregateValidationError> {
        let mut findings: Vec<Finding> = Vec::new();

        if self.materials.is_empty() {
            findings.push(ValidationError::MissingComponent("material").into());
        }
        if self.working_dir.is_none() {
            findings.push(ValidationError::MissingComponent("working directory").into());
        }
        if !(self.cos_alpha.is_finite() && (-1.0..=1.0).contains(&self.cos_alpha)) {
            findings.push(
                ValidationError::OutOfRange {
                    name: "cos_alpha",
                    value: self.cos_alpha,
                    expected: "-1 <= cos_alpha <= 1",
                }
                .into(),
            );
        }

        match &self.profile {
            None => findings.push(ValidationError::MissingComponent("profile").into()),
            Some(profile) => {
                let mut reported = BTreeSet::new();
                for (index, node) in profile.nodes().iter().enumerate() {
                    if !self.materials.contains(node.material) && reported.insert(node.material) {
                        findings.push(
                            ValidationError::UnknownMaterial {
                                node: index + 1,
                                material: node.material,
                            }
                            .into(),
                        );
                    }
                }
            }
        }

        match &self.boundary {
            None => findings.push(ValidationError::MissingComponent("boundary condition").into()),
            Some(boundary) => {
                findings.extend(boundary.validate().into_iter().map(Finding::from));
                if let Some(profile) = &self.profile {
                    findings.extend(boundary.conflicts_with(profile).into_iter().map(Finding::from));
                }
                if let (TopBoundary::Atmospheric { records, .. }, Some(time)) = (boundary.top(), &self.time) {
                    if let Some(last) = records.last() {
                        if last.time < time.t_max() {
                            findings.push(
                                ValidationError::AtmosphericRecordsTooShort {
                                    last: last.time,
                                    t_max: time.t_max(),
                                }
                                .into(),
                            );
                        }
                    }
                }
            }
        }

        if self.time.is_none() {
            findings.push(ValidationError::MissingComponent("time configuration").into());
        }

        match (&self.profile, &self.boundary, &self.time, &self.working_dir) {
            (Some(profile), Some(boundary), Some(time), Some(dir)) if findings.is_empty() => {
                debug!(model = %self.name, nodes = profile.len(), "model validated");
                Ok(ModelSpec {
                    name: self.name.clone(),
                    description: self.description.clone(),
                    units: self.units.clone(),
                    materials: self.materials.clone(),
                    profile: profile.clone(),
                    boundary: boundary.clone(),
                    time: time.clone(),
                    working_dir: dir.clone(),
                    short_output: self.short_output,
                    cos_alpha: self.cos_alpha,
                })
            }
            _ => Err(AggregateValidationError::new(findings)),
        }
    }
}

/// A validated, immutable model ready to be written for the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    name: String,
    description: String,
    units: Units,
    materials: MaterialCatalog,
    profile: Profile,
    boundary: BoundaryConditions,
    time: TimeConfig,
    working_dir: PathBuf,
    short_output: bool,
    cos_alpha: f64,
}

impl ModelSpec {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn units(&self) -> &Units {
        &self.units
    }

    pub fn materials(&self) -> &MaterialCatalog {
        &self.materials
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn boundary(&self) -> &BoundaryConditions {
        &self.boundary
    }

    pub fn time(&self) -> &TimeConfig {
        &self.time
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn short_output(&self) -> bool {
        self.short_output
    }

    pub fn cos_alpha(&self) -> f64 {
        self.cos_alpha
    }
}
