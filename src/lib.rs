mod atmosphere;
mod boundary_cond;
mod config;
mod error;
mod fortran;
mod hydrus;
mod input;
mod input_reader;
mod model;
mod output;
mod profile;
mod runner;
mod soil_hydra;
mod time_info;
mod units;

pub use atmosphere::{AtmosphericRecord, DailyInputs};
pub use boundary_cond::{BottomBoundary, BoundaryConditions, HeadTable, IterationCriteria, TopBoundary};
pub use config::{
    BoundarySection, LayerSection, MaterialEntry, ModelConfig, ProfileSection, TimeSection, WaterFlowSection,
};
pub use error::{AggregateValidationError, ConflictError, Error, Finding, ParseError, ValidationError};
pub use hydrus::Hydrus1D;
pub use input::{ATMOSPH_IN, InputSerializer, PROFILE_DAT, SELECTOR_IN, SolverLimits};
pub use input_reader::{InputFiles, read_input};
pub use model::{ModelBuilder, ModelSpec};
pub use output::{
    ERROR_MSG, ExitStatus, NOD_INF_OUT, OBS_NODE_OUT, ObservationSeries, OutputParser, ProfileSnapshot,
    SimulationOutput, SimulationResult, T_LEVEL_OUT, expected_outputs,
};
pub use profile::{Profile, ProfileBuilder, ProfileNode};
pub use runner::{CancelToken, DEFAULT_TIMEOUT, RunReport, SOLVER_LOG, SolverRunner};
pub use soil_hydra::{HydraulicPoint, Material, MaterialCatalog, MaterialId};
pub use time_info::{PrintSteps, StepControl, TimeConfig};
pub use units::{LengthUnit, TimeUnit, Units};
