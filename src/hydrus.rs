use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::error::Error;
use crate::input::{InputSerializer, SolverLimits};
use crate::model::ModelSpec;
use crate::output::{ExitStatus, OutputParser, SimulationResult, expected_outputs};
use crate::runner::{CancelToken, DEFAULT_TIMEOUT, SolverRunner};

// Write input files, run the solver and read back its output for one model
pub struct Hydrus1D {
    spec: ModelSpec,
    serializer: InputSerializer,
    runner: SolverRunner,
}

impl Hydrus1D {
    /// The solver is killed after [`DEFAULT_TIMEOUT`] unless [`Self::with_timeout`]
    /// sets another limit.
    pub fn new(spec: ModelSpec, executable: impl Into<PathBuf>) -> Self {
        let runner = SolverRunner::new(executable, DEFAULT_TIMEOUT).with_expected_outputs(expected_outputs(&spec));
        Hydrus1D {
            spec,
            serializer: InputSerializer::new(),
            runner,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.runner = self.runner.with_timeout(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.runner = self.runner.with_cancel(token);
        self
    }

    pub fn with_limits(mut self, limits: SolverLimits) -> Self {
        self.serializer = InputSerializer::with_limits(limits);
        self
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn timeout(&self) -> Duration {
        self.runner.timeout()
    }

    pub fn working_dir(&self) -> &Path {
        self.spec.working_dir()
    }

    // Write SELECTOR.IN, PROFILE.DAT and ATMOSPH.IN into the working directory
    pub fn write_input(&self) -> Result<Vec<PathBuf>, Error> {
        self.serializer.write(&self.spec, self.working_dir())
    }

    /// Runs the solver on the written input and parses its output.
    ///
    /// Solver failures and unreadable output are reported through the
    /// result's status and diagnostic. Only a working directory that cannot be
    /// prepared is returned as an error.
    pub fn simulate(&self) -> Result<SimulationResult, Error> {
        let report = self.runner.run(self.working_dir())?;
        if report.status != ExitStatus::Success {
            warn!(
                model = self.spec.name(),
                status = ?report.status,
                diagnostic = report.diagnostic.as_deref().unwrap_or(""),
                "simulation did not complete"
            );
            return Ok(SimulationResult::from_run(report));
        }

        let result = SimulationResult::from_run(report);
        match OutputParser::parse(self.working_dir(), &self.spec) {
            Ok(output) => {
                info!(model = self.spec.name(), "simulation finished");
                Ok(result.with_output(output))
            }
            Err(e) => {
                warn!(model = self.spec.name(), error = %e, "cannot read solver output");
                let status = if e.is_missing() {
                    ExitStatus::OutputMissing
                } else {
                    ExitStatus::SolverError
                };
                Ok(SimulationResult {
                    status,
                    diagnostic: Some(e.to_string()),
                    ..result
                })
            }
        }
    }

    /// Writes the input files and runs the simulation.
    pub fn run(&self) -> Result<SimulationResult, Error> {
        self.write_input()?;
        self.simulate()
    }
}
