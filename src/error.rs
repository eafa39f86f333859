use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::soil_hydra::MaterialId;

/// Errors raised by the configuration layer and the input/output files.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Aggregate(#[from] AggregateValidationError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("material {0} is not in the catalog")]
    NotFound(MaterialId),

    #[error("unknown soil texture '{0}'")]
    UnknownTexture(String),

    #[error("cannot serialize model: {0}")]
    Serialization(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("invalid model configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// A single invariant violated while building one part of the model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{name} = {value} is out of range (expected {expected})")]
    OutOfRange {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("a profile needs at least two nodes, got {0}")]
    TooFewNodes(usize),

    #[error("node {index} at depth {depth} is not below the previous node at {previous}")]
    NotStrictlyDecreasing {
        index: usize,
        depth: f64,
        previous: f64,
    },

    #[error("observation depth {depth} lies outside the profile [{bottom}, 0]")]
    ObservationOutsideProfile { depth: f64, bottom: f64 },

    #[error("t_init ({t_init}) must be smaller than t_max ({t_max})")]
    TimeWindow { t_init: f64, t_max: f64 },

    #[error("time steps must satisfy 0 < dt_min ({dt_min}) <= dt_init ({dt_init}) <= dt_max ({dt_max})")]
    TimeStepBounds {
        dt_init: f64,
        dt_min: f64,
        dt_max: f64,
    },

    #[error("at least one print time is required")]
    NoPrintTimes,

    #[error("print time {index} ({time}) does not increase on the previous one")]
    PrintTimesNotIncreasing { index: usize, time: f64 },

    #[error("print time {time} is outside ({t_init}, {t_max}]")]
    PrintTimeOutsideWindow { time: f64, t_init: f64, t_max: f64 },

    #[error("atmospheric record {index} at t = {time} does not increase on the previous one")]
    AtmosphericTimesNotIncreasing { index: usize, time: f64 },

    #[error("atmospheric records end at t = {last}, before t_max = {t_max}")]
    AtmosphericRecordsTooShort { last: f64, t_max: f64 },

    #[error("node {node} references material {material}, which is not in the catalog")]
    UnknownMaterial { node: usize, material: MaterialId },

    #[error("the model has no {0}")]
    MissingComponent(&'static str),
}

/// Two configuration choices that cannot hold together.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConflictError {
    #[error(
        "surface pressure head was overridden to {head} but the top boundary is {top_mode}; \
         the override only acts as a boundary value with a constant head top boundary"
    )]
    SurfaceHeadWithoutConstantHead { head: f64, top_mode: &'static str },

    #[error("constant head top boundary of {boundary} differs from the profile surface head {surface}")]
    TopHeadMismatch { boundary: f64, surface: f64 },

    #[error("constant head bottom boundary of {boundary} differs from the profile bottom head {bottom}")]
    BottomHeadMismatch { boundary: f64, bottom: f64 },
}

/// One finding reported by [`ModelBuilder::validate`](crate::ModelBuilder::validate).
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    Invalid(ValidationError),
    Conflict(ConflictError),
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::Invalid(e) => write!(f, "{e}"),
            Finding::Conflict(e) => write!(f, "{e}"),
        }
    }
}

impl From<ValidationError> for Finding {
    fn from(e: ValidationError) -> Self {
        Finding::Invalid(e)
    }
}

impl From<ConflictError> for Finding {
    fn from(e: ConflictError) -> Self {
        Finding::Conflict(e)
    }
}

/// Every violation found while validating a model, in the order checked.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateValidationError {
    findings: Vec<Finding>,
}

impl AggregateValidationError {
    pub(crate) fn new(findings: Vec<Finding>) -> Self {
        AggregateValidationError { findings }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

impl fmt::Display for AggregateValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model validation failed with {} finding(s)", self.findings.len())?;
        for finding in &self.findings {
            write!(f, "\n  - {finding}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateValidationError {}

/// Problems reading solver files.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{} does not exist", path.display())]
    Missing { path: PathBuf },

    #[error("{}:{line}: {message}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{} is truncated: {reason}", path.display())]
    Truncated { path: PathBuf, reason: String },

    #[error("{} has no profile for print time {time}", path.display())]
    MissingPrintTime { path: PathBuf, time: f64 },
}

impl ParseError {
    /// True when the file was absent, as opposed to present but unreadable.
    pub fn is_missing(&self) -> bool {
        matches!(self, ParseError::Missing { .. })
    }
}
